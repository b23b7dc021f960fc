use actix_web::web::Bytes;
use crate::server::model::order::Order;
use crate::server::model::request::ServiceRequest;

pub const ORDER_NEW: &str = "order:new";
pub const REQUEST_NEW: &str = "request:new";

/// Events pushed to connected kitchen and admin displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEvent {
    OrderNew(Order),
    RequestNew(ServiceRequest),
}

impl LiveEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LiveEvent::OrderNew(_) => ORDER_NEW,
            LiveEvent::RequestNew(_) => REQUEST_NEW,
        }
    }

    /// Encode as one Server-Sent Events frame.
    pub fn to_frame(&self) -> Result<Bytes, serde_json::Error> {
        let data = match self {
            LiveEvent::OrderNew(order) => serde_json::to_string(order)?,
            LiveEvent::RequestNew(request) => serde_json::to_string(request)?,
        };
        Ok(Bytes::from(format!("event: {}\ndata: {}\n\n", self.name(), data)))
    }

    /// Decode a frame's event name and data line back into an event.
    pub fn from_frame(name: &str, data: &str) -> Option<Self> {
        match name {
            ORDER_NEW => serde_json::from_str(data).ok().map(LiveEvent::OrderNew),
            REQUEST_NEW => serde_json::from_str(data).ok().map(LiveEvent::RequestNew),
            _ => None,
        }
    }
}

pub fn ready_frame() -> Bytes {
    Bytes::from_static(b"retry: 3000\nevent: ready\ndata: {}\n\n")
}

pub fn keepalive_frame() -> Bytes {
    Bytes::from_static(b": keep-alive\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::model::item::OrderItem;
    use crate::server::model::money::Money;
    use crate::server::model::order::OrderStatus;
    use chrono::{DateTime, Utc};

    #[test]
    fn order_frame_carries_full_payload() {
        let order = Order {
            id: 12,
            restaurant_id: "r1".into(),
            table: "9".into(),
            items: vec![OrderItem { name: "A".into(), quantity: 1, price: Money::from_units(50) }],
            status: OrderStatus::Pending,
            created_at: DateTime::<Utc>::from_timestamp(60, 0).unwrap(),
            served_at: None,
        };
        let event = LiveEvent::OrderNew(order);
        let frame = event.to_frame().unwrap();
        let text = std::str::from_utf8(&frame).unwrap();
        assert!(text.starts_with("event: order:new\ndata: {"));
        assert!(text.ends_with("\n\n"));

        let data = text.lines().nth(1).unwrap().trim_start_matches("data: ");
        assert_eq!(LiveEvent::from_frame(ORDER_NEW, data), Some(event));
    }

    #[test]
    fn unknown_frames_are_ignored() {
        assert_eq!(LiveEvent::from_frame("ready", "{}"), None);
    }
}
