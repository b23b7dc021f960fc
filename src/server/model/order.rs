use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::server::controller::error::ServiceError;
use crate::server::model::item::{DraftItem, OrderItem, MAX_PRICE, MAX_QUANTITY};
use crate::server::model::money::Money;

pub type OrderId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Served,
    Paid,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 3] = [OrderStatus::Pending, OrderStatus::Served, OrderStatus::Paid];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Served => "served",
            OrderStatus::Paid => "paid",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "served" => Ok(Self::Served),
            "paid" => Ok(Self::Paid),
            s => Err(ServiceError::validation(format!("unknown order status \"{s}\""))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub restaurant_id: String,
    pub table: String,
    pub items: Vec<OrderItem>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub served_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn is_active(&self) -> bool {
        self.status != OrderStatus::Paid
    }

    pub fn total(&self) -> Money {
        self.items.iter().map(OrderItem::line_total).sum()
    }
}

/// Validated input for a new order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub restaurant_id: String,
    pub table: String,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostOrderRequest {
    pub restaurant_id: Option<String>,
    pub table: Option<String>,
    pub items: Option<Vec<DraftItem>>,
}

impl PostOrderRequest {
    pub fn validate(self) -> Result<NewOrder, ServiceError> {
        let restaurant_id = required_text(self.restaurant_id, "restaurantId")?;
        let table = required_text(self.table, "table")?;
        let drafts = match self.items {
            Some(items) if !items.is_empty() => items,
            _ => return Err(ServiceError::validation("items must be a non-empty list")),
        };

        let mut items = Vec::with_capacity(drafts.len());
        for (idx, draft) in drafts.into_iter().enumerate() {
            let name = match draft.name.map(|n| n.trim().to_string()) {
                Some(n) if !n.is_empty() => n,
                _ => return Err(ServiceError::validation(format!("item {idx} is missing a name"))),
            };
            let quantity = match draft.quantity {
                Some(q) if (1..=MAX_QUANTITY).contains(&q) => q,
                Some(_) => {
                    return Err(ServiceError::validation(format!(
                        "item \"{name}\" quantity must be between 1 and {MAX_QUANTITY}"
                    )))
                }
                None => return Err(ServiceError::validation(format!("item \"{name}\" is missing a quantity"))),
            };
            let price = match draft.price {
                Some(p) if p <= MAX_PRICE => p,
                Some(_) => {
                    return Err(ServiceError::validation(format!("item \"{name}\" price exceeds {MAX_PRICE}")))
                }
                None => return Err(ServiceError::validation(format!("item \"{name}\" is missing a price"))),
            };
            items.push(OrderItem { name, quantity, price });
        }

        Ok(NewOrder { restaurant_id, table, items })
    }
}

pub(crate) fn required_text(value: Option<String>, field: &str) -> Result<String, ServiceError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ServiceError::validation(format!("missing field {field}"))),
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostOrderResponse {
    pub success: bool,
    pub order: Order,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetOrdersResponse {
    pub success: bool,
    pub orders: Vec<Order>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PatchOrdersRequest {
    pub ids: Option<Vec<OrderId>>,
    pub status: Option<String>,
}

/// Outcome of a bulk status change. `matched` = updated + unchanged + rejected.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub matched: u64,
    pub updated: u64,
    /// already in the requested status
    pub unchanged: u64,
    /// illegal transition, left as is
    pub rejected: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PatchOrdersResponse {
    pub success: bool,
    #[serde(flatten)]
    pub update: StatusUpdate,
}

/// Query filters for listing orders. Empty filter lists everything.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OrderFilter {
    pub restaurant_id: Option<String>,
    pub table: Option<String>,
    pub status: Option<OrderStatus>,
    pub active_only: bool,
}

impl OrderFilter {
    pub fn active_table(restaurant_id: Option<String>, table: &str) -> Self {
        Self {
            restaurant_id,
            table: Some(table.to_string()),
            status: None,
            active_only: true,
        }
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.restaurant_id.as_ref().map_or(true, |r| *r == order.restaurant_id)
            && self.table.as_ref().map_or(true, |t| *t == order.table)
            && self.status.map_or(true, |s| s == order.status)
            && (!self.active_only || order.is_active())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct GetOrdersParams {
    pub table: Option<String>,
    pub status: Option<String>,
    pub active: Option<bool>,
}
