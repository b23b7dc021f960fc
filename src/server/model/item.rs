use serde::{Deserialize, Serialize};

use crate::server::model::money::Money;

/// Largest quantity accepted on one order line.
pub const MAX_QUANTITY: u32 = 1_000;
/// Largest menu price accepted, 1,000,000.00.
pub const MAX_PRICE: Money = Money::from_units(1_000_000);

/// One persisted order line. Never mutated once the order exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub quantity: u32,
    pub price: Money,
}

impl OrderItem {
    pub fn line_total(&self) -> Money {
        self.price.times(u64::from(self.quantity))
    }
}

/// Order line as submitted by a client, before validation.
/// `price` takes a JSON number or a numeric string such as `"12.50"`.
#[derive(Debug, Default, Deserialize)]
pub struct DraftItem {
    pub name: Option<String>,
    pub quantity: Option<u32>,
    #[serde(default)]
    pub price: Option<Money>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_accepts_numbers_and_numeric_strings() {
        for json in [
            r#"{"name":"Soup","quantity":2,"price":100}"#,
            r#"{"name":"Soup","quantity":2,"price":" 100"}"#,
            r#"{"name":"Soup","quantity":2,"price":100.0}"#,
        ] {
            let item: DraftItem = serde_json::from_str(json).unwrap();
            assert_eq!(item.price, Some(Money::from_units(100)));
        }
    }

    #[test]
    fn price_keeps_cents() {
        let a: DraftItem = serde_json::from_str(r#"{"name":"Tea","quantity":1,"price":12.5}"#).unwrap();
        let b: DraftItem = serde_json::from_str(r#"{"name":"Tea","quantity":1,"price":"12.50"}"#).unwrap();
        assert_eq!(a.price, Some(Money::from_cents(1250)));
        assert_eq!(b.price, a.price);
    }

    #[test]
    fn missing_price_is_none() {
        let item: DraftItem = serde_json::from_str(r#"{"name":"Soup","quantity":2}"#).unwrap();
        assert_eq!(item.price, None);
    }

    #[test]
    fn garbage_price_is_rejected() {
        assert!(serde_json::from_str::<DraftItem>(r#"{"name":"Soup","quantity":2,"price":"ten"}"#).is_err());
        assert!(serde_json::from_str::<DraftItem>(r#"{"name":"Soup","quantity":2,"price":1.234}"#).is_err());
    }

    #[test]
    fn line_total_at_the_ceiling() {
        let item = OrderItem { name: "Wine".into(), quantity: MAX_QUANTITY, price: MAX_PRICE };
        assert_eq!(item.line_total(), Money::from_units(1_000_000_000));
    }
}
