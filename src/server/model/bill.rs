use serde::{Deserialize, Serialize};

use crate::server::model::money::Money;

/// Consolidated, itemized bill for one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bill {
    pub table: String,
    /// one line per distinct (name, price), sorted by name then price
    pub lines: Vec<BillLine>,
    pub total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillLine {
    pub name: String,
    pub price: Money,
    pub quantity: u64,
    pub total: Money,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetBillResponse {
    pub success: bool,
    pub bill: Bill,
}
