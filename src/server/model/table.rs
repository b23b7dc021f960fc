use serde::{Deserialize, Serialize};

use crate::server::model::order::{Order, OrderStatus};

/// Derived view of a table's unpaid orders. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSession {
    pub table: String,
    /// set when every order in the session belongs to one restaurant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restaurant_id: Option<String>,
    pub has_main_order: bool,
    /// earliest unpaid order
    pub main: Option<Order>,
    /// every other unpaid order, oldest first
    pub add_ons: Vec<Order>,
}

impl TableSession {
    pub fn empty(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            restaurant_id: None,
            has_main_order: false,
            main: None,
            add_ons: vec![],
        }
    }

    /// add-ons the kitchen still has to prepare
    pub fn pending_add_ons(&self) -> impl Iterator<Item = &Order> {
        self.add_ons.iter().filter(|o| o.status == OrderStatus::Pending)
    }

    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.main.iter().chain(self.add_ons.iter())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetSessionResponse {
    pub success: bool,
    pub session: TableSession,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetSessionsResponse {
    pub success: bool,
    pub sessions: Vec<TableSession>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableParams {
    pub restaurant_id: Option<String>,
}
