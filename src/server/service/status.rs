//! Order status state machine.
//!
//! ```text
//! pending --served--> served --paid--> paid
//! pending --paid-----------------------> paid
//! ```
//!
//! `paid` is terminal and nothing returns to `pending`.

use crate::server::model::order::{Order, OrderStatus, StatusUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// move the order; `stamp_served` sets servedAt
    Apply { stamp_served: bool },
    /// already in the requested status
    Unchanged,
    /// not a forward move
    Rejected,
}

pub fn plan(from: OrderStatus, to: OrderStatus) -> Transition {
    use crate::server::model::order::OrderStatus::*;
    match (from, to) {
        (a, b) if a == b => Transition::Unchanged,
        (Pending, Served) => Transition::Apply { stamp_served: true },
        (Pending, Paid) | (Served, Paid) => Transition::Apply { stamp_served: false },
        _ => Transition::Rejected,
    }
}

/// Statuses an order may legally leave to reach `to`.
pub fn sources_of(to: OrderStatus) -> Vec<OrderStatus> {
    OrderStatus::ALL
        .into_iter()
        .filter(|from| matches!(plan(*from, to), Transition::Apply { .. }))
        .collect()
}

/// Apply `to` onto one order in place, tallying the outcome.
pub fn apply(order: &mut Order, to: OrderStatus, now: chrono::DateTime<chrono::Utc>, tally: &mut StatusUpdate) {
    tally.matched += 1;
    match plan(order.status, to) {
        Transition::Apply { stamp_served } => {
            order.status = to;
            if stamp_served {
                order.served_at = Some(now);
            }
            tally.updated += 1;
        }
        Transition::Unchanged => tally.unchanged += 1,
        Transition::Rejected => tally.rejected += 1,
    }
}
