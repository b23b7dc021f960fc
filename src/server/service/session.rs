//! Table session resolution: which unpaid order on a table is the main
//! order and which are add-ons. Every view (customer, kitchen, admin)
//! derives sessions through these functions.

use std::collections::BTreeMap;

use crate::server::model::order::Order;
use crate::server::model::table::TableSession;

/// Build one table's session. Orders for other tables and paid orders are ignored.
/// The caller scopes `orders` to a restaurant; an unscoped list merges every
/// restaurant's orders for that table label.
pub fn resolve_table<'a, I>(orders: I, table: &str) -> TableSession
where
    I: IntoIterator<Item = &'a Order>,
{
    let active = orders
        .into_iter()
        .filter(|o| o.table == table && o.is_active())
        .cloned()
        .collect();
    build(table, active)
}

/// Build a session for every (restaurant, table) with at least one unpaid
/// order, sorted by restaurant then table label. Equal table labels in two
/// restaurants stay separate sessions.
pub fn resolve_sessions<'a, I>(orders: I) -> Vec<TableSession>
where
    I: IntoIterator<Item = &'a Order>,
{
    let mut by_table: BTreeMap<(&str, &str), Vec<Order>> = BTreeMap::new();
    for order in orders.into_iter().filter(|o| o.is_active()) {
        by_table
            .entry((order.restaurant_id.as_str(), order.table.as_str()))
            .or_default()
            .push(order.clone());
    }
    by_table
        .into_iter()
        .map(|((_, table), orders)| build(table, orders))
        .collect()
}

/// Oldest first; equal timestamps fall back to id so the pick is stable.
fn build(table: &str, mut orders: Vec<Order>) -> TableSession {
    if orders.is_empty() {
        return TableSession::empty(table);
    }
    orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    let main = orders.remove(0);
    let restaurant_id = orders
        .iter()
        .all(|o| o.restaurant_id == main.restaurant_id)
        .then(|| main.restaurant_id.clone());
    TableSession {
        table: table.to_string(),
        restaurant_id,
        has_main_order: true,
        main: Some(main),
        add_ons: orders,
    }
}
