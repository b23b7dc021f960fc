use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::server::model::money::Money;
use crate::server::model::order::{Order, OrderStatus};

const RANKED_ITEMS: usize = 3;

/// Admin dashboard figures over a restaurant's order history.
///
/// Sales figures (`revenue`, averages, rankings, per-period totals) count paid
/// orders only. `outstanding` and `activeTables` cover everything not yet paid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub paid_orders: u64,
    pub revenue: Money,
    pub avg_order_value: Money,
    /// mean of `servedAt - createdAt` in seconds, absent until an order is served
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_prep_seconds: Option<f64>,
    pub active_tables: u64,
    pub outstanding: Money,
    pub top_items: Vec<ItemCount>,
    pub least_items: Vec<ItemCount>,
    pub sales_by_day: Vec<PeriodSales>,
    pub sales_by_hour: Vec<PeriodSales>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peak_hour: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCount {
    pub name: String,
    pub quantity: u64,
}

/// Paid sales in one UTC day (`2024-05-01`) or hour of day (`13:00`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSales {
    pub period: String,
    pub amount: Money,
}

impl DashboardStats {
    pub fn from_orders<'a, I>(orders: I) -> Self
    where
        I: IntoIterator<Item = &'a Order>,
    {
        let mut stats = Self::default();
        let mut tables = BTreeSet::new();
        let (mut prep_total, mut prep_count) = (0i64, 0i64);
        let mut sold: BTreeMap<&str, u64> = BTreeMap::new();
        let mut by_day: BTreeMap<String, Money> = BTreeMap::new();
        let mut by_hour: BTreeMap<String, Money> = BTreeMap::new();

        for order in orders {
            match order.status {
                OrderStatus::Paid => {
                    let value = order.total();
                    stats.paid_orders += 1;
                    stats.revenue += value;
                    *by_day.entry(order.created_at.format("%Y-%m-%d").to_string()).or_default() += value;
                    *by_hour.entry(order.created_at.format("%H:00").to_string()).or_default() += value;
                    for item in &order.items {
                        let count = sold.entry(item.name.as_str()).or_default();
                        *count = count.saturating_add(u64::from(item.quantity));
                    }
                }
                _ => {
                    stats.outstanding += order.total();
                    tables.insert(order.table.as_str());
                }
            }
            if let Some(served_at) = order.served_at {
                prep_total += (served_at - order.created_at).num_seconds();
                prep_count += 1;
            }
        }

        stats.active_tables = tables.len() as u64;
        if prep_count > 0 {
            stats.avg_prep_seconds = Some(prep_total as f64 / prep_count as f64);
        }
        stats.avg_order_value = stats.revenue.average(stats.paid_orders).unwrap_or_default();

        let mut ranked: Vec<ItemCount> = sold
            .into_iter()
            .map(|(name, quantity)| ItemCount { name: name.to_string(), quantity })
            .collect();
        ranked.sort_by(|a, b| b.quantity.cmp(&a.quantity).then_with(|| a.name.cmp(&b.name)));
        stats.top_items = ranked.iter().take(RANKED_ITEMS).cloned().collect();
        stats.least_items = ranked.iter().rev().take(RANKED_ITEMS).cloned().collect();

        // earliest hour wins a tie
        stats.peak_hour = by_hour
            .iter()
            .fold(None, |best: Option<(&String, Money)>, (hour, amount)| match best {
                Some((_, top)) if top >= *amount => best,
                _ => Some((hour, *amount)),
            })
            .map(|(hour, _)| hour.clone());
        stats.sales_by_day = into_periods(by_day);
        stats.sales_by_hour = into_periods(by_hour);
        stats
    }
}

fn into_periods(totals: BTreeMap<String, Money>) -> Vec<PeriodSales> {
    totals.into_iter().map(|(period, amount)| PeriodSales { period, amount }).collect()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetStatsResponse {
    pub success: bool,
    pub stats: DashboardStats,
}
