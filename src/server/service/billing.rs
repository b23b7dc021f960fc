//! Bill aggregation over a table's unpaid orders. The customer bill view and
//! the staff print-out are both rendered from [`aggregate`].

use std::collections::BTreeMap;

use crate::server::model::bill::{Bill, BillLine};
use crate::server::model::money::Money;
use crate::server::model::order::Order;

/// Merge every item of every unpaid order into one line per (name, price).
pub fn aggregate<'a, I>(table: &str, orders: I) -> Bill
where
    I: IntoIterator<Item = &'a Order>,
{
    let mut lines: BTreeMap<(String, Money), u64> = BTreeMap::new();
    for order in orders.into_iter().filter(|o| o.is_active()) {
        for item in &order.items {
            let quantity = lines.entry((item.name.clone(), item.price)).or_default();
            *quantity = quantity.saturating_add(u64::from(item.quantity));
        }
    }
    from_lines(table, lines)
}

/// Combine two bills of the same table as if aggregated together.
pub fn merge(a: &Bill, b: &Bill) -> Bill {
    let mut lines: BTreeMap<(String, Money), u64> = BTreeMap::new();
    for line in a.lines.iter().chain(b.lines.iter()) {
        let quantity = lines.entry((line.name.clone(), line.price)).or_default();
        *quantity = quantity.saturating_add(line.quantity);
    }
    from_lines(&a.table, lines)
}

fn from_lines(table: &str, lines: BTreeMap<(String, Money), u64>) -> Bill {
    let lines: Vec<BillLine> = lines
        .into_iter()
        .map(|((name, price), quantity)| BillLine {
            total: price.times(quantity),
            name,
            price,
            quantity,
        })
        .collect();
    Bill {
        table: table.to_string(),
        total: lines.iter().map(|l| l.total).sum(),
        lines,
    }
}

/// Plain-text receipt for the staff print action.
pub fn render_receipt(bill: &Bill) -> String {
    let mut out = format!(
        "Bill - Table {}\n{:<24}{:>5}{:>10}{:>12}\n",
        bill.table, "Item", "Qty", "Price", "Subtotal"
    );
    for line in &bill.lines {
        out.push_str(&format!(
            "{:<24}{:>5}{:>10}{:>12}\n",
            line.name, line.quantity, line.price, line.total
        ));
    }
    out.push_str(&format!("{:<39}{:>12}\nStatus: Unpaid\n", "Total Amount", bill.total));
    out
}
