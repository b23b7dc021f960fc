use std::sync::Arc;

use log::{info, warn};

use crate::server::controller::error::ServiceError;
use crate::server::model::bill::Bill;
use crate::server::model::event::LiveEvent;
use crate::server::model::order::{Order, OrderFilter, OrderId, OrderStatus, PostOrderRequest, StatusUpdate};
use crate::server::model::table::TableSession;
use crate::server::service::broadcast::Broadcaster;
use crate::server::service::stats::DashboardStats;
use crate::server::service::{billing, session};
use crate::server::store::OrderStore;

/// Order lifecycle: creation (with live fan-out), listing, status changes,
/// and the views derived from a table's unpaid orders.
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    broadcaster: Broadcaster,
}

impl OrderService {
    pub fn new(store: Arc<dyn OrderStore>, broadcaster: Broadcaster) -> Self {
        Self { store, broadcaster }
    }

    pub async fn create_order(&self, request: PostOrderRequest) -> Result<Order, ServiceError> {
        let new_order = request.validate().inspect_err(|e| warn!("rejected order, {}", e))?;
        let order = self.store.insert_order(new_order).await?;
        info!("order {} placed for table {}", order.id, order.table);
        self.broadcaster.publish(LiveEvent::OrderNew(order.clone()));
        Ok(order)
    }

    pub async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, ServiceError> {
        self.store.list_orders(filter).await
    }

    /// Unknown ids are skipped. Fails if nothing matched, or if every match
    /// would have moved backwards.
    pub async fn bulk_update_status(&self, ids: &[OrderId], status: &str) -> Result<StatusUpdate, ServiceError> {
        let to: OrderStatus = status.parse()?;
        if ids.is_empty() {
            return Err(ServiceError::validation("ids must be a non-empty list"));
        }
        let update = self.store.update_status(ids, to).await?;
        if update.matched == 0 {
            return Err(ServiceError::not_found("no matching orders"));
        }
        if update.updated == 0 && update.unchanged == 0 {
            return Err(ServiceError::validation(format!("orders cannot move to {to}")));
        }
        if update.rejected > 0 {
            warn!("{} order(s) cannot move to {}, left unchanged", update.rejected, to);
        }
        info!("{} order(s) moved to {}", update.updated, to);
        Ok(update)
    }

    pub async fn table_session(&self, restaurant_id: Option<String>, table: &str) -> Result<TableSession, ServiceError> {
        let orders = self.store.list_orders(&OrderFilter::active_table(restaurant_id, table)).await?;
        Ok(session::resolve_table(&orders, table))
    }

    pub async fn sessions(&self, restaurant_id: Option<String>) -> Result<Vec<TableSession>, ServiceError> {
        let filter = OrderFilter {
            restaurant_id,
            active_only: true,
            ..Default::default()
        };
        let orders = self.store.list_orders(&filter).await?;
        Ok(session::resolve_sessions(&orders))
    }

    pub async fn bill(&self, restaurant_id: Option<String>, table: &str) -> Result<Bill, ServiceError> {
        let orders = self.store.list_orders(&OrderFilter::active_table(restaurant_id, table)).await?;
        Ok(billing::aggregate(table, &orders))
    }

    pub async fn stats(&self, restaurant_id: Option<String>) -> Result<DashboardStats, ServiceError> {
        let filter = OrderFilter {
            restaurant_id,
            ..Default::default()
        };
        let orders = self.store.list_orders(&filter).await?;
        Ok(DashboardStats::from_orders(&orders))
    }
}
