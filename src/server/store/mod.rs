//! Persistence seam. Each call is one atomic single-document (or bounded
//! id-set) operation; there are no multi-record transactions across calls.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::server::controller::error::ServiceError;
use crate::server::model::order::{NewOrder, Order, OrderFilter, OrderId, OrderStatus, StatusUpdate};
use crate::server::model::request::{NewRequest, RequestFilter, RequestId, ServiceRequest};

pub mod memory;
pub mod postgres;

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a new `pending` order stamped with the store clock.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, ServiceError>;

    /// Newest first.
    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, ServiceError>;

    /// Move every matching order to `status` where the state machine allows it.
    async fn update_status(&self, ids: &[OrderId], status: OrderStatus) -> Result<StatusUpdate, ServiceError>;
}

/// Result of a guarded insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestInsert {
    Created(ServiceRequest),
    /// a pending request with the same (restaurant, table, type) already existed
    AlreadyPending(ServiceRequest),
}

#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Always writes a new `pending` record.
    async fn insert_request(&self, request: NewRequest) -> Result<ServiceRequest, ServiceError>;

    /// Atomic check-and-insert: writes only if no pending request of the
    /// same type exists for the table.
    async fn insert_request_if_absent(&self, request: NewRequest) -> Result<RequestInsert, ServiceError>;

    /// Newest first.
    async fn list_requests(&self, filter: &RequestFilter) -> Result<Vec<ServiceRequest>, ServiceError>;

    async fn resolve_request(&self, id: RequestId) -> Result<ServiceRequest, ServiceError>;

    async fn delete_request(&self, id: RequestId) -> Result<(), ServiceError>;

    /// Permanently drop resolved requests created before `before`.
    async fn purge_resolved(&self, before: DateTime<Utc>) -> Result<u64, ServiceError>;
}

pub(crate) fn request_not_found(id: RequestId) -> ServiceError {
    ServiceError::not_found(format!("request {id} not found"))
}
