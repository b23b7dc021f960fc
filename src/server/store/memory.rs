use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::server::controller::error::ServiceError;
use crate::server::model::order::{NewOrder, Order, OrderFilter, OrderId, OrderStatus, StatusUpdate};
use crate::server::model::request::{NewRequest, RequestFilter, RequestId, RequestStatus, ServiceRequest};
use crate::server::service::status;
use crate::server::store::{request_not_found, OrderStore, RequestInsert, RequestStore};
use crate::server::util::time::helper::get_utc_now;

/// In-process store. One mutex guards everything, so every call is atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    orders: BTreeMap<OrderId, Order>,
    requests: BTreeMap<RequestId, ServiceRequest>,
    last_order_id: OrderId,
    last_request_id: RequestId,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Inner {
    fn push_request(&mut self, request: NewRequest) -> ServiceRequest {
        self.last_request_id += 1;
        let record = ServiceRequest {
            id: self.last_request_id,
            restaurant_id: request.restaurant_id,
            table: request.table,
            kind: request.kind,
            status: RequestStatus::Pending,
            created_at: get_utc_now(),
            resolved_at: None,
        };
        self.requests.insert(record.id, record.clone());
        record
    }
}

/// newest first, id breaks ties
fn newest_first<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> (DateTime<Utc>, i64),
{
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, ServiceError> {
        let mut inner = self.lock();
        inner.last_order_id += 1;
        let record = Order {
            id: inner.last_order_id,
            restaurant_id: order.restaurant_id,
            table: order.table,
            items: order.items,
            status: OrderStatus::Pending,
            created_at: get_utc_now(),
            served_at: None,
        };
        inner.orders.insert(record.id, record.clone());
        Ok(record)
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, ServiceError> {
        let inner = self.lock();
        let mut orders: Vec<Order> = inner.orders.values().filter(|o| filter.matches(o)).cloned().collect();
        newest_first(&mut orders, |o| (o.created_at, o.id));
        Ok(orders)
    }

    async fn update_status(&self, ids: &[OrderId], to: OrderStatus) -> Result<StatusUpdate, ServiceError> {
        let mut inner = self.lock();
        let now = get_utc_now();
        let mut tally = StatusUpdate::default();
        let mut seen = Vec::with_capacity(ids.len());
        for id in ids {
            if seen.contains(id) {
                continue;
            }
            seen.push(*id);
            if let Some(order) = inner.orders.get_mut(id) {
                status::apply(order, to, now, &mut tally);
            }
        }
        Ok(tally)
    }
}

#[async_trait]
impl RequestStore for MemoryStore {
    async fn insert_request(&self, request: NewRequest) -> Result<ServiceRequest, ServiceError> {
        Ok(self.lock().push_request(request))
    }

    async fn insert_request_if_absent(&self, request: NewRequest) -> Result<RequestInsert, ServiceError> {
        let mut inner = self.lock();
        let existing = inner
            .requests
            .values()
            .find(|r| r.is_pending_for(&request.restaurant_id, &request.table, request.kind))
            .cloned();
        Ok(match existing {
            Some(found) => RequestInsert::AlreadyPending(found),
            None => RequestInsert::Created(inner.push_request(request)),
        })
    }

    async fn list_requests(&self, filter: &RequestFilter) -> Result<Vec<ServiceRequest>, ServiceError> {
        let inner = self.lock();
        let mut requests: Vec<ServiceRequest> = inner.requests.values().filter(|r| filter.matches(r)).cloned().collect();
        newest_first(&mut requests, |r| (r.created_at, r.id));
        Ok(requests)
    }

    async fn resolve_request(&self, id: RequestId) -> Result<ServiceRequest, ServiceError> {
        let mut inner = self.lock();
        let request = inner.requests.get_mut(&id).ok_or_else(|| request_not_found(id))?;
        request.status = RequestStatus::Resolved;
        request.resolved_at.get_or_insert_with(get_utc_now);
        Ok(request.clone())
    }

    async fn delete_request(&self, id: RequestId) -> Result<(), ServiceError> {
        self.lock()
            .requests
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| request_not_found(id))
    }

    async fn purge_resolved(&self, before: DateTime<Utc>) -> Result<u64, ServiceError> {
        let mut inner = self.lock();
        let len = inner.requests.len();
        inner
            .requests
            .retain(|_, r| !(r.status == RequestStatus::Resolved && r.resolved_at.is_some_and(|at| at < before)));
        Ok((len - inner.requests.len()) as u64)
    }
}
