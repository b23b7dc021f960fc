use std::sync::Arc;

use crate::server::service::broadcast::Broadcaster;
use crate::server::service::orders::OrderService;
use crate::server::service::requests::RequestService;
use crate::server::store::memory::MemoryStore;
use crate::server::store::{OrderStore, RequestStore};

/// Shared by every worker. Cloning is cheap: stores sit behind `Arc`s and the
/// broadcaster is a channel handle.
#[derive(Clone)]
pub struct AppState {
    orders: OrderService,
    requests: RequestService,
    broadcaster: Broadcaster,
}

impl AppState {
    pub fn new(order_store: Arc<dyn OrderStore>, request_store: Arc<dyn RequestStore>, broadcaster: Broadcaster) -> Self {
        Self {
            orders: OrderService::new(order_store, broadcaster.clone()),
            requests: RequestService::new(request_store, broadcaster.clone()),
            broadcaster,
        }
    }

    /// Both stores backed by one in-process [`MemoryStore`].
    pub fn in_memory(broadcaster: Broadcaster) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::new(store.clone(), store, broadcaster)
    }

    pub fn orders(&self) -> &OrderService {
        &self.orders
    }

    pub fn requests(&self) -> &RequestService {
        &self.requests
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }
}
