use std::sync::Arc;

use log::{info, warn};

use crate::server::controller::error::ServiceError;
use crate::server::model::event::LiveEvent;
use crate::server::model::request::{PostRequestRequest, RequestFilter, RequestId, ServiceRequest};
use crate::server::service::broadcast::Broadcaster;
use crate::server::store::{RequestInsert, RequestStore};

/// Waiter and bill calls from the customer page.
#[derive(Clone)]
pub struct RequestService {
    store: Arc<dyn RequestStore>,
    broadcaster: Broadcaster,
}

impl RequestService {
    pub fn new(store: Arc<dyn RequestStore>, broadcaster: Broadcaster) -> Self {
        Self { store, broadcaster }
    }

    /// At most one pending request per (restaurant, table, type). A repeat
    /// call hands back the pending one and publishes nothing.
    pub async fn create_request(&self, request: PostRequestRequest) -> Result<RequestInsert, ServiceError> {
        let new_request = request.validate().inspect_err(|e| warn!("rejected request, {}", e))?;
        let inserted = self.store.insert_request_if_absent(new_request).await?;
        match &inserted {
            RequestInsert::Created(request) => {
                info!("{} request {} from table {}", request.kind, request.id, request.table);
                self.broadcaster.publish(LiveEvent::RequestNew(request.clone()));
            }
            RequestInsert::AlreadyPending(request) => {
                info!("{} request for table {} already pending as {}", request.kind, request.table, request.id);
            }
        }
        Ok(inserted)
    }

    pub async fn list_requests(&self, filter: &RequestFilter) -> Result<Vec<ServiceRequest>, ServiceError> {
        self.store.list_requests(filter).await
    }

    pub async fn resolve_request(&self, id: RequestId) -> Result<ServiceRequest, ServiceError> {
        let request = self.store.resolve_request(id).await?;
        info!("request {} resolved", id);
        Ok(request)
    }

    pub async fn delete_request(&self, id: RequestId) -> Result<(), ServiceError> {
        self.store.delete_request(id).await?;
        info!("request {} deleted", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::model::request::{RequestKind, RequestStatus};
    use crate::server::store::memory::MemoryStore;
    use std::time::Duration;

    fn call(table: &str, kind: &str) -> PostRequestRequest {
        PostRequestRequest {
            restaurant_id: Some("r1".into()),
            table: Some(table.into()),
            kind: Some(kind.into()),
        }
    }

    fn service() -> (RequestService, Broadcaster) {
        let broadcaster = Broadcaster::new(16, Duration::from_secs(60));
        (RequestService::new(Arc::new(MemoryStore::new()), broadcaster.clone()), broadcaster)
    }

    #[tokio::test]
    async fn repeated_call_is_deduplicated() {
        let (requests, hub) = service();
        let mut display = hub.subscribe();
        let first = match requests.create_request(call("4", "bill")).await.unwrap() {
            RequestInsert::Created(r) => r,
            other => panic!("expected a new request, got {other:?}"),
        };
        assert_eq!(first.kind, RequestKind::Bill);
        assert_eq!(display.recv().await, Some(LiveEvent::RequestNew(first.clone())));

        let again = requests.create_request(call("4", "bill")).await.unwrap();
        assert_eq!(again, RequestInsert::AlreadyPending(first.clone()));
        assert_eq!(hub.publish(LiveEvent::RequestNew(first.clone())), 1);
        // the duplicate published nothing, so the next event is the probe above
        assert_eq!(display.recv().await, Some(LiveEvent::RequestNew(first)));
        assert_eq!(requests.list_requests(&RequestFilter::restaurant("r1")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn resolve_then_call_again() {
        let (requests, _) = service();
        let RequestInsert::Created(first) = requests.create_request(call("4", "waiter")).await.unwrap() else {
            panic!("expected a new request");
        };
        let resolved = requests.resolve_request(first.id).await.unwrap();
        assert_eq!(resolved.status, RequestStatus::Resolved);
        assert!(matches!(
            requests.create_request(call("4", "waiter")).await.unwrap(),
            RequestInsert::Created(_)
        ));
    }

    #[tokio::test]
    async fn unknown_type_is_rejected() {
        let (requests, _) = service();
        assert!(matches!(
            requests.create_request(call("4", "chef")).await,
            Err(ServiceError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn delete_removes_and_second_delete_is_not_found() {
        let (requests, _) = service();
        let RequestInsert::Created(first) = requests.create_request(call("4", "waiter")).await.unwrap() else {
            panic!("expected a new request");
        };
        requests.delete_request(first.id).await.unwrap();
        assert!(matches!(requests.delete_request(first.id).await, Err(ServiceError::NotFound { .. })));
        assert!(requests.list_requests(&RequestFilter::restaurant("r1")).await.unwrap().is_empty());
    }
}
