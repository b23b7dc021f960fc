use actix_web::{delete, get, patch, post, web, HttpResponse, Responder};

use crate::server::controller::error::ServiceError;
use crate::server::model::request::{
    DeleteRequestResponse, GetRequestsParams, GetRequestsResponse, PostRequestRequest, PostRequestResponse,
    RequestFilter, RequestId, RequestResponse,
};
use crate::server::state::AppState;
use crate::server::store::RequestInsert;

#[post("/v1/requests")]
/// call a waiter or ask for the bill
pub async fn post_request(req: web::Json<PostRequestRequest>, data: web::Data<AppState>) -> Result<impl Responder, ServiceError> {
    let (created, request) = match data.requests().create_request(req.into_inner()).await? {
        RequestInsert::Created(request) => (true, request),
        RequestInsert::AlreadyPending(request) => (false, request),
    };
    Ok(HttpResponse::Ok().json(PostRequestResponse { success: true, created, request }))
}

#[get("/v1/requests")]
pub async fn get_requests(params: web::Query<GetRequestsParams>, data: web::Data<AppState>) -> Result<impl Responder, ServiceError> {
    let filter = RequestFilter::try_from(params.into_inner())?;
    let requests = data.requests().list_requests(&filter).await?;
    Ok(HttpResponse::Ok().json(GetRequestsResponse { success: true, requests }))
}

#[patch("/v1/requests/{id}")]
/// mark a request as handled
pub async fn patch_request(id: web::Path<RequestId>, data: web::Data<AppState>) -> Result<impl Responder, ServiceError> {
    let request = data.requests().resolve_request(id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(RequestResponse { success: true, request }))
}

#[delete("/v1/requests/{id}")]
pub async fn delete_request(id: web::Path<RequestId>, data: web::Data<AppState>) -> Result<impl Responder, ServiceError> {
    data.requests().delete_request(id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(DeleteRequestResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::controller::test_util::{app, state};
    use crate::server::model::request::{RequestKind, RequestStatus};
    use actix_web::http::StatusCode;
    use actix_web::test;
    use serde_json::json;

    async fn stored(state: &AppState) -> usize {
        state.requests().list_requests(&RequestFilter::restaurant("r1")).await.unwrap().len()
    }

    #[actix_web::test]
    async fn second_call_returns_the_pending_request() {
        let state = state();
        let app = app!(state);
        let call = json!({"restaurantId": "r1", "table": "4", "type": "bill"});

        let req = test::TestRequest::post().uri("/v1/requests").set_json(&call).to_request();
        let first: PostRequestResponse = test::call_and_read_body_json(&app, req).await;
        assert!(first.created);
        assert_eq!(first.request.kind, RequestKind::Bill);

        let req = test::TestRequest::post().uri("/v1/requests").set_json(&call).to_request();
        let second: PostRequestResponse = test::call_and_read_body_json(&app, req).await;
        assert!(!second.created);
        assert_eq!(second.request, first.request);
        assert_eq!(stored(&state).await, 1);
    }

    #[actix_web::test]
    async fn missing_field_persists_nothing() {
        let state = state();
        let app = app!(state);
        for body in [
            json!({"table": "4", "type": "bill"}),
            json!({"restaurantId": "r1", "type": "bill"}),
            json!({"restaurantId": "r1", "table": "4"}),
        ] {
            let req = test::TestRequest::post().uri("/v1/requests").set_json(&body).to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
        }
        assert_eq!(stored(&state).await, 0);
    }

    #[actix_web::test]
    async fn resolving_unknown_id_leaves_others_alone() {
        let state = state();
        let app = app!(state);
        let req = test::TestRequest::post()
            .uri("/v1/requests")
            .set_json(json!({"restaurantId": "r1", "table": "4", "type": "waiter"}))
            .to_request();
        let created: PostRequestResponse = test::call_and_read_body_json(&app, req).await;

        let req = test::TestRequest::patch().uri("/v1/requests/999").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body, json!({"success": false, "message": "request 999 not found"}));

        let req = test::TestRequest::get().uri("/v1/requests?restaurantId=r1").to_request();
        let listed: GetRequestsResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(listed.requests, vec![created.request]);
    }

    #[actix_web::test]
    async fn resolve_and_delete() {
        let state = state();
        let app = app!(state);
        let req = test::TestRequest::post()
            .uri("/v1/requests")
            .set_json(json!({"restaurantId": "r1", "table": "4", "type": "waiter"}))
            .to_request();
        let created: PostRequestResponse = test::call_and_read_body_json(&app, req).await;
        let uri = format!("/v1/requests/{}", created.request.id);

        let req = test::TestRequest::patch().uri(&uri).to_request();
        let resolved: RequestResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resolved.request.status, RequestStatus::Resolved);

        let req = test::TestRequest::get().uri("/v1/requests?restaurantId=r1&status=pending").to_request();
        let pending: GetRequestsResponse = test::call_and_read_body_json(&app, req).await;
        assert!(pending.requests.is_empty());

        let req = test::TestRequest::delete().uri(&uri).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        let req = test::TestRequest::delete().uri(&uri).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::delete().uri("/v1/requests/abc").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn list_requires_restaurant() {
        let state = state();
        let app = app!(state);
        let req = test::TestRequest::get().uri("/v1/requests").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }
}
