use actix_web::{get, patch, post, web, HttpRequest, HttpResponse, Responder};

use crate::server::controller::error::ServiceError;
use crate::server::model::order::{
    GetOrdersParams, GetOrdersResponse, OrderFilter, OrderStatus, PatchOrdersRequest, PatchOrdersResponse,
    PostOrderRequest, PostOrderResponse,
};
use crate::server::state::AppState;

/// Restaurant scope of the caller, when the front end forwards one.
pub const RESTAURANT_HEADER: &str = "X-Restaurant-Id";

#[post("/v1/orders")]
/// place an order
pub async fn post_order(req: web::Json<PostOrderRequest>, data: web::Data<AppState>) -> Result<impl Responder, ServiceError> {
    let order = data.orders().create_order(req.into_inner()).await?;
    Ok(HttpResponse::Ok().json(PostOrderResponse { success: true, order }))
}

#[get("/v1/orders")]
/// list orders, newest first
pub async fn get_orders(
    req: HttpRequest,
    params: web::Query<GetOrdersParams>,
    data: web::Data<AppState>,
) -> Result<impl Responder, ServiceError> {
    let restaurant_id = match req.headers().get(RESTAURANT_HEADER) {
        Some(value) => Some(
            value
                .to_str()
                .map_err(|_| ServiceError::validation(format!("invalid {RESTAURANT_HEADER} header")))?
                .to_string(),
        ),
        None => None,
    };
    let GetOrdersParams { table, status, active } = params.into_inner();
    let filter = OrderFilter {
        restaurant_id,
        table,
        status: status.map(|s| s.parse::<OrderStatus>()).transpose()?,
        active_only: active.unwrap_or(false),
    };
    let orders = data.orders().list_orders(&filter).await?;
    Ok(HttpResponse::Ok().json(GetOrdersResponse { success: true, orders }))
}

#[patch("/v1/orders")]
/// move orders along pending -> served -> paid
pub async fn patch_orders(req: web::Json<PatchOrdersRequest>, data: web::Data<AppState>) -> Result<impl Responder, ServiceError> {
    let PatchOrdersRequest { ids, status } = req.into_inner();
    let status = status.ok_or_else(|| ServiceError::validation("missing field status"))?;
    let update = data
        .orders()
        .bulk_update_status(&ids.unwrap_or_default(), &status)
        .await?;
    Ok(HttpResponse::Ok().json(PatchOrdersResponse { success: true, update }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::controller::test_util::{app, state};
    use crate::server::model::bill::GetBillResponse;
    use crate::server::model::money::Money;
    use crate::server::model::order::Order;
    use actix_web::http::StatusCode;
    use actix_web::test;
    use serde_json::json;

    #[actix_web::test]
    async fn order_lifecycle_empties_the_bill() {
        let state = state();
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/v1/orders")
            .set_json(json!({"restaurantId": "r1", "table": "5", "items": [{"name": "Soup", "quantity": 2, "price": 100}]}))
            .to_request();
        let placed: PostOrderResponse = test::call_and_read_body_json(&app, req).await;
        assert!(placed.success);
        assert_eq!(placed.order.status, OrderStatus::Pending);
        let id = placed.order.id;

        for (status, expected) in [("served", OrderStatus::Served), ("paid", OrderStatus::Paid)] {
            let req = test::TestRequest::patch()
                .uri("/v1/orders")
                .set_json(json!({"ids": [id], "status": status}))
                .to_request();
            let patched: PatchOrdersResponse = test::call_and_read_body_json(&app, req).await;
            assert_eq!(patched.update.updated, 1);

            let req = test::TestRequest::get().uri("/v1/orders").to_request();
            let listed: GetOrdersResponse = test::call_and_read_body_json(&app, req).await;
            let order: &Order = &listed.orders[0];
            assert_eq!(order.status, expected);
            assert!(order.served_at.is_some());
        }

        let req = test::TestRequest::get().uri("/v1/tables/5/bill").to_request();
        let bill: GetBillResponse = test::call_and_read_body_json(&app, req).await;
        assert!(bill.bill.lines.is_empty());
        assert_eq!(bill.bill.total, Money::ZERO);
    }

    #[actix_web::test]
    async fn price_may_arrive_as_text() {
        let state = state();
        let app = app!(state);
        let req = test::TestRequest::post()
            .uri("/v1/orders")
            .set_json(json!({"restaurantId": "r1", "table": "2", "items": [{"name": "Tea", "quantity": 1, "price": "40"}]}))
            .to_request();
        let placed: PostOrderResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(placed.order.items[0].price, Money::from_units(40));
    }

    #[actix_web::test]
    async fn decimal_prices_keep_their_cents() {
        let state = state();
        let app = app!(state);
        let req = test::TestRequest::post()
            .uri("/v1/orders")
            .set_json(json!({"restaurantId": "r1", "table": "3", "items": [
                {"name": "Tea", "quantity": 2, "price": 12.5},
                {"name": "Tea", "quantity": 1, "price": "12.50"},
                {"name": "Thali", "quantity": 1, "price": 100.0},
            ]}))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let placed: PostOrderResponse = test::read_body_json(res).await;
        let prices: Vec<u64> = placed.order.items.iter().map(|i| i.price.cents()).collect();
        assert_eq!(prices, vec![1250, 1250, 10_000]);

        let req = test::TestRequest::get().uri("/v1/tables/3/bill").to_request();
        let bill: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(bill["bill"]["lines"][0], json!({"name": "Tea", "price": 12.5, "quantity": 3, "total": 37.5}));
        assert_eq!(bill["bill"]["total"], json!(137.5));

        let req = test::TestRequest::post()
            .uri("/v1/orders")
            .set_json(json!({"restaurantId": "r1", "table": "3", "items": [{"name": "Tea", "quantity": 1, "price": 1.005}]}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn list_is_scoped_and_filtered() {
        let state = state();
        let app = app!(state);
        for (restaurant, table) in [("r1", "1"), ("r1", "2"), ("r2", "1")] {
            let req = test::TestRequest::post()
                .uri("/v1/orders")
                .set_json(json!({"restaurantId": restaurant, "table": table, "items": [{"name": "Tea", "quantity": 1, "price": 10}]}))
                .to_request();
            assert!(test::call_service(&app, req).await.status().is_success());
        }

        let req = test::TestRequest::get().uri("/v1/orders").to_request();
        let all: GetOrdersResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(all.orders.len(), 3);

        let req = test::TestRequest::get()
            .uri("/v1/orders?table=1&active=true")
            .insert_header((RESTAURANT_HEADER, "r1"))
            .to_request();
        let scoped: GetOrdersResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(scoped.orders.len(), 1);
        assert_eq!((scoped.orders[0].restaurant_id.as_str(), scoped.orders[0].table.as_str()), ("r1", "1"));

        let req = test::TestRequest::get().uri("/v1/orders?status=paid").to_request();
        let paid: GetOrdersResponse = test::call_and_read_body_json(&app, req).await;
        assert!(paid.orders.is_empty());
    }

    #[actix_web::test]
    async fn bad_input_gets_uniform_failure() {
        let state = state();
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/v1/orders")
            .set_json(json!({"restaurantId": "r1", "table": "5", "items": []}))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["message"], json!("items must be a non-empty list"));

        let req = test::TestRequest::post()
            .uri("/v1/orders")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["success"], json!(false));

        let req = test::TestRequest::get().uri("/v1/orders?status=cooking").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::patch()
            .uri("/v1/orders")
            .set_json(json!({"ids": [77], "status": "served"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
