use actix_web::http::header::ContentType;
use actix_web::{get, web, HttpResponse, Responder};

use crate::server::controller::error::ServiceError;
use crate::server::model::bill::GetBillResponse;
use crate::server::model::table::{GetSessionResponse, GetSessionsResponse, TableParams};
use crate::server::service::billing::render_receipt;
use crate::server::service::stats::GetStatsResponse;
use crate::server::state::AppState;

#[get("/v1/tables/{table}/session")]
/// main order and add-ons of one table
pub async fn get_session(
    table: web::Path<String>,
    params: web::Query<TableParams>,
    data: web::Data<AppState>,
) -> Result<impl Responder, ServiceError> {
    let session = data.orders().table_session(params.into_inner().restaurant_id, &table).await?;
    Ok(HttpResponse::Ok().json(GetSessionResponse { success: true, session }))
}

#[get("/v1/sessions")]
/// every table with unpaid orders, for the kitchen board
pub async fn get_sessions(params: web::Query<TableParams>, data: web::Data<AppState>) -> Result<impl Responder, ServiceError> {
    let sessions = data.orders().sessions(params.into_inner().restaurant_id).await?;
    Ok(HttpResponse::Ok().json(GetSessionsResponse { success: true, sessions }))
}

#[get("/v1/tables/{table}/bill")]
pub async fn get_bill(
    table: web::Path<String>,
    params: web::Query<TableParams>,
    data: web::Data<AppState>,
) -> Result<impl Responder, ServiceError> {
    let bill = data.orders().bill(params.into_inner().restaurant_id, &table).await?;
    Ok(HttpResponse::Ok().json(GetBillResponse { success: true, bill }))
}

#[get("/v1/tables/{table}/bill/print")]
/// plain-text receipt for the staff printer
pub async fn print_bill(
    table: web::Path<String>,
    params: web::Query<TableParams>,
    data: web::Data<AppState>,
) -> Result<impl Responder, ServiceError> {
    let bill = data.orders().bill(params.into_inner().restaurant_id, &table).await?;
    Ok(HttpResponse::Ok()
        .content_type(ContentType::plaintext())
        .body(render_receipt(&bill)))
}

#[get("/v1/stats")]
pub async fn get_stats(params: web::Query<TableParams>, data: web::Data<AppState>) -> Result<impl Responder, ServiceError> {
    let stats = data.orders().stats(params.into_inner().restaurant_id).await?;
    Ok(HttpResponse::Ok().json(GetStatsResponse { success: true, stats }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::controller::test_util::{app, state};
    use crate::server::model::bill::BillLine;
    use crate::server::model::money::Money;
    use crate::server::model::order::PostOrderRequest;
    use crate::server::util::time::helper::set_mock_now;
    use actix_web::test;
    use serde_json::json;

    async fn place(state: &AppState, restaurant: &str, table: &str, items: serde_json::Value) {
        let request: PostOrderRequest =
            serde_json::from_value(json!({"restaurantId": restaurant, "table": table, "items": items})).unwrap();
        state.orders().create_order(request).await.unwrap();
    }

    #[actix_web::test]
    async fn reorders_share_one_bill_line() {
        let state = state();
        place(&state, "r1", "9", json!([{"name": "A", "quantity": 1, "price": 50}])).await;
        place(&state, "r1", "9", json!([{"name": "A", "quantity": 2, "price": 50}])).await;
        let app = app!(state);

        let req = test::TestRequest::get().uri("/v1/tables/9/bill").to_request();
        let res: GetBillResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(
            res.bill.lines,
            vec![BillLine { name: "A".into(), price: Money::from_units(50), quantity: 3, total: Money::from_units(150) }]
        );
        assert_eq!(res.bill.total, Money::from_units(150));

        let req = test::TestRequest::get().uri("/v1/tables/9/bill/print").to_request();
        let receipt = test::call_and_read_body(&app, req).await;
        let receipt = String::from_utf8(receipt.to_vec()).unwrap();
        assert!(receipt.starts_with("Bill - Table 9"));
        assert!(receipt.contains("Total Amount"));
    }

    #[actix_web::test]
    async fn session_marks_the_oldest_order_main() {
        let state = state();
        set_mock_now(100);
        place(&state, "r1", "3", json!([{"name": "Tea", "quantity": 1, "price": 10}])).await;
        set_mock_now(200);
        place(&state, "r1", "3", json!([{"name": "Cake", "quantity": 1, "price": 30}])).await;
        place(&state, "r2", "3", json!([{"name": "Tea", "quantity": 1, "price": 10}])).await;
        let app = app!(state);

        let req = test::TestRequest::get().uri("/v1/tables/3/session?restaurantId=r1").to_request();
        let res: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(res["session"]["hasMainOrder"], json!(true));
        assert_eq!(res["session"]["main"]["items"][0]["name"], json!("Tea"));
        assert_eq!(res["session"]["addOns"].as_array().map(Vec::len), Some(1));

        let req = test::TestRequest::get().uri("/v1/tables/8/session").to_request();
        let res: GetSessionResponse = test::call_and_read_body_json(&app, req).await;
        assert!(!res.session.has_main_order);

        let req = test::TestRequest::get().uri("/v1/sessions").to_request();
        let res: GetSessionsResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(res.sessions.len(), 2);
        assert_eq!(res.sessions[0].restaurant_id.as_deref(), Some("r1"));
        assert_eq!(res.sessions[0].orders().count(), 2);
        assert_eq!(res.sessions[1].orders().count(), 1);

        let req = test::TestRequest::get().uri("/v1/sessions?restaurantId=r2").to_request();
        let res: GetSessionsResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(res.sessions.len(), 1);
        assert_eq!(res.sessions[0].restaurant_id.as_deref(), Some("r2"));
    }

    #[actix_web::test]
    async fn stats_are_scoped_by_restaurant() {
        let state = state();
        place(&state, "r1", "1", json!([{"name": "Tea", "quantity": 2, "price": 10}])).await;
        place(&state, "r2", "1", json!([{"name": "Tea", "quantity": 1, "price": 10}])).await;
        let app = app!(state);

        let req = test::TestRequest::get().uri("/v1/stats?restaurantId=r1").to_request();
        let res: GetStatsResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(res.stats.outstanding, Money::from_units(20));
        assert_eq!(res.stats.active_tables, 1);
        assert_eq!(res.stats.paid_orders, 0);
    }
}
