pub mod error;
pub mod events;
pub mod orders;
pub mod requests;
pub mod tables;

use actix_web::web;
use log::warn;

use crate::server::controller::error::ServiceError;

/// Register every route plus extractor configs that turn malformed input
/// into the uniform failure body.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        warn!("malformed json body, {}", err);
        ServiceError::validation(err.to_string()).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        warn!("malformed query string, {}", err);
        ServiceError::validation(err.to_string()).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _req| {
        warn!("malformed path, {}", err);
        ServiceError::validation(err.to_string()).into()
    }))
    .service(orders::post_order)
    .service(orders::get_orders)
    .service(orders::patch_orders)
    .service(requests::post_request)
    .service(requests::get_requests)
    .service(requests::patch_request)
    .service(requests::delete_request)
    .service(tables::get_session)
    .service(tables::get_sessions)
    .service(tables::get_bill)
    .service(tables::print_bill)
    .service(tables::get_stats)
    .service(events::get_events);
}
