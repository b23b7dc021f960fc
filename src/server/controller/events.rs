use std::convert::Infallible;

use actix_web::http::header;
use actix_web::web::Bytes;
use actix_web::{get, web, HttpResponse};
use futures_util::{future, stream, StreamExt};
use log::info;

use crate::server::model::event::ready_frame;
use crate::server::state::AppState;

#[get("/v1/events")]
/// Live push for kitchen and admin displays. Nothing is replayed, so a display
/// refetches its lists whenever this stream (re)connects.
pub async fn get_events(data: web::Data<AppState>) -> HttpResponse {
    let subscription = data.broadcaster().subscribe();
    info!("display attached, {} subscriber(s)", data.broadcaster().subscriber_count());

    let frames = stream::once(future::ready(ready_frame())).chain(stream::unfold(subscription, |mut sub| async move {
        sub.next_frame().await.map(|frame| (frame, sub))
    }));

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(frames.map(Ok::<Bytes, Infallible>))
}
