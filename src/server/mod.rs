//! main file for the server

pub mod controller;
pub mod database;
pub mod model;
pub mod scheduler;
pub mod service;
pub mod state;
pub mod store;
pub mod util;

use std::io;
use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use log::{error, info};
use tokio_util::sync::CancellationToken;

use crate::server::model::config::{ServerConfig, StoreBackend};
use crate::server::scheduler::job::request_sweeper;
use crate::server::service::broadcast::Broadcaster;
use crate::server::state::AppState;
use crate::server::store::memory::MemoryStore;
use crate::server::store::postgres::PgStore;
use crate::server::store::{OrderStore, RequestStore};

/// Run the server until SIGINT.
pub async fn run(config: ServerConfig) -> io::Result<()> {
    let (order_store, request_store): (Arc<dyn OrderStore>, Arc<dyn RequestStore>) = match config.backend {
        StoreBackend::Postgres => {
            let store = PgStore::connect(
                &config.db_read_conn_str,
                &config.db_write_conn_str,
                config.db_pool_size,
                config.db_timeout,
            )
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("failed to init db pools, {e}")))?;
            let store = Arc::new(store);
            (store.clone(), store)
        }
        StoreBackend::Memory => {
            let store = Arc::new(MemoryStore::new());
            (store.clone(), store)
        }
    };
    info!("using {} store", config.backend);

    let broadcaster = Broadcaster::new(config.event_channel_capacity, config.event_keepalive);
    let state = AppState::new(order_store, request_store.clone(), broadcaster.clone());

    let cancel_token = CancellationToken::new();
    let sweeper = config
        .request_retention
        .map(|retention| tokio::spawn(request_sweeper(request_store, retention, cancel_token.clone())));

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(controller::configure)
    })
    .disable_signals()
    .bind(config.addr)?
    .run();

    let handle = server.handle();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for shutdown signal, {}", e);
            return;
        }
        info!("shutting down");
        // close event streams first so the server is not held open by them
        broadcaster.shutdown();
        shutdown_token.cancel();
        handle.stop(true).await;
    });

    info!("listening on {}", config.addr);
    let result = server.await;
    cancel_token.cancel();
    if let Some(sweeper) = sweeper {
        if let Err(e) = sweeper.await {
            error!("sweeper task failed, {}", e);
        }
    }
    result
}
