use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Error;
use log::{error, info, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time;
use tokio_postgres::{Client, NoTls};

use crate::server::controller::error::ServiceError;
use crate::server::database::connection::Connection;

struct CommonPool {
    /// pool name, for logs
    name: String,
    conn_str: String,
    /// idle connections, accessed in a FIFO manner
    connections: Mutex<VecDeque<Client>>,
    /// one permit per idle connection
    available: Arc<Semaphore>,
}

/// Fixed-size tokio-postgres connection pool.
#[derive(Clone)]
pub struct Pool(Arc<CommonPool>);

pub(crate) mod connect_util {
    use super::*;

    pub async fn connect(conn_str: &str) -> Result<Client, tokio_postgres::Error> {
        let (client, conn) = tokio_postgres::connect(conn_str, NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                error!("connection returned error and aborted, {}", e);
            }
        });
        Ok(client)
    }
}

impl Pool {
    pub const DEFAULT_SIZE: usize = 10;

    pub fn new(name: impl Into<String>, conn_str: impl Into<String>) -> Self {
        Self(Arc::new(CommonPool {
            name: name.into(),
            conn_str: conn_str.into(),
            connections: Mutex::new(VecDeque::with_capacity(Self::DEFAULT_SIZE)),
            available: Arc::new(Semaphore::new(0)),
        }))
    }

    /// open `size` connections concurrently; fails only if none could be opened
    pub async fn init(&self, size: usize) -> Result<(), Error> {
        let mut set = JoinSet::new();
        for _ in 0..size {
            let conn_str = self.0.conn_str.clone();
            set.spawn(async move { connect_util::connect(&conn_str).await });
        }
        let mut opened = 0;
        while let Some(res) = set.join_next().await {
            match res {
                Ok(Ok(client)) => {
                    self.push(client);
                    opened += 1;
                }
                Ok(Err(e)) => error!("pool {} failed to connect, {}", self.0.name, e),
                Err(e) => error!("join_next failed when joining, {}", e),
            }
        }
        if opened == 0 {
            return Err(Error::msg(format!("pool {} could not open any connection", self.0.name)));
        }
        info!("pool {} ready with {}/{} connection(s)", self.0.name, opened, size);
        Ok(())
    }

    /// acquire a connection, waiting up to `timeout` for one to free up
    pub async fn acquire(&self, timeout: Duration) -> Result<Connection, ServiceError> {
        let permit = match time::timeout(timeout, self.0.available.clone().acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(ServiceError::unavailable(format!("pool {} is closed", self.0.name))),
            Err(_) => {
                warn!("timed out to acquire a connection from pool {} after {:?}", self.0.name, timeout);
                return Err(ServiceError::unavailable("server is busy"));
            }
        };
        // a permit without an idle client, or a client the server has dropped, gets a fresh connection
        let client = match self.pop() {
            Some(client) if !client.is_closed() => client,
            stale => {
                warn!("pool {} is reconnecting a slot", self.0.name);
                match connect_util::connect(&self.0.conn_str).await {
                    Ok(fresh) => fresh,
                    Err(e) => {
                        if let Some(client) = stale {
                            self.push_idle(client);
                        }
                        error!("pool {} failed to reconnect, {}", self.0.name, e);
                        return Err(ServiceError::from(e));
                    }
                }
            }
        };
        Ok(Connection::new(client, self.clone(), permit))
    }

    pub fn release(&self, client: Client) {
        self.push_idle(client);
    }

    fn push(&self, client: Client) {
        self.push_idle(client);
        self.0.available.add_permits(1);
    }

    /// the caller's permit, dropped right after, makes the slot available
    fn push_idle(&self, client: Client) {
        let mut connections = self.0.connections.lock().unwrap_or_else(|p| p.into_inner());
        connections.push_back(client);
    }

    fn pop(&self) -> Option<Client> {
        let mut connections = self.0.connections.lock().unwrap_or_else(|p| p.into_inner());
        connections.pop_front()
    }

}
