use std::ops::{Deref, DerefMut};

use tokio::sync::OwnedSemaphorePermit;
use tokio_postgres::Client;

use crate::server::database::pool::Pool;

/// A client checked out of a [`Pool`]. Goes back to the pool on drop.
pub struct Connection {
    pub(crate) client: Option<Client>,
    pub(crate) pool: Pool,
    _permit: OwnedSemaphorePermit,
}

impl Connection {
    pub(crate) fn new(client: Client, pool: Pool, permit: OwnedSemaphorePermit) -> Self {
        Self {
            client: Some(client),
            pool,
            _permit: permit,
        }
    }
}

impl Deref for Connection {
    type Target = Client;

    fn deref(&self) -> &Self::Target {
        // only taken in drop
        self.client.as_ref().expect("connection used after release")
    }
}

impl DerefMut for Connection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.client.as_mut().expect("connection used after release")
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            self.pool.release(client);
        }
    }
}
