//! Order and service-request core of a table-ordering restaurant app.

pub mod server;
