pub mod connection;
pub mod pool;
