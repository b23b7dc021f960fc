pub mod bill;
pub mod config;
pub mod event;
pub mod item;
pub mod money;
pub mod order;
pub mod request;
pub mod table;
