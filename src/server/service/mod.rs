pub mod billing;
pub mod broadcast;
pub mod orders;
pub mod requests;
pub mod session;
pub mod stats;
pub mod status;
