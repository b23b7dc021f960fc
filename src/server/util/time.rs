use chrono::{DateTime, Utc};

/// Clock used for every timestamp the server stamps itself.
/// Tests swap it for a settable thread-local clock.
pub mod helper {
    #[cfg(not(test))]
    pub use super::get_utc_now;
    #[cfg(test)]
    pub use super::mock_chrono::{get_utc_now, set_mock_now};
}


#[cfg(not(test))]
pub fn get_utc_now() -> DateTime<Utc> {
    Utc::now()
}
