use actix_web::http::StatusCode;
use actix_web::{error, HttpResponse};
use derive_more::{Display, Error};
use serde::Serialize;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[display("{message}")]
    Validation { message: String },
    #[display("{message}")]
    NotFound { message: String },
    #[display("store unavailable: {message}")]
    StoreUnavailable { message: String },
    #[display("timeout occurred")]
    Timeout,
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound { message: message.into() }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable { message: message.into() }
    }
}

impl From<tokio_postgres::Error> for ServiceError {
    fn from(e: tokio_postgres::Error) -> Self {
        Self::unavailable(e.to_string())
    }
}

/// uniform failure body
#[derive(Debug, Serialize)]
pub(crate) struct FailureResponse {
    pub success: bool,
    pub message: String,
}

impl error::ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match *self {
            ServiceError::Validation { .. } => StatusCode::BAD_REQUEST,
            ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
            ServiceError::StoreUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(FailureResponse {
            success: false,
            message: self.to_string(),
        })
    }
}
