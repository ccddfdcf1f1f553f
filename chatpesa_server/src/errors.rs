use std::time::Duration;

use actix_web::{
    error::ResponseError,
    http::{header, header::ContentType, StatusCode},
    HttpResponse,
};
use chatpesa_engine::{LedgerError, QueryApiError, DEFAULT_RETRY_AFTER};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("{0}")]
    Ledger(#[from] LedgerError),
    #[error("{0}")]
    Query(#[from] QueryApiError),
}

impl ServerError {
    /// The name of the error in the ledger's taxonomy. Clients branch on this rather than on the message.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequestBody(_) | Self::InvalidQuery(_) => "InvalidRequest",
            Self::Ledger(e) => match e {
                LedgerError::InvalidRequest(_) => "InvalidRequest",
                LedgerError::InvalidTransition { .. } => "InvalidTransition",
                LedgerError::OrderNotFound(_) => "OrderNotFound",
                LedgerError::ConflictingPayment { .. } => "ConflictingPayment",
                LedgerError::UnmatchedPayment { .. } => "UnmatchedPayment",
                LedgerError::WriteConflict { .. } => "WriteConflict",
                LedgerError::StoreUnavailable { .. } => "StoreUnavailable",
                LedgerError::StoreFault(_) => "StoreFault",
            },
            Self::Query(e) => match e {
                QueryApiError::QueryError(_) => "InvalidRequest",
                QueryApiError::StoreUnavailable { .. } => "StoreUnavailable",
                QueryApiError::StoreFault(_) => "StoreFault",
            },
            _ => "InternalError",
        }
    }

    /// How long the client should wait before retrying, for transient failures only.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Ledger(LedgerError::StoreUnavailable { retry_after, .. }) => Some(*retry_after),
            Self::Query(QueryApiError::StoreUnavailable { retry_after, .. }) => Some(*retry_after),
            Self::Ledger(LedgerError::WriteConflict { .. }) => Some(DEFAULT_RETRY_AFTER),
            _ => None,
        }
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Self::Ledger(e) => match e {
                LedgerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                LedgerError::InvalidTransition { .. } => StatusCode::CONFLICT,
                LedgerError::OrderNotFound(_) => StatusCode::NOT_FOUND,
                LedgerError::ConflictingPayment { .. } => StatusCode::CONFLICT,
                LedgerError::UnmatchedPayment { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                LedgerError::WriteConflict { .. } => StatusCode::SERVICE_UNAVAILABLE,
                LedgerError::StoreUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                LedgerError::StoreFault(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Query(e) => match e {
                QueryApiError::QueryError(_) => StatusCode::BAD_REQUEST,
                QueryApiError::StoreUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                QueryApiError::StoreFault(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut response = HttpResponse::build(self.status_code());
        response.insert_header(ContentType::json());
        let body = match self.retry_after() {
            Some(delay) => {
                // Retry-After is in whole seconds, and zero would invite a tight retry loop
                let secs = delay.as_secs().max(1);
                response.insert_header((header::RETRY_AFTER, secs.to_string()));
                json!({ "error": self.to_string(), "code": self.code(), "retryAfter": secs })
            },
            None => json!({ "error": self.to_string(), "code": self.code() }),
        };
        response.body(body.to_string())
    }
}
