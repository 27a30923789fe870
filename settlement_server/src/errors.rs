use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use settlement_engine::{records::ExportError, SettlementError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The gateway signature is invalid.")]
    Unauthenticated,
    #[error("Requests from this address are not accepted.")]
    ForbiddenPeer,
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The request conflicts with the current state. {0}")]
    Conflict(String),
    #[error("The database is temporarily unavailable. Try again later. {0}")]
    Unavailable(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::ForbiddenPeer => StatusCode::FORBIDDEN,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<SettlementError> for ServerError {
    fn from(e: SettlementError) -> Self {
        match e {
            SettlementError::Authenticity => Self::Unauthenticated,
            SettlementError::Validation(_) | SettlementError::UnrecognizedOrderFormat(_) => {
                Self::InvalidRequestBody(e.to_string())
            },
            SettlementError::ItemNotFound { .. }
            | SettlementError::BuyerNotFound(_)
            | SettlementError::PaymentNotFound(_) => Self::NoRecordFound(e.to_string()),
            SettlementError::InventoryExhausted(_) => Self::Conflict(e.to_string()),
            SettlementError::Transient(_) => Self::Unavailable(e.to_string()),
            SettlementError::BeneficiaryNotFound(_) | SettlementError::DatabaseError(_) => {
                Self::BackendError(e.to_string())
            },
        }
    }
}

impl From<ExportError> for ServerError {
    fn from(e: ExportError) -> Self {
        match e {
            ExportError::Write(_) => Self::BackendError(e.to_string()),
            _ => Self::InvalidRequestBody(e.to_string()),
        }
    }
}
