use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use loyalty_engine::{AccountApiError, OrderFlowError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("No user id was supplied with the request")]
    MissingUserId,
    #[error("The user id is not valid. {0}")]
    InvalidUserId(String),
    #[error("The request body is empty")]
    EmptyRequestBody,
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Invalid order number. {0}")]
    InvalidOrderNumber(String),
    #[error("Invalid amount. {0}")]
    InvalidAmount(String),
    #[error("{0}")]
    OrderConflict(String),
    #[error("{0}")]
    InsufficientFunds(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingUserId => StatusCode::UNAUTHORIZED,
            Self::InvalidUserId(_) => StatusCode::UNAUTHORIZED,
            Self::EmptyRequestBody => StatusCode::BAD_REQUEST,
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidOrderNumber(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidAmount(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::OrderConflict(_) => StatusCode::CONFLICT,
            Self::InsufficientFunds(_) => StatusCode::PAYMENT_REQUIRED,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<OrderFlowError> for ServerError {
    fn from(e: OrderFlowError) -> Self {
        match e {
            OrderFlowError::InvalidOrderId(e) => Self::InvalidOrderNumber(e.to_string()),
            OrderFlowError::AlreadySubmitted(_) | OrderFlowError::OwnedByAnotherUser(_) => {
                Self::OrderConflict(e.to_string())
            },
            OrderFlowError::DatabaseError(e) => Self::BackendError(format!("Database error: {e}")),
        }
    }
}

impl From<AccountApiError> for ServerError {
    fn from(e: AccountApiError) -> Self {
        match e {
            AccountApiError::InvalidOrderId(e) => Self::InvalidOrderNumber(e.to_string()),
            AccountApiError::InvalidAmount(s) => Self::InvalidAmount(s),
            AccountApiError::InsufficientFunds { .. } => Self::InsufficientFunds(e.to_string()),
            AccountApiError::DatabaseError(e) => Self::BackendError(format!("Database error: {e}")),
        }
    }
}
