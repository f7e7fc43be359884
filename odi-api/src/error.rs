use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use odi_core::{BookingFlowError, CreditFault};
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    Flow(BookingFlowError),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, retryable) = match self {
            AppError::Flow(err) => {
                let retryable = err.payment_retryable();
                let status = match &err {
                    BookingFlowError::Validation(_) => StatusCode::BAD_REQUEST,
                    BookingFlowError::Conflict(_) => StatusCode::CONFLICT,
                    BookingFlowError::Credit(CreditFault::InsufficientCredit { .. }) => {
                        StatusCode::PAYMENT_REQUIRED
                    }
                    BookingFlowError::Credit(_) => StatusCode::CONFLICT,
                    BookingFlowError::NotFound(_) => StatusCode::NOT_FOUND,
                    BookingFlowError::ExternalService(_) => StatusCode::BAD_GATEWAY,
                    BookingFlowError::Persistence(_) | BookingFlowError::Internal(_) => {
                        tracing::error!("Internal Server Error: {}", err);
                        return (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            Json(json!({ "error": "Internal Server Error" })),
                        )
                            .into_response();
                    }
                };
                (status, err.to_string(), retryable)
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                    false,
                )
            }
        };

        let body = if retryable {
            Json(json!({ "error": message, "payment_retryable": true }))
        } else {
            Json(json!({ "error": message }))
        };
        (status, body).into_response()
    }
}

impl From<BookingFlowError> for AppError {
    fn from(err: BookingFlowError) -> Self {
        AppError::Flow(err)
    }
}

impl From<odi_credit::CreditError> for AppError {
    fn from(err: odi_credit::CreditError) -> Self {
        AppError::Flow(err.into())
    }
}

impl From<odi_credit::WorkflowError> for AppError {
    fn from(err: odi_credit::WorkflowError) -> Self {
        AppError::Flow(err.into())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Anyhow(err)
    }
}

impl From<odi_core::BoxError> for AppError {
    fn from(err: odi_core::BoxError) -> Self {
        AppError::Flow(BookingFlowError::storage(err))
    }
}
