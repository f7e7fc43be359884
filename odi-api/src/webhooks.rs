use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use crate::state::AppState;
use odi_core::payment::GatewayStatus;
use odi_core::BookingFlowError;

#[derive(Debug, Deserialize)]
pub struct GatewayWebhook {
    pub transaction_id: String,
    pub status: GatewayStatus,
}

/// POST /v1/webhooks/payments/gateway
/// Receive payment status updates from the gateway
pub async fn handle_gateway_webhook(
    State(state): State<AppState>,
    Json(payload): Json<GatewayWebhook>,
) -> Result<StatusCode, StatusCode> {
    tracing::info!(
        transaction_id = %payload.transaction_id,
        status = ?payload.status,
        "received gateway webhook"
    );

    match state
        .booking_service
        .handle_gateway_callback(&payload.transaction_id, payload.status)
        .await
    {
        Ok(_) => Ok(StatusCode::OK),
        // Unknown transaction ids are acknowledged so the gateway stops retrying.
        Err(BookingFlowError::NotFound(_)) => Ok(StatusCode::OK),
        Err(BookingFlowError::Validation(_)) => Ok(StatusCode::OK),
        Err(err) => {
            tracing::error!(error = %err, "webhook processing failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
