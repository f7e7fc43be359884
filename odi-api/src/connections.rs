use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::actor::Caller;
use crate::error::AppError;
use crate::state::AppState;
use odi_core::identity::Role;
use odi_core::BookingFlowError;
use odi_credit::models::{AgentOwnerConnection, CreditTransaction};
use odi_credit::repository::CreditRepository;
use odi_shared::events::BookingEvent;
use odi_shared::Laari;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/connections", post(request_connection))
        .route("/v1/connections/{id}/respond", post(respond_to_request))
        .route("/v1/agents/{id}/connections", get(agent_connections))
        .route(
            "/v1/connections/{id}/credit-history",
            get(credit_history),
        )
}

#[derive(Debug, Deserialize)]
struct ConnectionRequestBody {
    owner_id: Uuid,
    requested_limit: Laari,
    message: Option<String>,
}

async fn request_connection(
    State(state): State<AppState>,
    caller: Caller,
    Json(body): Json<ConnectionRequestBody>,
) -> Result<(StatusCode, Json<AgentOwnerConnection>), AppError> {
    if caller.role() != Role::Agent {
        return Err(BookingFlowError::Validation(
            "only agents may request a credit connection".to_string(),
        )
        .into());
    }
    let connection = state
        .connections
        .request(
            caller.id(),
            body.owner_id,
            body.requested_limit,
            body.message,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(connection)))
}

#[derive(Debug, Deserialize)]
struct RespondBody {
    approve: bool,
    credit_limit: Option<Laari>,
}

async fn respond_to_request(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(body): Json<RespondBody>,
) -> Result<Json<AgentOwnerConnection>, AppError> {
    let existing = state
        .credit
        .get_connection(id)
        .await?
        .ok_or_else(|| BookingFlowError::NotFound(format!("connection {}", id)))?;
    if caller.role() != Role::Admin && caller.id() != existing.owner_id {
        return Err(BookingFlowError::Validation(
            "only the owner of the credit line may respond".to_string(),
        )
        .into());
    }

    let connection = state
        .connections
        .respond(id, body.approve, body.credit_limit)
        .await?;

    if body.approve {
        let _ = state.events.send(BookingEvent::ConnectionApproved {
            connection_id: connection.id,
            agent_id: connection.agent_id,
            owner_id: connection.owner_id,
            credit_limit: connection.credit_limit,
            occurred_at: Utc::now(),
        });
    }
    Ok(Json(connection))
}

async fn agent_connections(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<AgentOwnerConnection>>, AppError> {
    Ok(Json(state.connections.connections_for_agent(id).await?))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

async fn credit_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<CreditTransaction>>, AppError> {
    state
        .credit
        .get_connection(id)
        .await?
        .ok_or_else(|| BookingFlowError::NotFound(format!("connection {}", id)))?;
    Ok(Json(state.ledger.history(id, query.limit).await?))
}
