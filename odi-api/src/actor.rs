use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use odi_core::identity::{Actor, Role};
use uuid::Uuid;

/// Caller identity asserted by the auth proxy in front of this service,
/// carried in `x-actor-id` and `x-actor-role` headers. Absent headers
/// mean an anonymous public rider.
pub struct Caller(pub Actor);

impl Caller {
    pub fn role(&self) -> Role {
        self.0.role
    }

    pub fn id(&self) -> Uuid {
        self.0.id
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let role = match parts.headers.get("x-actor-role") {
            Some(value) => {
                let raw = value.to_str().map_err(|_| {
                    (
                        StatusCode::BAD_REQUEST,
                        "invalid x-actor-role header".to_string(),
                    )
                })?;
                Role::parse(raw).ok_or_else(|| {
                    (
                        StatusCode::BAD_REQUEST,
                        format!("unknown actor role: {}", raw),
                    )
                })?
            }
            None => Role::Public,
        };

        let id = match parts.headers.get("x-actor-id") {
            Some(value) => {
                let raw = value.to_str().map_err(|_| {
                    (
                        StatusCode::BAD_REQUEST,
                        "invalid x-actor-id header".to_string(),
                    )
                })?;
                Uuid::parse_str(raw).map_err(|_| {
                    (
                        StatusCode::BAD_REQUEST,
                        "x-actor-id must be a UUID".to_string(),
                    )
                })?
            }
            None => Uuid::nil(),
        };

        Ok(Caller(Actor::new(id, role)))
    }
}
