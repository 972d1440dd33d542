//! HTTP API handlers exposing the matchmaking calls as JSON endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::MatchError;
use crate::matchmaking::{JoinOutcome, MatchStats, Matchmaker, PollOutcome};
use crate::models::{Identity, Token};

#[derive(Clone)]
pub struct ApiState {
    pub matchmaker: Arc<Matchmaker>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/status", get(handle_status))
        .route("/matchmaking/join", post(handle_join))
        .route("/matchmaking/poll", post(handle_poll))
        .route("/matchmaking/release", post(handle_release))
        .route("/matchmaking/leave", post(handle_leave))
        .route("/game/end", post(handle_end_game))
        .with_state(state)
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn api_error(err: MatchError) -> ApiError {
    let status = match err {
        MatchError::CapacityExceeded { .. } | MatchError::LockTimeout(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        MatchError::InvalidIdentity(_) | MatchError::InvalidToken => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn not_found(what: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: what.to_string(),
        }),
    )
}

#[derive(Debug, Deserialize)]
pub struct IdentityRequest {
    pub identity: String,
}

impl IdentityRequest {
    fn identity(&self) -> Result<Identity, ApiError> {
        Identity::new(&self.identity).map_err(api_error)
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PollResponse {
    Matched { token: String },
    Pending { status: &'static str },
}

// ── /status ──────────────────────────────────────────────────────────────────

pub async fn handle_status(State(state): State<ApiState>) -> Result<Json<MatchStats>, ApiError> {
    state.matchmaker.stats().await.map(Json).map_err(api_error)
}

// ── /matchmaking ─────────────────────────────────────────────────────────────

pub async fn handle_join(
    State(state): State<ApiState>,
    Json(req): Json<IdentityRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let identity = req.identity()?;
    let status = match state.matchmaker.join(identity).await.map_err(api_error)? {
        JoinOutcome::Queued => "queued",
        JoinOutcome::AlreadyQueued => "already_queued",
    };
    Ok(Json(StatusResponse { status }))
}

pub async fn handle_poll(
    State(state): State<ApiState>,
    Json(req): Json<IdentityRequest>,
) -> Result<Json<PollResponse>, ApiError> {
    let identity = req.identity()?;
    match state
        .matchmaker
        .poll_and_claim(&identity)
        .await
        .map_err(api_error)?
    {
        PollOutcome::Matched(token) => Ok(Json(PollResponse::Matched {
            token: token.to_string(),
        })),
        PollOutcome::Pending => Ok(Json(PollResponse::Pending { status: "pending" })),
        PollOutcome::NotQueued => Err(not_found("identity is not queued")),
    }
}

pub async fn handle_release(
    State(state): State<ApiState>,
    Json(req): Json<IdentityRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let identity = req.identity()?;
    state
        .matchmaker
        .release_token(&identity)
        .await
        .map_err(api_error)?;
    Ok(Json(StatusResponse { status: "released" }))
}

pub async fn handle_leave(
    State(state): State<ApiState>,
    Json(req): Json<IdentityRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let identity = req.identity()?;
    let left = state.matchmaker.leave(&identity).await.map_err(api_error)?;
    let status = if left { "left" } else { "not_queued" };
    Ok(Json(StatusResponse { status }))
}

// ── /game ────────────────────────────────────────────────────────────────────

pub async fn handle_end_game(
    State(state): State<ApiState>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let token: Token = req.token.parse().map_err(api_error)?;
    if state.matchmaker.end_game(token).await.map_err(api_error)? {
        Ok(Json(StatusResponse { status: "ended" }))
    } else {
        Err(not_found("game not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchConfig;
    use crate::registry::SessionRegistry;

    fn state() -> ApiState {
        let config = MatchConfig::default();
        let registry = Arc::new(SessionRegistry::new(config.lock_timeout));
        ApiState {
            matchmaker: Arc::new(Matchmaker::new(config, registry)),
        }
    }

    fn body(identity: &str) -> Json<IdentityRequest> {
        Json(IdentityRequest {
            identity: identity.to_string(),
        })
    }

    #[tokio::test]
    async fn test_join_then_poll_pending() {
        let state = state();
        let Json(joined) = handle_join(State(state.clone()), body("carol")).await.unwrap();
        assert_eq!(joined, StatusResponse { status: "queued" });

        let Json(polled) = handle_poll(State(state), body("carol")).await.unwrap();
        assert_eq!(polled, PollResponse::Pending { status: "pending" });
    }

    #[tokio::test]
    async fn test_poll_returns_token_once_matched() {
        let state = state();
        let _alice = handle_join(State(state.clone()), body("alice")).await.unwrap();
        let _bob = handle_join(State(state.clone()), body("bob")).await.unwrap();

        let Json(polled) = handle_poll(State(state), body("bob")).await.unwrap();
        assert!(matches!(polled, PollResponse::Matched { .. }));
    }

    #[tokio::test]
    async fn test_invalid_identity_is_bad_request() {
        let (status, _) = handle_join(State(state()), body("   ")).await.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_poll_unknown_identity_is_not_found() {
        let (status, _) = handle_poll(State(state()), body("nobody")).await.unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_end_unknown_game_is_not_found() {
        let req = Json(TokenRequest {
            token: Token::generate().to_string(),
        });
        let (status, _) = handle_end_game(State(state()), req).await.unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_leave() {
        let state = state();
        let Json(joined) = handle_join(State(state.clone()), body("dave")).await.unwrap();
        assert_eq!(joined, StatusResponse { status: "queued" });
        let Json(left) = handle_leave(State(state.clone()), body("dave")).await.unwrap();
        assert_eq!(left, StatusResponse { status: "left" });
        let Json(again) = handle_leave(State(state), body("dave")).await.unwrap();
        assert_eq!(again, StatusResponse { status: "not_queued" });
    }
}
