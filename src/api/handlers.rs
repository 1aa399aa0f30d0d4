//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    ActionResponse, AutoRunRequest, BackendStatusResponse, ContinueRequest, ErrorResponse,
    SendRequest, SessionListResponse, SteeringRequest, TokenBudgetRequest, TokenBudgetResponse,
};
use super::AppState;
use crate::runtime::{OrchestratorError, ProductionOrchestrator, SessionSnapshot};
use crate::state_machine::Step;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Session lifecycle
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/new", post(create_session))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id/delete", post(delete_session))
        // SSE streaming
        .route("/api/sessions/:id/stream", get(stream_session))
        // Generation actions
        .route("/api/sessions/:id/send", post(send_human_turn))
        .route("/api/sessions/:id/step", post(step))
        .route("/api/sessions/:id/reply", post(generate_model_reply))
        .route("/api/sessions/:id/impersonate", post(generate_synthetic_human_turn))
        .route("/api/sessions/:id/continue", post(continue_turn))
        // Controls
        .route("/api/sessions/:id/auto-run", post(set_auto_run))
        .route("/api/sessions/:id/token-budget", post(set_token_budget))
        .route("/api/sessions/:id/steering", post(set_steering))
        .route("/api/sessions/:id/clear", post(clear))
        .route("/api/sessions/:id/pop", post(pop_last_turn))
        .route("/api/sessions/:id/dismiss-error", post(dismiss_error))
        // Backend status
        .route("/api/backend", get(backend_status))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

async fn find(state: &AppState, id: &str) -> Result<ProductionOrchestrator, AppError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session not found: {id}")))
}

// ============================================================
// Session Lifecycle
// ============================================================

async fn list_sessions(State(state): State<AppState>) -> Json<SessionListResponse> {
    Json(SessionListResponse {
        sessions: state.sessions.list().await,
    })
}

async fn create_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    let orchestrator = state.sessions.create().await;
    Json(orchestrator.session().snapshot())
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let orchestrator = find(&state, &id).await?;
    Ok(Json(orchestrator.session().snapshot()))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !state.sessions.remove(&id).await {
        return Err(AppError::NotFound(format!("Session not found: {id}")));
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}

// ============================================================
// SSE Streaming
// ============================================================

async fn stream_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let orchestrator = find(&state, &id).await?;
    // Subscribe before taking the snapshot so no change falls in between
    let rx = orchestrator.session().subscribe();
    let init = orchestrator.session().snapshot();
    Ok(sse_stream(init, rx))
}

// ============================================================
// Generation Actions
// ============================================================

/// Turn an operation outcome into a response carrying the resulting state.
///
/// Precondition and backend failures are ordinary outcomes (the session
/// records them as `last_error`); only `Busy` is an HTTP error.
fn action_response(
    orchestrator: &ProductionOrchestrator,
    result: Result<Step, OrchestratorError>,
) -> Result<Json<ActionResponse>, AppError> {
    let snapshot = orchestrator.session().snapshot();
    match result {
        Ok(_) => Ok(Json(ActionResponse::ok(snapshot))),
        Err(OrchestratorError::Busy) => Err(AppError::Conflict(OrchestratorError::Busy.to_string())),
        Err(e) => Ok(Json(ActionResponse::failed(e.to_string(), snapshot))),
    }
}

async fn send_human_turn(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SendRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    let orchestrator = find(&state, &id).await?;
    let result = orchestrator.send_human_turn(&req.text).await;
    action_response(&orchestrator, result)
}

async fn step(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    let orchestrator = find(&state, &id).await?;
    let result = orchestrator.step().await;
    action_response(&orchestrator, result)
}

async fn generate_model_reply(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    let orchestrator = find(&state, &id).await?;
    let result = orchestrator.generate_model_reply().await;
    action_response(&orchestrator, result)
}

async fn generate_synthetic_human_turn(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    let orchestrator = find(&state, &id).await?;
    let result = orchestrator.generate_synthetic_human_turn().await;
    action_response(&orchestrator, result)
}

async fn continue_turn(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ContinueRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    let orchestrator = find(&state, &id).await?;
    let result = orchestrator.continue_turn(req.index).await;
    action_response(&orchestrator, result)
}

// ============================================================
// Controls
// ============================================================

async fn set_auto_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AutoRunRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    let orchestrator = find(&state, &id).await?;
    orchestrator.session().set_auto_run(req.enabled);
    tracing::info!(session_id = %id, enabled = req.enabled, "Auto-run toggled");
    Ok(Json(ActionResponse::ok(orchestrator.session().snapshot())))
}

async fn set_token_budget(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<TokenBudgetRequest>,
) -> Result<Json<TokenBudgetResponse>, AppError> {
    let orchestrator = find(&state, &id).await?;
    let accepted = orchestrator.session().set_token_budget(req.value);
    if !accepted {
        tracing::debug!(session_id = %id, value = req.value, "Token budget out of range, ignored");
    }
    Ok(Json(TokenBudgetResponse {
        accepted,
        snapshot: orchestrator.session().snapshot(),
    }))
}

async fn set_steering(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SteeringRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    let orchestrator = find(&state, &id).await?;
    orchestrator.session().set_steering(req.pc_values);
    Ok(Json(ActionResponse::ok(orchestrator.session().snapshot())))
}

async fn clear(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    let orchestrator = find(&state, &id).await?;
    orchestrator.session().clear();
    tracing::info!(session_id = %id, "Conversation cleared");
    Ok(Json(ActionResponse::ok(orchestrator.session().snapshot())))
}

async fn pop_last_turn(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    let orchestrator = find(&state, &id).await?;
    // Popping an empty log is a no-op, not an error
    let popped = orchestrator.session().pop_last_turn();
    tracing::info!(session_id = %id, popped = popped.is_some(), "Last turn popped");
    Ok(Json(ActionResponse::ok(orchestrator.session().snapshot())))
}

async fn dismiss_error(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    let orchestrator = find(&state, &id).await?;
    orchestrator.session().dismiss_error();
    Ok(Json(ActionResponse::ok(orchestrator.session().snapshot())))
}

// ============================================================
// Backend Status
// ============================================================

async fn backend_status(State(state): State<AppState>) -> Json<BackendStatusResponse> {
    let generator = state.sessions.generator();
    let (health, info) = tokio::join!(generator.health(), generator.info());

    let error = health
        .as_ref()
        .err()
        .or(info.as_ref().err())
        .map(ToString::to_string);

    Json(BackendStatusResponse {
        reachable: health.is_ok(),
        health: health.ok(),
        info: info.ok(),
        error,
    })
}

async fn get_version() -> &'static str {
    concat!("steer-chat ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
pub(super) enum AppError {
    NotFound(String),
    Conflict(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
