use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{AnswerValue, QuestionId, UserId};
use super::error::QuizError;
use super::service::{ScreeningService, ServiceError, SessionId};
use super::session::SubmitOutcome;

/// Header carrying the authenticated user id, set by the upstream auth proxy.
pub const USER_HEADER: &str = "x-user-id";

/// Where clients are sent when results cannot be saved anonymously.
pub const LOGIN_REDIRECT: &str = "/login";

/// Router builder exposing the quiz session endpoints.
pub fn screening_router(service: Arc<ScreeningService>) -> Router {
    Router::new()
        .route("/api/v1/quiz/sessions", post(start_handler))
        .route(
            "/api/v1/quiz/sessions/:session_id",
            get(state_handler).delete(discard_handler),
        )
        .route(
            "/api/v1/quiz/sessions/:session_id/answers",
            post(answer_handler),
        )
        .route(
            "/api/v1/quiz/sessions/:session_id/complete",
            post(complete_handler),
        )
        .route(
            "/api/v1/quiz/sessions/:session_id/reset",
            post(reset_handler),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnswerRequest {
    pub(crate) question_id: QuestionId,
    pub(crate) value: AnswerValue,
}

fn user_from(headers: &HeaderMap) -> Option<UserId> {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| UserId(value.to_string()))
}

pub(crate) async fn start_handler(
    State(service): State<Arc<ScreeningService>>,
    headers: HeaderMap,
) -> Response {
    match service.start(user_from(&headers)).await {
        Ok((session_id, state)) => {
            let payload = json!({
                "session_id": session_id,
                "state": state.view(),
            });
            (StatusCode::CREATED, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn state_handler(
    State(service): State<Arc<ScreeningService>>,
    Path(session_id): Path<String>,
) -> Response {
    let id = SessionId(session_id);
    match service.state(&id).await {
        Ok(state) => {
            let payload = json!({
                "session_id": id,
                "state": state.view(),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn answer_handler(
    State(service): State<Arc<ScreeningService>>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<AnswerRequest>,
) -> Response {
    let id = SessionId(session_id);
    let outcome = service
        .submit(&id, user_from(&headers), request.question_id, request.value)
        .await;

    match outcome {
        Ok(SubmitOutcome::InProgress { state }) => {
            let payload = json!({
                "status": "in_progress",
                "session_id": id,
                "state": state.view(),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Ok(SubmitOutcome::Completed { payload }) => {
            let payload = json!({
                "status": "completed",
                "session_id": id,
                "result": payload,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn complete_handler(
    State(service): State<Arc<ScreeningService>>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let id = SessionId(session_id);
    match service.resume(&id, user_from(&headers)).await {
        Ok(result) => {
            let payload = json!({
                "status": "completed",
                "session_id": id,
                "result": result,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn reset_handler(
    State(service): State<Arc<ScreeningService>>,
    Path(session_id): Path<String>,
) -> Response {
    let id = SessionId(session_id);
    match service.reset(&id).await {
        Ok(state) => {
            let payload = json!({
                "session_id": id,
                "state": state.view(),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn discard_handler(
    State(service): State<Arc<ScreeningService>>,
    Path(session_id): Path<String>,
) -> Response {
    let id = SessionId(session_id);
    if service.discard(&id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        error_response(ServiceError::SessionNotFound(id))
    }
}

fn error_response(error: ServiceError) -> Response {
    let status = match &error {
        ServiceError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Quiz(QuizError::AuthenticationRequired) => StatusCode::UNAUTHORIZED,
        ServiceError::Quiz(QuizError::FetchFailure(_)) => StatusCode::SERVICE_UNAVAILABLE,
        ServiceError::Quiz(
            QuizError::UnexpectedQuestion { .. }
            | QuizError::AlreadyCompleted
            | QuizError::CompletionPending
            | QuizError::NotFinished,
        ) => StatusCode::CONFLICT,
        ServiceError::Quiz(
            QuizError::PersistenceFailure { .. } | QuizError::NoTierMatch { .. },
        ) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let mut payload = json!({ "error": error.to_string() });
    if let ServiceError::Quiz(quiz_error) = &error {
        payload["kind"] = json!(quiz_error.kind());
        if matches!(quiz_error, QuizError::AuthenticationRequired) {
            payload["redirect"] = json!(LOGIN_REDIRECT);
        }
    }

    (status, Json(payload)).into_response()
}
