use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::{
    error::HintError,
    extractors::AppJson,
    models::{
        answer::CheckStepRequest,
        classification::{ClassifyRequest, ClassifyResponse},
        hint::{ResolveHintQuery, ResolvedHintResponse},
        BehaviorType, HintKey,
    },
    services::AppState,
};

fn error_status(e: &HintError) -> StatusCode {
    match e {
        HintError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub async fn check_step(
    State(state): State<Arc<AppState>>,
    Path((topic_id, category_id, question_id, step_index)): Path<(i64, i64, i64, usize)>,
    AppJson(req): AppJson<CheckStepRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let key = HintKey::new(topic_id, category_id, question_id);

    match state.answers.check_step(&key, step_index, &req.input).await {
        Ok(check) => Ok((StatusCode::OK, Json(check))),
        Err(e) => {
            let status = error_status(&e);
            if status == StatusCode::NOT_FOUND {
                tracing::debug!("Step check for unknown step: {}", e);
            } else {
                tracing::error!("Failed to check step {} of {}: {}", step_index, key, e);
            }
            Err((status, e.to_string()))
        }
    }
}

pub async fn classify_attempt(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<ClassifyRequest>,
) -> impl IntoResponse {
    let result = state
        .classifier
        .classify(&req.user_input, &req.correct_answer, &req.attempt_history);
    let hint_behavior = result.category.hint_behavior();

    Json(ClassifyResponse {
        result,
        hint_behavior,
    })
}

pub async fn ensure_hints(
    State(state): State<Arc<AppState>>,
    Path((topic_id, category_id, question_id)): Path<(i64, i64, i64)>,
) -> impl IntoResponse {
    let key = HintKey::new(topic_id, category_id, question_id);
    let set = state.hints.ensure_hints(key).await;
    (StatusCode::OK, Json(set))
}

pub async fn resolve_hint(
    State(state): State<Arc<AppState>>,
    Path((topic_id, category_id, question_id, step_index)): Path<(i64, i64, i64, usize)>,
    Query(query): Query<ResolveHintQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let behavior_type = match query.behavior.as_deref() {
        Some(raw) => raw
            .parse::<BehaviorType>()
            .map_err(|e| (StatusCode::BAD_REQUEST, e))?,
        None => BehaviorType::General,
    };

    let key = HintKey::new(topic_id, category_id, question_id);
    let set = state.hints.ensure_hints(key).await;
    let hint_text = state.hints.resolve(&set, step_index, behavior_type);

    Ok((
        StatusCode::OK,
        Json(ResolvedHintResponse {
            step_index,
            behavior_type,
            hint_text,
            source: set.source,
        }),
    ))
}

pub async fn regenerate_hints(
    State(state): State<Arc<AppState>>,
    Path((topic_id, category_id, question_id)): Path<(i64, i64, i64)>,
) -> impl IntoResponse {
    let key = HintKey::new(topic_id, category_id, question_id);
    let set = state.hints.regenerate(key).await;
    (StatusCode::OK, Json(set))
}
