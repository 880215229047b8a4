use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ApiError, AppState};
use crate::ai::LlmClient;
use crate::auth::RequireUser;
use crate::db::{self, User};

#[derive(Debug, Serialize)]
pub struct AiResponse {
    pub result: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct InterviewRequest {
    pub profession: Option<String>,
    pub skills: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct WritingRequest {
    pub draft: String,
}

/// Resolve the LLM client or report the surface as disabled.
fn llm(state: &AppState) -> Result<Arc<LlmClient>, ApiError> {
    state
        .llm
        .clone()
        .ok_or(ApiError::Unavailable("AI features are not configured"))
}

/// Enforce the per-user daily quota and record the request.
async fn charge_quota(state: &AppState, user: &User, kind: &str) -> Result<(), ApiError> {
    let used = db::count_ai_requests_last_day(state.db.pool(), user.id).await?;
    if used >= i64::from(state.config.llm_daily_quota) {
        return Err(ApiError::TooManyRequests(
            "Daily AI request limit reached".into(),
        ));
    }

    db::insert_ai_request(state.db.pool(), user.id, kind).await?;
    Ok(())
}

/// POST /ai/evaluate/:post_id — feedback on one of the caller's posts.
pub async fn evaluate(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(post_id): Path<i64>,
) -> Result<Json<AiResponse>, ApiError> {
    let client = llm(&state)?;

    let post = db::get_post(state.db.pool(), post_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    if post.author_id != user.id {
        return Err(ApiError::Forbidden);
    }

    charge_quota(&state, &user, "evaluate").await?;

    let result = client
        .evaluate_portfolio(&post.title, &post.content, &post.tech_stack_vec())
        .await?;

    info!(user_id = user.id, post_id, "Portfolio evaluation produced");

    Ok(Json(AiResponse { result }))
}

/// POST /ai/interview-questions — defaults to the caller's profile.
pub async fn interview_questions(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(req): Json<InterviewRequest>,
) -> Result<Json<AiResponse>, ApiError> {
    let client = llm(&state)?;

    let profile = db::get_profile(state.db.pool(), user.id).await?;

    let profession = req
        .profession
        .or_else(|| profile.as_ref().and_then(|p| p.profession.clone()))
        .unwrap_or_else(|| "Software Engineer".to_string());
    let skills = req
        .skills
        .or_else(|| profile.as_ref().map(|p| p.skills_vec()))
        .unwrap_or_default();

    charge_quota(&state, &user, "interview").await?;

    let result = client.interview_questions(&profession, &skills).await?;

    Ok(Json(AiResponse { result }))
}

/// POST /ai/writing-assist
pub async fn writing_assist(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(req): Json<WritingRequest>,
) -> Result<Json<AiResponse>, ApiError> {
    let client = llm(&state)?;

    let draft = req.draft.trim();
    if draft.is_empty() {
        return Err(ApiError::BadRequest("Draft is required".into()));
    }

    charge_quota(&state, &user, "writing").await?;

    let result = client.writing_assist(draft).await?;

    Ok(Json(AiResponse { result }))
}
