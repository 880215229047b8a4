use axum::extract::State;
use axum::Json;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ApiError, AppState};
use crate::auth::{
    generate_refresh_token, hash_refresh_token, issue_access_token, password,
};
use crate::db::{self, NewUser, User};

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]{2,31}$").expect("valid username regex"));

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username or email.
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserSummary,
}

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let username = req.username.trim().to_lowercase();
    if !USERNAME_RE.is_match(&username) {
        return Err(ApiError::BadRequest(
            "Username must be 3-32 characters: lowercase letters, digits, underscores, starting with a letter".into(),
        ));
    }

    let email = req.email.trim().to_lowercase();
    if !email.contains('@') || email.len() < 5 {
        return Err(ApiError::BadRequest("Invalid email address".into()));
    }

    password::validate_password_strength(&req.password)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    if db::get_user_by_username(state.db.pool(), &username)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("Username already taken".into()));
    }
    if db::get_user_by_email(state.db.pool(), &email).await?.is_some() {
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    let password_hash = password::hash_password(&req.password)?;
    let user_id = db::insert_user(
        state.db.pool(),
        &NewUser {
            username: username.clone(),
            email,
            password_hash,
        },
    )
    .await?;

    let user = db::get_user_by_id(state.db.pool(), user_id)
        .await?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("registered user missing")))?;

    info!(user_id, username = %username, "User registered");

    issue_token_pair(&state, &user).await.map(Json)
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let identifier = req.identifier.trim().to_lowercase();

    let user = if identifier.contains('@') {
        db::get_user_by_email(state.db.pool(), &identifier).await?
    } else {
        db::get_user_by_username(state.db.pool(), &identifier).await?
    };

    // Verify against a constant dummy hash when the user is unknown so the
    // response time does not reveal which usernames exist.
    let Some(user) = user else {
        let _ = password::verify_password(&req.password, DUMMY_HASH);
        return Err(ApiError::Unauthorized);
    };

    if !user.is_active || !password::verify_password(&req.password, &user.password_hash)? {
        return Err(ApiError::Unauthorized);
    }

    info!(user_id = user.id, "User logged in");

    issue_token_pair(&state, &user).await.map(Json)
}

/// POST /auth/refresh
///
/// Rotation: the presented token is consumed and a fresh pair issued. A
/// reused (already-consumed) or expired token gets a 401.
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let token_hash = hash_refresh_token(&req.refresh_token);

    let Some(stored) = db::get_refresh_token_by_hash(state.db.pool(), &token_hash).await? else {
        return Err(ApiError::Unauthorized);
    };

    if stored.expires_at < Utc::now().to_rfc3339() {
        db::delete_refresh_token(state.db.pool(), &token_hash).await?;
        return Err(ApiError::Unauthorized);
    }

    let Some(user) = db::get_user_by_id(state.db.pool(), stored.user_id).await? else {
        db::delete_refresh_token(state.db.pool(), &token_hash).await?;
        return Err(ApiError::Unauthorized);
    };

    if !user.is_active {
        return Err(ApiError::Unauthorized);
    }

    db::delete_refresh_token(state.db.pool(), &token_hash).await?;

    issue_token_pair(&state, &user).await.map(Json)
}

/// POST /auth/logout
pub async fn logout(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let token_hash = hash_refresh_token(&req.refresh_token);
    db::delete_refresh_token(state.db.pool(), &token_hash).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

// An argon2id hash of an unguessable throwaway value, used only to equalize
// login timing for unknown users.
const DUMMY_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$yJ3q5a0WzRuNnJZfF0eweg$qCMBhT9kWeKkQmMsJF1b5qWF1nBUuWMh4WXJOQ3gz50";

async fn issue_token_pair(state: &AppState, user: &User) -> Result<TokenResponse, ApiError> {
    let access_token = issue_access_token(user, &state.token_config)?;

    let refresh_token = generate_refresh_token();
    let expires_at = (Utc::now()
        + chrono::Duration::from_std(state.token_config.refresh_ttl)
            .unwrap_or_else(|_| chrono::Duration::days(30)))
    .to_rfc3339();

    db::insert_refresh_token(
        state.db.pool(),
        user.id,
        &hash_refresh_token(&refresh_token),
        &expires_at,
    )
    .await?;

    Ok(TokenResponse {
        access_token,
        refresh_token,
        user: user.into(),
    })
}
