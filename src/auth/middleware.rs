use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sqlx::SqlitePool;

use super::token::{verify_access_token, TokenConfig};
use crate::db::{self, User};

/// Current authenticated user (if any).
/// Use this extractor when authentication is optional.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
    SqlitePool: FromRef<S>,
    Arc<TokenConfig>: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let pool = SqlitePool::from_ref(state);
        let token_config = Arc::<TokenConfig>::from_ref(state);

        let Some(token) = bearer_token(parts) else {
            return Ok(MaybeUser(None));
        };

        // An invalid or expired token reads as anonymous; RequireUser turns
        // that into a 401 where authentication is mandatory.
        let Ok(claims) = verify_access_token(token, &token_config) else {
            return Ok(MaybeUser(None));
        };

        let Ok(user_id) = claims.user_id() else {
            return Ok(MaybeUser(None));
        };

        let user = match db::get_user_by_id(&pool, user_id).await {
            Ok(Some(u)) => u,
            _ => return Ok(MaybeUser(None)),
        };

        if !user.is_active {
            return Ok(MaybeUser(None));
        }

        Ok(MaybeUser(Some(user)))
    }
}

/// Current authenticated user (required).
/// Returns 401 Unauthorized when no valid bearer token is presented.
#[derive(Debug, Clone)]
pub struct RequireUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
    SqlitePool: FromRef<S>,
    Arc<TokenConfig>: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let MaybeUser(user) = MaybeUser::from_request_parts(parts, state).await?;

        match user {
            Some(u) => Ok(RequireUser(u)),
            None => Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Authentication required" })),
            )
                .into_response()),
        }
    }
}

/// Require the user to be an admin.
/// Returns 403 Forbidden for authenticated non-admins.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
    SqlitePool: FromRef<S>,
    Arc<TokenConfig>: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireUser(user) = RequireUser::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            return Err((
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "Admin access required" })),
            )
                .into_response());
        }

        Ok(RequireAdmin(user))
    }
}

/// Extract the bearer token from the Authorization header.
fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
