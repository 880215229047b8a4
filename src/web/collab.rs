use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ApiError, AppState};
use crate::auth::RequireUser;
use crate::db::{
    self, CollaborationRequest, CollaborationStatus, NewNotification, NotificationKind,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    pub recipient: String,
    pub post_id: Option<i64>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub accept: bool,
}

#[derive(Debug, Serialize)]
pub struct CollaborationLists {
    pub inbox: Vec<CollaborationRequest>,
    pub outbox: Vec<CollaborationRequest>,
}

/// POST /collaborations
pub async fn create_collaboration(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(req): Json<CreateRequest>,
) -> Result<Json<CollaborationRequest>, ApiError> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(ApiError::BadRequest("Message is required".into()));
    }

    let recipient = db::get_user_by_username(state.db.pool(), &req.recipient)
        .await?
        .ok_or(ApiError::NotFound)?;

    if recipient.id == user.id {
        return Err(ApiError::BadRequest(
            "Cannot send a collaboration request to yourself".into(),
        ));
    }

    // When tied to a post, the post must exist and be visible.
    if let Some(post_id) = req.post_id {
        let post = db::get_post(state.db.pool(), post_id)
            .await?
            .ok_or(ApiError::NotFound)?;
        if post.status != "published" {
            return Err(ApiError::NotFound);
        }
    }

    let id =
        db::insert_collaboration(state.db.pool(), user.id, recipient.id, req.post_id, message)
            .await?;

    state
        .notifications
        .notify(NewNotification {
            user_id: recipient.id,
            kind: NotificationKind::Collaboration,
            actor_id: user.id,
            post_id: req.post_id,
            body: format!("{} sent you a collaboration request", user.username),
        })
        .await;

    info!(request_id = id, sender = user.id, recipient = recipient.id, "Collaboration requested");

    let request = db::get_collaboration(state.db.pool(), id)
        .await?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("created request missing")))?;

    Ok(Json(request))
}

/// GET /collaborations
pub async fn list_collaborations(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<CollaborationLists>, ApiError> {
    let (inbox, outbox) = tokio::try_join!(
        db::get_collaboration_inbox(state.db.pool(), user.id),
        db::get_collaboration_outbox(state.db.pool(), user.id),
    )?;

    Ok(Json(CollaborationLists { inbox, outbox }))
}

/// POST /collaborations/:id/respond — recipient only, pending only.
pub async fn respond(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<i64>,
    Json(req): Json<RespondRequest>,
) -> Result<Json<CollaborationRequest>, ApiError> {
    let request = db::get_collaboration(state.db.pool(), id)
        .await?
        .ok_or(ApiError::NotFound)?;

    if request.recipient_id != user.id {
        return Err(ApiError::Forbidden);
    }

    let status = if req.accept {
        CollaborationStatus::Accepted
    } else {
        CollaborationStatus::Declined
    };

    let updated = db::respond_collaboration(state.db.pool(), id, status).await?;
    if !updated {
        return Err(ApiError::Conflict(
            "Request has already been answered".into(),
        ));
    }

    state
        .notifications
        .notify(NewNotification {
            user_id: request.sender_id,
            kind: NotificationKind::Collaboration,
            actor_id: user.id,
            post_id: request.post_id,
            body: format!(
                "{} {} your collaboration request",
                user.username,
                if req.accept { "accepted" } else { "declined" }
            ),
        })
        .await;

    let request = db::get_collaboration(state.db.pool(), id)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(request))
}
