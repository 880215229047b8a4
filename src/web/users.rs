use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::{ApiError, AppState};
use crate::auth::RequireUser;
use crate::db::{self, NewNotification, NotificationKind, Profile, SkillEndorsement, User};
use crate::matching;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub id: i64,
    pub username: String,
}

impl From<User> for UserRef {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub display_name: Option<String>,
    pub headline: Option<String>,
    pub bio: Option<String>,
    pub profession: Option<String>,
    pub skills: Vec<String>,
    pub is_open_to_work: bool,
    pub avatar_key: Option<String>,
    pub website_url: Option<String>,
    pub github_url: Option<String>,
}

impl From<&Profile> for ProfileView {
    fn from(profile: &Profile) -> Self {
        Self {
            display_name: profile.display_name.clone(),
            headline: profile.headline.clone(),
            bio: profile.bio.clone(),
            profession: profile.profession.clone(),
            skills: profile.skills_vec(),
            is_open_to_work: profile.is_open_to_work,
            avatar_key: profile.avatar_key.clone(),
            website_url: profile.website_url.clone(),
            github_url: profile.github_url.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUserView {
    pub id: i64,
    pub username: String,
    pub created_at: String,
    pub profile: Option<ProfileView>,
    pub follower_count: i64,
    pub post_count: i64,
    pub endorsements: Vec<SkillEndorsement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    pub display_name: Option<String>,
    pub headline: Option<String>,
    pub bio: Option<String>,
    pub profession: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub is_open_to_work: bool,
    pub website_url: Option<String>,
    pub github_url: Option<String>,
}

async fn load_user(state: &AppState, username: &str) -> Result<User, ApiError> {
    db::get_user_by_username(state.db.pool(), username)
        .await?
        .ok_or(ApiError::NotFound)
}

/// GET /users/:username
pub async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<PublicUserView>, ApiError> {
    let user = load_user(&state, &username).await?;

    let (profile, follower_count, post_count, endorsements) = tokio::try_join!(
        db::get_profile(state.db.pool(), user.id),
        db::count_followers(state.db.pool(), user.id),
        db::count_posts_by_author(state.db.pool(), user.id),
        db::get_endorsements(state.db.pool(), user.id),
    )?;

    Ok(Json(PublicUserView {
        id: user.id,
        username: user.username,
        created_at: user.created_at,
        profile: profile.as_ref().map(ProfileView::from),
        follower_count,
        post_count,
        endorsements,
    }))
}

/// GET /profile
pub async fn get_own_profile(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<ProfileView>, ApiError> {
    let profile = db::get_profile(state.db.pool(), user.id)
        .await?
        .unwrap_or_else(|| empty_profile(user.id));

    Ok(Json(ProfileView::from(&profile)))
}

/// PUT /profile
pub async fn update_profile(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(req): Json<ProfileRequest>,
) -> Result<Json<ProfileView>, ApiError> {
    // Keep the existing avatar; it is managed by the upload endpoint.
    let avatar_key = db::get_profile(state.db.pool(), user.id)
        .await?
        .and_then(|p| p.avatar_key);

    let profile = Profile {
        user_id: user.id,
        display_name: req.display_name,
        headline: req.headline,
        bio: req.bio,
        profession: req.profession,
        skills: serde_json::to_string(&req.skills).unwrap_or_else(|_| "[]".into()),
        is_open_to_work: req.is_open_to_work,
        avatar_key,
        website_url: req.website_url,
        github_url: req.github_url,
        updated_at: String::new(),
    };

    db::upsert_profile(state.db.pool(), &profile).await?;

    Ok(Json(ProfileView::from(&profile)))
}

// ========== Follows ==========

/// POST /users/:username/follow
pub async fn follow(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(username): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let target = load_user(&state, &username).await?;
    if target.id == user.id {
        return Err(ApiError::BadRequest("Cannot follow yourself".into()));
    }

    let already = db::follow_exists(state.db.pool(), user.id, target.id).await?;
    db::insert_follow(state.db.pool(), user.id, target.id).await?;

    if !already {
        state
            .notifications
            .notify(NewNotification {
                user_id: target.id,
                kind: NotificationKind::Follow,
                actor_id: user.id,
                post_id: None,
                body: format!("{} started following you", user.username),
            })
            .await;
        info!(follower = user.id, followed = target.id, "Follow created");
    }

    Ok(Json(json!({ "following": true })))
}

/// DELETE /users/:username/follow
pub async fn unfollow(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(username): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let target = load_user(&state, &username).await?;
    db::delete_follow(state.db.pool(), user.id, target.id).await?;
    Ok(Json(json!({ "following": false })))
}

/// GET /users/:username/followers
pub async fn list_followers(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Vec<UserRef>>, ApiError> {
    let user = load_user(&state, &username).await?;
    let followers = db::get_followers(state.db.pool(), user.id).await?;
    Ok(Json(followers.into_iter().map(UserRef::from).collect()))
}

/// GET /users/:username/following
pub async fn list_following(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Vec<UserRef>>, ApiError> {
    let user = load_user(&state, &username).await?;
    let following = db::get_following(state.db.pool(), user.id).await?;
    Ok(Json(following.into_iter().map(UserRef::from).collect()))
}

// ========== Endorsements ==========

#[derive(Debug, Deserialize)]
pub struct EndorseRequest {
    pub skill: String,
}

/// POST /users/:username/endorse
pub async fn endorse(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(username): Path<String>,
    Json(req): Json<EndorseRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let skill = req.skill.trim();
    if skill.is_empty() {
        return Err(ApiError::BadRequest("Skill is required".into()));
    }

    let target = load_user(&state, &username).await?;
    if target.id == user.id {
        return Err(ApiError::BadRequest("Cannot endorse yourself".into()));
    }

    let created = db::insert_endorsement(state.db.pool(), target.id, user.id, skill).await?;
    if !created {
        return Err(ApiError::Conflict(
            "You have already endorsed this skill".into(),
        ));
    }

    Ok(Json(json!({ "endorsed": true })))
}

// ========== Matching ==========

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchView {
    pub username: String,
    pub score: f64,
    pub shared_skills: Vec<String>,
}

/// GET /users/:username/match
pub async fn match_score(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(username): Path<String>,
) -> Result<Json<MatchView>, ApiError> {
    let target = load_user(&state, &username).await?;

    let viewer_profile = db::get_profile(state.db.pool(), user.id)
        .await?
        .unwrap_or_else(|| empty_profile(user.id));
    let target_profile = db::get_profile(state.db.pool(), target.id)
        .await?
        .unwrap_or_else(|| empty_profile(target.id));

    let endorsements = db::count_endorsements(state.db.pool(), target.id).await?;

    let score = matching::match_score(&viewer_profile, &target_profile, endorsements);

    let viewer_skills: Vec<String> = viewer_profile
        .skills_vec()
        .into_iter()
        .map(|s| s.to_lowercase())
        .collect();
    let shared_skills = target_profile
        .skills_vec()
        .into_iter()
        .filter(|s| viewer_skills.contains(&s.to_lowercase()))
        .collect();

    Ok(Json(MatchView {
        username: target.username,
        score,
        shared_skills,
    }))
}

// ========== Dashboard ==========

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub post_count: i64,
    pub follower_count: i64,
    pub likes_received: i64,
    pub unread_notifications: i64,
}

/// GET /dashboard
///
/// Independent aggregates fanned out concurrently.
pub async fn dashboard(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<DashboardView>, ApiError> {
    let (post_count, follower_count, likes_received, unread_notifications) = tokio::try_join!(
        db::count_posts_by_author(state.db.pool(), user.id),
        db::count_followers(state.db.pool(), user.id),
        db::count_likes_received(state.db.pool(), user.id),
        db::count_unread_notifications(state.db.pool(), user.id),
    )?;

    Ok(Json(DashboardView {
        post_count,
        follower_count,
        likes_received,
        unread_notifications,
    }))
}

fn empty_profile(user_id: i64) -> Profile {
    Profile {
        user_id,
        display_name: None,
        headline: None,
        bio: None,
        profession: None,
        skills: "[]".into(),
        is_open_to_work: false,
        avatar_key: None,
        website_url: None,
        github_url: None,
        updated_at: String::new(),
    }
}
