use serde::{Deserialize, Serialize};

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: String,
}

impl User {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// Public profile attached 1:1 to a user.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub user_id: i64,
    pub display_name: Option<String>,
    pub headline: Option<String>,
    pub bio: Option<String>,
    pub profession: Option<String>,
    /// JSON array of skill strings.
    pub skills: String,
    pub is_open_to_work: bool,
    pub avatar_key: Option<String>,
    pub website_url: Option<String>,
    pub github_url: Option<String>,
    pub updated_at: String,
}

impl Profile {
    /// Decode the skills JSON column, tolerating legacy/empty values.
    #[must_use]
    pub fn skills_vec(&self) -> Vec<String> {
        serde_json::from_str(&self.skills).unwrap_or_default()
    }
}

/// Post lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Published,
    Hidden,
}

impl PostStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Hidden => "hidden",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            "hidden" => Some(Self::Hidden),
            _ => None,
        }
    }
}

/// Portfolio post category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostCategory {
    Web,
    Mobile,
    Data,
    Devops,
    Design,
    Embedded,
    Other,
}

impl PostCategory {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Mobile => "mobile",
            Self::Data => "data",
            Self::Devops => "devops",
            Self::Design => "design",
            Self::Embedded => "embedded",
            Self::Other => "other",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "web" => Some(Self::Web),
            "mobile" => Some(Self::Mobile),
            "data" => Some(Self::Data),
            "devops" => Some(Self::Devops),
            "design" => Some(Self::Design),
            "embedded" => Some(Self::Embedded),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// A portfolio post.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub author_id: i64,
    pub title: String,
    pub summary: Option<String>,
    pub content: String,
    /// JSON array of technology strings.
    pub tech_stack: String,
    /// JSON array of skill strings.
    pub skills: String,
    pub category: String,
    pub status: String,
    pub view_count: i64,
    pub is_team_project: bool,
    pub is_editor_pick: bool,
    pub cover_key: Option<String>,
    pub published_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Post {
    #[must_use]
    pub fn status_enum(&self) -> Option<PostStatus> {
        PostStatus::from_str(&self.status)
    }

    #[must_use]
    pub fn tech_stack_vec(&self) -> Vec<String> {
        serde_json::from_str(&self.tech_stack).unwrap_or_default()
    }

    #[must_use]
    pub fn skills_vec(&self) -> Vec<String> {
        serde_json::from_str(&self.skills).unwrap_or_default()
    }
}

/// A post row joined with its author and per-row engagement counts.
///
/// The counts come back as correlated subqueries so a feed page is a single
/// round trip regardless of page size.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FeedPostRow {
    pub id: i64,
    pub author_id: i64,
    pub author_username: String,
    pub title: String,
    pub summary: Option<String>,
    pub content: String,
    pub tech_stack: String,
    pub skills: String,
    pub category: String,
    pub view_count: i64,
    pub is_team_project: bool,
    pub is_editor_pick: bool,
    pub cover_key: Option<String>,
    pub published_at: Option<String>,
    pub like_count: i64,
    pub comment_count: i64,
    pub bookmark_count: i64,
}

/// A comment on a post.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub body: String,
    pub created_at: String,
}

/// A comment joined with its author's username for display.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CommentDisplay {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub author_username: String,
    pub body: String,
    pub created_at: String,
}

/// Notification kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Like,
    Comment,
    Follow,
    Mention,
    Collaboration,
}

impl NotificationKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Comment => "comment",
            Self::Follow => "follow",
            Self::Mention => "mention",
            Self::Collaboration => "collaboration",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "like" => Some(Self::Like),
            "comment" => Some(Self::Comment),
            "follow" => Some(Self::Follow),
            "mention" => Some(Self::Mention),
            "collaboration" => Some(Self::Collaboration),
            _ => None,
        }
    }
}

/// A notification row pushed to a user.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub kind: String,
    pub actor_id: i64,
    pub post_id: Option<i64>,
    pub body: String,
    pub is_read: bool,
    pub created_at: String,
}

/// Collaboration request status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollaborationStatus {
    Pending,
    Accepted,
    Declined,
}

impl CollaborationStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "declined" => Some(Self::Declined),
            _ => None,
        }
    }
}

/// A collaboration request between two users.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CollaborationRequest {
    pub id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub post_id: Option<i64>,
    pub message: String,
    pub status: String,
    pub created_at: String,
    pub responded_at: Option<String>,
}

/// A skill endorsement on a profile.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SkillEndorsement {
    pub id: i64,
    pub profile_user_id: i64,
    pub endorser_id: i64,
    pub skill: String,
    pub created_at: String,
}

/// A stored refresh token. Only the SHA-256 of the raw token is persisted.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshToken {
    pub id: i64,
    pub user_id: i64,
    pub token_hash: String,
    pub expires_at: String,
    pub created_at: String,
    pub last_used_at: Option<String>,
}

/// Data for inserting a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Data for inserting a new post.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: i64,
    pub title: String,
    pub summary: Option<String>,
    pub content: String,
    pub tech_stack: Vec<String>,
    pub skills: Vec<String>,
    pub category: PostCategory,
    pub is_team_project: bool,
    pub publish: bool,
}

/// Data for inserting a new notification.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: i64,
    pub kind: NotificationKind,
    pub actor_id: i64,
    pub post_id: Option<i64>,
    pub body: String,
}
