use anyhow::{Context, Result};
use sqlx::SqlitePool;

use super::models::{
    Comment, CommentDisplay, CollaborationRequest, CollaborationStatus, FeedPostRow,
    NewNotification, NewPost, NewUser, Notification, Post, PostStatus, Profile, RefreshToken,
    SkillEndorsement, User,
};

// ========== Feed Filter ==========

/// Filters applied to the published-posts feed.
///
/// Tag-like filters (`tech_stack`, `skills`) use intersect-any semantics:
/// a post matches if its set shares at least one element with the request.
#[derive(Debug, Clone, Default)]
pub struct FeedFilter {
    pub tech_stack: Vec<String>,
    pub skills: Vec<String>,
    pub category: Option<String>,
    pub profession: Option<String>,
    pub is_team_project: Option<bool>,
    pub is_open_to_work: Option<bool>,
    pub search: Option<String>,
}

/// A WHERE clause fragment with its bind values in order.
struct Predicate {
    sql: String,
    values: Vec<String>,
}

/// Build the feed predicate for a filter set.
///
/// Only published posts are ever feed-visible; every other condition narrows
/// from there. Profile-scoped conditions (`profession`, `is_open_to_work`)
/// rely on the caller joining `profiles pr` on the post author.
fn build_feed_predicate(filter: &FeedFilter) -> Predicate {
    let mut clauses = vec!["p.status = 'published'".to_string()];
    let mut values = Vec::new();

    if !filter.tech_stack.is_empty() {
        let placeholders = vec!["?"; filter.tech_stack.len()].join(", ");
        clauses.push(format!(
            "EXISTS (SELECT 1 FROM json_each(p.tech_stack) WHERE json_each.value IN ({placeholders}))"
        ));
        values.extend(filter.tech_stack.iter().cloned());
    }

    if !filter.skills.is_empty() {
        let placeholders = vec!["?"; filter.skills.len()].join(", ");
        clauses.push(format!(
            "EXISTS (SELECT 1 FROM json_each(p.skills) WHERE json_each.value IN ({placeholders}))"
        ));
        values.extend(filter.skills.iter().cloned());
    }

    if let Some(category) = &filter.category {
        clauses.push("p.category = ?".to_string());
        values.push(category.clone());
    }

    if let Some(profession) = &filter.profession {
        clauses.push("pr.profession = ?".to_string());
        values.push(profession.clone());
    }

    if let Some(team) = filter.is_team_project {
        clauses.push(format!("p.is_team_project = {}", i64::from(team)));
    }

    if let Some(open) = filter.is_open_to_work {
        clauses.push(format!("pr.is_open_to_work = {}", i64::from(open)));
    }

    if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
        clauses.push(
            "(LOWER(p.title) LIKE ? OR LOWER(p.summary) LIKE ? OR LOWER(p.content) LIKE ? \
             OR EXISTS (SELECT 1 FROM json_each(p.skills) WHERE json_each.value = ?) \
             OR EXISTS (SELECT 1 FROM json_each(p.tech_stack) WHERE json_each.value = ?))"
                .to_string(),
        );
        let pattern = format!("%{}%", search.to_lowercase());
        values.push(pattern.clone());
        values.push(pattern.clone());
        values.push(pattern);
        values.push(search.to_string());
        values.push(search.to_string());
    }

    Predicate {
        sql: clauses.join(" AND "),
        values,
    }
}

const FEED_SELECT: &str = r"
    SELECT
        p.id,
        p.author_id,
        u.username AS author_username,
        p.title,
        p.summary,
        p.content,
        p.tech_stack,
        p.skills,
        p.category,
        p.view_count,
        p.is_team_project,
        p.is_editor_pick,
        p.cover_key,
        p.published_at,
        (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS like_count,
        (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count,
        (SELECT COUNT(*) FROM bookmarks b WHERE b.post_id = p.id) AS bookmark_count
    FROM posts p
    JOIN users u ON u.id = p.author_id
    LEFT JOIN profiles pr ON pr.user_id = p.author_id
";

/// Count posts matching the feed predicate.
pub async fn count_feed_posts(pool: &SqlitePool, filter: &FeedFilter) -> Result<i64> {
    let predicate = build_feed_predicate(filter);
    let sql = format!(
        "SELECT COUNT(*) FROM posts p \
         JOIN users u ON u.id = p.author_id \
         LEFT JOIN profiles pr ON pr.user_id = p.author_id \
         WHERE {}",
        predicate.sql
    );

    let mut query = sqlx::query_scalar::<_, i64>(&sql);
    for value in &predicate.values {
        query = query.bind(value);
    }

    query
        .fetch_one(pool)
        .await
        .context("Failed to count feed posts")
}

/// Feed page ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOrder {
    PublishedDesc,
    ViewsDesc,
}

impl FeedOrder {
    fn as_sql(self) -> &'static str {
        match self {
            Self::PublishedDesc => "p.published_at DESC",
            Self::ViewsDesc => "p.view_count DESC",
        }
    }
}

/// Fetch a page of feed posts with engagement counts in a single query.
pub async fn get_feed_posts(
    pool: &SqlitePool,
    filter: &FeedFilter,
    order: FeedOrder,
    limit: i64,
    offset: i64,
) -> Result<Vec<FeedPostRow>> {
    let predicate = build_feed_predicate(filter);
    let sql = format!(
        "{FEED_SELECT} WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
        predicate.sql,
        order.as_sql()
    );

    let mut query = sqlx::query_as::<_, FeedPostRow>(&sql);
    for value in &predicate.values {
        query = query.bind(value);
    }

    query
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to fetch feed posts")
}

/// Fetch the newest published posts matching a filter, for trending scoring.
pub async fn get_trending_candidates(
    pool: &SqlitePool,
    filter: &FeedFilter,
    pool_size: i64,
) -> Result<Vec<FeedPostRow>> {
    get_feed_posts(pool, filter, FeedOrder::PublishedDesc, pool_size, 0).await
}

/// Fetch editor-picked published posts, newest first.
pub async fn get_editor_picks(pool: &SqlitePool, limit: i64) -> Result<Vec<FeedPostRow>> {
    let sql = format!(
        "{FEED_SELECT} WHERE p.status = 'published' AND p.is_editor_pick = 1 \
         ORDER BY p.published_at DESC LIMIT ?"
    );

    sqlx::query_as(&sql)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to fetch editor picks")
}

/// Fetch the tech_stack column of every published post.
///
/// Tag frequencies are aggregated in application code from these raw JSON
/// arrays, the same place the trending score is computed.
pub async fn get_published_tech_stacks(pool: &SqlitePool) -> Result<Vec<String>> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT tech_stack FROM posts WHERE status = 'published'")
            .fetch_all(pool)
            .await
            .context("Failed to fetch published tech stacks")?;

    Ok(rows.into_iter().map(|(t,)| t).collect())
}

// ========== Users ==========

/// Insert a new user, returning its ID.
pub async fn insert_user(pool: &SqlitePool, user: &NewUser) -> Result<i64> {
    let result = sqlx::query(
        r"
        INSERT INTO users (username, email, password_hash)
        VALUES (?, ?, ?)
        ",
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .execute(pool)
    .await
    .context("Failed to insert user")?;

    Ok(result.last_insert_rowid())
}

/// Get a user by ID.
pub async fn get_user_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch user by id")
}

/// Get a user by username.
pub async fn get_user_by_username(pool: &SqlitePool, username: &str) -> Result<Option<User>> {
    sqlx::query_as("SELECT * FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch user by username")
}

/// Get a user by email.
pub async fn get_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch user by email")
}

/// Set a user's role.
pub async fn set_user_role(pool: &SqlitePool, user_id: i64, role: &str) -> Result<()> {
    sqlx::query("UPDATE users SET role = ? WHERE id = ?")
        .bind(role)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to set user role")?;
    Ok(())
}

// ========== Profiles ==========

/// Get a profile by user ID.
pub async fn get_profile(pool: &SqlitePool, user_id: i64) -> Result<Option<Profile>> {
    sqlx::query_as("SELECT * FROM profiles WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch profile")
}

/// Insert or replace a user's profile.
pub async fn upsert_profile(pool: &SqlitePool, profile: &Profile) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO profiles (
            user_id, display_name, headline, bio, profession, skills,
            is_open_to_work, avatar_key, website_url, github_url, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, datetime('now'))
        ON CONFLICT (user_id) DO UPDATE SET
            display_name = excluded.display_name,
            headline = excluded.headline,
            bio = excluded.bio,
            profession = excluded.profession,
            skills = excluded.skills,
            is_open_to_work = excluded.is_open_to_work,
            avatar_key = excluded.avatar_key,
            website_url = excluded.website_url,
            github_url = excluded.github_url,
            updated_at = datetime('now')
        ",
    )
    .bind(profile.user_id)
    .bind(&profile.display_name)
    .bind(&profile.headline)
    .bind(&profile.bio)
    .bind(&profile.profession)
    .bind(&profile.skills)
    .bind(profile.is_open_to_work)
    .bind(&profile.avatar_key)
    .bind(&profile.website_url)
    .bind(&profile.github_url)
    .execute(pool)
    .await
    .context("Failed to upsert profile")?;
    Ok(())
}

/// Set just the avatar key on a profile, creating an empty profile if needed.
pub async fn set_profile_avatar(pool: &SqlitePool, user_id: i64, avatar_key: &str) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO profiles (user_id, avatar_key)
        VALUES (?, ?)
        ON CONFLICT (user_id) DO UPDATE SET
            avatar_key = excluded.avatar_key,
            updated_at = datetime('now')
        ",
    )
    .bind(user_id)
    .bind(avatar_key)
    .execute(pool)
    .await
    .context("Failed to set profile avatar")?;
    Ok(())
}

// ========== Posts ==========

/// Insert a new post, returning its ID.
///
/// `published_at` is stamped only when the post is created already published;
/// drafts receive it on their first publish.
pub async fn insert_post(pool: &SqlitePool, post: &NewPost) -> Result<i64> {
    let status = if post.publish {
        PostStatus::Published
    } else {
        PostStatus::Draft
    };
    let published_at = post.publish.then(|| chrono::Utc::now().to_rfc3339());

    let result = sqlx::query(
        r"
        INSERT INTO posts (
            author_id, title, summary, content, tech_stack, skills,
            category, status, is_team_project, published_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(post.author_id)
    .bind(&post.title)
    .bind(&post.summary)
    .bind(&post.content)
    .bind(serde_json::to_string(&post.tech_stack)?)
    .bind(serde_json::to_string(&post.skills)?)
    .bind(post.category.as_str())
    .bind(status.as_str())
    .bind(post.is_team_project)
    .bind(published_at)
    .execute(pool)
    .await
    .context("Failed to insert post")?;

    Ok(result.last_insert_rowid())
}

/// Get a post by ID.
pub async fn get_post(pool: &SqlitePool, id: i64) -> Result<Option<Post>> {
    sqlx::query_as("SELECT * FROM posts WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch post")
}

/// Get a post with author and engagement counts.
pub async fn get_post_display(pool: &SqlitePool, id: i64) -> Result<Option<FeedPostRow>> {
    let sql = format!("{FEED_SELECT} WHERE p.id = ?");
    sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch post display")
}

/// Update an existing post's content fields.
pub async fn update_post(
    pool: &SqlitePool,
    id: i64,
    title: &str,
    summary: Option<&str>,
    content: &str,
    tech_stack: &[String],
    skills: &[String],
    category: &str,
    is_team_project: bool,
) -> Result<()> {
    sqlx::query(
        r"
        UPDATE posts
        SET title = ?, summary = ?, content = ?, tech_stack = ?, skills = ?,
            category = ?, is_team_project = ?, updated_at = datetime('now')
        WHERE id = ?
        ",
    )
    .bind(title)
    .bind(summary)
    .bind(content)
    .bind(serde_json::to_string(tech_stack)?)
    .bind(serde_json::to_string(skills)?)
    .bind(category)
    .bind(is_team_project)
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update post")?;
    Ok(())
}

/// Publish a draft. `published_at` is set only on the first publish.
pub async fn publish_post(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query(
        r"
        UPDATE posts
        SET status = 'published',
            published_at = COALESCE(published_at, ?),
            updated_at = datetime('now')
        WHERE id = ?
        ",
    )
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to publish post")?;
    Ok(())
}

/// Hide or unhide a post. Unhiding restores published status.
pub async fn set_post_hidden(pool: &SqlitePool, id: i64, hidden: bool) -> Result<()> {
    let status = if hidden { "hidden" } else { "published" };
    sqlx::query("UPDATE posts SET status = ?, updated_at = datetime('now') WHERE id = ?")
        .bind(status)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to set post hidden")?;
    Ok(())
}

/// Flag or unflag a post as an editor pick.
pub async fn set_editor_pick(pool: &SqlitePool, id: i64, picked: bool) -> Result<()> {
    sqlx::query("UPDATE posts SET is_editor_pick = ?, updated_at = datetime('now') WHERE id = ?")
        .bind(picked)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to set editor pick")?;
    Ok(())
}

/// Increment a post's view counter. Monotonic, one per detail read.
pub async fn increment_view_count(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("UPDATE posts SET view_count = view_count + 1 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to increment view count")?;
    Ok(())
}

/// Delete a post.
pub async fn delete_post(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete post")?;
    Ok(())
}

/// Get a user's posts, newest first. Drafts and hidden posts are included
/// only when `include_unpublished` is set (owner/admin view).
pub async fn get_posts_by_author(
    pool: &SqlitePool,
    author_id: i64,
    include_unpublished: bool,
) -> Result<Vec<Post>> {
    let sql = if include_unpublished {
        "SELECT * FROM posts WHERE author_id = ? ORDER BY created_at DESC"
    } else {
        "SELECT * FROM posts WHERE author_id = ? AND status = 'published' ORDER BY published_at DESC"
    };

    sqlx::query_as(sql)
        .bind(author_id)
        .fetch_all(pool)
        .await
        .context("Failed to fetch posts by author")
}

/// Count a user's published posts.
pub async fn count_posts_by_author(pool: &SqlitePool, author_id: i64) -> Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE author_id = ? AND status = 'published'")
        .bind(author_id)
        .fetch_one(pool)
        .await
        .context("Failed to count posts by author")
}

// ========== Comments ==========

/// Insert a comment, returning its ID.
pub async fn insert_comment(
    pool: &SqlitePool,
    post_id: i64,
    author_id: i64,
    body: &str,
) -> Result<i64> {
    let result = sqlx::query("INSERT INTO comments (post_id, author_id, body) VALUES (?, ?, ?)")
        .bind(post_id)
        .bind(author_id)
        .bind(body)
        .execute(pool)
        .await
        .context("Failed to insert comment")?;

    Ok(result.last_insert_rowid())
}

/// Get a comment by ID.
pub async fn get_comment(pool: &SqlitePool, id: i64) -> Result<Option<Comment>> {
    sqlx::query_as("SELECT * FROM comments WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch comment")
}

/// Get a post's comments with author usernames, oldest first.
pub async fn get_comments_for_post(pool: &SqlitePool, post_id: i64) -> Result<Vec<CommentDisplay>> {
    sqlx::query_as(
        r"
        SELECT c.id, c.post_id, c.author_id, u.username AS author_username, c.body, c.created_at
        FROM comments c
        JOIN users u ON u.id = c.author_id
        WHERE c.post_id = ?
        ORDER BY c.created_at ASC, c.id ASC
        ",
    )
    .bind(post_id)
    .fetch_all(pool)
    .await
    .context("Failed to fetch comments for post")
}

/// Delete a comment.
pub async fn delete_comment(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete comment")?;
    Ok(())
}

// ========== Likes & Bookmarks ==========

/// Check whether a like exists.
pub async fn like_exists(pool: &SqlitePool, post_id: i64, user_id: i64) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE post_id = ? AND user_id = ?")
            .bind(post_id)
            .bind(user_id)
            .fetch_one(pool)
            .await
            .context("Failed to check like")?;
    Ok(count > 0)
}

/// Insert a like. Idempotent per (post, user).
pub async fn insert_like(pool: &SqlitePool, post_id: i64, user_id: i64) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO likes (post_id, user_id) VALUES (?, ?)")
        .bind(post_id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to insert like")?;
    Ok(())
}

/// Delete a like.
pub async fn delete_like(pool: &SqlitePool, post_id: i64, user_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM likes WHERE post_id = ? AND user_id = ?")
        .bind(post_id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to delete like")?;
    Ok(())
}

/// Check whether a bookmark exists.
pub async fn bookmark_exists(pool: &SqlitePool, post_id: i64, user_id: i64) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM bookmarks WHERE post_id = ? AND user_id = ?")
            .bind(post_id)
            .bind(user_id)
            .fetch_one(pool)
            .await
            .context("Failed to check bookmark")?;
    Ok(count > 0)
}

/// Insert a bookmark. Idempotent per (post, user).
pub async fn insert_bookmark(pool: &SqlitePool, post_id: i64, user_id: i64) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO bookmarks (post_id, user_id) VALUES (?, ?)")
        .bind(post_id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to insert bookmark")?;
    Ok(())
}

/// Delete a bookmark.
pub async fn delete_bookmark(pool: &SqlitePool, post_id: i64, user_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM bookmarks WHERE post_id = ? AND user_id = ?")
        .bind(post_id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to delete bookmark")?;
    Ok(())
}

/// Get a user's bookmarked posts, newest bookmark first.
pub async fn get_bookmarked_posts(pool: &SqlitePool, user_id: i64) -> Result<Vec<FeedPostRow>> {
    let sql = format!(
        "{FEED_SELECT} JOIN bookmarks bm ON bm.post_id = p.id \
         WHERE bm.user_id = ? AND p.status = 'published' \
         ORDER BY bm.created_at DESC"
    );

    sqlx::query_as(&sql)
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("Failed to fetch bookmarked posts")
}

/// Count likes received across all of a user's posts.
pub async fn count_likes_received(pool: &SqlitePool, user_id: i64) -> Result<i64> {
    sqlx::query_scalar(
        r"
        SELECT COUNT(*)
        FROM likes l
        JOIN posts p ON p.id = l.post_id
        WHERE p.author_id = ?
        ",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .context("Failed to count likes received")
}

// ========== Follows ==========

/// Check whether a follow edge exists.
pub async fn follow_exists(pool: &SqlitePool, follower_id: i64, followed_id: i64) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM follows WHERE follower_id = ? AND followed_id = ?",
    )
    .bind(follower_id)
    .bind(followed_id)
    .fetch_one(pool)
    .await
    .context("Failed to check follow")?;
    Ok(count > 0)
}

/// Insert a follow edge. Idempotent.
pub async fn insert_follow(pool: &SqlitePool, follower_id: i64, followed_id: i64) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO follows (follower_id, followed_id) VALUES (?, ?)")
        .bind(follower_id)
        .bind(followed_id)
        .execute(pool)
        .await
        .context("Failed to insert follow")?;
    Ok(())
}

/// Delete a follow edge.
pub async fn delete_follow(pool: &SqlitePool, follower_id: i64, followed_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM follows WHERE follower_id = ? AND followed_id = ?")
        .bind(follower_id)
        .bind(followed_id)
        .execute(pool)
        .await
        .context("Failed to delete follow")?;
    Ok(())
}

/// List users following `user_id`.
pub async fn get_followers(pool: &SqlitePool, user_id: i64) -> Result<Vec<User>> {
    sqlx::query_as(
        r"
        SELECT u.*
        FROM users u
        JOIN follows f ON f.follower_id = u.id
        WHERE f.followed_id = ?
        ORDER BY f.created_at DESC
        ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to fetch followers")
}

/// List users that `user_id` follows.
pub async fn get_following(pool: &SqlitePool, user_id: i64) -> Result<Vec<User>> {
    sqlx::query_as(
        r"
        SELECT u.*
        FROM users u
        JOIN follows f ON f.followed_id = u.id
        WHERE f.follower_id = ?
        ORDER BY f.created_at DESC
        ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to fetch following")
}

/// Count followers of a user.
pub async fn count_followers(pool: &SqlitePool, user_id: i64) -> Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE followed_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .context("Failed to count followers")
}

// ========== Notifications ==========

/// Insert a notification, returning its ID.
pub async fn insert_notification(pool: &SqlitePool, n: &NewNotification) -> Result<i64> {
    let result = sqlx::query(
        r"
        INSERT INTO notifications (user_id, kind, actor_id, post_id, body)
        VALUES (?, ?, ?, ?, ?)
        ",
    )
    .bind(n.user_id)
    .bind(n.kind.as_str())
    .bind(n.actor_id)
    .bind(n.post_id)
    .bind(&n.body)
    .execute(pool)
    .await
    .context("Failed to insert notification")?;

    Ok(result.last_insert_rowid())
}

/// Get a user's notifications, newest first.
pub async fn get_notifications(
    pool: &SqlitePool,
    user_id: i64,
    limit: i64,
) -> Result<Vec<Notification>> {
    sqlx::query_as(
        "SELECT * FROM notifications WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to fetch notifications")
}

/// Mark all of a user's notifications as read.
pub async fn mark_notifications_read(pool: &SqlitePool, user_id: i64) -> Result<u64> {
    let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE user_id = ? AND is_read = 0")
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to mark notifications read")?;
    Ok(result.rows_affected())
}

/// Count a user's unread notifications.
pub async fn count_unread_notifications(pool: &SqlitePool, user_id: i64) -> Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = ? AND is_read = 0")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .context("Failed to count unread notifications")
}

// ========== Collaboration Requests ==========

/// Insert a collaboration request, returning its ID.
pub async fn insert_collaboration(
    pool: &SqlitePool,
    sender_id: i64,
    recipient_id: i64,
    post_id: Option<i64>,
    message: &str,
) -> Result<i64> {
    let result = sqlx::query(
        r"
        INSERT INTO collaboration_requests (sender_id, recipient_id, post_id, message)
        VALUES (?, ?, ?, ?)
        ",
    )
    .bind(sender_id)
    .bind(recipient_id)
    .bind(post_id)
    .bind(message)
    .execute(pool)
    .await
    .context("Failed to insert collaboration request")?;

    Ok(result.last_insert_rowid())
}

/// Get a collaboration request by ID.
pub async fn get_collaboration(
    pool: &SqlitePool,
    id: i64,
) -> Result<Option<CollaborationRequest>> {
    sqlx::query_as("SELECT * FROM collaboration_requests WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch collaboration request")
}

/// Record a response to a pending request. Returns false if the request was
/// not pending (already answered, or answered concurrently).
pub async fn respond_collaboration(
    pool: &SqlitePool,
    id: i64,
    status: CollaborationStatus,
) -> Result<bool> {
    let result = sqlx::query(
        r"
        UPDATE collaboration_requests
        SET status = ?, responded_at = datetime('now')
        WHERE id = ? AND status = 'pending'
        ",
    )
    .bind(status.as_str())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to respond to collaboration request")?;

    Ok(result.rows_affected() > 0)
}

/// Requests received by a user, newest first.
pub async fn get_collaboration_inbox(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Vec<CollaborationRequest>> {
    sqlx::query_as(
        "SELECT * FROM collaboration_requests WHERE recipient_id = ? ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to fetch collaboration inbox")
}

/// Requests sent by a user, newest first.
pub async fn get_collaboration_outbox(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Vec<CollaborationRequest>> {
    sqlx::query_as(
        "SELECT * FROM collaboration_requests WHERE sender_id = ? ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to fetch collaboration outbox")
}

// ========== Skill Endorsements ==========

/// Insert an endorsement. Returns false when the (profile, endorser, skill)
/// triple already exists.
pub async fn insert_endorsement(
    pool: &SqlitePool,
    profile_user_id: i64,
    endorser_id: i64,
    skill: &str,
) -> Result<bool> {
    let result = sqlx::query(
        r"
        INSERT OR IGNORE INTO skill_endorsements (profile_user_id, endorser_id, skill)
        VALUES (?, ?, ?)
        ",
    )
    .bind(profile_user_id)
    .bind(endorser_id)
    .bind(skill)
    .execute(pool)
    .await
    .context("Failed to insert endorsement")?;

    Ok(result.rows_affected() > 0)
}

/// List endorsements on a profile.
pub async fn get_endorsements(
    pool: &SqlitePool,
    profile_user_id: i64,
) -> Result<Vec<SkillEndorsement>> {
    sqlx::query_as(
        "SELECT * FROM skill_endorsements WHERE profile_user_id = ? ORDER BY created_at DESC",
    )
    .bind(profile_user_id)
    .fetch_all(pool)
    .await
    .context("Failed to fetch endorsements")
}

/// Count endorsements on a profile.
pub async fn count_endorsements(pool: &SqlitePool, profile_user_id: i64) -> Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM skill_endorsements WHERE profile_user_id = ?")
        .bind(profile_user_id)
        .fetch_one(pool)
        .await
        .context("Failed to count endorsements")
}

// ========== Refresh Tokens ==========

/// Store a refresh token hash.
pub async fn insert_refresh_token(
    pool: &SqlitePool,
    user_id: i64,
    token_hash: &str,
    expires_at: &str,
) -> Result<()> {
    sqlx::query("INSERT INTO refresh_tokens (user_id, token_hash, expires_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(pool)
        .await
        .context("Failed to insert refresh token")?;
    Ok(())
}

/// Look up a refresh token by its hash.
pub async fn get_refresh_token_by_hash(
    pool: &SqlitePool,
    token_hash: &str,
) -> Result<Option<RefreshToken>> {
    sqlx::query_as("SELECT * FROM refresh_tokens WHERE token_hash = ?")
        .bind(token_hash)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch refresh token")
}

/// Delete a refresh token by hash (rotation or logout).
pub async fn delete_refresh_token(pool: &SqlitePool, token_hash: &str) -> Result<()> {
    sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = ?")
        .bind(token_hash)
        .execute(pool)
        .await
        .context("Failed to delete refresh token")?;
    Ok(())
}

/// Delete all of a user's refresh tokens.
pub async fn delete_user_refresh_tokens(pool: &SqlitePool, user_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to delete user refresh tokens")?;
    Ok(())
}

/// Delete expired refresh tokens. Returns the number removed.
pub async fn delete_expired_refresh_tokens(pool: &SqlitePool) -> Result<u64> {
    let now = chrono::Utc::now().to_rfc3339();
    let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < ?")
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to delete expired refresh tokens")?;
    Ok(result.rows_affected())
}

// ========== AI Request Ledger ==========

/// Record an LLM request for quota accounting.
pub async fn insert_ai_request(pool: &SqlitePool, user_id: i64, kind: &str) -> Result<()> {
    sqlx::query("INSERT INTO ai_requests (user_id, kind) VALUES (?, ?)")
        .bind(user_id)
        .bind(kind)
        .execute(pool)
        .await
        .context("Failed to insert ai request")?;
    Ok(())
}

/// Count a user's LLM requests in the last 24 hours.
pub async fn count_ai_requests_last_day(pool: &SqlitePool, user_id: i64) -> Result<i64> {
    sqlx::query_scalar(
        r"
        SELECT COUNT(*) FROM ai_requests
        WHERE user_id = ? AND created_at > datetime('now', '-1 day')
        ",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .context("Failed to count recent ai requests")
}

// ========== Stats ==========

/// Total registered users (admin overview).
pub async fn count_users(pool: &SqlitePool) -> Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await
        .context("Failed to count users")
}

/// Total published posts (admin overview).
pub async fn count_published_posts(pool: &SqlitePool) -> Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE status = 'published'")
        .fetch_one(pool)
        .await
        .context("Failed to count published posts")
}
