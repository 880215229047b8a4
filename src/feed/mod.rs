//! Feed ranking and caching.
//!
//! Serves the paginated published-post feed in three sort modes, memoizing
//! pages in a short-TTL cache when the query is safe to share across
//! viewers. Trending is not a database ordering: a capped candidate pool of
//! recent posts is scored in process and sliced for pagination.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::FeedCache;
use crate::constants::{EDITOR_PICKS_TTL_SECS, FEED_CACHE_TTL_SECS, TRENDING_TAGS_TTL_SECS};
use crate::db::{self, Database, FeedFilter, FeedOrder, FeedPostRow};

/// Feed sort mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Latest,
    Popular,
    Trending,
}

impl SortBy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Latest => "latest",
            Self::Popular => "popular",
            Self::Trending => "trending",
        }
    }

    /// Parse a query-string value. Unknown or absent values coerce to
    /// `Latest` so the response ordering stays deterministic.
    #[must_use]
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("popular") => Self::Popular,
            Some("trending") => Self::Trending,
            _ => Self::Latest,
        }
    }
}

/// Coerced feed request parameters.
#[derive(Debug, Clone, Default)]
pub struct FeedParams {
    pub page: i64,
    pub limit: i64,
    pub sort_by: SortBy,
    pub filter: FeedFilter,
}

impl FeedParams {
    /// Build params from raw (already string-coerced) inputs, clamping
    /// page and limit to sane minimums without rejecting anything.
    #[must_use]
    pub fn new(page: Option<i64>, limit: Option<i64>, sort_by: SortBy, filter: FeedFilter) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(10).max(1),
            sort_by,
            filter,
        }
    }

    /// A query is cache-eligible unless it carries free-text search
    /// (unbounded key cardinality) or the viewer-scoped open-to-work
    /// filter. Those are read-through only, never written.
    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        self.filter.search.as_deref().map_or(true, str::is_empty)
            && self.filter.is_open_to_work.is_none()
    }

    /// Deterministic cache key: sort mode, pagination, and the sorted,
    /// joined filter values. Search and open-to-work are excluded by
    /// construction since such queries never reach the cache.
    #[must_use]
    pub fn cache_key(&self) -> String {
        let mut tech = self.filter.tech_stack.clone();
        tech.sort();
        let mut skills = self.filter.skills.clone();
        skills.sort();

        format!(
            "feed:{}:{}:{}:{}|{}|{}|{}|{}",
            self.sort_by.as_str(),
            self.page,
            self.limit,
            tech.join(","),
            skills.join(","),
            self.filter.category.as_deref().unwrap_or(""),
            self.filter.profession.as_deref().unwrap_or(""),
            self.filter
                .is_team_project
                .map_or(String::new(), |b| b.to_string()),
        )
    }
}

/// Author summary embedded in feed items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorView {
    pub id: i64,
    pub username: String,
}

/// Engagement counts embedded in feed items.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EngagementCounts {
    pub likes: i64,
    pub comments: i64,
    pub bookmarks: i64,
}

/// A post as served in feed responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: i64,
    pub author: AuthorView,
    pub title: String,
    pub summary: Option<String>,
    pub content: String,
    pub tech_stack: Vec<String>,
    pub skills: Vec<String>,
    pub category: String,
    pub view_count: i64,
    pub is_team_project: bool,
    pub is_editor_pick: bool,
    pub cover_key: Option<String>,
    pub published_at: Option<String>,
    pub counts: EngagementCounts,
}

impl From<FeedPostRow> for PostView {
    fn from(row: FeedPostRow) -> Self {
        Self {
            id: row.id,
            author: AuthorView {
                id: row.author_id,
                username: row.author_username,
            },
            title: row.title,
            summary: row.summary,
            content: row.content,
            tech_stack: serde_json::from_str(&row.tech_stack).unwrap_or_default(),
            skills: serde_json::from_str(&row.skills).unwrap_or_default(),
            category: row.category,
            view_count: row.view_count,
            is_team_project: row.is_team_project,
            is_editor_pick: row.is_editor_pick,
            cover_key: row.cover_key,
            published_at: row.published_at,
            counts: EngagementCounts {
                likes: row.like_count,
                comments: row.comment_count,
                bookmarks: row.bookmark_count,
            },
        }
    }
}

/// Pagination metadata. `total` always reflects the full predicate count,
/// independent of sort mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

/// A feed response page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedPage {
    pub posts: Vec<PostView>,
    pub pagination: Pagination,
}

/// A trending tag with its frequency among published posts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub count: i64,
}

/// Feed/ranking service. The cache is optional by contract: every operation
/// behaves identically without it, just without memoization.
#[derive(Clone)]
pub struct FeedService {
    db: Database,
    cache: Option<Arc<dyn FeedCache>>,
}

impl FeedService {
    #[must_use]
    pub fn new(db: Database, cache: Option<Arc<dyn FeedCache>>) -> Self {
        Self { db, cache }
    }

    /// Serve a feed page, from cache when possible.
    pub async fn get_feed(&self, params: &FeedParams) -> Result<FeedPage> {
        let cacheable = params.is_cacheable();
        let key = params.cache_key();

        if cacheable {
            if let Some(page) = self.cache_read::<FeedPage>(&key).await {
                return Ok(page);
            }
        }

        let page = match params.sort_by {
            SortBy::Trending => self.trending_page(params).await?,
            SortBy::Latest => self.ordered_page(params, FeedOrder::PublishedDesc).await?,
            SortBy::Popular => self.ordered_page(params, FeedOrder::ViewsDesc).await?,
        };

        if cacheable {
            self.cache_write(&key, &page, Duration::from_secs(FEED_CACHE_TTL_SECS))
                .await;
        }

        Ok(page)
    }

    /// Admin-curated featured posts, capped at 5.
    pub async fn get_editor_picks(&self) -> Result<Vec<PostView>> {
        const KEY: &str = "feed:editor-picks";

        if let Some(picks) = self.cache_read::<Vec<PostView>>(KEY).await {
            return Ok(picks);
        }

        let picks: Vec<PostView> = db::get_editor_picks(self.db.pool(), 5)
            .await?
            .into_iter()
            .map(PostView::from)
            .collect();

        self.cache_write(KEY, &picks, Duration::from_secs(EDITOR_PICKS_TTL_SECS))
            .await;

        Ok(picks)
    }

    /// Top 20 tags across published posts' tech stacks.
    ///
    /// Frequency counts presence only; engagement on a post does not move
    /// its tags. Ties are broken by tag name so the slice is stable.
    pub async fn get_trending_tags(&self) -> Result<Vec<TagCount>> {
        const KEY: &str = "feed:trending-tags";

        if let Some(tags) = self.cache_read::<Vec<TagCount>>(KEY).await {
            return Ok(tags);
        }

        let stacks = db::get_published_tech_stacks(self.db.pool()).await?;

        let mut counts: HashMap<String, i64> = HashMap::new();
        for stack in stacks {
            let tags: Vec<String> = serde_json::from_str(&stack).unwrap_or_default();
            for tag in tags {
                *counts.entry(tag).or_insert(0) += 1;
            }
        }

        let mut tags: Vec<TagCount> = counts
            .into_iter()
            .map(|(tag, count)| TagCount { tag, count })
            .collect();
        tags.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
        tags.truncate(20);

        self.cache_write(KEY, &tags, Duration::from_secs(TRENDING_TAGS_TTL_SECS))
            .await;

        Ok(tags)
    }

    /// Drop every cached feed entry. Post-mutating operations call this so
    /// membership, ordering inputs, and tag frequencies never outlive a
    /// mutation by more than one read.
    pub async fn invalidate_feed_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.del_pattern("feed:*").await;
            debug!("Feed cache invalidated");
        }
    }

    async fn ordered_page(&self, params: &FeedParams, order: FeedOrder) -> Result<FeedPage> {
        let skip = (params.page - 1) * params.limit;

        // Count and page are independent given the same predicate; fetch
        // them concurrently.
        let (total, rows) = tokio::try_join!(
            db::count_feed_posts(self.db.pool(), &params.filter),
            db::get_feed_posts(self.db.pool(), &params.filter, order, params.limit, skip),
        )?;

        Ok(Self::assemble(params, total, rows))
    }

    async fn trending_page(&self, params: &FeedParams) -> Result<FeedPage> {
        let skip = (params.page - 1) * params.limit;

        // The candidate pool bounds scoring cost while keeping recent posts
        // in contention. Pages past the pool window come back short or
        // empty; the predicate count below still reports the full total.
        let pool_size = (params.limit * 5).min(200);

        let (total, candidates) = tokio::try_join!(
            db::count_feed_posts(self.db.pool(), &params.filter),
            db::get_trending_candidates(self.db.pool(), &params.filter, pool_size),
        )?;

        let now = Utc::now();
        let mut scored: Vec<(f64, FeedPostRow)> = candidates
            .into_iter()
            .map(|row| (trending_score(&row, now), row))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        let start = skip.max(0) as usize;
        let rows = scored
            .into_iter()
            .skip(start)
            .take(params.limit as usize)
            .map(|(_, row)| row)
            .collect();

        Ok(Self::assemble(params, total, rows))
    }

    fn assemble(params: &FeedParams, total: i64, rows: Vec<FeedPostRow>) -> FeedPage {
        let total_pages = if total == 0 {
            0
        } else {
            (total + params.limit - 1) / params.limit
        };

        FeedPage {
            posts: rows.into_iter().map(PostView::from).collect(),
            pagination: Pagination {
                page: params.page,
                limit: params.limit,
                total,
                total_pages,
            },
        }
    }

    async fn cache_read<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let cache = self.cache.as_ref()?;
        let raw = cache.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Dropping undecodable cache entry");
                cache.del_pattern(key).await;
                None
            }
        }
    }

    async fn cache_write<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let Some(cache) = &self.cache else {
            return;
        };
        match serde_json::to_string(value) {
            Ok(raw) => cache.set(key, raw, ttl).await,
            Err(e) => warn!(key, error = %e, "Failed to serialize cache entry"),
        }
    }
}

/// Trending score: weighted engagement plus a view contribution, damped by
/// a logarithmic recency decay.
///
/// Bookmarks carry the highest weight as the strongest intent signal; views
/// count at a fifth of a like. The decay `1 / log10(age_hours + 10)` never
/// reaches zero and flattens for old posts, so a well-engaged old post can
/// still outrank a quiet new one.
fn trending_score(row: &FeedPostRow, now: DateTime<Utc>) -> f64 {
    let engagement = (row.like_count * 3 + row.bookmark_count * 4 + row.comment_count * 3) as f64;
    let view_score = row.view_count as f64 * 0.2;

    let age_hours = row
        .published_at
        .as_deref()
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map_or(0.0, |t| {
            let minutes = now.signed_duration_since(t.with_timezone(&Utc)).num_minutes();
            (minutes as f64 / 60.0).max(0.0)
        });

    let recency_decay = 1.0 / (age_hours + 10.0).log10();

    (engagement + view_score) * recency_decay
}
