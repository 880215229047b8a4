//! Integration tests for the feed/ranking service.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use portlink::cache::{FeedCache, MemoryCache};
use portlink::db::{
    insert_bookmark, insert_like, insert_post, insert_user, set_editor_pick, Database, FeedFilter,
    NewPost, NewUser, PostCategory,
};
use portlink::feed::{FeedParams, FeedService, SortBy};
use tempfile::TempDir;

/// Cache wrapper that counts writes, for asserting that uncacheable queries
/// never populate the cache.
#[derive(Default)]
struct RecordingCache {
    inner: MemoryCache,
    sets: AtomicUsize,
}

#[async_trait]
impl FeedCache for RecordingCache {
    async fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value, ttl).await;
    }

    async fn del_pattern(&self, pattern: &str) {
        self.inner.del_pattern(pattern).await;
    }
}

async fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.sqlite");
    let db = Database::new(&db_path)
        .await
        .expect("Failed to create database");
    (db, temp_dir)
}

async fn seed_user(db: &Database, username: &str) -> i64 {
    insert_user(
        db.pool(),
        &NewUser {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash: "x".to_string(),
        },
    )
    .await
    .expect("Failed to insert user")
}

async fn seed_post(db: &Database, author: i64, title: &str, tech: &[&str], publish: bool) -> i64 {
    insert_post(
        db.pool(),
        &NewPost {
            author_id: author,
            title: title.to_string(),
            summary: Some(format!("{title} summary")),
            content: format!("{title} content"),
            tech_stack: tech.iter().map(ToString::to_string).collect(),
            skills: vec![],
            category: PostCategory::Web,
            is_team_project: false,
            publish,
        },
    )
    .await
    .expect("Failed to insert post")
}

async fn set_view_count(db: &Database, post_id: i64, views: i64) {
    sqlx::query("UPDATE posts SET view_count = ? WHERE id = ?")
        .bind(views)
        .bind(post_id)
        .execute(db.pool())
        .await
        .expect("Failed to set view count");
}

async fn set_published_at(db: &Database, post_id: i64, when: chrono::DateTime<chrono::Utc>) {
    sqlx::query("UPDATE posts SET published_at = ? WHERE id = ?")
        .bind(when.to_rfc3339())
        .bind(post_id)
        .execute(db.pool())
        .await
        .expect("Failed to set published_at");
}

fn params(sort_by: SortBy, page: i64, limit: i64) -> FeedParams {
    FeedParams::new(Some(page), Some(limit), sort_by, FeedFilter::default())
}

#[tokio::test]
async fn test_popular_sort_end_to_end() {
    let (db, _tmp) = setup_db().await;
    let author = seed_user(&db, "author").await;

    let low = seed_post(&db, author, "low", &[], true).await;
    let high = seed_post(&db, author, "high", &[], true).await;
    let mid = seed_post(&db, author, "mid", &[], true).await;
    set_view_count(&db, high, 100).await;
    set_view_count(&db, mid, 50).await;
    set_view_count(&db, low, 10).await;

    let service = FeedService::new(db, None);
    let page = service
        .get_feed(&params(SortBy::Popular, 1, 2))
        .await
        .unwrap();

    assert_eq!(page.posts.len(), 2);
    assert_eq!(page.posts[0].title, "high");
    assert_eq!(page.posts[1].title, "mid");
    assert_eq!(page.pagination.total, 3);
    assert_eq!(page.pagination.total_pages, 2);
}

#[tokio::test]
async fn test_tech_stack_filter_intersects_any() {
    let (db, _tmp) = setup_db().await;
    let author = seed_user(&db, "author").await;

    seed_post(&db, author, "react-only", &["React"], true).await;
    seed_post(&db, author, "vue-only", &["Vue"], true).await;
    seed_post(&db, author, "react-node", &["React", "Node"], true).await;

    let service = FeedService::new(db, None);
    let page = service
        .get_feed(&FeedParams::new(
            None,
            None,
            SortBy::Latest,
            FeedFilter {
                tech_stack: vec!["React".to_string()],
                ..FeedFilter::default()
            },
        ))
        .await
        .unwrap();

    let mut titles: Vec<&str> = page.posts.iter().map(|p| p.title.as_str()).collect();
    titles.sort_unstable();
    assert_eq!(titles, vec!["react-node", "react-only"]);
}

#[tokio::test]
async fn test_unpublished_posts_never_in_feed() {
    let (db, _tmp) = setup_db().await;
    let author = seed_user(&db, "author").await;

    seed_post(&db, author, "draft", &[], false).await;
    let hidden = seed_post(&db, author, "hidden", &[], true).await;
    sqlx::query("UPDATE posts SET status = 'hidden' WHERE id = ?")
        .bind(hidden)
        .execute(db.pool())
        .await
        .unwrap();
    seed_post(&db, author, "visible", &[], true).await;

    let service = FeedService::new(db, None);
    for sort in [SortBy::Latest, SortBy::Popular, SortBy::Trending] {
        let page = service.get_feed(&params(sort, 1, 10)).await.unwrap();
        assert_eq!(page.pagination.total, 1);
        assert_eq!(page.posts.len(), 1);
        assert_eq!(page.posts[0].title, "visible");
    }
}

#[tokio::test]
async fn test_page_beyond_total_is_empty_not_error() {
    let (db, _tmp) = setup_db().await;
    let author = seed_user(&db, "author").await;
    seed_post(&db, author, "only", &[], true).await;

    let service = FeedService::new(db, None);
    let page = service
        .get_feed(&params(SortBy::Latest, 99, 10))
        .await
        .unwrap();

    assert!(page.posts.is_empty());
    assert_eq!(page.pagination.page, 99);
    assert_eq!(page.pagination.total, 1);
    assert_eq!(page.pagination.total_pages, 1);
}

#[tokio::test]
async fn test_trending_bookmark_outranks_like() {
    let (db, _tmp) = setup_db().await;
    let author = seed_user(&db, "author").await;
    let fan = seed_user(&db, "fan").await;

    let bookmarked = seed_post(&db, author, "bookmarked", &[], true).await;
    let liked = seed_post(&db, author, "liked", &[], true).await;

    // Identical age and views; the only difference is one bookmark vs one like.
    let when = chrono::Utc::now();
    set_published_at(&db, bookmarked, when).await;
    set_published_at(&db, liked, when).await;

    insert_bookmark(db.pool(), bookmarked, fan).await.unwrap();
    insert_like(db.pool(), liked, fan).await.unwrap();

    let service = FeedService::new(db, None);
    let page = service
        .get_feed(&params(SortBy::Trending, 1, 10))
        .await
        .unwrap();

    assert_eq!(page.posts[0].title, "bookmarked");
    assert_eq!(page.posts[1].title, "liked");
}

#[tokio::test]
async fn test_trending_newer_outranks_older_at_equal_engagement() {
    let (db, _tmp) = setup_db().await;
    let author = seed_user(&db, "author").await;
    let fan = seed_user(&db, "fan").await;

    let old = seed_post(&db, author, "old", &[], true).await;
    let fresh = seed_post(&db, author, "fresh", &[], true).await;

    let now = chrono::Utc::now();
    set_published_at(&db, old, now - chrono::Duration::hours(72)).await;
    set_published_at(&db, fresh, now).await;

    for post in [old, fresh] {
        insert_like(db.pool(), post, fan).await.unwrap();
        set_view_count(&db, post, 40).await;
    }

    let service = FeedService::new(db, None);
    let page = service
        .get_feed(&params(SortBy::Trending, 1, 10))
        .await
        .unwrap();

    assert_eq!(page.posts[0].title, "fresh");
}

#[tokio::test]
async fn test_search_never_writes_cache() {
    let (db, _tmp) = setup_db().await;
    let author = seed_user(&db, "author").await;
    seed_post(&db, author, "Rust engine", &[], true).await;

    let cache = Arc::new(RecordingCache::default());
    let service = FeedService::new(db, Some(cache.clone()));

    let searchy = FeedParams::new(
        None,
        None,
        SortBy::Latest,
        FeedFilter {
            search: Some("rust".to_string()),
            ..FeedFilter::default()
        },
    );

    for _ in 0..3 {
        let page = service.get_feed(&searchy).await.unwrap();
        assert_eq!(page.posts.len(), 1);
    }

    assert_eq!(cache.sets.load(Ordering::SeqCst), 0);

    // A cacheable query does write.
    service
        .get_feed(&params(SortBy::Latest, 1, 10))
        .await
        .unwrap();
    assert_eq!(cache.sets.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_open_to_work_filter_skips_cache() {
    let (db, _tmp) = setup_db().await;
    let author = seed_user(&db, "author").await;
    seed_post(&db, author, "anything", &[], true).await;

    let cache = Arc::new(RecordingCache::default());
    let service = FeedService::new(db, Some(cache.clone()));

    let viewer_scoped = FeedParams::new(
        None,
        None,
        SortBy::Latest,
        FeedFilter {
            is_open_to_work: Some(true),
            ..FeedFilter::default()
        },
    );

    service.get_feed(&viewer_scoped).await.unwrap();
    assert_eq!(cache.sets.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cached_page_is_returned_verbatim_within_ttl() {
    let (db, _tmp) = setup_db().await;
    let author = seed_user(&db, "author").await;
    seed_post(&db, author, "original", &[], true).await;

    let service = FeedService::new(db.clone(), Some(Arc::new(MemoryCache::new())));

    let first = service.get_feed(&params(SortBy::Latest, 1, 10)).await.unwrap();
    assert_eq!(first.pagination.total, 1);

    // Mutate behind the cache's back; the next read must still serve the
    // memoized page.
    seed_post(&db, author, "sneaky", &[], true).await;

    let second = service.get_feed(&params(SortBy::Latest, 1, 10)).await.unwrap();
    assert_eq!(second.pagination.total, 1);
    assert_eq!(second.posts.len(), 1);
}

#[tokio::test]
async fn test_invalidation_exposes_mutations() {
    let (db, _tmp) = setup_db().await;
    let author = seed_user(&db, "author").await;
    let post = seed_post(&db, author, "before", &[], true).await;

    let service = FeedService::new(db.clone(), Some(Arc::new(MemoryCache::new())));

    let page = service.get_feed(&params(SortBy::Latest, 1, 10)).await.unwrap();
    assert_eq!(page.posts[0].title, "before");

    service.invalidate_feed_cache().await;
    sqlx::query("UPDATE posts SET title = 'after' WHERE id = ?")
        .bind(post)
        .execute(db.pool())
        .await
        .unwrap();

    let page = service.get_feed(&params(SortBy::Latest, 1, 10)).await.unwrap();
    assert_eq!(page.posts[0].title, "after");
}

#[tokio::test]
async fn test_trending_results_are_cached_too() {
    let (db, _tmp) = setup_db().await;
    let author = seed_user(&db, "author").await;
    seed_post(&db, author, "trendy", &[], true).await;

    let cache = Arc::new(RecordingCache::default());
    let service = FeedService::new(db, Some(cache.clone()));

    service.get_feed(&params(SortBy::Trending, 1, 10)).await.unwrap();
    service.get_feed(&params(SortBy::Trending, 1, 10)).await.unwrap();

    // One write; the second call was a hit.
    assert_eq!(cache.sets.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_editor_picks_capped_at_five() {
    let (db, _tmp) = setup_db().await;
    let author = seed_user(&db, "author").await;

    for i in 0..7 {
        let id = seed_post(&db, author, &format!("pick-{i}"), &[], true).await;
        set_editor_pick(db.pool(), id, true).await.unwrap();
    }
    seed_post(&db, author, "not-picked", &[], true).await;

    let service = FeedService::new(db, None);
    let picks = service.get_editor_picks().await.unwrap();

    assert_eq!(picks.len(), 5);
    assert!(picks.iter().all(|p| p.is_editor_pick));
}

#[tokio::test]
async fn test_trending_tags_count_presence_not_engagement() {
    let (db, _tmp) = setup_db().await;
    let author = seed_user(&db, "author").await;
    let fan = seed_user(&db, "fan").await;

    let react_post = seed_post(&db, author, "a", &["React", "Node"], true).await;
    seed_post(&db, author, "b", &["React"], true).await;
    seed_post(&db, author, "c", &["Vue"], true).await;
    seed_post(&db, author, "unpublished", &["Svelte"], false).await;

    let service = FeedService::new(db.clone(), None);

    let before = service.get_trending_tags().await.unwrap();
    insert_like(db.pool(), react_post, fan).await.unwrap();
    let after = service.get_trending_tags().await.unwrap();

    // Likes move nothing: tags count tech-stack presence only.
    assert_eq!(
        serde_json::to_string(&before).unwrap(),
        serde_json::to_string(&after).unwrap()
    );

    assert_eq!(after[0].tag, "React");
    assert_eq!(after[0].count, 2);
    assert!(!after.iter().any(|t| t.tag == "Svelte"));
}
