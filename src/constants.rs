/// User agent for outbound LLM API requests.
pub const API_USER_AGENT: &str = "portlink/0.1 (+https://portlink.dev)";

/// Feed page cache TTL in seconds.
pub const FEED_CACHE_TTL_SECS: u64 = 300;

/// Editor picks cache TTL in seconds.
pub const EDITOR_PICKS_TTL_SECS: u64 = 600;

/// Trending tags cache TTL in seconds.
pub const TRENDING_TAGS_TTL_SECS: u64 = 1800;
