use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use super::{ApiError, AppState};
use crate::db::FeedFilter;
use crate::feed::{FeedPage, FeedParams, PostView, SortBy, TagCount};

/// Raw feed query parameters. Everything arrives as strings and is coerced,
/// never rejected: bad numbers fall back to defaults, unknown sort modes
/// fall back to latest.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedQuery {
    page: Option<String>,
    limit: Option<String>,
    sort_by: Option<String>,
    tech_stack: Option<String>,
    skills: Option<String>,
    category: Option<String>,
    profession: Option<String>,
    is_team_project: Option<String>,
    is_open_to_work: Option<String>,
    search: Option<String>,
}

impl FeedQuery {
    fn into_params(self) -> FeedParams {
        let filter = FeedFilter {
            tech_stack: split_csv(self.tech_stack.as_deref()),
            skills: split_csv(self.skills.as_deref()),
            category: self.category.filter(|s| !s.is_empty()),
            profession: self.profession.filter(|s| !s.is_empty()),
            is_team_project: self.is_team_project.as_deref().and_then(parse_flag),
            is_open_to_work: self.is_open_to_work.as_deref().and_then(parse_flag),
            search: self.search.filter(|s| !s.is_empty()),
        };

        FeedParams::new(
            self.page.and_then(|p| p.parse().ok()),
            self.limit.and_then(|l| l.parse().ok()),
            SortBy::parse(self.sort_by.as_deref()),
            filter,
        )
    }
}

fn split_csv(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// GET /feed
pub async fn get_feed(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<FeedPage>, ApiError> {
    let params = query.into_params();
    let page = state.feed.get_feed(&params).await?;
    Ok(Json(page))
}

/// GET /feed/editor-picks
pub async fn editor_picks(
    State(state): State<AppState>,
) -> Result<Json<Vec<PostView>>, ApiError> {
    let picks = state.feed.get_editor_picks().await?;
    Ok(Json(picks))
}

/// GET /feed/trending-tags
pub async fn trending_tags(
    State(state): State<AppState>,
) -> Result<Json<Vec<TagCount>>, ApiError> {
    let tags = state.feed.get_trending_tags().await?;
    Ok(Json(tags))
}
