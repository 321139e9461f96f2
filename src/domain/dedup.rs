use crate::domain::story::Story;
use crate::infra::api::graphql::GraphqlClient;
use crate::types::{PipelineError, PipelineResult};
use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::info;

pub const EXISTING_STORIES_QUERY: &str = r#"
query ExistingStories($urls: [String!]) {
  stories(where: { url: { in: $urls } }) {
    url
  }
}
"#;

/// 候補URLのうち、既に保存済みのものを1回のクエリでまとめて照会する
pub async fn search_existing_urls(
    client: &dyn GraphqlClient,
    endpoint: &str,
    urls: &[String],
) -> Result<HashSet<String>> {
    if urls.is_empty() {
        return Ok(HashSet::new());
    }

    let unique: Vec<&str> = urls
        .iter()
        .map(String::as_str)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let data = client
        .query(endpoint, EXISTING_STORIES_QUERY, Some(json!({ "urls": unique })))
        .await
        .context("既存記事の照会クエリに失敗")?;

    let existing = data
        .get("stories")
        .and_then(Value::as_array)
        .map(|stories| {
            stories
                .iter()
                .filter_map(|s| s.get("url").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(existing)
}

/// 既存URLと一致する記事を取り除く。候補同士の重複はここでは扱わない
pub fn remove_existing(stories: Vec<Story>, existing: &HashSet<String>) -> Vec<Story> {
    stories
        .into_iter()
        .filter(|story| !existing.contains(&story.url))
        .collect()
}

/// 候補記事から保存済みの記事を除外する
///
/// 照会に失敗した場合は重複の判定ができないため、パイプライン全体を止める。
pub async fn filter_new_stories(
    client: &dyn GraphqlClient,
    endpoint: &str,
    stories: Vec<Story>,
) -> PipelineResult<Vec<Story>> {
    if stories.is_empty() {
        return Ok(stories);
    }

    let urls: Vec<String> = stories.iter().map(|s| s.url.clone()).collect();
    let existing = search_existing_urls(client, endpoint, &urls)
        .await
        .map_err(PipelineError::existing_url_lookup)?;

    let candidates = stories.len();
    let filtered = remove_existing(stories, &existing);
    info!(
        candidates,
        existing = existing.len(),
        remaining = filtered.len(),
        "既存記事を除外"
    );
    Ok(filtered)
}
