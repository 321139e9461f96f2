use crate::domain::publisher::Publisher;
use crate::domain::source::{
    draft_text, has_embedded_widget, id_at, join_url, non_null, require_endpoint, text_at, Source,
    SourceContext,
};
use crate::domain::story::Story;
use crate::infra::parser::parse_date;
use crate::types::{SourceError, SourceResult};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

pub const READR_POSTS_QUERY: &str = r#"
query ReadrPosts($take: Int) {
  posts(
    where: { state: { equals: "published" }, publishTime: { not: null } }
    take: $take
    orderBy: [{ id: desc }]
  ) {
    id
    name
    style
    summary
    content
    publishTime
    heroImage {
      resized {
        w800
      }
    }
    ogImage {
      resized {
        w800
      }
    }
    apiData
  }
}
"#;

/// READr CMSの最新記事
pub struct ReadrSource {
    pub publisher: Publisher,
}

impl ReadrSource {
    pub fn new(publisher: Publisher) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl Source for ReadrSource {
    type Raw = Value;

    fn label(&self) -> String {
        format!("readr:{}", self.publisher)
    }

    async fn fetch(&self, ctx: &SourceContext) -> SourceResult<Vec<Value>> {
        let endpoint = require_endpoint(&ctx.config.readr_gql_endpoint, "READR_GQL_ENDPOINT")?;
        require_endpoint(&ctx.config.readr_url, "READR_URL")?;

        let data = ctx
            .gql
            .query(
                endpoint,
                READR_POSTS_QUERY,
                Some(json!({ "take": ctx.config.readr_take })),
            )
            .await
            .map_err(|e| SourceError::graphql("ReadrPosts", e))?;

        let posts = match data.get("posts") {
            Some(Value::Array(posts)) => posts.clone(),
            _ => Vec::new(),
        };
        info!(publisher = %self.publisher, posts = posts.len(), "READrの記事を取得");
        Ok(posts)
    }

    fn normalize(&self, post: Value, ctx: &SourceContext) -> Option<Story> {
        let id = id_at(&post, "id");
        if id == 0 {
            warn!(publisher = %self.publisher, "IDのない記事をスキップ");
            return None;
        }
        let base = ctx.config.readr_url.as_deref().unwrap_or_default();

        let mut story = Story::new(
            self.publisher.id,
            join_url(base, &format!("post/{}", id)),
            text_at(&post, &["name"]),
        );

        story.content = draft_text(post.get("content").unwrap_or(&Value::Null));
        story.summary = draft_text(post.get("summary").unwrap_or(&Value::Null));
        if story.summary.is_empty() {
            story.summary = story.content.clone();
        }
        story.full_content = has_embedded_widget(&story.content);

        let hero = text_at(&post, &["heroImage", "resized", "w800"]);
        let og = text_at(&post, &["ogImage", "resized", "w800"]);
        let image = if hero.is_empty() { og } else { hero };
        story.og_image = image.to_string();
        story.og_title = story.title.clone();
        story.og_description = story.summary.clone();

        story.published_date = parse_date(text_at(&post, &["publishTime"])).ok();
        story.api_data = non_null(&post, "apiData");
        story.origid = id;

        Some(story)
    }
}
