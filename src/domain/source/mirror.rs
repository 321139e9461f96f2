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
use tracing::{debug, info, warn};

pub const MM_POSTS_QUERY: &str = r#"
query MirrorMediaPosts($take: Int) {
  posts(where: { state: { equals: "published" } }, take: $take, orderBy: [{ id: desc }]) {
    id
    style
    slug
    title
    publishedDate
    heroImage {
      resized {
        w800
      }
    }
    brief
    content
    apiData
  }
}
"#;

/// 鏡週刊 CMSの最新記事
pub struct MirrorSource {
    pub publisher: Publisher,
}

impl MirrorSource {
    pub fn new(publisher: Publisher) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl Source for MirrorSource {
    type Raw = Value;

    fn label(&self) -> String {
        format!("mirrormedia:{}", self.publisher)
    }

    async fn fetch(&self, ctx: &SourceContext) -> SourceResult<Vec<Value>> {
        let endpoint = require_endpoint(&ctx.config.mm_gql_endpoint, "MM_GQL_ENDPOINT")?;

        let data = ctx
            .gql
            .query(
                endpoint,
                MM_POSTS_QUERY,
                Some(json!({ "take": ctx.config.mm_take })),
            )
            .await
            .map_err(|e| SourceError::graphql("MirrorMediaPosts", e))?;

        let posts = match data.get("posts") {
            Some(Value::Array(posts)) => posts.clone(),
            _ => Vec::new(),
        };
        info!(publisher = %self.publisher, posts = posts.len(), "鏡週刊の記事を取得");
        Ok(posts)
    }

    fn normalize(&self, post: Value, _ctx: &SourceContext) -> Option<Story> {
        let slug = text_at(&post, &["slug"]).trim();
        if slug.is_empty() {
            debug!(id = id_at(&post, "id"), "slugのない記事をスキップ");
            return None;
        }
        if self.publisher.official_site.is_empty() {
            warn!(publisher = %self.publisher, "公式サイトURLが未設定のためスキップ");
            return None;
        }

        let mut story = Story::new(
            self.publisher.id,
            join_url(&self.publisher.official_site, &format!("story/{}", slug)),
            text_at(&post, &["title"]),
        );

        story.content = draft_text(post.get("content").unwrap_or(&Value::Null));
        story.summary = draft_text(post.get("brief").unwrap_or(&Value::Null));
        if story.summary.is_empty() {
            story.summary = story.content.clone();
        }
        story.full_content = has_embedded_widget(&story.content);

        story.og_title = story.title.clone();
        story.og_description = story.summary.clone();
        story.og_image = text_at(&post, &["heroImage", "resized", "w800"]).to_string();

        story.published_date = parse_date(text_at(&post, &["publishedDate"])).ok();
        story.api_data = non_null(&post, "apiData");
        story.origid = id_at(&post, "id");

        Some(story)
    }
}
