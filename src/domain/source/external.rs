use crate::domain::publisher::Publisher;
use crate::domain::source::{id_at, require_endpoint, text_at, Source, SourceContext};
use crate::domain::story::Story;
use crate::infra::api::graphql::GraphqlClient;
use crate::infra::parser::parse_date;
use crate::types::{SourceError, SourceResult};
use anyhow::Context;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{info, warn};

pub const MM_PARTNERS_QUERY: &str = r#"
query Partners {
  partners {
    id
    name
    slug
  }
}
"#;

pub const MM_EXTERNALS_QUERY: &str = r#"
query Externals($partnerId: ID, $take: Int) {
  externals(
    where: { partner: { id: { equals: $partnerId } } }
    orderBy: { id: desc }
    take: $take
  ) {
    id
    source
    title
    brief
    content
    publishedDate
    thumb
  }
}
"#;

/// 提携媒体の記事1件と、その記事を載せる媒体ID
#[derive(Debug, Clone)]
pub struct ExternalItem {
    pub publisher_id: i64,
    pub record: Value,
}

/// 鏡週刊経由で配信される提携媒体（全媒体で1ユニット）
pub struct ExternalSource {
    pub publishers: Vec<Publisher>,
}

impl ExternalSource {
    pub fn new(publishers: Vec<Publisher>) -> Self {
        Self { publishers }
    }

    async fn fetch_externals(
        &self,
        client: &dyn GraphqlClient,
        endpoint: &str,
        partners: &HashMap<String, Value>,
        publisher: &Publisher,
        take: i64,
    ) -> SourceResult<Vec<ExternalItem>> {
        let slug = publisher.feed.trim().to_lowercase();
        let partner_id = partners
            .get(&slug)
            .ok_or_else(|| SourceError::partner_not_found(slug.clone()))?;

        let data = client
            .query(
                endpoint,
                MM_EXTERNALS_QUERY,
                Some(json!({ "partnerId": partner_id, "take": take })),
            )
            .await
            .with_context(|| format!("提携媒体: {}", slug))
            .map_err(|e| SourceError::graphql("Externals", e))?;

        let records = match data.get("externals") {
            Some(Value::Array(records)) => records.clone(),
            _ => Vec::new(),
        };
        Ok(records
            .into_iter()
            .map(|record| ExternalItem {
                publisher_id: publisher.id,
                record,
            })
            .collect())
    }
}

/// 提携媒体の slug（小文字）→ 提携媒体ID
pub async fn fetch_partner_mapping(
    client: &dyn GraphqlClient,
    endpoint: &str,
) -> SourceResult<HashMap<String, Value>> {
    let data = client
        .query(endpoint, MM_PARTNERS_QUERY, None)
        .await
        .map_err(|e| SourceError::graphql("Partners", e))?;

    let mapping = data
        .get("partners")
        .and_then(Value::as_array)
        .map(|partners| {
            partners
                .iter()
                .filter_map(|p| {
                    let slug = p.get("slug").and_then(Value::as_str)?;
                    let id = p.get("id").filter(|id| !id.is_null())?;
                    Some((slug.to_lowercase(), id.clone()))
                })
                .collect()
        })
        .unwrap_or_default();
    Ok(mapping)
}

#[async_trait]
impl Source for ExternalSource {
    type Raw = ExternalItem;

    fn label(&self) -> String {
        format!("mm_external:{}媒体", self.publishers.len())
    }

    /// 提携先一覧の取得に失敗した場合はユニット全体が失敗する。
    /// 個々の媒体の失敗はログに残し、残りの媒体の処理を続ける
    async fn fetch(&self, ctx: &SourceContext) -> SourceResult<Vec<ExternalItem>> {
        let endpoint = require_endpoint(&ctx.config.mm_gql_endpoint, "MM_GQL_ENDPOINT")?;
        let client = ctx.gql.as_ref();
        let partners = fetch_partner_mapping(client, endpoint).await?;

        let mut items = Vec::new();
        for publisher in &self.publishers {
            match self
                .fetch_externals(client, endpoint, &partners, publisher, ctx.config.mm_external_take)
                .await
            {
                Ok(mut fetched) => {
                    info!(publisher = %publisher, externals = fetched.len(), "提携媒体の記事を取得");
                    items.append(&mut fetched);
                }
                Err(e) => warn!(publisher = %publisher, error = %e, "提携媒体の取得に失敗、スキップ"),
            }
        }
        Ok(items)
    }

    fn normalize(&self, item: ExternalItem, _ctx: &SourceContext) -> Option<Story> {
        let ExternalItem {
            publisher_id,
            record,
        } = item;

        let url = text_at(&record, &["source"]);
        if url.is_empty() {
            warn!(id = id_at(&record, "id"), "記事URLのない提携記事をスキップ");
            return None;
        }

        let mut story = Story::new(publisher_id, url, text_at(&record, &["title"]));
        story.og_title = story.title.clone();
        story.og_image = text_at(&record, &["thumb"]).to_string();
        story.summary = text_at(&record, &["brief"]).to_string();
        story.og_description = story.summary.clone();
        story.content = text_at(&record, &["content"]).to_string();
        story.published_date = parse_date(text_at(&record, &["publishedDate"])).ok();
        story.origid = id_at(&record, "id");

        Some(story)
    }
}
