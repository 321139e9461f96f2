use crate::domain::story::model::Story;
use crate::infra::api::graphql::GraphqlClient;
use crate::types::{PipelineError, PipelineResult};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use sqlx::types::Json;
use sqlx::{Connection, PgPool};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

pub const CREATE_STORIES_MUTATION: &str = r#"
mutation CreateStories($data: [StoryCreateInput!]!) {
  createStories(data: $data) {
    id
    url
  }
}
"#;

/// 記事の保存先
///
/// 1件ごとに失敗を切り離し、保存できた記事のURLだけを返す。
/// 保存先全体が使えない（接続・コミット失敗）場合のみエラーになる。
#[async_trait]
pub trait StoryWriter: Send + Sync {
    async fn write_stories(&self, stories: &[Story]) -> PipelineResult<Vec<String>>;
}

/// PostgreSQLの `"Story"` テーブルへ直接書き込む
pub struct PgStoryWriter {
    pool: PgPool,
}

impl PgStoryWriter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StoryWriter for PgStoryWriter {
    /// 1接続・1トランザクションで逐次INSERTする。
    /// 行ごとにSAVEPOINTを張り、失敗した行だけを巻き戻して次へ進む。
    async fn write_stories(&self, stories: &[Story]) -> PipelineResult<Vec<String>> {
        if stories.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PipelineError::database("トランザクションの開始", e))?;
        let mut persisted = Vec::with_capacity(stories.len());

        for story in stories {
            let mut savepoint = Connection::begin(&mut *tx)
                .await
                .map_err(|e| PipelineError::database("SAVEPOINTの作成", e))?;

            let inserted = sqlx::query_scalar::<_, i32>(
                r#"
                INSERT INTO "Story" (
                    source, title, url, full_content, summary, content,
                    og_title, og_description, og_image, published_date,
                    "createdAt", "apiData", origid
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                RETURNING id
                "#,
            )
            .bind(story.source)
            .bind(&story.title)
            .bind(&story.url)
            .bind(story.full_content)
            .bind(&story.summary)
            .bind(&story.content)
            .bind(&story.og_title)
            .bind(&story.og_description)
            .bind(&story.og_image)
            .bind(story.published_date)
            .bind(Utc::now())
            .bind(story.api_data.clone().map(Json))
            .bind(story.origid)
            .fetch_one(&mut *savepoint)
            .await;

            match inserted {
                Ok(id) => {
                    savepoint
                        .commit()
                        .await
                        .map_err(|e| PipelineError::database("SAVEPOINTの解放", e))?;
                    debug!(id, url = %story.url, "記事を保存");
                    persisted.push(story.url.clone());
                }
                Err(e) => {
                    warn!(url = %story.url, error = %e, "記事の保存に失敗、スキップ");
                    savepoint
                        .rollback()
                        .await
                        .map_err(|e| PipelineError::database("SAVEPOINTの巻き戻し", e))?;
                }
            }
        }

        tx.commit()
            .await
            .map_err(|e| PipelineError::database("トランザクションのコミット", e))?;

        info!(
            persisted = persisted.len(),
            skipped = stories.len() - persisted.len(),
            "データベースへの保存完了"
        );
        Ok(persisted)
    }
}

/// コンテンツAPIの `createStories` ミューテーションで保存する
///
/// `batch_size` 件ずつ送信し、失敗したバッチはログに残して読み飛ばす。
pub struct GraphqlStoryWriter {
    client: Arc<dyn GraphqlClient>,
    endpoint: String,
    batch_size: usize,
}

impl GraphqlStoryWriter {
    pub fn new<E: Into<String>>(client: Arc<dyn GraphqlClient>, endpoint: E, batch_size: usize) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            batch_size: batch_size.max(1),
        }
    }
}

#[async_trait]
impl StoryWriter for GraphqlStoryWriter {
    async fn write_stories(&self, stories: &[Story]) -> PipelineResult<Vec<String>> {
        let mut persisted = Vec::with_capacity(stories.len());

        for (index, batch) in stories.chunks(self.batch_size).enumerate() {
            let created_at = Utc::now();
            let data: Vec<_> = batch.iter().map(|s| s.to_create_input(created_at)).collect();

            match self
                .client
                .query(&self.endpoint, CREATE_STORIES_MUTATION, Some(json!({ "data": data })))
                .await
            {
                Ok(response) => {
                    let created: Vec<String> = response
                        .get("createStories")
                        .and_then(Value::as_array)
                        .map(|rows| {
                            rows.iter()
                                .filter_map(|r| r.get("url").and_then(Value::as_str))
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default();
                    debug!(batch = index, count = created.len(), "バッチを保存");
                    persisted.extend(created);
                }
                Err(e) => {
                    warn!(batch = index, count = batch.len(), error = %e, "バッチの保存に失敗、スキップ");
                }
            }
        }

        info!(
            persisted = persisted.len(),
            skipped = stories.len().saturating_sub(persisted.len()),
            "コンテンツAPIへの保存完了"
        );
        Ok(persisted)
    }
}

/// テスト用のインメモリ保存先
///
/// URLの一意制約を再現し、既に保存済みのURLや `rejecting` で指定したURLは保存を拒否する。
#[derive(Default)]
pub struct MemoryStoryWriter {
    stored: Mutex<Vec<Story>>,
    rejected_urls: HashSet<String>,
    fail_commit: bool,
}

impl MemoryStoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 指定URLの保存を失敗させる
    pub fn rejecting<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rejected_urls: urls.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// コミットに失敗する保存先
    pub fn failing_commit() -> Self {
        Self {
            fail_commit: true,
            ..Self::default()
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.stored
            .lock()
            .map(|stored| stored.iter().any(|s| s.url == url))
            .unwrap_or(false)
    }

    pub fn stored(&self) -> Vec<Story> {
        self.stored.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl StoryWriter for MemoryStoryWriter {
    async fn write_stories(&self, stories: &[Story]) -> PipelineResult<Vec<String>> {
        if self.fail_commit {
            return Err(PipelineError::database(
                "トランザクションのコミット",
                sqlx::Error::PoolClosed,
            ));
        }

        let mut stored = self
            .stored
            .lock()
            .map_err(|_| PipelineError::database("インメモリ保存先のロック", sqlx::Error::PoolClosed))?;
        let mut persisted = Vec::new();

        for story in stories {
            let duplicated = stored.iter().any(|s| s.url == story.url);
            if duplicated || self.rejected_urls.contains(&story.url) {
                warn!(url = %story.url, "記事の保存に失敗、スキップ");
                continue;
            }
            let mut row = story.clone();
            row.created_at = Some(Utc::now());
            stored.push(row);
            persisted.push(story.url.clone());
        }

        Ok(persisted)
    }
}
