use crate::{
    domain::{
        dedup::filter_new_stories,
        publisher::{fetch_publishers, group_publishers, PublisherGroups},
        source::{ExternalSource, FeedSource, MirrorSource, ReadrSource, RssSource, SourceContext},
        story::{Story, StoryWriter},
    },
    infra::api::{graphql::GraphqlClient, http::HttpClient},
    types::{FeedReport, FeederConfig, PipelineError, PipelineResult},
};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// フィード取り込みのメイン処理（依存性を注入）
///
/// 1. コンテンツAPIから媒体一覧を取得し、種別ごとに振り分け
/// 2. 媒体ごとの取得ユニットを並行実行して候補記事を集める
/// 3. 保存済みURLを除外
/// 4. 残りを1件ずつ保存し、保存できたURLを返す
pub struct FeedDispatcher {
    ctx: Arc<SourceContext>,
    writer: Arc<dyn StoryWriter>,
}

impl FeedDispatcher {
    pub fn new(
        config: FeederConfig,
        http: Arc<dyn HttpClient>,
        gql: Arc<dyn GraphqlClient>,
        writer: Arc<dyn StoryWriter>,
    ) -> Self {
        Self {
            ctx: Arc::new(SourceContext::new(config, http, gql)),
            writer,
        }
    }

    pub async fn run(&self) -> PipelineResult<FeedReport> {
        info!("=== フィード取り込み開始 ===");
        let config = &self.ctx.config;

        let publishers = fetch_publishers(self.ctx.gql.as_ref(), &config.mesh_gql_endpoint)
            .await
            .map_err(PipelineError::publisher_directory)?;
        info!(publishers = publishers.len(), "媒体一覧の読み込み完了");

        let units = plan_units(group_publishers(publishers));
        let candidates = self.fetch_all(units).await;
        let fetched = candidates.len();

        let filtered = filter_new_stories(
            self.ctx.gql.as_ref(),
            &config.mesh_gql_endpoint,
            candidates,
        )
        .await?;
        let remaining = filtered.len();

        let persisted = if filtered.is_empty() {
            info!("保存対象の記事なし");
            Vec::new()
        } else {
            self.writer.write_stories(&filtered).await?
        };

        let report = FeedReport::new(fetched, remaining, persisted);
        info!(%report, "=== フィード取り込み完了 ===");
        Ok(report)
    }

    /// 取得ユニットを並行に実行し、全ユニットの結果をまとめる
    ///
    /// ユニット内の失敗はそのユニットの結果を空にするだけで、他のユニットには影響しない。
    pub async fn fetch_all(&self, units: Vec<FeedSource>) -> Vec<Story> {
        let mut set = JoinSet::new();

        for unit in units {
            let ctx = Arc::clone(&self.ctx);
            set.spawn(async move {
                let label = unit.label();
                match unit.run(&ctx).await {
                    Ok(stories) => {
                        info!(unit = %label, stories = stories.len(), "取得完了");
                        stories
                    }
                    Err(e) => {
                        warn!(unit = %label, error = %e, "取得に失敗、このユニットは空として扱う");
                        Vec::new()
                    }
                }
            });
        }

        let mut stories = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(mut fetched) => stories.append(&mut fetched),
                Err(e) => error!(error = %e, "取得ユニットが異常終了"),
            }
        }
        stories
    }
}

/// 媒体の振り分け結果から取得ユニットを組み立てる
///
/// RSS・CMS媒体は1媒体1ユニット、提携媒体は全体で1ユニット。
pub fn plan_units(groups: PublisherGroups) -> Vec<FeedSource> {
    let PublisherGroups {
        syndication,
        readr,
        mirror_media,
        external,
        ignored,
    } = groups;
    if ignored > 0 {
        info!(ignored, "未対応の種別の媒体を無視");
    }

    let mut units: Vec<FeedSource> = syndication
        .into_iter()
        .map(|p| FeedSource::Syndication(RssSource::new(p)))
        .chain(readr.into_iter().map(|p| FeedSource::Readr(ReadrSource::new(p))))
        .chain(
            mirror_media
                .into_iter()
                .map(|p| FeedSource::MirrorMedia(MirrorSource::new(p))),
        )
        .collect();

    if !external.is_empty() {
        units.push(FeedSource::External(ExternalSource::new(external)));
    }
    units
}
