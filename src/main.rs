use anyhow::Result;
use mesh_feeder::{
    app::FeedDispatcher,
    domain::story::{GraphqlStoryWriter, PgStoryWriter, StoryWriter},
    infra::{
        api::{graphql::ReqwestGraphqlClient, http::ReqwestHttpClient},
        db::{create_pool, setup_database},
    },
    types::{FeederConfig, WriterKind},
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("mesh_feeder=info".parse()?);
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

async fn build_writer(
    config: &FeederConfig,
    gql: Arc<ReqwestGraphqlClient>,
) -> Result<Arc<dyn StoryWriter>> {
    let writer: Arc<dyn StoryWriter> = match config.writer {
        WriterKind::Postgres => {
            let database_url = config.require_database_url()?;
            let pool = if config.run_migrations {
                setup_database(database_url).await?
            } else {
                create_pool(database_url).await?
            };
            Arc::new(PgStoryWriter::new(pool))
        }
        WriterKind::Graphql => Arc::new(GraphqlStoryWriter::new(
            gql,
            config.mesh_gql_endpoint.clone(),
            config.batch_size,
        )),
    };
    Ok(writer)
}

#[tokio::main]
async fn main() -> Result<()> {
    // 環境変数を読み込み（.envファイルがあれば使用）
    let _ = dotenvy::dotenv();
    init_tracing()?;

    let config = FeederConfig::from_env()?;
    info!(writer = ?config.writer, enrichment = ?config.enrichment, "設定の読み込み完了");

    let http = Arc::new(ReqwestHttpClient::new());
    let gql = Arc::new(ReqwestGraphqlClient::new(config.http_timeout_secs));
    let writer = build_writer(&config, gql.clone()).await?;

    let dispatcher = FeedDispatcher::new(config, http, gql, writer);
    let report = dispatcher.run().await?;

    println!("export {} stories onto db successfully", report.persisted());
    Ok(())
}
