//! 媒体種別ごとの取得・正規化処理
//!
//! 取得ユニット（RSS/CMS媒体ごとに1つ、提携媒体はまとめて1つ）は
//! `fetch` で生データを集め、`normalize` で1件ずつ `Story` に変換する。

pub mod external;
pub mod mirror;
pub mod readr;
pub mod syndication;

use crate::domain::story::{FetchResult, Story};
use crate::infra::api::graphql::GraphqlClient;
use crate::infra::api::http::HttpClient;
use crate::types::{FeederConfig, SourceError, SourceResult};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub use self::external::ExternalSource;
pub use self::mirror::MirrorSource;
pub use self::readr::ReadrSource;
pub use self::syndication::RssSource;

/// 埋め込みウィジェットを含む本文の目印
pub const EMBEDDED_WIDGET_MARKER: &str = "embeddedCode";

/// 取得ユニットが共有するクライアントと設定
pub struct SourceContext {
    pub config: FeederConfig,
    pub http: Arc<dyn HttpClient>,
    pub gql: Arc<dyn GraphqlClient>,
}

impl SourceContext {
    pub fn new(config: FeederConfig, http: Arc<dyn HttpClient>, gql: Arc<dyn GraphqlClient>) -> Self {
        Self { config, http, gql }
    }
}

/// 取得元の共通インターフェース
#[async_trait]
pub trait Source: Send + Sync {
    /// 正規化前の1件分のデータ
    type Raw: Send;

    /// ログ用の名前
    fn label(&self) -> String;

    async fn fetch(&self, ctx: &SourceContext) -> SourceResult<Vec<Self::Raw>>;

    /// 1件を変換する。URLが組み立てられない項目は `None` で読み飛ばす
    fn normalize(&self, raw: Self::Raw, ctx: &SourceContext) -> Option<Story>;
}

async fn collect<S: Source>(source: &S, ctx: &SourceContext) -> SourceResult<FetchResult> {
    let raws = source.fetch(ctx).await?;
    Ok(raws
        .into_iter()
        .filter_map(|raw| source.normalize(raw, ctx))
        .collect())
}

/// 取得ユニット
pub enum FeedSource {
    Syndication(RssSource),
    Readr(ReadrSource),
    MirrorMedia(MirrorSource),
    External(ExternalSource),
}

impl FeedSource {
    pub fn label(&self) -> String {
        match self {
            Self::Syndication(s) => s.label(),
            Self::Readr(s) => s.label(),
            Self::MirrorMedia(s) => s.label(),
            Self::External(s) => s.label(),
        }
    }

    pub async fn run(&self, ctx: &SourceContext) -> SourceResult<FetchResult> {
        match self {
            Self::Syndication(s) => collect(s, ctx).await,
            Self::Readr(s) => collect(s, ctx).await,
            Self::MirrorMedia(s) => collect(s, ctx).await,
            Self::External(s) => collect(s, ctx).await,
        }
    }
}

/// 必須のエンドポイント設定を取り出す
pub(crate) fn require_endpoint<'a>(value: &'a Option<String>, name: &str) -> SourceResult<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| SourceError::missing_endpoint(name))
}

/// JSONのパスをたどって文字列を取り出す。見つからなければ空文字
pub(crate) fn text_at<'a>(value: &'a Value, path: &[&str]) -> &'a str {
    path.iter()
        .try_fold(value, |v, key| v.get(key))
        .and_then(Value::as_str)
        .unwrap_or("")
}

/// 数値・文字列どちらのIDも整数にする。解釈できなければ0
pub(crate) fn id_at(value: &Value, key: &str) -> i64 {
    match value.get(key) {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// draft.js形式の本文から各ブロックのテキストを連結する
///
/// JSON文字列で届いた場合は解釈してから処理し、解釈できない文字列はそのまま本文とみなす。
pub(crate) fn draft_text(value: &Value) -> String {
    match value {
        Value::Object(_) => value
            .get("blocks")
            .and_then(Value::as_array)
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|b| b.get("text").and_then(Value::as_str))
                    .collect::<String>()
            })
            .unwrap_or_default(),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(parsed @ Value::Object(_)) => draft_text(&parsed),
            _ => s.clone(),
        },
        _ => String::new(),
    }
}

pub(crate) fn has_embedded_widget(content: &str) -> bool {
    content.contains(EMBEDDED_WIDGET_MARKER)
}

/// ベースURLにパスを連結する（スラッシュの重複・欠落を吸収）
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// `null` 以外のJSON値を取り出す
pub(crate) fn non_null(value: &Value, key: &str) -> Option<Value> {
    value.get(key).filter(|v| !v.is_null()).cloned()
}
