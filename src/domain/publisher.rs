use crate::infra::api::graphql::GraphqlClient;
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

pub const PUBLISHERS_QUERY: &str = r#"
query Publishers {
  publishers {
    id
    title
    rss
    official_site
    source_type
    full_content
    full_screen_ad
  }
}
"#;

/// 媒体のコンテンツ形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// RSS/Atomフィード
    Syndication,
    /// READr CMS
    Readr,
    /// 鏡週刊 CMS
    MirrorMedia,
    /// 鏡週刊経由の提携媒体
    ExternalPartner,
    /// 未設定・未対応
    Empty,
}

impl SourceKind {
    /// `source_type` の文字列から種別を判定する（大文字小文字は区別しない）
    pub fn from_source_type(source_type: &str) -> Self {
        match source_type.trim().to_lowercase().as_str() {
            "rss" => Self::Syndication,
            "readr" => Self::Readr,
            "mirrormedia" => Self::MirrorMedia,
            "mm_external" => Self::ExternalPartner,
            _ => Self::Empty,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Syndication => "rss",
            Self::Readr => "readr",
            Self::MirrorMedia => "mirrormedia",
            Self::ExternalPartner => "mm_external",
            Self::Empty => "empty",
        };
        write!(f, "{}", name)
    }
}

/// コンテンツAPIから取得する媒体情報（読み取り専用）
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Publisher {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    /// フィードURL、または提携媒体のslug
    #[serde(default, rename = "rss", deserialize_with = "null_as_default")]
    pub feed: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub official_site: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub source_type: String,
}

impl Publisher {
    pub fn kind(&self) -> SourceKind {
        SourceKind::from_source_type(&self.source_type)
    }
}

impl fmt::Display for Publisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{} ({})", self.title, self.id, self.kind())
    }
}

/// 種別ごとに振り分けた媒体一覧
#[derive(Debug, Default)]
pub struct PublisherGroups {
    pub syndication: Vec<Publisher>,
    pub readr: Vec<Publisher>,
    pub mirror_media: Vec<Publisher>,
    pub external: Vec<Publisher>,
    /// 未対応の種別で無視した件数
    pub ignored: usize,
}

/// 媒体を種別ごとに振り分ける。未対応の種別は捨てる
pub fn group_publishers(publishers: Vec<Publisher>) -> PublisherGroups {
    let mut groups = PublisherGroups::default();
    for publisher in publishers {
        match publisher.kind() {
            SourceKind::Syndication => groups.syndication.push(publisher),
            SourceKind::Readr => groups.readr.push(publisher),
            SourceKind::MirrorMedia => groups.mirror_media.push(publisher),
            SourceKind::ExternalPartner => groups.external.push(publisher),
            SourceKind::Empty => groups.ignored += 1,
        }
    }
    groups
}

/// コンテンツAPIから全媒体を取得する
pub async fn fetch_publishers(client: &dyn GraphqlClient, endpoint: &str) -> Result<Vec<Publisher>> {
    let data = client
        .query(endpoint, PUBLISHERS_QUERY, None)
        .await
        .context("媒体一覧クエリに失敗")?;

    let publishers = data
        .get("publishers")
        .cloned()
        .unwrap_or(Value::Array(Vec::new()));

    serde_json::from_value(publishers).context("媒体一覧の解析に失敗")
}

// GraphQLのIDは文字列で返るため、数値・文字列どちらも受け付ける
fn deserialize_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| D::Error::custom(format!("IDが整数ではありません: {}", n))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("IDが整数ではありません: {}", s))),
        other => Err(D::Error::custom(format!("IDの型が不正です: {}", other))),
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
