use crate::infra::storage::file::load_yaml_from_file;
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

/// 設定関連のエラー型
/// 環境変数、設定ファイル、設定値の検証など設定に関するエラーを定義
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 環境変数が見つからない
    #[error("環境変数が見つかりません: {name}")]
    MissingEnvironmentVariable { name: String },

    /// 設定値が不正
    #[error("設定値が不正です: {reason}")]
    InvalidValue { reason: String },

    /// 設定ファイルが読み込めない
    #[error("設定ファイルを読み込めません: {path} - {reason}")]
    UnreadableConfigFile { path: String, reason: String },
}

impl ConfigError {
    /// 環境変数不足エラーを作成
    pub fn missing_env_var<N: Into<String>>(name: N) -> Self {
        Self::MissingEnvironmentVariable { name: name.into() }
    }

    /// 不正な設定値エラーを作成
    pub fn invalid_value<R: Into<String>>(reason: R) -> Self {
        Self::InvalidValue {
            reason: reason.into(),
        }
    }

    /// 設定ファイル読み込みエラーを作成
    pub fn unreadable_config_file<P: Into<String>, R: Into<String>>(path: P, reason: R) -> Self {
        Self::UnreadableConfigFile {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// 設定エラーのResult型エイリアス
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

pub const DEFAULT_READR_TAKE: i64 = 3;
pub const DEFAULT_MM_TAKE: i64 = 10;
pub const DEFAULT_MM_EXTERNAL_TAKE: i64 = 20;
pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// RSS記事ページからOpen Graph情報を補完するタイミング
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichMode {
    /// 全記事で記事ページを取得する
    Always,
    /// フィードから公開日時が取れなかった記事のみ取得する
    MissingDate,
    /// 取得しない
    Off,
}

impl EnrichMode {
    fn parse(value: &str) -> ConfigResult<Self> {
        match value.trim().to_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "missing_date" => Ok(Self::MissingDate),
            "off" => Ok(Self::Off),
            other => Err(ConfigError::invalid_value(format!(
                "MESH_ENRICHMENT は always / missing_date / off のいずれか: {}",
                other
            ))),
        }
    }
}

/// 記事の保存先
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriterKind {
    /// PostgreSQLへ直接INSERT
    Postgres,
    /// コンテンツAPIの `createStories` ミューテーション
    Graphql,
}

impl WriterKind {
    fn parse(value: &str) -> ConfigResult<Self> {
        match value.trim().to_lowercase().as_str() {
            "postgres" => Ok(Self::Postgres),
            "graphql" => Ok(Self::Graphql),
            other => Err(ConfigError::invalid_value(format!(
                "MESH_STORY_WRITER は postgres / graphql のいずれか: {}",
                other
            ))),
        }
    }
}

/// パイプライン全体の設定
///
/// 環境変数から一度だけ組み立て、`FeedDispatcher` に明示的に渡す。
#[derive(Debug, Clone)]
pub struct FeederConfig {
    pub mesh_gql_endpoint: String,
    pub readr_gql_endpoint: Option<String>,
    pub readr_url: Option<String>,
    pub mm_gql_endpoint: Option<String>,
    pub database_url: Option<String>,
    pub readr_take: i64,
    pub mm_take: i64,
    pub mm_external_take: i64,
    pub batch_size: usize,
    pub http_timeout_secs: u64,
    pub enrichment: EnrichMode,
    pub writer: WriterKind,
    /// 起動時にマイグレーションを実行するか（ローカル開発用）
    pub run_migrations: bool,
    /// 媒体の表示名 → 英語名
    pub publisher_names: HashMap<String, String>,
}

/// `FEEDER_CONFIG_PATH` で指定するYAMLの上書き設定
#[derive(Debug, Default, Deserialize)]
pub struct ConfigOverlay {
    pub readr_take: Option<i64>,
    pub mm_take: Option<i64>,
    pub mm_external_take: Option<i64>,
    pub batch_size: Option<usize>,
    pub http_timeout_secs: Option<u64>,
    pub enrichment: Option<EnrichMode>,
    #[serde(default)]
    pub publisher_names: HashMap<String, String>,
}

pub fn default_publisher_names() -> HashMap<String, String> {
    [
        ("報導者", "twreporter"),
        ("公共電視", "pts"),
        ("READr", "readr"),
        ("東森新聞", "ettoday"),
        ("鏡週刊", "mirrormedia"),
    ]
    .into_iter()
    .map(|(title, name)| (title.to_string(), name.to_string()))
    .collect()
}

impl FeederConfig {
    /// 最小構成の設定（テストやローカル実行用）
    pub fn new<E: Into<String>>(mesh_gql_endpoint: E) -> Self {
        Self {
            mesh_gql_endpoint: mesh_gql_endpoint.into(),
            readr_gql_endpoint: None,
            readr_url: None,
            mm_gql_endpoint: None,
            database_url: None,
            readr_take: DEFAULT_READR_TAKE,
            mm_take: DEFAULT_MM_TAKE,
            mm_external_take: DEFAULT_MM_EXTERNAL_TAKE,
            batch_size: DEFAULT_BATCH_SIZE,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            enrichment: EnrichMode::MissingDate,
            writer: WriterKind::Postgres,
            run_migrations: false,
            publisher_names: default_publisher_names(),
        }
    }

    /// 環境変数（と任意のYAML上書きファイル）から設定を読み込む
    pub fn from_env() -> ConfigResult<Self> {
        let config = Self::from_lookup(|key| std::env::var(key).ok())?;
        match std::env::var("FEEDER_CONFIG_PATH") {
            Ok(path) => {
                let overlay: ConfigOverlay = load_yaml_from_file(&path)
                    .map_err(|e| ConfigError::unreadable_config_file(&path, e.to_string()))?;
                Ok(config.with_overlay(overlay))
            }
            Err(_) => Ok(config),
        }
    }

    /// 任意のキー検索関数から設定を組み立てる
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mesh_gql_endpoint =
            get("MESH_GQL_ENDPOINT").ok_or_else(|| ConfigError::missing_env_var("MESH_GQL_ENDPOINT"))?;

        let mut config = Self::new(mesh_gql_endpoint);
        config.readr_gql_endpoint = get("READR_GQL_ENDPOINT");
        config.readr_url = get("READR_URL");
        config.mm_gql_endpoint = get("MM_GQL_ENDPOINT");
        config.database_url = get("DATABASE_URL").or_else(|| compose_database_url(&get));

        if let Some(v) = get("MESH_READR_TAKE") {
            config.readr_take = parse_number("MESH_READR_TAKE", &v)?;
        }
        if let Some(v) = get("MESH_MM_TAKE") {
            config.mm_take = parse_number("MESH_MM_TAKE", &v)?;
        }
        if let Some(v) = get("MESH_MM_EXTERNAL_TAKE") {
            config.mm_external_take = parse_number("MESH_MM_EXTERNAL_TAKE", &v)?;
        }
        if let Some(v) = get("MESH_HTTP_TIMEOUT") {
            config.http_timeout_secs = parse_number("MESH_HTTP_TIMEOUT", &v)?;
        }
        if let Some(v) = get("MESH_ENRICHMENT") {
            config.enrichment = EnrichMode::parse(&v)?;
        }
        if let Some(v) = get("MESH_STORY_WRITER") {
            config.writer = WriterKind::parse(&v)?;
        }
        config.run_migrations = get("MESH_RUN_MIGRATIONS")
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        config.validate()?;
        Ok(config)
    }

    /// YAMLの上書き設定を適用する
    pub fn with_overlay(mut self, overlay: ConfigOverlay) -> Self {
        if let Some(v) = overlay.readr_take {
            self.readr_take = v;
        }
        if let Some(v) = overlay.mm_take {
            self.mm_take = v;
        }
        if let Some(v) = overlay.mm_external_take {
            self.mm_external_take = v;
        }
        if let Some(v) = overlay.batch_size {
            self.batch_size = v;
        }
        if let Some(v) = overlay.http_timeout_secs {
            self.http_timeout_secs = v;
        }
        if let Some(v) = overlay.enrichment {
            self.enrichment = v;
        }
        self.publisher_names.extend(overlay.publisher_names);
        self
    }

    /// 媒体の表示名から英語名を引く。未登録の場合は小文字化した表示名を使う
    pub fn publisher_name(&self, title: &str) -> String {
        self.publisher_names
            .get(title)
            .cloned()
            .unwrap_or_else(|| title.to_lowercase())
    }

    /// PostgreSQLの接続URLを取得する
    pub fn require_database_url(&self) -> ConfigResult<&str> {
        self.database_url
            .as_deref()
            .ok_or_else(|| ConfigError::missing_env_var("DATABASE_URL"))
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.readr_take <= 0 || self.mm_take <= 0 || self.mm_external_take <= 0 {
            return Err(ConfigError::invalid_value("take件数は1以上である必要があります"));
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::invalid_value("MESH_HTTP_TIMEOUT は1秒以上"));
        }
        Ok(())
    }
}

// DB_HOST等の個別変数から接続URLを組み立てる（全て揃っている場合のみ）
fn compose_database_url<F>(get: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let host = get("DB_HOST")?;
    let name = get("DB_NAME")?;
    let user = get("DB_USER")?;
    let pass = get("DB_PASS").unwrap_or_default();
    let port = get("DB_PORT").unwrap_or_else(|| "5432".to_string());
    Some(format!(
        "postgres://{}:{}@{}:{}/{}",
        user, pass, host, port, name
    ))
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::invalid_value(format!("{} は数値である必要があります: {}", name, value)))
}
