use crate::types::ConfigError;
use thiserror::Error;

/// 取得ユニット単位のエラー型
/// ここで発生したエラーはユニット内でログ出力され、パイプラインには伝播しない
#[derive(Error, Debug)]
pub enum SourceError {
    /// HTTP経由の取得失敗（RSSフィード、記事ページ）
    #[error("HTTP取得エラー: {url} - {source}")]
    Http {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    /// GraphQLクエリの失敗
    #[error("GraphQLクエリエラー: {operation} - {source}")]
    Graphql {
        operation: String,
        #[source]
        source: anyhow::Error,
    },

    /// フィードの解析失敗
    #[error("フィード解析エラー: {url} - {reason}")]
    Parse { url: String, reason: String },

    /// 提携媒体のslugが対応表に存在しない
    #[error("提携媒体が見つかりません: {slug}")]
    PartnerNotFound { slug: String },

    /// 媒体種別に必要なエンドポイントが未設定
    #[error("エンドポイントが未設定です: {name}")]
    MissingEndpoint { name: String },
}

impl SourceError {
    pub fn http<U: Into<String>>(url: U, source: anyhow::Error) -> Self {
        Self::Http {
            url: url.into(),
            source,
        }
    }

    pub fn graphql<O: Into<String>>(operation: O, source: anyhow::Error) -> Self {
        Self::Graphql {
            operation: operation.into(),
            source,
        }
    }

    pub fn parse<U: Into<String>, R: Into<String>>(url: U, reason: R) -> Self {
        Self::Parse {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn partner_not_found<S: Into<String>>(slug: S) -> Self {
        Self::PartnerNotFound { slug: slug.into() }
    }

    pub fn missing_endpoint<N: Into<String>>(name: N) -> Self {
        Self::MissingEndpoint { name: name.into() }
    }
}

/// ユニット単位のResult型エイリアス
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// パイプライン全体を止める致命的なエラー型
#[derive(Error, Debug)]
pub enum PipelineError {
    /// 媒体一覧が取得できない
    #[error("媒体一覧の取得に失敗: {source}")]
    PublisherDirectory {
        #[source]
        source: anyhow::Error,
    },

    /// 既存URLの照会に失敗（重複排除ができない）
    #[error("既存記事URLの照会に失敗: {source}")]
    ExistingUrlLookup {
        #[source]
        source: anyhow::Error,
    },

    /// データベース接続・コミットの失敗
    #[error("データベースエラー: {operation} - {source}")]
    Database {
        operation: String,
        #[source]
        source: sqlx::Error,
    },

    /// 設定エラー
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PipelineError {
    pub fn publisher_directory(source: anyhow::Error) -> Self {
        Self::PublisherDirectory { source }
    }

    pub fn existing_url_lookup(source: anyhow::Error) -> Self {
        Self::ExistingUrlLookup { source }
    }

    pub fn database<O: Into<String>>(operation: O, source: sqlx::Error) -> Self {
        Self::Database {
            operation: operation.into(),
            source,
        }
    }
}

/// パイプラインのResult型エイリアス
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
