//! 型定義モジュール
//!
//! アプリケーション全体で使用される共通的な型定義を管理します。
//! - 設定: 環境変数・YAMLから組み立てる `FeederConfig`
//! - エラー: ユニット単位の `SourceError` と致命的な `PipelineError`
//! - 結果: 取り込み結果の `FeedReport`

pub mod config;
pub mod error;
pub mod result;

// 便利な再エクスポート
pub use config::{ConfigError, ConfigResult, EnrichMode, FeederConfig, WriterKind};
pub use error::{PipelineError, PipelineResult, SourceError, SourceResult};
pub use result::FeedReport;
