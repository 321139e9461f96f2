//! Mesh向けフィード取り込みパイプライン
//!
//! RSS・CMS・提携媒体から記事を並行に取得し、共通の `Story` 形式に正規化したうえで
//! 保存済みURLを除外して保存する。

pub mod app;
pub mod domain;
pub mod infra;
pub mod types;
