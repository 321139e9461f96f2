//! インフラストラクチャ層
//!
//! 外部との通信（HTTP・GraphQL・PostgreSQL）とファイル読み込み、
//! 日付解析やハッシュ計算などドメインに依存しない処理を置く。

pub mod api;
pub mod compute;
pub mod db;
pub mod parser;
pub mod storage;
