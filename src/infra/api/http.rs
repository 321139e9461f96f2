use crate::infra::compute::generate_mock_rss_id;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;

/// HTTPクライアントの抽象化トレイト
///
/// このトレイトは、実際のHTTP通信とモック実装の両方を
/// 統一的に扱えるようにするためのインターフェースです。
/// 取得ユニットごとに別タスクから呼ばれるため `Send + Sync` を要求します。
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// 指定されたURLからテキストを取得する
    ///
    /// # Arguments
    /// * `url` - 取得対象のURL
    /// * `timeout_secs` - タイムアウト時間（秒）
    ///
    /// 2xx以外のステータスはエラーとして扱う。
    async fn get_text(&self, url: &str, timeout_secs: u64) -> Result<String>;
}

/// `reqwest` を使用した本番用のHTTPクライアント実装
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    /// 新しいHTTPクライアントを作成
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get_text(&self, url: &str, timeout_secs: u64) -> Result<String> {
        let response = self
            .client
            .get(url)
            .timeout(Duration::from_secs(timeout_secs))
            .send()
            .await
            .context(format!("HTTPリクエストの送信に失敗: {}", url))?
            .error_for_status()
            .context(format!("HTTPステータスが不正: {}", url))?;

        response
            .text()
            .await
            .context("レスポンステキストの取得に失敗")
    }
}

/// モックが返す応答
#[derive(Debug, Clone)]
enum MockResponse {
    Body(String),
    Error(String),
    /// URLから決定的に生成したRSS（記事数を指定）
    GeneratedRss(usize),
}

/// テスト用のモックHTTPクライアント
///
/// この実装はテスト時にDIされ、実際のHTTPリクエストを行わずに
/// URLごとに登録したレスポンスやエラーを返します。
/// 登録のないURLには既定の応答（`fallback`）を返します。
pub struct MockHttpClient {
    routes: HashMap<String, MockResponse>,
    fallback: MockResponse,
}

impl MockHttpClient {
    /// 全URLで同じ内容を返すモッククライアントを作成
    pub fn new_success(mock_response: &str) -> Self {
        Self {
            routes: HashMap::new(),
            fallback: MockResponse::Body(mock_response.to_string()),
        }
    }

    /// 全URLでエラーを返すモッククライアントを作成
    pub fn new_error(error_message: &str) -> Self {
        Self {
            routes: HashMap::new(),
            fallback: MockResponse::Error(error_message.to_string()),
        }
    }

    /// URLごとに異なるRSSを動的生成するモッククライアントを作成
    ///
    /// 記事は `{hash}:title:{n}` / `https://{hash}.example.com/{n}` の形式になる。
    pub fn new_generated(items_per_feed: usize) -> Self {
        Self {
            routes: HashMap::new(),
            fallback: MockResponse::GeneratedRss(items_per_feed),
        }
    }

    /// 特定URLの応答内容を登録する
    pub fn with_body(mut self, url: &str, body: &str) -> Self {
        self.routes
            .insert(url.to_string(), MockResponse::Body(body.to_string()));
        self
    }

    /// 特定URLでエラーを返すよう登録する
    pub fn with_error(mut self, url: &str, error_message: &str) -> Self {
        self.routes.insert(
            url.to_string(),
            MockResponse::Error(error_message.to_string()),
        );
        self
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn get_text(&self, url: &str, _timeout_secs: u64) -> Result<String> {
        match self.routes.get(url).unwrap_or(&self.fallback) {
            MockResponse::Body(body) => Ok(body.clone()),
            MockResponse::Error(message) => Err(anyhow::anyhow!("モックHTTPエラー: {}", message)),
            MockResponse::GeneratedRss(count) => Ok(generate_mock_rss(url, *count)),
        }
    }
}

/// URLのハッシュをもとにテスト用RSSを生成する
pub fn generate_mock_rss(url: &str, count: usize) -> String {
    let hash = generate_mock_rss_id(url);
    let now = Utc::now();

    let items: String = (1..=count)
        .map(|n| {
            let pub_date = (now - ChronoDuration::hours(n as i64)).to_rfc2822();
            format!(
                r#"
        <item>
            <title>{hash}:title:{n}</title>
            <link>https://{hash}.example.com/{n}</link>
            <description>{hash}:description:{n}</description>
            <pubDate>{pub_date}</pubDate>
        </item>"#
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
    <channel>
        <title>{hash}</title>
        <link>https://{hash}.example.com</link>
        <description>mock feed</description>{items}
    </channel>
</rss>"#
    )
}
