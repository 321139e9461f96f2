use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration;

/// GraphQLクライアントの抽象化トレイト
///
/// Mesh・READr・鏡週刊のいずれのAPIも同じ形式（POST + `{"query", "variables"}`）
/// で呼び出せるため、エンドポイントは呼び出し側が指定する。
#[async_trait]
pub trait GraphqlClient: Send + Sync {
    /// クエリを実行し、レスポンスの `data` を返す
    ///
    /// `errors` が空でない場合はエラーとして扱う。
    async fn query(&self, endpoint: &str, document: &str, variables: Option<Value>)
        -> Result<Value>;
}

#[derive(Serialize)]
struct GraphqlRequest<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    variables: Option<Value>,
}

#[derive(Deserialize)]
struct GraphqlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlErrorMessage>,
}

#[derive(Deserialize)]
struct GraphqlErrorMessage {
    #[serde(default)]
    message: String,
}

/// `reqwest` を使用した本番用のGraphQLクライアント実装
pub struct ReqwestGraphqlClient {
    client: Client,
    timeout_secs: u64,
}

impl ReqwestGraphqlClient {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            client: Client::new(),
            timeout_secs,
        }
    }
}

#[async_trait]
impl GraphqlClient for ReqwestGraphqlClient {
    async fn query(
        &self,
        endpoint: &str,
        document: &str,
        variables: Option<Value>,
    ) -> Result<Value> {
        let body = GraphqlRequest {
            query: document,
            variables,
        };

        let response: GraphqlResponse = self
            .client
            .post(endpoint)
            .timeout(Duration::from_secs(self.timeout_secs))
            .json(&body)
            .send()
            .await
            .context(format!("GraphQLリクエストの送信に失敗: {}", endpoint))?
            .error_for_status()
            .context(format!("GraphQLのHTTPステータスが不正: {}", endpoint))?
            .json()
            .await
            .context("GraphQLレスポンスの解析に失敗")?;

        if !response.errors.is_empty() {
            let messages: Vec<String> = response.errors.into_iter().map(|e| e.message).collect();
            bail!("GraphQLエラー: {}", messages.join("; "));
        }

        response
            .data
            .ok_or_else(|| anyhow!("GraphQLレスポンスにdataがありません: {}", endpoint))
    }
}

type MockHandler = dyn Fn(&str, &str, Option<&Value>) -> Result<Value> + Send + Sync;

/// テスト用のモックGraphQLクライアント
///
/// `(endpoint, document, variables)` を受け取るハンドラで応答を組み立てる。
/// 呼び出されたクエリ文字列は `calls()` で確認できる。
pub struct MockGraphqlClient {
    handler: Box<MockHandler>,
    calls: Mutex<Vec<String>>,
}

impl MockGraphqlClient {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&str, &str, Option<&Value>) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// 常に同じ `data` を返すモッククライアントを作成
    pub fn new_success(data: Value) -> Self {
        Self::new(move |_, _, _| Ok(data.clone()))
    }

    /// 常にエラーを返すモッククライアントを作成
    pub fn new_error(error_message: &str) -> Self {
        let message = error_message.to_string();
        Self::new(move |_, _, _| Err(anyhow!("モックGraphQLエラー: {}", message)))
    }

    /// これまでに実行されたクエリ
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl GraphqlClient for MockGraphqlClient {
    async fn query(
        &self,
        endpoint: &str,
        document: &str,
        variables: Option<Value>,
    ) -> Result<Value> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(document.to_string());
        }
        (self.handler)(endpoint, document, variables.as_ref())
    }
}
