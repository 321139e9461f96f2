use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// 全媒体共通の記事レコード
///
/// `url` が一意キー。各取得元の正規化処理で組み立て、保存時に `created_at` が付与される。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    /// 媒体ID
    pub source: i64,
    pub title: String,
    pub url: String,
    pub full_content: bool,
    pub summary: String,
    pub content: String,
    pub og_title: String,
    pub og_description: String,
    pub og_image: String,
    pub published_date: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    /// CMSの構造化本文（CMS由来の記事のみ）
    pub api_data: Option<Value>,
    /// 取得元システム上のID（不明なら0）
    pub origid: i64,
}

/// 取得ユニット1つ分の正規化済み記事
pub type FetchResult = Vec<Story>;

impl Story {
    /// URLとタイトルだけを持つ記事を作る。残りは空の既定値
    pub fn new<U: Into<String>, T: Into<String>>(source: i64, url: U, title: T) -> Self {
        Self {
            source,
            title: title.into(),
            url: url.into(),
            full_content: false,
            summary: String::new(),
            content: String::new(),
            og_title: String::new(),
            og_description: String::new(),
            og_image: String::new(),
            published_date: None,
            created_at: None,
            api_data: None,
            origid: 0,
        }
    }

    /// `createStories` ミューテーション用の入力
    pub fn to_create_input(&self, created_at: DateTime<Utc>) -> Value {
        let mut input = json!({
            "source": { "connect": { "id": self.source.to_string() } },
            "title": self.title,
            "url": self.url,
            "full_content": self.full_content,
            "summary": self.summary,
            "content": self.content,
            "og_title": self.og_title,
            "og_description": self.og_description,
            "og_image": self.og_image,
            "published_date": self.published_date.map(|d| d.to_rfc3339()),
            "createdAt": created_at.to_rfc3339(),
            "origid": self.origid.to_string(),
        });
        if let (Some(api_data), Some(map)) = (&self.api_data, input.as_object_mut()) {
            map.insert("apiData".to_string(), api_data.clone());
        }
        input
    }
}

impl fmt::Display for Story {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.source, self.title, self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_new_story_defaults() {
        let story = Story::new(7, "https://example.com/a", "見出し");

        assert_eq!(story.source, 7);
        assert!(!story.full_content);
        assert_eq!(story.summary, "");
        assert_eq!(story.origid, 0);
        assert!(story.published_date.is_none());
        assert!(story.api_data.is_none());
    }

    #[test]
    fn test_create_input_connects_source_and_sets_created_at() {
        let mut story = Story::new(12, "https://example.com/a", "見出し");
        story.published_date = Some(Utc.with_ymd_and_hms(2022, 6, 15, 2, 33, 0).unwrap());
        story.origid = 345;
        let created_at = Utc.with_ymd_and_hms(2022, 6, 15, 3, 0, 0).unwrap();

        let input = story.to_create_input(created_at);

        assert_eq!(input["source"]["connect"]["id"], "12");
        assert_eq!(input["published_date"], "2022-06-15T02:33:00+00:00");
        assert_eq!(input["createdAt"], "2022-06-15T03:00:00+00:00");
        assert_eq!(input["origid"], "345");
        assert!(input.get("apiData").is_none(), "apiDataがない記事では省略されるべき");
    }

    #[test]
    fn test_create_input_keeps_api_data() {
        let mut story = Story::new(1, "https://example.com/b", "t");
        story.api_data = Some(json!([{"type": "unstyled", "content": ["本文"]}]));

        let input = story.to_create_input(Utc::now());

        assert_eq!(input["apiData"][0]["type"], "unstyled");
    }
}
