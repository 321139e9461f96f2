use crate::domain::publisher::Publisher;
use crate::domain::source::{Source, SourceContext};
use crate::domain::story::Story;
use crate::infra::parser::{parse_date, parse_feed_items, FeedItem};
use crate::types::{EnrichMode, SourceError, SourceResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Asia::Taipei;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};

/// 見出しに混ざるアンカータグ
static ANCHOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<a href=.*?>(.+?)</a>").expect("invalid anchor regex"));

/// `<head>` 内で `content` を持つmetaタグ
static HEAD_META: Lazy<Selector> =
    Lazy::new(|| Selector::parse("head meta[content]").expect("invalid meta selector"));

/// 記事ページから取り出したOpen Graph情報
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageMeta {
    pub og_title: Option<String>,
    pub og_image: Option<String>,
    pub og_description: Option<String>,
    pub published_time: Option<String>,
}

/// フィードの1項目と、必要に応じて取得した記事ページ情報
#[derive(Debug, Clone)]
pub struct RssEntry {
    pub item: FeedItem,
    pub page: Option<PageMeta>,
}

/// RSS/Atomフィードを配信する媒体
pub struct RssSource {
    pub publisher: Publisher,
}

impl RssSource {
    pub fn new(publisher: Publisher) -> Self {
        Self { publisher }
    }

    fn needs_page(&self, mode: EnrichMode, published: Option<DateTime<Utc>>) -> bool {
        match mode {
            EnrichMode::Always => true,
            EnrichMode::MissingDate => published.is_none(),
            EnrichMode::Off => false,
        }
    }
}

#[async_trait]
impl Source for RssSource {
    type Raw = RssEntry;

    fn label(&self) -> String {
        format!("rss:{}", self.publisher)
    }

    async fn fetch(&self, ctx: &SourceContext) -> SourceResult<Vec<RssEntry>> {
        let feed_url = self.publisher.feed.as_str();
        let timeout = ctx.config.http_timeout_secs;

        let xml = ctx
            .http
            .get_text(feed_url, timeout)
            .await
            .map_err(|e| SourceError::http(feed_url, e))?;
        let items =
            parse_feed_items(&xml).map_err(|e| SourceError::parse(feed_url, format!("{:#}", e)))?;

        let publisher_name = ctx.config.publisher_name(&self.publisher.title);
        let mut entries = Vec::with_capacity(items.len());

        for item in items {
            let published = entry_published(&item, &publisher_name);
            let link = upgrade_https(&item.link);

            let page = if !link.is_empty() && self.needs_page(ctx.config.enrichment, published) {
                match ctx.http.get_text(&link, timeout).await {
                    Ok(html) => Some(extract_page_meta(&html)),
                    Err(e) => {
                        debug!(url = %link, error = %e, "記事ページの取得に失敗、補完なしで続行");
                        None
                    }
                }
            } else {
                None
            };

            entries.push(RssEntry { item, page });
        }

        info!(publisher = %self.publisher, entries = entries.len(), "RSSフィードを取得");
        Ok(entries)
    }

    fn normalize(&self, entry: RssEntry, ctx: &SourceContext) -> Option<Story> {
        let RssEntry { item, page } = entry;
        let page = page.unwrap_or_default();

        let url = upgrade_https(&item.link);
        if url.is_empty() {
            warn!(publisher = %self.publisher, title = %item.title, "リンクのない項目をスキップ");
            return None;
        }

        let publisher_name = ctx.config.publisher_name(&self.publisher.title);
        let title = strip_anchor_tags(&item.title);
        let description = item.description.clone();

        let mut story = Story::new(self.publisher.id, url, title.clone());
        story.summary = description.clone();
        story.content = description;
        story.og_title = page.og_title.unwrap_or(title);
        story.og_image = page.og_image.unwrap_or_default();
        story.og_description = page.og_description.unwrap_or_default();
        story.published_date = entry_published(&item, &publisher_name).or_else(|| {
            page.published_time
                .as_deref()
                .and_then(|raw| parse_date(raw).ok())
        });

        Some(story)
    }
}

/// 見出しのアンカータグを外し、中のテキストだけを残す
pub fn strip_anchor_tags(title: &str) -> String {
    ANCHOR_RE.replace_all(title, "$1").into_owned()
}

/// 最初の `http://` だけを `https://` に置き換える
pub fn upgrade_https(url: &str) -> String {
    url.replacen("http://", "https://", 1)
}

/// 項目の公開日時
///
/// RSSは `pubDate`、`dc:date` の順に解釈できた最初の表記を使う。
/// Atom/RDFは解析済みの `published`（なければ `updated`）を使う。
pub fn entry_published(item: &FeedItem, publisher_name: &str) -> Option<DateTime<Utc>> {
    item.raw_dates
        .iter()
        .find_map(|raw| parse_publisher_timestamp(raw, publisher_name))
        .or(item.parsed_date)
}

/// 媒体ごとの日時書式。タイムゾーン表記は信用せず台北時間として読む
fn local_layout(publisher_name: &str) -> Option<&'static str> {
    match publisher_name {
        "ettoday" => Some("%a,%d %b %Y %H:%M:%S"),
        "twreporter" | "cna" | "rightplus" => Some("%a, %d %b %Y %H:%M:%S"),
        _ => None,
    }
}

/// 媒体ごとの書式で日時を解釈し、UTCに変換する
///
/// 書式が合わない場合や対象外の媒体は汎用パーサにまかせる。
pub fn parse_publisher_timestamp(raw: &str, publisher_name: &str) -> Option<DateTime<Utc>> {
    local_layout(publisher_name)
        .and_then(|layout| parse_taipei_wall_clock(raw, layout))
        .or_else(|| parse_date(raw).ok())
}

// 末尾のタイムゾーン表記（+0800, GMT など）を落として壁時計時刻として読む
fn parse_taipei_wall_clock(raw: &str, layout: &str) -> Option<DateTime<Utc>> {
    let (wall_clock, _zone) = raw.trim().rsplit_once(char::is_whitespace)?;
    let naive = NaiveDateTime::parse_from_str(wall_clock.trim_end(), layout).ok()?;
    Taipei
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// 記事ページの `<head>` からOpen Graph情報を取り出す
///
/// 同じキーが複数あれば最初の空でない値を使う。値の文字参照は解決済みになる。
pub fn extract_page_meta(html: &str) -> PageMeta {
    let document = Html::parse_document(html);
    let mut meta = PageMeta::default();

    for element in document.select(&HEAD_META) {
        let attrs = element.value();
        let Some(key) = attrs.attr("property").or_else(|| attrs.attr("name")) else {
            continue;
        };
        let slot = match key.trim().to_ascii_lowercase().as_str() {
            "og:title" => &mut meta.og_title,
            "og:image" => &mut meta.og_image,
            "og:description" => &mut meta.og_description,
            "article:published_time" => &mut meta.published_time,
            _ => continue,
        };
        let value = attrs.attr("content").unwrap_or_default().trim();
        if slot.is_none() && !value.is_empty() {
            *slot = Some(value.to_string());
        }
    }
    meta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::api::graphql::MockGraphqlClient;
    use crate::infra::api::http::MockHttpClient;
    use crate::infra::storage::file::load_text_from_file;
    use crate::types::FeederConfig;
    use std::sync::Arc;

    const FEED_URL: &str = "https://feeds.example.com/ettoday.xml";

    fn ettoday() -> Publisher {
        Publisher {
            id: 3,
            title: "東森新聞".to_string(),
            feed: FEED_URL.to_string(),
            official_site: "https://www.ettoday.net/".to_string(),
            source_type: "rss".to_string(),
        }
    }

    fn context(http: MockHttpClient, enrichment: EnrichMode) -> SourceContext {
        let mut config = FeederConfig::new("https://mesh.test/gql");
        config.enrichment = enrichment;
        SourceContext::new(
            config,
            Arc::new(http),
            Arc::new(MockGraphqlClient::new_error("未使用")),
        )
    }

    async fn collect(source: &RssSource, ctx: &SourceContext) -> Vec<Story> {
        let entries = source.fetch(ctx).await.expect("フィード取得に失敗");
        entries
            .into_iter()
            .filter_map(|e| source.normalize(e, ctx))
            .collect()
    }

    #[test]
    fn test_strip_anchor_tags() {
        assert_eq!(
            strip_anchor_tags(r#"颱風動態 <a href="https://x.example.com/t">最新消息</a>"#),
            "颱風動態 最新消息"
        );
        assert_eq!(strip_anchor_tags("普通の見出し"), "普通の見出し");
    }

    #[test]
    fn test_upgrade_https_replaces_first_occurrence() {
        assert_eq!(upgrade_https("http://a.example.com/1"), "https://a.example.com/1");
        assert_eq!(upgrade_https("https://a.example.com/1"), "https://a.example.com/1");
        assert_eq!(
            upgrade_https("http://a.example.com/?next=http://b"),
            "https://a.example.com/?next=http://b"
        );
    }

    #[test]
    fn test_parse_publisher_timestamp_ettoday() {
        let parsed = parse_publisher_timestamp("Wed,15 Jun 2022 10:33:00 +0800", "ettoday")
            .expect("ettoday形式の解析に失敗");
        assert_eq!(parsed.to_rfc3339(), "2022-06-15T02:33:00+00:00");
    }

    #[test]
    fn test_parse_publisher_timestamp_ignores_declared_zone() {
        // 表記上のタイムゾーンに関わらず台北時間として扱う
        let twreporter = parse_publisher_timestamp("Sun, 21 Apr 2024 16:00:00 GMT", "twreporter").unwrap();
        assert_eq!(twreporter.to_rfc3339(), "2024-04-21T08:00:00+00:00");

        let rightplus = parse_publisher_timestamp("Thu, 21 Apr 2022 05:36:18 +0000", "rightplus").unwrap();
        assert_eq!(rightplus.to_rfc3339(), "2022-04-20T21:36:18+00:00");

        let cna = parse_publisher_timestamp("Tue, 14 Jun 2022 18:46:39 +0800", "cna").unwrap();
        assert_eq!(cna.to_rfc3339(), "2022-06-14T10:46:39+00:00");
    }

    #[test]
    fn test_parse_publisher_timestamp_generic() {
        let parsed = parse_publisher_timestamp("Tue, 14 Jun 2022 18:46:39 +0800", "pts").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2022-06-14T10:46:39+00:00");

        assert!(parse_publisher_timestamp("不明な日付", "pts").is_none());
        assert!(parse_publisher_timestamp("不明な日付", "ettoday").is_none());
    }

    #[test]
    fn test_extract_page_meta_both_attribute_orders() {
        let html = r#"<html><head>
            <meta property="og:title" content="ページの見出し">
            <meta content="https://img.example.com/og.jpg" property="og:image" />
            <meta name="og:description" content="概要文">
            <meta property="article:published_time" content="2022-06-15T10:33:00+08:00">
            </head><body><meta property="og:title" content="本文中"></body></html>"#;

        let meta = extract_page_meta(html);

        assert_eq!(meta.og_title.as_deref(), Some("ページの見出し"));
        assert_eq!(meta.og_image.as_deref(), Some("https://img.example.com/og.jpg"));
        assert_eq!(meta.og_description.as_deref(), Some("概要文"));
        assert_eq!(meta.published_time.as_deref(), Some("2022-06-15T10:33:00+08:00"));
    }

    #[test]
    fn test_extract_page_meta_empty_page() {
        assert_eq!(extract_page_meta("<html></html>"), PageMeta::default());
    }

    #[test]
    fn test_extract_page_meta_quotes_and_entities() {
        let html = r#"<html><head>
            <meta property="og:title" content="Taiwan's election">
            <meta property='og:description' content='他說"明天見"'>
            <meta property="og:image" content="https://img.example.com/a.jpg?w=1&amp;h=2">
            </head></html>"#;

        let meta = extract_page_meta(html);

        assert_eq!(meta.og_title.as_deref(), Some("Taiwan's election"));
        assert_eq!(meta.og_description.as_deref(), Some(r#"他說"明天見""#));
        assert_eq!(
            meta.og_image.as_deref(),
            Some("https://img.example.com/a.jpg?w=1&h=2"),
            "文字参照は解決されるべき"
        );
    }

    #[test]
    fn test_extract_page_meta_after_large_inline_script() {
        let script = "var x = 1;".repeat(7 * 1024);
        let html = format!(
            r#"<html><head><script>{}</script>
            <meta property="og:image" content="https://img.example.com/late.jpg">
            </head><body></body></html>"#,
            script
        );
        assert!(html.len() > 70 * 1024);

        let meta = extract_page_meta(&html);

        assert_eq!(meta.og_image.as_deref(), Some("https://img.example.com/late.jpg"));
    }

    #[test]
    fn test_entry_published_falls_back_when_first_date_is_unparsable() {
        let item = FeedItem {
            link: "https://a.example.com/1".to_string(),
            raw_dates: vec!["garbage".to_string(), "2022-06-15T07:00:00+08:00".to_string()],
            ..FeedItem::default()
        };

        assert_eq!(
            entry_published(&item, "pts").map(|d| d.to_rfc3339()).as_deref(),
            Some("2022-06-14T23:00:00+00:00")
        );
    }

    #[tokio::test]
    async fn test_normalize_atom_feed() {
        let xml = load_text_from_file("fixtures/rss/atom.xml").unwrap();
        let http = MockHttpClient::new_error("記事ページなし").with_body(FEED_URL, &xml);
        let ctx = context(http, EnrichMode::MissingDate);
        let source = RssSource::new(ettoday());

        let stories = collect(&source, &ctx).await;

        assert_eq!(stories.len(), 2);
        assert_eq!(stories[0].title, "Atomの一件目");
        assert_eq!(stories[0].url, "https://atom.example.com/news/1");
        assert_eq!(stories[0].summary, "一件目の要約");
        assert_eq!(
            stories[0].published_date.map(|d| d.to_rfc3339()).as_deref(),
            Some("2022-06-15T02:33:00+00:00")
        );
        assert_eq!(stories[1].content, "二件目の本文");
        assert_eq!(
            stories[1].published_date.map(|d| d.to_rfc3339()).as_deref(),
            Some("2022-06-14T23:00:00+00:00"),
            "publishedがなければupdated"
        );
        println!("✅ Atom正規化: {}件", stories.len());
    }

    #[tokio::test]
    async fn test_normalize_fixture_feed() {
        let xml = load_text_from_file("fixtures/rss/ettoday.rss").unwrap();
        let http = MockHttpClient::new_error("記事ページなし").with_body(FEED_URL, &xml);
        let ctx = context(http, EnrichMode::MissingDate);
        let source = RssSource::new(ettoday());

        let stories = collect(&source, &ctx).await;

        assert_eq!(stories.len(), 3);
        let first = &stories[0];
        assert_eq!(first.source, 3);
        assert_eq!(first.title, "颱風動態 最新消息", "アンカータグは外されるべき");
        assert_eq!(first.url, "https://www.ettoday.net/news/20220615/2271234.htm");
        assert_eq!(first.summary, "中央氣象局發布最新颱風警報。");
        assert_eq!(first.content, first.summary);
        assert_eq!(first.og_title, first.title);
        assert!(!first.full_content);
        assert_eq!(
            first.published_date.map(|d| d.to_rfc3339()).as_deref(),
            Some("2022-06-15T02:33:00+00:00")
        );

        // pubDateがなければdc:dateを使う
        assert_eq!(
            stories[1].published_date.map(|d| d.to_rfc3339()).as_deref(),
            Some("2022-06-14T23:00:00+00:00")
        );
        // 記事ページも取れなければ日付なし
        assert!(stories[2].published_date.is_none());
        println!("✅ RSS正規化: {}件", stories.len());
    }

    #[tokio::test]
    async fn test_enrichment_fills_missing_date_from_page() {
        let xml = load_text_from_file("fixtures/rss/ettoday.rss").unwrap();
        let page = r#"<head>
            <meta property="og:title" content="OGの見出し">
            <meta property="og:image" content="https://img.example.com/1.jpg">
            <meta property="article:published_time" content="2022-06-15T09:00:00+08:00">
            </head>"#;
        let http = MockHttpClient::new_error("未登録")
            .with_body(FEED_URL, &xml)
            .with_body("https://www.ettoday.net/news/20220615/2271400.htm", page);
        let ctx = context(http, EnrichMode::MissingDate);
        let source = RssSource::new(ettoday());

        let stories = collect(&source, &ctx).await;

        let enriched = &stories[2];
        assert_eq!(enriched.og_title, "OGの見出し");
        assert_eq!(enriched.og_image, "https://img.example.com/1.jpg");
        assert_eq!(
            enriched.published_date.map(|d| d.to_rfc3339()).as_deref(),
            Some("2022-06-15T01:00:00+00:00")
        );
        // 日付が取れた項目は補完しない
        assert_eq!(stories[0].og_image, "");
    }

    #[tokio::test]
    async fn test_enrichment_off_never_fetches_pages() {
        let xml = load_text_from_file("fixtures/rss/ettoday.rss").unwrap();
        let page = r#"<meta property="og:image" content="https://img.example.com/1.jpg">"#;
        let http = MockHttpClient::new_success(page).with_body(FEED_URL, &xml);
        let ctx = context(http, EnrichMode::Off);
        let source = RssSource::new(ettoday());

        let stories = collect(&source, &ctx).await;

        assert!(stories.iter().all(|s| s.og_image.is_empty()));
    }

    #[tokio::test]
    async fn test_fetch_error_is_source_error() {
        let ctx = context(MockHttpClient::new_error("接続拒否"), EnrichMode::Off);
        let source = RssSource::new(ettoday());

        let result = source.fetch(&ctx).await;

        assert!(matches!(result, Err(SourceError::Http { .. })));
    }

    /// 重いオンラインテスト - 実フィードの取得から正規化まで
    #[cfg(feature = "online-slow")]
    #[tokio::test]
    async fn test_rss_online_full_flow() {
        use crate::infra::api::http::ReqwestHttpClient;

        let mut config = FeederConfig::new("https://mesh.test/gql");
        config.enrichment = EnrichMode::Off;
        let ctx = SourceContext::new(
            config,
            Arc::new(ReqwestHttpClient::new()),
            Arc::new(MockGraphqlClient::new_error("未使用")),
        );
        let source = RssSource::new(Publisher {
            id: 1,
            title: "報導者".to_string(),
            feed: "https://www.twreporter.org/a/rss2.xml".to_string(),
            official_site: "https://www.twreporter.org/".to_string(),
            source_type: "rss".to_string(),
        });

        match source.fetch(&ctx).await {
            Ok(entries) => {
                let stories: Vec<Story> = entries
                    .into_iter()
                    .filter_map(|e| source.normalize(e, &ctx))
                    .collect();
                assert!(stories.iter().all(|s| s.url.starts_with("https://")));
                println!("✅ RSSオンラインテスト成功: {}件", stories.len());
            }
            Err(e) => {
                println!("⚠️ フィード取得が失敗: {}", e);
                println!("ネットワーク接続を確認してください");
            }
        }
    }

    #[tokio::test]
    async fn test_malformed_feed_is_parse_error() {
        let ctx = context(MockHttpClient::new_success("<html>not a feed"), EnrichMode::Off);
        let source = RssSource::new(ettoday());

        let result = source.fetch(&ctx).await;

        assert!(matches!(result, Err(SourceError::Parse { .. })));
    }
}
