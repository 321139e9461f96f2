use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rss::Channel;

/// 日時文字列を解析してUTCに揃える
///
/// 書式の判定は `dateparser` にまかせ、結果のタイムゾーンをUTCに変換する。
/// 解析できない文字列は入力をそのまま含むエラーになる。
///
/// # サポート形式の例
/// - "2025-01-15"
/// - "2025-01-15T10:00:00Z"
/// - "Sun, 10 Aug 2025 12:00:00 +0000"
pub fn parse_date(date_str: &str) -> Result<DateTime<Utc>> {
    match dateparser::parse(date_str.trim()) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        Err(_) => Err(anyhow!("不正な日付形式: {}", date_str)),
    }
}

/// XML文字列からRSSのchannelを解析する
pub fn parse_channel_from_xml_str(xml: &str) -> Result<Channel> {
    Channel::read_from(xml.as_bytes()).context("RSSのXML解析に失敗")
}

/// 形式を問わないフィードの1項目
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    /// 配信元が書いたままの日時表記（RSSは `pubDate`、次に `dc:date`）
    pub raw_dates: Vec<String>,
    /// 解析済みの日時（Atom/RDFは `published`、なければ `updated`）
    pub parsed_date: Option<DateTime<Utc>>,
}

impl From<rss::Item> for FeedItem {
    fn from(item: rss::Item) -> Self {
        let mut raw_dates: Vec<String> = item
            .pub_date()
            .filter(|d| !d.trim().is_empty())
            .map(str::to_string)
            .into_iter()
            .collect();
        if let Some(dc) = item.dublin_core_ext() {
            raw_dates.extend(dc.dates().iter().filter(|d| !d.trim().is_empty()).cloned());
        }

        Self {
            title: item.title().unwrap_or_default().to_string(),
            link: item.link().unwrap_or_default().to_string(),
            description: item.description().unwrap_or_default().to_string(),
            raw_dates,
            parsed_date: None,
        }
    }
}

impl From<feed_rs::model::Entry> for FeedItem {
    fn from(entry: feed_rs::model::Entry) -> Self {
        let description = entry
            .summary
            .map(|t| t.content)
            .or_else(|| entry.content.and_then(|c| c.body))
            .unwrap_or_default();

        Self {
            title: entry.title.map(|t| t.content).unwrap_or_default(),
            link: entry.links.first().map(|l| l.href.clone()).unwrap_or_default(),
            description,
            raw_dates: Vec::new(),
            parsed_date: entry.published.or(entry.updated),
        }
    }
}

/// RSS/Atom/RDFのいずれかのフィードを項目の一覧にする
///
/// RSS 2.0は日時表記を保ったまま読み、それ以外は `feed-rs` で解析する。
pub fn parse_feed_items(xml: &str) -> Result<Vec<FeedItem>> {
    if let Ok(channel) = parse_channel_from_xml_str(xml) {
        return Ok(channel.into_items().into_iter().map(FeedItem::from).collect());
    }

    let feed = feed_rs::parser::parse(xml.as_bytes()).context("フィードのXML解析に失敗")?;
    Ok(feed.entries.into_iter().map(FeedItem::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_common_date_formats() {
        // ISO 8601 / RFC 3339
        let rfc3339 = "2025-08-10T12:30:00Z";
        let expected = Utc.with_ymd_and_hms(2025, 8, 10, 12, 30, 0).unwrap();
        assert_eq!(parse_date(rfc3339).unwrap(), expected);

        // RFC 2822 (RSSで一般的)
        let rfc2822 = "Sun, 10 Aug 2025 12:30:00 +0000";
        assert_eq!(parse_date(rfc2822).unwrap(), expected);
    }

    #[test]
    fn test_parse_with_timezones() {
        // 台北時間 (+08:00)
        let tpe_str = "2025-08-10T20:30:00+08:00";
        let expected_utc = Utc.with_ymd_and_hms(2025, 8, 10, 12, 30, 0).unwrap();
        assert_eq!(parse_date(tpe_str).unwrap(), expected_utc);

        // PST (-08:00)
        let pst_str = "2025-08-10T04:30:00-08:00";
        assert_eq!(parse_date(pst_str).unwrap(), expected_utc);
    }

    #[test]
    fn test_parse_invalid_formats() {
        assert!(parse_date("invalid-date").is_err());
        assert!(parse_date("").is_err());
    }

    #[test]
    fn test_parse_channel_from_xml_str() {
        let xml = r#"
            <rss version="2.0">
                <channel>
                    <title>Test Feed</title>
                    <link>https://example.com</link>
                    <description>Test Description</description>
                    <item>
                        <title>Test Article 1</title>
                        <link>http://example.com/article1</link>
                    </item>
                </channel>
            </rss>
            "#;
        let channel = parse_channel_from_xml_str(xml).expect("RSSの解析に失敗");
        assert_eq!(channel.items().len(), 1);
        assert_eq!(channel.items()[0].link(), Some("http://example.com/article1"));

        assert!(parse_channel_from_xml_str("<invalid>xml content</broken>").is_err());
    }

    #[test]
    fn test_parse_feed_items_rss_keeps_raw_dates() {
        let xml = r#"<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
            <channel>
                <title>t</title><link>https://example.com</link><description>d</description>
                <item>
                    <title>一件目</title>
                    <link>http://example.com/1</link>
                    <pubDate>garbage</pubDate>
                    <dc:date>2022-06-15T07:00:00+08:00</dc:date>
                </item>
            </channel>
        </rss>"#;

        let items = parse_feed_items(xml).expect("RSSの解析に失敗");

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].link, "http://example.com/1");
        assert_eq!(items[0].raw_dates, vec!["garbage", "2022-06-15T07:00:00+08:00"]);
        assert!(items[0].parsed_date.is_none());
    }

    #[test]
    fn test_parse_feed_items_atom() {
        let xml = load_atom_fixture();

        let items = parse_feed_items(&xml).expect("Atomの解析に失敗");

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Atomの一件目");
        assert_eq!(items[0].link, "http://atom.example.com/news/1");
        assert_eq!(items[0].description, "一件目の要約");
        assert!(items[0].raw_dates.is_empty());
        assert_eq!(
            items[0].parsed_date,
            Some(Utc.with_ymd_and_hms(2022, 6, 15, 2, 33, 0).unwrap()),
            "publishedを優先"
        );
        assert_eq!(
            items[1].parsed_date,
            Some(Utc.with_ymd_and_hms(2022, 6, 14, 23, 0, 0).unwrap()),
            "publishedがなければupdated"
        );
    }

    #[test]
    fn test_parse_feed_items_rejects_non_feed() {
        assert!(parse_feed_items("<html>not a feed").is_err());
    }

    fn load_atom_fixture() -> String {
        crate::infra::storage::file::load_text_from_file("fixtures/rss/atom.xml")
            .expect("Atomのフィクスチャが読めない")
    }
}
