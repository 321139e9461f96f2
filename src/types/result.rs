/// 1回のフィード取り込みの結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedReport {
    /// 全ユニットから集まった候補記事数
    pub fetched: usize,
    /// 既存URLとの重複排除後に残った記事数
    pub filtered: usize,
    /// 実際に保存できた記事のURL
    pub persisted_urls: Vec<String>,
}

impl std::fmt::Display for FeedReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "処理完了: 取得{}件、重複排除後{}件、保存{}件",
            self.fetched,
            self.filtered,
            self.persisted_urls.len()
        )
    }
}

impl FeedReport {
    pub fn new(fetched: usize, filtered: usize, persisted_urls: Vec<String>) -> Self {
        Self {
            fetched,
            filtered,
            persisted_urls,
        }
    }

    /// 保存件数
    pub fn persisted(&self) -> usize {
        self.persisted_urls.len()
    }
}
