use sha2::{Digest, Sha256};

/// 文字列からSHA256ベースのハッシュ値を計算する
///
/// 戻り値は16進数表記を `length` 文字（最大64文字）に切り詰めたもの。
pub fn calc_hash(input: &str, length: usize) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let hash_hex = format!("{:x}", digest);
    hash_hex[..length.min(hash_hex.len())].to_string()
}

/// モックRSS用の識別子をフィードURLから生成する
///
/// テストでフィードごとに異なる記事URLを作るために使う（6文字）。
///
/// # Example
/// ```
/// use mesh_feeder::infra::compute::generate_mock_rss_id;
/// let id = generate_mock_rss_id("https://example.com/rss.xml");
/// assert_eq!(id.len(), 6);
/// ```
pub fn generate_mock_rss_id(url: &str) -> String {
    calc_hash(url, 6)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calc_hash_length_and_stability() {
        let input = "https://test.example.com";

        assert_eq!(calc_hash(input, 3).len(), 3);
        assert_eq!(calc_hash(input, 10).len(), 10);
        assert_eq!(calc_hash(input, 100).len(), 64);

        // 同じ入力は常に同じハッシュ
        assert_eq!(calc_hash(input, 6), calc_hash(input, 6));
        // 異なる入力は異なるハッシュ
        assert_ne!(calc_hash(input, 6), calc_hash("https://other.example.com", 6));
    }

    #[test]
    fn test_generate_mock_rss_id() {
        let id1 = generate_mock_rss_id("https://example.com/rss.xml");
        let id2 = generate_mock_rss_id("https://different.com/feed.xml");

        assert_eq!(id1.len(), 6, "RSS IDの長さが6文字ではありません");
        assert_ne!(id1, id2, "異なるURLから同じIDが生成されました");
        assert!(id1.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
