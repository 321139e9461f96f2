use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufReader, Read};

/// ファイルパスからBufReaderを作成する
/// パースやデータ変換は呼び出し側で行う
pub fn load_file(file_path: &str) -> Result<BufReader<File>> {
    let file = File::open(file_path)
        .with_context(|| format!("ファイルの読み込みに失敗しました: {}", file_path))?;
    Ok(BufReader::new(file))
}

/// ファイル全体を文字列として読み込む
pub fn load_text_from_file(file_path: &str) -> Result<String> {
    let mut buf_reader = load_file(file_path)?;
    let mut text = String::new();
    buf_reader
        .read_to_string(&mut text)
        .with_context(|| format!("ファイルの読み込みに失敗しました: {}", file_path))?;
    Ok(text)
}

/// YAMLファイルからSerdeでDeserializeできる型を読み込む
pub fn load_yaml_from_file<T: DeserializeOwned>(file_path: &str) -> Result<T> {
    let buf_reader = load_file(file_path)?;
    serde_yaml::from_reader(buf_reader)
        .with_context(|| format!("YAMLファイルの解析に失敗: {}", file_path))
}
