//! 书籍格式公共工具

use chardetng::EncodingDetector;
use std::path::Path;
use tracing::warn;

/// 从路径提取扩展名
pub fn get_extension(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
}

/// 从路径提取文件名（含扩展名），作为书名
pub fn get_file_name(path: &str) -> Option<String> {
    let normalized = normalize_path(path);
    Path::new(&normalized)
        .file_name()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
}

/// 标准化路径分隔符
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// 将导入的文本字节解码为字符串
///
/// 优先按 UTF-8 解码（去掉 BOM）；不是合法 UTF-8 时用 chardetng 猜测编码。
pub fn decode_text(bytes: &[u8]) -> String {
    let body = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(body) {
        return text.to_string();
    }

    if bytes.starts_with(&[0xFF, 0xFE]) {
        let (decoded, _, _) = encoding_rs::UTF_16LE.decode(&bytes[2..]);
        return decoded.into_owned();
    }
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let (decoded, _, _) = encoding_rs::UTF_16BE.decode(&bytes[2..]);
        return decoded.into_owned();
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding = detector.guess(None, true);
    let (decoded, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        warn!(encoding = encoding.name(), "文本解码存在错误");
    }
    decoded.into_owned()
}

/// 按字符数截断，返回的切片始终落在字符边界上
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
