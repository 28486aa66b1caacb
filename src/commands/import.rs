use std::path::Path;

use tracing::info;

use crate::commands::AppState;
use crate::error::{Error, Result};
use crate::formats::common::{decode_text, get_file_name};
use crate::formats::BookFormat;
use crate::models::BookRecord;

/// 导入单个文件到书库，书名取文件名
pub async fn import_book(state: &AppState, path: &Path) -> Result<BookRecord> {
    if !state.storage_ready() {
        return Err(Error::precondition("书库不可用，无法导入书籍。"));
    }

    let path_str = path.to_string_lossy();
    let format = BookFormat::from_path(&path_str).ok_or_else(|| {
        Error::precondition(format!(
            "不支持的文件格式: {}（仅支持 .epub 和 .txt）",
            path_str
        ))
    })?;
    let name = get_file_name(&path_str).unwrap_or_else(|| path_str.to_string());

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| Error::Read(format!("读取文件失败 {}: {}", path_str, e)))?;

    let record = match format {
        BookFormat::Txt => BookRecord::text(name, decode_text(&bytes)),
        BookFormat::Epub => BookRecord::epub(name, bytes),
    };
    let id = state.store.create(&record).await?;
    info!(id, name = %record.name, format = format.as_str(), "Book imported");

    state
        .store
        .get(id)
        .await?
        .ok_or_else(|| Error::Read(format!("导入后未找到书籍 {}", id)))
}
