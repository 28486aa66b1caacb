//! 书库持久化
//!
//! 单表 `books`，主键自增。所有操作都必须在 `initialize()` 完成后调用。

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::formats::BookFormat;
use crate::models::{BookContent, BookRecord, Bookmark, Location};

/// 数据库中的原始行
#[derive(Debug, FromRow)]
struct BookRow {
    id: i64,
    name: String,
    #[sqlx(rename = "type")]
    book_type: String,
    content: Vec<u8>,
    last_location: Option<String>,
    bookmarks: String,
    created_at: Option<i64>,
}

impl TryFrom<BookRow> for BookRecord {
    type Error = Error;

    fn try_from(row: BookRow) -> Result<Self> {
        let book_type = BookFormat::from_db(&row.book_type)
            .ok_or_else(|| Error::Read(format!("未知的书籍类型: {}", row.book_type)))?;
        let content = match book_type {
            BookFormat::Epub => BookContent::Binary(Arc::from(row.content)),
            BookFormat::Txt => {
                let text = String::from_utf8(row.content)
                    .map_err(|e| {
                        Error::Read(format!("书籍 {} 的文本内容损坏: {}", row.id, e))
                    })?;
                BookContent::Text(Arc::from(text))
            }
        };
        let last_location = match row.last_location.as_deref() {
            Some(raw) => Some(
                serde_json::from_str::<Location>(raw)
                    .map_err(|e| Error::Read(format!("阅读位置解析失败: {}", e)))?,
            ),
            None => None,
        };
        let bookmarks: Vec<Bookmark> = serde_json::from_str(&row.bookmarks)
            .map_err(|e| Error::Read(format!("书签解析失败: {}", e)))?;

        Ok(BookRecord {
            id: Some(row.id),
            name: row.name,
            book_type,
            content,
            last_location,
            bookmarks,
            created_at: row.created_at,
        })
    }
}

/// 书库存储。克隆后共享同一个连接池
#[derive(Debug, Clone, Default)]
pub struct BookStore {
    pool: Arc<OnceCell<SqlitePool>>,
}

impl BookStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn pool(&self) -> Result<&SqlitePool> {
        self.pool.get().ok_or(Error::NotInitialized)
    }

    pub fn is_initialized(&self) -> bool {
        self.pool.initialized()
    }

    /// 打开数据库，首次运行时创建文件和表
    pub async fn initialize(&self, db_path: &Path) -> Result<()> {
        if self.is_initialized() {
            return Ok(());
        }
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| {
                    Error::StorageUnavailable(format!("无法创建数据目录: {}", e))
                })?;
        }

        // sqlx 对 SQLite 推荐使用 sqlite:// 前缀，并使用正斜杠路径格式
        let db_path_str = db_path.to_string_lossy().replace('\\', "/");
        let database_url = format!("sqlite://{}?mode=rwc", db_path_str);
        let opts = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS books (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                type TEXT NOT NULL,
                content BLOB NOT NULL,
                last_location TEXT,
                bookmarks TEXT NOT NULL DEFAULT '[]',
                created_at INTEGER DEFAULT (strftime('%s', 'now'))
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| Error::StorageUnavailable(e.to_string()))?;

        // 并发初始化时以先完成者为准
        let _ = self.pool.set(pool);
        info!(path = %db_path.display(), "Database initialized");
        Ok(())
    }

    /// 插入新书，返回分配的 id
    pub async fn create(&self, record: &BookRecord) -> Result<i64> {
        let pool = self.pool()?;
        let (last_location, bookmarks) = encode_mutable_fields(record).map_err(Error::Write)?;

        let result = sqlx::query(
            "INSERT INTO books (name, type, content, last_location, bookmarks)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&record.name)
        .bind(record.book_type.as_str())
        .bind(record.content.as_bytes())
        .bind(last_location)
        .bind(bookmarks)
        .execute(pool)
        .await
        .map_err(|e| Error::Write(e.to_string()))?;

        let id = result.last_insert_rowid();
        info!(id, name = %record.name, "Book saved");
        Ok(id)
    }

    /// 读取全部书籍
    pub async fn list_all(&self) -> Result<Vec<BookRecord>> {
        let pool = self.pool()?;
        let rows = sqlx::query_as::<_, BookRow>("SELECT * FROM books ORDER BY id")
            .fetch_all(pool)
            .await
            .map_err(|e| Error::Read(e.to_string()))?;
        debug!(count = rows.len(), "Fetched all books");
        rows.into_iter().map(BookRecord::try_from).collect()
    }

    pub async fn get(&self, id: i64) -> Result<Option<BookRecord>> {
        let pool = self.pool()?;
        let row = sqlx::query_as::<_, BookRow>("SELECT * FROM books WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| Error::Read(e.to_string()))?;
        row.map(BookRecord::try_from).transpose()
    }

    /// 按 id 整条替换；id 不存在时插入
    pub async fn update(&self, record: &BookRecord) -> Result<()> {
        let pool = self.pool()?;
        let id = record
            .id
            .ok_or_else(|| Error::Write(format!("《{}》尚未保存到书库", record.name)))?;
        let (last_location, bookmarks) = encode_mutable_fields(record).map_err(Error::Write)?;

        sqlx::query(
            "INSERT INTO books (id, name, type, content, last_location, bookmarks)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                type = excluded.type,
                content = excluded.content,
                last_location = excluded.last_location,
                bookmarks = excluded.bookmarks",
        )
        .bind(id)
        .bind(&record.name)
        .bind(record.book_type.as_str())
        .bind(record.content.as_bytes())
        .bind(last_location)
        .bind(bookmarks)
        .execute(pool)
        .await
        .map_err(|e| Error::Write(e.to_string()))?;

        debug!(id, "Book updated");
        Ok(())
    }

    /// 删除书籍；id 不存在时什么也不做
    pub async fn delete(&self, id: i64) -> Result<()> {
        let pool = self.pool()?;
        let result = sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(|e| Error::Write(e.to_string()))?;
        info!(id, removed = result.rows_affected(), "Book deleted");
        Ok(())
    }
}

fn encode_mutable_fields(
    record: &BookRecord,
) -> std::result::Result<(Option<String>, String), String> {
    let last_location = record
        .last_location
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| e.to_string())?;
    let bookmarks = serde_json::to_string(&record.bookmarks).map_err(|e| e.to_string())?;
    Ok((last_location, bookmarks))
}
