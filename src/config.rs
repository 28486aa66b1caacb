//! 命令行参数与数据目录

use std::path::PathBuf;

use clap::Parser;

pub const DB_FILE: &str = "ebook-reader.db";
const DEFAULT_LOG_LEVEL: &str = "warn";

/// 终端电子书阅读器（EPUB / TXT）
#[derive(Parser, Debug)]
#[command(name = "ebook-reader", version, about)]
pub struct Cli {
    /// 启动时导入并打开的书籍
    pub book: Option<PathBuf>,

    /// 书库与设置的存放目录
    #[arg(long, env = "EBOOK_READER_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// 日志级别，覆盖 RUST_LOG
    #[arg(long, env = "EBOOK_READER_LOG")]
    pub log_level: Option<String>,
}

impl Cli {
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    pub fn log_filter(&self) -> String {
        self.log_level
            .clone()
            .or_else(|| std::env::var("RUST_LOG").ok())
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
    }
}

/// `$XDG_DATA_HOME/ebook-reader`，其次 `~/.local/share/ebook-reader`
fn default_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("XDG_DATA_HOME").filter(|d| !d.is_empty()) {
        return PathBuf::from(dir).join("ebook-reader");
    }
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".local/share/ebook-reader"),
        None => PathBuf::from("ebook-reader-data"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        let cli = Cli::try_parse_from([
            "ebook-reader",
            "--data-dir",
            "/tmp/books",
            "--log-level",
            "debug",
            "novel.txt",
        ])
        .unwrap();
        assert_eq!(cli.data_dir(), PathBuf::from("/tmp/books"));
        assert_eq!(cli.log_filter(), "debug");
        assert_eq!(cli.book, Some(PathBuf::from("novel.txt")));
    }

    #[test]
    fn test_book_is_optional() {
        let cli = Cli::try_parse_from(["ebook-reader", "--data-dir", "/tmp/books"]).unwrap();
        assert!(cli.book.is_none());
    }
}
