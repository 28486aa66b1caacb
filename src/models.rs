use crate::formats::BookFormat;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 书籍内容：EPUB 保留原始字节，TXT 保存解码后的文本
#[derive(Debug, Clone, PartialEq)]
pub enum BookContent {
    Binary(Arc<[u8]>),
    Text(Arc<str>),
}

impl BookContent {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            BookContent::Binary(bytes) => bytes,
            BookContent::Text(text) => text.as_bytes(),
        }
    }

    /// 共享的字节缓冲；EPUB 内容不复制
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        match self {
            BookContent::Binary(bytes) => Arc::clone(bytes),
            BookContent::Text(text) => Arc::from(text.as_bytes()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            BookContent::Text(text) => Some(text),
            BookContent::Binary(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }
}

/// 阅读位置
///
/// EPUB 为渲染引擎生成的不透明位置标记，TXT 为从 0 开始的页码。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Location {
    Page(u32),
    Token(String),
}

impl Location {
    /// 按页码解释位置，TXT 分页使用
    pub fn as_page(&self) -> Option<u32> {
        match self {
            Location::Page(page) => Some(*page),
            Location::Token(token) => token.trim().parse().ok(),
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::Page(page) => write!(f, "第 {} 页", page + 1),
            Location::Token(token) => write!(f, "{}", token),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub label: String,
    pub location: Location,
}

/// 书库中的一条书籍记录
#[derive(Debug, Clone, PartialEq)]
pub struct BookRecord {
    /// 由存储层在创建时分配，之后不再变化
    pub id: Option<i64>,
    pub name: String,
    pub book_type: BookFormat,
    pub content: BookContent,
    pub last_location: Option<Location>,
    pub bookmarks: Vec<Bookmark>,
    pub created_at: Option<i64>, // Unix timestamp
}

impl BookRecord {
    /// 新导入的书籍，尚未分配 id
    pub fn new(name: impl Into<String>, book_type: BookFormat, content: BookContent) -> Self {
        Self {
            id: None,
            name: name.into(),
            book_type,
            content,
            last_location: None,
            bookmarks: Vec::new(),
            created_at: None,
        }
    }

    pub fn text(name: impl Into<String>, text: impl Into<Arc<str>>) -> Self {
        Self::new(name, BookFormat::Txt, BookContent::Text(text.into()))
    }

    pub fn epub(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::new(name, BookFormat::Epub, BookContent::Binary(bytes.into()))
    }
}
