//! 展示层
//!
//! 书库、目录、书签和页面都渲染为纯文本视图。每次渲染都根据传入的数据完整生成，
//! 视图之间不保留任何状态；视图上的编号从 1 开始，接口参数从 0 开始。

pub mod cover;

use std::collections::HashMap;
use std::fmt;

use chrono::DateTime;

use crate::formats::{PageView, TocItem};
use crate::models::{BookRecord, Bookmark, Location};
use crate::settings::Theme;
pub use cover::{Cover, CoverCache};

pub const EMPTY_LIBRARY_MESSAGE: &str = "书库为空，使用 import <文件> 导入书籍。";
pub const EMPTY_TOC_MESSAGE: &str = "未找到目录。";

const DARK_START: &str = "\x1b[48;5;235m\x1b[38;5;252m";
const STYLE_RESET: &str = "\x1b[0m";

/// 书库中的一项
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryTile {
    pub id: Option<i64>,
    pub title: String,
    pub cover: Cover,
    pub imported_on: Option<String>,
}

/// 书库网格
pub struct LibraryView<'a> {
    books: &'a [BookRecord],
    tiles: Vec<LibraryTile>,
}

impl<'a> LibraryView<'a> {
    pub fn tiles(&self) -> &[LibraryTile] {
        &self.tiles
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// 选中第 `index` 本书
    pub fn select(&self, index: usize) -> Option<&'a BookRecord> {
        self.books.get(index)
    }
}

impl fmt::Display for LibraryView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tiles.is_empty() {
            return writeln!(f, "{}", EMPTY_LIBRARY_MESSAGE);
        }
        for (n, tile) in self.tiles.iter().enumerate() {
            let cover = if tile.cover.is_placeholder() { "[ ]" } else { "[■]" };
            write!(f, "{:>3}. {} {}", n + 1, cover, tile.title)?;
            if let Some(id) = tile.id {
                write!(f, "  #{}", id)?;
            }
            if let Some(date) = &tile.imported_on {
                write!(f, "  ({})", date)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

pub fn render_library<'a>(
    books: &'a [BookRecord],
    covers: &HashMap<i64, Cover>,
) -> LibraryView<'a> {
    let tiles = books
        .iter()
        .map(|book| LibraryTile {
            id: book.id,
            title: book.name.clone(),
            cover: book
                .id
                .and_then(|id| covers.get(&id).cloned())
                .unwrap_or(Cover::Placeholder),
            imported_on: book
                .created_at
                .and_then(|ts| DateTime::from_timestamp(ts, 0))
                .map(|dt| dt.format("%Y-%m-%d").to_string()),
        })
        .collect();
    LibraryView { books, tiles }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TocEntry {
    pub label: String,
    pub target: Location,
    pub depth: u32,
}

/// 目录树，按深度优先顺序编号
#[derive(Debug, Clone, PartialEq)]
pub struct TocView {
    entries: Vec<TocEntry>,
}

impl TocView {
    pub fn entries(&self) -> &[TocEntry] {
        &self.entries
    }

    pub fn target(&self, index: usize) -> Option<&Location> {
        self.entries.get(index).map(|e| &e.target)
    }
}

impl fmt::Display for TocView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "目录")?;
        if self.entries.is_empty() {
            return writeln!(f, "  {}", EMPTY_TOC_MESSAGE);
        }
        for (n, entry) in self.entries.iter().enumerate() {
            let indent = "  ".repeat(entry.depth as usize + 1);
            writeln!(f, "{}{}. {}", indent, n + 1, entry.label)?;
        }
        Ok(())
    }
}

pub fn render_toc(toc: &[TocItem]) -> TocView {
    fn walk(items: &[TocItem], depth: u32, out: &mut Vec<TocEntry>) {
        for item in items {
            out.push(TocEntry {
                label: item.title.trim().to_string(),
                target: Location::Token(item.href.clone()),
                depth,
            });
            walk(&item.children, depth + 1, out);
        }
    }

    let mut entries = Vec::new();
    walk(toc, 0, &mut entries);
    TocView { entries }
}

/// 书签列表，每项可跳转或删除
#[derive(Debug, Clone, PartialEq)]
pub struct BookmarkView {
    entries: Vec<Bookmark>,
}

/// 书签列表上的操作
#[derive(Debug, Clone, PartialEq)]
pub enum BookmarkAction {
    Navigate(Location),
    Delete(usize),
}

impl BookmarkView {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn navigate(&self, index: usize) -> Option<BookmarkAction> {
        self.entries
            .get(index)
            .map(|b| BookmarkAction::Navigate(b.location.clone()))
    }

    pub fn delete(&self, index: usize) -> Option<BookmarkAction> {
        (index < self.entries.len()).then_some(BookmarkAction::Delete(index))
    }
}

impl fmt::Display for BookmarkView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "书签")?;
        for (n, bookmark) in self.entries.iter().enumerate() {
            writeln!(f, "  {}. {}  [×]", n + 1, bookmark.label)?;
        }
        Ok(())
    }
}

/// 没有书签时返回 None，书签面板隐藏
pub fn render_bookmarks(bookmarks: &[Bookmark]) -> Option<BookmarkView> {
    if bookmarks.is_empty() {
        return None;
    }
    Some(BookmarkView {
        entries: bookmarks.to_vec(),
    })
}

/// 侧栏：目录与书签面板
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sidebar {
    pub toc: Option<TocView>,
    pub bookmarks: Option<BookmarkView>,
}

impl Sidebar {
    pub fn hide_toc(&mut self) {
        self.toc = None;
    }

    pub fn hide_bookmarks(&mut self) {
        self.bookmarks = None;
    }

    pub fn is_hidden(&self) -> bool {
        self.toc.is_none() && self.bookmarks.is_none()
    }
}

impl fmt::Display for Sidebar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(toc) = &self.toc {
            write!(f, "{}", toc)?;
        }
        if let Some(bookmarks) = &self.bookmarks {
            write!(f, "{}", bookmarks)?;
        }
        Ok(())
    }
}

/// 渲染当前页，深色主题用终端配色
pub fn render_page(view: &PageView) -> String {
    let mut header = String::from("──");
    if let Some(heading) = &view.heading {
        header.push_str(&format!(" {} ·", heading));
    }
    header.push_str(&format!(
        " 第 {}/{} 页 · {}px ──",
        view.page + 1,
        view.page_count.max(1),
        view.style.font_size
    ));

    let body = format!("{}\n{}\n", header, view.text.trim_end());
    match view.style.theme {
        Theme::Dark => format!("{}{}{}", DARK_START, body, STYLE_RESET),
        Theme::Light => body,
    }
}

/// EPUB 解析失败时在渲染面上显示的内联错误
pub fn render_load_error(message: &str) -> String {
    format!("!! {}\n   请检查文件格式或日志输出。\n", message)
}
