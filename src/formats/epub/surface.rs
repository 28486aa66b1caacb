//! EPUB 渲染面
//!
//! 每个 spine 章节按当前字号切成若干页。位置标记形如 `章节路径@字节偏移`，
//! 偏移指向页首，字号改变重新分页后仍能落回同一段文字。

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use super::engine::EpubBook;
use crate::formats::common::truncate_chars;
use crate::formats::{BookFormat, DisplayStyle, PageView, ReadingSurface, TocItem};
use crate::models::Location;

static LOCATION_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<path>.+)@(?P<offset>\d+)$").unwrap());

const MIN_FONT_SIZE: u32 = 10;
const MAX_FONT_SIZE: u32 = 48;

/// 根据字号估算每页可容纳的字符数
pub fn chars_per_page(font_size: u32) -> usize {
    let normalized = font_size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE) as f32;
    let chars_per_line = (80.0 * (16.0 / normalized)).round().clamp(30.0, 120.0) as usize;
    let lines_per_page = (28.0 * (16.0 / normalized)).round().clamp(10.0, 80.0) as usize;
    chars_per_line.saturating_mul(lines_per_page).max(1)
}

/// 把文本切成页，返回每页起始字节偏移，末尾附加文本长度
///
/// 优先在页内后半段的换行处断开，避免把段落拦腰截断。
pub fn paginate(text: &str, chars_per_page: usize) -> Vec<usize> {
    let mut boundaries = vec![0];
    let mut start = 0;
    while start < text.len() {
        let rest = &text[start..];
        let window_end = match rest.char_indices().nth(chars_per_page) {
            Some((idx, _)) => idx,
            None => break,
        };
        let window = &rest[..window_end];
        let cut = match window.rfind('\n') {
            Some(nl) if nl + 1 >= window_end / 2 => nl + 1,
            _ => window_end,
        };
        start += cut;
        boundaries.push(start);
    }
    boundaries.push(text.len());
    boundaries.dedup();
    if boundaries.len() == 1 {
        // 空章节也保留一页
        boundaries.push(0);
    }
    boundaries
}

pub fn format_token(path: &str, offset: usize) -> String {
    format!("{}@{}", path, offset)
}

pub fn parse_token(token: &str) -> Option<(&str, usize)> {
    let caps = LOCATION_TOKEN.captures(token)?;
    let path = caps.name("path")?.as_str();
    let offset = caps.name("offset")?.as_str().parse().ok()?;
    Some((path, offset))
}

pub struct EpubSurface {
    book: Arc<EpubBook>,
    chapter: usize,
    /// 当前章节的分页边界
    pages: Vec<usize>,
    page: usize,
    style: DisplayStyle,
}

impl EpubSurface {
    pub fn new(book: Arc<EpubBook>, style: DisplayStyle) -> Self {
        let mut surface = Self {
            book,
            chapter: 0,
            pages: vec![0, 0],
            page: 0,
            style,
        };
        surface.set_chapter(0);
        surface
    }

    fn chapter_text(&self) -> &str {
        self.book
            .chapters
            .get(self.chapter)
            .map(|c| c.text.as_str())
            .unwrap_or("")
    }

    fn page_count(&self) -> usize {
        self.pages.len() - 1
    }

    fn set_chapter(&mut self, chapter: usize) {
        self.chapter = chapter.min(self.book.chapters.len().saturating_sub(1));
        self.pages = paginate(self.chapter_text(), chars_per_page(self.style.font_size));
        self.page = 0;
    }

    /// 当前页首的字节偏移
    fn page_offset(&self) -> usize {
        self.pages[self.page]
    }

    fn page_for_offset(&self, offset: usize) -> usize {
        let count = self.page_count();
        (0..count)
            .rev()
            .find(|&p| self.pages[p] <= offset)
            .unwrap_or(0)
    }

    fn page_text(&self) -> &str {
        let text = self.chapter_text();
        let start = self.pages[self.page].min(text.len());
        let end = self.pages[self.page + 1].min(text.len());
        &text[start..end]
    }
}

impl ReadingSurface for EpubSurface {
    fn format(&self) -> BookFormat {
        BookFormat::Epub
    }

    fn display_current(&self) -> PageView {
        PageView {
            text: self.page_text().to_string(),
            heading: self.chapter_label(),
            page: self.page,
            page_count: self.page_count(),
            style: self.style,
        }
    }

    fn advance(&mut self) -> bool {
        if self.page + 1 < self.page_count() {
            self.page += 1;
            true
        } else if self.chapter + 1 < self.book.chapters.len() {
            self.set_chapter(self.chapter + 1);
            true
        } else {
            false
        }
    }

    fn retreat(&mut self) -> bool {
        if self.page > 0 {
            self.page -= 1;
            true
        } else if self.chapter > 0 {
            self.set_chapter(self.chapter - 1);
            self.page = self.page_count() - 1;
            true
        } else {
            false
        }
    }

    fn current_location(&self) -> Option<Location> {
        let chapter = self.book.chapters.get(self.chapter)?;
        Some(Location::Token(format_token(&chapter.path, self.page_offset())))
    }

    fn display(&mut self, location: &Location) -> bool {
        let token = match location {
            Location::Token(token) => token,
            Location::Page(_) => return false,
        };

        // 完整位置标记，或者目录里的 href
        let (chapter, offset) = match parse_token(token) {
            Some((path, offset)) => match self.book.chapter_index_for_href(path) {
                Some(idx) => (idx, offset),
                None => return false,
            },
            None => match self.book.chapter_index_for_href(token) {
                Some(idx) => (idx, 0),
                None => return false,
            },
        };

        self.set_chapter(chapter);
        self.page = self.page_for_offset(offset);
        true
    }

    fn apply_style(&mut self, style: DisplayStyle) {
        let offset = self.page_offset();
        let repaginate = style.font_size != self.style.font_size;
        self.style = style;
        if repaginate {
            self.pages = paginate(self.chapter_text(), chars_per_page(style.font_size));
            self.page = self.page_for_offset(offset);
        }
    }

    fn context_excerpt(&self, max_chars: usize) -> String {
        truncate_chars(self.chapter_text(), max_chars).to_string()
    }

    fn toc(&self) -> &[TocItem] {
        &self.book.toc
    }

    fn chapter_label(&self) -> Option<String> {
        // 没有目录项指向本章时不猜测标题
        TocItem::flatten(&self.book.toc)
            .into_iter()
            .find(|item| self.book.chapter_index_for_href(&item.href) == Some(self.chapter))
            .map(|item| item.title.clone())
            .filter(|title| !title.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::epub::EpubChapter;
    use crate::settings::Theme;

    fn sample_book() -> Arc<EpubBook> {
        let long_text = (0..200)
            .map(|i| format!("Paragraph {i} of the second chapter."))
            .collect::<Vec<_>>()
            .join("\n");
        Arc::new(EpubBook {
            title: Some("Sample".into()),
            chapters: vec![
                EpubChapter {
                    path: "OEBPS/cover.xhtml".into(),
                    text: "Cover page".into(),
                },
                EpubChapter {
                    path: "OEBPS/c1.xhtml".into(),
                    text: long_text,
                },
                EpubChapter {
                    path: "OEBPS/c2.xhtml".into(),
                    text: "The end.".into(),
                },
            ],
            toc: vec![
                TocItem {
                    title: "Chapter One".into(),
                    href: "OEBPS/c1.xhtml".into(),
                    level: 0,
                    children: vec![],
                },
                TocItem {
                    title: "Epilogue".into(),
                    href: "OEBPS/c2.xhtml#end".into(),
                    level: 0,
                    children: vec![],
                },
            ],
        })
    }

    #[test]
    fn test_paginate_covers_whole_text() {
        let text = "line\n".repeat(1000);
        let pages = paginate(&text, 300);
        assert_eq!(pages[0], 0);
        assert_eq!(*pages.last().unwrap(), text.len());
        assert!(pages.windows(2).all(|w| w[0] < w[1]));
        // 每页在换行后断开
        for &b in &pages[1..pages.len() - 1] {
            assert_eq!(&text[b - 1..b], "\n");
        }
    }

    #[test]
    fn test_paginate_empty_text() {
        assert_eq!(paginate("", 100), vec![0, 0]);
    }

    #[test]
    fn test_token_round_trip() {
        let token = format_token("OEBPS/c1.xhtml", 42);
        assert_eq!(parse_token(&token), Some(("OEBPS/c1.xhtml", 42)));
        assert_eq!(parse_token("OEBPS/c1.xhtml"), None);
    }

    #[test]
    fn test_navigation_crosses_chapters_and_stops_at_end() {
        let mut surface = EpubSurface::new(sample_book(), DisplayStyle::default());
        assert!(!surface.retreat());
        assert!(surface.advance());
        assert_eq!(surface.chapter, 1);

        let mut steps = 0;
        while surface.advance() {
            steps += 1;
            assert!(steps < 1000);
        }
        assert_eq!(surface.chapter, 2);
        assert!(!surface.advance());
        assert_eq!(surface.display_current().text, "The end.");
    }

    #[test]
    fn test_retreat_lands_on_last_page_of_previous_chapter() {
        let mut surface = EpubSurface::new(sample_book(), DisplayStyle::default());
        assert!(surface.display(&Location::Token("OEBPS/c2.xhtml".into())));
        assert!(surface.retreat());
        assert_eq!(surface.chapter, 1);
        assert_eq!(surface.page, surface.page_count() - 1);
    }

    #[test]
    fn test_location_survives_repagination() {
        let mut surface = EpubSurface::new(sample_book(), DisplayStyle::default());
        surface.advance();
        surface.advance();
        surface.advance();
        let location = surface.current_location().unwrap();
        let before = surface.display_current().text;

        surface.apply_style(DisplayStyle {
            theme: Theme::Dark,
            font_size: 12,
        });
        let after = surface.display_current().text;
        assert!(after.contains(before.lines().next().unwrap()));

        let mut other = EpubSurface::new(sample_book(), DisplayStyle::default());
        assert!(other.display(&location));
        assert_eq!(other.display_current().text, before);
    }

    #[test]
    fn test_display_rejects_unknown_targets() {
        let mut surface = EpubSurface::new(sample_book(), DisplayStyle::default());
        assert!(!surface.display(&Location::Page(3)));
        assert!(!surface.display(&Location::Token("OEBPS/missing.xhtml@0".into())));
        assert_eq!(surface.chapter, 0);
    }

    #[test]
    fn test_chapter_label_from_toc() {
        let mut surface = EpubSurface::new(sample_book(), DisplayStyle::default());
        assert_eq!(surface.chapter_label(), None);
        surface.advance();
        assert_eq!(surface.chapter_label().as_deref(), Some("Chapter One"));
        assert!(surface.display(&Location::Token("OEBPS/c2.xhtml#end".into())));
        assert_eq!(surface.chapter_label().as_deref(), Some("Epilogue"));
    }
}
