//! TXT 分页器
//! 按固定字符数把全文切成页面，纯内存、同步

use std::sync::Arc;

use super::common::truncate_chars;
use super::{BookFormat, DisplayStyle, PageView, ReadingSurface};
use crate::models::Location;

/// 每页字符数
pub const TXT_PAGE_SIZE: usize = 2000;

pub struct TextPaginator {
    /// 全文内容
    content: Arc<str>,
    /// 每页起始的字节偏移，末尾额外记录全文长度
    boundaries: Vec<usize>,
    current_page: usize,
    style: DisplayStyle,
}

impl TextPaginator {
    pub fn new(content: Arc<str>, style: DisplayStyle) -> Self {
        Self::with_page_size(content, TXT_PAGE_SIZE, style)
    }

    pub fn with_page_size(content: Arc<str>, page_size: usize, style: DisplayStyle) -> Self {
        let page_size = page_size.max(1);
        let boundaries = Self::compute_boundaries(&content, page_size);
        Self {
            content,
            boundaries,
            current_page: 0,
            style,
        }
    }

    fn compute_boundaries(content: &str, page_size: usize) -> Vec<usize> {
        let mut boundaries: Vec<usize> = content
            .char_indices()
            .step_by(page_size)
            .map(|(idx, _)| idx)
            .collect();
        if boundaries.is_empty() {
            // 空文本也保留一页
            boundaries.push(0);
        }
        boundaries.push(content.len());
        boundaries
    }

    pub fn page_count(&self) -> usize {
        self.boundaries.len() - 1
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    /// 指定页的文本
    pub fn page_text(&self, page: usize) -> &str {
        let page = page.min(self.page_count() - 1);
        &self.content[self.boundaries[page]..self.boundaries[page + 1]]
    }

    /// 跳到指定页，超出范围时停在最后一页
    pub fn go_to(&mut self, page: usize) {
        self.current_page = page.min(self.page_count() - 1);
    }
}

impl ReadingSurface for TextPaginator {
    fn format(&self) -> BookFormat {
        BookFormat::Txt
    }

    fn display_current(&self) -> PageView {
        PageView {
            text: self.page_text(self.current_page).to_string(),
            heading: None,
            page: self.current_page,
            page_count: self.page_count(),
            style: self.style,
        }
    }

    fn advance(&mut self) -> bool {
        if self.current_page + 1 < self.page_count() {
            self.current_page += 1;
            true
        } else {
            false
        }
    }

    fn retreat(&mut self) -> bool {
        if self.current_page > 0 {
            self.current_page -= 1;
            true
        } else {
            false
        }
    }

    fn current_location(&self) -> Option<Location> {
        Some(Location::Page(self.current_page as u32))
    }

    fn display(&mut self, location: &Location) -> bool {
        match location.as_page() {
            Some(page) => {
                self.go_to(page as usize);
                true
            }
            None => false,
        }
    }

    fn apply_style(&mut self, style: DisplayStyle) {
        // 分页固定按字符数，字号只影响显示
        self.style = style;
    }

    fn context_excerpt(&self, max_chars: usize) -> String {
        truncate_chars(self.page_text(self.current_page), max_chars).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Theme;

    fn paginator(text: &str) -> TextPaginator {
        TextPaginator::new(Arc::from(text), DisplayStyle::default())
    }

    #[test]
    fn test_page_count() {
        assert_eq!(paginator("").page_count(), 1);
        assert_eq!(paginator(&"a".repeat(2000)).page_count(), 1);
        assert_eq!(paginator(&"a".repeat(2001)).page_count(), 2);
        assert_eq!(paginator(&"a".repeat(5000)).page_count(), 3);
    }

    #[test]
    fn test_novel_scenario() {
        let text: String = (0..5000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let mut book = paginator(&text);

        assert_eq!(book.display_current().text, &text[0..2000]);
        assert!(book.advance());
        assert_eq!(book.display_current().text, &text[2000..4000]);
        assert!(book.advance());
        assert_eq!(book.display_current().text, &text[4000..5000]);
        assert!(!book.advance());
        assert_eq!(book.current_location(), Some(Location::Page(2)));
    }

    #[test]
    fn test_advance_only_while_next_page_exists() {
        let len = 4500;
        let mut book = paginator(&"x".repeat(len));
        let mut k = 0;
        loop {
            let can_advance = (k + 1) * TXT_PAGE_SIZE < len;
            assert_eq!(book.advance(), can_advance);
            if !can_advance {
                break;
            }
            k += 1;
        }
        assert_eq!(book.current_page(), 2);
    }

    #[test]
    fn test_retreat_at_start_is_noop() {
        let mut book = paginator("short");
        assert!(!book.retreat());
        assert_eq!(book.current_page(), 0);
    }

    #[test]
    fn test_multibyte_pages_split_on_chars() {
        let text = "书".repeat(2500);
        let mut book = paginator(&text);
        assert_eq!(book.page_count(), 2);
        assert_eq!(book.display_current().text.chars().count(), 2000);
        assert!(book.advance());
        assert_eq!(book.display_current().text.chars().count(), 500);
    }

    #[test]
    fn test_display_clamps_to_last_page() {
        let mut book = paginator(&"a".repeat(4100));
        assert!(book.display(&Location::Page(9)));
        assert_eq!(book.current_page(), 2);
        assert!(book.display(&Location::Token("1".into())));
        assert_eq!(book.current_page(), 1);
        assert!(!book.display(&Location::Token("OEBPS/ch1.xhtml@0".into())));
        assert_eq!(book.current_page(), 1);
    }

    #[test]
    fn test_style_applies_without_repaginating() {
        let mut book = paginator(&"a".repeat(3000));
        book.apply_style(DisplayStyle {
            theme: Theme::Dark,
            font_size: 22,
        });
        let view = book.display_current();
        assert_eq!(view.style.font_size, 22);
        assert_eq!(view.page_count, 2);
    }

    #[test]
    fn test_context_excerpt_is_current_page() {
        let mut book = paginator(&format!("{}{}", "a".repeat(2000), "b".repeat(10)));
        book.advance();
        assert_eq!(book.context_excerpt(5), "bbbbb");
    }
}
