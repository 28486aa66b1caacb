use crate::models::Location;
use crate::settings::Theme;
use serde::{Deserialize, Serialize};

pub mod common;
pub mod epub;
pub mod txt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookFormat {
    Epub,
    Txt,
}

impl BookFormat {
    /// 根据扩展名识别格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext_lower = ext.to_lowercase();
        let ext_with_dot = if ext_lower.starts_with('.') {
            ext_lower
        } else {
            format!(".{}", ext_lower)
        };

        match ext_with_dot.as_str() {
            ".epub" => Some(BookFormat::Epub),
            ".txt" => Some(BookFormat::Txt),
            _ => None,
        }
    }

    /// 根据文件路径识别格式
    pub fn from_path(path: &str) -> Option<Self> {
        common::get_extension(path).and_then(|ext| Self::from_extension(&ext))
    }

    /// 数据库中保存的类型名
    pub fn as_str(&self) -> &'static str {
        match self {
            BookFormat::Epub => "epub",
            BookFormat::Txt => "txt",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "epub" => Some(BookFormat::Epub),
            "txt" => Some(BookFormat::Txt),
            _ => None,
        }
    }
}

/// 目录项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TocItem {
    pub title: String,
    /// 章节内容路径，可能带有 `#fragment`
    pub href: String,
    pub level: u32,
    #[serde(default)]
    pub children: Vec<TocItem>,
}

impl TocItem {
    /// 深度优先展开目录树
    pub fn flatten(items: &[TocItem]) -> Vec<&TocItem> {
        let mut out = Vec::new();
        for item in items {
            out.push(item);
            out.extend(TocItem::flatten(&item.children));
        }
        out
    }
}

/// 渲染面上的显示样式，随设置变化
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayStyle {
    pub theme: Theme,
    pub font_size: u32,
}

impl Default for DisplayStyle {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            font_size: crate::settings::DEFAULT_FONT_SIZE,
        }
    }
}

/// 当前页的显示内容
#[derive(Debug, Clone, PartialEq)]
pub struct PageView {
    pub text: String,
    /// 章节标题（仅 EPUB）
    pub heading: Option<String>,
    /// 从 0 开始的页序号
    pub page: usize,
    pub page_count: usize,
    pub style: DisplayStyle,
}

/// 阅读渲染面
///
/// EPUB 引擎与 TXT 分页器共用同一组能力，会话控制器只通过此接口驱动翻页。
pub trait ReadingSurface: Send {
    fn format(&self) -> BookFormat;

    /// 当前页内容
    fn display_current(&self) -> PageView;

    /// 前进一页，已在末尾时返回 false
    fn advance(&mut self) -> bool;

    /// 后退一页，已在开头时返回 false
    fn retreat(&mut self) -> bool;

    /// 当前可持久化的位置
    fn current_location(&self) -> Option<Location>;

    /// 跳转到指定位置，无法解析时返回 false 并保持原位
    fn display(&mut self, location: &Location) -> bool;

    fn apply_style(&mut self, style: DisplayStyle);

    /// 当前位置附近的文本，最多 `max_chars` 个字符
    fn context_excerpt(&self, max_chars: usize) -> String;

    fn toc(&self) -> &[TocItem] {
        &[]
    }

    /// 当前位置所在章节在目录中的标题
    fn chapter_label(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(BookFormat::from_extension(".epub"), Some(BookFormat::Epub));
        assert_eq!(BookFormat::from_extension("TXT"), Some(BookFormat::Txt));
        assert_eq!(BookFormat::from_extension(".pdf"), None);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(BookFormat::from_path("/books/novel.txt"), Some(BookFormat::Txt));
        assert_eq!(BookFormat::from_path("C:\\Books\\Dune.EPUB"), Some(BookFormat::Epub));
        assert_eq!(BookFormat::from_path("README"), None);
    }

    #[test]
    fn test_db_names_round_trip() {
        for format in [BookFormat::Epub, BookFormat::Txt] {
            assert_eq!(BookFormat::from_db(format.as_str()), Some(format));
        }
        assert_eq!(BookFormat::from_db("pdf"), None);
    }

    #[test]
    fn test_toc_flatten_order() {
        let toc = vec![
            TocItem {
                title: "卷一".into(),
                href: "v1.xhtml".into(),
                level: 0,
                children: vec![TocItem {
                    title: "第一章".into(),
                    href: "c1.xhtml".into(),
                    level: 1,
                    children: vec![],
                }],
            },
            TocItem {
                title: "卷二".into(),
                href: "v2.xhtml".into(),
                level: 0,
                children: vec![],
            },
        ];
        let titles: Vec<_> = TocItem::flatten(&toc).iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["卷一", "第一章", "卷二"]);
    }
}
