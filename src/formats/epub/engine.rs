use std::io::Cursor;

use epub::doc::{EpubDoc, NavPoint};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::formats::common::normalize_path;
use crate::formats::TocItem;

static EXTRA_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());
static HTML_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

/// 一个 spine 章节的纯文本
#[derive(Debug, Clone)]
pub struct EpubChapter {
    /// 章节在 EPUB 容器内的路径
    pub path: String,
    pub text: String,
}

/// 解析后的 EPUB，供渲染面按章节分页
#[derive(Debug, Clone, Default)]
pub struct EpubBook {
    pub title: Option<String>,
    pub chapters: Vec<EpubChapter>,
    pub toc: Vec<TocItem>,
}

impl EpubBook {
    /// 根据目录 href 找到对应的章节序号，忽略 `#fragment`
    pub fn chapter_index_for_href(&self, href: &str) -> Option<usize> {
        let target = normalize_path(href.split('#').next().unwrap_or(href));
        if target.is_empty() {
            return None;
        }
        self.chapters
            .iter()
            .position(|c| c.path == target)
            .or_else(|| {
                // 相对路径只在 `/` 边界上匹配
                self.chapters.iter().position(|c| {
                    path_ends_with(&c.path, &target) || path_ends_with(&target, &c.path)
                })
            })
    }
}

fn path_ends_with(path: &str, suffix: &str) -> bool {
    path.strip_suffix(suffix)
        .is_some_and(|head| head.is_empty() || head.ends_with('/'))
}

fn convert_toc_level(navpoints: &[NavPoint], level: u32) -> Vec<TocItem> {
    navpoints
        .iter()
        .map(|np| TocItem {
            title: np.label.trim().to_string(),
            href: normalize_path(&np.content.to_string_lossy()),
            level,
            children: convert_toc_level(&np.children, level + 1),
        })
        .collect()
}

/// HTML 章节转为纯文本；html2text 失败时退回到简单去标签
fn chapter_to_text(html: &str, index: usize) -> String {
    let plain = match html2text::from_read(html.as_bytes(), 10_000) {
        Ok(clean) => clean,
        Err(err) => {
            warn!(chapter = index, "html2text failed: {err}");
            HTML_TAGS.replace_all(html, "").into_owned()
        }
    };
    EXTRA_BLANK_LINES
        .replace_all(plain.trim(), "\n\n")
        .into_owned()
}

/// 解析 EPUB 原始字节（阻塞操作，调用方应放到 `spawn_blocking` 中）
pub fn parse_epub(bytes: &[u8]) -> Result<EpubBook> {
    let mut doc =
        EpubDoc::from_reader(Cursor::new(bytes)).map_err(|e| Error::Parse(e.to_string()))?;

    let title = doc.mdata("title").map(|m| m.value.clone());
    let toc = convert_toc_level(&doc.toc, 0);

    let total = doc.get_num_chapters();
    let mut chapters = Vec::with_capacity(total);
    for index in 0..total {
        if !doc.set_current_page(index) {
            return Err(Error::Parse(format!("设置章节 {} 失败", index)));
        }
        let path = doc
            .get_current_path()
            .map(|p| normalize_path(&p.to_string_lossy()))
            .unwrap_or_default();
        let html = match doc.get_current_str() {
            Some((html, _mime)) => html,
            None => {
                warn!(chapter = index, path = %path, "章节内容无法读取，跳过");
                continue;
            }
        };
        let text = chapter_to_text(&html, index);
        debug!(chapter = index, path = %path, chars = text.len(), "Parsed chapter");
        chapters.push(EpubChapter { path, text });
    }

    if chapters.is_empty() {
        return Err(Error::Parse("EPUB 中没有可阅读的章节".to_string()));
    }

    info!(
        title = title.as_deref().unwrap_or("<untitled>"),
        chapters = chapters.len(),
        toc_entries = toc.len(),
        "EPUB 解析完成"
    );

    Ok(EpubBook {
        title,
        chapters,
        toc,
    })
}

/// 读取 EPUB 封面原始数据和 MIME 类型
pub fn extract_cover(bytes: &[u8]) -> Option<(Vec<u8>, String)> {
    let mut doc = EpubDoc::from_reader(Cursor::new(bytes)).ok()?;
    match doc.get_cover() {
        Some((bytes, mime)) if !bytes.is_empty() => Some((bytes, mime)),
        _ => None,
    }
}
