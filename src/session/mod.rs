//! 阅读会话
//!
//! 会话持有当前书籍的内存副本和唯一的渲染面，状态为 `Idle` → `Loading` → `Active`。
//! 打开新书前总是先拆除旧的渲染面。
//!
//! 翻页后的位置写入是"发出即不管"的：后续操作不等待写入完成，但每次写入都排在上一次之后，
//! 落盘顺序与发起顺序一致。写入失败只记录日志，不打断阅读。

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::formats::common::decode_text;
use crate::formats::epub::{parse_epub, EpubSurface};
use crate::formats::txt::TextPaginator;
use crate::formats::{BookFormat, DisplayStyle, PageView, ReadingSurface, TocItem};
use crate::models::{BookContent, BookRecord, Bookmark, Location};
use crate::settings::{Settings, SettingsStore};
use crate::store::BookStore;
use crate::ui::{self, Sidebar};

/// AI 提问时附带的上下文最大字符数
pub const MAX_EXCERPT_CHARS: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loading,
    Active,
}

struct ActiveBook {
    record: BookRecord,
    surface: Box<dyn ReadingSurface>,
}

pub struct ReadingSession {
    store: BookStore,
    settings_store: SettingsStore,
    style: DisplayStyle,
    state: SessionState,
    active: Option<ActiveBook>,
    /// 最近一次后台写入，新的写入会先等它结束
    last_write: Option<JoinHandle<()>>,
}

impl ReadingSession {
    pub fn new(store: BookStore, settings_store: SettingsStore, settings: &Settings) -> Self {
        Self {
            store,
            settings_store,
            style: DisplayStyle {
                theme: settings.theme,
                font_size: settings.font_size,
            },
            state: SessionState::Idle,
            active: None,
            last_write: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn style(&self) -> DisplayStyle {
        self.style
    }

    pub fn current_book(&self) -> Option<&BookRecord> {
        self.active.as_ref().map(|a| &a.record)
    }

    pub fn current_page(&self) -> Option<PageView> {
        self.active.as_ref().map(|a| a.surface.display_current())
    }

    pub fn toc(&self) -> &[TocItem] {
        self.active.as_ref().map(|a| a.surface.toc()).unwrap_or(&[])
    }

    /// 目录与书签面板，只有 EPUB 才显示；目录为空时隐藏目录面板
    pub fn sidebar(&self) -> Sidebar {
        let Some(active) = &self.active else {
            return Sidebar::default();
        };
        let mut sidebar = Sidebar {
            toc: Some(ui::render_toc(active.surface.toc())),
            bookmarks: ui::render_bookmarks(&active.record.bookmarks),
        };
        if active.surface.format() != BookFormat::Epub {
            sidebar.hide_toc();
            sidebar.hide_bookmarks();
        } else if active.surface.toc().is_empty() {
            sidebar.hide_toc();
        }
        sidebar
    }

    /// 打开书籍，按类型选择渲染面
    pub async fn open_book(&mut self, record: BookRecord) -> Result<PageView> {
        self.close();
        self.state = SessionState::Loading;
        info!(
            id = ?record.id,
            name = %record.name,
            format = record.book_type.as_str(),
            "Opening book"
        );

        let surface: Box<dyn ReadingSurface> = match record.book_type {
            BookFormat::Epub => {
                let bytes = record.content.shared_bytes();
                let parsed = tokio::task::spawn_blocking(move || parse_epub(&bytes))
                    .await
                    .map_err(|e| Error::Parse(format!("EPUB 解析任务失败: {}", e)))
                    .and_then(|r| r);
                match parsed {
                    Ok(book) => Box::new(EpubSurface::new(Arc::new(book), self.style)),
                    Err(err) => {
                        warn!(name = %record.name, "Error loading EPUB: {err}");
                        self.state = SessionState::Idle;
                        return Err(err);
                    }
                }
            }
            BookFormat::Txt => {
                let text: Arc<str> = match &record.content {
                    BookContent::Text(text) => Arc::clone(text),
                    BookContent::Binary(bytes) => Arc::from(decode_text(bytes)),
                };
                Box::new(TextPaginator::new(text, self.style))
            }
        };

        Ok(self.activate(record, surface))
    }

    /// 挂上渲染面并恢复上次的阅读位置
    pub(crate) fn activate(
        &mut self,
        record: BookRecord,
        mut surface: Box<dyn ReadingSurface>,
    ) -> PageView {
        if let Some(location) = &record.last_location {
            if !surface.display(location) {
                warn!(%location, "Saved location is not resolvable, starting from the beginning");
            }
        }
        let format = record.book_type;
        self.active = Some(ActiveBook { record, surface });
        self.state = SessionState::Active;

        // EPUB 引擎首次显示即产生一次位置变化；TXT 分页只在翻页时写入
        if format == BookFormat::Epub {
            self.location_changed();
        }
        self.current_page().unwrap_or_else(|| PageView {
            text: String::new(),
            heading: None,
            page: 0,
            page_count: 1,
            style: self.style,
        })
    }

    pub fn next(&mut self) -> bool {
        let moved = match self.active.as_mut() {
            Some(active) => active.surface.advance(),
            None => false,
        };
        if moved {
            self.location_changed();
        }
        moved
    }

    pub fn prev(&mut self) -> bool {
        let moved = match self.active.as_mut() {
            Some(active) => active.surface.retreat(),
            None => false,
        };
        if moved {
            self.location_changed();
        }
        moved
    }

    /// 跳转到目录或书签指向的位置
    pub fn goto(&mut self, location: &Location) -> bool {
        let moved = match self.active.as_mut() {
            Some(active) => active.surface.display(location),
            None => false,
        };
        if moved {
            self.location_changed();
        } else {
            debug!(%location, "Navigation target not found");
        }
        moved
    }

    fn location_changed(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        active.record.last_location = active.surface.current_location();
        let snapshot = active.record.clone();
        self.persist_in_background(snapshot);
    }

    fn persist_in_background(&mut self, snapshot: BookRecord) {
        let previous = self.last_write.take();
        let store = self.store.clone();
        self.last_write = Some(tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            if let Err(err) = store.update(&snapshot).await {
                warn!(id = ?snapshot.id, "Failed to persist reading position: {err}");
            }
        }));
    }

    /// 等待所有尚未完成的后台写入
    pub async fn settle(&mut self) {
        if let Some(handle) = self.last_write.take() {
            if let Err(err) = handle.await {
                warn!("Background write task failed: {err}");
            }
        }
    }

    pub async fn add_bookmark(&mut self) -> Result<Bookmark> {
        // 书签写入携带完整记录，必须排在已发起的位置写入之后
        self.settle().await;
        let active = self
            .active
            .as_mut()
            .ok_or_else(|| Error::precondition("请先打开一本书。"))?;
        if active.surface.format() != BookFormat::Epub {
            return Err(Error::precondition("书签功能仅支持 EPUB 格式。"));
        }
        let location = active
            .surface
            .current_location()
            .ok_or_else(|| Error::precondition("无法确定当前阅读位置。"))?;
        let label = active
            .surface
            .chapter_label()
            .unwrap_or_else(|| format!("位置 {}", active.surface.display_current().page + 1));

        let bookmark = Bookmark { label, location };
        active.record.bookmarks.push(bookmark.clone());
        if let Err(err) = self.store.update(&active.record).await {
            active.record.bookmarks.pop();
            return Err(err);
        }
        info!(label = %bookmark.label, "Bookmark added");
        Ok(bookmark)
    }

    pub async fn delete_bookmark(&mut self, index: usize) -> Result<Bookmark> {
        self.settle().await;
        let active = self
            .active
            .as_mut()
            .ok_or_else(|| Error::precondition("请先打开一本书。"))?;
        if index >= active.record.bookmarks.len() {
            return Err(Error::precondition(format!("书签 {} 不存在。", index + 1)));
        }

        let removed = active.record.bookmarks.remove(index);
        if let Err(err) = self.store.update(&active.record).await {
            active.record.bookmarks.insert(index, removed);
            return Err(err);
        }
        info!(label = %removed.label, "Bookmark deleted");
        Ok(removed)
    }

    /// 拆除渲染面，回到空闲状态
    pub fn close(&mut self) {
        if let Some(active) = self.active.take() {
            debug!(id = ?active.record.id, "Closing book");
        }
        self.state = SessionState::Idle;
    }

    /// 应用主题和字号，并保存设置
    pub fn apply_settings(&mut self, settings: &Settings) {
        self.style = DisplayStyle {
            theme: settings.theme,
            font_size: settings.font_size,
        };
        if let Some(active) = self.active.as_mut() {
            active.surface.apply_style(self.style);
            // 重新分页后页首可能移动
            self.location_changed();
        }
        self.settings_store.save(settings);
    }

    /// 当前位置附近的文本，供 AI 提问使用
    pub fn context_excerpt(&self) -> Option<String> {
        self.active
            .as_ref()
            .map(|a| a.surface.context_excerpt(MAX_EXCERPT_CHARS))
    }

    pub fn chapter_label(&self) -> Option<String> {
        self.active.as_ref().and_then(|a| a.surface.chapter_label())
    }
}
