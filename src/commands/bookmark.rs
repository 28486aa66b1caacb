use crate::commands::AppState;
use crate::error::{Error, Result};
use crate::models::Bookmark;
use crate::ui::{self, BookmarkAction, BookmarkView};

pub async fn add_bookmark(state: &mut AppState) -> Result<Bookmark> {
    state.session.add_bookmark().await
}

fn bookmark_view(state: &AppState) -> Result<BookmarkView> {
    let book = state
        .session
        .current_book()
        .ok_or_else(|| Error::precondition("请先打开一本书。"))?;
    ui::render_bookmarks(&book.bookmarks).ok_or_else(|| Error::precondition("没有书签。"))
}

fn missing_bookmark(index: usize) -> Error {
    Error::precondition(format!("书签 {} 不存在。", index + 1))
}

/// 执行书签列表上的操作；删除时返回被删除的书签
pub async fn apply_bookmark_action(
    state: &mut AppState,
    action: BookmarkAction,
) -> Result<Option<Bookmark>> {
    match action {
        BookmarkAction::Navigate(location) => {
            if state.session.goto(&location) {
                Ok(None)
            } else {
                Err(Error::precondition(format!("无法跳转到 {}", location)))
            }
        }
        BookmarkAction::Delete(index) => state.session.delete_bookmark(index).await.map(Some),
    }
}

/// 跳转到第 `index` 个书签
pub async fn goto_bookmark(state: &mut AppState, index: usize) -> Result<()> {
    let action = bookmark_view(state)?
        .navigate(index)
        .ok_or_else(|| missing_bookmark(index))?;
    apply_bookmark_action(state, action).await.map(|_| ())
}

pub async fn delete_bookmark(state: &mut AppState, index: usize) -> Result<Bookmark> {
    let action = bookmark_view(state)?
        .delete(index)
        .ok_or_else(|| missing_bookmark(index))?;
    apply_bookmark_action(state, action)
        .await?
        .ok_or_else(|| missing_bookmark(index))
}

/// 跳转到目录中的第 `index` 项
pub fn goto_toc_entry(state: &mut AppState, index: usize) -> Result<()> {
    let toc = crate::ui::render_toc(state.session.toc());
    let location = toc
        .target(index)
        .cloned()
        .ok_or_else(|| Error::precondition(format!("目录项 {} 不存在。", index + 1)))?;
    if state.session.goto(&location) {
        Ok(())
    } else {
        Err(Error::precondition(format!("无法跳转到 {}", location)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support;
    use crate::formats::epub::{EpubBook, EpubChapter, EpubSurface};
    use crate::models::{BookRecord, Location};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_goto_missing_bookmark() {
        let (_dir, mut state) = test_support::state().await;
        state
            .session
            .open_book(BookRecord::text("a.txt", "aaa"))
            .await
            .unwrap();
        assert!(goto_bookmark(&mut state, 0).await.unwrap_err().is_precondition());
        assert!(delete_bookmark(&mut state, 0).await.unwrap_err().is_precondition());
        assert!(goto_toc_entry(&mut state, 0).unwrap_err().is_precondition());
        assert!(add_bookmark(&mut state).await.unwrap_err().is_precondition());
    }

    #[tokio::test]
    async fn test_bookmark_actions_navigate_and_delete() {
        let (_dir, mut state) = test_support::state().await;
        let mut record = BookRecord::epub("sample.epub", vec![0u8; 4]);
        record.bookmarks = vec![
            Bookmark {
                label: "Two".into(),
                location: Location::Token("OEBPS/c2.xhtml@0".into()),
            },
            Bookmark {
                label: "One".into(),
                location: Location::Token("OEBPS/c1.xhtml@0".into()),
            },
        ];
        let id = state.store.create(&record).await.unwrap();
        let record = state.store.get(id).await.unwrap().unwrap();
        let book = Arc::new(EpubBook {
            title: None,
            chapters: vec![
                EpubChapter {
                    path: "OEBPS/c1.xhtml".into(),
                    text: "first".into(),
                },
                EpubChapter {
                    path: "OEBPS/c2.xhtml".into(),
                    text: "second".into(),
                },
            ],
            toc: vec![],
        });
        let style = state.session.style();
        state
            .session
            .activate(record, Box::new(EpubSurface::new(book, style)));

        goto_bookmark(&mut state, 0).await.unwrap();
        assert_eq!(state.session.current_page().unwrap().text, "second");

        let removed = delete_bookmark(&mut state, 1).await.unwrap();
        assert_eq!(removed.label, "One");
        assert!(delete_bookmark(&mut state, 1).await.unwrap_err().is_precondition());

        let stored = state.store.get(id).await.unwrap().unwrap();
        assert_eq!(stored.bookmarks.len(), 1);
        assert_eq!(stored.bookmarks[0].label, "Two");
    }
}
