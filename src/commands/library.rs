use std::collections::HashMap;

use tracing::info;

use crate::commands::AppState;
use crate::error::{Error, Result};
use crate::formats::PageView;
use crate::models::BookRecord;
use crate::ui::cover::Cover;

/// 书库视图所需的数据：全部书籍及其封面
pub async fn load_library(state: &mut AppState) -> Result<(Vec<BookRecord>, HashMap<i64, Cover>)> {
    let books = state.store.list_all().await?;
    state.covers.mount();
    let covers = state.covers.covers_for(&books).await;
    Ok((books, covers))
}

/// 打开书籍，离开书库视图
pub async fn open_book(state: &mut AppState, id: i64) -> Result<PageView> {
    let record = state
        .store
        .get(id)
        .await?
        .ok_or_else(|| Error::precondition(format!("书籍 {} 不存在。", id)))?;
    state.covers.unmount();
    state.session.open_book(record).await
}

/// 删除书籍；正在阅读的书会先关闭
pub async fn delete_book(state: &mut AppState, id: i64) -> Result<()> {
    if state.session.current_book().and_then(|b| b.id) == Some(id) {
        state.session.close();
    }
    state.session.settle().await;
    state.store.delete(id).await?;
    info!(id, "Book deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support;
    use crate::session::SessionState;

    #[tokio::test]
    async fn test_open_missing_book_is_precondition() {
        let (_dir, mut state) = test_support::state().await;
        assert!(open_book(&mut state, 42).await.unwrap_err().is_precondition());
        assert_eq!(state.session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_library_then_open_unmounts_covers() {
        let (_dir, mut state) = test_support::state().await;
        let id = state.store.create(&BookRecord::text("a.txt", "aaa")).await.unwrap();

        let (books, covers) = load_library(&mut state).await.unwrap();
        assert_eq!(books.len(), 1);
        assert!(covers[&id].is_placeholder());
        assert!(state.covers.is_mounted());

        let page = open_book(&mut state, id).await.unwrap();
        assert_eq!(page.text, "aaa");
        assert!(!state.covers.is_mounted());
    }

    #[tokio::test]
    async fn test_delete_open_book_closes_session() {
        let (_dir, mut state) = test_support::state().await;
        let keep = state.store.create(&BookRecord::text("keep.txt", "k")).await.unwrap();
        let gone = state.store.create(&BookRecord::text("gone.txt", "g")).await.unwrap();
        open_book(&mut state, gone).await.unwrap();

        delete_book(&mut state, gone).await.unwrap();
        assert_eq!(state.session.state(), SessionState::Idle);
        let ids: Vec<_> = state
            .store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .filter_map(|b| b.id)
            .collect();
        assert_eq!(ids, vec![keep]);
    }
}
