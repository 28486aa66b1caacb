use crate::ai::ReadingContext;
use crate::commands::AppState;
use crate::error::Result;

/// 当前阅读状态组成的提问上下文
pub fn reading_context(state: &AppState) -> ReadingContext {
    match state.session.current_book() {
        Some(book) => ReadingContext {
            book_name: Some(book.name.clone()),
            chapter: state.session.chapter_label(),
            excerpt: state.session.context_excerpt(),
        },
        None => ReadingContext::default(),
    }
}

pub async fn ask_question(state: &AppState, question: &str) -> Result<String> {
    let context = reading_context(state);
    state.ai.ask(&state.settings.openai, question, &context).await
}

/// 选中文本的右键菜单"用 AI 总结"
pub async fn summarize_selection(state: &AppState, selection: &str) -> Result<String> {
    let context = reading_context(state);
    state.ai.summarize(&state.settings.openai, selection, &context).await
}

pub async fn test_ai_connection(state: &AppState) -> Result<usize> {
    state.ai.test_connection(&state.settings.openai).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookRecord;
    use crate::commands::test_support;

    #[tokio::test]
    async fn test_context_for_text_book() {
        let (_dir, mut state) = test_support::state().await;
        assert_eq!(reading_context(&state), ReadingContext::default());

        state
            .session
            .open_book(BookRecord::text("novel.txt", "第一页内容"))
            .await
            .unwrap();
        let context = reading_context(&state);
        assert_eq!(context.book_name.as_deref(), Some("novel.txt"));
        assert_eq!(context.chapter, None);
        assert_eq!(context.excerpt.as_deref(), Some("第一页内容"));
    }

    #[tokio::test]
    async fn test_ask_without_key_is_precondition() {
        let (_dir, state) = test_support::state().await;
        assert!(ask_question(&state, "问题").await.unwrap_err().is_precondition());
        let err = summarize_selection(&state, "选中的文字").await.unwrap_err();
        assert!(err.is_precondition());
    }
}
