//! 宿主壳层
//!
//! 渲染层通过单向消息请求宿主显示右键菜单，宿主把菜单选择结果再以消息形式发回。
//! 消息没有回执。

pub mod repl;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellMessage {
    /// 请求显示选中文本的右键菜单
    ShowSelectionMenu(String),
    /// 菜单选择了"用 AI 总结"
    SummarizeWithAi(String),
    /// 请求显示书籍的右键菜单
    ShowBookMenu(i64),
    /// 菜单选择了"删除书籍"
    DeleteBook(i64),
}

/// 宿主与渲染层之间的消息通道
pub struct ShellBridge {
    tx: UnboundedSender<ShellMessage>,
    rx: UnboundedReceiver<ShellMessage>,
}

impl ShellBridge {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    pub fn sender(&self) -> UnboundedSender<ShellMessage> {
        self.tx.clone()
    }

    pub fn send(&self, message: ShellMessage) {
        debug!(?message, "Shell message");
        // 接收端与发送端同生命周期，不会关闭
        let _ = self.tx.send(message);
    }

    /// 取出当前已到达的全部消息
    pub fn drain(&mut self) -> Vec<ShellMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            messages.push(message);
        }
        messages
    }
}

impl Default for ShellBridge {
    fn default() -> Self {
        Self::new()
    }
}

/// 宿主显示的右键菜单
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextMenu {
    Selection(String),
    Book(i64),
}

impl ContextMenu {
    pub fn items(&self) -> &'static [&'static str] {
        match self {
            ContextMenu::Selection(_) => &["用 AI 总结"],
            ContextMenu::Book(_) => &["删除书籍"],
        }
    }

    /// 选择菜单项，返回要发回渲染层的消息
    pub fn choose(&self, index: usize) -> Option<ShellMessage> {
        match (self, index) {
            (ContextMenu::Selection(text), 0) => Some(ShellMessage::SummarizeWithAi(text.clone())),
            (ContextMenu::Book(id), 0) => Some(ShellMessage::DeleteBook(*id)),
            _ => None,
        }
    }
}

impl std::fmt::Display for ContextMenu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (n, item) in self.items().iter().enumerate() {
            writeln!(f, "  {}. {}", n + 1, item)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_book_menu_round_trip() {
        let mut bridge = ShellBridge::new();
        bridge.send(ShellMessage::ShowBookMenu(7));
        let messages = bridge.drain();
        assert_eq!(messages, vec![ShellMessage::ShowBookMenu(7)]);

        let menu = ContextMenu::Book(7);
        bridge.send(menu.choose(0).unwrap());
        assert_eq!(bridge.drain(), vec![ShellMessage::DeleteBook(7)]);
        assert!(bridge.drain().is_empty());
    }

    #[test]
    fn test_selection_menu() {
        let menu = ContextMenu::Selection("沙丘".into());
        assert_eq!(menu.choose(0), Some(ShellMessage::SummarizeWithAi("沙丘".into())));
        assert_eq!(menu.choose(1), None);
        assert!(menu.to_string().contains("1. 用 AI 总结"));
    }

    #[test]
    fn test_sender_clones_share_channel() {
        let mut bridge = ShellBridge::new();
        let tx = bridge.sender();
        tx.send(ShellMessage::ShowSelectionMenu("a".into())).unwrap();
        bridge.send(ShellMessage::ShowBookMenu(1));
        assert_eq!(bridge.drain().len(), 2);
    }
}
