//! 壳层调用的命令处理函数
//!
//! 每个函数对应一次用户操作，错误原样返回给壳层显示。

pub mod ai;
pub mod bookmark;
pub mod import;
pub mod library;
pub mod settings;

pub use ai::*;
pub use bookmark::*;
pub use import::*;
pub use library::*;
pub use settings::*;

use crate::ai::AiClient;
use crate::session::ReadingSession;
use crate::settings::{Settings, SettingsStore};
use crate::store::BookStore;
use crate::ui::cover::CoverCache;

/// 应用运行期状态
pub struct AppState {
    pub store: BookStore,
    pub settings: Settings,
    pub session: ReadingSession,
    pub covers: CoverCache,
    pub ai: AiClient,
}

impl AppState {
    pub fn new(store: BookStore, settings_store: SettingsStore) -> Self {
        let settings = settings_store.load();
        let session = ReadingSession::new(store.clone(), settings_store, &settings);
        Self {
            store,
            settings,
            session,
            covers: CoverCache::new(),
            ai: AiClient::new(),
        }
    }

    /// 存储打开失败时导入被禁用
    pub fn storage_ready(&self) -> bool {
        self.store.is_initialized()
    }
}
