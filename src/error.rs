//! 统一错误类型

use thiserror::Error;

/// 阅读器所有操作共用的错误类型
#[derive(Debug, Error)]
pub enum Error {
    /// 数据库无法打开，整个会话不可用（导入被禁用）
    #[error("存储不可用: {0}")]
    StorageUnavailable(String),

    /// 在 `initialize()` 完成之前调用了存储操作
    #[error("数据库尚未初始化")]
    NotInitialized,

    #[error("读取书库失败: {0}")]
    Read(String),

    #[error("写入书库失败: {0}")]
    Write(String),

    /// EPUB 内容无法解析
    #[error("无法加载 EPUB 文件: {0}")]
    Parse(String),

    /// 前置条件不满足，未产生任何状态变化
    #[error("{0}")]
    Precondition(String),

    #[error("网络请求失败: {0}")]
    Network(String),

    /// 远程接口返回的错误，优先使用服务端提供的信息
    #[error("API 请求失败: {0}")]
    RemoteApi(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn precondition(message: impl Into<String>) -> Self {
        Error::Precondition(message.into())
    }

    /// 是否属于用户可见、但不影响后续操作的错误
    pub fn is_precondition(&self) -> bool {
        matches!(self, Error::Precondition(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Error::Network(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
