//! 用户设置
//!
//! 设置以单个 JSON 文件保存在数据目录中，启动时读取一次，每次修改后整体覆盖写回。
//! 文件缺失、损坏或个别字段无效时退回默认值，读取永不失败。

use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const DEFAULT_FONT_SIZE: u32 = 16;
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Theme::Light => write!(f, "light"),
            Theme::Dark => write!(f, "dark"),
        }
    }
}

/// 远程补全接口配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub key: String,
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            key: String::new(),
            model: default_model(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, deserialize_with = "lenient_theme")]
    pub theme: Theme,
    #[serde(
        rename = "fontSize",
        default = "default_font_size",
        deserialize_with = "lenient_font_size"
    )]
    pub font_size: u32,
    #[serde(default)]
    pub openai: AiConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            font_size: DEFAULT_FONT_SIZE,
            openai: AiConfig::default(),
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_font_size() -> u32 {
    DEFAULT_FONT_SIZE
}

fn lenient_theme<'de, D>(deserializer: D) -> Result<Theme, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_str().and_then(Theme::parse).unwrap_or_default())
}

/// 字号可能以数字或字符串形式保存
fn lenient_font_size<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let parsed = match &value {
        serde_json::Value::Number(n) => n.as_u64().map(|n| n as u32),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    Ok(parsed.filter(|&n| n > 0).unwrap_or(DEFAULT_FONT_SIZE))
}

/// 设置的本地存储
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 数据目录下的默认设置文件
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(SETTINGS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Settings {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) => {
                debug!(path = %self.path.display(), "No saved settings ({err}); using defaults");
                return Settings::default();
            }
        };
        match serde_json::from_str(&data) {
            Ok(settings) => {
                info!(path = %self.path.display(), "Loaded settings");
                settings
            }
            Err(err) => {
                warn!(path = %self.path.display(), "Invalid settings blob, using defaults: {err}");
                Settings::default()
            }
        }
    }

    /// 覆盖写入设置；失败只记录日志
    pub fn save(&self, settings: &Settings) {
        let data = match serde_json::to_string_pretty(settings) {
            Ok(data) => data,
            Err(err) => {
                warn!("Failed to serialize settings: {err}");
                return;
            }
        };
        if let Some(parent) = self.path.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                warn!(path = %parent.display(), "Failed to create settings directory: {err}");
                return;
            }
        }
        match fs::write(&self.path, data) {
            Ok(()) => debug!(path = %self.path.display(), "Saved settings"),
            Err(err) => warn!(path = %self.path.display(), "Failed to save settings: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_when_missing() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::in_dir(dir.path());
        let settings = store.load();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.theme, Theme::Light);
        assert_eq!(settings.font_size, 16);
        assert!(settings.openai.key.is_empty());
        assert_eq!(settings.openai.model, "gpt-3.5-turbo");
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::in_dir(dir.path());
        let settings = Settings {
            theme: Theme::Dark,
            font_size: 20,
            openai: AiConfig {
                url: "https://example.invalid/v1".into(),
                key: "sk-test".into(),
                model: "gpt-4o-mini".into(),
            },
        };
        store.save(&settings);
        assert_eq!(store.load(), settings);
    }

    #[test]
    fn test_blob_shape() {
        let json = serde_json::to_value(Settings::default()).unwrap();
        assert_eq!(json["theme"], "light");
        assert_eq!(json["fontSize"], 16);
        assert_eq!(json["openai"]["model"], "gpt-3.5-turbo");
    }

    #[test]
    fn test_unparsable_blob_falls_back() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::in_dir(dir.path());
        fs::write(store.path(), "{not json").unwrap();
        assert_eq!(store.load(), Settings::default());
    }

    #[test]
    fn test_lenient_fields() {
        let settings: Settings =
            serde_json::from_str(r#"{"theme":"purple","fontSize":"18","openai":{"key":"k"}}"#)
                .unwrap();
        assert_eq!(settings.theme, Theme::Light);
        assert_eq!(settings.font_size, 18);
        assert_eq!(settings.openai.key, "k");
        assert_eq!(settings.openai.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_save_overwrites_previous_blob() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::in_dir(dir.path());
        let mut settings = Settings::default();
        settings.openai.key = "first".into();
        store.save(&settings);
        settings.openai.key = String::new();
        store.save(&settings);
        assert!(store.load().openai.key.is_empty());
    }
}
