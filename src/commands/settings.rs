use tracing::debug;

use crate::commands::AppState;
use crate::error::{Error, Result};
use crate::settings::{Settings, Theme};

/// 修改设置后立即应用并保存
pub fn update_settings(state: &mut AppState, change: impl FnOnce(&mut Settings)) -> &Settings {
    change(&mut state.settings);
    debug!(
        theme = %state.settings.theme,
        font_size = state.settings.font_size,
        "Applying settings"
    );
    state.session.apply_settings(&state.settings);
    &state.settings
}

pub fn set_theme(state: &mut AppState, value: &str) -> Result<Theme> {
    let theme = Theme::parse(value)
        .ok_or_else(|| {
            Error::precondition(format!("未知主题: {}（可选 light / dark）", value))
        })?;
    update_settings(state, |s| s.theme = theme);
    Ok(theme)
}

pub fn set_font_size(state: &mut AppState, value: &str) -> Result<u32> {
    let size = value
        .trim()
        .trim_end_matches("px")
        .parse::<u32>()
        .ok()
        .filter(|&n| n > 0)
        .ok_or_else(|| Error::precondition(format!("无效的字号: {}", value)))?;
    update_settings(state, |s| s.font_size = size);
    Ok(size)
}

/// 设置 AI 接口配置项：url / key / model
pub fn set_ai_config(state: &mut AppState, field: &str, value: &str) -> Result<()> {
    let value = value.trim().to_string();
    match field {
        "url" => update_settings(state, |s| s.openai.url = value),
        "key" => update_settings(state, |s| s.openai.key = value),
        "model" => update_settings(state, |s| s.openai.model = value),
        other => return Err(Error::precondition(format!("未知配置项: {}", other))),
    };
    Ok(())
}
