//! 远程 AI 问答
//!
//! 兼容 OpenAI 的 chat completions 接口。每次提问只发一个请求，不重试也不缓存。

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::settings::{AiConfig, DEFAULT_MODEL};

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1";

const SYSTEM_INSTRUCTION: &str =
    "你是一个博学的阅读助手。请根据用户提供的书籍内容和问题，给出简洁、有帮助的回答。";

/// 选中文本时"用 AI 总结"使用的问题
pub const SUMMARIZE_QUESTION: &str = "请用简洁的语言总结以下内容的要点。";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// 提问时附带的阅读上下文
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingContext {
    pub book_name: Option<String>,
    pub chapter: Option<String>,
    pub excerpt: Option<String>,
}

impl ReadingContext {
    /// 拼成系统提示里的上下文段落
    pub fn describe(&self) -> String {
        let Some(name) = &self.book_name else {
            return "我正在使用一个电子书阅读器。".to_string();
        };
        let mut context = format!("我正在阅读书籍《{}》。", name);
        match (&self.chapter, &self.excerpt) {
            (Some(chapter), Some(excerpt)) => {
                context.push_str(&format!(
                    "当前章节是 \"{}\"。以下是章节的部分内容：\n\n{}...",
                    chapter.trim(),
                    excerpt
                ));
            }
            (None, Some(excerpt)) => {
                context.push_str(&format!("以下是当前页面的内容：\n\n{}", excerpt));
            }
            _ => context.push_str("但我无法获取当前页面的具体内容。"),
        }
        context
    }
}

fn base_url(config: &AiConfig) -> &str {
    let url = config.url.trim();
    if url.is_empty() {
        DEFAULT_API_URL
    } else {
        url.trim_end_matches('/')
    }
}

fn model(config: &AiConfig) -> &str {
    let model = config.model.trim();
    if model.is_empty() {
        DEFAULT_MODEL
    } else {
        model
    }
}

fn require_key(config: &AiConfig) -> Result<&str> {
    let key = config.key.trim();
    if key.is_empty() {
        return Err(Error::precondition("请在设置中配置 OpenAI API 密钥。"));
    }
    Ok(key)
}

/// 从失败响应中取出服务端给出的错误信息，没有时使用状态码描述
async fn remote_error(response: reqwest::Response) -> Error {
    let status = response.status();
    let body = response.json::<Value>().await.ok();
    let message = body
        .as_ref()
        .and_then(|v| v.pointer("/error/message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| status_text(status));
    warn!(%status, "AI request rejected: {message}");
    Error::RemoteApi(message)
}

fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_str().to_string())
}

#[derive(Debug, Clone, Default)]
pub struct AiClient {
    http: Client,
}

impl AiClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }

    /// 提问并返回回答文本
    pub async fn ask(
        &self,
        config: &AiConfig,
        question: &str,
        context: &ReadingContext,
    ) -> Result<String> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::precondition("请输入问题。"));
        }
        let key = require_key(config)?;

        let system = format!("{}{}", SYSTEM_INSTRUCTION, context.describe());
        let body = ChatRequest {
            model: model(config),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &system,
                },
                ChatMessage {
                    role: "user",
                    content: question,
                },
            ],
        };
        let url = format!("{}/chat/completions", base_url(config));
        info!(%url, model = body.model, "Sending AI question");

        let response = self.http.post(&url).bearer_auth(key).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(remote_error(response).await);
        }

        let data: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::RemoteApi(format!("无法解析响应: {}", e)))?;
        let answer = data
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::RemoteApi("未能从 API 获取有效回答。".to_string()))?;
        debug!(chars = answer.chars().count(), "AI answer received");
        Ok(answer)
    }

    /// 对选中的文本做总结
    pub async fn summarize(
        &self,
        config: &AiConfig,
        selection: &str,
        context: &ReadingContext,
    ) -> Result<String> {
        let selection = selection.trim();
        if selection.is_empty() {
            return Err(Error::precondition("请先选择要总结的文本。"));
        }
        let question = format!("{}\n\n{}", SUMMARIZE_QUESTION, selection);
        self.ask(config, &question, context).await
    }

    /// 测试接口连通性：列出模型，返回模型数量
    pub async fn test_connection(&self, config: &AiConfig) -> Result<usize> {
        let key = require_key(config)?;
        let url = format!("{}/models", base_url(config));
        debug!(%url, "Testing AI connection");

        let response = self.http.get(&url).bearer_auth(key).send().await?;
        if !response.status().is_success() {
            return Err(remote_error(response).await);
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::RemoteApi(format!("无法解析响应: {}", e)))?;
        match body.get("data").and_then(Value::as_array) {
            Some(models) => Ok(models.len()),
            None => Err(Error::RemoteApi("响应中缺少模型列表".to_string())),
        }
    }
}
