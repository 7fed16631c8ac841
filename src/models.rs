use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 上游支持的模型列表
pub const AVAILABLE_MODELS: &[&str] = &[
    "DeepSeek-V1",
    "DeepSeek-V2",
    "DeepSeek-V2.5",
    "DeepSeek-V3",
    "DeepSeek-V3-0324",
    "DeepSeek-V3.1",
    "DeepSeek-V3.2",
    "DeepSeek-R1",
    "DeepSeek-R1-0528",
    "DeepSeek-R1-Distill",
    "DeepSeek-Prover-V1",
    "DeepSeek-Prover-V1.5",
    "DeepSeek-Prover-V2",
    "DeepSeek-VL",
    "DeepSeek-Coder",
    "DeepSeek-Coder-V2",
    "DeepSeek-Coder-6.7B-base",
    "DeepSeek-Coder-6.7B-instruct",
];

pub fn is_known_model(model: &str) -> bool {
    AVAILABLE_MODELS.contains(&model)
}

/// 聊天请求
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    pub model: Option<String>,
}

/// 聊天响应
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub model: String,
    pub question: String,
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<Diagnostic>,
}

/// 提取失败时的诊断信息
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub note: String,
    pub available_models: Vec<String>,
    pub form_field_names: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_action: Option<String>,
}

// Telegram webhook更新结构，只保留用到的字段
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUpdate {
    pub message: Option<TelegramMessage>,
    pub edited_message: Option<TelegramMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramMessage {
    pub chat: TelegramChat,
    pub from: Option<TelegramUser>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
}

impl TelegramUpdate {
    /// 普通消息和编辑消息同样处理
    pub fn into_message(self) -> Option<TelegramMessage> {
        self.message.or(self.edited_message)
    }
}
