use crate::error::{ApiError, ApiResult};
use crate::handlers::AppState;
use crate::models::{Diagnostic, TelegramUpdate, AVAILABLE_MODELS};
use axum::{extract::State, response::Json};
use serde_json::{json, Value};
use tracing::{info, warn};

// 上游故障时给用户的统一说法，不暴露内部细节
const SERVICE_DOWN_REPLY: &str = "The service is temporarily unavailable. Please try again later.";

/// Telegram webhook分发器
///
/// 无论处理结果如何都应答ok，避免Telegram反复重投。
pub async fn webhook(
    State(state): State<AppState>,
    Json(update): Json<TelegramUpdate>,
) -> Json<Value> {
    let Some(message) = update.into_message() else {
        return Json(json!({ "ok": true, "ignored": true }));
    };

    let chat_id = message.chat.id;
    let Some(user_id) = message.from.as_ref().map(|user| user.id) else {
        return Json(json!({ "ok": true }));
    };

    let text = message.text.unwrap_or_default().trim().to_string();
    if text.is_empty() {
        return Json(json!({ "ok": true }));
    }

    info!("Telegram message from user {} in chat {}", user_id, chat_id);
    dispatch(&state, chat_id, user_id, &text).await;

    Json(json!({ "ok": true }))
}

/// 注册webhook地址
pub async fn set_webhook(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let result = state.telegram.set_webhook().await?;
    Ok(Json(result))
}

async fn dispatch(state: &AppState, chat_id: i64, user_id: i64, text: &str) {
    if text.starts_with("/start") {
        deliver(
            state,
            chat_id,
            "Hi! I answer questions using several DeepSeek models.\n\n\
             Just send a question and I'll reply.\n\
             Commands:\n\
             /models\n\
             /set_model DeepSeek-V3\n\
             /current_model\n\
             /reset_model\n\
             /help",
        )
        .await;
        return;
    }

    if text.starts_with("/help") {
        deliver(
            state,
            chat_id,
            "Usage:\n\
             - Send any message to get an answer.\n\n\
             Commands:\n\
             /models - list available models\n\
             /set_model <MODEL> - pick a model\n\
             /current_model - show the current model\n\
             /reset_model - back to the default\n\n\
             Examples:\n\
             /set_model DeepSeek-V3\n\
             /translate en fr hello",
        )
        .await;
        return;
    }

    if text.starts_with("/models") {
        let listing = format!("Available models:\n{}", AVAILABLE_MODELS.join("\n"));
        deliver(state, chat_id, &listing).await;
        return;
    }

    if text.starts_with("/current_model") {
        let reply = format!("Current model: {}", state.model_prefs.current(user_id));
        deliver(state, chat_id, &reply).await;
        return;
    }

    if text.starts_with("/reset_model") {
        state.model_prefs.reset(user_id);
        let reply = format!(
            "Back to the default model: {}",
            state.model_prefs.default_model()
        );
        deliver(state, chat_id, &reply).await;
        return;
    }

    if text.starts_with("/set_model") {
        let mut parts = text.splitn(2, char::is_whitespace);
        parts.next();
        let chosen = parts.next().map(str::trim).unwrap_or_default();
        if chosen.is_empty() {
            deliver(
                state,
                chat_id,
                "Send the model name after the command.\nExample: /set_model DeepSeek-V3",
            )
            .await;
            return;
        }
        let reply = if state.model_prefs.select(user_id, chosen) {
            format!("Model selected: {}", chosen)
        } else {
            "Unknown model. Use /models to see the list.".to_string()
        };
        deliver(state, chat_id, &reply).await;
        return;
    }

    if text.starts_with("/translate") {
        // /translate <src> <dst> <text>
        let mut parts = text.splitn(4, char::is_whitespace);
        parts.next();
        let src = parts.next().map(str::trim).unwrap_or_default();
        let dst = parts.next().map(str::trim).unwrap_or_default();
        let content = parts.next().map(str::trim).unwrap_or_default();
        if src.is_empty() || dst.is_empty() || content.is_empty() {
            deliver(state, chat_id, "Example: /translate en fr hello").await;
            return;
        }
        let prompt = format!(
            "Translate from {} to {}. Return only the translation.\n\nText:\n{}",
            src, dst, content
        );
        answer_with_model(state, chat_id, user_id, &prompt).await;
        return;
    }

    if text.starts_with("/summarize") {
        let mut parts = text.splitn(2, char::is_whitespace);
        parts.next();
        let content = parts.next().map(str::trim).unwrap_or_default();
        if content.is_empty() {
            deliver(state, chat_id, "Send the text after the command.").await;
            return;
        }
        let prompt = format!("Summarize the following text in 5 bullet points:\n\n{}", content);
        answer_with_model(state, chat_id, user_id, &prompt).await;
        return;
    }

    if text.starts_with("/improve") {
        let mut parts = text.splitn(2, char::is_whitespace);
        parts.next();
        let content = parts.next().map(str::trim).unwrap_or_default();
        if content.is_empty() {
            deliver(state, chat_id, "Send the text after the command.").await;
            return;
        }
        let prompt = format!(
            "Improve the following text (clear, correct, professional) and return only the improved version:\n\n{}",
            content
        );
        answer_with_model(state, chat_id, user_id, &prompt).await;
        return;
    }

    // 普通消息：用用户选择的模型作答
    answer_with_model(state, chat_id, user_id, text).await;
}

async fn answer_with_model(state: &AppState, chat_id: i64, user_id: i64, question: &str) {
    let model = state.model_prefs.current(user_id);

    let reply = match state.upstream.chat(question, Some(&model)).await {
        Ok(result) => {
            if result.answer.is_empty() {
                match result.diagnostic {
                    Some(diagnostic) => diagnostic_reply(&diagnostic),
                    None => SERVICE_DOWN_REPLY.to_string(),
                }
            } else {
                result.answer
            }
        }
        Err(ApiError::EmptyQuestion) => "Send a question and I'll answer it.".to_string(),
        Err(e) => {
            warn!("Upstream chat failed for chat {}: {}", chat_id, e);
            SERVICE_DOWN_REPLY.to_string()
        }
    };

    deliver(state, chat_id, &reply).await;
}

/// 空答案时用诊断信息组一条可读回复
fn diagnostic_reply(diagnostic: &Diagnostic) -> String {
    let mut reply = format!("I couldn't get an answer this time ({}).", diagnostic.note);
    if !diagnostic.available_models.is_empty() {
        reply.push_str("\n\nModels the upstream currently offers:\n");
        reply.push_str(&diagnostic.available_models.join("\n"));
    }
    reply
}

async fn deliver(state: &AppState, chat_id: i64, text: &str) {
    if let Err(e) = state.telegram.send_message(chat_id, text).await {
        warn!("Failed to deliver Telegram reply to chat {}: {}", chat_id, e);
    }
}
