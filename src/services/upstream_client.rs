use crate::config::UpstreamConfig;
use crate::error::{ApiError, ApiResult};
use crate::models::{is_known_model, ChatResponse};
use crate::services::{AnswerExtractor, SessionManager, UpstreamSession};
use std::sync::Arc;
use tracing::{info, warn};

/// 上游请求客户端
///
/// 会话失败后强制重建并重试一次。上游偶发下发过期会话，
/// 重建一次即可恢复；连续两次失败按真实故障处理。
pub struct UpstreamClient {
    config: UpstreamConfig,
    sessions: Arc<SessionManager>,
}

impl UpstreamClient {
    pub fn new(config: UpstreamConfig, sessions: Arc<SessionManager>) -> Self {
        Self { config, sessions }
    }

    /// 对外的聊天入口：校验、提交、提取
    pub async fn chat(&self, question: &str, model: Option<&str>) -> ApiResult<ChatResponse> {
        // 空问题在任何网络请求之前拒绝
        let question = question.trim();
        if question.is_empty() {
            return Err(ApiError::EmptyQuestion);
        }

        let model = self.resolve_model(model);
        info!("Submitting question to upstream (model: {})", model);

        let html = self.submit(question, &model).await?;
        let extraction = AnswerExtractor::extract(&html);
        if extraction.answer.is_empty() {
            warn!("No answer extracted, returning diagnostic payload");
        }

        Ok(ChatResponse {
            model,
            question: question.to_string(),
            answer: extraction.answer,
            diagnostic: extraction.diagnostic,
        })
    }

    /// 未知或缺省的模型名回落到默认模型
    fn resolve_model(&self, model: Option<&str>) -> String {
        match model.map(str::trim).filter(|m| !m.is_empty()) {
            Some(m) if is_known_model(m) => m.to_string(),
            Some(m) => {
                warn!(
                    "Unknown model {:?}, falling back to {}",
                    m, self.config.default_model
                );
                self.config.default_model.clone()
            }
            None => self.config.default_model.clone(),
        }
    }

    /// 提交问题/模型对，返回上游的原始HTML
    ///
    /// 有界重试：最多2次尝试，中间恰好一次会话重建。
    pub async fn submit(&self, question: &str, model: &str) -> ApiResult<String> {
        const MAX_ATTEMPTS: u32 = 2;
        let mut last_error: Option<ApiError> = None;

        for attempt in 1..=MAX_ATTEMPTS {
            if attempt > 1 {
                self.sessions.invalidate().await;
            }

            // 每次尝试持有自己的会话句柄，重建不影响在途请求
            let session = match self.sessions.acquire().await {
                Ok(session) => session,
                Err(e) => {
                    warn!(
                        "Session acquisition failed (attempt {}/{}): {}",
                        attempt, MAX_ATTEMPTS, e
                    );
                    last_error = Some(e);
                    continue;
                }
            };

            match self.try_submit(&session, question, model).await {
                Ok(html) => return Ok(html),
                Err(e) => {
                    warn!(
                        "Chat submission failed (attempt {}/{}): {}",
                        attempt, MAX_ATTEMPTS, e
                    );
                    last_error = Some(e);
                }
            }
        }

        let detail = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        Err(ApiError::UpstreamUnavailable(detail))
    }

    async fn try_submit(
        &self,
        session: &UpstreamSession,
        question: &str,
        model: &str,
    ) -> ApiResult<String> {
        let chat_url = format!("{}/deepseek.php", self.config.base_url);
        let response = session
            .client
            .post(&chat_url)
            .query(&[("i", "1")])
            .form(&[("question", question), ("model", model)])
            .send()
            .await?
            .error_for_status()?;

        Ok(response.text().await?)
    }
}
