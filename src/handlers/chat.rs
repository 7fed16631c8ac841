use crate::error::{ApiError, ApiResult};
use crate::handlers::AppState;
use crate::models::{ChatRequest, ChatResponse, AVAILABLE_MODELS};
use crate::utils::unix_timestamp;
use axum::{
    extract::State,
    http::HeaderMap,
    response::{Html, Json},
};
use serde_json::{json, Value};

/// 聊天处理器
pub async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    // 密钥校验在任何上游逻辑之前
    check_api_key(&headers, &state)?;

    let response = state
        .upstream
        .chat(&request.question, request.model.as_deref())
        .await?;

    Ok(Json(response))
}

/// 简单的头部相等比较；未配置密钥时接口不设防
fn check_api_key(headers: &HeaderMap, state: &AppState) -> ApiResult<()> {
    let Some(expected) = state.config.server.api_key.as_deref() else {
        return Ok(());
    };

    let provided = headers
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if provided != expected {
        return Err(ApiError::Unauthorized(
            "invalid or missing API key".to_string(),
        ));
    }

    Ok(())
}

/// 健康检查
pub async fn health() -> Json<Value> {
    Json(json!({
        "ok": true,
        "time": unix_timestamp(),
        "server_time": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// 首页：模型下拉框加提问表单
pub async fn home() -> Html<String> {
    let options: String = AVAILABLE_MODELS
        .iter()
        .map(|model| format!("<option value=\"{model}\">{model}</option>"))
        .collect::<Vec<_>>()
        .join("\n");

    let page = format!(
        r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width,initial-scale=1" />
  <title>DeepSeek Model Hub</title>
  <style>
    body {{ font-family: system-ui, -apple-system, Segoe UI, Roboto; margin: 24px; }}
    .card {{ max-width: 900px; margin: 0 auto; padding: 16px; border: 1px solid #ddd; border-radius: 12px; }}
    textarea {{ width: 100%; min-height: 120px; }}
    select, button, textarea {{ font-size: 16px; padding: 10px; border-radius: 10px; border: 1px solid #ccc; }}
    pre {{ white-space: pre-wrap; background: #f7f7f7; padding: 12px; border-radius: 12px; }}
  </style>
</head>
<body>
  <div class="card">
    <h2>DeepSeek Model Hub</h2>
    <p>Pick a model, then ask your question.</p>
    <div><select id="model">{options}</select></div>
    <div style="margin-top:12px;"><textarea id="q" placeholder="Type your question..."></textarea></div>
    <div style="margin-top:12px;"><button onclick="send()">Send</button></div>
    <h3 style="margin-top:16px;">Answer:</h3>
    <pre id="out"></pre>
  </div>
<script>
async function send() {{
  const model = document.getElementById("model").value;
  const question = document.getElementById("q").value;
  const out = document.getElementById("out");
  out.textContent = "Sending...";
  const r = await fetch("/chat", {{
    method: "POST",
    headers: {{ "Content-Type": "application/json" }},
    body: JSON.stringify({{ model, question }})
  }});
  const data = await r.json();
  out.textContent = data.answer || JSON.stringify(data, null, 2);
}}
</script>
</body>
</html>
"#
    );

    Html(page)
}
