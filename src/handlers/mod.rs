pub mod chat;
pub mod telegram;

use crate::config::Config;
use crate::error::ApiResult;
use crate::services::{ModelPrefs, SessionManager, TelegramSender, UpstreamClient};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub upstream: Arc<UpstreamClient>,
    pub model_prefs: Arc<ModelPrefs>,
    pub telegram: Arc<TelegramSender>,
}

pub async fn create_router(config: Config) -> ApiResult<Router> {
    let sessions = Arc::new(SessionManager::new(config.upstream.clone()));
    let upstream = Arc::new(UpstreamClient::new(config.upstream.clone(), sessions));
    let model_prefs = Arc::new(ModelPrefs::new(config.upstream.default_model.clone()));
    let telegram = Arc::new(TelegramSender::new(config.telegram.clone()));

    let state = AppState {
        config: config.clone(),
        upstream,
        model_prefs,
        telegram,
    };

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    let app = Router::new()
        // 首页和健康检查
        .route("/", get(chat::home))
        .route("/health", get(chat::health))
        // 聊天API
        .route("/chat", post(chat::chat))
        // Telegram webhook
        .route("/telegram/webhook", post(telegram::webhook))
        .route("/telegram/set_webhook", post(telegram::set_webhook))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state);

    Ok(app)
}
