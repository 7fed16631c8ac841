use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub environment: String,
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub telegram: TelegramConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub api_key: Option<String>, // /chat接口的访问密钥
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub user_agent: String,
    pub default_model: String,
    pub session_ttl_secs: u64,
    pub request_timeout_secs: u64,
    pub warmup_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub public_base_url: Option<String>,
    pub send_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                cors_origins: vec!["*".to_string()],
                api_key: None,
            },
            upstream: UpstreamConfig {
                base_url: "http://deepseek-hub.rf.gd".to_string(),
                // 上游拒绝默认客户端标识，必须模拟浏览器
                user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/134.0.0.0 Safari/537.36".to_string(),
                default_model: "DeepSeek-V3".to_string(),
                session_ttl_secs: 600,
                request_timeout_secs: 60,
                warmup_delay_ms: 200,
            },
            telegram: TelegramConfig {
                bot_token: None,
                public_base_url: None,
                send_timeout_secs: 30,
            },
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        // 从环境变量加载配置
        if let Ok(port) = env::var("PORT") {
            config.server.port = port.parse()?;
        }

        if let Ok(host) = env::var("HOST") {
            config.server.host = host;
        }

        if let Ok(env_type) = env::var("ENVIRONMENT") {
            config.environment = env_type;
        }

        if let Ok(api_key) = env::var("API_KEY") {
            if !api_key.trim().is_empty() {
                config.server.api_key = Some(api_key.trim().to_string());
            }
        }

        // 上游相关配置
        if let Ok(base_url) = env::var("UPSTREAM_BASE_URL") {
            config.upstream.base_url = base_url.trim_end_matches('/').to_string();
        }

        if let Ok(model) = env::var("DEFAULT_MODEL") {
            if !model.trim().is_empty() {
                config.upstream.default_model = model.trim().to_string();
            }
        }

        if let Ok(ttl) = env::var("SESSION_TTL_SECS") {
            config.upstream.session_ttl_secs = ttl.parse()?;
        }

        // Telegram相关配置
        if let Ok(token) = env::var("TELEGRAM_BOT_TOKEN") {
            if !token.trim().is_empty() {
                config.telegram.bot_token = Some(token.trim().to_string());
            }
        }

        if let Ok(base) = env::var("PUBLIC_BASE_URL") {
            if !base.trim().is_empty() {
                config.telegram.public_base_url =
                    Some(base.trim().trim_end_matches('/').to_string());
            }
        }

        Ok(config)
    }
}
