use crate::config::UpstreamConfig;
use crate::error::{ApiError, ApiResult};
use crate::services::ChallengeSolver;
use reqwest::cookie::Jar;
use reqwest::{Client, Url};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// 挑战Cookie的固定名称
pub const CHALLENGE_COOKIE: &str = "__test";

/// 一次挑战握手换来的上游会话
///
/// Cookie存放在会话自带的jar里，外部只拿到不透明句柄。
#[derive(Debug)]
pub struct UpstreamSession {
    pub client: Client,
    pub cookie: String,
    created_at: Instant,
}

impl UpstreamSession {
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.age() >= ttl
    }
}

/// 会话管理器
///
/// 整个进程共享一个会话槽位。状态机：无 → 新鲜 →（超过TTL或
/// 显式作废）→ 失效 → 重建。过期会话绝不会被复用。
pub struct SessionManager {
    config: UpstreamConfig,
    // 检查年龄、重建、装Cookie都在这一把锁内完成
    slot: Mutex<Option<Arc<UpstreamSession>>>,
}

impl SessionManager {
    pub fn new(config: UpstreamConfig) -> Self {
        Self {
            config,
            slot: Mutex::new(None),
        }
    }

    /// 取一个可用会话，过期或不存在时重建
    ///
    /// 锁跨越整个检查加重建过程，重建期间的并发调用方等待
    /// 同一次握手完成，不会各自发起握手。
    pub async fn acquire(&self) -> ApiResult<Arc<UpstreamSession>> {
        let ttl = Duration::from_secs(self.config.session_ttl_secs);
        let mut slot = self.slot.lock().await;

        if let Some(session) = slot.as_ref() {
            if !session.is_expired(ttl) {
                debug!("Reusing upstream session (age: {:?})", session.age());
                return Ok(Arc::clone(session));
            }
            info!("Upstream session expired, rebuilding");
        }

        let session = Arc::new(self.build_session().await?);
        *slot = Some(Arc::clone(&session));
        Ok(session)
    }

    /// 作废当前会话，下次acquire时重新握手
    pub async fn invalidate(&self) {
        let mut slot = self.slot.lock().await;
        if slot.take().is_some() {
            info!("Upstream session invalidated");
        }
    }

    async fn build_session(&self) -> ApiResult<UpstreamSession> {
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .user_agent(self.config.user_agent.as_str())
            .timeout(Duration::from_secs(self.config.request_timeout_secs))
            .build()
            .map_err(|e| ApiError::SessionBuild(format!("client build failed: {}", e)))?;

        // 1. 拉取落地页（含挑战脚本）
        let landing_url = format!("{}/", self.config.base_url);
        let landing = client
            .get(&landing_url)
            .send()
            .await
            .map_err(|e| ApiError::SessionBuild(format!("landing page fetch failed: {}", e)))?
            .error_for_status()
            .map_err(|e| ApiError::SessionBuild(format!("landing page status: {}", e)))?
            .text()
            .await
            .map_err(|e| ApiError::SessionBuild(format!("landing page body: {}", e)))?;

        // 2. 解挑战
        let cookie = ChallengeSolver::solve(&landing)?;

        // 3. 在上游域下安装Cookie
        let base = Url::parse(&self.config.base_url)
            .map_err(|e| ApiError::SessionBuild(format!("bad base url: {}", e)))?;
        jar.add_cookie_str(&format!("{}={}; Path=/", CHALLENGE_COOKIE, cookie), &base);
        info!("Challenge solved, cookie installed");

        // 4. 预热请求
        let warmup_url = format!("{}/index.php?i=1", self.config.base_url);
        client
            .get(&warmup_url)
            .send()
            .await
            .map_err(|e| ApiError::SessionBuild(format!("warm-up failed: {}", e)))?
            .error_for_status()
            .map_err(|e| ApiError::SessionBuild(format!("warm-up status: {}", e)))?;

        // 5. 模拟人工节奏，预热和首个正式请求之间留出间隔
        tokio::time::sleep(Duration::from_millis(self.config.warmup_delay_ms)).await;

        debug!("Upstream session ready");
        Ok(UpstreamSession {
            client,
            cookie,
            created_at: Instant::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, response::Html, routing::get, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};

    // NIST SP 800-38A CBC-AES128向量，明文即预期Cookie值
    const KEY: &str = "2b7e151628aed2a6abf7158809cf4f3c";
    const IV: &str = "000102030405060708090a0b0c0d0e0f";
    const CIPHERTEXT: &str = "7649abac8119b246cee98e9b12e9197d";
    const COOKIE_VALUE: &str = "6bc1bee22e409f96e93d7e117393172a";

    #[derive(Clone)]
    struct StubState {
        landing_hits: Arc<AtomicUsize>,
    }

    async fn landing(State(state): State<StubState>) -> Html<String> {
        state.landing_hits.fetch_add(1, Ordering::SeqCst);
        Html(format!(
            r#"<script>var a=toNumbers("{KEY}"),b=toNumbers("{IV}"),c=toNumbers("{CIPHERTEXT}");</script>"#
        ))
    }

    async fn warmup() -> &'static str {
        "ok"
    }

    /// 本地起一个只提供落地页和预热路径的上游桩
    async fn spawn_stub() -> (String, Arc<AtomicUsize>) {
        let landing_hits = Arc::new(AtomicUsize::new(0));
        let state = StubState {
            landing_hits: Arc::clone(&landing_hits),
        };

        let app = Router::new()
            .route("/", get(landing))
            .route("/index.php", get(warmup))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), landing_hits)
    }

    fn test_config(base_url: &str, ttl_secs: u64) -> UpstreamConfig {
        UpstreamConfig {
            base_url: base_url.to_string(),
            user_agent: "test-agent".to_string(),
            default_model: "DeepSeek-V3".to_string(),
            session_ttl_secs: ttl_secs,
            request_timeout_secs: 5,
            warmup_delay_ms: 0,
        }
    }

    #[test]
    fn test_session_expiry() {
        let session = UpstreamSession {
            client: Client::new(),
            cookie: "abc".to_string(),
            created_at: Instant::now(),
        };
        assert!(!session.is_expired(Duration::from_secs(600)));
        assert!(session.is_expired(Duration::from_secs(0)));

        if let Some(past) = Instant::now().checked_sub(Duration::from_secs(601)) {
            let old = UpstreamSession {
                client: Client::new(),
                cookie: "abc".to_string(),
                created_at: past,
            };
            assert!(old.is_expired(Duration::from_secs(600)));
        }
    }

    #[tokio::test]
    async fn test_acquire_reuses_fresh_session() {
        let (base_url, landing_hits) = spawn_stub().await;
        let manager = SessionManager::new(test_config(&base_url, 600));

        let first = manager.acquire().await.unwrap();
        let second = manager.acquire().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.cookie, COOKIE_VALUE);
        assert_eq!(landing_hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_single_rebuild() {
        let (base_url, landing_hits) = spawn_stub().await;
        let manager = SessionManager::new(test_config(&base_url, 600));

        let first = manager.acquire().await.unwrap();
        manager.invalidate().await;
        let second = manager.acquire().await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.cookie, COOKIE_VALUE);
        assert_eq!(landing_hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_expired_session_is_never_reused() {
        let (base_url, landing_hits) = spawn_stub().await;
        let manager = SessionManager::new(test_config(&base_url, 0));

        let first = manager.acquire().await.unwrap();
        let second = manager.acquire().await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(landing_hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_acquirers_share_one_build() {
        let (base_url, landing_hits) = spawn_stub().await;
        let manager = Arc::new(SessionManager::new(test_config(&base_url, 600)));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move { manager.acquire().await }));
        }

        for handle in handles {
            let session = handle.await.unwrap().unwrap();
            assert_eq!(session.cookie, COOKIE_VALUE);
        }

        assert_eq!(landing_hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_build_failure_surfaces_as_session_build_error() {
        // 没有监听者的端口，连接直接失败
        let manager = SessionManager::new(test_config("http://127.0.0.1:9", 600));
        let err = manager.acquire().await.unwrap_err();
        assert!(matches!(err, ApiError::SessionBuild(_)));
    }
}
