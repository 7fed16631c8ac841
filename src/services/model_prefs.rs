use crate::models::is_known_model;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

/// 每个会话的模型偏好存储
///
/// 纯内存，进程重启即丢失。没有记录表示使用默认模型。
pub struct ModelPrefs {
    default_model: String,
    prefs: RwLock<HashMap<i64, String>>,
}

impl ModelPrefs {
    pub fn new(default_model: String) -> Self {
        Self {
            default_model,
            prefs: RwLock::new(HashMap::new()),
        }
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// 读取当前模型；无记录或记录已不在模型列表时回落默认
    pub fn current(&self, user_id: i64) -> String {
        let prefs = self.prefs.read();
        match prefs.get(&user_id) {
            Some(model) if is_known_model(model) => model.clone(),
            _ => self.default_model.clone(),
        }
    }

    /// 设置偏好，只接受已知模型
    pub fn select(&self, user_id: i64, model: &str) -> bool {
        if !is_known_model(model) {
            return false;
        }
        self.prefs.write().insert(user_id, model.to_string());
        debug!("User {} selected model {}", user_id, model);
        true
    }

    /// 清除偏好，回到默认模型
    pub fn reset(&self, user_id: i64) {
        self.prefs.write().remove(&user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pref_lifecycle() {
        let prefs = ModelPrefs::new("DeepSeek-V3".to_string());

        // 默认
        assert_eq!(prefs.current(1), "DeepSeek-V3");

        // 设置后覆盖
        assert!(prefs.select(1, "DeepSeek-R1"));
        assert_eq!(prefs.current(1), "DeepSeek-R1");

        // 重复设置覆盖旧值
        assert!(prefs.select(1, "DeepSeek-Coder"));
        assert_eq!(prefs.current(1), "DeepSeek-Coder");

        // 其他会话互不影响
        assert_eq!(prefs.current(2), "DeepSeek-V3");

        // 重置后回到默认
        prefs.reset(1);
        assert_eq!(prefs.current(1), "DeepSeek-V3");
    }

    #[test]
    fn test_select_rejects_unknown_model() {
        let prefs = ModelPrefs::new("DeepSeek-V3".to_string());
        assert!(!prefs.select(1, "gpt-4"));
        assert_eq!(prefs.current(1), "DeepSeek-V3");
    }
}
