//! infralink の中央設定
//!
//! リトライ・ポーリング・タイムアウトの設定を論理サービス名ごとに管理します。
//! 全フィールドに serde のデフォルト値があるため、設定ファイルは部分的な記述で構いません。

pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 設定ファイルを直接指定する環境変数
pub const CONFIG_ENV_VAR: &str = "INFRALINK_RETRY_CONFIG";

/// カレントディレクトリで探すファイル名（優先順）
const LOCAL_CANDIDATES: [&str; 2] = ["infralink.yaml", ".infralink.yaml"];

/// 1つのリトライポリシーの設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySettings {
    /// 最大試行回数（初回を含む）
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// 初期待機時間（ミリ秒）
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    /// 1回あたりの最大待機時間（ミリ秒）
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
    /// Exponential倍率
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// ジッター幅（待機時間に対する割合、0.0〜1.0）
    #[serde(default = "default_jitter")]
    pub jitter_fraction: f64,
    /// リトライ全体の経過時間上限（ミリ秒）
    #[serde(default = "default_max_elapsed")]
    pub max_elapsed_ms: u64,
    /// レート制限をリトライするか
    #[serde(default = "default_true")]
    pub retry_throttled: bool,
    /// 5xx 系エラーをリトライするか
    #[serde(default = "default_true")]
    pub retry_server_errors: bool,
    /// ネットワークエラーをリトライするか
    #[serde(default = "default_true")]
    pub retry_transport: bool,
}

fn default_max_attempts() -> u32 {
    8
}
fn default_initial_backoff() -> u64 {
    1000 // 1秒
}
fn default_max_backoff() -> u64 {
    30000 // 30秒
}
fn default_multiplier() -> f64 {
    2.0
}
fn default_jitter() -> f64 {
    0.25
}
fn default_max_elapsed() -> u64 {
    600_000 // 10分
}
fn default_true() -> bool {
    true
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            multiplier: default_multiplier(),
            jitter_fraction: default_jitter(),
            max_elapsed_ms: default_max_elapsed(),
            retry_throttled: true,
            retry_server_errors: true,
            retry_transport: true,
        }
    }
}

impl PolicySettings {
    /// 非同期操作（work request を開始する呼び出し）向けのデフォルト
    ///
    /// 非同期操作は開始リクエストの重複を避けるため試行回数を抑えます。
    pub fn async_default() -> Self {
        Self {
            max_attempts: 4,
            max_elapsed_ms: 300_000, // 5分
            ..Self::default()
        }
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn max_elapsed(&self) -> Duration {
        Duration::from_millis(self.max_elapsed_ms)
    }

    fn validate(&self, label: &str) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid(format!(
                "{label}: max_attempts は 1 以上が必要です"
            )));
        }
        if self.initial_backoff_ms == 0 {
            return Err(ConfigError::Invalid(format!(
                "{label}: initial_backoff_ms は 1 以上が必要です"
            )));
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err(ConfigError::Invalid(format!(
                "{label}: max_backoff_ms ({}) は initial_backoff_ms ({}) 以上が必要です",
                self.max_backoff_ms, self.initial_backoff_ms
            )));
        }
        if self.multiplier < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "{label}: multiplier は 1.0 以上が必要です ({})",
                self.multiplier
            )));
        }
        // 1.0 では遅延が 0 になり得る
        if !(0.0..1.0).contains(&self.jitter_fraction) {
            return Err(ConfigError::Invalid(format!(
                "{label}: jitter_fraction は 0.0 以上 1.0 未満が必要です ({})",
                self.jitter_fraction
            )));
        }
        Ok(())
    }
}

/// サービス単位の上書き設定
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// 同期操作のポリシー
    #[serde(default)]
    pub sync: Option<PolicySettings>,
    /// 非同期操作のポリシー
    #[serde(default, rename = "async")]
    pub async_op: Option<PolicySettings>,
}

/// work request ポーリングの設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollSettings {
    /// 初回ポーリング間隔（ミリ秒）
    #[serde(default = "default_poll_initial")]
    pub initial_interval_ms: u64,
    /// 最大ポーリング間隔（ミリ秒）
    #[serde(default = "default_poll_max")]
    pub max_interval_ms: u64,
    /// 間隔の倍率
    #[serde(default = "default_poll_multiplier")]
    pub multiplier: f64,
}

fn default_poll_initial() -> u64 {
    1000
}
fn default_poll_max() -> u64 {
    30000
}
fn default_poll_multiplier() -> f64 {
    1.5
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            initial_interval_ms: default_poll_initial(),
            max_interval_ms: default_poll_max(),
            multiplier: default_poll_multiplier(),
        }
    }
}

impl PollSettings {
    /// 指定回数目のポーリング間隔を計算
    pub fn interval_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.initial_interval_ms as f64 * self.multiplier.powi(attempt as i32);
        Duration::from_millis((delay as u64).min(self.max_interval_ms))
    }
}

/// 操作ごとのタイムアウト（ミリ秒）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutSettings {
    #[serde(default = "default_timeout")]
    pub create_ms: u64,
    #[serde(default = "default_timeout")]
    pub read_ms: u64,
    #[serde(default = "default_timeout")]
    pub update_ms: u64,
    #[serde(default = "default_timeout")]
    pub delete_ms: u64,
}

fn default_timeout() -> u64 {
    20 * 60 * 1000 // 20分
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            create_ms: default_timeout(),
            read_ms: default_timeout(),
            update_ms: default_timeout(),
            delete_ms: default_timeout(),
        }
    }
}

/// リトライ・ポーリング設定全体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// 同期操作のデフォルトポリシー
    #[serde(default)]
    pub default: PolicySettings,
    /// 非同期操作のデフォルトポリシー
    #[serde(default = "PolicySettings::async_default")]
    pub async_default: PolicySettings,
    /// サービス名 → 上書き設定
    #[serde(default)]
    pub services: HashMap<String, ServiceSettings>,
    #[serde(default)]
    pub poll: PollSettings,
    #[serde(default)]
    pub timeouts: TimeoutSettings,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            default: PolicySettings::default(),
            async_default: PolicySettings::async_default(),
            services: HashMap::new(),
            poll: PollSettings::default(),
            timeouts: TimeoutSettings::default(),
        }
    }
}

impl RetrySettings {
    /// YAML 文字列からパースして検証
    pub fn from_yaml(content: &str) -> Result<Self> {
        let settings: RetrySettings = serde_yaml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// ファイルから読み込み
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let settings = Self::from_yaml(&content)?;
        tracing::debug!(
            "Loaded retry settings from {} ({} service overrides)",
            path.display(),
            settings.services.len()
        );
        Ok(settings)
    }

    /// 設定ファイルを探して読み込む。見つからなければデフォルト値を返す
    pub fn load() -> Result<Self> {
        match find_config_file()? {
            Some(path) => Self::from_file(path),
            None => {
                tracing::debug!("Retry settings file not found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// 全ポリシーの値を検証
    pub fn validate(&self) -> Result<()> {
        self.default.validate("default")?;
        self.async_default.validate("async_default")?;
        for (name, service) in &self.services {
            if let Some(policy) = &service.sync {
                policy.validate(&format!("services.{name}.sync"))?;
            }
            if let Some(policy) = &service.async_op {
                policy.validate(&format!("services.{name}.async"))?;
            }
        }
        self.poll.validate()
    }
}

impl PollSettings {
    fn validate(&self) -> Result<()> {
        if self.initial_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll: initial_interval_ms は 1 以上が必要です".to_string(),
            ));
        }
        if self.max_interval_ms < self.initial_interval_ms {
            return Err(ConfigError::Invalid(format!(
                "poll: max_interval_ms ({}) は initial_interval_ms ({}) 以上が必要です",
                self.max_interval_ms, self.initial_interval_ms
            )));
        }
        if self.multiplier < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "poll: multiplier は 1.0 以上が必要です ({})",
                self.multiplier
            )));
        }
        Ok(())
    }
}

/// 設定ファイルを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 INFRALINK_RETRY_CONFIG (直接パス指定、存在しなければエラー)
/// 2. カレントディレクトリ: infralink.yaml, .infralink.yaml
/// 3. ~/.config/infralink/retry.yaml (グローバル設定)
pub fn find_config_file() -> Result<Option<PathBuf>> {
    // 1. 環境変数で直接指定
    if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
        let path = PathBuf::from(&config_path);
        if path.exists() {
            return Ok(Some(path));
        }
        return Err(ConfigError::FileNotFound(config_path));
    }

    // 2. カレントディレクトリで検索
    let current_dir = std::env::current_dir()?;
    for filename in &LOCAL_CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    // 3. グローバル設定ファイル
    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("infralink").join("retry.yaml");
        if global_config.exists() {
            return Ok(Some(global_config));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
default:
  max_attempts: 3
services:
  object_storage:
    async:
      max_elapsed_ms: 1000
"#;
        let settings = RetrySettings::from_yaml(yaml).unwrap();
        assert_eq!(settings.default.max_attempts, 3);
        assert_eq!(settings.default.initial_backoff_ms, 1000);
        assert_eq!(settings.async_default, PolicySettings::async_default());

        let storage = settings.services.get("object_storage").unwrap();
        assert!(storage.sync.is_none());
        assert_eq!(storage.async_op.as_ref().unwrap().max_elapsed_ms, 1000);
    }

    #[test]
    fn test_invalid_jitter_rejected() {
        let yaml = "default:\n  jitter_fraction: 1.5\n";
        let result = RetrySettings::from_yaml(yaml);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_full_jitter_rejected() {
        let yaml = "async_default:\n  jitter_fraction: 1.0\n";
        let err = RetrySettings::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("async_default"));

        let yaml = "default:\n  jitter_fraction: 0.99\n";
        assert!(RetrySettings::from_yaml(yaml).is_ok());
    }

    #[test]
    fn test_zero_initial_backoff_rejected() {
        let yaml = "default:\n  initial_backoff_ms: 0\n";
        let result = RetrySettings::from_yaml(yaml);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let yaml = "poll:\n  initial_interval_ms: 0\n  max_interval_ms: 0\n";
        let err = RetrySettings::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("initial_interval_ms"));
    }

    #[test]
    fn test_poll_max_below_initial_rejected() {
        let yaml = "poll:\n  initial_interval_ms: 5000\n  max_interval_ms: 1000\n";
        let err = RetrySettings::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("max_interval_ms"));
    }

    #[test]
    fn test_zero_attempts_rejected_in_service_override() {
        let yaml = "services:\n  core:\n    sync:\n      max_attempts: 0\n";
        let err = RetrySettings::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("services.core.sync"));
    }

    #[test]
    fn test_poll_interval_calculation() {
        let poll = PollSettings {
            initial_interval_ms: 1000,
            max_interval_ms: 5000,
            multiplier: 2.0,
        };

        assert_eq!(poll.interval_for_attempt(0), Duration::from_millis(1000));
        assert_eq!(poll.interval_for_attempt(1), Duration::from_millis(2000));
        assert_eq!(poll.interval_for_attempt(2), Duration::from_millis(4000));
        assert_eq!(poll.interval_for_attempt(3), Duration::from_millis(5000)); // capped at max
    }

    #[test]
    #[serial]
    fn test_find_config_file_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.yaml");
        fs::write(&config_path, "default:\n  max_attempts: 2\n").unwrap();

        unsafe {
            std::env::set_var(CONFIG_ENV_VAR, config_path.to_str().unwrap());
        }

        let found = find_config_file().unwrap();
        assert_eq!(found, Some(config_path));
        let settings = RetrySettings::load().unwrap();
        assert_eq!(settings.default.max_attempts, 2);

        unsafe {
            std::env::remove_var(CONFIG_ENV_VAR);
        }
    }

    #[test]
    #[serial]
    fn test_env_var_pointing_to_missing_file() {
        unsafe {
            std::env::set_var(CONFIG_ENV_VAR, "/nonexistent/infralink.yaml");
        }

        let result = find_config_file();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));

        unsafe {
            std::env::remove_var(CONFIG_ENV_VAR);
        }
    }

    #[test]
    #[serial]
    fn test_find_config_file_local_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("infralink.yaml"), "{}").unwrap();
        fs::write(temp_dir.path().join(".infralink.yaml"), "{}").unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_config_file().unwrap().unwrap();
        assert!(result.ends_with("infralink.yaml"));
        assert!(!result.ends_with(".infralink.yaml"));

        std::env::set_current_dir(original_dir).unwrap();
    }
}
