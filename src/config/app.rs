// src/config/app.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::page::contract::PageContract;
use crate::stats::DEFAULT_TTL_SECS;

pub const DEFAULT_CONFIG_PATH: &str = "config/style_adjust.toml";
pub const DEFAULT_DATA_URL: &str =
    "https://raw.githubusercontent.com/pablovillars/untappd_style_adjustment/master/data/style-averages.json";
pub const DEFAULT_STORE_PATH: &str = "state/style_store.json";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";

pub const ENV_CONFIG_PATH: &str = "STYLE_ADJUST_CONFIG_PATH";
pub const ENV_DATA_URL: &str = "STYLE_ADJUST_DATA_URL";
pub const ENV_STORE_PATH: &str = "STYLE_ADJUST_STORE_PATH";
pub const ENV_BIND_ADDR: &str = "STYLE_ADJUST_BIND";
pub const ENV_TTL_SECS: &str = "STYLE_ADJUST_TTL_SECS";

fn default_data_url() -> String {
    DEFAULT_DATA_URL.to_string()
}
fn default_ttl_secs() -> u64 {
    DEFAULT_TTL_SECS
}
fn default_store_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_PATH)
}
fn default_bind_addr() -> String {
    DEFAULT_BIND_ADDR.to_string()
}
fn default_user_agent() -> String {
    concat!("style-adjust/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_connect_timeout_ms() -> u64 {
    4_000
}
fn default_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            connect_timeout_ms: default_connect_timeout_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote `style-averages.json`.
    #[serde(default = "default_data_url")]
    pub data_url: String,
    /// Maximum record age before a start-up check refetches.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// 0 disables the periodic start-up check.
    #[serde(default)]
    pub refresh_check_interval_secs: u64,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub contract: PageContract,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_url: default_data_url(),
            ttl_secs: default_ttl_secs(),
            store_path: default_store_path(),
            bind_addr: default_bind_addr(),
            refresh_check_interval_secs: 0,
            http: HttpSettings::default(),
            contract: PageContract::default(),
        }
    }
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&data).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: AppConfig = toml::from_str(s)?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// Load using env var + fallbacks, then apply env overrides:
    /// 1) $STYLE_ADJUST_CONFIG_PATH (must exist)
    /// 2) config/style_adjust.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            Self::load_from_file(PathBuf::from(p))?
        } else {
            let p = PathBuf::from(DEFAULT_CONFIG_PATH);
            if p.exists() {
                Self::load_from_file(&p)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env();
        cfg.sanitize();
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var(ENV_DATA_URL) {
            self.data_url = v;
        }
        if let Ok(v) = std::env::var(ENV_STORE_PATH) {
            self.store_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var(ENV_BIND_ADDR) {
            self.bind_addr = v;
        }
        if let Some(v) = std::env::var(ENV_TTL_SECS)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            self.ttl_secs = v;
        }
    }

    fn sanitize(&mut self) {
        self.data_url = self.data_url.trim().to_string();
        if self.data_url.is_empty() {
            self.data_url = default_data_url();
        }
        if self.ttl_secs == 0 {
            self.ttl_secs = default_ttl_secs();
        }
        if self.bind_addr.trim().is_empty() {
            self.bind_addr = default_bind_addr();
        }
        if self.http.timeout_ms == 0 {
            self.http.timeout_ms = default_timeout_ms();
        }
        if self.http.connect_timeout_ms == 0 {
            self.http.connect_timeout_ms = default_connect_timeout_ms();
        }
        self.contract.sanitize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn empty_toml_gives_defaults() {
        let cfg = AppConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.ttl_secs, 86_400);
        assert_eq!(cfg.contract.card_class, "beer-item");
    }

    #[test]
    fn shipped_config_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_CONFIG_PATH);
        let cfg = AppConfig::load_from_file(path).unwrap();
        assert_eq!(cfg.data_url, DEFAULT_DATA_URL);
        assert_eq!(cfg.ttl_secs, DEFAULT_TTL_SECS);
        assert_eq!(cfg.store_path, PathBuf::from(DEFAULT_STORE_PATH));
        assert_eq!(cfg.contract, PageContract::default());
    }

    #[test]
    fn zero_values_are_sanitized() {
        let cfg = AppConfig::from_toml_str(
            r#"
ttl_secs = 0
data_url = "   "
[http]
timeout_ms = 0
"#,
        )
        .unwrap();
        assert_eq!(cfg.ttl_secs, DEFAULT_TTL_SECS);
        assert_eq!(cfg.data_url, DEFAULT_DATA_URL);
        assert_eq!(cfg.http.timeout_ms, 10_000);
    }

    #[serial_test::serial]
    #[test]
    fn env_overrides_apply_after_file() {
        // Isolate CWD so the repo's config/ is not picked up.
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_CONFIG_PATH);

        env::set_var(ENV_DATA_URL, "http://127.0.0.1:9/x.json");
        env::set_var(ENV_TTL_SECS, "60");
        let cfg = AppConfig::load_default().unwrap();
        assert_eq!(cfg.data_url, "http://127.0.0.1:9/x.json");
        assert_eq!(cfg.ttl_secs, 60);
        env::remove_var(ENV_DATA_URL);
        env::remove_var(ENV_TTL_SECS);

        env::set_current_dir(&old).unwrap();
    }
}
