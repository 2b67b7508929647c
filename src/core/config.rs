//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::agent::rpc::{StatusCall, UpdateCall};
use crate::core::errors::{Result, UbpError};
use crate::panel::gate::AvailabilityPolicy;
use crate::panel::model::RefreshMode;

/// Full panel configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub agent: AgentConfig,
    pub panel: PanelConfig,
    pub paths: PathsConfig,
}

/// How to reach the on-device agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// ubus object name exposing the booster calls.
    pub object: String,
    /// ubus client binary.
    pub ubus_bin: PathBuf,
    /// Per-call timeout handed to `ubus -t`.
    pub timeout_secs: u64,
    /// Which status dialect to query.
    pub status_call: StatusCall,
    /// Which call applies an update.
    pub update_call: UpdateCall,
}

/// Controller behavior knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PanelConfig {
    pub poll_interval_secs: u64,
    pub notice_ttl_secs: u64,
    pub refresh_mode: RefreshMode,
    pub availability_policy: AvailabilityPolicy,
    /// Refuse a service action while another service action is in flight.
    pub exclusive_service_actions: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub activity_log: PathBuf,
    pub activity_log_fallback: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            object: "uu-booster".to_string(),
            ubus_bin: PathBuf::from("ubus"),
            timeout_secs: 30,
            status_call: StatusCall::default(),
            update_call: UpdateCall::default(),
        }
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            notice_ttl_secs: 5,
            refresh_mode: RefreshMode::default(),
            availability_policy: AvailabilityPolicy::default(),
            exclusive_service_actions: false,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            config_file: Config::default_path(),
            activity_log: PathBuf::from("/tmp/ubp/activity.jsonl"),
            activity_log_fallback: Some(PathBuf::from("/dev/shm/ubp-activity.jsonl")),
        }
    }
}

impl AgentConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PanelConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    #[must_use]
    pub fn notice_ttl(&self) -> Duration {
        Duration::from_secs(self.notice_ttl_secs)
    }
}

impl Config {
    /// Default config path, overridable with `UBP_CONFIG`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        env::var_os("UBP_CONFIG").map_or_else(|| PathBuf::from("/etc/ubp/config.toml"), PathBuf::from)
    }

    /// Load configuration from an explicit path, or the default path when it exists.
    ///
    /// An explicit path that does not exist is an error; a missing default
    /// path falls back to built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::default_path(), false),
        };

        let mut cfg = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|source| UbpError::io(&path, source))?;
            toml::from_str::<Self>(&raw)?
        } else if explicit {
            return Err(UbpError::MissingConfig { path });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for logging.
    ///
    /// FNV-1a over the canonical JSON so the value is stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_env_overrides_from(env_var)
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        // agent
        if let Some(raw) = lookup("UBP_AGENT_OBJECT") {
            self.agent.object = raw.trim().to_string();
        }
        if let Some(raw) = lookup("UBP_AGENT_UBUS_BIN") {
            self.agent.ubus_bin = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("UBP_AGENT_TIMEOUT_SECS") {
            self.agent.timeout_secs = parse_env_u64("UBP_AGENT_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = lookup("UBP_AGENT_STATUS_CALL") {
            self.agent.status_call = parse_env_enum("UBP_AGENT_STATUS_CALL", &raw)?;
        }
        if let Some(raw) = lookup("UBP_AGENT_UPDATE_CALL") {
            self.agent.update_call = parse_env_enum("UBP_AGENT_UPDATE_CALL", &raw)?;
        }

        // panel
        if let Some(raw) = lookup("UBP_POLL_INTERVAL_SECS") {
            self.panel.poll_interval_secs = parse_env_u64("UBP_POLL_INTERVAL_SECS", &raw)?;
        }
        if let Some(raw) = lookup("UBP_NOTICE_TTL_SECS") {
            self.panel.notice_ttl_secs = parse_env_u64("UBP_NOTICE_TTL_SECS", &raw)?;
        }
        if let Some(raw) = lookup("UBP_REFRESH_MODE") {
            self.panel.refresh_mode = parse_env_enum("UBP_REFRESH_MODE", &raw)?;
        }
        if let Some(raw) = lookup("UBP_AVAILABILITY_POLICY") {
            self.panel.availability_policy = parse_env_enum("UBP_AVAILABILITY_POLICY", &raw)?;
        }
        if let Some(raw) = lookup("UBP_EXCLUSIVE_SERVICE_ACTIONS") {
            self.panel.exclusive_service_actions =
                parse_env_bool("UBP_EXCLUSIVE_SERVICE_ACTIONS", &raw)?;
        }

        // paths
        if let Some(raw) = lookup("UBP_ACTIVITY_LOG") {
            self.paths.activity_log = PathBuf::from(raw);
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let object = &self.agent.object;
        if object.is_empty() {
            return Err(UbpError::InvalidConfig {
                details: "agent.object must not be empty".to_string(),
            });
        }
        if !object
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(UbpError::InvalidConfig {
                details: format!("agent.object contains unsupported characters: {object:?}"),
            });
        }

        if !(1..=600).contains(&self.agent.timeout_secs) {
            return Err(UbpError::InvalidConfig {
                details: format!(
                    "agent.timeout_secs must be in [1, 600], got {}",
                    self.agent.timeout_secs
                ),
            });
        }

        if self.panel.poll_interval_secs == 0 {
            return Err(UbpError::InvalidConfig {
                details: "panel.poll_interval_secs must be > 0".to_string(),
            });
        }

        if self.panel.notice_ttl_secs == 0 {
            return Err(UbpError::InvalidConfig {
                details: "panel.notice_ttl_secs must be > 0".to_string(),
            });
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn parse_env_u64(name: &str, raw: &str) -> Result<u64> {
    raw.trim().parse::<u64>().map_err(|e| UbpError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {e}"),
    })
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(UbpError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: expected a boolean"),
        }),
    }
}

/// Parse a lowercase enum token the same way the TOML file spells it.
fn parse_env_enum<T>(name: &str, raw: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let token = raw.trim().to_ascii_lowercase();
    T::deserialize(serde_json::Value::String(token)).map_err(|e| UbpError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        cfg.validate().expect("default config should validate");
        assert_eq!(cfg.agent.object, "uu-booster");
        assert_eq!(cfg.panel.poll_interval(), Duration::from_secs(30));
        assert_eq!(cfg.panel.notice_ttl(), Duration::from_secs(5));
        assert!(!cfg.panel.exclusive_service_actions);
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[agent]
object = "luci-app-uu-booster"
status_call = "status"
update_call = "execute_update"

[panel]
poll_interval_secs = 10
refresh_mode = "remount"
availability_policy = "legacy"
exclusive_service_actions = true
"#,
        )
        .unwrap();

        let cfg = Config::load(Some(&path)).expect("config should load");
        assert_eq!(cfg.agent.object, "luci-app-uu-booster");
        assert_eq!(cfg.agent.status_call, StatusCall::Status);
        assert_eq!(cfg.agent.update_call, UpdateCall::ExecuteUpdate);
        assert_eq!(cfg.panel.poll_interval_secs, 10);
        assert_eq!(cfg.panel.refresh_mode, RefreshMode::Remount);
        assert_eq!(cfg.panel.availability_policy, AvailabilityPolicy::Legacy);
        assert!(cfg.panel.exclusive_service_actions);
        // Untouched fields keep their defaults.
        assert_eq!(cfg.panel.notice_ttl_secs, 5);
        assert_eq!(cfg.paths.config_file, path);
    }

    #[test]
    fn load_returns_error_for_explicit_missing_path() {
        let result = Config::load(Some(Path::new("/nonexistent/ubp/config.toml")));
        assert!(matches!(result, Err(UbpError::MissingConfig { .. })));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[panel\npoll_interval_secs = ").unwrap();
        let err = Config::load(Some(&path)).unwrap_err();
        assert_eq!(err.code(), "UBP-1003");
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = Config::default();
        let overrides = vars(&[
            ("UBP_AGENT_OBJECT", "luci-app-uu-booster"),
            ("UBP_AGENT_STATUS_CALL", "STATUS"),
            ("UBP_POLL_INTERVAL_SECS", "15"),
            ("UBP_REFRESH_MODE", "remount"),
            ("UBP_EXCLUSIVE_SERVICE_ACTIONS", "yes"),
            ("UBP_ACTIVITY_LOG", "/tmp/ubp-test/activity.jsonl"),
        ]);

        cfg.apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect("env overrides should parse");

        assert_eq!(cfg.agent.object, "luci-app-uu-booster");
        assert_eq!(cfg.agent.status_call, StatusCall::Status);
        assert_eq!(cfg.panel.poll_interval_secs, 15);
        assert_eq!(cfg.panel.refresh_mode, RefreshMode::Remount);
        assert!(cfg.panel.exclusive_service_actions);
        assert_eq!(
            cfg.paths.activity_log,
            PathBuf::from("/tmp/ubp-test/activity.jsonl")
        );
    }

    #[test]
    fn env_invalid_boolean_rejected() {
        let mut cfg = Config::default();
        let overrides = vars(&[("UBP_EXCLUSIVE_SERVICE_ACTIONS", "maybe")]);
        let err = cfg
            .apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect_err("invalid bool should fail");
        match err {
            UbpError::ConfigParse { context, details } => {
                assert_eq!(context, "env");
                assert!(details.contains("UBP_EXCLUSIVE_SERVICE_ACTIONS"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn env_unknown_enum_token_rejected() {
        let mut cfg = Config::default();
        let overrides = vars(&[("UBP_AVAILABILITY_POLICY", "lenient")]);
        let err = cfg
            .apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect_err("unknown policy should fail");
        assert!(err.to_string().contains("UBP_AVAILABILITY_POLICY"));
    }

    #[test]
    fn zero_poll_interval_rejected() {
        let mut cfg = Config::default();
        cfg.panel.poll_interval_secs = 0;
        let err = cfg.validate().expect_err("expected poll interval error");
        assert!(err.to_string().contains("poll_interval_secs"));
    }

    #[test]
    fn zero_notice_ttl_rejected() {
        let mut cfg = Config::default();
        cfg.panel.notice_ttl_secs = 0;
        let err = cfg.validate().expect_err("expected ttl error");
        assert!(err.to_string().contains("notice_ttl_secs"));
    }

    #[test]
    fn object_name_must_be_plain() {
        let mut cfg = Config::default();
        cfg.agent.object = "uu booster; reboot".to_string();
        assert!(cfg.validate().is_err());
        cfg.agent.object = String::new();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn timeout_out_of_range_rejected() {
        let mut cfg = Config::default();
        cfg.agent.timeout_secs = 0;
        assert!(cfg.validate().is_err());
        cfg.agent.timeout_secs = 601;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn stable_hash_deterministic_and_sensitive() {
        let cfg = Config::default();
        let h1 = cfg.stable_hash().expect("hash");
        let h2 = cfg.stable_hash().expect("hash");
        assert_eq!(h1, h2);

        let mut changed = cfg;
        changed.panel.poll_interval_secs = 31;
        assert_ne!(h1, changed.stable_hash().expect("hash"));
    }
}
