//! Ledger configuration stored as TOML.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Ledger configuration (TOML). Missing fields take the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LedgerConfig {
    /// Directory of the sled database.
    pub db_path: PathBuf,

    /// Longest wait for a course's critical section before failing with `Busy`.
    pub lock_timeout_ms: u64,

    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_filter: String,

    pub catalog: CatalogConfig,
}

/// Credit weights published by the external course catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CatalogConfig {
    pub credits: BTreeMap<String, u32>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("enrollment.db"),
            lock_timeout_ms: 2_000,
            log_filter: "course_enrollment=info".to_string(),
            catalog: CatalogConfig::default(),
        }
    }
}

impl LedgerConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.lock_timeout_ms == 0 {
            return Err(anyhow!("lock_timeout_ms must be > 0"));
        }
        if self.db_path.as_os_str().is_empty() {
            return Err(anyhow!("db_path must not be empty"));
        }
        if self.log_filter.trim().is_empty() {
            return Err(anyhow!("log_filter must not be empty"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `LedgerConfig::default()`.
pub fn load_config(path: &Path) -> Result<LedgerConfig> {
    if !path.exists() {
        let cfg = LedgerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: LedgerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, LedgerConfig::default());
        assert_eq!(cfg.lock_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn parses_partial_file_with_credits() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("enrollment.toml");
        fs::write(
            &path,
            "lock_timeout_ms = 250\n\n[catalog.credits]\ncs101 = 4\nmath100 = 3\n",
        )
        .expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.lock_timeout_ms, 250);
        assert_eq!(cfg.db_path, PathBuf::from("enrollment.db"));
        assert_eq!(cfg.catalog.credits.get("cs101"), Some(&4));
    }

    #[test]
    fn rejects_zero_timeout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("enrollment.toml");
        fs::write(&path, "lock_timeout_ms = 0\n").expect("write");
        assert!(load_config(&path).is_err());
    }
}
