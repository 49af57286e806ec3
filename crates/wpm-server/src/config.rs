use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Server settings, read from the environment (and `.env`, loaded by `main`).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub session_sweep_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = get("WPM_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = get("WPM_PORT")
            .or_else(|| get("PORT"))
            .unwrap_or_else(|| "8080".into())
            .parse()
            .context("WPM_PORT must be a port number")?;
        let db_path = get("WPM_DB_PATH").unwrap_or_else(|| "wpm.db".into()).into();
        let upload_dir = get("WPM_UPLOAD_DIR")
            .unwrap_or_else(|| "./uploads".into())
            .into();
        let max_upload_mb: usize = get("WPM_MAX_UPLOAD_MB")
            .unwrap_or_else(|| "50".into())
            .parse()
            .context("WPM_MAX_UPLOAD_MB must be a whole number")?;
        let max_upload_bytes = max_upload_mb
            .checked_mul(1024 * 1024)
            .context("WPM_MAX_UPLOAD_MB is too large")?;
        let session_sweep_secs = get("WPM_SESSION_SWEEP_SECS")
            .unwrap_or_else(|| "3600".into())
            .parse()
            .context("WPM_SESSION_SWEEP_SECS must be a whole number")?;

        Ok(Self {
            host,
            port,
            db_path,
            upload_dir,
            max_upload_bytes,
            session_sweep_secs,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.db_path, PathBuf::from("wpm.db"));
        assert_eq!(cfg.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(cfg.session_sweep_secs, 3600);
        assert_eq!(cfg.addr().unwrap().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn test_port_fallback_and_override() {
        assert_eq!(config(&[("PORT", "9000")]).unwrap().port, 9000);
        assert_eq!(config(&[("PORT", "9000"), ("WPM_PORT", "9100")]).unwrap().port, 9100);
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        assert!(config(&[("WPM_PORT", "http")]).is_err());
        assert!(config(&[("WPM_MAX_UPLOAD_MB", "-1")]).is_err());
    }

    #[test]
    fn test_oversized_upload_limit_rejected() {
        let too_big = (usize::MAX / 1024).to_string();
        let err = config(&[("WPM_MAX_UPLOAD_MB", too_big.as_str())]).unwrap_err();
        assert!(err.to_string().contains("WPM_MAX_UPLOAD_MB"));
    }
}
