//! Workbench configuration
//!
//! Configuration for the execution gateway and session persistence, loaded from environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};

/// Where edit sessions are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionBackendKind {
    File,
    Redis,
    Memory,
}

impl FromStr for SessionBackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(SessionBackendKind::File),
            "redis" => Ok(SessionBackendKind::Redis),
            "memory" => Ok(SessionBackendKind::Memory),
            other => bail!("Unknown session backend: {}", other),
        }
    }
}

/// Workbench configuration
#[derive(Debug, Clone)]
pub struct WorkbenchConfig {
    /// Execution gateway endpoint (default: http://localhost:3000/api/execute)
    pub execution_api_url: String,
    /// Bearer token sent with each run
    pub execution_api_token: Option<String>,
    /// Client-side request timeout (default: none)
    pub execution_timeout: Option<Duration>,
    /// Session backend (default: file)
    pub session_backend: SessionBackendKind,
    /// Directory holding the session file (default: ./.workbench)
    pub session_dir: PathBuf,
    /// Redis URL for the redis backend (default: redis://localhost:6379)
    pub redis_url: String,
    /// Prefix of every persisted session key (default: workbench)
    pub session_namespace: String,
    /// Fallback language for fuzzy lookups (default: first catalog entry)
    pub default_language: Option<String>,
    /// Language catalog file replacing the built-in one
    pub languages_config: Option<PathBuf>,
    /// Largest session file the file backend will write (default: unlimited)
    pub session_quota_bytes: Option<usize>,
}

impl Default for WorkbenchConfig {
    fn default() -> Self {
        Self {
            execution_api_url: "http://localhost:3000/api/execute".into(),
            execution_api_token: None,
            execution_timeout: None,
            session_backend: SessionBackendKind::File,
            session_dir: PathBuf::from("./.workbench"),
            redis_url: "redis://localhost:6379".into(),
            session_namespace: "workbench".into(),
            default_language: None,
            languages_config: None,
            session_quota_bytes: None,
        }
    }
}

impl WorkbenchConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("EXECUTION_API_URL") {
            config.execution_api_url = url;
        }
        config.execution_api_token = get("EXECUTION_API_TOKEN");

        if let Some(secs) = get("EXECUTION_TIMEOUT_SECS") {
            let secs = secs
                .trim()
                .parse::<u64>()
                .with_context(|| format!("Invalid EXECUTION_TIMEOUT_SECS: {}", secs))?;
            config.execution_timeout = Some(Duration::from_secs(secs));
        }

        if let Some(backend) = get("SESSION_BACKEND") {
            config.session_backend = backend.parse()?;
        }
        if let Some(dir) = get("SESSION_DIR") {
            config.session_dir = PathBuf::from(dir);
        }
        if let Some(bytes) = get("SESSION_QUOTA_BYTES") {
            let bytes = bytes
                .trim()
                .parse::<usize>()
                .with_context(|| format!("Invalid SESSION_QUOTA_BYTES: {}", bytes))?;
            config.session_quota_bytes = Some(bytes);
        }
        if let Some(url) = get("REDIS_URL") {
            config.redis_url = url;
        }
        if let Some(namespace) = get("SESSION_NAMESPACE") {
            config.session_namespace = namespace;
        }
        config.default_language = get("DEFAULT_LANGUAGE");
        config.languages_config = get("LANGUAGES_CONFIG").map(PathBuf::from);

        Ok(config)
    }

    /// Path of the session file for the file backend
    pub fn session_file(&self) -> PathBuf {
        self.session_dir.join("sessions.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = WorkbenchConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.execution_api_url, "http://localhost:3000/api/execute");
        assert_eq!(config.session_backend, SessionBackendKind::File);
        assert_eq!(config.execution_timeout, None);
        assert_eq!(config.session_file(), PathBuf::from("./.workbench/sessions.json"));
    }

    #[test]
    fn test_overrides() {
        let config = WorkbenchConfig::from_lookup(lookup(&[
            ("EXECUTION_API_URL", "https://sandbox.example/api/execute"),
            ("EXECUTION_API_TOKEN", "t0ken"),
            ("EXECUTION_TIMEOUT_SECS", "20"),
            ("SESSION_BACKEND", "Redis"),
            ("SESSION_NAMESPACE", "cp"),
            ("DEFAULT_LANGUAGE", "Python"),
            ("REDIS_URL", ""),
            ("LANGUAGES_CONFIG", "/etc/workbench/languages.toml"),
            ("SESSION_QUOTA_BYTES", "1048576"),
        ]))
        .unwrap();

        assert_eq!(config.execution_api_url, "https://sandbox.example/api/execute");
        assert_eq!(config.execution_api_token.as_deref(), Some("t0ken"));
        assert_eq!(config.execution_timeout, Some(Duration::from_secs(20)));
        assert_eq!(config.session_backend, SessionBackendKind::Redis);
        assert_eq!(config.session_namespace, "cp");
        assert_eq!(config.default_language.as_deref(), Some("Python"));
        assert_eq!(config.redis_url, "redis://localhost:6379");
        assert_eq!(
            config.languages_config,
            Some(PathBuf::from("/etc/workbench/languages.toml"))
        );
        assert_eq!(config.session_quota_bytes, Some(1_048_576));
    }

    #[test]
    fn test_invalid_values() {
        assert!(WorkbenchConfig::from_lookup(lookup(&[("EXECUTION_TIMEOUT_SECS", "soon")])).is_err());
        assert!(WorkbenchConfig::from_lookup(lookup(&[("SESSION_BACKEND", "cookies")])).is_err());
        assert!(WorkbenchConfig::from_lookup(lookup(&[("SESSION_QUOTA_BYTES", "-1")])).is_err());
    }
}
