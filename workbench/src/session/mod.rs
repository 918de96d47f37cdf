//! Session store - per (subject, language) code and stdin persistence
//!
//! This module handles:
//! - Composite key construction (`<namespace>_<subject>_<language>_<code|input>`)
//! - Skipping untouched boilerplate on save
//! - Degrading to memory when the durable backend fails
//!
//! The session store does NOT:
//! - Own editor state (the workbench controller does)
//! - Persist execution outcomes

pub mod backend;
pub mod redis_backend;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::config::{SessionBackendKind, WorkbenchConfig};
use crate::languages::{LanguageRegistry, KEY_SEPARATOR};

pub use backend::{FileBackend, SessionBackend, StoreError};
pub use redis_backend::RedisBackend;

/// Which half of an edit session a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    Code,
    Input,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Code => "code",
            SessionKind::Input => "input",
        }
    }
}

/// Keyed persistence of edit sessions, shared by every workbench instance
pub struct SessionStore {
    namespace: String,
    registry: Arc<LanguageRegistry>,
    backend: Option<Box<dyn SessionBackend>>,
    /// Write-through copy of everything seen; the only source once degraded
    mirror: Mutex<HashMap<String, String>>,
    degraded: AtomicBool,
}

impl SessionStore {
    pub fn new(
        namespace: impl Into<String>,
        registry: Arc<LanguageRegistry>,
        backend: Box<dyn SessionBackend>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            registry,
            backend: Some(backend),
            mirror: Mutex::new(HashMap::new()),
            degraded: AtomicBool::new(false),
        }
    }

    /// Store without durable backing; sessions last as long as the process
    pub fn in_memory(namespace: impl Into<String>, registry: Arc<LanguageRegistry>) -> Self {
        Self {
            namespace: namespace.into(),
            registry,
            backend: None,
            mirror: Mutex::new(HashMap::new()),
            degraded: AtomicBool::new(false),
        }
    }

    /// Build the configured store. A backend that cannot be reached yields a memory store.
    pub async fn from_config(config: &WorkbenchConfig, registry: Arc<LanguageRegistry>) -> Self {
        let namespace = config.session_namespace.clone();
        match config.session_backend {
            SessionBackendKind::Memory => {
                info!("Session store: memory");
                Self::in_memory(namespace, registry)
            }
            SessionBackendKind::File => {
                let path = config.session_file();
                info!("Session store: file {:?}", path);
                let mut backend = FileBackend::new(path);
                if let Some(quota) = config.session_quota_bytes {
                    backend = backend.with_quota(quota);
                }
                Self::new(namespace, registry, Box::new(backend))
            }
            SessionBackendKind::Redis => match RedisBackend::connect(&config.redis_url).await {
                Ok(backend) => {
                    info!("Session store: redis {}", config.redis_url);
                    Self::new(namespace, registry, Box::new(backend))
                }
                Err(e) => {
                    warn!(
                        "Session store: redis unavailable ({}), sessions will not survive restarts",
                        e
                    );
                    let store = Self::in_memory(namespace, registry);
                    store.degraded.store(true, Ordering::Relaxed);
                    store
                }
            },
        }
    }

    /// Deterministic composite key. Language names never contain the separator and
    /// the kind is a fixed suffix, so distinct triples never share a key.
    pub fn key_for(&self, subject_id: &str, language_name: &str, kind: SessionKind) -> String {
        format!(
            "{ns}{sep}{subject}{sep}{language}{sep}{kind}",
            ns = self.namespace,
            sep = KEY_SEPARATOR,
            subject = subject_id,
            language = language_name,
            kind = kind.as_str(),
        )
    }

    /// Whether a backend failure has switched the store to memory-only operation
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    pub async fn load(&self, subject_id: &str, language_name: &str, kind: SessionKind) -> Option<String> {
        let key = self.key_for(subject_id, language_name, kind);

        if let Some(backend) = self.active_backend() {
            match backend.get(&key).await {
                Ok(value) => {
                    let mut mirror = self.mirror();
                    match &value {
                        Some(v) => {
                            mirror.insert(key, v.clone());
                        }
                        None => {
                            mirror.remove(&key);
                        }
                    }
                    return value;
                }
                Err(e) => self.degrade("load", &e),
            }
        }

        self.mirror().get(&key).cloned()
    }

    /// Overwrite a value. Code identical to the language template is not persisted,
    /// and replaces any earlier edit for the pair.
    pub async fn save(&self, subject_id: &str, language_name: &str, kind: SessionKind, value: &str) {
        if kind == SessionKind::Code && self.is_template(language_name, value) {
            debug!(
                "Skipping boilerplate save for subject={}, language={}",
                subject_id, language_name
            );
            self.remove(subject_id, language_name, kind).await;
            return;
        }

        let key = self.key_for(subject_id, language_name, kind);
        self.mirror().insert(key.clone(), value.to_string());

        if let Some(backend) = self.active_backend() {
            if let Err(e) = backend.set(&key, value).await {
                self.degrade("save", &e);
            }
        }
    }

    /// Remove a single entry
    pub async fn remove(&self, subject_id: &str, language_name: &str, kind: SessionKind) {
        let key = self.key_for(subject_id, language_name, kind);
        self.mirror().remove(&key);

        if let Some(backend) = self.active_backend() {
            if let Err(e) = backend.remove(&key).await {
                self.degrade("remove", &e);
            }
        }
    }

    /// Remove both the code and input entries for a (subject, language) pair
    pub async fn clear(&self, subject_id: &str, language_name: &str) {
        self.remove(subject_id, language_name, SessionKind::Code).await;
        self.remove(subject_id, language_name, SessionKind::Input).await;
    }

    fn is_template(&self, language_name: &str, value: &str) -> bool {
        self.registry
            .find_by_exact_name(language_name)
            .map(|l| l.default_code_template == value)
            .unwrap_or(false)
    }

    fn active_backend(&self) -> Option<&dyn SessionBackend> {
        if self.is_degraded() {
            return None;
        }
        self.backend.as_deref()
    }

    fn degrade(&self, operation: &str, error: &StoreError) {
        if !self.degraded.swap(true, Ordering::Relaxed) {
            warn!(
                "Session {} failed: {}. Continuing with in-memory sessions only",
                operation, error
            );
        }
    }

    fn mirror(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.mirror.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// Backend that works for `healthy_ops` calls and then fails every call
    struct FlakyBackend {
        inner: Mutex<HashMap<String, String>>,
        calls: AtomicUsize,
        healthy_ops: usize,
    }

    impl FlakyBackend {
        fn new(healthy_ops: usize) -> Self {
            Self {
                inner: Mutex::new(HashMap::new()),
                calls: AtomicUsize::new(0),
                healthy_ops,
            }
        }

        fn check(&self) -> Result<(), StoreError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) >= self.healthy_ops {
                return Err(StoreError::QuotaExceeded { size: 1, quota: 0 });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl SessionBackend for FlakyBackend {
        async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.check()?;
            Ok(self.inner.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            self.check()?;
            self.inner.lock().unwrap().insert(key.into(), value.into());
            Ok(())
        }

        async fn remove(&self, key: &str) -> Result<(), StoreError> {
            self.check()?;
            self.inner.lock().unwrap().remove(key);
            Ok(())
        }
    }

    fn registry() -> Arc<LanguageRegistry> {
        LanguageRegistry::builtin().unwrap()
    }

    #[test]
    fn test_key_format() {
        let store = SessionStore::in_memory("ws", registry());
        assert_eq!(store.key_for("42", "C++", SessionKind::Code), "ws_42_C++_code");
        assert_eq!(store.key_for("42", "C++", SessionKind::Input), "ws_42_C++_input");
    }

    #[test]
    fn test_keys_do_not_collide() {
        let store = SessionStore::in_memory("ws", registry());
        let registry = registry();
        let subjects = ["1", "1_2", "approach_1", "12"];

        let mut keys = std::collections::HashSet::new();
        for subject in subjects {
            for lang in registry.languages() {
                for kind in [SessionKind::Code, SessionKind::Input] {
                    assert!(keys.insert(store.key_for(subject, &lang.display_name, kind)));
                }
            }
        }
    }

    #[tokio::test]
    async fn test_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(
            "ws",
            registry(),
            Box::new(FileBackend::new(dir.path().join("sessions.json"))),
        );

        store.save("q1", "Python", SessionKind::Code, "x = 1").await;
        store.save("q1", "Python", SessionKind::Input, "5\n").await;
        assert_eq!(store.load("q1", "Python", SessionKind::Code).await.as_deref(), Some("x = 1"));
        assert_eq!(store.load("q1", "Python", SessionKind::Input).await.as_deref(), Some("5\n"));

        store.save("q1", "Java", SessionKind::Code, "class Main {}").await;
        store.clear("q1", "Python").await;
        assert_eq!(store.load("q1", "Python", SessionKind::Code).await, None);
        assert_eq!(store.load("q1", "Python", SessionKind::Input).await, None);
        assert_eq!(
            store.load("q1", "Java", SessionKind::Code).await.as_deref(),
            Some("class Main {}")
        );
    }

    #[tokio::test]
    async fn test_template_is_not_persisted() {
        let registry = registry();
        let template = registry
            .find_by_exact_name("Python")
            .unwrap()
            .default_code_template
            .clone();
        let store = SessionStore::in_memory("ws", registry);

        store.save("q1", "Python", SessionKind::Code, &template).await;
        assert_eq!(store.load("q1", "Python", SessionKind::Code).await, None);

        store.save("q1", "Python", SessionKind::Code, "edited").await;
        store.save("q1", "Python", SessionKind::Code, &template).await;
        assert_eq!(store.load("q1", "Python", SessionKind::Code).await, None);

        // input equal to a template is still input
        store.save("q1", "Python", SessionKind::Input, &template).await;
        assert!(store.load("q1", "Python", SessionKind::Input).await.is_some());
    }

    #[tokio::test]
    async fn test_backend_failure_degrades_to_memory() {
        let store = SessionStore::new("ws", registry(), Box::new(FlakyBackend::new(1)));

        store.save("q1", "Go", SessionKind::Code, "package main").await;
        assert!(!store.is_degraded());

        store.save("q1", "Go", SessionKind::Input, "1 2").await;
        assert!(store.is_degraded());

        assert_eq!(store.load("q1", "Go", SessionKind::Code).await.as_deref(), Some("package main"));
        assert_eq!(store.load("q1", "Go", SessionKind::Input).await.as_deref(), Some("1 2"));

        store.clear("q1", "Go").await;
        assert_eq!(store.load("q1", "Go", SessionKind::Code).await, None);
    }

    #[tokio::test]
    async fn test_configured_quota_degrades_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = WorkbenchConfig {
            session_dir: dir.path().to_path_buf(),
            session_quota_bytes: Some(64),
            ..WorkbenchConfig::default()
        };
        let store = SessionStore::from_config(&config, registry()).await;

        store.save("q1", "Python", SessionKind::Code, "x = 1").await;
        assert!(!store.is_degraded());

        let big = "y = 2\n".repeat(32);
        store.save("q1", "Python", SessionKind::Code, &big).await;
        assert!(store.is_degraded());
        assert_eq!(store.load("q1", "Python", SessionKind::Code).await.as_deref(), Some(big.as_str()));
    }

    #[tokio::test]
    async fn test_unreachable_redis_yields_memory_store() {
        let config = WorkbenchConfig {
            session_backend: SessionBackendKind::Redis,
            redis_url: "redis://127.0.0.1:1".into(),
            ..WorkbenchConfig::default()
        };
        let store = SessionStore::from_config(&config, registry()).await;
        assert!(store.is_degraded());

        store.save("q1", "Rust", SessionKind::Code, "fn main() {}").await;
        assert_eq!(
            store.load("q1", "Rust", SessionKind::Code).await.as_deref(),
            Some("fn main() {}")
        );
    }
}
