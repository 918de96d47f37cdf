//! Execution client - transport to the remote sandbox
//!
//! This module provides:
//! - `ExecutionRequest`: what one run submits
//! - `ExecutionClient`: the transport seam (`HttpExecutionClient` in production)
//!
//! The execution client does NOT:
//! - Interpret compile/run results (that's the classifier's job)
//! - Retry submissions (runs are user-initiated and not idempotent)
//! - Enforce its own timeout

pub mod http;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::languages::LanguageDescriptor;

/// One submission to the sandbox. Built fresh per run, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub language_executor_id: String,
    pub executor_version: String,
    pub source_file: String,
    pub source_code: String,
    pub stdin: String,
}

impl ExecutionRequest {
    pub fn new(
        language: &LanguageDescriptor,
        source_code: impl Into<String>,
        stdin: impl Into<String>,
    ) -> Self {
        Self {
            language_executor_id: language.executor_id.clone(),
            executor_version: language.executor_version.clone(),
            source_file: language.source_file.clone(),
            source_code: source_code.into(),
            stdin: stdin.into(),
        }
    }

    /// Body in the shape the gateway expects
    pub fn to_wire(&self) -> WireRequest<'_> {
        WireRequest {
            language: &self.language_executor_id,
            version: &self.executor_version,
            files: vec![WireFile {
                name: &self.source_file,
                content: &self.source_code,
            }],
            stdin: &self.stdin,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WireRequest<'a> {
    pub language: &'a str,
    pub version: &'a str,
    pub files: Vec<WireFile<'a>>,
    pub stdin: &'a str,
}

#[derive(Debug, Serialize)]
pub struct WireFile<'a> {
    pub name: &'a str,
    pub content: &'a str,
}

/// Transport-level failure. The message is shown to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Execution service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Execution service returned an empty response")]
    EmptyBody,
    #[error("Execution service returned invalid JSON: {0}")]
    InvalidBody(String),
}

/// Transport to the external sandbox
#[async_trait]
pub trait ExecutionClient: Send + Sync {
    /// Submit a run and return the parsed JSON body
    async fn execute(&self, request: &ExecutionRequest) -> Result<serde_json::Value, TransportError>;
}

// Re-exports
pub use http::HttpExecutionClient;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::LanguageRegistry;

    #[test]
    fn test_request_from_descriptor() {
        let registry = LanguageRegistry::builtin().unwrap();
        let java = registry.find_by_exact_name("Java").unwrap();
        let request = ExecutionRequest::new(java, "class Main {}", "1 2");

        assert_eq!(request.language_executor_id, "java");
        assert_eq!(request.executor_version, "15.0.2");
        assert_eq!(request.source_file, "Main.java");
    }

    #[test]
    fn test_wire_shape() {
        let registry = LanguageRegistry::builtin().unwrap();
        let python = registry.find_by_exact_name("Python").unwrap();
        let request = ExecutionRequest::new(python, "print(input())", "hi\n");

        let json = serde_json::to_value(request.to_wire()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "language": "python",
                "version": "3.10.0",
                "files": [{ "name": "main.py", "content": "print(input())" }],
                "stdin": "hi\n",
            })
        );
    }
}
