//! Code-execution workbench
//!
//! Edit a snippet per (subject, language), run it against a remote sandbox, and
//! read back a classified result.

pub mod classifier;
pub mod config;
pub mod core;
pub mod detector;
pub mod executor;
pub mod languages;
pub mod question;
pub mod session;
pub mod workbench;

pub use config::WorkbenchConfig;
pub use core::{Classification, ExecutionOutcome, Panel, RuntimeHint};
pub use executor::{ExecutionClient, ExecutionRequest, HttpExecutionClient, TransportError};
pub use languages::{LanguageDescriptor, LanguageRegistry, MatchStrategy};
pub use question::QuestionDetail;
pub use session::{SessionKind, SessionStore};
pub use workbench::{Phase, Workbench, WorkbenchError, WorkbenchSnapshot};
