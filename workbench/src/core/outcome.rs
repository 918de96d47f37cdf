use serde::{Deserialize, Serialize};
use std::fmt;

/// Targeted hint attached to a runtime failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHint {
    /// The program read past the end of the provided input
    InputShortage,
    /// The program read a token of the wrong type
    InputTypeMismatch,
}

impl RuntimeHint {
    pub fn message(&self) -> &'static str {
        match self {
            RuntimeHint::InputShortage => {
                "Hint: the program expected more input than provided. Check the Input panel."
            }
            RuntimeHint::InputTypeMismatch => {
                "Hint: input type mismatch. The program read a value of a different type than it expected."
            }
        }
    }
}

/// Result of a single submission. Exactly one is produced per `run()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// The program reads stdin but no input was provided; nothing was sent
    InputRequired,
    /// The gateway itself rejected the job
    BackendRejected { message: String },
    CompileFailure {
        stderr: String,
        stdout: String,
        exit_code: Option<i64>,
    },
    RuntimeFailure {
        stderr: String,
        stdout: String,
        exit_code: Option<i64>,
        hint: Option<RuntimeHint>,
    },
    Success { stdout: String },
    EmptySuccess,
    TransportError { message: String },
    MalformedResponse,
}

/// Panel expanded after an outcome is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Panel {
    Input,
    Output,
}

impl ExecutionOutcome {
    pub fn expanded_panel(&self) -> Panel {
        match self {
            ExecutionOutcome::InputRequired => Panel::Input,
            _ => Panel::Output,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ExecutionOutcome::Success { .. } | ExecutionOutcome::EmptySuccess
        )
    }
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionOutcome::InputRequired => "input_required",
            ExecutionOutcome::BackendRejected { .. } => "backend_rejected",
            ExecutionOutcome::CompileFailure { .. } => "compile_failure",
            ExecutionOutcome::RuntimeFailure { .. } => "runtime_failure",
            ExecutionOutcome::Success { .. } => "success",
            ExecutionOutcome::EmptySuccess => "empty_success",
            ExecutionOutcome::TransportError { .. } => "transport_error",
            ExecutionOutcome::MalformedResponse => "malformed_response",
        };
        write!(f, "{}", s)
    }
}

/// Outcome plus the text rendered in the output panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub outcome: ExecutionOutcome,
    pub transcript: String,
}

impl Classification {
    pub fn new(outcome: ExecutionOutcome, transcript: impl Into<String>) -> Self {
        Self {
            outcome,
            transcript: transcript.into(),
        }
    }

    pub fn expanded_panel(&self) -> Panel {
        self.outcome.expanded_panel()
    }
}
