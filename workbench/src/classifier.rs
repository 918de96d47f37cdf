//! Result classifier for execution gateway responses
//!
//! Classification order (first match wins):
//! 1. missing `success` flag or `data` payload -> malformed
//! 2. `successful: false` with an `errorMessage` -> backend rejection
//! 3. compile stage with a non-zero exit code -> compile failure
//! 4. run stage -> runtime failure / success / empty success
//! 5. no run stage -> malformed
//!
//! A failed compile must suppress run-stage interpretation, and a backend
//! rejection must short-circuit before either stage is inspected.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::core::{Classification, ExecutionOutcome, RuntimeHint};
use crate::executor::TransportError;

const COMPILE_HINTS: &str = "Common causes:\n\
- Syntax errors such as unbalanced brackets or parentheses\n\
- File or class name mismatch (Java code must declare `public class Main`)\n\
- Missing semicolons or other statement terminators";

const SUCCESS_MARKER: &str = "✓ Program executed successfully";
const EMPTY_SUCCESS_MESSAGE: &str = "✓ Program executed successfully with no output.";
const MALFORMED_MESSAGE: &str = "Unexpected response from the execution service.";
const MISSING_RESULTS_MESSAGE: &str = "Could not find execution results in the response.";
const INPUT_REQUIRED_MESSAGE: &str = "This program reads from standard input, but the Input panel is empty.\n\
Enter the input your program expects and run it again.";

/// Stderr markers that earn a targeted hint, checked in order
const RUNTIME_HINTS: &[(&str, RuntimeHint)] = &[
    ("NoSuchElementException", RuntimeHint::InputShortage),
    ("InputMismatchException", RuntimeHint::InputTypeMismatch),
    ("EOFError", RuntimeHint::InputShortage),
];

/// Top-level gateway response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutionEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<ExecutionPayload>,
}

/// Execution payload. The gateway occasionally wraps it once more under `data`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPayload {
    #[serde(default)]
    pub successful: Option<bool>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub compile: Option<StageResult>,
    #[serde(default)]
    pub run: Option<StageResult>,
    #[serde(default)]
    pub data: Option<Box<ExecutionPayload>>,
}

/// Output of one sandbox stage (compile or run)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StageResult {
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub signal: Option<String>,
}

impl StageResult {
    fn stdout(&self) -> &str {
        self.stdout.as_deref().unwrap_or("")
    }

    fn stderr(&self) -> &str {
        self.stderr.as_deref().unwrap_or("")
    }

    /// A missing exit code counts as failure
    fn exited_cleanly(&self) -> bool {
        self.code == Some(0)
    }
}

/// Payload after resolving the optional second `data` layer
#[derive(Debug, Clone, Copy)]
pub enum GatewayPayload<'a> {
    Direct(&'a ExecutionPayload),
    DoubleWrapped(&'a ExecutionPayload),
}

impl<'a> GatewayPayload<'a> {
    pub fn payload(&self) -> &'a ExecutionPayload {
        match *self {
            GatewayPayload::Direct(p) | GatewayPayload::DoubleWrapped(p) => p,
        }
    }
}

impl ExecutionPayload {
    /// Use the nested payload when this layer has no run stage but wraps another
    pub fn unwrap_gateway(&self) -> GatewayPayload<'_> {
        match (&self.run, &self.data) {
            (None, Some(inner)) => GatewayPayload::DoubleWrapped(inner),
            _ => GatewayPayload::Direct(self),
        }
    }
}

/// Classify a raw JSON body from the execution client
pub fn classify(body: &serde_json::Value) -> Classification {
    match ExecutionEnvelope::deserialize(body) {
        Ok(envelope) => classify_envelope(&envelope),
        Err(e) => {
            warn!("Unparseable execution response: {}", e);
            malformed(MALFORMED_MESSAGE)
        }
    }
}

pub fn classify_envelope(envelope: &ExecutionEnvelope) -> Classification {
    let data = match (envelope.success, &envelope.data) {
        (true, Some(data)) => data,
        _ => {
            warn!(
                "Execution response without success flag or data: success={}, has_data={}",
                envelope.success,
                envelope.data.is_some()
            );
            return malformed(MALFORMED_MESSAGE);
        }
    };

    let layer = data.unwrap_gateway();
    if let GatewayPayload::DoubleWrapped(_) = layer {
        debug!("Unwrapping double-wrapped execution payload");
    }
    let payload = layer.payload();

    if payload.successful == Some(false) {
        if let Some(message) = payload.error_message.as_deref().filter(|m| !m.is_empty()) {
            return Classification::new(
                ExecutionOutcome::BackendRejected {
                    message: message.to_string(),
                },
                message,
            );
        }
    }

    let mut transcript = Transcript::default();

    if let Some(compile) = &payload.compile {
        let stderr_title = if compile.exited_cleanly() {
            "Compiler warnings:"
        } else {
            "Compilation error:"
        };
        transcript.section(stderr_title, compile.stderr());
        transcript.section("Compiler output:", compile.stdout());

        if !compile.exited_cleanly() {
            transcript.line(&exit_description("Compilation", compile));
            transcript.line(COMPILE_HINTS);
            return Classification::new(
                ExecutionOutcome::CompileFailure {
                    stderr: compile.stderr().to_string(),
                    stdout: compile.stdout().to_string(),
                    exit_code: compile.code,
                },
                transcript.finish(),
            );
        }
    }

    let Some(run) = &payload.run else {
        warn!("Execution response has no run stage");
        transcript.line(MISSING_RESULTS_MESSAGE);
        return Classification::new(ExecutionOutcome::MalformedResponse, transcript.finish());
    };

    if !run.stderr().is_empty() {
        let hint = runtime_hint(run.stderr());
        transcript.section("Output:", run.stdout());
        transcript.section("Runtime error:", run.stderr());
        if let Some(hint) = hint {
            transcript.line(hint.message());
        }
        return Classification::new(
            ExecutionOutcome::RuntimeFailure {
                stderr: run.stderr().to_string(),
                stdout: run.stdout().to_string(),
                exit_code: run.code,
                hint,
            },
            transcript.finish(),
        );
    }

    if !run.stdout().is_empty() && run.exited_cleanly() {
        transcript.line(run.stdout().trim_end_matches('\n'));
        transcript.line(SUCCESS_MARKER);
        return Classification::new(
            ExecutionOutcome::Success {
                stdout: run.stdout().to_string(),
            },
            transcript.finish(),
        );
    }

    if !run.exited_cleanly() {
        transcript.section("Output:", run.stdout());
        transcript.line(&exit_description("Program", run));
        return Classification::new(
            ExecutionOutcome::RuntimeFailure {
                stderr: String::new(),
                stdout: run.stdout().to_string(),
                exit_code: run.code,
                hint: None,
            },
            transcript.finish(),
        );
    }

    transcript.line(EMPTY_SUCCESS_MESSAGE);
    Classification::new(ExecutionOutcome::EmptySuccess, transcript.finish())
}

/// Outcome for a failed transport call; the message is shown verbatim
pub fn transport_failure(error: &TransportError) -> Classification {
    let message = error.to_string();
    Classification::new(
        ExecutionOutcome::TransportError {
            message: message.clone(),
        },
        message,
    )
}

/// Outcome for a run blocked before submission
pub fn input_required() -> Classification {
    Classification::new(ExecutionOutcome::InputRequired, INPUT_REQUIRED_MESSAGE)
}

fn malformed(message: &str) -> Classification {
    Classification::new(ExecutionOutcome::MalformedResponse, message)
}

fn runtime_hint(stderr: &str) -> Option<RuntimeHint> {
    RUNTIME_HINTS
        .iter()
        .find(|(marker, _)| stderr.contains(marker))
        .map(|(_, hint)| *hint)
}

fn exit_description(what: &str, stage: &StageResult) -> String {
    match (stage.code, stage.signal.as_deref()) {
        (Some(code), _) => format!("{} exited with code {}", what, code),
        (None, Some(signal)) => format!("{} terminated by signal {}", what, signal),
        (None, None) => format!("{} exited without an exit code", what),
    }
}

/// Transcript text, built as blank-line separated blocks
#[derive(Debug, Default)]
struct Transcript {
    blocks: Vec<String>,
}

impl Transcript {
    fn section(&mut self, title: &str, body: &str) {
        if !body.is_empty() {
            self.blocks
                .push(format!("{}\n{}", title, body.trim_end_matches('\n')));
        }
    }

    fn line(&mut self, text: &str) {
        self.blocks.push(text.to_string());
    }

    fn finish(self) -> String {
        self.blocks.join("\n\n")
    }
}
