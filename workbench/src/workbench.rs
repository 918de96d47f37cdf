//! Workbench controller - one editing session over one subject
//!
//! This module handles:
//! - Language selection with per-language code and stdin restore
//! - Persisting edits through the session store
//! - Gating runs on the stdin probe, submitting, and classifying the result
//! - Reset to starter code
//!
//! Editor state sits behind a mutex that is never held across an await. A run
//! records the generation it started in; a language switch or reset bumps the
//! generation so that a late result is returned to its caller but never shown.
//! The phase stays `Submitting` for as long as a run is outstanding.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::classifier;
use crate::core::Classification;
use crate::detector;
use crate::executor::{ExecutionClient, ExecutionRequest};
use crate::languages::{LanguageDescriptor, LanguageRegistry};
use crate::question::QuestionDetail;
use crate::session::{SessionKind, SessionStore};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkbenchError {
    #[error("A run is already in progress")]
    RunInFlight,
}

/// Run lifecycle as seen by the output panel
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Idle,
    Submitting,
    Resolved(Classification),
}

/// Copy of the editor state at one instant
#[derive(Debug, Clone)]
pub struct WorkbenchSnapshot {
    pub language: LanguageDescriptor,
    pub code: String,
    pub input: String,
    pub phase: Phase,
}

struct EditorState {
    language: LanguageDescriptor,
    code: String,
    input: String,
    phase: Phase,
    generation: u64,
    in_flight: bool,
}

pub struct Workbench {
    subject_id: String,
    registry: Arc<LanguageRegistry>,
    store: Arc<SessionStore>,
    client: Arc<dyn ExecutionClient>,
    /// Question-provided starter code keyed by display name
    snippets: HashMap<String, String>,
    state: Mutex<EditorState>,
}

impl Workbench {
    /// Open a workbench on `question`, starting in the language that best matches
    /// `language_name`. Persisted code and input for that pair are restored.
    pub async fn open(
        question: &QuestionDetail,
        language_name: &str,
        registry: Arc<LanguageRegistry>,
        store: Arc<SessionStore>,
        client: Arc<dyn ExecutionClient>,
    ) -> Self {
        let (language, strategy) = registry.resolve(language_name);
        let language = language.clone();
        let snippets = question.starter_snippets(&registry);

        info!(
            "Opening workbench: subject={}, language={} ({:?} match for {:?})",
            question.id, language.display_name, strategy, language_name
        );

        let workbench = Self {
            subject_id: question.id.clone(),
            registry,
            store,
            client,
            snippets,
            state: Mutex::new(EditorState {
                language: language.clone(),
                code: String::new(),
                input: String::new(),
                phase: Phase::Idle,
                generation: 0,
                in_flight: false,
            }),
        };

        let (code, input) = workbench.load_session(&language).await;
        {
            let mut state = workbench.state();
            state.code = code;
            state.input = input;
        }
        workbench
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn snapshot(&self) -> WorkbenchSnapshot {
        let state = self.state();
        WorkbenchSnapshot {
            language: state.language.clone(),
            code: state.code.clone(),
            input: state.input.clone(),
            phase: state.phase.clone(),
        }
    }

    pub fn language(&self) -> LanguageDescriptor {
        self.state().language.clone()
    }

    pub fn code(&self) -> String {
        self.state().code.clone()
    }

    pub fn input(&self) -> String {
        self.state().input.clone()
    }

    pub fn phase(&self) -> Phase {
        self.state().phase.clone()
    }

    /// Code a fresh session starts with: the question's snippet, else the catalog template
    pub fn starter_code(&self, language: &LanguageDescriptor) -> String {
        self.snippets
            .get(&language.display_name)
            .cloned()
            .unwrap_or_else(|| language.default_code_template.clone())
    }

    /// Switch languages. The outgoing pair's code and input are persisted before the
    /// incoming pair is loaded; any shown outcome is cleared.
    pub async fn select_language(&self, language: &LanguageDescriptor) {
        let (outgoing, code, input) = {
            let state = self.state();
            (state.language.clone(), state.code.clone(), state.input.clone())
        };

        self.persist_code(&outgoing, &code).await;
        self.store
            .save(&self.subject_id, &outgoing.display_name, SessionKind::Input, &input)
            .await;

        let (code, input) = self.load_session(language).await;

        let mut state = self.state();
        state.language = language.clone();
        state.code = code;
        state.input = input;
        state.phase = if state.in_flight { Phase::Submitting } else { Phase::Idle };
        state.generation += 1;

        info!(
            "Language switched: subject={}, {} -> {}",
            self.subject_id, outgoing.display_name, language.display_name
        );
    }

    /// Switch languages by free-form name, resolved through the fuzzy matcher
    pub async fn select_language_by_name(&self, name: &str) -> LanguageDescriptor {
        let language = self.registry.find_by_fuzzy_name(name).clone();
        self.select_language(&language).await;
        language
    }

    pub async fn edit_code(&self, code: impl Into<String>) {
        let code = code.into();
        let language = {
            let mut state = self.state();
            if state.code == code {
                return;
            }
            state.code = code.clone();
            if matches!(state.phase, Phase::Resolved(_)) {
                state.phase = Phase::Idle;
            }
            state.language.clone()
        };

        self.persist_code(&language, &code).await;
    }

    pub async fn edit_input(&self, input: impl Into<String>) {
        let input = input.into();
        let language = {
            let mut state = self.state();
            if state.input == input {
                return;
            }
            state.input = input.clone();
            if matches!(state.phase, Phase::Resolved(_)) {
                state.phase = Phase::Idle;
            }
            state.language.clone()
        };

        self.store
            .save(&self.subject_id, &language.display_name, SessionKind::Input, &input)
            .await;
    }

    /// Run the current code against the current input.
    ///
    /// Code that reads stdin with an empty input box resolves to `InputRequired`
    /// without contacting the gateway. A second run while one is outstanding is
    /// refused. If the returned future is dropped mid-run the workbench goes back
    /// to `Idle` and accepts new runs.
    pub async fn run(&self) -> Result<Classification, WorkbenchError> {
        let (request, generation) = {
            let mut state = self.state();
            if state.in_flight {
                return Err(WorkbenchError::RunInFlight);
            }

            if let Some(probe) = detector::matching_probe(&state.code) {
                if state.input.trim().is_empty() {
                    info!(
                        "Run blocked: subject={}, language={}, probe={}",
                        self.subject_id, state.language.display_name, probe
                    );
                    let classification = classifier::input_required();
                    state.phase = Phase::Resolved(classification.clone());
                    return Ok(classification);
                }
            }

            state.in_flight = true;
            state.phase = Phase::Submitting;
            (
                ExecutionRequest::new(&state.language, state.code.clone(), state.input.clone()),
                state.generation,
            )
        };

        info!(
            "Run submitted: subject={}, language={}",
            self.subject_id, request.language_executor_id
        );

        let mut guard = InFlightGuard {
            state: &self.state,
            generation,
            armed: true,
        };

        let classification = match self.client.execute(&request).await {
            Ok(body) => classifier::classify(&body),
            Err(e) => {
                warn!("Run transport failed: subject={}: {}", self.subject_id, e);
                classifier::transport_failure(&e)
            }
        };
        guard.armed = false;

        let mut state = self.state();
        state.in_flight = false;
        if state.generation == generation {
            state.phase = Phase::Resolved(classification.clone());
        } else {
            state.phase = Phase::Idle;
            debug!(
                "Discarding stale result: subject={}, started in generation {}",
                self.subject_id, generation
            );
        }

        info!(
            "Run resolved: subject={}, outcome={}",
            self.subject_id, classification.outcome
        );
        Ok(classification)
    }

    /// Restore starter code, clear input and outcome, and drop the persisted pair
    pub async fn reset(&self) {
        let language = {
            let mut state = self.state();
            let language = state.language.clone();
            state.code = self.starter_code(&language);
            state.input.clear();
            state.phase = if state.in_flight { Phase::Submitting } else { Phase::Idle };
            state.generation += 1;
            language
        };

        self.store.clear(&self.subject_id, &language.display_name).await;
        info!(
            "Workbench reset: subject={}, language={}",
            self.subject_id, language.display_name
        );
    }

    async fn load_session(&self, language: &LanguageDescriptor) -> (String, String) {
        let code = self
            .store
            .load(&self.subject_id, &language.display_name, SessionKind::Code)
            .await
            .unwrap_or_else(|| self.starter_code(language));
        let input = self
            .store
            .load(&self.subject_id, &language.display_name, SessionKind::Input)
            .await
            .unwrap_or_default();
        (code, input)
    }

    /// Unedited starter code is never persisted
    async fn persist_code(&self, language: &LanguageDescriptor, code: &str) {
        if code == self.starter_code(language) {
            self.store
                .remove(&self.subject_id, &language.display_name, SessionKind::Code)
                .await;
        } else {
            self.store
                .save(&self.subject_id, &language.display_name, SessionKind::Code, code)
                .await;
        }
    }

    fn state(&self) -> MutexGuard<'_, EditorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Releases the in-flight flag when a run future is dropped before completing
struct InFlightGuard<'a> {
    state: &'a Mutex<EditorState>,
    generation: u64,
    armed: bool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.in_flight = false;
        if state.phase == Phase::Submitting {
            state.phase = Phase::Idle;
        }
        debug!("Run cancelled before completion: generation={}", self.generation);
    }
}
