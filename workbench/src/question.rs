//! Question detail as served by the question API
//!
//! Only the parts the workbench needs: the subject id and the per-language
//! starter snippets used when no edit session is persisted.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::languages::LanguageRegistry;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDetail {
    pub id: String,
    #[serde(default)]
    pub code_snippets: Vec<CodeSnippet>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSnippet {
    pub language: String,
    pub code: String,
}

impl QuestionDetail {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code_snippets: Vec::new(),
        }
    }

    pub fn with_snippet(mut self, language: impl Into<String>, code: impl Into<String>) -> Self {
        self.code_snippets.push(CodeSnippet {
            language: language.into(),
            code: code.into(),
        });
        self
    }

    /// Snippets keyed by catalog display name. Snippet language names are free-form
    /// ("python3", "cpp"), so they go through the fuzzy matcher; unmatched names and
    /// empty snippets are dropped, and the first snippet per language wins.
    pub fn starter_snippets(&self, registry: &LanguageRegistry) -> HashMap<String, String> {
        let mut snippets = HashMap::new();

        for snippet in &self.code_snippets {
            if snippet.code.trim().is_empty() {
                continue;
            }
            let (language, strategy) = registry.resolve(&snippet.language);
            if strategy == crate::languages::MatchStrategy::Default {
                debug!(
                    "Question {}: no language for snippet {:?}",
                    self.id, snippet.language
                );
                continue;
            }
            snippets
                .entry(language.display_name.clone())
                .or_insert_with(|| snippet.code.clone());
        }

        snippets
    }
}
