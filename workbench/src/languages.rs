//! Language registry for the workbench
//!
//! The catalog lives in `files/languages.toml` and is embedded at build time.
//! Catalog order is significant: the first entry is the default language and
//! fuzzy lookups that match several entries resolve to the earliest one.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use anyhow::{bail, Context};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::WorkbenchConfig;

/// Separator used in persisted session keys. Display names may not contain it.
pub const KEY_SEPARATOR: char = '_';

/// Immutable description of a supported language
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageDescriptor {
    /// Name shown in the language picker (e.g., "C++")
    pub display_name: String,
    /// Runtime identifier understood by the execution gateway (e.g., "c++")
    pub executor_id: String,
    /// Runtime version understood by the execution gateway (e.g., "10.2.0")
    pub executor_version: String,
    /// Editor syntax-highlighting mode
    pub syntax_id: String,
    /// File extension without the leading dot
    pub file_extension: String,
    /// Name of the source file sent to the gateway (e.g., "Main.java")
    pub source_file: String,
    /// Starter code shipped for this language
    pub default_code_template: String,
    /// Lowercase alternative names ("js", "golang", ...)
    pub aliases: Vec<String>,
}

/// Raw TOML configuration for a language
#[derive(Debug, Deserialize)]
struct RawLanguageConfig {
    display_name: String,
    executor_id: String,
    executor_version: String,
    syntax_id: String,
    file_extension: String,
    source_file: Option<String>,
    template: String,
    #[serde(default)]
    aliases: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawCatalog {
    #[serde(default)]
    language: Vec<RawLanguageConfig>,
}

/// Strategy that produced a fuzzy lookup result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    Exact,
    Substring,
    Alias,
    Default,
}

type Matcher = fn(&LanguageRegistry, &str) -> Option<usize>;

/// Fuzzy matchers in evaluation order. `Default` is applied after all of them fail.
const MATCHERS: &[(MatchStrategy, Matcher)] = &[
    (MatchStrategy::Exact, match_exact),
    (MatchStrategy::Substring, match_substring),
    (MatchStrategy::Alias, match_alias),
];

/// Ordered, immutable catalog of supported languages
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    languages: Vec<LanguageDescriptor>,
    fallback: usize,
}

static BUILTIN: OnceLock<Arc<LanguageRegistry>> = OnceLock::new();

const BUILTIN_CATALOG: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/files/languages.toml"));

impl LanguageRegistry {
    /// The catalog shipped with the crate
    pub fn builtin() -> anyhow::Result<Arc<Self>> {
        if let Some(registry) = BUILTIN.get() {
            return Ok(registry.clone());
        }
        let registry = Arc::new(
            Self::from_toml_str(BUILTIN_CATALOG).context("Invalid built-in language catalog")?,
        );
        Ok(BUILTIN.get_or_init(|| registry).clone())
    }

    /// Load a catalog file in place of the built-in one
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read language catalog: {:?}", path))?;
        let registry = Self::from_toml_str(&content)?;
        info!("Loaded {} languages from {:?}", registry.languages.len(), path);
        Ok(registry)
    }

    /// Catalog selected by configuration, with the configured fallback applied
    pub fn from_config(config: &WorkbenchConfig) -> anyhow::Result<Arc<Self>> {
        let registry = match &config.languages_config {
            Some(path) => Self::from_file(path)?,
            None => (*Self::builtin()?).clone(),
        };
        Ok(Arc::new(match &config.default_language {
            Some(name) => registry.with_fallback(name),
            None => registry,
        }))
    }

    /// Parse a catalog from TOML (`[[language]]` tables, in display order)
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let raw: RawCatalog = toml::from_str(content).context("Failed to parse language catalog")?;

        if raw.language.is_empty() {
            bail!("Language catalog is empty");
        }

        let mut seen = HashSet::new();
        let mut languages = Vec::with_capacity(raw.language.len());

        for entry in raw.language {
            let name = entry.display_name.trim().to_string();
            if name.is_empty() {
                bail!("Language with executor '{}' has no display name", entry.executor_id);
            }
            if name.contains(KEY_SEPARATOR) {
                bail!(
                    "Invalid display name {:?}: must not contain '{}'",
                    name,
                    KEY_SEPARATOR
                );
            }
            if !seen.insert(name.clone()) {
                bail!("Duplicate language: {}", name);
            }
            if entry.executor_id.trim().is_empty() || entry.executor_version.trim().is_empty() {
                bail!("Language {} has no executor id/version", name);
            }

            let source_file = entry
                .source_file
                .unwrap_or_else(|| format!("main.{}", entry.file_extension));

            languages.push(LanguageDescriptor {
                display_name: name,
                executor_id: entry.executor_id,
                executor_version: entry.executor_version,
                syntax_id: entry.syntax_id,
                file_extension: entry.file_extension,
                source_file,
                default_code_template: entry.template,
                aliases: entry
                    .aliases
                    .into_iter()
                    .map(|a| a.trim().to_lowercase())
                    .collect(),
            });
        }

        Ok(Self {
            languages,
            fallback: 0,
        })
    }

    /// Use another catalog entry as the fuzzy-match fallback.
    /// Unknown names leave the first entry in place.
    pub fn with_fallback(mut self, display_name: &str) -> Self {
        match self.position(display_name) {
            Some(idx) => self.fallback = idx,
            None => debug!("Unknown fallback language {:?}, keeping {}", display_name, self.languages[0].display_name),
        }
        self
    }

    /// All languages, in display order
    pub fn languages(&self) -> &[LanguageDescriptor] {
        &self.languages
    }

    /// First catalog entry
    pub fn default_language(&self) -> &LanguageDescriptor {
        &self.languages[0]
    }

    /// Language used when a fuzzy lookup matches nothing
    pub fn fallback_language(&self) -> &LanguageDescriptor {
        &self.languages[self.fallback]
    }

    /// Case-sensitive lookup by display name
    pub fn find_by_exact_name(&self, name: &str) -> Option<&LanguageDescriptor> {
        self.position(name).map(|idx| &self.languages[idx])
    }

    /// Best-effort lookup. Never fails; unmatched names resolve to the fallback language.
    pub fn find_by_fuzzy_name(&self, name: &str) -> &LanguageDescriptor {
        self.resolve(name).0
    }

    /// Fuzzy lookup that also reports which strategy matched
    pub fn resolve(&self, name: &str) -> (&LanguageDescriptor, MatchStrategy) {
        let query = normalize(name);

        if !query.is_empty() {
            for (strategy, matcher) in MATCHERS {
                if let Some(idx) = matcher(self, &query) {
                    return (&self.languages[idx], *strategy);
                }
            }
        }

        debug!("No language matches {:?}, using fallback", name);
        (self.fallback_language(), MatchStrategy::Default)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.languages.iter().position(|l| l.display_name == name)
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Case-insensitive display name equality
pub fn match_exact(registry: &LanguageRegistry, query: &str) -> Option<usize> {
    registry
        .languages
        .iter()
        .position(|l| l.display_name.to_lowercase() == query)
}

/// Containment in either direction. Single-character names only match exactly,
/// otherwise "c" would swallow "cpp" and "cs".
pub fn match_substring(registry: &LanguageRegistry, query: &str) -> Option<usize> {
    if query.chars().count() < 2 {
        return None;
    }
    registry.languages.iter().position(|l| {
        let name = l.display_name.to_lowercase();
        name.chars().count() >= 2 && (name.contains(query) || query.contains(name.as_str()))
    })
}

/// Alias table lookup
pub fn match_alias(registry: &LanguageRegistry, query: &str) -> Option<usize> {
    registry
        .languages
        .iter()
        .position(|l| l.aliases.iter().any(|a| a == query))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Arc<LanguageRegistry> {
        LanguageRegistry::builtin().unwrap()
    }

    #[test]
    fn test_builtin_catalog_order() {
        let registry = registry();
        assert_eq!(registry.default_language().display_name, "JavaScript");
        assert_eq!(registry.languages().len(), 13);

        let java = registry.find_by_exact_name("Java").unwrap();
        assert_eq!(java.executor_id, "java");
        assert_eq!(java.source_file, "Main.java");

        let cpp = registry.find_by_exact_name("C++").unwrap();
        assert_eq!(cpp.source_file, "main.cpp");
        assert!(cpp.default_code_template.contains("#include <iostream>"));
    }

    #[test]
    fn test_exact_name_is_case_sensitive() {
        let registry = registry();
        assert!(registry.find_by_exact_name("Python").is_some());
        assert!(registry.find_by_exact_name("python").is_none());
        assert!(registry.find_by_exact_name("Cobol").is_none());
    }

    #[test]
    fn test_aliases_resolve_to_canonical_language() {
        let registry = registry();
        let cases = [
            ("js", "JavaScript"),
            ("ts", "TypeScript"),
            ("py", "Python"),
            ("cpp", "C++"),
            ("c++", "C++"),
            ("csharp", "C#"),
            ("cs", "C#"),
            ("go", "Go"),
            ("golang", "Go"),
            ("Golang", "Go"),
            ("rs", "Rust"),
        ];
        for (query, expected) in cases {
            assert_eq!(
                registry.find_by_fuzzy_name(query).display_name,
                expected,
                "query {:?}",
                query
            );
        }
    }

    #[test]
    fn test_fuzzy_strategies() {
        let registry = registry();
        assert_eq!(registry.resolve("  PYTHON ").1, MatchStrategy::Exact);
        assert_eq!(registry.resolve("c").0.display_name, "C");

        let (lang, strategy) = registry.resolve("python3.10");
        assert_eq!(lang.display_name, "Python");
        assert_eq!(strategy, MatchStrategy::Substring);

        let (lang, strategy) = registry.resolve("js");
        assert_eq!(lang.display_name, "JavaScript");
        assert_eq!(strategy, MatchStrategy::Alias);
    }

    #[test]
    fn test_unknown_name_falls_back() {
        let registry = registry();
        let (lang, strategy) = registry.resolve("totally-unknown");
        assert_eq!(lang.display_name, "JavaScript");
        assert_eq!(strategy, MatchStrategy::Default);
        assert_eq!(registry.find_by_fuzzy_name("").display_name, "JavaScript");
    }

    #[test]
    fn test_configured_fallback() {
        let registry = (*registry()).clone().with_fallback("Python");
        assert_eq!(registry.find_by_fuzzy_name("cobol").display_name, "Python");
        assert_eq!(registry.default_language().display_name, "JavaScript");

        let unchanged = (*LanguageRegistry::builtin().unwrap()).clone().with_fallback("Cobol");
        assert_eq!(unchanged.fallback_language().display_name, "JavaScript");
    }

    #[test]
    fn test_load_catalog() {
        let registry = LanguageRegistry::from_toml_str(
            r#"
[[language]]
display_name = "Python"
executor_id = "python"
executor_version = "3.10.0"
syntax_id = "python"
file_extension = "py"
aliases = ["PY", "python3"]
template = "print(1)"

[[language]]
display_name = "C"
executor_id = "c"
executor_version = "10.2.0"
syntax_id = "c"
file_extension = "c"
template = "int main() {}"
"#,
        )
        .unwrap();

        assert_eq!(registry.default_language().display_name, "Python");
        assert_eq!(registry.languages()[0].aliases, vec!["py", "python3"]);
        assert_eq!(registry.languages()[1].source_file, "main.c");
    }

    #[test]
    fn test_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("languages.toml");
        std::fs::write(
            &path,
            r#"
[[language]]
display_name = "Ruby"
executor_id = "ruby"
executor_version = "3.0.1"
syntax_id = "ruby"
file_extension = "rb"
template = "puts 1"

[[language]]
display_name = "PHP"
executor_id = "php"
executor_version = "8.2.3"
syntax_id = "php"
file_extension = "php"
template = "<?php"
"#,
        )
        .unwrap();

        let config = WorkbenchConfig {
            languages_config: Some(path),
            default_language: Some("PHP".into()),
            ..WorkbenchConfig::default()
        };
        let registry = LanguageRegistry::from_config(&config).unwrap();
        assert_eq!(registry.languages().len(), 2);
        assert_eq!(registry.find_by_fuzzy_name("perl").display_name, "PHP");

        let missing = WorkbenchConfig {
            languages_config: Some(dir.path().join("missing.toml")),
            ..WorkbenchConfig::default()
        };
        assert!(LanguageRegistry::from_config(&missing).is_err());

        let builtin = LanguageRegistry::from_config(&WorkbenchConfig::default()).unwrap();
        assert_eq!(builtin.fallback_language().display_name, "JavaScript");
    }

    #[test]
    fn test_rejects_invalid_catalogs() {
        assert!(LanguageRegistry::from_toml_str("").is_err());

        let duplicate = r#"
[[language]]
display_name = "C"
executor_id = "c"
executor_version = "1"
syntax_id = "c"
file_extension = "c"
template = ""

[[language]]
display_name = "C"
executor_id = "c"
executor_version = "2"
syntax_id = "c"
file_extension = "c"
template = ""
"#;
        assert!(LanguageRegistry::from_toml_str(duplicate).is_err());

        let separator = r#"
[[language]]
display_name = "Objective_C"
executor_id = "objc"
executor_version = "1"
syntax_id = "objc"
file_extension = "m"
template = ""
"#;
        assert!(LanguageRegistry::from_toml_str(separator).is_err());
    }
}
