//! Stdin requirement detection
//!
//! The execution gateway has no interactive terminal, so a program that blocks
//! on stdin without provided input either hangs until the gateway timeout or
//! fails with an opaque error. These probes flag such programs before submission.
//! Missing a case is acceptable; a false positive only asks the user for input.

use std::sync::OnceLock;

use regex::Regex;

/// A named pattern that indicates a read from standard input
#[derive(Debug, Clone, Copy)]
pub struct StdinProbe {
    pub name: &'static str,
    pub pattern: &'static str,
}

/// Probe rules, matched case-insensitively against the whole source text
pub const STDIN_PROBES: &[StdinProbe] = &[
    StdinProbe {
        name: "java-scanner",
        pattern: r"(?s)scanner.*\.next(int|line)?\s*\(",
    },
    StdinProbe {
        name: "java-system-in",
        pattern: r"system\.in\b",
    },
    StdinProbe {
        name: "python-input",
        pattern: r"\binput\s*\(",
    },
    StdinProbe {
        name: "python-sys-stdin",
        pattern: r"sys\.stdin",
    },
    StdinProbe {
        name: "cpp-cin",
        pattern: r"cin\s*>>",
    },
    StdinProbe {
        name: "c-scanf",
        pattern: r"\bscanf\s*\(",
    },
    StdinProbe {
        name: "readline",
        pattern: r"readline",
    },
    StdinProbe {
        name: "node-process-stdin",
        pattern: r"process\.stdin",
    },
    StdinProbe {
        name: "go-os-stdin",
        pattern: r"os\.stdin",
    },
    StdinProbe {
        name: "rust-io-stdin",
        pattern: r"io::stdin\s*\(",
    },
];

static COMPILED: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();

fn compiled() -> &'static [(&'static str, Regex)] {
    COMPILED.get_or_init(|| {
        STDIN_PROBES
            .iter()
            .filter_map(|probe| {
                match Regex::new(&format!("(?i){}", probe.pattern)) {
                    Ok(re) => Some((probe.name, re)),
                    Err(e) => {
                        tracing::error!("Invalid stdin probe {}: {}", probe.name, e);
                        None
                    }
                }
            })
            .collect()
    })
}

/// Name of the first probe matching `source_code`, if any
pub fn matching_probe(source_code: &str) -> Option<&'static str> {
    compiled()
        .iter()
        .find(|(_, re)| re.is_match(source_code))
        .map(|(name, _)| *name)
}

/// Whether `source_code` likely reads from standard input
pub fn requires_stdin(source_code: &str) -> bool {
    matching_probe(source_code).is_some()
}
