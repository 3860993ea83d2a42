use std::path::PathBuf;

use thiserror::Error;

/// Failures of the synthesis loop. Everything else travels as plain `anyhow` context.
#[derive(Debug, Error)]
pub enum GuideError {
    #[error("backend '{backend}' failed: {message}")]
    Backend { backend: String, message: String },

    #[error("backend '{backend}' returned an empty response")]
    EmptyResponse { backend: String },

    #[error("backend '{backend}' did not answer within {secs}s")]
    BackendTimeout { backend: String, secs: u64 },

    #[error("no usable commands in the last response; pick 'more context' or 0 to exit")]
    NoCandidates,

    #[error("failed to write selected command to '{}'", path.display())]
    HandoffWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no command selected after {max_rounds} rounds")]
    RoundLimitReached { max_rounds: u32 },
}

impl GuideError {
    pub fn backend(backend: &str, message: impl Into<String>) -> Self {
        GuideError::Backend {
            backend: backend.to_string(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            GuideError::Backend { .. }
            | GuideError::EmptyResponse { .. }
            | GuideError::BackendTimeout { .. } => ErrorCategory::Backend,
            GuideError::HandoffWrite { .. } => ErrorCategory::Handoff,
            GuideError::NoCandidates | GuideError::RoundLimitReached { .. } => {
                ErrorCategory::Input
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Backend,
    Handoff,
    Input,
    Internal,
}

impl ErrorCategory {
    pub fn code(self) -> &'static str {
        match self {
            ErrorCategory::Backend => "BACKEND",
            ErrorCategory::Handoff => "HANDOFF",
            ErrorCategory::Input => "INPUT",
            ErrorCategory::Internal => "INTERNAL",
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            ErrorCategory::Backend => {
                "Check provider credentials (for example OPENAI_API_KEY), --base-url, or raise --backend-timeout-secs."
            }
            ErrorCategory::Handoff => {
                "Make sure the --tempfile destination is writable by the current user."
            }
            ErrorCategory::Input => "Run cmdguide --help and correct command arguments.",
            ErrorCategory::Internal => {
                "Retry with RUST_LOG=debug. If it persists, capture logs and open an issue."
            }
        }
    }
}

pub fn categorize_error(err: &anyhow::Error) -> ErrorCategory {
    if let Some(guide) = err.chain().find_map(|cause| cause.downcast_ref::<GuideError>()) {
        return guide.category();
    }

    let msg = format!("{err:#}").to_ascii_lowercase();

    if msg.contains("api_key")
        || msg.contains("no provider could be auto-detected")
        || msg.contains("provider")
        || msg.contains("backend")
    {
        return ErrorCategory::Backend;
    }

    if msg.contains("invalid value")
        || msg.contains("unknown argument")
        || msg.contains("missing required")
        || msg.contains("failed to read")
        || msg.contains("profile")
    {
        return ErrorCategory::Input;
    }

    if msg.contains("tempfile") || msg.contains("handoff") {
        return ErrorCategory::Handoff;
    }

    ErrorCategory::Internal
}

pub fn format_cli_error(err: &anyhow::Error) -> String {
    let category = categorize_error(err);
    format!(
        "[{}] {}\nHint: {}",
        category.code(),
        redact_sensitive_text(&format!("{err:#}")),
        category.hint()
    )
}

/// Masks bearer-style secrets (`sk-...`, `gsk_...`) that backends sometimes echo in error bodies.
pub fn redact_sensitive_text(text: &str) -> String {
    const SECRET_PREFIXES: [&str; 3] = ["sk-", "gsk_", "AIza"];
    text.split_inclusive(char::is_whitespace)
        .map(|word| {
            let token = word.trim_end();
            let bare = token.trim_matches(|ch: char| matches!(ch, '"' | '\'' | ',' | ':' | '.'));
            if bare.len() > 12 && SECRET_PREFIXES.iter().any(|prefix| bare.starts_with(prefix)) {
                word.replacen(bare, "[REDACTED]", 1)
            } else {
                word.to_string()
            }
        })
        .collect()
}
