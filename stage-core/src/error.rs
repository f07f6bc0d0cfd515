//! Error types for stage operations

use serde::Serialize;

/// Process exit code for transport failures, capability gaps and anything unclassified.
pub const EXIT_ERROR: i32 = 1;
/// Process exit code for bad local input (missing file, empty directory, no stdin).
pub const EXIT_USER_ERROR: i32 = 2;
/// Process exit code when the service reports an explicit absence.
pub const EXIT_NOT_FOUND: i32 = 3;

/// Structured error payload printed to stderr in `--json` mode.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("{0}")]
    UserInput(String),

    #[error("{}", transport_message(.status, .message))]
    Transport { status: Option<u16>, message: String },

    #[error("{0}")]
    NotFound(String),

    #[error("{operation} is not supported by the {backend} backend. {hint}")]
    Unsupported {
        operation: String,
        backend: String,
        hint: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn transport_message(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("Stage {}: {}", code, message),
        None => message.to_string(),
    }
}

impl StageError {
    pub fn user_input(message: impl Into<String>) -> Self {
        Self::UserInput(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            message: message.into(),
        }
    }

    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Transport {
            status: Some(status),
            message: body.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn unsupported(
        operation: impl Into<String>,
        backend: impl Into<String>,
        hint: impl Into<String>,
    ) -> Self {
        Self::Unsupported {
            operation: operation.into(),
            backend: backend.into(),
            hint: hint.into(),
        }
    }

    /// Exit code for this error family.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::UserInput(_) => EXIT_USER_ERROR,
            Self::NotFound(_) => EXIT_NOT_FOUND,
            Self::Transport { .. }
            | Self::Unsupported { .. }
            | Self::Io(_)
            | Self::Serialization(_) => EXIT_ERROR,
        }
    }

    /// Short machine-readable code used in JSON error output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UserInput(_) => "user_input",
            Self::Transport { .. } => "transport",
            Self::NotFound(_) => "not_found",
            Self::Unsupported { .. } => "unsupported",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        let hint = match self {
            Self::Unsupported { hint, .. } => Some(hint.clone()),
            _ => None,
        };
        ErrorEnvelope {
            code: self.code().to_string(),
            message: self.to_string(),
            hint,
        }
    }
}
