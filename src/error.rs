//! Error types for catalog scanning, clip selection and rendering.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for reelmix operations.
pub type ReelResult<T> = Result<T, ReelError>;

/// Errors that can occur while building or rendering a reel.
///
/// Every variant is fatal: the run stops and is expected to be restarted
/// from scratch.
#[derive(Debug, Error)]
pub enum ReelError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no eligible {slot} clip{}", exclusion_note(.excluded))]
    SelectionExhausted {
        slot: &'static str,
        excluded: Option<String>,
    },

    #[error("file name '{0}' has no animal token (expected <prefix>_<animal>_...)")]
    MalformedFilename(String),

    #[error("could not probe duration of {}: {message}", .path.display())]
    Probe { path: PathBuf, message: String },

    #[error("render failed: {message}")]
    Render {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

fn exclusion_note(excluded: &Option<String>) -> String {
    match excluded {
        Some(animal) => format!(" once animal '{}' is excluded", animal),
        None => String::new(),
    }
}

impl ReelError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a probe failure error.
    pub fn probe(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Probe {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a render failure error.
    pub fn render(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::Render {
            message: message.into(),
            stderr,
            exit_code,
        }
    }
}
