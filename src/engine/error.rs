//! Remote engine error types.

use derive_more::Display;
use tracing::{error, instrument};

/// Broad classification of a failed engine call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum EngineErrorKind {
    /// Network failure, non-success status or undecodable body.
    #[display("transport")]
    Transport,
    /// The engine does not know the requested session.
    #[display("unknown session")]
    UnknownSession,
}

/// Engine call error with location tracking.
#[derive(Debug, Clone, Display, derive_more::Error)]
#[display("Engine {} error: {} at {}:{}", kind, message, file, line)]
pub struct EngineError {
    /// What went wrong.
    pub kind: EngineErrorKind,
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl EngineError {
    /// Creates a transport error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::with_kind(EngineErrorKind::Transport, message.into())
    }

    /// Creates an unknown-session error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn unknown_session(message: impl Into<String>) -> Self {
        Self::with_kind(EngineErrorKind::UnknownSession, message.into())
    }

    #[track_caller]
    fn with_kind(kind: EngineErrorKind, message: String) -> Self {
        let loc = std::panic::Location::caller();
        error!(%kind, error_message = %message, "Engine error created");
        Self {
            kind,
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Returns true if the engine rejected the session id.
    pub fn is_unknown_session(&self) -> bool {
        self.kind == EngineErrorKind::UnknownSession
    }
}

impl From<reqwest::Error> for EngineError {
    #[track_caller]
    fn from(err: reqwest::Error) -> Self {
        Self::transport(format!("HTTP request failed: {}", err))
    }
}
