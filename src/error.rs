// Every failure the app can hit, grouped by who gets to decide what happens next.
// Components raise typed errors; only the frame loop decides retry-vs-stop.

use std::path::PathBuf;

/// How the frame loop should react to a failed inference call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// Skip this tick; the next scheduled tick retries with unchanged state.
    Transient,
    /// The backend cannot recover; the loop goes idle.
    Fatal,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("backend error ({kind:?}): {message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn transient(msg: impl Into<String>) -> Self {
        Self { kind: BackendErrorKind::Transient, message: msg.into() }
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self { kind: BackendErrorKind::Fatal, message: msg.into() }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind == BackendErrorKind::Fatal
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LoopError {
    #[error("prompt is empty; type something before starting generation")]
    EmptyPrompt,

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("blend: dimension mismatch {previous:?} vs {current:?}")]
    DimensionMismatch { previous: (u32, u32), current: (u32, u32) },
}

/// Errors surfaced by the frontends (window, headless writer, CLI).
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("window init error: {0}")]
    WindowInit(String),

    #[error("window update error: {0}")]
    WindowUpdate(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("could not spawn the frame loop thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("gave up writing frames to {dir} after {failures} failures in a row: {last}")]
    Output { dir: PathBuf, failures: u32, last: String },

    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Loop(#[from] LoopError),
}

impl AppError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_errors_default_to_transient() {
        let e = BackendError::transient("cuda busy");
        assert!(!e.is_fatal());
        assert!(BackendError::fatal("no model").is_fatal());
    }

    #[test]
    fn loop_error_wraps_backend_error() {
        let e: LoopError = BackendError::fatal("gone").into();
        assert!(e.to_string().contains("gone"));
        assert!(LoopError::EmptyPrompt.to_string().contains("prompt"));
    }

    #[test]
    fn setup_and_output_failures_name_their_cause() {
        let e = AppError::Spawn(std::io::Error::other("no threads left"));
        assert!(e.to_string().contains("no threads left"));
        let e = AppError::Output { dir: PathBuf::from("out"), failures: 3, last: "disk full".into() };
        let msg = e.to_string();
        assert!(msg.contains("out") && msg.contains('3') && msg.contains("disk full"));
    }
}
