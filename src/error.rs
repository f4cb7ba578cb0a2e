use std::path::PathBuf;

/// Errors that can prevent a [`crate::session::Session`] from being usable at
/// all. These are construction/configuration failures, not protocol-level
/// conditions — a dead helper, a write to a disconnected pipe, or a
/// helper-reported `!!ERR!!` all resolve through [`crate::operation::OperationOutcome`]
/// instead, so every facade method resolves its caller exactly once no
/// matter what goes wrong downstream.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to spawn helper {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("helper process has no stdin pipe")]
    StdinUnavailable,

    #[error("helper process has no stdout pipe")]
    StdoutUnavailable,
}
