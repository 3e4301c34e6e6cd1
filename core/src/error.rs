use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The corpus was queried before `postprocess` ran, or was mutated after it.
    #[error("corpus has not been postprocessed")]
    NotFinalized,
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("no loader registered for content type '{content_type}' ({})", path.display())]
    UnsupportedContentType { path: PathBuf, content_type: String },
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("operation cancelled")]
    Cancelled,
}

impl EngineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Errors that only affect a single source file; the scan skips the file and carries on.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::UnsupportedContentType { .. })
    }
}
