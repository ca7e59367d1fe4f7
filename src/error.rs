use thiserror::Error;

/// Errors raised by the generation engine's control surface.
///
/// Generation itself never fails: out-of-policy coordinates yield an empty
/// chunk instead of an error.
#[derive(Debug, Error)]
pub enum GenError {
    #[error("generator is already running")]
    AlreadyStarted,

    #[error("generator has been stopped and cannot be restarted")]
    AlreadyStopped,

    #[error("generator is not running, call start() first")]
    NotRunning,

    #[error("failed to spawn worker: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}

pub type Result<T> = std::result::Result<T, GenError>;
