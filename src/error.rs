use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Structurally invalid graph or boundary, caught before compilation.
    #[error("invalid scene graph: {0}")]
    Config(String),
    /// Malformed scene description document.
    #[error("invalid scene description: {0}")]
    Scene(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Json5(#[from] json5::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn config_error(message: impl Into<String>) -> Error {
    Error::Config(message.into())
}

pub(crate) fn scene_error(message: impl Into<String>) -> Error {
    Error::Scene(message.into())
}
