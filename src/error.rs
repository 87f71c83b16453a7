use thiserror::Error;

/// Errors originating from the settings state layer.
#[derive(Debug, Error)]
pub enum Error {
    /// An enable-condition query was not valid JSON.
    #[error("enable query parse failed: {0}")]
    Query(#[from] serde_json::Error),

    /// The settings source failed to initialize or observe.
    #[error("settings source failed: {0}")]
    Source(String),
}

pub type Result<T> = std::result::Result<T, Error>;
