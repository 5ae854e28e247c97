use crate::sync::SyncKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RevenueError {
    #[error("Invalid engine settings: {0}")]
    InvalidSettings(String),

    #[error("Invalid report year {0}: must be between 2000 and 2100")]
    InvalidYear(i32),

    #[error("Unknown project type label: {0}")]
    UnknownProjectType(String),

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("A {0} sync is already in progress")]
    SyncInProgress(SyncKind),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RevenueError>;
