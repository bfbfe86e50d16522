use std::path::PathBuf;

use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SrefError {
    #[error("{0} axis has no members")]
    EmptyAxis(&'static str),

    #[error("invalid {axis} member: {value:?}")]
    InvalidAxisMember { axis: &'static str, value: String },

    #[error("duplicate {axis} member: {value}")]
    DuplicateAxisMember { axis: &'static str, value: String },

    #[error("invalid bounding box: {0}")]
    #[diagnostic(help("expected left < right and bottom < top, in decimal degrees"))]
    InvalidBoundingBox(String),

    #[error("invalid init time: {0}")]
    #[diagnostic(help("expected YYYYMMDDHH, e.g. 2015112021"))]
    InvalidInitTime(String),

    #[error("SREF has no {0:02}Z cycle")]
    #[diagnostic(help("SREF runs at 03, 09, 15 and 21 UTC"))]
    UnsupportedCycle(u32),

    #[error("NOMADS request failed: {0}")]
    Transport(String),

    #[error("NOMADS returned status {status} for {url}")]
    TransportStatus { status: u16, url: String },

    #[error("wgrib2 conversion failed: {0}")]
    Conversion(String),

    #[error("wgrib2 produced no output at {0}")]
    EmptyConversionOutput(PathBuf),

    #[error("required tool not found: {0}")]
    #[diagnostic(help("install wgrib2 or pass --converter <path>"))]
    MissingTool(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("{failed} of {total} tasks failed")]
    BatchFailed { failed: usize, total: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Planning,
    Transport,
    Conversion,
    Config,
    Filesystem,
    Batch,
}

impl SrefError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SrefError::EmptyAxis(_)
            | SrefError::InvalidAxisMember { .. }
            | SrefError::DuplicateAxisMember { .. }
            | SrefError::InvalidBoundingBox(_)
            | SrefError::InvalidInitTime(_)
            | SrefError::UnsupportedCycle(_) => ErrorKind::Planning,
            SrefError::Transport(_) | SrefError::TransportStatus { .. } => ErrorKind::Transport,
            SrefError::Conversion(_)
            | SrefError::EmptyConversionOutput(_)
            | SrefError::MissingTool(_) => ErrorKind::Conversion,
            SrefError::ConfigRead(_) | SrefError::ConfigParse(_) => ErrorKind::Config,
            SrefError::Filesystem(_) => ErrorKind::Filesystem,
            SrefError::BatchFailed { .. } => ErrorKind::Batch,
        }
    }
}
