use std::path::PathBuf;
use thiserror::Error;

/// Failures reported by the host player collaborator.
///
/// The sequencing core treats all of these as "this ad break is over".
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HostError {
    #[error("source switch to '{url}' failed: {reason}")]
    SourceSwitch { url: String, reason: String },

    #[error("media element is not available")]
    MediaUnavailable,
}

/// Errors from loading or saving a timeline configuration.
#[derive(Error, Debug)]
pub enum TimelineError {
    #[error("cannot read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid timeline configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown insertion point '{0}'")]
    UnknownInsertionPoint(String),
}
