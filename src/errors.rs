use thiserror::Error;

/// Recoverable conditions; only the `try_` entry points return them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("malformed {format} serialization at offset {offset}: {reason}")]
    MalformedSerialization {
        format: &'static str,
        offset: usize,
        reason: String,
    },
    #[error("unrecognized boolean representation: {0}")]
    UnknownBooleanRepresentation(String),
    #[error("unparseable timestamp: {0:?}")]
    UnparseableTimestamp(String),
    #[error("no {0} signal matched")]
    AmbiguousProvenance(&'static str),
}

impl NormalizeError {
    pub(crate) fn malformed(format: &'static str, offset: usize, reason: impl Into<String>) -> Self {
        NormalizeError::MalformedSerialization {
            format,
            offset,
            reason: reason.into(),
        }
    }
}
