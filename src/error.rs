use std::{io, path::PathBuf};

/// Errors raised while loading, decoding or storing a graph.
///
/// None of them is transient: retrying the same operation on the same data
/// fails the same way.
#[derive(thiserror::Error, Debug)]
pub enum GraphError {
    /// A backing artifact does not exist.
    #[error("Could not find {}", path.display())]
    NotFound { path: PathBuf },
    /// The header, the offsets or a record failed structural validation.
    #[error("Malformed graph: {0}")]
    Format(String),
    /// The bitstream ended before a code could be decoded.
    #[error("Truncated bitstream: needed more bits at position {position} (stream length {len} bits)")]
    TruncatedStream { position: u64, len: u64 },
    /// A node id or bit offset outside the valid bounds.
    #[error("{what} {value} is out of range (limit {limit})")]
    OutOfRange {
        what: &'static str,
        value: u64,
        limit: u64,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl GraphError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        GraphError::Format(msg.into())
    }

    /// Maps a failed open of `path` to [`GraphError::NotFound`] when the file is missing.
    pub(crate) fn from_io(err: io::Error, path: impl Into<PathBuf>) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            GraphError::NotFound { path: path.into() }
        } else {
            GraphError::Io(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;
