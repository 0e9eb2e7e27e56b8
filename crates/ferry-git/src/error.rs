//! Git protocol error types.

use std::fmt;
use thiserror::Error;

/// Errors that can occur during git protocol operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Invalid pack file format.
    #[error("invalid pack file: {0}")]
    InvalidPack(String),

    /// Invalid pkt-line framing.
    #[error("invalid pkt-line: {0}")]
    InvalidPktLine(String),

    /// A well-framed message whose content could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The client asked for a protocol version this server does not know.
    #[error("unknown protocol version {0:?}")]
    UnknownVersion(String),

    /// A depth request other than a commit count.
    #[error("unsupported depth type: {0}")]
    UnsupportedDepth(&'static str),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] ferry_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error annotated with the service phase it occurred in.
    #[error("{phase}: {source}")]
    Phase {
        /// Phase of the upload-pack exchange.
        phase: Phase,
        /// Underlying error.
        source: Box<GitError>,
    },
}

impl GitError {
    /// Returns the innermost error, skipping phase annotations.
    pub fn root(&self) -> &GitError {
        match self {
            Self::Phase { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns true if the error was caused by cancellation.
    pub fn is_interrupted(&self) -> bool {
        matches!(self.root(), Self::Io(e) if e.kind() == std::io::ErrorKind::Interrupted)
    }
}

/// Phases of an upload-pack exchange, used to annotate errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Writing the version announcement and reference advertisement.
    Advertising,
    /// Peeking at the first client packet.
    Peeking,
    /// Decoding the want/shallow/deepen request.
    DecodingRequest,
    /// Computing and writing the shallow update.
    SendingShallowUpdate,
    /// Indexing objects reachable from the wants.
    IndexingHaves,
    /// Decoding a have batch.
    DecodingHaves,
    /// Writing acknowledgements.
    Acking,
    /// Resolving the objects to send.
    ResolvingObjects,
    /// Writing the packfile.
    EncodingPack,
    /// Flushing the output.
    Closing,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Advertising => "advertising references",
            Self::Peeking => "peeking line",
            Self::DecodingRequest => "decoding upload-request",
            Self::SendingShallowUpdate => "sending shallow-update",
            Self::IndexingHaves => "getting objects with ref",
            Self::DecodingHaves => "decoding upload-haves",
            Self::Acking => "sending server-response",
            Self::ResolvingObjects => "getting objects to upload",
            Self::EncodingPack => "encoding packfile",
            Self::Closing => "closing writer",
        };
        f.write_str(s)
    }
}

/// Attaches a [`Phase`] to errors.
pub trait ResultExt<T> {
    /// Wraps the error, if any, in [`GitError::Phase`].
    fn phase(self, phase: Phase) -> crate::Result<T>;
}

impl<T, E: Into<GitError>> ResultExt<T> for std::result::Result<T, E> {
    fn phase(self, phase: Phase) -> crate::Result<T> {
        self.map_err(|e| GitError::Phase {
            phase,
            source: Box::new(e.into()),
        })
    }
}
