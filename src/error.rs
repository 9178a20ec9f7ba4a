//! Errors produced by ring buffer operations.

/// The two transfer directions of a ring buffer.
///
/// At most one reservation per direction can be outstanding at a time.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Data moving into the buffer.
    Put,
    /// Data moving out of the buffer.
    Take,
}

impl core::fmt::Display for Direction {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Self::Put => f.write_str("put"),
            Self::Take => f.write_str("take"),
        }
    }
}

/// Error produced by a ring buffer operation.
///
/// Every variant except [`UnexpectedEndOfInput`](Self::UnexpectedEndOfInput),
/// [`Cancelled`](Self::Cancelled) and [`Io`](Self::Io) is raised before any state is modified.
/// The remaining three occur after bytes may have moved; the buffer state always reflects the
/// bytes that were actually transferred.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An argument was malformed, such as a zero capacity or an undersized destination.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The request can never fit in the buffer, or a single byte was put into a full buffer
    /// that does not allow overwriting.
    #[error("request of `{requested}` bytes exceeds buffer capacity of `{capacity}`")]
    CapacityExceeded {
        /// Number of bytes requested.
        requested: usize,
        /// Total capacity of the buffer.
        capacity: usize,
    },

    /// The buffer does not have enough free space and is not permitted to discard content.
    ///
    /// Overwriting is refused while a take is in progress, even if the buffer allows it.
    #[error("insufficient capacity: requested `{requested}` bytes with `{spare}` spare")]
    InsufficientCapacity {
        /// Number of bytes requested.
        requested: usize,
        /// Number of bytes free at the time of the request.
        spare: usize,
    },

    /// The buffer does not contain enough data.
    #[error("insufficient content: requested `{requested}` bytes with `{available}` available")]
    InsufficientContent {
        /// Number of bytes requested.
        requested: usize,
        /// Number of bytes stored at the time of the request.
        available: usize,
    },

    /// Another operation in the same direction has not yet been published.
    #[error("a {0} operation is already in progress")]
    OperationInProgress(Direction),

    /// The source stream ended before the requested number of bytes was read.
    #[error("unexpected end of input: expected `{expected}` bytes, read `{transferred}`")]
    UnexpectedEndOfInput {
        /// Number of bytes requested.
        expected: usize,
        /// Number of bytes read and published before the source ended.
        transferred: usize,
    },

    /// An asynchronous transfer observed its cancellation token.
    #[error("operation cancelled after transferring `{transferred}` bytes")]
    Cancelled {
        /// Number of bytes transferred and published before cancellation.
        transferred: usize,
    },

    /// The external stream returned an error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The number of bytes that were transferred and published before the error occurred.
    ///
    /// Errors raised before a reservation was made always report zero.
    pub fn transferred(&self) -> usize {
        match self {
            Self::UnexpectedEndOfInput { transferred, .. } | Self::Cancelled { transferred } => {
                *transferred
            }
            _ => 0,
        }
    }
}

impl std::convert::From<Error> for std::io::Error {
    fn from(e: Error) -> Self {
        use std::io::ErrorKind;
        if let Error::Io(inner) = e {
            return inner;
        }
        let kind = match &e {
            Error::Io(_) => ErrorKind::Other,
            Error::InvalidArgument(_) | Error::CapacityExceeded { .. } => ErrorKind::InvalidInput,
            Error::InsufficientCapacity { .. }
            | Error::InsufficientContent { .. }
            | Error::OperationInProgress(_) => ErrorKind::WouldBlock,
            Error::UnexpectedEndOfInput { .. } => ErrorKind::UnexpectedEof,
            Error::Cancelled { .. } => ErrorKind::Other,
        };
        Self::new(kind, e)
    }
}

/// A `Result` specialized to ring buffer [`Error`]s.
pub type Result<T, E = Error> = core::result::Result<T, E>;
