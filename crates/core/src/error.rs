//! Error types for the acquisim pipeline.
//!
//! Recoverable failures are structured errors rather than panics.
//! Programming errors (an oversized frame, a zero-capacity queue) are
//! asserted preconditions and abort instead; they are documented at the
//! call sites that enforce them.
//!
//! Each variant of the top-level error corresponds to a failure domain:
//! - Protocol: a malformed or truncated message, or a response shorter
//!   than the fixed size the sender promised
//! - Transport: a channel operation against a closed or unknown endpoint,
//!   or a remote file the service cannot serve
//! - I/O: local file system operations (destination file handling)
//! - Thread: a pipeline role panicked instead of returning

use thiserror::Error;

/// Top-level error type for all pipeline operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Message codec or request/response shape violation
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Channel transport failure
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Local file I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A spawned pipeline thread panicked rather than returning a result
    #[error("thread failure: {0}")]
    Thread(String),

    /// Invalid run configuration
    #[error("configuration error: {0}")]
    Config(String),
}

/// Message-level protocol errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Leading tag byte is not a known message type
    #[error("invalid message tag: {0:#04x}")]
    InvalidTag(u8),

    /// Frame is too short for the fields its tag requires
    #[error("frame too short: need at least {required} bytes, got {actual}")]
    FrameTooShort { required: usize, actual: usize },

    /// Response carried fewer bytes than the request contract promises
    #[error("short response: expected {expected} bytes, got {actual}")]
    ShortResponse { expected: usize, actual: usize },

    /// A string field (filename, channel name) is not valid UTF-8
    #[error("string field is not valid UTF-8")]
    InvalidString,

    /// Filename does not fit the u16 length prefix
    #[error("filename too long: {length} bytes exceeds {max}")]
    FilenameTooLong { length: usize, max: usize },
}

/// Channel transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Channel name was never minted by the service
    #[error("unknown channel name: {0:?}")]
    UnknownChannel(String),

    /// Endpoint was released by a quit message
    #[error("channel {0:?} is closed")]
    ChannelClosed(String),

    /// Read attempted with no request in flight
    #[error("no reply pending on channel {0:?}")]
    NoReplyPending(String),

    /// Remote side cannot serve the named file
    #[error("remote file {0:?} is not available")]
    FileUnavailable(String),
}

/// Type alias for Result with our Error type
pub type Result<T> = std::result::Result<T, Error>;
