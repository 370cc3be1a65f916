//! Typed pipeline messages and their wire codec.
//!
//! The request queue and the channel transport share one closed message
//! enumeration. On the queue the messages travel as typed values; at the
//! channel boundary they are serialized into a tagged frame so the remote
//! side can interpret them without any out-of-band length bookkeeping.
//!
//! # Frame Format
//!
//! Every frame starts with a one-byte tag. Fixed fields follow in
//! little-endian order; the one variable field (the filename of a chunk
//! request) is length-prefixed with a u16.
//!
//! ```text
//! Data request (12 bytes):
//! +--------+---------------+--------------+----------------+
//! | tag=1  | source_id u16 | sensor_id u8 | timestamp f64  |
//! +--------+---------------+--------------+----------------+
//!
//! File chunk request (19 + name bytes):
//! +--------+------------+------------+--------------+----------+
//! | tag=2  | offset u64 | length u64 | name_len u16 | filename |
//! +--------+------------+------------+--------------+----------+
//!
//! New-channel, quit, shutdown: tag byte only (3, 4, 0).
//! ```
//!
//! Responses are raw payloads, not tagged frames: an 8-byte f64 for a data
//! request, an 8-byte u64 for a size probe, the requested bytes for a chunk,
//! and a UTF-8 channel name for a new-channel request. The request/response
//! channel is strictly alternating, so the reader always knows the shape.

use crate::error::{ProtocolError, Result};

/// Default hard cap on a single framed message, request or response.
pub const DEFAULT_MAX_MESSAGE: usize = 256;

/// Wire tags for the request enumeration.
const TAG_SHUTDOWN: u8 = 0;
const TAG_DATA: u8 = 1;
const TAG_FILE_CHUNK: u8 = 2;
const TAG_NEW_CHANNEL: u8 = 3;
const TAG_QUIT: u8 = 4;

/// Size of an encoded data request.
pub const DATA_REQUEST_SIZE: usize = 12;

/// Size of an encoded file chunk request before the filename bytes.
pub const FILE_CHUNK_HEADER_SIZE: usize = 19;

/// One timestamped sample request for a simulated source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataRequest {
    /// Simulated source (patient) identity, 1-based
    pub source_id: u16,

    /// Sensor channel on that source
    pub sensor_id: u8,

    /// Sample time in seconds, strictly increasing per source
    pub timestamp: f64,
}

/// One byte-range request against a remote file.
///
/// A request with `length == 0` is the size probe: the remote replies with
/// the file's total size instead of data.
#[derive(Debug, Clone, PartialEq)]
pub struct FileChunkRequest {
    /// Byte offset of the chunk within the file
    pub offset: u64,

    /// Chunk length in bytes; 0 means size probe
    pub length: u64,

    /// Remote file name, relative to the service's data directory
    pub filename: String,
}

/// Request-queue message, checked exhaustively by every consumer.
///
/// `Shutdown` is the queue-only stop sentinel: the orchestrator injects
/// exactly one per worker after all producers have been joined, and each
/// worker consumes exactly one. It never needs to cross the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Ask the remote service for one sensor sample
    Data(DataRequest),

    /// Ask the remote service for one file byte range (or its size)
    FileChunk(FileChunkRequest),

    /// Ask the control channel to mint a fresh channel name
    NewChannel,

    /// Release the remote end of a channel
    Quit,

    /// Stop sentinel for one worker
    Shutdown,
}

/// One decoded sample paired with its originating source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleResult {
    /// Source the sample belongs to
    pub source_id: u16,

    /// Sample value
    pub value: f64,
}

/// Response-queue message consumed by aggregators.
///
/// `Shutdown` is an explicit variant rather than a reserved zero/zero
/// pair, so a legitimate sample can never collide with the stop signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleEvent {
    /// A decoded sample to fold into the histograms
    Sample(SampleResult),

    /// Stop sentinel for one aggregator
    Shutdown,
}

impl Request {
    /// Wire tag for this message.
    pub fn tag(&self) -> u8 {
        match self {
            Request::Shutdown => TAG_SHUTDOWN,
            Request::Data(_) => TAG_DATA,
            Request::FileChunk(_) => TAG_FILE_CHUNK,
            Request::NewChannel => TAG_NEW_CHANNEL,
            Request::Quit => TAG_QUIT,
        }
    }

    /// Serialize into a tagged frame.
    ///
    /// # Errors
    /// `ProtocolError::FilenameTooLong` if a chunk request's filename does
    /// not fit the u16 length prefix.
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            Request::Data(dm) => {
                let mut frame = Vec::with_capacity(DATA_REQUEST_SIZE);
                frame.push(TAG_DATA);
                frame.extend_from_slice(&dm.source_id.to_le_bytes());
                frame.push(dm.sensor_id);
                frame.extend_from_slice(&dm.timestamp.to_le_bytes());
                Ok(frame)
            }
            Request::FileChunk(fm) => {
                let name = fm.filename.as_bytes();
                if name.len() > u16::MAX as usize {
                    return Err(ProtocolError::FilenameTooLong {
                        length: name.len(),
                        max: u16::MAX as usize,
                    }
                    .into());
                }
                let mut frame = Vec::with_capacity(FILE_CHUNK_HEADER_SIZE + name.len());
                frame.push(TAG_FILE_CHUNK);
                frame.extend_from_slice(&fm.offset.to_le_bytes());
                frame.extend_from_slice(&fm.length.to_le_bytes());
                frame.extend_from_slice(&(name.len() as u16).to_le_bytes());
                frame.extend_from_slice(name);
                Ok(frame)
            }
            tag_only => Ok(vec![tag_only.tag()]),
        }
    }

    /// Parse a tagged frame.
    ///
    /// # Errors
    /// - `ProtocolError::FrameTooShort` on an empty or truncated frame
    /// - `ProtocolError::InvalidTag` on an unknown tag byte
    /// - `ProtocolError::InvalidString` on a non-UTF-8 filename
    pub fn decode(bytes: &[u8]) -> Result<Request> {
        let tag = *bytes.first().ok_or(ProtocolError::FrameTooShort {
            required: 1,
            actual: 0,
        })?;

        match tag {
            TAG_DATA => {
                if bytes.len() < DATA_REQUEST_SIZE {
                    return Err(ProtocolError::FrameTooShort {
                        required: DATA_REQUEST_SIZE,
                        actual: bytes.len(),
                    }
                    .into());
                }
                let source_id = u16::from_le_bytes(bytes[1..3].try_into().unwrap());
                let sensor_id = bytes[3];
                let timestamp = f64::from_le_bytes(bytes[4..12].try_into().unwrap());
                Ok(Request::Data(DataRequest {
                    source_id,
                    sensor_id,
                    timestamp,
                }))
            }
            TAG_FILE_CHUNK => {
                if bytes.len() < FILE_CHUNK_HEADER_SIZE {
                    return Err(ProtocolError::FrameTooShort {
                        required: FILE_CHUNK_HEADER_SIZE,
                        actual: bytes.len(),
                    }
                    .into());
                }
                let offset = u64::from_le_bytes(bytes[1..9].try_into().unwrap());
                let length = u64::from_le_bytes(bytes[9..17].try_into().unwrap());
                let name_len = u16::from_le_bytes(bytes[17..19].try_into().unwrap()) as usize;

                let required = FILE_CHUNK_HEADER_SIZE + name_len;
                if bytes.len() < required {
                    return Err(ProtocolError::FrameTooShort {
                        required,
                        actual: bytes.len(),
                    }
                    .into());
                }
                let filename = std::str::from_utf8(&bytes[19..19 + name_len])
                    .map_err(|_| ProtocolError::InvalidString)?
                    .to_string();
                Ok(Request::FileChunk(FileChunkRequest {
                    offset,
                    length,
                    filename,
                }))
            }
            TAG_NEW_CHANNEL => Ok(Request::NewChannel),
            TAG_QUIT => Ok(Request::Quit),
            TAG_SHUTDOWN => Ok(Request::Shutdown),
            other => Err(ProtocolError::InvalidTag(other).into()),
        }
    }
}
