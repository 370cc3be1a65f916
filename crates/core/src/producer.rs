//! Producer roles: source simulators and the file chunker.
//!
//! Producers only ever push real work onto the request queue. The stop
//! sentinels are the orchestrator's job, injected strictly after every
//! producer has been joined; a producer signalling shutdown itself could
//! starve requests still queued behind its sentinel.

use crate::channel::SimChannel;
use crate::error::{ProtocolError, Result};
use crate::message::{DataRequest, FileChunkRequest, Request};
use crate::queue::BoundedQueue;
use std::fs::File;
use std::path::PathBuf;

/// Seconds between consecutive samples of one source (250 Hz).
pub const SAMPLE_TICK_SECS: f64 = 0.004;

/// One simulated source emitting a fixed count of timestamped data
/// requests. Construction parameters are always valid; there is no
/// failure path.
#[derive(Debug, Clone)]
pub struct SourceSimulator {
    /// Identity carried in every request, 1-based
    pub source_id: u16,

    /// Sensor channel to sample
    pub sensor_id: u8,

    /// Number of requests to emit
    pub samples: u32,
}

impl SourceSimulator {
    /// Emit `samples` data requests with strictly increasing timestamps,
    /// one logical tick apart, then return.
    pub fn run(&self, requests: &BoundedQueue<Request>) {
        for i in 0..self.samples {
            requests.push(Request::Data(DataRequest {
                source_id: self.source_id,
                sensor_id: self.sensor_id,
                timestamp: i as f64 * SAMPLE_TICK_SECS,
            }));
        }
    }
}

/// Byte-range plan covering `[0, file_size)` in strides of `max_chunk`,
/// final chunk sized to the remainder. A zero-byte file yields no chunks.
///
/// The non-overlap of these ranges is what lets workers write the
/// destination file without locking; any change to the stride must keep
/// the ranges disjoint.
pub fn chunk_plan(file_size: u64, max_chunk: u64) -> Vec<(u64, u64)> {
    assert!(max_chunk > 0, "chunk stride must be non-zero");
    let mut chunks = Vec::with_capacity(file_size.div_ceil(max_chunk) as usize);
    let mut offset = 0;
    while offset < file_size {
        let length = max_chunk.min(file_size - offset);
        chunks.push((offset, length));
        offset += length;
    }
    chunks
}

/// Single producer that sizes a remote file and queues the chunk requests
/// that cover it.
pub struct FileChunker {
    /// Remote file name, relative to the service's data directory
    pub filename: String,

    /// Local destination path, pre-sized before any chunk is queued
    pub destination: PathBuf,

    /// Stride of the chunk plan; must not exceed the channel's max
    /// message size or chunk replies could not be read back
    pub max_chunk: u64,
}

impl FileChunker {
    /// Probe the remote size over the control channel, pre-size the local
    /// destination, and queue one request per chunk. Returns the remote
    /// file size.
    ///
    /// # Errors
    /// - Transport errors from the probe (e.g. the remote cannot serve the
    ///   file)
    /// - `ProtocolError::ShortResponse` if the size reply is not 8 bytes
    /// - I/O errors creating the destination (fatal to the run)
    pub fn run(
        &self,
        requests: &BoundedQueue<Request>,
        control: &mut SimChannel,
    ) -> Result<u64> {
        let probe = Request::FileChunk(FileChunkRequest {
            offset: 0,
            length: 0,
            filename: self.filename.clone(),
        });
        control.send(&probe.encode()?)?;
        let reply = control.recv(8)?;
        if reply.len() != 8 {
            return Err(ProtocolError::ShortResponse {
                expected: 8,
                actual: reply.len(),
            }
            .into());
        }
        let file_size = u64::from_le_bytes(reply[..8].try_into().unwrap());

        // Pre-size the destination so workers can write their offsets in
        // any order. An empty remote file leaves an empty local file.
        let file = File::create(&self.destination)?;
        file.set_len(file_size)?;
        drop(file);

        for (offset, length) in chunk_plan(file_size, self.max_chunk) {
            requests.push(Request::FileChunk(FileChunkRequest {
                offset,
                length,
                filename: self.filename.clone(),
            }));
        }
        Ok(file_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_source_emits_exact_count_in_order() {
        let queue = Arc::new(BoundedQueue::new(4));
        let source = SourceSimulator {
            source_id: 5,
            sensor_id: 1,
            samples: 10,
        };

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || source.run(&queue))
        };

        let mut last_timestamp = f64::NEG_INFINITY;
        for _ in 0..10 {
            match queue.pop() {
                Request::Data(dm) => {
                    assert_eq!(dm.source_id, 5);
                    assert!(dm.timestamp > last_timestamp, "timestamps must increase");
                    last_timestamp = dm.timestamp;
                }
                other => panic!("unexpected message: {other:?}"),
            }
        }

        producer.join().unwrap();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_chunk_plan_with_remainder() {
        let chunks = chunk_plan(2500, 1024);
        assert_eq!(chunks, vec![(0, 1024), (1024, 1024), (2048, 452)]);
    }

    #[test]
    fn test_chunk_plan_exact_multiple() {
        let chunks = chunk_plan(4096, 1024);
        assert_eq!(chunks.len(), 4);
        assert!(chunks.iter().all(|&(_, length)| length == 1024));
    }

    #[test]
    fn test_chunk_plan_empty_file() {
        assert!(chunk_plan(0, 1024).is_empty());
    }

    #[test]
    fn test_chunk_plan_smaller_than_stride() {
        assert_eq!(chunk_plan(100, 1024), vec![(0, 100)]);
    }

    #[test]
    fn test_chunk_plan_covers_everything_without_overlap() {
        for (file_size, stride) in [(1u64, 1u64), (999, 64), (65536, 1000), (12345, 256)] {
            let chunks = chunk_plan(file_size, stride);
            let mut expected_offset = 0;
            for &(offset, length) in &chunks {
                assert_eq!(offset, expected_offset, "gap or overlap in plan");
                assert!(length <= stride);
                assert!(length > 0);
                expected_offset += length;
            }
            assert_eq!(expected_offset, file_size, "plan must cover the file");
        }
    }
}
