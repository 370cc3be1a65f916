//! Worker role: relay requests over a channel and route the results.
//!
//! Each worker owns one channel exclusively and loops over the request
//! queue: data requests come back as sample values and go onto the
//! response queue; file chunk requests come back as bytes and go to the
//! right offset of the destination file; the shutdown sentinel releases
//! the channel and ends the loop.
//!
//! Transport and protocol failures are fatal to the worker that hit them:
//! the error is returned from the loop, the in-flight request is not
//! retried, and the orchestrator surfaces the failure after joining.

use crate::channel::SimChannel;
use crate::error::{ProtocolError, Result};
use crate::message::{Request, SampleEvent, SampleResult};
use crate::queue::BoundedQueue;
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::PathBuf;

/// One member of the worker pool.
pub struct Worker {
    /// Channel owned exclusively by this worker
    pub channel: SimChannel,

    /// Directory destination files are written into (file mode)
    pub output_dir: PathBuf,

    /// Read size for variable-length chunk replies
    pub max_message: usize,
}

impl Worker {
    /// Pop and serve requests until the shutdown sentinel arrives.
    ///
    /// Consumes the worker: on return (either way) the channel endpoint is
    /// dropped, and on the shutdown path the remote side has been released
    /// with a quit frame first.
    pub fn run(
        mut self,
        requests: &BoundedQueue<Request>,
        responses: &BoundedQueue<SampleEvent>,
    ) -> Result<()> {
        loop {
            match requests.pop() {
                Request::Data(dm) => {
                    self.channel.send(&Request::Data(dm).encode()?)?;
                    let reply = self.channel.recv(8)?;
                    if reply.len() != 8 {
                        return Err(ProtocolError::ShortResponse {
                            expected: 8,
                            actual: reply.len(),
                        }
                        .into());
                    }
                    let value = f64::from_le_bytes(reply[..8].try_into().unwrap());
                    responses.push(SampleEvent::Sample(SampleResult {
                        source_id: dm.source_id,
                        value,
                    }));
                }
                Request::FileChunk(fm) => {
                    let offset = fm.offset;
                    let expected = fm.length as usize;
                    let path = self.output_dir.join(&fm.filename);

                    self.channel.send(&Request::FileChunk(fm).encode()?)?;
                    let chunk = self.channel.recv(self.max_message)?;
                    if chunk.len() != expected {
                        return Err(ProtocolError::ShortResponse {
                            expected,
                            actual: chunk.len(),
                        }
                        .into());
                    }

                    // Open per request, never held across requests: chunk
                    // offsets are unordered across workers, and the ranges
                    // are disjoint by construction, so a short-lived handle
                    // per write is all the coordination needed.
                    let mut file = OpenOptions::new().write(true).open(&path)?;
                    file.seek(SeekFrom::Start(offset))?;
                    file.write_all(&chunk)?;
                }
                Request::Shutdown => {
                    self.channel.send(&Request::Quit.encode()?)?;
                    return Ok(());
                }
                // Compatibility fallback: forward anything else verbatim
                // and discard the reply (quit frames have none).
                other => {
                    let expects_reply = !matches!(other, Request::Quit);
                    self.channel.send(&other.encode()?)?;
                    if expects_reply {
                        let _ = self.channel.recv(self.max_message)?;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ServiceConfig, SimService, CONTROL_CHANNEL};
    use crate::message::DataRequest;
    use std::io::Read;
    use std::sync::Arc;
    use std::thread;

    fn test_dirs(tag: &str) -> (PathBuf, PathBuf) {
        let base = std::env::temp_dir().join(format!(
            "acquisim-worker-{tag}-{}",
            std::process::id()
        ));
        let data_dir = base.join("data");
        let out_dir = base.join("received");
        std::fs::create_dir_all(&data_dir).unwrap();
        std::fs::create_dir_all(&out_dir).unwrap();
        (data_dir, out_dir)
    }

    fn spawn_worker(
        service: &SimService,
        out_dir: &PathBuf,
        requests: &Arc<BoundedQueue<Request>>,
        responses: &Arc<BoundedQueue<SampleEvent>>,
    ) -> thread::JoinHandle<Result<()>> {
        let mut control = service.open(CONTROL_CHANNEL).unwrap();
        let worker = Worker {
            channel: control.spawn().unwrap(),
            output_dir: out_dir.clone(),
            max_message: service.max_message(),
        };
        let requests = Arc::clone(requests);
        let responses = Arc::clone(responses);
        thread::spawn(move || worker.run(&requests, &responses))
    }

    #[test]
    fn test_data_requests_become_samples() {
        let (data_dir, out_dir) = test_dirs("data");
        let service = SimService::new(ServiceConfig {
            seed: 9,
            data_dir,
            max_message: 256,
        });
        let requests = Arc::new(BoundedQueue::new(8));
        let responses = Arc::new(BoundedQueue::new(8));

        let handle = spawn_worker(&service, &out_dir, &requests, &responses);

        for i in 0..5 {
            requests.push(Request::Data(DataRequest {
                source_id: 2,
                sensor_id: 1,
                timestamp: i as f64 * 0.004,
            }));
        }
        requests.push(Request::Shutdown);

        for _ in 0..5 {
            match responses.pop() {
                SampleEvent::Sample(sample) => {
                    assert_eq!(sample.source_id, 2);
                    assert!(sample.value.is_finite());
                }
                SampleEvent::Shutdown => panic!("no shutdown was queued"),
            }
        }

        handle.join().unwrap().unwrap();
    }

    #[test]
    fn test_chunks_land_at_their_offsets() {
        let (data_dir, out_dir) = test_dirs("chunks");
        let payload: Vec<u8> = (0..200u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(data_dir.join("blob.bin"), &payload).unwrap();

        let service = SimService::new(ServiceConfig {
            seed: 9,
            data_dir,
            max_message: 256,
        });
        let requests = Arc::new(BoundedQueue::new(8));
        let responses = Arc::new(BoundedQueue::new(8));

        // Destination must exist at full size, as the chunker guarantees.
        let destination = out_dir.join("blob.bin");
        let file = std::fs::File::create(&destination).unwrap();
        file.set_len(payload.len() as u64).unwrap();
        drop(file);

        let handle = spawn_worker(&service, &out_dir, &requests, &responses);

        // Queue the chunks out of order; offsets make them land right.
        for (offset, length) in [(100u64, 100u64), (0, 100)] {
            requests.push(Request::FileChunk(crate::message::FileChunkRequest {
                offset,
                length,
                filename: "blob.bin".to_string(),
            }));
        }
        requests.push(Request::Shutdown);
        handle.join().unwrap().unwrap();

        let mut written = Vec::new();
        std::fs::File::open(&destination)
            .unwrap()
            .read_to_end(&mut written)
            .unwrap();
        assert_eq!(written, payload);
    }

    #[test]
    fn test_shutdown_is_terminal_and_consumed_once() {
        let (data_dir, out_dir) = test_dirs("shutdown");
        let service = SimService::new(ServiceConfig {
            seed: 9,
            data_dir,
            max_message: 256,
        });
        let requests = Arc::new(BoundedQueue::new(8));
        let responses = Arc::new(BoundedQueue::new(8));

        let first = spawn_worker(&service, &out_dir, &requests, &responses);
        let second = spawn_worker(&service, &out_dir, &requests, &responses);

        // One sentinel per worker; each consumes exactly one and exits.
        requests.push(Request::Shutdown);
        requests.push(Request::Shutdown);

        first.join().unwrap().unwrap();
        second.join().unwrap().unwrap();
        assert!(requests.is_empty());
    }

    #[test]
    fn test_missing_destination_is_fatal() {
        let (data_dir, out_dir) = test_dirs("fatal");
        let payload = vec![7u8; 64];
        std::fs::write(data_dir.join("blob.bin"), &payload).unwrap();

        let service = SimService::new(ServiceConfig {
            seed: 9,
            data_dir,
            max_message: 256,
        });
        let requests = Arc::new(BoundedQueue::new(8));
        let responses = Arc::new(BoundedQueue::new(8));

        let handle = spawn_worker(&service, &out_dir, &requests, &responses);

        // No pre-sized destination file exists, so the write must fail.
        requests.push(Request::FileChunk(crate::message::FileChunkRequest {
            offset: 0,
            length: 64,
            filename: "blob.bin".to_string(),
        }));

        let result = handle.join().unwrap();
        assert!(matches!(result, Err(crate::error::Error::Io(_))));
    }
}
