//! Named duplex request/response channels and the simulated remote service.
//!
//! The pipeline talks to a "remote" data-acquisition service over named,
//! message-framed channels: write one framed request, read one framed
//! response, strictly alternating. This module provides that interface
//! backed by an in-process simulation, the same way the network module in
//! a transport-less simulator stands in for a real link.
//!
//! # Channel Lifecycle
//!
//! - `SimService::open("control")` yields the control channel.
//! - `SimChannel::spawn` performs the new-channel handshake: send the
//!   new-channel tag, read back a generated name, open that name. Each
//!   worker owns the channel it is handed exclusively.
//! - A quit frame releases the remote side; any later traffic on that
//!   endpoint is a transport error.
//!
//! # Remote Semantics
//!
//! - Data request: replies with one 8-byte sample value, a deterministic
//!   per-source waveform with seeded noise. Given the same seed and
//!   request, the value is bit-identical.
//! - File chunk request with `length == 0`: replies with the 8-byte total
//!   size of the named file under the service's data directory.
//! - File chunk request with `length > 0`: replies with exactly that byte
//!   range of the file.
//!
//! # Determinism
//!
//! All sample noise comes from a ChaCha8 RNG seeded per request from the
//! service seed and the request fields, so runs are reproducible without
//! any shared RNG state across channels.

use crate::error::{Result, TransportError};
use crate::message::{DataRequest, FileChunkRequest, Request};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Name of the control channel every run starts from.
pub const CONTROL_CHANNEL: &str = "control";

/// Upper bound on a generated channel name, for handshake reads.
pub const MAX_CHANNEL_NAME: usize = 30;

/// Configuration for the simulated service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Seed for the per-request sample noise
    pub seed: u64,

    /// Directory the service serves files from
    pub data_dir: PathBuf,

    /// Hard cap on one framed message in either direction
    pub max_message: usize,
}

/// Shared state of the simulated remote service.
struct ServiceState {
    config: ServiceConfig,
    /// Names the service has minted (or pre-registered) and will open
    registered: Mutex<HashSet<String>>,
    next_channel: AtomicU64,
}

/// Handle to the simulated remote service; mints channel endpoints.
pub struct SimService {
    state: Arc<ServiceState>,
}

impl SimService {
    /// Start a simulated service. The control channel name is registered
    /// up front; every other name must come from the handshake.
    pub fn new(config: ServiceConfig) -> Self {
        let mut registered = HashSet::new();
        registered.insert(CONTROL_CHANNEL.to_string());
        Self {
            state: Arc::new(ServiceState {
                config,
                registered: Mutex::new(registered),
                next_channel: AtomicU64::new(0),
            }),
        }
    }

    /// Open an endpoint on a registered channel name.
    ///
    /// # Errors
    /// `TransportError::UnknownChannel` if the service never minted `name`.
    pub fn open(&self, name: &str) -> Result<SimChannel> {
        let registered = self.state.registered.lock().unwrap();
        if !registered.contains(name) {
            return Err(TransportError::UnknownChannel(name.to_string()).into());
        }
        Ok(SimChannel {
            name: name.to_string(),
            state: Arc::clone(&self.state),
            pending: None,
            closed: false,
        })
    }

    /// Hard cap on one framed message, as configured.
    pub fn max_message(&self) -> usize {
        self.state.config.max_message
    }
}

/// One endpoint of a named duplex channel to the simulated service.
///
/// Strictly alternating: one `send`, then one `recv` (quit frames have no
/// reply). Not shareable; each worker owns its channel exclusively.
pub struct SimChannel {
    name: String,
    state: Arc<ServiceState>,
    /// Reply produced by the last request, consumed by the next `recv`
    pending: Option<Vec<u8>>,
    closed: bool,
}

impl SimChannel {
    /// Channel name, as minted by the service.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Write one framed request.
    ///
    /// # Panics
    /// A frame longer than the configured max message size is a programming
    /// error (the fixed-message-size assumption underpins every read in the
    /// pipeline) and is asserted, not reported.
    ///
    /// # Errors
    /// - `TransportError::ChannelClosed` after a quit frame
    /// - Protocol errors if the frame does not decode
    /// - Transport/file errors from serving the request
    pub fn send(&mut self, frame: &[u8]) -> Result<()> {
        assert!(
            frame.len() <= self.state.config.max_message,
            "frame of {} bytes exceeds max message size {}",
            frame.len(),
            self.state.config.max_message
        );
        if self.closed {
            return Err(TransportError::ChannelClosed(self.name.clone()).into());
        }
        debug_assert!(self.pending.is_none(), "previous reply never read");

        let request = Request::decode(frame)?;
        self.pending = self.serve(request)?;
        Ok(())
    }

    /// Read the reply to the last request, up to `max_len` bytes.
    ///
    /// # Panics
    /// A reply longer than `max_len` means the caller sized its read below
    /// the protocol's fixed response size; asserted, not reported.
    ///
    /// # Errors
    /// - `TransportError::ChannelClosed` after a quit frame
    /// - `TransportError::NoReplyPending` if nothing was sent first
    pub fn recv(&mut self, max_len: usize) -> Result<Vec<u8>> {
        if self.closed {
            return Err(TransportError::ChannelClosed(self.name.clone()).into());
        }
        let reply = self
            .pending
            .take()
            .ok_or_else(|| TransportError::NoReplyPending(self.name.clone()))?;
        assert!(
            reply.len() <= max_len,
            "reply of {} bytes exceeds read buffer of {}",
            reply.len(),
            max_len
        );
        Ok(reply)
    }

    /// New-channel handshake: mint a fresh channel on the remote side and
    /// open an endpoint for it.
    pub fn spawn(&mut self) -> Result<SimChannel> {
        self.send(&Request::NewChannel.encode()?)?;
        let raw = self.recv(MAX_CHANNEL_NAME)?;
        let name = String::from_utf8(raw)
            .map_err(|_| crate::error::ProtocolError::InvalidString)?;
        Ok(SimChannel {
            name,
            state: Arc::clone(&self.state),
            pending: None,
            closed: false,
        })
    }

    /// Compute the remote side's reply for one request. `None` for quit.
    fn serve(&mut self, request: Request) -> Result<Option<Vec<u8>>> {
        match request {
            Request::Data(dm) => Ok(Some(sample_value(self.state.config.seed, &dm)
                .to_le_bytes()
                .to_vec())),
            Request::FileChunk(fm) => self.serve_file(&fm).map(Some),
            Request::NewChannel => {
                let id = self.state.next_channel.fetch_add(1, Ordering::Relaxed);
                let name = format!("aux_{id}");
                self.state
                    .registered
                    .lock()
                    .unwrap()
                    .insert(name.clone());
                Ok(Some(name.into_bytes()))
            }
            Request::Quit => {
                self.closed = true;
                self.state.registered.lock().unwrap().remove(&self.name);
                Ok(None)
            }
            // The queue sentinel has no meaning to the remote; echo an
            // empty reply so pass-through senders stay in alternation.
            Request::Shutdown => Ok(Some(Vec::new())),
        }
    }

    /// Serve a file request: size probe when `length == 0`, byte range
    /// otherwise.
    fn serve_file(&self, fm: &FileChunkRequest) -> Result<Vec<u8>> {
        let path = self.state.config.data_dir.join(&fm.filename);
        let unavailable = || TransportError::FileUnavailable(fm.filename.clone());

        if fm.length == 0 {
            let size = std::fs::metadata(&path).map_err(|_| unavailable())?.len();
            return Ok(size.to_le_bytes().to_vec());
        }

        let mut file = File::open(&path).map_err(|_| unavailable())?;
        file.seek(SeekFrom::Start(fm.offset))?;
        let mut chunk = vec![0u8; fm.length as usize];
        file.read_exact(&mut chunk).map_err(|_| unavailable())?;
        Ok(chunk)
    }
}

/// Deterministic sample for one data request: a slow per-source waveform
/// plus bounded seeded noise, always inside the histogram range.
fn sample_value(seed: u64, dm: &DataRequest) -> f64 {
    let request_seed = seed
        ^ ((dm.source_id as u64) << 48)
        ^ ((dm.sensor_id as u64) << 40)
        ^ dm.timestamp.to_bits();
    let mut rng = ChaCha8Rng::seed_from_u64(request_seed);

    // Per-source frequency offset keeps the histograms visibly distinct.
    let frequency = 1.0 + dm.source_id as f64 * 0.05;
    let phase = dm.timestamp * std::f64::consts::TAU * frequency;
    let noise: f64 = rng.gen_range(-0.2..=0.2);

    // Amplitude 1.2 + noise 0.2 stays strictly inside [-1.5, 1.5].
    phase.sin() * 1.2 + noise
}
