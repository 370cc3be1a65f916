//! acquisim-core: a multi-role data-acquisition pipeline simulator
//!
//! This library simulates a staged acquisition pipeline: synthetic sources
//! emit timestamped sample requests, a worker pool relays them to a remote
//! service over private request/response channels, and aggregators fold
//! the results into per-source histograms. A second mode swaps the sources
//! for a file-chunking producer that reassembles a remote file locally.
//!
//! # Architecture
//!
//! The system is designed around clear module boundaries:
//! - `queue`: the blocking bounded FIFO every stage hangs off
//! - `message`: the closed request/response enumerations and wire codec
//! - `channel`: named duplex channels to the simulated remote service
//! - `histogram`: per-source fixed-bin histograms with internal locking
//! - `producer`: source simulators and the file chunker
//! - `worker`: the relay loop between the queues and a channel
//! - `aggregator`: the histogram-update loop
//! - `orchestrator`: wiring, the drain protocol, timing, reporting
//!
//! # Design Principles
//!
//! - **Bounded memory**: both queues have fixed capacity and block rather
//!   than grow
//! - **Explicit shutdown**: stop sentinels are enum variants injected only
//!   after the stage ahead has fully drained, never reserved data values
//! - **Deterministic**: the simulated service derives every sample from a
//!   seed, so runs are reproducible
//! - **Structured errors**: recoverable failures are typed errors;
//!   contract violations are asserted preconditions

pub mod aggregator;
pub mod channel;
pub mod error;
pub mod histogram;
pub mod message;
pub mod orchestrator;
pub mod producer;
pub mod queue;
pub mod worker;

// Re-export commonly used types
pub use error::{Error, Result};
