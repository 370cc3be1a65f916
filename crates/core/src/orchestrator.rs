//! Run orchestration: wiring, startup, drain, and reporting.
//!
//! A run moves through five phases:
//!
//! ```text
//! Setup -> Running -> Draining -> Reporting -> Done
//! ```
//!
//! - Setup: open the control channel, mint one private channel per worker
//!   via the new-channel handshake, build both queues (and the histograms
//!   in data mode).
//! - Running: spawn every producer, worker, and aggregator thread.
//! - Draining: join producers first, so no real request can ever trail a
//!   stop sentinel in FIFO order; then inject exactly one `Shutdown` per
//!   worker and join the workers; then (data mode) exactly one sentinel
//!   per aggregator and join those. This ordering is the correctness
//!   linchpin of the whole shutdown protocol.
//! - Reporting: stop the clock, print histograms, release the control
//!   channel with a quit frame.
//!
//! Role threads report failure by returning an error from their closure.
//! Joins run unconditionally and the first error is surfaced afterwards,
//! so whatever was aggregated before a failure still gets reported.

use crate::aggregator::run_aggregator;
use crate::channel::{ServiceConfig, SimChannel, SimService, CONTROL_CHANNEL};
use crate::error::{Error, Result};
use crate::histogram::HistogramCollection;
use crate::message::{Request, SampleEvent, DATA_REQUEST_SIZE, FILE_CHUNK_HEADER_SIZE};
use crate::producer::{FileChunker, SourceSimulator};
use crate::queue::BoundedQueue;
use crate::worker::Worker;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Bin count of every per-source histogram.
pub const HISTOGRAM_BINS: usize = 30;

/// Histogram value range, matching the sensor waveform's envelope.
pub const HISTOGRAM_LOW: f64 = -1.5;
pub const HISTOGRAM_HIGH: f64 = 1.5;

/// Everything one run needs. Built by the CLI layer or by tests.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Data requests emitted per source (data mode)
    pub samples_per_source: u32,

    /// Number of simulated sources, ids `1..=source_count` (data mode)
    pub source_count: u16,

    /// Worker pool size; also the number of auxiliary channels
    pub worker_count: usize,

    /// Capacity of both the request and the response queue
    pub queue_capacity: usize,

    /// Hard cap on one framed message; also the chunk stride in file mode
    pub max_message: usize,

    /// Aggregator pool size (data mode)
    pub aggregator_count: usize,

    /// Remote file to transfer; switches the run into file mode
    pub file: Option<String>,

    /// Directory the simulated service serves files from
    pub data_dir: PathBuf,

    /// Directory the reassembled file is written into (file mode)
    pub output_dir: PathBuf,

    /// Seed for the simulated service's sample noise
    pub seed: u64,
}

/// What a finished run hands back for reporting.
#[derive(Debug, Clone, Copy)]
pub struct RunReport {
    /// Wall time from first spawn to last join
    pub elapsed: Duration,

    /// In-range samples folded into histograms (data mode)
    pub samples_aggregated: u64,

    /// Samples rejected for an out-of-range source id (data mode)
    pub samples_rejected: u64,

    /// Bytes of the transferred file (file mode)
    pub file_bytes: u64,
}

/// Execute one full run.
pub fn run(config: RunConfig) -> Result<RunReport> {
    validate(&config)?;

    // Setup: control channel, one private channel per worker, queues.
    let service = SimService::new(ServiceConfig {
        seed: config.seed,
        data_dir: config.data_dir.clone(),
        max_message: config.max_message,
    });
    let mut control = service.open(CONTROL_CHANNEL)?;
    let mut channels = Vec::with_capacity(config.worker_count);
    for _ in 0..config.worker_count {
        channels.push(control.spawn()?);
    }

    let requests = Arc::new(BoundedQueue::new(config.queue_capacity));
    let responses = Arc::new(BoundedQueue::new(config.queue_capacity));

    match config.file.clone() {
        Some(filename) => run_file_mode(&config, control, channels, &requests, &responses, filename),
        None => run_data_mode(&config, control, channels, &requests, &responses),
    }
}

/// Data mode: sources -> workers -> aggregators -> histograms.
fn run_data_mode(
    config: &RunConfig,
    mut control: SimChannel,
    channels: Vec<SimChannel>,
    requests: &Arc<BoundedQueue<Request>>,
    responses: &Arc<BoundedQueue<SampleEvent>>,
) -> Result<RunReport> {
    let histograms = Arc::new(HistogramCollection::new(
        config.source_count,
        HISTOGRAM_BINS,
        HISTOGRAM_LOW,
        HISTOGRAM_HIGH,
    ));
    let start = Instant::now();

    // Running: one thread per role instance.
    let mut producers = Vec::with_capacity(config.source_count as usize);
    for source_id in 1..=config.source_count {
        let simulator = SourceSimulator {
            source_id,
            sensor_id: 1,
            samples: config.samples_per_source,
        };
        let requests = Arc::clone(requests);
        producers.push(
            thread::Builder::new()
                .name(format!("source-{source_id}"))
                .spawn(move || simulator.run(&requests))?,
        );
    }

    let workers = spawn_workers(config, channels, requests, responses)?;

    let mut aggregators = Vec::with_capacity(config.aggregator_count);
    for index in 0..config.aggregator_count {
        let responses = Arc::clone(responses);
        let histograms = Arc::clone(&histograms);
        aggregators.push(
            thread::Builder::new()
                .name(format!("aggregator-{index}"))
                .spawn(move || run_aggregator(&responses, &histograms))?,
        );
    }

    // Draining: producers first, then one sentinel per worker, then one
    // per aggregator. Sentinels injected any earlier could be consumed
    // while real data still sits behind them in FIFO order.
    let mut first_error = None;
    for handle in producers {
        if let Err(error) = join_role(handle) {
            record(&mut first_error, error);
        }
    }
    for _ in 0..config.worker_count {
        requests.push(Request::Shutdown);
    }
    for handle in workers {
        if let Err(error) = join_role(handle).and_then(|result| result) {
            record(&mut first_error, error);
        }
    }
    for _ in 0..config.aggregator_count {
        responses.push(SampleEvent::Shutdown);
    }
    let mut samples_rejected = 0;
    for handle in aggregators {
        match join_role(handle) {
            Ok(rejected) => samples_rejected += rejected,
            Err(error) => record(&mut first_error, error),
        }
    }

    // Reporting: unconditional, so a mid-run failure still shows whatever
    // made it into the histograms.
    let elapsed = start.elapsed();
    histograms.print_all();
    if let Err(error) = release_control(&mut control) {
        record(&mut first_error, error);
    }

    match first_error {
        Some(error) => Err(error),
        None => Ok(RunReport {
            elapsed,
            samples_aggregated: histograms.sample_count(),
            samples_rejected,
            file_bytes: 0,
        }),
    }
}

/// File mode: one chunking producer -> workers -> destination file.
fn run_file_mode(
    config: &RunConfig,
    control: SimChannel,
    channels: Vec<SimChannel>,
    requests: &Arc<BoundedQueue<Request>>,
    responses: &Arc<BoundedQueue<SampleEvent>>,
    filename: String,
) -> Result<RunReport> {
    std::fs::create_dir_all(&config.output_dir)?;
    let start = Instant::now();

    // Running: the chunker borrows the control channel for its size probe
    // and hands it back through the join so the run can still quit cleanly.
    let chunker = FileChunker {
        filename: filename.clone(),
        destination: config.output_dir.join(&filename),
        max_chunk: config.max_message as u64,
    };
    let producer = {
        let requests = Arc::clone(requests);
        let mut control = control;
        thread::Builder::new()
            .name("file-chunker".to_string())
            .spawn(move || {
                let result = chunker.run(&requests, &mut control);
                (control, result)
            })?
    };

    let workers = spawn_workers(config, channels, requests, responses)?;

    // Draining: chunker first, then one sentinel per worker.
    let mut first_error = None;
    let mut file_bytes = 0;
    let mut control = match join_role(producer) {
        Ok((control, result)) => {
            match result {
                Ok(bytes) => file_bytes = bytes,
                Err(error) => record(&mut first_error, error),
            }
            Some(control)
        }
        Err(error) => {
            // A panicked chunker takes its channel endpoint with it.
            record(&mut first_error, error);
            None
        }
    };

    for _ in 0..config.worker_count {
        requests.push(Request::Shutdown);
    }
    for handle in workers {
        if let Err(error) = join_role(handle).and_then(|result| result) {
            record(&mut first_error, error);
        }
    }

    let elapsed = start.elapsed();
    if let Some(control) = control.as_mut() {
        if let Err(error) = release_control(control) {
            record(&mut first_error, error);
        }
    }

    match first_error {
        Some(error) => Err(error),
        None => Ok(RunReport {
            elapsed,
            samples_aggregated: 0,
            samples_rejected: 0,
            file_bytes,
        }),
    }
}

/// Spawn the worker pool, one thread per pre-minted channel.
fn spawn_workers(
    config: &RunConfig,
    channels: Vec<SimChannel>,
    requests: &Arc<BoundedQueue<Request>>,
    responses: &Arc<BoundedQueue<SampleEvent>>,
) -> Result<Vec<JoinHandle<Result<()>>>> {
    channels
        .into_iter()
        .enumerate()
        .map(|(index, channel)| {
            let worker = Worker {
                channel,
                output_dir: config.output_dir.clone(),
                max_message: config.max_message,
            };
            let requests = Arc::clone(requests);
            let responses = Arc::clone(responses);
            thread::Builder::new()
                .name(format!("worker-{index}"))
                .spawn(move || worker.run(&requests, &responses))
                .map_err(Error::from)
        })
        .collect()
}

/// Join one role thread, mapping a panic to a thread failure.
fn join_role<T>(handle: JoinHandle<T>) -> Result<T> {
    let name = handle
        .thread()
        .name()
        .unwrap_or("unnamed role")
        .to_string();
    handle
        .join()
        .map_err(|_| Error::Thread(format!("{name} thread panicked")))
}

/// Keep the first error; later ones go to stderr so they are not lost.
fn record(first_error: &mut Option<Error>, error: Error) {
    if first_error.is_none() {
        *first_error = Some(error);
    } else {
        eprintln!("additional failure during drain: {error}");
    }
}

/// Send the terminal quit frame on the control channel.
fn release_control(control: &mut SimChannel) -> Result<()> {
    control.send(&Request::Quit.encode()?)
}

/// Reject configurations the pipeline cannot run with.
fn validate(config: &RunConfig) -> Result<()> {
    if config.worker_count == 0 {
        return Err(Error::Config("at least one worker is required".into()));
    }
    if config.queue_capacity == 0 {
        return Err(Error::Config("queue capacity must be non-zero".into()));
    }
    if config.max_message < DATA_REQUEST_SIZE.max(8) {
        return Err(Error::Config(format!(
            "max message size {} cannot carry a request or a sample reply",
            config.max_message
        )));
    }
    match &config.file {
        Some(filename) => {
            if FILE_CHUNK_HEADER_SIZE + filename.len() > config.max_message {
                return Err(Error::Config(format!(
                    "filename {filename:?} does not fit a {}-byte message",
                    config.max_message
                )));
            }
        }
        None => {
            if config.source_count == 0 {
                return Err(Error::Config("at least one source is required".into()));
            }
            if config.aggregator_count == 0 {
                return Err(Error::Config(
                    "at least one aggregator is required".into(),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(tag: &str) -> RunConfig {
        let base = std::env::temp_dir().join(format!(
            "acquisim-orchestrator-{tag}-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(base.join("data")).unwrap();
        RunConfig {
            samples_per_source: 3,
            source_count: 1,
            worker_count: 2,
            queue_capacity: 4,
            max_message: 256,
            aggregator_count: 1,
            file: None,
            data_dir: base.join("data"),
            output_dir: base.join("received"),
            seed: 11,
        }
    }

    #[test]
    fn test_small_data_run() {
        let report = run(test_config("small")).unwrap();
        assert_eq!(report.samples_aggregated, 3);
        assert_eq!(report.samples_rejected, 0);
        assert_eq!(report.file_bytes, 0);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = test_config("noworkers");
        config.worker_count = 0;
        assert!(matches!(run(config), Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut config = test_config("nocap");
        config.queue_capacity = 0;
        assert!(matches!(run(config), Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_remote_file_is_fatal_but_joins() {
        let mut config = test_config("nofile");
        config.file = Some("does-not-exist.bin".to_string());
        // The chunker's probe fails, workers still get their sentinels and
        // the run returns the transport error instead of hanging.
        assert!(matches!(run(config), Err(Error::Transport(_))));
    }

    #[test]
    fn test_oversized_filename_rejected() {
        let mut config = test_config("longname");
        config.max_message = 64;
        config.file = Some("x".repeat(64));
        assert!(matches!(run(config), Err(Error::Config(_))));
    }
}
