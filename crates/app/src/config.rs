//! Configuration for the acquisim command line.
//!
//! Handles parsing command-line arguments and generating sensible
//! defaults. The tool should work with ZERO arguments: a plain `acquisim`
//! runs a data-mode acquisition with the stock pool sizes, and every
//! default is printable so runs are reproducible.

use acquisim_core::orchestrator::RunConfig;
use std::path::PathBuf;

/// Complete configuration for one run.
#[derive(Debug, Clone)]
pub struct Config {
    // === Pipeline shape ===
    /// Data requests per source
    pub samples: u32,

    /// Number of simulated sources
    pub sources: u16,

    /// Worker pool size
    pub workers: usize,

    /// Capacity of the request and response queues
    pub capacity: usize,

    /// Hard cap on one framed message
    pub max_message: usize,

    /// Aggregator pool size
    pub aggregators: usize,

    // === Mode ===
    /// Remote file to transfer; switches into file mode
    pub file: Option<String>,

    // === Paths ===
    /// Directory the simulated service serves files from
    pub data_dir: PathBuf,

    /// Directory the reassembled file lands in
    pub out_dir: PathBuf,

    // === Behavior ===
    /// Seed for the simulated service (and sample-file generation)
    pub seed: u64,

    /// Size of the generated sample file when `--file` names one that
    /// does not exist yet
    pub gen_bytes: u64,

    /// Whether to print the resolved configuration
    pub print_config: bool,
}

impl Config {
    /// Parse configuration from command-line arguments.
    ///
    /// If `--seed` is omitted, a time-based seed is used (and printed with
    /// `--print-config`, so any run can be replayed).
    pub fn from_args(args: &[String]) -> Result<Self, String> {
        let mut samples: Option<u32> = None;
        let mut sources: Option<u16> = None;
        let mut workers: Option<usize> = None;
        let mut capacity: Option<usize> = None;
        let mut max_message: Option<usize> = None;
        let mut aggregators: Option<usize> = None;
        let mut file: Option<String> = None;
        let mut data_dir: Option<PathBuf> = None;
        let mut out_dir: Option<PathBuf> = None;
        let mut seed: Option<u64> = None;
        let mut gen_bytes: Option<u64> = None;
        let mut print_config = false;

        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--samples" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--samples requires a number".to_string());
                    }
                    samples = Some(args[i].parse().map_err(|_| "invalid samples")?);
                }
                "--sources" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--sources requires a number".to_string());
                    }
                    sources = Some(args[i].parse().map_err(|_| "invalid sources")?);
                }
                "--workers" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--workers requires a number".to_string());
                    }
                    workers = Some(args[i].parse().map_err(|_| "invalid workers")?);
                }
                "--capacity" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--capacity requires a number".to_string());
                    }
                    capacity = Some(args[i].parse().map_err(|_| "invalid capacity")?);
                }
                "--max-message" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--max-message requires a number".to_string());
                    }
                    max_message = Some(args[i].parse().map_err(|_| "invalid max-message")?);
                }
                "--aggregators" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--aggregators requires a number".to_string());
                    }
                    aggregators = Some(args[i].parse().map_err(|_| "invalid aggregators")?);
                }
                "--file" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--file requires a name".to_string());
                    }
                    file = Some(args[i].clone());
                }
                "--data-dir" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--data-dir requires a path".to_string());
                    }
                    data_dir = Some(PathBuf::from(&args[i]));
                }
                "--out-dir" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--out-dir requires a path".to_string());
                    }
                    out_dir = Some(PathBuf::from(&args[i]));
                }
                "--seed" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--seed requires a number".to_string());
                    }
                    seed = Some(args[i].parse().map_err(|_| "invalid seed")?);
                }
                "--gen-bytes" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--gen-bytes requires a number".to_string());
                    }
                    gen_bytes = Some(args[i].parse().map_err(|_| "invalid gen-bytes")?);
                }
                "--print-config" => {
                    print_config = true;
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                _ => {
                    return Err(format!("unknown argument: {}", args[i]));
                }
            }
            i += 1;
        }

        // Determine seed (explicit or time-based)
        let seed = seed.unwrap_or_else(|| {
            use std::time::{SystemTime, UNIX_EPOCH};
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_millis() as u64
        });

        let config = Config {
            samples: samples.unwrap_or(100),
            sources: sources.unwrap_or(10),
            workers: workers.unwrap_or(16),
            capacity: capacity.unwrap_or(32),
            max_message: max_message.unwrap_or(256),
            aggregators: aggregators.unwrap_or(2),
            file,
            data_dir: data_dir.unwrap_or_else(|| PathBuf::from("./data")),
            out_dir: out_dir.unwrap_or_else(|| PathBuf::from("./received")),
            seed,
            gen_bytes: gen_bytes.unwrap_or(256 * 1024),
            print_config,
        };

        config.validate()?;
        Ok(config)
    }

    /// Cheap shape checks; the orchestrator re-validates what it depends
    /// on, this only catches obvious typos early with friendlier messages.
    fn validate(&self) -> Result<(), String> {
        if self.workers == 0 {
            return Err("--workers must be at least 1".to_string());
        }
        if self.capacity == 0 {
            return Err("--capacity must be at least 1".to_string());
        }
        if self.file.is_none() {
            if self.sources == 0 {
                return Err("--sources must be at least 1".to_string());
            }
            if self.aggregators == 0 {
                return Err("--aggregators must be at least 1".to_string());
            }
        }
        Ok(())
    }

    /// Lower into the orchestrator's run configuration.
    pub fn to_run_config(&self) -> RunConfig {
        RunConfig {
            samples_per_source: self.samples,
            source_count: self.sources,
            worker_count: self.workers,
            queue_capacity: self.capacity,
            max_message: self.max_message,
            aggregator_count: self.aggregators,
            file: self.file.clone(),
            data_dir: self.data_dir.clone(),
            output_dir: self.out_dir.clone(),
            seed: self.seed,
        }
    }

    /// Print the configuration in human-readable form.
    pub fn print(&self) {
        println!("=== Configuration ===");
        match &self.file {
            Some(name) => println!("Mode: file transfer of {name:?}"),
            None => println!(
                "Mode: data acquisition ({} sources x {} samples)",
                self.sources, self.samples
            ),
        }
        println!("Workers: {}", self.workers);
        println!("Aggregators: {}", self.aggregators);
        println!("Queue capacity: {}", self.capacity);
        println!("Max message: {} bytes", self.max_message);
        println!("Data dir: {:?}", self.data_dir);
        println!("Out dir: {:?}", self.out_dir);
        println!("Seed: {}", self.seed);
        println!();
    }
}

fn print_help() {
    println!("acquisim: multi-role data-acquisition pipeline simulator");
    println!();
    println!("USAGE:");
    println!("    acquisim [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --samples <N>       Data requests per source (default: 100)");
    println!("    --sources <N>       Simulated sources (default: 10)");
    println!("    --workers <N>       Worker pool size (default: 16)");
    println!("    --capacity <N>      Queue capacity (default: 32)");
    println!("    --max-message <N>   Max framed message bytes (default: 256)");
    println!("    --aggregators <N>   Aggregator pool size (default: 2)");
    println!();
    println!("    --file <NAME>       Transfer NAME instead of sampling data");
    println!("    --data-dir <PATH>   Service data directory (default: ./data)");
    println!("    --out-dir <PATH>    Destination directory (default: ./received)");
    println!("    --gen-bytes <N>     Size of a generated sample file (default: 262144)");
    println!();
    println!("    --seed <N>          Random seed for determinism");
    println!("    --print-config      Print resolved configuration");
    println!("    --help, -h          Print this help");
    println!();
    println!("EXAMPLES:");
    println!("    acquisim                                   # data mode, stock pools");
    println!("    acquisim --sources 2 --samples 5           # tiny data run");
    println!("    acquisim --file signal.bin --max-message 1024");
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Config, String> {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        Config::from_args(&args)
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.samples, 100);
        assert_eq!(config.sources, 10);
        assert_eq!(config.workers, 16);
        assert!(config.file.is_none());
    }

    #[test]
    fn test_file_mode_flag() {
        let config = parse(&["--file", "signal.bin", "--max-message", "1024"]).unwrap();
        assert_eq!(config.file.as_deref(), Some("signal.bin"));
        assert_eq!(config.max_message, 1024);
    }

    #[test]
    fn test_seed_is_reproducible() {
        let config = parse(&["--seed", "77"]).unwrap();
        assert_eq!(config.seed, 77);
    }

    #[test]
    fn test_missing_value() {
        assert!(parse(&["--workers"]).is_err());
    }

    #[test]
    fn test_unknown_flag() {
        assert!(parse(&["--frobnicate"]).is_err());
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(parse(&["--workers", "0"]).is_err());
    }

    #[test]
    fn test_zero_sources_allowed_in_file_mode() {
        // Sources are a data-mode concern; file mode ignores them.
        let config = parse(&["--file", "x.bin", "--sources", "0"]).unwrap();
        assert_eq!(config.sources, 0);
    }
}
