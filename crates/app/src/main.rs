//! acquisim: command-line front end for the acquisition pipeline.
//!
//! Parses flags, prepares the service's data directory (generating a
//! sample file for file-mode runs that name a file which does not exist
//! yet), hands a run configuration to the orchestrator, and prints the
//! run report.

mod config;
mod input_gen;

use acquisim_core::orchestrator;
use config::Config;

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let config = match Config::from_args(&args) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("error: {message}");
            eprintln!("try --help for usage");
            std::process::exit(2);
        }
    };

    if config.print_config {
        config.print();
    }

    if let Err(error) = run(&config) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run(config: &Config) -> acquisim_core::Result<()> {
    std::fs::create_dir_all(&config.data_dir)?;

    if let Some(name) = &config.file {
        let source = config.data_dir.join(name);
        if !source.exists() {
            println!(
                "generating sample file {:?} ({} bytes, seed {})",
                source, config.gen_bytes, config.seed
            );
            input_gen::write_sample_file(&source, config.seed, config.gen_bytes as usize)?;
        }
    }

    let report = orchestrator::run(config.to_run_config())?;

    match &config.file {
        Some(name) => {
            println!(
                "transferred {:?}: {} bytes -> {:?}",
                name,
                report.file_bytes,
                config.out_dir.join(name)
            );
        }
        None => {
            println!(
                "aggregated {} samples ({} rejected)",
                report.samples_aggregated, report.samples_rejected
            );
        }
    }
    println!(
        "Took {}.{:06} seconds",
        report.elapsed.as_secs(),
        report.elapsed.subsec_micros()
    );

    Ok(())
}
