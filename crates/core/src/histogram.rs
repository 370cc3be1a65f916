//! Per-source histograms with fixed bins over a fixed range.
//!
//! Aggregators fold sample values into one histogram per source. Sample
//! consumption is not partitioned by source id, so two aggregators can
//! update the same source's histogram concurrently; every histogram keeps
//! its counters behind its own mutex for exactly that reason.
//!
//! Out-of-range values are never dropped silently: anything below the range
//! lands in an underflow counter, anything at or above the top in an
//! overflow counter.

use std::sync::Mutex;

/// Counter state of one histogram, guarded as a unit.
#[derive(Debug, Default)]
struct BinCounts {
    counts: Vec<u64>,
    underflow: u64,
    overflow: u64,
}

/// Fixed-bin histogram over `[low, high)`.
#[derive(Debug)]
pub struct Histogram {
    low: f64,
    high: f64,
    bin_width: f64,
    bins: Mutex<BinCounts>,
}

impl Histogram {
    /// Create a histogram with `bin_count` equal-width bins over
    /// `[low, high)`.
    ///
    /// # Panics
    /// Zero bins or an empty range is a programming error and is asserted.
    pub fn new(bin_count: usize, low: f64, high: f64) -> Self {
        assert!(bin_count > 0, "histogram needs at least one bin");
        assert!(high > low, "histogram range must be non-empty");
        Self {
            low,
            high,
            bin_width: (high - low) / bin_count as f64,
            bins: Mutex::new(BinCounts {
                counts: vec![0; bin_count],
                ..BinCounts::default()
            }),
        }
    }

    /// Fold one sample into the histogram. Safe to call from any thread.
    pub fn update(&self, value: f64) {
        let mut bins = self.bins.lock().unwrap();
        if value < self.low {
            bins.underflow += 1;
        } else if value >= self.high {
            bins.overflow += 1;
        } else {
            let index = ((value - self.low) / self.bin_width) as usize;
            // Floating-point division can land exactly on bin_count at the
            // top edge; clamp into the last bin.
            let index = index.min(bins.counts.len() - 1);
            bins.counts[index] += 1;
        }
    }

    /// Number of in-range samples folded so far.
    pub fn sample_count(&self) -> u64 {
        self.bins.lock().unwrap().counts.iter().sum()
    }

    /// Number of samples that fell outside `[low, high)`.
    pub fn out_of_range_count(&self) -> u64 {
        let bins = self.bins.lock().unwrap();
        bins.underflow + bins.overflow
    }

    /// Snapshot of the per-bin counts.
    pub fn counts(&self) -> Vec<u64> {
        self.bins.lock().unwrap().counts.clone()
    }

    /// One-line rendering: sample count plus the raw bin counts.
    fn render(&self) -> String {
        let bins = self.bins.lock().unwrap();
        let total: u64 = bins.counts.iter().sum();
        let row = bins
            .counts
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        format!("{total} samples | {row}")
    }
}

/// One histogram per source id `1..=source_count`.
pub struct HistogramCollection {
    histograms: Vec<Histogram>,
}

impl HistogramCollection {
    /// Create `source_count` histograms with identical bin layout.
    pub fn new(source_count: u16, bin_count: usize, low: f64, high: f64) -> Self {
        Self {
            histograms: (0..source_count)
                .map(|_| Histogram::new(bin_count, low, high))
                .collect(),
        }
    }

    /// Number of sources the collection covers.
    pub fn source_count(&self) -> u16 {
        self.histograms.len() as u16
    }

    /// Fold a sample into the histogram for `source_id`.
    ///
    /// Returns false (and folds nothing) for ids outside
    /// `1..=source_count`; the caller decides whether that is worth
    /// counting.
    pub fn update(&self, source_id: u16, value: f64) -> bool {
        if source_id == 0 || source_id as usize > self.histograms.len() {
            return false;
        }
        self.histograms[source_id as usize - 1].update(value);
        true
    }

    /// Histogram for one source id, if it is in range.
    pub fn get(&self, source_id: u16) -> Option<&Histogram> {
        if source_id == 0 {
            return None;
        }
        self.histograms.get(source_id as usize - 1)
    }

    /// Total in-range samples across all sources.
    pub fn sample_count(&self) -> u64 {
        self.histograms.iter().map(Histogram::sample_count).sum()
    }

    /// Print every histogram, one row per source.
    pub fn print_all(&self) {
        println!("=== Histograms ===");
        for (index, histogram) in self.histograms.iter().enumerate() {
            println!("source {:>2}: {}", index + 1, histogram.render());
        }
        println!();
    }
}
