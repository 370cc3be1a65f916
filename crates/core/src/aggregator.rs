//! Aggregator role: fold sample events into the histograms.
//!
//! Aggregators draw from one shared response queue without partitioning by
//! source id, so samples for one source can be split across aggregators;
//! the histogram collection serializes its own mutation (see the
//! `histogram` module) to make that safe.
//!
//! A sample with an id outside the configured source range is rejected and
//! counted, never a crash and never a stop signal: shutdown is its own
//! explicit variant rather than a reserved id.

use crate::histogram::HistogramCollection;
use crate::message::SampleEvent;
use crate::queue::BoundedQueue;

/// Pop sample events and update histograms until the shutdown sentinel
/// arrives. Returns the number of rejected (out-of-range) samples.
pub fn run_aggregator(
    responses: &BoundedQueue<SampleEvent>,
    histograms: &HistogramCollection,
) -> u64 {
    let mut rejected = 0;
    loop {
        match responses.pop() {
            SampleEvent::Sample(sample) => {
                if !histograms.update(sample.source_id, sample.value) {
                    rejected += 1;
                }
            }
            SampleEvent::Shutdown => return rejected,
        }
    }
}
