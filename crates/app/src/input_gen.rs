//! Sample-file generation for file-transfer runs.
//!
//! When `--file` names a file that does not exist under the data
//! directory, we generate one: a synthetic sensor log mixing quantized
//! waveform sections, flat idle stretches, and raw noise bursts. The mix
//! makes chunk boundaries easy to eyeball in a hex dump and keeps the
//! content deterministic per seed.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::io::Write;

/// Generate `size_bytes` of synthetic sensor-log data.
pub fn generate_sample_data(seed: u64, size_bytes: usize) -> Vec<u8> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut data = Vec::with_capacity(size_bytes);

    let mut remaining = size_bytes;
    while remaining > 0 {
        let section = remaining.min(4096);

        match rng.gen_range(0..10u8) {
            // 50% quantized waveform: a sine sampled at the section's own
            // frequency, offset into u8 space
            0..=4 => {
                let frequency = rng.gen_range(0.01..0.2);
                let phase: f64 = rng.gen_range(0.0..std::f64::consts::TAU);
                for i in 0..section {
                    let value = ((i as f64 * frequency + phase).sin() + 1.0) * 127.0;
                    data.push(value as u8);
                }
            }

            // 30% idle stretch: a held reading
            5..=7 => {
                let held: u8 = rng.gen();
                data.extend(std::iter::repeat(held).take(section));
            }

            // 20% noise burst
            _ => {
                for _ in 0..section {
                    data.push(rng.gen());
                }
            }
        }

        remaining = remaining.saturating_sub(section);
    }

    data.truncate(size_bytes);
    data
}

/// Write generated data to a file.
pub fn write_sample_file(
    path: &std::path::Path,
    seed: u64,
    size_bytes: usize,
) -> std::io::Result<()> {
    let data = generate_sample_data(seed, size_bytes);
    let mut file = std::fs::File::create(path)?;
    file.write_all(&data)?;
    Ok(())
}
