//! Benchmark utilities for TickDB.

use rand::Rng;

/// Generates a random payload of the given size.
pub fn random_payload(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generates `count` distinct series keys.
pub fn series_keys(count: usize) -> Vec<Vec<u8>> {
    (0..count)
        .map(|i| format!("series-{i:06}").into_bytes())
        .collect()
}
