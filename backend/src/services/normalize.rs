//! Reproducible noise and min-max rescaling of raw landscape grids.
//!
//! Both the seed hash and the generator are pinned so that the same
//! `(grid, seed_key)` yields bit-identical output on every platform:
//!
//! - seed: 64-bit FNV-1a over the UTF-8 bytes of the key, modulo 10000
//! - noise: SplitMix64 seeded with that value, one draw per cell in
//!   row-major order, scaled into `[0, NOISE_AMPLITUDE)`

use ndarray::Array2;

use crate::models::error::AppError;

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

const SEED_MODULUS: u64 = 10_000;
pub const NOISE_AMPLITUDE: f64 = 0.05;

pub const NORMALIZED_MIN: f64 = 0.3;
pub const NORMALIZED_MAX: f64 = 1.0;

pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in bytes {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

pub fn seed_for(seed_key: &str) -> u64 {
    fnv1a_64(seed_key.as_bytes()) % SEED_MODULUS
}

/// SplitMix64 (Steele, Lea, Flood 2014).
#[derive(Debug, Clone)]
pub struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9e3779b97f4a7c15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
        z ^ (z >> 31)
    }

    /// Uniform in `[0, 1)` from the upper 53 bits.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }
}

/// Adds seeded noise to `grid`, then rescales it into
/// `[NORMALIZED_MIN, NORMALIZED_MAX]`.
///
/// A flat grid (max == min after noise) maps every cell to `NORMALIZED_MIN`.
/// Non-finite cells are rejected rather than propagated.
pub fn normalize(grid: &Array2<f64>, seed_key: &str) -> Result<Array2<f64>, AppError> {
    let mut rng = SplitMix64::new(seed_for(seed_key));

    // Array2 iterates in logical row-major order regardless of memory layout.
    let mut noisy = grid.clone();
    for value in noisy.iter_mut() {
        *value += rng.next_f64() * NOISE_AMPLITUDE;
    }

    if let Some(((row, col), value)) = noisy.indexed_iter().find(|(_, v)| !v.is_finite()) {
        return Err(AppError::Computation(format!(
            "non-finite landscape value {} at ({}, {})",
            value, row, col
        )));
    }

    let min = noisy.iter().copied().fold(f64::INFINITY, f64::min);
    let max = noisy.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    let scale = NORMALIZED_MAX - NORMALIZED_MIN;

    Ok(noisy.mapv(|v| {
        if span > 0.0 {
            (NORMALIZED_MIN + scale * (v - min) / span).clamp(NORMALIZED_MIN, NORMALIZED_MAX)
        } else {
            NORMALIZED_MIN
        }
    }))
}
