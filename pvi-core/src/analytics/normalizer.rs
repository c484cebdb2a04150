//! PVI score normalization
//!
//! Reduces the raw weighted-effort sum to a 0–99 score with exponential
//! saturation:
//!
//! ```text
//! raw   = Σ duration_minutes × task_difficulty
//! score = round(100 × (1 − e^(−raw / K)))      K = 500
//! ```
//!
//! A raw sum of K maps to ~63, 2K to ~86, 3K to ~95.

use crate::types::ResolvedLog;

/// Saturation constant: the raw sum that maps to 1 − 1/e of the range.
pub const SATURATION_K: f64 = 500.0;

/// Highest score ever reported. The curve only approaches 100.
pub const MAX_SCORE: u8 = 99;

/// Raw and normalized score of one aggregation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PviScore {
    pub raw: f64,
    pub normalized: u8,
}

/// Score a window of resolved logs.
pub fn score(logs: &[ResolvedLog]) -> PviScore {
    let raw = raw_score(logs);
    PviScore {
        raw,
        normalized: normalize(raw),
    }
}

/// Σ duration × difficulty; zero for an empty window.
pub fn raw_score(logs: &[ResolvedLog]) -> f64 {
    logs.iter().map(ResolvedLog::weighted_effort).sum::<u64>() as f64
}

/// Map a raw sum onto `0..=99`.
///
/// Negative or NaN input is treated as zero. Results that round up to 100 are
/// held at [`MAX_SCORE`].
pub fn normalize(raw: f64) -> u8 {
    if raw.is_nan() || raw <= 0.0 {
        return 0;
    }
    let saturated = 100.0 * (1.0 - (-raw / SATURATION_K).exp());
    (saturated.round() as u8).min(MAX_SCORE)
}
