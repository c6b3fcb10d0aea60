//! Probability sanitization after every recomputation.

use crate::{Error, Result};

/// Default sanitization tolerance ε.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Clamp near-physical weights into [0, 1] in place.
///
/// - NaN is an error;
/// - `w ∈ [0, 1]` is kept;
/// - `w ∈ (1, 1 + ε]` becomes 1 and `w ∈ [-ε, 0)` becomes 0;
/// - anything else is an error naming the slot.
///
/// Returns the number of clamped weights.
pub fn sanitize_weights(origin: &str, weights: &mut [f64], tolerance: f64) -> Result<usize> {
    let mut clamped = 0;
    for (i, w) in weights.iter_mut().enumerate() {
        if w.is_nan() {
            return Err(Error::numerical(origin, format!("weight[{i}] is NaN")));
        }
        if (0.0..=1.0).contains(w) {
            continue;
        }
        if *w > 1.0 && *w <= 1.0 + tolerance {
            *w = 1.0;
        } else if *w < 0.0 && *w >= -tolerance {
            *w = 0.0;
        } else {
            return Err(Error::numerical(
                origin,
                format!("weight[{i}] = {w} is outside [{}, {}]", -tolerance, 1.0 + tolerance),
            ));
        }
        clamped += 1;
    }
    Ok(clamped)
}
