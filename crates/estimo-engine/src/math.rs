//! Pure scoring arithmetic.
//!
//! Every function here is deterministic and free of I/O so the completion
//! engine can be reasoned about from stored assessments alone.

/// Weighted arithmetic mean of `(value, weight)` pairs.
///
/// Returns `0.0` for an empty input or when the weights sum to zero.
#[must_use]
pub fn weighted_mean(samples: impl IntoIterator<Item = (f64, f64)>) -> f64 {
    let (weighted_sum, total_weight) = samples
        .into_iter()
        .fold((0.0, 0.0), |(sum, total), (value, weight)| {
            (value.mul_add(weight, sum), total + weight)
        });
    if total_weight == 0.0 {
        return 0.0;
    }
    weighted_sum / total_weight
}

/// Multiplier a completed risk applies to its epic's base score.
///
/// The score is rounded half away from zero before banding:
/// `>= 13` -> 1.30, `>= 9` -> 1.20, `>= 5` -> 1.10, otherwise 1.05.
#[must_use]
pub fn risk_coefficient(weighted_score: f64) -> f64 {
    let rounded = weighted_score.round();
    if rounded >= 13.0 {
        1.30
    } else if rounded >= 9.0 {
        1.20
    } else if rounded >= 5.0 {
        1.10
    } else {
        1.05
    }
}

/// Base score scaled by every coefficient, rounded half away from zero.
#[must_use]
pub fn final_score(base: f64, coefficients: impl IntoIterator<Item = f64>) -> f64 {
    coefficients
        .into_iter()
        .fold(base, |score, coefficient| score * coefficient)
        .round()
}
