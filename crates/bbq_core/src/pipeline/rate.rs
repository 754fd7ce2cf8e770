//! crates/bbq_core/src/pipeline/rate.rs
//!
//! First differences over an irregular time series.

/// Per-second rate of change of `values` sampled at `times` (seconds).
///
/// `output[0]` is zero, as is any point whose timestamp equals its
/// predecessor's. The result is raw and noisy: callers convert units and run
/// it through [`smooth`](super::smoother::smooth) before display.
///
/// # Panics
///
/// Panics if `times` and `values` differ in length.
pub fn first_difference(times: &[f64], values: &[f64]) -> Vec<f64> {
    assert_eq!(times.len(), values.len(), "times and values must be index-aligned");
    if values.is_empty() {
        return Vec::new();
    }

    let mut output = Vec::with_capacity(values.len());
    output.push(0.0);
    for i in 1..values.len() {
        let dt = times[i] - times[i - 1];
        if dt == 0.0 {
            output.push(0.0);
        } else {
            output.push((values[i] - values[i - 1]) / dt);
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_in_empty_out() {
        assert!(first_difference(&[], &[]).is_empty());
    }

    #[test]
    fn per_second_slope() {
        let out = first_difference(&[0.0, 60.0, 120.0], &[100.0, 101.0, 103.0]);
        assert_eq!(out[0], 0.0);
        assert!((out[1] - 1.0 / 60.0).abs() < 1e-12);
        assert!((out[2] - 2.0 / 60.0).abs() < 1e-12);
    }
}
