//! crates/bbq_core/src/pipeline/smoother.rs
//!
//! Continuous-time exponential moving average for irregularly spaced samples.

/// Smooths `values` sampled at `times` (seconds) with time constant `tau`
/// (seconds). `output[0] == values[0]`; each later point moves toward the raw
/// value by `1 - exp(-dt / tau)`, so long gaps track the input closely and
/// near-duplicate timestamps barely move the output.
///
/// Out-of-order timestamps clamp the coefficient to `[0, 1]`: a negative `dt`
/// holds the previous output instead of extrapolating away from the data.
///
/// # Panics
///
/// Panics if `times` and `values` differ in length.
pub fn smooth(times: &[f64], values: &[f64], tau: f64) -> Vec<f64> {
    assert_eq!(times.len(), values.len(), "times and values must be index-aligned");
    if values.len() <= 1 {
        return values.to_vec();
    }

    let mut output = Vec::with_capacity(values.len());
    let mut current = values[0];
    output.push(current);
    for i in 1..values.len() {
        current += coefficient(times[i] - times[i - 1], tau) * (values[i] - current);
        output.push(current);
    }
    output
}

fn coefficient(dt: f64, tau: f64) -> f64 {
    (1.0 - (-dt / tau).exp()).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_inputs_pass_through() {
        assert!(smooth(&[], &[], 100.0).is_empty());
        assert_eq!(smooth(&[5.0], &[42.0], 100.0), vec![42.0]);
    }

    #[test]
    fn large_gap_tracks_the_raw_value() {
        let out = smooth(&[0.0, 10_000.0], &[0.0, 100.0], 20.0);
        assert!((out[1] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn duplicate_timestamp_holds_the_previous_output() {
        let out = smooth(&[0.0, 0.0], &[0.0, 100.0], 20.0);
        assert_eq!(out[1], 0.0);
    }

    #[test]
    fn backwards_time_holds_the_previous_output() {
        let out = smooth(&[0.0, 60.0, 30.0], &[100.0, 110.0, 500.0], 100.0);
        assert_eq!(out[2], out[1]);
    }

    #[test]
    fn one_time_constant_covers_most_of_a_step() {
        let out = smooth(&[0.0, 100.0], &[0.0, 1.0], 100.0);
        let expected = 1.0 - (-1.0f64).exp();
        assert!((out[1] - expected).abs() < 1e-12);
    }
}
