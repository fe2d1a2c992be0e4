//! Per-key curves: celeste detuning and release times

use super::{key_to_frequency, require_positive, AnalysisResult};

/// Beat rate at `key`, scaled by `division` for every octave away from the
/// reference key
fn beat_at(beat_hz: f64, reference_key: u8, division: f64, key: u8) -> f64 {
    beat_hz / division.powf((key as f64 - reference_key as f64) / 12.0)
}

/// Cent offsets that make each key beat against an untuned copy
///
/// A detuning of `c` cents on a note of frequency `f` beats at
/// `f * (2^(c/1200) - 1)` Hz, so the offset for beat rate `b` is
/// `1200 * log2(1 + b / f)`. Negative beat rates detune downwards by the
/// mirrored amount.
pub fn celeste_curve(
    keys: impl IntoIterator<Item = u8>,
    beat_hz: f64,
    reference_key: u8,
    division: f64,
) -> AnalysisResult<Vec<(u8, f64)>> {
    require_positive("division", division)?;
    if !beat_hz.is_finite() {
        return Err(crate::error::AnalysisFailure::InvalidParameter {
            name: "beat_hz",
            reason: format!("must be finite, got {}", beat_hz),
        });
    }
    Ok(keys
        .into_iter()
        .map(|key| {
            let beat = beat_at(beat_hz, reference_key, division, key);
            let frequency = key_to_frequency(key as f64);
            let cents = 1200.0 * (1.0 + beat.abs() / frequency).log2();
            (key, cents.copysign(beat))
        })
        .collect())
}

/// Release durations in seconds, scaled by `division` per octave
pub fn release_curve(
    keys: impl IntoIterator<Item = u8>,
    reference_seconds: f64,
    reference_key: u8,
    division: f64,
) -> AnalysisResult<Vec<(u8, f64)>> {
    require_positive("division", division)?;
    require_positive("reference_seconds", reference_seconds)?;
    Ok(keys
        .into_iter()
        .map(|key| (key, beat_at(reference_seconds, reference_key, division, key)))
        .collect())
}

/// Envelope time in timecents (`1200 * log2(seconds)`)
pub fn seconds_to_timecents(seconds: f64) -> f64 {
    if seconds <= 0.0 {
        f64::NEG_INFINITY
    } else {
        1200.0 * seconds.log2()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_celeste_is_monotonic_and_sign_flips() {
        let up = celeste_curve(36..=96, 2.0, 60, 12.0).unwrap();
        let down = celeste_curve(36..=96, -2.0, 60, 12.0).unwrap();

        assert!(up.windows(2).all(|w| w[1].1 < w[0].1));
        assert!(up.iter().all(|(_, cents)| *cents > 0.0));
        for ((k1, a), (k2, b)) in up.iter().zip(&down) {
            assert_eq!(k1, k2);
            assert_relative_eq!(*a, -*b);
        }
    }

    #[test]
    fn test_celeste_reference_key_beats_at_requested_rate() {
        let curve = celeste_curve([60], 2.0, 60, 12.0).unwrap();
        let cents = curve[0].1;
        let f = key_to_frequency(60.0);
        let beat = f * (2f64.powf(cents / 1200.0) - 1.0);
        assert_relative_eq!(beat, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_release_curve_halves_per_octave() {
        let curve = release_curve([48, 60, 72], 2.0, 60, 2.0).unwrap();
        assert_relative_eq!(curve[0].1, 4.0, epsilon = 1e-12);
        assert_relative_eq!(curve[1].1, 2.0);
        assert_relative_eq!(curve[2].1, 1.0, epsilon = 1e-12);
        assert_relative_eq!(seconds_to_timecents(2.0), 1200.0);
    }

    #[test]
    fn test_invalid_division() {
        assert!(celeste_curve([60], 2.0, 60, 0.0).is_err());
        assert!(release_curve([60], -1.0, 60, 2.0).is_err());
    }
}
