//! Bitrate planning for target-size encodes.
//!
//! Pure arithmetic: given a target output size and the input duration, derive
//! the video bitrate to hand to the encoder.

use thiserror::Error;

/// Audio bitrate applied to every encode unless configured otherwise.
pub const DEFAULT_AUDIO_BITRATE_BPS: u64 = 128_000;

/// Floor for the computed video bitrate. A degenerate target (smaller than
/// the audio track alone) still produces a working encode, possibly over
/// target, instead of an encoder rejection.
pub const MIN_VIDEO_BITRATE_BPS: u64 = 100_000;

/// Fraction of the raw bitrate kept as headroom for container and encoder
/// overhead.
const SAFETY_MARGIN: f64 = 0.95;

/// Error type for bitrate planning
#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    /// Input duration was zero or negative
    #[error("video duration must be positive, got {0}")]
    NonPositiveDuration(f64),

    /// Requested target size was zero
    #[error("target size must be positive")]
    ZeroTargetSize,
}

/// Compute the video bitrate (bits per second) needed to hit a target file size.
///
/// Total target bits minus the estimated audio bits, divided by duration,
/// with a 5% safety margin and a 100 kbps floor.
pub fn plan_video_bitrate(
    target_size_bytes: u64,
    duration_secs: f64,
    audio_bitrate_bps: u64,
) -> Result<u64, PlanError> {
    if target_size_bytes == 0 {
        return Err(PlanError::ZeroTargetSize);
    }
    if duration_secs <= 0.0 {
        return Err(PlanError::NonPositiveDuration(duration_secs));
    }

    let target_bits = (target_size_bytes as f64) * 8.0;
    let audio_bits = (audio_bitrate_bps as f64) * duration_secs;
    let video_bits = target_bits - audio_bits;

    let video_bitrate = (video_bits / duration_secs * SAFETY_MARGIN) as i64;

    Ok(video_bitrate.max(MIN_VIDEO_BITRATE_BPS as i64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_worked_example() {
        // 10 MB over 100 s: 80_000_000 bits - 12_800_000 audio bits
        // = 67_200_000 / 100 = 672_000 * 0.95 = 638_400 bps
        let bitrate = plan_video_bitrate(10_000_000, 100.0, DEFAULT_AUDIO_BITRATE_BPS)
            .expect("valid inputs should plan");
        assert_eq!(bitrate, 638_400);
    }

    #[test]
    fn test_zero_duration_rejected() {
        let result = plan_video_bitrate(10_000_000, 0.0, DEFAULT_AUDIO_BITRATE_BPS);
        assert_eq!(result, Err(PlanError::NonPositiveDuration(0.0)));
    }

    #[test]
    fn test_negative_duration_rejected() {
        let result = plan_video_bitrate(10_000_000, -5.0, DEFAULT_AUDIO_BITRATE_BPS);
        assert_eq!(result, Err(PlanError::NonPositiveDuration(-5.0)));
    }

    #[test]
    fn test_zero_target_rejected() {
        let result = plan_video_bitrate(0, 60.0, DEFAULT_AUDIO_BITRATE_BPS);
        assert_eq!(result, Err(PlanError::ZeroTargetSize));
    }

    #[test]
    fn test_tiny_target_hits_floor() {
        // 1 KB over an hour: raw computation is hugely negative
        let bitrate = plan_video_bitrate(1_000, 3600.0, DEFAULT_AUDIO_BITRATE_BPS)
            .expect("valid inputs should plan");
        assert_eq!(bitrate, MIN_VIDEO_BITRATE_BPS);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        // The floor holds for every positive target and duration.
        #[test]
        fn prop_bitrate_never_below_floor(
            target in 1u64..1_000_000_000_000,
            duration in 0.001f64..100_000.0,
            audio in 0u64..512_000,
        ) {
            let bitrate = plan_video_bitrate(target, duration, audio)
                .expect("positive inputs should plan");
            prop_assert!(bitrate >= MIN_VIDEO_BITRATE_BPS);
        }

        // When the target dominates the audio overhead, the plan stays below
        // the raw bits-per-second (the margin only ever shrinks it).
        #[test]
        fn prop_margin_shrinks_raw_rate(
            target in 100_000_000u64..1_000_000_000_000,
            duration in 1.0f64..1_000.0,
        ) {
            let bitrate = plan_video_bitrate(target, duration, DEFAULT_AUDIO_BITRATE_BPS)
                .expect("positive inputs should plan");
            let raw = (target as f64) * 8.0 / duration;
            prop_assert!((bitrate as f64) <= raw);
        }
    }
}
