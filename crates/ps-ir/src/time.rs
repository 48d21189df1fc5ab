//! Tick-based time representation.
//!
//! A step is split into `TICKS_PER_STEP` ticks, so four steps (one beat)
//! hold 96 ticks and a four-beat bar holds 384. Step-relative quantities
//! such as note offsets and gate lengths are `f32` step units and become
//! ticks by rounding to the nearest tick.

use crate::error::EditError;

/// Ticks per step. Going above 24 buys little, since `tick()` would have to
/// run well above 1 kHz to resolve it.
pub const TICKS_PER_STEP: i32 = 24;

/// Half a step in ticks. A track loop runs over `[-HALF_STEP_TICKS, L*T - HALF_STEP_TICKS)`
/// so the first step can start early.
pub const HALF_STEP_TICKS: i32 = TICKS_PER_STEP / 2;

/// Steps per quarter note.
pub const STEPS_PER_BEAT: u32 = 4;

/// Maximum number of steps in a track.
pub const MAX_LENGTH: usize = 128;

/// Length of a freshly created track.
pub const DEFAULT_TRACK_LENGTH: usize = 16;

/// Highest accepted tempo.
pub const MAX_BPM: f64 = 999.0;

/// Convert a position in step units to ticks, rounding to the nearest tick.
pub fn steps_to_ticks(steps: f32) -> i32 {
    libm::roundf(steps * TICKS_PER_STEP as f32) as i32
}

/// Number of ticks in one loop of a track with `length` steps.
pub const fn loop_ticks(length: usize) -> i32 {
    length as i32 * TICKS_PER_STEP
}

/// The cursor value at which a loop of `length` steps wraps.
pub const fn loop_end(length: usize) -> i32 {
    loop_ticks(length) - HALF_STEP_TICKS
}

/// Index of the step whose window `[i*T - H, i*T + H)` contains `tick`.
///
/// `tick` must not be below `-HALF_STEP_TICKS`.
pub const fn step_at_tick(tick: i32) -> usize {
    ((tick + HALF_STEP_TICKS) / TICKS_PER_STEP) as usize
}

/// Duration of one tick in seconds at the given tempo.
pub fn tick_duration(bpm: f64) -> f64 {
    60.0 / bpm / STEPS_PER_BEAT as f64 / TICKS_PER_STEP as f64
}

/// Check a tempo value.
pub fn validate_bpm(bpm: f64) -> Result<(), EditError> {
    if bpm.is_finite() && bpm > 0.0 && bpm <= MAX_BPM {
        Ok(())
    } else {
        Err(EditError::InvalidBpm(bpm))
    }
}

/// Check a track length in steps.
pub fn validate_length(length: usize) -> Result<(), EditError> {
    if (1..=MAX_LENGTH).contains(&length) {
        Ok(())
    } else {
        Err(EditError::InvalidLength(length))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_steps_are_exact() {
        assert_eq!(steps_to_ticks(0.0), 0);
        assert_eq!(steps_to_ticks(1.0), 24);
        assert_eq!(steps_to_ticks(0.75), 18);
        assert_eq!(steps_to_ticks(-0.5), -12);
    }

    #[test]
    fn fractional_steps_round_to_nearest() {
        // 15.7 * 24 = 376.8
        assert_eq!(steps_to_ticks(15.7), 377);
        // 15.4 * 24 = 369.6
        assert_eq!(steps_to_ticks(15.4), 370);
        assert_eq!(steps_to_ticks(-0.3), -7);
    }

    #[test]
    fn loop_bounds() {
        assert_eq!(loop_ticks(16), 384);
        assert_eq!(loop_end(16), 372);
        assert_eq!(loop_end(1), 12);
    }

    #[test]
    fn step_windows() {
        assert_eq!(step_at_tick(-12), 0);
        assert_eq!(step_at_tick(11), 0);
        assert_eq!(step_at_tick(12), 1);
        assert_eq!(step_at_tick(371), 15);
    }

    #[test]
    fn tick_duration_at_120_bpm() {
        // one step = 0.125 s, one tick = 0.125 / 24
        let d = tick_duration(120.0);
        assert!((d - 0.125 / 24.0).abs() < 1e-12);
    }

    #[test]
    fn bpm_validation() {
        assert!(validate_bpm(120.0).is_ok());
        assert!(validate_bpm(0.0).is_err());
        assert!(validate_bpm(f64::NAN).is_err());
        assert!(validate_bpm(1000.0).is_err());
    }

    #[test]
    fn length_validation() {
        assert!(validate_length(1).is_ok());
        assert!(validate_length(MAX_LENGTH).is_ok());
        assert_eq!(validate_length(0), Err(EditError::InvalidLength(0)));
        assert_eq!(validate_length(129), Err(EditError::InvalidLength(129)));
    }
}
