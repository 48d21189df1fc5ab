//! Live recording of performed notes into steps.
//!
//! A key press on a track's channel opens a take at the step nearest to
//! the press; the release closes it and yields the note to write.

use ps_ir::{loop_ticks, Note, MAX_LENGTH, TICKS_PER_STEP};

use crate::config::RecordConfig;

/// Largest offset below half a step.
const MAX_OFFSET: f32 = 0.5 - f32::EPSILON;

/// A key press being recorded.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Take {
    pub track: usize,
    pub channel: u8,
    pub velocity: u8,
    /// Step the note lands on
    pub index: usize,
    /// Offset from that step's boundary, in steps
    pub offset: f32,
    /// Host time of the press, in seconds
    pub started: f64,
    /// Track length when the take began
    pub length: usize,
}

impl Take {
    /// The note this take records when released at `time`.
    ///
    /// Length is the held time in steps, at least one tick and at most the
    /// track length.
    pub fn note(&self, pitch: u8, time: f64, tick_duration: f64) -> Note {
        let held = (time - self.started) / tick_duration / TICKS_PER_STEP as f64;
        let min = 1.0 / TICKS_PER_STEP as f32;
        let max = self.length.min(MAX_LENGTH) as f32;
        let length = if held.is_finite() {
            (held as f32).clamp(min, max)
        } else {
            min
        };
        Note::new(pitch, self.velocity, self.offset, length)
    }
}

/// Open takes, one per note number.
#[derive(Clone, Debug)]
pub struct Recorder {
    config: RecordConfig,
    takes: [Option<Take>; 128],
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new(RecordConfig::default())
    }
}

impl Recorder {
    pub fn new(config: RecordConfig) -> Self {
        Self {
            config,
            takes: [None; 128],
        }
    }

    pub fn config(&self) -> RecordConfig {
        self.config
    }

    pub fn is_armed(&self) -> bool {
        self.config.armed
    }

    /// Disarming drops open takes.
    pub fn set_armed(&mut self, armed: bool) {
        self.config.armed = armed;
        if !armed {
            self.clear();
        }
    }

    pub fn set_quantize(&mut self, quantize: bool) {
        self.config.quantize = quantize;
    }

    /// Open a take for `pitch` at loop tick `position` of a track `length` steps long.
    #[allow(clippy::too_many_arguments)]
    pub fn begin(
        &mut self,
        track: usize,
        channel: u8,
        pitch: u8,
        velocity: u8,
        time: f64,
        position: f64,
        length: usize,
    ) {
        let Some(slot) = self.takes.get_mut(pitch as usize) else {
            return;
        };
        let (index, offset) = locate(position, length, self.config.quantize);
        *slot = Some(Take {
            track,
            channel,
            velocity,
            index,
            offset,
            started: time,
            length,
        });
    }

    /// Close the take for `pitch`, if one is open.
    pub fn finish(&mut self, pitch: u8) -> Option<Take> {
        self.takes.get_mut(pitch as usize).and_then(Option::take)
    }

    pub fn open_takes(&self) -> usize {
        self.takes.iter().flatten().count()
    }

    pub fn clear(&mut self) {
        self.takes = [None; 128];
    }
}

/// Nearest step and offset for a loop-relative tick position.
///
/// `position` may lie outside the loop; it is wrapped first.
pub fn locate(position: f64, length: usize, quantize: bool) -> (usize, f32) {
    let span = loop_ticks(length) as f64;
    let mut wrapped = libm::fmod(position, span);
    if wrapped < 0.0 {
        wrapped += span;
    }
    let steps = wrapped / TICKS_PER_STEP as f64;
    let nearest = libm::floor(steps + 0.5);
    let offset = if quantize {
        0.0
    } else {
        ((steps - nearest) as f32).clamp(-0.5, MAX_OFFSET)
    };
    ((nearest as usize) % length, offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_nearest_step() {
        assert_eq!(locate(0.0, 16, false), (0, 0.0));
        assert_eq!(locate(48.0, 16, false), (2, 0.0));
        assert_eq!(locate(54.0, 16, false), (2, 0.25));
        assert_eq!(locate(42.0, 16, false), (2, -0.25));
        assert_eq!(locate(36.0, 16, false), (2, -0.5));
    }

    #[test]
    fn locate_wraps_around_loop() {
        // just before the loop end belongs to step 0
        assert_eq!(locate(380.0, 16, false), (0, -(4.0 / 24.0) as f32));
        assert_eq!(locate(-6.0, 16, false), (0, -0.25));
        assert_eq!(locate(384.0 + 24.0, 16, false), (1, 0.0));
    }

    #[test]
    fn quantize_snaps_offset() {
        assert_eq!(locate(54.0, 16, true), (2, 0.0));
        assert_eq!(locate(59.0, 16, true), (2, 0.0));
        assert_eq!(locate(61.0, 16, true), (3, 0.0));
    }

    #[test]
    fn take_length_is_clamped() {
        let take = Take {
            track: 0,
            channel: 1,
            velocity: 90,
            index: 2,
            offset: 0.0,
            started: 1.0,
            length: 4,
        };
        let tick = 0.001;
        assert_eq!(take.note(60, 1.0 + 12.0 * tick, tick).length, 0.5);
        assert_eq!(take.note(60, 1.0, tick).length, 1.0 / 24.0);
        assert_eq!(take.note(60, 100.0, tick).length, 4.0);
        assert_eq!(take.note(60, 1.0 + 12.0 * tick, tick).velocity, 90);
    }

    #[test]
    fn begin_and_finish() {
        let mut rec = Recorder::new(RecordConfig {
            armed: true,
            quantize: false,
        });
        rec.begin(1, 2, 64, 100, 0.5, 30.0, 16);
        assert_eq!(rec.open_takes(), 1);
        let take = rec.finish(64).unwrap();
        assert_eq!((take.track, take.index, take.offset), (1, 1, 0.25));
        assert_eq!(rec.finish(64), None);

        rec.begin(1, 2, 64, 100, 0.5, 30.0, 16);
        rec.set_armed(false);
        assert_eq!(rec.open_takes(), 0);
    }
}
