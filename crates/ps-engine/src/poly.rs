//! Polyphonic tracks: up to four voices per step, each with its own timing.
//!
//! A poly step renders at the earlier of its boundary and its earliest
//! voice, so voices with negative offsets are still scheduled on time.
//! Voices are never cut by later steps, and any voice whose pitch the
//! performer is holding on the track's channel is left out.

use fastrand::Rng;
use ps_ir::{EditError, PolyStep, Step, TICKS_PER_STEP};

use crate::track::{ScheduleContext, Scheduled, ScheduledNote, Track, TrackStep};

pub type PolyTrack = Track<PolyStep>;

impl TrackStep for PolyStep {
    const STEALS_HELD_KEYS: bool = true;
    const CUTS_SOUNDING: bool = false;

    fn is_enabled(&self) -> bool {
        self.enabled && self.has_voices()
    }

    fn trigger_tick(&self, index: usize) -> i32 {
        let boundary = index as i32 * TICKS_PER_STEP;
        self.voices()
            .map(|(_, _, note)| note.on_tick(index))
            .fold(boundary, i32::min)
    }

    fn sounds_at(&self, index: usize, tick: i32) -> bool {
        self.enabled
            && self
                .voices()
                .any(|(_, _, note)| note.on_tick(index) < tick && tick <= note.off_tick(index))
    }

    fn decide(&mut self, rng: &mut Rng) -> bool {
        rng.f32() < self.probability
    }

    fn schedule(steps: &[Self], index: usize, _ctx: &ScheduleContext) -> Scheduled {
        steps[index]
            .voices()
            .map(|(_, pitch, note)| ScheduledNote {
                pitch,
                velocity: note.velocity,
                on: note.on_tick(index),
                off: note.off_tick(index),
                retrigger: 0,
            })
            .collect()
    }

    fn validate(&self) -> Result<(), EditError> {
        PolyStep::validate(self)
    }

    fn from_step(step: Step) -> Result<Self, EditError> {
        match step {
            Step::Poly(s) => Ok(s),
            Step::Mono(_) => Err(EditError::KindMismatch),
        }
    }

    fn into_step(self) -> Step {
        Step::Poly(self)
    }
}
