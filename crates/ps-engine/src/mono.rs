//! Monophonic tracks: one note per step, cut at the next note unless legato.

use fastrand::Rng;
use ps_ir::{loop_ticks, steps_to_ticks, EditError, MonoStep, Step};

use crate::track::{ScheduleContext, Scheduled, ScheduledNote, Track, TrackStep};

pub type MonoTrack = Track<MonoStep>;

impl TrackStep for MonoStep {
    const STEALS_HELD_KEYS: bool = false;
    const CUTS_SOUNDING: bool = true;

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn trigger_tick(&self, index: usize) -> i32 {
        self.note.on_tick(index)
    }

    fn sounds_at(&self, index: usize, tick: i32) -> bool {
        self.enabled && self.note.on_tick(index) < tick && tick <= self.note.off_tick(index)
    }

    fn decide(&mut self, rng: &mut Rng) -> bool {
        let due = self.count % self.alternate.max(1) == 0;
        self.count = self.count.wrapping_add(1);
        // no roll on passes the alternate counter skips
        due && rng.f32() < self.probability
    }

    fn schedule(steps: &[Self], index: usize, ctx: &ScheduleContext) -> Scheduled {
        let mut notes = Scheduled::new();
        let step = &steps[index];
        let Some(pitch) = step.note.number.pitch() else {
            return notes;
        };
        let on = step.note.on_tick(index);
        let mut off = step.note.off_tick(index);
        if !ctx.legato {
            if let Some(next) = next_note_on(steps, index) {
                off = off.min(next);
            }
        }
        let retrigger = if step.retrigger_rate > 0.0 {
            steps_to_ticks(step.retrigger_rate).max(1)
        } else {
            0
        };
        notes.push(ScheduledNote {
            pitch,
            velocity: step.note.velocity,
            on,
            off,
            retrigger,
        });
        notes
    }

    fn validate(&self) -> Result<(), EditError> {
        MonoStep::validate(self)
    }

    fn carry_count(&mut self, live: &Self) {
        self.count = live.count;
    }

    fn from_step(step: Step) -> Result<Self, EditError> {
        match step {
            Step::Mono(s) => Ok(s),
            Step::Poly(_) => Err(EditError::KindMismatch),
        }
    }

    fn into_step(self) -> Step {
        Step::Mono(self)
    }
}

/// Note-on tick of the next enabled step after `index`, unwrapped past the
/// loop end. A step that is the only enabled one finds itself a loop later.
fn next_note_on(steps: &[MonoStep], index: usize) -> Option<i32> {
    let length = steps.len();
    (index + 1..=index + length).find_map(|i| {
        let j = i % length;
        let step = &steps[j];
        let wrap = if i >= length { loop_ticks(length) } else { 0 };
        step.enabled.then(|| step.note.on_tick(j) + wrap)
    })
}
