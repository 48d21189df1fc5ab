//! Per-track playback: cursor, step rendering, emission and deferred edits.
//!
//! A track advances one tick per call to [`Track::tick`]. Each step is
//! rendered once per pass at its trigger tick: the step decides whether it
//! fires, and the notes it plays are written into the horizon as
//! Start/End (plus retrigger) events. Emission pulls due events out of the
//! horizon at the cursor.
//!
//! Every emitted note-on is tracked in `sounding` until its note-off is
//! emitted, so nothing that changes the track mid-loop (edits, disabling,
//! length changes, held keys) can leave a note hanging.

use arrayvec::ArrayVec;
use fastrand::Rng;
use heapless::Vec as FixedVec;
use ps_ir::{
    loop_end, loop_ticks, step_at_tick, validate_channel, validate_length, EditError, NoteEvent,
    Step, HALF_STEP_TICKS, MAX_LENGTH, POLYPHONY,
};

use crate::horizon::{Cue, Horizon, HorizonEvent};
use crate::keyboard::KeyboardMonitor;
use crate::sink::EventSink;

/// Notes a track can have sounding at once.
pub const MAX_SOUNDING: usize = 64;

/// Track settings a step needs to work out its notes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScheduleContext {
    pub length: usize,
    pub legato: bool,
}

/// One note of a rendered step, in loop-relative ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScheduledNote {
    pub pitch: u8,
    pub velocity: u8,
    pub on: i32,
    pub off: i32,
    /// Retrigger interval in ticks, 0 for none
    pub retrigger: i32,
}

pub type Scheduled = ArrayVec<ScheduledNote, POLYPHONY>;

/// Behaviour a step type brings to a track.
pub trait TrackStep: Copy + Default + PartialEq {
    /// Held keys on the track's channel mute matching voices.
    const STEALS_HELD_KEYS: bool;

    /// A new note ends whatever the track still has sounding, unless legato.
    const CUTS_SOUNDING: bool;

    fn is_enabled(&self) -> bool;

    /// Loop-relative tick at which step `index` is rendered. Lies in the
    /// step's window.
    fn trigger_tick(&self, index: usize) -> i32;

    /// Whether a note of step `index` would be sounding at loop tick
    /// `tick`, ignoring cuts from later steps.
    fn sounds_at(&self, index: usize, tick: i32) -> bool;

    /// Whether an enabled step fires on this pass. Called exactly once per
    /// pass and may advance per-step counters.
    fn decide(&mut self, rng: &mut Rng) -> bool;

    /// Notes step `index` plays on a pass where it fired.
    fn schedule(steps: &[Self], index: usize, ctx: &ScheduleContext) -> Scheduled;

    fn validate(&self) -> Result<(), EditError>;

    /// Take over the live play counter when an edit replaces `live`.
    fn carry_count(&mut self, _live: &Self) {}

    fn from_step(step: Step) -> Result<Self, EditError>;

    fn into_step(self) -> Step;
}

/// How the current pass went for a step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Pass {
    /// Not rendered yet, or disabled so far
    #[default]
    Pending,
    /// Alternate or probability said no
    Skipped,
    Fired,
}

/// A note-on that has been emitted and awaits its note-off.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct SoundingNote {
    serial: u32,
    step: u8,
    channel: u8,
    pitch: u8,
    velocity: u8,
    /// Absolute tick of the note's final note-off
    ends_at: u64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct PendingEdit<S> {
    step: S,
    preserve_count: bool,
}

/// A track of mono or poly steps.
#[derive(Clone, Debug)]
pub struct Track<S: TrackStep> {
    channel: u8,
    length: usize,
    /// Applied at the next wraparound
    pending_length: Option<usize>,
    enabled: bool,
    legato: bool,
    steps: [S; MAX_LENGTH],
    pending: [Option<PendingEdit<S>>; MAX_LENGTH],
    pending_count: usize,
    passes: [Pass; MAX_LENGTH],
    horizon: Horizon,
    sounding: FixedVec<SoundingNote, MAX_SOUNDING>,
    /// Loop-relative tick, in `[-H, L*T - H)`
    cursor: i32,
    /// Ticks since start
    elapsed: u64,
    next_serial: u32,
    rng: Rng,
    dropped_notes: u64,
}

impl<S: TrackStep> Track<S> {
    /// An empty, enabled track.
    pub fn new(channel: u8, length: usize) -> Result<Self, EditError> {
        validate_channel(channel)?;
        validate_length(length)?;
        Ok(Self {
            channel,
            length,
            pending_length: None,
            enabled: true,
            legato: false,
            steps: [S::default(); MAX_LENGTH],
            pending: [None; MAX_LENGTH],
            pending_count: 0,
            passes: [Pass::Pending; MAX_LENGTH],
            horizon: Horizon::new(),
            sounding: FixedVec::new(),
            cursor: 0,
            elapsed: 0,
            next_serial: 0,
            rng: Rng::with_seed(u64::from(channel)),
            dropped_notes: 0,
        })
    }

    /// Replace the random source used for probability rolls.
    pub fn with_rng(mut self, rng: Rng) -> Self {
        self.rng = rng;
        self
    }

    // --- Playback ---

    /// Advance one tick, emitting due note events into `sink`.
    pub fn tick<K: EventSink + ?Sized>(&mut self, keyboard: &KeyboardMonitor, sink: &mut K) {
        if self.pending_count > 0 {
            self.apply_pending(keyboard);
        }

        let index = step_at_tick(self.cursor);
        if index < self.length
            && self.passes[index] == Pass::Pending
            && self.steps[index].trigger_tick(index) == self.cursor
        {
            self.render(index, keyboard);
        }

        self.emit_due(keyboard, sink);
        self.advance();
    }

    /// Back to tick 0 of the loop with nothing scheduled or sounding.
    ///
    /// Does not emit note-offs; release sounding notes first if needed.
    pub fn return_to_start(&mut self) {
        if let Some(length) = self.pending_length.take() {
            self.length = length;
        }
        self.horizon.clear();
        self.sounding.clear();
        self.passes = [Pass::Pending; MAX_LENGTH];
        self.cursor = 0;
        self.elapsed = 0;
    }

    /// Note-off for everything sounding. Their scheduled note-offs are
    /// then ignored.
    pub fn release_all<K: EventSink + ?Sized>(&mut self, sink: &mut K) {
        for note in self.sounding.iter() {
            sink.emit(NoteEvent::note_off(
                note.channel,
                note.pitch,
                note.velocity,
                self.elapsed,
            ));
        }
        self.sounding.clear();
    }

    fn render(&mut self, index: usize, keyboard: &KeyboardMonitor) {
        // a disabled step stays pending so an edit can still render it late
        if !self.steps[index].is_enabled() {
            return;
        }
        let fired = self.steps[index].decide(&mut self.rng);
        self.passes[index] = if fired { Pass::Fired } else { Pass::Skipped };
        if fired {
            self.schedule_step(index, keyboard, self.cursor);
        }
    }

    /// Write the notes of step `index` starting at or after `earliest` into
    /// the horizon.
    fn schedule_step(&mut self, index: usize, keyboard: &KeyboardMonitor, earliest: i32) {
        let ctx = ScheduleContext {
            length: self.length,
            legato: self.legato,
        };
        let notes = S::schedule(&self.steps[..self.length], index, &ctx);
        let span = loop_ticks(self.length);

        for note in notes.iter().filter(|n| n.on >= earliest) {
            if S::STEALS_HELD_KEYS && keyboard.is_held(self.channel, note.pitch) {
                continue;
            }
            let off = note.off.clamp(note.on, note.on + span);
            let retriggers = if note.retrigger > 0 {
                ((off - note.on - 1).max(0) / note.retrigger) as usize
            } else {
                0
            };
            // start and end must fit; retriggers are thinned to what is left
            let room = self.horizon.room();
            if room < 2 {
                self.dropped_notes += 1;
                continue;
            }
            let retriggers = retriggers.min((room - 2) / 2);

            let serial = self.next_serial;
            self.next_serial = self.next_serial.wrapping_add(1);
            let event = |tick: i32, cue: Cue| HorizonEvent {
                tick,
                remaining: off - tick,
                serial,
                cue,
                pitch: note.pitch,
                velocity: note.velocity,
                step: index as u8,
            };

            self.place(event(note.on, Cue::Start));
            for k in 1..=retriggers as i32 {
                let t = note.on + k * note.retrigger;
                self.place(event(t, Cue::RetriggerOff));
                self.place(event(t, Cue::RetriggerOn));
            }
            self.place(event(off, Cue::End));
        }
    }

    fn place(&mut self, mut event: HorizonEvent) {
        let pushed = if event.tick < loop_end(self.length) {
            self.horizon.push_current(event)
        } else {
            event.tick -= loop_ticks(self.length);
            self.horizon.push_next(event)
        };
        debug_assert!(pushed.is_ok(), "horizon room checked before placing");
    }

    fn emit_due<K: EventSink + ?Sized>(&mut self, keyboard: &KeyboardMonitor, sink: &mut K) {
        let range = self.horizon.drain_until(self.cursor);
        let mut cut: ArrayVec<u32, MAX_SOUNDING> = ArrayVec::new();
        if S::CUTS_SOUNDING && self.enabled && !self.legato {
            let starts = range
                .clone()
                .any(|i| self.horizon.get(i).is_some_and(|e| e.cue == Cue::Start));
            if starts {
                self.cut_sounding(keyboard, sink, &mut cut);
            }
        }
        for i in range {
            let Some(event) = self.horizon.get(i).copied() else {
                continue;
            };
            if cut.contains(&event.serial) {
                continue;
            }
            if event.cue.is_on() {
                self.note_on(event, sink);
            } else {
                self.note_off(event, keyboard, sink);
            }
        }
    }

    fn note_on<K: EventSink + ?Sized>(&mut self, event: HorizonEvent, sink: &mut K) {
        if !self.enabled {
            return;
        }
        let note = SoundingNote {
            serial: event.serial,
            step: event.step,
            channel: self.channel,
            pitch: event.pitch,
            velocity: event.velocity,
            ends_at: self.elapsed + event.remaining.max(0) as u64,
        };
        if self.sounding.push(note).is_err() {
            self.dropped_notes += 1;
            return;
        }
        sink.emit(NoteEvent::note_on(
            note.channel,
            note.pitch,
            note.velocity,
            self.elapsed,
        ));
    }

    fn note_off<K: EventSink + ?Sized>(
        &mut self,
        event: HorizonEvent,
        keyboard: &KeyboardMonitor,
        sink: &mut K,
    ) {
        let Some(pos) = self.sounding.iter().position(|n| n.serial == event.serial) else {
            return;
        };
        let note = self.sounding.swap_remove(pos);
        self.release(note, keyboard, sink);
    }

    /// End every sounding note now. Their remaining events, due or
    /// pending, are skipped.
    fn cut_sounding<K: EventSink + ?Sized>(
        &mut self,
        keyboard: &KeyboardMonitor,
        sink: &mut K,
        cut: &mut ArrayVec<u32, MAX_SOUNDING>,
    ) {
        if self.sounding.is_empty() {
            return;
        }
        while let Some(note) = self.sounding.pop() {
            // sounding never holds more than MAX_SOUNDING notes
            let _ = cut.try_push(note.serial);
            self.release(note, keyboard, sink);
        }
        self.horizon.retain_pending(|e| !cut.contains(&e.serial));
    }

    fn release<K: EventSink + ?Sized>(
        &self,
        note: SoundingNote,
        keyboard: &KeyboardMonitor,
        sink: &mut K,
    ) {
        // the performer owns this key now
        if keyboard.is_held(note.channel, note.pitch) {
            return;
        }
        sink.emit(NoteEvent::note_off(
            note.channel,
            note.pitch,
            note.velocity,
            self.elapsed,
        ));
    }

    fn advance(&mut self) {
        self.cursor += 1;
        self.elapsed += 1;
        if self.cursor >= loop_end(self.length) {
            self.wrap();
        }
    }

    fn wrap(&mut self) {
        self.cursor = -HALF_STEP_TICKS;
        self.horizon.swap_runs();
        self.passes = [Pass::Pending; MAX_LENGTH];
        if let Some(length) = self.pending_length.take() {
            self.length = length;
            self.horizon.clamp_current(loop_end(length));
        }
    }

    // --- Edits ---

    /// Stage a step edit. It takes effect on a later tick once neither the
    /// old nor the new version of the step has a note in flight.
    pub fn set_step(&mut self, index: usize, step: S, preserve_count: bool) -> Result<(), EditError> {
        if index >= MAX_LENGTH {
            return Err(EditError::IndexOutOfRange(index));
        }
        step.validate()?;
        if self.pending[index].is_none() {
            self.pending_count += 1;
        }
        self.pending[index] = Some(PendingEdit {
            step,
            preserve_count,
        });
        Ok(())
    }

    fn apply_pending(&mut self, keyboard: &KeyboardMonitor) {
        for index in 0..MAX_LENGTH {
            let Some(edit) = self.pending[index] else {
                continue;
            };
            if self.try_swap(index, edit, keyboard) {
                self.pending[index] = None;
                self.pending_count -= 1;
                if self.pending_count == 0 {
                    break;
                }
            }
        }
    }

    /// Swap in a staged step if it is safe to do so now.
    fn try_swap(&mut self, index: usize, edit: PendingEdit<S>, keyboard: &KeyboardMonitor) -> bool {
        let old_active = self
            .sounding
            .iter()
            .any(|n| usize::from(n.step) == index && n.ends_at > self.elapsed);
        if old_active {
            return false;
        }

        let mut incoming = edit.step;
        if edit.preserve_count {
            incoming.carry_count(&self.steps[index]);
        }

        let in_loop = index < self.length;
        let new_active = in_loop
            && self.passes[index] == Pass::Fired
            && incoming.sounds_at(index, self.cursor);
        if new_active {
            return false;
        }

        self.remove_unstarted(index);
        self.steps[index] = incoming;

        if in_loop {
            match self.passes[index] {
                Pass::Fired if incoming.is_enabled() => {
                    self.schedule_step(index, keyboard, self.cursor);
                }
                Pass::Pending if incoming.trigger_tick(index) < self.cursor => {
                    self.render(index, keyboard);
                }
                _ => {}
            }
        }
        true
    }

    /// Forget scheduled notes of step `index` whose note-on is still ahead.
    fn remove_unstarted(&mut self, index: usize) {
        let mut serials: ArrayVec<u32, { 2 * POLYPHONY }> = ArrayVec::new();
        for event in self.horizon.pending() {
            if event.cue == Cue::Start && usize::from(event.step) == index {
                if serials.try_push(event.serial).is_err() {
                    break;
                }
            }
        }
        if !serials.is_empty() {
            self.horizon.retain_pending(|e| !serials.contains(&e.serial));
        }
    }

    // --- Track settings ---

    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Sounding notes keep the channel they started on.
    pub fn set_channel(&mut self, channel: u8) -> Result<(), EditError> {
        validate_channel(channel)?;
        self.channel = channel;
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// A disabled track starts no notes; sounding ones end normally.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn legato(&self) -> bool {
        self.legato
    }

    /// Applies to steps rendered from now on.
    pub fn set_legato(&mut self, legato: bool) {
        self.legato = legato;
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Length waiting for the next wraparound, if any.
    pub fn pending_length(&self) -> Option<usize> {
        self.pending_length
    }

    /// Change the loop length at the next wraparound.
    pub fn set_length(&mut self, length: usize) -> Result<(), EditError> {
        validate_length(length)?;
        self.pending_length = (length != self.length).then_some(length);
        Ok(())
    }

    // --- Inspection ---

    pub fn step(&self, index: usize) -> Option<&S> {
        self.steps.get(index)
    }

    /// The staged edit for `index` if there is one, else the live step.
    pub fn pending_step(&self, index: usize) -> Option<S> {
        let pending = self.pending.get(index)?;
        pending.map(|e| e.step).or_else(|| self.step(index).copied())
    }

    pub fn has_pending_edits(&self) -> bool {
        self.pending_count > 0
    }

    /// Step whose window holds the cursor.
    pub fn current_step_index(&self) -> usize {
        step_at_tick(self.cursor).min(self.length - 1)
    }

    pub fn cursor(&self) -> i32 {
        self.cursor
    }

    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }

    pub fn sounding_count(&self) -> usize {
        self.sounding.len()
    }

    /// Scheduled events not yet emitted.
    pub fn scheduled_count(&self) -> usize {
        self.horizon.len()
    }

    /// Notes discarded because the horizon or the sounding list was full.
    pub fn dropped_notes(&self) -> u64 {
        self.dropped_notes
    }

    pub fn pass(&self, index: usize) -> Option<Pass> {
        self.passes.get(index).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MonoTrack, PolyTrack};
    use ps_ir::{MonoStep, Note, NoteEventKind, PolyStep};
    use std::vec::Vec;

    fn mono(pitch: u8, length: f32) -> MonoStep {
        MonoStep::with_note(Note::new(pitch, 100, 0.0, length))
    }

    fn run<S: TrackStep>(track: &mut Track<S>, ticks: usize) -> Vec<NoteEvent> {
        let keyboard = KeyboardMonitor::new();
        let mut out = Vec::new();
        for _ in 0..ticks {
            track.tick(&keyboard, &mut out);
        }
        out
    }

    fn note_ons(events: &[NoteEvent]) -> Vec<(u8, u64)> {
        events
            .iter()
            .filter(|e| e.is_note_on())
            .map(|e| (e.pitch, e.tick))
            .collect()
    }

    #[test]
    fn new_track_validates() {
        assert!(MonoTrack::new(0, 16).is_err());
        assert_eq!(MonoTrack::new(1, 0).err(), Some(EditError::InvalidLength(0)));
        assert_eq!(
            MonoTrack::new(1, MAX_LENGTH + 1).err(),
            Some(EditError::InvalidLength(MAX_LENGTH + 1))
        );
        let track = MonoTrack::new(3, 16).unwrap();
        assert_eq!(track.channel(), 3);
        assert_eq!(track.cursor(), 0);
        assert!(track.is_enabled());
    }

    #[test]
    fn cursor_wraps_to_minus_half_step() {
        let mut track = MonoTrack::new(1, 2).unwrap();
        run(&mut track, 35);
        assert_eq!(track.cursor(), 35);
        run(&mut track, 1);
        assert_eq!(track.cursor(), -HALF_STEP_TICKS);
        assert_eq!(track.elapsed(), 36);
        assert_eq!(track.current_step_index(), 0);
    }

    #[test]
    fn set_step_rejects_bad_input() {
        let mut track = MonoTrack::new(1, 16).unwrap();
        assert_eq!(
            track.set_step(MAX_LENGTH, mono(60, 1.0), false),
            Err(EditError::IndexOutOfRange(MAX_LENGTH))
        );
        let mut bad = mono(60, 1.0);
        bad.probability = -0.1;
        assert!(track.set_step(0, bad, false).is_err());
        assert!(!track.has_pending_edits());
    }

    #[test]
    fn edit_waits_for_sounding_note() {
        let mut track = MonoTrack::new(1, 4).unwrap();
        track.set_step(0, mono(60, 2.0), false).unwrap();
        run(&mut track, 10);

        track.set_step(0, mono(62, 0.5), false).unwrap();
        run(&mut track, 10);
        assert_eq!(track.step(0).unwrap().note.number.pitch(), Some(60));
        assert_eq!(
            track.pending_step(0).and_then(|s| s.note.number.pitch()),
            Some(62)
        );

        // old note ends at 48
        let events = run(&mut track, 29);
        assert!(!track.has_pending_edits());
        assert_eq!(track.step(0).unwrap().note.number.pitch(), Some(62));
        assert_eq!(
            events
                .iter()
                .map(|e| (e.kind, e.pitch, e.tick))
                .collect::<Vec<_>>(),
            [(NoteEventKind::NoteOff, 60, 48)]
        );

        let events = run(&mut track, 96);
        assert_eq!(note_ons(&events), [(62, 96)]);
    }

    #[test]
    fn edit_to_future_step_plays_this_loop() {
        let mut track = MonoTrack::new(1, 4).unwrap();
        run(&mut track, 10);
        track.set_step(2, mono(67, 0.5), false).unwrap();
        let events = run(&mut track, 60);
        assert_eq!(note_ons(&events), [(67, 48)]);
    }

    #[test]
    fn edit_after_fired_note_ended_waits_for_next_loop() {
        let mut track = MonoTrack::new(1, 4).unwrap();
        track.set_step(0, mono(60, 0.5), false).unwrap();
        run(&mut track, 20);
        track.set_step(0, mono(62, 0.5), false).unwrap();
        let events = run(&mut track, 100);
        assert_eq!(note_ons(&events), [(62, 96)]);
        assert_eq!(track.pass(0), Some(Pass::Fired));
    }

    #[test]
    fn late_edit_plays_remaining_voices() {
        let mut step = PolyStep::default();
        step.add_note(Note::new(60, 100, 0.0, 0.5));
        step.add_note(Note::new(64, 100, 0.25, 0.5));

        let mut track = PolyTrack::new(1, 4).unwrap();
        run(&mut track, 26);
        track.set_step(1, step, false).unwrap();
        let events = run(&mut track, 40);
        // trigger at 24 already passed; only the voice at 30 is ahead
        assert_eq!(note_ons(&events), [(64, 30)]);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn fired_step_edit_schedules_remaining_voices() {
        let mut first = PolyStep::default();
        first.add_note(Note::new(60, 100, 0.0, 0.25));
        let mut second = first;
        second.add_note(Note::new(64, 100, 0.4, 0.25));

        let mut track = PolyTrack::new(1, 4).unwrap();
        track.set_step(0, first, false).unwrap();
        run(&mut track, 8);
        track.set_step(0, second, false).unwrap();
        let events = run(&mut track, 40);
        assert_eq!(note_ons(&events), [(64, 10)]);
        assert_eq!(track.sounding_count(), 0);
    }

    #[test]
    fn replaced_step_loses_unstarted_notes() {
        let mut track = PolyTrack::new(1, 4).unwrap();
        let mut step = PolyStep::default();
        step.add_note(Note::new(60, 100, 0.0, 0.25));
        step.add_note(Note::new(72, 100, 0.4, 0.25));
        track.set_step(0, step, false).unwrap();
        run(&mut track, 5);
        assert_eq!(track.sounding_count(), 1);

        // swapped at 6 when 60 ends, before the voice at 10 starts
        track.set_step(0, PolyStep::default(), false).unwrap();
        let events = run(&mut track, 2);
        assert!(!track.has_pending_edits());
        assert_eq!(track.scheduled_count(), 0);
        let events = [events, run(&mut track, 30)].concat();
        assert!(note_ons(&events).is_empty());
        assert_eq!(events.iter().filter(|e| e.is_note_off()).count(), 1);
        assert_eq!(track.scheduled_count(), 0);
    }

    #[test]
    fn preserve_count_carries_alternate_state() {
        let mut step = mono(60, 0.25);
        step.alternate = 2;

        let play = |preserve: bool| {
            let mut track = MonoTrack::new(1, 1).unwrap();
            track.set_step(0, step, false).unwrap();
            run(&mut track, 13);
            let mut edited = step;
            edited.note.velocity = 50;
            track.set_step(0, edited, preserve).unwrap();
            note_ons(&run(&mut track, 60))
        };
        assert_eq!(play(true), [(60, 48)]);
        assert_eq!(play(false), [(60, 24), (60, 72)]);
    }

    #[test]
    fn disabled_track_finishes_sounding_notes() {
        let mut track = MonoTrack::new(1, 4).unwrap();
        track.set_step(0, mono(60, 0.75), false).unwrap();
        track.set_step(1, mono(62, 0.75), false).unwrap();
        let mut events = run(&mut track, 5);
        track.set_enabled(false);
        events.extend(run(&mut track, 200));
        assert_eq!(
            events
                .iter()
                .map(|e| (e.kind, e.pitch, e.tick))
                .collect::<Vec<_>>(),
            [
                (NoteEventKind::NoteOn, 60, 0),
                (NoteEventKind::NoteOff, 60, 18)
            ]
        );
        assert_eq!(track.sounding_count(), 0);
    }

    #[test]
    fn length_change_applies_at_wrap() {
        let mut track = MonoTrack::new(1, 4).unwrap();
        track.set_step(0, mono(60, 0.5), false).unwrap();
        track.set_step(3, mono(63, 0.5), false).unwrap();
        run(&mut track, 30);
        track.set_length(2).unwrap();
        assert_eq!(track.length(), 4);
        assert_eq!(track.pending_length(), Some(2));

        let events = run(&mut track, 160 - 30);
        assert_eq!(note_ons(&events), [(63, 72), (60, 96), (60, 144)]);
        assert_eq!(track.length(), 2);
    }

    #[test]
    fn shrinking_pulls_in_note_offs() {
        let mut track = MonoTrack::new(1, 4).unwrap();
        track.set_legato(true);
        track.set_step(3, mono(63, 4.0), false).unwrap();
        run(&mut track, 80);
        track.set_length(2).unwrap();
        let events = run(&mut track, 60);
        let offs: Vec<u64> = events
            .iter()
            .filter(|e| e.is_note_off())
            .map(|e| e.tick)
            .collect();
        // loop of 48 wraps at 84; last tick of the new loop is 35
        assert_eq!(offs, [84 + 12 + 35]);
        assert_eq!(track.sounding_count(), 0);
    }

    #[test]
    fn release_all_silences_and_ignores_scheduled_offs() {
        let mut track = MonoTrack::new(2, 4).unwrap();
        track.set_step(0, mono(60, 1.0), false).unwrap();
        run(&mut track, 5);

        let mut released = Vec::new();
        track.release_all(&mut released);
        assert_eq!(released, [NoteEvent::note_off(2, 60, 100, 5)]);

        let events = run(&mut track, 50);
        assert!(events.is_empty());
    }

    #[test]
    fn return_to_start_clears_schedule() {
        let mut track = MonoTrack::new(1, 4).unwrap();
        track.set_step(0, mono(60, 1.0), false).unwrap();
        run(&mut track, 50);
        track.return_to_start();
        assert_eq!(track.cursor(), 0);
        assert_eq!(track.elapsed(), 0);
        assert_eq!(track.scheduled_count(), 0);
        assert_eq!(track.sounding_count(), 0);
        assert_eq!(note_ons(&run(&mut track, 10)), [(60, 0)]);
    }

    #[test]
    fn dense_retrigger_is_thinned_to_fit() {
        let mut track = MonoTrack::new(1, 16).unwrap();
        track.set_legato(true);
        let mut step = mono(60, 16.0);
        step.retrigger_rate = 1.0 / 24.0;
        track.set_step(0, step, false).unwrap();
        let events = run(&mut track, 400);

        assert_eq!(track.dropped_notes(), 0);
        assert_eq!(events[0], NoteEvent::note_on(1, 60, 100, 0));
        // start plus 255 retriggers fill the run
        let ons = events.iter().filter(|e| e.is_note_on() && e.tick < 384).count();
        assert_eq!(ons, 256);
        let at_loop: Vec<NoteEventKind> = events
            .iter()
            .filter(|e| e.tick == 384)
            .map(|e| e.kind)
            .collect();
        assert_eq!(at_loop, [NoteEventKind::NoteOff, NoteEventKind::NoteOn]);
    }

    #[test]
    fn channel_change_keeps_note_off_on_old_channel() {
        let mut track = MonoTrack::new(1, 4).unwrap();
        track.set_step(0, mono(60, 0.5), false).unwrap();
        let mut events = run(&mut track, 3);
        track.set_channel(9).unwrap();
        events.extend(run(&mut track, 20));
        assert!(events.iter().all(|e| e.channel == 1));
        assert_eq!(track.set_channel(0), Err(EditError::InvalidChannel(0)));
    }
}
