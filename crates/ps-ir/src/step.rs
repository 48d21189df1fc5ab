//! Mono and poly steps.

use crate::error::EditError;
use crate::note::{Note, NoteNumber, DEFAULT_LENGTH, DEFAULT_VELOCITY};
use crate::time::{MAX_LENGTH, TICKS_PER_STEP};

/// Simultaneous notes in a poly step.
pub const POLYPHONY: usize = 4;

/// One step of a monophonic track.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MonoStep {
    pub enabled: bool,
    pub note: Note,
    /// Retrigger interval in steps; 0 means off
    pub retrigger_rate: f32,
    /// Chance of firing on a pass (0-1)
    pub probability: f32,
    /// Fire only every `alternate`-th pass
    pub alternate: u32,
    /// Passes seen so far; advanced by the engine
    pub count: u32,
}

impl Default for MonoStep {
    fn default() -> Self {
        Self {
            enabled: false,
            note: Note::default(),
            retrigger_rate: 0.0,
            probability: 1.0,
            alternate: 1,
            count: 0,
        }
    }
}

impl MonoStep {
    /// An enabled step playing `note` with default trigger parameters.
    pub fn with_note(note: Note) -> Self {
        Self {
            enabled: true,
            note,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), EditError> {
        if !self.note.number.is_voiced() {
            return Err(EditError::MissingPitch);
        }
        self.note.validate()?;
        validate_probability(self.probability)?;
        if self.alternate == 0 {
            return Err(EditError::InvalidAlternate(self.alternate));
        }
        let min_rate = 0.5 / TICKS_PER_STEP as f32;
        let rate = self.retrigger_rate;
        if !(rate.is_finite() && (rate == 0.0 || (min_rate..=MAX_LENGTH as f32).contains(&rate)))
        {
            return Err(EditError::InvalidRetrigger(rate));
        }
        Ok(())
    }
}

/// One step of a polyphonic track.
///
/// `enabled` is true iff at least one slot holds a pitch; `add_note`,
/// `steal_note` and `reset` keep it that way.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PolyStep {
    pub enabled: bool,
    /// Chance of firing on a pass (0-1), shared by all voices
    pub probability: f32,
    pub notes: [Note; POLYPHONY],
}

impl Default for PolyStep {
    fn default() -> Self {
        let mut step = Self {
            enabled: false,
            probability: 1.0,
            notes: [Note::default(); POLYPHONY],
        };
        step.reset(DEFAULT_VELOCITY, 0.0, DEFAULT_LENGTH);
        step
    }
}

impl PolyStep {
    /// Disable the step; every slot becomes `Disabled` carrying the given timing.
    pub fn reset(&mut self, velocity: u8, offset: f32, length: f32) {
        self.enabled = false;
        self.probability = 1.0;
        for note in &mut self.notes {
            *note = Note::disabled(velocity, offset, length);
        }
    }

    /// Copy velocity, offset and length of slot `index` to all other slots.
    pub fn align_with_note(&mut self, index: usize) {
        let Some(&source) = self.notes.get(index) else {
            return;
        };
        for (i, note) in self.notes.iter_mut().enumerate() {
            if i != index {
                note.velocity = source.velocity;
                note.offset = source.offset;
                note.length = source.length;
            }
        }
    }

    /// Returns true if any slot holds a pitch.
    pub fn has_voices(&self) -> bool {
        self.notes.iter().any(|n| n.number.is_voiced())
    }

    /// Voiced slots as `(slot, pitch, note)`.
    pub fn voices(&self) -> impl Iterator<Item = (usize, u8, &Note)> + '_ {
        self.notes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.number.pitch().map(|p| (i, p, n)))
    }

    /// Add a note.
    ///
    /// A disabled step is reset around the new note, which takes slot 0.
    /// Otherwise the note replaces the same pitch, else fills the first
    /// disabled slot, else replaces the nearest pitch (lowest index on ties).
    pub fn add_note(&mut self, note: Note) {
        let Some(pitch) = note.number.pitch() else {
            return;
        };
        let slot = if self.enabled {
            self.slot_of(pitch)
                .or_else(|| self.first_disabled())
                .or_else(|| self.nearest_slot(pitch))
        } else {
            None
        };
        match slot {
            Some(i) => self.notes[i] = note,
            None => {
                self.reset(note.velocity, note.offset, note.length);
                self.notes[0] = note;
            }
        }
        self.enabled = true;
    }

    /// Mark a slot as held by a live performer.
    ///
    /// Takes the slot playing `pitch`, else the nearest voiced pitch
    /// (lowest index on ties), else the first disabled slot. A step left
    /// without any voiced slot is reset.
    pub fn steal_note(&mut self, pitch: u8) {
        let slot = self
            .slot_of(pitch)
            .or_else(|| self.nearest_slot(pitch))
            .or_else(|| self.first_disabled());
        if let Some(i) = slot {
            self.notes[i].number = NoteNumber::Stolen;
        }
        if !self.has_voices() {
            let first = self.notes[0];
            self.reset(first.velocity, first.offset, first.length);
        }
    }

    pub fn validate(&self) -> Result<(), EditError> {
        validate_probability(self.probability)?;
        for note in &self.notes {
            note.validate()?;
        }
        match (self.enabled, self.has_voices()) {
            (true, false) => Err(EditError::EnabledWithoutNotes),
            (false, true) => Err(EditError::DisabledWithNotes),
            _ => Ok(()),
        }
    }

    fn slot_of(&self, pitch: u8) -> Option<usize> {
        self.notes
            .iter()
            .position(|n| n.number == NoteNumber::Pitch(pitch))
    }

    fn first_disabled(&self) -> Option<usize> {
        self.notes
            .iter()
            .position(|n| n.number == NoteNumber::Disabled)
    }

    fn nearest_slot(&self, pitch: u8) -> Option<usize> {
        // min_by_key keeps the first of equal minima
        self.voices()
            .min_by_key(|&(_, p, _)| p.abs_diff(pitch))
            .map(|(i, _, _)| i)
    }
}

/// A step of either track kind, as carried by edits.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Step {
    Mono(MonoStep),
    Poly(PolyStep),
}

impl Step {
    pub fn validate(&self) -> Result<(), EditError> {
        match self {
            Step::Mono(s) => s.validate(),
            Step::Poly(s) => s.validate(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        match self {
            Step::Mono(s) => s.enabled,
            Step::Poly(s) => s.enabled,
        }
    }
}

impl From<MonoStep> for Step {
    fn from(step: MonoStep) -> Self {
        Step::Mono(step)
    }
}

impl From<PolyStep> for Step {
    fn from(step: PolyStep) -> Self {
        Step::Poly(step)
    }
}

fn validate_probability(p: f32) -> Result<(), EditError> {
    if p.is_finite() && (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(EditError::InvalidProbability(p))
    }
}
