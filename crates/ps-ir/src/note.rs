//! Note values stored in steps.

use crate::error::EditError;
use crate::time::{steps_to_ticks, HALF_STEP_TICKS, MAX_LENGTH, TICKS_PER_STEP};

/// C4.
pub const DEFAULT_NOTE: u8 = 60;
/// 1..=127; velocity 0 would read as a note-off.
pub const DEFAULT_VELOCITY: u8 = 100;
/// Gate length in steps.
pub const DEFAULT_LENGTH: f32 = 0.75;
/// Highest MIDI channel (channels are 1-based).
pub const MAX_CHANNEL: u8 = 16;

/// The note number of a step slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NoteNumber {
    /// Unused polyphony slot
    Disabled,
    /// Slot whose key is held by a live performer; never voiced by the sequencer
    Stolen,
    /// MIDI note number (0-127)
    Pitch(u8),
}

impl NoteNumber {
    /// The MIDI note number, if this slot is voiced.
    pub const fn pitch(self) -> Option<u8> {
        match self {
            NoteNumber::Pitch(p) => Some(p),
            _ => None,
        }
    }

    /// Returns true if the sequencer should play this slot.
    pub const fn is_voiced(self) -> bool {
        matches!(self, NoteNumber::Pitch(_))
    }
}

/// A single note: pitch, velocity and timing relative to its step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Note {
    pub number: NoteNumber,
    /// Velocity (1-127)
    pub velocity: u8,
    /// Start relative to the step boundary, in steps
    pub offset: f32,
    /// Gate length in steps, may exceed one step
    pub length: f32,
}

impl Default for Note {
    fn default() -> Self {
        Self::new(DEFAULT_NOTE, DEFAULT_VELOCITY, 0.0, DEFAULT_LENGTH)
    }
}

impl Note {
    pub const fn new(pitch: u8, velocity: u8, offset: f32, length: f32) -> Self {
        Self {
            number: NoteNumber::Pitch(pitch),
            velocity,
            offset,
            length,
        }
    }

    /// An unused slot that still carries timing defaults.
    pub const fn disabled(velocity: u8, offset: f32, length: f32) -> Self {
        Self {
            number: NoteNumber::Disabled,
            velocity,
            offset,
            length,
        }
    }

    /// Loop-relative tick of the note-on when placed on step `index`.
    ///
    /// Always inside the step's window `[i*T - H, i*T + H)`.
    pub fn on_tick(&self, index: usize) -> i32 {
        let offset = steps_to_ticks(self.offset).clamp(-HALF_STEP_TICKS, HALF_STEP_TICKS - 1);
        index as i32 * TICKS_PER_STEP + offset
    }

    /// Loop-relative tick of the note-off when placed on step `index`.
    pub fn off_tick(&self, index: usize) -> i32 {
        self.on_tick(index) + steps_to_ticks(self.length).max(0)
    }

    /// Check velocity, offset, length and pitch range.
    pub fn validate(&self) -> Result<(), EditError> {
        if let NoteNumber::Pitch(p) = self.number {
            if p > 127 {
                return Err(EditError::InvalidPitch(p));
            }
        }
        if !(1..=127).contains(&self.velocity) {
            return Err(EditError::InvalidVelocity(self.velocity));
        }
        if !(self.offset.is_finite() && (-0.5..0.5).contains(&self.offset)) {
            return Err(EditError::InvalidOffset(self.offset));
        }
        // at least one tick long once rounded
        let min_length = 0.5 / TICKS_PER_STEP as f32;
        if !(self.length.is_finite()
            && self.length >= min_length
            && self.length <= MAX_LENGTH as f32)
        {
            return Err(EditError::InvalidGate(self.length));
        }
        Ok(())
    }
}

/// Check a 1-based MIDI channel.
pub fn validate_channel(channel: u8) -> Result<(), EditError> {
    if (1..=MAX_CHANNEL).contains(&channel) {
        Ok(())
    } else {
        Err(EditError::InvalidChannel(channel))
    }
}
