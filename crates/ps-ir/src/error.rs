//! Error type for rejected edits.

use core::fmt;

/// Why an edit was rejected. The target keeps its previous state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EditError {
    /// Step index outside `0..MAX_LENGTH`
    IndexOutOfRange(usize),
    /// No track at this index
    NoSuchTrack(usize),
    /// Track length outside `1..=MAX_LENGTH`
    InvalidLength(usize),
    /// MIDI channel outside `1..=16`
    InvalidChannel(u8),
    /// Note number above 127
    InvalidPitch(u8),
    /// A mono step must carry a pitch
    MissingPitch,
    /// Velocity outside `1..=127`
    InvalidVelocity(u8),
    /// Offset outside `[-0.5, 0.5)` steps
    InvalidOffset(f32),
    /// Gate length not in `(0, MAX_LENGTH]` steps
    InvalidGate(f32),
    /// Probability outside `[0, 1]`
    InvalidProbability(f32),
    /// Alternate count of zero
    InvalidAlternate(u32),
    /// Retrigger rate neither 0 nor at least one tick
    InvalidRetrigger(f32),
    /// Poly step flagged enabled with no voiced slot
    EnabledWithoutNotes,
    /// Poly step flagged disabled while a slot still holds a pitch
    DisabledWithNotes,
    /// Mono step sent to a poly track or the other way round
    KindMismatch,
    /// Tempo not in `(0, MAX_BPM]`
    InvalidBpm(f64),
}

impl fmt::Display for EditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditError::IndexOutOfRange(i) => write!(f, "step index {} out of range", i),
            EditError::NoSuchTrack(t) => write!(f, "no track {}", t),
            EditError::InvalidLength(l) => write!(f, "invalid track length {}", l),
            EditError::InvalidChannel(c) => write!(f, "invalid MIDI channel {}", c),
            EditError::InvalidPitch(p) => write!(f, "invalid note number {}", p),
            EditError::MissingPitch => write!(f, "mono step has no note number"),
            EditError::InvalidVelocity(v) => write!(f, "invalid velocity {}", v),
            EditError::InvalidOffset(o) => write!(f, "invalid offset {}", o),
            EditError::InvalidGate(g) => write!(f, "invalid gate length {}", g),
            EditError::InvalidProbability(p) => write!(f, "invalid probability {}", p),
            EditError::InvalidAlternate(a) => write!(f, "invalid alternate count {}", a),
            EditError::InvalidRetrigger(r) => write!(f, "invalid retrigger rate {}", r),
            EditError::EnabledWithoutNotes => write!(f, "enabled poly step has no notes"),
            EditError::DisabledWithNotes => write!(f, "disabled poly step still has notes"),
            EditError::KindMismatch => write!(f, "step kind does not match track kind"),
            EditError::InvalidBpm(b) => write!(f, "invalid tempo {}", b),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EditError {}
