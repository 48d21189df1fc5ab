//! Events emitted by the engine.

/// Whether an event starts or ends a note.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NoteEventKind {
    NoteOn,
    NoteOff,
}

/// A timestamped note event.
///
/// `tick` counts ticks since the sequencer started. The host maps it to
/// wall-clock time as `origin + tick_duration * tick`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NoteEvent {
    pub kind: NoteEventKind,
    /// MIDI channel (1-16)
    pub channel: u8,
    /// MIDI note number (0-127)
    pub pitch: u8,
    /// Velocity (1-127)
    pub velocity: u8,
    /// Ticks since start
    pub tick: u64,
}

impl NoteEvent {
    pub const fn note_on(channel: u8, pitch: u8, velocity: u8, tick: u64) -> Self {
        Self {
            kind: NoteEventKind::NoteOn,
            channel,
            pitch,
            velocity,
            tick,
        }
    }

    pub const fn note_off(channel: u8, pitch: u8, velocity: u8, tick: u64) -> Self {
        Self {
            kind: NoteEventKind::NoteOff,
            channel,
            pitch,
            velocity,
            tick,
        }
    }

    pub const fn is_note_on(&self) -> bool {
        matches!(self.kind, NoteEventKind::NoteOn)
    }

    pub const fn is_note_off(&self) -> bool {
        matches!(self.kind, NoteEventKind::NoteOff)
    }
}
