//! Errors reported by the sequencer.

use core::fmt;
use ps_ir::EditError;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EngineError {
    /// The edit or event was invalid; nothing changed
    Edit(EditError),
    /// Note-off for a key that was not held
    UnmatchedNoteOff { channel: u8, pitch: u8 },
    /// Note-off on a different channel than its note-on. The key is released.
    ChannelMismatch { pitch: u8, pressed: u8, released: u8 },
}

impl From<EditError> for EngineError {
    fn from(e: EditError) -> Self {
        EngineError::Edit(e)
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Edit(e) => write!(f, "{}", e),
            EngineError::UnmatchedNoteOff { channel, pitch } => {
                write!(f, "note-off without note-on: channel {} note {}", channel, pitch)
            }
            EngineError::ChannelMismatch {
                pitch,
                pressed,
                released,
            } => write!(
                f,
                "note {} pressed on channel {} but released on channel {}",
                pitch, pressed, released
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Edit(e) => Some(e),
            _ => None,
        }
    }
}
