//! Keys currently held by a live performer.

/// A held key.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeldKey {
    /// MIDI channel (1-16)
    pub channel: u8,
    pub velocity: u8,
    /// Host time of the press, in seconds
    pub time: f64,
}

/// One entry per MIDI note number.
///
/// Read by the tick path to mute held pitches; written only by the
/// sequencer's note-on/note-off handlers.
#[derive(Clone, Debug)]
pub struct KeyboardMonitor {
    keys: [Option<HeldKey>; 128],
}

impl Default for KeyboardMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyboardMonitor {
    pub const fn new() -> Self {
        Self { keys: [None; 128] }
    }

    /// Record a key press. A second press of a held pitch replaces the first.
    pub fn press(&mut self, channel: u8, pitch: u8, velocity: u8, time: f64) {
        if let Some(key) = self.keys.get_mut(pitch as usize) {
            *key = Some(HeldKey {
                channel,
                velocity,
                time,
            });
        }
    }

    /// Record a key release, returning what was held.
    pub fn release(&mut self, pitch: u8) -> Option<HeldKey> {
        self.keys.get_mut(pitch as usize).and_then(Option::take)
    }

    /// The key held on `pitch`, on any channel.
    pub fn held(&self, pitch: u8) -> Option<&HeldKey> {
        self.keys.get(pitch as usize).and_then(Option::as_ref)
    }

    /// Returns true if `pitch` is held on `channel`.
    pub fn is_held(&self, channel: u8, pitch: u8) -> bool {
        self.held(pitch).is_some_and(|k| k.channel == channel)
    }

    /// Number of held keys.
    pub fn held_count(&self) -> usize {
        self.keys.iter().flatten().count()
    }

    pub fn clear(&mut self) {
        self.keys = [None; 128];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_and_release() {
        let mut kb = KeyboardMonitor::new();
        kb.press(2, 64, 90, 1.5);
        assert!(kb.is_held(2, 64));
        assert!(!kb.is_held(1, 64));
        assert!(!kb.is_held(2, 65));
        assert_eq!(kb.held_count(), 1);

        let key = kb.release(64).unwrap();
        assert_eq!(key.velocity, 90);
        assert_eq!(key.time, 1.5);
        assert!(!kb.is_held(2, 64));
        assert_eq!(kb.release(64), None);
    }

    #[test]
    fn out_of_range_pitch_is_ignored() {
        let mut kb = KeyboardMonitor::new();
        kb.press(1, 200, 100, 0.0);
        assert_eq!(kb.held_count(), 0);
        assert_eq!(kb.release(200), None);
    }

    #[test]
    fn repress_replaces_channel() {
        let mut kb = KeyboardMonitor::new();
        kb.press(1, 60, 100, 0.0);
        kb.press(3, 60, 80, 0.5);
        assert!(kb.is_held(3, 60));
        assert!(!kb.is_held(1, 60));
        kb.clear();
        assert_eq!(kb.held_count(), 0);
    }
}
