//! Edit commands for mutating sequencer state during playback.

use crate::step::Step;

/// A command sent from a host or UI thread to the sequencer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Edit {
    /// Replace a step. With `preserve_count` the live alternate counter survives.
    SetStep {
        track: usize,
        index: usize,
        step: Step,
        preserve_count: bool,
    },
    SetTrackEnabled { track: usize, enabled: bool },
    SetTrackLength { track: usize, length: usize },
    SetLegato { track: usize, legato: bool },
    SetBpm(f64),
    /// Start from the top; `origin` is the host time of tick 0 in seconds
    Start { origin: f64 },
    Stop,
    Resume,
    /// Note-off for every sounding note
    Panic,
    /// Key pressed by a live performer
    NoteOn {
        channel: u8,
        pitch: u8,
        velocity: u8,
        time: f64,
    },
    /// Key released by a live performer
    NoteOff { channel: u8, pitch: u8, time: f64 },
}
