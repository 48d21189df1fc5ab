//! Startup configuration for a sequencer.

use alloc::vec::Vec;
use ps_ir::{validate_bpm, validate_channel, validate_length, EditError, DEFAULT_TRACK_LENGTH};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TrackKind {
    Mono,
    Poly,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TrackConfig {
    pub kind: TrackKind,
    /// MIDI channel (1-16)
    pub channel: u8,
    /// Steps per loop
    pub length: usize,
    pub legato: bool,
    pub enabled: bool,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            kind: TrackKind::Mono,
            channel: 1,
            length: DEFAULT_TRACK_LENGTH,
            legato: false,
            enabled: true,
        }
    }
}

impl TrackConfig {
    pub fn mono(channel: u8) -> Self {
        Self {
            channel,
            ..Default::default()
        }
    }

    pub fn poly(channel: u8) -> Self {
        Self {
            kind: TrackKind::Poly,
            channel,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), EditError> {
        validate_channel(self.channel)?;
        validate_length(self.length)
    }
}

/// Live recording settings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RecordConfig {
    /// Write performed notes into steps
    pub armed: bool,
    /// Snap recorded notes to the step boundary
    pub quantize: bool,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SequencerConfig {
    pub bpm: f64,
    /// Seed for probability rolls
    pub seed: u64,
    pub record: RecordConfig,
    pub tracks: Vec<TrackConfig>,
}

impl Default for SequencerConfig {
    /// Four mono tracks on channels 1-4 and a poly track on channel 5.
    fn default() -> Self {
        let mut tracks: Vec<TrackConfig> = (1..=4).map(TrackConfig::mono).collect();
        tracks.push(TrackConfig::poly(5));
        Self {
            bpm: 120.0,
            seed: 0,
            record: RecordConfig::default(),
            tracks,
        }
    }
}

impl SequencerConfig {
    pub fn validate(&self) -> Result<(), EditError> {
        validate_bpm(self.bpm)?;
        self.tracks.iter().try_for_each(TrackConfig::validate)
    }
}
