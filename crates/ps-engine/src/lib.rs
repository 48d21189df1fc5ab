//! Tick-driven engine for the polystep sequencer.
//!
//! Renders mono and poly steps into per-track event horizons and emits
//! note events one tick at a time. Nothing on the tick path allocates.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod config;
mod error;
mod horizon;
mod keyboard;
mod mono;
mod poly;
pub mod record;
mod sequencer;
mod sink;
pub mod track;

pub use config::{RecordConfig, SequencerConfig, TrackConfig, TrackKind};
pub use error::EngineError;
pub use horizon::HORIZON_CAPACITY;
pub use keyboard::{HeldKey, KeyboardMonitor};
pub use mono::MonoTrack;
pub use poly::PolyTrack;
pub use record::Recorder;
pub use sequencer::{RecordedStep, Sequencer, SequencerTrack};
pub use sink::{EventSink, FnSink};
pub use track::{Pass, Track, TrackStep};
