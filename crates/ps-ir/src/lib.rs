//! Core types for the polystep sequencer.
//!
//! This crate defines the declarative step data (notes, mono and poly
//! steps), the events the engine emits, the edit commands a host sends
//! while playing, and the tick timebase shared by all of them.
//!
//! Designed to be `no_std` compatible.

#![cfg_attr(not(feature = "std"), no_std)]

mod edit;
mod error;
mod event;
mod note;
mod step;
mod time;

pub use edit::Edit;
pub use error::EditError;
pub use event::{NoteEvent, NoteEventKind};
pub use note::{
    validate_channel, Note, NoteNumber, DEFAULT_LENGTH, DEFAULT_NOTE, DEFAULT_VELOCITY,
    MAX_CHANNEL,
};
pub use step::{MonoStep, PolyStep, Step, POLYPHONY};
pub use time::{
    loop_end, loop_ticks, step_at_tick, steps_to_ticks, tick_duration, validate_bpm,
    validate_length, DEFAULT_TRACK_LENGTH, HALF_STEP_TICKS, MAX_BPM, MAX_LENGTH, STEPS_PER_BEAT,
    TICKS_PER_STEP,
};
