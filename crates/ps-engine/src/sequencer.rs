//! The sequencer: a set of tracks driven by a shared tick clock.
//!
//! `process` converts elapsed host time into ticks and advances every track
//! in index order, so events emitted within one tick are grouped by track.
//! Live key presses go through the keyboard monitor (muting poly voices on
//! the same channel) and, when recording is armed, into steps.

use alloc::boxed::Box;
use alloc::vec::Vec;
use fastrand::Rng;
use ps_ir::{tick_duration, validate_bpm, validate_channel, Edit, EditError, Step};

use crate::config::{RecordConfig, SequencerConfig, TrackConfig, TrackKind};
use crate::error::EngineError;
use crate::keyboard::KeyboardMonitor;
use crate::mono::MonoTrack;
use crate::poly::PolyTrack;
use crate::record::Recorder;
use crate::sink::EventSink;

/// A track of either kind.
#[derive(Clone, Debug)]
pub enum SequencerTrack {
    Mono(Box<MonoTrack>),
    Poly(Box<PolyTrack>),
}

macro_rules! each_track {
    ($track:expr, $t:ident => $body:expr) => {
        match $track {
            SequencerTrack::Mono($t) => $body,
            SequencerTrack::Poly($t) => $body,
        }
    };
}

impl SequencerTrack {
    pub fn from_config(config: &TrackConfig, seed: u64) -> Result<Self, EditError> {
        let rng = Rng::with_seed(seed);
        let (channel, length) = (config.channel, config.length);
        let mut track = match config.kind {
            TrackKind::Mono => {
                let track = MonoTrack::new(channel, length)?.with_rng(rng);
                SequencerTrack::Mono(Box::new(track))
            }
            TrackKind::Poly => {
                let track = PolyTrack::new(channel, length)?.with_rng(rng);
                SequencerTrack::Poly(Box::new(track))
            }
        };
        track.set_legato(config.legato);
        track.set_enabled(config.enabled);
        Ok(track)
    }

    pub fn kind(&self) -> TrackKind {
        match self {
            SequencerTrack::Mono(_) => TrackKind::Mono,
            SequencerTrack::Poly(_) => TrackKind::Poly,
        }
    }

    pub fn tick<K: EventSink + ?Sized>(&mut self, keyboard: &KeyboardMonitor, sink: &mut K) {
        each_track!(self, t => t.tick(keyboard, sink))
    }

    /// Stage a step edit; fails if the step kind does not match the track.
    pub fn set_step(
        &mut self,
        index: usize,
        step: Step,
        preserve_count: bool,
    ) -> Result<(), EditError> {
        match (self, step) {
            (SequencerTrack::Mono(t), Step::Mono(s)) => t.set_step(index, s, preserve_count),
            (SequencerTrack::Poly(t), Step::Poly(s)) => t.set_step(index, s, preserve_count),
            _ => Err(EditError::KindMismatch),
        }
    }

    pub fn step(&self, index: usize) -> Option<Step> {
        each_track!(self, t => t.step(index).map(|s| Step::from(*s)))
    }

    pub fn pending_step(&self, index: usize) -> Option<Step> {
        each_track!(self, t => t.pending_step(index).map(Step::from))
    }

    pub fn channel(&self) -> u8 {
        each_track!(self, t => t.channel())
    }

    pub fn set_channel(&mut self, channel: u8) -> Result<(), EditError> {
        each_track!(self, t => t.set_channel(channel))
    }

    pub fn is_enabled(&self) -> bool {
        each_track!(self, t => t.is_enabled())
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        each_track!(self, t => t.set_enabled(enabled))
    }

    pub fn legato(&self) -> bool {
        each_track!(self, t => t.legato())
    }

    pub fn set_legato(&mut self, legato: bool) {
        each_track!(self, t => t.set_legato(legato))
    }

    pub fn length(&self) -> usize {
        each_track!(self, t => t.length())
    }

    pub fn set_length(&mut self, length: usize) -> Result<(), EditError> {
        each_track!(self, t => t.set_length(length))
    }

    pub fn cursor(&self) -> i32 {
        each_track!(self, t => t.cursor())
    }

    pub fn elapsed(&self) -> u64 {
        each_track!(self, t => t.elapsed())
    }

    pub fn current_step_index(&self) -> usize {
        each_track!(self, t => t.current_step_index())
    }

    pub fn has_pending_edits(&self) -> bool {
        each_track!(self, t => t.has_pending_edits())
    }

    pub fn sounding_count(&self) -> usize {
        each_track!(self, t => t.sounding_count())
    }

    pub fn dropped_notes(&self) -> u64 {
        each_track!(self, t => t.dropped_notes())
    }

    pub fn return_to_start(&mut self) {
        each_track!(self, t => t.return_to_start())
    }

    pub fn release_all<K: EventSink + ?Sized>(&mut self, sink: &mut K) {
        each_track!(self, t => t.release_all(sink))
    }
}

/// A step written by live recording.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RecordedStep {
    pub track: usize,
    pub index: usize,
    pub step: Step,
}

#[derive(Clone, Debug)]
pub struct Sequencer {
    tracks: Vec<SequencerTrack>,
    keyboard: KeyboardMonitor,
    recorder: Recorder,
    bpm: f64,
    /// Track `i` rolls probabilities from `seed + i`
    seed: u64,
    running: bool,
    /// Host time of tick 0, in seconds
    start_time: f64,
    /// Seconds processed since start
    time_since_start: f64,
    /// Seconds not yet turned into ticks
    accumulator: f64,
    elapsed_ticks: u64,
}

impl Sequencer {
    /// A stopped sequencer with no tracks.
    pub fn new(bpm: f64) -> Result<Self, EditError> {
        validate_bpm(bpm)?;
        Ok(Self {
            tracks: Vec::new(),
            keyboard: KeyboardMonitor::new(),
            recorder: Recorder::default(),
            bpm,
            seed: 0,
            running: false,
            start_time: 0.0,
            time_since_start: 0.0,
            accumulator: 0.0,
            elapsed_ticks: 0,
        })
    }

    pub fn from_config(config: &SequencerConfig) -> Result<Self, EditError> {
        config.validate()?;
        let mut sequencer = Self::new(config.bpm)?;
        sequencer.recorder = Recorder::new(config.record);
        sequencer.seed = config.seed;
        for (i, track) in config.tracks.iter().enumerate() {
            let seed = config.seed.wrapping_add(i as u64);
            sequencer.tracks.push(SequencerTrack::from_config(track, seed)?);
        }
        log::info!(
            "sequencer: {} tracks at {} bpm",
            sequencer.tracks.len(),
            sequencer.bpm
        );
        Ok(sequencer)
    }

    /// Append a track, returning its index.
    pub fn add_track(&mut self, config: &TrackConfig) -> Result<usize, EditError> {
        config.validate()?;
        let seed = self.seed.wrapping_add(self.tracks.len() as u64);
        self.tracks.push(SequencerTrack::from_config(config, seed)?);
        Ok(self.tracks.len() - 1)
    }

    // --- Transport ---

    /// Start from the top. `origin` is the host time of tick 0, in seconds.
    ///
    /// Anything still sounding is released first.
    pub fn start<K: EventSink + ?Sized>(&mut self, origin: f64, sink: &mut K) {
        self.start_time = origin;
        self.time_since_start = 0.0;
        self.accumulator = 0.0;
        self.elapsed_ticks = 0;
        for track in &mut self.tracks {
            track.release_all(sink);
            track.return_to_start();
        }
        self.running = true;
    }

    /// Pause; sounding notes keep sounding until resumed or released.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Continue from where `stop` left off.
    pub fn resume(&mut self) {
        self.running = true;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Takes effect from the next tick; already scheduled ticks keep their place.
    pub fn set_bpm(&mut self, bpm: f64) -> Result<(), EditError> {
        validate_bpm(bpm)?;
        self.bpm = bpm;
        Ok(())
    }

    // --- Clock ---

    /// Advance by `dt` seconds of host time, running every whole tick that fits.
    pub fn process<K: EventSink + ?Sized>(&mut self, dt: f64, sink: &mut K) {
        if !self.running || dt.is_nan() || dt <= 0.0 {
            return;
        }
        self.time_since_start += dt;
        self.accumulator += dt;
        let tick = tick_duration(self.bpm);
        while self.accumulator >= tick {
            self.accumulator -= tick;
            self.tick(sink);
        }
    }

    /// Advance every track by one tick.
    pub fn tick<K: EventSink + ?Sized>(&mut self, sink: &mut K) {
        if !self.running {
            return;
        }
        for track in &mut self.tracks {
            track.tick(&self.keyboard, sink);
        }
        self.elapsed_ticks += 1;
    }

    /// Seconds per tick at the current tempo.
    pub fn tick_duration(&self) -> f64 {
        tick_duration(self.bpm)
    }

    /// Host time of an event tick, assuming the current tempo since start.
    pub fn tick_to_time(&self, tick: u64) -> f64 {
        self.start_time + tick as f64 * self.tick_duration()
    }

    pub fn elapsed_ticks(&self) -> u64 {
        self.elapsed_ticks
    }

    pub fn time_since_start(&self) -> f64 {
        self.time_since_start
    }

    /// Note-off for every sounding note on every track.
    pub fn panic<K: EventSink + ?Sized>(&mut self, sink: &mut K) {
        for track in &mut self.tracks {
            track.release_all(sink);
        }
    }

    // --- Tracks ---

    pub fn tracks(&self) -> &[SequencerTrack] {
        &self.tracks
    }

    pub fn track(&self, track: usize) -> Option<&SequencerTrack> {
        self.tracks.get(track)
    }

    fn track_mut(&mut self, track: usize) -> Result<&mut SequencerTrack, EditError> {
        self.tracks.get_mut(track).ok_or(EditError::NoSuchTrack(track))
    }

    pub fn set_step(
        &mut self,
        track: usize,
        index: usize,
        step: Step,
        preserve_count: bool,
    ) -> Result<(), EditError> {
        self.track_mut(track)?.set_step(index, step, preserve_count)
    }

    pub fn set_track_enabled(&mut self, track: usize, enabled: bool) -> Result<(), EditError> {
        self.track_mut(track)?.set_enabled(enabled);
        Ok(())
    }

    pub fn set_track_length(&mut self, track: usize, length: usize) -> Result<(), EditError> {
        self.track_mut(track)?.set_length(length)
    }

    pub fn set_legato(&mut self, track: usize, legato: bool) -> Result<(), EditError> {
        self.track_mut(track)?.set_legato(legato);
        Ok(())
    }

    pub fn set_track_channel(&mut self, track: usize, channel: u8) -> Result<(), EditError> {
        self.track_mut(track)?.set_channel(channel)
    }

    /// Apply an edit command.
    pub fn apply<K: EventSink + ?Sized>(
        &mut self,
        edit: Edit,
        sink: &mut K,
    ) -> Result<Option<RecordedStep>, EngineError> {
        match edit {
            Edit::SetStep {
                track,
                index,
                step,
                preserve_count,
            } => self.set_step(track, index, step, preserve_count)?,
            Edit::SetTrackEnabled { track, enabled } => self.set_track_enabled(track, enabled)?,
            Edit::SetTrackLength { track, length } => self.set_track_length(track, length)?,
            Edit::SetLegato { track, legato } => self.set_legato(track, legato)?,
            Edit::SetBpm(bpm) => self.set_bpm(bpm)?,
            Edit::Start { origin } => self.start(origin, sink),
            Edit::Stop => self.stop(),
            Edit::Resume => self.resume(),
            Edit::Panic => self.panic(sink),
            Edit::NoteOn {
                channel,
                pitch,
                velocity,
                time,
            } => self.handle_note_on(channel, pitch, velocity, time)?,
            Edit::NoteOff {
                channel,
                pitch,
                time,
            } => return self.handle_note_off(channel, pitch, time),
        }
        Ok(None)
    }

    // --- Live input ---

    pub fn keyboard(&self) -> &KeyboardMonitor {
        &self.keyboard
    }

    pub fn record_config(&self) -> RecordConfig {
        self.recorder.config()
    }

    pub fn set_recording(&mut self, armed: bool) {
        self.recorder.set_armed(armed);
    }

    pub fn set_quantize(&mut self, quantize: bool) {
        self.recorder.set_quantize(quantize);
    }

    /// A performer pressed a key at host time `time`.
    pub fn handle_note_on(
        &mut self,
        channel: u8,
        pitch: u8,
        velocity: u8,
        time: f64,
    ) -> Result<(), EngineError> {
        validate_channel(channel)?;
        if pitch > 127 {
            return Err(EditError::InvalidPitch(pitch).into());
        }
        if !(1..=127).contains(&velocity) {
            return Err(EditError::InvalidVelocity(velocity).into());
        }
        self.keyboard.press(channel, pitch, velocity, time);

        if !(self.running && self.recorder.is_armed()) {
            return Ok(());
        }
        let Some(track) = self.tracks.iter().position(|t| t.channel() == channel) else {
            return Ok(());
        };
        let position = self.loop_position(track, time);
        let length = self.tracks[track].length();
        self.recorder
            .begin(track, channel, pitch, velocity, time, position, length);
        Ok(())
    }

    /// A performer released a key at host time `time`.
    ///
    /// The key is always released. Returns the recorded step when a take
    /// was open for it.
    pub fn handle_note_off(
        &mut self,
        channel: u8,
        pitch: u8,
        time: f64,
    ) -> Result<Option<RecordedStep>, EngineError> {
        let take = self.recorder.finish(pitch);
        let Some(key) = self.keyboard.release(pitch) else {
            return Err(EngineError::UnmatchedNoteOff { channel, pitch });
        };
        if key.channel != channel {
            return Err(EngineError::ChannelMismatch {
                pitch,
                pressed: key.channel,
                released: channel,
            });
        }
        let Some(take) = take else {
            return Ok(None);
        };

        let note = take.note(pitch, time, self.tick_duration());
        let track = self.track_mut(take.track)?;
        let Some(current) = track.pending_step(take.index) else {
            return Ok(None);
        };
        // builds on any edit still waiting for this step
        let step = match current {
            Step::Mono(mut s) => {
                s.enabled = true;
                s.note = note;
                Step::Mono(s)
            }
            Step::Poly(mut s) => {
                s.add_note(note);
                Step::Poly(s)
            }
        };
        track.set_step(take.index, step, true)?;
        Ok(Some(RecordedStep {
            track: take.track,
            index: take.index,
            step,
        }))
    }

    /// Tick of host time `time` on track `track`'s loop clock, unwrapped.
    fn loop_position(&self, track: usize, time: f64) -> f64 {
        let t = &self.tracks[track];
        let ticks = (time - self.start_time) / self.tick_duration();
        f64::from(t.cursor()) + (ticks - t.elapsed() as f64)
    }
}
