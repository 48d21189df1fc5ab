//! Headless controller for the polystep sequencer.
//!
//! Owns a [`Sequencer`] and drives it from a clock thread while playing.
//! Edits and live key events travel to the clock thread over a lock-free
//! ring buffer; note events and recorded steps come back over another.
//! While stopped, edits apply directly.

mod config;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use ps_engine::EventSink;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

pub use config::{load_config, parse_config, ConfigError, ConfigFile, PatternStep};
// Re-export common types so callers don't need ps-ir/ps-engine directly.
pub use ps_engine::{
    EngineError, RecordedStep, Sequencer, SequencerConfig, TrackConfig, TrackKind,
};
pub use ps_ir::{Edit, EditError, MonoStep, Note, NoteEvent, NoteEventKind, PolyStep, Step};

/// Clock thread wake-up period.
pub const CLOCK_INTERVAL: Duration = Duration::from_millis(1);
/// Capacity of the edit queue.
pub const EDIT_QUEUE_SIZE: usize = 1024;
/// Capacity of the output queue.
pub const OUTPUT_QUEUE_SIZE: usize = 8192;

/// Something the sequencer produced.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Output {
    Note(NoteEvent),
    /// A step written by live recording
    Recorded(RecordedStep),
    /// An edit the engine refused
    Rejected(EngineError),
}

#[derive(Debug)]
pub enum ControllerError {
    Engine(EngineError),
    /// The clock thread is not keeping up with edits
    QueueFull,
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::Engine(e) => write!(f, "{}", e),
            ControllerError::QueueFull => write!(f, "edit queue full"),
        }
    }
}

impl std::error::Error for ControllerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ControllerError::Engine(e) => Some(e),
            ControllerError::QueueFull => None,
        }
    }
}

impl From<EditError> for ControllerError {
    fn from(e: EditError) -> Self {
        ControllerError::Engine(EngineError::Edit(e))
    }
}

impl From<EngineError> for ControllerError {
    fn from(e: EngineError) -> Self {
        ControllerError::Engine(e)
    }
}

/// Headless sequencer controller: owns the sequencer and manages playback.
pub struct Controller {
    /// None while the clock thread owns it
    sequencer: Option<Sequencer>,
    /// Track kinds, for checking edits while the sequencer is away
    layout: Vec<TrackKind>,
    /// Host time zero
    epoch: Instant,
    /// Outputs produced while stopped
    idle_outputs: Vec<Output>,
    playback: Option<PlaybackHandle>,
}

struct PlaybackHandle {
    stop_signal: Arc<AtomicBool>,
    elapsed_ticks: Arc<AtomicU64>,
    edits: HeapProd<Edit>,
    outputs: HeapCons<Output>,
    thread: Option<JoinHandle<Sequencer>>,
}

impl Controller {
    pub fn new(sequencer: Sequencer) -> Self {
        let layout = sequencer.tracks().iter().map(|t| t.kind()).collect();
        Self {
            sequencer: Some(sequencer),
            layout,
            epoch: Instant::now(),
            idle_outputs: Vec::new(),
            playback: None,
        }
    }

    pub fn from_config(config: &SequencerConfig) -> Result<Self, EditError> {
        Ok(Self::new(Sequencer::from_config(config)?))
    }

    pub fn from_file(file: &ConfigFile) -> Result<Self, ConfigError> {
        Ok(Self::new(file.build()?))
    }

    /// The sequencer, while stopped.
    pub fn sequencer(&self) -> Option<&Sequencer> {
        self.sequencer.as_ref()
    }

    /// Seconds since this controller was created; the time base for
    /// transport and live input.
    pub fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    // --- Edits ---

    /// Send an edit. Checked here first; while playing it reaches the
    /// sequencer on the next clock wake-up.
    pub fn send(&mut self, edit: Edit) -> Result<(), ControllerError> {
        if let Err(e) = self.check(&edit) {
            log::debug!("edit rejected: {}", e);
            return Err(e.into());
        }
        if let Some(pb) = self.playback.as_mut() {
            return pb.edits.try_push(edit).map_err(|_| ControllerError::QueueFull);
        }
        let Some(seq) = self.sequencer.as_mut() else {
            return Ok(());
        };
        let mut sink = VecSink(&mut self.idle_outputs);
        if let Some(recorded) = seq.apply(edit, &mut sink)? {
            self.idle_outputs.push(Output::Recorded(recorded));
        }
        Ok(())
    }

    pub fn set_step(
        &mut self,
        track: usize,
        index: usize,
        step: Step,
        preserve_count: bool,
    ) -> Result<(), ControllerError> {
        self.send(Edit::SetStep {
            track,
            index,
            step,
            preserve_count,
        })
    }

    pub fn set_track_enabled(&mut self, track: usize, enabled: bool) -> Result<(), ControllerError> {
        self.send(Edit::SetTrackEnabled { track, enabled })
    }

    pub fn set_track_length(&mut self, track: usize, length: usize) -> Result<(), ControllerError> {
        self.send(Edit::SetTrackLength { track, length })
    }

    pub fn set_legato(&mut self, track: usize, legato: bool) -> Result<(), ControllerError> {
        self.send(Edit::SetLegato { track, legato })
    }

    pub fn set_bpm(&mut self, bpm: f64) -> Result<(), ControllerError> {
        self.send(Edit::SetBpm(bpm))
    }

    /// Live key press, stamped with the current host time.
    pub fn note_on(&mut self, channel: u8, pitch: u8, velocity: u8) -> Result<(), ControllerError> {
        let time = self.now();
        self.send(Edit::NoteOn {
            channel,
            pitch,
            velocity,
            time,
        })
    }

    /// Live key release, stamped with the current host time.
    pub fn note_off(&mut self, channel: u8, pitch: u8) -> Result<(), ControllerError> {
        let time = self.now();
        self.send(Edit::NoteOff {
            channel,
            pitch,
            time,
        })
    }

    pub fn panic(&mut self) -> Result<(), ControllerError> {
        self.send(Edit::Panic)
    }

    fn check(&self, edit: &Edit) -> Result<(), EditError> {
        let track_kind = |track: usize| {
            self.layout
                .get(track)
                .copied()
                .ok_or(EditError::NoSuchTrack(track))
        };
        match *edit {
            Edit::SetStep {
                track, index, step, ..
            } => {
                let kind = track_kind(track)?;
                let matches = matches!(
                    (kind, step),
                    (TrackKind::Mono, Step::Mono(_)) | (TrackKind::Poly, Step::Poly(_))
                );
                if !matches {
                    return Err(EditError::KindMismatch);
                }
                if index >= ps_ir::MAX_LENGTH {
                    return Err(EditError::IndexOutOfRange(index));
                }
                step.validate()
            }
            Edit::SetTrackEnabled { track, .. } | Edit::SetLegato { track, .. } => {
                track_kind(track).map(|_| ())
            }
            Edit::SetTrackLength { track, length } => {
                track_kind(track)?;
                ps_ir::validate_length(length)
            }
            Edit::SetBpm(bpm) => ps_ir::validate_bpm(bpm),
            Edit::NoteOn {
                channel,
                pitch,
                velocity,
                ..
            } => {
                ps_ir::validate_channel(channel)?;
                Note::new(pitch, velocity, 0.0, 1.0).validate()
            }
            Edit::NoteOff { channel, pitch, .. } => {
                ps_ir::validate_channel(channel)?;
                if pitch > 127 {
                    return Err(EditError::InvalidPitch(pitch));
                }
                Ok(())
            }
            Edit::Start { .. } | Edit::Stop | Edit::Resume | Edit::Panic => Ok(()),
        }
    }

    // --- Real-time playback ---

    /// Start from the top on a clock thread.
    pub fn play(&mut self) {
        self.stop();
        let Some(mut seq) = self.sequencer.take() else {
            return;
        };
        let origin = self.now();
        seq.start(origin, &mut VecSink(&mut self.idle_outputs));

        let (edits, edit_rx) = HeapRb::<Edit>::new(EDIT_QUEUE_SIZE).split();
        let (output_tx, outputs) = HeapRb::<Output>::new(OUTPUT_QUEUE_SIZE).split();
        let stop_signal = Arc::new(AtomicBool::new(false));
        let elapsed_ticks = Arc::new(AtomicU64::new(0));

        let stop = stop_signal.clone();
        let ticks = elapsed_ticks.clone();
        let thread = std::thread::spawn(move || clock_thread(seq, stop, ticks, edit_rx, output_tx));
        log::info!("clock thread started");

        self.playback = Some(PlaybackHandle {
            stop_signal,
            elapsed_ticks,
            edits,
            outputs,
            thread: Some(thread),
        });
    }

    /// Stop the clock thread and take the sequencer back.
    ///
    /// Edits still queued are applied on the way out, then every sounding
    /// note is released.
    pub fn stop(&mut self) {
        let Some(mut pb) = self.playback.take() else {
            return;
        };
        pb.stop_signal.store(true, Ordering::Relaxed);
        let joined = pb.thread.take().map(|handle| handle.join());
        self.idle_outputs.extend(pb.outputs.pop_iter());

        match joined {
            Some(Ok(mut seq)) => {
                seq.panic(&mut VecSink(&mut self.idle_outputs));
                seq.stop();
                self.sequencer = Some(seq);
            }
            _ => log::error!("clock thread panicked; sequencer lost"),
        }
        log::info!("clock thread stopped");
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_some()
    }

    /// Ticks run since `play`.
    pub fn elapsed_ticks(&self) -> u64 {
        match (&self.playback, &self.sequencer) {
            (Some(pb), _) => pb.elapsed_ticks.load(Ordering::Relaxed),
            (None, Some(seq)) => seq.elapsed_ticks(),
            (None, None) => 0,
        }
    }

    /// Hand every output produced so far to `f`, oldest first.
    pub fn poll(&mut self, mut f: impl FnMut(Output)) {
        for output in self.idle_outputs.drain(..) {
            f(output);
        }
        if let Some(pb) = self.playback.as_mut() {
            for output in pb.outputs.pop_iter() {
                f(output);
            }
        }
    }

    // --- Offline rendering ---

    /// Run a copy of the sequencer for `ticks` ticks from the top.
    ///
    /// Notes still sounding at the end are released, so every note-on has
    /// its note-off. The live sequencer is untouched. `None` while playing.
    pub fn render_offline(&self, ticks: u64) -> Option<Vec<NoteEvent>> {
        let mut seq = self.sequencer.clone()?;
        let mut events = Vec::new();
        seq.start(0.0, &mut events);
        for _ in 0..ticks {
            seq.tick(&mut events);
        }
        seq.panic(&mut events);
        Some(events)
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Collects outputs while stopped.
struct VecSink<'a>(&'a mut Vec<Output>);

impl EventSink for VecSink<'_> {
    fn emit(&mut self, event: NoteEvent) {
        self.0.push(Output::Note(event));
    }
}

/// Feeds the output queue from the clock thread.
struct QueueSink<'a> {
    producer: &'a mut HeapProd<Output>,
    overflowed: usize,
}

impl QueueSink<'_> {
    fn push(&mut self, output: Output) {
        if self.producer.try_push(output).is_err() {
            self.overflowed += 1;
        }
    }
}

impl EventSink for QueueSink<'_> {
    fn emit(&mut self, event: NoteEvent) {
        self.push(Output::Note(event));
    }
}

fn clock_thread(
    mut seq: Sequencer,
    stop_signal: Arc<AtomicBool>,
    elapsed_ticks: Arc<AtomicU64>,
    mut edits: HeapCons<Edit>,
    mut outputs: HeapProd<Output>,
) -> Sequencer {
    let mut last = Instant::now();
    while !stop_signal.load(Ordering::Relaxed) {
        std::thread::sleep(CLOCK_INTERVAL);
        let now = Instant::now();
        let dt = now.duration_since(last).as_secs_f64();
        last = now;

        let mut sink = QueueSink {
            producer: &mut outputs,
            overflowed: 0,
        };
        #[cfg(feature = "alloc_check")]
        assert_no_alloc::assert_no_alloc(|| run_block(&mut seq, &mut edits, &mut sink, dt));
        #[cfg(not(feature = "alloc_check"))]
        run_block(&mut seq, &mut edits, &mut sink, dt);

        elapsed_ticks.store(seq.elapsed_ticks(), Ordering::Relaxed);
        if sink.overflowed > 0 {
            log::warn!("output queue full, dropped {} outputs", sink.overflowed);
        }
    }
    drain_edits(&mut seq, &mut edits, &mut outputs);
    seq
}

/// Apply queued edits, then advance the clock by `dt`.
fn run_block(seq: &mut Sequencer, edits: &mut HeapCons<Edit>, sink: &mut QueueSink<'_>, dt: f64) {
    while let Some(edit) = edits.try_pop() {
        match seq.apply(edit, sink) {
            Ok(Some(recorded)) => sink.push(Output::Recorded(recorded)),
            Ok(None) => {}
            Err(e) => sink.push(Output::Rejected(e)),
        }
    }
    seq.process(dt, sink);
}

fn drain_edits(seq: &mut Sequencer, edits: &mut HeapCons<Edit>, outputs: &mut HeapProd<Output>) {
    let mut sink = QueueSink {
        producer: outputs,
        overflowed: 0,
    };
    run_block(seq, edits, &mut sink, 0.0);
}
