//! Allocation-free tick path tests.
//!
//! These tests verify that `Sequencer::tick()`, `process()` and `apply()`
//! do not allocate once the sequencer is built. They run busy patterns
//! with edits, live keys and recording for many loops to catch
//! allocations on wraparound, late renders and deferred edits.

use assert_no_alloc::{assert_no_alloc, AllocDisabler};

#[cfg(debug_assertions)]
#[global_allocator]
static A: AllocDisabler = AllocDisabler;

use ps_engine::{EventSink, Sequencer, SequencerConfig};
use ps_ir::{Edit, MonoStep, Note, NoteEvent, PolyStep, Step};

#[derive(Default)]
struct CountingSink {
    on: usize,
    off: usize,
}

impl EventSink for CountingSink {
    fn emit(&mut self, event: NoteEvent) {
        if event.is_note_on() {
            self.on += 1;
        } else {
            self.off += 1;
        }
    }
}

fn mono(pitch: u8, offset: f32, length: f32) -> Step {
    Step::Mono(MonoStep::with_note(Note::new(pitch, 100, offset, length)))
}

fn chord(pitches: &[u8], length: f32) -> Step {
    let mut step = PolyStep::default();
    for &p in pitches {
        step.add_note(Note::new(p, 90, 0.0, length));
    }
    Step::Poly(step)
}

/// Default layout with something on every track.
fn busy_sequencer() -> Sequencer {
    let mut seq = Sequencer::from_config(&SequencerConfig::default()).unwrap();
    for track in 0..4 {
        for index in (track..16).step_by(2) {
            let offset = if index % 3 == 0 { -0.25 } else { 0.2 };
            seq.set_step(track, index, mono(36 + index as u8, offset, 1.5), false)
                .unwrap();
        }
    }
    let mut roll = MonoStep::with_note(Note::new(70, 80, 0.0, 2.0));
    roll.retrigger_rate = 0.25;
    roll.probability = 0.5;
    seq.set_step(3, 15, Step::Mono(roll), false).unwrap();
    seq.set_step(4, 0, chord(&[60, 64, 67, 71], 3.0), false).unwrap();
    seq.set_step(4, 8, chord(&[48, 55], 6.0), false).unwrap();
    seq
}

#[test]
fn tick_is_alloc_free() {
    let mut seq = busy_sequencer();
    let mut sink = CountingSink::default();
    seq.start(0.0, &mut sink);

    assert_no_alloc(|| {
        for _ in 0..384 * 50 {
            seq.tick(&mut sink);
        }
        seq.panic(&mut sink);
    });
    assert!(sink.on > 0);
    assert_eq!(sink.on, sink.off);
}

#[test]
fn process_is_alloc_free() {
    let mut seq = busy_sequencer();
    let mut sink = CountingSink::default();
    seq.start(0.0, &mut sink);

    assert_no_alloc(|| {
        // ten seconds of 1 ms blocks
        for _ in 0..10_000 {
            seq.process(0.001, &mut sink);
        }
    });
    assert!(seq.elapsed_ticks() > 1900);
}

#[test]
fn edits_and_recording_are_alloc_free() {
    let mut seq = busy_sequencer();
    seq.set_recording(true);
    let mut sink = CountingSink::default();
    seq.start(0.0, &mut sink);
    let dt = seq.tick_duration();

    assert_no_alloc(|| {
        for i in 0..2000usize {
            let time = i as f64 * dt;
            let edit = match i % 7 {
                0 => Edit::SetStep {
                    track: i % 4,
                    index: i % 16,
                    step: mono(40 + (i % 24) as u8, 0.0, 0.5),
                    preserve_count: i % 2 == 0,
                },
                1 => Edit::SetTrackLength {
                    track: 2,
                    length: 8 + i % 9,
                },
                2 => Edit::NoteOn {
                    channel: 5,
                    pitch: 50 + (i % 10) as u8,
                    velocity: 64,
                    time,
                },
                3 => Edit::NoteOff {
                    channel: 5,
                    pitch: 50 + ((i - 1) % 10) as u8,
                    time,
                },
                4 => Edit::SetLegato {
                    track: 0,
                    legato: i % 2 == 0,
                },
                5 => Edit::SetTrackEnabled {
                    track: 1,
                    enabled: i % 3 != 0,
                },
                _ => Edit::SetBpm(100.0 + (i % 50) as f64),
            };
            // unmatched note-offs are reported, not fatal
            let _ = seq.apply(edit, &mut sink);
            seq.tick(&mut sink);
        }
        seq.panic(&mut sink);
    });
    // held keys swallow some note-offs
    assert!(sink.on >= sink.off);
    assert!(sink.on > 0);
}
