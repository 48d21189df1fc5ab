use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ps_engine::{EventSink, Sequencer, SequencerConfig};
use ps_ir::{MonoStep, Note, NoteEvent, PolyStep, Step};

struct CountingSink(u64);

impl EventSink for CountingSink {
    fn emit(&mut self, event: NoteEvent) {
        self.0 += u64::from(event.pitch);
    }
}

fn busy_sequencer() -> Sequencer {
    let mut seq = Sequencer::from_config(&SequencerConfig::default()).unwrap();
    for track in 0..4 {
        for index in 0..16 {
            let mut step = MonoStep::with_note(Note::new(48 + index as u8, 100, 0.1, 0.6));
            step.retrigger_rate = if index % 4 == 0 { 0.25 } else { 0.0 };
            step.probability = 0.8;
            seq.set_step(track, index, Step::Mono(step), false).unwrap();
        }
    }
    for index in 0..16 {
        let mut chord = PolyStep::default();
        for (i, pitch) in [60u8, 64, 67, 71].into_iter().enumerate() {
            chord.add_note(Note::new(pitch, 90, -0.2 + 0.1 * i as f32, 1.5));
        }
        seq.set_step(4, index, Step::Poly(chord), false).unwrap();
    }
    seq
}

fn bench_tick(c: &mut Criterion) {
    let mut seq = busy_sequencer();
    let mut sink = CountingSink(0);
    seq.start(0.0, &mut sink);

    c.bench_function("tick_five_tracks", |b| {
        b.iter(|| {
            seq.tick(&mut sink);
            black_box(sink.0)
        })
    });
}

fn bench_process(c: &mut Criterion) {
    let mut seq = busy_sequencer();
    let mut sink = CountingSink(0);
    seq.start(0.0, &mut sink);

    // one 1 ms clock callback
    c.bench_function("process_1ms", |b| {
        b.iter(|| {
            seq.process(black_box(0.001), &mut sink);
        })
    });
}

criterion_group!(benches, bench_tick, bench_process);
criterion_main!(benches);
