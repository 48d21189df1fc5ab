//! polystep CLI: headless playback and offline event dumps.
//!
//! Usage:
//!   ps-cli [--config polystep.toml] [--ticks N]
//!   ps-cli [--config polystep.toml] --play SECONDS
//!
//! With no pattern in the config a short demo pattern is loaded.

use ps_master::{
    load_config, ConfigFile, Controller, MonoStep, Note, NoteEvent, NoteEventKind, Output,
    PolyStep, Step, TrackKind,
};
use std::env;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    let flag = |name: &str| {
        args.iter()
            .position(|a| a == name)
            .and_then(|i| args.get(i + 1))
            .cloned()
    };

    let file = match flag("--config") {
        Some(path) => load_config(Path::new(&path)).unwrap_or_else(|e| {
            eprintln!("{}", e);
            std::process::exit(1);
        }),
        None => ConfigFile::default(),
    };

    let mut ctrl = Controller::from_file(&file).unwrap_or_else(|e| {
        eprintln!("{}", e);
        std::process::exit(1);
    });
    if file.pattern.is_empty() {
        load_demo(&mut ctrl);
    }

    let Some(seq) = ctrl.sequencer() else {
        return;
    };
    println!("Tempo:  {} BPM", seq.bpm());
    for (i, track) in seq.tracks().iter().enumerate() {
        println!(
            "Track {}: {:?} on channel {}, {} steps",
            i,
            track.kind(),
            track.channel(),
            track.length()
        );
    }
    println!();

    match flag("--play") {
        Some(secs) => {
            let secs: f64 = secs.parse().unwrap_or_else(|_| {
                eprintln!("--play takes a number of seconds");
                std::process::exit(1);
            });
            play(&mut ctrl, secs);
        }
        None => {
            let ticks: u64 = flag("--ticks")
                .map(|t| t.parse().unwrap_or(0))
                .unwrap_or(16 * 24 * 2);
            dump(&ctrl, ticks);
        }
    }
}

/// Kick and hats on the first two mono tracks, a chord on the first poly track.
fn load_demo(ctrl: &mut Controller) {
    let Some(seq) = ctrl.sequencer() else {
        return;
    };
    let kinds: Vec<TrackKind> = seq.tracks().iter().map(|t| t.kind()).collect();
    let mono: Vec<usize> = (0..kinds.len())
        .filter(|&i| kinds[i] == TrackKind::Mono)
        .collect();
    let poly = kinds.iter().position(|&k| k == TrackKind::Poly);

    let mut steps = Vec::new();
    if let Some(&kick) = mono.first() {
        for index in [0, 4, 8, 12] {
            let step = MonoStep::with_note(Note::new(36, 110, 0.0, 0.5));
            steps.push((kick, index, Step::Mono(step)));
        }
    }
    if let Some(&hats) = mono.get(1) {
        for index in (2..16).step_by(4) {
            let mut step = MonoStep::with_note(Note::new(42, 80, 0.1, 0.25));
            step.probability = 0.8;
            steps.push((hats, index, Step::Mono(step)));
        }
        let mut roll = MonoStep::with_note(Note::new(42, 70, 0.0, 1.0));
        roll.retrigger_rate = 0.25;
        roll.alternate = 2;
        steps.push((hats, 15, Step::Mono(roll)));
    }
    if let Some(pads) = poly {
        let mut chord = PolyStep::default();
        for (pitch, offset) in [(57, 0.0), (60, 0.1), (64, 0.2)] {
            chord.add_note(Note::new(pitch, 90, offset, 3.5));
        }
        steps.push((pads, 0, Step::Poly(chord)));
    }

    for (track, index, step) in steps {
        if let Err(e) = ctrl.set_step(track, index, step, false) {
            log::warn!("demo step {}:{} skipped: {}", track, index, e);
        }
    }
}

fn describe(event: &NoteEvent) -> String {
    let kind = match event.kind {
        NoteEventKind::NoteOn => "on ",
        NoteEventKind::NoteOff => "off",
    };
    format!(
        "{:>6}  {}  ch {:>2}  note {:>3}  vel {:>3}",
        event.tick, kind, event.channel, event.pitch, event.velocity
    )
}

fn dump(ctrl: &Controller, ticks: u64) {
    let Some(events) = ctrl.render_offline(ticks) else {
        return;
    };
    for event in &events {
        println!("{}", describe(event));
    }
    println!();
    println!("{} events over {} ticks", events.len(), ticks);
}

fn play(ctrl: &mut Controller, secs: f64) {
    ctrl.play();
    println!("Playing...");
    let started = Instant::now();
    let print = |output: Output| match output {
        Output::Note(event) => println!("\r{}", describe(&event)),
        Output::Recorded(step) => println!("\rrecorded track {} step {}", step.track, step.index),
        Output::Rejected(e) => eprintln!("\rrejected: {}", e),
    };

    while started.elapsed().as_secs_f64() < secs {
        ctrl.poll(print);
        let _ = std::io::stdout().flush();
        std::thread::sleep(Duration::from_millis(10));
    }
    ctrl.stop();
    ctrl.poll(print);
    println!("Done.");
}
