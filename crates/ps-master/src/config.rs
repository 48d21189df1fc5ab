//! TOML configuration files.
//!
//! ```toml
//! [sequencer]
//! bpm = 120.0
//! seed = 7
//!
//! [[sequencer.tracks]]
//! kind = "mono"
//! channel = 1
//!
//! [[pattern]]
//! track = 0
//! index = 0
//! pitches = [60]
//! ```

use std::fmt;
use std::path::Path;

use ps_engine::{Sequencer, SequencerConfig, TrackKind};
use ps_ir::{
    EditError, MonoStep, Note, PolyStep, Step, DEFAULT_LENGTH, DEFAULT_VELOCITY, POLYPHONY,
};
use serde::Deserialize;

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Invalid(EditError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "cannot read config: {}", e),
            ConfigError::Parse(e) => write!(f, "cannot parse config: {}", e),
            ConfigError::Invalid(e) => write!(f, "invalid config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Invalid(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl From<EditError> for ConfigError {
    fn from(e: EditError) -> Self {
        ConfigError::Invalid(e)
    }
}

/// A config file: sequencer layout plus an optional starting pattern.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub sequencer: SequencerConfig,
    pub pattern: Vec<PatternStep>,
}

/// One step of a starting pattern.
///
/// Mono tracks use the first pitch; poly tracks take up to four.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PatternStep {
    pub track: usize,
    pub index: usize,
    pub pitches: Vec<u8>,
    pub velocity: u8,
    pub offset: f32,
    pub length: f32,
    pub probability: f32,
    pub alternate: u32,
    pub retrigger: f32,
}

impl Default for PatternStep {
    fn default() -> Self {
        Self {
            track: 0,
            index: 0,
            pitches: Vec::new(),
            velocity: DEFAULT_VELOCITY,
            offset: 0.0,
            length: DEFAULT_LENGTH,
            probability: 1.0,
            alternate: 1,
            retrigger: 0.0,
        }
    }
}

impl PatternStep {
    /// Build the step for a track of the given kind.
    pub fn to_step(&self, kind: TrackKind) -> Result<Step, EditError> {
        let note = |pitch: u8| Note::new(pitch, self.velocity, self.offset, self.length);
        let step = match kind {
            TrackKind::Mono => {
                let &pitch = self.pitches.first().ok_or(EditError::MissingPitch)?;
                Step::Mono(MonoStep {
                    enabled: true,
                    note: note(pitch),
                    retrigger_rate: self.retrigger,
                    probability: self.probability,
                    alternate: self.alternate,
                    count: 0,
                })
            }
            TrackKind::Poly => {
                if self.pitches.len() > POLYPHONY {
                    log::warn!(
                        "pattern step {}:{} has {} pitches, keeping {}",
                        self.track,
                        self.index,
                        self.pitches.len(),
                        POLYPHONY
                    );
                }
                let mut step = PolyStep::default();
                for &pitch in self.pitches.iter().take(POLYPHONY) {
                    step.add_note(note(pitch));
                }
                step.probability = self.probability;
                Step::Poly(step)
            }
        };
        step.validate()?;
        Ok(step)
    }
}

impl ConfigFile {
    /// Build a sequencer with the pattern staged.
    pub fn build(&self) -> Result<Sequencer, ConfigError> {
        let mut sequencer = Sequencer::from_config(&self.sequencer)?;
        for entry in &self.pattern {
            let kind = sequencer
                .track(entry.track)
                .map(|t| t.kind())
                .ok_or(EditError::NoSuchTrack(entry.track))?;
            let step = entry.to_step(kind)?;
            sequencer.set_step(entry.track, entry.index, step, false)?;
        }
        log::debug!("loaded {} pattern steps", self.pattern.len());
        Ok(sequencer)
    }
}

pub fn parse_config(text: &str) -> Result<ConfigFile, ConfigError> {
    let file: ConfigFile = toml::from_str(text)?;
    file.sequencer.validate()?;
    Ok(file)
}

pub fn load_config(path: &Path) -> Result<ConfigFile, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    log::info!("config: {}", path.display());
    parse_config(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"
[sequencer]
bpm = 96.0
seed = 3

[sequencer.record]
armed = true

[[sequencer.tracks]]
kind = "mono"
channel = 2
length = 8
legato = true

[[sequencer.tracks]]
kind = "poly"
channel = 10

[[pattern]]
track = 0
index = 3
pitches = [48]
alternate = 2

[[pattern]]
track = 1
index = 0
pitches = [60, 64, 67]
length = 2.0
"#;

    #[test]
    fn parses_full_file() {
        let file = parse_config(EXAMPLE).unwrap();
        let seq = &file.sequencer;
        assert_eq!(seq.bpm, 96.0);
        assert_eq!(seq.seed, 3);
        assert!(seq.record.armed);
        assert!(!seq.record.quantize);
        assert_eq!(seq.tracks.len(), 2);
        assert_eq!(seq.tracks[0].kind, TrackKind::Mono);
        assert_eq!(seq.tracks[0].length, 8);
        assert!(seq.tracks[0].legato);
        assert_eq!(seq.tracks[1].kind, TrackKind::Poly);
        assert_eq!(seq.tracks[1].length, 16);
        assert_eq!(file.pattern.len(), 2);
        assert_eq!(file.pattern[0].alternate, 2);
        assert_eq!(file.pattern[1].velocity, DEFAULT_VELOCITY);
    }

    #[test]
    fn builds_sequencer_with_pattern() {
        let seq = parse_config(EXAMPLE).unwrap().build().unwrap();
        assert_eq!(seq.tracks().len(), 2);
        let Some(Step::Mono(step)) = seq.track(0).unwrap().pending_step(3) else {
            panic!("expected a staged mono step");
        };
        assert_eq!(step.alternate, 2);
        let Some(Step::Poly(chord)) = seq.track(1).unwrap().pending_step(0) else {
            panic!("expected a staged poly step");
        };
        assert_eq!(chord.voices().count(), 3);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let file = parse_config("").unwrap();
        assert_eq!(file.sequencer, SequencerConfig::default());
        assert!(file.pattern.is_empty());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            parse_config("[sequencer]\nbpm = 0.0\n"),
            Err(ConfigError::Invalid(EditError::InvalidBpm(_)))
        ));
        assert!(matches!(
            parse_config("[sequencer\n"),
            Err(ConfigError::Parse(_))
        ));
        let missing = "[[pattern]]\ntrack = 9\n";
        assert!(matches!(
            parse_config(missing).unwrap().build(),
            Err(ConfigError::Invalid(EditError::NoSuchTrack(9)))
        ));
        let no_pitch = "[[pattern]]\ntrack = 0\n";
        assert!(matches!(
            parse_config(no_pitch).unwrap().build(),
            Err(ConfigError::Invalid(EditError::MissingPitch))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/polystep.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
