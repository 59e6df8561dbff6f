//! # Trainer Configuration
//!
//! Settings for a training run, stored as pretty-printed JSON. Every field has
//! a default, so a configuration file only needs to list what it changes.

use crate::audio::DEFAULT_SAMPLE_RATE;
use crate::matcher::{MatchEngine, MatchSettings};
use crate::note::{Accidental, Key, Note};
use crate::pitch::PitchSettings;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Complete configuration for a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Lowest note that may be picked as a target.
    pub min_note: Note,
    /// Highest note that may be picked as a target.
    pub max_note: Note,
    /// Sample rate requested from the input device, in Hz.
    pub sample_rate: u32,
    pub pitch: PitchSettings,
    pub matching: MatchSettings,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            min_note: Note::new(Key::G, Accidental::Natural).with_octave(3),
            max_note: Note::new(Key::A, Accidental::Natural).with_octave(5),
            sample_rate: DEFAULT_SAMPLE_RATE,
            pitch: PitchSettings::default(),
            matching: MatchSettings::default(),
        }
    }
}

impl TrainerConfig {
    /// Checks that the settings can produce targets and confirm matches.
    pub fn validate(&self) -> Result<()> {
        if self.matching.window_capacity == 0 {
            bail!("window_capacity must be at least 1");
        }
        if self.matching.vote_threshold >= self.matching.window_capacity {
            bail!(
                "vote_threshold ({}) must be below window_capacity ({}) or no match can ever be confirmed",
                self.matching.vote_threshold,
                self.matching.window_capacity
            );
        }
        if self.sample_rate == 0 {
            bail!("sample_rate must be positive");
        }
        self.min_note
            .range_to(self.max_note)
            .with_context(|| format!("invalid practice range {}..{}", self.min_note, self.max_note))?;
        Ok(())
    }

    /// Builds a match engine from these settings.
    pub fn engine(&self) -> MatchEngine {
        MatchEngine::new(self.matching, self.pitch)
    }

    /// Loads a configuration from a JSON file and validates it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: TrainerConfig = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Saves the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json_string = serde_json::to_string_pretty(self)?;
        fs::write(path, json_string)
            .with_context(|| format!("failed to write config {}", path.display()))?;
        Ok(())
    }
}
