// trainer-core/src/lib.rs

//! The core logic for the ear trainer.
//! This crate is responsible for pitch estimation, the note model,
//! note classification and match confirmation, plus the microphone
//! capture that feeds them. It is completely headless and renders nothing.
//!
//! A session feeds audio frames into a [`MatchEngine`] until the sung or
//! played note has matched the target for long enough:
//!
//! ```no_run
//! use trainer_core::{MatchEngine, MatchState, Note};
//!
//! let mut engine = MatchEngine::default();
//! engine.start(Note::parse("Ab/4").unwrap());
//!
//! let frame = vec![0.0f32; trainer_core::audio::BUFFER_SIZE];
//! if let MatchState::Matched(note) = engine.on_frame(&frame, 44_100) {
//!     println!("found {note}");
//! }
//! ```

pub mod audio;
pub mod config;
pub mod matcher;
pub mod note;
pub mod pitch;
pub mod tuning;

pub use config::TrainerConfig;
pub use matcher::{MatchEngine, MatchListener, MatchSettings, MatchState, SampleWindow};
pub use note::{Accidental, Key, Note, NoteError};
pub use pitch::PitchSettings;
