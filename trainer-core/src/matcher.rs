//! # Match Engine
//!
//! Turns a stream of noisy per-frame pitch estimates into a single "note
//! found" event.
//!
//! Each usable frame casts one vote (did the sung note match the target?)
//! into a bounded sliding window. A match is confirmed once the number of
//! matching votes in the window passes a threshold, which rejects transient
//! octave errors and attacks while still reacting within about a second of
//! sustained singing.

use crate::note::{Accidental, Key, Note};
use crate::pitch::{self, PitchSettings};
use crate::tuning;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Number of votes kept in the sliding window.
pub const WINDOW_CAPACITY: usize = 51;

/// A match is confirmed once the matching votes exceed this count.
pub const VOTE_THRESHOLD: usize = 40;

/// Settings for the voting window and the usable detection band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchSettings {
    pub window_capacity: usize,
    pub vote_threshold: usize,
    /// Lowest candidate note that may vote.
    pub band_low: Note,
    /// Highest candidate note that may vote.
    pub band_high: Note,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            window_capacity: WINDOW_CAPACITY,
            vote_threshold: VOTE_THRESHOLD,
            band_low: Note::new(Key::G, Accidental::Natural).with_octave(3),
            band_high: Note::new(Key::A, Accidental::Natural).with_octave(5),
        }
    }
}

/// Bounded FIFO of match votes.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    votes: VecDeque<bool>,
    capacity: usize,
}

impl SampleWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            votes: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Appends a vote, dropping the oldest one when the window is full.
    pub fn push(&mut self, vote: bool) {
        self.votes.push_back(vote);
        if self.votes.len() > self.capacity {
            self.votes.pop_front();
        }
    }

    /// Number of matching votes currently held.
    pub fn sum(&self) -> usize {
        self.votes.iter().filter(|&&vote| vote).count()
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    pub fn clear(&mut self) {
        self.votes.clear();
    }
}

/// Where a listening session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchState {
    /// No session has been started.
    Idle,
    /// A session is active and collecting votes.
    Listening,
    /// The session confirmed the target, carried here as it was requested.
    Matched(Note),
}

/// Receives engine events.
pub trait MatchListener {
    /// Called for every frame processed while listening, with the raw
    /// estimate (`None` when no pitch was found).
    fn on_pitch_estimated(&mut self, _frequency: Option<f32>) {}

    /// Called once per session when the target is confirmed.
    fn on_matched(&mut self, _note: &Note) {}
}

/// A listener that ignores every event.
impl MatchListener for () {}

/// Sliding-window match confirmation for one target note at a time.
#[derive(Debug, Clone)]
pub struct MatchEngine {
    settings: MatchSettings,
    pitch: PitchSettings,
    window: SampleWindow,
    target: Option<Note>,
    state: MatchState,
}

impl Default for MatchEngine {
    fn default() -> Self {
        MatchEngine::new(MatchSettings::default(), PitchSettings::default())
    }
}

impl MatchEngine {
    pub fn new(settings: MatchSettings, pitch: PitchSettings) -> Self {
        Self {
            window: SampleWindow::new(settings.window_capacity),
            settings,
            pitch,
            target: None,
            state: MatchState::Idle,
        }
    }

    pub fn state(&self) -> MatchState {
        self.state
    }

    pub fn target(&self) -> Option<Note> {
        self.target
    }

    pub fn window(&self) -> &SampleWindow {
        &self.window
    }

    /// Begins a new session for `target`, discarding any earlier votes.
    pub fn start(&mut self, target: Note) {
        debug!(note = %target, "listening session started");
        self.window.clear();
        self.target = Some(target);
        self.state = MatchState::Listening;
    }

    /// Processes one audio frame without reporting events.
    pub fn on_frame(&mut self, samples: &[f32], sample_rate: u32) -> MatchState {
        self.on_frame_with(samples, sample_rate, &mut ())
    }

    /// Processes one audio frame.
    ///
    /// Frames without a pitch, or whose pitch falls outside the detection
    /// band, do not vote. Outside a listening session this does nothing.
    ///
    /// # Arguments
    /// * `samples` - One frame of audio in [-1, 1]
    /// * `sample_rate` - Sample rate in Hz
    /// * `listener` - Receives the pitch estimate and the match event
    ///
    /// # Returns
    /// * `MatchState::Listening` - More frames are needed
    /// * `MatchState::Matched(note)` - The target was confirmed by this frame
    pub fn on_frame_with<L: MatchListener + ?Sized>(
        &mut self,
        samples: &[f32],
        sample_rate: u32,
        listener: &mut L,
    ) -> MatchState {
        if self.state != MatchState::Listening {
            return self.state;
        }

        let frequency = pitch::detect_pitch_autocorrelation(samples, sample_rate, &self.pitch);
        listener.on_pitch_estimated(frequency);

        match frequency {
            Some(frequency) => self.on_candidate_with(tuning::classify(frequency), listener),
            None => self.state,
        }
    }

    /// Casts a vote for an already classified note.
    pub fn on_candidate(&mut self, candidate: Note) -> MatchState {
        self.on_candidate_with(candidate, &mut ())
    }

    /// Casts a vote for an already classified note, reporting a match to
    /// `listener`.
    pub fn on_candidate_with<L: MatchListener + ?Sized>(
        &mut self,
        candidate: Note,
        listener: &mut L,
    ) -> MatchState {
        let Some(target) = self.target.filter(|_| self.state == MatchState::Listening) else {
            return self.state;
        };

        if !candidate.is_between(&self.settings.band_low, &self.settings.band_high) {
            trace!(candidate = %candidate, "candidate outside detection band");
            return self.state;
        }

        // Pitch classes only: the octave of the voice does not have to match.
        let vote = candidate.pitch_class().equals(&target);
        self.window.push(vote);

        let votes = self.window.sum();
        trace!(candidate = %candidate, vote, votes, "vote recorded");

        if votes > self.settings.vote_threshold {
            self.window.clear();
            self.state = MatchState::Matched(target);
            debug!(note = %target, votes, "target note matched");
            listener.on_matched(&target);
        }

        self.state
    }

    /// Runs a whole session: starts listening for `target` and feeds frames
    /// until the target is matched or the frames run out.
    ///
    /// # Returns
    /// * `Some(note)` - The confirmed target
    /// * `None` - The frame source ended first
    pub fn listen_till_match<I, L>(
        &mut self,
        target: Note,
        frames: I,
        sample_rate: u32,
        listener: &mut L,
    ) -> Option<Note>
    where
        I: IntoIterator,
        I::Item: AsRef<[f32]>,
        L: MatchListener + ?Sized,
    {
        self.start(target);

        for frame in frames {
            if let MatchState::Matched(note) = self.on_frame_with(frame.as_ref(), sample_rate, listener) {
                return Some(note);
            }
        }

        debug!(note = %target, "frame source ended before a match");
        None
    }
}
