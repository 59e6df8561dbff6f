//! # Musical Tuning Module
//!
//! Maps estimated frequencies onto notes using twelve-tone equal temperament
//! with A = 440 Hz.
//!
//! Octaves are numbered so that octave boundaries fall on C and the reference
//! A sits in octave 5 (`A/5` = 440 Hz, note number 69).

use crate::note::{Accidental, Key, Note};
use once_cell::sync::Lazy;

/// Reference pitch in Hz.
pub const REFERENCE_FREQUENCY: f32 = 440.0;

/// Note number of the reference pitch.
pub const REFERENCE_NUMBER: i32 = 69;

/// The twelve pitch classes from C to B, spelled the way a successor walk
/// from C spells them (`C C# D D# E E# F# G G# A A# B`).
static CHROMATIC: Lazy<Vec<Note>> = Lazy::new(|| {
    std::iter::successors(Some(Note::new(Key::C, Accidental::Natural)), |note| {
        Some(note.successor())
    })
    .take(12)
    .collect()
});

/// Finds the note nearest to `frequency`.
///
/// The frequency must be positive and finite; callers filter out "no pitch"
/// before classifying.
///
/// # Arguments
/// * `frequency` - Frequency in Hz
///
/// # Returns
/// * The nearest note, with its octave
pub fn classify(frequency: f32) -> Note {
    debug_assert!(
        frequency.is_finite() && frequency > 0.0,
        "classify needs a positive finite frequency, got {frequency}"
    );
    let semitones = 12.0 * (frequency / REFERENCE_FREQUENCY).log2();
    let number = (semitones.round() as i32).saturating_add(REFERENCE_NUMBER);

    // Integer division truncates toward zero.
    CHROMATIC[number.rem_euclid(12) as usize].with_octave(number / 12)
}

/// Equal-temperament frequency of a note that has an octave.
pub fn frequency_of(note: &Note) -> Option<f32> {
    note.number().map(|number| {
        REFERENCE_FREQUENCY * 2.0_f32.powf((number as f32 - REFERENCE_NUMBER as f32) / 12.0)
    })
}

/// Calculates the deviation from a target frequency in cents.
///
/// Cents are a logarithmic unit of pitch measurement where:
/// - 100 cents = 1 semitone
/// - 1200 cents = 1 octave
/// - Positive values indicate sharpness, negative values indicate flatness
pub fn cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}
