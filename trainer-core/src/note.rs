//! # Note Model
//!
//! This module provides the note data model used by the trainer: a letter name,
//! an accidental and an optional octave, together with the 12-tone enharmonic
//! graph that connects different spellings of the same pitch.
//!
//! ## Features
//! - Compact text notation (`"Ab/1"`, `"C#"`, `"B"`) with parsing and formatting
//! - Semitone successor with natural-preferring spelling
//! - Enharmonic siblings (`A#` / `Bb`, `B#` / `C`, ...)
//! - Enharmonic equality, range membership and range enumeration
//! - Random note selection over a range

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Maximum number of successor steps taken by [`range`] before giving up.
pub const RANGE_STEP_LIMIT: usize = 100;

/// Errors produced by the note model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NoteError {
    /// The text is not of the form `<Letter>[b|#][/<octave>]`.
    #[error("invalid note format `{0}`")]
    InvalidFormat(String),

    /// A range walk hit [`RANGE_STEP_LIMIT`] without reaching its upper note.
    #[error("range did not reach `{max}` within {limit} steps")]
    RangeExhausted {
        /// The note the walk was looking for.
        max: Note,
        /// The step limit that was hit.
        limit: usize,
        /// The notes visited before giving up.
        partial: Vec<Note>,
    },
}

/// One of the seven letter names, cyclically ordered A to G.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
}

impl Key {
    /// All letter names in cyclic order.
    pub const ALL: [Key; 7] = [Key::A, Key::B, Key::C, Key::D, Key::E, Key::F, Key::G];

    /// The next letter name, wrapping from G to A.
    pub fn next(self) -> Key {
        match self {
            Key::A => Key::B,
            Key::B => Key::C,
            Key::C => Key::D,
            Key::D => Key::E,
            Key::E => Key::F,
            Key::F => Key::G,
            Key::G => Key::A,
        }
    }

    /// The previous letter name, wrapping from A to G.
    pub fn prev(self) -> Key {
        match self {
            Key::A => Key::G,
            Key::B => Key::A,
            Key::C => Key::B,
            Key::D => Key::C,
            Key::E => Key::D,
            Key::F => Key::E,
            Key::G => Key::F,
        }
    }

    /// Position of the letter inside an octave. Octaves start at C.
    pub fn position(self) -> u8 {
        match self {
            Key::C => 0,
            Key::D => 1,
            Key::E => 2,
            Key::F => 3,
            Key::G => 4,
            Key::A => 5,
            Key::B => 6,
        }
    }

    /// Semitones above C of the natural note with this letter.
    pub fn semitone(self) -> i32 {
        match self {
            Key::C => 0,
            Key::D => 2,
            Key::E => 4,
            Key::F => 5,
            Key::G => 7,
            Key::A => 9,
            Key::B => 11,
        }
    }

    fn letter(self) -> char {
        match self {
            Key::A => 'A',
            Key::B => 'B',
            Key::C => 'C',
            Key::D => 'D',
            Key::E => 'E',
            Key::F => 'F',
            Key::G => 'G',
        }
    }

    fn from_letter(letter: char) -> Option<Key> {
        match letter {
            'A' => Some(Key::A),
            'B' => Some(Key::B),
            'C' => Some(Key::C),
            'D' => Some(Key::D),
            'E' => Some(Key::E),
            'F' => Some(Key::F),
            'G' => Some(Key::G),
            _ => None,
        }
    }
}

/// Accidental applied to a letter name. Ordered flat < natural < sharp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Accidental {
    Flat,
    Natural,
    Sharp,
}

impl Accidental {
    /// Semitone offset relative to the natural note.
    pub fn offset(self) -> i32 {
        match self {
            Accidental::Flat => -1,
            Accidental::Natural => 0,
            Accidental::Sharp => 1,
        }
    }

    fn marker(self) -> &'static str {
        match self {
            Accidental::Flat => "b",
            Accidental::Natural => "",
            Accidental::Sharp => "#",
        }
    }
}

/// A spelled note, optionally pinned to an octave.
///
/// Two notes may sound the same while being spelled differently (`A#` and
/// `Bb`). `==` compares spelling; use [`Note::equals`] for enharmonic
/// equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Note {
    pub key: Key,
    pub accidental: Accidental,
    /// `None` means the note stands for its pitch class in any octave.
    pub octave: Option<i32>,
}

impl Note {
    /// Creates an octave-agnostic note.
    pub const fn new(key: Key, accidental: Accidental) -> Self {
        Note {
            key,
            accidental,
            octave: None,
        }
    }

    /// Returns the same spelling pinned to `octave`.
    pub const fn with_octave(self, octave: i32) -> Self {
        Note {
            octave: Some(octave),
            ..self
        }
    }

    /// The same spelling with the octave dropped.
    pub const fn pitch_class(self) -> Self {
        Note {
            octave: None,
            ..self
        }
    }

    /// Parses the compact notation `<Letter>[b|#][/<octave>]`.
    ///
    /// # Arguments
    /// * `text` - Note text (e.g., "Ab/1", "C#", "B")
    ///
    /// # Returns
    /// * `Ok(note)` - The parsed note
    /// * `Err(NoteError::InvalidFormat)` - The text does not have that shape
    pub fn parse(text: &str) -> Result<Note, NoteError> {
        let invalid = || NoteError::InvalidFormat(text.to_string());

        let mut chars = text.chars();
        let key = chars.next().and_then(Key::from_letter).ok_or_else(invalid)?;
        let rest = chars.as_str();

        let (accidental, rest) = if let Some(rest) = rest.strip_prefix('b') {
            (Accidental::Flat, rest)
        } else if let Some(rest) = rest.strip_prefix('#') {
            (Accidental::Sharp, rest)
        } else {
            (Accidental::Natural, rest)
        };

        let octave = if rest.is_empty() {
            None
        } else {
            let digits = rest.strip_prefix('/').ok_or_else(invalid)?;
            let unsigned = digits.strip_prefix('-').unwrap_or(digits);
            if unsigned.is_empty() || !unsigned.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            Some(digits.parse::<i32>().map_err(|_| invalid())?)
        };

        Ok(Note {
            key,
            accidental,
            octave,
        })
    }

    /// The next note one semitone up, spelled to prefer naturals.
    ///
    /// The octave increases only on the B sharp to C sharp step, saturating at
    /// the largest representable octave.
    pub fn successor(&self) -> Note {
        use Accidental::*;
        use Key::*;

        match (self.key, self.accidental) {
            (_, Flat) => Note {
                accidental: Natural,
                ..*self
            },
            (_, Natural) => Note {
                accidental: Sharp,
                ..*self
            },
            (A | C | D | F | G, Sharp) => Note {
                key: self.key.next(),
                accidental: Natural,
                ..*self
            },
            (E, Sharp) => Note {
                key: F,
                accidental: Sharp,
                ..*self
            },
            (B, Sharp) => Note {
                key: C,
                accidental: Sharp,
                octave: self.octave.map(|o| o.saturating_add(1)),
            },
        }
    }

    /// The other common spelling of the same pitch.
    ///
    /// Returns `None` for A, D and G naturals. Spellings that cross the B/C
    /// seam move the octave along with the letter.
    pub fn sibling(&self) -> Option<Note> {
        use Accidental::*;
        use Key::*;

        let up = self.octave.map(|o| o.saturating_add(1));
        let down = self.octave.map(|o| o.saturating_sub(1));

        let sibling = match (self.key, self.accidental) {
            (A | B | D | E | G, Flat) => Note {
                key: self.key.prev(),
                accidental: Sharp,
                ..*self
            },
            (C, Flat) => Note {
                key: B,
                accidental: Natural,
                octave: down,
            },
            (F, Flat) => Note {
                key: E,
                accidental: Natural,
                ..*self
            },

            (A | D | G, Natural) => return None,
            (B, Natural) => Note {
                key: C,
                accidental: Flat,
                octave: up,
            },
            (C, Natural) => Note {
                key: B,
                accidental: Sharp,
                octave: down,
            },
            (E, Natural) => Note {
                key: F,
                accidental: Flat,
                ..*self
            },
            (F, Natural) => Note {
                key: E,
                accidental: Sharp,
                ..*self
            },

            (A | C | D | F | G, Sharp) => Note {
                key: self.key.next(),
                accidental: Flat,
                ..*self
            },
            (B, Sharp) => Note {
                key: C,
                accidental: Natural,
                octave: up,
            },
            (E, Sharp) => Note {
                key: F,
                accidental: Natural,
                ..*self
            },
        };

        Some(sibling)
    }

    /// Enharmonic equality.
    ///
    /// True when the two notes are spelled the same or either one matches
    /// through its sibling. Octaves only count when both notes carry one.
    pub fn equals(&self, other: &Note) -> bool {
        let same = |a: Option<Note>, b: Option<Note>| match (a, b) {
            (Some(a), Some(b)) => a.same_spelling(&b),
            _ => false,
        };

        let a = Some(*self);
        let b = Some(*other);
        let sibling_a = self.sibling();
        let sibling_b = other.sibling();

        same(a, b) || same(sibling_a, b) || same(a, sibling_b) || same(sibling_a, sibling_b)
    }

    fn same_spelling(&self, other: &Note) -> bool {
        let octave_matches = match (self.octave, other.octave) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        };
        self.key == other.key && self.accidental == other.accidental && octave_matches
    }

    /// Orders two notes by octave (when both have one), then by letter
    /// position inside the octave, then by accidental.
    ///
    /// `Ordering::Less` means `other` is the higher note. This is meant for
    /// range membership, not for sorting arbitrary collections: enharmonic
    /// spellings such as `B#/3` and `C/4` do not compare equal.
    pub fn compare(&self, other: &Note) -> Ordering {
        if let (Some(a), Some(b)) = (self.octave, other.octave) {
            if a != b {
                return a.cmp(&b);
            }
        }

        self.key
            .position()
            .cmp(&other.key.position())
            .then(self.accidental.cmp(&other.accidental))
    }

    /// True when `low <= self <= high` according to [`Note::compare`].
    pub fn is_between(&self, low: &Note, high: &Note) -> bool {
        low.compare(self) != Ordering::Greater && self.compare(high) != Ordering::Greater
    }

    /// MIDI-style note number (`C/0` = 0, `A/5` = 69), if the note has an
    /// octave and the number fits in an `i32`.
    pub fn number(&self) -> Option<i32> {
        self.octave?
            .checked_mul(12)?
            .checked_add(self.key.semitone() + self.accidental.offset())
    }

    /// Walks successors from `self` until a note enharmonically equal to `max`.
    ///
    /// Both ends are included. Stops with [`NoteError::RangeExhausted`] after
    /// [`RANGE_STEP_LIMIT`] steps.
    pub fn range_to(self, max: Note) -> Result<Vec<Note>, NoteError> {
        let mut notes = Vec::new();
        let mut current = self;

        for _ in 0..RANGE_STEP_LIMIT {
            notes.push(current);
            if current.equals(&max) {
                return Ok(notes);
            }
            current = current.successor();
        }

        Err(NoteError::RangeExhausted {
            max,
            limit: RANGE_STEP_LIMIT,
            partial: notes,
        })
    }

    /// Picks a note uniformly from `self..=max`, then swaps it for its
    /// sibling half of the time.
    pub fn random_to<R: Rng + ?Sized>(self, max: Note, rng: &mut R) -> Result<Note, NoteError> {
        let notes = self.range_to(max)?;
        let note = notes[rng.gen_range(0..notes.len())];

        Ok(match note.sibling() {
            Some(sibling) if rng.gen_bool(0.5) => sibling,
            _ => note,
        })
    }
}

/// Enumerates the notes from `min` to `max` (both inclusive) in semitone steps.
///
/// # Arguments
/// * `min` - Lowest note, in note text
/// * `max` - Highest note, in note text
///
/// # Returns
/// * `Ok(notes)` - Every step of the walk, `min` first and a spelling of `max` last
/// * `Err(NoteError)` - Malformed text, or the walk never reached `max`
pub fn range(min: &str, max: &str) -> Result<Vec<Note>, NoteError> {
    Note::parse(min)?.range_to(Note::parse(max)?)
}

/// Picks a random note from [`range`]`(min, max)`, presenting enharmonic
/// spellings with equal probability.
pub fn random_in_range<R: Rng + ?Sized>(min: &str, max: &str, rng: &mut R) -> Result<Note, NoteError> {
    Note::parse(min)?.random_to(Note::parse(max)?, rng)
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.key.letter(), self.accidental.marker())?;
        if let Some(octave) = self.octave {
            write!(f, "/{octave}")?;
        }
        Ok(())
    }
}

impl FromStr for Note {
    type Err = NoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Note::parse(s)
    }
}

impl TryFrom<String> for Note {
    type Error = NoteError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Note::parse(&value)
    }
}

impl From<Note> for String {
    fn from(note: Note) -> Self {
        note.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn n(text: &str) -> Note {
        Note::parse(text).unwrap()
    }

    fn formatted(notes: &[Note]) -> Vec<String> {
        notes.iter().map(Note::to_string).collect()
    }

    /// Every spelling the model knows, each pinned to octave 2.
    fn all_spellings() -> Vec<Note> {
        let accidentals = [Accidental::Flat, Accidental::Natural, Accidental::Sharp];
        Key::ALL
            .iter()
            .flat_map(|&key| accidentals.iter().map(move |&acc| Note::new(key, acc).with_octave(2)))
            .collect()
    }

    #[test]
    fn parses_flat_with_octave() {
        let note = n("Ab/1");
        assert_eq!(note.key, Key::A);
        assert_eq!(note.accidental, Accidental::Flat);
        assert_eq!(note.octave, Some(1));
    }

    #[test]
    fn parses_natural_with_octave() {
        let note = n("A/2");
        assert_eq!(note.key, Key::A);
        assert_eq!(note.accidental, Accidental::Natural);
        assert_eq!(note.octave, Some(2));
    }

    #[test]
    fn parses_sharp_without_octave() {
        let note = n("A#");
        assert_eq!(note.key, Key::A);
        assert_eq!(note.accidental, Accidental::Sharp);
        assert_eq!(note.octave, None);
    }

    #[test]
    fn rejects_malformed_text() {
        for text in ["", "H", "a", "Ab/", "A/x", "A//2", "A##", "Ab/1 ", "A/+2", "xA", "A/-"] {
            assert_eq!(
                Note::parse(text),
                Err(NoteError::InvalidFormat(text.to_string())),
                "{text:?} should be rejected"
            );
        }
    }

    #[test]
    fn format_round_trips() {
        for note in all_spellings() {
            assert_eq!(n(&note.to_string()), note);
        }
        for text in ["Ab/1", "C#", "B", "E/0", "B#/-1"] {
            assert_eq!(n(text).to_string(), text);
        }
    }

    #[test]
    fn successor_table() {
        let cases = [
            ("A/2", "A#/2"),
            ("A#/2", "B/2"),
            ("Bb/2", "B/2"),
            ("B/2", "B#/2"),
            ("B#/2", "C#/3"),
            ("Cb/2", "C/2"),
            ("C/2", "C#/2"),
            ("C#/2", "D/2"),
            ("Db/2", "D/2"),
            ("D/2", "D#/2"),
            ("D#/2", "E/2"),
            ("Eb/2", "E/2"),
            ("E/2", "E#/2"),
            ("E#/2", "F#/2"),
            ("Fb/2", "F/2"),
            ("F/2", "F#/2"),
            ("F#/2", "G/2"),
            ("Gb/2", "G/2"),
            ("G/2", "G#/2"),
            ("G#/2", "A/2"),
            ("Ab/2", "A/2"),
        ];

        for (note, expected) in cases {
            assert_eq!(n(note).successor().to_string(), expected, "successor of {note}");
        }
    }

    #[test]
    fn extreme_octaves_do_not_overflow() {
        let top = n("B#/2147483647");
        assert_eq!(top.successor(), n("C#/2147483647"));
        assert_eq!(top.sibling(), Some(n("C/2147483647")));
        assert_eq!(n("C/-2147483648").sibling(), Some(n("B#/-2147483648")));
        assert_eq!(top.number(), None);
        assert_eq!(n("Cb/-2147483648").number(), None);

        assert!(matches!(
            range("B#/2147483647", "D"),
            Ok(notes) if notes.last() == Some(&n("D/2147483647"))
        ));
        assert!(matches!(
            range("C/2147483647", "C/-2147483648"),
            Err(NoteError::RangeExhausted { .. })
        ));
    }

    #[test]
    fn successor_keeps_missing_octave() {
        assert_eq!(n("B#").successor(), n("C#"));
    }

    #[test]
    fn twelve_successors_reach_the_next_octave() {
        for start in all_spellings() {
            let end = (0..12).fold(start, |note, _| note.successor());
            let octave_up = Note {
                octave: start.octave.map(|o| o + 1),
                ..start
            };
            assert!(end.equals(&octave_up), "{start} walked to {end}");
            assert_eq!(end.number(), octave_up.number());
        }
    }

    #[test]
    fn sibling_table() {
        let cases = [
            ("A/2", None),
            ("A#/2", Some("Bb/2")),
            ("Bb/2", Some("A#/2")),
            ("B/2", Some("Cb/3")),
            ("B#/2", Some("C/3")),
            ("Cb/2", Some("B/1")),
            ("C/2", Some("B#/1")),
            ("C#/2", Some("Db/2")),
            ("Db/2", Some("C#/2")),
            ("D/2", None),
            ("D#/2", Some("Eb/2")),
            ("Eb/2", Some("D#/2")),
            ("E/2", Some("Fb/2")),
            ("E#/2", Some("F/2")),
            ("Fb/2", Some("E/2")),
            ("F/2", Some("E#/2")),
            ("F#/2", Some("Gb/2")),
            ("Gb/2", Some("F#/2")),
            ("G/2", None),
            ("G#/2", Some("Ab/2")),
            ("Ab/2", Some("G#/2")),
        ];

        for (note, expected) in cases {
            let sibling = n(note).sibling().map(|s| s.to_string());
            assert_eq!(sibling.as_deref(), expected, "sibling of {note}");
        }
    }

    #[test]
    fn siblings_are_equal_and_reversible() {
        for note in all_spellings() {
            let Some(sibling) = note.sibling() else {
                continue;
            };
            assert!(note.equals(&sibling), "{note} vs {sibling}");
            assert!(sibling.equals(&note), "{sibling} vs {note}");
            assert_eq!(note.number(), sibling.number());
            if let Some(back) = sibling.sibling() {
                assert_eq!(back, note);
            }
        }
    }

    #[test]
    fn equality_ignores_missing_octaves() {
        assert!(n("C#").equals(&n("Db/4")));
        assert!(n("C/4").equals(&n("B#")));
        assert!(!n("C/4").equals(&n("C/5")));
        assert!(!n("C#").equals(&n("D")));
        assert!(n("E#/3").equals(&n("F/3")));
    }

    #[test]
    fn pitch_class_drops_the_octave() {
        assert_eq!(n("Ab/1").pitch_class(), n("Ab"));
        assert!(n("B#/2").pitch_class().equals(&n("C/5")));
    }

    #[test]
    fn compare_orders_by_octave_then_letter_then_accidental() {
        assert_eq!(n("A/3").compare(&n("C/4")), Ordering::Less);
        assert_eq!(n("C/4").compare(&n("B/3")), Ordering::Greater);
        assert_eq!(n("C/4").compare(&n("B/4")), Ordering::Less);
        assert_eq!(n("G/4").compare(&n("Gb/4")), Ordering::Greater);
        assert_eq!(n("F#").compare(&n("F#/2")), Ordering::Equal);
    }

    #[test]
    fn between_is_inclusive() {
        let low = n("G/3");
        let high = n("A/5");
        for inside in ["G/3", "G#/3", "B/3", "C/4", "E#/4", "G/5", "A/5"] {
            assert!(n(inside).is_between(&low, &high), "{inside} should be inside");
        }
        for outside in ["F#/3", "C/3", "A#/5", "C/6"] {
            assert!(!n(outside).is_between(&low, &high), "{outside} should be outside");
        }
    }

    #[test]
    fn range_of_one_octave() {
        let notes = range("C", "B").unwrap();
        assert_eq!(
            formatted(&notes),
            ["C", "C#", "D", "D#", "E", "E#", "F#", "G", "G#", "A", "A#", "B"]
        );
    }

    #[test]
    fn range_with_octaves() {
        let notes = range("C/2", "E/2").unwrap();
        assert_eq!(formatted(&notes), ["C/2", "C#/2", "D/2", "D#/2", "E/2"]);
    }

    #[test]
    fn range_crosses_octaves() {
        let notes = range("G/3", "A/5").unwrap();
        assert_eq!(notes.len(), 27);
        assert_eq!(notes.first(), Some(&n("G/3")));
        assert_eq!(notes.last(), Some(&n("A/5")));
    }

    #[test]
    fn range_of_a_single_note() {
        assert_eq!(range("Db/3", "C#/3").unwrap(), vec![n("Db/3")]);
    }

    #[test]
    fn range_that_never_converges_is_reported() {
        match range("C/4", "C/2") {
            Err(NoteError::RangeExhausted { max, limit, partial }) => {
                assert_eq!(max, n("C/2"));
                assert_eq!(limit, RANGE_STEP_LIMIT);
                assert_eq!(partial.len(), RANGE_STEP_LIMIT);
                assert_eq!(partial[0], n("C/4"));
            }
            other => panic!("expected RangeExhausted, got {other:?}"),
        }
    }

    #[test]
    fn range_rejects_bad_text() {
        assert!(matches!(range("C", "X"), Err(NoteError::InvalidFormat(_))));
    }

    #[test]
    fn random_note_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let notes = range("G/3", "A/5").unwrap();
        let mut saw_sibling = false;

        for _ in 0..500 {
            let picked = random_in_range("G/3", "A/5", &mut rng).unwrap();
            assert!(notes.iter().any(|candidate| candidate.equals(&picked)), "{picked}");
            saw_sibling |= !notes.contains(&picked);
        }
        assert!(saw_sibling);
    }

    #[test]
    fn random_note_can_pick_both_ends() {
        let mut rng = StdRng::seed_from_u64(11);
        let picks: Vec<Note> = (0..200)
            .map(|_| random_in_range("A", "A#", &mut rng).unwrap())
            .collect();
        assert!(picks.contains(&n("A")));
        assert!(picks.iter().any(|p| p.equals(&n("A#"))));
    }

    #[test]
    fn serializes_as_text() {
        let json = serde_json::to_string(&n("Ab/1")).unwrap();
        assert_eq!(json, "\"Ab/1\"");
        let back: Note = serde_json::from_str(&json).unwrap();
        assert_eq!(back, n("Ab/1"));
        assert!(serde_json::from_str::<Note>("\"Q/1\"").is_err());
    }
}
