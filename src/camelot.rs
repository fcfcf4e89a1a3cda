//! Camelot wheel key model and harmonic compatibility.
//!
//! Grounded on `mesh-core::music::MusicalKey` (root/mode representation,
//! `camelot()` projection, relative-key logic) and on
//! `examples/original_source/many_transitions.py`'s `_CAMELOT` table and
//! `keys_compatible` — the enharmonic-flat normalization and the three
//! compatibility rules are taken verbatim from the original.

use crate::error::MixError;

/// Ring letter: `B` = major, `A` = minor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ring {
    Major,
    Minor,
}

impl Ring {
    fn letter(self) -> char {
        match self {
            Ring::Major => 'B',
            Ring::Minor => 'A',
        }
    }
}

/// A position on the Camelot wheel: spoke `1..=12` and ring `A`/`B`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Camelot {
    pub number: u8,
    pub ring: Ring,
}

impl Camelot {
    pub fn new(number: u8, ring: Ring) -> Self {
        debug_assert!((1..=12).contains(&number));
        Self { number, ring }
    }

    pub fn letter(&self) -> char {
        self.ring.letter()
    }

    /// Parse a raw `(pitch_class, mode)` pair as produced by a key estimator
    /// — e.g. `("Db", "major")` — into a Camelot position. Normalizes
    /// enharmonic flats to sharps first, matching the original's
    /// `_ENHARMONICS` table.
    pub fn parse_key_name(pitch: &str, mode: &str) -> Result<Self, MixError> {
        let pitch = normalize_enharmonic(pitch);
        let mode = mode.to_ascii_lowercase();

        let major_table: [&str; 12] = [
            "B", "F#", "C#", "G#", "D#", "A#", "F", "C", "G", "D", "A", "E",
        ];
        let minor_table: [&str; 12] = [
            "G#", "D#", "A#", "F", "C", "G", "D", "A", "E", "B", "F#", "C#",
        ];

        let table: &[&str; 12] = match mode.as_str() {
            "major" => &major_table,
            "minor" => &minor_table,
            _ => {
                return Err(MixError::UnknownKey {
                    pitch: pitch.to_string(),
                    mode,
                })
            }
        };

        let ring = if mode == "major" { Ring::Major } else { Ring::Minor };

        table
            .iter()
            .position(|&k| k == pitch)
            .map(|idx| Camelot::new((idx + 1) as u8, ring))
            .ok_or(MixError::UnknownKey {
                pitch: pitch.to_string(),
                mode,
            })
    }
}

fn normalize_enharmonic(pitch: &str) -> &str {
    match pitch {
        "Db" => "C#",
        "Eb" => "D#",
        "Gb" => "F#",
        "Ab" => "G#",
        "Bb" => "A#",
        "Fb" => "E",
        "Cb" => "B",
        other => other,
    }
}

/// Any one of three rules makes two Camelot positions harmonically compatible
/// (spec.md §4.1):
///   (a) identical `(n, l)`
///   (b) same `l`, `|n1-n2| ∈ {1, 11}` (adjacent on the ring, 12↔1 wraps)
///   (c) same `n`, different `l` (relative major/minor)
pub fn compatible(a: Camelot, b: Camelot) -> bool {
    if a.number == b.number && a.letter() == b.letter() {
        return true;
    }
    if a.letter() == b.letter() {
        let diff = (a.number as i16 - b.number as i16).unsigned_abs();
        if diff == 1 || diff == 11 {
            return true;
        }
    }
    if a.number == b.number && a.letter() != b.letter() {
        return true;
    }
    false
}
