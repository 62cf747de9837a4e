//! Key representation and harmonic compatibility

use serde::{Deserialize, Serialize};

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// A musical key: root pitch class plus major/minor mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MusicalKey {
    /// Semitones above C (0..12)
    pub root: u8,
    pub minor: bool,
}

impl MusicalKey {
    pub const fn new(root: u8, minor: bool) -> Self {
        Self {
            root: root % 12,
            minor,
        }
    }

    /// Parse notation like "Am", "F#", "Bbm"
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let mut chars = s.chars();
        let base = match chars.next()?.to_ascii_uppercase() {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return None,
        };
        let rest: String = chars.collect();
        let (root, rest) = match rest.chars().next() {
            Some('#') => ((base + 1) % 12, &rest[1..]),
            Some('b') => ((base + 11) % 12, &rest[1..]),
            _ => (base, rest.as_str()),
        };
        let minor = rest.eq_ignore_ascii_case("m") || rest.to_lowercase().starts_with("min");
        if !(rest.is_empty() || minor) {
            return None;
        }
        Some(Self { root, minor })
    }

    /// The relative major of a minor key, or relative minor of a major key
    pub fn relative(&self) -> Self {
        let shift = if self.minor { 3 } else { 9 };
        Self {
            root: (self.root + shift) % 12,
            minor: !self.minor,
        }
    }

    /// Keys that share their pitch material mix without transposition
    pub fn is_compatible_with(&self, other: &MusicalKey) -> bool {
        self == other || self.relative() == *other
    }
}

impl std::fmt::Display for MusicalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let suffix = if self.minor { "m" } else { "" };
        write!(f, "{}{}", NOTE_NAMES[self.root as usize % 12], suffix)
    }
}
