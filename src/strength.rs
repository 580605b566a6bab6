//! Secret value generation and strength scoring.
//!
//! `check_strength` awards one point per passing check (eight in total)
//! and maps the score onto a `Strength` band:
//!
//! | score | strength      |
//! |-------|---------------|
//! | 0-3   | `weak`        |
//! | 4-5   | `medium`      |
//! | 6-7   | `strong`      |
//! | 8     | `very-strong` |

use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::errors::{Result, TierVaultError};

pub const MIN_GENERATED_LEN: usize = 4;
pub const MAX_GENERATED_LEN: usize = 256;

/// Highest possible score.
pub const MAX_SCORE: u8 = 8;

const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!@#$%^&*()-_=+[]{};:,.<>?/~";

/// Substrings that make a value easy to guess.
const COMMON_SEQUENCES: &[&str] = &["123", "abc", "qwerty", "password"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strength {
    Weak,
    Medium,
    Strong,
    VeryStrong,
}

impl Strength {
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=3 => Self::Weak,
            4..=5 => Self::Medium,
            6..=7 => Self::Strong,
            _ => Self::VeryStrong,
        }
    }
}

impl fmt::Display for Strength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Weak => "weak",
            Self::Medium => "medium",
            Self::Strong => "strong",
            Self::VeryStrong => "very-strong",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrengthReport {
    pub score: u8,
    pub strength: Strength,
    /// One hint per failed check.
    pub feedback: Vec<String>,
}

// ── Individual checks ────────────────────────────────────────────────

pub fn has_min_length(value: &str, min: usize) -> bool {
    value.chars().count() >= min
}

pub fn has_lowercase(value: &str) -> bool {
    value.chars().any(|c| c.is_lowercase())
}

pub fn has_uppercase(value: &str) -> bool {
    value.chars().any(|c| c.is_uppercase())
}

pub fn has_digit(value: &str) -> bool {
    value.chars().any(|c| c.is_ascii_digit())
}

pub fn has_symbol(value: &str) -> bool {
    value
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace())
}

/// No run of three identical characters and no common sequence.
pub fn avoids_obvious_patterns(value: &str) -> bool {
    let chars: Vec<char> = value.chars().collect();
    if chars.windows(3).any(|w| w[0] == w[1] && w[1] == w[2]) {
        return false;
    }
    let lower = value.to_lowercase();
    !COMMON_SEQUENCES.iter().any(|seq| lower.contains(seq))
}

/// Score `value` against every check.
pub fn check_strength(value: &str) -> StrengthReport {
    let checks: [(bool, &str); 8] = [
        (has_min_length(value, 8), "Use at least 8 characters"),
        (has_min_length(value, 12), "Use 12 or more characters"),
        (has_min_length(value, 16), "Use 16 or more characters for best protection"),
        (has_lowercase(value), "Add lowercase letters"),
        (has_uppercase(value), "Add uppercase letters"),
        (has_digit(value), "Add digits"),
        (has_symbol(value), "Add symbols"),
        (
            avoids_obvious_patterns(value),
            "Avoid repeated characters and common sequences",
        ),
    ];

    let score = checks.iter().filter(|(passed, _)| *passed).count() as u8;
    let feedback = checks
        .iter()
        .filter(|(passed, _)| !passed)
        .map(|(_, hint)| (*hint).to_string())
        .collect();

    StrengthReport {
        score,
        strength: Strength::from_score(score),
        feedback,
    }
}

/// Generate a random value of `length` characters from the OS-seeded
/// CSPRNG.  Every enabled character class appears at least once.
pub fn generate_secure_value(length: usize, include_special: bool) -> Result<String> {
    if !(MIN_GENERATED_LEN..=MAX_GENERATED_LEN).contains(&length) {
        return Err(TierVaultError::InvalidInput(format!(
            "length must be between {MIN_GENERATED_LEN} and {MAX_GENERATED_LEN}, got {length}"
        )));
    }

    let mut classes: Vec<&[u8]> = vec![LOWERCASE, UPPERCASE, DIGITS];
    if include_special {
        classes.push(SYMBOLS);
    }
    let alphabet: Vec<u8> = classes.concat();

    let mut rng = rand::rng();
    let mut out: Vec<u8> = classes
        .iter()
        .map(|class| class[rng.random_range(0..class.len())])
        .collect();
    while out.len() < length {
        out.push(alphabet[rng.random_range(0..alphabet.len())]);
    }
    out.shuffle(&mut rng);

    String::from_utf8(out)
        .map_err(|e| TierVaultError::CommandFailed(format!("generated value: {e}")))
}
