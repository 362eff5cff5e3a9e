//! Difficulty file loader
//!
//! The file holds a line `DIFFICULTY=<n>`, optionally with spaces around
//! `=`. Any problem with it yields the default difficulty together with the
//! reason, so the caller can log it.

use crate::core::Difficulty;
use std::fmt;
use std::io;
use std::path::Path;
use tracing::{info, warn};

const KEY: &str = "DIFFICULTY";

/// Why the default difficulty was used
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DifficultyFallback {
    /// The file does not exist
    MissingFile,
    /// The file exists but could not be read
    Unreadable(String),
    /// The file is empty
    Empty,
    /// No `DIFFICULTY` key
    MissingKey,
    /// No `=` or no digits after the key
    MissingValue,
    /// A value outside 0 through 31
    OutOfRange(i64),
}

impl fmt::Display for DifficultyFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingFile => write!(f, "config file not found"),
            Self::Unreadable(e) => write!(f, "config file unreadable: {}", e),
            Self::Empty => write!(f, "config file is empty"),
            Self::MissingKey => write!(f, "no {} entry in config file", KEY),
            Self::MissingValue => write!(f, "{} has no numeric value", KEY),
            Self::OutOfRange(value) => write!(
                f,
                "difficulty {} out of range 0..={}",
                value,
                Difficulty::MAX
            ),
        }
    }
}

/// Difficulty in effect and, if the default was used, why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DifficultySetting {
    /// Difficulty to use
    pub difficulty: Difficulty,
    /// Set when the configured value could not be used
    pub fallback: Option<DifficultyFallback>,
}

impl DifficultySetting {
    fn configured(difficulty: Difficulty) -> Self {
        Self {
            difficulty,
            fallback: None,
        }
    }

    fn fallback(reason: DifficultyFallback) -> Self {
        Self {
            difficulty: Difficulty::DEFAULT,
            fallback: Some(reason),
        }
    }
}

/// Read the difficulty from `path`, logging the outcome
pub fn load_difficulty(path: &Path) -> DifficultySetting {
    let setting = match std::fs::read_to_string(path) {
        Ok(contents) => parse_difficulty(&contents),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            DifficultySetting::fallback(DifficultyFallback::MissingFile)
        }
        Err(e) => DifficultySetting::fallback(DifficultyFallback::Unreadable(e.to_string())),
    };

    match &setting.fallback {
        None => info!(
            "Difficulty set to {} from {}",
            setting.difficulty,
            path.display()
        ),
        Some(reason) => warn!(
            "{} ({}), using default difficulty {}",
            reason,
            path.display(),
            setting.difficulty
        ),
    }
    setting
}

/// Parse file contents
pub fn parse_difficulty(contents: &str) -> DifficultySetting {
    if contents.is_empty() {
        return DifficultySetting::fallback(DifficultyFallback::Empty);
    }

    let Some(start) = contents.find(KEY) else {
        return DifficultySetting::fallback(DifficultyFallback::MissingKey);
    };

    let after_key = &contents[start + KEY.len()..];
    let Some(equals) = after_key.find('=') else {
        return DifficultySetting::fallback(DifficultyFallback::MissingValue);
    };

    let value = after_key[equals + 1..].trim_start();
    let (negative, unsigned) = match value.as_bytes().first() {
        Some(b'-') => (true, &value[1..]),
        Some(b'+') => (false, &value[1..]),
        _ => (false, value),
    };

    let digits_len = unsigned
        .bytes()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if digits_len == 0 {
        return DifficultySetting::fallback(DifficultyFallback::MissingValue);
    }

    // Saturate on overflow; anything that large is out of range anyway.
    let magnitude = unsigned[..digits_len].parse::<i64>().unwrap_or(i64::MAX);
    let number = if negative { -magnitude } else { magnitude };

    match u32::try_from(number).ok().and_then(|n| Difficulty::new(n).ok()) {
        Some(difficulty) => DifficultySetting::configured(difficulty),
        None => DifficultySetting::fallback(DifficultyFallback::OutOfRange(number)),
    }
}
