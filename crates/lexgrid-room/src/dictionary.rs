//! Word validation and scoring collaborator.
//!
//! The registry never looks at word lists itself; it asks a [`Dictionary`].
//! [`WordList`] is a plain in-memory set, [`AnyWord`] accepts every
//! alphabetic word (handy for local play and tests).

use std::collections::HashSet;

use lexgrid_protocol::Difficulty;

/// Decides which words count and what they are worth.
///
/// Words are passed uppercase.
pub trait Dictionary: Send + Sync + 'static {
    fn is_valid_word(&self, word: &str) -> bool;

    /// Bonus points on top of the tile points.
    ///
    /// The default rewards length and doubles the bonus on
    /// [`Difficulty::Hard`].
    fn score(&self, word: &str, difficulty: Difficulty) -> u32 {
        let bonus = length_bonus(word.chars().count());
        match difficulty {
            Difficulty::Easy | Difficulty::Normal => bonus,
            Difficulty::Hard => bonus * 2,
        }
    }
}

/// Extra points for longer words.
pub fn length_bonus(len: usize) -> u32 {
    match len {
        0..=3 => 0,
        4 => 1,
        5 => 2,
        6 => 3,
        7 => 5,
        _ => 8,
    }
}

/// A fixed set of allowed words.
#[derive(Debug, Clone, Default)]
pub struct WordList {
    words: HashSet<String>,
}

impl WordList {
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_ascii_uppercase())
            .filter(|w| !w.is_empty())
            .collect();
        Self { words }
    }

    /// Parses one word per line. Blank lines and `#` comments are skipped.
    pub fn from_text(text: &str) -> Self {
        Self::from_words(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#')),
        )
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl Dictionary for WordList {
    fn is_valid_word(&self, word: &str) -> bool {
        self.words.contains(word)
    }
}

/// Accepts any word made only of ASCII letters.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyWord;

impl Dictionary for AnyWord {
    fn is_valid_word(&self, word: &str) -> bool {
        !word.is_empty() && word.chars().all(|c| c.is_ascii_alphabetic())
    }
}
