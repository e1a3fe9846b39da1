//! Black/white peg scoring for one guess against a secret.

use crate::{Color, Key, KEY_LENGTH};

/// The pegs awarded to one guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feedback {
    /// Guess symbols matching the secret at the same position.
    pub black: u8,
    /// Additional color matches at the wrong position, counted without
    /// double-use of any symbol.
    pub white: u8,
}

impl Feedback {
    pub fn is_win(self) -> bool {
        self.black as usize == KEY_LENGTH
    }
}

/// Grades `guess` against `secret`.
///
/// Black pegs are positional matches. White pegs are computed over the
/// remaining (non-black) positions only, as the multiset intersection of
/// per-color frequencies, so a color credited as black is never counted
/// again and neither side can be credited for more of a color than it
/// actually holds.
pub fn grade(secret: Key, guess: Key) -> Feedback {
    let mut black = 0u8;
    let mut secret_left = [0u8; Color::ALL.len()];
    let mut guess_left = [0u8; Color::ALL.len()];

    for (s, g) in secret.pegs().into_iter().zip(guess.pegs()) {
        if s == g {
            black += 1;
        } else {
            secret_left[s.index()] += 1;
            guess_left[g.index()] += 1;
        }
    }

    let white = secret_left
        .iter()
        .zip(guess_left.iter())
        .map(|(s, g)| (*s).min(*g))
        .sum();

    Feedback { black, white }
}
