//! Types shared between the game server and the player client: the color
//! alphabet, guess keys, protocol limits, the wire codec and the scoring
//! rules. Both binaries depend on this crate so the two peers can never
//! disagree about the grammar.

use std::fmt;
use thiserror::Error;

pub mod protocol;
pub mod scoring;

pub use protocol::{Command, FilePayload, Request, Response};
pub use scoring::Feedback;

/// Default server port.
pub const DEFAULT_PORT: u16 = 58013;
/// A session ends in a loss after this many scored guesses.
pub const MAX_TRIALS: u8 = 8;
/// Player identifiers are fixed-width numeric strings.
pub const PLID_DIGITS: usize = 6;
/// Upper bound on a session's duration limit, in seconds.
pub const MAX_PLAYTIME: u32 = 600;
/// Width of the playtime field on the wire.
pub const MAX_PLAYTIME_DIGITS: usize = 3;
/// Every secret and guess is exactly this many pegs.
pub const KEY_LENGTH: usize = 4;
/// Longest filename a file-carrying response may advertise.
pub const MAX_FILENAME: usize = 24;
/// Largest file payload a peer will accept, in bytes.
pub const MAX_FILESIZE: usize = 1024;

/// Receive timeout for one UDP attempt on the client.
pub const UDP_TIMEOUT_SECS: u64 = 5;
/// How many times the client re-sends an unanswered UDP request.
pub const UDP_RETRIES: u32 = 5;
/// Client-side TCP read deadline.
pub const TCP_READ_TIMEOUT_SECS: u64 = 30;
/// Client-side TCP write deadline.
pub const TCP_WRITE_TIMEOUT_SECS: u64 = 300;

/// Errors raised while encoding or decoding protocol messages.
///
/// A `Violation` means the peer's bytes do not follow the grammar at all,
/// so nothing in the message can be trusted. `Rejected` means the peer
/// answered with the reserved `ERR` line instead of the expected response
/// identifier: the message was understood and refused at the protocol
/// level. Application-level refusals (NOK, DUP, ...) are ordinary response
/// values, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("malformed protocol message")]
    Violation,
    #[error("request rejected by peer")]
    Rejected,
}

/// One peg color from the fixed six-letter game alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Red,
    Green,
    Blue,
    Yellow,
    Orange,
    Purple,
}

impl Color {
    pub const ALL: [Color; 6] = [
        Color::Red,
        Color::Green,
        Color::Blue,
        Color::Yellow,
        Color::Orange,
        Color::Purple,
    ];

    /// Parses one alphabet letter (`R G B Y O P`).
    pub fn from_char(c: char) -> Option<Color> {
        match c {
            'R' => Some(Color::Red),
            'G' => Some(Color::Green),
            'B' => Some(Color::Blue),
            'Y' => Some(Color::Yellow),
            'O' => Some(Color::Orange),
            'P' => Some(Color::Purple),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Color::Red => 'R',
            Color::Green => 'G',
            Color::Blue => 'B',
            Color::Yellow => 'Y',
            Color::Orange => 'O',
            Color::Purple => 'P',
        }
    }

    /// Stable index into per-color frequency tables.
    pub fn index(self) -> usize {
        self as usize
    }
}

/// A full code of [`KEY_LENGTH`] pegs: a secret or a guess.
///
/// On the wire a key travels as space-separated letters (`R G B Y`);
/// internally and in storage it is always the compact form (`RGBY`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Key([Color; KEY_LENGTH]);

impl Key {
    pub fn new(pegs: [Color; KEY_LENGTH]) -> Key {
        Key(pegs)
    }

    pub fn pegs(&self) -> [Color; KEY_LENGTH] {
        self.0
    }

    /// Parses a key in either wire form, stripping separating spaces.
    /// Returns `None` unless exactly [`KEY_LENGTH`] alphabet letters remain.
    pub fn parse(s: &str) -> Option<Key> {
        let mut pegs = [Color::Red; KEY_LENGTH];
        let mut n = 0;
        for c in s.chars() {
            if c == ' ' {
                continue;
            }
            if n == KEY_LENGTH {
                return None;
            }
            pegs[n] = Color::from_char(c)?;
            n += 1;
        }
        (n == KEY_LENGTH).then(|| Key(pegs))
    }

    /// Compact form, e.g. `RGBY`.
    pub fn compact(&self) -> String {
        self.0.iter().map(|c| c.as_char()).collect()
    }

    /// Wire form, one letter per token, e.g. `R G B Y`.
    pub fn spaced(&self) -> String {
        let letters: Vec<String> = self.0.iter().map(|c| c.as_char().to_string()).collect();
        letters.join(" ")
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.0 {
            write!(f, "{}", c.as_char())?;
        }
        Ok(())
    }
}

/// Checks the fixed-width numeric player identifier.
pub fn valid_plid(plid: &str) -> bool {
    plid.len() == PLID_DIGITS && plid.bytes().all(|b| b.is_ascii_digit())
}

/// Checks a session duration limit in seconds.
pub fn valid_playtime(seconds: u32) -> bool {
    (1..=MAX_PLAYTIME).contains(&seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_alphabet_roundtrip() {
        for color in Color::ALL {
            assert_eq!(Color::from_char(color.as_char()), Some(color));
        }
        assert_eq!(Color::from_char('X'), None);
        assert_eq!(Color::from_char('r'), None);
    }

    #[test]
    fn test_key_parse_compact_and_spaced() {
        let compact = Key::parse("RGBY").unwrap();
        let spaced = Key::parse("R G B Y").unwrap();
        assert_eq!(compact, spaced);
        assert_eq!(compact.compact(), "RGBY");
        assert_eq!(compact.spaced(), "R G B Y");
    }

    #[test]
    fn test_key_parse_rejects_bad_input() {
        assert!(Key::parse("RGB").is_none());
        assert!(Key::parse("RGBYO").is_none());
        assert!(Key::parse("RGBX").is_none());
        assert!(Key::parse("").is_none());
        assert!(Key::parse("rgby").is_none());
    }

    #[test]
    fn test_key_display_is_compact() {
        let key = Key::parse("OOPP").unwrap();
        assert_eq!(key.to_string(), "OOPP");
    }

    #[test]
    fn test_plid_validation() {
        assert!(valid_plid("123456"));
        assert!(valid_plid("000000"));
        assert!(!valid_plid("12345"));
        assert!(!valid_plid("1234567"));
        assert!(!valid_plid("12345a"));
        assert!(!valid_plid(""));
    }

    #[test]
    fn test_playtime_validation() {
        assert!(valid_playtime(1));
        assert!(valid_playtime(600));
        assert!(!valid_playtime(0));
        assert!(!valid_playtime(601));
    }
}
