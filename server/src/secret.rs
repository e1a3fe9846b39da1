//! Secret code generation, behind a trait so tests can fix the sequence.

use rand::Rng;
use shared::{Color, Key, KEY_LENGTH};

/// Supplies the secret for each new PLAY-mode session.
pub trait SecretSource: Send + Sync {
    fn next_secret(&self) -> Key;
}

/// Draws each peg uniformly from the game alphabet.
pub struct RandomSecrets;

impl SecretSource for RandomSecrets {
    fn next_secret(&self) -> Key {
        let mut rng = rand::thread_rng();
        Key::new([(); KEY_LENGTH].map(|_| Color::ALL[rng.gen_range(0..Color::ALL.len())]))
    }
}
