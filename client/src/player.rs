//! Local bookkeeping for the player driving this client.
//!
//! The server is authoritative; this state only remembers which player ID
//! the user signed in with and which trial number to stamp on the next
//! guess, so the interactive loop can number requests without asking.

/// What the client believes about the current player.
#[derive(Debug, Default)]
pub struct PlayerState {
    plid: Option<String>,
    playing: bool,
    next_trial: u8,
}

impl PlayerState {
    pub fn new() -> PlayerState {
        PlayerState::default()
    }

    /// Remembers a freshly started game for `plid`, numbering from 1.
    pub fn begin(&mut self, plid: String) {
        self.plid = Some(plid);
        self.playing = true;
        self.next_trial = 1;
    }

    /// Marks the game over. The player ID is kept so transcripts of the
    /// finished game can still be requested.
    pub fn finish(&mut self) {
        self.playing = false;
        self.next_trial = 1;
    }

    /// The last player ID used, live game or not.
    pub fn plid(&self) -> Option<&str> {
        self.plid.as_deref()
    }

    pub fn playing(&self) -> bool {
        self.playing
    }

    pub fn next_trial(&self) -> u8 {
        self.next_trial
    }

    /// Advances the counter after the server accepted a trial.
    pub fn advance(&mut self) {
        self.next_trial += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_state_has_no_player() {
        let state = PlayerState::new();
        assert_eq!(state.plid(), None);
        assert!(!state.playing());
    }

    #[test]
    fn test_begin_numbers_trials_from_one() {
        let mut state = PlayerState::new();
        state.begin("123456".to_string());
        assert!(state.playing());
        assert_eq!(state.plid(), Some("123456"));
        assert_eq!(state.next_trial(), 1);

        state.advance();
        state.advance();
        assert_eq!(state.next_trial(), 3);
    }

    #[test]
    fn test_finish_keeps_plid_for_transcripts() {
        let mut state = PlayerState::new();
        state.begin("123456".to_string());
        state.advance();
        state.finish();

        assert!(!state.playing());
        assert_eq!(state.plid(), Some("123456"));
        assert_eq!(state.next_trial(), 1);
    }

    #[test]
    fn test_new_game_resets_counter() {
        let mut state = PlayerState::new();
        state.begin("123456".to_string());
        state.advance();
        state.begin("654321".to_string());
        assert_eq!(state.plid(), Some("654321"));
        assert_eq!(state.next_trial(), 1);
    }
}
