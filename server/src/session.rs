//! The game rules: one decoded request in, one response out.
//!
//! Each handler validates the request against the player's current session
//! record, mutates the store, and picks the status code. Handlers never
//! panic on bad peers; anything the rules reject becomes a first-class
//! response value. Storage faults abort the request with an ERR status and
//! are never retried, since repeating an operation against a corrupt
//! record would fail the same way.

use crate::secret::SecretSource;
use crate::store::{ActiveGame, Mode, Outcome, ScoreEntry, SessionStore, Trial};
use log::{error, info, warn};
use shared::protocol::{
    DebugReply, QuitReply, Request, Response, ScoreboardReply, ShowTrialsReply, StartReply,
    TryReply,
};
use shared::{scoring, valid_playtime, FilePayload, Key, MAX_TRIALS};
use std::io;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// How many entries a scoreboard response carries at most.
pub const SCOREBOARD_LIMIT: usize = 10;

/// A first-trial win scores 100; every further trial costs 10 points.
fn win_score(trials_used: u8) -> u32 {
    100 - 10 * (trials_used as u32 - 1)
}

fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs()
}

/// Applies the game rules for every command against one shared store.
///
/// The service itself is stateless between calls; all session state lives
/// in the store. Callers must serialize same-player requests (the
/// dispatcher's per-player locks do).
pub struct GameService {
    store: SessionStore,
    secrets: Box<dyn SecretSource>,
}

impl GameService {
    pub fn new(store: SessionStore, secrets: Box<dyn SecretSource>) -> GameService {
        GameService { store, secrets }
    }

    /// Handles one request. Storage faults map to the command's ERR
    /// status; everything else is decided by the rules below.
    pub fn handle(&self, request: &Request) -> Response {
        let now = now_epoch();
        let result = match request {
            Request::Start { plid, time } => self.start(plid, *time, now),
            Request::Try {
                plid,
                guess,
                number,
            } => self.try_guess(plid, *guess, *number, now),
            Request::Quit { plid } => self.quit(plid, now),
            Request::Debug { plid, time, secret } => self.debug(plid, *time, *secret, now),
            Request::ShowTrials { plid } => self.show_trials(plid, now),
            Request::Scoreboard => self.scoreboard(),
        };

        result.unwrap_or_else(|e| {
            error!(
                "storage fault while handling {}: {}",
                request.command().request_token(),
                e
            );
            Response::error(request.command())
        })
    }

    /// Closes every still-active session as timed out. Called on server
    /// shutdown so no record is left dangling.
    pub fn expire_all_active(&self) -> io::Result<usize> {
        let now = now_epoch();
        let mut count = 0;
        for plid in self.store.active_players()? {
            if let Some(game) = self.store.active_game(&plid)? {
                self.store.archive_game(&game, Outcome::TimedOut, now)?;
                count += 1;
            }
        }
        Ok(count)
    }

    /// Creates a session unless a still-valid one exists. An expired
    /// leftover is archived as timed out first, then replaced.
    fn begin(
        &self,
        plid: &str,
        time: u32,
        mode: Mode,
        secret: Key,
        now: u64,
    ) -> io::Result<bool> {
        if let Some(game) = self.store.active_game(plid)? {
            if !game.expired(now) {
                return Ok(false);
            }
            self.store.archive_game(&game, Outcome::TimedOut, now)?;
        }

        let game = ActiveGame {
            plid: plid.to_string(),
            mode,
            secret,
            duration: time as u64,
            start_epoch: now,
            trials: Vec::new(),
        };
        self.store.create_game(&game)?;
        info!("{} started a {}s {} game", plid, time, mode.as_str());
        Ok(true)
    }

    fn start(&self, plid: &str, time: u32, now: u64) -> io::Result<Response> {
        if !valid_playtime(time) {
            warn!("{} asked for an out-of-range duration ({}s)", plid, time);
            return Ok(Response::Start(StartReply::Error));
        }
        let created = self.begin(plid, time, Mode::Play, self.secrets.next_secret(), now)?;
        Ok(Response::Start(if created {
            StartReply::Accepted
        } else {
            StartReply::AlreadyPlaying
        }))
    }

    fn debug(&self, plid: &str, time: u32, secret: Key, now: u64) -> io::Result<Response> {
        if !valid_playtime(time) {
            warn!("{} asked for an out-of-range duration ({}s)", plid, time);
            return Ok(Response::Debug(DebugReply::Error));
        }
        let created = self.begin(plid, time, Mode::Debug, secret, now)?;
        Ok(Response::Debug(if created {
            DebugReply::Accepted
        } else {
            DebugReply::AlreadyPlaying
        }))
    }

    fn try_guess(&self, plid: &str, guess: Key, number: u8, now: u64) -> io::Result<Response> {
        let Some(mut game) = self.store.active_game(plid)? else {
            return Ok(Response::Try(TryReply::NoGame));
        };

        if game.expired(now) {
            self.store.archive_game(&game, Outcome::TimedOut, now)?;
            return Ok(Response::Try(TryReply::OutOfTime {
                secret: game.secret,
            }));
        }

        let expected = game.expected_trial();
        if number == expected {
            if game.has_guess(guess) {
                return Ok(Response::Try(TryReply::Duplicate));
            }

            let feedback = scoring::grade(game.secret, guess);
            let trial = Trial {
                guess,
                black: feedback.black,
                white: feedback.white,
                elapsed: game.elapsed(now),
            };
            self.store.append_trial(plid, &trial)?;
            game.trials.push(trial);

            if feedback.is_win() {
                let trials_used = game.trials.len() as u8;
                self.store.record_score(
                    &ScoreEntry {
                        score: win_score(trials_used),
                        plid: plid.to_string(),
                        secret: game.secret,
                        trials: trials_used,
                        mode: game.mode,
                    },
                    now,
                )?;
                self.store.archive_game(&game, Outcome::Won, now)?;
                info!("{} won in {} trials", plid, trials_used);
            } else if game.trials.len() as u8 == MAX_TRIALS {
                self.store.archive_game(&game, Outcome::Lost, now)?;
                return Ok(Response::Try(TryReply::OutOfTrials {
                    secret: game.secret,
                }));
            }

            Ok(Response::Try(TryReply::Accepted {
                number,
                black: feedback.black,
                white: feedback.white,
            }))
        } else if number + 1 == expected {
            // The previous turn again. A re-sent datagram repeats the same
            // guess and is answered from the record without mutating
            // anything; a different guess under an already-answered number
            // means the peers have lost step.
            match game.trials.last() {
                Some(prev) if prev.guess == guess => Ok(Response::Try(TryReply::Accepted {
                    number,
                    black: prev.black,
                    white: prev.white,
                })),
                Some(_) => Ok(Response::Try(TryReply::OutOfSync)),
                None => Ok(Response::Try(TryReply::Error)),
            }
        } else {
            warn!(
                "{} sent trial {} while expecting {}",
                plid, number, expected
            );
            Ok(Response::Try(TryReply::Error))
        }
    }

    fn quit(&self, plid: &str, now: u64) -> io::Result<Response> {
        let Some(game) = self.store.active_game(plid)? else {
            return Ok(Response::Quit(QuitReply::NoGame));
        };
        if game.expired(now) {
            self.store.archive_game(&game, Outcome::TimedOut, now)?;
            return Ok(Response::Quit(QuitReply::NoGame));
        }
        self.store.archive_game(&game, Outcome::Quit, now)?;
        Ok(Response::Quit(QuitReply::Accepted {
            secret: game.secret,
        }))
    }

    fn show_trials(&self, plid: &str, now: u64) -> io::Result<Response> {
        if let Some(game) = self.store.active_game(plid)? {
            if game.expired(now) {
                self.store.archive_game(&game, Outcome::TimedOut, now)?;
            } else {
                return Ok(Response::ShowTrials(ShowTrialsReply::Active(FilePayload {
                    name: format!("STATE_{}.txt", plid),
                    data: active_transcript(&game, now),
                })));
            }
        }

        match self.store.latest_archive(plid)? {
            Some((name, data)) => Ok(Response::ShowTrials(ShowTrialsReply::Finished(
                FilePayload { name, data },
            ))),
            None => Ok(Response::ShowTrials(ShowTrialsReply::NoGame)),
        }
    }

    fn scoreboard(&self) -> io::Result<Response> {
        let entries = self.store.top_scores(SCOREBOARD_LIMIT)?;
        if entries.is_empty() {
            return Ok(Response::Scoreboard(ScoreboardReply::Empty));
        }
        Ok(Response::Scoreboard(ScoreboardReply::Ranking(FilePayload {
            name: "TOPSCORES.txt".to_string(),
            data: scoreboard_text(&entries),
        })))
    }
}

/// Human-readable transcript of a live session.
fn active_transcript(game: &ActiveGame, now: u64) -> String {
    let mut text = format!(
        "Active game for player {} ({} mode)\nDuration limit: {}s  Trials used: {}\n",
        game.plid,
        game.mode.as_str(),
        game.duration,
        game.trials.len()
    );
    for (i, trial) in game.trials.iter().enumerate() {
        text.push_str(&format!(
            "Trial {}: {}  {}B {}W  at {}s\n",
            i + 1,
            trial.guess.compact(),
            trial.black,
            trial.white,
            trial.elapsed
        ));
    }
    text.push_str(&format!("Remaining time: {}s\n", game.remaining(now)));
    text
}

/// Fixed-width leaderboard, best score first.
fn scoreboard_text(entries: &[ScoreEntry]) -> String {
    let mut text = String::from("RANK  SCORE  PLAYER  SECRET  TRIALS  MODE\n");
    for (i, entry) in entries.iter().enumerate() {
        text.push_str(&format!(
            "{:>4}  {:>5}  {:<6}  {:<6}  {:>6}  {}\n",
            i + 1,
            entry.score,
            entry.plid,
            entry.secret.compact(),
            entry.trials,
            entry.mode.as_str()
        ));
    }
    text
}
