//! Flat-file session store.
//!
//! This module owns the on-disk layout, which is an external contract:
//!
//! ```text
//! <root>/GAMES/GAME_<PLID>.txt        the player's active session record
//! <root>/GAMES/<PLID>/<stamp>_<C>.txt archived sessions, C in {W,F,Q,T}
//! <root>/SCORES/<score>_<PLID>_<stamp>.txt  one record per winning game
//! ```
//!
//! An active record starts with one header line
//! `PLID MODE SECRET DURATION DATE TIME STARTEPOCH`, followed by one
//! `T: KEY B W ELAPSEDSECONDS` line per scored guess. Archiving appends a
//! final `DATE TIME TOTALSECONDS` summary line and relocates the file into
//! the per-player history directory. Everything the state machine needs
//! (expected trial number, secret, elapsed time, full transcript) is
//! recoverable by reading the record, so no index is kept: the active
//! record's name is derived from the player ID alone.
//!
//! Any I/O or parse failure surfaces as `io::Error`; callers treat it as
//! fatal to the request in flight.

use chrono::{DateTime, Utc};
use log::info;
use shared::Key;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const GAMES_DIR: &str = "GAMES";
const SCORES_DIR: &str = "SCORES";

/// How a session's secret was chosen. DEBUG sessions play against a
/// caller-supplied secret; the distinction is kept in every record so the
/// leaderboard can tell rehearsals from real wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Play,
    Debug,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Play => "PLAY",
            Mode::Debug => "DEBUG",
        }
    }

    pub fn from_str(s: &str) -> Option<Mode> {
        match s {
            "PLAY" => Some(Mode::Play),
            "DEBUG" => Some(Mode::Debug),
            _ => None,
        }
    }
}

/// Why a session ended; determines the archive filename tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Won,
    Lost,
    Quit,
    TimedOut,
}

impl Outcome {
    pub fn code(self) -> char {
        match self {
            Outcome::Won => 'W',
            Outcome::Lost => 'F',
            Outcome::Quit => 'Q',
            Outcome::TimedOut => 'T',
        }
    }
}

/// One scored guess inside a session record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trial {
    pub guess: Key,
    pub black: u8,
    pub white: u8,
    /// Seconds between session start and this guess.
    pub elapsed: u64,
}

/// In-memory view of one player's active session record.
#[derive(Debug, Clone)]
pub struct ActiveGame {
    pub plid: String,
    pub mode: Mode,
    pub secret: Key,
    /// Duration limit in seconds.
    pub duration: u64,
    pub start_epoch: u64,
    pub trials: Vec<Trial>,
}

impl ActiveGame {
    /// Trials are numbered from 1; the next acceptable number.
    pub fn expected_trial(&self) -> u8 {
        self.trials.len() as u8 + 1
    }

    pub fn elapsed(&self, now_epoch: u64) -> u64 {
        now_epoch.saturating_sub(self.start_epoch)
    }

    /// A session is over the moment its elapsed time reaches the limit.
    pub fn expired(&self, now_epoch: u64) -> bool {
        self.elapsed(now_epoch) >= self.duration
    }

    pub fn remaining(&self, now_epoch: u64) -> u64 {
        self.duration.saturating_sub(self.elapsed(now_epoch))
    }

    /// Whether `guess` repeats any recorded trial of this session.
    pub fn has_guess(&self, guess: Key) -> bool {
        self.trials.iter().any(|t| t.guess == guess)
    }
}

/// One leaderboard record, created when a session is won.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreEntry {
    pub score: u32,
    pub plid: String,
    pub secret: Key,
    pub trials: u8,
    pub mode: Mode,
}

/// Durable CRUD over session records, per-player archives and the
/// leaderboard. One instance is shared by all request handlers; callers
/// serialize same-player access (see the dispatcher's lock map).
pub struct SessionStore {
    games: PathBuf,
    scores: PathBuf,
}

impl SessionStore {
    /// Opens the store rooted at `root`, creating the directory tree on
    /// first use.
    pub fn open(root: &Path) -> io::Result<SessionStore> {
        let games = root.join(GAMES_DIR);
        let scores = root.join(SCORES_DIR);
        fs::create_dir_all(&games)?;
        fs::create_dir_all(&scores)?;
        Ok(SessionStore { games, scores })
    }

    fn active_path(&self, plid: &str) -> PathBuf {
        self.games.join(format!("GAME_{}.txt", plid))
    }

    fn player_dir(&self, plid: &str) -> PathBuf {
        self.games.join(plid)
    }

    /// Loads the player's active session record, if one exists.
    pub fn active_game(&self, plid: &str) -> io::Result<Option<ActiveGame>> {
        let text = match fs::read_to_string(self.active_path(plid)) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        parse_active_record(&text).map(Some)
    }

    /// Writes the header line of a brand-new session record.
    pub fn create_game(&self, game: &ActiveGame) -> io::Result<()> {
        fs::write(self.active_path(&game.plid), header_line(game))
    }

    /// Appends one scored guess to the player's active record.
    pub fn append_trial(&self, plid: &str, trial: &Trial) -> io::Result<()> {
        use std::io::Write;
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(self.active_path(plid))?;
        file.write_all(trial_line(trial).as_bytes())
    }

    /// Closes a session: rewrites the record with its terminating summary
    /// line into the player's history directory and removes the active
    /// file. Archives are never touched again.
    pub fn archive_game(
        &self,
        game: &ActiveGame,
        outcome: Outcome,
        end_epoch: u64,
    ) -> io::Result<()> {
        let dir = self.player_dir(&game.plid);
        fs::create_dir_all(&dir)?;

        let (date, time) = date_and_time(end_epoch);
        let mut text = header_line(game);
        for trial in &game.trials {
            text.push_str(&trial_line(trial));
        }
        text.push_str(&format!(
            "{} {} {}\n",
            date,
            time,
            end_epoch.saturating_sub(game.start_epoch)
        ));

        let name = format!("{}_{}.txt", stamp(end_epoch), outcome.code());
        fs::write(dir.join(&name), text)?;
        fs::remove_file(self.active_path(&game.plid))?;
        info!(
            "archived game of {} as {} ({} trials)",
            game.plid,
            name,
            game.trials.len()
        );
        Ok(())
    }

    /// Returns the filename and contents of the player's most recently
    /// archived session, if any.
    pub fn latest_archive(&self, plid: &str) -> io::Result<Option<(String, String)>> {
        let dir = self.player_dir(plid);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        // Archive names start with a YYYYMMDD_HHMMSS stamp, so the
        // lexicographic maximum is the newest game.
        let mut newest: Option<String> = None;
        for entry in entries {
            let name = entry?.file_name();
            let name = match name.to_str() {
                Some(name) => name.to_string(),
                None => continue,
            };
            if newest.as_deref().map_or(true, |n| name.as_str() > n) {
                newest = Some(name);
            }
        }

        match newest {
            Some(name) => {
                let contents = fs::read_to_string(dir.join(&name))?;
                Ok(Some((name, contents)))
            }
            None => Ok(None),
        }
    }

    /// Records one winning game on the leaderboard.
    pub fn record_score(&self, entry: &ScoreEntry, end_epoch: u64) -> io::Result<()> {
        let name = format!("{:03}_{}_{}.txt", entry.score, entry.plid, stamp(end_epoch));
        let line = format!(
            "{:03} {} {} {} {}\n",
            entry.score,
            entry.plid,
            entry.secret.compact(),
            entry.trials,
            entry.mode.as_str()
        );
        fs::write(self.scores.join(name), line)
    }

    /// The best `limit` scores, highest first.
    pub fn top_scores(&self, limit: usize) -> io::Result<Vec<ScoreEntry>> {
        let mut entries = Vec::new();
        for file in fs::read_dir(&self.scores)? {
            let text = fs::read_to_string(file?.path())?;
            entries.push(parse_score_record(&text)?);
        }
        entries.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.plid.cmp(&b.plid)));
        entries.truncate(limit);
        Ok(entries)
    }

    /// Player IDs with an active record on disk. Used on shutdown to
    /// force-expire whatever is still running.
    pub fn active_players(&self) -> io::Result<Vec<String>> {
        let mut players = Vec::new();
        for entry in fs::read_dir(&self.games)? {
            let name = entry?.file_name();
            if let Some(name) = name.to_str() {
                if let Some(plid) = name
                    .strip_prefix("GAME_")
                    .and_then(|rest| rest.strip_suffix(".txt"))
                {
                    players.push(plid.to_string());
                }
            }
        }
        Ok(players)
    }
}

fn header_line(game: &ActiveGame) -> String {
    let (date, time) = date_and_time(game.start_epoch);
    format!(
        "{} {} {} {} {} {} {}\n",
        game.plid,
        game.mode.as_str(),
        game.secret.compact(),
        game.duration,
        date,
        time,
        game.start_epoch
    )
}

fn trial_line(trial: &Trial) -> String {
    format!(
        "T: {} {} {} {}\n",
        trial.guess.compact(),
        trial.black,
        trial.white,
        trial.elapsed
    )
}

fn corrupt(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, format!("corrupt record: {}", what))
}

fn parse_active_record(text: &str) -> io::Result<ActiveGame> {
    let mut lines = text.lines();
    let header = lines.next().ok_or_else(|| corrupt("empty file"))?;
    let fields: Vec<&str> = header.split(' ').collect();
    if fields.len() != 7 {
        return Err(corrupt("header field count"));
    }

    let plid = fields[0].to_string();
    let mode = Mode::from_str(fields[1]).ok_or_else(|| corrupt("mode"))?;
    let secret = Key::parse(fields[2]).ok_or_else(|| corrupt("secret"))?;
    let duration = fields[3].parse().map_err(|_| corrupt("duration"))?;
    // fields[4] and fields[5] repeat the start date/time for human readers;
    // the epoch is authoritative.
    let start_epoch = fields[6].parse().map_err(|_| corrupt("start epoch"))?;

    let mut trials = Vec::new();
    for line in lines {
        let rest = line.strip_prefix("T: ").ok_or_else(|| corrupt("trial line"))?;
        let fields: Vec<&str> = rest.split(' ').collect();
        if fields.len() != 4 {
            return Err(corrupt("trial field count"));
        }
        trials.push(Trial {
            guess: Key::parse(fields[0]).ok_or_else(|| corrupt("trial key"))?,
            black: fields[1].parse().map_err(|_| corrupt("black count"))?,
            white: fields[2].parse().map_err(|_| corrupt("white count"))?,
            elapsed: fields[3].parse().map_err(|_| corrupt("trial elapsed"))?,
        });
    }

    Ok(ActiveGame {
        plid,
        mode,
        secret,
        duration,
        start_epoch,
        trials,
    })
}

fn parse_score_record(text: &str) -> io::Result<ScoreEntry> {
    let line = text.lines().next().ok_or_else(|| corrupt("empty score file"))?;
    let fields: Vec<&str> = line.split(' ').collect();
    if fields.len() != 5 {
        return Err(corrupt("score field count"));
    }
    Ok(ScoreEntry {
        score: fields[0].parse().map_err(|_| corrupt("score"))?,
        plid: fields[1].to_string(),
        secret: Key::parse(fields[2]).ok_or_else(|| corrupt("score secret"))?,
        trials: fields[3].parse().map_err(|_| corrupt("score trials"))?,
        mode: Mode::from_str(fields[4]).ok_or_else(|| corrupt("score mode"))?,
    })
}

fn timestamp(epoch: u64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(epoch as i64, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn date_and_time(epoch: u64) -> (String, String) {
    let at = timestamp(epoch);
    (
        at.format("%Y-%m-%d").to_string(),
        at.format("%H:%M:%S").to_string(),
    )
}

/// Filename-safe end-of-game stamp, `YYYYMMDD_HHMMSS`.
fn stamp(epoch: u64) -> String {
    timestamp(epoch).format("%Y%m%d_%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(s: &str) -> Key {
        Key::parse(s).unwrap()
    }

    fn game(plid: &str, secret: &str, start_epoch: u64) -> ActiveGame {
        ActiveGame {
            plid: plid.to_string(),
            mode: Mode::Play,
            secret: key(secret),
            duration: 600,
            start_epoch,
            trials: Vec::new(),
        }
    }

    fn open_store() -> (TempDir, SessionStore) {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_open_creates_directory_tree() {
        let (dir, _store) = open_store();
        assert!(dir.path().join(GAMES_DIR).is_dir());
        assert!(dir.path().join(SCORES_DIR).is_dir());
    }

    #[test]
    fn test_missing_record_is_none() {
        let (_dir, store) = open_store();
        assert!(store.active_game("123456").unwrap().is_none());
    }

    #[test]
    fn test_record_layout_is_stable() {
        let (dir, store) = open_store();
        store.create_game(&game("123456", "RGBY", 1_700_000_000)).unwrap();
        store
            .append_trial(
                "123456",
                &Trial {
                    guess: key("GGBB"),
                    black: 1,
                    white: 1,
                    elapsed: 15,
                },
            )
            .unwrap();

        let text =
            fs::read_to_string(dir.path().join(GAMES_DIR).join("GAME_123456.txt")).unwrap();
        assert_eq!(
            text,
            "123456 PLAY RGBY 600 2023-11-14 22:13:20 1700000000\nT: GGBB 1 1 15\n"
        );
    }

    #[test]
    fn test_create_load_roundtrip() {
        let (_dir, store) = open_store();
        let mut created = game("123456", "OOPP", 1_700_000_000);
        store.create_game(&created).unwrap();
        let trial = Trial {
            guess: key("RGBY"),
            black: 0,
            white: 0,
            elapsed: 3,
        };
        store.append_trial("123456", &trial).unwrap();
        created.trials.push(trial);

        let loaded = store.active_game("123456").unwrap().unwrap();
        assert_eq!(loaded.plid, created.plid);
        assert_eq!(loaded.secret, created.secret);
        assert_eq!(loaded.duration, created.duration);
        assert_eq!(loaded.start_epoch, created.start_epoch);
        assert_eq!(loaded.trials, created.trials);
        assert_eq!(loaded.expected_trial(), 2);
    }

    #[test]
    fn test_corrupt_record_is_an_error() {
        let (dir, store) = open_store();
        fs::write(
            dir.path().join(GAMES_DIR).join("GAME_123456.txt"),
            "123456 PLAY not-a-key 600 2023-11-14 22:13:20 1700000000\n",
        )
        .unwrap();
        assert!(store.active_game("123456").is_err());
    }

    #[test]
    fn test_archive_moves_record_and_appends_summary() {
        let (dir, store) = open_store();
        let mut g = game("123456", "RGBY", 1_700_000_000);
        store.create_game(&g).unwrap();
        let trial = Trial {
            guess: key("RGBY"),
            black: 4,
            white: 0,
            elapsed: 42,
        };
        store.append_trial("123456", &trial).unwrap();
        g.trials.push(trial);

        store.archive_game(&g, Outcome::Won, 1_700_000_042).unwrap();

        assert!(store.active_game("123456").unwrap().is_none());
        let (name, contents) = store.latest_archive("123456").unwrap().unwrap();
        assert_eq!(name, "20231114_221402_W.txt");
        assert!(contents.starts_with("123456 PLAY RGBY 600 "));
        assert!(contents.contains("T: RGBY 4 0 42\n"));
        assert!(contents.ends_with("2023-11-14 22:14:02 42\n"));
        assert!(dir
            .path()
            .join(GAMES_DIR)
            .join("123456")
            .join(&name)
            .is_file());
    }

    #[test]
    fn test_latest_archive_picks_newest() {
        let (_dir, store) = open_store();
        for (start, end) in [(1_700_000_000, 1_700_000_050), (1_700_010_000, 1_700_010_005)] {
            let g = game("123456", "RGBY", start);
            store.create_game(&g).unwrap();
            store.archive_game(&g, Outcome::Quit, end).unwrap();
        }
        let (name, _) = store.latest_archive("123456").unwrap().unwrap();
        assert_eq!(name, format!("{}_Q.txt", stamp(1_700_010_005)));
    }

    #[test]
    fn test_no_archive_is_none() {
        let (_dir, store) = open_store();
        assert!(store.latest_archive("123456").unwrap().is_none());
    }

    #[test]
    fn test_scores_rank_highest_first() {
        let (_dir, store) = open_store();
        for (score, plid, trials) in [(70u32, "111111", 4u8), (100, "222222", 1), (90, "333333", 2)]
        {
            let entry = ScoreEntry {
                score,
                plid: plid.to_string(),
                secret: key("RGBY"),
                trials,
                mode: Mode::Play,
            };
            store.record_score(&entry, 1_700_000_000 + score as u64).unwrap();
        }

        let top = store.top_scores(10).unwrap();
        let scores: Vec<u32> = top.iter().map(|e| e.score).collect();
        assert_eq!(scores, vec![100, 90, 70]);

        let top_two = store.top_scores(2).unwrap();
        assert_eq!(top_two.len(), 2);
        assert_eq!(top_two[1].plid, "333333");
    }

    #[test]
    fn test_score_record_layout() {
        let (dir, store) = open_store();
        let entry = ScoreEntry {
            score: 90,
            plid: "123456".to_string(),
            secret: key("RGBY"),
            trials: 2,
            mode: Mode::Debug,
        };
        store.record_score(&entry, 1_700_000_000).unwrap();

        let name = format!("090_123456_{}.txt", stamp(1_700_000_000));
        let text = fs::read_to_string(dir.path().join(SCORES_DIR).join(name)).unwrap();
        assert_eq!(text, "090 123456 RGBY 2 DEBUG\n");
    }

    #[test]
    fn test_active_players_lists_live_records() {
        let (_dir, store) = open_store();
        store.create_game(&game("111111", "RGBY", 1_700_000_000)).unwrap();
        store.create_game(&game("222222", "OOPP", 1_700_000_000)).unwrap();

        let mut players = store.active_players().unwrap();
        players.sort();
        assert_eq!(players, vec!["111111", "222222"]);
    }

    #[test]
    fn test_expiry_accounting() {
        let g = game("123456", "RGBY", 1_000);
        assert!(!g.expired(1_000));
        assert!(!g.expired(1_599));
        assert!(g.expired(1_600));
        assert_eq!(g.remaining(1_000), 600);
        assert_eq!(g.remaining(1_599), 1);
        assert_eq!(g.remaining(2_000), 0);
    }
}
