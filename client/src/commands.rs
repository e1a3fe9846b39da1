//! The interactive console: parses typed commands, numbers trials, sends
//! requests and renders replies.
//!
//! Input is validated locally (player ID width, time range, alphabet)
//! before anything touches the network, so typos never reach the server.
//! The trial counter lives in [`PlayerState`]; the user types colors, not
//! numbers.

use crate::network::Connection;
use crate::player::PlayerState;
use log::{info, warn};
use shared::protocol::{
    DebugReply, QuitReply, Request, Response, ScoreboardReply, ShowTrialsReply, StartReply,
    TryReply,
};
use shared::{valid_playtime, valid_plid, FilePayload, Key, MAX_TRIALS};
use std::fs;
use std::io::{self, Write};

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Start { plid: String, time: u32 },
    Try { guess: Key },
    Debug { plid: String, time: u32, secret: Key },
    Quit,
    ShowTrials,
    Scoreboard,
    Help,
    Exit,
}

/// Parses one non-empty console line; errors are user-facing messages.
pub fn parse_action(line: &str) -> Result<Action, String> {
    let mut tokens = line.split_whitespace();
    let name = tokens.next().unwrap_or("");
    let rest: Vec<&str> = tokens.collect();

    match name {
        "start" => {
            if rest.len() != 2 {
                return Err("Usage: start PLID SECONDS".to_string());
            }
            let plid = parse_plid(rest[0])?;
            let time = parse_playtime(rest[1])?;
            Ok(Action::Start { plid, time })
        }
        "try" => {
            let guess = parse_key(&rest.join(" "))?;
            Ok(Action::Try { guess })
        }
        "debug" => {
            if rest.len() < 3 {
                return Err("Usage: debug PLID SECONDS C1 C2 C3 C4".to_string());
            }
            let plid = parse_plid(rest[0])?;
            let time = parse_playtime(rest[1])?;
            let secret = parse_key(&rest[2..].join(" "))?;
            Ok(Action::Debug { plid, time, secret })
        }
        "quit" => Ok(Action::Quit),
        "show_trials" | "st" => Ok(Action::ShowTrials),
        "scoreboard" | "sb" => Ok(Action::Scoreboard),
        "help" | "?" => Ok(Action::Help),
        "exit" => Ok(Action::Exit),
        other => Err(format!(
            "Unknown command: {}. Type 'help' to list commands.",
            other
        )),
    }
}

fn parse_plid(token: &str) -> Result<String, String> {
    if !valid_plid(token) {
        return Err("The player ID must be exactly six digits.".to_string());
    }
    Ok(token.to_string())
}

fn parse_playtime(token: &str) -> Result<u32, String> {
    let time: u32 = token
        .parse()
        .map_err(|_| "The time limit must be a number of seconds.".to_string())?;
    if !valid_playtime(time) {
        return Err("The time limit must be between 1 and 600 seconds.".to_string());
    }
    Ok(time)
}

fn parse_key(text: &str) -> Result<Key, String> {
    Key::parse(text)
        .ok_or_else(|| "Give exactly four colors from R G B Y O P.".to_string())
}

fn print_help() {
    println!("Commands:");
    println!("  start PLID SECONDS         begin a game with a random secret");
    println!("  try C1 C2 C3 C4            guess the code (colors R G B Y O P)");
    println!("  debug PLID SECONDS C1..C4  begin a game with a known secret");
    println!("  show_trials | st           transcript of your current or last game");
    println!("  scoreboard | sb            the top winners");
    println!("  quit                       give up the current game");
    println!("  exit                       quit and leave");
}

/// The console loop around one server connection.
pub struct GameClient {
    connection: Connection,
    state: PlayerState,
}

impl GameClient {
    pub fn new(connection: Connection) -> GameClient {
        GameClient {
            connection,
            state: PlayerState::new(),
        }
    }

    /// Reads commands until `exit` or end of input. Leaving with a live
    /// game quits it on the server first.
    pub async fn run(&mut self) -> io::Result<()> {
        println!("Type 'help' to list commands.");
        let stdin = io::stdin();

        loop {
            print!("> ");
            io::stdout().flush()?;

            let mut line = String::new();
            if stdin.read_line(&mut line)? == 0 {
                break;
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match parse_action(line) {
                Ok(Action::Exit) => break,
                Ok(action) => self.execute(action).await,
                Err(message) => println!("{}", message),
            }
        }

        if self.state.playing() {
            self.quit().await;
        }
        Ok(())
    }

    async fn execute(&mut self, action: Action) {
        match action {
            Action::Start { plid, time } => self.start(plid, time).await,
            Action::Try { guess } => self.try_guess(guess).await,
            Action::Debug { plid, time, secret } => self.debug(plid, time, secret).await,
            Action::Quit => self.quit().await,
            Action::ShowTrials => self.show_trials().await,
            Action::Scoreboard => self.scoreboard().await,
            Action::Help => print_help(),
            Action::Exit => {}
        }
    }

    async fn send(&self, request: Request) -> Option<Response> {
        match self.connection.exchange(&request).await {
            Ok(response) => Some(response),
            Err(e) => {
                println!("Request failed: {}", e);
                None
            }
        }
    }

    async fn start(&mut self, plid: String, time: u32) {
        let request = Request::Start {
            plid: plid.clone(),
            time,
        };
        let Some(reply) = self.send(request).await else {
            return;
        };
        match reply {
            Response::Start(StartReply::Accepted) => {
                self.state.begin(plid);
                println!(
                    "Game on! You have {} seconds and {} guesses.",
                    time, MAX_TRIALS
                );
            }
            Response::Start(StartReply::AlreadyPlaying) => {
                println!("You already have a game running; quit it first.");
            }
            Response::Start(StartReply::Error) => println!("The server rejected the request."),
            other => warn!("unexpected reply {:?}", other),
        }
    }

    async fn debug(&mut self, plid: String, time: u32, secret: Key) {
        let request = Request::Debug {
            plid: plid.clone(),
            time,
            secret,
        };
        let Some(reply) = self.send(request).await else {
            return;
        };
        match reply {
            Response::Debug(DebugReply::Accepted) => {
                self.state.begin(plid);
                println!("Debug game on! You have {} seconds.", time);
            }
            Response::Debug(DebugReply::AlreadyPlaying) => {
                println!("You already have a game running; quit it first.");
            }
            Response::Debug(DebugReply::Error) => println!("The server rejected the request."),
            other => warn!("unexpected reply {:?}", other),
        }
    }

    async fn try_guess(&mut self, guess: Key) {
        if !self.state.playing() {
            println!("Start a game first.");
            return;
        }
        let Some(plid) = self.state.plid().map(str::to_string) else {
            println!("Start a game first.");
            return;
        };

        let request = Request::Try {
            plid,
            guess,
            number: self.state.next_trial(),
        };
        let Some(reply) = self.send(request).await else {
            return;
        };
        match reply {
            Response::Try(TryReply::Accepted {
                number,
                black,
                white,
            }) => {
                if black as usize == shared::KEY_LENGTH {
                    println!("You cracked the code in {} trials!", number);
                    self.state.finish();
                } else {
                    println!("Trial {}: {} black, {} white.", number, black, white);
                    self.state.advance();
                }
            }
            Response::Try(TryReply::Duplicate) => {
                println!("You already tried that key; it cost you nothing.");
            }
            Response::Try(TryReply::OutOfSync) => {
                println!("The server answered this turn differently; run 'st' to resync.");
            }
            Response::Try(TryReply::NoGame) => {
                println!("The server has no game running for you.");
                self.state.finish();
            }
            Response::Try(TryReply::OutOfTrials { secret }) => {
                println!("Out of trials! The code was {}.", secret.spaced());
                self.state.finish();
            }
            Response::Try(TryReply::OutOfTime { secret }) => {
                println!("Out of time! The code was {}.", secret.spaced());
                self.state.finish();
            }
            Response::Try(TryReply::Error) => println!("The server rejected the guess."),
            other => warn!("unexpected reply {:?}", other),
        }
    }

    async fn quit(&mut self) {
        let Some(plid) = self.state.plid().map(str::to_string) else {
            println!("No game to quit.");
            return;
        };
        let Some(reply) = self.send(Request::Quit { plid }).await else {
            return;
        };
        match reply {
            Response::Quit(QuitReply::Accepted { secret }) => {
                println!("Game over. The code was {}.", secret.spaced());
                self.state.finish();
            }
            Response::Quit(QuitReply::NoGame) => {
                println!("You have no game running.");
                self.state.finish();
            }
            Response::Quit(QuitReply::Error) => println!("The server rejected the request."),
            other => warn!("unexpected reply {:?}", other),
        }
    }

    async fn show_trials(&mut self) {
        let Some(plid) = self.state.plid().map(str::to_string) else {
            println!("Start a game first so the server knows who you are.");
            return;
        };
        let Some(reply) = self.send(Request::ShowTrials { plid }).await else {
            return;
        };
        match reply {
            Response::ShowTrials(ShowTrialsReply::Active(file)) => {
                show_file("Current game", &file);
            }
            Response::ShowTrials(ShowTrialsReply::Finished(file)) => {
                show_file("Last finished game", &file);
            }
            Response::ShowTrials(ShowTrialsReply::NoGame) => {
                println!("Nothing on record for you yet.");
            }
            Response::ShowTrials(ShowTrialsReply::Error) => {
                println!("The server rejected the request.");
            }
            other => warn!("unexpected reply {:?}", other),
        }
    }

    async fn scoreboard(&mut self) {
        let Some(reply) = self.send(Request::Scoreboard).await else {
            return;
        };
        match reply {
            Response::Scoreboard(ScoreboardReply::Ranking(file)) => {
                show_file("Top scores", &file);
            }
            Response::Scoreboard(ScoreboardReply::Empty) => {
                println!("Nobody has won a game yet.");
            }
            Response::Scoreboard(ScoreboardReply::Error) => {
                println!("The server rejected the request.");
            }
            other => warn!("unexpected reply {:?}", other),
        }
    }
}

/// Prints a received file and keeps a copy under its server-given name.
fn show_file(title: &str, file: &FilePayload) {
    println!("--- {} ({}) ---", title, file.name);
    print!("{}", file.data);
    if !file.data.ends_with('\n') {
        println!();
    }
    match fs::write(&file.name, &file.data) {
        Ok(()) => info!("saved {}", file.name),
        Err(e) => warn!("could not save {}: {}", file.name, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> Key {
        Key::parse(s).unwrap()
    }

    #[test]
    fn test_parse_start() {
        assert_eq!(
            parse_action("start 123456 600"),
            Ok(Action::Start {
                plid: "123456".to_string(),
                time: 600,
            })
        );
    }

    #[test]
    fn test_parse_start_validates_locally() {
        assert!(parse_action("start 12345 600").is_err());
        assert!(parse_action("start 123456 0").is_err());
        assert!(parse_action("start 123456 601").is_err());
        assert!(parse_action("start 123456 abc").is_err());
        assert!(parse_action("start 123456").is_err());
    }

    #[test]
    fn test_parse_try_accepts_both_key_forms() {
        assert_eq!(
            parse_action("try R G B Y"),
            Ok(Action::Try { guess: key("RGBY") })
        );
        assert_eq!(
            parse_action("try RGBY"),
            Ok(Action::Try { guess: key("RGBY") })
        );
    }

    #[test]
    fn test_parse_try_rejects_bad_keys() {
        assert!(parse_action("try R G B").is_err());
        assert!(parse_action("try R G B X").is_err());
        assert!(parse_action("try").is_err());
    }

    #[test]
    fn test_parse_debug() {
        assert_eq!(
            parse_action("debug 123456 120 O O P P"),
            Ok(Action::Debug {
                plid: "123456".to_string(),
                time: 120,
                secret: key("OOPP"),
            })
        );
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!(parse_action("st"), Ok(Action::ShowTrials));
        assert_eq!(parse_action("show_trials"), Ok(Action::ShowTrials));
        assert_eq!(parse_action("sb"), Ok(Action::Scoreboard));
        assert_eq!(parse_action("scoreboard"), Ok(Action::Scoreboard));
    }

    #[test]
    fn test_parse_unknown_command() {
        assert!(parse_action("launch").is_err());
    }
}
