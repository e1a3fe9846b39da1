//! Wire codec for the line-oriented game protocol.
//!
//! Every message is a single line: fields separated by exactly one space,
//! terminated by `\n`. The first field is a three-letter identifier that
//! names the command (requests) or the matching reply (responses). The
//! reserved line `ERR\n` may stand in for any response and signals that the
//! peer could not make sense of the request at the protocol level; it is
//! distinct from an `ERR` *status* carried inside a well-formed response.
//!
//! Decoding consumes exactly the declared fields plus the terminating
//! newline. Anything else - an unexpected character, early end of input, a
//! field failing its width or alphabet predicate, trailing garbage - is a
//! [`ProtocolError::Violation`].

use crate::{valid_plid, Key, ProtocolError, MAX_FILENAME, MAX_FILESIZE, MAX_PLAYTIME_DIGITS};

/// Reserved response line for protocol-level rejections.
pub const ERROR_LINE: &str = "ERR\n";
const ERROR_TOKEN: &str = "ERR";

/// The six command pairs, with their wire identifiers and transport
/// binding. This table drives both the codec and the server dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Try,
    Quit,
    Debug,
    ShowTrials,
    Scoreboard,
}

impl Command {
    pub const ALL: [Command; 6] = [
        Command::Start,
        Command::Try,
        Command::Quit,
        Command::Debug,
        Command::ShowTrials,
        Command::Scoreboard,
    ];

    /// Looks a command up by its request identifier (`SNG`, `TRY`, ...).
    pub fn from_request_token(token: &str) -> Option<Command> {
        Command::ALL
            .iter()
            .copied()
            .find(|c| c.request_token() == token)
    }

    pub const fn request_token(self) -> &'static str {
        match self {
            Command::Start => "SNG",
            Command::Try => "TRY",
            Command::Quit => "QUT",
            Command::Debug => "DBG",
            Command::ShowTrials => "STR",
            Command::Scoreboard => "SSB",
        }
    }

    pub const fn response_token(self) -> &'static str {
        match self {
            Command::Start => "RSG",
            Command::Try => "RTR",
            Command::Quit => "RQT",
            Command::Debug => "RDB",
            Command::ShowTrials => "RST",
            Command::Scoreboard => "RSS",
        }
    }

    /// ShowTrials and Scoreboard carry file-sized payloads and therefore
    /// run over TCP; everything else is a single UDP datagram exchange.
    pub const fn is_tcp(self) -> bool {
        matches!(self, Command::ShowTrials | Command::Scoreboard)
    }
}

/// A request as sent by the client, one variant per command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Start { plid: String, time: u32 },
    Try { plid: String, guess: Key, number: u8 },
    Quit { plid: String },
    Debug { plid: String, time: u32, secret: Key },
    ShowTrials { plid: String },
    Scoreboard,
}

impl Request {
    pub fn command(&self) -> Command {
        match self {
            Request::Start { .. } => Command::Start,
            Request::Try { .. } => Command::Try,
            Request::Quit { .. } => Command::Quit,
            Request::Debug { .. } => Command::Debug,
            Request::ShowTrials { .. } => Command::ShowTrials,
            Request::Scoreboard => Command::Scoreboard,
        }
    }

    /// The player this request concerns, if the command names one.
    pub fn plid(&self) -> Option<&str> {
        match self {
            Request::Start { plid, .. }
            | Request::Try { plid, .. }
            | Request::Quit { plid }
            | Request::Debug { plid, .. }
            | Request::ShowTrials { plid } => Some(plid),
            Request::Scoreboard => None,
        }
    }

    pub fn encode(&self) -> String {
        let token = self.command().request_token();
        match self {
            Request::Start { plid, time } => format!("{} {} {}\n", token, plid, time),
            Request::Try {
                plid,
                guess,
                number,
            } => format!("{} {} {} {}\n", token, plid, guess.spaced(), number),
            Request::Quit { plid } | Request::ShowTrials { plid } => {
                format!("{} {}\n", token, plid)
            }
            Request::Debug { plid, time, secret } => {
                format!("{} {} {} {}\n", token, plid, time, secret.spaced())
            }
            Request::Scoreboard => format!("{}\n", token),
        }
    }

    /// Decodes one full request line, identifier included.
    pub fn decode(line: &str) -> Result<Request, ProtocolError> {
        let mut scan = Scanner::new(line);
        let token = scan.word()?;
        let command =
            Command::from_request_token(token).ok_or(ProtocolError::Violation)?;

        let request = match command {
            Command::Start => {
                scan.space()?;
                let plid = scan.plid()?;
                scan.space()?;
                let time = scan.number(MAX_PLAYTIME_DIGITS)?;
                Request::Start { plid, time }
            }
            Command::Try => {
                scan.space()?;
                let plid = scan.plid()?;
                scan.space()?;
                let guess = scan.key()?;
                scan.space()?;
                let number = scan.number(1)? as u8;
                Request::Try {
                    plid,
                    guess,
                    number,
                }
            }
            Command::Quit => {
                scan.space()?;
                let plid = scan.plid()?;
                Request::Quit { plid }
            }
            Command::Debug => {
                scan.space()?;
                let plid = scan.plid()?;
                scan.space()?;
                let time = scan.number(MAX_PLAYTIME_DIGITS)?;
                scan.space()?;
                let secret = scan.key()?;
                Request::Debug { plid, time, secret }
            }
            Command::ShowTrials => {
                scan.space()?;
                let plid = scan.plid()?;
                Request::ShowTrials { plid }
            }
            Command::Scoreboard => Request::Scoreboard,
        };

        scan.end()?;
        Ok(request)
    }
}

/// A file carried inside a ShowTrials or Scoreboard response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePayload {
    pub name: String,
    pub data: String,
}

/// Reply to Start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartReply {
    /// OK - a fresh session was created.
    Accepted,
    /// NOK - the player already has a live session.
    AlreadyPlaying,
    /// ERR - the request was well-formed but unusable.
    Error,
}

/// Reply to Try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryReply {
    /// OK - the guess was scored and recorded.
    Accepted { number: u8, black: u8, white: u8 },
    /// DUP - the guess repeats an earlier trial of this session.
    Duplicate,
    /// INV - the trial number contradicts what was already submitted.
    OutOfSync,
    /// NOK - the player has no active session.
    NoGame,
    /// ENT - the trial cap was reached; the secret is revealed.
    OutOfTrials { secret: Key },
    /// ETM - the session deadline passed; the secret is revealed.
    OutOfTime { secret: Key },
    /// ERR.
    Error,
}

/// Reply to Quit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitReply {
    /// OK - the session was closed and its secret revealed.
    Accepted { secret: Key },
    /// NOK - nothing to quit.
    NoGame,
    /// ERR.
    Error,
}

/// Reply to Debug; same vocabulary as Start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugReply {
    Accepted,
    AlreadyPlaying,
    Error,
}

/// Reply to ShowTrials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShowTrialsReply {
    /// ACT - transcript of the live session.
    Active(FilePayload),
    /// FIN - transcript of the most recently archived session.
    Finished(FilePayload),
    /// NOK - the player has never finished nor started a game.
    NoGame,
    /// ERR.
    Error,
}

/// Reply to Scoreboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScoreboardReply {
    /// OK - the ranked leaderboard file.
    Ranking(FilePayload),
    /// EMPTY - no game has been won yet.
    Empty,
    /// ERR.
    Error,
}

/// A response as sent by the server, one variant per command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Start(StartReply),
    Try(TryReply),
    Quit(QuitReply),
    Debug(DebugReply),
    ShowTrials(ShowTrialsReply),
    Scoreboard(ScoreboardReply),
}

impl Response {
    pub fn command(&self) -> Command {
        match self {
            Response::Start(_) => Command::Start,
            Response::Try(_) => Command::Try,
            Response::Quit(_) => Command::Quit,
            Response::Debug(_) => Command::Debug,
            Response::ShowTrials(_) => Command::ShowTrials,
            Response::Scoreboard(_) => Command::Scoreboard,
        }
    }

    /// The ERR-status response for a command, used when a well-formed
    /// request cannot be served (bad field values, storage faults).
    pub fn error(command: Command) -> Response {
        match command {
            Command::Start => Response::Start(StartReply::Error),
            Command::Try => Response::Try(TryReply::Error),
            Command::Quit => Response::Quit(QuitReply::Error),
            Command::Debug => Response::Debug(DebugReply::Error),
            Command::ShowTrials => Response::ShowTrials(ShowTrialsReply::Error),
            Command::Scoreboard => Response::Scoreboard(ScoreboardReply::Error),
        }
    }

    /// The wire status token, also used for request logging.
    pub fn status(&self) -> &'static str {
        match self {
            Response::Start(StartReply::Accepted) => "OK",
            Response::Start(StartReply::AlreadyPlaying) => "NOK",
            Response::Start(StartReply::Error) => "ERR",
            Response::Try(TryReply::Accepted { .. }) => "OK",
            Response::Try(TryReply::Duplicate) => "DUP",
            Response::Try(TryReply::OutOfSync) => "INV",
            Response::Try(TryReply::NoGame) => "NOK",
            Response::Try(TryReply::OutOfTrials { .. }) => "ENT",
            Response::Try(TryReply::OutOfTime { .. }) => "ETM",
            Response::Try(TryReply::Error) => "ERR",
            Response::Quit(QuitReply::Accepted { .. }) => "OK",
            Response::Quit(QuitReply::NoGame) => "NOK",
            Response::Quit(QuitReply::Error) => "ERR",
            Response::Debug(DebugReply::Accepted) => "OK",
            Response::Debug(DebugReply::AlreadyPlaying) => "NOK",
            Response::Debug(DebugReply::Error) => "ERR",
            Response::ShowTrials(ShowTrialsReply::Active(_)) => "ACT",
            Response::ShowTrials(ShowTrialsReply::Finished(_)) => "FIN",
            Response::ShowTrials(ShowTrialsReply::NoGame) => "NOK",
            Response::ShowTrials(ShowTrialsReply::Error) => "ERR",
            Response::Scoreboard(ScoreboardReply::Ranking(_)) => "OK",
            Response::Scoreboard(ScoreboardReply::Empty) => "EMPTY",
            Response::Scoreboard(ScoreboardReply::Error) => "ERR",
        }
    }

    pub fn encode(&self) -> String {
        let token = self.command().response_token();
        let status = self.status();
        match self {
            Response::Try(TryReply::Accepted {
                number,
                black,
                white,
            }) => format!("{} {} {} {} {}\n", token, status, number, black, white),
            Response::Try(TryReply::OutOfTrials { secret })
            | Response::Try(TryReply::OutOfTime { secret }) => {
                format!("{} {} {}\n", token, status, secret.spaced())
            }
            Response::Quit(QuitReply::Accepted { secret }) => {
                format!("{} {} {}\n", token, status, secret.spaced())
            }
            Response::ShowTrials(ShowTrialsReply::Active(file))
            | Response::ShowTrials(ShowTrialsReply::Finished(file))
            | Response::Scoreboard(ScoreboardReply::Ranking(file)) => format!(
                "{} {} {} {} {}\n",
                token,
                status,
                file.name,
                file.data.len(),
                file.data
            ),
            _ => format!("{} {}\n", token, status),
        }
    }

    /// Decodes the response to a known command. A bare `ERR` line decodes
    /// to [`ProtocolError::Rejected`].
    pub fn decode(command: Command, line: &str) -> Result<Response, ProtocolError> {
        let mut scan = Scanner::new(line);
        let token = scan.word()?;
        if token == ERROR_TOKEN {
            return Err(ProtocolError::Rejected);
        }
        if token != command.response_token() {
            return Err(ProtocolError::Violation);
        }
        scan.space()?;
        let status = scan.word()?.to_string();

        let response = match command {
            Command::Start => Response::Start(match status.as_str() {
                "OK" => StartReply::Accepted,
                "NOK" => StartReply::AlreadyPlaying,
                "ERR" => StartReply::Error,
                _ => return Err(ProtocolError::Violation),
            }),
            Command::Try => Response::Try(match status.as_str() {
                "OK" => {
                    scan.space()?;
                    let number = scan.number(1)? as u8;
                    scan.space()?;
                    let black = scan.number(1)? as u8;
                    scan.space()?;
                    let white = scan.number(1)? as u8;
                    TryReply::Accepted {
                        number,
                        black,
                        white,
                    }
                }
                "DUP" => TryReply::Duplicate,
                "INV" => TryReply::OutOfSync,
                "NOK" => TryReply::NoGame,
                "ENT" => {
                    scan.space()?;
                    TryReply::OutOfTrials {
                        secret: scan.key()?,
                    }
                }
                "ETM" => {
                    scan.space()?;
                    TryReply::OutOfTime {
                        secret: scan.key()?,
                    }
                }
                "ERR" => TryReply::Error,
                _ => return Err(ProtocolError::Violation),
            }),
            Command::Quit => Response::Quit(match status.as_str() {
                "OK" => {
                    scan.space()?;
                    QuitReply::Accepted {
                        secret: scan.key()?,
                    }
                }
                "NOK" => QuitReply::NoGame,
                "ERR" => QuitReply::Error,
                _ => return Err(ProtocolError::Violation),
            }),
            Command::Debug => Response::Debug(match status.as_str() {
                "OK" => DebugReply::Accepted,
                "NOK" => DebugReply::AlreadyPlaying,
                "ERR" => DebugReply::Error,
                _ => return Err(ProtocolError::Violation),
            }),
            Command::ShowTrials => Response::ShowTrials(match status.as_str() {
                "ACT" => ShowTrialsReply::Active(scan.file_payload()?),
                "FIN" => ShowTrialsReply::Finished(scan.file_payload()?),
                "NOK" => ShowTrialsReply::NoGame,
                "ERR" => ShowTrialsReply::Error,
                _ => return Err(ProtocolError::Violation),
            }),
            Command::Scoreboard => Response::Scoreboard(match status.as_str() {
                "OK" => ScoreboardReply::Ranking(scan.file_payload()?),
                "EMPTY" => ScoreboardReply::Empty,
                "ERR" => ScoreboardReply::Error,
                _ => return Err(ProtocolError::Violation),
            }),
        };

        scan.end()?;
        Ok(response)
    }
}

/// Cursor over one message's bytes. All reads enforce the grammar and fail
/// with [`ProtocolError::Violation`] on the first byte out of place.
struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(message: &'a str) -> Scanner<'a> {
        Scanner {
            bytes: message.as_bytes(),
            pos: 0,
        }
    }

    fn next(&mut self) -> Result<u8, ProtocolError> {
        let b = *self.bytes.get(self.pos).ok_or(ProtocolError::Violation)?;
        self.pos += 1;
        Ok(b)
    }

    /// Consumes exactly one field separator.
    fn space(&mut self) -> Result<(), ProtocolError> {
        match self.next()? {
            b' ' => Ok(()),
            _ => Err(ProtocolError::Violation),
        }
    }

    /// Consumes the terminating newline and requires end of input after it.
    fn end(&mut self) -> Result<(), ProtocolError> {
        match self.next()? {
            b'\n' if self.pos == self.bytes.len() => Ok(()),
            _ => Err(ProtocolError::Violation),
        }
    }

    /// Reads a non-empty run of bytes up to (not consuming) the next
    /// separator or the end of input.
    fn word(&mut self) -> Result<&'a str, ProtocolError> {
        let start = self.pos;
        while self.pos < self.bytes.len()
            && self.bytes[self.pos] != b' '
            && self.bytes[self.pos] != b'\n'
        {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(ProtocolError::Violation);
        }
        // Separators are ASCII, so the slice always ends on a char boundary.
        std::str::from_utf8(&self.bytes[start..self.pos]).map_err(|_| ProtocolError::Violation)
    }

    /// Reads a field of 1..=`max_digits` decimal digits.
    fn number(&mut self, max_digits: usize) -> Result<u32, ProtocolError> {
        let word = self.word()?;
        if word.len() > max_digits || !word.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ProtocolError::Violation);
        }
        word.parse().map_err(|_| ProtocolError::Violation)
    }

    /// Reads the fixed-width player identifier.
    fn plid(&mut self) -> Result<String, ProtocolError> {
        let word = self.word()?;
        if !valid_plid(word) {
            return Err(ProtocolError::Violation);
        }
        Ok(word.to_string())
    }

    /// Reads a color key, spaced (`R G B Y`) or compact (`RGBY`).
    fn key(&mut self) -> Result<Key, ProtocolError> {
        let first = self.word()?;
        if first.len() > 1 {
            return Key::parse(first).ok_or(ProtocolError::Violation);
        }
        let mut letters = String::from(first);
        for _ in 1..crate::KEY_LENGTH {
            self.space()?;
            let letter = self.word()?;
            if letter.len() != 1 {
                return Err(ProtocolError::Violation);
            }
            letters.push_str(letter);
        }
        Key::parse(&letters).ok_or(ProtocolError::Violation)
    }

    /// Reads `filename filesize filedata`. The advertised size is validated
    /// against [`MAX_FILESIZE`] before any payload byte is consumed.
    fn file_payload(&mut self) -> Result<FilePayload, ProtocolError> {
        self.space()?;
        let name = self.word()?;
        if name.is_empty()
            || name.len() > MAX_FILENAME
            || !name.bytes().all(|b| b.is_ascii_graphic() && b != b'/')
        {
            return Err(ProtocolError::Violation);
        }
        let name = name.to_string();
        self.space()?;
        let size = self.number(4)? as usize;
        if size > MAX_FILESIZE {
            return Err(ProtocolError::Violation);
        }
        self.space()?;
        let data = self.take(size)?.to_string();
        Ok(FilePayload { name, data })
    }

    /// Consumes exactly `n` raw bytes (file data may contain separators).
    fn take(&mut self, n: usize) -> Result<&'a str, ProtocolError> {
        if self.pos + n > self.bytes.len() {
            return Err(ProtocolError::Violation);
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        std::str::from_utf8(slice).map_err(|_| ProtocolError::Violation)
    }
}
