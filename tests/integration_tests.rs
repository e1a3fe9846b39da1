//! Integration tests for the game protocol end to end.
//!
//! Each test spins up a real server on ephemeral ports over a scratch data
//! directory and talks to it through the client's transport, exactly as
//! the two binaries would.

use client::network::Connection;
use server::dispatcher::Dispatcher;
use server::network::Server;
use server::secret::RandomSecrets;
use server::session::GameService;
use server::store::SessionStore;
use shared::protocol::{
    QuitReply, Request, Response, ScoreboardReply, ShowTrialsReply, StartReply, TryReply,
};
use shared::Key;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::UdpSocket;
use tokio::sync::watch;

struct TestServer {
    connection: Connection,
    udp_addr: std::net::SocketAddr,
    shutdown: watch::Sender<bool>,
    _data_dir: TempDir,
}

/// Boots a full server (store, rules, dispatcher, both listeners) on
/// 127.0.0.1 with ephemeral ports.
async fn spawn_server() -> TestServer {
    let data_dir = TempDir::new().unwrap();
    let store = SessionStore::open(data_dir.path()).unwrap();
    let service = GameService::new(store, Box::new(RandomSecrets));
    let dispatcher = Arc::new(Dispatcher::new(service));

    let server = Server::bind("127.0.0.1:0", dispatcher).await.unwrap();
    let udp_addr = server.udp_addr().unwrap();
    let tcp_addr = server.tcp_addr().unwrap();

    let (shutdown, signal) = watch::channel(false);
    tokio::spawn(server.run(signal));

    TestServer {
        connection: Connection::new(udp_addr, tcp_addr),
        udp_addr,
        shutdown,
        _data_dir: data_dir,
    }
}

fn key(s: &str) -> Key {
    Key::parse(s).unwrap()
}

fn start(plid: &str, time: u32) -> Request {
    Request::Start {
        plid: plid.to_string(),
        time,
    }
}

fn debug(plid: &str, time: u32, secret: &str) -> Request {
    Request::Debug {
        plid: plid.to_string(),
        time,
        secret: key(secret),
    }
}

fn try_guess(plid: &str, guess: &str, number: u8) -> Request {
    Request::Try {
        plid: plid.to_string(),
        guess: key(guess),
        number,
    }
}

/// GAME FLOW SCENARIOS
mod game_flow {
    use super::*;

    #[tokio::test]
    async fn start_then_perfect_guess() {
        let server = spawn_server().await;

        // Start against a known secret, then guess it first try.
        let reply = server
            .connection
            .exchange(&debug("123456", 600, "RGBY"))
            .await
            .unwrap();
        assert_eq!(reply, Response::Debug(shared::protocol::DebugReply::Accepted));

        let reply = server
            .connection
            .exchange(&try_guess("123456", "RGBY", 1))
            .await
            .unwrap();
        assert_eq!(
            reply,
            Response::Try(TryReply::Accepted {
                number: 1,
                black: 4,
                white: 0,
            })
        );

        server.shutdown.send(true).unwrap();
    }

    #[tokio::test]
    async fn second_start_is_rejected_while_playing() {
        let server = spawn_server().await;

        let first = server.connection.exchange(&start("123456", 600)).await.unwrap();
        assert_eq!(first, Response::Start(StartReply::Accepted));

        let second = server.connection.exchange(&start("123456", 600)).await.unwrap();
        assert_eq!(second, Response::Start(StartReply::AlreadyPlaying));

        server.shutdown.send(true).unwrap();
    }

    #[tokio::test]
    async fn repeated_key_is_a_duplicate() {
        let server = spawn_server().await;
        server
            .connection
            .exchange(&debug("123456", 600, "RGBY"))
            .await
            .unwrap();

        let first = server
            .connection
            .exchange(&try_guess("123456", "GGBB", 1))
            .await
            .unwrap();
        assert!(matches!(
            first,
            Response::Try(TryReply::Accepted { number: 1, .. })
        ));

        // The same key under the next number burns no turn.
        let replay = server
            .connection
            .exchange(&try_guess("123456", "GGBB", 2))
            .await
            .unwrap();
        assert_eq!(replay, Response::Try(TryReply::Duplicate));

        server.shutdown.send(true).unwrap();
    }

    #[tokio::test]
    async fn eighth_miss_loses_and_reveals_secret() {
        let server = spawn_server().await;
        server
            .connection
            .exchange(&debug("123456", 600, "RGBY"))
            .await
            .unwrap();

        let misses = ["RRRR", "GGGG", "BBBB", "YYYY", "OOOO", "PPPP", "RGBO"];
        for (i, guess) in misses.iter().enumerate() {
            let reply = server
                .connection
                .exchange(&try_guess("123456", guess, (i + 1) as u8))
                .await
                .unwrap();
            assert!(matches!(reply, Response::Try(TryReply::Accepted { .. })));
        }

        let last = server
            .connection
            .exchange(&try_guess("123456", "RGBP", 8))
            .await
            .unwrap();
        assert_eq!(
            last,
            Response::Try(TryReply::OutOfTrials {
                secret: key("RGBY"),
            })
        );

        // The session is gone.
        let after = server
            .connection
            .exchange(&try_guess("123456", "OOPP", 1))
            .await
            .unwrap();
        assert_eq!(after, Response::Try(TryReply::NoGame));

        server.shutdown.send(true).unwrap();
    }

    #[tokio::test]
    async fn quit_without_game_is_nok() {
        let server = spawn_server().await;

        let reply = server
            .connection
            .exchange(&Request::Quit {
                plid: "999999".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(reply, Response::Quit(QuitReply::NoGame));

        server.shutdown.send(true).unwrap();
    }

    #[tokio::test]
    async fn overdue_try_times_the_session_out() {
        let server = spawn_server().await;
        server
            .connection
            .exchange(&debug("123456", 1, "RGBY"))
            .await
            .unwrap();

        // Let the one-second limit lapse.
        tokio::time::sleep(Duration::from_millis(1300)).await;

        let reply = server
            .connection
            .exchange(&try_guess("123456", "GGBB", 1))
            .await
            .unwrap();
        assert_eq!(
            reply,
            Response::Try(TryReply::OutOfTime {
                secret: key("RGBY"),
            })
        );

        server.shutdown.send(true).unwrap();
    }

    #[tokio::test]
    async fn resent_trial_is_answered_identically() {
        let server = spawn_server().await;
        server
            .connection
            .exchange(&debug("123456", 600, "RGBY"))
            .await
            .unwrap();

        let first = server
            .connection
            .exchange(&try_guess("123456", "GGBB", 1))
            .await
            .unwrap();
        let again = server
            .connection
            .exchange(&try_guess("123456", "GGBB", 1))
            .await
            .unwrap();
        assert_eq!(first, again);

        // And the turn counter did not move: trial 2 is still next.
        let next = server
            .connection
            .exchange(&try_guess("123456", "RGBY", 2))
            .await
            .unwrap();
        assert!(matches!(
            next,
            Response::Try(TryReply::Accepted {
                number: 2,
                black: 4,
                white: 0,
            })
        ));

        server.shutdown.send(true).unwrap();
    }
}

/// FILE-CARRYING COMMAND SCENARIOS (TCP)
mod file_commands {
    use super::*;

    #[tokio::test]
    async fn scoreboard_is_empty_before_any_win() {
        let server = spawn_server().await;

        let reply = server.connection.exchange(&Request::Scoreboard).await.unwrap();
        assert_eq!(reply, Response::Scoreboard(ScoreboardReply::Empty));

        server.shutdown.send(true).unwrap();
    }

    #[tokio::test]
    async fn scoreboard_lists_winners_best_first() {
        let server = spawn_server().await;

        // A two-trial win and a one-trial win.
        server
            .connection
            .exchange(&debug("111111", 600, "RGBY"))
            .await
            .unwrap();
        server
            .connection
            .exchange(&try_guess("111111", "GGBB", 1))
            .await
            .unwrap();
        server
            .connection
            .exchange(&try_guess("111111", "RGBY", 2))
            .await
            .unwrap();

        server
            .connection
            .exchange(&debug("222222", 600, "OOPP"))
            .await
            .unwrap();
        server
            .connection
            .exchange(&try_guess("222222", "OOPP", 1))
            .await
            .unwrap();

        let reply = server.connection.exchange(&Request::Scoreboard).await.unwrap();
        let Response::Scoreboard(ScoreboardReply::Ranking(file)) = reply else {
            panic!("expected a ranking, got {:?}", reply);
        };
        assert!(file.data.len() <= shared::MAX_FILESIZE);
        let first_rank = file.data.lines().nth(1).unwrap();
        assert!(first_rank.contains("222222"), "got {:?}", file.data);

        server.shutdown.send(true).unwrap();
    }

    #[tokio::test]
    async fn show_trials_tracks_the_session_lifecycle() {
        let server = spawn_server().await;

        // Nothing on record yet.
        let reply = server
            .connection
            .exchange(&Request::ShowTrials {
                plid: "123456".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(reply, Response::ShowTrials(ShowTrialsReply::NoGame));

        // A live game produces an ACT transcript...
        server
            .connection
            .exchange(&debug("123456", 600, "RGBY"))
            .await
            .unwrap();
        server
            .connection
            .exchange(&try_guess("123456", "GGBB", 1))
            .await
            .unwrap();

        let reply = server
            .connection
            .exchange(&Request::ShowTrials {
                plid: "123456".to_string(),
            })
            .await
            .unwrap();
        let Response::ShowTrials(ShowTrialsReply::Active(file)) = reply else {
            panic!("expected an active transcript, got {:?}", reply);
        };
        assert_eq!(file.name, "STATE_123456.txt");
        assert!(file.data.contains("GGBB"));

        // ...and after quitting, the archived record comes back as FIN.
        server
            .connection
            .exchange(&Request::Quit {
                plid: "123456".to_string(),
            })
            .await
            .unwrap();

        let reply = server
            .connection
            .exchange(&Request::ShowTrials {
                plid: "123456".to_string(),
            })
            .await
            .unwrap();
        let Response::ShowTrials(ShowTrialsReply::Finished(file)) = reply else {
            panic!("expected a finished transcript, got {:?}", reply);
        };
        assert!(file.name.ends_with("_Q.txt"));
        assert!(file.data.contains("T: GGBB"));

        server.shutdown.send(true).unwrap();
    }
}

/// RAW WIRE BEHAVIOR
mod wire {
    use super::*;

    async fn raw_udp_exchange(server: &TestServer, message: &[u8]) -> Vec<u8> {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        socket.send_to(message, server.udp_addr).await.unwrap();
        let mut buffer = [0u8; 256];
        let (len, _) = socket.recv_from(&mut buffer).await.unwrap();
        buffer[..len].to_vec()
    }

    #[tokio::test]
    async fn unknown_commands_get_the_bare_error_line() {
        let server = spawn_server().await;

        assert_eq!(raw_udp_exchange(&server, b"XYZ 123456\n").await, b"ERR\n");
        assert_eq!(raw_udp_exchange(&server, b"\n").await, b"ERR\n");

        server.shutdown.send(true).unwrap();
    }

    #[tokio::test]
    async fn tcp_commands_are_refused_on_udp() {
        let server = spawn_server().await;

        assert_eq!(raw_udp_exchange(&server, b"SSB\n").await, b"ERR\n");

        server.shutdown.send(true).unwrap();
    }

    #[tokio::test]
    async fn malformed_fields_get_the_err_status() {
        let server = spawn_server().await;

        // Known identifier, broken fields: a well-formed ERR response.
        assert_eq!(
            raw_udp_exchange(&server, b"SNG 12345 600\n").await,
            b"RSG ERR\n"
        );
        assert_eq!(
            raw_udp_exchange(&server, b"TRY 123456 R G B X 1\n").await,
            b"RTR ERR\n"
        );

        server.shutdown.send(true).unwrap();
    }

    #[tokio::test]
    async fn out_of_range_duration_is_an_application_error() {
        let server = spawn_server().await;

        // Grammar-valid (three digits) but over the 600s cap.
        assert_eq!(
            raw_udp_exchange(&server, b"SNG 123456 999\n").await,
            b"RSG ERR\n"
        );

        server.shutdown.send(true).unwrap();
    }
}
