//! Routes one inbound message to its command handler.
//!
//! The leading three-letter token selects the command from the shared
//! protocol table; anything unknown, empty or mis-sized gets the bare
//! `ERR` line without touching a handler. A known command whose remaining
//! fields fail the grammar is answered with that command's ERR status,
//! since the identifier itself was understood.
//!
//! Same-player requests are serialized through a per-player lock map: a
//! re-sent Try racing a fresh Quit must observe the store one at a time.
//! Requests for different players never contend.

use crate::session::GameService;
use log::{debug, warn};
use shared::protocol::{Command, Request, Response, ERROR_LINE};
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use tokio::sync::Mutex;

/// One lock per player ID, created on first use.
struct PlayerLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PlayerLocks {
    fn new() -> PlayerLocks {
        PlayerLocks {
            inner: Mutex::new(HashMap::new()),
        }
    }

    async fn acquire(&self, plid: &str) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().await;
        Arc::clone(map.entry(plid.to_string()).or_default())
    }
}

/// Classifies inbound messages and runs them through the game service,
/// enforcing the per-command transport binding.
pub struct Dispatcher {
    service: GameService,
    locks: PlayerLocks,
}

impl Dispatcher {
    pub fn new(service: GameService) -> Dispatcher {
        Dispatcher {
            service,
            locks: PlayerLocks::new(),
        }
    }

    /// Handles one UDP datagram, returning the encoded reply.
    pub async fn handle_udp(&self, message: &str) -> String {
        self.handle(message, false).await
    }

    /// Handles one TCP request line, returning the encoded reply.
    pub async fn handle_tcp(&self, message: &str) -> String {
        self.handle(message, true).await
    }

    /// Force-expires every live session; called once at shutdown.
    pub fn shutdown(&self) -> io::Result<usize> {
        self.service.expire_all_active()
    }

    async fn handle(&self, message: &str, via_tcp: bool) -> String {
        let token: &str = message
            .split(|c: char| c == ' ' || c == '\n')
            .next()
            .unwrap_or("");
        let Some(command) = Command::from_request_token(token) else {
            warn!("unknown command token {:?}", token);
            return ERROR_LINE.to_string();
        };
        if command.is_tcp() != via_tcp {
            warn!(
                "{} arrived over {}, dropping",
                token,
                if via_tcp { "TCP" } else { "UDP" }
            );
            return ERROR_LINE.to_string();
        }

        let request = match Request::decode(message) {
            Ok(request) => request,
            Err(_) => {
                warn!("malformed {} request", token);
                return Response::error(command).encode();
            }
        };

        let response = match request.plid() {
            Some(plid) => {
                let lock = self.locks.acquire(plid).await;
                let _serialized = lock.lock().await;
                self.service.handle(&request)
            }
            None => self.service.handle(&request),
        };

        debug!(
            "{} {} -> {}",
            request.plid().unwrap_or("-"),
            token,
            response.status()
        );
        response.encode()
    }
}
