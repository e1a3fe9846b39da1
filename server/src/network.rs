//! Server transport layer: the UDP datagram loop and the TCP accept loop.
//!
//! UDP requests are processed one datagram at a time, with no connection
//! state. Each accepted TCP connection gets its own task that reads exactly
//! one request line, writes one response and closes; read and write are
//! bounded by deadlines so a stalled peer cannot hold a worker forever.
//! Both loops watch the same shutdown signal, and once they stop the
//! dispatcher sweeps every still-active session into the archive.

use crate::dispatcher::Dispatcher;
use log::{debug, error, info, warn};
use shared::protocol::ERROR_LINE;
use shared::{TCP_READ_TIMEOUT_SECS, TCP_WRITE_TIMEOUT_SECS};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::watch;
use tokio::time::timeout;

/// Longest request line either transport will buffer.
const REQUEST_LIMIT: usize = 128;

/// The two listeners plus the dispatcher they feed.
pub struct Server {
    udp: Arc<UdpSocket>,
    tcp: TcpListener,
    dispatcher: Arc<Dispatcher>,
}

impl Server {
    /// Binds both listeners on `addr` (same port, two protocols).
    pub async fn bind(addr: &str, dispatcher: Arc<Dispatcher>) -> io::Result<Server> {
        let udp = Arc::new(UdpSocket::bind(addr).await?);
        let tcp = TcpListener::bind(addr).await?;
        Ok(Server {
            udp,
            tcp,
            dispatcher,
        })
    }

    pub fn udp_addr(&self) -> io::Result<SocketAddr> {
        self.udp.local_addr()
    }

    pub fn tcp_addr(&self) -> io::Result<SocketAddr> {
        self.tcp.local_addr()
    }

    /// Runs both accept loops until `shutdown` flips, then archives every
    /// session that is still running.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> io::Result<()> {
        let udp_handle = {
            let socket = Arc::clone(&self.udp);
            let dispatcher = Arc::clone(&self.dispatcher);
            let shutdown = shutdown.clone();
            tokio::spawn(udp_loop(socket, dispatcher, shutdown))
        };
        let tcp_handle = {
            let dispatcher = Arc::clone(&self.dispatcher);
            tokio::spawn(tcp_loop(self.tcp, dispatcher, shutdown))
        };

        let _ = udp_handle.await;
        let _ = tcp_handle.await;

        match self.dispatcher.shutdown() {
            Ok(count) if count > 0 => info!("expired {} unfinished sessions", count),
            Ok(_) => {}
            Err(e) => error!("failed to expire remaining sessions: {}", e),
        }
        Ok(())
    }
}

/// Reads datagrams until shutdown; every datagram is one request.
async fn udp_loop(
    socket: Arc<UdpSocket>,
    dispatcher: Arc<Dispatcher>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut buffer = [0u8; REQUEST_LIMIT];

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("UDP listener stopping");
                break;
            }
            result = socket.recv_from(&mut buffer) => match result {
                Ok((len, peer)) => {
                    let reply = match std::str::from_utf8(&buffer[..len]) {
                        Ok(message) => dispatcher.handle_udp(message).await,
                        Err(_) => {
                            warn!("non-text datagram from {}", peer);
                            ERROR_LINE.to_string()
                        }
                    };
                    if let Err(e) = socket.send_to(reply.as_bytes(), peer).await {
                        error!("failed to reply to {}: {}", peer, e);
                    }
                }
                Err(e) => {
                    error!("error receiving datagram: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
}

/// Accepts connections until shutdown; one task per connection.
async fn tcp_loop(
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("TCP listener stopping");
                break;
            }
            result = listener.accept() => match result {
                Ok((stream, peer)) => {
                    let dispatcher = Arc::clone(&dispatcher);
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(stream, dispatcher).await {
                            warn!("connection from {} failed: {}", peer, e);
                        }
                    });
                }
                Err(e) => {
                    error!("error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
}

/// One request, one response, close.
async fn serve_connection(mut stream: TcpStream, dispatcher: Arc<Dispatcher>) -> io::Result<()> {
    let request = timeout(
        Duration::from_secs(TCP_READ_TIMEOUT_SECS),
        read_request_line(&mut stream),
    )
    .await
    .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "request read deadline exceeded"))??;

    let reply = dispatcher.handle_tcp(&request).await;
    debug!("TCP reply of {} bytes", reply.len());

    timeout(
        Duration::from_secs(TCP_WRITE_TIMEOUT_SECS),
        stream.write_all(reply.as_bytes()),
    )
    .await
    .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "response write deadline exceeded"))??;

    stream.shutdown().await
}

/// Reads up to the first newline. Request lines are tiny; anything that
/// overruns the buffer is not a valid command anyway.
async fn read_request_line(stream: &mut TcpStream) -> io::Result<String> {
    let mut buffer = [0u8; REQUEST_LIMIT];
    let mut filled = 0;

    loop {
        if filled == buffer.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "request line too long",
            ));
        }
        let read = stream.read(&mut buffer[filled..]).await?;
        if read == 0 {
            break;
        }
        filled += read;
        if buffer[..filled].contains(&b'\n') {
            break;
        }
    }

    String::from_utf8(buffer[..filled].to_vec())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "request is not text"))
}
