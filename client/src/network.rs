//! Client transport: bounded-retry UDP exchanges and one-shot TCP
//! exchanges, picked per command from the protocol table.
//!
//! A UDP retry is a full re-send of the identical request - the server's
//! duplicate-trial handling makes that safe. TCP requests are sent once,
//! under hard read/write deadlines, because their file-sized responses do
//! not fit a datagram.

use log::warn;
use shared::protocol::{Request, Response};
use shared::{
    ProtocolError, TCP_READ_TIMEOUT_SECS, TCP_WRITE_TIMEOUT_SECS, UDP_RETRIES, UDP_TIMEOUT_SECS,
};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;

/// Everything that can go wrong between sending a request and decoding
/// its response.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Every UDP attempt timed out.
    #[error("no response from the server after {0} attempts")]
    Unresponsive(u32),
    #[error("network error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// One game server, addressed over both transports.
pub struct Connection {
    udp_server: SocketAddr,
    tcp_server: SocketAddr,
}

impl Connection {
    pub fn new(udp_server: SocketAddr, tcp_server: SocketAddr) -> Connection {
        Connection {
            udp_server,
            tcp_server,
        }
    }

    /// Sends one request over the transport its command is bound to and
    /// decodes the matching response.
    pub async fn exchange(&self, request: &Request) -> Result<Response, ClientError> {
        if request.command().is_tcp() {
            self.exchange_tcp(request).await
        } else {
            self.exchange_udp(request).await
        }
    }

    async fn exchange_udp(&self, request: &Request) -> Result<Response, ClientError> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let payload = request.encode();
        let mut buffer = [0u8; 2048];

        for attempt in 1..=UDP_RETRIES {
            socket.send_to(payload.as_bytes(), self.udp_server).await?;

            match timeout(
                Duration::from_secs(UDP_TIMEOUT_SECS),
                socket.recv_from(&mut buffer),
            )
            .await
            {
                Ok(Ok((len, peer))) => {
                    if peer != self.udp_server {
                        warn!("dropping stray datagram from {}", peer);
                        continue;
                    }
                    let text = std::str::from_utf8(&buffer[..len])
                        .map_err(|_| ProtocolError::Violation)?;
                    return Ok(Response::decode(request.command(), text)?);
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    warn!("attempt {}/{} timed out, re-sending", attempt, UDP_RETRIES);
                }
            }
        }

        Err(ClientError::Unresponsive(UDP_RETRIES))
    }

    async fn exchange_tcp(&self, request: &Request) -> Result<Response, ClientError> {
        let mut stream = TcpStream::connect(self.tcp_server).await?;

        timeout(
            Duration::from_secs(TCP_WRITE_TIMEOUT_SECS),
            stream.write_all(request.encode().as_bytes()),
        )
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "request write deadline exceeded"))??;

        // The server closes the connection after one response; read it all.
        let mut raw = Vec::new();
        timeout(
            Duration::from_secs(TCP_READ_TIMEOUT_SECS),
            stream.read_to_end(&mut raw),
        )
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "response read deadline exceeded"))??;

        let text = String::from_utf8(raw).map_err(|_| ProtocolError::Violation)?;
        Ok(Response::decode(request.command(), &text)?)
    }
}
