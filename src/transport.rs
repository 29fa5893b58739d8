//! Transport framer: newline-terminated lines over a byte stream.
//!
//! Wire format: one command per line, terminated by `\n` (a preceding `\r`
//! is tolerated). Partial lines are buffered until their terminator
//! arrives. The framer owns the stream; nothing else touches raw bytes.

use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, trace};

use crate::error::{Error, Result};

/// Longest line accepted from the broker (1 MB).
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Default bound on how long a single write may take.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub struct Framer<T> {
    framed: Framed<T, LinesCodec>,
    send_timeout: Duration,
}

impl Framer<TcpStream> {
    /// Open a TCP connection to the broker.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        if host.is_empty() || port == 0 {
            return Err(Error::Config(format!("invalid broker address {host}:{port}")));
        }
        let stream = TcpStream::connect((host, port)).await.map_err(|e| {
            Error::Transport(format!("cannot connect to {host}:{port}: {e}"))
        })?;
        stream.set_nodelay(true)?;
        debug!(host, port, "connected to broker");
        Ok(Self::new(stream))
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> Framer<T> {
    /// Wrap an already-connected stream.
    pub fn new(io: T) -> Self {
        Self {
            framed: Framed::new(io, LinesCodec::new_with_max_length(MAX_LINE_LENGTH)),
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Write one line; the terminator is appended here.
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        if line.contains('\n') {
            return Err(Error::Other("outgoing line contains a newline".to_string()));
        }
        tokio::time::timeout(self.send_timeout, self.framed.send(line))
            .await
            .map_err(|_| {
                Error::Transport(format!("write timed out after {:?}", self.send_timeout))
            })??;
        Ok(())
    }

    /// Next complete line, in arrival order. `None` once the peer closes.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        match self.framed.next().await {
            Some(Ok(line)) => {
                trace!(len = line.len(), "line received");
                Ok(Some(line))
            }
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }
}
