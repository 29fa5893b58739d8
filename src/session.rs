//! Session loop: drives a [`Distributor`] from a [`Framer`].
//!
//! One task owns both the stream and the state machine, so lines are
//! handled strictly one at a time and nothing else mutates the queues.

use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Notify;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::distributor::Distributor;
use crate::error::{Error, Result};
use crate::queue::WorkSource;
use crate::transport::Framer;

/// Handle used to stop a running session from another task.
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<Notify>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the session to stop after the line it is handling.
    pub fn trigger(&self) {
        self.0.notify_one();
    }

    async fn wait(&self) {
        self.0.notified().await;
    }
}

pub struct Session<S: WorkSource, T> {
    distributor: Distributor<S>,
    framer: Framer<T>,
    shutdown: Shutdown,
}

impl<S: WorkSource, T: AsyncRead + AsyncWrite + Unpin> Session<S, T> {
    pub fn new(distributor: Distributor<S>, framer: Framer<T>) -> Self {
        Self {
            distributor,
            framer,
            shutdown: Shutdown::new(),
        }
    }

    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn distributor(&self) -> &Distributor<S> {
        &self.distributor
    }

    /// Run until shutdown (`Ok`) or a fatal error.
    ///
    /// Connection loss and protocol errors are returned as `Err`; the
    /// distributor is left in the closed state either way.
    pub async fn run(&mut self) -> Result<()> {
        self.distributor.connected();
        info!(name = %self.distributor.settings().name, "session started, awaiting handshake");

        let result = self.run_loop().await;
        match &result {
            Ok(()) => self.distributor.close("shutdown requested"),
            Err(e) => self.distributor.close(&e.to_string()),
        }
        let running = self.distributor.queue().running();
        if !running.is_empty() {
            let mut ids: Vec<_> = running.keys().map(|id| id.as_str()).collect();
            ids.sort_unstable();
            warn!(count = ids.len(), ids = ?ids, "workunits still running at close");
        }
        result
    }

    async fn run_loop(&mut self) -> Result<()> {
        loop {
            let line = tokio::select! {
                _ = self.shutdown.wait() => {
                    info!("session shutting down");
                    return Ok(());
                }
                line = self.framer.next_line() => line?,
            };

            let Some(line) = line else {
                return Err(Error::Transport("connection closed by broker".to_string()));
            };

            let command = line.split_whitespace().next().unwrap_or_default();
            self.handle(&line)
                .instrument(info_span!("broker.line", command = %command))
                .await?;
        }
    }

    /// Feed one line to the state machine and write out its replies.
    async fn handle(&mut self, line: &str) -> Result<()> {
        for command in self.distributor.handle_line(line)? {
            debug!(command = command.command(), "sending");
            self.framer.send_line(&command.to_line()?).await?;
        }
        Ok(())
    }
}
