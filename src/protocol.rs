//! Line protocol spoken with the broker.
//!
//! Each line is `COMMAND [argument]`. The command is case-insensitive; the
//! remainder of the line is one opaque argument, JSON for the commands that
//! carry an object. Parsing produces a closed [`Inbound`] enum so the state
//! machine can match on it exhaustively.

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::model::{CompletionReport, DispatchOrder, WorkerOffer};

/// Protocol version sent in the `HELLO` reply.
pub const PROTOCOL_VERSION: u32 = 0;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("empty command line")]
    Empty,

    #[error("unknown command {0}")]
    Unknown(String),

    #[error("{0} requires an argument")]
    MissingArgument(&'static str),

    #[error("malformed {command} argument: {source}")]
    MalformedArgument {
        command: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0} received before handshake")]
    BeforeHandshake(&'static str),

    #[error("line received after connection closed")]
    Closed,
}

/// Which of the three report commands settled a workunit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    Finished,
    Failed,
    Rejected,
}

impl ReportKind {
    pub fn command(self) -> &'static str {
        match self {
            ReportKind::Finished => "WORKFINISHED",
            ReportKind::Failed => "WORKFAILED",
            ReportKind::Rejected => "WORKREJECTED",
        }
    }
}

impl std::fmt::Display for ReportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.command())
    }
}

/// A command received from the broker.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Hello,
    NewWorker,
    NoWorkers,
    Ok,
    Worker(WorkerOffer),
    WorkAccepted,
    Report {
        kind: ReportKind,
        report: CompletionReport,
    },
    Err(String),
}

impl Inbound {
    /// Upper-case command name, as it appears on the wire.
    pub fn command(&self) -> &'static str {
        match self {
            Inbound::Hello => "HELLO",
            Inbound::NewWorker => "NEWWORKER",
            Inbound::NoWorkers => "NOWORKERS",
            Inbound::Ok => "OK",
            Inbound::Worker(_) => "WORKER",
            Inbound::WorkAccepted => "WORKACCEPTED",
            Inbound::Report { kind, .. } => kind.command(),
            Inbound::Err(_) => "ERR",
        }
    }

    /// Parse one line (without its terminator).
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim();
        let (command, argument) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, Some(rest.trim()).filter(|a| !a.is_empty())),
            None => (line, None),
        };
        if command.is_empty() {
            return Err(ProtocolError::Empty);
        }

        let inbound = match command.to_ascii_uppercase().as_str() {
            "HELLO" => Inbound::Hello,
            "NEWWORKER" => Inbound::NewWorker,
            "NOWORKERS" => Inbound::NoWorkers,
            "OK" => Inbound::Ok,
            "WORKACCEPTED" => Inbound::WorkAccepted,
            "WORKER" => Inbound::Worker(json_argument("WORKER", argument)?),
            "WORKFINISHED" => report(ReportKind::Finished, argument)?,
            "WORKFAILED" => report(ReportKind::Failed, argument)?,
            "WORKREJECTED" => report(ReportKind::Rejected, argument)?,
            "ERR" => Inbound::Err(argument.unwrap_or_default().to_string()),
            other => return Err(ProtocolError::Unknown(other.to_string())),
        };
        Ok(inbound)
    }
}

fn report(kind: ReportKind, argument: Option<&str>) -> Result<Inbound, ProtocolError> {
    Ok(Inbound::Report {
        kind,
        report: json_argument(kind.command(), argument)?,
    })
}

fn json_argument<T: DeserializeOwned>(
    command: &'static str,
    argument: Option<&str>,
) -> Result<T, ProtocolError> {
    let argument = argument.ok_or(ProtocolError::MissingArgument(command))?;
    serde_json::from_str(argument)
        .map_err(|source| ProtocolError::MalformedArgument { command, source })
}

/// A command sent to the broker.
#[derive(Debug, Clone)]
pub enum Outbound {
    Hello {
        name: String,
        credential: SecretString,
    },
    HaveWork,
    Dispatch(DispatchOrder),
}

impl Outbound {
    pub fn command(&self) -> &'static str {
        match self {
            Outbound::Hello { .. } => "HELLO",
            Outbound::HaveWork => "HAVEWORK",
            Outbound::Dispatch(_) => "DISPATCH",
        }
    }

    /// Render as a single line, without the terminator.
    ///
    /// The `HELLO` line carries the credential in clear; do not log it.
    pub fn to_line(&self) -> serde_json::Result<String> {
        Ok(match self {
            Outbound::Hello { name, credential } => format!(
                "HELLO {PROTOCOL_VERSION} {name} {}",
                credential.expose_secret()
            ),
            Outbound::HaveWork => "HAVEWORK".to_string(),
            Outbound::Dispatch(order) => format!("DISPATCH {}", serde_json::to_string(order)?),
        })
    }
}

impl PartialEq for Outbound {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Outbound::Hello {
                    name: a,
                    credential: ca,
                },
                Outbound::Hello {
                    name: b,
                    credential: cb,
                },
            ) => a == b && ca.expose_secret() == cb.expose_secret(),
            (Outbound::HaveWork, Outbound::HaveWork) => true,
            (Outbound::Dispatch(a), Outbound::Dispatch(b)) => a == b,
            _ => false,
        }
    }
}
