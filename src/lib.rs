//! # distributor
//!
//! Work-distribution client for a distserver broker.
//!
//! Connects to the broker over one TCP stream, completes the `HELLO`
//! handshake, then produces workunits for anonymous remote workers:
//! tracks what is unsent and what is running, and settles completion
//! reports by retiring or requeueing the payload.

pub mod codec;
pub mod config;
pub mod distributor;
pub mod error;
pub mod event;
pub mod model;
pub mod protocol;
pub mod queue;
pub mod resolver;
pub mod session;
pub mod slowsquare;
pub mod telemetry;
pub mod transport;
