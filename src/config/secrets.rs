//! Secret handling utilities.
//!
//! Re-exports the secrecy types used for the broker credential.

pub use secrecy::{ExposeSecret, SecretString};
