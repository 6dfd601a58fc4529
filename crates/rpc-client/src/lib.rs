//! A minimal synchronous TCP client for the RPC transport.
//!
//! Exercises all four call shapes over a single blocking connection.
//! Intended for `rpc-server`'s integration tests and for standalone use
//! against any server speaking the same wire format; it has no schema layer
//! of its own, so bodies are opaque byte strings in and out.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod error;

pub use client::Client;
pub use config::ClientConfig;
pub use error::ClientError;
