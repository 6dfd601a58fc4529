//! Client configuration.

use std::time::Duration;

/// Tunables for [`crate::Client::connect`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Address to dial.
    pub target: String,
    /// Timeout for the initial TCP connect.
    pub connect_timeout: Duration,
}

impl ClientConfig {
    /// Builds a config dialing `target` with a 5-second connect timeout.
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self { target: target.into(), connect_timeout: Duration::from_secs(5) }
    }
}
