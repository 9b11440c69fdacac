//! Probe configuration.

use std::env;
use std::time::Duration;

use tracing::warn;

use crate::negotiate::Allocation;
use crate::{Disposition, Protocols, Scope, ShareMode};

/// Environment variable enabling the status-change poll: number of waits.
pub const POLL_ITERATIONS_ENV: &str = "SCARD_PROBE_POLL_ITERATIONS";
/// Environment variable with the per-wait timeout in milliseconds.
pub const POLL_TIMEOUT_ENV: &str = "SCARD_PROBE_POLL_TIMEOUT_MS";

const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(1000);

/// Parameters of the status-change poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Upper bound on each wait.
    pub timeout: Duration,
    /// Number of sequential waits.
    pub iterations: u32,
}

impl PollConfig {
    pub const fn new(timeout: Duration, iterations: u32) -> Self {
        Self { timeout, iterations }
    }
}

/// How contexts and card sessions are opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub scope: Scope,
    pub share_mode: ShareMode,
    pub protocols: Protocols,
    pub disposition: Disposition,
    pub allocation: Allocation,
    /// Poll the readers for state changes after the attribute dump.
    pub poll: Option<PollConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scope: Scope::System,
            share_mode: ShareMode::Shared,
            protocols: Protocols::ANY,
            disposition: Disposition::LeaveCard,
            allocation: Allocation::CallerManaged,
            poll: None,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, with the poll taken from `SCARD_PROBE_POLL_ITERATIONS`
    /// and `SCARD_PROBE_POLL_TIMEOUT_MS`. Unparsable values are ignored.
    pub fn from_env() -> Self {
        let iterations = env::var(POLL_ITERATIONS_ENV).ok();
        let timeout = env::var(POLL_TIMEOUT_ENV).ok();
        Self::default().with_poll(parse_poll(iterations.as_deref(), timeout.as_deref()))
    }

    pub const fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub const fn with_share_mode(mut self, share_mode: ShareMode) -> Self {
        self.share_mode = share_mode;
        self
    }

    pub const fn with_protocols(mut self, protocols: Protocols) -> Self {
        self.protocols = protocols;
        self
    }

    pub const fn with_disposition(mut self, disposition: Disposition) -> Self {
        self.disposition = disposition;
        self
    }

    pub const fn with_allocation(mut self, allocation: Allocation) -> Self {
        self.allocation = allocation;
        self
    }

    pub const fn with_poll(mut self, poll: Option<PollConfig>) -> Self {
        self.poll = poll;
        self
    }
}

fn parse_poll(iterations: Option<&str>, timeout_ms: Option<&str>) -> Option<PollConfig> {
    let iterations = match iterations?.trim().parse::<u32>() {
        Ok(0) => return None,
        Ok(iterations) => iterations,
        Err(err) => {
            warn!(%err, "ignoring {}", POLL_ITERATIONS_ENV);
            return None;
        }
    };

    let timeout = match timeout_ms.map(|raw| raw.trim().parse::<u64>()) {
        None => DEFAULT_POLL_TIMEOUT,
        Some(Ok(ms)) => Duration::from_millis(ms),
        Some(Err(err)) => {
            warn!(%err, "ignoring {}", POLL_TIMEOUT_ENV);
            DEFAULT_POLL_TIMEOUT
        }
    };

    Some(PollConfig::new(timeout, iterations))
}
