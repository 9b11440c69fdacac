//! One full diagnostic pass over a context.
//!
//! Open a context, list the readers, and for each reader connect, dump the
//! attributes and disconnect. Optionally poll the readers afterwards. A
//! reader without a card, or one whose attribute fetch breaks down, is
//! reported and skipped; only failing to open the context or to list the
//! readers ends the pass early.

use tracing::{info, warn};

use crate::api::ReaderApi;
use crate::card::{AttributeMap, CardSession, SessionState};
use crate::config::Config;
use crate::context::ServiceContext;
use crate::error::Error;
use crate::multistring::ReaderName;
use crate::negotiate::Allocation;
use crate::status::StatusCode;
use crate::watch::StatusWatcher;

/// What happened on one reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderOutcome {
    Attributes(AttributeMap),
    /// Connecting or fetching failed; the rest of the pass went on.
    Failed(Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderReport {
    pub reader: ReaderName,
    pub outcome: ReaderOutcome,
    /// Status of the disconnect, if the session got connected.
    pub disconnect: Option<Result<(), StatusCode>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub allocation: Allocation,
    /// Whether the context was still valid after being established. An
    /// invalid context is released without listing readers.
    pub valid: bool,
    pub readers: Vec<ReaderReport>,
    /// Result of the status-change poll, if one was configured.
    pub poll: Option<bool>,
    pub release: Result<(), StatusCode>,
}

/// Run one pass with the given API and configuration.
///
/// Returns an error only when the context cannot be established or the
/// reader list cannot be read. The context is released in every case.
pub fn probe<A: ReaderApi>(api: A, config: Config) -> Result<ProbeReport, Error> {
    let allocation = config.allocation;
    let mut context = ServiceContext::open(api, config)?;

    let valid = context.is_valid();
    let outcome = if valid {
        enumerate(&context)
    } else {
        warn!(strategy = %allocation, "context is not valid; skipping enumeration");
        Ok((Vec::new(), None))
    };
    let release = context.close();
    let (readers, poll) = outcome?;

    Ok(ProbeReport {
        allocation,
        valid,
        readers,
        poll,
        release,
    })
}

fn enumerate<A: ReaderApi>(
    context: &ServiceContext<A>,
) -> Result<(Vec<ReaderReport>, Option<bool>), Error> {
    let names = context.list_readers()?;
    let readers = names
        .iter()
        .map(|name| {
            info!(strategy = %context.allocation(), reader = %name, "reader");
            probe_reader(context, name.clone())
        })
        .collect();

    let poll = context.config().poll.map(|poll| {
        let mut watcher = StatusWatcher::new(context);
        let succeeded = watcher.poll(&names, poll.timeout, poll.iterations);
        info!(strategy = %context.allocation(), succeeded, "status poll finished");
        succeeded
    });

    Ok((readers, poll))
}

fn probe_reader<A: ReaderApi>(context: &ServiceContext<A>, reader: ReaderName) -> ReaderReport {
    let mut session = CardSession::new(context, reader.clone());
    let outcome = session.connect().and_then(|_| session.fetch_attributes());
    let disconnect = match session.state() {
        SessionState::Connected => Some(session.close()),
        SessionState::Unconnected | SessionState::Closed => None,
    };

    let outcome = match outcome {
        Ok(values) => ReaderOutcome::Attributes(values),
        Err(err) => {
            warn!(
                strategy = %context.allocation(),
                reader = %reader,
                %err,
                "skipping reader"
            );
            ReaderOutcome::Failed(err)
        }
    };

    ReaderReport {
        reader,
        outcome,
        disconnect,
    }
}

/// `0x`-prefixed upper-case hex of the value.
pub fn format_hex(value: &[u8]) -> String {
    format!("0x{}", hex::encode_upper(value))
}

/// The value as text up to the first NUL, with non-UTF-8 bytes replaced.
pub fn format_text(value: &[u8]) -> String {
    let end = value.iter().position(|&b| b == 0).unwrap_or(value.len());
    String::from_utf8_lossy(&value[..end]).into_owned()
}
