//! Error type for the probe.

use crate::card::SessionState;
use crate::status::{StatusClass, StatusCode};

/// How far an error reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Nothing more can be done with this context.
    Enumeration,
    /// Only the current reader (or attribute) is lost.
    Unit,
    /// The value is simply not available.
    Skip,
}

/// Errors reported by contexts, card sessions and the negotiators.
///
/// Whenever a native call failed, the variant carries its [`StatusCode`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("establishing the PC/SC context failed: {0}")]
    Context(StatusCode),

    /// Any failure of the reader list other than an empty one.
    #[error("listing readers failed: {0}")]
    ListReaders(Box<Error>),

    #[error("connecting to {reader:?} failed: {status}")]
    Connect { reader: String, status: StatusCode },

    /// The length query (or the single auto-allocating call) failed.
    #[error("size query failed: {0}")]
    SizeQuery(StatusCode),

    /// The fetch failed even though the length query succeeded.
    #[error("fetching {required} bytes failed after a successful size query: {status}")]
    Fetch { status: StatusCode, required: usize },

    /// The provider reported more data than the buffer it was given.
    #[error("provider reported {reported} bytes for a {required} byte buffer")]
    Overrun { required: usize, reported: usize },

    #[error("card session is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: SessionState,
        actual: SessionState,
    },

    #[error("waiting for a status change failed: {0}")]
    StatusChange(StatusCode),

    #[error("reader name is empty or contains a NUL byte")]
    InvalidReaderName,
}

impl Error {
    /// The native status behind the error, if a native call failed.
    pub fn status(&self) -> Option<StatusCode> {
        match *self {
            Error::ListReaders(ref cause) => cause.status(),
            Error::Context(status)
            | Error::SizeQuery(status)
            | Error::StatusChange(status)
            | Error::Connect { status, .. }
            | Error::Fetch { status, .. } => Some(status),
            Error::Overrun { .. } | Error::InvalidState { .. } | Error::InvalidReaderName => None,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Error::Context(_) | Error::ListReaders(_) => Severity::Enumeration,
            Error::SizeQuery(status) if status.class() == StatusClass::Skip => Severity::Skip,
            _ => Severity::Unit,
        }
    }
}
