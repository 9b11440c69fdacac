//! Diagnostic client for the PC/SC smart card API.
//!
//! PC/SC (Personal Computer/Smart Card) is the standard API for talking to
//! card readers. This crate does not send any commands to card
//! applications; it exercises the resource-management side of the API
//! and reports what the readers say about themselves:
//!
//! - establish a [`ServiceContext`] and check that it is still valid,
//! - list the attached readers (a packed multi-string, see
//!   [`multistring`]),
//! - open a [`CardSession`] to the card in each reader and fetch every
//!   attribute in the [`attribute`] catalog,
//! - optionally wait for reader state changes with a [`StatusWatcher`].
//!
//! ## Buffer allocation
//!
//! The variable-length calls (`SCardListReaders`, `SCardGetAttrib`) can be
//! driven in two ways, chosen once per context with [`Allocation`]:
//!
//! - [`Allocation::CallerManaged`]: query the length with a null buffer,
//!   allocate exactly that, then call again to fill it.
//! - [`Allocation::ProviderManaged`]: pass `SCARD_AUTOALLOCATE` and let the
//!   provider allocate; the memory is handed back with `SCardFreeMemory`
//!   on the same context before the call returns.
//!
//! Both yield the same bytes; running [`probe`] once with each is the
//! point of the `scard-probe` binary.
//!
//! ## Teardown
//!
//! Contexts and card sessions have an explicit `close()` which reports the
//! native status, and a `Drop` fallback which swallows it. A session
//! borrows its context, so a card is always disconnected before its
//! context is released.
//!
//! ## Platforms
//!
//! - Windows: `WinSCard.dll` (ANSI entry points).
//! - macOS: the PCSC framework.
//! - Linux, BSDs: pcsclite and the pcscd daemon.
//!
//! All native calls go through the [`ReaderApi`] trait; [`Native`] is the
//! implementation backed by the system library.

use bitflags::bitflags;
use scard_probe_sys as ffi;

use ffi::DWORD;

pub mod api;
pub mod attribute;
pub mod card;
pub mod config;
pub mod context;
pub mod error;
pub mod multistring;
pub mod negotiate;
pub mod probe;
pub mod status;
pub mod watch;

pub use crate::api::{Native, ReaderApi};
pub use crate::attribute::{Attribute, AttributeClass, AttributeId};
pub use crate::card::{AttributeMap, CardSession, SessionState};
pub use crate::config::{Config, PollConfig};
pub use crate::context::ServiceContext;
pub use crate::error::{Error, Severity};
pub use crate::multistring::{ReaderName, ReaderNames};
pub use crate::negotiate::Allocation;
pub use crate::probe::{probe, ProbeReport, ReaderOutcome, ReaderReport};
pub use crate::status::{StatusClass, StatusCode};
pub use crate::watch::{ReaderState, StatusWatcher};

bitflags! {
    /// A mask of the state of a card reader.
    pub struct State: DWORD {
        const UNAWARE = ffi::SCARD_STATE_UNAWARE;
        const IGNORE = ffi::SCARD_STATE_IGNORE;
        const CHANGED = ffi::SCARD_STATE_CHANGED;
        const UNKNOWN = ffi::SCARD_STATE_UNKNOWN;
        const UNAVAILABLE = ffi::SCARD_STATE_UNAVAILABLE;
        const EMPTY = ffi::SCARD_STATE_EMPTY;
        const PRESENT = ffi::SCARD_STATE_PRESENT;
        const ATRMATCH = ffi::SCARD_STATE_ATRMATCH;
        const EXCLUSIVE = ffi::SCARD_STATE_EXCLUSIVE;
        const INUSE = ffi::SCARD_STATE_INUSE;
        const MUTE = ffi::SCARD_STATE_MUTE;
        const UNPOWERED = ffi::SCARD_STATE_UNPOWERED;
    }
}

bitflags! {
    /// A mask of acceptable communication protocols.
    pub struct Protocols: DWORD {
        const UNDEFINED = ffi::SCARD_PROTOCOL_UNDEFINED;
        const T0 = ffi::SCARD_PROTOCOL_T0;
        const T1 = ffi::SCARD_PROTOCOL_T1;
        const RAW = ffi::SCARD_PROTOCOL_RAW;
        const ANY = ffi::SCARD_PROTOCOL_ANY;
    }
}

/// Scope of a context.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    User = ffi::SCARD_SCOPE_USER as u32,
    Terminal = ffi::SCARD_SCOPE_TERMINAL as u32,
    System = ffi::SCARD_SCOPE_SYSTEM as u32,
}

/// How a reader connection is shared.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShareMode {
    Exclusive = ffi::SCARD_SHARE_EXCLUSIVE as u32,
    Shared = ffi::SCARD_SHARE_SHARED as u32,
    Direct = ffi::SCARD_SHARE_DIRECT as u32,
}

/// The protocol negotiated on connect.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    T0 = ffi::SCARD_PROTOCOL_T0 as u32,
    T1 = ffi::SCARD_PROTOCOL_T1 as u32,
    Raw = ffi::SCARD_PROTOCOL_RAW as u32,
}

impl Protocol {
    /// `None` for `SCARD_PROTOCOL_UNDEFINED`, which is what a direct
    /// connection to a reader without a card reports.
    pub(crate) fn from_raw(raw: DWORD) -> Option<Protocol> {
        match raw {
            ffi::SCARD_PROTOCOL_T0 => Some(Protocol::T0),
            ffi::SCARD_PROTOCOL_T1 => Some(Protocol::T1),
            ffi::SCARD_PROTOCOL_RAW => Some(Protocol::Raw),
            _ => None,
        }
    }
}

/// What to do with the card when disconnecting.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    LeaveCard = ffi::SCARD_LEAVE_CARD as u32,
    ResetCard = ffi::SCARD_RESET_CARD as u32,
    UnpowerCard = ffi::SCARD_UNPOWER_CARD as u32,
    EjectCard = ffi::SCARD_EJECT_CARD as u32,
}
