//! A connection to the card in one reader.

use std::os::raw::c_void;

use tracing::{info, warn};

use crate::api::{Native, ReaderApi};
use crate::attribute::{self, Attribute, AttributeId};
use crate::context::ServiceContext;
use crate::error::Error;
use crate::ffi::{DWORD, LONG, SCARDCONTEXT, SCARDHANDLE};
use crate::multistring::ReaderName;
use crate::negotiate::Source;
use crate::probe::{format_hex, format_text};
use crate::status::{StatusClass, StatusCode};
use crate::Protocol;

// Overwritten by a successful connect; never exposed otherwise.
const DUMMY_HANDLE: SCARDHANDLE = -1i32 as SCARDHANDLE;
const DUMMY_DWORD: DWORD = 0xdead_beef;

/// Lifecycle of a [`CardSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Unconnected,
    Connected,
    Closed,
}

/// Attribute values of one card, in catalog order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeMap {
    entries: Vec<(&'static Attribute, Vec<u8>)>,
}

impl AttributeMap {
    pub fn get(&self, id: AttributeId) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(attribute, _)| attribute.id == id)
            .map(|(_, value)| value.as_slice())
    }

    pub fn get_by_name(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(attribute, _)| attribute.name == name)
            .map(|(_, value)| value.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static Attribute, &[u8])> + '_ {
        self.entries
            .iter()
            .map(|(attribute, value)| (*attribute, value.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, attribute: &'static Attribute, value: Vec<u8>) {
        self.entries.push((attribute, value));
    }
}

/// A session with the card in one reader.
///
/// Wraps `SCARDHANDLE`. The session borrows its [`ServiceContext`], so the
/// card is always disconnected before the context can be released.
///
/// Connecting fails when there is no card in the reader; that leaves the
/// session `Unconnected` and is the common case while enumerating.
pub struct CardSession<'ctx, A: ReaderApi = Native> {
    context: &'ctx ServiceContext<A>,
    reader: ReaderName,
    handle: SCARDHANDLE,
    state: SessionState,
    active_protocol: Option<Protocol>,
}

impl<'ctx, A: ReaderApi> CardSession<'ctx, A> {
    pub fn new(context: &'ctx ServiceContext<A>, reader: ReaderName) -> Self {
        Self {
            context,
            reader,
            handle: DUMMY_HANDLE,
            state: SessionState::Unconnected,
            active_protocol: None,
        }
    }

    /// `new` followed by `connect`.
    pub fn open(context: &'ctx ServiceContext<A>, reader: ReaderName) -> Result<Self, Error> {
        let mut session = Self::new(context, reader);
        session.connect()?;
        Ok(session)
    }

    /// Connect to the card with the context's share mode and preferred
    /// protocols.
    ///
    /// Returns the negotiated protocol; `None` when the service reports
    /// none, as with a direct connection.
    pub fn connect(&mut self) -> Result<Option<Protocol>, Error> {
        if self.state != SessionState::Unconnected {
            return Err(Error::InvalidState {
                expected: SessionState::Unconnected,
                actual: self.state,
            });
        }

        let config = self.context.config();
        let mut handle = DUMMY_HANDLE;
        let mut raw_active_protocol = DUMMY_DWORD;
        let status = StatusCode::new(self.context.api().connect(
            self.context.handle(),
            self.reader.as_c_str(),
            config.share_mode as DWORD,
            config.protocols.bits(),
            &mut handle,
            &mut raw_active_protocol,
        ));
        info!(
            strategy = %self.context.allocation(),
            reader = %self.reader,
            %status,
            "SCardConnect"
        );
        if let Err(status) = status.check() {
            return Err(Error::Connect {
                reader: self.reader.to_string_lossy(),
                status,
            });
        }

        self.handle = handle;
        self.active_protocol = Protocol::from_raw(raw_active_protocol);
        self.state = SessionState::Connected;
        Ok(self.active_protocol)
    }

    /// Fetch every catalog attribute the reader supports.
    ///
    /// Attributes whose length query fails are left out. A fetch that fails
    /// after its length query succeeded ends the whole call with an error.
    ///
    /// Every query is logged once: the value as `[len] {hex} 'text'` on
    /// success, otherwise the status.
    pub fn fetch_attributes(&self) -> Result<AttributeMap, Error> {
        let card = self.connected_handle()?;
        let strategy = self.context.allocation();
        let reader = &self.reader;

        let mut values = AttributeMap::default();
        for attribute in attribute::catalog() {
            let name = attribute.name;
            match self.fetch(card, attribute.id) {
                Ok(value) => {
                    info!(
                        %strategy,
                        %reader,
                        attribute = name,
                        status = %StatusCode::SUCCESS,
                        "[{}] {{{}}} '{}'",
                        value.len(),
                        format_hex(&value),
                        format_text(&value)
                    );
                    values.push(attribute, value);
                }
                Err(Error::SizeQuery(status)) if status.class() == StatusClass::Skip => {
                    info!(%strategy, %reader, attribute = name, %status, "not supported");
                }
                Err(Error::SizeQuery(status)) => {
                    warn!(%strategy, %reader, attribute = name, %status, "SCardGetAttrib");
                }
                Err(err) => {
                    warn!(%strategy, %reader, attribute = name, %err, "SCardGetAttrib");
                    return Err(err);
                }
            }
        }
        Ok(values)
    }

    /// Fetch a single attribute, catalogued or not.
    pub fn fetch_attribute(&self, id: AttributeId) -> Result<Vec<u8>, Error> {
        let card = self.connected_handle()?;
        self.fetch(card, id)
    }

    /// Disconnect from the card using the configured disposition.
    ///
    /// Does nothing unless the session is connected, so it is safe to call
    /// repeatedly or after a failed connect. After a connected session has
    /// been closed it is `Closed` whether or not the disconnect succeeded;
    /// the handle is never disconnected twice.
    ///
    /// `CardSession` implements `Drop`, which disconnects if this was not
    /// called.
    pub fn close(&mut self) -> Result<(), StatusCode> {
        if self.state != SessionState::Connected {
            return Ok(());
        }
        self.state = SessionState::Closed;

        let disposition = self.context.config().disposition;
        let status = StatusCode::new(
            self.context
                .api()
                .disconnect(self.handle, disposition as DWORD),
        );
        info!(
            strategy = %self.context.allocation(),
            reader = %self.reader,
            %status,
            "SCardDisconnect"
        );
        if !status.is_success() {
            warn!(reader = %self.reader, %status, "disconnecting from the card failed");
        }
        status.check()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn reader(&self) -> &ReaderName {
        &self.reader
    }

    /// The protocol negotiated by `connect`, if any.
    pub fn active_protocol(&self) -> Option<Protocol> {
        self.active_protocol
    }

    fn connected_handle(&self) -> Result<SCARDHANDLE, Error> {
        match self.state {
            SessionState::Connected => Ok(self.handle),
            actual => Err(Error::InvalidState {
                expected: SessionState::Connected,
                actual,
            }),
        }
    }

    fn fetch(&self, card: SCARDHANDLE, id: AttributeId) -> Result<Vec<u8>, Error> {
        let source = AttributeQuery {
            api: self.context.api(),
            context: self.context.handle(),
            card,
            id,
        };
        self.context.negotiator().fetch(&source)
    }
}

impl<'ctx, A: ReaderApi> Drop for CardSession<'ctx, A> {
    fn drop(&mut self) {
        // The status is logged by close(); call it manually to handle it.
        let _ = self.close();
    }
}

impl<'ctx, A: ReaderApi> std::fmt::Debug for CardSession<'ctx, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardSession")
            .field("reader", &self.reader)
            .field("state", &self.state)
            .field("active_protocol", &self.active_protocol)
            .finish()
    }
}

struct AttributeQuery<'a, A> {
    api: &'a A,
    context: SCARDCONTEXT,
    card: SCARDHANDLE,
    id: AttributeId,
}

impl<'a, A: ReaderApi> Source for AttributeQuery<'a, A> {
    fn operation(&self) -> &'static str {
        "SCardGetAttrib"
    }

    unsafe fn call(&self, dest: *mut u8, len: *mut DWORD) -> LONG {
        self.api.get_attrib(self.card, self.id.raw() as DWORD, dest, len)
    }

    unsafe fn free(&self, mem: *const c_void) -> LONG {
        self.api.free_memory(self.context, mem)
    }
}
