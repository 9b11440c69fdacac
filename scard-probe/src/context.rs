//! The connection to the PC/SC service.

use std::os::raw::{c_char, c_void};

use tracing::{info, warn};

use crate::api::{Native, ReaderApi};
use crate::config::Config;
use crate::error::Error;
use crate::ffi::{self, DWORD, LONG, SCARDCONTEXT};
use crate::multistring::{self, ReaderName};
use crate::negotiate::{Allocation, Negotiator, Source};
use crate::status::StatusCode;

// Overwritten by a successful establish; never exposed otherwise.
const DUMMY_CONTEXT: SCARDCONTEXT = -1i32 as SCARDCONTEXT;

/// A context with the PC/SC service.
///
/// Wraps `SCARDCONTEXT`. The allocation style for every variable-length
/// call made through this context, and through card sessions opened on
/// it, is fixed by [`Config::allocation`] when the context is opened.
pub struct ServiceContext<A: ReaderApi = Native> {
    api: A,
    handle: SCARDCONTEXT,
    config: Config,
    negotiator: &'static dyn Negotiator,
    released: bool,
}

impl<A: ReaderApi> ServiceContext<A> {
    /// Establish a context in the configured scope.
    pub fn open(api: A, config: Config) -> Result<Self, Error> {
        let mut handle = DUMMY_CONTEXT;
        let status = StatusCode::new(api.establish_context(config.scope as DWORD, &mut handle));
        info!(strategy = %config.allocation, %status, "SCardEstablishContext");
        status.check().map_err(Error::Context)?;

        Ok(Self {
            negotiator: config.allocation.negotiator(),
            api,
            handle,
            config,
            released: false,
        })
    }

    /// Whether the service still considers the context valid. Contexts
    /// become invalid when the service restarts.
    pub fn is_valid(&self) -> bool {
        if self.released {
            return false;
        }
        StatusCode::new(self.api.is_valid_context(self.handle)).is_success()
    }

    /// Names of all attached readers, in the order the service lists them.
    ///
    /// An empty list is not an error. Every other failure, in either
    /// phase, is reported as [`Error::ListReaders`].
    pub fn list_readers(&self) -> Result<Vec<ReaderName>, Error> {
        let source = ReaderList {
            api: &self.api,
            context: self.handle,
        };
        let buffer = match self.negotiator.fetch(&source) {
            Ok(buffer) => buffer,
            Err(Error::SizeQuery(status)) if status.raw() == ffi::SCARD_E_NO_READERS_AVAILABLE => {
                info!(strategy = %self.allocation(), %status, "SCardListReaders");
                Vec::new()
            }
            Err(err) => {
                warn!(strategy = %self.allocation(), %err, "SCardListReaders");
                return Err(Error::ListReaders(Box::new(err)));
            }
        };

        let readers = multistring::decode(&buffer);
        info!(
            strategy = %self.allocation(),
            status = %StatusCode::SUCCESS,
            len = buffer.len(),
            count = readers.len(),
            "SCardListReaders"
        );
        Ok(readers)
    }

    /// Release the context.
    ///
    /// Only the first call reaches the service; later calls return `Ok`.
    /// A failure is logged and returned but the context counts as released
    /// either way.
    ///
    /// `ServiceContext` implements `Drop`, which releases the context if
    /// this was not called.
    pub fn close(&mut self) -> Result<(), StatusCode> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let status = StatusCode::new(self.api.release_context(self.handle));
        info!(strategy = %self.allocation(), %status, "SCardReleaseContext");
        if !status.is_success() {
            warn!(strategy = %self.allocation(), %status, "releasing the context failed");
        }
        status.check()
    }

    pub fn allocation(&self) -> Allocation {
        self.negotiator.allocation()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn api(&self) -> &A {
        &self.api
    }

    pub(crate) fn handle(&self) -> SCARDCONTEXT {
        self.handle
    }

    pub(crate) fn negotiator(&self) -> &'static dyn Negotiator {
        self.negotiator
    }
}

impl<A: ReaderApi> Drop for ServiceContext<A> {
    fn drop(&mut self) {
        // The status is logged by close(); call it manually to handle it.
        let _ = self.close();
    }
}

impl<A: ReaderApi> std::fmt::Debug for ServiceContext<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("handle", &self.handle)
            .field("allocation", &self.allocation())
            .field("released", &self.released)
            .finish()
    }
}

struct ReaderList<'a, A> {
    api: &'a A,
    context: SCARDCONTEXT,
}

impl<'a, A: ReaderApi> Source for ReaderList<'a, A> {
    fn operation(&self) -> &'static str {
        "SCardListReaders"
    }

    unsafe fn call(&self, dest: *mut u8, len: *mut DWORD) -> LONG {
        self.api.list_readers(self.context, dest as *mut c_char, len)
    }

    unsafe fn free(&self, mem: *const c_void) -> LONG {
        self.api.free_memory(self.context, mem)
    }
}
