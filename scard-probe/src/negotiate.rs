//! Fetching variable-length values from the provider.
//!
//! `SCardListReaders` and `SCardGetAttrib` share one buffer convention:
//!
//! - null destination: the call only reports the required length;
//! - a destination of `*len` bytes: the call fills it and updates `*len`;
//! - `*len == SCARD_AUTOALLOCATE`: the destination is really a
//!   `*mut *mut u8` and the provider stores a fresh allocation there,
//!   which must be given back with `SCardFreeMemory` on the same context.
//!
//! A [`Negotiator`] drives one of the two allocating styles over a
//! [`Source`]; both return the value as an owned `Vec<u8>`.

use std::fmt;
use std::mem::forget;
use std::os::raw::c_void;
use std::ptr::null_mut;
use std::slice;

use tracing::{debug, warn};

use crate::error::Error;
use crate::ffi::{self, DWORD, LONG};
use crate::status::StatusCode;

/// Which side allocates result buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Allocation {
    /// Length query, then a fetch into a buffer we allocate.
    CallerManaged,
    /// One call with `SCARD_AUTOALLOCATE`; the provider allocates.
    ProviderManaged,
}

impl Allocation {
    pub(crate) fn negotiator(self) -> &'static dyn Negotiator {
        match self {
            Allocation::CallerManaged => &CallerManaged,
            Allocation::ProviderManaged => &ProviderManaged,
        }
    }
}

impl Default for Allocation {
    fn default() -> Allocation {
        Allocation::CallerManaged
    }
}

impl fmt::Display for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Allocation::CallerManaged => "caller-managed",
            Allocation::ProviderManaged => "provider-managed",
        })
    }
}

/// One variable-length value behind the PC/SC buffer convention.
pub(crate) trait Source {
    /// Name of the native call, for diagnostics.
    fn operation(&self) -> &'static str;

    /// Perform the call.
    ///
    /// # Safety
    ///
    /// `dest` and `len` follow the convention described in the module docs.
    unsafe fn call(&self, dest: *mut u8, len: *mut DWORD) -> LONG;

    /// Give a provider allocation back to the owning context.
    ///
    /// # Safety
    ///
    /// `mem` must come from `call` in auto-allocate mode and not have been
    /// freed yet.
    unsafe fn free(&self, mem: *const c_void) -> LONG;
}

pub(crate) trait Negotiator: fmt::Debug + Sync {
    fn allocation(&self) -> Allocation;

    /// Fetch the whole value.
    ///
    /// A failing first call is reported as [`Error::SizeQuery`]; a failing
    /// fill after a successful length query as [`Error::Fetch`].
    fn fetch(&self, source: &dyn Source) -> Result<Vec<u8>, Error>;
}

#[derive(Debug)]
pub(crate) struct CallerManaged;

impl Negotiator for CallerManaged {
    fn allocation(&self) -> Allocation {
        Allocation::CallerManaged
    }

    fn fetch(&self, source: &dyn Source) -> Result<Vec<u8>, Error> {
        let mut len: DWORD = 0;
        let status = StatusCode::new(unsafe { source.call(null_mut(), &mut len) });
        debug!(operation = source.operation(), phase = 1, %status, len, "size query");
        status.check().map_err(Error::SizeQuery)?;

        let required = len as usize;
        if required == 0 {
            return Ok(Vec::new());
        }

        let mut buffer = vec![0u8; required];
        let mut filled = len;
        let status = StatusCode::new(unsafe { source.call(buffer.as_mut_ptr(), &mut filled) });
        debug!(operation = source.operation(), phase = 2, %status, len = filled, "fetch");
        status
            .check()
            .map_err(|status| Error::Fetch { status, required })?;

        let reported = filled as usize;
        if reported > required {
            return Err(Error::Overrun { required, reported });
        }
        buffer.truncate(reported);
        Ok(buffer)
    }
}

#[derive(Debug)]
pub(crate) struct ProviderManaged;

impl Negotiator for ProviderManaged {
    fn allocation(&self) -> Allocation {
        Allocation::ProviderManaged
    }

    fn fetch(&self, source: &dyn Source) -> Result<Vec<u8>, Error> {
        let mut mem: *mut u8 = null_mut();
        let mut len: DWORD = ffi::SCARD_AUTOALLOCATE;
        let status = StatusCode::new(unsafe {
            source.call(&mut mem as *mut *mut u8 as *mut u8, &mut len)
        });
        debug!(operation = source.operation(), %status, len, "auto-allocating fetch");
        status.check().map_err(Error::SizeQuery)?;

        if mem.is_null() {
            return match len {
                0 => Ok(Vec::new()),
                reported => Err(Error::Overrun {
                    required: 0,
                    reported: reported as usize,
                }),
            };
        }

        let allocation = ProviderBuffer { source, mem };
        let value = unsafe { slice::from_raw_parts(allocation.mem, len as usize) }.to_vec();
        if let Err(status) = allocation.release() {
            warn!(operation = source.operation(), %status, "SCardFreeMemory failed");
        }
        Ok(value)
    }
}

/// A provider allocation awaiting `SCardFreeMemory`.
///
/// `release` frees it and reports the status; dropping it without
/// releasing (on unwind) frees it and ignores the status.
struct ProviderBuffer<'s> {
    source: &'s dyn Source,
    mem: *mut u8,
}

impl<'s> ProviderBuffer<'s> {
    fn release(self) -> Result<(), StatusCode> {
        let status = StatusCode::new(unsafe { self.source.free(self.mem as *const c_void) });
        // Already freed; skip the drop.
        forget(self);
        status.check()
    }
}

impl<'s> Drop for ProviderBuffer<'s> {
    fn drop(&mut self) {
        let _status = unsafe { self.source.free(self.mem as *const c_void) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    /// A value behind the buffer convention, with scripted failures.
    #[derive(Default)]
    struct Value {
        data: Vec<u8>,
        query_status: LONG,
        fill_status: LONG,
        /// Added to the length reported by the fill call.
        overreport: DWORD,
        /// Auto-allocating calls succeed without handing out memory.
        null_allocation: bool,
        free_status: LONG,
        calls: Cell<usize>,
        free_calls: Cell<usize>,
        live: RefCell<HashMap<usize, Box<[u8]>>>,
        freed: Cell<usize>,
    }

    impl Value {
        fn new(data: &[u8]) -> Value {
            Value {
                data: data.to_vec(),
                ..Value::default()
            }
        }
    }

    impl Source for Value {
        fn operation(&self) -> &'static str {
            "test"
        }

        unsafe fn call(&self, dest: *mut u8, len: *mut DWORD) -> LONG {
            self.calls.set(self.calls.get() + 1);
            if *len == ffi::SCARD_AUTOALLOCATE {
                if self.query_status != ffi::SCARD_S_SUCCESS {
                    return self.query_status;
                }
                if self.null_allocation || self.data.is_empty() {
                    *(dest as *mut *mut u8) = null_mut();
                    *len = self.data.len() as DWORD;
                    return ffi::SCARD_S_SUCCESS;
                }
                let mut boxed = self.data.clone().into_boxed_slice();
                let ptr = boxed.as_mut_ptr();
                self.live.borrow_mut().insert(ptr as usize, boxed);
                *(dest as *mut *mut u8) = ptr;
                *len = self.data.len() as DWORD;
                return ffi::SCARD_S_SUCCESS;
            }
            if dest.is_null() {
                *len = self.data.len() as DWORD;
                return self.query_status;
            }
            if self.fill_status != ffi::SCARD_S_SUCCESS {
                return self.fill_status;
            }
            if (*len as usize) < self.data.len() {
                return ffi::SCARD_E_INSUFFICIENT_BUFFER;
            }
            std::ptr::copy_nonoverlapping(self.data.as_ptr(), dest, self.data.len());
            *len = self.data.len() as DWORD + self.overreport;
            ffi::SCARD_S_SUCCESS
        }

        unsafe fn free(&self, mem: *const c_void) -> LONG {
            self.free_calls.set(self.free_calls.get() + 1);
            if self.free_status != ffi::SCARD_S_SUCCESS {
                return self.free_status;
            }
            match self.live.borrow_mut().remove(&(mem as usize)) {
                Some(_) => {
                    self.freed.set(self.freed.get() + 1);
                    ffi::SCARD_S_SUCCESS
                }
                None => ffi::SCARD_E_INVALID_VALUE,
            }
        }
    }

    #[test]
    fn strategies_agree() {
        for data in [&b"ACME READER "[..], &[0x3b, 0x8f, 0x80, 0x01][..], &[0u8; 300][..]] {
            let caller = CallerManaged.fetch(&Value::new(data)).unwrap();
            let provider = ProviderManaged.fetch(&Value::new(data)).unwrap();
            assert_eq!(caller, data);
            assert_eq!(provider, caller);
        }
    }

    #[test]
    fn caller_managed_takes_two_calls() {
        let value = Value::new(b"ACME READER ");
        assert_eq!(CallerManaged.fetch(&value).unwrap(), b"ACME READER ");
        assert_eq!(value.calls.get(), 2);
    }

    #[test]
    fn zero_length_skips_the_fill() {
        for allocation in [Allocation::CallerManaged, Allocation::ProviderManaged] {
            let value = Value::new(b"");
            assert_eq!(allocation.negotiator().fetch(&value).unwrap(), Vec::<u8>::new());
            assert_eq!(value.calls.get(), 1);
            assert_eq!(value.free_calls.get(), 0);
        }
    }

    #[test]
    fn null_allocation_with_a_length_is_an_overrun() {
        let value = Value {
            null_allocation: true,
            ..Value::new(b"ACME")
        };
        assert_eq!(
            ProviderManaged.fetch(&value).unwrap_err(),
            Error::Overrun { required: 0, reported: 4 }
        );
        assert_eq!(value.free_calls.get(), 0);
    }

    #[test]
    fn failed_free_keeps_the_value() {
        let value = Value {
            free_status: ffi::SCARD_E_INVALID_HANDLE,
            ..Value::new(b"ACME READER ")
        };
        assert_eq!(ProviderManaged.fetch(&value).unwrap(), b"ACME READER ");
        // Attempted once, not again on drop.
        assert_eq!(value.free_calls.get(), 1);
        assert_eq!(value.freed.get(), 0);
    }

    #[test]
    fn provider_allocation_is_freed_once() {
        let value = Value::new(b"ACME READER ");
        assert_eq!(ProviderManaged.fetch(&value).unwrap(), b"ACME READER ");
        assert_eq!(value.calls.get(), 1);
        assert_eq!(value.freed.get(), 1);
        assert!(value.live.borrow().is_empty());
    }

    #[test]
    fn first_phase_failure_is_a_size_query_error() {
        let unsupported = StatusCode::new(ffi::SCARD_E_UNSUPPORTED_FEATURE);
        for negotiator in [Allocation::CallerManaged, Allocation::ProviderManaged] {
            let value = Value {
                query_status: unsupported.raw(),
                ..Value::new(b"x")
            };
            let err = negotiator.negotiator().fetch(&value).unwrap_err();
            assert_eq!(err, Error::SizeQuery(unsupported));
            assert_eq!(value.calls.get(), 1);
            assert_eq!(value.freed.get(), 0);
        }
    }

    #[test]
    fn second_phase_failure_is_fatal() {
        let value = Value {
            fill_status: ffi::SCARD_W_REMOVED_CARD,
            ..Value::new(b"ACME")
        };
        let err = CallerManaged.fetch(&value).unwrap_err();
        assert_eq!(
            err,
            Error::Fetch {
                status: StatusCode::new(ffi::SCARD_W_REMOVED_CARD),
                required: 4,
            }
        );
    }

    #[test]
    fn overreported_length_is_rejected() {
        let value = Value {
            overreport: 3,
            ..Value::new(b"ACME")
        };
        assert_eq!(
            CallerManaged.fetch(&value).unwrap_err(),
            Error::Overrun { required: 4, reported: 7 }
        );
    }

    #[test]
    fn allocation_selects_its_negotiator() {
        for allocation in [Allocation::CallerManaged, Allocation::ProviderManaged] {
            assert_eq!(allocation.negotiator().allocation(), allocation);
        }
        assert_eq!(Allocation::default(), Allocation::CallerManaged);
        assert_eq!(Allocation::ProviderManaged.to_string(), "provider-managed");
    }
}
