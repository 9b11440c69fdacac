//! The native call surface.
//!
//! [`ReaderApi`] mirrors the PC/SC functions one to one, including their
//! pointer conventions, so that the buffer negotiation in
//! [`negotiate`](crate::negotiate) is exercised exactly as it would be
//! against the system library. [`Native`] forwards to `scard-probe-sys`.

use std::ffi::CStr;
use std::os::raw::{c_char, c_void};
use std::ptr::null;

use crate::ffi::{self, DWORD, LONG, SCARDCONTEXT, SCARDHANDLE};
use crate::watch::ReaderState;

/// The PC/SC functions used by this crate.
///
/// Every method returns the raw status of the call.
pub trait ReaderApi {
    fn establish_context(&self, scope: DWORD, context: &mut SCARDCONTEXT) -> LONG;

    fn release_context(&self, context: SCARDCONTEXT) -> LONG;

    fn is_valid_context(&self, context: SCARDCONTEXT) -> LONG;

    /// `SCardListReaders` over all groups.
    ///
    /// # Safety
    ///
    /// `readers` is null (length query), points to `*len` writable bytes,
    /// or, when `*len == SCARD_AUTOALLOCATE`, points to a `*mut c_char`
    /// that receives a provider allocation.
    unsafe fn list_readers(
        &self,
        context: SCARDCONTEXT,
        readers: *mut c_char,
        len: *mut DWORD,
    ) -> LONG;

    /// # Safety
    ///
    /// `mem` must come from an auto-allocating call on `context` and must
    /// not be freed twice.
    unsafe fn free_memory(&self, context: SCARDCONTEXT, mem: *const c_void) -> LONG;

    fn connect(
        &self,
        context: SCARDCONTEXT,
        reader: &CStr,
        share_mode: DWORD,
        preferred_protocols: DWORD,
        card: &mut SCARDHANDLE,
        active_protocol: &mut DWORD,
    ) -> LONG;

    fn disconnect(&self, card: SCARDHANDLE, disposition: DWORD) -> LONG;

    /// `SCardGetAttrib`.
    ///
    /// # Safety
    ///
    /// Same buffer convention as [`list_readers`](ReaderApi::list_readers).
    unsafe fn get_attrib(
        &self,
        card: SCARDHANDLE,
        attr_id: DWORD,
        attr: *mut u8,
        len: *mut DWORD,
    ) -> LONG;

    fn get_status_change(
        &self,
        context: SCARDCONTEXT,
        timeout_ms: DWORD,
        readers: &mut [ReaderState<'_>],
    ) -> LONG;
}

/// The system PC/SC library.
#[derive(Debug, Clone, Copy, Default)]
pub struct Native;

impl ReaderApi for Native {
    fn establish_context(&self, scope: DWORD, context: &mut SCARDCONTEXT) -> LONG {
        unsafe { ffi::SCardEstablishContext(scope, null(), null(), context) }
    }

    fn release_context(&self, context: SCARDCONTEXT) -> LONG {
        unsafe { ffi::SCardReleaseContext(context) }
    }

    fn is_valid_context(&self, context: SCARDCONTEXT) -> LONG {
        unsafe { ffi::SCardIsValidContext(context) }
    }

    unsafe fn list_readers(
        &self,
        context: SCARDCONTEXT,
        readers: *mut c_char,
        len: *mut DWORD,
    ) -> LONG {
        ffi::SCardListReaders(context, null(), readers, len)
    }

    unsafe fn free_memory(&self, context: SCARDCONTEXT, mem: *const c_void) -> LONG {
        ffi::SCardFreeMemory(context, mem)
    }

    fn connect(
        &self,
        context: SCARDCONTEXT,
        reader: &CStr,
        share_mode: DWORD,
        preferred_protocols: DWORD,
        card: &mut SCARDHANDLE,
        active_protocol: &mut DWORD,
    ) -> LONG {
        unsafe {
            ffi::SCardConnect(
                context,
                reader.as_ptr(),
                share_mode,
                preferred_protocols,
                card,
                active_protocol,
            )
        }
    }

    fn disconnect(&self, card: SCARDHANDLE, disposition: DWORD) -> LONG {
        unsafe { ffi::SCardDisconnect(card, disposition) }
    }

    unsafe fn get_attrib(
        &self,
        card: SCARDHANDLE,
        attr_id: DWORD,
        attr: *mut u8,
        len: *mut DWORD,
    ) -> LONG {
        ffi::SCardGetAttrib(card, attr_id, attr, len)
    }

    fn get_status_change(
        &self,
        context: SCARDCONTEXT,
        timeout_ms: DWORD,
        readers: &mut [ReaderState<'_>],
    ) -> LONG {
        unsafe {
            ffi::SCardGetStatusChange(
                context,
                timeout_ms,
                // ReaderState is repr(transparent) over SCARD_READERSTATE.
                readers.as_mut_ptr() as *mut ffi::SCARD_READERSTATE,
                readers.len() as DWORD,
            )
        }
    }
}
