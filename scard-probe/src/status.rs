//! Native status codes and their classification.

use std::fmt;

use crate::ffi::{self, LONG};

/// How a caller should treat a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusClass {
    Success,
    /// The reader or card does not support the request, or is not ready
    /// for it. Only meaningful for optional queries such as attributes.
    Skip,
    Fatal,
}

// Windows reports an unsupported attribute as SCARD_E_UNEXPECTED or
// ERROR_NOT_SUPPORTED, pcsclite as SCARD_E_UNSUPPORTED_FEATURE.
const SKIP_FAMILY: &[LONG] = &[
    ffi::SCARD_E_UNSUPPORTED_FEATURE,
    ffi::SCARD_E_UNEXPECTED,
    ffi::SCARD_E_NOT_READY,
    ffi::ERROR_NOT_SUPPORTED,
];

/// A raw status value returned by a PC/SC call.
///
/// The numeric value is always kept, including for codes this crate does
/// not know by name.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(LONG);

impl StatusCode {
    pub const SUCCESS: StatusCode = StatusCode(ffi::SCARD_S_SUCCESS);

    pub const fn new(raw: LONG) -> StatusCode {
        StatusCode(raw)
    }

    pub const fn raw(self) -> LONG {
        self.0
    }

    pub fn is_success(self) -> bool {
        self.0 == ffi::SCARD_S_SUCCESS
    }

    pub fn class(self) -> StatusClass {
        if self.is_success() {
            StatusClass::Success
        } else if SKIP_FAMILY.contains(&self.0) {
            StatusClass::Skip
        } else {
            StatusClass::Fatal
        }
    }

    /// `Ok` on success, otherwise the status itself as the error.
    pub fn check(self) -> Result<(), StatusCode> {
        if self.is_success() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// The symbolic name from the PC/SC headers, e.g. `SCARD_E_TIMEOUT`.
    pub fn name(self) -> Option<&'static str> {
        NAMES
            .iter()
            .find(|&&(raw, _)| raw == self.0)
            .map(|&(_, name)| name)
    }
}

impl From<LONG> for StatusCode {
    fn from(raw: LONG) -> StatusCode {
        StatusCode(raw)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name().unwrap_or("UNKNOWN_STATUS");
        write!(f, "{}[0x{:08x}]", name, self.0)
    }
}

impl fmt::Debug for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

macro_rules! status_names {
    ($($name:ident),* $(,)?) => {
        // First match wins; SCARD_E_UNSUPPORTED_FEATURE shares its value
        // with SCARD_E_UNEXPECTED on pcsclite and is listed first.
        const NAMES: &[(LONG, &str)] = &[$((ffi::$name, stringify!($name)),)*];
    };
}

status_names! {
    SCARD_S_SUCCESS,
    SCARD_E_UNSUPPORTED_FEATURE,
    SCARD_F_INTERNAL_ERROR,
    SCARD_E_CANCELLED,
    SCARD_E_INVALID_HANDLE,
    SCARD_E_INVALID_PARAMETER,
    SCARD_E_INVALID_TARGET,
    SCARD_E_NO_MEMORY,
    SCARD_F_WAITED_TOO_LONG,
    SCARD_E_INSUFFICIENT_BUFFER,
    SCARD_E_UNKNOWN_READER,
    SCARD_E_TIMEOUT,
    SCARD_E_SHARING_VIOLATION,
    SCARD_E_NO_SMARTCARD,
    SCARD_E_UNKNOWN_CARD,
    SCARD_E_CANT_DISPOSE,
    SCARD_E_PROTO_MISMATCH,
    SCARD_E_NOT_READY,
    SCARD_E_INVALID_VALUE,
    SCARD_E_SYSTEM_CANCELLED,
    SCARD_F_COMM_ERROR,
    SCARD_F_UNKNOWN_ERROR,
    SCARD_E_INVALID_ATR,
    SCARD_E_NOT_TRANSACTED,
    SCARD_E_READER_UNAVAILABLE,
    SCARD_P_SHUTDOWN,
    SCARD_E_PCI_TOO_SMALL,
    SCARD_E_READER_UNSUPPORTED,
    SCARD_E_DUPLICATE_READER,
    SCARD_E_CARD_UNSUPPORTED,
    SCARD_E_NO_SERVICE,
    SCARD_E_SERVICE_STOPPED,
    SCARD_E_UNEXPECTED,
    SCARD_E_ICC_INSTALLATION,
    SCARD_E_ICC_CREATEORDER,
    SCARD_E_DIR_NOT_FOUND,
    SCARD_E_FILE_NOT_FOUND,
    SCARD_E_NO_DIR,
    SCARD_E_NO_FILE,
    SCARD_E_NO_ACCESS,
    SCARD_E_WRITE_TOO_MANY,
    SCARD_E_BAD_SEEK,
    SCARD_E_INVALID_CHV,
    SCARD_E_UNKNOWN_RES_MNG,
    SCARD_E_NO_SUCH_CERTIFICATE,
    SCARD_E_CERTIFICATE_UNAVAILABLE,
    SCARD_E_NO_READERS_AVAILABLE,
    SCARD_E_COMM_DATA_LOST,
    SCARD_E_NO_KEY_CONTAINER,
    SCARD_E_SERVER_TOO_BUSY,
    SCARD_W_UNSUPPORTED_CARD,
    SCARD_W_UNRESPONSIVE_CARD,
    SCARD_W_UNPOWERED_CARD,
    SCARD_W_RESET_CARD,
    SCARD_W_REMOVED_CARD,
    SCARD_W_SECURITY_VIOLATION,
    SCARD_W_WRONG_CHV,
    SCARD_W_CHV_BLOCKED,
    SCARD_W_EOF,
    SCARD_W_CANCELLED_BY_USER,
    SCARD_W_CARD_NOT_AUTHENTICATED,
    SCARD_W_CACHE_ITEM_NOT_FOUND,
    SCARD_W_CACHE_ITEM_STALE,
    SCARD_W_CACHE_ITEM_TOO_BIG,
    ERROR_NOT_SUPPORTED,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_keeps_name_and_raw_value() {
        let status = StatusCode::new(ffi::SCARD_E_NO_SMARTCARD);
        assert_eq!(status.to_string(), "SCARD_E_NO_SMARTCARD[0x8010000c]");
    }

    #[test]
    fn unknown_codes_are_not_lost() {
        let status = StatusCode::new(0x1234);
        assert_eq!(status.name(), None);
        assert_eq!(status.raw(), 0x1234);
        assert_eq!(status.to_string(), "UNKNOWN_STATUS[0x00001234]");
        assert_eq!(status.class(), StatusClass::Fatal);
    }

    #[test]
    fn classification() {
        assert_eq!(StatusCode::SUCCESS.class(), StatusClass::Success);
        assert!(StatusCode::SUCCESS.check().is_ok());

        for raw in [
            ffi::SCARD_E_UNSUPPORTED_FEATURE,
            ffi::SCARD_E_NOT_READY,
            ffi::ERROR_NOT_SUPPORTED,
        ] {
            assert_eq!(StatusCode::new(raw).class(), StatusClass::Skip);
        }
        for raw in [
            ffi::SCARD_E_NO_SMARTCARD,
            ffi::SCARD_E_TIMEOUT,
            ffi::SCARD_E_INSUFFICIENT_BUFFER,
        ] {
            let status = StatusCode::new(raw);
            assert_eq!(status.class(), StatusClass::Fatal);
            assert_eq!(status.check(), Err(status));
        }
    }
}
