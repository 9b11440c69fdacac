//! Reader names packed as a multi-string.
//!
//! `SCardListReaders` returns its result as NUL-terminated strings laid
//! end to end, followed by one more NUL:
//!
//! ```text
//! R e a d e r   A \0 R e a d e r   B \0 \0
//! ```
//!
//! An empty list is a single NUL, or nothing at all.

use std::ffi::{CStr, CString};
use std::fmt;

use crate::error::Error;

/// The name of a card reader, owned and guaranteed non-empty.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReaderName(CString);

impl ReaderName {
    pub fn new(name: &str) -> Result<ReaderName, Error> {
        if name.is_empty() {
            return Err(Error::InvalidReaderName);
        }
        CString::new(name)
            .map(ReaderName)
            .map_err(|_| Error::InvalidReaderName)
    }

    pub fn from_c_str(name: &CStr) -> Result<ReaderName, Error> {
        if name.to_bytes().is_empty() {
            return Err(Error::InvalidReaderName);
        }
        Ok(ReaderName(name.to_owned()))
    }

    pub fn as_c_str(&self) -> &CStr {
        &self.0
    }

    /// The name as text; reader names are ASCII in practice.
    pub fn to_string_lossy(&self) -> String {
        self.0.to_string_lossy().into_owned()
    }
}

impl fmt::Display for ReaderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_string_lossy())
    }
}

impl fmt::Debug for ReaderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0.to_string_lossy(), f)
    }
}

/// An iterator over the names in a multi-string buffer.
///
/// The iterator borrows the buffer and never looks past its end. It stops
/// at the terminating empty string; bytes after the last NUL (a buffer that
/// is not properly terminated) are ignored.
#[derive(Clone)]
pub struct ReaderNames<'buf> {
    buf: &'buf [u8],
    pos: usize,
}

impl<'buf> ReaderNames<'buf> {
    pub fn new(buf: &'buf [u8]) -> ReaderNames<'buf> {
        ReaderNames { buf, pos: 0 }
    }
}

impl<'buf> Iterator for ReaderNames<'buf> {
    type Item = &'buf CStr;

    fn next(&mut self) -> Option<&'buf CStr> {
        let rest = &self.buf[self.pos..];
        match rest.iter().position(|&c| c == 0) {
            None | Some(0) => None,
            Some(len) => {
                self.pos += len + 1;
                CStr::from_bytes_with_nul(&rest[..=len]).ok()
            }
        }
    }
}

/// Decode a multi-string into owned reader names.
pub fn decode(buf: &[u8]) -> Vec<ReaderName> {
    ReaderNames::new(buf)
        .filter_map(|name| ReaderName::from_c_str(name).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(buf: &[u8]) -> Vec<String> {
        decode(buf).iter().map(ReaderName::to_string_lossy).collect()
    }

    #[test]
    fn decodes_names_in_order() {
        assert_eq!(
            names(b"Reader A\0Reader B 01 00\0\0"),
            ["Reader A", "Reader B 01 00"]
        );
    }

    #[test]
    fn single_reader_with_terminator() {
        assert_eq!(names(b"Reader A\0\0"), ["Reader A"]);
    }

    #[test]
    fn empty_lists() {
        assert!(names(b"\0").is_empty());
        assert!(names(b"").is_empty());
        assert!(names(b"\0\0\0").is_empty());
    }

    #[test]
    fn stops_at_the_terminator() {
        assert_eq!(names(b"Reader A\0\0stale\0\0"), ["Reader A"]);
    }

    #[test]
    fn unterminated_tail_is_dropped() {
        assert_eq!(names(b"Reader A\0Read"), ["Reader A"]);
        assert!(names(b"Reader A").is_empty());
    }

    #[test]
    fn never_reads_past_the_slice() {
        let backing = b"Reader A\0Reader B\0\0";
        // Cut in the middle of the second name: only the first survives.
        assert_eq!(names(&backing[..12]), ["Reader A"]);
        // Cut right after the first terminator.
        assert_eq!(names(&backing[..9]), ["Reader A"]);
    }

    #[test]
    fn reader_name_validation() {
        assert!(ReaderName::new("").is_err());
        assert!(ReaderName::new("a\0b").is_err());
        assert_eq!(ReaderName::new("Reader A").unwrap().to_string(), "Reader A");
    }
}
