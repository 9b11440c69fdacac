//! Waiting for reader state changes.

use std::ffi::CStr;
use std::marker::PhantomData;
use std::ptr::null_mut;
use std::time::Duration;

use tracing::{debug, info};

use crate::api::{Native, ReaderApi};
use crate::context::ServiceContext;
use crate::ffi::{self, DWORD};
use crate::multistring::ReaderName;
use crate::status::StatusCode;
use crate::State;

/// The tracked state of one reader.
///
/// Wraps `SCARD_READERSTATE`, borrowing the reader name for the duration
/// of a poll.
#[repr(transparent)]
pub struct ReaderState<'a> {
    // Must stay directly castable to SCARD_READERSTATE.
    inner: ffi::SCARD_READERSTATE,
    _name: PhantomData<&'a CStr>,
}

impl<'a> ReaderState<'a> {
    pub fn new(name: &'a CStr, current_state: State) -> ReaderState<'a> {
        ReaderState {
            inner: ffi::SCARD_READERSTATE {
                szReader: name.as_ptr(),
                pvUserData: null_mut(),
                dwCurrentState: current_state.bits(),
                dwEventState: State::UNAWARE.bits(),
                cbAtr: 0,
                rgbAtr: [0; ffi::ATR_BUFFER_SIZE],
            },
            _name: PhantomData,
        }
    }

    pub fn name(&self) -> &'a CStr {
        // The pointer was taken from a &'a CStr in new().
        unsafe { CStr::from_ptr(self.inner.szReader) }
    }

    pub fn current_state(&self) -> State {
        State::from_bits_truncate(self.inner.dwCurrentState)
    }

    /// The state reported by the last wait.
    pub fn event_state(&self) -> State {
        State::from_bits_truncate(self.inner.dwEventState)
    }

    /// Number of card insertions and removals seen by the reader, kept in
    /// the upper 16 bits of the event state.
    pub fn event_count(&self) -> u32 {
        ((self.inner.dwEventState & 0xFFFF_0000) >> 16) as u32
    }

    /// Store a new event state, as the service does during a wait.
    pub fn set_event_state(&mut self, raw: DWORD) {
        self.inner.dwEventState = raw;
    }

    /// Make the last reported state the one the next wait compares against.
    pub fn sync_current_state(&mut self) {
        // The event count is kept, otherwise Windows keeps reporting a change.
        self.inner.dwCurrentState = self.inner.dwEventState;
    }
}

/// Polls a set of readers for state changes.
pub struct StatusWatcher<'ctx, A: ReaderApi = Native> {
    context: &'ctx ServiceContext<A>,
    last_states: Vec<(ReaderName, State)>,
}

impl<'ctx, A: ReaderApi> StatusWatcher<'ctx, A> {
    pub fn new(context: &'ctx ServiceContext<A>) -> Self {
        Self {
            context,
            last_states: Vec::new(),
        }
    }

    /// Wait for state changes `iterations` times, each wait bounded by
    /// `timeout` (`None` waits forever).
    ///
    /// Returns `true` if every wait succeeded. The first failing wait ends
    /// the poll with `false`; a timeout with no change counts as a failure.
    /// With no readers there is nothing to wait for and the result is
    /// `true`.
    pub fn poll<D>(&mut self, readers: &[ReaderName], timeout: D, iterations: u32) -> bool
    where
        D: Into<Option<Duration>>,
    {
        self.last_states.clear();
        if readers.is_empty() {
            return true;
        }

        let timeout_ms = timeout_to_ms(timeout.into());
        let mut states: Vec<ReaderState<'_>> = readers
            .iter()
            .map(|reader| ReaderState::new(reader.as_c_str(), State::UNAWARE))
            .collect();

        let mut succeeded = true;
        for iteration in 1..=iterations {
            let status = StatusCode::new(self.context.api().get_status_change(
                self.context.handle(),
                timeout_ms,
                &mut states,
            ));
            info!(
                strategy = %self.context.allocation(),
                iteration,
                %status,
                "SCardGetStatusChange"
            );
            if !status.is_success() {
                succeeded = false;
                break;
            }

            for state in &mut states {
                debug!(
                    reader = ?state.name(),
                    state = ?state.event_state(),
                    events = state.event_count(),
                    "reader state"
                );
                state.sync_current_state();
            }
        }

        self.last_states = readers
            .iter()
            .cloned()
            .zip(states.iter().map(ReaderState::event_state))
            .collect();
        succeeded
    }

    /// Reader states as of the end of the last poll.
    pub fn last_states(&self) -> &[(ReaderName, State)] {
        &self.last_states
    }
}

fn timeout_to_ms(timeout: Option<Duration>) -> DWORD {
    match timeout {
        Some(duration) => {
            let ms = duration
                .as_secs()
                .saturating_mul(1000)
                .saturating_add(u64::from(duration.subsec_millis()));
            // INFINITE itself would mean no timeout at all.
            std::cmp::min(u64::from(ffi::INFINITE - 1), ms) as DWORD
        }
        None => ffi::INFINITE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts() {
        assert_eq!(timeout_to_ms(None), ffi::INFINITE);
        assert_eq!(timeout_to_ms(Some(Duration::from_millis(1500))), 1500);
        assert_eq!(
            timeout_to_ms(Some(Duration::from_secs(u64::MAX))),
            ffi::INFINITE - 1
        );
    }

    #[test]
    fn reader_state_tracks_events() {
        let name = CStr::from_bytes_with_nul(b"Reader A\0").unwrap();
        let mut state = ReaderState::new(name, State::UNAWARE);
        assert_eq!(state.name(), name);
        assert_eq!(state.event_state(), State::UNAWARE);

        state.set_event_state((State::CHANGED | State::PRESENT).bits() | (3 << 16));
        assert_eq!(state.event_state(), State::CHANGED | State::PRESENT);
        assert_eq!(state.event_count(), 3);

        state.sync_current_state();
        assert_eq!(state.current_state(), State::CHANGED | State::PRESENT);
    }
}
