//! Session state machine (§4.I): connect/close gating, single owner of the
//! underlying cluster. The cluster itself — `ClusterConnector` plus the
//! control connection it drives — is wired in by the caller; this module
//! only owns the legality of `connect()`/`close()` transitions.

use std::sync::Mutex;

/// `{CLOSED, CONNECTING, CONNECTED, CLOSING}`, per §4.I.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Connecting,
    Connected,
    Closing,
}

/// Rejections for an illegal `connect()`/`close()` call.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("connect() already in progress")]
    AlreadyConnecting,
    #[error("session is already connected")]
    AlreadyConnected,
    #[error("session is already closing")]
    AlreadyClosing,
    #[error("close() called on a session that is closed or already closing")]
    UnableToClose,
}

struct Inner {
    state: SessionState,
}

/// Guards the transition table with a single mutex; the futures a real
/// `connect()`/`close()` entry point resolves are single-shot (§4.I) —
/// built from a `tokio::sync::oneshot` pair by the caller that owns this
/// state machine, not by `Session` itself.
pub struct Session {
    inner: Mutex<Inner>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: SessionState::Closed,
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().unwrap().state
    }

    /// `CLOSED —connect()→ CONNECTING` (§4.I). A session that has been
    /// closed may connect again; only a session that is not currently
    /// `Closed` rejects, with the error naming what it's already doing.
    pub fn begin_connect(&self) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            SessionState::Closed => {
                inner.state = SessionState::Connecting;
                tracing::debug!("session connecting");
                Ok(())
            }
            SessionState::Connecting => Err(SessionError::AlreadyConnecting),
            SessionState::Connected => Err(SessionError::AlreadyConnected),
            SessionState::Closing => Err(SessionError::AlreadyClosing),
        }
    }

    /// `CONNECTING —success→ CONNECTED`. A no-op if `close()` raced ahead
    /// and already moved the session to `Closing` — the in-flight attempt's
    /// outcome no longer matters to the state machine.
    pub fn connect_succeeded(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == SessionState::Connecting {
            inner.state = SessionState::Connected;
            tracing::info!("session connected");
        }
    }

    /// `CONNECTING —failure→ CLOSED`. Same race guard as `connect_succeeded`.
    pub fn connect_failed(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == SessionState::Connecting {
            inner.state = SessionState::Closed;
            tracing::warn!("session failed to connect");
        }
    }

    /// `{CONNECTING, CONNECTED} —close()→ CLOSING` (§4.I): closing cancels an
    /// in-flight connect attempt as well as tearing down a live one. `Closed`
    /// and `Closing` reject with `UNABLE_TO_CLOSE` — there's nothing left to
    /// close, or it's already on its way down.
    pub fn begin_close(&self) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            SessionState::Connecting | SessionState::Connected => {
                inner.state = SessionState::Closing;
                tracing::debug!("session closing");
                Ok(())
            }
            SessionState::Closed | SessionState::Closing => Err(SessionError::UnableToClose),
        }
    }

    /// `CLOSING —cluster.on_close→ CLOSED`.
    pub fn close_completed(&self) {
        let mut inner = self.inner.lock().unwrap();
        debug_assert_eq!(inner.state, SessionState::Closing);
        inner.state = SessionState::Closed;
        tracing::info!("session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_walks_every_state_in_order() {
        let session = Session::new();
        assert_eq!(session.state(), SessionState::Closed);
        session.begin_connect().unwrap();
        assert_eq!(session.state(), SessionState::Connecting);
        session.connect_succeeded();
        assert_eq!(session.state(), SessionState::Connected);
        session.begin_close().unwrap();
        assert_eq!(session.state(), SessionState::Closing);
        session.close_completed();
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn failed_connect_returns_to_closed_and_allows_reconnect() {
        let session = Session::new();
        session.begin_connect().unwrap();
        session.connect_failed();
        assert_eq!(session.state(), SessionState::Closed);
        session.begin_connect().unwrap();
        assert_eq!(session.state(), SessionState::Connecting);
    }

    #[test]
    fn second_connect_while_connecting_is_rejected() {
        let session = Session::new();
        session.begin_connect().unwrap();
        assert_eq!(session.begin_connect().unwrap_err(), SessionError::AlreadyConnecting);
    }

    #[test]
    fn reconnect_after_a_full_close_cycle_is_allowed() {
        let session = Session::new();
        session.begin_connect().unwrap();
        session.connect_succeeded();
        session.begin_close().unwrap();
        session.close_completed();
        assert_eq!(session.state(), SessionState::Closed);
        session.begin_connect().unwrap();
        assert_eq!(session.state(), SessionState::Connecting);
    }

    #[test]
    fn close_on_a_never_connected_session_is_unable_to_close() {
        let session = Session::new();
        assert_eq!(session.begin_close().unwrap_err(), SessionError::UnableToClose);
    }

    #[test]
    fn close_cancels_an_in_flight_connect() {
        let session = Session::new();
        session.begin_connect().unwrap();
        session.begin_close().unwrap();
        assert_eq!(session.state(), SessionState::Closing);

        // The racing connect attempt's eventual outcome is irrelevant once
        // close() has taken over.
        session.connect_succeeded();
        assert_eq!(session.state(), SessionState::Closing);

        session.close_completed();
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn double_close_is_rejected() {
        let session = Session::new();
        session.begin_connect().unwrap();
        session.connect_succeeded();
        session.begin_close().unwrap();
        assert_eq!(session.begin_close().unwrap_err(), SessionError::UnableToClose);
    }
}
