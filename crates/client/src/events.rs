//! Events surfaced to whatever is rendering the client.
//!
//! The UI is an external collaborator: it subscribes to a broadcast channel
//! and re-renders from store snapshots when these fire. Toast messages carry
//! a locale key, not a string — the renderer translates at display time.

use crate::locale::Key;

/// Severity of a user-visible, non-blocking notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Error,
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The WebSocket connection is established (initial or after reconnect).
    Connected,
    /// The connection closed or errored; reconnection is already underway.
    Disconnected { reason: String },
    /// Reconnection gave up after the configured number of attempts.
    ReconnectGaveUp { attempts: u32 },
    /// A session's in-flight ("searching") marker changed.
    SearchingChanged { session_id: String, searching: bool },
    /// A session's transient status buffer changed (appended or cleared).
    StatusUpdated { session_id: String },
    /// A terminal frame committed an AI turn into a session.
    AnswerCommitted { session_id: String },
    /// Session list or transcript content changed.
    SessionsChanged,
    /// A history fetch started or finished for a session. While loading, the
    /// UI suppresses rendering of the stale transcript.
    HistoryLoading { session_id: String, loading: bool },
    /// Non-blocking notification to display.
    Toast { level: ToastLevel, message: Key },
    /// The backend rejected the credential; the auth flow takes over.
    Unauthorized,
}
