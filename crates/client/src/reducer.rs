//! Streaming protocol reducer.
//!
//! All state transitions for inbound frames live here as pure, synchronous
//! functions: no IO, no async, fully unit-testable. The transport feeds raw
//! text frames in network-arrival order; each call mutates the core state in
//! one atomic step and returns the events the caller must emit.

use std::collections::HashMap;

use dashmap::DashMap;
use datachat_protocol::{InboundFrame, StatusFrame, Turn};
use tracing::{debug, warn};

use crate::events::{ClientEvent, ToastLevel};
use crate::locale::Key;
use crate::store::SessionStore;

/// Mutable client core: the session store plus the per-session transient
/// status buffers. Guarded by one lock at the orchestration layer.
pub struct CoreState {
    pub store: SessionStore,
    /// Session id → ordered status frames for the one outstanding query.
    /// Cleared the instant that query's terminal frame arrives; never
    /// persisted across the query boundary.
    pub status: HashMap<String, Vec<StatusFrame>>,
}

impl CoreState {
    pub fn new(store: SessionStore) -> Self {
        Self {
            store,
            status: HashMap::new(),
        }
    }
}

/// Per-session in-flight markers, shared with the dispatcher so "is this
/// session searching" reads never take the core lock.
pub type InFlightMap = DashMap<String, ()>;

/// Classify and apply one raw inbound text frame.
pub fn apply_raw_frame(
    core: &mut CoreState,
    in_flight: &InFlightMap,
    auth_required: bool,
    raw: &str,
) -> Vec<ClientEvent> {
    match InboundFrame::parse(raw) {
        Ok(frame) => apply_frame(core, in_flight, auth_required, frame),
        Err(e) => {
            warn!(
                component = "reducer",
                event = "frame.parse_failed",
                error = %e,
                payload_bytes = raw.len(),
                "Malformed inbound frame"
            );
            let mut events = clear_all_in_flight(core, in_flight);
            events.push(ClientEvent::Toast {
                level: ToastLevel::Error,
                message: Key::JsonParseError,
            });
            events
        }
    }
}

/// Apply one classified frame.
pub fn apply_frame(
    core: &mut CoreState,
    in_flight: &InFlightMap,
    auth_required: bool,
    frame: InboundFrame,
) -> Vec<ClientEvent> {
    match frame {
        InboundFrame::Pong => Vec::new(),

        InboundFrame::AuthGate(code) => {
            debug!(
                component = "reducer",
                event = "frame.auth_gate",
                code = code,
                "Auth gate frame"
            );
            let mut events = clear_all_in_flight(core, in_flight);
            if code == 401 && auth_required {
                events.push(ClientEvent::Unauthorized);
            }
            events
        }

        InboundFrame::Status(status) => {
            // Status frames may omit the session id; they describe the
            // query outstanding on the current session then.
            let session_id = status
                .session_id
                .clone()
                .unwrap_or_else(|| core.store.current_id().to_string());
            core.status.entry(session_id.clone()).or_default().push(status);
            vec![ClientEvent::StatusUpdated { session_id }]
        }

        InboundFrame::Result(result) => {
            let session_id = result.session_id;
            let mut events = Vec::new();

            if core.status.remove(&session_id).is_some() {
                events.push(ClientEvent::StatusUpdated {
                    session_id: session_id.clone(),
                });
            }
            if in_flight.remove(&session_id).is_some() {
                events.push(ClientEvent::SearchingChanged {
                    session_id: session_id.clone(),
                    searching: false,
                });
            }

            // Sessions that don't match are left untouched; append_turn is
            // already a no-op for unknown ids.
            if core.store.append_turn(&session_id, Turn::ai(result.content)) {
                events.push(ClientEvent::AnswerCommitted {
                    session_id: session_id.clone(),
                });
                events.push(ClientEvent::SessionsChanged);
            } else {
                debug!(
                    component = "reducer",
                    event = "frame.result.unknown_session",
                    session_id = %session_id,
                    "Terminal frame for unknown session dropped"
                );
            }
            events
        }
    }
}

/// Force-clear every in-flight marker and status buffer. Invoked on
/// connection close/error and on malformed payloads: callers awaiting a
/// terminal state must be unblocked even though none was received.
pub fn clear_all_in_flight(core: &mut CoreState, in_flight: &InFlightMap) -> Vec<ClientEvent> {
    let mut events = Vec::new();

    let searching: Vec<String> = in_flight.iter().map(|e| e.key().clone()).collect();
    for session_id in searching {
        in_flight.remove(&session_id);
        events.push(ClientEvent::SearchingChanged {
            session_id,
            searching: false,
        });
    }

    for (session_id, buffer) in core.status.iter_mut() {
        if !buffer.is_empty() {
            buffer.clear();
            events.push(ClientEvent::StatusUpdated {
                session_id: session_id.clone(),
            });
        }
    }
    core.status.clear();

    events
}

/// Display policy over a status buffer: the most recently received frame is
/// always visible, plus every odd-indexed prior frame. The buffer itself
/// preserves full arrival order regardless of this filtering.
pub fn visible_statuses(buffer: &[StatusFrame]) -> Vec<&StatusFrame> {
    buffer
        .iter()
        .enumerate()
        .filter(|(idx, _)| idx % 2 == 1 || idx + 1 == buffer.len())
        .map(|(_, frame)| frame)
        .collect()
}
