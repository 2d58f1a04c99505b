//! Client orchestrator.
//!
//! Wires the transport, the streaming reducer, the session store, and the
//! HTTP API together. All store mutations happen behind one lock in single
//! synchronous steps; the UI observes the result through broadcast events
//! and snapshot reads.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use datachat_protocol::{ExtraParams, FeedbackRequest, HistoryRequest, StatusFrame};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::config::{ClientConfig, QueryConfig};
use crate::dispatcher::build_query_frame;
use crate::error::ClientError;
use crate::events::{ClientEvent, ToastLevel};
use crate::history::ApiClient;
use crate::locale::{Key, Language, LocaleStore};
use crate::reducer::{self, CoreState, InFlightMap};
use crate::store::{Session, SessionStore};
use crate::transport::{FrameSink, Transport};

const EVENT_CHANNEL_CAPACITY: usize = 256;

struct ClientInner {
    config: RwLock<ClientConfig>,
    query_config: RwLock<QueryConfig>,
    core: Mutex<CoreState>,
    in_flight: InFlightMap,
    locale: LocaleStore,
    api: ApiClient,
    events: broadcast::Sender<ClientEvent>,
}

impl ClientInner {
    fn lock_core(&self) -> MutexGuard<'_, CoreState> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }

    fn emit_all(&self, events: Vec<ClientEvent>) {
        for event in events {
            self.emit(event);
        }
    }

    fn auth_required(&self) -> bool {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .auth
            .is_required()
    }

    fn config_snapshot(&self) -> ClientConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn query_config_snapshot(&self) -> QueryConfig {
        self.query_config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl FrameSink for ClientInner {
    fn on_connected(&self) {
        self.emit(ClientEvent::Connected);
    }

    fn on_frame(&self, raw: &str) {
        let auth_required = self.auth_required();
        let events = {
            let mut core = self.lock_core();
            reducer::apply_raw_frame(&mut core, &self.in_flight, auth_required, raw)
        };
        self.emit_all(events);
    }

    fn on_disconnect(&self, reason: &str) {
        let events = {
            let mut core = self.lock_core();
            reducer::clear_all_in_flight(&mut core, &self.in_flight)
        };
        self.emit(ClientEvent::Disconnected {
            reason: reason.to_string(),
        });
        self.emit_all(events);
        self.emit(ClientEvent::Toast {
            level: ToastLevel::Error,
            message: Key::ConnectionError,
        });
    }

    fn on_reconnect_gave_up(&self, attempts: u32) {
        self.emit(ClientEvent::ReconnectGaveUp { attempts });
        self.emit(ClientEvent::Toast {
            level: ToastLevel::Error,
            message: Key::ReconnectGaveUp,
        });
    }
}

/// Handle to the client core (cheap to clone).
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<ClientInner>,
    transport: Arc<Transport>,
}

impl ChatClient {
    pub fn new(config: ClientConfig, language: Language) -> Self {
        let locale = LocaleStore::new(language);
        let store = SessionStore::new(locale.translate(Key::NewChat));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let transport = Arc::new(Transport::new(config.ws_url.clone()));
        let api = ApiClient::new(config.api_url.clone());
        let inner = Arc::new(ClientInner {
            config: RwLock::new(config),
            query_config: RwLock::new(QueryConfig::default()),
            core: Mutex::new(CoreState::new(store)),
            in_flight: InFlightMap::new(),
            locale,
            api,
            events,
        });
        Self { inner, transport }
    }

    /// Establish the WebSocket connection. Idempotent.
    pub fn connect(&self) {
        let sink: Arc<dyn FrameSink> = self.inner.clone();
        self.transport.connect(sink);
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.events.subscribe()
    }

    pub fn locale(&self) -> &LocaleStore {
        &self.inner.locale
    }

    pub fn config(&self) -> ClientConfig {
        self.inner.config_snapshot()
    }

    pub fn query_config(&self) -> QueryConfig {
        self.inner.query_config_snapshot()
    }

    pub fn update_query_config(&self, update: impl FnOnce(&mut QueryConfig)) {
        let mut guard = self
            .inner
            .query_config
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        update(&mut guard);
    }

    // ----- session store reads -------------------------------------------

    pub fn sessions(&self) -> Vec<Session> {
        self.inner.lock_core().store.sessions().to_vec()
    }

    pub fn current_session_id(&self) -> String {
        self.inner.lock_core().store.current_id().to_string()
    }

    pub fn current_session(&self) -> Option<Session> {
        self.inner.lock_core().store.current().cloned()
    }

    /// Whether a query is outstanding for this session.
    pub fn is_searching(&self, session_id: &str) -> bool {
        self.inner.in_flight.contains_key(session_id)
    }

    /// Whether any session has a query outstanding.
    pub fn any_searching(&self) -> bool {
        !self.inner.in_flight.is_empty()
    }

    /// The status lines to display for a session's outstanding query,
    /// filtered by the display policy.
    pub fn visible_status(&self, session_id: &str) -> Vec<StatusFrame> {
        let core = self.inner.lock_core();
        core.status
            .get(session_id)
            .map(|buffer| {
                reducer::visible_statuses(buffer)
                    .into_iter()
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    // ----- session store mutations ---------------------------------------

    /// Create a session and make it current. Blocked while a search is in
    /// flight anywhere, matching the UI's disabled new-chat action.
    pub fn create_session(&self) -> Result<String, ClientError> {
        if self.any_searching() {
            return Err(ClientError::SearchInProgress);
        }
        let title = self.inner.locale.translate(Key::NewChat);
        let id = self.inner.lock_core().store.create_session(title);
        self.inner.emit(ClientEvent::SessionsChanged);
        Ok(id)
    }

    /// Delete a session (client-side immediately, persisted transcript
    /// best-effort). The last remaining session is never deleted.
    pub fn delete_session(&self, session_id: &str) -> Result<(), ClientError> {
        if self.is_searching(session_id) {
            return Err(ClientError::SearchInProgress);
        }
        self.inner.lock_core().store.delete_session(session_id)?;
        self.inner.emit(ClientEvent::SessionsChanged);

        let request = self.history_request(session_id);
        let inner = self.inner.clone();
        tokio::spawn(async move {
            if let Err(e) = inner.api.delete_history(&request).await {
                warn!(
                    component = "client",
                    event = "history.delete_failed",
                    session_id = %request.session_id,
                    error = %e,
                    "Failed to delete persisted history"
                );
            }
        });
        Ok(())
    }

    pub fn rename_session(&self, session_id: &str, title: String) -> Result<(), ClientError> {
        if self.is_searching(session_id) {
            return Err(ClientError::SearchInProgress);
        }
        self.inner.lock_core().store.rename_session(session_id, title)?;
        self.inner.emit(ClientEvent::SessionsChanged);
        Ok(())
    }

    /// Change the current session and load its persisted transcript.
    pub async fn switch_session(&self, session_id: &str) -> Result<(), ClientError> {
        self.inner.lock_core().store.switch_current(session_id)?;
        self.inner.emit(ClientEvent::SessionsChanged);
        self.load_history(session_id).await;
        Ok(())
    }

    // ----- history -------------------------------------------------------

    fn history_request(&self, session_id: &str) -> HistoryRequest {
        let config = self.inner.config_snapshot();
        let query_config = self.inner.query_config_snapshot();
        let profile = if query_config.selected_profile.is_empty() {
            config.default_profile.clone()
        } else {
            query_config.selected_profile.clone()
        };
        HistoryRequest {
            session_id: session_id.to_string(),
            user_id: config.user_id,
            profile_name: profile,
        }
    }

    /// Fetch and install the persisted transcript for a session. On failure
    /// the in-memory transcript is left untouched — never partially
    /// overwritten.
    pub async fn load_history(&self, session_id: &str) {
        self.inner.emit(ClientEvent::HistoryLoading {
            session_id: session_id.to_string(),
            loading: true,
        });

        let request = self.history_request(session_id);
        match self.inner.api.fetch_history(&request).await {
            Ok(history) => {
                let replaced = self
                    .inner
                    .lock_core()
                    .store
                    .replace_messages(&history.session_id, history.messages);
                if replaced {
                    self.inner.emit(ClientEvent::SessionsChanged);
                }
            }
            Err(e) => {
                warn!(
                    component = "client",
                    event = "history.fetch_failed",
                    session_id = %session_id,
                    error = %e,
                    "History fetch failed; keeping in-memory transcript"
                );
                self.inner.emit(ClientEvent::Toast {
                    level: ToastLevel::Error,
                    message: Key::HistoryLoadError,
                });
            }
        }

        self.inner.emit(ClientEvent::HistoryLoading {
            session_id: session_id.to_string(),
            loading: false,
        });
    }

    /// Fill default model/profile from the backend's configured options when
    /// nothing is selected yet. Fail-safe: existing state is preserved on
    /// error.
    pub async fn refresh_defaults(&self) {
        let query_config = self.inner.query_config_snapshot();
        let config = self.inner.config_snapshot();
        if !(query_config.selected_model.is_empty() && config.default_model.is_empty())
            && !(query_config.selected_profile.is_empty() && config.default_profile.is_empty())
        {
            return;
        }

        match self.inner.api.fetch_select_data().await {
            Ok(options) => {
                let mut guard = self
                    .inner
                    .config
                    .write()
                    .unwrap_or_else(PoisonError::into_inner);
                if guard.default_model.is_empty() {
                    if let Some(model) = options.bedrock_model_ids.first() {
                        guard.default_model = model.clone();
                    }
                }
                if guard.default_profile.is_empty() {
                    if let Some(profile) = options.data_profiles.first() {
                        guard.default_profile = profile.clone();
                        debug!(
                            component = "client",
                            event = "config.default_profile",
                            profile = %profile,
                            "Default data profile selected"
                        );
                    }
                }
            }
            Err(e) => {
                warn!(
                    component = "client",
                    event = "config.fetch_failed",
                    error = %e,
                    "Could not load model/profile options"
                );
                self.inner.emit(ClientEvent::Toast {
                    level: ToastLevel::Error,
                    message: Key::ConfigLoadError,
                });
            }
        }
    }

    // ----- query dispatch ------------------------------------------------

    /// Submit a question on the current session.
    ///
    /// Marks the session searching, optimistically appends the Human turn
    /// (applying the first-query-becomes-title rule), builds the outbound
    /// frame, and sends it. On build/send failure the searching marker is
    /// cleared and the appended turn is marked failed — not rolled back —
    /// so the user can retry it.
    pub fn submit(&self, query: &str, extra: &ExtraParams) -> Result<(), ClientError> {
        let session_id = self.current_session_id();
        // Single atomic reservation; a check-then-insert pair would let two
        // tasks submit on the same session concurrently.
        if self
            .inner
            .in_flight
            .insert(session_id.clone(), ())
            .is_some()
        {
            return Err(ClientError::QueryInFlight(session_id));
        }
        self.inner.emit(ClientEvent::SearchingChanged {
            session_id: session_id.clone(),
            searching: true,
        });

        {
            let mut core = self.inner.lock_core();
            core.store
                .append_turn(&session_id, datachat_protocol::Turn::human(query));
            core.store.title_from_first_query(&session_id, query);
        }
        self.inner.emit(ClientEvent::SessionsChanged);

        if let Err(e) = self.dispatch(query, &session_id, extra) {
            self.inner.in_flight.remove(&session_id);
            self.inner.emit(ClientEvent::SearchingChanged {
                session_id: session_id.clone(),
                searching: false,
            });
            self.inner.lock_core().store.mark_last_human_failed(&session_id);
            self.inner.emit(ClientEvent::SessionsChanged);
            self.inner.emit(ClientEvent::Toast {
                level: ToastLevel::Error,
                message: Key::QueryError,
            });
            return Err(e);
        }
        Ok(())
    }

    /// Re-send the most recent failed turn of a session without appending a
    /// duplicate. On success the turn's failed marker is cleared.
    pub fn retry(&self, session_id: &str) -> Result<(), ClientError> {
        let query = self
            .inner
            .lock_core()
            .store
            .last_failed_query(session_id)
            .ok_or_else(|| ClientError::NothingToRetry(session_id.to_string()))?;
        if self
            .inner
            .in_flight
            .insert(session_id.to_string(), ())
            .is_some()
        {
            return Err(ClientError::QueryInFlight(session_id.to_string()));
        }
        self.inner.emit(ClientEvent::SearchingChanged {
            session_id: session_id.to_string(),
            searching: true,
        });

        match self.dispatch(&query, session_id, &ExtraParams::default()) {
            Ok(()) => {
                self.inner
                    .lock_core()
                    .store
                    .mark_last_failed_delivered(session_id);
                self.inner.emit(ClientEvent::SessionsChanged);
                Ok(())
            }
            Err(e) => {
                self.inner.in_flight.remove(session_id);
                self.inner.emit(ClientEvent::SearchingChanged {
                    session_id: session_id.to_string(),
                    searching: false,
                });
                self.inner.emit(ClientEvent::Toast {
                    level: ToastLevel::Error,
                    message: Key::QueryError,
                });
                Err(e)
            }
        }
    }

    fn dispatch(
        &self,
        query: &str,
        session_id: &str,
        extra: &ExtraParams,
    ) -> Result<(), ClientError> {
        let config = self.inner.config_snapshot();
        let query_config = self.inner.query_config_snapshot();
        let frame = build_query_frame(query, session_id, &config, &query_config, extra)?;
        debug!(
            component = "client",
            event = "query.dispatch",
            session_id = %session_id,
            "Sending query frame"
        );
        self.transport.send_text(frame.to_string())
    }

    // ----- feedback ------------------------------------------------------

    /// Submit answer feedback. Errors are surfaced so the UI can revert its
    /// optimistic selection indicator.
    pub async fn send_feedback(&self, request: &FeedbackRequest) -> Result<bool, ClientError> {
        match self.inner.api.post_feedback(request).await {
            Ok(accepted) => Ok(accepted),
            Err(e) => {
                warn!(
                    component = "client",
                    event = "feedback.failed",
                    session_id = %request.session_id,
                    error = %e,
                    "Feedback submission failed"
                );
                self.inner.emit(ClientEvent::Toast {
                    level: ToastLevel::Error,
                    message: Key::FeedbackError,
                });
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ChatClient {
        ChatClient::new(ClientConfig::default(), Language::En)
    }

    #[tokio::test]
    async fn submit_appends_turn_and_sets_title_even_when_send_fails() {
        let client = client();
        // No connection: the send fails, but the optimistic append stays.
        let err = client
            .submit("show me revenue by region", &ExtraParams::default())
            .unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));

        let session = client.current_session().expect("current session");
        assert_eq!(session.title, "show me revenue by region");
        assert_eq!(session.messages.len(), 1);
        assert_eq!(
            client
                .inner
                .lock_core()
                .store
                .last_failed_query(&session.session_id)
                .as_deref(),
            Some("show me revenue by region")
        );
        assert!(!client.is_searching(&session.session_id));
    }

    #[tokio::test]
    async fn second_submit_on_same_session_is_rejected() {
        let client = client();
        let session_id = client.current_session_id();
        client.inner.in_flight.insert(session_id.clone(), ());

        let err = client.submit("q2", &ExtraParams::default()).unwrap_err();
        assert!(matches!(err, ClientError::QueryInFlight(id) if id == session_id));
        // The rejected submit appended nothing and left the reservation alone.
        assert!(client.current_session().expect("session").messages.is_empty());
        assert!(client.is_searching(&session_id));
    }

    #[tokio::test]
    async fn retry_is_rejected_while_a_query_is_in_flight() {
        let client = client();
        let session_id = client.current_session_id();
        {
            let mut core = client.inner.lock_core();
            core.store
                .append_turn(&session_id, datachat_protocol::Turn::human("q"));
            core.store.mark_last_human_failed(&session_id);
        }
        client.inner.in_flight.insert(session_id.clone(), ());

        let err = client.retry(&session_id).unwrap_err();
        assert!(matches!(err, ClientError::QueryInFlight(_)));
        // The existing reservation survives the rejected retry, and the
        // failed marker is untouched.
        assert!(client.is_searching(&session_id));
        assert_eq!(
            client
                .inner
                .lock_core()
                .store
                .last_failed_query(&session_id)
                .as_deref(),
            Some("q")
        );
    }

    #[tokio::test]
    async fn searching_blocks_session_mutations() {
        let client = client();
        let session_id = client.current_session_id();
        client.inner.in_flight.insert(session_id.clone(), ());

        assert!(matches!(
            client.create_session(),
            Err(ClientError::SearchInProgress)
        ));
        assert!(matches!(
            client.rename_session(&session_id, "x".to_string()),
            Err(ClientError::SearchInProgress)
        ));
        assert!(matches!(
            client.delete_session(&session_id),
            Err(ClientError::SearchInProgress)
        ));
    }

    #[tokio::test]
    async fn sessions_on_different_ids_search_independently() {
        let client = client();
        let first = client.current_session_id();
        client.inner.in_flight.insert("other-session".to_string(), ());

        // A search on another session does not block this one's dispatch
        // path (it fails later at the transport, which is not connected).
        let err = client.submit("q", &ExtraParams::default()).unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));
        assert!(client.is_searching("other-session"));
        assert!(!client.is_searching(&first));
    }

    #[tokio::test]
    async fn retry_requires_a_failed_turn() {
        let client = client();
        let session_id = client.current_session_id();
        assert!(matches!(
            client.retry(&session_id),
            Err(ClientError::NothingToRetry(_))
        ));
    }
}
