//! In-memory session store.
//!
//! The store is the exclusive owner of all session/turn data; the reducer
//! and the dispatcher request mutations through these operations and hold no
//! copies that could diverge. Every operation is a single synchronous step;
//! callers serialize access behind one lock.

use datachat_protocol::{new_session_id, Delivery, Turn};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ClientError;
use crate::locale;

/// One chat session: an ordered transcript of human/AI turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub title: String,
    pub messages: Vec<Turn>,
}

impl Session {
    fn new(title: String) -> Self {
        Self {
            session_id: new_session_id(),
            title,
            messages: Vec::new(),
        }
    }
}

/// Ordered collection of sessions plus the current-session pointer.
///
/// Invariants: the list is never empty, and `current_id` always references
/// an existing session.
pub struct SessionStore {
    sessions: Vec<Session>,
    current_id: String,
}

impl SessionStore {
    /// A store starts with one session so the non-empty invariant holds
    /// from the first instant.
    pub fn new(default_title: impl Into<String>) -> Self {
        let first = Session::new(default_title.into());
        let current_id = first.session_id.clone();
        Self {
            sessions: vec![first],
            current_id,
        }
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn current_id(&self) -> &str {
        &self.current_id
    }

    pub fn get(&self, session_id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.session_id == session_id)
    }

    fn get_mut(&mut self, session_id: &str) -> Option<&mut Session> {
        self.sessions
            .iter_mut()
            .find(|s| s.session_id == session_id)
    }

    pub fn current(&self) -> Option<&Session> {
        self.get(self.current_id.as_str())
    }

    /// Create a session with a fresh id and empty transcript; it becomes
    /// current. Returns the new session id.
    pub fn create_session(&mut self, default_title: impl Into<String>) -> String {
        let session = Session::new(default_title.into());
        let id = session.session_id.clone();
        self.sessions.push(session);
        self.current_id = id.clone();
        id
    }

    /// Delete a session. Rejected when it is the only remaining session; if
    /// the deleted session was current, the first remaining session becomes
    /// current.
    pub fn delete_session(&mut self, session_id: &str) -> Result<(), ClientError> {
        if self.sessions.len() == 1 {
            return Err(ClientError::LastSession);
        }
        let Some(pos) = self
            .sessions
            .iter()
            .position(|s| s.session_id == session_id)
        else {
            return Err(ClientError::UnknownSession(session_id.to_string()));
        };
        self.sessions.remove(pos);
        if self.current_id == session_id {
            self.current_id = self.sessions[0].session_id.clone();
        }
        Ok(())
    }

    /// Replace a session's title unconditionally.
    pub fn rename_session(&mut self, session_id: &str, title: String) -> Result<(), ClientError> {
        match self.get_mut(session_id) {
            Some(session) => {
                session.title = title;
                Ok(())
            }
            None => Err(ClientError::UnknownSession(session_id.to_string())),
        }
    }

    /// Change which session is current.
    pub fn switch_current(&mut self, session_id: &str) -> Result<(), ClientError> {
        if self.get(session_id).is_none() {
            return Err(ClientError::UnknownSession(session_id.to_string()));
        }
        self.current_id = session_id.to_string();
        Ok(())
    }

    /// Append a turn. Unknown session ids are a defensive no-op, matching
    /// the terminal-frame handling: frames for other (possibly deleted)
    /// sessions leave this store untouched.
    pub fn append_turn(&mut self, session_id: &str, turn: Turn) -> bool {
        match self.get_mut(session_id) {
            Some(session) => {
                session.messages.push(turn);
                true
            }
            None => {
                debug!(
                    component = "store",
                    event = "store.append.unknown_session",
                    session_id = %session_id,
                    "Dropping turn for unknown session"
                );
                false
            }
        }
    }

    /// Install a server-fetched transcript, replacing (not appending to) the
    /// in-memory list. Used only by the history loader.
    pub fn replace_messages(&mut self, session_id: &str, messages: Vec<Turn>) -> bool {
        match self.get_mut(session_id) {
            Some(session) => {
                session.messages = messages;
                true
            }
            None => false,
        }
    }

    /// First-query-becomes-title rule: while the title is still a default
    /// placeholder (in any supported language), the first submitted query
    /// overwrites it.
    pub fn title_from_first_query(&mut self, session_id: &str, query: &str) {
        if let Some(session) = self.get_mut(session_id) {
            if locale::is_default_title(&session.title) {
                session.title = query.to_string();
            }
        }
    }

    /// Mark the most recent human turn as failed to deliver.
    pub fn mark_last_human_failed(&mut self, session_id: &str) {
        if let Some(session) = self.get_mut(session_id) {
            if let Some(Turn::Human { delivery, .. }) =
                session.messages.iter_mut().rev().find(|t| t.is_human())
            {
                *delivery = Delivery::Failed;
            }
        }
    }

    /// Content of the most recent failed human turn, if any.
    pub fn last_failed_query(&self, session_id: &str) -> Option<String> {
        let session = self.get(session_id)?;
        session.messages.iter().rev().find_map(|t| match t {
            Turn::Human {
                content,
                delivery: Delivery::Failed,
            } => Some(content.clone()),
            _ => None,
        })
    }

    /// Flip the most recent failed human turn back to delivered (after a
    /// successful retry).
    pub fn mark_last_failed_delivered(&mut self, session_id: &str) {
        if let Some(session) = self.get_mut(session_id) {
            if let Some(Turn::Human { delivery, .. }) = session
                .messages
                .iter_mut()
                .rev()
                .find(|t| matches!(t, Turn::Human { delivery: Delivery::Failed, .. }))
            {
                *delivery = Delivery::Delivered;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datachat_protocol::Answer;

    fn store() -> SessionStore {
        SessionStore::new("New Chat")
    }

    #[test]
    fn store_starts_with_one_current_session() {
        let store = store();
        assert_eq!(store.sessions().len(), 1);
        let current = store.current().expect("current session");
        assert_eq!(current.session_id, store.current_id());
        assert!(current.messages.is_empty());
    }

    #[test]
    fn deleting_the_only_session_is_rejected() {
        let mut store = store();
        let id = store.current_id().to_string();
        assert!(matches!(
            store.delete_session(&id),
            Err(ClientError::LastSession)
        ));
        assert_eq!(store.sessions().len(), 1);
        assert_eq!(store.current_id(), id);
    }

    #[test]
    fn session_list_never_empties_under_delete_sequences() {
        let mut store = store();
        for _ in 0..4 {
            store.create_session("New Chat");
        }
        let ids: Vec<String> = store
            .sessions()
            .iter()
            .map(|s| s.session_id.clone())
            .collect();
        for id in ids {
            let _ = store.delete_session(&id);
            assert!(!store.sessions().is_empty());
            assert!(store.current().is_some());
        }
        assert_eq!(store.sessions().len(), 1);
    }

    #[test]
    fn deleting_current_falls_back_to_first_remaining() {
        let mut store = store();
        let first = store.current_id().to_string();
        let second = store.create_session("New Chat");
        let third = store.create_session("New Chat");
        assert_eq!(store.current_id(), third);

        store.delete_session(&third).expect("delete current");
        // Index 0 after removal, not most-recently-used
        assert_eq!(store.current_id(), first);

        store.delete_session(&first).expect("delete first");
        assert_eq!(store.current_id(), second);
    }

    #[test]
    fn switch_current_points_at_every_valid_id() {
        let mut store = store();
        let first = store.current_id().to_string();
        let second = store.create_session("New Chat");

        store.switch_current(&first).expect("switch");
        assert_eq!(store.current_id(), first);
        store.switch_current(&second).expect("switch");
        assert_eq!(store.current_id(), second);

        assert!(matches!(
            store.switch_current("nope"),
            Err(ClientError::UnknownSession(_))
        ));
        assert_eq!(store.current_id(), second);
    }

    #[test]
    fn append_to_unknown_session_is_a_noop() {
        let mut store = store();
        assert!(!store.append_turn("nope", Turn::human("hello")));
        assert!(store.current().expect("current").messages.is_empty());
    }

    #[test]
    fn replace_messages_installs_fetched_transcript() {
        let mut store = store();
        let id = store.current_id().to_string();
        store.append_turn(&id, Turn::human("stale"));

        let fetched = vec![Turn::human("q1"), Turn::ai(Answer::default())];
        assert!(store.replace_messages(&id, fetched));
        let messages = &store.current().expect("current").messages;
        assert_eq!(messages.len(), 2);
        assert!(messages[0].is_human());
    }

    #[test]
    fn first_query_overwrites_default_title_only() {
        let mut store = store();
        let id = store.current_id().to_string();
        store.title_from_first_query(&id, "show me revenue by region");
        assert_eq!(
            store.current().expect("current").title,
            "show me revenue by region"
        );

        // Second query does not rename
        store.title_from_first_query(&id, "another question");
        assert_eq!(
            store.current().expect("current").title,
            "show me revenue by region"
        );
    }

    #[test]
    fn first_query_rule_applies_to_localized_placeholder() {
        let mut store = SessionStore::new("新建对话");
        let id = store.current_id().to_string();
        store.title_from_first_query(&id, "按地区显示收入");
        assert_eq!(store.current().expect("current").title, "按地区显示收入");
    }

    #[test]
    fn failed_turn_roundtrip() {
        let mut store = store();
        let id = store.current_id().to_string();
        store.append_turn(&id, Turn::human("q"));
        assert!(store.last_failed_query(&id).is_none());

        store.mark_last_human_failed(&id);
        assert_eq!(store.last_failed_query(&id).as_deref(), Some("q"));

        store.mark_last_failed_delivered(&id);
        assert!(store.last_failed_query(&id).is_none());
    }
}
