//! Locale state and the translate-key-to-string capability.
//!
//! The core owns only the strings it itself produces (default session title,
//! toast messages); full UI string tables live with the UI. Locale changes
//! are pushed through an explicit watch channel so ownership of the locale
//! state stays with one store instead of a process-global event. Reads are
//! lock-free via `ArcSwap`.

use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Zh,
}

/// Keys for the strings the client core produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    NewChat,
    ConnectionError,
    JsonParseError,
    QueryError,
    HistoryLoadError,
    ConfigLoadError,
    FeedbackError,
    ReconnectGaveUp,
}

/// Translate a key for a language. Infallible: every key has a string in
/// every language.
pub fn translate(lang: Language, key: Key) -> &'static str {
    match (lang, key) {
        (Language::En, Key::NewChat) => "New Chat",
        (Language::En, Key::ConnectionError) => "Connection error, retrying",
        (Language::En, Key::JsonParseError) => "Failed to parse server message",
        (Language::En, Key::QueryError) => "Failed to send query",
        (Language::En, Key::HistoryLoadError) => "Failed to load session history",
        (Language::En, Key::ConfigLoadError) => "Failed to load model and profile options",
        (Language::En, Key::FeedbackError) => "Failed to submit feedback",
        (Language::En, Key::ReconnectGaveUp) => "Could not reach the server, giving up",
        (Language::Zh, Key::NewChat) => "新建对话",
        (Language::Zh, Key::ConnectionError) => "连接错误，正在重试",
        (Language::Zh, Key::JsonParseError) => "解析服务器消息失败",
        (Language::Zh, Key::QueryError) => "查询发送失败",
        (Language::Zh, Key::HistoryLoadError) => "加载会话历史失败",
        (Language::Zh, Key::ConfigLoadError) => "加载模型与数据配置失败",
        (Language::Zh, Key::FeedbackError) => "反馈提交失败",
        (Language::Zh, Key::ReconnectGaveUp) => "无法连接到服务器，已停止重试",
    }
}

/// The default "new chat" placeholder in any supported language.
/// The first-query-becomes-title rule only fires while the title is still
/// one of these.
pub fn is_default_title(title: &str) -> bool {
    [Language::En, Language::Zh]
        .iter()
        .any(|lang| translate(*lang, Key::NewChat) == title)
}

/// Owns the current language and notifies subscribers on change.
pub struct LocaleStore {
    current: ArcSwap<Language>,
    tx: watch::Sender<Language>,
}

impl LocaleStore {
    pub fn new(initial: Language) -> Self {
        let (tx, _) = watch::channel(initial);
        Self {
            current: ArcSwap::from_pointee(initial),
            tx,
        }
    }

    pub fn get(&self) -> Language {
        **self.current.load()
    }

    pub fn set(&self, lang: Language) {
        self.current.store(Arc::new(lang));
        let _ = self.tx.send(lang);
    }

    /// Subscribe to locale changes. Subscribers re-render on each change.
    pub fn subscribe(&self) -> watch::Receiver<Language> {
        self.tx.subscribe()
    }

    pub fn translate(&self, key: Key) -> &'static str {
        translate(self.get(), key)
    }
}

impl Default for LocaleStore {
    fn default() -> Self {
        Self::new(Language::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_title_matches_every_language() {
        assert!(is_default_title("New Chat"));
        assert!(is_default_title("新建对话"));
        assert!(!is_default_title("revenue by region"));
    }

    #[test]
    fn subscribers_observe_change() {
        let store = LocaleStore::new(Language::En);
        let mut rx = store.subscribe();
        assert_eq!(*rx.borrow(), Language::En);

        store.set(Language::Zh);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), Language::Zh);
        assert_eq!(store.translate(Key::NewChat), "新建对话");
    }
}
