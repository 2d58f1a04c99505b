//! Client and query configuration

use serde::{Deserialize, Serialize};

use crate::auth::AuthMode;

/// Connection-level configuration: endpoints, identity, auth mode.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint of the query backend.
    pub ws_url: String,
    /// Base URL of the HTTP API (history, options, feedback).
    pub api_url: String,
    pub user_id: String,
    pub username: String,
    pub auth: AuthMode,
    /// Fallback model when the query configuration has none selected.
    pub default_model: String,
    /// Fallback data profile when the query configuration has none selected.
    pub default_profile: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ws_url: "ws://127.0.0.1:8000/qa/ws".to_string(),
            api_url: "http://127.0.0.1:8000/api".to_string(),
            user_id: "anonymous".to_string(),
            username: "anonymous".to_string(),
            auth: AuthMode::Disabled,
            default_model: String::new(),
            default_profile: String::new(),
        }
    }
}

/// Model/profile selection, generation parameters, and feature toggles read
/// when building outbound query frames. The configuration panel is an
/// external collaborator that reads and writes this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Selected model id; empty means "use the configured default".
    #[serde(default)]
    pub selected_model: String,
    /// Selected data profile; empty means "use the configured default".
    #[serde(default)]
    pub selected_profile: String,
    pub intent_recognition: bool,
    /// Complex/agent mode (chain-of-thought sub-task planning).
    pub agent_mode: bool,
    pub suggested_questions: bool,
    pub answer_with_insights: bool,
    pub top_k: u32,
    pub top_p: f64,
    pub max_tokens: u32,
    pub temperature: f64,
    pub context_window: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            selected_model: String::new(),
            selected_profile: String::new(),
            intent_recognition: true,
            agent_mode: false,
            suggested_questions: true,
            answer_with_insights: false,
            top_k: 250,
            top_p: 0.9,
            max_tokens: 2048,
            temperature: 0.01,
            context_window: 5,
        }
    }
}
