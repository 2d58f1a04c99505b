//! Core types shared across the protocol

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Backend-assigned classification of a question. Selects which result
/// payload of an [`Answer`] is meaningful and which renderer applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    NormalSearch,
    AgentSearch,
    KnowledgeSearch,
    EntitySelect,
    RejectSearch,
    AskInReply,
    /// Any intent tag this client does not recognize. Renderers must fall
    /// back to an error display for this variant, never crash.
    #[default]
    #[serde(other)]
    Unknown,
}

impl QueryIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryIntent::NormalSearch => "normal_search",
            QueryIntent::AgentSearch => "agent_search",
            QueryIntent::KnowledgeSearch => "knowledge_search",
            QueryIntent::EntitySelect => "entity_select",
            QueryIntent::RejectSearch => "reject_search",
            QueryIntent::AskInReply => "ask_in_reply",
            QueryIntent::Unknown => "unknown",
        }
    }
}

/// Backend phase reported by a status frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusKind {
    InProgress,
    End,
    Error,
    Rejected,
}

/// Tabular result of one generated SQL query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SqlSearchResult {
    #[serde(default)]
    pub sql: String,
    /// Row-major result data; the first row is the header row.
    #[serde(default)]
    pub sql_data: Vec<Vec<Value>>,
    /// Alternate row set prepared for chart rendering.
    #[serde(default)]
    pub sql_data_chart: Vec<Vec<Value>>,
    /// Display hint from the backend: "table", "bar", "line", "pie", ...
    #[serde(default)]
    pub data_show_type: String,
    /// Free-text (or JSON task list) description of how the SQL was built.
    #[serde(default)]
    pub sql_gen_process: String,
    /// Model-written insights over the result data.
    #[serde(default)]
    pub data_analyse: String,
}

/// One sub-task of an agent (complex mode) search
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentSubTask {
    #[serde(default)]
    pub sub_task_query: String,
    #[serde(default)]
    pub sql_search_result: SqlSearchResult,
}

/// Result payload for `agent_search` intent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentSearchResult {
    #[serde(default)]
    pub agent_sql_search_result: Vec<AgentSubTask>,
    #[serde(default)]
    pub agent_summary: String,
}

/// Result payload for `knowledge_search` intent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeSearchResult {
    #[serde(default)]
    pub knowledge_response: String,
}

/// Result payload for `ask_in_reply` intent (the backend asks the user to
/// clarify by rewriting the question)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AskRewriteResult {
    #[serde(default)]
    pub query_rewrite: String,
}

/// Result payload for `entity_select` intent: disambiguation options,
/// keyed by the ambiguous entity text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntitySelectResult {
    #[serde(default)]
    pub entity_select_info: HashMap<String, Vec<HashMap<String, String>>>,
}

/// Final payload of an AI turn. Exactly one intent-specific payload is
/// meaningful, selected by `query_intent`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Answer {
    #[serde(default)]
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_rewrite: Option<String>,
    #[serde(default)]
    pub query_intent: QueryIntent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_search_result: Option<SqlSearchResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_search_result: Option<AgentSearchResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_search_result: Option<KnowledgeSearchResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ask_rewrite_result: Option<AskRewriteResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ask_entity_select: Option<EntitySelectResult>,
    /// Error-source → message map; empty when nothing went wrong.
    #[serde(default)]
    pub error_log: HashMap<String, String>,
    /// Model-suggested follow-up questions, in display order.
    #[serde(default)]
    pub suggested_question: Vec<String>,
}

/// Delivery state of an optimistically appended human turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    #[default]
    Delivered,
    /// The outbound send failed; the turn is kept and may be retried.
    Failed,
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Delivered)
    }
}

/// One message in a session transcript. Immutable once appended, except
/// that a Human turn's delivery marker flips on a successful retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Turn {
    Human {
        content: String,
        #[serde(default, skip_serializing_if = "Delivery::is_delivered")]
        delivery: Delivery,
    },
    Ai {
        content: Answer,
    },
}

impl Turn {
    pub fn human(content: impl Into<String>) -> Self {
        Turn::Human {
            content: content.into(),
            delivery: Delivery::Delivered,
        }
    }

    pub fn ai(content: Answer) -> Self {
        Turn::Ai { content }
    }

    pub fn is_human(&self) -> bool {
        matches!(self, Turn::Human { .. })
    }
}
