//! Client → backend messages

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Outbound natural-language query frame.
///
/// Caller-supplied [`ExtraParams`] and auth credential fields are merged on
/// top of the serialized object by the dispatcher; they are not part of the
/// base struct so that overrides replace same-named fields cleanly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub bedrock_model_id: String,
    pub use_rag_flag: bool,
    pub visualize_results_flag: bool,
    pub intent_ner_recognition_flag: bool,
    pub agent_cot_flag: bool,
    pub profile_name: String,
    pub explain_gen_process_flag: bool,
    pub gen_suggested_question_flag: bool,
    pub answer_with_insights: bool,
    pub top_k: u32,
    pub top_p: f64,
    pub max_tokens: u32,
    pub temperature: f64,
    pub context_window: u32,
    pub session_id: String,
    pub user_id: String,
    pub username: String,
}

/// Override fields carried by entity-disambiguation replies, query rewrites,
/// and intent carry-over. Same-named fields of [`QueryRequest`] are replaced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtraParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_rewrite: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_intent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_user_select: Option<HashMap<String, HashMap<String, String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_retrieval: Option<Vec<Value>>,
}

impl ExtraParams {
    /// Convert to a flat field map for merging into an outbound frame.
    pub fn to_fields(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// History fetch request, keyed the way the backend stores transcripts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRequest {
    pub session_id: String,
    pub user_id: String,
    pub profile_name: String,
}

/// Feedback direction for a generated SQL answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    Upvote,
    Downvote,
}

/// User feedback on a generated SQL answer. The error fields are only
/// populated for downvotes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub feedback_type: FeedbackType,
    pub data_profiles: String,
    pub query: String,
    pub query_intent: String,
    /// The SQL that was generated for the query.
    pub query_answer: String,
    pub session_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_categories: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_sql_reference: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> QueryRequest {
        QueryRequest {
            query: "show me revenue by region".to_string(),
            bedrock_model_id: "model-a".to_string(),
            use_rag_flag: true,
            visualize_results_flag: true,
            intent_ner_recognition_flag: true,
            agent_cot_flag: false,
            profile_name: "sales".to_string(),
            explain_gen_process_flag: true,
            gen_suggested_question_flag: true,
            answer_with_insights: false,
            top_k: 250,
            top_p: 0.9,
            max_tokens: 2048,
            temperature: 0.01,
            context_window: 5,
            session_id: "sess-1".to_string(),
            user_id: "u-1".to_string(),
            username: "analyst".to_string(),
        }
    }

    #[test]
    fn query_request_serializes_all_wire_fields() {
        let value = serde_json::to_value(request()).expect("serialize");
        for field in [
            "query",
            "bedrock_model_id",
            "use_rag_flag",
            "visualize_results_flag",
            "intent_ner_recognition_flag",
            "agent_cot_flag",
            "profile_name",
            "explain_gen_process_flag",
            "gen_suggested_question_flag",
            "answer_with_insights",
            "top_k",
            "top_p",
            "max_tokens",
            "temperature",
            "context_window",
            "session_id",
            "user_id",
            "username",
        ] {
            assert!(value.get(field).is_some(), "missing field {field}");
        }
    }

    #[test]
    fn extra_params_skip_unset_fields() {
        let extras = ExtraParams {
            query_rewrite: Some("revenue by region in 2024".to_string()),
            ..Default::default()
        };
        let fields = extras.to_fields();
        assert_eq!(fields.len(), 1);
        assert_eq!(
            fields.get("query_rewrite").and_then(Value::as_str),
            Some("revenue by region in 2024")
        );
    }

    #[test]
    fn downvote_feedback_carries_error_fields() {
        let req = FeedbackRequest {
            feedback_type: FeedbackType::Downvote,
            data_profiles: "sales".to_string(),
            query: "revenue by region".to_string(),
            query_intent: "normal_search".to_string(),
            query_answer: "SELECT 1".to_string(),
            session_id: "sess-1".to_string(),
            user_id: "u-1".to_string(),
            error_description: Some("wrong table".to_string()),
            error_categories: Some(vec!["table name".to_string()]),
            correct_sql_reference: Some("SELECT 2".to_string()),
        };
        let json = serde_json::to_string(&req).expect("serialize");
        assert!(json.contains("\"feedback_type\":\"downvote\""));
        assert!(json.contains("error_description"));

        let upvote = FeedbackRequest {
            feedback_type: FeedbackType::Upvote,
            error_description: None,
            error_categories: None,
            correct_sql_reference: None,
            ..req
        };
        let json = serde_json::to_string(&upvote).expect("serialize");
        assert!(!json.contains("error_description"));
    }
}
