//! Outbound query frame construction.
//!
//! Pure functions; the orchestration steps around them (optimistic append,
//! per-session in-flight tracking, send) live in [`crate::client`].

use datachat_protocol::{ExtraParams, QueryRequest};
use serde_json::Value;

use crate::config::{ClientConfig, QueryConfig};
use crate::error::ClientError;

fn non_empty_or<'a>(selected: &'a str, fallback: &'a str) -> &'a str {
    if selected.is_empty() {
        fallback
    } else {
        selected
    }
}

/// Build the outbound query frame: base request fields, then credential
/// fields, then caller extras — later entries override same-named fields.
pub fn build_query_frame(
    query: &str,
    session_id: &str,
    cfg: &ClientConfig,
    query_config: &QueryConfig,
    extra: &ExtraParams,
) -> Result<Value, ClientError> {
    let request = QueryRequest {
        query: query.to_string(),
        bedrock_model_id: non_empty_or(&query_config.selected_model, &cfg.default_model)
            .to_string(),
        use_rag_flag: true,
        visualize_results_flag: true,
        intent_ner_recognition_flag: query_config.intent_recognition,
        agent_cot_flag: query_config.agent_mode,
        profile_name: non_empty_or(&query_config.selected_profile, &cfg.default_profile)
            .to_string(),
        explain_gen_process_flag: true,
        gen_suggested_question_flag: query_config.suggested_questions,
        answer_with_insights: query_config.answer_with_insights,
        top_k: query_config.top_k,
        top_p: query_config.top_p,
        max_tokens: query_config.max_tokens,
        temperature: query_config.temperature,
        context_window: query_config.context_window,
        session_id: session_id.to_string(),
        user_id: cfg.user_id.clone(),
        username: cfg.username.clone(),
    };

    let mut frame = serde_json::to_value(&request)?;
    if let Value::Object(ref mut fields) = frame {
        for (key, value) in cfg.auth.bearer_fields() {
            fields.insert(key, value);
        }
        for (key, value) in extra.to_fields() {
            fields.insert(key, value);
        }
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthMode, StaticToken};
    use std::sync::Arc;

    fn cfg() -> ClientConfig {
        ClientConfig {
            user_id: "u-1".to_string(),
            username: "analyst".to_string(),
            default_model: "default-model".to_string(),
            default_profile: "default-profile".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn unset_selection_falls_back_to_defaults() {
        let frame = build_query_frame(
            "revenue",
            "sess-1",
            &cfg(),
            &QueryConfig::default(),
            &ExtraParams::default(),
        )
        .expect("build frame");

        assert_eq!(
            frame.get("bedrock_model_id").and_then(Value::as_str),
            Some("default-model")
        );
        assert_eq!(
            frame.get("profile_name").and_then(Value::as_str),
            Some("default-profile")
        );
        assert_eq!(frame.get("use_rag_flag"), Some(&Value::Bool(true)));
        assert_eq!(
            frame.get("explain_gen_process_flag"),
            Some(&Value::Bool(true))
        );
        assert_eq!(frame.get("session_id").and_then(Value::as_str), Some("sess-1"));
        assert!(frame.get("authorization").is_none());
    }

    #[test]
    fn selected_values_win_over_defaults() {
        let query_config = QueryConfig {
            selected_model: "model-x".to_string(),
            selected_profile: "sales".to_string(),
            ..Default::default()
        };
        let frame = build_query_frame(
            "revenue",
            "sess-1",
            &cfg(),
            &query_config,
            &ExtraParams::default(),
        )
        .expect("build frame");

        assert_eq!(
            frame.get("bedrock_model_id").and_then(Value::as_str),
            Some("model-x")
        );
        assert_eq!(
            frame.get("profile_name").and_then(Value::as_str),
            Some("sales")
        );
    }

    #[test]
    fn extras_override_same_named_fields() {
        let extra = ExtraParams {
            query_rewrite: Some("revenue by region in 2024".to_string()),
            previous_intent: Some("entity_select".to_string()),
            ..Default::default()
        };
        let frame =
            build_query_frame("revenue", "sess-1", &cfg(), &QueryConfig::default(), &extra)
                .expect("build frame");

        assert_eq!(
            frame.get("query_rewrite").and_then(Value::as_str),
            Some("revenue by region in 2024")
        );
        assert_eq!(
            frame.get("previous_intent").and_then(Value::as_str),
            Some("entity_select")
        );
    }

    #[test]
    fn bearer_credential_fields_are_included() {
        let mut config = cfg();
        config.auth = AuthMode::Bearer(Arc::new(StaticToken::new("t0ken")));
        let frame = build_query_frame(
            "revenue",
            "sess-1",
            &config,
            &QueryConfig::default(),
            &ExtraParams::default(),
        )
        .expect("build frame");

        assert_eq!(
            frame.get("authorization").and_then(Value::as_str),
            Some("Bearer t0ken")
        );
    }
}
