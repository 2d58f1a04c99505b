//! Terminal rendering of transcripts, status lines, and session lists.
//!
//! Everything here is pure string building; `main` owns the actual printing
//! so output interleaves predictably with the prompt.

use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{ContentArrangement, Table};
use console::style;
use serde_json::Value;

use datachat_client::prefs::Density;
use datachat_client::store::Session;
use datachat_protocol::{
    AgentSearchResult, Answer, Delivery, QueryIntent, SqlSearchResult, StatusFrame, StatusKind,
    Turn,
};

/// Build a table from row-major data where the first row is the header.
/// Empty input renders nothing.
pub fn data_table(rows: &[Vec<Value>], density: Density) -> Option<Table> {
    let (header, body) = rows.split_first()?;
    let mut table = Table::new();
    table
        .load_preset(match density {
            Density::Comfortable => UTF8_FULL,
            Density::Compact => UTF8_FULL_CONDENSED,
        })
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.iter().map(cell_text));
    for row in body {
        table.add_row(row.iter().map(cell_text));
    }
    Some(table)
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub fn render_turn(turn: &Turn, density: Density) -> String {
    match turn {
        Turn::Human { content, delivery } => {
            let marker = match delivery {
                Delivery::Delivered => String::new(),
                Delivery::Failed => format!(
                    "  {}",
                    style("[failed to send — /retry]").red()
                ),
            };
            format!("{} {}{}", style("you ❯").cyan().bold(), content, marker)
        }
        Turn::Ai { content } => render_answer(content, density),
    }
}

pub fn render_answer(answer: &Answer, density: Density) -> String {
    let mut out = String::new();
    let tag = style(format!("ai [{}] ❯", answer.query_intent.as_str()))
        .green()
        .bold();
    out.push_str(&format!("{tag}\n"));

    match answer.query_intent {
        QueryIntent::NormalSearch => {
            if let Some(result) = &answer.sql_search_result {
                push_sql_result(&mut out, result, density);
            }
        }
        QueryIntent::AgentSearch => {
            if let Some(result) = &answer.agent_search_result {
                push_agent_result(&mut out, result, density);
            }
        }
        QueryIntent::KnowledgeSearch => {
            if let Some(result) = &answer.knowledge_search_result {
                out.push_str(&result.knowledge_response);
                out.push('\n');
            }
        }
        QueryIntent::AskInReply => {
            if let Some(result) = &answer.ask_rewrite_result {
                out.push_str(&format!(
                    "{} {}\n",
                    style("did you mean:").yellow(),
                    result.query_rewrite
                ));
            }
        }
        QueryIntent::EntitySelect => {
            if let Some(result) = &answer.ask_entity_select {
                out.push_str(&format!(
                    "{}\n",
                    style("ambiguous entities — pick one and re-ask:").yellow()
                ));
                for (entity, options) in &result.entity_select_info {
                    out.push_str(&format!("  {}\n", style(entity).bold()));
                    for option in options {
                        let mut fields: Vec<String> =
                            option.iter().map(|(k, v)| format!("{k}={v}")).collect();
                        fields.sort();
                        out.push_str(&format!("    - {}\n", fields.join(", ")));
                    }
                }
            }
        }
        QueryIntent::RejectSearch => {
            out.push_str(&format!(
                "{}\n",
                style("This question is outside the configured data scope.").dim()
            ));
        }
        // Unrecognized intent tags render an error fallback rather than
        // guessing at a payload.
        QueryIntent::Unknown => {
            out.push_str(&format!(
                "{}\n",
                style("The server returned an answer this client does not understand.").red()
            ));
            for (source, message) in &answer.error_log {
                out.push_str(&format!("  {}: {}\n", style(source).red(), message));
            }
        }
    }

    if !answer.suggested_question.is_empty() {
        out.push_str(&format!("{}\n", style("suggested:").dim()));
        for question in &answer.suggested_question {
            out.push_str(&format!("  {} {}\n", style("·").dim(), question));
        }
    }
    out
}

fn push_sql_result(out: &mut String, result: &SqlSearchResult, density: Density) {
    if !result.sql.is_empty() {
        out.push_str(&format!("{}\n", style(&result.sql).dim()));
    }
    if let Some(table) = data_table(&result.sql_data, density) {
        out.push_str(&format!("{table}\n"));
    }
    if !result.data_analyse.is_empty() {
        out.push_str(&format!("{} {}\n", style("insights:").bold(), result.data_analyse));
    }
}

fn push_agent_result(out: &mut String, result: &AgentSearchResult, density: Density) {
    for task in &result.agent_sql_search_result {
        out.push_str(&format!("{}\n", style(&task.sub_task_query).bold()));
        push_sql_result(out, &task.sql_search_result, density);
    }
    if !result.agent_summary.is_empty() {
        out.push_str(&format!("{} {}\n", style("summary:").bold(), result.agent_summary));
    }
}

pub fn render_status_line(frame: &StatusFrame) -> String {
    let symbol = match frame.content.status {
        StatusKind::InProgress => style("…").yellow(),
        StatusKind::End => style("✓").green(),
        StatusKind::Error | StatusKind::Rejected => style("✗").red(),
    };
    format!("  {} {}", symbol, style(&frame.content.text).dim())
}

pub fn render_sessions(sessions: &[Session], current_id: &str) -> String {
    let mut out = String::new();
    for (idx, session) in sessions.iter().enumerate() {
        let marker = if session.session_id == current_id {
            style("*").cyan().bold().to_string()
        } else {
            " ".to_string()
        };
        out.push_str(&format!(
            "{marker} [{idx}] {}  {}\n",
            session.title,
            style(&session.session_id).dim()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn table_uses_first_row_as_header() {
        let rows = vec![
            vec!["region".into(), "revenue".into()],
            vec!["EMEA".into(), 1250.5.into()],
            vec!["APAC".into(), Value::Null],
        ];
        let table = data_table(&rows, Density::Comfortable).expect("table");
        let rendered = table.to_string();
        assert!(rendered.contains("region"));
        assert!(rendered.contains("EMEA"));
        assert!(rendered.contains("1250.5"));
    }

    #[test]
    fn empty_data_renders_no_table() {
        assert!(data_table(&[], Density::Comfortable).is_none());
    }

    #[test]
    fn unknown_intent_renders_error_fallback() {
        let answer = Answer {
            query_intent: QueryIntent::Unknown,
            error_log: HashMap::from([("intent".to_string(), "galaxy_search".to_string())]),
            ..Default::default()
        };
        let rendered = render_answer(&answer, Density::Compact);
        assert!(rendered.contains("does not understand"));
        assert!(rendered.contains("galaxy_search"));
    }

    #[test]
    fn failed_human_turn_carries_retry_hint() {
        let turn = Turn::Human {
            content: "q".to_string(),
            delivery: Delivery::Failed,
        };
        assert!(render_turn(&turn, Density::Comfortable).contains("/retry"));
    }
}
