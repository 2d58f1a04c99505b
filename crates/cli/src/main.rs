//! DataChat CLI
//!
//! Conversational BI from the terminal: a chat loop over the datachat
//! client core. Questions go out over one persistent WebSocket; streamed
//! status lines and final answers print as they arrive.

mod logging;
mod render;

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use clap::Parser;
use console::style;
use datachat_client::auth::{AuthMode, StaticToken};
use datachat_client::locale::Language;
use datachat_client::prefs::{Density, Prefs};
use datachat_client::{ChatClient, ClientConfig, ClientEvent, ToastLevel};
use datachat_protocol::{ExtraParams, FeedbackRequest, FeedbackType, Turn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

#[derive(Parser, Debug)]
#[command(
    name = "datachat",
    version,
    about = "Ask questions of your data from the terminal"
)]
struct Cli {
    /// WebSocket endpoint of the query backend
    #[arg(long, env = "DATACHAT_WS_URL", default_value = "ws://127.0.0.1:8000/qa/ws")]
    ws_url: String,

    /// Base URL of the HTTP API (history, options, feedback)
    #[arg(long, env = "DATACHAT_API_URL", default_value = "http://127.0.0.1:8000/api")]
    api_url: String,

    #[arg(long, env = "DATACHAT_USER_ID", default_value = "anonymous")]
    user_id: String,

    #[arg(long, env = "DATACHAT_USERNAME", default_value = "anonymous")]
    username: String,

    /// Bearer token; when set, unauthorized frames end the session
    #[arg(long, env = "DATACHAT_TOKEN")]
    token: Option<String>,

    /// Model id (defaults to the backend's first configured model)
    #[arg(long, env = "DATACHAT_MODEL")]
    model: Option<String>,

    /// Data profile (defaults to the backend's first configured profile)
    #[arg(long, env = "DATACHAT_PROFILE")]
    profile: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _logging = logging::init_logging()?;

    let prefs_path = Prefs::default_path();
    let prefs = prefs_path
        .as_deref()
        .map(Prefs::load)
        .unwrap_or_default();
    let density = Arc::new(Mutex::new(prefs.density));

    let auth = match &cli.token {
        Some(token) => AuthMode::Bearer(Arc::new(StaticToken::new(token.clone()))),
        None => AuthMode::Disabled,
    };
    let config = ClientConfig {
        ws_url: cli.ws_url.clone(),
        api_url: cli.api_url.clone(),
        user_id: cli.user_id.clone(),
        username: cli.username.clone(),
        auth,
        default_model: cli.model.clone().unwrap_or_default(),
        default_profile: cli.profile.clone().unwrap_or_default(),
    };

    let client = ChatClient::new(config, prefs.language);
    tokio::spawn(print_events(client.clone(), density.clone()));

    client.connect();
    client.refresh_defaults().await;
    client.load_history(&client.current_session_id()).await;

    println!(
        "{}",
        style("datachat — type a question, or /help for commands").dim()
    );
    repl(&client, &density, prefs_path.as_deref()).await;
    Ok(())
}

/// Background task: translate client events into terminal output.
async fn print_events(client: ChatClient, density: Arc<Mutex<Density>>) {
    let mut rx = client.subscribe();
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(
                    component = "cli",
                    event = "events.lagged",
                    skipped = skipped,
                    "Event channel lagged; some output was dropped"
                );
                continue;
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
        };

        match event {
            ClientEvent::Connected => {
                println!("{}", style("· connected").dim());
            }
            ClientEvent::Disconnected { reason } => {
                println!("{}", style(format!("· disconnected: {reason}")).dim());
            }
            ClientEvent::ReconnectGaveUp { attempts } => {
                println!(
                    "{}",
                    style(format!(
                        "✗ gave up reconnecting after {attempts} attempts — /connect to retry"
                    ))
                    .red()
                );
            }
            ClientEvent::StatusUpdated { session_id } => {
                // Only the newest visible line; earlier ones already printed.
                if let Some(frame) = client.visible_status(&session_id).last() {
                    println!("{}", render::render_status_line(frame));
                }
            }
            ClientEvent::AnswerCommitted { session_id } => {
                let answer_turn = client
                    .sessions()
                    .into_iter()
                    .find(|s| s.session_id == session_id)
                    .and_then(|s| s.messages.into_iter().rev().find(|t| !t.is_human()));
                if let Some(turn) = answer_turn {
                    let density = *density.lock().unwrap_or_else(PoisonError::into_inner);
                    println!("{}", render::render_turn(&turn, density));
                }
            }
            ClientEvent::HistoryLoading {
                session_id,
                loading: true,
            } => {
                println!(
                    "{}",
                    style(format!("· loading history for {session_id}")).dim()
                );
            }
            ClientEvent::Toast { level, message } => {
                let text = client.locale().translate(message);
                match level {
                    ToastLevel::Info => println!("{}", style(format!("· {text}")).dim()),
                    ToastLevel::Error => println!("{}", style(format!("✗ {text}")).red()),
                }
            }
            ClientEvent::Unauthorized => {
                println!(
                    "{}",
                    style("✗ credential rejected by the backend — check your token").red()
                );
            }
            // Searching markers surface through status lines; list changes
            // surface through /sessions.
            ClientEvent::SearchingChanged { .. }
            | ClientEvent::SessionsChanged
            | ClientEvent::HistoryLoading { .. } => {}
        }
    }
}

async fn repl(client: &ChatClient, density: &Arc<Mutex<Density>>, prefs_path: Option<&std::path::Path>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", style("❯").cyan().bold());
        let _ = std::io::stdout().flush();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) | Err(_) => return,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('/') {
            if !handle_command(client, density, prefs_path, command).await {
                return;
            }
        } else if let Err(e) = client.submit(line, &ExtraParams::default()) {
            println!("{}", style(format!("✗ {e}")).red());
        }
    }
}

/// Dispatch one slash command. Returns false when the REPL should exit.
async fn handle_command(
    client: &ChatClient,
    density: &Arc<Mutex<Density>>,
    prefs_path: Option<&std::path::Path>,
    command: &str,
) -> bool {
    let (name, arg) = match command.split_once(' ') {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };

    match name {
        "help" => print_help(),
        "quit" | "exit" => return false,
        "new" => match client.create_session() {
            Ok(_) => println!("{}", style("· new session").dim()),
            Err(e) => println!("{}", style(format!("✗ {e}")).red()),
        },
        "sessions" => {
            let current = client.current_session_id();
            print!("{}", render::render_sessions(&client.sessions(), &current));
        }
        "switch" => match resolve_session(client, arg) {
            Some(id) => {
                if let Err(e) = client.switch_session(&id).await {
                    println!("{}", style(format!("✗ {e}")).red());
                } else {
                    print_transcript(client, density);
                }
            }
            None => println!("{}", style("✗ no such session").red()),
        },
        "delete" => {
            let target = if arg.is_empty() {
                Some(client.current_session_id())
            } else {
                resolve_session(client, arg)
            };
            match target {
                Some(id) => {
                    if let Err(e) = client.delete_session(&id) {
                        println!("{}", style(format!("✗ {e}")).red());
                    }
                }
                None => println!("{}", style("✗ no such session").red()),
            }
        }
        "rename" => {
            if arg.is_empty() {
                println!("{}", style("usage: /rename <title>").dim());
            } else {
                let id = client.current_session_id();
                if let Err(e) = client.rename_session(&id, arg.to_string()) {
                    println!("{}", style(format!("✗ {e}")).red());
                }
            }
        }
        "retry" => {
            let id = client.current_session_id();
            if let Err(e) = client.retry(&id) {
                println!("{}", style(format!("✗ {e}")).red());
            }
        }
        "history" => print_transcript(client, density),
        "connect" => client.connect(),
        "model" => {
            client.update_query_config(|qc| qc.selected_model = arg.to_string());
        }
        "profile" => {
            client.update_query_config(|qc| qc.selected_profile = arg.to_string());
        }
        "config" => {
            let qc = client.query_config();
            println!(
                "model={} profile={} agent_mode={} top_k={} temperature={}",
                non_empty_or(&qc.selected_model, "<default>"),
                non_empty_or(&qc.selected_profile, "<default>"),
                qc.agent_mode,
                qc.top_k,
                qc.temperature,
            );
        }
        "agent" => {
            client.update_query_config(|qc| qc.agent_mode = !qc.agent_mode);
            println!(
                "{}",
                style(format!("· agent mode {}", if client.query_config().agent_mode { "on" } else { "off" })).dim()
            );
        }
        "lang" => {
            let lang = match arg {
                "en" => Language::En,
                "zh" => Language::Zh,
                _ => {
                    println!("{}", style("usage: /lang <en|zh>").dim());
                    return true;
                }
            };
            client.locale().set(lang);
            save_prefs(density, lang, prefs_path);
        }
        "density" => {
            let toggled = {
                let mut guard = density.lock().unwrap_or_else(PoisonError::into_inner);
                *guard = guard.toggle();
                *guard
            };
            println!("{}", style(format!("· density: {toggled:?}")).dim());
            save_prefs(density, client.locale().get(), prefs_path);
        }
        "feedback" => feedback(client, arg).await,
        other => println!("{}", style(format!("✗ unknown command /{other}")).red()),
    }
    true
}

fn print_help() {
    println!(
        "\
/new                start a fresh session
/sessions           list sessions
/switch <n|id>      switch session and load its history
/delete [n|id]      delete a session (current when omitted)
/rename <title>     rename the current session
/retry              re-send the last failed question
/history            re-print the current transcript
/model <id>         select a model
/profile <name>     select a data profile
/agent              toggle agent (complex question) mode
/config             show the active query configuration
/feedback <up|down> [text]  rate the latest SQL answer; text describes a downvote
/lang <en|zh>       switch language
/density            toggle table density
/connect            reconnect after the client gave up
/quit               exit"
    );
}

/// Accept either a list index from /sessions or a session id.
fn resolve_session(client: &ChatClient, arg: &str) -> Option<String> {
    let sessions = client.sessions();
    if let Ok(idx) = arg.parse::<usize>() {
        return sessions.get(idx).map(|s| s.session_id.clone());
    }
    sessions
        .iter()
        .find(|s| s.session_id == arg)
        .map(|s| s.session_id.clone())
}

fn print_transcript(client: &ChatClient, density: &Arc<Mutex<Density>>) {
    let Some(session) = client.current_session() else {
        return;
    };
    let density = *density.lock().unwrap_or_else(PoisonError::into_inner);
    println!("{}", style(format!("── {} ──", session.title)).bold());
    for turn in &session.messages {
        println!("{}", render::render_turn(turn, density));
    }
}

fn save_prefs(density: &Arc<Mutex<Density>>, language: Language, path: Option<&std::path::Path>) {
    let Some(path) = path else { return };
    let prefs = Prefs {
        density: *density.lock().unwrap_or_else(PoisonError::into_inner),
        language,
    };
    if let Err(e) = prefs.save(path) {
        warn!(
            component = "cli",
            event = "prefs.save_failed",
            path = %path.display(),
            error = %e,
            "Could not persist preferences"
        );
    }
}

/// Parse `/feedback` arguments: a direction plus, for downvotes, free text
/// describing what was wrong with the answer.
fn parse_feedback_arg(arg: &str) -> Option<(FeedbackType, Option<String>)> {
    let (direction, rest) = match arg.split_once(' ') {
        Some((direction, rest)) => (direction, rest.trim()),
        None => (arg, ""),
    };
    match direction {
        "up" => Some((FeedbackType::Upvote, None)),
        "down" => Some((
            FeedbackType::Downvote,
            (!rest.is_empty()).then(|| rest.to_string()),
        )),
        _ => None,
    }
}

/// Rate the most recent SQL answer in the current session.
async fn feedback(client: &ChatClient, arg: &str) {
    let Some((feedback_type, error_description)) = parse_feedback_arg(arg) else {
        println!(
            "{}",
            style("usage: /feedback <up|down> [what went wrong]").dim()
        );
        return;
    };

    let Some(session) = client.current_session() else {
        return;
    };
    let answer = session.messages.iter().rev().find_map(|t| match t {
        Turn::Ai { content } if content.sql_search_result.is_some() => Some(content.clone()),
        _ => None,
    });
    let Some(answer) = answer else {
        println!("{}", style("✗ no SQL answer to rate in this session").red());
        return;
    };

    let sql = answer
        .sql_search_result
        .as_ref()
        .map(|r| r.sql.clone())
        .unwrap_or_default();
    let config = client.config();
    let selected_profile = client.query_config().selected_profile;
    let profile = if selected_profile.is_empty() {
        config.default_profile
    } else {
        selected_profile
    };
    let request = FeedbackRequest {
        feedback_type,
        data_profiles: profile,
        query: answer.query.clone(),
        query_intent: answer.query_intent.as_str().to_string(),
        query_answer: sql,
        session_id: session.session_id.clone(),
        user_id: config.user_id,
        error_description,
        error_categories: None,
        correct_sql_reference: None,
    };
    if client.send_feedback(&request).await.is_ok() {
        println!("{}", style("· feedback recorded").dim());
    }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downvote_carries_the_description() {
        let (feedback_type, description) =
            parse_feedback_arg("down joined the wrong table").expect("parse");
        assert_eq!(feedback_type, FeedbackType::Downvote);
        assert_eq!(description.as_deref(), Some("joined the wrong table"));
    }

    #[test]
    fn bare_directions_parse_without_description() {
        assert_eq!(
            parse_feedback_arg("up"),
            Some((FeedbackType::Upvote, None))
        );
        assert_eq!(
            parse_feedback_arg("down"),
            Some((FeedbackType::Downvote, None))
        );
        assert_eq!(parse_feedback_arg("sideways"), None);
    }
}
