//! Terminal driver: reads lines from stdin and routes them through the companion.

use crate::companion::{Companion, Outbound};
use crate::config::{self, ModelConfig};
use crate::db::{ChatSession, Store, UserSettings};
use crate::gemini::GeminiClient;
use crate::logging;
use crate::mood::{MoodLedger, MoodLevel};
use chrono::{Local, Utc};
use std::error::Error;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

const LOG_RETENTION_DAYS: i64 = 7;
const STATS_WINDOW_DAYS: u32 = 7;
const MOOD_USAGE: &str = "Usage: /mood <1-5> [note]";

const HELP: &str = "Commands:
  /mood <1-5> [note]  Record how you're feeling
  /stats              Mood average and trend for the last 7 days
  /name [name]        Set or clear your name
  /clear              Start a fresh conversation
  /export             Write your chat history to a text file
  /quit               Save this session and exit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Say(String),
    Mood { value: f64, note: Option<String> },
    Stats,
    Name(Option<String>),
    Clear,
    Export,
    Help,
    Quit,
    Empty,
    Invalid(String),
}

impl Command {
    pub fn parse(line: &str) -> Command {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Command::Say(line.to_string());
        };

        let (name, args) = match rest.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (rest, ""),
        };

        match name.to_lowercase().as_str() {
            "mood" => parse_mood(args),
            "stats" => Command::Stats,
            "name" => Command::Name(Some(args.to_string()).filter(|a| !a.is_empty())),
            "clear" => Command::Clear,
            "export" => Command::Export,
            "help" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => Command::Invalid(format!("Unknown command /{}. Type /help for a list.", other)),
        }
    }
}

fn parse_mood(args: &str) -> Command {
    let (value, note) = match args.split_once(char::is_whitespace) {
        Some((value, note)) => (value, Some(note.trim().to_string())),
        None => (args, None),
    };

    match value.parse::<f64>() {
        Ok(v) if (1.0..=5.0).contains(&v) => Command::Mood {
            value: v,
            note: note.filter(|n| !n.is_empty()),
        },
        _ => Command::Invalid(MOOD_USAGE.to_string()),
    }
}

fn speaker_line(settings: &UserSettings, speaker: &str, text: &str) -> String {
    if settings.show_timestamps {
        format!("[{}] {}: {}", Local::now().format("%H:%M"), speaker, text)
    } else {
        format!("{}: {}", speaker, text)
    }
}

fn print_outbound(settings: &UserSettings, out: &[Outbound]) {
    for item in out {
        println!("{}\n", speaker_line(settings, "SerenityAI", item.text()));
    }
}

/// Archive the session if the user said anything in it
fn archive(store: &Store, companion: &Companion, ended: bool) {
    let end_time = ended.then(Utc::now);
    save_snapshot(store, &companion.to_chat_session(end_time));
}

fn save_snapshot(store: &Store, session: &ChatSession) {
    if !session.messages.iter().any(|m| m.is_user) {
        return;
    }
    if let Err(e) = store.save_session(session) {
        logging::log_error(Some(&session.id), &format!("Failed to archive session: {}", e));
    }
}

/// Settings and the ended session are written only when the name changed.
async fn rename(
    store: &Store,
    companion: &mut Companion,
    settings: &mut UserSettings,
    name: Option<String>,
) -> Option<String> {
    let previous = companion.to_chat_session(Some(Utc::now()));
    let greeting = companion.set_display_name(name.clone()).await?;

    settings.user_name = name;
    if let Err(e) = store.save_settings(settings) {
        logging::log_error(None, &format!("Failed to save settings: {}", e));
    }
    save_snapshot(store, &previous);
    Some(greeting)
}

fn print_stats(ledger: &MoodLedger) {
    println!("Mood entries recorded: {}", ledger.len());
    match ledger.average(STATS_WINDOW_DAYS) {
        Some(avg) => println!(
            "{}-day average: {:.1} ({})",
            STATS_WINDOW_DAYS,
            avg,
            MoodLevel::from_value(avg).label()
        ),
        None => println!("No mood entries in the last {} days.", STATS_WINDOW_DAYS),
    }
    match ledger.trend(STATS_WINDOW_DAYS) {
        Some(trend) => println!("{}.", trend.describe()),
        None => println!("Not enough entries for a trend yet."),
    }
    println!();
}

fn export_history(store: &Store) -> Result<std::path::PathBuf, Box<dyn Error + Send + Sync>> {
    let text = store.export_session_history()?;
    let path = config::data_dir().join(format!(
        "serenity-chat-history-{}.txt",
        Local::now().format("%Y-%m-%d")
    ));
    std::fs::write(&path, text)?;
    logging::log_storage(&format!("Exported chat history to {}", path.display()));
    Ok(path)
}

pub async fn run() -> Result<(), Box<dyn Error + Send + Sync>> {
    if let Err(e) = logging::init_logging(&config::log_dir()) {
        eprintln!("Failed to initialize logging: {}", e);
    }
    if let Err(e) = logging::cleanup_old_logs(LOG_RETENTION_DAYS) {
        eprintln!("Failed to clean up old logs: {}", e);
    }

    let store = Arc::new(Store::open(&config::database_path())?);
    let mut settings = store.load_settings();
    let ledger = MoodLedger::open(store.clone());

    let api_key = config::api_key_from_env()?;
    let client = GeminiClient::new(&api_key, ModelConfig::from_env())?;
    let mut companion = Companion::new(Arc::new(client), settings.user_name.clone());

    let greeting = companion.start().await;
    println!("{}\n", speaker_line(&settings, "SerenityAI", &greeting));
    println!("(Type /help for commands.)\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match Command::parse(&line) {
            Command::Empty => {}
            Command::Say(text) => {
                let out = companion.send(&text).await;
                print_outbound(&settings, &out);
            }
            Command::Mood { value, note } => {
                let entry = ledger.record(value, note);
                companion.note_mood(entry.value);
                println!(
                    "Recorded mood {} ({}).\n",
                    entry.value,
                    MoodLevel::from_value(entry.value).label()
                );
            }
            Command::Stats => print_stats(&ledger),
            Command::Name(name) => {
                match rename(&store, &mut companion, &mut settings, name).await {
                    Some(greeting) => println!("{}\n", speaker_line(&settings, "SerenityAI", &greeting)),
                    None => println!("Name unchanged.\n"),
                }
            }
            Command::Clear => {
                archive(&store, &companion, true);
                let greeting = companion.clear_chat().await;
                println!("{}\n", speaker_line(&settings, "SerenityAI", &greeting));
            }
            Command::Export => {
                archive(&store, &companion, false);
                match export_history(&store) {
                    Ok(path) => println!("Chat history written to {}\n", path.display()),
                    Err(e) => eprintln!("Export failed: {}\n", e),
                }
            }
            Command::Help => println!("{}\n", HELP),
            Command::Quit => break,
            Command::Invalid(message) => println!("{}\n", message),
        }
    }

    archive(&store, &companion, true);
    logging::log_conversation(Some(companion.session_id()), "Session closed");
    Ok(())
}
