use crate::error::StoreError;
use crate::logging;
use crate::mood::{MoodEntry, MoodStore};
use chrono::{DateTime, Local, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

/// Oldest sessions beyond this are pruned on save
pub const MAX_SESSIONS: usize = 50;

// ============ Settings ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    HighContrast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FontSize {
    Small,
    #[default]
    Medium,
    Large,
    XLarge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageSpacing {
    Compact,
    #[default]
    Comfortable,
    Spacious,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    pub number: String,
    pub relationship: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSettings {
    pub user_name: Option<String>,
    pub voice_enabled: bool,
    pub theme: Theme,
    pub language: String,
    pub font_size: FontSize,
    pub message_spacing: MessageSpacing,
    pub sound_enabled: bool,
    pub auto_scroll: bool,
    pub send_with_enter: bool,
    pub show_timestamps: bool,
    pub notifications: bool,
    pub use_keyboard_shortcuts: bool,
    pub high_contrast_mode: bool,
    pub screen_reader_optimized: bool,
    pub show_mood_tracking: bool,
    pub show_breathing_exercises: bool,
    pub show_resources_panel: bool,
    pub emergency_contacts: Vec<EmergencyContact>,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            user_name: None,
            voice_enabled: true,
            theme: Theme::Light,
            language: "en".to_string(),
            font_size: FontSize::Medium,
            message_spacing: MessageSpacing::Comfortable,
            sound_enabled: true,
            auto_scroll: true,
            send_with_enter: true,
            show_timestamps: false,
            notifications: true,
            use_keyboard_shortcuts: true,
            high_contrast_mode: false,
            screen_reader_optimized: false,
            show_mood_tracking: true,
            show_breathing_exercises: true,
            show_resources_panel: true,
            emergency_contacts: Vec::new(),
        }
    }
}

// ============ Chat Sessions ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feedback {
    Helpful,
    NotHelpful,
}

impl Feedback {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feedback::Helpful => "helpful",
            Feedback::NotHelpful => "not_helpful",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "helpful" => Some(Feedback::Helpful),
            "not_helpful" => Some(Feedback::NotHelpful),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub is_user: bool,
    pub timestamp: DateTime<Utc>,
    pub feedback: Option<Feedback>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub messages: Vec<ChatMessage>,
    pub mood_before: Option<f64>,
    pub mood_after: Option<f64>,
    pub summary: Option<String>,
}

fn to_millis(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| StoreError::Corrupt(format!("invalid timestamp {}", ms)))
}

// ============ Store ============

/// SQLite-backed persistence for moods, settings, and archived sessions.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        logging::log_storage(&format!("Opened database at {}", path.display()));
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;

            -- Mood samples, timestamps in epoch milliseconds
            CREATE TABLE IF NOT EXISTS mood_entries (
                id INTEGER PRIMARY KEY,
                timestamp INTEGER NOT NULL,
                value REAL NOT NULL,
                note TEXT
            );

            -- Single-row JSON settings blob
            CREATE TABLE IF NOT EXISTS settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Archived chat sessions
            CREATE TABLE IF NOT EXISTS chat_sessions (
                id TEXT PRIMARY KEY,
                start_time INTEGER NOT NULL,
                end_time INTEGER,
                mood_before REAL,
                mood_after REAL,
                summary TEXT,
                saved_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS chat_messages (
                id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                text TEXT NOT NULL,
                is_user INTEGER NOT NULL,
                timestamp INTEGER NOT NULL,
                feedback TEXT,
                PRIMARY KEY (session_id, id),
                FOREIGN KEY (session_id) REFERENCES chat_sessions(id) ON DELETE CASCADE
            );
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_connection<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError>,
    {
        let mut conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut conn)
    }

    // ============ Settings ============

    /// Stored settings, or defaults when missing or unreadable
    pub fn load_settings(&self) -> UserSettings {
        let result = self.with_connection(|conn| {
            let data: Option<String> = conn
                .query_row("SELECT data FROM settings WHERE id = 1", [], |row| row.get(0))
                .optional()?;
            match data {
                Some(json) => Ok(Some(serde_json::from_str::<UserSettings>(&json)?)),
                None => Ok(None),
            }
        });

        match result {
            Ok(Some(settings)) => settings,
            Ok(None) => UserSettings::default(),
            Err(e) => {
                logging::log_error(None, &format!("Failed to load settings, using defaults: {}", e));
                UserSettings::default()
            }
        }
    }

    pub fn save_settings(&self, settings: &UserSettings) -> Result<(), StoreError> {
        let json = serde_json::to_string(settings)?;
        let now = Utc::now().to_rfc3339();
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO settings (id, data, updated_at) VALUES (1, ?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET data = ?1, updated_at = ?2",
                params![json, now],
            )?;
            Ok(())
        })?;
        logging::log_storage("Saved settings");
        Ok(())
    }

    // ============ Sessions ============

    /// Insert or replace a session, moving it to the front, then prune to `MAX_SESSIONS`.
    pub fn save_session(&self, session: &ChatSession) -> Result<(), StoreError> {
        let saved_at = Utc::now().timestamp_millis();
        let pruned = self.with_connection(|conn| {
            let tx = conn.transaction()?;

            // strictly increasing so back-to-back saves keep their order
            let latest: Option<i64> =
                tx.query_row("SELECT MAX(saved_at) FROM chat_sessions", [], |row| row.get(0))?;
            let saved_at = latest.map_or(saved_at, |l| saved_at.max(l + 1));

            tx.execute(
                "INSERT INTO chat_sessions (id, start_time, end_time, mood_before, mood_after, summary, saved_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                    start_time = ?2, end_time = ?3, mood_before = ?4,
                    mood_after = ?5, summary = ?6, saved_at = ?7",
                params![
                    session.id,
                    to_millis(&session.start_time),
                    session.end_time.as_ref().map(to_millis),
                    session.mood_before,
                    session.mood_after,
                    session.summary,
                    saved_at
                ],
            )?;

            // upsert keeps feedback recorded since the last save
            for (position, message) in session.messages.iter().enumerate() {
                tx.execute(
                    "INSERT INTO chat_messages (id, session_id, position, text, is_user, timestamp, feedback)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(session_id, id) DO UPDATE SET
                        position = excluded.position,
                        text = excluded.text,
                        is_user = excluded.is_user,
                        timestamp = excluded.timestamp,
                        feedback = COALESCE(excluded.feedback, chat_messages.feedback)",
                    params![
                        message.id,
                        session.id,
                        position as i64,
                        message.text,
                        message.is_user,
                        to_millis(&message.timestamp),
                        message.feedback.map(|f| f.as_str())
                    ],
                )?;
            }

            let kept: HashSet<&str> = session.messages.iter().map(|m| m.id.as_str()).collect();
            let stored: Vec<String> = {
                let mut stmt = tx.prepare("SELECT id FROM chat_messages WHERE session_id = ?1")?;
                let ids = stmt
                    .query_map(params![session.id], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                ids
            };
            for id in stored.iter().filter(|id| !kept.contains(id.as_str())) {
                tx.execute(
                    "DELETE FROM chat_messages WHERE session_id = ?1 AND id = ?2",
                    params![session.id, id],
                )?;
            }

            let pruned = tx.execute(
                "DELETE FROM chat_sessions WHERE id NOT IN (
                    SELECT id FROM chat_sessions ORDER BY saved_at DESC LIMIT ?1
                 )",
                params![MAX_SESSIONS as i64],
            )?;

            tx.commit()?;
            Ok(pruned)
        })?;

        logging::log_storage(&format!(
            "Saved session {} ({} messages, pruned {})",
            session.id,
            session.messages.len(),
            pruned
        ));
        Ok(())
    }

    /// Most recently saved first
    pub fn get_sessions(&self) -> Result<Vec<ChatSession>, StoreError> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, start_time, end_time, mood_before, mood_after, summary
                 FROM chat_sessions ORDER BY saved_at DESC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                    row.get::<_, Option<f64>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            })?;
            let heads = rows.collect::<Result<Vec<_>, _>>()?;

            let mut msg_stmt = conn.prepare(
                "SELECT id, text, is_user, timestamp, feedback
                 FROM chat_messages WHERE session_id = ?1 ORDER BY position ASC",
            )?;

            let mut sessions = Vec::with_capacity(heads.len());
            for (id, start, end, mood_before, mood_after, summary) in heads {
                let raw = msg_stmt
                    .query_map(params![id], read_message_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                let messages = raw
                    .into_iter()
                    .map(|(id, text, is_user, ts, feedback)| {
                        Ok(ChatMessage {
                            id,
                            text,
                            is_user,
                            timestamp: from_millis(ts)?,
                            feedback: feedback.as_deref().and_then(Feedback::parse),
                        })
                    })
                    .collect::<Result<Vec<_>, StoreError>>()?;

                sessions.push(ChatSession {
                    id,
                    start_time: from_millis(start)?,
                    end_time: end.map(from_millis).transpose()?,
                    messages,
                    mood_before,
                    mood_after,
                    summary,
                });
            }
            Ok(sessions)
        })
    }

    /// The first still-open session, if any
    pub fn current_session(&self) -> Result<Option<ChatSession>, StoreError> {
        Ok(self
            .get_sessions()?
            .into_iter()
            .find(|s| s.end_time.is_none()))
    }

    /// Returns false when the session or message does not exist.
    pub fn add_message_feedback(
        &self,
        session_id: &str,
        message_id: &str,
        feedback: Feedback,
    ) -> Result<bool, StoreError> {
        let updated = self.with_connection(|conn| {
            let updated = conn.execute(
                "UPDATE chat_messages SET feedback = ?1 WHERE session_id = ?2 AND id = ?3",
                params![feedback.as_str(), session_id, message_id],
            )?;
            Ok(updated > 0)
        })?;

        if updated {
            logging::log_storage(&format!(
                "Feedback {} on message {} in session {}",
                feedback.as_str(),
                message_id,
                session_id
            ));
        }
        Ok(updated)
    }

    /// Plain-text export of every stored session, newest first
    pub fn export_session_history(&self) -> Result<String, StoreError> {
        Ok(format_history(&self.get_sessions()?))
    }

    pub fn clear_history(&self) -> Result<(), StoreError> {
        self.with_connection(|conn| {
            conn.execute("DELETE FROM chat_messages", [])?;
            conn.execute("DELETE FROM chat_sessions", [])?;
            Ok(())
        })?;
        logging::log_storage("Cleared chat history");
        Ok(())
    }
}

fn read_message_row(row: &Row<'_>) -> rusqlite::Result<(String, String, bool, i64, Option<String>)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

pub fn format_history(sessions: &[ChatSession]) -> String {
    let mut out = String::from("SerenityAI Chat History\n\n");

    for (index, session) in sessions.iter().enumerate() {
        out.push_str(&format!("Session {}\n", index + 1));
        out.push_str(&format!(
            "Date: {}\n",
            session.start_time.with_timezone(&Local).format("%Y-%m-%d")
        ));
        out.push_str(&format!("{}\n", "-".repeat(40)));

        for message in &session.messages {
            let speaker = if message.is_user { "You" } else { "SerenityAI" };
            out.push_str(&format!(
                "{} ({}):\n{}\n\n",
                speaker,
                message.timestamp.with_timezone(&Local).format("%H:%M:%S"),
                message.text
            ));
        }

        out.push_str("\n\n");
    }

    out
}

// ============ Mood persistence ============

impl MoodStore for Store {
    fn load_mood_entries(&self) -> Result<Vec<MoodEntry>, StoreError> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT timestamp, value, note FROM mood_entries ORDER BY id ASC",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(ts, value, note)| Ok(MoodEntry::new(value, note, from_millis(ts)?)))
                .collect()
        })
    }

    fn append_mood_entry(&self, entry: &MoodEntry) -> Result<(), StoreError> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO mood_entries (timestamp, value, note) VALUES (?1, ?2, ?3)",
                params![to_millis(&entry.timestamp), entry.value, entry.note],
            )?;
            Ok(())
        })
    }

    fn clear_mood_entries(&self) -> Result<(), StoreError> {
        self.with_connection(|conn| {
            conn.execute("DELETE FROM mood_entries", [])?;
            Ok(())
        })
    }
}
