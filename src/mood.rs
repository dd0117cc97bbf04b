//! Mood ledger: append-only mood samples with windowed aggregation.

use crate::error::StoreError;
use crate::logging;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

pub const MIN_MOOD: f64 = 1.0;
pub const MAX_MOOD: f64 = 5.0;
const MS_PER_DAY: i64 = 86_400_000;
const TREND_THRESHOLD: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodEntry {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub note: Option<String>,
}

impl MoodEntry {
    /// Value is clamped into [1, 5]; NaN is treated as the minimum.
    pub fn new(value: f64, note: Option<String>, timestamp: DateTime<Utc>) -> Self {
        let value = if value.is_nan() {
            MIN_MOOD
        } else {
            value.clamp(MIN_MOOD, MAX_MOOD)
        };
        Self {
            timestamp,
            value,
            note: note.filter(|n| !n.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoodTrend {
    Improving,
    Declining,
    Stable,
}

impl MoodTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoodTrend::Improving => "improving",
            MoodTrend::Declining => "declining",
            MoodTrend::Stable => "stable",
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            MoodTrend::Improving => "Your mood is improving",
            MoodTrend::Declining => "Your mood is declining",
            MoodTrend::Stable => "Your mood is stable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoodLevel {
    VeryLow,
    Low,
    Neutral,
    Good,
    VeryGood,
}

impl MoodLevel {
    pub fn from_value(value: f64) -> Self {
        if value <= 1.0 {
            MoodLevel::VeryLow
        } else if value <= 2.0 {
            MoodLevel::Low
        } else if value <= 3.0 {
            MoodLevel::Neutral
        } else if value <= 4.0 {
            MoodLevel::Good
        } else {
            MoodLevel::VeryGood
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MoodLevel::VeryLow => "Very Low",
            MoodLevel::Low => "Low",
            MoodLevel::Neutral => "Neutral",
            MoodLevel::Good => "Good",
            MoodLevel::VeryGood => "Very Good",
        }
    }
}

/// Durable backing for the ledger
pub trait MoodStore: Send + Sync {
    fn load_mood_entries(&self) -> Result<Vec<MoodEntry>, StoreError>;
    fn append_mood_entry(&self, entry: &MoodEntry) -> Result<(), StoreError>;
    fn clear_mood_entries(&self) -> Result<(), StoreError>;
}

pub struct MoodLedger {
    entries: Mutex<Vec<MoodEntry>>,
    store: Option<Arc<dyn MoodStore>>,
}

impl Default for MoodLedger {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl MoodLedger {
    pub fn in_memory() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            store: None,
        }
    }

    /// Load existing entries; an unreadable store starts the ledger empty.
    pub fn open(store: Arc<dyn MoodStore>) -> Self {
        let entries = match store.load_mood_entries() {
            Ok(entries) => {
                logging::log_mood(&format!("Loaded {} mood entries", entries.len()));
                entries
            }
            Err(e) => {
                logging::log_error(None, &format!("Failed to load mood entries: {}", e));
                Vec::new()
            }
        };

        Self {
            entries: Mutex::new(entries),
            store: Some(store),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<MoodEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn record(&self, value: f64, note: Option<String>) -> MoodEntry {
        self.record_at(value, note, Utc::now())
    }

    /// Append under the ledger lock so aggregation never sees a partial write.
    pub fn record_at(&self, value: f64, note: Option<String>, timestamp: DateTime<Utc>) -> MoodEntry {
        let entry = MoodEntry::new(value, note, timestamp);
        let mut entries = self.lock();

        if let Some(store) = &self.store {
            if let Err(e) = store.append_mood_entry(&entry) {
                logging::log_error(None, &format!("Failed to persist mood entry: {}", e));
            }
        }
        entries.push(entry.clone());

        logging::log_mood(&format!("Recorded mood {:.1}", entry.value));
        entry
    }

    pub fn entries(&self) -> Vec<MoodEntry> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        let mut entries = self.lock();
        if let Some(store) = &self.store {
            if let Err(e) = store.clear_mood_entries() {
                logging::log_error(None, &format!("Failed to clear mood entries: {}", e));
            }
        }
        entries.clear();
        logging::log_mood("Cleared mood entries");
    }

    fn window(&self, window_days: u32, now: DateTime<Utc>) -> Vec<MoodEntry> {
        let span = Duration::milliseconds(i64::from(window_days) * MS_PER_DAY);
        self.lock()
            .iter()
            .filter(|e| now - e.timestamp <= span)
            .cloned()
            .collect()
    }

    pub fn average(&self, window_days: u32) -> Option<f64> {
        self.average_at(window_days, Utc::now())
    }

    /// Mean value inside the window, `None` when the window is empty
    pub fn average_at(&self, window_days: u32, now: DateTime<Utc>) -> Option<f64> {
        mean(&self.window(window_days, now))
    }

    pub fn trend(&self, window_days: u32) -> Option<MoodTrend> {
        self.trend_at(window_days, Utc::now())
    }

    /// Compare the two halves of the time-sorted window; needs at least 2 entries.
    pub fn trend_at(&self, window_days: u32, now: DateTime<Utc>) -> Option<MoodTrend> {
        let mut recent = self.window(window_days, now);
        if recent.len() < 2 {
            return None;
        }
        recent.sort_by_key(|e| e.timestamp);

        let (first, second) = recent.split_at(recent.len() / 2);
        let difference = mean(second)? - mean(first)?;

        Some(if difference > TREND_THRESHOLD {
            MoodTrend::Improving
        } else if difference < -TREND_THRESHOLD {
            MoodTrend::Declining
        } else {
            MoodTrend::Stable
        })
    }
}

fn mean(entries: &[MoodEntry]) -> Option<f64> {
    if entries.is_empty() {
        return None;
    }
    Some(entries.iter().map(|e| e.value).sum::<f64>() / entries.len() as f64)
}
