//! Wellness nudges layered after a model reply.
//!
//! A suggestion is derived from the turn count and the most recent user turns; when
//! none fires, a periodic safety reminder may be shown instead.

use crate::safety::{contains_any, BREATHING_SUGGESTION, NEGATIVE_MOOD_TERMS, STRESS_TERMS};
use rand::seq::IndexedRandom;
use rand::RngCore;
use serde::{Deserialize, Serialize};

pub const MIN_TURNS_FOR_SUGGESTIONS: usize = 5;
pub const GENERAL_WELLNESS_INTERVAL: usize = 5;
pub const SAFETY_REMINDER_INTERVAL: usize = 10;
const RECENT_WINDOW: usize = 3;

pub const MOOD_TRACKING_SUGGESTION: &str = "I'd like to check in on how you're feeling. Would you like to track your mood? You can:
• Click outside the text box and press 'M'
• Or click the menu icon and select \"Track Mood\"
This can help us better understand your emotions and track your well-being over time.";

pub const GENERAL_WELLNESS_SUGGESTION: &str = "I care about your well-being. You can access these features by clicking outside the text box and using shortcuts, or using the menu:
• Track your mood (Press 'M' or use menu)
• Try breathing exercises (Press 'B' or use menu)
• View your mood history (Press 'H' or use menu)
• Access support resources (Press 'R' or use menu)
Would you like to try any of these?";

pub const SAFETY_REMINDERS: &[&str] = &[
    "I am SerenityAI, your therapeutic companion focused on emotional support.",
    "I cannot provide medical diagnoses or replace professional medical care.",
    "If you're experiencing a medical emergency, please contact emergency services.",
    "I maintain strict ethical boundaries and cannot assist with harmful activities.",
    "Your privacy and safety are my top priorities.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WellnessSuggestion {
    Breathing,
    MoodTracking,
    GeneralWellness,
}

impl WellnessSuggestion {
    pub fn text(&self) -> &'static str {
        match self {
            WellnessSuggestion::Breathing => BREATHING_SUGGESTION,
            WellnessSuggestion::MoodTracking => MOOD_TRACKING_SUGGESTION,
            WellnessSuggestion::GeneralWellness => GENERAL_WELLNESS_SUGGESTION,
        }
    }
}

/// The optional assistant turn that follows a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrailingTurn {
    Wellness(WellnessSuggestion),
    SafetyReminder(&'static str),
}

/// True when `text` is one of our own injected suggestions or reminders
pub fn is_injected_text(text: &str) -> bool {
    let trimmed = text.trim();
    [
        BREATHING_SUGGESTION,
        MOOD_TRACKING_SUGGESTION,
        GENERAL_WELLNESS_SUGGESTION,
    ]
    .iter()
    .chain(SAFETY_REMINDERS.iter())
    .any(|injected| *injected == trimmed)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WellnessAdvisor;

impl WellnessAdvisor {
    pub fn new() -> Self {
        Self
    }

    /// Decide a wellness suggestion from user-authored texts, oldest first
    pub fn maybe_suggest<S: AsRef<str>>(
        &self,
        turn_count: usize,
        recent_user_texts: &[S],
    ) -> Option<WellnessSuggestion> {
        if turn_count < MIN_TURNS_FOR_SUGGESTIONS {
            return None;
        }

        let genuine: Vec<&str> = recent_user_texts
            .iter()
            .map(|t| t.as_ref())
            .filter(|t| !is_injected_text(t))
            .collect();
        if genuine.is_empty() {
            return None;
        }

        let start = genuine.len().saturating_sub(RECENT_WINDOW);
        let joined = genuine[start..].join(" ").to_lowercase();

        if contains_any(&joined, STRESS_TERMS) {
            Some(WellnessSuggestion::Breathing)
        } else if contains_any(&joined, NEGATIVE_MOOD_TERMS) {
            Some(WellnessSuggestion::MoodTracking)
        } else if turn_count % GENERAL_WELLNESS_INTERVAL == 0 {
            Some(WellnessSuggestion::GeneralWellness)
        } else {
            None
        }
    }

    pub fn should_show_safety_reminder(&self, turn_count: usize) -> bool {
        turn_count > 0 && turn_count % SAFETY_REMINDER_INTERVAL == 0
    }

    pub fn safety_reminder(&self, rng: &mut dyn RngCore) -> &'static str {
        SAFETY_REMINDERS
            .choose(rng)
            .copied()
            .unwrap_or(SAFETY_REMINDERS[0])
    }

    /// Wellness suggestion first; the reminder only when no suggestion fired
    pub fn trailing_turn<S: AsRef<str>>(
        &self,
        turn_count: usize,
        recent_user_texts: &[S],
        rng: &mut dyn RngCore,
    ) -> Option<TrailingTurn> {
        if let Some(suggestion) = self.maybe_suggest(turn_count, recent_user_texts) {
            return Some(TrailingTurn::Wellness(suggestion));
        }
        if self.should_show_safety_reminder(turn_count) {
            return Some(TrailingTurn::SafetyReminder(self.safety_reminder(rng)));
        }
        None
    }
}
