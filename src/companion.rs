//! Per-turn pipeline: gate, converse, then an optional wellness turn.
//!
//! The companion owns the visible transcript. The bounded model history lives in
//! [`ConversationState`] and only changes through the orchestrator.

use crate::db::{ChatMessage, ChatSession};
use crate::logging;
use crate::model::LanguageModel;
use crate::orchestrator::{ConversationOrchestrator, ConversationState, ConverseOutcome};
use crate::safety::{GateCategory, GateDecision, SafetyGate};
use crate::wellness::{TrailingTurn, WellnessAdvisor, WellnessSuggestion};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

const RECENT_USER_TEXTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    User,
    Assistant,
    Wellness,
    Reminder,
}

impl Origin {
    pub fn is_user(&self) -> bool {
        matches!(self, Origin::User)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub id: String,
    pub origin: Origin,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl TranscriptEntry {
    fn new(origin: Origin, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            origin,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Assistant output for one user message, in the order it should be shown
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Intercepted { category: GateCategory, text: String },
    Reply(ConverseOutcome),
    Wellness(WellnessSuggestion),
    SafetyReminder(String),
}

impl Outbound {
    pub fn text(&self) -> &str {
        match self {
            Outbound::Intercepted { text, .. } => text,
            Outbound::Reply(outcome) => outcome.text(),
            Outbound::Wellness(suggestion) => suggestion.text(),
            Outbound::SafetyReminder(text) => text,
        }
    }

    fn origin(&self) -> Origin {
        match self {
            Outbound::Intercepted { .. } | Outbound::Reply(_) => Origin::Assistant,
            Outbound::Wellness(_) => Origin::Wellness,
            Outbound::SafetyReminder(_) => Origin::Reminder,
        }
    }
}

pub struct Companion {
    gate: SafetyGate,
    orchestrator: ConversationOrchestrator,
    advisor: WellnessAdvisor,
    state: ConversationState,
    transcript: Vec<TranscriptEntry>,
    started_at: DateTime<Utc>,
    mood_before: Option<f64>,
    mood_after: Option<f64>,
    rng: Box<dyn RngCore + Send>,
}

impl Companion {
    pub fn new(model: Arc<dyn LanguageModel>, display_name: Option<String>) -> Self {
        Self {
            gate: SafetyGate::default(),
            orchestrator: ConversationOrchestrator::new(model),
            advisor: WellnessAdvisor::new(),
            state: ConversationState::new(display_name),
            transcript: Vec::new(),
            started_at: Utc::now(),
            mood_before: None,
            mood_after: None,
            rng: Box::new(StdRng::from_os_rng()),
        }
    }

    /// Replace the randomness source for rotating responses and reminders
    pub fn with_rng(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    pub fn with_gate(mut self, gate: SafetyGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn session_id(&self) -> &str {
        self.state.session_id()
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    /// Open the session and return the greeting shown to the user.
    pub async fn start(&mut self) -> String {
        self.restart().await
    }

    async fn restart(&mut self) -> String {
        let greeting = self.orchestrator.reset(&mut self.state).await;
        self.begin_session(greeting.text)
    }

    /// New session view: only the greeting, a fresh start time, no moods.
    fn begin_session(&mut self, greeting: String) -> String {
        self.transcript = vec![TranscriptEntry::new(Origin::Assistant, greeting.clone())];
        self.started_at = Utc::now();
        self.mood_before = None;
        self.mood_after = None;
        greeting
    }

    /// Back to a single greeting turn with fresh dialogue state.
    pub async fn clear_chat(&mut self) -> String {
        logging::log_conversation(Some(self.session_id()), "Chat cleared");
        self.restart().await
    }

    /// Returns the new greeting when the name actually changed.
    pub async fn set_display_name(&mut self, display_name: Option<String>) -> Option<String> {
        let greeting = self
            .orchestrator
            .set_display_name(&mut self.state, display_name)
            .await?;
        Some(self.begin_session(greeting.text))
    }

    /// The first mood sample of a session is "before", later ones update "after".
    pub fn note_mood(&mut self, value: f64) {
        if self.mood_before.is_none() {
            self.mood_before = Some(value);
        } else {
            self.mood_after = Some(value);
        }
    }

    pub async fn send(&mut self, text: &str) -> Vec<Outbound> {
        // messages already visible before this one
        let turn_count = self.transcript.len();
        self.transcript.push(TranscriptEntry::new(Origin::User, text));

        if let GateDecision::Intercept { category, response } =
            self.gate.classify_with_rng(text, self.rng.as_mut())
        {
            logging::log_gate(
                Some(self.state.session_id()),
                &format!("Intercepted message as {}", category.as_str()),
            );
            let out = Outbound::Intercepted {
                category,
                text: response,
            };
            self.record(&out);
            return vec![out];
        }

        let outcome = self.orchestrator.converse(text, &mut self.state).await;
        let reply = Outbound::Reply(outcome);
        self.record(&reply);
        let mut out = vec![reply];

        let recent = self.recent_user_texts();
        let trailing = self
            .advisor
            .trailing_turn(turn_count, recent.as_slice(), self.rng.as_mut());

        if let Some(trailing) = trailing {
            let extra = match trailing {
                TrailingTurn::Wellness(suggestion) => {
                    logging::log_wellness(
                        Some(self.state.session_id()),
                        &format!("Suggested {:?} at turn {}", suggestion, turn_count),
                    );
                    Outbound::Wellness(suggestion)
                }
                TrailingTurn::SafetyReminder(text) => {
                    logging::log_wellness(
                        Some(self.state.session_id()),
                        &format!("Safety reminder at turn {}", turn_count),
                    );
                    Outbound::SafetyReminder(text.to_string())
                }
            };
            self.record(&extra);
            out.push(extra);
        }

        out
    }

    fn record(&mut self, out: &Outbound) {
        self.transcript
            .push(TranscriptEntry::new(out.origin(), out.text()));
    }

    /// Last few user-authored texts, oldest first
    fn recent_user_texts(&self) -> Vec<String> {
        let mut texts: Vec<String> = self
            .transcript
            .iter()
            .rev()
            .filter(|e| e.origin.is_user())
            .take(RECENT_USER_TEXTS)
            .map(|e| e.text.clone())
            .collect();
        texts.reverse();
        texts
    }

    /// Snapshot of the visible transcript for the session archive
    pub fn to_chat_session(&self, end_time: Option<DateTime<Utc>>) -> ChatSession {
        ChatSession {
            id: self.state.session_id().to_string(),
            start_time: self.started_at,
            end_time,
            messages: self
                .transcript
                .iter()
                .map(|e| ChatMessage {
                    id: e.id.clone(),
                    text: e.text.clone(),
                    is_user: e.origin.is_user(),
                    timestamp: e.timestamp,
                    feedback: None,
                })
                .collect(),
            mood_before: self.mood_before,
            mood_after: self.mood_after,
            summary: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safety::CRISIS_RESPONSE;
    use crate::testing::ScriptedModel;

    async fn started(model: &Arc<ScriptedModel>, name: Option<&str>) -> Companion {
        let mut companion = Companion::new(model.clone(), name.map(str::to_string))
            .with_rng(StdRng::seed_from_u64(11));
        companion.start().await;
        companion
    }

    #[tokio::test]
    async fn test_start_seeds_transcript() {
        let model = Arc::new(ScriptedModel::replying(&["Hello Maya! How are you feeling today?"]));
        let companion = started(&model, Some("Maya")).await;

        assert_eq!(companion.transcript().len(), 1);
        assert_eq!(companion.transcript()[0].origin, Origin::Assistant);
        assert_eq!(companion.state().len(), 1);
    }

    #[tokio::test]
    async fn test_intercept_skips_model() {
        let model = Arc::new(ScriptedModel::default());
        let mut companion = started(&model, None).await;
        let calls = model.call_count();
        let history = companion.state().history().clone();

        let out = companion.send("I keep thinking about suicide").await;

        assert_eq!(out.len(), 1);
        assert!(matches!(
            &out[0],
            Outbound::Intercepted { category: GateCategory::Crisis, .. }
        ));
        assert_eq!(out[0].text(), CRISIS_RESPONSE);
        assert_eq!(model.call_count(), calls);
        assert_eq!(companion.state().history(), &history);
        assert_eq!(companion.transcript().len(), 3);
    }

    #[tokio::test]
    async fn test_reply_is_recorded() {
        let model = Arc::new(ScriptedModel::replying(&["Hello!", "That sounds like a lot."]));
        let mut companion = started(&model, None).await;

        let out = companion.send("My week has been busy with exams").await;

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text(), "That sounds like a lot.");
        let last = companion.transcript().last().unwrap();
        assert_eq!(last.origin, Origin::Assistant);
        assert_eq!(last.text, "That sounds like a lot.");
    }

    #[tokio::test]
    async fn test_wellness_follows_reply_at_turn_five() {
        let model = Arc::new(ScriptedModel::default());
        let mut companion = started(&model, None).await;

        // transcript: greeting + 2 exchanges = 5 entries before the third message
        companion.send("I went for a walk today").await;
        companion.send("Then I made some tea").await;
        let out = companion.send("I feel lonely in the evenings").await;

        assert_eq!(out.len(), 2);
        assert_eq!(out[1], Outbound::Wellness(WellnessSuggestion::MoodTracking));
        assert_eq!(companion.transcript().last().unwrap().origin, Origin::Wellness);
    }

    #[tokio::test]
    async fn test_injected_turns_do_not_feed_advisor() {
        let model = Arc::new(ScriptedModel::default());
        let mut companion = started(&model, None).await;

        companion.send("I went for a walk today").await;
        companion.send("Then I made some tea").await;
        // turn 5: general wellness fires, its text lists features, not stress terms
        let out = companion.send("I read a little before bed").await;
        assert_eq!(out[1], Outbound::Wellness(WellnessSuggestion::GeneralWellness));

        // turn 8: no suggestion, the injected wellness text is not a user text
        let out = companion.send("The weather was mild").await;
        assert_eq!(out.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_chat_resets_everything() {
        let model = Arc::new(ScriptedModel::default());
        let mut companion = started(&model, None).await;
        let old_session = companion.session_id().to_string();

        companion.send("Work has been a lot lately").await;
        companion.note_mood(2.0);
        companion.clear_chat().await;

        assert_eq!(companion.transcript().len(), 1);
        assert_eq!(companion.state().len(), 1);
        assert_ne!(companion.session_id(), old_session);
        assert_eq!(companion.to_chat_session(None).mood_before, None);
    }

    #[tokio::test]
    async fn test_name_change_restarts_transcript() {
        let model = Arc::new(ScriptedModel::failing());
        let mut companion = started(&model, None).await;
        companion.send("It has been a long week").await;

        let greeting = companion.set_display_name(Some("Ari".to_string())).await;

        assert_eq!(greeting.as_deref(), Some("I'm here with you. Tell me more."));
        assert_eq!(companion.transcript().len(), 1);
        assert!(companion.set_display_name(Some("Ari".to_string())).await.is_none());
    }

    #[tokio::test]
    async fn test_name_change_clears_session_moods() {
        let model = Arc::new(ScriptedModel::default());
        let mut companion = started(&model, None).await;
        companion.note_mood(2.0);
        companion.send("It has been a long week").await;
        companion.note_mood(3.0);

        assert!(companion.set_display_name(Some("Ari".to_string())).await.is_some());

        let session = companion.to_chat_session(None);
        assert_eq!(session.mood_before, None);
        assert_eq!(session.mood_after, None);
        assert_eq!(session.messages.len(), 1);

        // the next sample opens the new session
        companion.note_mood(4.0);
        assert_eq!(companion.to_chat_session(None).mood_before, Some(4.0));
    }

    #[tokio::test]
    async fn test_chat_session_snapshot() {
        let model = Arc::new(ScriptedModel::default());
        let mut companion = started(&model, None).await;
        companion.note_mood(2.0);
        companion.send("Talking helps a bit").await;
        companion.note_mood(3.0);
        companion.note_mood(4.0);

        let end = Utc::now();
        let session = companion.to_chat_session(Some(end));

        assert_eq!(session.id, companion.session_id());
        assert_eq!(session.end_time, Some(end));
        assert_eq!(session.messages.len(), 3);
        assert!(!session.messages[0].is_user);
        assert!(session.messages[1].is_user);
        assert_eq!(session.mood_before, Some(2.0));
        assert_eq!(session.mood_after, Some(4.0));
    }
}
