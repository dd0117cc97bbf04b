use crate::logging;
use crate::model::{ConversationTurn, LanguageModel, ModelRequest};
use crate::prompts::{
    self, APOLOGY_REPLY, GIBBERISH_REPLY, GREETING_TOKENS, NAME_UNKNOWN_REPLY, VALID_GREETINGS,
};
use crate::safety::contains_any;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use uuid::Uuid;

/// Last 5 exchanges
pub const MAX_HISTORY_TURNS: usize = 10;
const GIBBERISH_RUN_LENGTH: usize = 5;
const SHORT_MESSAGE_CHARS: usize = 10;

const NAME_PHRASES: &[&str] = &["name", "who am i", "how do you know", "how did you know"];

const POSITIVE_WORDS: &[&str] = &["hope", "happy", "good", "better", "positive", "strength", "improve"];
const NEGATIVE_WORDS: &[&str] = &["sad", "angry", "difficult", "hard", "worse", "struggle", "pain"];

// ============ Conversation State ============

/// Per-session dialogue state, owned by the caller and passed into every call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    session_id: String,
    history: VecDeque<ConversationTurn>,
    display_name: Option<String>,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ConversationState {
    pub fn new(display_name: Option<String>) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            history: VecDeque::with_capacity(MAX_HISTORY_TURNS + 1),
            display_name: clean_name(display_name),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn history(&self) -> &VecDeque<ConversationTurn> {
        &self.history
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    fn push_turn(&mut self, turn: ConversationTurn) {
        push_capped(&mut self.history, turn);
    }
}

fn push_capped(history: &mut VecDeque<ConversationTurn>, turn: ConversationTurn) {
    history.push_back(turn);
    while history.len() > MAX_HISTORY_TURNS {
        history.pop_front();
    }
}

fn clean_name(name: Option<String>) -> Option<String> {
    name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

// ============ Outcomes ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

/// How a reply was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKind {
    Model,
    Greeting,
    Gibberish,
    Identity,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConverseOutcome {
    pub reply: ConversationTurn,
    pub sentiment: Sentiment,
    pub kind: ReplyKind,
}

impl ConverseOutcome {
    fn local(text: impl Into<String>, sentiment: Sentiment, kind: ReplyKind) -> Self {
        Self {
            reply: ConversationTurn::assistant(text),
            sentiment,
            kind,
        }
    }

    pub fn text(&self) -> &str {
        &self.reply.text
    }

    pub fn used_model(&self) -> bool {
        self.kind == ReplyKind::Model
    }
}

// ============ Heuristics ============

/// Too short (unless a known greeting), letterless, or a 5+ run of one character
pub fn is_gibberish(text: &str) -> bool {
    let normalized = text.trim().to_lowercase();
    if VALID_GREETINGS.contains(&normalized.as_str()) {
        return false;
    }
    if normalized.chars().count() < 2 {
        return true;
    }
    if !text.chars().any(|c| c.is_ascii_alphabetic()) {
        return true;
    }
    has_repeated_run(text, GIBBERISH_RUN_LENGTH)
}

fn has_repeated_run(text: &str, run: usize) -> bool {
    let mut previous = None;
    let mut count = 0;
    for c in text.chars() {
        if previous == Some(c) {
            count += 1;
        } else {
            previous = Some(c);
            count = 1;
        }
        if count >= run {
            return true;
        }
    }
    false
}

/// Word-list heuristic over the reply text
pub fn analyze_sentiment(text: &str) -> Sentiment {
    let lower = text.to_lowercase();
    let count = |words: &[&str]| -> usize { words.iter().map(|w| lower.matches(w).count()).sum() };

    let positive = count(POSITIVE_WORDS);
    let negative = count(NEGATIVE_WORDS);

    if positive > negative {
        Sentiment::Positive
    } else if negative > positive {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

fn is_name_question(normalized: &str) -> bool {
    contains_any(normalized, NAME_PHRASES)
}

fn answer_name_question(normalized: &str, display_name: Option<&str>) -> ConverseOutcome {
    match display_name {
        None => ConverseOutcome::local(NAME_UNKNOWN_REPLY, Sentiment::Neutral, ReplyKind::Identity),
        Some(name) if normalized.contains("how") => ConverseOutcome::local(
            prompts::name_source_reply(name),
            Sentiment::Positive,
            ReplyKind::Identity,
        ),
        Some(name) => ConverseOutcome::local(
            prompts::name_known_reply(name),
            Sentiment::Positive,
            ReplyKind::Identity,
        ),
    }
}

// ============ Orchestrator ============

pub struct ConversationOrchestrator {
    model: Arc<dyn LanguageModel>,
}

impl ConversationOrchestrator {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Answer one user message that already passed the safety gate.
    ///
    /// Local answers (name questions, gibberish, short greetings) never touch the model
    /// or the history. A model failure yields a neutral apology and leaves `state`
    /// exactly as it was, so the same message can be retried.
    pub async fn converse(&self, text: &str, state: &mut ConversationState) -> ConverseOutcome {
        let normalized = text.trim().to_lowercase();

        if is_name_question(&normalized) {
            logging::log_conversation(Some(state.session_id()), "Answered name question locally");
            return answer_name_question(&normalized, state.display_name());
        }

        if is_gibberish(text) {
            logging::log_conversation(Some(state.session_id()), "Gibberish input, asking to rephrase");
            return ConverseOutcome::local(GIBBERISH_REPLY, Sentiment::Neutral, ReplyKind::Gibberish);
        }

        if text.chars().count() < SHORT_MESSAGE_CHARS
            && state.len() <= 1
            && contains_any(&normalized, GREETING_TOKENS)
        {
            return ConverseOutcome::local(
                prompts::short_greeting(state.display_name()),
                Sentiment::Positive,
                ReplyKind::Greeting,
            );
        }

        let mut pending = state.history.clone();
        push_capped(&mut pending, ConversationTurn::user(text));

        let request = ModelRequest {
            system_instruction: prompts::system_instruction(state.display_name()),
            history: pending.iter().cloned().collect(),
        };

        logging::log_conversation(
            Some(state.session_id()),
            &format!(
                "Dispatching to {} with {} turns",
                self.model.name(),
                request.history.len()
            ),
        );

        match self.model.generate(request).await {
            Ok(response) => {
                let reply = ConversationTurn::assistant(response.text);
                push_capped(&mut pending, reply.clone());
                state.history = pending;

                let sentiment = analyze_sentiment(&reply.text);
                ConverseOutcome {
                    reply,
                    sentiment,
                    kind: ReplyKind::Model,
                }
            }
            Err(e) => {
                logging::log_error(
                    Some(state.session_id()),
                    &format!("Model call failed: {}", e),
                );
                ConverseOutcome::local(APOLOGY_REPLY, Sentiment::Neutral, ReplyKind::Fallback)
            }
        }
    }

    /// Start the session over: new id, empty history, then one acknowledgement
    /// from the model seeded as the greeting turn.
    pub async fn reset(&self, state: &mut ConversationState) -> ConversationTurn {
        state.history.clear();
        state.session_id = Uuid::new_v4().to_string();

        let request = ModelRequest {
            system_instruction: prompts::system_instruction(state.display_name()),
            history: Vec::new(),
        };

        let greeting = match self.model.generate(request).await {
            Ok(response) => response.text,
            Err(e) => {
                logging::log_error(
                    Some(state.session_id()),
                    &format!("Session acknowledgement failed, using local greeting: {}", e),
                );
                prompts::session_greeting(state.display_name())
            }
        };

        let turn = ConversationTurn::assistant(greeting);
        state.push_turn(turn.clone());

        logging::log_conversation(Some(state.session_id()), "Session reset");
        turn
    }

    /// Change the display name; a real change resets the session.
    pub async fn set_display_name(
        &self,
        state: &mut ConversationState,
        display_name: Option<String>,
    ) -> Option<ConversationTurn> {
        let display_name = clean_name(display_name);
        if display_name == state.display_name {
            return None;
        }
        state.display_name = display_name;
        Some(self.reset(state).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::model::Role;
    use crate::testing::ScriptedModel;

    fn orchestrator(model: &Arc<ScriptedModel>) -> ConversationOrchestrator {
        ConversationOrchestrator::new(model.clone())
    }

    #[test]
    fn test_gibberish_detection() {
        assert!(!is_gibberish("hi"));
        assert!(!is_gibberish("Hello there"));
        assert!(!is_gibberish("ok"));
        assert!(!is_gibberish("I feel fine"));
        assert!(is_gibberish("aaaaa"));
        assert!(is_gibberish("noooooo"));
        assert!(is_gibberish("1234567"));
        assert!(is_gibberish("?!?!"));
        assert!(is_gibberish(""));
        assert!(is_gibberish(" k "));
    }

    #[test]
    fn test_sentiment() {
        assert_eq!(analyze_sentiment("I hope things get better"), Sentiment::Positive);
        assert_eq!(analyze_sentiment("That sounds difficult and sad"), Sentiment::Negative);
        assert_eq!(analyze_sentiment("Tell me more."), Sentiment::Neutral);
        assert_eq!(analyze_sentiment("good days and hard days"), Sentiment::Neutral);
        // occurrences, not distinct words
        assert_eq!(analyze_sentiment("Hard, hard times, but good."), Sentiment::Negative);
    }

    #[tokio::test]
    async fn test_name_question_without_name() {
        let model = Arc::new(ScriptedModel::default());
        let mut state = ConversationState::new(None);

        let outcome = orchestrator(&model).converse("what's my name", &mut state).await;

        assert_eq!(outcome.text(), NAME_UNKNOWN_REPLY);
        assert_eq!(outcome.kind, ReplyKind::Identity);
        assert_eq!(outcome.sentiment, Sentiment::Neutral);
        assert_eq!(model.call_count(), 0);
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn test_name_question_with_name() {
        let model = Arc::new(ScriptedModel::default());
        let mut state = ConversationState::new(Some("Maya".to_string()));
        let orch = orchestrator(&model);

        let outcome = orch.converse("Who am I?", &mut state).await;
        assert_eq!(outcome.text(), "Your name is Maya. How can I help you today?");
        assert_eq!(outcome.sentiment, Sentiment::Positive);

        let outcome = orch.converse("how did you know that", &mut state).await;
        assert!(outcome.text().starts_with("You told me your name is Maya"));
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_name_check_runs_before_gibberish() {
        let model = Arc::new(ScriptedModel::default());
        let mut state = ConversationState::new(None);
        let outcome = orchestrator(&model).converse("name!!!!!", &mut state).await;
        assert_eq!(outcome.kind, ReplyKind::Identity);
    }

    #[tokio::test]
    async fn test_gibberish_skips_model_and_history() {
        let model = Arc::new(ScriptedModel::default());
        let mut state = ConversationState::new(None);

        let outcome = orchestrator(&model).converse("zzzzzzzz", &mut state).await;

        assert_eq!(outcome.text(), GIBBERISH_REPLY);
        assert_eq!(outcome.kind, ReplyKind::Gibberish);
        assert_eq!(model.call_count(), 0);
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn test_short_greeting_fast_path() {
        let model = Arc::new(ScriptedModel::default());
        let mut state = ConversationState::new(Some("Sam".to_string()));

        let outcome = orchestrator(&model).converse("hey!", &mut state).await;

        assert_eq!(outcome.text(), "Hi Sam! How are you feeling today?");
        assert_eq!(outcome.kind, ReplyKind::Greeting);
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_greeting_goes_to_model_once_conversation_started() {
        let model = Arc::new(ScriptedModel::replying(&["First reply", "Hello again!"]));
        let mut state = ConversationState::new(None);
        let orch = orchestrator(&model);

        orch.converse("I had a long day at work", &mut state).await;
        let outcome = orch.converse("hello", &mut state).await;

        assert_eq!(outcome.kind, ReplyKind::Model);
        assert_eq!(outcome.text(), "Hello again!");
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn test_model_turn_appends_pair() {
        let model = Arc::new(ScriptedModel::replying(&["I hope today gets better for you."]));
        let mut state = ConversationState::new(Some("Maya".to_string()));

        let outcome = orchestrator(&model)
            .converse("Work was rough today", &mut state)
            .await;

        assert_eq!(outcome.kind, ReplyKind::Model);
        assert_eq!(outcome.sentiment, Sentiment::Positive);
        assert_eq!(state.len(), 2);
        assert_eq!(state.history()[0], ConversationTurn::user("Work was rough today"));
        assert_eq!(state.history()[1].role, Role::Assistant);

        let requests = model.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].system_instruction.contains("Your client's name is Maya"));
        assert_eq!(requests[0].history, vec![ConversationTurn::user("Work was rough today")]);
    }

    #[tokio::test]
    async fn test_history_is_capped_fifo() {
        let model = Arc::new(ScriptedModel::default());
        let mut state = ConversationState::new(None);
        let orch = orchestrator(&model);

        for i in 1..=8 {
            orch.converse(&format!("message number {}", i), &mut state).await;
            assert!(state.len() <= MAX_HISTORY_TURNS);
        }

        assert_eq!(state.len(), MAX_HISTORY_TURNS);
        assert_eq!(state.history()[0], ConversationTurn::user("message number 4"));
        assert_eq!(state.history()[8], ConversationTurn::user("message number 8"));
        assert_eq!(state.history()[9].role, Role::Assistant);

        // the request for the 8th message was also capped
        let last = model.requests().pop().unwrap();
        assert_eq!(last.history.len(), MAX_HISTORY_TURNS);
        assert_eq!(last.history.last(), Some(&ConversationTurn::user("message number 8")));
    }

    #[tokio::test]
    async fn test_model_failure_leaves_state_untouched() {
        let model = Arc::new(ScriptedModel::replying(&["That makes sense."]));
        let mut state = ConversationState::new(None);
        let orch = orchestrator(&model);

        orch.converse("I talked to my sister", &mut state).await;
        let before = state.history().clone();

        model.push_reply(Err(ModelError::Api {
            status: 500,
            message: "internal".to_string(),
        }));
        let outcome = orch.converse("She was upset with me", &mut state).await;

        assert_eq!(outcome.text(), APOLOGY_REPLY);
        assert_eq!(outcome.kind, ReplyKind::Fallback);
        assert_eq!(outcome.sentiment, Sentiment::Neutral);
        assert_eq!(state.history(), &before);

        // retry succeeds with the fallback script reply
        let outcome = orch.converse("She was upset with me", &mut state).await;
        assert_eq!(outcome.kind, ReplyKind::Model);
        assert_eq!(state.len(), 4);
    }

    #[tokio::test]
    async fn test_reset_seeds_acknowledgement() {
        let model = Arc::new(ScriptedModel::replying(&[
            "Sure.",
            "Hello Maya! How are you feeling today?",
        ]));
        let mut state = ConversationState::new(Some("Maya".to_string()));
        let orch = orchestrator(&model);

        orch.converse("Just checking in today", &mut state).await;
        let old_session = state.session_id().to_string();

        let greeting = orch.reset(&mut state).await;

        assert_eq!(greeting.text, "Hello Maya! How are you feeling today?");
        assert_eq!(state.len(), 1);
        assert_ne!(state.session_id(), old_session);

        let reset_request = model.requests().pop().unwrap();
        assert!(reset_request.history.is_empty());
        assert!(reset_request.system_instruction.contains("Maya"));
    }

    #[tokio::test]
    async fn test_reset_falls_back_to_local_greeting() {
        let model = Arc::new(ScriptedModel::failing());
        let mut state = ConversationState::new(None);

        let greeting = orchestrator(&model).reset(&mut state).await;

        assert_eq!(greeting.text, "Hello! How are you feeling today?");
        assert_eq!(state.len(), 1);
    }

    #[tokio::test]
    async fn test_display_name_change_resets() {
        let model = Arc::new(ScriptedModel::default());
        let mut state = ConversationState::new(None);
        let orch = orchestrator(&model);

        orch.converse("Tell me something calming", &mut state).await;
        assert_eq!(state.len(), 2);

        let turn = orch.set_display_name(&mut state, Some("  Ari ".to_string())).await;
        assert!(turn.is_some());
        assert_eq!(state.display_name(), Some("Ari"));
        assert_eq!(state.len(), 1);

        let calls = model.call_count();
        assert!(orch.set_display_name(&mut state, Some("Ari".to_string())).await.is_none());
        assert_eq!(model.call_count(), calls);
    }
}
