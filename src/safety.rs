//! Safety gate: a priority-ordered rule table over normalized message text.
//!
//! Messages that match a rule are answered with a canned response and never reach
//! the model. Rules are data, evaluated in ascending priority; the first match wins.

use rand::seq::IndexedRandom;
use rand::RngCore;
use serde::{Deserialize, Serialize};

// ============ Vocabulary ============

pub const BLOCKED_TERMS: &[&str] = &[
    "gemini", "gpt", "openai", "chatgpt", "anthropic", "claude", "hack", "exploit", "bypass",
    "crack", "steal",
];

pub const CRISIS_TERMS: &[&str] = &[
    "suicide",
    "kill myself",
    "want to die",
    "wanna die",
    "end my life",
    "hurt myself",
    "self harm",
    "self-harm",
    "cut myself",
    "don't want to live",
    "dont want to live",
    "better off dead",
];

/// Crisis phrasing that selects the self-harm variant, unless suicidal wording is also present
const SELF_HARM_TERMS: &[&str] = &["hurt myself", "self harm", "self-harm", "cut myself"];
const SUICIDAL_MARKERS: &[&str] = &["suicide", "die", "dead", "kill myself", "end my life", "want to live"];

pub const STRESS_TERMS: &[&str] = &[
    "stressed",
    "anxiety",
    "anxious",
    "overwhelmed",
    "panic",
    "worried",
    "stress",
    "cant breathe",
    "can't breathe",
    "racing",
    "nervous",
    "tense",
    "pressure",
    "freaking out",
    "scared",
];

pub const NEGATIVE_MOOD_TERMS: &[&str] = &[
    "sad", "depressed", "lonely", "upset", "angry", "frustrated", "tired", "exhausted", "hopeless",
    "miserable", "worthless", "hate", "crying",
];

const IDENTITY_QUESTIONS: &[&str] = &[
    "who are you",
    "who r u",
    "what are you",
    "what r u",
    "whats ur name",
    "what's your name",
    "your name",
    "ur name",
    "who is this",
    "what is this",
];

const INJECTION_TERMS: &[&str] = &[
    "pretend",
    "roleplay",
    "ignore previous",
    "system prompt",
    "you are not",
];

const CLEAR_CHAT_TERMS: &[&str] = &["clear chat", "delete chat", "reset chat"];
const MENU_TERMS: &[&str] = &["menu", "features", "what can you do"];
const SETTINGS_TERMS: &[&str] = &["settings", "customize", "preferences"];

// ============ Canned Responses ============

pub const CLEAR_CHAT_HELP: &str = "You can clear the chat in two ways:
• Click outside the text box and press 'C'
• Or click the menu icon and select \"Clear Chat\"
This will reset our conversation while keeping the initial greeting.";

pub const MENU_HELP: &str = "The menu (plus icon) at the bottom left contains several helpful features:
• Track Mood (M) - Log how you're feeling
• Mood History (H) - View your mood patterns
• Breathing Exercise (B) - Guided breathing
• Emergency Resources (R) - Crisis support
• Settings (S) - Customize the app
• Clear Chat (C) - Reset conversation
You can either click these in the menu or use the keyboard shortcuts (shown in parentheses) when not typing.";

pub const SETTINGS_HELP: &str = "You can access settings in two ways:
• Click outside the text box and press 'S'
• Or click the gear icon in the top right
Here you can customize:
• Theme (light/dark)
• Text size
• Message spacing
• Sound effects
• Notifications
• Keyboard shortcuts
And more!";

pub const CRISIS_RESPONSE: &str = "I'm very concerned about what you're telling me. Your life has value, and there are people who want to help:

IMMEDIATE HELP AVAILABLE 24/7:
• Emergency: Call 911 (US) or your local emergency number
• 988 Suicide & Crisis Lifeline: Call or text 988
• Crisis Text Line: Text HOME to 741741

Would you like me to:
1. Share more crisis resources?
2. Help you create a safety plan?
3. Talk about what's causing these feelings?

Please know you're not alone in this. Professional help is available and can make a real difference.";

pub const SELF_HARM_RESPONSE: &str = "I'm concerned about your thoughts of self-harm. Your pain is real, but hurting yourself isn't the answer. Help is available:

• Call 988 for immediate support (24/7)
• Text HOME to 741741 to reach Crisis Text Line
• Reach out to a trusted friend, family member, or counselor

Would you like to:
1. Talk about what's causing these thoughts?
2. Learn about alternatives to self-harm?
3. Get connected with professional support?

You deserve support and care, not harm.";

pub const BREATHING_SUGGESTION: &str = "I notice you're feeling stressed. Would you like to try a breathing exercise? You can:
• Click outside the text box and press 'B'
• Or click the menu icon and select \"Breathing Exercise\"
Taking a few deep breaths together might help you feel more centered.";

pub const IDENTITY_RESPONSE: &str = "I am SerenityAI, your therapeutic companion. I'm here to provide emotional support and a safe space for conversation. I want to be clear that I'm an AI designed to listen and support you, but I'm not a replacement for professional mental health care.";

pub const BLOCKED_RESPONSE: &str = "I am SerenityAI, focused on providing emotional support within ethical boundaries. I cannot assist with that request.";

pub const INJECTION_RESPONSES: &[&str] = &[
    "I am SerenityAI, and I'm designed to provide emotional support within ethical boundaries. I cannot assist with that request.",
    "That goes beyond my ethical guidelines as SerenityAI. I'm here to help with emotional well-being in a safe, responsible way.",
    "As SerenityAI, my purpose is to support your emotional health while maintaining strict ethical standards. I cannot help with that.",
];

// ============ Rule Table ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateCategory {
    Navigation,
    Crisis,
    Stress,
    Identity,
    BlockedTerm,
    PromptInjection,
}

impl GateCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateCategory::Navigation => "navigation",
            GateCategory::Crisis => "crisis",
            GateCategory::Stress => "stress",
            GateCategory::Identity => "identity",
            GateCategory::BlockedTerm => "blocked_term",
            GateCategory::PromptInjection => "prompt_injection",
        }
    }
}

/// Matchers and responders receive the normalized (lowercased, trimmed) text.
pub type Matcher = fn(&str) -> bool;
pub type Responder = fn(&str, &mut dyn RngCore) -> &'static str;

#[derive(Clone, Copy)]
pub struct SafetyRule {
    pub priority: u8,
    pub category: GateCategory,
    pub matcher: Matcher,
    pub responder: Responder,
}

impl std::fmt::Debug for SafetyRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafetyRule")
            .field("priority", &self.priority)
            .field("category", &self.category)
            .finish()
    }
}

impl SafetyRule {
    pub fn matches(&self, normalized: &str) -> bool {
        (self.matcher)(normalized)
    }

    pub fn respond(&self, normalized: &str, rng: &mut dyn RngCore) -> &'static str {
        (self.responder)(normalized, rng)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Pass,
    Intercept {
        category: GateCategory,
        response: String,
    },
}

impl GateDecision {
    pub fn is_intercepted(&self) -> bool {
        matches!(self, GateDecision::Intercept { .. })
    }

    pub fn response(&self) -> Option<&str> {
        match self {
            GateDecision::Intercept { response, .. } => Some(response),
            GateDecision::Pass => None,
        }
    }

    pub fn category(&self) -> Option<GateCategory> {
        match self {
            GateDecision::Intercept { category, .. } => Some(*category),
            GateDecision::Pass => None,
        }
    }
}

pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

pub fn contains_any(text: &str, terms: &[&str]) -> bool {
    terms.iter().any(|term| text.contains(term))
}

fn is_navigation(text: &str) -> bool {
    contains_any(text, CLEAR_CHAT_TERMS)
        || contains_any(text, MENU_TERMS)
        || contains_any(text, SETTINGS_TERMS)
}

fn navigation_help(text: &str, _rng: &mut dyn RngCore) -> &'static str {
    if contains_any(text, CLEAR_CHAT_TERMS) {
        CLEAR_CHAT_HELP
    } else if contains_any(text, MENU_TERMS) {
        MENU_HELP
    } else {
        SETTINGS_HELP
    }
}

fn is_crisis(text: &str) -> bool {
    contains_any(text, CRISIS_TERMS)
}

fn crisis_response(text: &str, _rng: &mut dyn RngCore) -> &'static str {
    if contains_any(text, SELF_HARM_TERMS) && !contains_any(text, SUICIDAL_MARKERS) {
        SELF_HARM_RESPONSE
    } else {
        CRISIS_RESPONSE
    }
}

fn is_stress(text: &str) -> bool {
    contains_any(text, STRESS_TERMS)
}

fn breathing_response(_text: &str, _rng: &mut dyn RngCore) -> &'static str {
    BREATHING_SUGGESTION
}

fn is_identity_question(text: &str) -> bool {
    contains_any(text, IDENTITY_QUESTIONS)
}

fn identity_response(_text: &str, _rng: &mut dyn RngCore) -> &'static str {
    IDENTITY_RESPONSE
}

fn is_blocked(text: &str) -> bool {
    contains_any(text, BLOCKED_TERMS)
}

fn blocked_response(_text: &str, _rng: &mut dyn RngCore) -> &'static str {
    BLOCKED_RESPONSE
}

fn is_injection(text: &str) -> bool {
    contains_any(text, INJECTION_TERMS)
}

fn injection_response(_text: &str, rng: &mut dyn RngCore) -> &'static str {
    INJECTION_RESPONSES
        .choose(rng)
        .copied()
        .unwrap_or(BLOCKED_RESPONSE)
}

/// The default rule table, in priority order
pub fn default_rules() -> Vec<SafetyRule> {
    vec![
        SafetyRule {
            priority: 1,
            category: GateCategory::Navigation,
            matcher: is_navigation,
            responder: navigation_help,
        },
        SafetyRule {
            priority: 2,
            category: GateCategory::Crisis,
            matcher: is_crisis,
            responder: crisis_response,
        },
        SafetyRule {
            priority: 3,
            category: GateCategory::Stress,
            matcher: is_stress,
            responder: breathing_response,
        },
        SafetyRule {
            priority: 4,
            category: GateCategory::Identity,
            matcher: is_identity_question,
            responder: identity_response,
        },
        SafetyRule {
            priority: 5,
            category: GateCategory::BlockedTerm,
            matcher: is_blocked,
            responder: blocked_response,
        },
        SafetyRule {
            priority: 6,
            category: GateCategory::PromptInjection,
            matcher: is_injection,
            responder: injection_response,
        },
    ]
}

// ============ Gate ============

#[derive(Debug, Clone)]
pub struct SafetyGate {
    rules: Vec<SafetyRule>,
}

impl Default for SafetyGate {
    fn default() -> Self {
        Self::with_rules(default_rules())
    }
}

impl SafetyGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a gate from a custom table; rules are sorted by priority
    pub fn with_rules(mut rules: Vec<SafetyRule>) -> Self {
        rules.sort_by_key(|r| r.priority);
        Self { rules }
    }

    pub fn rules(&self) -> &[SafetyRule] {
        &self.rules
    }

    /// Classify using the thread-local RNG for rotating responses
    pub fn classify(&self, text: &str) -> GateDecision {
        self.classify_with_rng(text, &mut rand::rng())
    }

    pub fn classify_with_rng(&self, text: &str, rng: &mut dyn RngCore) -> GateDecision {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return GateDecision::Pass;
        }

        self.rules
            .iter()
            .find(|rule| rule.matches(&normalized))
            .map(|rule| GateDecision::Intercept {
                category: rule.category,
                response: rule.respond(&normalized, rng).to_string(),
            })
            .unwrap_or(GateDecision::Pass)
    }
}
