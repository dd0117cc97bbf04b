// System instruction and the orchestrator's fixed replies

pub const GIBBERISH_REPLY: &str = "I didn't quite catch that. Could you please rephrase?";

pub const APOLOGY_REPLY: &str = "I apologize, but I'm having trouble processing that right now. Could you rephrase that, or shall we explore a different aspect of what you're feeling?";

pub const NAME_UNKNOWN_REPLY: &str = "I don't know your name yet. Would you like to tell me your name?";

/// Greetings that are never treated as gibberish
pub const VALID_GREETINGS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "good morning",
    "good afternoon",
    "good evening",
    "hi there",
    "hello there",
    "greetings",
];

/// Tokens that trigger the short-greeting fast path
pub const GREETING_TOKENS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "good morning",
    "good afternoon",
    "good evening",
];

pub fn name_known_reply(name: &str) -> String {
    format!("Your name is {}. How can I help you today?", name)
}

pub fn name_source_reply(name: &str) -> String {
    format!(
        "You told me your name is {} when you set it in the settings. I use it to make our conversations more personal. Is there something specific you'd like to talk about?",
        name
    )
}

/// Fast-path reply to a short greeting
pub fn short_greeting(display_name: Option<&str>) -> String {
    match display_name {
        Some(name) => format!("Hi {}! How are you feeling today?", name),
        None => "Hi there! How are you feeling today?".to_string(),
    }
}

/// Opening line of a fresh session
pub fn session_greeting(display_name: Option<&str>) -> String {
    match display_name {
        Some(name) => format!("Hello {}! How are you feeling today?", name),
        None => "Hello! How are you feeling today?".to_string(),
    }
}

/// Build the per-turn system instruction.
/// A known name adds the personalization block; the safety protocol is always last.
pub fn system_instruction(display_name: Option<&str>) -> String {
    let greeting_name = display_name.map(|n| format!(" {}", n)).unwrap_or_default();

    let personalization = match display_name {
        Some(name) => format!(
            r#"

Personalization:
- Your client's name is {name}
- Use their name occasionally in responses to build rapport
- Use their name especially when:
  * Greeting them
  * Acknowledging important feelings
  * Providing support
  * Making key suggestions"#
        ),
        None => String::new(),
    };

    format!(
        r#"You are an empathetic AI therapist. Follow these guidelines:

Response Style:
- Keep responses concise and natural
- Only provide therapeutic responses to meaningful input
- If input is gibberish or random characters, respond with "{GIBBERISH_REPLY}"
- For very short or unclear messages, ask for clarification instead of making assumptions
- Initial greeting should be simple: "Hello{greeting_name}! How are you feeling today?"

Core Principles:
- Don't over-interpret vague or nonsensical input
- Ask for clarification when needed
- Stay grounded and practical
- Maintain professional boundaries
- Never diagnose or give medical advice{personalization}

Safety Protocol:
If crisis signs appear:
1. Provide crisis hotline (988)
2. Urge professional help
3. Offer immediate support"#
    )
}
