pub mod cli;
pub mod companion;
pub mod config;
pub mod db;
pub mod error;
pub mod gemini;
pub mod logging;
pub mod model;
pub mod mood;
pub mod orchestrator;
pub mod prompts;
pub mod safety;
#[cfg(test)]
pub(crate) mod testing;
pub mod wellness;

pub use companion::{Companion, Origin, Outbound, TranscriptEntry};
pub use config::ModelConfig;
pub use db::{ChatMessage, ChatSession, Feedback, Store, UserSettings};
pub use error::{ModelError, StoreError};
pub use gemini::GeminiClient;
pub use model::{ConversationTurn, LanguageModel, ModelRequest, ModelResponse, Role};
pub use mood::{MoodEntry, MoodLedger, MoodLevel, MoodStore, MoodTrend};
pub use orchestrator::{
    ConversationOrchestrator, ConversationState, ConverseOutcome, ReplyKind, Sentiment,
};
pub use safety::{GateCategory, GateDecision, SafetyGate, SafetyRule};
pub use wellness::{TrailingTurn, WellnessAdvisor, WellnessSuggestion};

pub use cli::run;
