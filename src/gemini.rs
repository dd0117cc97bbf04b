use crate::config::ModelConfig;
use crate::error::ModelError;
use crate::model::{ConversationTurn, LanguageModel, ModelRequest, ModelResponse, Role};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const BLOCK_THRESHOLD: &str = "BLOCK_MEDIUM_AND_ABOVE";
const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Part {
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: String,
    threshold: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: ErrorDetails,
}

#[derive(Debug, Deserialize)]
struct ErrorDetails {
    message: String,
    #[serde(default)]
    status: String,
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    config: ModelConfig,
}

impl GeminiClient {
    pub fn new(api_key: &str, config: ModelConfig) -> Result<Self, ModelError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| ModelError::Network(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            config,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", GEMINI_API_BASE, self.config.model)
    }

    fn build_request(&self, contents: Vec<Content>) -> GenerateContentRequest {
        GenerateContentRequest {
            contents,
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                top_k: self.config.top_k,
                top_p: self.config.top_p,
                max_output_tokens: self.config.max_output_tokens,
            },
            safety_settings: HARM_CATEGORIES
                .iter()
                .map(|category| SafetySetting {
                    category: category.to_string(),
                    threshold: BLOCK_THRESHOLD.to_string(),
                })
                .collect(),
        }
    }

    /// Send the system instruction plus conversation history and return the reply text
    pub async fn generate_content(
        &self,
        system_instruction: &str,
        history: &[ConversationTurn],
    ) -> Result<String, ModelError> {
        let request = self.build_request(build_contents(system_instruction, history));

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();
            return Err(parse_api_error(status, &error_text));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;
        extract_text(&body)
    }

    /// Validate the API key with a tiny request
    pub async fn validate_api_key(&self) -> Result<bool, ModelError> {
        let check = [ConversationTurn::user("Say 'ok'")];
        match self.generate_content("Reply with one word.", &check).await {
            Ok(_) => Ok(true),
            Err(ModelError::Api { status: 400 | 401 | 403, .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        let text = self
            .generate_content(&request.system_instruction, &request.history)
            .await?;
        Ok(ModelResponse { text })
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}

/// Convert history into provider contents.
/// The system instruction goes first as a user content; assistant turns use the `model` role.
pub fn build_contents(system_instruction: &str, history: &[ConversationTurn]) -> Vec<Content> {
    let mut contents = Vec::with_capacity(history.len() + 1);
    contents.push(Content {
        role: "user".to_string(),
        parts: vec![Part {
            text: system_instruction.to_string(),
        }],
    });

    for turn in history {
        let role = match turn.role {
            Role::User => "user",
            Role::Assistant => "model",
        };
        contents.push(Content {
            role: role.to_string(),
            parts: vec![Part {
                text: turn.text.clone(),
            }],
        });
    }

    contents
}

fn parse_api_error(status: u16, body: &str) -> ModelError {
    let message = match serde_json::from_str::<GeminiError>(body) {
        Ok(parsed) if parsed.error.status.is_empty() => parsed.error.message,
        Ok(parsed) => format!("{} - {}", parsed.error.status, parsed.error.message),
        Err(_) => body.to_string(),
    };
    ModelError::Api { status, message }
}

fn extract_text(body: &str) -> Result<String, ModelError> {
    let parsed: GenerateContentResponse =
        serde_json::from_str(body).map_err(|e| ModelError::Parse(e.to_string()))?;

    let text: String = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(ModelError::EmptyResponse);
    }
    Ok(text)
}
