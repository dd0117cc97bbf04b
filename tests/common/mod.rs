use async_trait::async_trait;
use serenity_lib::{LanguageModel, ModelError, ModelRequest, ModelResponse};
use std::collections::VecDeque;
use std::sync::Mutex;

const FALLBACK_REPLY: &str = "I'm here with you. Tell me more.";

/// Model stand-in: answers from a queue, then with `FALLBACK_REPLY`.
#[derive(Default)]
pub struct QueuedModel {
    replies: Mutex<VecDeque<Result<String, ModelError>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl QueuedModel {
    pub fn new(replies: Vec<Result<String, ModelError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for QueuedModel {
    async fn generate(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        self.requests.lock().unwrap().push(request);
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(ModelResponse { text }),
            Some(Err(e)) => Err(e),
            None => Ok(ModelResponse {
                text: FALLBACK_REPLY.to_string(),
            }),
        }
    }

    fn name(&self) -> &str {
        "queued"
    }
}
