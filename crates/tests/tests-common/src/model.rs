//! A language model that answers from a script.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use query_engine_translation::translation::{LanguageModel, ModelError};

enum Reply {
    Text(String),
    Failure,
    Stall,
}

/// Returns the same reply to every prompt and remembers the prompts it saw.
pub struct ScriptedModel {
    reply: Reply,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    /// Reply with a JSON object carrying the query and its description.
    pub fn returning(sql: &str, description: &str) -> Self {
        let reply = serde_json::json!({ "sql": sql, "description": description });
        Self::replying(&reply.to_string())
    }

    /// Reply with exactly this text.
    pub fn replying(text: &str) -> Self {
        Self::with(Reply::Text(text.to_string()))
    }

    /// Fail every call, as an unreachable model would.
    pub fn failing() -> Self {
        Self::with(Reply::Failure)
    }

    /// Never answer.
    pub fn stalled() -> Self {
        Self::with(Reply::Stall)
    }

    fn with(reply: Reply) -> Self {
        ScriptedModel {
            reply,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts lock").clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        self.prompts
            .lock()
            .expect("prompts lock")
            .push(prompt.to_string());

        match &self.reply {
            Reply::Text(text) => Ok(text.clone()),
            Reply::Failure => Err(ModelError::Status {
                status: 503,
                body: "model overloaded".to_string(),
            }),
            Reply::Stall => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ModelError::EmptyReply)
            }
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
