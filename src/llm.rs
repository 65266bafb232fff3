//! Language-model collaborator
//!
//! The core only assembles prompt text; answering it is delegated to a
//! [`LanguageModel`]. [`ChatClient`] talks to an OpenAI-compatible chat
//! completion endpoint (Groq by default).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};

pub const DEFAULT_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "llama3-70b-8192";

const API_KEY_VAR: &str = "GROQ_API_KEY";
const MODEL_VAR: &str = "GROQ_MODEL";
const ENDPOINT_VAR: &str = "GROQ_ENDPOINT";

/// Answers an assembled prompt with free text
pub trait LanguageModel {
    fn ask(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: String,
}

/// Blocking chat-completion client
pub struct ChatClient {
    agent: ureq::Agent,
    api_key: String,
    model: String,
    endpoint: String,
}

impl ChatClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        let agent = ureq::Agent::new_with_config(
            ureq::Agent::config_builder()
                .timeout_global(Some(Duration::from_secs(60)))
                .http_status_as_error(false)
                .build(),
        );

        Self {
            agent,
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    /// Build a client from `GROQ_API_KEY`, honouring `GROQ_MODEL` and
    /// `GROQ_ENDPOINT` when set
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_VAR)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(Error::MissingApiKey(API_KEY_VAR))?;

        let mut client = Self::new(api_key);
        if let Ok(model) = std::env::var(MODEL_VAR) {
            client = client.with_model(model);
        }
        if let Ok(endpoint) = std::env::var(ENDPOINT_VAR) {
            client = client.with_endpoint(endpoint);
        }
        Ok(client)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn request_body(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };
        Ok(serde_json::to_string(&request)?)
    }
}

/// First choice's message content of a chat-completion response body
fn parse_reply(body: &str) -> Result<String> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| Error::LanguageModel(format!("malformed response: {}", e)))?;
    response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| Error::LanguageModel("response has no choices".to_string()))
}

impl LanguageModel for ChatClient {
    fn ask(&self, prompt: &str) -> Result<String> {
        let body = self.request_body(prompt)?;
        info!("Asking {} ({} prompt chars)", self.model, prompt.chars().count());

        let resp = self
            .agent
            .post(&self.endpoint)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .send(body.as_str())
            .map_err(|e| Error::LanguageModel(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .into_body()
            .read_to_string()
            .map_err(|e| Error::LanguageModel(format!("unreadable response: {}", e)))?;

        if !status.is_success() {
            warn!("Language model returned HTTP {}", status);
            return Err(Error::LanguageModel(format!("HTTP {}: {}", status, text)));
        }

        parse_reply(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_request_body_shape() {
        let client = ChatClient::new("key").with_model("test-model");
        let body: Value = serde_json::from_str(&client.request_body("Hi").unwrap()).unwrap();
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Hi");
    }

    #[test]
    fn test_parse_reply() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"42"}}]}"#;
        assert_eq!(parse_reply(body).unwrap(), "42");

        assert!(matches!(parse_reply(r#"{"choices":[]}"#), Err(Error::LanguageModel(_))));
        assert!(matches!(parse_reply("oops"), Err(Error::LanguageModel(_))));
    }

    #[test]
    fn test_defaults() {
        let client = ChatClient::new("key");
        assert_eq!(client.model, DEFAULT_MODEL);
        assert_eq!(client.endpoint, DEFAULT_ENDPOINT);
    }
}
