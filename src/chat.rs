//! Chat-completion providers.
//!
//! A [`ChatModel`] turns a query plus retrieved context into generated text.
//! The context is spliced into the configured system prompt (replacing
//! `{context}`) and the query is sent as the user message.
//!
//! | Config Value | Provider | Endpoint |
//! |-------------|----------|----------|
//! | `"disabled"` | [`DisabledChat`] | — |
//! | `"openai"` | [`OpenAIChat`] | `POST {url}/chat/completions` |
//! | `"ollama"` | [`OllamaChat`] | `POST {url}/api/chat` |

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};

use crate::config::{resolve_api_key, ChatConfig};
use crate::error::RagError;
use crate::http::{self, JsonRequest};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434";

#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;
    /// Generate a reply to `query` grounded in `context`.
    async fn complete(&self, query: &str, context: &str) -> Result<String>;
}

/// Render the system prompt template for the given context.
pub fn render_system_prompt(template: &str, context: &str) -> String {
    if template.contains("{context}") {
        template.replace("{context}", context)
    } else {
        format!("{}\n\n{}", template, context)
    }
}

fn build_messages(system_prompt: &str, query: &str, context: &str) -> Value {
    json!([
        { "role": "system", "content": render_system_prompt(system_prompt, context) },
        { "role": "user", "content": query },
    ])
}

pub struct DisabledChat;

#[async_trait]
impl ChatModel for DisabledChat {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn complete(&self, _query: &str, _context: &str) -> Result<String> {
        Err(RagError::ProviderDisabled {
            label: "Chat",
            kind: "chat",
        }
        .into())
    }
}

// ============ OpenAI ============

pub struct OpenAIChat {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    system_prompt: String,
    temperature: Option<f32>,
    max_retries: u32,
}

impl OpenAIChat {
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("chat.model required for OpenAI provider"))?;
        let api_key = resolve_api_key(&config.api_key, &config.api_key_env)
            .ok_or_else(|| anyhow!("{} environment variable not set", config.api_key_env))?;

        Ok(Self {
            client: http::client(config.timeout_secs)?,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            api_key,
            model,
            system_prompt: config.system_prompt.clone(),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, query: &str, context: &str) -> Result<String> {
        let mut body = json!({
            "model": self.model,
            "messages": build_messages(&self.system_prompt, query, context),
        });
        if let Some(t) = self.temperature {
            body["temperature"] = json!(t);
        }

        let json = http::send_json(
            &self.client,
            JsonRequest {
                service: "OpenAI",
                method: Method::POST,
                url: http::join_url(&self.base_url, "chat/completions"),
                bearer: Some(&self.api_key),
                body: Some(&body),
                max_retries: self.max_retries,
            },
        )
        .await?;

        parse_openai_completion(&json)
    }
}

fn parse_openai_completion(json: &Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}

// ============ Ollama ============

pub struct OllamaChat {
    client: Client,
    base_url: String,
    model: String,
    system_prompt: String,
    temperature: Option<f32>,
    max_retries: u32,
}

impl OllamaChat {
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("chat.model required for Ollama provider"))?;

        Ok(Self {
            client: http::client(config.timeout_secs)?,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| OLLAMA_BASE_URL.to_string()),
            model,
            system_prompt: config.system_prompt.clone(),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl ChatModel for OllamaChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, query: &str, context: &str) -> Result<String> {
        let mut body = json!({
            "model": self.model,
            "messages": build_messages(&self.system_prompt, query, context),
            "stream": false,
        });
        if let Some(t) = self.temperature {
            body["options"] = json!({ "temperature": t });
        }

        let json = http::send_json(
            &self.client,
            JsonRequest {
                service: "Ollama",
                method: Method::POST,
                url: http::join_url(&self.base_url, "api/chat"),
                bearer: None,
                body: Some(&body),
                max_retries: self.max_retries,
            },
        )
        .await?;

        json.pointer("/message/content")
            .and_then(|c| c.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("Invalid Ollama response: missing message.content"))
    }
}

pub fn create_chat_model(config: &ChatConfig) -> Result<Box<dyn ChatModel>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledChat)),
        "openai" => Ok(Box::new(OpenAIChat::new(config)?)),
        "ollama" => Ok(Box::new(OllamaChat::new(config)?)),
        other => bail!("Unknown chat provider: {}", other),
    }
}
