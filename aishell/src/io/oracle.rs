//! Client for the command-suggestion oracle.
//!
//! The [`Oracle`] trait hides the LLM service behind one call. [`OpenAiOracle`]
//! talks to the OpenAI Responses API with a fixed system policy and a per-turn
//! message carrying the goal and the rendered transcript. There is no retry:
//! a failed request ends the session.

use std::time::Duration;

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::core::proposal::CONFIRM_MARKER;
use crate::error::ShellError;
use crate::io::config::{OracleCredential, ShellConfig};

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");
const TURN_TEMPLATE: &str = include_str!("prompts/turn.md");

pub trait Oracle {
    /// Ask for the next command. An empty string means nothing further to propose.
    fn propose(&self, goal: &str, transcript: &str) -> Result<String>;
}

/// Template engine wrapper around minijinja.
struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("system", SYSTEM_TEMPLATE)
            .context("load system prompt template")?;
        env.add_template("turn", TURN_TEMPLATE)
            .context("load turn prompt template")?;
        Ok(Self { env })
    }

    fn render_system(&self, config: &ShellConfig) -> Result<String> {
        let template = self.env.get_template("system")?;
        let rendered = template.render(context! {
            runtime => config.runtime.binary(),
            marker => CONFIRM_MARKER,
            workdir => config.workdir.as_str(),
        })?;
        Ok(rendered)
    }

    fn render_turn(&self, goal: &str, transcript: &str) -> Result<String> {
        let template = self.env.get_template("turn")?;
        let rendered = template.render(context! {
            goal => goal,
            transcript => transcript,
        })?;
        Ok(rendered)
    }
}

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: Vec<InputMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct InputMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Oracle backed by the OpenAI Responses API.
pub struct OpenAiOracle {
    client: reqwest::blocking::Client,
    credential: OracleCredential,
    model: String,
    endpoint: String,
    system_prompt: String,
    prompts: PromptEngine,
}

impl OpenAiOracle {
    pub fn new(config: &ShellConfig, credential: OracleCredential) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.oracle_timeout_secs))
            .build()
            .context("build oracle http client")?;
        let prompts = PromptEngine::new()?;
        let system_prompt = prompts.render_system(config)?;
        Ok(Self {
            client,
            credential,
            model: config.model.clone(),
            endpoint: format!("{}/responses", config.api_base_url.trim_end_matches('/')),
            system_prompt,
            prompts,
        })
    }
}

impl Oracle for OpenAiOracle {
    #[instrument(skip_all, fields(model = %self.model, transcript_bytes = transcript.len()))]
    fn propose(&self, goal: &str, transcript: &str) -> Result<String> {
        let turn = self.prompts.render_turn(goal, transcript)?;
        let request = ResponsesRequest {
            model: &self.model,
            input: vec![
                InputMessage {
                    role: "system",
                    content: &self.system_prompt,
                },
                InputMessage {
                    role: "user",
                    content: &turn,
                },
            ],
        };

        info!("requesting next command");
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.credential.expose())
            .json(&request)
            .send()
            .map_err(|err| transport(format!("send request to {}: {err}", self.endpoint)))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|err| transport(format!("read response body: {err}")))?;

        if !status.is_success() {
            let message = error_message(&body).unwrap_or_else(|| body.trim().to_string());
            debug!(status = %status, "oracle returned error status");
            return Err(transport(format!("{status}: {message}")));
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|err| transport(format!("decode response json: {err}")))?;
        let text = response_text(&value);
        debug!(chars = text.chars().count(), "oracle replied");
        Ok(text)
    }
}

fn transport(msg: String) -> anyhow::Error {
    ShellError::OracleTransport(msg).into()
}

/// Text of a Responses API reply, trimmed.
///
/// Uses `output_text` when the payload carries it, otherwise joins every
/// `output[].content[]` item of type `output_text`.
pub fn response_text(value: &Value) -> String {
    if let Some(text) = value.get("output_text").and_then(Value::as_str) {
        return text.trim().to_string();
    }
    let mut buf = String::new();
    let items = value
        .get("output")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for item in items {
        let contents = item
            .get("content")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for content in contents {
            if content.get("type").and_then(Value::as_str) == Some("output_text")
                && let Some(text) = content.get("text").and_then(Value::as_str)
            {
                buf.push_str(text);
            }
        }
    }
    buf.trim().to_string()
}

/// `error.message` from an API error body, if present.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(|s| s.to_string())
}
