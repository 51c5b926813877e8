use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::env;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("{0} environment variable not set. Set it with: export {0}=your-key-here")]
    MissingApiKey(&'static str),

    #[error(
        "Unknown model '{0}'. Available: claude-sonnet (default), claude-opus, claude-haiku, \
         api-sonnet, api-opus, api-haiku, gpt-5.2, gpt-5.2-pro, gpt-4o, o3"
    )]
    UnknownModel(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} API request failed with status {status}: {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("claude CLI failed: {0}")]
    Cli(String),

    #[error("AI provider returned empty content")]
    EmptyContent,

    #[error("{provider} cannot read {media_type} attachments; paste the text instead")]
    UnsupportedAttachment {
        provider: &'static str,
        media_type: String,
    },
}

/// A binary document handed to the model alongside the prompt.
#[derive(Debug, Clone, Copy)]
pub struct FileAttachment<'a> {
    pub media_type: &'a str,
    pub extension: &'a str,
    pub bytes: &'a [u8],
}

// --- Provider trait ---

#[async_trait]
pub trait AIProvider: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError>;

    async fn complete_with_file(
        &self,
        _prompt: &str,
        file: FileAttachment<'_>,
        _max_tokens: u32,
    ) -> Result<String, LlmError> {
        Err(LlmError::UnsupportedAttachment {
            provider: self.provider_name(),
            media_type: file.media_type.to_string(),
        })
    }

    fn provider_name(&self) -> &'static str;

    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderKind {
    Anthropic,
    OpenAI,
    ClaudeCode,
}

#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub provider: ProviderKind,
    pub model_id: String,
    pub short_name: String,
}

fn spec(provider: ProviderKind, model_id: &str, short_name: &str) -> ModelSpec {
    ModelSpec {
        provider,
        model_id: model_id.to_string(),
        short_name: short_name.to_string(),
    }
}

pub fn resolve_model(name: &str) -> Result<ModelSpec, LlmError> {
    use ProviderKind::*;
    match name {
        // Claude Code provider (uses `claude` CLI, no API key needed)
        "claude-sonnet" | "sonnet" => Ok(spec(ClaudeCode, "claude-sonnet-4-5-20250929", "claude-sonnet")),
        "claude-opus" | "opus" => Ok(spec(ClaudeCode, "claude-opus-4-6", "claude-opus")),
        "claude-haiku" | "haiku" => Ok(spec(ClaudeCode, "claude-haiku-4-5-20251001", "claude-haiku")),
        // Direct Anthropic API (requires ANTHROPIC_API_KEY)
        "api-sonnet" => Ok(spec(Anthropic, "claude-sonnet-4-5-20250929", "api-sonnet")),
        "api-opus" => Ok(spec(Anthropic, "claude-opus-4-6", "api-opus")),
        "api-haiku" => Ok(spec(Anthropic, "claude-haiku-4-5-20251001", "api-haiku")),
        // OpenAI (requires OPENAI_API_KEY)
        "gpt-5.2" | "gpt5" => Ok(spec(OpenAI, "gpt-5.2", "gpt-5.2")),
        "gpt-5.2-pro" | "gpt5-pro" => Ok(spec(OpenAI, "gpt-5.2-pro", "gpt-5.2-pro")),
        "gpt-4o" => Ok(spec(OpenAI, "gpt-4o", "gpt-4o")),
        "o3" => Ok(spec(OpenAI, "o3", "o3")),
        _ => Err(LlmError::UnknownModel(name.to_string())),
    }
}

pub fn create_provider(spec: &ModelSpec) -> Result<Arc<dyn AIProvider>, LlmError> {
    debug!("Using model {} ({:?}, {})", spec.short_name, spec.provider, spec.model_id);
    match spec.provider {
        ProviderKind::ClaudeCode => Ok(Arc::new(ClaudeCodeProvider::new(spec.model_id.clone()))),
        ProviderKind::Anthropic => Ok(Arc::new(AnthropicProvider::new(spec.model_id.clone())?)),
        ProviderKind::OpenAI => Ok(Arc::new(OpenAIProvider::new(spec.model_id.clone())?)),
    }
}

fn http_client() -> Result<reqwest::Client, LlmError> {
    Ok(reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

async fn error_body(response: reqwest::Response) -> String {
    response.text().await.unwrap_or_default()
}

// --- Anthropic provider ---

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug)]
pub struct AnthropicProvider {
    api_key: String,
    model_id: String,
    url: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(model_id: String) -> Result<Self, LlmError> {
        let api_key =
            env::var("ANTHROPIC_API_KEY").map_err(|_| LlmError::MissingApiKey("ANTHROPIC_API_KEY"))?;
        Self::with_url(api_key, model_id, ANTHROPIC_API_URL.to_string())
    }

    pub fn with_url(api_key: String, model_id: String, url: String) -> Result<Self, LlmError> {
        Ok(Self {
            api_key,
            model_id,
            url,
            client: http_client()?,
        })
    }
}

#[async_trait]
impl AIProvider for AnthropicProvider {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError> {
        let request = AnthropicRequest {
            model: &self.model_id,
            max_tokens,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::Api {
                provider: self.provider_name(),
                status: status.as_u16(),
                message: error_body(response).await,
            });
        }

        let api_response: AnthropicResponse = response.json().await?;
        api_response
            .content
            .into_iter()
            .find(|block| block.content_type == "text")
            .and_then(|block| block.text)
            .filter(|text| !text.trim().is_empty())
            .ok_or(LlmError::EmptyContent)
    }

    fn provider_name(&self) -> &'static str {
        "Anthropic"
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- Claude Code provider (shells out to `claude` CLI) ---

#[derive(Debug)]
pub struct ClaudeCodeProvider {
    model_id: String,
}

impl ClaudeCodeProvider {
    /// The CLI is looked up on first use, not here.
    pub fn new(model_id: String) -> Self {
        Self { model_id }
    }

    async fn run(&self, prompt: &str, extra_args: &[&str]) -> Result<String, LlmError> {
        let output = tokio::process::Command::new("claude")
            .arg("-p")
            .arg(prompt)
            .arg("--model")
            .arg(&self.model_id)
            .args(extra_args)
            .output()
            .await
            .map_err(cli_spawn_error)?;

        if !output.status.success() {
            return Err(LlmError::Cli(String::from_utf8_lossy(&output.stderr).into_owned()));
        }

        let response = String::from_utf8(output.stdout)
            .map_err(|_| LlmError::Cli("invalid UTF-8 in claude CLI output".to_string()))?;
        if response.trim().is_empty() {
            return Err(LlmError::EmptyContent);
        }
        Ok(response)
    }
}

fn cli_spawn_error(err: std::io::Error) -> LlmError {
    if err.kind() == std::io::ErrorKind::NotFound {
        LlmError::Cli(
            "'claude' CLI not found. Install Claude Code or use api-sonnet/gpt-5.2 instead."
                .to_string(),
        )
    } else {
        LlmError::Cli(format!("failed to run 'claude': {}", err))
    }
}

#[async_trait]
impl AIProvider for ClaudeCodeProvider {
    async fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String, LlmError> {
        self.run(prompt, &[]).await
    }

    async fn complete_with_file(
        &self,
        prompt: &str,
        file: FileAttachment<'_>,
        _max_tokens: u32,
    ) -> Result<String, LlmError> {
        let suffix = format!(".{}", file.extension);
        let mut tmp = tempfile::Builder::new()
            .prefix("scout-resume-")
            .suffix(&suffix)
            .tempfile()
            .map_err(|e| LlmError::Cli(format!("cannot stage attachment: {}", e)))?;
        tmp.write_all(file.bytes)
            .map_err(|e| LlmError::Cli(format!("cannot stage attachment: {}", e)))?;

        debug!("Staged {} attachment at {}", file.media_type, tmp.path().display());
        let prompt = format!(
            "{}\n\nThe resume is the {} file at: {}\nRead that file before answering.",
            prompt,
            file.media_type,
            tmp.path().display()
        );
        // tmp lives until the CLI has exited
        self.run(&prompt, &["--allowedTools", "Read"]).await
    }

    fn provider_name(&self) -> &'static str {
        "claude CLI"
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- OpenAI provider ---

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Serialize)]
struct OpenAIMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    max_completion_tokens: u32,
    messages: Vec<OpenAIMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug)]
pub struct OpenAIProvider {
    api_key: String,
    model_id: String,
    url: String,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(model_id: String) -> Result<Self, LlmError> {
        let api_key =
            env::var("OPENAI_API_KEY").map_err(|_| LlmError::MissingApiKey("OPENAI_API_KEY"))?;
        Self::with_url(api_key, model_id, OPENAI_API_URL.to_string())
    }

    pub fn with_url(api_key: String, model_id: String, url: String) -> Result<Self, LlmError> {
        Ok(Self {
            api_key,
            model_id,
            url,
            client: http_client()?,
        })
    }
}

#[async_trait]
impl AIProvider for OpenAIProvider {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError> {
        let request = OpenAIRequest {
            model: &self.model_id,
            max_completion_tokens: max_tokens,
            messages: vec![OpenAIMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::Api {
                provider: self.provider_name(),
                status: status.as_u16(),
                message: error_body(response).await,
            });
        }

        let api_response: OpenAIResponse = response.json().await?;
        api_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(LlmError::EmptyContent)
    }

    fn provider_name(&self) -> &'static str {
        "OpenAI"
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}
