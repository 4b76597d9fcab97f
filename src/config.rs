//! Environment-driven configuration
//!
//! Read once at startup. Unset variables fall back to defaults; values that
//! are set but unparsable are errors rather than silently ignored.

use crate::conversation::DuplicateSetupPolicy;
use crate::llm::{OpenAIConfig, DEFAULT_BASE_URL};
use crate::relay::{InterruptPolicy, PartialReplyPolicy, SessionContext, DEFAULT_FRAGMENT_TIMEOUT};
use crate::system_prompt::{
    resolve_system_prompt, DEFAULT_TTS_PROVIDER, DEFAULT_TTS_VOICE, DEFAULT_WELCOME_GREETING,
};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid {name}: {message}")]
    Invalid { name: &'static str, message: String },
    #[error("cannot read system prompt file {path}: {source}")]
    PromptFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Call-answer settings handed to the speech provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceConfig {
    /// Host the provider dials back for `/ws`; `None` means use the request's
    /// `Host` header
    pub public_domain: Option<String>,
    pub tts_provider: String,
    pub voice: String,
    pub welcome_greeting: String,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub port: u16,
    pub llm: OpenAIConfig,
    pub system_prompt: String,
    pub voice: VoiceConfig,
    pub session: SessionContext,
    pub fragment_timeout: Duration,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = parse_var(&var, "PORT")?.unwrap_or(DEFAULT_PORT);

        let llm = OpenAIConfig {
            api_key: var("OPENAI_API_KEY").ok_or(ConfigError::Missing("OPENAI_API_KEY"))?,
            model: var("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: var("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            max_tokens: parse_var(&var, "LLM_MAX_TOKENS")?,
            temperature: parse_var(&var, "LLM_TEMPERATURE")?,
        };

        let prompt_file = var("SYSTEM_PROMPT_FILE").map(PathBuf::from);
        let system_prompt =
            resolve_system_prompt(var("SYSTEM_PROMPT").as_deref(), prompt_file.as_deref())
                .map_err(|source| ConfigError::PromptFile {
                    path: prompt_file.clone().unwrap_or_default(),
                    source,
                })?;

        let voice = VoiceConfig {
            public_domain: var("PUBLIC_DOMAIN")
                .or_else(|| var("NGROK_URL"))
                .map(|d| normalize_domain(&d)),
            tts_provider: var("TTS_PROVIDER").unwrap_or_else(|| DEFAULT_TTS_PROVIDER.to_string()),
            voice: var("TTS_VOICE").unwrap_or_else(|| DEFAULT_TTS_VOICE.to_string()),
            welcome_greeting: var("WELCOME_GREETING")
                .unwrap_or_else(|| DEFAULT_WELCOME_GREETING.to_string()),
        };

        let session = SessionContext {
            interrupt_policy: parse_var::<InterruptPolicy>(&var, "INTERRUPT_POLICY")?
                .unwrap_or_default(),
            duplicate_setup_policy: parse_var::<DuplicateSetupPolicy>(
                &var,
                "DUPLICATE_SETUP_POLICY",
            )?
            .unwrap_or_default(),
            partial_reply_policy: parse_var::<PartialReplyPolicy>(&var, "PARTIAL_REPLY_POLICY")?
                .unwrap_or_default(),
        };

        let fragment_timeout = parse_var::<u64>(&var, "LLM_FRAGMENT_TIMEOUT_SECS")?
            .map_or(DEFAULT_FRAGMENT_TIMEOUT, Duration::from_secs);

        Ok(Self {
            port,
            llm,
            system_prompt,
            voice,
            session,
            fragment_timeout,
        })
    }
}

fn parse_var<T>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    var(name)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                name,
                message: format!("'{raw}': {e}"),
            })
        })
        .transpose()
}

/// Accept `https://host/`, `wss://host` or a bare host.
fn normalize_domain(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_scheme = trimmed
        .split_once("://")
        .map_or(trimmed, |(_, rest)| rest);
    without_scheme.trim_end_matches('/').to_string()
}
