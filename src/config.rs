//! Process-wide settings, read once at startup
//!
//! Values come from the environment (optionally seeded from `.env`).

use crate::error::FlowError;
use crate::Result;
use std::env;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";
pub const DEFAULT_VOICE: &str = "Algenib";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub gemini_api_key: Option<String>,
    pub model: String,
    pub tts_model: String,
    pub voice: String,
    pub enable_speech: bool,
    pub model_timeout: Duration,
    pub max_tool_iterations: usize,
    pub news_api_key: Option<String>,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            model: DEFAULT_MODEL.to_string(),
            tts_model: DEFAULT_TTS_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            enable_speech: true,
            model_timeout: Duration::from_secs(60),
            max_tool_iterations: 5,
            news_api_key: None,
            port: 8080,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        Ok(Self {
            gemini_api_key: get("GEMINI_API_KEY"),
            model: get("GEMINI_MODEL").unwrap_or(defaults.model),
            tts_model: get("GEMINI_TTS_MODEL").unwrap_or(defaults.tts_model),
            voice: get("TTS_VOICE").unwrap_or(defaults.voice),
            enable_speech: match get("ENABLE_SPEECH") {
                Some(v) => parse_bool("ENABLE_SPEECH", &v)?,
                None => defaults.enable_speech,
            },
            model_timeout: match get("MODEL_TIMEOUT_SECS") {
                Some(v) => Duration::from_secs(parse_number("MODEL_TIMEOUT_SECS", &v)?),
                None => defaults.model_timeout,
            },
            max_tool_iterations: match get("MAX_TOOL_ITERATIONS") {
                Some(v) => parse_number("MAX_TOOL_ITERATIONS", &v)?,
                None => defaults.max_tool_iterations,
            },
            news_api_key: get("NEWS_API_KEY"),
            port: match get("PORT").or_else(|| get("API_PORT")) {
                Some(v) => parse_number("PORT", &v)?,
                None => defaults.port,
            },
        })
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse::<T>()
        .map_err(|_| FlowError::Configuration(format!("invalid {}={:?} (expected a number)", key, value)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(FlowError::Configuration(format!(
            "invalid {}={:?} (expected true/false)",
            key, value
        ))),
    }
}
