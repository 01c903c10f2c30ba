//! Typed runtime settings parsed from the environment.
//!
//! The `config` crate decides what ends up in the environment (.env / XDG);
//! this module turns it into one immutable struct at boot. A malformed value
//! is a fatal startup error, never a silent default.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Everything the orchestrator reads from its environment, with the
/// documented defaults.
#[derive(Clone, Debug)]
pub struct Settings {
    /// KV/vector store URL (`redis://...`). Absent means in-memory backends.
    pub kv_url: Option<String>,
    pub fast_engine_url: String,
    pub deep_engine_url: Option<String>,
    pub fast_model: String,
    pub deep_model: String,
    pub sandbox_url: Option<String>,
    pub library_url: Option<String>,
    /// OpenAI-compatible `/v1/embeddings` endpoint; absent means the
    /// deterministic hash embedder.
    pub embedder_url: Option<String>,
    pub embed_model: String,

    pub stream_key: String,
    pub stream_maxlen: usize,
    pub last_id_key: String,
    pub start_from_latest: bool,

    pub embed_dim: usize,
    pub surprise_alpha: f64,
    pub surprise_threshold: f64,
    pub perplexity_norm_divisor: f64,

    pub archive_enabled: bool,
    pub archive_days: u32,
    pub archive_keep: usize,
    pub archive_hour: u32,
    pub archive_minute: u32,

    pub metrics_sample_sec: u64,

    pub max_tokens: u32,
    pub max_agent_steps: usize,
    pub agent_hard_cap: usize,
    pub llm_timeout: Duration,
    pub tool_timeout: Duration,
    pub sandbox_timeout: Duration,

    pub data_dir: PathBuf,
    pub bind_addr: String,
}

fn get(key: &'static str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, SettingsError>
where
    T::Err: std::fmt::Display,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| SettingsError::Invalid {
            key,
            value: raw,
            reason: e.to_string(),
        }),
    }
}

fn parse_bool(key: &'static str, default: bool) -> Result<bool, SettingsError> {
    match get(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(SettingsError::Invalid {
                key,
                value: raw,
                reason: "expected a boolean".to_string(),
            }),
        },
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        let surprise_alpha = parse("SURPRISE_ALPHA", 0.6)?;
        if !(0.0..=1.0).contains(&surprise_alpha) {
            return Err(SettingsError::Invalid {
                key: "SURPRISE_ALPHA",
                value: surprise_alpha.to_string(),
                reason: "must be in [0, 1]".to_string(),
            });
        }
        let surprise_threshold = parse("SURPRISE_THRESHOLD", 0.7)?;
        if !(0.0..=1.0).contains(&surprise_threshold) {
            return Err(SettingsError::Invalid {
                key: "SURPRISE_THRESHOLD",
                value: surprise_threshold.to_string(),
                reason: "must be in [0, 1]".to_string(),
            });
        }

        Ok(Self {
            kv_url: get("KV_URL"),
            fast_engine_url: get("FAST_ENGINE_URL")
                .unwrap_or_else(|| "http://localhost:8001".to_string()),
            deep_engine_url: get("DEEP_ENGINE_URL"),
            fast_model: get("FAST_MODEL").unwrap_or_else(|| "fast".to_string()),
            deep_model: get("DEEP_MODEL").unwrap_or_else(|| "deep".to_string()),
            sandbox_url: get("SANDBOX_URL"),
            library_url: get("LIBRARY_URL"),
            embedder_url: get("EMBEDDER_URL"),
            embed_model: get("EMBED_MODEL").unwrap_or_else(|| "embedding".to_string()),

            stream_key: get("STREAM_KEY").unwrap_or_else(|| "archive:input:stream".to_string()),
            stream_maxlen: parse("STREAM_MAXLEN", 1000)?,
            last_id_key: get("LAST_ID_KEY").unwrap_or_else(|| "memory:last_id".to_string()),
            start_from_latest: parse_bool("START_FROM_LATEST", false)?,

            embed_dim: parse("EMBED_DIM", 384)?,
            surprise_alpha,
            surprise_threshold,
            perplexity_norm_divisor: parse("PERPLEXITY_NORM_DIVISOR", 5.0)?,

            archive_enabled: parse_bool("ARCHIVE_ENABLED", true)?,
            archive_days: parse("ARCHIVE_DAYS", 30)?,
            archive_keep: parse("ARCHIVE_KEEP", 1000)?,
            archive_hour: parse("ARCHIVE_HOUR", 3)?,
            archive_minute: parse("ARCHIVE_MINUTE", 0)?,

            metrics_sample_sec: parse("METRICS_SAMPLE_SEC", 30)?,

            max_tokens: parse("MAX_TOKENS", 1024)?,
            max_agent_steps: parse("MAX_AGENT_STEPS", 10)?,
            agent_hard_cap: parse("AGENT_HARD_CAP", 50)?,
            llm_timeout: Duration::from_secs(parse("LLM_TIMEOUT_SEC", 60)?),
            tool_timeout: Duration::from_secs(parse("TOOL_TIMEOUT_SEC", 30)?),
            sandbox_timeout: Duration::from_secs(parse("SANDBOX_TIMEOUT_SEC", 10)?),

            data_dir: PathBuf::from(get("DATA_DIR").unwrap_or_else(|| "data".to_string())),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string()),
        })
    }

    pub fn surprise(&self) -> crate::worker::SurpriseConfig {
        crate::worker::SurpriseConfig {
            alpha: self.surprise_alpha,
            threshold: self.surprise_threshold,
            norm_divisor: self.perplexity_norm_divisor,
        }
    }

    pub fn archive_policy(&self) -> crate::archival::ArchivePolicy {
        crate::archival::ArchivePolicy {
            keep: self.archive_keep,
            days: self.archive_days,
            hour: self.archive_hour,
            minute: self.archive_minute,
        }
    }
}
