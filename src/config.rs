// Copyright (c) 2025 Derma Labs
// SPDX-License-Identifier: BUSL-1.1
//! Pipeline configuration, read once from the environment at startup.
//!
//! Provider availability is decided here and nowhere else: the registry is
//! constructed from `ProviderCredentials` and passed by reference into the
//! orchestrator, so no component reads process-wide state ad hoc.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Tunables for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory holding the ONNX measurement-model artifacts.
    pub model_dir: PathBuf,
    /// Budget for a single provider attempt.
    pub attempt_timeout: Duration,
    /// Overall deadline for one analyze() call; when it elapses mid-attempt
    /// the remaining provider chain is abandoned.
    pub overall_deadline: Duration,
    /// HTTP client timeout for provider requests.
    pub http_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("./models"),
            attempt_timeout: Duration::from_secs(12),
            overall_deadline: Duration::from_secs(30),
            http_timeout: Duration::from_secs(15),
        }
    }
}

impl PipelineConfig {
    /// Build from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let model_dir = env::var("MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.model_dir);
        let attempt_timeout = env::var("PROVIDER_ATTEMPT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.attempt_timeout);
        let overall_deadline = env::var("ANALYSIS_DEADLINE_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.overall_deadline);
        let http_timeout = env::var("PROVIDER_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.http_timeout);

        Self {
            model_dir,
            attempt_timeout,
            overall_deadline,
            http_timeout,
        }
    }
}

/// Credentials for the remote providers. A provider with no credential is
/// filtered out of the registry (`ProviderUnavailable`, no attempt made).
#[derive(Debug, Clone, Default)]
pub struct ProviderCredentials {
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    /// Override for OpenAI-compatible endpoints (self-hosted sidecars).
    pub openai_endpoint: Option<String>,
}

impl ProviderCredentials {
    pub fn from_env() -> Self {
        Self {
            gemini_api_key: non_empty(env::var("GEMINI_API_KEY").ok()),
            openai_api_key: non_empty(env::var("OPENAI_API_KEY").ok()),
            anthropic_api_key: non_empty(env::var("ANTHROPIC_API_KEY").ok()),
            openai_endpoint: non_empty(env::var("OPENAI_ENDPOINT").ok()),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
