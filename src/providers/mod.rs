// Copyright (c) 2025 Derma Labs
// SPDX-License-Identifier: BUSL-1.1
//! Remote provider adapters and the provider registry.
//!
//! Adapters differ only in wire format; the interface they expose to the
//! orchestrator is identical: one request/response call with no retry logic
//! inside the adapter. Protocol failures come back as typed `ProviderError`
//! values, never as panics or stringly-typed errors.

mod claude;
mod gemini;
pub mod mock;
mod openai;
pub mod schema;

pub use claude::ClaudeAdapter;
pub use gemini::GeminiAdapter;
pub use openai::OpenAiAdapter;

use crate::config::{PipelineConfig, ProviderCredentials};
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use tracing::info;

/// Known remote backends. Dispatch goes through this enum plus the registry,
/// never through provider-name strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Gemini,
    OpenAi,
    Claude,
}

/// Direction of the provider's free-form 0-100 scores.
///
/// Declared explicitly per provider rather than inferred: a backend that
/// returns "higher is worse" would otherwise silently corrupt the merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreDirection {
    HigherIsHealthier,
    HigherIsWorse,
}

/// Static description of one provider. Lower priority is tried first.
#[derive(Debug, Clone)]
pub struct ProviderDescriptor {
    pub kind: ProviderKind,
    pub name: &'static str,
    pub priority: u8,
    pub score_direction: ScoreDirection,
}

/// One remote analysis backend.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn descriptor(&self) -> &ProviderDescriptor;

    /// Send an image plus prompt to the backend and return its raw text
    /// payload. Exactly one request; retries and timeouts belong to the
    /// orchestrator.
    async fn analyze(&self, image_b64: &str, mime: &str, prompt: &str)
        -> Result<String, ProviderError>;
}

/// Ordered, availability-filtered set of providers, constructed once at
/// startup and passed by reference into the orchestrator.
pub struct ProviderRegistry {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    /// Build the registry from startup credentials. A provider without a
    /// credential is simply not registered (no attempt will be made).
    pub fn from_credentials(
        credentials: &ProviderCredentials,
        config: &PipelineConfig,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let mut adapters: Vec<Arc<dyn ProviderAdapter>> = Vec::new();

        if let Some(key) = &credentials.gemini_api_key {
            adapters.push(Arc::new(GeminiAdapter::new(client.clone(), key.clone())));
        }
        if let Some(key) = &credentials.openai_api_key {
            adapters.push(Arc::new(OpenAiAdapter::new(
                client.clone(),
                key.clone(),
                credentials.openai_endpoint.clone(),
            )));
        }
        if let Some(key) = &credentials.anthropic_api_key {
            adapters.push(Arc::new(ClaudeAdapter::new(client.clone(), key.clone())));
        }

        let registry = Self::from_adapters(adapters);
        info!(
            "provider registry built: [{}]",
            registry.names().join(", ")
        );
        Ok(registry)
    }

    /// Build from pre-constructed adapters (tests use this with mocks).
    pub fn from_adapters(mut adapters: Vec<Arc<dyn ProviderAdapter>>) -> Self {
        adapters.sort_by_key(|a| a.descriptor().priority);
        Self { adapters }
    }

    pub fn empty() -> Self {
        Self { adapters: vec![] }
    }

    /// Adapters in ascending priority order.
    pub fn adapters(&self) -> &[Arc<dyn ProviderAdapter>] {
        &self.adapters
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.adapters.iter().map(|a| a.descriptor().name).collect()
    }
}
