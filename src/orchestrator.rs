// Copyright (c) 2025 Derma Labs
// SPDX-License-Identifier: BUSL-1.1
//! Sequential provider fallback with a terminal synthetic result.
//!
//! Providers are tried one at a time in registry order, each under its own
//! attempt timeout and all under a shared cancellation token tied to the
//! request deadline. A provider failure is recorded and the next one is
//! tried. When every provider has failed (or none is registered), the
//! synthetic "demo" analysis is returned, so this module never errors out.

use crate::config::PipelineConfig;
use crate::error::ProviderError;
use crate::providers::schema::{self, ProviderAnalysis, RawConcern};
use crate::providers::{ProviderRegistry, ScoreDirection};
use crate::types::{Aspect, Locale};
use rand::Rng;
use std::time::Instant;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Name reported when the synthetic fallback produced the analysis.
pub const DEMO_PROVIDER: &str = "demo";

/// One failed provider attempt, kept for the result's attempt log.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub provider: String,
    pub error: ProviderError,
    pub elapsed_ms: u64,
}

/// The analysis that won, plus how we got there.
#[derive(Debug)]
pub struct AiOutcome {
    pub analysis: ProviderAnalysis,
    pub provider: String,
    pub score_direction: ScoreDirection,
    pub attempts: Vec<AttemptRecord>,
    pub elapsed_ms: u64,
}

impl AiOutcome {
    pub fn is_synthetic(&self) -> bool {
        self.provider == DEMO_PROVIDER
    }
}

/// Try each registered provider in priority order and return the first
/// parseable analysis. Cannot fail: exhaustion falls through to the
/// synthetic result.
pub async fn run_providers(
    registry: &ProviderRegistry,
    image_b64: &str,
    mime: &str,
    locale: Locale,
    config: &PipelineConfig,
    cancel: &CancellationToken,
) -> AiOutcome {
    let started = Instant::now();
    let prompt = schema::build_prompt(locale);
    let mut attempts = Vec::new();

    for adapter in registry.adapters() {
        let descriptor = adapter.descriptor();
        if cancel.is_cancelled() {
            warn!("analysis deadline reached before trying {}", descriptor.name);
            break;
        }

        let attempt_started = Instant::now();
        let call = adapter.analyze(image_b64, mime, &prompt);
        let outcome = tokio::select! {
            _ = cancel.cancelled() => {
                Err(ProviderError::Timeout(attempt_started.elapsed().as_millis() as u64))
            }
            result = timeout(config.attempt_timeout, call) => match result {
                Ok(inner) => inner,
                Err(_) => Err(ProviderError::Timeout(
                    config.attempt_timeout.as_millis() as u64,
                )),
            }
        };

        let elapsed_ms = attempt_started.elapsed().as_millis() as u64;
        let parsed = outcome.and_then(|text| schema::parse_provider_payload(&text));
        match parsed {
            Ok(analysis) => {
                info!(
                    provider = descriptor.name,
                    elapsed_ms, "provider analysis accepted"
                );
                return AiOutcome {
                    analysis,
                    provider: descriptor.name.to_string(),
                    score_direction: descriptor.score_direction,
                    attempts,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                };
            }
            Err(error) => {
                warn!(
                    provider = descriptor.name,
                    elapsed_ms,
                    %error,
                    "provider attempt failed, trying next"
                );
                attempts.push(AttemptRecord {
                    provider: descriptor.name.to_string(),
                    error,
                    elapsed_ms,
                });
            }
        }
    }

    info!(
        failed_attempts = attempts.len(),
        "all providers exhausted, using synthetic analysis"
    );
    AiOutcome {
        analysis: synthetic_analysis(),
        provider: DEMO_PROVIDER.to_string(),
        score_direction: ScoreDirection::HigherIsHealthier,
        attempts,
        elapsed_ms: started.elapsed().as_millis() as u64,
    }
}

/// Plausible demo analysis used when no provider could answer. Scores are
/// randomized within a healthy-ish band so repeated demo runs look alive.
pub fn synthetic_analysis() -> ProviderAnalysis {
    let mut rng = rand::thread_rng();
    let scores = Aspect::ALL
        .iter()
        .map(|aspect| {
            (aspect.as_str().to_string(), rng.gen_range(60..=85) as f64)
        })
        .collect();

    ProviderAnalysis {
        skin_type: Some("normal".to_string()),
        scores,
        concerns: vec![RawConcern {
            kind: "texture".to_string(),
            severity: "mild".to_string(),
            description: Some("Minor unevenness in skin texture".to_string()),
        }],
        recommendations: vec![
            "Use a broad-spectrum sunscreen daily".to_string(),
            "Maintain a consistent cleansing routine".to_string(),
            "Stay hydrated throughout the day".to_string(),
        ],
        confidence: Some(0.5),
    }
}
