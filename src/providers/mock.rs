// Copyright (c) 2025 Derma Labs
// SPDX-License-Identifier: BUSL-1.1
//! Scriptable in-process provider used by orchestrator and registry tests.

use super::{ProviderAdapter, ProviderDescriptor, ProviderKind, ScoreDirection};
use crate::error::ProviderError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// What the mock does when `analyze` is called.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Return this raw payload immediately.
    Succeed(String),
    /// Return a clone of this error immediately.
    Fail(ProviderError),
    /// Never return. The orchestrator's attempt timeout must fire.
    Hang,
}

pub struct MockProvider {
    descriptor: ProviderDescriptor,
    behavior: MockBehavior,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(name: &'static str, priority: u8, behavior: MockBehavior) -> Self {
        Self {
            descriptor: ProviderDescriptor {
                // The kind only matters for real backends; mocks borrow one.
                kind: ProviderKind::OpenAi,
                name,
                priority,
                score_direction: ScoreDirection::HigherIsHealthier,
            },
            behavior,
            calls: AtomicUsize::new(0),
        }
    }

    /// Override the score direction (for normalizer flip tests).
    pub fn with_score_direction(mut self, direction: ScoreDirection) -> Self {
        self.descriptor.score_direction = direction;
        self
    }

    /// Number of times `analyze` has been invoked.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn analyze(
        &self,
        _image_b64: &str,
        _mime: &str,
        _prompt: &str,
    ) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            MockBehavior::Succeed(payload) => Ok(payload.clone()),
            MockBehavior::Fail(err) => Err(err.clone()),
            MockBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ProviderError::Unavailable("hang elapsed".to_string()))
            }
        }
    }
}
