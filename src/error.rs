// Copyright (c) 2025 Derma Labs
// SPDX-License-Identifier: BUSL-1.1
//! Error taxonomy for the analysis pipeline.
//!
//! Per-attempt and per-model failures are captured as structured records and
//! logged by their owning component; none of them propagate past it. The only
//! error the top-level `analyze()` can surface is an invalid input image.

use thiserror::Error;

/// Maximum accepted image payload (10MB)
pub const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

/// Errors raised while turning raw bytes into a model-ready tensor.
///
/// A preprocess failure aborts only the affected model run, never the batch.
#[derive(Debug, Clone, Error)]
pub enum PreprocessError {
    #[error("image data is empty")]
    EmptyData,

    #[error("image data is too large: {0} bytes (max: {1} bytes)")]
    TooLarge(usize, usize),

    #[error("unsupported image format")]
    UnsupportedFormat,

    #[error("failed to decode image: {0}")]
    DecodeFailed(String),

    #[error("image too small: {width}x{height} (minimum {min}x{min})")]
    TooSmall { width: u32, height: u32, min: u32 },
}

/// Attempt-level provider failures.
///
/// Adapters report protocol problems as typed values so the orchestrator can
/// log a structured attempt record and move on to the next provider.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("attempt timed out after {0}ms")]
    Timeout(u64),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(0)
        } else if let Some(status) = err.status() {
            ProviderError::HttpStatus(status.as_u16())
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

/// Per-model runtime failures. Recoverable by the caller (skip the model).
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown model id '{0}'")]
    UnknownModel(String),

    #[error("failed to load model '{id}': {reason}")]
    LoadFailure { id: String, reason: String },

    #[error("model '{0}' is not loaded")]
    NotLoaded(String),

    #[error("inference failed for model '{id}': {reason}")]
    InferenceFailed { id: String, reason: String },

    #[error(transparent)]
    Preprocess(#[from] PreprocessError),
}

/// The only failure mode visible to callers of `AnalysisPipeline::analyze`.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid input image: {0}")]
    InvalidImage(#[from] PreprocessError),
}

/// Storage collaborator failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to persist analysis result: {0}")]
    Persist(String),
}
