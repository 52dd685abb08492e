// Copyright (c) 2025 Derma Labs
// SPDX-License-Identifier: BUSL-1.1
pub mod aggregate;
pub mod config;
pub mod cv;
pub mod error;
pub mod normalize;
pub mod orchestrator;
pub mod pipeline;
pub mod preprocess;
pub mod providers;
pub mod quality;
pub mod runtime;
pub mod storage;
pub mod types;

// Re-export the types callers need for a one-shot analysis
pub use config::{PipelineConfig, ProviderCredentials};
pub use error::{AnalysisError, ModelError, PreprocessError, ProviderError, StoreError};
pub use orchestrator::{AiOutcome, AttemptRecord};
pub use pipeline::AnalysisPipeline;
pub use providers::{
    ProviderAdapter, ProviderDescriptor, ProviderKind, ProviderRegistry, ScoreDirection,
};
pub use runtime::{BatchRunner, InferenceOutcome, ModelRuntime, ModelSpec};
pub use storage::{AnalysisStore, InMemoryStore};
pub use types::{
    AnalysisMode, AnalysisRequest, Aspect, CanonicalMetric, Concern, CvMeasurement,
    HybridAnalysisResult, Locale, ModeHint, QualityMetrics, SeverityTier,
};
