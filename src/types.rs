// Copyright (c) 2025 Derma Labs
// SPDX-License-Identifier: BUSL-1.1
//! Core data model for the hybrid skin-analysis pipeline.
//!
//! Heterogeneous raw outputs (pixel measurements from local models, free-form
//! concern lists from remote providers) are reconciled into the canonical
//! 0-100 "aspect health score" schema defined here. `HybridAnalysisResult` is
//! the terminal artifact handed to the storage collaborator; it is created
//! once per request and never mutated after construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One tracked skin-quality dimension.
///
/// The set is fixed and known ahead of time; `Aspect::ALL` is the registration
/// order used for every deterministic list in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aspect {
    Spots,
    Pores,
    Wrinkles,
    Texture,
    Redness,
}

impl Aspect {
    pub const ALL: [Aspect; 5] = [
        Aspect::Spots,
        Aspect::Pores,
        Aspect::Wrinkles,
        Aspect::Texture,
        Aspect::Redness,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Aspect::Spots => "spots",
            Aspect::Pores => "pores",
            Aspect::Wrinkles => "wrinkles",
            Aspect::Texture => "texture",
            Aspect::Redness => "redness",
        }
    }
}

/// Requested analysis mode, before the quality gate resolves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModeHint {
    #[default]
    Auto,
    Cv,
    Ai,
    Hybrid,
}

impl ModeHint {
    /// Parse a mode string from the input contract; unknown strings fall back
    /// to `auto` rather than failing the request.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "cv" => ModeHint::Cv,
            "ai" => ModeHint::Ai,
            "hybrid" => ModeHint::Hybrid,
            _ => ModeHint::Auto,
        }
    }
}

/// Mode after the quality gate has resolved `auto`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    Cv,
    Ai,
    Hybrid,
}

/// Response language for provider prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Th,
}

/// Image-quality metrics supplied by the capture layer. Each value in [0,1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityMetrics {
    pub lighting: f32,
    pub blur: f32,
    pub face_size: f32,
    pub overall_quality: f32,
}

/// One analysis request. Immutable, created per call.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub image: Vec<u8>,
    pub quality: Option<QualityMetrics>,
    pub mode_hint: ModeHint,
    pub locale: Locale,
}

impl AnalysisRequest {
    pub fn new(image: Vec<u8>) -> Self {
        Self {
            image,
            quality: None,
            mode_hint: ModeHint::Auto,
            locale: Locale::En,
        }
    }

    pub fn with_quality(mut self, quality: QualityMetrics) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_mode(mut self, hint: ModeHint) -> Self {
        self.mode_hint = hint;
        self
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }
}

/// Severity tier used for concerns. Distinct from the 1-10 CV severity scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityTier {
    Mild,
    Moderate,
    Severe,
}

impl SeverityTier {
    /// Tier boundaries on the 1-10 CV severity scale.
    pub fn from_cv_severity(severity: f32) -> Self {
        if severity > 7.0 {
            SeverityTier::Severe
        } else if severity > 4.0 {
            SeverityTier::Moderate
        } else {
            SeverityTier::Mild
        }
    }

    /// Parse a provider severity label; unknown labels read as mild.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "severe" | "high" => SeverityTier::Severe,
            "moderate" | "medium" => SeverityTier::Moderate,
            _ => SeverityTier::Mild,
        }
    }
}

/// Where a canonical metric came from. CV values take precedence when both
/// exist, since they are measured rather than inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricSource {
    Cv,
    Ai,
    Default,
}

/// Raw measurement produced by the local-model half for one aspect.
///
/// Severity is on a 1-10 scale where higher means a worse condition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CvMeasurement {
    pub severity: f32,
    pub count: u32,
    pub percentile: f32,
}

/// The pipeline's unified per-aspect representation, independent of source.
///
/// Score and percentile are clamped to their ranges before leaving the
/// normalizer; 100 = healthiest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanonicalMetric {
    pub aspect: Aspect,
    pub score: f32,
    pub percentile: f32,
    pub tier: SeverityTier,
    pub confidence: f32,
    pub source: MetricSource,
}

impl CanonicalMetric {
    /// Neutral placeholder for an aspect no source reported on.
    pub fn neutral(aspect: Aspect) -> Self {
        Self {
            aspect,
            score: 50.0,
            percentile: 50.0,
            tier: SeverityTier::Moderate,
            confidence: 0.0,
            source: MetricSource::Default,
        }
    }
}

/// One reported concern in the final result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concern {
    pub aspect: Aspect,
    pub tier: SeverityTier,
    pub description: String,
}

/// The AI half of the final result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiSummary {
    pub skin_type: String,
    pub concerns: Vec<Concern>,
    pub recommendations: Vec<String>,
    /// Name of the provider that ultimately produced this half
    /// ("demo" when every real provider failed).
    pub model: String,
    pub confidence: f32,
}

/// Terminal artifact of one analysis request, serialized as the canonical
/// JSON output contract. Construction can degrade in quality but never fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridAnalysisResult {
    pub id: Uuid,
    /// Arithmetic mean of the aspect scores, recomputed, never copied from a
    /// provider's self-reported overall field.
    pub overall_score: u32,
    pub overall_percentile: u32,
    pub confidence: f32,
    /// Per-aspect percentiles in registration order.
    pub percentiles: BTreeMap<Aspect, u32>,
    /// Full canonical metric set, one entry per tracked aspect.
    pub metrics: Vec<CanonicalMetric>,
    /// Measured CV half, present for the aspects whose model run succeeded.
    pub cv: BTreeMap<Aspect, CvMeasurement>,
    /// AI half; absent when the resolved mode was CV-only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai: Option<AiSummary>,
    pub concerns: Vec<Concern>,
    pub recommendations: Vec<String>,
    pub mode: AnalysisMode,
    pub processing_time_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl HybridAnalysisResult {
    /// Provider that produced the AI half, if one ran.
    pub fn provider(&self) -> Option<&str> {
        self.ai.as_ref().map(|ai| ai.model.as_str())
    }
}
