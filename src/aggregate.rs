// Copyright (c) 2025 Derma Labs
// SPDX-License-Identifier: BUSL-1.1
//! Aggregator: merges normalized CV and AI halves into the final result.
//!
//! CV values take precedence per aspect when both halves measured it,
//! since they are measured rather than inferred. The overall score and
//! percentile are always recomputed as unweighted means of the aspect
//! metrics, never copied from a provider's self-reported overall.

use crate::normalize::{self, fill_missing};
use crate::orchestrator::AiOutcome;
use crate::types::{
    AiSummary, AnalysisMode, Aspect, CanonicalMetric, Concern, CvMeasurement,
    HybridAnalysisResult, SeverityTier,
};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Confidence reported when no AI pass ran.
const CV_ONLY_CONFIDENCE: f32 = 0.7;

/// A CV severity above this adds the aspect to the concerns list even if
/// no provider flagged it.
const CV_CONCERN_SEVERITY: f32 = 7.0;

const MAX_RECOMMENDATIONS: usize = 5;

const DEFAULT_RECOMMENDATIONS: [&str; 3] = [
    "Use a broad-spectrum sunscreen daily",
    "Maintain a consistent cleansing routine",
    "Stay hydrated throughout the day",
];

pub fn aggregate(
    cv: HashMap<Aspect, CvMeasurement>,
    ai: Option<AiOutcome>,
    mode: AnalysisMode,
    processing_time_ms: u64,
) -> HybridAnalysisResult {
    let cv_metrics = normalize::normalize_cv(&cv);
    let (ai_metrics, ai_concerns, summary) = match &ai {
        Some(outcome) => {
            let (metrics, concerns) =
                normalize::normalize_ai(&outcome.analysis, outcome.score_direction);
            let confidence = outcome
                .analysis
                .confidence
                .map(normalize::normalize_confidence)
                .unwrap_or(CV_ONLY_CONFIDENCE);
            let summary = AiSummary {
                skin_type: outcome
                    .analysis
                    .skin_type
                    .clone()
                    .unwrap_or_else(|| "normal".to_string()),
                concerns: concerns.clone(),
                recommendations: outcome.analysis.recommendations.clone(),
                model: outcome.provider.clone(),
                confidence,
            };
            (metrics, concerns, Some(summary))
        }
        None => (Vec::new(), Vec::new(), None),
    };

    let metrics = fill_missing(merge_metrics(cv_metrics, ai_metrics));

    let overall_score = mean_of(metrics.iter().map(|m| m.score));
    let overall_percentile = mean_of(metrics.iter().map(|m| m.percentile));
    let confidence = summary
        .as_ref()
        .map(|s| s.confidence)
        .unwrap_or(CV_ONLY_CONFIDENCE);

    let concerns = merge_concerns(ai_concerns, &cv);
    let recommendations = finalize_recommendations(
        summary
            .as_ref()
            .map(|s| s.recommendations.clone())
            .unwrap_or_default(),
    );

    let percentiles = metrics
        .iter()
        .map(|m| (m.aspect, m.percentile.round() as u32))
        .collect::<BTreeMap<_, _>>();

    HybridAnalysisResult {
        id: Uuid::new_v4(),
        overall_score,
        overall_percentile,
        confidence,
        percentiles,
        metrics,
        cv: cv.into_iter().collect(),
        ai: summary,
        concerns,
        recommendations,
        mode,
        processing_time_ms,
        timestamp: Utc::now(),
    }
}

/// Per-aspect merge with CV precedence.
fn merge_metrics(
    cv_metrics: Vec<CanonicalMetric>,
    ai_metrics: Vec<CanonicalMetric>,
) -> Vec<CanonicalMetric> {
    let mut merged = cv_metrics;
    for metric in ai_metrics {
        if !merged.iter().any(|m| m.aspect == metric.aspect) {
            merged.push(metric);
        }
    }
    merged
}

fn mean_of(values: impl Iterator<Item = f32>) -> u32 {
    let collected: Vec<f32> = values.collect();
    if collected.is_empty() {
        return 0;
    }
    let mean = collected.iter().sum::<f32>() / collected.len() as f32;
    mean.round() as u32
}

/// Union of provider concerns and aspects whose CV severity crossed the
/// threshold, deduplicated by aspect, in registration order.
fn merge_concerns(
    ai_concerns: Vec<Concern>,
    cv: &HashMap<Aspect, CvMeasurement>,
) -> Vec<Concern> {
    let mut merged = Vec::new();
    for aspect in Aspect::ALL {
        if let Some(concern) = ai_concerns.iter().find(|c| c.aspect == aspect) {
            merged.push(concern.clone());
        } else if let Some(m) = cv.get(&aspect) {
            if m.severity > CV_CONCERN_SEVERITY {
                merged.push(Concern {
                    aspect,
                    tier: SeverityTier::from_cv_severity(m.severity),
                    description: format!("Elevated {} detected by image measurement", aspect.as_str()),
                });
            }
        }
    }
    merged
}

fn finalize_recommendations(mut recommendations: Vec<String>) -> Vec<String> {
    if recommendations.is_empty() {
        recommendations = DEFAULT_RECOMMENDATIONS
            .iter()
            .map(|s| s.to_string())
            .collect();
    }
    recommendations.truncate(MAX_RECOMMENDATIONS);
    recommendations
}
