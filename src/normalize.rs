// Copyright (c) 2025 Derma Labs
// SPDX-License-Identifier: BUSL-1.1
//! Result Normalizer: reconciles CV measurements and free-form provider
//! output into the canonical per-aspect metric schema.
//!
//! CV severity runs 1 (clear) to 10 (severe); canonical scores run 0 to 100
//! with 100 healthiest. Provider scores are already 0-100 but their
//! direction is provider-defined, so the caller passes the registered
//! `ScoreDirection` and we flip before clamping.

use crate::providers::schema::ProviderAnalysis;
use crate::providers::ScoreDirection;
use crate::types::{Aspect, CanonicalMetric, Concern, CvMeasurement, MetricSource, SeverityTier};
use std::collections::HashMap;
use tracing::debug;

/// Confidence attached to CV-origin metrics. Local measurements are
/// deterministic but the class models themselves are not perfect.
const CV_METRIC_CONFIDENCE: f32 = 0.85;

/// Convert a 1-10 CV severity into a 0-100 health score.
/// Severity 1 maps to 100, severity 10 maps to 10.
pub fn cv_score(severity: f32) -> f32 {
    (110.0 - severity * 10.0).round().clamp(0.0, 100.0)
}

pub fn clamp_percentile(p: f32) -> f32 {
    p.clamp(0.0, 100.0)
}

/// Providers occasionally report confidence on a 0-100 scale instead of
/// 0-1. Values in (1, 100] are treated as percentages.
pub fn normalize_confidence(raw: f64) -> f32 {
    let value = if raw > 1.0 && raw <= 100.0 {
        raw / 100.0
    } else {
        raw
    };
    (value as f32).clamp(0.0, 1.0)
}

/// Fold a provider's free-form concern or score label onto a tracked
/// aspect. Unknown labels return `None` and are dropped upstream.
pub fn fold_concern_label(label: &str) -> Option<Aspect> {
    let key = label.trim().to_lowercase().replace([' ', '-'], "_");
    match key.as_str() {
        "spots" | "spot" | "pigmentation" | "hyperpigmentation" | "dark_spots" | "sun_damage"
        | "uv_spots" | "brown_spots" => Some(Aspect::Spots),
        "pores" | "pore" | "large_pores" | "blackheads" | "clogged_pores" => Some(Aspect::Pores),
        "wrinkles" | "wrinkle" | "fine_lines" | "lines" | "aging" => Some(Aspect::Wrinkles),
        "texture" | "roughness" | "uneven_texture" | "smoothness" => Some(Aspect::Texture),
        "redness" | "red_areas" | "erythema" | "irritation" | "acne" | "sensitivity" => {
            Some(Aspect::Redness)
        }
        _ => None,
    }
}

/// Normalize local CV measurements into canonical metrics, in aspect
/// registration order.
pub fn normalize_cv(measurements: &HashMap<Aspect, CvMeasurement>) -> Vec<CanonicalMetric> {
    Aspect::ALL
        .iter()
        .filter_map(|aspect| {
            measurements.get(aspect).map(|m| CanonicalMetric {
                aspect: *aspect,
                score: cv_score(m.severity),
                percentile: clamp_percentile(m.percentile),
                tier: SeverityTier::from_cv_severity(m.severity),
                confidence: CV_METRIC_CONFIDENCE,
                source: MetricSource::Cv,
            })
        })
        .collect()
}

/// Normalize a provider analysis into canonical metrics plus structured
/// concerns. Scores under unrecognized keys are dropped with a debug log.
pub fn normalize_ai(
    analysis: &ProviderAnalysis,
    direction: ScoreDirection,
) -> (Vec<CanonicalMetric>, Vec<Concern>) {
    let confidence = analysis
        .confidence
        .map(normalize_confidence)
        .unwrap_or(0.7);

    let mut scores: HashMap<Aspect, f32> = HashMap::new();
    for (key, raw) in &analysis.scores {
        match fold_concern_label(key) {
            Some(aspect) => {
                let mut score = (*raw as f32).clamp(0.0, 100.0);
                if direction == ScoreDirection::HigherIsWorse {
                    score = 100.0 - score;
                }
                scores.insert(aspect, score);
            }
            None => debug!(key, "dropping unrecognized provider score key"),
        }
    }

    let mut concerns: Vec<Concern> = Vec::new();
    for raw in &analysis.concerns {
        let Some(aspect) = fold_concern_label(&raw.kind) else {
            debug!(kind = %raw.kind, "dropping unrecognized provider concern");
            continue;
        };
        if concerns.iter().any(|c| c.aspect == aspect) {
            continue;
        }
        let tier = SeverityTier::parse(&raw.severity);
        let description = raw
            .description
            .clone()
            .unwrap_or_else(|| format!("Elevated {}", aspect.as_str()));
        concerns.push(Concern {
            aspect,
            tier,
            description,
        });
    }
    // Registration order, then provider order within the same aspect.
    concerns.sort_by_key(|c| aspect_rank(c.aspect));

    let metrics = Aspect::ALL
        .iter()
        .filter_map(|aspect| {
            scores.get(aspect).map(|score| CanonicalMetric {
                aspect: *aspect,
                score: *score,
                percentile: clamp_percentile(*score),
                tier: concerns
                    .iter()
                    .find(|c| c.aspect == *aspect)
                    .map(|c| c.tier)
                    .unwrap_or_else(|| tier_from_score(*score)),
                confidence,
                source: MetricSource::Ai,
            })
        })
        .collect();

    (metrics, concerns)
}

/// Ensure every tracked aspect is present, padding gaps with the neutral
/// metric, and return the list in registration order.
pub fn fill_missing(mut metrics: Vec<CanonicalMetric>) -> Vec<CanonicalMetric> {
    let mut ordered = Vec::with_capacity(Aspect::ALL.len());
    for aspect in Aspect::ALL {
        match metrics.iter().position(|m| m.aspect == aspect) {
            Some(idx) => ordered.push(metrics.swap_remove(idx)),
            None => ordered.push(CanonicalMetric::neutral(aspect)),
        }
    }
    ordered
}

fn aspect_rank(aspect: Aspect) -> usize {
    Aspect::ALL.iter().position(|a| *a == aspect).unwrap_or(usize::MAX)
}

fn tier_from_score(score: f32) -> SeverityTier {
    if score < 40.0 {
        SeverityTier::Severe
    } else if score < 70.0 {
        SeverityTier::Moderate
    } else {
        SeverityTier::Mild
    }
}
