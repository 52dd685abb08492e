// Copyright (c) 2025 Derma Labs
// SPDX-License-Identifier: BUSL-1.1
//! Quality gate: decides whether remote providers are worth consulting.

use crate::types::{AnalysisMode, ModeHint, QualityMetrics};

/// Below this overall quality, remote providers are not worth the
/// latency/cost and the request is measured locally only.
pub const MIN_QUALITY_FOR_AI: f32 = 0.4;

/// Resolve the analysis mode from the request hint and image-quality metrics.
///
/// An explicit hint is honored directly. With no metrics the gate defaults to
/// hybrid; a poor image (`overall_quality < 0.4`) forces CV-only. Pure
/// function, no side effects.
pub fn resolve_mode(hint: ModeHint, metrics: Option<&QualityMetrics>) -> AnalysisMode {
    match hint {
        ModeHint::Cv => AnalysisMode::Cv,
        ModeHint::Ai => AnalysisMode::Ai,
        ModeHint::Hybrid => AnalysisMode::Hybrid,
        ModeHint::Auto => match metrics {
            None => AnalysisMode::Hybrid,
            Some(m) if m.overall_quality < MIN_QUALITY_FOR_AI => AnalysisMode::Cv,
            Some(_) => AnalysisMode::Hybrid,
        },
    }
}
