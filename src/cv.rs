// Copyright (c) 2025 Derma Labs
// SPDX-License-Identifier: BUSL-1.1
//! Maps raw model outcomes to per-aspect CV measurements.
//!
//! Each measurement model predicts severity bands; the expected band index
//! under the softmax distribution becomes a 1-10 severity, and the severity
//! is placed on a population percentile via a normal-CDF approximation
//! (mean 5, std 2) until enough real measurements exist to replace it.

use crate::runtime::InferenceOutcome;
use crate::types::{Aspect, CvMeasurement};
use std::collections::HashMap;
use tracing::debug;

/// Approximate per-aspect lesion/feature counts at full severity. Used to
/// derive a deterministic raw count from the severity fraction.
fn count_scale(aspect: Aspect) -> f32 {
    match aspect {
        Aspect::Spots => 40.0,
        Aspect::Pores => 120.0,
        Aspect::Wrinkles => 25.0,
        Aspect::Texture => 60.0,
        Aspect::Redness => 30.0,
    }
}

/// Convert one inference outcome to a CV measurement.
pub fn measurement_from_outcome(outcome: &InferenceOutcome) -> CvMeasurement {
    let classes = outcome.probabilities.len().max(2);
    // Expected class index under the softmax distribution, as a 0..1 fraction
    let expected: f32 = outcome
        .probabilities
        .iter()
        .enumerate()
        .map(|(i, &p)| i as f32 * p)
        .sum::<f32>()
        / (classes - 1) as f32;

    let severity = (1.0 + expected * 9.0).clamp(1.0, 10.0);
    let count = (expected * count_scale(outcome.aspect)).round() as u32;
    let percentile = severity_percentile(severity);

    debug!(
        "cv measurement: aspect={} severity={:.2} count={} percentile={:.1}",
        outcome.aspect.as_str(),
        severity,
        count,
        percentile
    );

    CvMeasurement {
        severity,
        count,
        percentile,
    }
}

/// Collapse a batch-result map to per-aspect measurements. Failed models are
/// simply absent; the normalizer fills the gaps with neutral metrics.
pub fn measurements_from_batch(
    outcomes: &HashMap<String, Option<InferenceOutcome>>,
) -> HashMap<Aspect, CvMeasurement> {
    let mut measurements = HashMap::new();
    for outcome in outcomes.values().flatten() {
        measurements.insert(outcome.aspect, measurement_from_outcome(outcome));
    }
    measurements
}

/// Percentile of a 1-10 severity against an assumed normal population
/// (mean 5, std 2). Lower severity means better skin: the returned value is
/// the share of the population with a worse score. Clamped to 1-99 to keep
/// expectations realistic.
pub fn severity_percentile(severity: f32) -> f32 {
    let z = (severity - 5.0) / 2.0;
    let cdf = 50.0 * (1.0 + erf(z / std::f32::consts::SQRT_2));
    (100.0 - cdf).clamp(1.0, 99.0).round()
}

/// Abramowitz & Stegun polynomial approximation of the error function.
fn erf(x: f32) -> f32 {
    let sign = if x >= 0.0 { 1.0 } else { -1.0 };
    let x = x.abs();

    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();

    sign * y
}
