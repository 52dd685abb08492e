// Copyright (c) 2025 Derma Labs
// SPDX-License-Identifier: BUSL-1.1
use derma_analysis_node::aggregate::aggregate;
use derma_analysis_node::providers::schema::{ProviderAnalysis, RawConcern};
use derma_analysis_node::{
    AiOutcome, AnalysisMode, Aspect, CvMeasurement, ScoreDirection, SeverityTier,
};
use rand::Rng;
use std::collections::HashMap;

fn ai_outcome(scores: HashMap<String, f64>, confidence: Option<f64>) -> AiOutcome {
    AiOutcome {
        analysis: ProviderAnalysis {
            skin_type: Some("dry".to_string()),
            scores,
            concerns: vec![],
            recommendations: vec![],
            confidence,
        },
        provider: "gemini-1.5-flash".to_string(),
        score_direction: ScoreDirection::HigherIsHealthier,
        attempts: vec![],
        elapsed_ms: 900,
    }
}

#[test]
fn test_overall_score_is_mean_over_random_inputs() {
    let mut rng = rand::thread_rng();
    for _ in 0..50 {
        let mut cv = HashMap::new();
        for aspect in Aspect::ALL {
            if rng.gen_bool(0.7) {
                cv.insert(
                    aspect,
                    CvMeasurement {
                        severity: rng.gen_range(1.0..=10.0),
                        count: rng.gen_range(0..200),
                        percentile: rng.gen_range(1.0..=99.0),
                    },
                );
            }
        }
        let result = aggregate(cv, None, AnalysisMode::Cv, 1);
        let expected = (result.metrics.iter().map(|m| m.score).sum::<f32>()
            / result.metrics.len() as f32)
            .round() as u32;
        assert_eq!(result.overall_score, expected);
        assert!(result.overall_score <= 100);
    }
}

#[test]
fn test_cv_beats_ai_for_measured_aspects() {
    let cv = HashMap::from([(
        Aspect::Spots,
        CvMeasurement {
            severity: 9.0,
            count: 44,
            percentile: 4.0,
        },
    )]);
    let ai = ai_outcome(HashMap::from([("spots".to_string(), 98.0)]), Some(0.9));
    let result = aggregate(cv, Some(ai), AnalysisMode::Hybrid, 1);

    let spots = result
        .metrics
        .iter()
        .find(|m| m.aspect == Aspect::Spots)
        .unwrap();
    assert_eq!(spots.score, 20.0);
}

#[test]
fn test_high_cv_severity_raises_a_concern() {
    let cv = HashMap::from([(
        Aspect::Redness,
        CvMeasurement {
            severity: 7.5,
            count: 10,
            percentile: 11.0,
        },
    )]);
    let result = aggregate(cv, None, AnalysisMode::Cv, 1);
    assert_eq!(result.concerns.len(), 1);
    assert_eq!(result.concerns[0].aspect, Aspect::Redness);
    assert_eq!(result.concerns[0].tier, SeverityTier::Severe);
}

#[test]
fn test_concerns_deduplicated_in_registration_order() {
    let cv = HashMap::from([
        (
            Aspect::Redness,
            CvMeasurement {
                severity: 8.0,
                count: 9,
                percentile: 8.0,
            },
        ),
        (
            Aspect::Spots,
            CvMeasurement {
                severity: 9.0,
                count: 50,
                percentile: 3.0,
            },
        ),
    ]);
    let mut ai = ai_outcome(HashMap::new(), None);
    ai.analysis.concerns = vec![RawConcern {
        kind: "redness".to_string(),
        severity: "mild".to_string(),
        description: Some("Slight flushing".to_string()),
    }];
    let result = aggregate(cv, Some(ai), AnalysisMode::Hybrid, 1);

    assert_eq!(result.concerns.len(), 2);
    assert_eq!(result.concerns[0].aspect, Aspect::Spots);
    // The provider's concern wins over the CV-derived one for Redness.
    assert_eq!(result.concerns[1].aspect, Aspect::Redness);
    assert_eq!(result.concerns[1].description, "Slight flushing");
}

#[test]
fn test_confidence_source() {
    let result = aggregate(HashMap::new(), None, AnalysisMode::Cv, 1);
    assert_eq!(result.confidence, 0.7);

    let ai = ai_outcome(HashMap::new(), Some(0.93));
    let result = aggregate(HashMap::new(), Some(ai), AnalysisMode::Ai, 1);
    assert!((result.confidence - 0.93).abs() < 1e-6);
}

#[test]
fn test_deterministic_metric_order() {
    let cv = HashMap::from([
        (
            Aspect::Redness,
            CvMeasurement {
                severity: 2.0,
                count: 1,
                percentile: 90.0,
            },
        ),
        (
            Aspect::Pores,
            CvMeasurement {
                severity: 5.0,
                count: 80,
                percentile: 50.0,
            },
        ),
    ]);
    let result = aggregate(cv, None, AnalysisMode::Cv, 1);
    let order: Vec<Aspect> = result.metrics.iter().map(|m| m.aspect).collect();
    assert_eq!(order, Aspect::ALL.to_vec());
}

#[test]
fn test_canonical_json_shape() {
    let ai = ai_outcome(HashMap::from([("pores".to_string(), 64.0)]), Some(0.88));
    let result = aggregate(HashMap::new(), Some(ai), AnalysisMode::Ai, 7);
    let json = serde_json::to_value(&result).unwrap();

    assert!(json["overallScore"].is_u64());
    assert!(json["confidence"].is_f64());
    assert!(json["percentiles"]["pores"].is_u64());
    assert_eq!(json["ai"]["model"], "gemini-1.5-flash");
    assert_eq!(json["ai"]["skinType"], "dry");
    assert!(json["timestamp"].is_string());
}

#[test]
fn test_cv_only_json_omits_ai_block() {
    let result = aggregate(HashMap::new(), None, AnalysisMode::Cv, 7);
    let json = serde_json::to_value(&result).unwrap();
    assert!(json.get("ai").is_none());
}
