// Copyright (c) 2025 Derma Labs
// SPDX-License-Identifier: BUSL-1.1
//! Provider prompt construction and strict response parsing.
//!
//! Providers wrap their JSON in prose, markdown fences or trailing
//! commentary; the parser extracts the first balanced JSON object and
//! validates it against the expected schema. Anything that does not validate
//! fails closed as `MalformedResponse` instead of producing partial fields.

use crate::error::ProviderError;
use crate::types::Locale;
use serde::Deserialize;
use std::collections::HashMap;

/// Aspects the prompt asks the provider to score, in output order.
const PROMPT_ASPECTS: &str = "spots, pores, wrinkles, texture, redness";

/// Build the analysis prompt for a provider.
///
/// All shipped providers are prompted for the same contract: 0-100 scores
/// per aspect where higher is healthier, a concern list with severity
/// labels, and recommendations.
pub fn build_prompt(locale: Locale) -> String {
    let language = match locale {
        Locale::En => "English",
        Locale::Th => "Thai",
    };

    format!(
        "You are an expert dermatologist AI analyzing a facial skin image. \
Respond in {language}.\n\n\
Score each of these aspects from 0-100, where 100 is perfectly healthy skin: \
{PROMPT_ASPECTS}.\n\n\
For each concern found, provide its type (one of the aspects above), a \
severity label (mild, moderate or severe) and a brief description. Also \
provide 3-5 personalized skincare recommendations and the overall skin type \
(oily, dry, combination, normal or sensitive).\n\n\
Return ONLY a JSON object in this exact format:\n\
{{\n\
  \"skinType\": \"normal\",\n\
  \"scores\": {{\"spots\": 80, \"pores\": 72, \"wrinkles\": 88, \"texture\": 75, \"redness\": 82}},\n\
  \"concerns\": [{{\"type\": \"pores\", \"severity\": \"moderate\", \"description\": \"...\"}}],\n\
  \"recommendations\": [\"...\"],\n\
  \"confidence\": 0.85\n\
}}"
    )
}

/// One concern entry as providers report it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConcern {
    #[serde(alias = "type", alias = "concern", alias = "name")]
    pub kind: String,
    pub severity: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Validated provider payload. Transient; discarded after normalization.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderAnalysis {
    #[serde(default)]
    pub skin_type: Option<String>,
    /// Per-aspect 0-100 scores; directionality is declared by the provider's
    /// descriptor, not assumed here.
    #[serde(default, alias = "visiaScores")]
    pub scores: HashMap<String, f64>,
    #[serde(default)]
    pub concerns: Vec<RawConcern>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Extract and validate the first well-formed JSON object in `text`.
pub fn parse_provider_payload(text: &str) -> Result<ProviderAnalysis, ProviderError> {
    let json = extract_json_object(text)
        .ok_or_else(|| ProviderError::MalformedResponse("no JSON object in payload".to_string()))?;

    let analysis: ProviderAnalysis = serde_json::from_str(json)
        .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

    // Fail closed on an empty analysis rather than propagating a shell that
    // would normalize into all-neutral metrics
    if analysis.scores.is_empty() && analysis.concerns.is_empty() {
        return Err(ProviderError::MalformedResponse(
            "payload carries neither scores nor concerns".to_string(),
        ));
    }

    Ok(analysis)
}

/// Find the first balanced `{...}` span, respecting string literals.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
