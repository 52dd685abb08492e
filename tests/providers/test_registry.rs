// Copyright (c) 2025 Derma Labs
// SPDX-License-Identifier: BUSL-1.1
use derma_analysis_node::providers::mock::{MockBehavior, MockProvider};
use derma_analysis_node::{
    PipelineConfig, ProviderAdapter, ProviderCredentials, ProviderRegistry, ScoreDirection,
};
use std::sync::Arc;

#[test]
fn test_no_credentials_means_empty_registry() {
    let registry = ProviderRegistry::from_credentials(
        &ProviderCredentials::default(),
        &PipelineConfig::default(),
    )
    .unwrap();
    assert!(registry.is_empty());
    assert!(registry.names().is_empty());
}

#[test]
fn test_full_credentials_register_all_providers_in_priority_order() {
    let creds = ProviderCredentials {
        gemini_api_key: Some("g".to_string()),
        openai_api_key: Some("o".to_string()),
        anthropic_api_key: Some("a".to_string()),
        openai_endpoint: None,
    };
    let registry = ProviderRegistry::from_credentials(&creds, &PipelineConfig::default()).unwrap();
    assert_eq!(
        registry.names(),
        vec!["gemini-1.5-flash", "gpt-4o-mini", "claude-3.5-haiku"]
    );
}

#[test]
fn test_partial_credentials_skip_unconfigured_providers() {
    let creds = ProviderCredentials {
        openai_api_key: Some("o".to_string()),
        ..Default::default()
    };
    let registry = ProviderRegistry::from_credentials(&creds, &PipelineConfig::default()).unwrap();
    assert_eq!(registry.names(), vec!["gpt-4o-mini"]);
}

#[test]
fn test_adapters_sorted_by_ascending_priority() {
    let registry = ProviderRegistry::from_adapters(vec![
        Arc::new(MockProvider::new("third", 30, MockBehavior::Hang)),
        Arc::new(MockProvider::new("first", 1, MockBehavior::Hang)),
        Arc::new(MockProvider::new("second", 15, MockBehavior::Hang)),
    ]);
    assert_eq!(registry.names(), vec!["first", "second", "third"]);
}

#[test]
fn test_descriptor_direction_is_configurable_on_mocks() {
    let inverted = MockProvider::new("inv", 1, MockBehavior::Hang)
        .with_score_direction(ScoreDirection::HigherIsWorse);
    assert_eq!(
        inverted.descriptor().score_direction,
        ScoreDirection::HigherIsWorse
    );
}
