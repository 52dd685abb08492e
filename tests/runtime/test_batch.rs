// Copyright (c) 2025 Derma Labs
// SPDX-License-Identifier: BUSL-1.1
use derma_analysis_node::cv::measurements_from_batch;
use derma_analysis_node::{BatchRunner, ModelRuntime};
use image::{DynamicImage, RgbImage};
use std::sync::Arc;

fn test_image() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(128, 128, image::Rgb([150, 120, 100])))
}

#[tokio::test]
async fn test_batch_tolerates_total_model_absence() {
    let runtime = Arc::new(ModelRuntime::with_default_specs("/nonexistent".into()));
    let runner = BatchRunner::new(runtime.clone());

    let outcomes = runner.run_batch(&test_image(), &runtime.model_ids()).await;

    // Every requested model appears in the map; all failed individually.
    assert_eq!(outcomes.len(), runtime.model_ids().len());
    assert!(outcomes.values().all(|o| o.is_none()));

    // Downstream, a fully failed batch is just an empty measurement set.
    assert!(measurements_from_batch(&outcomes).is_empty());
}

#[tokio::test]
async fn test_unknown_model_id_does_not_poison_the_batch() {
    let runtime = Arc::new(ModelRuntime::with_default_specs("/nonexistent".into()));
    let runner = BatchRunner::new(runtime);

    let ids = vec!["no-such-model".to_string(), "spot-detector".to_string()];
    let outcomes = runner.run_batch(&test_image(), &ids).await;

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes["no-such-model"].is_none());
    assert!(outcomes["spot-detector"].is_none());
}

#[tokio::test]
async fn test_empty_batch_is_a_noop() {
    let runtime = Arc::new(ModelRuntime::with_default_specs("/nonexistent".into()));
    let runner = BatchRunner::new(runtime);
    let outcomes = runner.run_batch(&test_image(), &[]).await;
    assert!(outcomes.is_empty());
}
