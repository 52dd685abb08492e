// Copyright (c) 2025 Derma Labs
// SPDX-License-Identifier: BUSL-1.1
//! Session cache behavior. Tests marked `#[ignore]` need real ONNX
//! artifacts under `MODEL_DIR` and run with `cargo test -- --ignored`.

use derma_analysis_node::preprocess::{to_tensor, ResizePolicy};
use derma_analysis_node::runtime::SingleFlightCache;
use derma_analysis_node::{ModelError, ModelRuntime};
use image::{DynamicImage, RgbImage};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

fn model_dir() -> PathBuf {
    env::var("MODEL_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./models"))
}

#[tokio::test]
async fn test_missing_artifact_is_recoverable_and_not_cached() {
    let runtime = ModelRuntime::with_default_specs("/nonexistent".into());

    for _ in 0..3 {
        let err = runtime.load_model("spot-detector").await.unwrap_err();
        assert!(matches!(err, ModelError::LoadFailure { .. }));
    }

    // Failed loads never enter the cache or count as performed loads.
    assert!(runtime.loaded_models().await.is_empty());
    assert_eq!(runtime.loads_performed(), 0);
}

#[tokio::test]
async fn test_unknown_model_id() {
    let runtime = ModelRuntime::with_default_specs("/nonexistent".into());
    assert!(matches!(
        runtime.load_model("bogus").await.unwrap_err(),
        ModelError::UnknownModel(_)
    ));
}

#[tokio::test]
async fn test_inference_requires_prior_load() {
    let runtime = ModelRuntime::with_default_specs("/nonexistent".into());
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(224, 224, image::Rgb([0, 0, 0])));
    let tensor = to_tensor(&image, 224, 224, ResizePolicy::Stretch).unwrap();

    assert!(matches!(
        runtime.run_inference("spot-detector", &tensor).await.unwrap_err(),
        ModelError::NotLoaded(_)
    ));
}

#[tokio::test]
async fn test_racing_callers_share_one_slow_load() {
    // Exercises the same session-cache machinery `load_model` sits on,
    // without needing a model artifact: a deliberately slow load gives all
    // callers time to pile up behind the in-flight one.
    let cache = Arc::new(SingleFlightCache::<u32>::new());

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_or_load("spot-detector", || async {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok::<u32, String>(7)
                    })
                    .await
            })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), 7);
    }

    assert_eq!(cache.loads_performed(), 1);
    assert_eq!(cache.keys().await, vec!["spot-detector".to_string()]);
}

#[tokio::test]
#[ignore]
async fn test_load_is_idempotent() {
    let runtime = ModelRuntime::with_default_specs(model_dir());

    runtime.load_model("spot-detector").await.unwrap();
    runtime.load_model("spot-detector").await.unwrap();

    assert_eq!(runtime.loads_performed(), 1);
    assert_eq!(runtime.loaded_models().await, vec!["spot-detector"]);
}

#[tokio::test]
#[ignore]
async fn test_concurrent_loads_share_one_session() {
    let runtime = Arc::new(ModelRuntime::with_default_specs(model_dir()));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let runtime = runtime.clone();
            tokio::spawn(async move { runtime.load_model("spot-detector").await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    // Single-flight: racing callers block on the in-flight load instead of
    // instantiating duplicate sessions.
    assert_eq!(runtime.loads_performed(), 1);
}

#[tokio::test]
#[ignore]
async fn test_unload_then_reload() {
    let runtime = ModelRuntime::with_default_specs(model_dir());

    runtime.load_model("spot-detector").await.unwrap();
    assert!(runtime.unload_model("spot-detector").await);
    assert!(runtime.loaded_models().await.is_empty());

    runtime.load_model("spot-detector").await.unwrap();
    assert_eq!(runtime.loads_performed(), 2);
}

#[tokio::test]
#[ignore]
async fn test_inference_output_shape() {
    let runtime = ModelRuntime::with_default_specs(model_dir());
    runtime.load_model("spot-detector").await.unwrap();

    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(224, 224, image::Rgb([140, 110, 90])));
    let tensor = to_tensor(&image, 224, 224, ResizePolicy::Stretch).unwrap();
    let outcome = runtime
        .run_inference("spot-detector", &tensor)
        .await
        .unwrap();

    assert_eq!(outcome.probabilities.len(), outcome.predictions.len());
    let total: f32 = outcome.probabilities.iter().sum();
    assert!((total - 1.0).abs() < 1e-4);
    assert!((0.0..=1.0).contains(&outcome.confidence));
    assert!(outcome.top_class < outcome.probabilities.len());
}
