// Copyright (c) 2025 Derma Labs
// SPDX-License-Identifier: BUSL-1.1
//! Parallel model batch runner.
//!
//! Fans one decoded image out to every requested model concurrently. Each
//! model's failure (preprocess, load or inference) is caught independently
//! and surfaces as a `None` entry in the result map; one failing model never
//! aborts the batch.

use super::{InferenceOutcome, ModelRuntime};
use crate::preprocess;
use futures::future::join_all;
use image::DynamicImage;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

pub struct BatchRunner {
    runtime: Arc<ModelRuntime>,
}

impl BatchRunner {
    pub fn new(runtime: Arc<ModelRuntime>) -> Self {
        Self { runtime }
    }

    /// Run every model in `model_ids` against `image` concurrently, joined
    /// with an all-complete barrier. Preprocessing happens per model since
    /// input shapes and fit policies differ.
    pub async fn run_batch(
        &self,
        image: &DynamicImage,
        model_ids: &[String],
    ) -> HashMap<String, Option<InferenceOutcome>> {
        let tasks = model_ids.iter().map(|id| {
            let runtime = self.runtime.clone();
            let id = id.clone();
            async move {
                let outcome = Self::run_one(&runtime, image, &id).await;
                (id, outcome)
            }
        });

        join_all(tasks).await.into_iter().collect()
    }

    async fn run_one(
        runtime: &ModelRuntime,
        image: &DynamicImage,
        id: &str,
    ) -> Option<InferenceOutcome> {
        let spec = match runtime.spec(id) {
            Some(spec) => spec.clone(),
            None => {
                warn!("batch requested unknown model '{}'", id);
                return None;
            }
        };

        let tensor =
            match preprocess::to_tensor(image, spec.input_width, spec.input_height, spec.resize) {
                Ok(tensor) => tensor,
                Err(e) => {
                    warn!("preprocess failed for model '{}': {}", id, e);
                    return None;
                }
            };

        if let Err(e) = runtime.load_model(id).await {
            warn!("skipping model '{}': {}", id, e);
            return None;
        }

        match runtime.run_inference(id, &tensor).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!("inference failed for model '{}': {}", id, e);
                None
            }
        }
    }
}
