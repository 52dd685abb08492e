// Copyright (c) 2025 Derma Labs
// SPDX-License-Identifier: BUSL-1.1
//! Model runtime: loads, caches and runs the local ONNX measurement models.
//!
//! Sessions have an explicit load -> use -> unload lifecycle and are never
//! silently evicted, keeping memory behavior predictable for a long-running
//! service. Concurrent loads of the same model collapse into one actual load
//! via a per-key in-flight guard.

mod batch;
mod single_flight;

pub use batch::BatchRunner;
pub use single_flight::SingleFlightCache;

use crate::error::ModelError;
use crate::preprocess::ResizePolicy;
use crate::types::Aspect;
use ndarray::Array4;
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Static description of one measurement model.
#[derive(Debug, Clone)]
pub struct ModelSpec {
    /// Model identifier, used as the batch-result key.
    pub id: String,
    /// Artifact file name inside the configured model directory.
    pub file_name: String,
    /// Aspect this model measures.
    pub aspect: Aspect,
    /// Input tensor width/height (channel-first, 3 channels).
    pub input_width: u32,
    pub input_height: u32,
    /// Fit policy, documented per model.
    pub resize: ResizePolicy,
    /// Graph input tensor name.
    pub input_name: &'static str,
    /// Number of severity classes the model predicts (band 0 = clear skin).
    pub classes: usize,
}

/// The measurement models shipped with the pipeline. All are 224x224
/// severity-band classifiers; the texture model is geometry-sensitive and
/// uses aspect-preserving padding instead of a stretch fit.
pub fn default_specs() -> Vec<ModelSpec> {
    let classifier = |id: &str, file: &str, aspect: Aspect, resize: ResizePolicy| ModelSpec {
        id: id.to_string(),
        file_name: file.to_string(),
        aspect,
        input_width: 224,
        input_height: 224,
        resize,
        input_name: "input",
        classes: 4,
    };

    vec![
        classifier("spot-detector", "spot-detector.onnx", Aspect::Spots, ResizePolicy::Stretch),
        classifier("pore-analyzer", "pore-analyzer.onnx", Aspect::Pores, ResizePolicy::Stretch),
        classifier(
            "wrinkle-detector",
            "wrinkle-detector.onnx",
            Aspect::Wrinkles,
            ResizePolicy::Stretch,
        ),
        classifier(
            "texture-analyzer",
            "texture-analyzer.onnx",
            Aspect::Texture,
            ResizePolicy::AspectPad,
        ),
        classifier(
            "redness-detector",
            "redness-detector.onnx",
            Aspect::Redness,
            ResizePolicy::Stretch,
        ),
    ]
}

/// An opaque loaded-model handle.
pub struct ModelSession {
    pub spec: ModelSpec,
    // ort sessions take &mut self to run; serialize access per session
    session: Mutex<Session>,
}

impl std::fmt::Debug for ModelSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSession")
            .field("id", &self.spec.id)
            .field("aspect", &self.spec.aspect)
            .finish_non_exhaustive()
    }
}

/// Single forward pass result. Softmax is applied on read rather than baked
/// into the model so the raw logits stay available for alternative
/// aggregation without re-running inference.
#[derive(Debug, Clone)]
pub struct InferenceOutcome {
    pub model_id: String,
    pub aspect: Aspect,
    /// Raw logits, one per severity class.
    pub predictions: Vec<f32>,
    /// Softmax of the logits.
    pub probabilities: Vec<f32>,
    pub top_class: usize,
    pub confidence: f32,
    pub inference_time_ms: u64,
}

/// Session cache shared across concurrent requests.
pub struct ModelRuntime {
    model_dir: PathBuf,
    specs: HashMap<String, ModelSpec>,
    sessions: SingleFlightCache<Arc<ModelSession>>,
}

impl ModelRuntime {
    pub fn new(model_dir: PathBuf, specs: Vec<ModelSpec>) -> Self {
        let specs = specs.into_iter().map(|s| (s.id.clone(), s)).collect();
        Self {
            model_dir,
            specs,
            sessions: SingleFlightCache::new(),
        }
    }

    pub fn with_default_specs(model_dir: PathBuf) -> Self {
        Self::new(model_dir, default_specs())
    }

    /// Registered model ids, in registration order of their aspects.
    pub fn model_ids(&self) -> Vec<String> {
        let mut ids: Vec<&ModelSpec> = self.specs.values().collect();
        ids.sort_by_key(|s| (s.aspect, s.id.clone()));
        ids.into_iter().map(|s| s.id.clone()).collect()
    }

    pub fn spec(&self, id: &str) -> Option<&ModelSpec> {
        self.specs.get(id)
    }

    /// Number of underlying session loads performed so far.
    pub fn loads_performed(&self) -> usize {
        self.sessions.loads_performed()
    }

    /// Idempotent model load.
    ///
    /// If a session for `id` is already cached it is returned; otherwise the
    /// artifact is loaded exactly once even under concurrent callers (the
    /// cache serializes first-loads per key). A load failure is recoverable
    /// (the caller skips this model) and is not cached, so a later call can
    /// retry.
    pub async fn load_model(&self, id: &str) -> Result<Arc<ModelSession>, ModelError> {
        let spec = self
            .specs
            .get(id)
            .ok_or_else(|| ModelError::UnknownModel(id.to_string()))?
            .clone();
        let path = self.model_dir.join(&spec.file_name);
        let model_id = id.to_string();

        self.sessions
            .get_or_load(id, || async move {
                if !path.exists() {
                    return Err(ModelError::LoadFailure {
                        id: model_id,
                        reason: format!("model artifact not found: {}", path.display()),
                    });
                }

                debug!(
                    "loading measurement model '{}' from {}",
                    model_id,
                    path.display()
                );
                // CPU only: these models are small and the GPU is left to
                // heavier workloads elsewhere in the deployment
                let session = Session::builder()
                    .and_then(|b| {
                        b.with_execution_providers([CPUExecutionProvider::default().build()])
                    })
                    .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
                    .and_then(|b| b.with_intra_threads(2))
                    .and_then(|b| b.commit_from_file(&path))
                    .map_err(|e| ModelError::LoadFailure {
                        id: model_id.clone(),
                        reason: e.to_string(),
                    })?;

                info!("measurement model '{}' loaded", model_id);
                Ok(Arc::new(ModelSession {
                    spec,
                    session: Mutex::new(session),
                }))
            })
            .await
    }

    /// Run a forward pass on an already-loaded model and apply softmax over
    /// the raw logits.
    pub async fn run_inference(
        &self,
        id: &str,
        tensor: &Array4<f32>,
    ) -> Result<InferenceOutcome, ModelError> {
        let session = self
            .sessions
            .get(id)
            .await
            .ok_or_else(|| ModelError::NotLoaded(id.to_string()))?;

        let started = Instant::now();
        let logits: Vec<f32> = {
            let mut guard = session.session.lock().map_err(|_| ModelError::InferenceFailed {
                id: id.to_string(),
                reason: "session mutex poisoned".to_string(),
            })?;
            let input = Value::from_array(tensor.clone()).map_err(|e| {
                ModelError::InferenceFailed {
                    id: id.to_string(),
                    reason: e.to_string(),
                }
            })?;
            let outputs = guard
                .run(ort::inputs![session.spec.input_name => input])
                .map_err(|e| ModelError::InferenceFailed {
                    id: id.to_string(),
                    reason: e.to_string(),
                })?;
            let array = outputs[0].try_extract_array::<f32>().map_err(|e| {
                ModelError::InferenceFailed {
                    id: id.to_string(),
                    reason: e.to_string(),
                }
            })?;
            array.iter().copied().collect()
        };

        if logits.is_empty() {
            return Err(ModelError::InferenceFailed {
                id: id.to_string(),
                reason: "model produced an empty output tensor".to_string(),
            });
        }

        let probabilities = softmax(&logits);
        let (top_class, confidence) = probabilities
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, &p)| (i, p))
            .unwrap_or((0, 0.0));

        Ok(InferenceOutcome {
            model_id: id.to_string(),
            aspect: session.spec.aspect,
            predictions: logits,
            probabilities,
            top_class,
            confidence,
            inference_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Explicitly release one session. Returns whether a session was held.
    pub async fn unload_model(&self, id: &str) -> bool {
        let removed = self.sessions.remove(id).await;
        if removed {
            info!("measurement model '{}' unloaded", id);
        }
        removed
    }

    /// Release every cached session.
    pub async fn dispose_all(&self) {
        let disposed = self.sessions.clear().await;
        if disposed > 0 {
            info!("disposed {} cached model sessions", disposed);
        }
    }

    /// Ids of currently loaded sessions.
    pub async fn loaded_models(&self) -> Vec<String> {
        self.sessions.keys().await
    }
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum == 0.0 {
        warn!("softmax over degenerate logits, returning uniform distribution");
        return vec![1.0 / logits.len() as f32; logits.len()];
    }
    exps.iter().map(|&e| e / sum).collect()
}
