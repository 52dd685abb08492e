// Copyright (c) 2025 Derma Labs
// SPDX-License-Identifier: BUSL-1.1
//! Top-level analysis pipeline.
//!
//! One call per request: decode, resolve the analysis mode, run the local
//! model batch and the provider chain concurrently, then normalize and
//! aggregate. The only error this surfaces is an unreadable input image;
//! everything downstream degrades instead of failing.

use crate::aggregate;
use crate::config::PipelineConfig;
use crate::error::AnalysisError;
use crate::orchestrator::{self, AiOutcome};
use crate::preprocess;
use crate::providers::ProviderRegistry;
use crate::quality;
use crate::runtime::{BatchRunner, ModelRuntime};
use crate::types::{AnalysisMode, AnalysisRequest, Aspect, CvMeasurement, HybridAnalysisResult};
use crate::cv;
use base64::Engine;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct AnalysisPipeline {
    runtime: Arc<ModelRuntime>,
    registry: Arc<ProviderRegistry>,
    config: PipelineConfig,
}

impl AnalysisPipeline {
    pub fn new(
        runtime: Arc<ModelRuntime>,
        registry: Arc<ProviderRegistry>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            runtime,
            registry,
            config,
        }
    }

    /// Analyze one image. Always produces a result for a decodable image.
    pub async fn analyze(
        &self,
        request: AnalysisRequest,
    ) -> Result<HybridAnalysisResult, AnalysisError> {
        let started = Instant::now();
        let (image, info) = preprocess::decode_image(&request.image)?;
        let mode = quality::resolve_mode(request.mode_hint, request.quality.as_ref());
        info!(
            ?mode,
            width = info.width,
            height = info.height,
            "starting analysis"
        );

        let cancel = CancellationToken::new();
        let cv_half = self.run_cv_half(mode, &image, &cancel);
        let ai_half = self.run_ai_half(mode, &request, &info, &cancel);
        let work = async { tokio::join!(cv_half, ai_half) };
        tokio::pin!(work);

        // The deadline timer lives inside this select, so it stops with the
        // request instead of outliving it. On expiry both halves observe the
        // token and unwind to their degraded outputs.
        let (measurements, ai) = tokio::select! {
            out = &mut work => out,
            _ = tokio::time::sleep(self.config.overall_deadline) => {
                warn!(
                    deadline_ms = self.config.overall_deadline.as_millis() as u64,
                    "overall deadline reached, abandoning in-flight work"
                );
                cancel.cancel();
                work.await
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let result = aggregate::aggregate(measurements, ai, mode, elapsed_ms);
        info!(
            overall_score = result.overall_score,
            provider = result.provider().unwrap_or("none"),
            elapsed_ms,
            "analysis complete"
        );
        Ok(result)
    }

    async fn run_cv_half(
        &self,
        mode: AnalysisMode,
        image: &image::DynamicImage,
        cancel: &CancellationToken,
    ) -> HashMap<Aspect, CvMeasurement> {
        if mode == AnalysisMode::Ai {
            return HashMap::new();
        }
        let runner = BatchRunner::new(self.runtime.clone());
        let model_ids = self.runtime.model_ids();
        tokio::select! {
            _ = cancel.cancelled() => {
                warn!("local model batch abandoned at deadline, continuing without measurements");
                HashMap::new()
            }
            outcomes = runner.run_batch(image, &model_ids) => {
                let measurements = cv::measurements_from_batch(&outcomes);
                debug!(
                    measured = measurements.len(),
                    requested = outcomes.len(),
                    "local model batch finished"
                );
                measurements
            }
        }
    }

    async fn run_ai_half(
        &self,
        mode: AnalysisMode,
        request: &AnalysisRequest,
        info: &preprocess::ImageInfo,
        cancel: &CancellationToken,
    ) -> Option<AiOutcome> {
        if mode == AnalysisMode::Cv {
            return None;
        }
        let image_b64 = base64::engine::general_purpose::STANDARD.encode(&request.image);
        let mime = preprocess::format_to_mime(info.format);
        Some(
            orchestrator::run_providers(
                &self.registry,
                &image_b64,
                mime,
                request.locale,
                &self.config,
                cancel,
            )
            .await,
        )
    }
}
