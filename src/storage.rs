// Copyright (c) 2025 Derma Labs
// SPDX-License-Identifier: BUSL-1.1
//! Persistence collaborator. The pipeline hands finished results to an
//! `AnalysisStore` and never talks to a database directly.

use crate::error::StoreError;
use crate::types::HybridAnalysisResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Persist one result for the given caller and return the record id.
    async fn save(
        &self,
        caller_id: &str,
        result: &HybridAnalysisResult,
    ) -> Result<String, StoreError>;
}

/// Process-local store used by the CLI and by tests.
#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<String, StoredRecord>>,
}

struct StoredRecord {
    caller_id: String,
    payload: String,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored canonical JSON for a record, if present.
    pub fn payload(&self, record_id: &str) -> Option<String> {
        self.records
            .read()
            .ok()
            .and_then(|r| r.get(record_id).map(|rec| rec.payload.clone()))
    }

    pub fn records_for(&self, caller_id: &str) -> Vec<String> {
        self.records
            .read()
            .map(|r| {
                r.iter()
                    .filter(|(_, rec)| rec.caller_id == caller_id)
                    .map(|(id, _)| id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl AnalysisStore for InMemoryStore {
    async fn save(
        &self,
        caller_id: &str,
        result: &HybridAnalysisResult,
    ) -> Result<String, StoreError> {
        let payload =
            serde_json::to_string(result).map_err(|e| StoreError::Persist(e.to_string()))?;
        let record_id = Uuid::new_v4().to_string();
        let mut records = self
            .records
            .write()
            .map_err(|_| StoreError::Persist("store lock poisoned".to_string()))?;
        records.insert(
            record_id.clone(),
            StoredRecord {
                caller_id: caller_id.to_string(),
                payload,
            },
        );
        debug!(caller_id, record_id = %record_id, "analysis persisted");
        Ok(record_id)
    }
}
