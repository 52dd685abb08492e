// Copyright (c) 2025 Derma Labs
// SPDX-License-Identifier: BUSL-1.1
//! Anthropic Messages API adapter (Claude 3.5 Haiku).

use super::{ProviderAdapter, ProviderDescriptor, ProviderKind, ScoreDirection};
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const CLAUDE_ENDPOINT: &str = "https://api.anthropic.com";
const CLAUDE_MODEL: &str = "claude-3-5-haiku-latest";
const ANTHROPIC_VERSION: &str = "2023-06-01";

const DESCRIPTOR: ProviderDescriptor = ProviderDescriptor {
    kind: ProviderKind::Claude,
    name: "claude-3.5-haiku",
    priority: 3,
    score_direction: ScoreDirection::HigherIsHealthier,
};

#[derive(Serialize)]
struct MessagesRequest {
    model: &'static str,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "image")]
    Image { source: ImageSource },
    #[serde(rename = "text")]
    Text { text: String },
}

#[derive(Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    source_type: &'static str,
    media_type: String,
    data: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
}

#[derive(Deserialize)]
struct ResponseBlock {
    text: Option<String>,
}

pub struct ClaudeAdapter {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl ClaudeAdapter {
    pub fn new(client: Client, api_key: String) -> Self {
        Self {
            client,
            api_key,
            endpoint: CLAUDE_ENDPOINT.to_string(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for ClaudeAdapter {
    fn descriptor(&self) -> &ProviderDescriptor {
        &DESCRIPTOR
    }

    async fn analyze(
        &self,
        image_b64: &str,
        mime: &str,
        prompt: &str,
    ) -> Result<String, ProviderError> {
        let request = MessagesRequest {
            model: CLAUDE_MODEL,
            max_tokens: 2048,
            messages: vec![Message {
                role: "user",
                content: vec![
                    ContentBlock::Image {
                        source: ImageSource {
                            source_type: "base64",
                            media_type: format!("image/{}", mime),
                            data: image_b64.to_string(),
                        },
                    },
                    ContentBlock::Text {
                        text: prompt.to_string(),
                    },
                ],
            }],
        };

        let url = format!("{}/v1/messages", self.endpoint);
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::HttpStatus(response.status().as_u16()));
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        let text = body
            .content
            .into_iter()
            .find_map(|b| b.text)
            .ok_or_else(|| {
                ProviderError::MalformedResponse("no text block in response".to_string())
            })?;

        debug!("claude returned {} chars", text.len());
        Ok(text)
    }
}
