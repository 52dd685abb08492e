// Copyright (c) 2025 Derma Labs
// SPDX-License-Identifier: BUSL-1.1
//! OpenAI-compatible chat completions adapter (gpt-4o-mini by default).
//!
//! Works against api.openai.com or any compatible gateway supplied via
//! `OPENAI_ENDPOINT`, which is how self-hosted vision gateways plug in.

use super::{ProviderAdapter, ProviderDescriptor, ProviderKind, ScoreDirection};
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const OPENAI_ENDPOINT: &str = "https://api.openai.com";
const OPENAI_MODEL: &str = "gpt-4o-mini";

const DESCRIPTOR: ProviderDescriptor = ProviderDescriptor {
    kind: ProviderKind::OpenAi,
    name: "gpt-4o-mini",
    priority: 2,
    score_direction: ScoreDirection::HigherIsHealthier,
};

#[derive(Serialize)]
struct ChatRequest {
    model: &'static str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

pub struct OpenAiAdapter {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl OpenAiAdapter {
    pub fn new(client: Client, api_key: String, endpoint_override: Option<String>) -> Self {
        let endpoint = endpoint_override
            .unwrap_or_else(|| OPENAI_ENDPOINT.to_string())
            .trim_end_matches('/')
            .to_string();
        Self {
            client,
            api_key,
            endpoint,
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn descriptor(&self) -> &ProviderDescriptor {
        &DESCRIPTOR
    }

    async fn analyze(
        &self,
        image_b64: &str,
        mime: &str,
        prompt: &str,
    ) -> Result<String, ProviderError> {
        let request = ChatRequest {
            model: OPENAI_MODEL,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: prompt.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: format!("data:image/{};base64,{}", mime, image_b64),
                        },
                    },
                ],
            }],
            max_tokens: 2048,
            temperature: 0.1,
        };

        let url = format!("{}/v1/chat/completions", self.endpoint);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::HttpStatus(response.status().as_u16()));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                ProviderError::MalformedResponse("no message content in response".to_string())
            })?;

        debug!("openai returned {} chars", text.len());
        Ok(text)
    }
}
