//! Round prompt generation.
//!
//! The coordinator only needs "a string to cook against"; where that string
//! comes from is pluggable. An external HTTP generator can be configured,
//! with the built-in list as fallback.

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("generator request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("generator returned an unusable response: {0}")]
    BadResponse(String),
}

#[async_trait]
pub trait PromptGenerator: Send + Sync {
    async fn generate(&self, theme: Option<&str>) -> Result<String, GeneratorError>;
}

const HOUSE_PROMPTS: &[&str] = &[
    "Something delicious on toast",
    "A dish built around eggs",
    "Your best ten-minute pasta",
    "Breakfast for dinner",
    "A sandwich worth bragging about",
    "Something you can eat with one hand",
    "Leftovers, reinvented",
    "A dessert with exactly three ingredients",
    "The fanciest thing you can make from a tin",
    "Street food from anywhere in the world",
    "A salad that isn't boring",
    "Comfort food for a rainy day",
];

/// Built-in prompt list; never fails.
pub struct HousePrompts;

#[async_trait]
impl PromptGenerator for HousePrompts {
    async fn generate(&self, _theme: Option<&str>) -> Result<String, GeneratorError> {
        let idx = rand::rng().random_range(0..HOUSE_PROMPTS.len());
        Ok(HOUSE_PROMPTS[idx].to_string())
    }
}

#[derive(Debug, Serialize)]
struct PromptRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    theme: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PromptResponse {
    prompt: String,
}

/// External prompt service: POST a theme, get `{"prompt": "..."}` back.
pub struct HttpGenerator {
    url: String,
    client: reqwest::Client,
}

impl HttpGenerator {
    pub fn new(url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap();
        Self { url, client }
    }
}

#[async_trait]
impl PromptGenerator for HttpGenerator {
    async fn generate(&self, theme: Option<&str>) -> Result<String, GeneratorError> {
        let response = self
            .client
            .post(&self.url)
            .json(&PromptRequest { theme })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GeneratorError::BadResponse(format!(
                "status {}",
                response.status()
            )));
        }

        let body: PromptResponse = response.json().await?;
        let prompt = body.prompt.trim().to_string();
        if prompt.is_empty() {
            return Err(GeneratorError::BadResponse("empty prompt".to_string()));
        }
        Ok(prompt)
    }
}

/// Wraps a primary generator and falls back to the house list on failure, so
/// a flaky prompt service never blocks a round from starting.
pub struct FallbackGenerator {
    primary: Box<dyn PromptGenerator>,
}

#[async_trait]
impl PromptGenerator for FallbackGenerator {
    async fn generate(&self, theme: Option<&str>) -> Result<String, GeneratorError> {
        match self.primary.generate(theme).await {
            Ok(prompt) => Ok(prompt),
            Err(e) => {
                tracing::warn!(error = %e, "prompt generator failed, using house prompts");
                HousePrompts.generate(theme).await
            }
        }
    }
}

/// Build the configured generator.
pub fn from_config(url: Option<&str>) -> Arc<dyn PromptGenerator> {
    match url {
        Some(url) => Arc::new(FallbackGenerator {
            primary: Box::new(HttpGenerator::new(url.to_string())),
        }),
        None => Arc::new(HousePrompts),
    }
}
