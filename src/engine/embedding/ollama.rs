// Engram RAG — HTTP Embedding Client
//
// Calls Ollama or an OpenAI-compatible embedding API. Order of attempts:
//   1. POST /api/embed       { model, input }  → { embeddings: [[..]] }
//   2. POST /api/embeddings  { model, prompt } → { embedding: [..] }   (legacy Ollama)
//   3. POST /v1/embeddings   { model, input }  → { data: [{ embedding: [..] }] }
// A "model not found" answer from Ollama triggers one pull per client.

use super::Embedder;
use crate::atoms::error::{EngineError, EngineResult};
use crate::engine::config::EmbeddingConfig;
use async_trait::async_trait;
use log::{info, warn};
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
    pull_attempted: AtomicBool,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str) -> Self {
        OllamaEmbedder {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            pull_attempted: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self::new(&config.base_url, &config.model)
    }

    async fn embed_ollama(&self, text: &str) -> EngineResult<Vec<f32>> {
        // ── /api/embed (Ollama 0.4+) ──
        let resp = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&json!({ "model": self.model, "input": text }))
            .timeout(Duration::from_secs(60))
            .send()
            .await;

        if let Ok(resp) = resp {
            let status = resp.status();
            if status.is_success() {
                if let Ok(v) = resp.json::<Value>().await {
                    if let Some(vec) = parse_ollama_response(&v) {
                        return Ok(vec);
                    }
                }
            } else {
                let body = resp.text().await.unwrap_or_default();
                if is_model_missing(status.as_u16(), &body) {
                    return Err(EngineError::Embedding(format!(
                        "model '{}' not found: {}",
                        self.model, body
                    )));
                }
                info!("[embed] /api/embed returned {}, trying legacy endpoint", status);
            }
        }

        // ── /api/embeddings (legacy) ──
        let resp = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&json!({ "model": self.model, "prompt": text }))
            .timeout(Duration::from_secs(60))
            .send()
            .await
            .map_err(|e| {
                EngineError::Embedding(format!(
                    "Ollama not reachable at {} (is it running?): {}",
                    self.base_url, e
                ))
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(EngineError::Embedding(format!("Ollama embed {status}: {body}")));
        }
        let v: Value = resp.json().await?;
        parse_ollama_response(&v)
            .ok_or_else(|| EngineError::Embedding("no embedding in Ollama response".into()))
    }

    async fn embed_openai(&self, text: &str) -> EngineResult<Vec<f32>> {
        let resp = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .json(&json!({ "model": self.model, "input": text }))
            .timeout(Duration::from_secs(30))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(EngineError::Embedding(format!("OpenAI embed {status}: {body}")));
        }
        let v: Value = resp.json().await?;
        parse_openai_response(&v)
            .ok_or_else(|| EngineError::Embedding("no data[0].embedding in response".into()))
    }

    /// Ask Ollama to download the model. Blocks until the pull finishes.
    async fn pull_model(&self) -> EngineResult<()> {
        let resp = self
            .client
            .post(format!("{}/api/pull", self.base_url))
            .json(&json!({ "name": self.model, "stream": false }))
            .timeout(Duration::from_secs(600))
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(EngineError::Embedding(format!("pull {status}: {body}")));
        }
        Ok(())
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> EngineResult<Vec<f32>> {
        let ollama_err = match self.embed_ollama(text).await {
            Ok(vec) => return Ok(vec),
            Err(e) => e,
        };

        let msg = ollama_err.to_string();
        if (msg.contains("not found") || msg.contains("does not exist"))
            && !self.pull_attempted.swap(true, Ordering::SeqCst)
        {
            info!("[embed] Model '{}' not found, pulling", self.model);
            match self.pull_model().await {
                Ok(()) => {
                    if let Ok(vec) = self.embed_ollama(text).await {
                        return Ok(vec);
                    }
                }
                Err(e) => warn!("[embed] Pull of '{}' failed: {}", self.model, e),
            }
        }

        match self.embed_openai(text).await {
            Ok(vec) => Ok(vec),
            Err(openai_err) => Err(EngineError::Embedding(format!(
                "Ollama: {ollama_err} | OpenAI: {openai_err}"
            ))),
        }
    }
}

fn is_model_missing(status: u16, body: &str) -> bool {
    status == 404 || body.contains("not found") || body.contains("does not exist")
}

fn float_array(v: &Value) -> Option<Vec<f32>> {
    let vec: Vec<f32> = v
        .as_array()?
        .iter()
        .filter_map(|x| x.as_f64().map(|f| f as f32))
        .collect();
    (!vec.is_empty()).then_some(vec)
}

/// `{ embeddings: [[..]] }` or `{ embedding: [..] }`.
fn parse_ollama_response(v: &Value) -> Option<Vec<f32>> {
    v["embeddings"]
        .get(0)
        .and_then(float_array)
        .or_else(|| float_array(&v["embedding"]))
}

fn parse_openai_response(v: &Value) -> Option<Vec<f32>> {
    float_array(&v["data"][0]["embedding"])
}
