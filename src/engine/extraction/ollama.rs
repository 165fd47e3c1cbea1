// Engram RAG — LLM Entity Extraction
//
// POST {base}/api/chat with `format: "json"` and a fixed instruction prompt.
// The model's reply is parsed leniently: a bare array, or an object wrapping
// one under any key. Unknown type labels become `concept`.

use super::{clean_entities, EntityExtractor};
use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::types::{EntityType, ExtractedEntity};
use crate::engine::config::ExtractionConfig;
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

const PROMPT: &str = "Extract named entities from the following text. \
Return a JSON array of objects, each with \"name\" and \"type\". \
Types: person, place, organization, concept. If no entities, return [].";

pub struct OllamaEntityExtractor {
    client: Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaEntityExtractor {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Self {
        OllamaEntityExtractor {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            timeout,
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(
            &config.base_url,
            &config.model,
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl EntityExtractor for OllamaEntityExtractor {
    async fn extract(&self, text: &str) -> EngineResult<Vec<ExtractedEntity>> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": build_prompt(text) }],
            "format": "json",
            "stream": false,
        });

        let resp = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| EngineError::Extraction(format!("chat request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(EngineError::Extraction(format!("chat {status}: {text}")));
        }

        let v: Value = resp.json().await?;
        let content = v["message"]["content"]
            .as_str()
            .ok_or_else(|| EngineError::Extraction("no message.content in chat response".into()))?;

        let entities = parse_entities(content)?;
        debug!("[extract] {} entities via {}", entities.len(), self.model);
        Ok(entities)
    }
}

fn build_prompt(text: &str) -> String {
    format!("{PROMPT}\n\nText: {text}\n\nJSON:")
}

/// Parse the model's JSON answer into entities.
pub(crate) fn parse_entities(content: &str) -> EngineResult<Vec<ExtractedEntity>> {
    let v: Value = serde_json::from_str(content.trim())
        .map_err(|e| EngineError::Extraction(format!("model returned invalid JSON: {e}")))?;

    let items: &[Value] = match &v {
        Value::Array(items) => items.as_slice(),
        // JSON mode often wraps the list: {"entities": [...]}
        Value::Object(map) => map
            .values()
            .find_map(|x| x.as_array())
            .map(|a| a.as_slice())
            .unwrap_or(&[]),
        _ => &[],
    };

    let raw = items
        .iter()
        .filter_map(|item| {
            let name = item["name"].as_str()?;
            let entity_type = item["type"].as_str().unwrap_or("concept");
            Some(ExtractedEntity::new(name, EntityType::parse_lenient(entity_type)))
        })
        .collect();
    Ok(clean_entities(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_array() {
        let got = parse_entities(
            r#"[{"name":"Alice","type":"person"},{"name":"Paris","type":"place"}]"#,
        )
        .unwrap();
        assert_eq!(
            got,
            vec![
                ExtractedEntity::new("Alice", EntityType::Person),
                ExtractedEntity::new("Paris", EntityType::Place),
            ]
        );
    }

    #[test]
    fn parses_wrapped_array_and_unknown_types() {
        let got = parse_entities(
            r#"{"entities":[{"name":"Acme","type":"company"},{"name":"joy","type":"emotion"},{"type":"person"}]}"#,
        )
        .unwrap();
        assert_eq!(
            got,
            vec![
                ExtractedEntity::new("Acme", EntityType::Organization),
                ExtractedEntity::new("joy", EntityType::Concept),
            ]
        );
    }

    #[test]
    fn empty_answers() {
        assert!(parse_entities("[]").unwrap().is_empty());
        assert!(parse_entities("{}").unwrap().is_empty());
        assert!(parse_entities("\"none\"").unwrap().is_empty());
    }

    #[test]
    fn invalid_json_is_extraction_error() {
        assert!(matches!(
            parse_entities("Alice, Paris"),
            Err(EngineError::Extraction(_))
        ));
    }

    #[test]
    fn prompt_embeds_text() {
        let p = build_prompt("I met Alice");
        assert!(p.contains("Text: I met Alice"));
        assert!(p.ends_with("JSON:"));
    }
}
