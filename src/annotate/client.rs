//! `CodeAnnotator` trait plus its OpenAI-compatible chat-completion backed
//! implementation, grounded on the teacher's `llm::client::LlmClient`: a
//! single shared `reqwest::Client`, prompt templating, and a typed error
//! enum folded into retries rather than propagated raw.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CodeDoxError, Result};
use crate::models::ExtractedCodeBlock;

const SYSTEM_PROMPT: &str = r#"You annotate source code blocks extracted from documentation. For each block you are given, respond with a detected programming language (lowercase, e.g. "python", "rust", "bash"; empty string if you cannot tell), a concise 3-10 word title, and a 10-30 word description of what the code demonstrates, grounded only in the code and the surrounding context you were given. Respond with ONLY a JSON array, one object per input block in the same order, each shaped as {"language": string, "title": string, "description": string}. No prose, no markdown fences."#;

#[async_trait]
pub trait CodeAnnotator: Send + Sync {
    /// Annotate one batch of blocks, returning a same-length, same-order
    /// vector with `language`/`context.title`/`context.description` filled
    /// in where the extractor left them empty. Never fails the caller: on
    /// any permanent error the extractor-derived values are returned as-is.
    async fn annotate(&self, blocks: &[ExtractedCodeBlock]) -> Vec<ExtractedCodeBlock>;
}

/// No annotator configured: passes extracted blocks through unchanged.
/// Used when `CODE_LLM_BASE_URL` is unset, and in tests.
pub struct NullAnnotator;

#[async_trait]
impl CodeAnnotator for NullAnnotator {
    async fn annotate(&self, blocks: &[ExtractedCodeBlock]) -> Vec<ExtractedCodeBlock> {
        blocks.to_vec()
    }
}

pub struct OpenAiAnnotator {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiAnnotator {
    pub fn new(base_url: &str, api_key: Option<String>, model: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CodeDoxError::Internal(format!("failed to build annotator HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
        })
    }

    /// One attempt at a single batched chat-completion call. Transient
    /// failures (network errors, 5xx, 429) are signalled as `Err` so the
    /// caller can retry with backoff; anything else is also `Err` but the
    /// caller gives up on it immediately.
    async fn call_once(&self, blocks: &[ExtractedCodeBlock]) -> std::result::Result<Vec<Annotation>, AnnotateError> {
        let prompt = build_user_prompt(blocks);
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage { role: "system", content: SYSTEM_PROMPT.to_string() },
                ChatMessage { role: "user", content: prompt },
            ],
            temperature: 0.1,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let mut req = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await.map_err(|e| AnnotateError::Transient(e.to_string()))?;
        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(AnnotateError::Transient(format!("HTTP {status}")));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AnnotateError::Permanent(format!("HTTP {status}: {body}")));
        }

        let parsed: ChatResponse = resp.json().await.map_err(|e| AnnotateError::Permanent(format!("bad response body: {e}")))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AnnotateError::Permanent("empty choices array".to_string()))?;

        parse_annotations(&content, blocks.len())
    }

    async fn call_with_retry(&self, blocks: &[ExtractedCodeBlock]) -> std::result::Result<Vec<Annotation>, AnnotateError> {
        let mut attempt = 0u32;
        loop {
            match tokio::time::timeout(Duration::from_secs(30), self.call_once(blocks)).await {
                Ok(Ok(annotations)) => return Ok(annotations),
                Ok(Err(AnnotateError::Permanent(msg))) => return Err(AnnotateError::Permanent(msg)),
                Ok(Err(AnnotateError::Transient(msg))) => {
                    if attempt >= 3 {
                        return Err(AnnotateError::Transient(msg));
                    }
                    tokio::time::sleep(Duration::from_millis(500 * 2u64.pow(attempt))).await;
                    attempt += 1;
                }
                Err(_) => {
                    if attempt >= 3 {
                        return Err(AnnotateError::Transient("timed out".to_string()));
                    }
                    tokio::time::sleep(Duration::from_millis(500 * 2u64.pow(attempt))).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait]
impl CodeAnnotator for OpenAiAnnotator {
    async fn annotate(&self, blocks: &[ExtractedCodeBlock]) -> Vec<ExtractedCodeBlock> {
        if blocks.is_empty() {
            return Vec::new();
        }
        debug!(count = blocks.len(), "annotating batch");
        match self.call_with_retry(blocks).await {
            Ok(annotations) => merge(blocks, annotations),
            Err(e) => {
                warn!(error = %e, "annotator batch failed permanently; keeping extractor-derived metadata");
                blocks.to_vec()
            }
        }
    }
}

/// Fills in only what the extractor left blank; an authoritative
/// extractor-detected language is never overwritten.
fn merge(blocks: &[ExtractedCodeBlock], annotations: Vec<Annotation>) -> Vec<ExtractedCodeBlock> {
    blocks
        .iter()
        .zip(annotations)
        .map(|(block, annotation)| {
            let mut merged = block.clone();
            if merged.language.is_none() && !annotation.language.trim().is_empty() {
                merged.language = Some(annotation.language.trim().to_lowercase());
            }
            if merged.context.title.is_none() && !annotation.title.trim().is_empty() {
                merged.context.title = Some(annotation.title.trim().to_string());
            }
            if merged.context.description.trim().is_empty() && !annotation.description.trim().is_empty() {
                merged.context.description = annotation.description.trim().to_string();
            }
            merged
        })
        .collect()
}

fn build_user_prompt(blocks: &[ExtractedCodeBlock]) -> String {
    let mut out = String::new();
    for (i, block) in blocks.iter().enumerate() {
        out.push_str(&format!("--- Block {} ---\n", i + 1));
        if let Some(title) = &block.context.title {
            out.push_str(&format!("Surrounding heading: {title}\n"));
        }
        if !block.context.description.is_empty() {
            out.push_str(&format!("Surrounding text: {}\n", block.context.description));
        }
        if let Some(lang) = &block.language {
            out.push_str(&format!("Known language: {lang}\n"));
        }
        out.push_str("Code:\n");
        out.push_str(&block.code);
        out.push_str("\n\n");
    }
    out
}

fn parse_annotations(content: &str, expected: usize) -> std::result::Result<Vec<Annotation>, AnnotateError> {
    let trimmed = content.trim().trim_start_matches("```json").trim_start_matches("```").trim_end_matches("```").trim();
    let annotations: Vec<Annotation> = serde_json::from_str(trimmed)
        .map_err(|e| AnnotateError::Permanent(format!("could not parse annotation JSON: {e}")))?;
    if annotations.len() != expected {
        return Err(AnnotateError::Permanent(format!(
            "expected {expected} annotations, got {}",
            annotations.len()
        )));
    }
    Ok(annotations)
}

#[derive(Debug)]
enum AnnotateError {
    Transient(String),
    Permanent(String),
}

impl std::fmt::Display for AnnotateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnnotateError::Transient(msg) => write!(f, "transient: {msg}"),
            AnnotateError::Permanent(msg) => write!(f, "permanent: {msg}"),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage<'static>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct Annotation {
    #[serde(default)]
    language: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExtractedContext;

    fn block(lang: Option<&str>) -> ExtractedCodeBlock {
        ExtractedCodeBlock {
            language: lang.map(|s| s.to_string()),
            code: "print(1)".to_string(),
            context: ExtractedContext::default(),
            line_span: (1, 1),
            filename_hint: None,
        }
    }

    #[test]
    fn merge_fills_only_blanks() {
        let blocks = vec![block(Some("python")), block(None)];
        let annotations = vec![
            Annotation { language: "rust".to_string(), title: "ignored".to_string(), description: "d".to_string() },
            Annotation { language: "python".to_string(), title: "Print one".to_string(), description: "prints the number one".to_string() },
        ];
        let merged = merge(&blocks, annotations);
        assert_eq!(merged[0].language.as_deref(), Some("python"));
        assert_eq!(merged[1].language.as_deref(), Some("python"));
        assert_eq!(merged[1].context.title.as_deref(), Some("Print one"));
    }

    #[test]
    fn parse_annotations_strips_code_fences() {
        let content = "```json\n[{\"language\":\"go\",\"title\":\"x\",\"description\":\"y\"}]\n```";
        let parsed = parse_annotations(content, 1).unwrap();
        assert_eq!(parsed[0].language, "go");
    }

    #[test]
    fn parse_annotations_rejects_length_mismatch() {
        let content = "[{\"language\":\"go\",\"title\":\"x\",\"description\":\"y\"}]";
        assert!(parse_annotations(content, 2).is_err());
    }
}
