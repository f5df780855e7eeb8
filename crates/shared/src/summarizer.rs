use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{NewsError, NewsResult};
use crate::extractor::truncate_chars;
use crate::models::{Summary, SummaryKind};

/// Text with fewer words than this is already short enough to read out
pub const MIN_WORDS: usize = 30;
const MAX_INPUT_CHARS: usize = 4000;

#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Condense `text`. Blank input is rejected with [`NewsError::EmptyInput`].
    async fn summarize(&self, text: &str) -> NewsResult<String>;
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: GenerationParameters,
    options: InferenceOptions,
}

#[derive(Serialize)]
struct GenerationParameters {
    max_length: u32,
    min_length: u32,
    do_sample: bool,
}

#[derive(Serialize)]
struct InferenceOptions {
    wait_for_model: bool,
}

#[derive(Deserialize)]
struct SummaryOutput {
    summary_text: String,
}

/// Summarization through the Hugging Face Inference API (or anything that
/// speaks the same `summary_text` protocol).
pub struct HuggingFaceSummarizer {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    max_length: u32,
    min_length: u32,
}

impl HuggingFaceSummarizer {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            max_length: 150,
            min_length: MIN_WORDS as u32,
        })
    }

    async fn call_model(&self, input: &str) -> NewsResult<String> {
        let request = InferenceRequest {
            inputs: input,
            parameters: GenerationParameters {
                max_length: self.max_length,
                min_length: self.min_length,
                do_sample: false,
            },
            options: InferenceOptions { wait_for_model: true },
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(NewsError::from_backend)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unknown error"));
            return Err(NewsError::ModelUnavailable(match status {
                StatusCode::SERVICE_UNAVAILABLE => format!("model is loading or offline: {}", error_text),
                StatusCode::TOO_MANY_REQUESTS => "rate limited by inference API".to_string(),
                _ => format!("inference API returned {}: {}", status, error_text),
            }));
        }

        let outputs = response
            .json::<Vec<SummaryOutput>>()
            .await
            .map_err(|e| NewsError::ModelUnavailable(format!("unexpected inference reply: {}", e)))?;

        outputs
            .into_iter()
            .next()
            .map(|o| o.summary_text.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| NewsError::ModelUnavailable("inference API returned no summary".to_string()))
    }
}

#[async_trait]
impl Summarizer for HuggingFaceSummarizer {
    async fn summarize(&self, text: &str) -> NewsResult<String> {
        let text = text.trim();
        if text.is_empty() {
            return Err(NewsError::EmptyInput);
        }

        if word_count(text) < MIN_WORDS {
            return Ok(text.to_string());
        }

        let input = truncate_chars(text, MAX_INPUT_CHARS);
        let summary = self.call_model(input).await?;

        // Never hand back more than we were given
        if summary.chars().count() > text.chars().count() {
            tracing::warn!("Summary came back longer than its input, keeping the original");
            return Ok(text.to_string());
        }

        Ok(summary)
    }
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Summarize a headline's text, degrading to the original on any failure.
pub async fn summarize_headline(summarizer: &dyn Summarizer, headline: &Url, text: &str) -> Summary {
    if word_count(text) < MIN_WORDS && !text.trim().is_empty() {
        return Summary::new(headline.clone(), text.trim(), SummaryKind::Passthrough);
    }

    match summarizer.summarize(text).await {
        Ok(condensed) => Summary::new(headline.clone(), condensed, SummaryKind::Condensed),
        Err(e) => {
            tracing::error!("Error generating summary for {}: {}", headline, e);
            Summary::new(headline.clone(), text.trim(), SummaryKind::Degraded(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn long_article() -> String {
        "Officials said the new bridge will open next spring after years of delays and cost overruns. "
            .repeat(5)
    }

    fn link() -> Url {
        Url::parse("https://example.com/story").unwrap()
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected() {
        let summarizer = HuggingFaceSummarizer::new("http://127.0.0.1:9/model", None).unwrap();
        assert_eq!(summarizer.summarize("").await, Err(NewsError::EmptyInput));
        assert_eq!(summarizer.summarize("  \n\t ").await, Err(NewsError::EmptyInput));
    }

    #[tokio::test]
    async fn test_short_text_skips_the_model() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", "/model").expect(0).create_async().await;

        let summarizer = HuggingFaceSummarizer::new(format!("{}/model", server.url()), None).unwrap();
        let out = summarizer.summarize("A short headline blurb.").await.unwrap();

        assert_eq!(out, "A short headline blurb.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_summarize_calls_inference_api() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/model")
            .match_header("authorization", "Bearer hf_test")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "parameters": { "max_length": 150, "min_length": 30, "do_sample": false }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"summary_text": "The bridge opens next spring."}]"#)
            .expect(2)
            .create_async()
            .await;

        let summarizer =
            HuggingFaceSummarizer::new(format!("{}/model", server.url()), Some("hf_test".into())).unwrap();
        let article = long_article();

        let first = summarizer.summarize(&article).await.unwrap();
        let second = summarizer.summarize(&article).await.unwrap();

        assert_eq!(first, "The bridge opens next spring.");
        assert_eq!(first, second);
        assert!(first.len() <= article.len());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unavailable_model() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/model")
            .with_status(503)
            .with_body(r#"{"error": "Model is currently loading"}"#)
            .create_async()
            .await;

        let summarizer = HuggingFaceSummarizer::new(format!("{}/model", server.url()), None).unwrap();
        let err = summarizer.summarize(&long_article()).await.unwrap_err();
        assert!(matches!(err, NewsError::ModelUnavailable(_)));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_model_unavailable() {
        let summarizer = HuggingFaceSummarizer::new("http://127.0.0.1:9/model", None).unwrap();
        let err = summarizer.summarize(&long_article()).await.unwrap_err();
        assert!(matches!(err, NewsError::ModelUnavailable(_)));
    }

    #[tokio::test]
    async fn test_longer_output_falls_back_to_input() {
        let mut server = mockito::Server::new_async().await;
        let padded = "word ".repeat(500);
        server
            .mock("POST", "/model")
            .with_status(200)
            .with_body(serde_json::json!([{ "summary_text": padded }]).to_string())
            .create_async()
            .await;

        let summarizer = HuggingFaceSummarizer::new(format!("{}/model", server.url()), None).unwrap();
        let article = long_article();
        let out = summarizer.summarize(&article).await.unwrap();
        assert_eq!(out, article.trim());
    }

    #[tokio::test]
    async fn test_summarize_headline_degrades_on_failure() {
        let summarizer = HuggingFaceSummarizer::new("http://127.0.0.1:9/model", None).unwrap();
        let article = long_article();
        let summary = summarize_headline(&summarizer, &link(), &article).await;

        assert!(summary.is_degraded());
        assert_eq!(summary.text, article.trim());
        assert_eq!(summary.headline, link());
    }

    #[tokio::test]
    async fn test_summarize_headline_passthrough_for_short_text() {
        let summarizer = HuggingFaceSummarizer::new("http://127.0.0.1:9/model", None).unwrap();
        let summary = summarize_headline(&summarizer, &link(), "Two words").await;
        assert_eq!(summary.kind, SummaryKind::Passthrough);
        assert_eq!(summary.text, "Two words");
    }
}
