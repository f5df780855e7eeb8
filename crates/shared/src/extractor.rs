use anyhow::{Context, Result};
use html2text::render::text_renderer::TrivialDecorator;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use url::Url;

use crate::error::{NewsError, NewsResult};

/// Longest article text handed on to the summarizer
pub const MAX_ARTICLE_CHARS: usize = 1000;
/// Anything shorter than this is not considered a real article
pub const MIN_ARTICLE_CHARS: usize = 100;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const CONTENT_CLASSES: [&str; 4] = ["content", "article-content", "story-content", "entry-content"];

pub struct ContentExtractor {
    client: Client,
}

impl ContentExtractor {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(10))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Download an article page and pull its main text out.
    pub async fn fetch_full_text(&self, url: &Url) -> NewsResult<String> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(NewsError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(NewsError::Network(format!("{} returned HTTP {}", url, status)));
        }

        let html = response.text().await.map_err(NewsError::from_transport)?;

        let text = extract_main_text(&html)?;
        tracing::debug!("Extracted {} chars from {}", text.chars().count(), url);
        Ok(text)
    }
}

/// Find the main content block of an article page and return it as plain text.
///
/// Looks for `<article>`, then `<main>`, then a div carrying one of the usual
/// content classes. Pages with none of those are rejected rather than
/// falling back to the whole body, which is mostly navigation.
pub fn extract_main_text(html: &str) -> NewsResult<String> {
    let document = Html::parse_document(html);

    let text = candidate_blocks(&document)
        .into_iter()
        .map(|block| html_to_text(&block))
        .find(|text| !text.is_empty())
        .ok_or_else(|| NewsError::Scrape("no article, main or content block found".to_string()))?;

    if text.chars().count() < MIN_ARTICLE_CHARS {
        return Err(NewsError::Scrape(format!(
            "article text too short ({} chars)",
            text.chars().count()
        )));
    }

    Ok(truncate_chars(&text, MAX_ARTICLE_CHARS).to_string())
}

fn candidate_blocks(document: &Html) -> Vec<String> {
    let mut selectors = vec!["article".to_string(), "main".to_string()];
    selectors.extend(CONTENT_CLASSES.iter().map(|class| format!("div.{}", class)));

    let mut blocks = Vec::new();
    for raw in selectors {
        // All selectors above are static and valid
        let Ok(selector) = Selector::parse(&raw) else {
            continue;
        };
        blocks.extend(document.select(&selector).map(|element| element.html()));
    }
    blocks
}

/// Strip markup, decode entities and collapse whitespace.
pub fn html_to_text(html: &str) -> String {
    let rendered = html2text::from_read_with_decorator(html.as_bytes(), 10_000, TrivialDecorator::new());
    collapse_whitespace(&rendered)
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut `text` to at most `max` characters, respecting UTF-8 boundaries
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
