use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

use crate::sources::{slugify, NewsSource};

pub const DEFAULT_SUMMARIZER_URL: &str =
    "https://api-inference.huggingface.co/models/Falconsai/text_summarization";
pub const DEFAULT_TTS_URL: &str = "http://127.0.0.1:8020/tts_to_audio/";

#[derive(Debug, Clone)]
pub struct Config {
    pub huggingface_api_key: Option<String>,
    pub summarizer_url: String,
    pub tts_api_key: Option<String>,
    pub tts_url: String,
    pub tts_language: String,
    pub voice_dir: PathBuf,
    pub max_headlines: usize,
    pub extra_feeds: Vec<NewsSource>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            huggingface_api_key: None,
            summarizer_url: DEFAULT_SUMMARIZER_URL.to_string(),
            tts_api_key: None,
            tts_url: DEFAULT_TTS_URL.to_string(),
            tts_language: "en".to_string(),
            voice_dir: PathBuf::from("reference_audio"),
            max_headlines: 10,
            extra_feeds: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Try to load .env from multiple locations
        Self::try_load_dotenv();

        let defaults = Self::default();

        let huggingface_api_key = non_empty_var("HUGGINGFACE_API_KEY");
        if huggingface_api_key.is_none() {
            tracing::warn!("No Hugging Face API key found, calling the summarizer anonymously");
        }

        let tts_api_key = non_empty_var("COQUI_API_KEY");
        if tts_api_key.is_none() {
            tracing::warn!("No Coqui API key found, calling the TTS server without credentials");
        }

        let max_headlines = match non_empty_var("NEWSBREEZE_MAX_HEADLINES") {
            Some(raw) => raw
                .parse::<usize>()
                .with_context(|| format!("NEWSBREEZE_MAX_HEADLINES must be a number, got '{}'", raw))?,
            None => defaults.max_headlines,
        };

        let extra_feeds = match non_empty_var("NEWSBREEZE_FEEDS") {
            Some(raw) => parse_feed_list(&raw).context(
                "NEWSBREEZE_FEEDS is malformed.\n\n\
                Expected a ';' separated list of Name=url pairs, e.g.:\n  \
                NEWSBREEZE_FEEDS=Ars Technica=https://feeds.arstechnica.com/arstechnica/index",
            )?,
            None => Vec::new(),
        };

        Ok(Self {
            huggingface_api_key,
            summarizer_url: non_empty_var("NEWSBREEZE_SUMMARIZER_URL")
                .unwrap_or(defaults.summarizer_url),
            tts_api_key,
            tts_url: non_empty_var("NEWSBREEZE_TTS_URL").unwrap_or(defaults.tts_url),
            tts_language: non_empty_var("NEWSBREEZE_TTS_LANGUAGE").unwrap_or(defaults.tts_language),
            voice_dir: non_empty_var("NEWSBREEZE_VOICE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.voice_dir),
            max_headlines,
            extra_feeds,
        })
    }

    fn try_load_dotenv() {
        // Try locations in order of preference:

        // 1. Current directory (for development)
        if dotenvy::dotenv().is_ok() {
            return;
        }

        // 2. ~/.config/newsbreeze/.env (standard config location)
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("newsbreeze").join(".env");
            if config_path.exists() && dotenvy::from_path(&config_path).is_ok() {
                return;
            }
        }

        // 3. ~/.env (home directory)
        if let Some(home_dir) = dirs::home_dir() {
            let home_path = home_dir.join(".env");
            if home_path.exists() && dotenvy::from_path(&home_path).is_ok() {
                return;
            }
        }

        // If none found, that's okay - environment variables might be set system-wide
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse `Name=url;Name=url` into news sources
pub fn parse_feed_list(raw: &str) -> Result<Vec<NewsSource>> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, url) = entry
                .split_once('=')
                .with_context(|| format!("Missing '=' in feed entry '{}'", entry))?;
            let (name, url) = (name.trim(), url.trim());
            if name.is_empty() {
                anyhow::bail!("Feed entry '{}' has no name", entry);
            }
            url::Url::parse(url).with_context(|| format!("Invalid feed URL '{}'", url))?;
            Ok(NewsSource::new(name, slugify(name), url))
        })
        .collect()
}
