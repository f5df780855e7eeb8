//! In-process stand-ins for the feed, summarization and TTS backends.

use async_trait::async_trait;
use shared::audio;
use shared::{
    AudioClip, Headline, HeadlineFetcher, NewsError, NewsResult, NewsSource, Services, SourceCatalog,
    Summarizer, VoiceLibrary, VoiceProfile, VoiceSynthesizer,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use url::Url;

pub const ARTICLE: &str = "Rescue teams reached the flooded valley on Sunday. More than two hundred \
    residents were moved to shelters while engineers inspected the damaged dam. Officials expect the \
    water to recede by the end of the week, though more rain is forecast.";

/// Serves two headlines for BBC News; every other source is offline
pub struct StubFetcher;

#[async_trait]
impl HeadlineFetcher for StubFetcher {
    async fn fetch(&self, source: &NewsSource) -> NewsResult<Vec<Headline>> {
        if source.slug != "bbc" {
            return Err(NewsError::Network("connection refused".to_string()));
        }
        Ok(vec![
            headline(1, "Flooding <closes> valley roads", ARTICLE),
            headline(2, "Markets steady", "Shares were flat."),
        ])
    }

    async fn fetch_full_text(&self, _headline: &Headline) -> NewsResult<String> {
        Err(NewsError::Scrape("no article block".to_string()))
    }
}

fn headline(n: usize, title: &str, description: &str) -> Headline {
    Headline {
        source: "BBC News".to_string(),
        title: title.to_string(),
        link: Url::parse(&format!("https://www.bbc.co.uk/news/articles/{}", n)).unwrap(),
        published: None,
        description: description.to_string(),
        body: None,
    }
}

/// Keeps the first sentence
pub struct StubSummarizer;

#[async_trait]
impl Summarizer for StubSummarizer {
    async fn summarize(&self, text: &str) -> NewsResult<String> {
        if text.trim().is_empty() {
            return Err(NewsError::EmptyInput);
        }
        Ok(text.split_inclusive('.').next().unwrap_or(text).trim().to_string())
    }
}

pub struct StubSynthesizer;

#[async_trait]
impl VoiceSynthesizer for StubSynthesizer {
    async fn synthesize(&self, text: &str, profile: &VoiceProfile) -> NewsResult<AudioClip> {
        profile.load_reference()?;
        Ok(AudioClip {
            wav: audio::sine_wav(8_000, 0.25, 0.5).unwrap(),
            voice: profile.name.clone(),
            text: text.to_string(),
            duration: Duration::from_millis(250),
        })
    }
}

/// Services backed by the stubs, with a reference sample for Morgan Freeman only
pub fn services() -> (Services, TempDir) {
    let voices = TempDir::new().unwrap();
    std::fs::write(
        voices.path().join("morgan_freeman.wav"),
        audio::sine_wav(16_000, 0.2, 0.5).unwrap(),
    )
    .unwrap();

    let services = Services {
        catalog: SourceCatalog::builtin(),
        voices: VoiceLibrary::load(voices.path()).unwrap(),
        fetcher: Arc::new(StubFetcher),
        summarizer: Arc::new(StubSummarizer),
        synthesizer: Arc::new(StubSynthesizer),
        max_headlines: 10,
    };
    (services, voices)
}
