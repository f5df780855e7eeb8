//! Per-user application state and the fetch → expand → play pipeline.
//!
//! A [`Session`] owns everything a user has loaded. It never shares mutable
//! state with other sessions; the only shared pieces are the read-only
//! [`Services`] (catalog, voice library, backend clients).

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{NewsError, NewsResult};
use crate::extractor::MIN_ARTICLE_CHARS;
use crate::feed::{HeadlineFetcher, RssFetcher};
use crate::models::{AudioClip, Headline, Summary};
use crate::sources::{NewsSource, SourceCatalog};
use crate::summarizer::{summarize_headline, HuggingFaceSummarizer, Summarizer};
use crate::voice::{VoiceLibrary, VoiceSynthesizer, XttsSynthesizer};

/// Read-only collaborators shared by every session
#[derive(Clone)]
pub struct Services {
    pub catalog: SourceCatalog,
    pub voices: VoiceLibrary,
    pub fetcher: Arc<dyn HeadlineFetcher>,
    pub summarizer: Arc<dyn Summarizer>,
    pub synthesizer: Arc<dyn VoiceSynthesizer>,
    pub max_headlines: usize,
}

impl Services {
    /// Wire up the real backends described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            catalog: SourceCatalog::builtin().with_extra(config.extra_feeds.clone()),
            voices: VoiceLibrary::load(&config.voice_dir)?,
            fetcher: Arc::new(RssFetcher::new()?),
            summarizer: Arc::new(HuggingFaceSummarizer::new(
                config.summarizer_url.clone(),
                config.huggingface_api_key.clone(),
            )?),
            synthesizer: Arc::new(XttsSynthesizer::new(
                config.tts_url.clone(),
                config.tts_api_key.clone(),
                config.tts_language.clone(),
            )?),
            max_headlines: config.max_headlines,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Fetching,
    Listing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Listed,
    Summarizing,
    Ready,
    Synthesizing,
    Playable,
}

/// One listed headline and whatever has been derived from it so far
#[derive(Debug, Clone)]
pub struct HeadlineEntry {
    pub headline: Headline,
    pub state: ItemState,
    /// Scraped article text, when the feed text was too thin
    pub article: Option<String>,
    pub summary: Option<Summary>,
    pub clip: Option<AudioClip>,
    /// Last problem with this item, shown next to it
    pub notice: Option<String>,
}

impl HeadlineEntry {
    fn new(headline: Headline) -> Self {
        Self {
            headline,
            state: ItemState::Listed,
            article: None,
            summary: None,
            clip: None,
            notice: None,
        }
    }

    /// Text the summary is built from
    pub fn source_text(&self) -> &str {
        self.article
            .as_deref()
            .unwrap_or_else(|| self.headline.feed_text())
    }
}

/// The latest fetch of one source
#[derive(Debug, Clone, Default)]
pub struct SourceFeed {
    pub entries: Vec<HeadlineEntry>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Session {
    selected_source: String,
    selected_voice: String,
    feeds: BTreeMap<String, SourceFeed>,
    phase: Phase,
}

impl Session {
    pub fn new(services: &Services) -> Self {
        Self {
            selected_source: services
                .catalog
                .first()
                .map(|s| s.slug.clone())
                .unwrap_or_default(),
            selected_voice: services
                .voices
                .default_voice()
                .map(|v| v.name.clone())
                .unwrap_or_default(),
            feeds: BTreeMap::new(),
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn selected_source(&self) -> &str {
        &self.selected_source
    }

    pub fn selected_voice(&self) -> &str {
        &self.selected_voice
    }

    pub fn select_source<'s>(&mut self, services: &'s Services, key: &str) -> NewsResult<&'s NewsSource> {
        let source = services
            .catalog
            .find(key)
            .ok_or_else(|| NewsError::UnknownSource(key.to_string()))?;
        self.selected_source = source.slug.clone();
        Ok(source)
    }

    pub fn select_voice(&mut self, services: &Services, name: &str) -> NewsResult<()> {
        let profile = services
            .voices
            .get(name)
            .ok_or_else(|| NewsError::invalid_voice(name, "no such voice"))?;
        self.selected_voice = profile.name.clone();
        Ok(())
    }

    /// The selected source's last fetch, if it has been fetched at all
    pub fn current_feed(&self) -> Option<&SourceFeed> {
        self.feeds.get(&self.selected_source)
    }

    pub fn feed(&self, slug: &str) -> Option<&SourceFeed> {
        self.feeds.get(slug)
    }

    pub fn loaded_sources(&self) -> impl Iterator<Item = &str> {
        self.feeds
            .iter()
            .filter(|(_, f)| !f.entries.is_empty())
            .map(|(slug, _)| slug.as_str())
    }

    pub fn entry(&self, index: usize) -> Option<&HeadlineEntry> {
        self.current_feed().and_then(|f| f.entries.get(index))
    }

    /// Fetch the selected source, replacing its list wholesale on success.
    ///
    /// On failure the error is recorded against that source only; its
    /// previous list and every other source stay as they were.
    pub async fn fetch(&mut self, services: &Services) -> NewsResult<usize> {
        let source = services
            .catalog
            .find(&self.selected_source)
            .cloned()
            .ok_or_else(|| NewsError::UnknownSource(self.selected_source.clone()))?;

        self.phase = Phase::Fetching;
        let result = services.fetcher.fetch(&source).await;

        let feed = self.feeds.entry(source.slug.clone()).or_default();
        let outcome = match result {
            Ok(headlines) => {
                feed.entries = headlines
                    .into_iter()
                    .take(services.max_headlines)
                    .map(HeadlineEntry::new)
                    .collect();
                feed.fetched_at = Some(Utc::now());
                feed.error = None;
                tracing::info!("Listed {} headlines from {}", feed.entries.len(), source.name);
                Ok(feed.entries.len())
            }
            Err(e) => {
                tracing::error!("Error fetching news from {}: {}", source.name, e);
                feed.error = Some(e.to_string());
                Err(e)
            }
        };

        self.phase = if self.feeds.values().any(|f| !f.entries.is_empty()) {
            Phase::Listing
        } else {
            Phase::Idle
        };

        outcome
    }

    /// Summarize one headline of the selected source. Runs once per entry;
    /// later calls return the stored summary.
    pub async fn expand(&mut self, services: &Services, index: usize) -> NewsResult<&Summary> {
        let entry = self
            .feeds
            .get_mut(&self.selected_source)
            .and_then(|f| f.entries.get_mut(index))
            .ok_or(NewsError::UnknownHeadline(index))?;

        if entry.summary.is_none() {
            entry.state = ItemState::Summarizing;

            if entry.headline.feed_text().chars().count() < MIN_ARTICLE_CHARS {
                match services.fetcher.fetch_full_text(&entry.headline).await {
                    Ok(text) => entry.article = Some(text),
                    Err(e) => {
                        tracing::warn!("Failed to fetch full content for {}: {}", entry.headline.link, e)
                    }
                }
            }

            let summary =
                summarize_headline(services.summarizer.as_ref(), &entry.headline.link, entry.source_text()).await;
            entry.notice = summary
                .is_degraded()
                .then(|| "Failed to generate summary. Using original text.".to_string());
            entry.summary = Some(summary);
            entry.state = ItemState::Ready;
        }

        entry.summary.as_ref().ok_or(NewsError::UnknownHeadline(index))
    }

    /// Synthesize the summary of one headline in the selected voice.
    pub async fn play(&mut self, services: &Services, index: usize) -> NewsResult<&AudioClip> {
        self.expand(services, index).await?;

        let voice = self.selected_voice.clone();
        let entry = self
            .feeds
            .get_mut(&self.selected_source)
            .and_then(|f| f.entries.get_mut(index))
            .ok_or(NewsError::UnknownHeadline(index))?;

        let Some(profile) = services.voices.get(&voice) else {
            let err = NewsError::invalid_voice(&voice, "no such voice");
            entry.notice = Some(err.to_string());
            return Err(err);
        };

        let text = entry
            .summary
            .as_ref()
            .map(|s| s.text.clone())
            .unwrap_or_default();

        entry.state = ItemState::Synthesizing;
        match services.synthesizer.synthesize(&text, profile).await {
            Ok(clip) => {
                entry.clip = Some(clip);
                entry.state = ItemState::Playable;
                entry.notice = None;
            }
            Err(e) => {
                tracing::error!("Error generating audio: {}", e);
                entry.state = ItemState::Ready;
                entry.notice = Some(format!("Error generating audio: {}", e));
                return Err(e);
            }
        }

        entry.clip.as_ref().ok_or(NewsError::UnknownHeadline(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio;
    use crate::voice::VoiceProfile;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use url::Url;

    /// Serves canned headlines per source slug; anything else is unreachable
    #[derive(Default)]
    struct FakeFetcher {
        feeds: Mutex<BTreeMap<String, Vec<Headline>>>,
        scraped: Option<String>,
        scrape_calls: AtomicUsize,
    }

    impl FakeFetcher {
        fn serve(&self, slug: &str, headlines: Vec<Headline>) {
            self.feeds.lock().unwrap().insert(slug.to_string(), headlines);
        }

        fn go_offline(&self, slug: &str) {
            self.feeds.lock().unwrap().remove(slug);
        }
    }

    #[async_trait]
    impl HeadlineFetcher for FakeFetcher {
        async fn fetch(&self, source: &NewsSource) -> NewsResult<Vec<Headline>> {
            self.feeds
                .lock()
                .unwrap()
                .get(&source.slug)
                .cloned()
                .ok_or_else(|| NewsError::Network("connection refused".to_string()))
        }

        async fn fetch_full_text(&self, _headline: &Headline) -> NewsResult<String> {
            self.scrape_calls.fetch_add(1, Ordering::SeqCst);
            self.scraped
                .clone()
                .ok_or_else(|| NewsError::Scrape("no article block".to_string()))
        }
    }

    /// Keeps the first sentence
    struct FirstSentence {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Summarizer for FirstSentence {
        async fn summarize(&self, text: &str) -> NewsResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if text.trim().is_empty() {
                return Err(NewsError::EmptyInput);
            }
            if self.fail {
                return Err(NewsError::ModelUnavailable("backend offline".to_string()));
            }
            Ok(text.split_inclusive('.').next().unwrap_or(text).trim().to_string())
        }
    }

    struct ToneSynthesizer;

    #[async_trait]
    impl VoiceSynthesizer for ToneSynthesizer {
        async fn synthesize(&self, text: &str, profile: &VoiceProfile) -> NewsResult<AudioClip> {
            if text.trim().is_empty() {
                return Err(NewsError::EmptyInput);
            }
            profile.load_reference()?;
            let wav = audio::sine_wav(8_000, 0.5, 0.5).expect("tone");
            Ok(AudioClip {
                wav,
                voice: profile.name.clone(),
                text: text.to_string(),
                duration: Duration::from_millis(500),
            })
        }
    }

    fn article() -> String {
        "Rescue teams reached the flooded valley on Sunday. More than two hundred residents \
         were moved to shelters while engineers inspected the damaged dam. Officials expect \
         the water to recede by the end of the week, though more rain is forecast."
            .to_string()
    }

    fn headline(source: &str, n: usize, description: &str) -> Headline {
        Headline {
            source: source.to_string(),
            title: format!("{} story {}", source, n),
            link: Url::parse(&format!("https://example.com/{}/{}", source, n)).unwrap(),
            published: None,
            description: description.to_string(),
            body: None,
        }
    }

    struct Harness {
        services: Services,
        fetcher: Arc<FakeFetcher>,
        summarizer: Arc<FirstSentence>,
        _voices: tempfile::TempDir,
    }

    fn harness(scraped: Option<String>, summarizer_fails: bool) -> Harness {
        let voices = tempfile::TempDir::new().unwrap();
        let sample = audio::sine_wav(16_000, 0.2, 0.5).unwrap();
        std::fs::write(voices.path().join("morgan_freeman.wav"), sample).unwrap();

        let fetcher = Arc::new(FakeFetcher {
            scraped,
            ..Default::default()
        });
        let summarizer = Arc::new(FirstSentence {
            calls: AtomicUsize::new(0),
            fail: summarizer_fails,
        });

        let services = Services {
            catalog: SourceCatalog::builtin(),
            voices: VoiceLibrary::load(voices.path()).unwrap(),
            fetcher: fetcher.clone(),
            summarizer: summarizer.clone(),
            synthesizer: Arc::new(ToneSynthesizer),
            max_headlines: 10,
        };

        Harness {
            services,
            fetcher,
            summarizer,
            _voices: voices,
        }
    }

    #[tokio::test]
    async fn test_end_to_end_bbc_morgan_freeman() {
        let h = harness(None, false);
        h.fetcher.serve("bbc", vec![headline("bbc", 1, &article())]);

        let mut session = Session::new(&h.services);
        assert_eq!(session.phase(), Phase::Idle);

        session.select_source(&h.services, "BBC News").unwrap();
        let count = session.fetch(&h.services).await.unwrap();
        assert!(count >= 1);
        assert_eq!(session.phase(), Phase::Listing);

        let original = session.entry(0).unwrap().source_text().to_string();
        let summary = session.expand(&h.services, 0).await.unwrap().clone();
        assert!(summary.text.len() <= original.len());
        assert_eq!(summary.text, "Rescue teams reached the flooded valley on Sunday.");
        assert_eq!(session.entry(0).unwrap().state, ItemState::Ready);

        session.select_voice(&h.services, "Morgan Freeman").unwrap();
        let clip = session.play(&h.services, 0).await.unwrap();
        assert_eq!(clip.voice, "Morgan Freeman");
        assert!(audio::inspect(&clip.wav).unwrap().frames > 0);

        let entry = session.entry(0).unwrap();
        assert_eq!(entry.state, ItemState::Playable);
        assert_eq!(entry.summary.as_ref().unwrap().headline, entry.headline.link);
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_other_sources() {
        let h = harness(None, false);
        h.fetcher.serve("bbc", vec![headline("bbc", 1, &article())]);
        h.fetcher.serve("cnn", vec![headline("cnn", 1, &article())]);

        let mut session = Session::new(&h.services);
        session.select_source(&h.services, "bbc").unwrap();
        session.fetch(&h.services).await.unwrap();
        session.select_source(&h.services, "cnn").unwrap();
        session.fetch(&h.services).await.unwrap();

        h.fetcher.go_offline("cnn");
        let err = session.fetch(&h.services).await.unwrap_err();
        assert!(matches!(err, NewsError::Network(_)));
        assert_eq!(session.phase(), Phase::Listing);

        // The failed source keeps its old list and shows the error
        let cnn = session.current_feed().unwrap();
        assert_eq!(cnn.entries.len(), 1);
        assert!(cnn.error.as_deref().unwrap().contains("connection refused"));

        // The other source is still usable
        session.select_source(&h.services, "bbc").unwrap();
        assert!(session.current_feed().unwrap().error.is_none());
        session.expand(&h.services, 0).await.unwrap();
        assert_eq!(session.entry(0).unwrap().state, ItemState::Ready);
    }

    #[tokio::test]
    async fn test_first_fetch_failure_leaves_session_idle() {
        let h = harness(None, false);
        let mut session = Session::new(&h.services);
        assert!(session.fetch(&h.services).await.is_err());
        assert_eq!(session.phase(), Phase::Idle);
        assert!(session.current_feed().unwrap().entries.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_replaces_list_and_caps_length() {
        let h = harness(None, false);
        h.fetcher
            .serve("bbc", (0..15).map(|n| headline("bbc", n, &article())).collect());

        let mut session = Session::new(&h.services);
        session.fetch(&h.services).await.unwrap();
        session.expand(&h.services, 0).await.unwrap();
        assert_eq!(session.current_feed().unwrap().entries.len(), 10);

        h.fetcher.serve("bbc", vec![headline("bbc", 99, &article())]);
        session.fetch(&h.services).await.unwrap();

        let feed = session.current_feed().unwrap();
        assert_eq!(feed.entries.len(), 1);
        assert_eq!(feed.entries[0].headline.title, "bbc story 99");
        assert!(feed.entries[0].summary.is_none());
    }

    #[tokio::test]
    async fn test_expand_summarizes_once() {
        let h = harness(None, false);
        h.fetcher.serve("bbc", vec![headline("bbc", 1, &article())]);

        let mut session = Session::new(&h.services);
        session.fetch(&h.services).await.unwrap();
        let first = session.expand(&h.services, 0).await.unwrap().clone();
        let second = session.expand(&h.services, 0).await.unwrap().clone();

        assert_eq!(first, second);
        assert_eq!(h.summarizer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expand_scrapes_thin_feed_text() {
        let h = harness(Some(article()), false);
        h.fetcher.serve("bbc", vec![headline("bbc", 1, "Flooding update.")]);

        let mut session = Session::new(&h.services);
        session.fetch(&h.services).await.unwrap();
        session.expand(&h.services, 0).await.unwrap();

        let entry = session.entry(0).unwrap();
        assert_eq!(h.fetcher.scrape_calls.load(Ordering::SeqCst), 1);
        assert_eq!(entry.source_text(), article());
    }

    #[tokio::test]
    async fn test_expand_scrape_failure_falls_back_to_feed_text() {
        let h = harness(None, false);
        h.fetcher.serve("bbc", vec![headline("bbc", 1, "Flooding update.")]);

        let mut session = Session::new(&h.services);
        session.fetch(&h.services).await.unwrap();
        let summary = session.expand(&h.services, 0).await.unwrap();

        assert_eq!(summary.text, "Flooding update.");
        assert!(!summary.is_degraded());
    }

    #[tokio::test]
    async fn test_summarizer_failure_degrades_to_original() {
        let h = harness(None, true);
        h.fetcher.serve("bbc", vec![headline("bbc", 1, &article())]);

        let mut session = Session::new(&h.services);
        session.fetch(&h.services).await.unwrap();
        let summary = session.expand(&h.services, 0).await.unwrap().clone();

        assert!(summary.is_degraded());
        assert_eq!(summary.text, article());
        let entry = session.entry(0).unwrap();
        assert_eq!(entry.state, ItemState::Ready);
        assert!(entry.notice.as_deref().unwrap().contains("Using original text"));
    }

    #[tokio::test]
    async fn test_play_with_missing_sample_reports_inline() {
        let h = harness(None, false);
        h.fetcher.serve("bbc", vec![headline("bbc", 1, &article()), headline("bbc", 2, &article())]);

        let mut session = Session::new(&h.services);
        session.fetch(&h.services).await.unwrap();
        session.select_voice(&h.services, "Oprah Winfrey").unwrap();

        let err = session.play(&h.services, 0).await.unwrap_err();
        assert!(matches!(err, NewsError::InvalidVoiceProfile { .. }));

        let entry = session.entry(0).unwrap();
        assert_eq!(entry.state, ItemState::Ready);
        assert!(entry.clip.is_none());
        assert!(entry.notice.as_deref().unwrap().contains("Oprah Winfrey"));

        // Other headlines are unaffected
        assert_eq!(session.entry(1).unwrap().state, ItemState::Listed);
        session.select_voice(&h.services, "Morgan Freeman").unwrap();
        session.play(&h.services, 1).await.unwrap();
        assert_eq!(session.entry(1).unwrap().state, ItemState::Playable);
    }

    #[tokio::test]
    async fn test_unknown_selections_are_rejected() {
        let h = harness(None, false);
        let mut session = Session::new(&h.services);

        assert!(matches!(
            session.select_source(&h.services, "Fox"),
            Err(NewsError::UnknownSource(_))
        ));
        assert!(matches!(
            session.select_voice(&h.services, "Nobody"),
            Err(NewsError::InvalidVoiceProfile { .. })
        ));
        assert_eq!(session.selected_source(), "bbc");
        assert_eq!(session.selected_voice(), "Morgan Freeman");
        assert!(matches!(
            session.expand(&h.services, 3).await,
            Err(NewsError::UnknownHeadline(3))
        ));
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let h = harness(None, false);
        h.fetcher.serve("bbc", vec![headline("bbc", 1, &article())]);

        let mut alice = Session::new(&h.services);
        let bob = Session::new(&h.services);
        alice.fetch(&h.services).await.unwrap();

        assert!(alice.current_feed().is_some());
        assert!(bob.current_feed().is_none());
        assert_eq!(bob.loaded_sources().count(), 0);
    }
}
