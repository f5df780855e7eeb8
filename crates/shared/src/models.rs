use chrono::{DateTime, Utc};
use std::time::Duration;
use url::Url;

/// A single news item parsed from a feed
#[derive(Debug, Clone, PartialEq)]
pub struct Headline {
    pub source: String,
    pub title: String,
    pub link: Url,
    pub published: Option<DateTime<Utc>>,
    /// Feed-provided summary/description, HTML stripped
    pub description: String,
    /// Full body when the feed ships one (Atom `<content>`)
    pub body: Option<String>,
}

impl Headline {
    /// The best text the feed itself gives us for this item.
    pub fn feed_text(&self) -> &str {
        match self.body.as_deref() {
            Some(body) if !body.trim().is_empty() => body,
            _ => &self.description,
        }
    }

    pub fn published_label(&self) -> String {
        match self.published {
            Some(dt) => dt.format("%-d-%b-%Y %-I:%M%p").to_string(),
            None => "No date".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryKind {
    /// Produced by the summarization model
    Condensed,
    /// Input was already short enough; the model was not called
    Passthrough,
    /// The model failed; `text` is the original
    Degraded(String),
}

/// Condensed text for exactly one headline
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub headline: Url,
    pub text: String,
    pub generated_at: DateTime<Utc>,
    pub kind: SummaryKind,
}

impl Summary {
    pub fn new(headline: Url, text: impl Into<String>, kind: SummaryKind) -> Self {
        Self {
            headline,
            text: text.into(),
            generated_at: Utc::now(),
            kind,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.kind, SummaryKind::Degraded(_))
    }
}

/// Synthesized speech, held in memory until the session drops it
#[derive(Debug, Clone)]
pub struct AudioClip {
    /// Complete WAV file
    pub wav: Vec<u8>,
    pub voice: String,
    pub text: String,
    pub duration: Duration,
}

impl AudioClip {
    pub fn len_bytes(&self) -> usize {
        self.wav.len()
    }
}
