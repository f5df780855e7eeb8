use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::name::QName;
use quick_xml::Reader;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::error::{NewsError, NewsResult};
use crate::extractor::{collapse_whitespace, html_to_text, ContentExtractor};
use crate::models::Headline;
use crate::sources::NewsSource;

/// Where headlines come from.
#[async_trait]
pub trait HeadlineFetcher: Send + Sync {
    /// Download and parse the feed for `source`.
    async fn fetch(&self, source: &NewsSource) -> NewsResult<Vec<Headline>>;

    /// Scrape the page a headline links to.
    async fn fetch_full_text(&self, headline: &Headline) -> NewsResult<String>;
}

pub struct RssFetcher {
    client: Client,
    extractor: ContentExtractor,
}

impl RssFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("Mozilla/5.0 (compatible; NewsBreeze/1.0)")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            extractor: ContentExtractor::new()?,
        })
    }
}

#[async_trait]
impl HeadlineFetcher for RssFetcher {
    async fn fetch(&self, source: &NewsSource) -> NewsResult<Vec<Headline>> {
        let feed_url = source
            .url()
            .ok_or_else(|| NewsError::Parse(format!("invalid feed URL '{}'", source.feed_url)))?;

        tracing::info!("Fetching {} from {}", source.name, feed_url);

        let response = self
            .client
            .get(feed_url.as_str())
            .send()
            .await
            .map_err(NewsError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(NewsError::Network(format!(
                "{} feed returned HTTP {}",
                source.name, status
            )));
        }

        let xml = response.text().await.map_err(NewsError::from_transport)?;
        let headlines = parse_feed(&xml, &source.name, &feed_url)?;

        tracing::info!("Parsed {} headlines from {}", headlines.len(), source.name);
        Ok(headlines)
    }

    async fn fetch_full_text(&self, headline: &Headline) -> NewsResult<String> {
        self.extractor.fetch_full_text(&headline.link).await
    }
}

// ---- Wire formats ----

#[derive(Debug, Deserialize)]
struct RssDocument {
    channel: RssChannel,
}

#[derive(Debug, Deserialize)]
struct RssChannel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

/// RSS 1.0 puts items next to the channel, directly under `rdf:RDF`
#[derive(Debug, Deserialize)]
struct RdfDocument {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

/// Elements are matched on their local name, so `<atom:link>` lands next to
/// `<link>` and `<media:description>` next to `<description>`. Each field
/// collects every match and the first non-empty one wins.
#[derive(Debug, Deserialize)]
struct RssItem {
    #[serde(rename = "title", default)]
    titles: Vec<RssText>,
    #[serde(rename = "link", default)]
    links: Vec<RssLink>,
    #[serde(rename = "description", default)]
    descriptions: Vec<RssText>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RssText {
    #[serde(rename = "$text", default)]
    value: String,
}

/// `<link>url</link>`, or an `<atom:link href="..."/>` carried by the item
#[derive(Debug, Deserialize)]
struct RssLink {
    #[serde(rename = "$text", default)]
    value: String,
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

impl RssItem {
    fn first_text(texts: Vec<RssText>) -> Option<String> {
        texts
            .into_iter()
            .map(|t| t.value)
            .find(|v| !v.trim().is_empty())
    }

    /// The plain `<link>` text, else an `alternate` (or rel-less) `atom:link`
    fn permalink(&self) -> Option<String> {
        self.links
            .iter()
            .map(|l| l.value.trim())
            .find(|v| !v.is_empty())
            .or_else(|| {
                self.links
                    .iter()
                    .filter(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
                    .find_map(|l| l.href.as_deref())
            })
            .map(str::to_string)
    }
}

#[derive(Debug, Deserialize)]
struct AtomDocument {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<AtomText>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    summary: Option<AtomText>,
    content: Option<AtomText>,
    published: Option<String>,
    updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

impl AtomEntry {
    /// The `alternate` link, or the first link with no `rel`
    fn permalink(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
            .and_then(|l| l.href.as_deref())
    }
}

#[derive(Debug, PartialEq, Eq)]
enum FeedKind {
    Rss,
    Rdf,
    Atom,
}

/// Raw entry fields before validation
struct RawEntry {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    body: Option<String>,
    published: Option<DateTime<Utc>>,
}

// ---- Parsing ----

/// Parse an RSS 2.0, RSS 1.0 or Atom document into headlines.
///
/// Entries without a title or a usable link are dropped. A document that
/// yields no headline at all is an error: an empty list is never reported as
/// a successful fetch.
pub fn parse_feed(xml: &str, source_name: &str, feed_url: &Url) -> NewsResult<Vec<Headline>> {
    let raw_entries = match detect_kind(xml)? {
        FeedKind::Rss => {
            let doc: RssDocument = quick_xml::de::from_str(xml)
                .map_err(|e| NewsError::Parse(format!("malformed RSS: {}", e)))?;
            doc.channel.items.into_iter().map(RawEntry::from).collect::<Vec<_>>()
        }
        FeedKind::Rdf => {
            let doc: RdfDocument = quick_xml::de::from_str(xml)
                .map_err(|e| NewsError::Parse(format!("malformed RSS 1.0: {}", e)))?;
            doc.items.into_iter().map(RawEntry::from).collect()
        }
        FeedKind::Atom => {
            let doc: AtomDocument = quick_xml::de::from_str(xml)
                .map_err(|e| NewsError::Parse(format!("malformed Atom: {}", e)))?;
            let xhtml = xhtml_contents(xml)?;
            doc.entries
                .into_iter()
                .enumerate()
                .map(|(i, entry)| {
                    let mut raw = RawEntry::from(entry);
                    if let Some(Some(markup)) = xhtml.get(i) {
                        raw.body = Some(markup.clone());
                    }
                    raw
                })
                .collect()
        }
    };

    let total = raw_entries.len();
    let headlines: Vec<Headline> = raw_entries
        .into_iter()
        .filter_map(|raw| raw.into_headline(source_name, feed_url))
        .collect();

    if headlines.is_empty() {
        return Err(NewsError::Parse(format!(
            "feed contains no usable entries ({} found)",
            total
        )));
    }

    if headlines.len() < total {
        tracing::debug!(
            "Skipped {} of {} entries without a title or link",
            total - headlines.len(),
            total
        );
    }

    Ok(headlines)
}

fn detect_kind(xml: &str) -> NewsResult<FeedKind> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return match e.local_name().as_ref() {
                    b"rss" => Ok(FeedKind::Rss),
                    b"RDF" => Ok(FeedKind::Rdf),
                    b"feed" => Ok(FeedKind::Atom),
                    other => Err(NewsError::Parse(format!(
                        "unsupported root element <{}>",
                        String::from_utf8_lossy(other)
                    ))),
                };
            }
            Ok(Event::Eof) => return Err(NewsError::Parse("document is empty".to_string())),
            Ok(_) => continue,
            Err(e) => return Err(NewsError::Parse(format!("invalid XML: {}", e))),
        }
    }
}

/// Inner markup of each entry's `<content type="xhtml">`, one slot per `<entry>`.
///
/// XHTML content lives in child elements rather than text, so serde sees it
/// as empty. This walks the document again and keeps the raw markup.
fn xhtml_contents(xml: &str) -> NewsResult<Vec<Option<String>>> {
    let mut reader = Reader::from_str(xml);
    let mut contents = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"entry" => contents.push(None),
                b"content" => {
                    let is_xhtml = e
                        .try_get_attribute("type")
                        .ok()
                        .flatten()
                        .map(|a| a.value.as_ref() == b"xhtml")
                        .unwrap_or(false);
                    if is_xhtml {
                        let end = e.name().as_ref().to_vec();
                        let markup = reader
                            .read_text(QName(&end))
                            .map_err(|e| NewsError::Parse(format!("malformed Atom content: {}", e)))?;
                        if let Some(slot) = contents.last_mut() {
                            *slot = Some(markup.into_owned());
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => return Ok(contents),
            Ok(_) => continue,
            Err(e) => return Err(NewsError::Parse(format!("invalid XML: {}", e))),
        }
    }
}

impl From<RssItem> for RawEntry {
    fn from(item: RssItem) -> Self {
        let link = item.permalink();
        let published = item.pub_date.as_deref().and_then(parse_date);
        Self {
            title: RssItem::first_text(item.titles),
            link,
            description: RssItem::first_text(item.descriptions),
            body: None,
            published,
        }
    }
}

impl From<AtomEntry> for RawEntry {
    fn from(entry: AtomEntry) -> Self {
        let link = entry.permalink().map(str::to_string);
        let published = entry
            .published
            .as_deref()
            .or(entry.updated.as_deref())
            .and_then(parse_date);
        Self {
            title: entry.title.map(|t| t.value),
            link,
            description: entry.summary.map(|t| t.value),
            body: entry.content.map(|t| t.value),
            published,
        }
    }
}

impl RawEntry {
    fn into_headline(self, source_name: &str, feed_url: &Url) -> Option<Headline> {
        let title = collapse_whitespace(&html_to_text(self.title.as_deref().unwrap_or_default()));
        if title.is_empty() {
            return None;
        }

        let link = resolve_link(self.link.as_deref()?, feed_url)?;

        let description = self
            .description
            .as_deref()
            .map(html_to_text)
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| "No description".to_string());

        let body = self
            .body
            .as_deref()
            .map(html_to_text)
            .filter(|b| !b.is_empty());

        Some(Headline {
            source: source_name.to_string(),
            title,
            link,
            published: self.published,
            description,
            body,
        })
    }
}

/// Absolute http(s) URL for an entry link, resolving relative links against the feed
fn resolve_link(raw: &str, feed_url: &Url) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let url = feed_url.join(raw).ok()?;
    match url.scheme() {
        "http" | "https" => Some(url),
        _ => None,
    }
}

/// RSS uses RFC 2822, Atom uses RFC 3339
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}
