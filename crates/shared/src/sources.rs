use url::Url;

/// A news outlet and the feed we read it from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsSource {
    pub name: String,
    pub slug: String,
    pub feed_url: String,
}

impl NewsSource {
    pub fn new(name: impl Into<String>, slug: impl Into<String>, feed_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slug: slug.into(),
            feed_url: feed_url.into(),
        }
    }

    pub fn url(&self) -> Option<Url> {
        Url::parse(&self.feed_url).ok()
    }
}

/// Turn a display name into a lowercase, underscore separated slug.
///
/// "The New York Times" -> "the_new_york_times"
pub fn slugify(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

/// The sources offered in the source selector, in display order
#[derive(Debug, Clone)]
pub struct SourceCatalog {
    sources: Vec<NewsSource>,
}

impl SourceCatalog {
    pub fn builtin() -> Self {
        Self {
            sources: vec![
                NewsSource::new("BBC News", "bbc", "http://feeds.bbci.co.uk/news/rss.xml"),
                NewsSource::new("CNN", "cnn", "http://rss.cnn.com/rss/edition.rss"),
                NewsSource::new("Reuters", "reuters", "http://feeds.reuters.com/reuters/topNews"),
                NewsSource::new("The Guardian", "guardian", "https://www.theguardian.com/world/rss"),
                NewsSource::new(
                    "The New York Times",
                    "nyt",
                    "https://rss.nytimes.com/services/xml/rss/nyt/HomePage.xml",
                ),
            ],
        }
    }

    pub fn from_sources(sources: Vec<NewsSource>) -> Self {
        Self { sources }
    }

    /// Append sources, skipping any whose slug is already taken
    pub fn with_extra(mut self, extra: Vec<NewsSource>) -> Self {
        for source in extra {
            if self.sources.iter().any(|s| s.slug == source.slug) {
                tracing::warn!("Ignoring duplicate news source '{}'", source.slug);
                continue;
            }
            self.sources.push(source);
        }
        self
    }

    /// Look a source up by slug or by display name (case-insensitive)
    pub fn find(&self, key: &str) -> Option<&NewsSource> {
        let key = key.trim();
        self.sources
            .iter()
            .find(|s| s.slug == key || s.name.eq_ignore_ascii_case(key))
    }

    pub fn sources(&self) -> &[NewsSource] {
        &self.sources
    }

    pub fn first(&self) -> Option<&NewsSource> {
        self.sources.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_order() {
        let catalog = SourceCatalog::builtin();
        let names: Vec<_> = catalog.sources().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["BBC News", "CNN", "Reuters", "The Guardian", "The New York Times"]
        );
        assert!(catalog.sources().iter().all(|s| s.url().is_some()));
    }

    #[test]
    fn test_find_by_slug_or_name() {
        let catalog = SourceCatalog::builtin();
        assert_eq!(catalog.find("bbc").unwrap().name, "BBC News");
        assert_eq!(catalog.find("bbc news").unwrap().slug, "bbc");
        assert!(catalog.find("fox").is_none());
    }

    #[test]
    fn test_with_extra_skips_duplicates() {
        let catalog = SourceCatalog::builtin().with_extra(vec![
            NewsSource::new("Other BBC", "bbc", "https://example.com/rss"),
            NewsSource::new("Ars Technica", "ars_technica", "https://feeds.arstechnica.com/arstechnica/index"),
        ]);
        assert_eq!(catalog.sources().len(), 6);
        assert_eq!(catalog.find("bbc").unwrap().name, "BBC News");
        assert!(catalog.find("Ars Technica").is_some());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("The New York Times"), "the_new_york_times");
        assert_eq!(slugify("Morgan Freeman"), "morgan_freeman");
        assert_eq!(slugify("  Ars--Technica! "), "ars_technica");
    }
}
