// Public modules
pub mod audio;
pub mod config;
pub mod error;
pub mod extractor;
pub mod feed;
pub mod models;
pub mod session;
pub mod sources;
pub mod summarizer;
pub mod voice;

// Re-export commonly used types
pub use config::Config;
pub use error::{NewsError, NewsResult};
pub use extractor::ContentExtractor;
pub use feed::{HeadlineFetcher, RssFetcher};
pub use models::{AudioClip, Headline, Summary, SummaryKind};
pub use session::{HeadlineEntry, ItemState, Phase, Services, Session, SourceFeed};
pub use sources::{NewsSource, SourceCatalog};
pub use summarizer::{summarize_headline, HuggingFaceSummarizer, Summarizer};
pub use voice::{VoiceLibrary, VoiceProfile, VoiceSynthesizer, XttsSynthesizer};
