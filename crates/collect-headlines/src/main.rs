use anyhow::{Context, Result};
use clap::Parser;
use shared::{Config, NewsSource, Services, Session, SourceCatalog};
use std::io::{self as stdio, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn prompt_source_selection(catalog: &SourceCatalog) -> Result<String> {
    println!("Which news source?");
    for (i, source) in catalog.sources().iter().enumerate() {
        println!("  {}) {}", i + 1, source.name);
    }
    print!("\nEnter your choice (1-{}): ", catalog.sources().len());
    stdio::stdout().flush()?;

    let mut input = String::new();
    stdio::stdin().read_line(&mut input)?;

    parse_choice(input.trim(), catalog.sources())
        .map(|source| source.slug.clone())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Invalid selection. Please choose a number from 1 to {}.",
                catalog.sources().len()
            )
        })
}

fn parse_choice<'a>(input: &str, sources: &'a [NewsSource]) -> Option<&'a NewsSource> {
    let n: usize = input.parse().ok()?;
    sources.get(n.checked_sub(1)?)
}

fn clip_path(dir: &Path, position: usize, voice: &str) -> PathBuf {
    dir.join(format!("{:02}-{}.wav", position, shared::sources::slugify(voice)))
}

#[derive(Parser)]
#[command(name = "collect-headlines")]
#[command(about = "Fetch, summarize and optionally voice the latest headlines from a news feed")]
struct Args {
    /// News source to read (bbc, cnn, reuters, guardian, nyt, or a configured extra feed)
    #[arg(short, long)]
    source: Option<String>,

    /// Maximum number of headlines to process
    #[arg(short, long, default_value = "10")]
    limit: usize,

    /// Voice to read summaries in; no audio is produced without it
    #[arg(long)]
    voice: Option<String>,

    /// Directory for the generated WAV files
    #[arg(short, long, default_value = ".")]
    out: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if args.verbose { "debug,hyper=info,reqwest=info" } else { "warn" })
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;
    let mut services = Services::from_config(&config).context("Failed to set up backends")?;
    services.max_headlines = args.limit;

    let mut session = Session::new(&services);

    let slug = match args.source {
        Some(slug) => slug,
        None => prompt_source_selection(&services.catalog)?,
    };
    let source = session
        .select_source(&services, &slug)
        .with_context(|| format!("Invalid source: {}", slug))?;
    println!("\n✓ Selected: {}", source.name);

    if let Some(voice) = &args.voice {
        session.select_voice(&services, voice)?;
        std::fs::create_dir_all(&args.out)
            .with_context(|| format!("Failed to create {}", args.out.display()))?;
        println!("✓ Voice: {}", session.selected_voice());
    }

    println!("\n📰 Fetching headlines...");
    let count = session.fetch(&services).await.context("Failed to fetch headlines")?;
    println!("✓ Found {} headlines", count);

    let mut summarized = 0;
    let mut voiced = 0;

    for index in 0..count {
        let Some(entry) = session.entry(index) else { break };
        println!("\n{}. {}", index + 1, entry.headline.title);
        println!("   {}", entry.headline.published_label());
        println!("   {}", entry.headline.link);

        match session.expand(&services, index).await {
            Ok(summary) => {
                if summary.is_degraded() {
                    println!("   ⚠ Failed to generate summary. Using original text.");
                } else {
                    summarized += 1;
                }
                println!("   {}", summary.text);
            }
            Err(e) => {
                println!("   ✗ {}", e);
                continue;
            }
        }

        if args.voice.is_none() {
            continue;
        }

        let voice = session.selected_voice().to_string();
        match session.play(&services, index).await {
            Ok(clip) => {
                let path = clip_path(&args.out, index + 1, &voice);
                std::fs::write(&path, &clip.wav)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("   🔊 {} ({:.1}s)", path.display(), clip.duration.as_secs_f32());
                voiced += 1;
            }
            Err(e) => println!("   ✗ Error generating audio: {}", e),
        }
    }

    println!("\n✅ Summarized {}/{} headlines", summarized, count);
    if args.voice.is_some() {
        println!("✅ Wrote {}/{} audio clips to {}", voiced, count, args.out.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_choice() {
        let catalog = SourceCatalog::builtin();
        assert_eq!(parse_choice("1", catalog.sources()).unwrap().slug, "bbc");
        assert_eq!(parse_choice("5", catalog.sources()).unwrap().slug, "nyt");
        assert!(parse_choice("0", catalog.sources()).is_none());
        assert!(parse_choice("6", catalog.sources()).is_none());
        assert!(parse_choice("bbc", catalog.sources()).is_none());
    }

    #[test]
    fn test_clip_path() {
        let path = clip_path(Path::new("out"), 3, "Morgan Freeman");
        assert_eq!(path, Path::new("out").join("03-morgan_freeman.wav"));
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["collect-headlines", "--source", "bbc"]);
        assert_eq!(args.source.as_deref(), Some("bbc"));
        assert_eq!(args.limit, 10);
        assert!(args.voice.is_none());
        assert_eq!(args.out, PathBuf::from("."));
    }
}
