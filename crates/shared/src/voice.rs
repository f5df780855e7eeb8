use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio;
use crate::error::{NewsError, NewsResult};
use crate::models::AudioClip;
use crate::sources::slugify;

/// Voices offered out of the box; each expects `<slug>.wav` in the voice directory
pub const BUILTIN_VOICES: [&str; 5] = [
    "Morgan Freeman",
    "Oprah Winfrey",
    "Barack Obama",
    "Emma Watson",
    "David Attenborough",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceProfile {
    pub name: String,
    pub reference: PathBuf,
}

impl VoiceProfile {
    pub fn new(name: impl Into<String>, reference: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            reference: reference.into(),
        }
    }

    pub fn slug(&self) -> String {
        slugify(&self.name)
    }

    /// Whether the reference sample is present on disk
    pub fn is_available(&self) -> bool {
        self.reference.is_file()
    }

    /// Read and validate the reference sample.
    pub fn load_reference(&self) -> NewsResult<Vec<u8>> {
        if !self.reference.is_file() {
            return Err(NewsError::invalid_voice(
                &self.name,
                format!("reference sample {} is missing", self.reference.display()),
            ));
        }

        let bytes = fs::read(&self.reference).map_err(|e| {
            NewsError::invalid_voice(
                &self.name,
                format!("cannot read {}: {}", self.reference.display(), e),
            )
        })?;

        let info = audio::inspect(&bytes).map_err(|e| {
            NewsError::invalid_voice(
                &self.name,
                format!("{} is not a valid WAV file: {}", self.reference.display(), e),
            )
        })?;

        if info.frames == 0 {
            return Err(NewsError::invalid_voice(
                &self.name,
                format!("{} contains no audio", self.reference.display()),
            ));
        }

        Ok(bytes)
    }
}

/// The read-only set of reference voices, loaded once at startup
#[derive(Debug, Clone)]
pub struct VoiceLibrary {
    dir: PathBuf,
    profiles: Vec<VoiceProfile>,
}

impl VoiceLibrary {
    /// Built-in voices plus any other `*.wav` sample found in `dir`.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();

        let mut profiles: Vec<VoiceProfile> = BUILTIN_VOICES
            .iter()
            .map(|name| VoiceProfile::new(*name, dir.join(format!("{}.wav", slugify(name)))))
            .collect();

        if dir.is_dir() {
            let mut extra = Vec::new();
            for entry in fs::read_dir(&dir)
                .with_context(|| format!("Failed to read voice directory {}", dir.display()))?
            {
                let path = entry?.path();
                let is_wav = path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| ext.eq_ignore_ascii_case("wav"))
                    .unwrap_or(false);
                if !is_wav || profiles.iter().any(|p| p.reference == path) {
                    continue;
                }
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    extra.push(VoiceProfile::new(display_name(stem), path.clone()));
                }
            }
            extra.sort_by(|a, b| a.name.cmp(&b.name));
            profiles.extend(extra);
        } else {
            tracing::warn!(
                "Voice directory {} does not exist; voice cloning has no reference samples",
                dir.display()
            );
        }

        let available = profiles.iter().filter(|p| p.is_available()).count();
        tracing::info!(
            "Loaded {} voice profiles ({} with reference audio) from {}",
            profiles.len(),
            available,
            dir.display()
        );

        Ok(Self { dir, profiles })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn profiles(&self) -> &[VoiceProfile] {
        &self.profiles
    }

    pub fn get(&self, name: &str) -> Option<&VoiceProfile> {
        let name = name.trim();
        self.profiles
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name) || p.slug() == name)
    }

    pub fn default_voice(&self) -> Option<&VoiceProfile> {
        self.profiles.first()
    }

    pub fn has_samples(&self) -> bool {
        self.profiles.iter().any(VoiceProfile::is_available)
    }
}

/// "david_attenborough" -> "David Attenborough"
fn display_name(stem: &str) -> String {
    stem.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
pub trait VoiceSynthesizer: Send + Sync {
    /// Render `text` in the voice of `profile`. The whole clip is produced
    /// before returning; on error no audio is returned at all.
    async fn synthesize(&self, text: &str, profile: &VoiceProfile) -> NewsResult<AudioClip>;
}

/// Voice cloning through an XTTS-v2 inference server speaking the
/// xtts-api-server protocol.
///
/// `POST {text, speaker_wav, language}` as JSON and get a WAV file back.
/// `speaker_wav` is the absolute path of the local reference sample, so the
/// server has to see the same voice directory (it runs on this host by
/// default).
#[derive(Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    speaker_wav: String,
    language: &'a str,
}

pub struct XttsSynthesizer {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    language: String,
}

impl XttsSynthesizer {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, language: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            language: language.into(),
        })
    }
}

#[async_trait]
impl VoiceSynthesizer for XttsSynthesizer {
    async fn synthesize(&self, text: &str, profile: &VoiceProfile) -> NewsResult<AudioClip> {
        let text = text.trim();
        if text.is_empty() {
            return Err(NewsError::EmptyInput);
        }

        profile.load_reference()?;
        let speaker_wav = fs::canonicalize(&profile.reference).map_err(|e| {
            NewsError::invalid_voice(
                &profile.name,
                format!("cannot resolve {}: {}", profile.reference.display(), e),
            )
        })?;

        let preview: String = text.chars().take(50).collect();
        tracing::info!("Generating speech with {}'s voice for: {}...", profile.name, preview);

        let request = TtsRequest {
            text,
            speaker_wav: speaker_wav.to_string_lossy().into_owned(),
            language: &self.language,
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
            return Err(NewsError::ModelUnavailable(format!(
                "TTS server returned {}: {}",
                status, error_text
            )));
        }

        let body = response.bytes().await.map_err(NewsError::from_backend)?;

        let info = audio::inspect(&body)
            .map_err(|e| NewsError::ModelUnavailable(format!("TTS server returned invalid audio: {}", e)))?;
        if info.frames == 0 {
            return Err(NewsError::ModelUnavailable("TTS server returned an empty clip".to_string()));
        }

        let wav = match audio::normalize(&body) {
            Ok(normalized) => normalized,
            Err(e) => {
                tracing::warn!("Skipping audio normalization: {}", e);
                body.to_vec()
            }
        };

        tracing::info!("Speech generated: {:.1}s, {} bytes", info.duration().as_secs_f32(), wav.len());

        Ok(AudioClip {
            wav,
            voice: profile.name.clone(),
            text: text.to_string(),
            duration: info.duration(),
        })
    }
}
