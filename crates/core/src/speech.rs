//! Text-to-speech rendering to audio files.

use crate::voices::voice_locale;
use anyhow::{Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// 24 kHz, 16-bit mono PCM wrapped in a RIFF/WAV header.
pub const OUTPUT_FORMAT: &str = "riff-24khz-16bit-mono-pcm";

/// Renders text with a named voice and returns the path of the audio file.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<PathBuf>;
}

/// Azure Cognitive Services speech synthesis over its REST endpoint.
pub struct AzureSpeech {
    client: reqwest::Client,
    endpoint: String,
    subscription_key: SecretString,
    output_dir: PathBuf,
}

impl AzureSpeech {
    pub fn new(subscription_key: SecretString, region: &str, output_dir: PathBuf) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("https://{}.tts.speech.microsoft.com/cognitiveservices/v1", region),
            subscription_key,
            output_dir,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[async_trait]
impl SpeechSynthesizer for AzureSpeech {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<PathBuf> {
        let audio = self
            .client
            .post(&self.endpoint)
            .header("Ocp-Apim-Subscription-Key", self.subscription_key.expose_secret())
            .header(reqwest::header::CONTENT_TYPE, "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", OUTPUT_FORMAT)
            .header(reqwest::header::USER_AGENT, "vaani")
            .body(build_ssml(text, voice))
            .send()
            .await
            .context("Speech synthesis request failed")?
            .error_for_status()
            .context("Speech synthesis was rejected")?
            .bytes()
            .await
            .context("Failed to read synthesized audio")?;

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.output_dir.display()))?;
        // Unique names keep concurrent requests from clobbering each other.
        let path = self.output_dir.join(format!("{}.wav", Uuid::new_v4()));
        tokio::fs::write(&path, &audio)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!(%voice, bytes = audio.len(), path = %path.display(), "Rendered speech.");
        Ok(path)
    }
}

pub fn build_ssml(text: &str, voice: &str) -> String {
    format!(
        "<speak version='1.0' xml:lang='{locale}'><voice name='{voice}'>{text}</voice></speak>",
        locale = escape_xml(voice_locale(voice)),
        voice = escape_xml(voice),
        text = escape_xml(text),
    )
}

fn escape_xml(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
