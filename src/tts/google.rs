//! Облачный движок Google Translate TTS
//!
//! Сервис принимает короткие запросы, поэтому фрагмент режется по словам на
//! куски до `PIECE_CHARS` символов, которые запрашиваются по порядку, а MP3
//! ответы склеиваются. Ответ не всегда корректен даже при статусе 200:
//! слишком короткий результат считается неудачей. После каждого полученного
//! ответа выдерживается пауза, чтобы не упираться в ограничение частоты.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;

use crate::config::BackendOptions;
use crate::error::{Result, SpeakVaultError};
use crate::text::split_text;
use crate::tts::SpeechBackend;

/// Максимальная длина одного запроса к сервису
pub const PIECE_CHARS: usize = 100;

/// Клиент Google Translate TTS
pub struct GoogleTtsBackend {
    client: Client,
    base_url: String,
    language: String,
    retries: u32,
    min_bytes: usize,
    cooldown: Duration,
}

impl GoogleTtsBackend {
    pub fn new(language: &str, options: &BackendOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(options.request_timeout)
            .user_agent("Mozilla/5.0")
            .build()
            .map_err(|e| SpeakVaultError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: options.google_base_url.trim_end_matches('/').to_string(),
            language: language.to_string(),
            retries: options.google_retries.max(1),
            min_bytes: options.google_min_bytes,
            cooldown: options.google_cooldown,
        })
    }

    /// Один запрос для куска `idx` из `total`
    async fn request(&self, piece: &str, idx: usize, total: usize) -> Result<Vec<u8>> {
        let text_len = piece.chars().count().to_string();
        let idx = idx.to_string();
        let total = total.to_string();
        let response = self
            .client
            .get(format!("{}/translate_tts", self.base_url))
            .query(&[
                ("ie", "UTF-8"),
                ("q", piece),
                ("tl", self.language.as_str()),
                ("client", "tw-ob"),
                ("total", total.as_str()),
                ("idx", idx.as_str()),
                ("textlen", text_len.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SpeakVaultError::Synthesis(format!(
                "Google TTS returned status {}",
                response.status()
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// Запросить все куски и склеить ответы
    async fn fetch(&self, pieces: &[String]) -> Result<Vec<u8>> {
        let mut audio = Vec::new();
        for (idx, piece) in pieces.iter().enumerate() {
            audio.extend_from_slice(&self.request(piece, idx, pieces.len()).await?);
        }
        Ok(audio)
    }
}

#[async_trait]
impl SpeechBackend for GoogleTtsBackend {
    fn name(&self) -> &str {
        "google"
    }

    fn temp_extension(&self) -> &str {
        "mp3"
    }

    async fn synthesize(&self, text: &str, target: &Path) -> Result<()> {
        let pieces = split_text(text, PIECE_CHARS);
        if pieces.is_empty() {
            return Err(SpeakVaultError::Synthesis("Nothing to synthesize".to_string()));
        }

        for attempt in 1..=self.retries {
            let body = match self.fetch(&pieces).await {
                Ok(body) => body,
                Err(e) => {
                    warn!("Google TTS attempt {}/{} failed: {}", attempt, self.retries, e);
                    continue;
                }
            };

            tokio::fs::write(target, &body).await?;
            tokio::time::sleep(self.cooldown).await;

            if body.len() >= self.min_bytes {
                debug!(
                    "Google TTS returned {} bytes in {} piece(s) on attempt {}",
                    body.len(),
                    pieces.len(),
                    attempt
                );
                return Ok(());
            }
            warn!(
                "Google TTS attempt {}/{} returned only {} bytes",
                attempt,
                self.retries,
                body.len()
            );
        }

        if target.exists() {
            let _ = tokio::fs::remove_file(target).await;
        }
        Err(SpeakVaultError::Synthesis(format!(
            "Google TTS gave no usable audio after {} attempts",
            self.retries
        )))
    }
}
