//! Движок ElevenLabs
//!
//! Запрашивает кодировку, ближайшую к выходному формату, и пишет ответ в
//! файл потоком.

use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt;
use log::debug;
use reqwest::Client;
use serde_json::json;
use tokio::io::AsyncWriteExt;

use crate::config::{BackendOptions, OutputFormat};
use crate::error::{Result, SpeakVaultError};
use crate::tts::SpeechBackend;

/// Кодировка ответа ElevenLabs и расширение временного файла
pub fn provider_format(format: OutputFormat) -> (&'static str, &'static str) {
    match format {
        OutputFormat::Ogg => ("opus_48000_64", "ogg"),
        // WAV получается при экспорте
        OutputFormat::Mp3 | OutputFormat::Wav => ("mp3_44100_128", "mp3"),
    }
}

pub struct ElevenLabsBackend {
    client: Client,
    base_url: String,
    api_key: String,
    voice_id: String,
    model_id: String,
    output_format: &'static str,
    extension: &'static str,
}

impl ElevenLabsBackend {
    pub fn new(api_key: &str, voice_id: &str, format: OutputFormat, options: &BackendOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(options.request_timeout)
            .build()
            .map_err(|e| SpeakVaultError::Configuration(format!("Failed to build HTTP client: {}", e)))?;
        let (output_format, extension) = provider_format(format);

        Ok(Self {
            client,
            base_url: options.eleven_base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            voice_id: voice_id.to_string(),
            model_id: options.eleven_model_id.clone(),
            output_format,
            extension,
        })
    }
}

#[async_trait]
impl SpeechBackend for ElevenLabsBackend {
    fn name(&self) -> &str {
        "elevenlabs"
    }

    fn temp_extension(&self) -> &str {
        self.extension
    }

    async fn synthesize(&self, text: &str, target: &Path) -> Result<()> {
        let url = format!("{}/v1/text-to-speech/{}", self.base_url, self.voice_id);
        debug!("POST {} ({})", url, self.output_format);

        let response = self
            .client
            .post(&url)
            .query(&[("output_format", self.output_format)])
            .header("xi-api-key", &self.api_key)
            .json(&json!({
                "text": text,
                "model_id": self.model_id,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SpeakVaultError::Synthesis(format!(
                "ElevenLabs returned status {}: {}",
                status,
                body.trim()
            )));
        }

        let mut file = tokio::fs::File::create(target).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0usize;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            written += chunk.len();
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        if written == 0 {
            return Err(SpeakVaultError::Synthesis("ElevenLabs returned an empty body".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[test]
    fn test_provider_format_mapping() {
        assert_eq!(provider_format(OutputFormat::Ogg), ("opus_48000_64", "ogg"));
        assert_eq!(provider_format(OutputFormat::Mp3), ("mp3_44100_128", "mp3"));
        assert_eq!(provider_format(OutputFormat::Wav).1, "mp3");
    }

    #[tokio::test]
    async fn test_streams_body_to_file() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/text-to-speech/voice42")
            .match_query(Matcher::UrlEncoded("output_format".into(), "mp3_44100_128".into()))
            .match_header("xi-api-key", "secret")
            .match_body(Matcher::PartialJson(json!({
                "text": "Witaj",
                "model_id": "eleven_turbo_v2_5",
            })))
            .with_status(200)
            .with_body(b"ID3 fake audio payload")
            .create_async()
            .await;

        let options = BackendOptions {
            eleven_base_url: server.url(),
            ..Default::default()
        };
        let backend = ElevenLabsBackend::new("secret", "voice42", OutputFormat::Mp3, &options).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("chunk.mp3");
        backend.synthesize("Witaj", &target).await.unwrap();

        mock.assert_async().await;
        assert_eq!(std::fs::read(&target).unwrap(), b"ID3 fake audio payload");
    }

    #[tokio::test]
    async fn test_rejected_key_is_recoverable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", Matcher::Any)
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body("invalid api key")
            .create_async()
            .await;

        let options = BackendOptions {
            eleven_base_url: server.url(),
            ..Default::default()
        };
        let backend = ElevenLabsBackend::new("bad", "voice", OutputFormat::Ogg, &options).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let err = backend.synthesize("x", &dir.path().join("c.ogg")).await.unwrap_err();
        assert!(err.to_string().contains("401"));
        assert!(!err.is_fatal());
    }
}
