//! Локальный движок espeak-ng
//!
//! Сеть не нужна, поэтому повторов нет: любая ошибка процесса пропускает фрагмент.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use log::debug;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{Result, SpeakVaultError};
use crate::tts::SpeechBackend;

pub struct EspeakBackend {
    program: String,
    voice: String,
}

impl EspeakBackend {
    pub fn new(program: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            voice: voice.into(),
        }
    }

    /// Аргументы командной строки; текст подается через stdin
    pub fn command_args(&self, target: &Path) -> Vec<String> {
        let mut args = Vec::new();
        if !self.voice.is_empty() {
            args.push("-v".to_string());
            args.push(self.voice.clone());
        }
        args.push("-w".to_string());
        args.push(target.to_string_lossy().into_owned());
        args.push("--stdin".to_string());
        args
    }
}

#[async_trait]
impl SpeechBackend for EspeakBackend {
    fn name(&self) -> &str {
        "espeak"
    }

    fn temp_extension(&self) -> &str {
        "wav"
    }

    async fn synthesize(&self, text: &str, target: &Path) -> Result<()> {
        let args = self.command_args(target);
        debug!("{} {}", self.program, args.join(" "));

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SpeakVaultError::Synthesis(format!("Failed to start {}: {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(SpeakVaultError::Synthesis(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        if !target.exists() {
            return Err(SpeakVaultError::Synthesis(format!("{} produced no audio file", self.program)));
        }
        Ok(())
    }
}
