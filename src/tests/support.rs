//! Общие заготовки для сценарных тестов

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SpeakVaultError};
use crate::tts::SpeechBackend;

pub const SAMPLE_RATE: u32 = 16000;
pub const FRAGMENT_MS: u64 = 200;

/// Движок без сети: пишет WAV с тоном фиксированной длины
pub struct ScriptedBackend {
    calls: Arc<Mutex<Vec<String>>>,
    fail_on: Option<String>,
    cancel_after: Option<(usize, CancellationToken)>,
    amplitude: f32,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_on: None,
            cancel_after: None,
            amplitude: 0.25,
        }
    }

    /// Фрагменты, содержащие `marker`, завершаются ошибкой
    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_on = Some(marker.to_string());
        self
    }

    /// Отменить токен после `n` вызовов
    pub fn cancelling_after(mut self, n: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((n, token));
        self
    }

    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// Общий журнал вызовов
    pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        self.calls.clone()
    }
}

#[async_trait]
impl SpeechBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn temp_extension(&self) -> &str {
        "wav"
    }

    async fn synthesize(&self, text: &str, target: &Path) -> Result<()> {
        let count = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(text.to_string());
            calls.len()
        };
        if let Some((n, token)) = &self.cancel_after {
            if count >= *n {
                token.cancel();
            }
        }
        if let Some(marker) = &self.fail_on {
            if text.contains(marker.as_str()) {
                return Err(SpeakVaultError::Synthesis(format!("scripted failure for '{}'", text)));
            }
        }
        write_tone(target, FRAGMENT_MS, self.amplitude)
    }
}

/// Записать тон 440 Гц в WAV
pub fn write_tone(path: &Path, duration_ms: u64, amplitude: f32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    let frames = duration_ms * SAMPLE_RATE as u64 / 1000;
    for i in 0..frames {
        let t = i as f32 / SAMPLE_RATE as f32;
        let sample = (2.0 * std::f32::consts::PI * 440.0 * t).sin() * amplitude;
        writer.write_sample((sample * i16::MAX as f32) as i16)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Создать исходный файл в папке теста
pub fn source_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// Имена файлов в папке, по алфавиту
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}
