//! Модуль конфигурации библиотеки speakvault
//!
//! Этот модуль содержит параметры одного запуска генерации и настройки движков.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SpeakVaultError;

/// Лимит символов на один запрос к движку
pub const CHAR_LIMIT: usize = 950;
/// Код языка по умолчанию
pub const DEFAULT_LANG: &str = "pl";
/// Префикс имен файлов генератора
pub const GENERATION_PREFIX: &str = "output1";
/// Префикс имен файлов пакетной обработки
pub const BATCH_PREFIX: &str = "output2";

/// Формат выходного аудио
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Ogg,
    Mp3,
    Wav,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [OutputFormat::Ogg, OutputFormat::Mp3, OutputFormat::Wav];

    /// Расширение файла без точки
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Ogg => "ogg",
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = SpeakVaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ogg" => Ok(Self::Ogg),
            "mp3" => Ok(Self::Mp3),
            "wav" => Ok(Self::Wav),
            other => Err(SpeakVaultError::Configuration(format!("Unsupported output format: {}", other))),
        }
    }
}

/// Доступные движки TTS
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Облачный Google TTS
    #[default]
    Google,
    /// Локальный движок espeak-ng
    Espeak,
    /// ElevenLabs API
    ElevenLabs,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Espeak => "espeak",
            Self::ElevenLabs => "elevenlabs",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = SpeakVaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(' ', "").as_str() {
            "google" | "googletts" | "gtts" => Ok(Self::Google),
            "espeak" | "espeak-ng" | "local" | "windowstts" => Ok(Self::Espeak),
            "elevenlabs" | "eleven" => Ok(Self::ElevenLabs),
            other => Err(SpeakVaultError::Configuration(format!("Unsupported TTS engine: {}", other))),
        }
    }
}

/// Диапазон строк источника: `start` с единицы, `end` включительно, `None` = до конца
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineRange {
    pub start: usize,
    pub end: Option<usize>,
}

impl Default for LineRange {
    fn default() -> Self {
        Self { start: 1, end: None }
    }
}

impl LineRange {
    pub fn new(start: usize, end: Option<usize>) -> Self {
        Self { start, end }
    }

    /// Выбрать элементы диапазона (позиции в отфильтрованной последовательности)
    pub fn select<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let from = self.start.saturating_sub(1).min(items.len());
        let to = match self.end {
            Some(end) if end > 0 => end.min(items.len()),
            _ => items.len(),
        };
        if from >= to {
            &items[0..0]
        } else {
            &items[from..to]
        }
    }
}

/// Параметры постобработки, множители (1.0 = без изменений)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TransformParams {
    pub tempo: f32,
    pub pitch: f32,
    pub gain: f32,
}

impl Default for TransformParams {
    fn default() -> Self {
        Self { tempo: 1.0, pitch: 1.0, gain: 1.0 }
    }
}

impl TransformParams {
    pub fn is_identity(&self) -> bool {
        self.tempo == 1.0 && self.pitch == 1.0 && self.gain == 1.0
    }
}

/// Запрос на генерацию. Не меняется после старта запуска.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Исходный файл (txt, csv, srt)
    pub source: PathBuf,
    /// Диапазон строк
    pub range: LineRange,
    /// Движок TTS
    pub engine: EngineKind,
    /// Формат результата
    pub format: OutputFormat,
    /// Папка вывода, должна уже существовать
    pub output_dir: PathBuf,
    /// Склеить все фрагменты в один файл
    pub merge: bool,
    /// Темп, высота и громкость
    pub transform: TransformParams,
    /// Голос локального движка
    pub voice_id: String,
    /// Ключ ElevenLabs
    pub eleven_api_key: String,
    /// Голос ElevenLabs
    pub eleven_voice_id: String,
    /// Секунда тишины после каждого субтитра (только без склейки)
    pub subtitle_silence: bool,
    /// Подогнать склеенное аудио под длительность субтитров
    pub global_stretch: bool,
    /// Код языка
    pub language: String,
    /// Лимит символов на фрагмент
    pub char_limit: usize,
}

impl GenerationRequest {
    pub fn new(source: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            range: LineRange::default(),
            engine: EngineKind::default(),
            format: OutputFormat::default(),
            output_dir: output_dir.into(),
            merge: false,
            transform: TransformParams::default(),
            voice_id: String::new(),
            eleven_api_key: String::new(),
            eleven_voice_id: String::new(),
            subtitle_silence: false,
            global_stretch: false,
            language: DEFAULT_LANG.to_string(),
            char_limit: CHAR_LIMIT,
        }
    }
}

/// Настройки движков, не зависящие от конкретного запуска
#[derive(Debug, Clone)]
pub struct BackendOptions {
    /// Адрес Google Translate TTS
    pub google_base_url: String,
    /// Количество попыток облачного движка
    pub google_retries: u32,
    /// Минимальный размер корректного ответа в байтах
    pub google_min_bytes: usize,
    /// Пауза после каждого обращения к облачному движку
    pub google_cooldown: Duration,
    /// Таймаут HTTP запроса
    pub request_timeout: Duration,
    /// Адрес API ElevenLabs
    pub eleven_base_url: String,
    /// Модель ElevenLabs
    pub eleven_model_id: String,
    /// Исполняемый файл локального движка
    pub espeak_program: String,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            google_base_url: "https://translate.google.com".to_string(),
            google_retries: 5,
            google_min_bytes: 1024,
            google_cooldown: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
            eleven_base_url: "https://api.elevenlabs.io".to_string(),
            eleven_model_id: "eleven_turbo_v2_5".to_string(),
            espeak_program: "espeak-ng".to_string(),
        }
    }
}
