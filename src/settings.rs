//! Файл настроек
//!
//! Плоский JSON-документ со значениями по умолчанию для запроса на
//! генерацию. Согласованность полей между собой не проверяется.

use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::{EngineKind, GenerationRequest, OutputFormat, TransformParams};
use crate::error::Result;
use crate::event_log::EventLog;

/// Имя файла настроек по умолчанию
pub const DEFAULT_SETTINGS_FILE: &str = "speakvault_settings.json";
/// Папка вывода по умолчанию
pub const DEFAULT_OUTPUT_DIR: &str = "audio_output";

/// Сохраняемые настройки
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: String,
    pub voice_id: String,
    pub eleven_api_key: String,
    pub eleven_voice_id: String,
    pub tempo: f32,
    pub pitch: f32,
    pub gain: f32,
    pub format: String,
    pub merge: bool,
    pub output_dir: String,
    /// Ключ файла совпадает с тем, что пишут прежние версии программы
    #[serde(rename = "srt_1s_ciszy", alias = "subtitle_silence")]
    pub subtitle_silence: bool,
    pub global_stretch: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            engine: EngineKind::default().to_string(),
            voice_id: String::new(),
            eleven_api_key: String::new(),
            eleven_voice_id: String::new(),
            tempo: 1.0,
            pitch: 1.0,
            gain: 1.0,
            format: OutputFormat::default().to_string(),
            merge: false,
            output_dir: DEFAULT_OUTPUT_DIR.to_string(),
            subtitle_silence: false,
            global_stretch: false,
        }
    }
}

impl Settings {
    /// Прочитать настройки; отсутствующий или испорченный файл дает значения по умолчанию
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&content) {
            Ok(settings) => {
                info!("Settings loaded from {}", path.display());
                settings
            }
            Err(e) => {
                warn!("Ignoring unreadable settings file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Записать настройки и отметить результат в журнале событий
    pub fn save<P: AsRef<Path>>(&self, path: P, event_log: &EventLog) -> Result<()> {
        let path = path.as_ref();
        let result: Result<()> = serde_json::to_string_pretty(self)
            .map_err(Into::into)
            .and_then(|json| std::fs::write(path, json).map_err(Into::into));
        match &result {
            Ok(()) => event_log.record(format!("Settings saved to: {}", path.display())),
            Err(e) => event_log.record(format!("Failed to save settings: {}", e)),
        }
        result
    }

    /// Запрос на генерацию с этими настройками
    ///
    /// Нераспознанные движок или формат заменяются значениями по умолчанию.
    pub fn to_request(&self, source: impl Into<PathBuf>) -> GenerationRequest {
        let mut request = GenerationRequest::new(source, &self.output_dir);
        request.engine = self.engine.parse().unwrap_or_else(|_| {
            warn!("Unknown engine '{}' in settings, using {}", self.engine, EngineKind::default());
            EngineKind::default()
        });
        request.format = self.format.parse().unwrap_or_else(|_| {
            warn!("Unknown format '{}' in settings, using {}", self.format, OutputFormat::default());
            OutputFormat::default()
        });
        request.merge = self.merge;
        request.transform = TransformParams {
            tempo: self.tempo,
            pitch: self.pitch,
            gain: self.gain,
        };
        request.voice_id = self.voice_id.clone();
        request.eleven_api_key = self.eleven_api_key.clone();
        request.eleven_voice_id = self.eleven_voice_id.clone();
        request.subtitle_silence = self.subtitle_silence;
        request.global_stretch = self.global_stretch;
        request
    }

    /// Снять настройки с запроса
    pub fn from_request(request: &GenerationRequest) -> Self {
        Self {
            engine: request.engine.to_string(),
            voice_id: request.voice_id.clone(),
            eleven_api_key: request.eleven_api_key.clone(),
            eleven_voice_id: request.eleven_voice_id.clone(),
            tempo: request.transform.tempo,
            pitch: request.transform.pitch,
            gain: request.transform.gain,
            format: request.format.to_string(),
            merge: request.merge,
            output_dir: request.output_dir.to_string_lossy().to_string(),
            subtitle_silence: request.subtitle_silence,
            global_stretch: request.global_stretch,
        }
    }
}
