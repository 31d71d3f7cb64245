//! Модуль движков синтеза речи
//!
//! Каждый движок реализует [`SpeechBackend`]: синтезирует один фрагмент
//! текста во временный файл. Декодирование и удаление файла - забота
//! оркестратора. Движок выбирается один раз при старте запуска.

use std::path::Path;

use async_trait::async_trait;
use log::info;

use crate::config::{BackendOptions, EngineKind, GenerationRequest};
use crate::error::{Result, SpeakVaultError};

#[cfg(feature = "elevenlabs")]
pub mod elevenlabs;
pub mod espeak;
pub mod google;

#[cfg(feature = "elevenlabs")]
pub use elevenlabs::ElevenLabsBackend;
pub use espeak::EspeakBackend;
pub use google::GoogleTtsBackend;

/// Движок синтеза речи
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Короткое имя для журнала
    fn name(&self) -> &str;

    /// Расширение временного файла, который пишет движок
    fn temp_extension(&self) -> &str;

    /// Синтезировать `text` в файл `target`
    ///
    /// Ошибка относится только к этому фрагменту: оркестратор пропускает его
    /// и продолжает.
    async fn synthesize(&self, text: &str, target: &Path) -> Result<()>;
}

/// Выбрать движок по запросу
///
/// Недоступный движок или отсутствующие учетные данные - фатальная ошибка
/// конфигурации, запуск не начинается.
pub fn select_backend(request: &GenerationRequest, options: &BackendOptions) -> Result<Box<dyn SpeechBackend>> {
    let backend: Box<dyn SpeechBackend> = match request.engine {
        EngineKind::Google => Box::new(GoogleTtsBackend::new(&request.language, options)?),
        EngineKind::Espeak => {
            let voice = if request.voice_id.trim().is_empty() {
                request.language.clone()
            } else {
                request.voice_id.trim().to_string()
            };
            Box::new(EspeakBackend::new(&options.espeak_program, voice))
        }
        EngineKind::ElevenLabs => select_elevenlabs(request, options)?,
    };
    info!("Using TTS backend: {}", backend.name());
    Ok(backend)
}

#[cfg(feature = "elevenlabs")]
fn select_elevenlabs(request: &GenerationRequest, options: &BackendOptions) -> Result<Box<dyn SpeechBackend>> {
    if request.eleven_api_key.trim().is_empty() {
        return Err(SpeakVaultError::Configuration("ElevenLabs API key is missing".to_string()));
    }
    if request.eleven_voice_id.trim().is_empty() {
        return Err(SpeakVaultError::Configuration("ElevenLabs voice id is missing".to_string()));
    }
    Ok(Box::new(ElevenLabsBackend::new(
        request.eleven_api_key.trim(),
        request.eleven_voice_id.trim(),
        request.format,
        options,
    )?))
}

#[cfg(not(feature = "elevenlabs"))]
fn select_elevenlabs(_request: &GenerationRequest, _options: &BackendOptions) -> Result<Box<dyn SpeechBackend>> {
    Err(SpeakVaultError::Configuration(
        "ElevenLabs support is not compiled in (enable the `elevenlabs` feature)".to_string(),
    ))
}
