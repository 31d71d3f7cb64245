//! Пакетная обработка готовых аудиофайлов
//!
//! Для каждого файла: обрезка, удаление тишины, темп, высота и громкость,
//! затем запись в `output2 (<n>).<ext>`. Ошибка в одном файле не
//! останавливает обработку остальных.

use std::path::PathBuf;

use log::{error, info};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::{OutputFormat, TransformParams, BATCH_PREFIX};
use crate::error::Result;
use crate::generator::check_output_dir;
use crate::media::{codec, sequential_path, transform, AudioFragment};
use crate::progress::{ProgressObserver, RunEvent, RunStatus};
use crate::utils::run_blocking;

/// Минимальная длина паузы, которая вырезается
pub const MIN_SILENCE_MS: u64 = 400;
/// Порог тишины относительно средней громкости файла
pub const SILENCE_OFFSET_DB: f32 = 24.0;
/// Сколько тишины оставить по краям звучащих кусков
pub const KEEP_SILENCE_MS: u64 = 50;
/// Запас при пиковой нормализации
const NORMALIZE_HEADROOM_DB: f32 = 0.1;

/// Параметры пакетной обработки
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub files: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub format: OutputFormat,
    pub transform: TransformParams,
    /// Удалить паузы
    pub remove_silence: bool,
    /// Начало обрезки в секундах, 0 = с начала
    pub trim_start_s: f64,
    /// Конец обрезки в секундах, 0 = до конца
    pub trim_end_s: f64,
}

impl BatchRequest {
    pub fn new(files: Vec<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            files,
            output_dir: output_dir.into(),
            format: OutputFormat::default(),
            transform: TransformParams::default(),
            remove_silence: false,
            trim_start_s: 0.0,
            trim_end_s: 0.0,
        }
    }
}

/// Итог пакетной обработки
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub status: RunStatus,
    pub files: Vec<PathBuf>,
    /// Файлы, которые не удалось обработать, с причиной
    pub failed: Vec<(PathBuf, String)>,
}

/// Обработать все файлы по очереди
pub async fn run_batch(
    request: &BatchRequest,
    observer: &dyn ProgressObserver,
    cancel: &CancellationToken,
) -> Result<BatchReport> {
    check_output_dir(&request.output_dir)?;
    let total = request.files.len();
    observer.on_event(&RunEvent::Started { units: total });

    let mut files = Vec::new();
    let mut failed = Vec::new();

    for (i, path) in request.files.iter().enumerate() {
        if cancel.is_cancelled() {
            info!("Batch cancelled after {} of {} files", i, total);
            observer.on_event(&RunEvent::Cancelled { saved: None });
            return Ok(BatchReport {
                status: RunStatus::Cancelled,
                files,
                failed,
            });
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        observer.on_event(&RunEvent::Message(format!("[{}/{}] Opening: {}", i + 1, total, name)));

        let job = request.clone();
        let input = path.clone();
        match run_blocking(move || process_file(&job, &input)).await {
            Ok(output) => {
                observer.on_event(&RunEvent::Saved { path: output.clone() });
                files.push(output);
            }
            Err(e) => {
                error!("Batch processing of {} failed: {}", path.display(), e);
                observer.on_event(&RunEvent::Message(format!("Error: {}: {}", name, e)));
                failed.push((path.clone(), e.to_string()));
            }
        }
    }

    observer.on_event(&RunEvent::Completed {
        files: files.clone(),
        last_file: files.last().cloned(),
    });
    Ok(BatchReport {
        status: RunStatus::Completed,
        files,
        failed,
    })
}

/// Обработать один файл и записать результат
pub fn process_file(request: &BatchRequest, input: &std::path::Path) -> Result<PathBuf> {
    let mut audio = codec::decode_file(input)?;

    if request.trim_start_s > 0.0 || request.trim_end_s > 0.0 {
        audio = trim(&audio, request.trim_start_s, request.trim_end_s);
    }
    if request.remove_silence {
        audio = remove_silence(audio);
    }
    audio = transform::apply(audio, &request.transform)?;

    let (output, _) = sequential_path(&request.output_dir, BATCH_PREFIX, request.format.extension(), 1);
    codec::export(&audio, &output, request.format)?;
    info!("Batch output written: {}", output.display());
    Ok(output)
}

/// Обрезать по секундам; нулевой конец означает конец файла
pub fn trim(audio: &AudioFragment, start_s: f64, end_s: f64) -> AudioFragment {
    let start_ms = (start_s.max(0.0) * 1000.0) as u64;
    let end_ms = if end_s > 0.0 {
        (end_s * 1000.0) as u64
    } else {
        audio.duration_ms()
    };
    audio.slice_ms(start_ms, end_ms)
}

/// Нормализовать и вырезать паузы; без найденных кусков аудио не меняется
pub fn remove_silence(audio: AudioFragment) -> AudioFragment {
    let audio = transform::normalize(audio, NORMALIZE_HEADROOM_DB);
    let threshold = audio.dbfs() - SILENCE_OFFSET_DB;
    let chunks = transform::split_on_silence(&audio, MIN_SILENCE_MS, threshold, KEEP_SILENCE_MS);
    if chunks.is_empty() {
        return audio;
    }

    let mut joined = AudioFragment::empty(audio.sample_rate, audio.channels);
    for chunk in &chunks {
        joined.samples.extend_from_slice(&chunk.samples);
    }
    info!("Removed silence: {} chunk(s) kept", chunks.len());
    joined
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(ms: u64) -> AudioFragment {
        let frames = (ms * 8) as usize;
        AudioFragment::new(
            (0..frames).map(|i| if i % 8 < 4 { 0.3 } else { -0.3 }).collect(),
            8000,
            1,
        )
    }

    #[test]
    fn test_trim() {
        let audio = tone(2000);
        assert_eq!(trim(&audio, 0.5, 0.0).duration_ms(), 1500);
        assert_eq!(trim(&audio, 0.5, 1.0).duration_ms(), 500);
        assert_eq!(trim(&audio, 0.0, 0.25).duration_ms(), 250);
    }

    #[test]
    fn test_remove_silence_drops_long_pause() {
        let mut audio = tone(500);
        audio.append(&AudioFragment::silent(1000, 8000, 1)).unwrap();
        audio.append(&tone(500)).unwrap();

        let cleaned = remove_silence(audio);
        // 500 + 50 ms с каждой стороны паузы
        assert_eq!(cleaned.duration_ms(), 1100);
    }
}
