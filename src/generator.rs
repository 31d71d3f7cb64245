//! Оркестратор генерации речи
//!
//! Состояния запуска: `Idle -> Running -> {Completed, Cancelled, FailedFatal}`.
//! Внутри `Running` каждый фрагмент проходит `Synthesizing -> Transforming ->
//! Committing`. Фрагменты обрабатываются строго по очереди.
//!
//! Остановка кооперативная: токен проверяется только в начале фрагмента,
//! уже отправленный в движок фрагмент доделывается. При остановке накопленное
//! в режиме склейки аудио записывается на диск.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{BackendOptions, GenerationRequest, OutputFormat, GENERATION_PREFIX};
use crate::error::{Result, SpeakVaultError};
use crate::event_log::EventLog;
use crate::media::{codec, transform, AudioFragment, MergeAccumulator, SplitWriter};
use crate::progress::{
    percent, preview, ChunkPhase, DefaultProgressReporter, ProgressObserver, ProgressReporter, RunEvent, RunState,
    RunStatus,
};
use crate::text::{parse_file, segment, TextChunk, TextUnit};
use crate::tts::{select_backend, SpeechBackend};
use crate::utils::ffmpeg;
use crate::utils::run_blocking;
use crate::utils::temp::TempFileManager;

/// Тишина после субтитра в режиме отдельных файлов
pub const SUBTITLE_SILENCE_MS: u64 = 1000;

/// Итог обработки одного фрагмента
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutcome {
    /// Фрагмент принят; путь есть, если записан отдельный файл
    Committed(Option<PathBuf>),
    /// Фрагмент пропущен из-за восстановимой ошибки
    Skipped(String),
}

/// Отчет о завершенном запуске
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub status: RunStatus,
    /// Записанные файлы по порядку
    pub files: Vec<PathBuf>,
    pub last_file: Option<PathBuf>,
    /// Количество пропущенных фрагментов
    pub skipped: usize,
    pub state: RunState,
}

enum Assembly {
    Merge(MergeAccumulator),
    Split(SplitWriter),
}

/// Генератор: один запуск по одному запросу
pub struct Generator {
    request: GenerationRequest,
    options: BackendOptions,
    backend: Option<Box<dyn SpeechBackend>>,
    reporter: Box<dyn ProgressReporter>,
    event_log: Arc<EventLog>,
    cancel: CancellationToken,
    status: RunStatus,
}

impl Generator {
    pub fn new(request: GenerationRequest) -> Self {
        Self {
            request,
            options: BackendOptions::default(),
            backend: None,
            reporter: Box::new(DefaultProgressReporter::new()),
            event_log: Arc::new(EventLog::new()),
            cancel: CancellationToken::new(),
            status: RunStatus::Idle,
        }
    }

    pub fn with_options(mut self, options: BackendOptions) -> Self {
        self.options = options;
        self
    }

    /// Использовать готовый движок вместо выбора по запросу
    pub fn with_backend(mut self, backend: Box<dyn SpeechBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_reporter(mut self, reporter: Box<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_observer(mut self, observer: Box<dyn ProgressObserver>) -> Self {
        self.reporter.add_observer(observer);
        self
    }

    pub fn with_event_log(mut self, event_log: Arc<EventLog>) -> Self {
        self.event_log = event_log;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn event_log(&self) -> Arc<EventLog> {
        self.event_log.clone()
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn request(&self) -> &GenerationRequest {
        &self.request
    }

    /// Запустить генерацию в отдельной задаче
    pub fn spawn(self) -> GenerationHandle {
        let cancel = self.cancel.clone();
        let event_log = self.event_log.clone();
        let task = tokio::spawn(async move {
            let mut generator = self;
            generator.run().await
        });
        GenerationHandle { cancel, event_log, task }
    }

    /// Выполнить запуск
    ///
    /// Фатальные ошибки возвращаются как `Err`, пропущенные фрагменты
    /// учитываются в отчете.
    pub async fn run(&mut self) -> Result<RunReport> {
        match self.execute().await {
            Ok(report) => {
                self.status = report.status;
                Ok(report)
            }
            Err(e) => {
                self.status = RunStatus::FailedFatal;
                error!("Generation failed: {}", e);
                self.event_log.record(format!("Generation failed: {}", e));
                self.reporter.notify(&RunEvent::Failed { error: e.to_string() });
                Err(e)
            }
        }
    }

    async fn execute(&mut self) -> Result<RunReport> {
        let request = self.request.clone();
        check_output_dir(&request.output_dir)?;
        self.status = RunStatus::Running;

        if request.format != OutputFormat::Wav && !ffmpeg::warn_if_missing() {
            self.event_log
                .record(format!("FFmpeg not found, {} export will fail", request.format));
        }

        let backend = match self.backend.take() {
            Some(backend) => backend,
            None => select_backend(&request, &self.options)?,
        };

        let all_units = parse_file(&request.source)?;
        let units = request.range.select(&all_units).to_vec();
        let total = units.len();
        info!(
            "Generating {} of {} units from {} with {}",
            total,
            all_units.len(),
            request.source.display(),
            backend.name()
        );

        let mut state = RunState {
            total,
            ..Default::default()
        };
        self.reporter.notify(&RunEvent::Started { units: total });
        self.event_log.record(format!(
            "Generation started: {} ({} units, {})",
            display_name(&request.source),
            total,
            backend.name()
        ));

        let mut temp = TempFileManager::new()
            .map_err(|e| SpeakVaultError::Configuration(format!("Cannot create temporary directory: {}", e)))?;
        let mut assembly = if request.merge {
            Assembly::Merge(MergeAccumulator::new())
        } else {
            Assembly::Split(SplitWriter::new(&request.output_dir, GENERATION_PREFIX, request.format))
        };
        let mut skipped = 0;

        for (i, unit) in units.iter().enumerate() {
            let chunks = segment(&unit.text, request.char_limit);
            let count = chunks.len();
            for chunk in &chunks {
                if self.cancel.is_cancelled() {
                    state.cancelled = true;
                    let files = self.flush_on_cancel(&request, assembly).await;
                    if let Some(last) = files.last() {
                        state.last_file = Some(last.clone());
                    }
                    self.reporter.notify(&RunEvent::Cancelled {
                        saved: if request.merge { files.last().cloned() } else { None },
                    });
                    info!("Generation cancelled after {} of {} units", state.processed, total);
                    return Ok(RunReport {
                        status: RunStatus::Cancelled,
                        last_file: state.last_file.clone(),
                        files,
                        skipped,
                        state,
                    });
                }

                self.reporter.notify(&RunEvent::Chunk {
                    percent: percent(i + 1, total),
                    label: unit.label.clone(),
                    part: chunk.part,
                    preview: preview(&chunk.text),
                });

                let outcome = self
                    .process_chunk(&*backend, &mut temp, &request, unit, chunk, chunk.part == count, &mut assembly)
                    .await;
                match outcome {
                    ChunkOutcome::Committed(Some(path)) => {
                        self.reporter.notify(&RunEvent::Saved { path: path.clone() });
                        state.last_file = Some(path);
                    }
                    ChunkOutcome::Committed(None) => {}
                    ChunkOutcome::Skipped(reason) => {
                        skipped += 1;
                        warn!("Skipping chunk {}.{}: {}", unit.label, chunk.part, reason);
                        self.event_log
                            .record(format!("Chunk {}.{} skipped: {}", unit.label, chunk.part, reason));
                        self.reporter.notify(&RunEvent::ChunkSkipped {
                            label: unit.label.clone(),
                            part: chunk.part,
                            reason,
                        });
                    }
                }
            }
            state.processed = i + 1;
        }
        temp.cleanup();

        let files = match assembly {
            Assembly::Split(writer) => writer.written().to_vec(),
            Assembly::Merge(mut merged) => {
                if request.global_stretch {
                    if let Some(target_ms) = units.last().and_then(|u| u.timing).map(|t| t.end_ms) {
                        merged = stretch_merged(merged, target_ms).await;
                    }
                }
                match export_merged(&request, merged).await {
                    Ok(Some(path)) => {
                        self.reporter.notify(&RunEvent::Saved { path: path.clone() });
                        state.last_file = Some(path.clone());
                        vec![path]
                    }
                    Ok(None) => Vec::new(),
                    Err(e) => {
                        error!("Failed to export merged audio: {}", e);
                        self.event_log.record(format!("Merge export failed: {}", e));
                        self.reporter
                            .notify(&RunEvent::Message(format!("Error while merging: {}", e)));
                        Vec::new()
                    }
                }
            }
        };

        match &state.last_file {
            Some(last) => self
                .event_log
                .record(format!("Generation finished: {}", display_name(last))),
            None => self.event_log.record("Generation finished without output"),
        }
        self.reporter.notify(&RunEvent::Completed {
            files: files.clone(),
            last_file: state.last_file.clone(),
        });
        info!("Generation completed: {} file(s), {} chunk(s) skipped", files.len(), skipped);

        Ok(RunReport {
            status: RunStatus::Completed,
            last_file: state.last_file.clone(),
            files,
            skipped,
            state,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_chunk(
        &self,
        backend: &dyn SpeechBackend,
        temp: &mut TempFileManager,
        request: &GenerationRequest,
        unit: &TextUnit,
        chunk: &TextChunk,
        last_of_unit: bool,
        assembly: &mut Assembly,
    ) -> ChunkOutcome {
        match self
            .try_chunk(backend, temp, request, unit, chunk, last_of_unit, assembly)
            .await
        {
            Ok(path) => ChunkOutcome::Committed(path),
            Err(e) => ChunkOutcome::Skipped(e.to_string()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn try_chunk(
        &self,
        backend: &dyn SpeechBackend,
        temp: &mut TempFileManager,
        request: &GenerationRequest,
        unit: &TextUnit,
        chunk: &TextChunk,
        last_of_unit: bool,
        assembly: &mut Assembly,
    ) -> Result<Option<PathBuf>> {
        self.phase(unit, chunk, ChunkPhase::Synthesizing);
        let temp_path = temp.chunk_path(&unit.label, chunk.part, backend.temp_extension());
        let decoded = match backend.synthesize(&chunk.text, &temp_path).await {
            Ok(()) => {
                let path = temp_path.clone();
                run_blocking(move || codec::decode_file(&path)).await
            }
            Err(e) => Err(e),
        };
        temp.release(&temp_path);
        let fragment = decoded?;

        self.phase(unit, chunk, ChunkPhase::Transforming);
        let params = request.transform;
        let mut fragment = if params.is_identity() {
            fragment
        } else {
            run_blocking(move || transform::apply(fragment, &params)).await?
        };
        if !request.merge && request.subtitle_silence && last_of_unit && unit.timing.is_some() {
            let silence = AudioFragment::silent(SUBTITLE_SILENCE_MS, fragment.sample_rate, fragment.channels);
            fragment.append(&silence)?;
        }

        self.phase(unit, chunk, ChunkPhase::Committing);
        match assembly {
            Assembly::Merge(merged) => {
                merged.push(&fragment)?;
                Ok(None)
            }
            Assembly::Split(writer) => {
                let mut next = writer.clone();
                let (next, path) = run_blocking(move || {
                    let path = next.write(&fragment)?;
                    Ok((next, path))
                })
                .await?;
                *writer = next;
                Ok(Some(path))
            }
        }
    }

    fn phase(&self, unit: &TextUnit, chunk: &TextChunk, phase: ChunkPhase) {
        debug!("{}.{}: {:?}", unit.label, chunk.part, phase);
        self.reporter.notify(&RunEvent::Phase {
            label: unit.label.clone(),
            part: chunk.part,
            phase,
        });
    }

    /// Сохранить то, что успели сделать до остановки
    async fn flush_on_cancel(&self, request: &GenerationRequest, assembly: Assembly) -> Vec<PathBuf> {
        match assembly {
            Assembly::Split(writer) => {
                self.event_log.record(format!(
                    "Generation stopped by user after {} file(s)",
                    writer.written().len()
                ));
                writer.written().to_vec()
            }
            Assembly::Merge(merged) => match export_merged(request, merged).await {
                Ok(Some(path)) => {
                    self.event_log
                        .record(format!("Partial generation saved: {}", display_name(&path)));
                    vec![path]
                }
                Ok(None) => {
                    self.event_log.record("Generation stopped by user, nothing to save");
                    Vec::new()
                }
                Err(e) => {
                    error!("Failed to save partial merged audio: {}", e);
                    self.event_log
                        .record(format!("Failed to save partial merged audio: {}", e));
                    Vec::new()
                }
            },
        }
    }
}

/// Управление запущенной генерацией
pub struct GenerationHandle {
    cancel: CancellationToken,
    event_log: Arc<EventLog>,
    task: JoinHandle<Result<RunReport>>,
}

impl GenerationHandle {
    /// Запросить остановку; вступает в силу перед следующим фрагментом
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            info!("Stop requested");
            self.event_log.record("Stop requested by user");
        }
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Дождаться завершения
    pub async fn join(self) -> Result<RunReport> {
        self.task
            .await
            .map_err(|e| SpeakVaultError::Other(anyhow::anyhow!("Generation task failed: {}", e)))?
    }
}

/// Папка вывода должна существовать до старта
pub fn check_output_dir(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() {
        return Err(SpeakVaultError::OutputDirectory("no output directory selected".to_string()));
    }
    if !dir.is_dir() {
        return Err(SpeakVaultError::OutputDirectory(format!(
            "{} does not exist or is not a directory",
            dir.display()
        )));
    }
    Ok(())
}

async fn export_merged(request: &GenerationRequest, merged: MergeAccumulator) -> Result<Option<PathBuf>> {
    let dir = request.output_dir.clone();
    let format = request.format;
    run_blocking(move || merged.finalize(&dir, GENERATION_PREFIX, format)).await
}

/// Подогнать склеенный поток под длительность субтитров; при ошибке поток не меняется
async fn stretch_merged(mut merged: MergeAccumulator, target_ms: u64) -> MergeAccumulator {
    if merged.is_empty() {
        return merged;
    }
    let stream = merged.stream().clone();
    match run_blocking(move || transform::stretch_to_duration(&stream, target_ms)).await {
        Ok(stretched) => merged.replace_stream(stretched),
        Err(e) => warn!("Global stretch skipped: {}", e),
    }
    merged
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
