//! Библиотека speakvault: озвучивание текстовых файлов
//!
//! Превращает обычный текст, CSV или субтитры SRT в синтезированную речь,
//! с постобработкой темпа, высоты и громкости, и собирает результат в один
//! или несколько файлов.
//!
//! ```no_run
//! use speakvault::{generate_audio, GenerationRequest, notification::ConsoleProgressObserver};
//!
//! # async fn example() -> speakvault::Result<()> {
//! let mut request = GenerationRequest::new("lines.txt", "audio_output");
//! request.merge = true;
//! let report = generate_audio(request, Box::new(ConsoleProgressObserver::new())).await?;
//! println!("{:?}", report.last_file);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod event_log;
pub mod generator;
pub mod media;
pub mod notification;
pub mod progress;
pub mod settings;
pub mod text;
pub mod tts;
pub mod utils;

pub use batch::{run_batch, BatchReport, BatchRequest};
pub use config::{BackendOptions, EngineKind, GenerationRequest, LineRange, OutputFormat, TransformParams};
pub use error::{Result, Severity, SpeakVaultError};
pub use event_log::EventLog;
pub use generator::{ChunkOutcome, GenerationHandle, Generator, RunReport};
pub use progress::{ProgressObserver, ProgressReporter, RunEvent, RunState, RunStatus};
pub use settings::Settings;
pub use tts::SpeechBackend;

/// Выполнить генерацию с настройками движков по умолчанию
pub async fn generate_audio(request: GenerationRequest, observer: Box<dyn ProgressObserver>) -> Result<RunReport> {
    Generator::new(request).with_observer(observer).run().await
}
