//! Вспомогательные модули

pub mod ffmpeg;
pub mod temp;

use crate::error::{Result, SpeakVaultError};

/// Выполнить тяжелую синхронную работу (декодирование, ресемплинг, экспорт)
/// вне потоков асинхронного рантайма
pub async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SpeakVaultError::AudioProcessing(format!("Worker task failed: {}", e)))?
}
