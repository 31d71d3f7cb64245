//! Модуль обработки ошибок библиотеки speakvault
//!
//! Ошибки делятся на фатальные (запуск прерывается до или в момент старта)
//! и восстановимые (пропускается один фрагмент, цикл продолжается).

use thiserror::Error;

/// Серьезность ошибки с точки зрения оркестратора
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Прервать запуск
    Fatal,
    /// Записать в журнал и продолжить
    Recoverable,
}

/// Ошибки библиотеки speakvault
#[derive(Debug, Error)]
pub enum SpeakVaultError {
    /// Неверная конфигурация или недоступный движок
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Папка вывода не выбрана или не существует
    #[error("Output directory is not usable: {0}")]
    OutputDirectory(String),

    /// Исходный файл не удалось прочитать
    #[error("Source file error: {0}")]
    SourceFile(String),

    /// Движок не смог синтезировать фрагмент
    #[error("Speech synthesis error: {0}")]
    Synthesis(String),

    /// Не удалось декодировать аудио
    #[error("Audio decode error: {0}")]
    AudioDecode(String),

    /// Ошибка обработки аудио
    #[error("Audio processing error: {0}")]
    AudioProcessing(String),

    /// Ошибка записи результата
    #[error("Export error: {0}")]
    Export(String),

    /// Ошибка внешнего процесса FFmpeg
    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),

    /// Ошибка HTTP запроса
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Ошибка ввода-вывода
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка сериализации/десериализации JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Ошибка чтения или записи WAV
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// Ошибка разбора CSV
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Другая ошибка
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SpeakVaultError {
    /// Классифицировать ошибку для решения "прервать или пропустить"
    pub fn severity(&self) -> Severity {
        match self {
            Self::Configuration(_) | Self::OutputDirectory(_) | Self::SourceFile(_) => Severity::Fatal,
            _ => Severity::Recoverable,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl From<&str> for SpeakVaultError {
    fn from(s: &str) -> Self {
        SpeakVaultError::Other(anyhow::anyhow!(s.to_string()))
    }
}

impl From<String> for SpeakVaultError {
    fn from(s: String) -> Self {
        SpeakVaultError::Other(anyhow::anyhow!(s))
    }
}

/// Тип Result для библиотеки speakvault
pub type Result<T> = std::result::Result<T, SpeakVaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_split() {
        assert!(SpeakVaultError::OutputDirectory("missing".into()).is_fatal());
        assert!(SpeakVaultError::SourceFile("unreadable".into()).is_fatal());
        assert!(SpeakVaultError::Configuration("no key".into()).is_fatal());
        assert_eq!(
            SpeakVaultError::Synthesis("empty payload".into()).severity(),
            Severity::Recoverable
        );
        assert_eq!(
            SpeakVaultError::Export("disk full".into()).severity(),
            Severity::Recoverable
        );
    }
}
