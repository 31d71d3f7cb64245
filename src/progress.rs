//! Модуль для отслеживания прогресса выполнения операций
//!
//! Оркестратор сообщает о ходе запуска через события `RunEvent`, которые
//! рассылаются наблюдателям (паттерн Observer). Это единственный канал,
//! через который внешний интерфейс видит прогресс.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// Длина превью текста фрагмента в строке прогресса
pub const PREVIEW_CHARS: usize = 40;

/// Состояние запуска
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Idle,
    Running,
    Completed,
    Cancelled,
    FailedFatal,
}

/// Подсостояние цикла обработки фрагмента
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkPhase {
    Synthesizing,
    Transforming,
    Committing,
}

/// Событие запуска
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RunEvent {
    /// Запуск начат
    Started { units: usize },
    /// Начата обработка фрагмента
    Chunk {
        percent: u8,
        label: String,
        part: usize,
        preview: String,
    },
    /// Смена подсостояния текущего фрагмента
    Phase { label: String, part: usize, phase: ChunkPhase },
    /// Файл записан
    Saved { path: PathBuf },
    /// Фрагмент пропущен из-за восстановимой ошибки
    ChunkSkipped { label: String, part: usize, reason: String },
    /// Произвольное сообщение
    Message(String),
    /// Запуск завершен
    Completed { files: Vec<PathBuf>, last_file: Option<PathBuf> },
    /// Запуск остановлен пользователем
    Cancelled { saved: Option<PathBuf> },
    /// Фатальная ошибка
    Failed { error: String },
}

impl RunEvent {
    /// Человекочитаемая строка для журнала запуска
    pub fn to_line(&self) -> String {
        match self {
            Self::Started { units } => format!("Starting generation: {} units", units),
            Self::Chunk { percent, label, part, preview } => {
                format!("[{}%] {}.{}: {}", percent, label, part, preview)
            }
            Self::Phase { label, part, phase } => format!("{}.{}: {:?}", label, part, phase),
            Self::Saved { path } => format!("Saved: {}", file_name(path)),
            Self::ChunkSkipped { label, part, reason } => {
                format!("Skipped {}.{}: {}", label, part, reason)
            }
            Self::Message(msg) => msg.clone(),
            Self::Completed { files, last_file } => match last_file {
                Some(last) => format!("Done: {} file(s), last {}", files.len(), file_name(last)),
                None => "Done: nothing was written".to_string(),
            },
            Self::Cancelled { saved } => match saved {
                Some(path) => format!("Stopped by user, partial audio saved: {}", file_name(path)),
                None => "Stopped by user".to_string(),
            },
            Self::Failed { error } => format!("Error: {}", error),
        }
    }
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Первые `PREVIEW_CHARS` символов текста
pub fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

/// Процент обработанных единиц, как целое
pub fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done * 100) / total).min(100) as u8
}

/// Счетчики запуска
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunState {
    /// Обработано единиц текста
    pub processed: usize,
    /// Всего единиц текста в диапазоне
    pub total: usize,
    /// Последний записанный файл
    pub last_file: Option<PathBuf>,
    /// Запуск остановлен
    pub cancelled: bool,
}

/// Трейт для наблюдателя, получающего события запуска
pub trait ProgressObserver: Send + Sync {
    fn on_event(&self, event: &RunEvent);
}

/// Трейт для объекта, рассылающего события
pub trait ProgressReporter: Send + Sync {
    /// Добавить наблюдателя, вернуть его идентификатор
    fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize;

    /// Удалить наблюдателя по идентификатору
    fn remove_observer(&mut self, id: usize) -> Option<Box<dyn ProgressObserver>>;

    /// Уведомить всех наблюдателей
    fn notify(&self, event: &RunEvent);
}

/// Реализация ProgressReporter по умолчанию
pub struct DefaultProgressReporter {
    observers: RwLock<HashMap<usize, Box<dyn ProgressObserver>>>,
    next_id: AtomicUsize,
}

impl DefaultProgressReporter {
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(HashMap::new()),
            next_id: AtomicUsize::new(0),
        }
    }

    pub fn with_observer(observer: Box<dyn ProgressObserver>) -> Self {
        let mut reporter = Self::new();
        reporter.add_observer(observer);
        reporter
    }

    fn next_id(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

impl Default for DefaultProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for DefaultProgressReporter {
    fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize {
        let id = self.next_id();
        let observers = self.observers.get_mut().unwrap_or_else(|e| e.into_inner());
        observers.insert(id, observer);
        id
    }

    fn remove_observer(&mut self, id: usize) -> Option<Box<dyn ProgressObserver>> {
        let observers = self.observers.get_mut().unwrap_or_else(|e| e.into_inner());
        observers.remove(&id)
    }

    fn notify(&self, event: &RunEvent) {
        let observers = self.observers.read().unwrap_or_else(|e| e.into_inner());
        // Порядок вызова по возрастанию идентификатора
        let mut ids: Vec<&usize> = observers.keys().collect();
        ids.sort();
        for id in ids {
            if let Some(observer) = observers.get(id) {
                observer.on_event(event);
            }
        }
    }
}
