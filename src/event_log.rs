//! Журнал событий процесса
//!
//! Хронологическая запись ошибок и завершений, независимая от журнала
//! конкретного запуска. Хранит только последние `capacity` записей.

use std::collections::VecDeque;

use chrono::{DateTime, Local};
use parking_lot::Mutex;

/// Емкость журнала по умолчанию
pub const DEFAULT_CAPACITY: usize = 250;

/// Одна запись журнала
#[derive(Debug, Clone)]
pub struct EventEntry {
    pub timestamp: DateTime<Local>,
    pub message: String,
}

impl EventEntry {
    /// Строка вида `[2024-05-01 12:00:00] сообщение`
    pub fn formatted(&self) -> String {
        format!("[{}] {}", self.timestamp.format("%Y-%m-%d %H:%M:%S"), self.message)
    }
}

/// Кольцевой буфер событий
#[derive(Debug)]
pub struct EventLog {
    entries: Mutex<VecDeque<EventEntry>>,
    capacity: usize,
}

impl EventLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Добавить запись, вытесняя самую старую при переполнении
    pub fn record(&self, message: impl Into<String>) {
        let entry = EventEntry {
            timestamp: Local::now(),
            message: message.into(),
        };
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Снимок записей от старых к новым
    pub fn entries(&self) -> Vec<EventEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Отформатированные строки для показа
    pub fn lines(&self) -> Vec<String> {
        self.entries.lock().iter().map(EventEntry::formatted).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}
