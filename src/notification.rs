//! Модуль для реализации системы уведомлений
//!
//! Конкретные наблюдатели для событий запуска: консоль, память, файл и
//! их комбинация.

use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::progress::{ProgressObserver, RunEvent};

/// Наблюдатель, выводящий строки прогресса в консоль
pub struct ConsoleProgressObserver {
    prefix: Option<String>,
}

impl ConsoleProgressObserver {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: Some(prefix.into()) }
    }
}

impl Default for ConsoleProgressObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for ConsoleProgressObserver {
    fn on_event(&self, event: &RunEvent) {
        // Смена подсостояния слишком подробна для консоли
        if matches!(event, RunEvent::Phase { .. }) {
            return;
        }
        let prefix = self.prefix.as_deref().unwrap_or("");
        println!("{}{}", prefix, event.to_line());
    }
}

/// Наблюдатель, сохраняющий события в памяти
#[derive(Clone, Default)]
pub struct MemoryProgressObserver {
    history: Arc<Mutex<Vec<RunEvent>>>,
}

impl MemoryProgressObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Получить историю событий
    pub fn history(&self) -> Vec<RunEvent> {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// История в виде строк журнала
    pub fn lines(&self) -> Vec<String> {
        self.history().iter().map(RunEvent::to_line).collect()
    }

    pub fn clear_history(&self) {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl ProgressObserver for MemoryProgressObserver {
    fn on_event(&self, event: &RunEvent) {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
    }
}

/// Наблюдатель, дописывающий строки прогресса в файл
pub struct FileProgressObserver {
    file_path: PathBuf,
}

impl FileProgressObserver {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self { file_path: file_path.into() }
    }
}

impl ProgressObserver for FileProgressObserver {
    fn on_event(&self, event: &RunEvent) {
        let log_entry = format!(
            "[{}] {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            event.to_line()
        );

        if let Ok(mut file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)
        {
            let _ = file.write_all(log_entry.as_bytes());
        }
    }
}

/// Комбинированный наблюдатель
#[derive(Default)]
pub struct CompositeProgressObserver {
    observers: Vec<Box<dyn ProgressObserver>>,
}

impl CompositeProgressObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) {
        self.observers.push(observer);
    }

    pub fn clear(&mut self) {
        self.observers.clear();
    }
}

impl ProgressObserver for CompositeProgressObserver {
    fn on_event(&self, event: &RunEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }
}
