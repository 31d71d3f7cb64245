//! Модуль для работы с временными файлами
//!
//! Каждый запуск получает свою временную директорию. Промежуточные файлы
//! движков удаляются сразу после декодирования, директория - при завершении.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use tempfile::TempDir;

use crate::error::Result;

/// Менеджер временных файлов одного запуска
pub struct TempFileManager {
    temp_dir: TempDir,
    /// Файлы, которые еще не удалены
    files: Vec<PathBuf>,
}

impl TempFileManager {
    pub fn new() -> Result<Self> {
        let temp_dir = tempfile::Builder::new().prefix("speakvault_").tempdir()?;
        debug!("Temporary directory: {}", temp_dir.path().display());
        Ok(Self {
            temp_dir,
            files: Vec::new(),
        })
    }

    /// Зарезервировать уникальный путь под промежуточный файл фрагмента
    ///
    /// Файл не создается: его пишет движок.
    pub fn chunk_path(&mut self, label: &str, part: usize, extension: &str) -> PathBuf {
        let safe_label: String = label
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let file_name = format!("chunk_{}_{}_{}.{}", safe_label, part, uuid::Uuid::new_v4(), extension);
        let path = self.temp_dir.path().join(file_name);
        self.files.push(path.clone());
        path
    }

    /// Удалить промежуточный файл, если он существует
    pub fn release(&mut self, path: &Path) {
        if path.exists() {
            if let Err(e) = fs::remove_file(path) {
                debug!("Failed to remove {}: {}", path.display(), e);
            }
        }
        self.files.retain(|p| p != path);
    }

    /// Получить путь к временной директории
    pub fn temp_dir_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Количество неудаленных файлов
    pub fn pending(&self) -> usize {
        self.files.iter().filter(|p| p.exists()).count()
    }

    /// Удалить все оставшиеся файлы
    pub fn cleanup(&mut self) {
        for file in std::mem::take(&mut self.files) {
            if file.exists() {
                let _ = fs::remove_file(&file);
            }
        }
    }
}

impl Drop for TempFileManager {
    fn drop(&mut self) {
        self.cleanup();
    }
}
