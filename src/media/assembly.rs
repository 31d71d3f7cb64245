//! Сборка результата и именование файлов
//!
//! Файлы именуются как `<prefix> (<n>).<ext>`. Номер подбирается по файловой
//! системе, поэтому существующие файлы никогда не перезаписываются.

use std::path::{Path, PathBuf};

use log::info;

use crate::config::OutputFormat;
use crate::error::Result;
use crate::media::codec;
use crate::media::fragment::AudioFragment;

/// Имя файла с номером
pub fn numbered_file_name(prefix: &str, n: u32, extension: &str) -> String {
    format!("{} ({}).{}", prefix, n, extension)
}

/// Найти наименьший свободный номер, начиная с `start`
///
/// Возвращает путь и выбранный номер. Проверка идет по диску в момент вызова.
pub fn sequential_path(dir: &Path, prefix: &str, extension: &str, start: u32) -> (PathBuf, u32) {
    let mut n = start.max(1);
    loop {
        let path = dir.join(numbered_file_name(prefix, n, extension));
        if !path.exists() {
            return (path, n);
        }
        n += 1;
    }
}

/// Накопитель режима склейки
#[derive(Debug, Clone)]
pub struct MergeAccumulator {
    stream: AudioFragment,
    fragments: usize,
}

impl Default for MergeAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl MergeAccumulator {
    pub fn new() -> Self {
        Self {
            stream: AudioFragment::empty(0, 1),
            fragments: 0,
        }
    }

    /// Дописать фрагмент в конец потока
    pub fn push(&mut self, fragment: &AudioFragment) -> Result<()> {
        self.stream.append(fragment)?;
        self.fragments += 1;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.stream.is_empty()
    }

    /// Количество принятых фрагментов
    pub fn len(&self) -> usize {
        self.fragments
    }

    pub fn duration_ms(&self) -> u64 {
        self.stream.duration_ms()
    }

    pub fn stream(&self) -> &AudioFragment {
        &self.stream
    }

    /// Заменить поток целиком (например, после растяжения)
    pub fn replace_stream(&mut self, stream: AudioFragment) {
        self.stream = stream;
    }

    /// Записать накопленный поток в `<prefix> (<n>).<ext>`
    ///
    /// Пустой поток ничего не создает и возвращает `None`.
    pub fn finalize(&self, dir: &Path, prefix: &str, format: OutputFormat) -> Result<Option<PathBuf>> {
        if self.is_empty() {
            return Ok(None);
        }
        let (path, _) = sequential_path(dir, prefix, format.extension(), 1);
        codec::export(&self.stream, &path, format)?;
        info!(
            "Merged {} fragment(s), {} ms, into {}",
            self.fragments,
            self.stream.duration_ms(),
            path.display()
        );
        Ok(Some(path))
    }
}

/// Запись каждого фрагмента в отдельный файл
#[derive(Debug, Clone)]
pub struct SplitWriter {
    dir: PathBuf,
    prefix: String,
    format: OutputFormat,
    /// Подсказка для следующего номера
    next: u32,
    written: Vec<PathBuf>,
}

impl SplitWriter {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, format: OutputFormat) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            format,
            next: 1,
            written: Vec::new(),
        }
    }

    /// Записать фрагмент под следующим свободным номером
    pub fn write(&mut self, fragment: &AudioFragment) -> Result<PathBuf> {
        let (path, n) = sequential_path(&self.dir, &self.prefix, self.format.extension(), self.next);
        codec::export(fragment, &path, self.format)?;
        self.next = n + 1;
        self.written.push(path.clone());
        Ok(path)
    }

    /// Записанные файлы по порядку
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}
