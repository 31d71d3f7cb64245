//! Модуль для разбора входных файлов
//!
//! Превращает файл в упорядоченную последовательность `TextUnit`.
//! Формат выбирается по расширению: `.csv`, `.srt`, остальное считается
//! обычным текстом (одна фраза на непустую строку).

use std::path::Path;

use encoding_rs::{UTF_8, WINDOWS_1250};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, SpeakVaultError};

static SRT_TIMING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+):(\d{1,2}):(\d{1,2})[,.](\d{1,3})\s*-->\s*(\d+):(\d{1,2}):(\d{1,2})[,.](\d{1,3})")
        .expect("valid SRT timing regex")
});

/// Временные метки субтитра в миллисекундах
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub start_ms: u64,
    pub end_ms: u64,
}

/// Единица текста для озвучивания
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextUnit {
    /// Номер строки или субтитра (с единицы), как текст
    pub label: String,
    /// Текст
    pub text: String,
    /// Тайминг, если источник - субтитры
    pub timing: Option<Timing>,
}

impl TextUnit {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
            timing: None,
        }
    }
}

/// Формат входного файла
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    PlainText,
    Csv,
    Subtitle,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_lowercase();
        match extension.as_str() {
            "csv" => Self::Csv,
            "srt" => Self::Subtitle,
            _ => Self::PlainText,
        }
    }
}

/// Разобрать файл в последовательность единиц текста
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Vec<TextUnit>> {
    let path = path.as_ref();
    let content = read_text_file(path)?;
    let units = match SourceFormat::from_path(path) {
        SourceFormat::PlainText => parse_plain_text(&content),
        SourceFormat::Csv => parse_csv(&content)?,
        SourceFormat::Subtitle => parse_srt(&content),
    };
    debug!("Parsed {} units from {}", units.len(), path.display());
    Ok(units)
}

/// Прочитать файл, подбирая кодировку
///
/// Ошибка открытия файла фатальна. Неподходящая кодировка - нет: любой
/// набор байтов декодируется.
pub fn read_text_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| {
        SpeakVaultError::SourceFile(format!("Failed to open {}: {}", path.display(), e))
    })?;
    Ok(decode_bytes(&bytes))
}

/// Декодировать байты: строгий UTF-8 (BOM отбрасывается), иначе cp1250
///
/// В cp1250 определен каждый байт, так что второй шаг всегда успешен.
/// Текст в ISO-8859-2 читается через него с ошибками в нескольких буквах.
pub fn decode_bytes(bytes: &[u8]) -> String {
    let input = bytes.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap_or(bytes);
    if let Some(text) = UTF_8.decode_without_bom_handling_and_without_replacement(input) {
        return text.into_owned();
    }

    debug!("Source is not UTF-8, decoding as {}", WINDOWS_1250.name());
    let (text, _) = WINDOWS_1250.decode_without_bom_handling(bytes);
    text.into_owned()
}

/// Обычный текст: каждая непустая строка - единица, метка = номер физической строки
pub fn parse_plain_text(content: &str) -> Vec<TextUnit> {
    content
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let text = line.trim();
            (!text.is_empty()).then(|| TextUnit::new((i + 1).to_string(), text))
        })
        .collect()
}

/// CSV: первый столбец каждой строки, пустые строки отбрасываются
pub fn parse_csv(content: &str) -> Result<Vec<TextUnit>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut units = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| SpeakVaultError::SourceFile(format!("Invalid CSV: {}", e)))?;
        let Some(first) = record.get(0) else { continue };
        let text = first.trim();
        if text.is_empty() {
            continue;
        }
        let label = record
            .position()
            .map(|pos| pos.line().to_string())
            .unwrap_or_else(|| (i + 1).to_string());
        units.push(TextUnit::new(label, text));
    }
    Ok(units)
}

/// Субтитры SRT: блоки `номер / тайминг / текст`, разделенные пустой строкой
pub fn parse_srt(content: &str) -> Vec<TextUnit> {
    let content = content.replace("\r\n", "\n").replace('\r', "\n");
    let mut units = Vec::new();
    let mut block: Vec<&str> = Vec::new();

    for line in content.lines() {
        if line.trim().is_empty() {
            if !block.is_empty() {
                if let Some(unit) = parse_srt_block(&block) {
                    units.push(unit);
                }
                block.clear();
            }
        } else {
            block.push(line);
        }
    }
    if !block.is_empty() {
        if let Some(unit) = parse_srt_block(&block) {
            units.push(unit);
        }
    }

    units
}

fn parse_srt_block(lines: &[&str]) -> Option<TextUnit> {
    if lines.len() < 2 {
        return None;
    }
    let label = lines[0].trim();
    if label.is_empty() || !label.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let timing = parse_srt_timing(lines[1])?;
    let text = lines[2..]
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<&str>>()
        .join(" ");

    Some(TextUnit {
        label: label.to_string(),
        text,
        timing: Some(timing),
    })
}

/// Разобрать строку вида `HH:MM:SS,mmm --> HH:MM:SS,mmm`
pub fn parse_srt_timing(line: &str) -> Option<Timing> {
    let caps = SRT_TIMING.captures(line)?;
    let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u64>().ok());
    let to_ms = |h: u64, m: u64, s: u64, ms: u64| (h * 3600 + m * 60 + s) * 1000 + ms;

    Some(Timing {
        start_ms: to_ms(field(1)?, field(2)?, field(3)?, field(4)?),
        end_ms: to_ms(field(5)?, field(6)?, field(7)?, field(8)?),
    })
}
