//! Модуль для работы с текстом: разбор входных файлов и разбиение на фрагменты

pub mod parser;
pub mod segmenter;

pub use parser::{parse_file, SourceFormat, TextUnit, Timing};
pub use segmenter::{segment, split_text, TextChunk};
