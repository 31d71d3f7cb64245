//! Модуль для работы с аудио: фрагменты, кодеки, преобразования и сборка

pub mod assembly;
pub mod codec;
pub mod fragment;
pub mod transform;

pub use assembly::{numbered_file_name, sequential_path, MergeAccumulator, SplitWriter};
pub use fragment::AudioFragment;
pub use transform::gain_offset_db;
