//! Модуль для работы с FFmpeg
//!
//! FFmpeg нужен для кодирования OGG/MP3 и как запасной декодер для
//! форматов, которые не читает symphonia (например, Opus).

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::{debug, warn};

use crate::error::{Result, SpeakVaultError};

const FFMPEG: &str = "ffmpeg";

/// Найти исполняемый файл FFmpeg в PATH
pub fn find_ffmpeg() -> Option<PathBuf> {
    which::which(FFMPEG).ok()
}

/// Путь для запуска: найденный в PATH или просто имя программы
pub fn ffmpeg_program() -> PathBuf {
    find_ffmpeg().unwrap_or_else(|| PathBuf::from(FFMPEG))
}

/// Проверка наличия FFmpeg
pub fn check_ffmpeg_installed() -> bool {
    let Some(program) = find_ffmpeg() else {
        return false;
    };
    match Command::new(program).arg("-version").output() {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

/// Получение версии FFmpeg
pub fn get_ffmpeg_version() -> Result<String> {
    let output = Command::new(ffmpeg_program())
        .arg("-version")
        .output()
        .map_err(|e| SpeakVaultError::Ffmpeg(format!("Failed to start ffmpeg: {}", e)))?;

    if !output.status.success() {
        return Err(SpeakVaultError::Ffmpeg("Failed to get FFmpeg version".to_string()));
    }

    let version_str = String::from_utf8_lossy(&output.stdout);
    Ok(version_str.lines().next().unwrap_or("").to_string())
}

/// Предупредить в журнал, если FFmpeg недоступен
pub fn warn_if_missing() -> bool {
    let installed = check_ffmpeg_installed();
    if !installed {
        warn!("FFmpeg not found in PATH: OGG/MP3 export and Opus decoding will fail");
    }
    installed
}

/// Запуск команды FFmpeg
pub fn run_ffmpeg_command(args: &[&str]) -> Result<()> {
    debug!("ffmpeg {}", args.join(" "));
    let output = Command::new(ffmpeg_program())
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| SpeakVaultError::Ffmpeg(format!("Failed to start ffmpeg: {}", e)))?;

    if !output.status.success() {
        return Err(SpeakVaultError::Ffmpeg(format!(
            "FFmpeg command failed with status {}: {}",
            output.status,
            last_line(&output.stderr)
        )));
    }

    Ok(())
}

/// Закодировать WAV из памяти в файл, формат определяется расширением `output`
pub fn encode_wav_bytes(wav: &[u8], output: &Path, extra_args: &[&str]) -> Result<()> {
    encode_with(&ffmpeg_program(), wav, output, extra_args)
}

/// То же с явным путем к программе
///
/// Процесс всегда дожидается завершения, даже если запись в stdin оборвалась.
pub fn encode_with(program: &Path, wav: &[u8], output: &Path, extra_args: &[&str]) -> Result<()> {
    let output_str = output.to_string_lossy();
    let mut args = vec!["-y", "-hide_banner", "-loglevel", "error", "-f", "wav", "-i", "pipe:0"];
    args.extend_from_slice(extra_args);
    args.push(output_str.as_ref());
    debug!("ffmpeg {}", args.join(" "));

    let mut child = Command::new(program)
        .args(&args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| SpeakVaultError::Ffmpeg(format!("Failed to start ffmpeg: {}", e)))?;

    let fed = match child.stdin.take() {
        Some(mut stdin) => stdin.write_all(wav),
        None => Ok(()),
    };

    let result = child
        .wait_with_output()
        .map_err(|e| SpeakVaultError::Ffmpeg(format!("ffmpeg did not finish: {}", e)))?;
    if !result.status.success() {
        return Err(SpeakVaultError::Ffmpeg(format!(
            "Encoding {} failed: {}",
            output.display(),
            last_line(&result.stderr)
        )));
    }
    fed.map_err(|e| SpeakVaultError::Ffmpeg(format!("Failed to feed ffmpeg: {}", e)))
}

/// Перекодировать произвольный файл в WAV PCM 16 бит
pub fn convert_to_wav(input: &Path, output: &Path) -> Result<()> {
    let input_str = input.to_string_lossy();
    let output_str = output.to_string_lossy();
    run_ffmpeg_command(&[
        "-y",
        "-hide_banner",
        "-loglevel",
        "error",
        "-i",
        &input_str,
        "-acodec",
        "pcm_s16le",
        &output_str,
    ])
}

fn last_line(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("no output")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_line_skips_blank() {
        assert_eq!(last_line(b"first\nInvalid data found\n\n"), "Invalid data found");
        assert_eq!(last_line(b""), "no output");
    }

    #[test]
    fn test_installed_only_when_found_in_path() {
        if find_ffmpeg().is_none() {
            assert!(!check_ffmpeg_installed());
            assert_eq!(ffmpeg_program(), PathBuf::from(FFMPEG));
        } else {
            assert!(ffmpeg_program().is_absolute());
        }
    }
}
