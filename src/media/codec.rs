//! # Audio Codec
//!
//! Декодирование промежуточных файлов движков и запись результата.
//!
//! - WAV читается и пишется через hound
//! - MP3, OGG/Vorbis, FLAC, AAC декодируются через symphonia
//! - Все, что symphonia не понимает (Opus от ElevenLabs), перекодируется в WAV через FFmpeg
//! - OGG и MP3 кодируются через FFmpeg: WAV подается на stdin

use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::{debug, warn};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::config::OutputFormat;
use crate::error::{Result, SpeakVaultError};
use crate::media::fragment::AudioFragment;
use crate::utils::ffmpeg;

/// Декодировать аудиофайл любого поддерживаемого формата
pub fn decode_file(path: &Path) -> Result<AudioFragment> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();

    let primary = if extension == "wav" {
        decode_wav(path).or_else(|e| {
            debug!("hound could not read {}: {}, trying symphonia", path.display(), e);
            decode_with_symphonia(path, &extension)
        })
    } else {
        decode_with_symphonia(path, &extension)
    };

    let fragment = match primary {
        Ok(fragment) => fragment,
        Err(e) => {
            warn!("Native decoding of {} failed ({}), falling back to FFmpeg", path.display(), e);
            decode_with_ffmpeg(path)?
        }
    };

    if fragment.is_empty() {
        return Err(SpeakVaultError::AudioDecode(format!(
            "{} contains no audio",
            path.display()
        )));
    }
    Ok(fragment)
}

/// Прочитать WAV через hound
pub fn decode_wav(path: &Path) -> Result<AudioFragment> {
    let reader = WavReader::open(path)?;
    read_wav(reader)
}

fn read_wav<R: std::io::Read>(reader: WavReader<R>) -> Result<AudioFragment> {
    let spec = reader.spec();
    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.into_samples::<f32>().collect::<std::result::Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };
    Ok(AudioFragment::new(samples, spec.sample_rate, spec.channels))
}

/// Декодировать через symphonia, каналы сохраняются
pub fn decode_with_symphonia(path: &Path, extension: &str) -> Result<AudioFragment> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if !extension.is_empty() {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| SpeakVaultError::AudioDecode(format!("Unrecognized audio format: {}", e)))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| SpeakVaultError::AudioDecode("No audio track found".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| SpeakVaultError::AudioDecode(format!("Unsupported codec: {}", e)))?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(0);
    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(SpeakVaultError::AudioDecode(format!("Failed to read packet: {}", e))),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count();
                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping corrupt packet in {}: {}", path.display(), e);
            }
            Err(e) => return Err(SpeakVaultError::AudioDecode(format!("Decoding failed: {}", e))),
        }
    }

    if sample_rate == 0 || channels == 0 {
        return Err(SpeakVaultError::AudioDecode("Unknown sample rate or channel layout".to_string()));
    }
    debug!("Decoded {} samples at {} Hz, {} channel(s)", samples.len(), sample_rate, channels);
    Ok(AudioFragment::new(samples, sample_rate, channels as u16))
}

/// Перекодировать в WAV во временный файл рядом и прочитать его
fn decode_with_ffmpeg(path: &Path) -> Result<AudioFragment> {
    let wav_path = path.with_extension("decoded.wav");
    let result = ffmpeg::convert_to_wav(path, &wav_path)
        .map_err(|e| SpeakVaultError::AudioDecode(format!("{}", e)))
        .and_then(|_| decode_wav(&wav_path));
    if wav_path.exists() {
        let _ = std::fs::remove_file(&wav_path);
    }
    result
}

/// Закодировать фрагмент в WAV PCM 16 бит в памяти
pub fn encode_wav_bytes(fragment: &AudioFragment) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: fragment.channels,
        sample_rate: fragment.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for sample in &fragment.samples {
            writer.write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Записать фрагмент в файл заданного формата
///
/// При ошибке недописанный файл удаляется.
pub fn export(fragment: &AudioFragment, path: &Path, format: OutputFormat) -> Result<()> {
    export_with(fragment, path, format, &ffmpeg::ffmpeg_program())
}

/// То же с явным путем к FFmpeg
pub fn export_with(fragment: &AudioFragment, path: &Path, format: OutputFormat, ffmpeg_program: &Path) -> Result<()> {
    let result = encode_to(fragment, path, format, ffmpeg_program);
    if result.is_err() && path.exists() {
        match std::fs::remove_file(path) {
            Ok(()) => debug!("Removed partial output {}", path.display()),
            Err(e) => warn!("Failed to remove partial output {}: {}", path.display(), e),
        }
    }
    result
}

fn encode_to(fragment: &AudioFragment, path: &Path, format: OutputFormat, ffmpeg_program: &Path) -> Result<()> {
    let wav = encode_wav_bytes(fragment)
        .map_err(|e| SpeakVaultError::Export(format!("Failed to encode {}: {}", path.display(), e)))?;

    match format {
        OutputFormat::Wav => std::fs::write(path, wav)
            .map_err(|e| SpeakVaultError::Export(format!("Failed to write {}: {}", path.display(), e))),
        OutputFormat::Mp3 => ffmpeg::encode_with(ffmpeg_program, &wav, path, &["-f", "mp3", "-b:a", "192k"])
            .map_err(|e| SpeakVaultError::Export(e.to_string())),
        OutputFormat::Ogg => ffmpeg::encode_with(ffmpeg_program, &wav, path, &["-f", "ogg"])
            .map_err(|e| SpeakVaultError::Export(e.to_string())),
    }
}
