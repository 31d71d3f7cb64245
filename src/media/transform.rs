//! # Audio Transform
//!
//! Изменение темпа, высоты тона и громкости декодированного фрагмента.
//!
//! - **Темп** - ресемплинг с сохранением частоты дискретизации: длительность
//!   меняется в `tempo` раз, высота тона смещается вместе с ней.
//! - **Высота** - семплы переинтерпретируются на частоте `sample_rate * pitch`
//!   и ресемплируются обратно на исходную частоту.
//! - **Громкость** - сдвиг на `20 * (gain - 1)` дБ.
//!
//! Порядок применения: темп, высота, громкость.

use log::{debug, info};
use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};

use crate::config::TransformParams;
use crate::error::{Result, SpeakVaultError};
use crate::media::fragment::AudioFragment;

/// Размер блока ресемплера в кадрах
const RESAMPLER_CHUNK: usize = 1024;

/// Сдвиг громкости в дБ для множителя `gain`
///
/// Это не закон `20 * log10(gain)`: множитель 1.5 дает +10 дБ.
pub fn gain_offset_db(gain: f32) -> f32 {
    20.0 * (gain - 1.0)
}

/// Применить темп, высоту и громкость по порядку
pub fn apply(fragment: AudioFragment, params: &TransformParams) -> Result<AudioFragment> {
    let mut fragment = fragment;
    if params.tempo != 1.0 {
        fragment = apply_tempo(&fragment, params.tempo)?;
    }
    if params.pitch != 1.0 {
        fragment = apply_pitch(&fragment, params.pitch)?;
    }
    if params.gain != 1.0 {
        fragment = apply_gain_db(fragment, gain_offset_db(params.gain));
    }
    Ok(fragment)
}

/// Ускорить или замедлить фрагмент в `tempo` раз
pub fn apply_tempo(fragment: &AudioFragment, tempo: f32) -> Result<AudioFragment> {
    check_multiplier("tempo", tempo)?;
    if tempo == 1.0 || fragment.is_empty() {
        return Ok(fragment.clone());
    }
    debug!("Applying tempo {:.3} to {} frames", tempo, fragment.frames());
    let planar = resample_planar(&fragment.to_planar(), 1.0 / tempo as f64)?;
    Ok(AudioFragment::from_planar(&planar, fragment.sample_rate))
}

/// Сместить высоту тона переинтерпретацией частоты дискретизации
pub fn apply_pitch(fragment: &AudioFragment, pitch: f32) -> Result<AudioFragment> {
    check_multiplier("pitch", pitch)?;
    if pitch == 1.0 || fragment.is_empty() {
        return Ok(fragment.clone());
    }
    let spawned_rate = (fragment.sample_rate as f32 * pitch) as u32;
    if spawned_rate == 0 {
        return Err(SpeakVaultError::AudioProcessing(format!("Pitch {} is too low", pitch)));
    }
    debug!("Applying pitch {:.3}: {} Hz read as {} Hz", pitch, fragment.sample_rate, spawned_rate);
    let ratio = fragment.sample_rate as f64 / spawned_rate as f64;
    let planar = resample_planar(&fragment.to_planar(), ratio)?;
    Ok(AudioFragment::from_planar(&planar, fragment.sample_rate))
}

/// Сдвинуть громкость на `db` децибел с жестким ограничением [-1, 1]
pub fn apply_gain_db(mut fragment: AudioFragment, db: f32) -> AudioFragment {
    let factor = 10f32.powf(db / 20.0);
    for sample in fragment.samples.iter_mut() {
        *sample = (*sample * factor).clamp(-1.0, 1.0);
    }
    fragment
}

/// Перевести фрагмент на другую частоту дискретизации без изменения длительности
pub fn resample(fragment: &AudioFragment, target_rate: u32) -> Result<AudioFragment> {
    if target_rate == fragment.sample_rate || fragment.is_empty() {
        return Ok(AudioFragment::new(fragment.samples.clone(), target_rate, fragment.channels));
    }
    let ratio = target_rate as f64 / fragment.sample_rate as f64;
    let planar = resample_planar(&fragment.to_planar(), ratio)?;
    Ok(AudioFragment::from_planar(&planar, target_rate))
}

/// Подогнать длительность фрагмента под `target_ms`
pub fn stretch_to_duration(fragment: &AudioFragment, target_ms: u64) -> Result<AudioFragment> {
    let actual_ms = fragment.duration_ms();
    if target_ms == 0 || actual_ms == 0 {
        return Ok(fragment.clone());
    }
    let tempo = actual_ms as f32 / target_ms as f32;
    // Меньше 1% - без изменений
    if (tempo - 1.0).abs() < 0.01 {
        return Ok(fragment.clone());
    }
    info!("Stretching {} ms of audio to {} ms (tempo {:.3})", actual_ms, target_ms, tempo);
    apply_tempo(fragment, tempo)
}

/// Пиковая нормализация с запасом `headroom_db`
pub fn normalize(fragment: AudioFragment, headroom_db: f32) -> AudioFragment {
    let peak = fragment.peak();
    if peak <= 0.0 {
        return fragment;
    }
    let target = 10f32.powf(-headroom_db / 20.0);
    let db = 20.0 * (target / peak).log10();
    apply_gain_db(fragment, db)
}

/// Разрезать по тишине и склеить звучащие куски
///
/// Тишина - участок не короче `min_silence_ms`, громкость которого ниже
/// `silence_thresh_db`. Вокруг каждого звучащего куска оставляется
/// `keep_silence_ms`. Возвращает куски по порядку.
pub fn split_on_silence(
    fragment: &AudioFragment,
    min_silence_ms: u64,
    silence_thresh_db: f32,
    keep_silence_ms: u64,
) -> Vec<AudioFragment> {
    const STEP_MS: u64 = 10;
    let total_ms = fragment.duration_ms();
    if total_ms == 0 {
        return Vec::new();
    }

    // Громкость окон по STEP_MS
    let mut silent_windows = Vec::new();
    let mut start = 0;
    while start < total_ms {
        let end = (start + STEP_MS).min(total_ms);
        silent_windows.push(fragment.slice_ms(start, end).dbfs() < silence_thresh_db);
        start = end;
    }

    // Участки тишины достаточной длины
    let min_windows = (min_silence_ms / STEP_MS).max(1) as usize;
    let mut silences: Vec<(u64, u64)> = Vec::new();
    let mut run_start: Option<usize> = None;
    for (i, silent) in silent_windows.iter().chain(std::iter::once(&false)).enumerate() {
        match (*silent, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(s)) => {
                if i - s >= min_windows {
                    silences.push((s as u64 * STEP_MS, (i as u64 * STEP_MS).min(total_ms)));
                }
                run_start = None;
            }
            _ => {}
        }
    }

    // Звучащие участки - промежутки между тишиной
    let mut chunks = Vec::new();
    let mut cursor = 0u64;
    for (silence_start, silence_end) in silences.iter().copied().chain(std::iter::once((total_ms, total_ms))) {
        if silence_start > cursor {
            let from = cursor.saturating_sub(keep_silence_ms);
            let to = (silence_start + keep_silence_ms).min(total_ms);
            chunks.push(fragment.slice_ms(from, to));
        }
        cursor = silence_end;
    }
    chunks
}

fn check_multiplier(name: &str, value: f32) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(SpeakVaultError::AudioProcessing(format!(
            "{} multiplier must be positive, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Ресемплинг всех каналов с коэффициентом `ratio` (выход / вход)
fn resample_planar(planar: &[Vec<f32>], ratio: f64) -> Result<Vec<Vec<f32>>> {
    let channels = planar.len().max(1);
    let frames = planar.first().map(Vec::len).unwrap_or(0);
    if frames == 0 {
        return Ok(vec![Vec::new(); channels]);
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, RESAMPLER_CHUNK, channels)
        .map_err(|e| SpeakVaultError::AudioProcessing(format!("Resampler init failed: {}", e)))?;

    let expected = (frames as f64 * ratio).round() as usize;
    let delay = resampler.output_delay();
    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay); channels];

    let mut pos = 0;
    while pos + RESAMPLER_CHUNK <= frames {
        let block: Vec<&[f32]> = planar.iter().map(|ch| &ch[pos..pos + RESAMPLER_CHUNK]).collect();
        let out = resampler
            .process(&block, None)
            .map_err(|e| SpeakVaultError::AudioProcessing(format!("Resampling failed: {}", e)))?;
        extend_channels(&mut output, out);
        pos += RESAMPLER_CHUNK;
    }

    if pos < frames {
        let block: Vec<&[f32]> = planar.iter().map(|ch| &ch[pos..]).collect();
        let out = resampler
            .process_partial(Some(block.as_slice()), None)
            .map_err(|e| SpeakVaultError::AudioProcessing(format!("Resampling failed: {}", e)))?;
        extend_channels(&mut output, out);
    }

    // Дочитываем хвост, задержанный фильтром
    while output[0].len() < expected + delay {
        let out = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(|e| SpeakVaultError::AudioProcessing(format!("Resampling failed: {}", e)))?;
        if out.first().map_or(true, Vec::is_empty) {
            break;
        }
        extend_channels(&mut output, out);
    }

    for channel in output.iter_mut() {
        let skip = delay.min(channel.len());
        channel.drain(..skip);
        channel.truncate(expected);
    }
    Ok(output)
}

fn extend_channels(output: &mut [Vec<f32>], block: Vec<Vec<f32>>) {
    for (out, data) in output.iter_mut().zip(block) {
        out.extend(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(freq: f32, duration_ms: u64, sample_rate: u32, amplitude: f32) -> AudioFragment {
        let frames = (duration_ms * sample_rate as u64 / 1000) as usize;
        let samples = (0..frames)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin() * amplitude)
            .collect();
        AudioFragment::new(samples, sample_rate, 1)
    }

    #[test]
    fn test_gain_law() {
        assert!((gain_offset_db(1.5) - 10.0).abs() < 1e-6);
        assert_eq!(gain_offset_db(1.0), 0.0);
        assert!((gain_offset_db(0.5) + 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_gain_adds_ten_db() {
        let quiet = sine(440.0, 200, 16000, 0.05);
        let louder = apply(quiet.clone(), &TransformParams { gain: 1.5, ..Default::default() }).unwrap();
        let delta = louder.dbfs() - quiet.dbfs();
        assert!((delta - 10.0).abs() < 0.01, "delta was {}", delta);
        assert_eq!(louder.frames(), quiet.frames());
    }

    #[test]
    fn test_gain_clips() {
        let loud = AudioFragment::new(vec![0.9, -0.9], 8000, 1);
        let clipped = apply_gain_db(loud, 20.0);
        assert_eq!(clipped.samples, vec![1.0, -1.0]);
    }

    #[test]
    fn test_tempo_shortens_duration() {
        let fragment = sine(220.0, 1000, 16000, 0.5);
        let faster = apply_tempo(&fragment, 2.0).unwrap();
        assert_eq!(faster.sample_rate, 16000);
        assert!((faster.frames() as i64 - 8000).abs() <= 2, "frames {}", faster.frames());

        let slower = apply_tempo(&fragment, 0.5).unwrap();
        assert!((slower.frames() as i64 - 32000).abs() <= 2);
    }

    #[test]
    fn test_pitch_keeps_sample_rate() {
        let fragment = sine(220.0, 500, 16000, 0.5);
        let higher = apply_pitch(&fragment, 1.25).unwrap();
        assert_eq!(higher.sample_rate, 16000);
        assert!((higher.frames() as i64 - 6400).abs() <= 2, "frames {}", higher.frames());
    }

    #[test]
    fn test_identity_is_noop() {
        let fragment = sine(330.0, 100, 8000, 0.3);
        let same = apply(fragment.clone(), &TransformParams::default()).unwrap();
        assert_eq!(same, fragment);
    }

    #[test]
    fn test_rejects_non_positive_multiplier() {
        let fragment = sine(330.0, 100, 8000, 0.3);
        assert!(apply_tempo(&fragment, 0.0).is_err());
        assert!(apply_pitch(&fragment, -1.0).is_err());
    }

    #[test]
    fn test_resample_keeps_duration() {
        let fragment = sine(440.0, 500, 22050, 0.5);
        let resampled = resample(&fragment, 44100).unwrap();
        assert_eq!(resampled.sample_rate, 44100);
        assert!((resampled.duration_ms() as i64 - 500).abs() <= 1);
    }

    #[test]
    fn test_split_on_silence() {
        let mut audio = sine(440.0, 300, 8000, 0.5);
        audio.append(&AudioFragment::silent(600, 8000, 1)).unwrap();
        audio.append(&sine(440.0, 300, 8000, 0.5)).unwrap();

        let chunks = split_on_silence(&audio, 400, audio.dbfs() - 24.0, 50);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].duration_ms(), 350);
        assert_eq!(chunks[1].duration_ms(), 350);
    }

    #[test]
    fn test_normalize_peak() {
        let fragment = AudioFragment::new(vec![0.1, -0.4, 0.2], 8000, 1);
        let normalized = normalize(fragment, 0.0);
        assert!((normalized.peak() - 1.0).abs() < 1e-5);
        assert!((normalized.samples[0] - 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_stretch_to_duration() {
        let fragment = sine(220.0, 1000, 8000, 0.5);
        let stretched = stretch_to_duration(&fragment, 2000).unwrap();
        assert!((stretched.duration_ms() as i64 - 2000).abs() <= 1);
    }
}
