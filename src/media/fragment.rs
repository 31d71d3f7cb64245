//! Декодированный аудиофрагмент
//!
//! Семплы хранятся чередованием каналов (interleaved) в f32, диапазон [-1.0, 1.0].

use crate::error::Result;
use crate::media::transform;

/// Аудиофрагмент с метаданными
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFragment {
    /// Семплы PCM, каналы чередуются
    pub samples: Vec<f32>,
    /// Частота дискретизации в Гц
    pub sample_rate: u32,
    /// Количество каналов
    pub channels: u16,
}

impl AudioFragment {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels: channels.max(1),
        }
    }

    /// Пустой фрагмент заданного формата
    pub fn empty(sample_rate: u32, channels: u16) -> Self {
        Self::new(Vec::new(), sample_rate, channels)
    }

    /// Тишина длительностью `duration_ms`
    pub fn silent(duration_ms: u64, sample_rate: u32, channels: u16) -> Self {
        let frames = (duration_ms * sample_rate as u64 / 1000) as usize;
        Self::new(vec![0.0; frames * channels.max(1) as usize], sample_rate, channels)
    }

    /// Количество кадров (семплов на канал)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.frames() as u64 * 1000 / self.sample_rate as u64
    }

    /// Пиковая амплитуда
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    /// Среднеквадратичная громкость в dBFS
    pub fn dbfs(&self) -> f32 {
        if self.samples.is_empty() {
            return f32::NEG_INFINITY;
        }
        let sum: f64 = self.samples.iter().map(|s| (*s as f64) * (*s as f64)).sum();
        let rms = (sum / self.samples.len() as f64).sqrt();
        if rms <= 0.0 {
            f32::NEG_INFINITY
        } else {
            (20.0 * rms.log10()) as f32
        }
    }

    /// Разделить на каналы (planar)
    pub fn to_planar(&self) -> Vec<Vec<f32>> {
        let channels = self.channels as usize;
        let mut planar = vec![Vec::with_capacity(self.frames()); channels];
        for frame in self.samples.chunks_exact(channels) {
            for (ch, sample) in frame.iter().enumerate() {
                planar[ch].push(*sample);
            }
        }
        planar
    }

    /// Собрать из отдельных каналов
    pub fn from_planar(planar: &[Vec<f32>], sample_rate: u32) -> Self {
        let channels = planar.len().max(1);
        let frames = planar.iter().map(Vec::len).min().unwrap_or(0);
        let mut samples = Vec::with_capacity(frames * channels);
        for i in 0..frames {
            for channel in planar {
                samples.push(channel[i]);
            }
        }
        Self::new(samples, sample_rate, channels as u16)
    }

    /// Привести к заданному количеству каналов: сведение в моно или дублирование
    pub fn with_channels(&self, channels: u16) -> Self {
        let channels = channels.max(1);
        if channels == self.channels {
            return self.clone();
        }
        let src = self.channels as usize;
        let mut samples = Vec::with_capacity(self.frames() * channels as usize);
        for frame in self.samples.chunks_exact(src) {
            if channels == 1 {
                samples.push(frame.iter().sum::<f32>() / src as f32);
            } else {
                for ch in 0..channels as usize {
                    samples.push(frame[ch.min(src - 1)]);
                }
            }
        }
        Self::new(samples, self.sample_rate, channels)
    }

    /// Вырезать кусок по миллисекундам `[start_ms, end_ms)`
    pub fn slice_ms(&self, start_ms: u64, end_ms: u64) -> Self {
        let to_frame = |ms: u64| ((ms * self.sample_rate as u64 / 1000) as usize).min(self.frames());
        let (start, end) = (to_frame(start_ms), to_frame(end_ms));
        if start >= end {
            return Self::empty(self.sample_rate, self.channels);
        }
        let ch = self.channels as usize;
        Self::new(self.samples[start * ch..end * ch].to_vec(), self.sample_rate, self.channels)
    }

    /// Дописать фрагмент в конец, приводя его к формату текущего
    pub fn append(&mut self, other: &AudioFragment) -> Result<()> {
        if other.is_empty() {
            return Ok(());
        }
        // Пустой накопитель принимает формат первого фрагмента
        if self.is_empty() {
            *self = other.clone();
            return Ok(());
        }

        let mut other = other.with_channels(self.channels);
        if other.sample_rate != self.sample_rate {
            other = transform::resample(&other, self.sample_rate)?;
        }
        self.samples.extend_from_slice(&other.samples);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_duration() {
        let silence = AudioFragment::silent(1000, 22050, 2);
        assert_eq!(silence.frames(), 22050);
        assert_eq!(silence.samples.len(), 44100);
        assert_eq!(silence.duration_ms(), 1000);
        assert_eq!(silence.dbfs(), f32::NEG_INFINITY);
    }

    #[test]
    fn test_planar_round_trip_and_downmix() {
        let stereo = AudioFragment::new(vec![0.2, 0.4, -0.2, -0.4], 8000, 2);
        let planar = stereo.to_planar();
        assert_eq!(planar, vec![vec![0.2, -0.2], vec![0.4, -0.4]]);
        assert_eq!(AudioFragment::from_planar(&planar, 8000), stereo);

        let mono = stereo.with_channels(1);
        assert_eq!(mono.channels, 1);
        assert!((mono.samples[0] - 0.3).abs() < 1e-6);
        assert_eq!(mono.with_channels(2).samples.len(), 4);
    }

    #[test]
    fn test_append_same_format_preserves_order() {
        let mut merged = AudioFragment::new(vec![0.1, 0.2], 16000, 1);
        merged.append(&AudioFragment::new(vec![0.3], 16000, 1)).unwrap();
        merged.append(&AudioFragment::new(vec![0.4, 0.4], 16000, 2)).unwrap();
        assert_eq!(merged.samples, vec![0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_slice_ms() {
        let fragment = AudioFragment::new((0..1000).map(|i| i as f32 / 1000.0).collect(), 1000, 1);
        let part = fragment.slice_ms(100, 250);
        assert_eq!(part.frames(), 150);
        assert!((part.samples[0] - 0.1).abs() < 1e-6);
        assert!(fragment.slice_ms(900, 100).is_empty());
    }
}
