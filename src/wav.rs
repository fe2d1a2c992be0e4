//! WAV sample import and export
//!
//! Integer and float WAV files are read into normalized `f32` buffers.
//! A mono file becomes one sample; a stereo file becomes a left/right pair
//! linked to each other.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::info;

use crate::bank::{Bank, Sample, SampleId};
use crate::error::{BankError, Result};

/// Decoded WAV content, one buffer per channel
#[derive(Debug, Clone, PartialEq)]
pub struct WavAudio {
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
    pub bit_depth: u16,
}

/// Read a WAV file; more than two channels is rejected
pub fn read_wav(path: &Path) -> Result<WavAudio> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 || channels > 2 {
        return Err(BankError::FileFormat {
            reason: format!(
                "{}: {}-channel audio (only mono and stereo are supported)",
                path.display(),
                channels
            ),
        });
    }

    let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
    Ok(WavAudio {
        channels: deinterleave(&interleaved, channels),
        sample_rate: spec.sample_rate,
        bit_depth: spec.bits_per_sample,
    })
}

fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let samples: Vec<f32> = match sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<std::result::Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = (1i64 << (bits_per_sample.clamp(8, 32) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };
    Ok(samples)
}

fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels;
    let mut result = vec![Vec::with_capacity(frames); channels];
    for (i, sample) in samples.iter().enumerate() {
        result[i % channels].push(*sample);
    }
    result
}

/// Add the content of a WAV file to `bank`
///
/// Returns the new sample ids: one for mono, left then right for stereo.
pub fn import_wav(bank: &mut Bank, path: &Path, name: &str) -> Result<Vec<SampleId>> {
    let audio = read_wav(path)?;
    info!(
        "Importing {} ({} channel(s), {} Hz)",
        path.display(),
        audio.channels.len(),
        audio.sample_rate
    );
    let mut channels = audio.channels.into_iter();
    match (channels.next(), channels.next()) {
        (Some(mono), None) => {
            let sample = Sample::new(name, mono, audio.sample_rate).with_bit_depth(audio.bit_depth);
            Ok(vec![bank.create_sample(sample)?])
        }
        (Some(left), Some(right)) => {
            let left = bank.create_sample(
                Sample::new(format!("{}L", name), left, audio.sample_rate)
                    .with_bit_depth(audio.bit_depth),
            )?;
            let right = bank.create_sample(
                Sample::new(format!("{}R", name), right, audio.sample_rate)
                    .with_bit_depth(audio.bit_depth),
            )?;
            bank.link_stereo(left, right)?;
            Ok(vec![left, right])
        }
        _ => Err(BankError::FileFormat {
            reason: format!("{}: no audio channels", path.display()),
        }),
    }
}

/// Write one sample as a mono integer WAV at its own bit depth (16 or 24)
pub fn write_wav(sample: &Sample, path: &Path) -> Result<()> {
    let bits_per_sample = if sample.bit_depth > 16 { 24 } else { 16 };
    let spec = WavSpec {
        channels: 1,
        sample_rate: sample.sample_rate,
        bits_per_sample,
        sample_format: SampleFormat::Int,
    };
    let scale = ((1i32 << (bits_per_sample - 1)) - 1) as f32;
    let mut writer = WavWriter::create(path, spec)?;
    for &s in sample.data.iter() {
        writer.write_sample((s.clamp(-1.0, 1.0) * scale).round() as i32)?;
    }
    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::SampleType;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    fn write_stereo(path: &Path) {
        let spec = WavSpec {
            channels: 2,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for _ in 0..100 {
            writer.write_sample(16384i16).unwrap();
            writer.write_sample(-16384i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_mono_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tone.wav");
        let sample = Sample::new("Tone", vec![0.0, 0.5, -0.5, 0.25], 44100);
        write_wav(&sample, &path).unwrap();

        let mut bank = Bank::new("Test");
        let ids = import_wav(&mut bank, &path, "Tone").unwrap();
        assert_eq!(ids.len(), 1);
        let imported = bank.sample(ids[0]).unwrap();
        assert_eq!(imported.sample_rate, 44100);
        assert_eq!(imported.bit_depth, 16);
        assert_eq!(imported.channel_count(), 1);
        assert_relative_eq!(imported.data[1], 0.5, epsilon = 1e-3);
        assert_relative_eq!(imported.data[2], -0.5, epsilon = 1e-3);
    }

    #[test]
    fn test_stereo_becomes_linked_pair() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("pad.wav");
        write_stereo(&path);

        let mut bank = Bank::new("Test");
        let ids = import_wav(&mut bank, &path, "Pad").unwrap();
        assert_eq!(ids.len(), 2);
        let left = bank.sample(ids[0]).unwrap();
        let right = bank.sample(ids[1]).unwrap();
        assert_eq!(left.name, "PadL");
        assert_eq!(left.sample_type, SampleType::Left);
        assert_eq!(left.link, Some(ids[1]));
        assert_eq!(right.link, Some(ids[0]));
        assert_eq!(left.channel_count(), 2);
        assert_eq!(left.len(), 100);
        assert_relative_eq!(left.data[0], 0.5);
        assert_relative_eq!(right.data[0], -0.5);
    }

    #[test]
    fn test_missing_file_is_wav_error() {
        let mut bank = Bank::new("Test");
        let err = import_wav(&mut bank, Path::new("/nonexistent/x.wav"), "X").unwrap_err();
        assert_eq!(err.error_code(), "WAV_ERROR");
        assert_eq!(bank.sample_count(), 0);
    }
}
