//! WAV inspection and loudness normalization.

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::Cursor;
use std::time::Duration;

/// Peak level we normalize to, just under full scale (-0.1 dBFS)
const TARGET_PEAK: f64 = 0.988_553;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavInfo {
    pub spec: WavSpec,
    /// Samples per channel
    pub frames: u32,
}

impl WavInfo {
    pub fn duration(&self) -> Duration {
        if self.spec.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames as f64 / self.spec.sample_rate as f64)
    }
}

/// Read the header of a complete WAV file held in memory.
///
/// Rejects files whose data chunk is shorter than the header claims, so a
/// truncated download is never mistaken for playable audio.
pub fn inspect(bytes: &[u8]) -> Result<WavInfo, hound::Error> {
    let reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    let frames = reader.duration();

    let expected = frames as usize * spec.channels as usize * (spec.bits_per_sample as usize).div_ceil(8);
    if bytes.len() < expected {
        return Err(hound::Error::FormatError("data chunk is truncated"));
    }

    Ok(WavInfo { spec, frames })
}

/// Scale samples so the loudest one sits just under full scale.
///
/// Silent input is returned unchanged.
pub fn normalize(bytes: &[u8]) -> Result<Vec<u8>, hound::Error> {
    let mut reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    match spec.sample_format {
        SampleFormat::Float => {
            let samples = reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?;
            let peak = samples.iter().fold(0f32, |m, s| m.max(s.abs())) as f64;
            if peak == 0.0 {
                return Ok(bytes.to_vec());
            }
            let gain = (TARGET_PEAK / peak) as f32;
            write_wav(spec, samples.into_iter().map(|s| s * gain))
        }
        SampleFormat::Int => {
            let samples = reader.samples::<i32>().collect::<Result<Vec<_>, _>>()?;
            let peak = samples.iter().map(|s| (*s as i64).abs()).max().unwrap_or(0);
            if peak == 0 {
                return Ok(bytes.to_vec());
            }
            let full_scale = ((1i64 << (spec.bits_per_sample - 1)) - 1) as f64;
            let gain = TARGET_PEAK * full_scale / peak as f64;
            write_wav(
                spec,
                samples
                    .into_iter()
                    .map(|s| (s as f64 * gain).round().clamp(-full_scale, full_scale) as i32),
            )
        }
    }
}

fn write_wav<S, I>(spec: WavSpec, samples: I) -> Result<Vec<u8>, hound::Error>
where
    S: hound::Sample,
    I: IntoIterator<Item = S>,
{
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Build a mono 16-bit sine tone; handy for tests and smoke checks.
pub fn sine_wav(sample_rate: u32, seconds: f32, amplitude: f32) -> Result<Vec<u8>, hound::Error> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let count = (sample_rate as f32 * seconds) as usize;
    let samples = (0..count).map(|i| {
        let t = i as f32 / sample_rate as f32;
        ((t * 440.0 * std::f32::consts::TAU).sin() * amplitude * i16::MAX as f32) as i16
    });
    write_wav(spec, samples)
}
