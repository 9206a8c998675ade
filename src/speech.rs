use crate::api::ApiClient;
use crate::persona::Persona;
use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::{Path, PathBuf};

pub const SAMPLE_RATE: u32 = 24_000;
pub const CHANNELS: usize = 1;

/// Decoded speech: one `Vec<f32>` per channel, samples in `[-1.0, 1.0)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl PcmBuffer {
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f32 / self.sample_rate as f32
    }

    /// 16-bit PCM RIFF/WAVE encoding of the buffer.
    pub fn to_wav_bytes(&self) -> Vec<u8> {
        let channel_count = self.channels.len().max(1) as u16;
        let frames = self.frames();
        let data_len = (frames * channel_count as usize * 2) as u32;
        let byte_rate = self.sample_rate * channel_count as u32 * 2;

        let mut out = Vec::with_capacity(44 + data_len as usize);
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&channel_count.to_le_bytes());
        out.extend_from_slice(&self.sample_rate.to_le_bytes());
        out.extend_from_slice(&byte_rate.to_le_bytes());
        out.extend_from_slice(&(channel_count * 2).to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());

        for frame in 0..frames {
            for channel in &self.channels {
                let sample = (channel[frame] * 32768.0).round().clamp(-32768.0, 32767.0) as i16;
                out.extend_from_slice(&sample.to_le_bytes());
            }
        }
        out
    }

    pub fn write_wav(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, self.to_wav_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

pub fn decode_base64(payload: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(payload.trim())
        .context("speech payload is not valid base64")
}

/// Splits interleaved signed 16-bit little-endian samples into channels.
/// A trailing partial frame is dropped.
pub fn decode_pcm(bytes: &[u8], sample_rate: u32, channel_count: usize) -> Result<PcmBuffer> {
    if channel_count == 0 {
        bail!("channel count must be at least 1");
    }
    let samples: Vec<i16> = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    let frames = samples.len() / channel_count;

    let channels = (0..channel_count)
        .map(|channel| {
            (0..frames)
                .map(|frame| samples[frame * channel_count + channel] as f32 / 32768.0)
                .collect()
        })
        .collect();

    Ok(PcmBuffer {
        sample_rate,
        channels,
    })
}

/// Asks the speech model to read `text` in the persona's voice and decodes
/// the reply.
pub async fn synthesize(client: &ApiClient, persona: &Persona, text: &str) -> Result<PcmBuffer> {
    let payload = client.generate_speech(text, &persona.speech_tone).await?;
    let bytes = decode_base64(&payload)?;
    decode_pcm(&bytes, SAMPLE_RATE, CHANNELS)
}

/// Where a spoken message is written under the state directory.
pub fn clip_path(state_dir: &Path, message_id: &str) -> PathBuf {
    state_dir.join("speech").join(format!("{message_id}.wav"))
}
