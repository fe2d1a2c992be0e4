//! Sample metadata and audio
//!
//! Samples are mono buffers. Stereo material is stored as a left/right
//! pair that point at each other through `link`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::ids::SampleId;

/// Role of a sample in a stereo pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleType {
    #[default]
    Mono,
    Left,
    Right,
    Linked,
    Rom,
}

/// An audio waveform with loop and pitch metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub name: String,
    /// Normalized audio, shared between copies
    pub data: Arc<[f32]>,
    pub sample_rate: u32,
    pub bit_depth: u16,
    pub loop_start: u32,
    pub loop_end: u32,
    /// MIDI key at which the sample plays at its recorded pitch
    pub root_key: u8,
    /// Pitch correction in cents
    pub pitch_correction: i8,
    #[serde(default)]
    pub sample_type: SampleType,
    /// Stereo partner
    #[serde(default)]
    pub link: Option<SampleId>,
}

impl Sample {
    pub fn new(name: impl Into<String>, data: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            sample_rate,
            bit_depth: 16,
            loop_start: 0,
            loop_end: 0,
            root_key: 60,
            pitch_correction: 0,
            sample_type: SampleType::Mono,
            link: None,
        }
    }

    pub fn with_loop(mut self, start: u32, end: u32) -> Self {
        self.loop_start = start;
        self.loop_end = end;
        self
    }

    pub fn with_root_key(mut self, root_key: u8, pitch_correction: i8) -> Self {
        self.root_key = root_key;
        self.pitch_correction = pitch_correction;
        self
    }

    pub fn with_bit_depth(mut self, bit_depth: u16) -> Self {
        self.bit_depth = bit_depth;
        self
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.data.len() as f64 / self.sample_rate as f64
    }

    /// 2 for a linked stereo half, 1 otherwise
    pub fn channel_count(&self) -> u8 {
        match (self.sample_type, self.link) {
            (SampleType::Left | SampleType::Right | SampleType::Linked, Some(_)) => 2,
            _ => 1,
        }
    }

    pub fn has_valid_loop(&self) -> bool {
        self.loop_start < self.loop_end && (self.loop_end as usize) <= self.data.len()
    }

    /// Samples between the loop points
    pub fn loop_region(&self) -> Option<&[f32]> {
        self.has_valid_loop()
            .then(|| &self.data[self.loop_start as usize..self.loop_end as usize])
    }

    /// Replace the audio, keeping loop points inside the new buffer
    pub fn replace_data(&mut self, data: Vec<f32>) {
        self.data = data.into();
        let len = self.data.len() as u32;
        self.loop_end = self.loop_end.min(len);
        self.loop_start = self.loop_start.min(self.loop_end);
    }

    /// Equality on everything a copy must preserve (the stereo link excluded)
    pub fn content_eq(&self, other: &Sample) -> bool {
        self.name == other.name
            && self.data == other.data
            && self.sample_rate == other.sample_rate
            && self.bit_depth == other.bit_depth
            && self.loop_start == other.loop_start
            && self.loop_end == other.loop_end
            && self.root_key == other.root_key
            && self.pitch_correction == other.pitch_correction
            && self.sample_type == other.sample_type
    }
}
