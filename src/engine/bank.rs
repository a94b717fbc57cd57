// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Sound bank loading and caching.
//!
//! Samples are decoded entirely into memory so that triggering is
//! zero-latency. At load time each sample gets a leading-silence trim offset:
//! encoders pad the start of a recording, and skipping that padding is what
//! makes a button press feel instantaneous.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::debug;

/// Amplitude below which a leading sample counts as encoder silence.
pub const SILENCE_THRESHOLD: f32 = 0.005;

/// How far to back off from the first audible sample, in seconds, so the
/// attack transient survives the trim.
pub const ATTACK_BACKOFF_SECONDS: f32 = 0.002;

/// Which side of the instrument a sample was recorded for.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SampleCategory {
    Treble,
    Bass,
}

impl SampleCategory {
    /// The token used in sample references.
    pub fn token(&self) -> &'static str {
        match self {
            SampleCategory::Treble => "treble",
            SampleCategory::Bass => "bass",
        }
    }
}

/// Errors from loading a sample into a bank. These are logged at the load
/// site and never reach the play path.
#[derive(Debug, thiserror::Error)]
pub enum BankError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("no audio track in file")]
    NoAudioTrack,
    #[error("sample rate not specified")]
    NoSampleRate,
}

/// A decoded sample ready for playback. The data is shared between voices.
#[derive(Clone)]
pub struct DecodedSample {
    data: Arc<Vec<f32>>,
    channels: u16,
    sample_rate: u32,
    trim_frames: usize,
}

impl DecodedSample {
    /// Creates a decoded sample from interleaved data, computing the
    /// leading-silence trim offset.
    pub fn new(data: Vec<f32>, channels: u16, sample_rate: u32) -> DecodedSample {
        let trim_frames = leading_silence_frames(&data, channels as usize, sample_rate);
        DecodedSample {
            data: Arc::new(data),
            channels,
            sample_rate,
            trim_frames,
        }
    }

    /// The interleaved sample data.
    pub fn data(&self) -> Arc<Vec<f32>> {
        Arc::clone(&self.data)
    }

    /// The number of channels.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// The sample rate of the recording.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames of encoder silence to skip at playback start.
    pub fn trim_frames(&self) -> usize {
        self.trim_frames
    }

    /// The memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

/// Finds the number of leading frames to trim: the first frame on channel 0
/// exceeding [`SILENCE_THRESHOLD`], backed off ~2ms to keep the attack.
pub fn leading_silence_frames(data: &[f32], channels: usize, sample_rate: u32) -> usize {
    if channels == 0 {
        return 0;
    }
    let backoff = (sample_rate as f32 * ATTACK_BACKOFF_SECONDS) as usize;
    let frames = data.len() / channels;
    for frame in 0..frames {
        if data[frame * channels].abs() > SILENCE_THRESHOLD {
            return frame.saturating_sub(backoff);
        }
    }
    0
}

/// A collection of decoded samples representing one instrument timbre. Banks
/// are keyed by id in the engine's cache.
pub struct SoundBank {
    samples: HashMap<String, DecodedSample>,
}

impl SoundBank {
    /// Creates an empty bank.
    pub fn new() -> SoundBank {
        SoundBank {
            samples: HashMap::new(),
        }
    }

    /// Inserts a decoded sample under the given reference.
    pub fn insert(&mut self, reference: &str, sample: DecodedSample) {
        self.samples.insert(reference.to_string(), sample);
    }

    /// Looks up a sample by reference.
    pub fn get(&self, reference: &str) -> Option<&DecodedSample> {
        self.samples.get(reference)
    }

    /// Whether the bank holds a sample under the given reference.
    pub fn contains(&self, reference: &str) -> bool {
        self.samples.contains_key(reference)
    }

    /// The number of loaded samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the bank is empty.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The total memory used by this bank's samples.
    pub fn memory_usage(&self) -> usize {
        self.samples.values().map(|s| s.memory_size()).sum()
    }
}

impl Default for SoundBank {
    fn default() -> SoundBank {
        SoundBank::new()
    }
}

/// Decodes an audio file (WAV, FLAC, MP3, OGG) fully into memory.
pub fn decode_file(path: &Path) -> Result<DecodedSample, BankError> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let fmt_opts: FormatOptions = Default::default();
    let meta_opts: MetadataOptions = Default::default();
    let probed = get_probe()
        .format(&hint, mss, &fmt_opts, &meta_opts)
        .map_err(|e| BankError::Decode(e.to_string()))?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(BankError::NoAudioTrack)?;
    let track_id = track.id;
    let params = &track.codec_params;
    let sample_rate = params.sample_rate.ok_or(BankError::NoSampleRate)?;

    let decoder_opts: DecoderOptions = Default::default();
    let mut decoder = get_codecs()
        .make(params, &decoder_opts)
        .map_err(|e| BankError::Decode(e.to_string()))?;

    let mut channels: u16 = 0;
    let mut data: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            // Some decoders report EOF as a decode error.
            Err(SymphoniaError::DecodeError(_)) => break,
            Err(e) => return Err(BankError::Decode(e.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // Skip over corrupt packets rather than abandoning the sample.
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(BankError::Decode(e.to_string())),
        };

        if sample_buf.is_none() {
            let spec = *decoded.spec();
            channels = spec.channels.count() as u16;
            sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }
        if let Some(buf) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            data.extend_from_slice(buf.samples());
        }
    }

    if channels == 0 || data.is_empty() {
        return Err(BankError::Decode("no decodable audio data".to_string()));
    }

    let sample = DecodedSample::new(data, channels, sample_rate);
    debug!(
        path = ?path,
        channels,
        sample_rate,
        trim_frames = sample.trim_frames(),
        memory_kb = sample.memory_size() / 1024,
        "Sample decoded"
    );
    Ok(sample)
}
