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

//! The playback engine and its render-side mixer.
//!
//! Voices are handed to the audio callback over a channel; stops travel as
//! per-voice atomics. Both paths are wait-free from the callback's point of
//! view, and the application never blocks waiting for audio completion.
//!
//! There is deliberately no dynamics-processing stage in this path: such
//! stages need look-ahead buffering, and the added latency is audible on a
//! playable instrument.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::audio::{AudioError, Device};
use crate::theory::SEMITONES_PER_OCTAVE;

use super::bank::{decode_file, SoundBank};
use super::voice::{Voice, VoiceControl, VoicePool};

/// Maximum number of concurrently live voices.
pub const MAX_VOICES: usize = 32;

/// Gain floor for exponential ramps. Envelopes start and end here rather
/// than at zero; an exponential curve never reaches zero.
pub const VOICE_FLOOR: f32 = 0.001;

/// Attack ramp length. A stepped gain jump produces an audible pop.
const ATTACK_SECONDS: f32 = 0.001;

/// Fade applied to a stolen voice before its slot is reused.
const STEAL_FADE_SECONDS: f32 = 0.005;

/// Default release ramp for a normal stop.
pub const DEFAULT_RELEASE_SECONDS: f32 = 0.008;

/// Nominal length of the generated buffer used by the synthesized-tone
/// fallback; the actual buffer is sized to a whole number of cycles.
const TONE_SECONDS: f32 = 1.0;

/// One voice as seen by the render side.
struct RenderVoice {
    data: Arc<Vec<f32>>,
    channels: usize,
    position: f64,
    step: f64,
    start_frame: usize,
    gain: f32,
    target_gain: f32,
    attack_coef: f32,
    releasing: bool,
    release_coef: f32,
    looped: bool,
    control: Arc<VoiceControl>,
}

impl RenderVoice {
    /// Mixes this voice into an interleaved output buffer. Returns false
    /// once the voice is retired (natural end, release floor, or kill).
    fn mix_into(&mut self, out: &mut [f32], out_channels: usize) -> bool {
        if self.control.killed() {
            self.control.set_finished();
            return false;
        }

        // Observing a release cancels whatever ramp was pending; a stale
        // attack must not revive a killed voice.
        if !self.releasing && self.control.released() {
            self.releasing = true;
            let samples = self.control.release_samples().max(1);
            self.release_coef =
                (VOICE_FLOOR / self.gain.max(VOICE_FLOOR)).powf(1.0 / samples as f32);
        }

        let total_frames = self.data.len() / self.channels;
        let frames = out.len() / out_channels;

        for frame in 0..frames {
            if self.releasing {
                self.gain *= self.release_coef;
                if self.gain <= VOICE_FLOOR {
                    self.control.set_finished();
                    return false;
                }
            } else if self.gain < self.target_gain {
                self.gain = (self.gain * self.attack_coef).min(self.target_gain);
            }

            let mut index = self.position as usize;
            if index >= total_frames {
                if self.looped {
                    self.position = self.start_frame as f64;
                    index = self.start_frame;
                } else {
                    self.control.set_finished();
                    return false;
                }
            }
            let frac = (self.position - index as f64) as f32;
            // The final frame interpolates against itself so it still sounds.
            let next = (index + 1).min(total_frames - 1);

            for channel in 0..out_channels {
                let source_channel = channel.min(self.channels - 1);
                let s0 = self.data[index * self.channels + source_channel];
                let s1 = self.data[next * self.channels + source_channel];
                out[frame * out_channels + channel] += (s0 + (s1 - s0) * frac) * self.gain;
            }

            self.position += self.step;
        }

        true
    }
}

/// Render-side mixer. The audio callback is its only consumer.
pub struct Mixer {
    channels: u16,
    sample_rate: u32,
    voices: Mutex<Vec<RenderVoice>>,
    rx: Receiver<RenderVoice>,
}

impl Mixer {
    fn new(channels: u16, sample_rate: u32) -> (Mixer, Sender<RenderVoice>) {
        let (tx, rx) = unbounded();
        (
            Mixer {
                channels,
                sample_rate,
                voices: Mutex::new(Vec::new()),
                rx,
            },
            tx,
        )
    }

    /// Renders one buffer of interleaved output. Newly enqueued voices are
    /// admitted before existing voices are advanced, so a start enqueued
    /// before a stop request always sounds no later than the stop lands.
    pub fn render(&self, out: &mut [f32]) {
        out.fill(0.0);
        let mut voices = self.voices.lock();
        while let Ok(voice) = self.rx.try_recv() {
            voices.push(voice);
        }
        let channels = self.channels as usize;
        voices.retain_mut(|voice| voice.mix_into(out, channels));
    }

    /// Drops every voice immediately. Part of the panic path.
    fn clear(&self) {
        let mut voices = self.voices.lock();
        while let Ok(voice) = self.rx.try_recv() {
            voices.push(voice);
        }
        for voice in voices.drain(..) {
            voice.control.set_finished();
        }
    }

    /// The output sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// The decoded-buffer cache with a per-bank generation. Clearing a bank
/// bumps its generation, so a background loader that started before the
/// clear cannot repopulate the bank with its remaining samples.
#[derive(Default)]
struct BankCache {
    banks: HashMap<String, SoundBank>,
    generations: HashMap<String, u64>,
}

impl BankCache {
    fn generation(&self, bank: &str) -> u64 {
        self.generations.get(bank).copied().unwrap_or(0)
    }
}

/// The playback engine: owns the buffer cache and the voice pool, and is the
/// only component that talks to the audio output device.
///
/// Constructed once by the composition root and passed by reference; tests
/// construct as many independent engines as they need.
pub struct Engine {
    device: Arc<dyn Device>,
    mixer: Arc<Mixer>,
    voice_tx: Sender<RenderVoice>,
    banks: RwLock<BankCache>,
    pool: Mutex<VoicePool>,
}

impl Engine {
    /// Creates an engine rendering into the given device and starts the
    /// output stream.
    pub fn new(device: Arc<dyn Device>) -> Result<Arc<Engine>, AudioError> {
        let (mixer, voice_tx) = Mixer::new(device.channel_count(), device.sample_rate());
        let mixer = Arc::new(mixer);
        device.start(Arc::clone(&mixer))?;
        info!(device = %device, "Playback engine started");
        Ok(Arc::new(Engine {
            device,
            mixer,
            voice_tx,
            banks: RwLock::new(BankCache::default()),
            pool: Mutex::new(VoicePool::new(MAX_VOICES)),
        }))
    }

    /// Loads one sample into a bank. Idempotent: a reference that is already
    /// loaded is left alone. Decode failures are logged and leave the slot
    /// empty; the button stays silent until a future successful load.
    pub fn load_sample(&self, bank: &str, reference: &str, path: &Path) {
        let generation = self.banks.read().generation(bank);
        self.load_sample_at(bank, reference, path, generation);
    }

    /// Decodes and inserts one sample, unless the bank was cleared after
    /// `generation` was observed. A load that lost that race is discarded,
    /// so a cleared bank cannot be repopulated by its own in-flight loader.
    fn load_sample_at(&self, bank: &str, reference: &str, path: &Path, generation: u64) {
        if self
            .banks
            .read()
            .banks
            .get(bank)
            .is_some_and(|b| b.contains(reference))
        {
            return;
        }

        match decode_file(path) {
            Ok(sample) => {
                let mut cache = self.banks.write();
                if cache.generation(bank) != generation {
                    debug!(bank, reference, "Bank cleared during decode, dropping sample");
                    return;
                }
                cache
                    .banks
                    .entry(bank.to_string())
                    .or_insert_with(SoundBank::new)
                    .insert(reference, sample);
                debug!(bank, reference, "Sample loaded");
            }
            Err(e) => {
                warn!(bank, reference, path = ?path, error = %e, "Failed to load sample");
            }
        }
    }

    /// Loads a batch of samples on a background thread. Playing a reference
    /// before its load completes yields silence, not an error.
    pub fn load_bank(self: &Arc<Self>, bank: &str, entries: Vec<(String, PathBuf)>) {
        let engine = Arc::clone(self);
        let bank = bank.to_string();
        let generation = self.banks.read().generation(&bank);
        thread::spawn(move || {
            let count = entries.len();
            for (reference, path) in entries {
                engine.load_sample_at(&bank, &reference, &path, generation);
            }
            let cache = engine.banks.read();
            if cache.generation(&bank) != generation {
                info!(bank, "Bank load superseded by a bank switch");
                return;
            }
            let loaded = cache
                .banks
                .get(&bank)
                .map(|b| (b.len(), b.memory_usage()))
                .unwrap_or((0, 0));
            info!(
                bank,
                requested = count,
                loaded = loaded.0,
                memory_kb = loaded.1 / 1024,
                "Bank load finished"
            );
        });
    }

    /// Drops a bank's decoded buffers and invalidates any in-flight loads
    /// for it. Called on bank switch.
    pub fn clear_bank(&self, bank: &str) {
        let mut cache = self.banks.write();
        *cache.generations.entry(bank.to_string()).or_insert(0) += 1;
        if cache.banks.remove(bank).is_some() {
            info!(bank, "Bank cleared");
        }
    }

    /// Whether a sample is loaded and playable.
    pub fn has_sample(&self, bank: &str, reference: &str) -> bool {
        self.banks
            .read()
            .banks
            .get(bank)
            .is_some_and(|b| b.contains(reference))
    }

    /// Starts a voice for a loaded sample. Returns `None` when the bank or
    /// sample is missing. The playback rate is `2^(semitones/12)` and the
    /// gain ramps up from the floor over ~1ms.
    pub fn play(
        &self,
        bank: &str,
        reference: &str,
        gain: f32,
        pitch_shift: i32,
        looped: bool,
    ) -> Option<Voice> {
        let (data, channels, source_rate, start_frame) = {
            let cache = self.banks.read();
            let sample = cache.banks.get(bank)?.get(reference)?;
            (
                sample.data(),
                sample.channels(),
                sample.sample_rate(),
                sample.trim_frames(),
            )
        };

        Some(self.start_voice(data, channels, source_rate, start_frame, gain, pitch_shift, looped))
    }

    /// Starts a looping synthesized tone at the given frequency; the
    /// fallback path when no sample resolves. Returns `None` for the
    /// sentinel (non-positive) frequency.
    pub fn play_tone(&self, frequency: f32, gain: f32) -> Option<Voice> {
        if frequency <= 0.0 {
            return None;
        }
        let sample_rate = self.mixer.sample_rate();
        // A whole number of cycles, so the loop wrap is phase-continuous.
        let cycles = (frequency * TONE_SECONDS).round().max(1.0);
        let frames = ((cycles * sample_rate as f32 / frequency).round() as usize).max(1);
        let data: Vec<f32> = (0..frames)
            .map(|i| {
                (2.0 * std::f32::consts::PI * frequency * i as f32 / sample_rate as f32).sin()
                    * 0.25
            })
            .collect();
        Some(self.start_voice(Arc::new(data), 1, sample_rate, 0, gain, 0, true))
    }

    #[allow(clippy::too_many_arguments)]
    fn start_voice(
        &self,
        data: Arc<Vec<f32>>,
        channels: u16,
        source_rate: u32,
        start_frame: usize,
        gain: f32,
        pitch_shift: i32,
        looped: bool,
    ) -> Voice {
        let out_rate = self.mixer.sample_rate();
        let rate = (pitch_shift as f64 / SEMITONES_PER_OCTAVE as f64).exp2();
        let step = rate * source_rate as f64 / out_rate as f64;

        let target_gain = gain.max(VOICE_FLOOR);
        let attack_samples = (ATTACK_SECONDS * out_rate as f32).max(1.0);
        let attack_coef = (target_gain / VOICE_FLOOR).powf(1.0 / attack_samples);

        let voice = Voice::new(out_rate);

        // Steal before allocating so a new request is never silently
        // dropped at the limit.
        let stolen = self.pool.lock().admit(voice.clone());
        for old in stolen {
            warn!(voice = old.id(), "Voice limit reached, stealing oldest");
            old.release(STEAL_FADE_SECONDS);
        }

        let render_voice = RenderVoice {
            data,
            channels: channels.max(1) as usize,
            position: start_frame as f64,
            step,
            start_frame,
            gain: VOICE_FLOOR,
            target_gain,
            attack_coef,
            releasing: false,
            release_coef: 1.0,
            looped,
            control: voice.control(),
        };
        if self.voice_tx.send(render_voice).is_err() {
            error!("Audio render side is gone; voice dropped");
        }

        voice
    }

    /// Stops a voice with the given release ramp. Stopping an
    /// already-stopped voice is a no-op.
    pub fn stop(&self, voice: &Voice, release_seconds: f32) {
        voice.release(release_seconds);
    }

    /// Unconditionally disconnects every voice. The last-resort recovery for
    /// stuck notes; safe to invoke repeatedly.
    pub fn panic(&self) {
        let drained = self.pool.lock().drain();
        for voice in &drained {
            voice.kill();
        }
        self.mixer.clear();
        info!(stopped = drained.len(), "Panic: all voices stopped");
    }

    /// Resumes a suspended output device. Idempotent; failures are logged,
    /// never propagated.
    pub fn resume(&self) {
        if let Err(e) = self.device.resume() {
            warn!(error = %e, "Failed to resume output device");
        }
    }

    /// The number of live voices.
    pub fn active_voices(&self) -> usize {
        self.pool.lock().active_count()
    }
}

#[cfg(test)]
impl Engine {
    /// Inserts an already-decoded sample, bypassing file decoding (test only).
    pub fn insert_sample_for_test(
        &self,
        bank: &str,
        reference: &str,
        sample: super::bank::DecodedSample,
    ) {
        self.banks
            .write()
            .banks
            .entry(bank.to_string())
            .or_insert_with(SoundBank::new)
            .insert(reference, sample);
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cache = self.banks.read();
        f.debug_struct("Engine")
            .field("banks", &cache.banks.len())
            .field(
                "memory_kb",
                &(cache.banks.values().map(|b| b.memory_usage()).sum::<usize>() / 1024),
            )
            .field("active_voices", &self.pool.lock().active_count())
            .finish()
    }
}
