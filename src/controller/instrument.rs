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

//! The instrument state machine.
//!
//! Holds the bellows state, the set of sounding buttons, and the fast map:
//! a precomputed button-to-playback table so the press path does no theory
//! math, no resolution, and no allocation beyond the voice list. The fast map
//! is invalidated on any configuration change and rebuilt lazily on the next
//! press, which coalesces bursts of changes into one rebuild.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{ConfigStore, InstrumentConfig, PitchedReference};
use crate::engine::bank::SampleCategory;
use crate::engine::{Engine, Voice, DEFAULT_RELEASE_SECONDS};
use crate::inventory::Inventory;
use crate::layout::{
    BellowsDirection, ButtonCoordinate, Layout, LayoutEntry, LayoutRegistry, Tonality,
};
use crate::resolver::{self, Candidate};
use crate::theory::SEMITONES_PER_OCTAVE;

use super::{ButtonInput, Event};

/// Gain for a single-note button.
const NOTE_GAIN: f32 = 0.9;

/// Gain per chord tone; chords sum several voices.
const CHORD_NOTE_GAIN: f32 = 0.5;

/// What pressing a button in one direction should play.
#[derive(Clone, Debug, PartialEq)]
pub struct Prepared {
    pub gain: f32,
    pub source: PreparedSource,
}

/// Where a prepared note's audio comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum PreparedSource {
    /// A bank sample played back with a compensating pitch shift.
    Sample { reference: String, pitch_shift: i32 },
    /// A synthesized tone at the exact target frequency.
    Tone { frequency: f32 },
}

/// One fast-map slot: both directions of a physical button.
#[derive(Clone, Debug, Default)]
struct FastMapEntry {
    pull: Vec<Prepared>,
    push: Vec<Prepared>,
}

impl FastMapEntry {
    fn for_direction(&self, direction: BellowsDirection) -> &[Prepared] {
        match direction {
            BellowsDirection::Pull => &self.pull,
            BellowsDirection::Push => &self.push,
        }
    }
}

/// A playable instrument: layout, bellows, configuration, and the voices it
/// currently sounds.
pub struct Instrument {
    engine: Arc<Engine>,
    registry: LayoutRegistry,
    inventory: Arc<dyn Inventory>,
    store: Arc<dyn ConfigStore>,
    user: String,
    tonality: Tonality,
    layout: Arc<Layout>,
    config: InstrumentConfig,
    bellows: BellowsDirection,
    /// Sounding voices keyed by full button id.
    active: HashMap<String, Vec<Voice>>,
    /// Physically held buttons, needed for bellows migration.
    pressed: HashSet<ButtonInput>,
    fast_map: HashMap<String, FastMapEntry>,
    fast_map_dirty: bool,
}

impl Instrument {
    /// Creates an instrument and starts loading its configured bank.
    pub fn new(
        engine: Arc<Engine>,
        registry: LayoutRegistry,
        inventory: Arc<dyn Inventory>,
        store: Arc<dyn ConfigStore>,
        user: &str,
        tonality: Tonality,
    ) -> Instrument {
        let config = store.load_or_default(user, tonality);
        let layout = registry.layout(tonality);
        let mut instrument = Instrument {
            engine,
            registry,
            inventory,
            store,
            user: user.to_string(),
            tonality,
            layout,
            config,
            bellows: BellowsDirection::Pull,
            active: HashMap::new(),
            pressed: HashSet::new(),
            fast_map: HashMap::new(),
            fast_map_dirty: true,
        };
        instrument.load_current_bank();
        instrument
    }

    /// The current tonality.
    pub fn tonality(&self) -> Tonality {
        self.tonality
    }

    /// The selected bank id.
    pub fn bank(&self) -> &str {
        &self.config.bank
    }

    /// The current bellows direction.
    pub fn bellows(&self) -> BellowsDirection {
        self.bellows
    }

    /// Applies one controller event.
    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::ButtonDown(input) => self.button_down(input),
            Event::ButtonUp(input) => self.button_up(input),
            Event::BellowsPress => self.set_bellows(BellowsDirection::Push),
            Event::BellowsRelease => self.set_bellows(BellowsDirection::Pull),
            Event::SetTonality(tonality) => self.set_tonality(tonality),
            Event::SetBank(bank) => self.set_bank(bank),
            Event::Save => self.save(),
            Event::Panic => self.panic(),
        }
    }

    /// Releases everything gracefully, e.g. on shutdown.
    pub fn quiesce(&mut self) {
        self.pressed.clear();
        for (_, voices) in self.active.drain() {
            for voice in voices {
                self.engine.stop(&voice, DEFAULT_RELEASE_SECONDS);
            }
        }
    }

    fn button_down(&mut self, input: ButtonInput) {
        // A press is a user gesture; use it to recover a suspended device.
        self.engine.resume();

        self.pressed.insert(input);
        let full_id = input.coordinate(self.bellows).id();
        if self.active.contains_key(&full_id) {
            // Already sounding; holding or bouncing a button never restarts it.
            return;
        }

        let prepared = self.prepared_for(&input, self.bellows);
        let voices = self.start_voices(&prepared);
        if !voices.is_empty() {
            self.active.insert(full_id, voices);
        }
    }

    fn button_up(&mut self, input: ButtonInput) {
        self.pressed.remove(&input);
        // Both directions: the bellows may have moved since the press.
        for direction in [BellowsDirection::Pull, BellowsDirection::Push] {
            if let Some(voices) = self.active.remove(&input.coordinate(direction).id()) {
                for voice in voices {
                    self.engine.stop(&voice, DEFAULT_RELEASE_SECONDS);
                }
            }
        }
    }

    /// Moves the bellows. Held buttons migrate to the new direction with
    /// their new-direction voices started before the old ones are released,
    /// so the transition has no audible gap.
    fn set_bellows(&mut self, direction: BellowsDirection) {
        if direction == self.bellows {
            return;
        }
        let old = self.bellows;
        self.bellows = direction;

        let held: Vec<ButtonInput> = self.pressed.iter().copied().collect();
        let mut started: Vec<(String, Vec<Voice>)> = Vec::new();
        for input in &held {
            let prepared = self.prepared_for(input, direction);
            let voices = self.start_voices(&prepared);
            if !voices.is_empty() {
                started.push((input.coordinate(direction).id(), voices));
            }
        }

        for input in &held {
            if let Some(voices) = self.active.remove(&input.coordinate(old).id()) {
                for voice in voices {
                    self.engine.stop(&voice, DEFAULT_RELEASE_SECONDS);
                }
            }
        }

        for (full_id, voices) in started {
            self.active.insert(full_id, voices);
        }
    }

    fn set_tonality(&mut self, tonality: Tonality) {
        if tonality == self.tonality {
            return;
        }
        self.quiesce();

        let old_bank = self.config.bank.clone();
        self.tonality = tonality;
        self.layout = self.registry.layout(tonality);
        self.config = self.store.load_or_default(&self.user, tonality);
        if self.config.bank != old_bank {
            self.engine.clear_bank(&old_bank);
            self.load_current_bank();
        }
        self.fast_map_dirty = true;
        info!(tonality = %tonality, bank = self.config.bank, "Tonality changed");
    }

    fn set_bank(&mut self, bank: String) {
        if bank == self.config.bank {
            return;
        }
        self.engine.clear_bank(&self.config.bank);
        self.config.bank = bank;
        self.load_current_bank();
        self.fast_map_dirty = true;
        info!(bank = self.config.bank, "Bank changed");
    }

    fn save(&mut self) {
        match self.store.save(&self.user, self.tonality, &self.config) {
            Ok(()) => info!(user = self.user, tonality = %self.tonality, "Configuration saved"),
            Err(e) => warn!(error = %e, "Failed to save configuration"),
        }
    }

    fn panic(&mut self) {
        self.pressed.clear();
        self.active.clear();
        self.engine.panic();
    }

    /// Enqueues the bank's samples for decoding on a background thread.
    fn load_current_bank(&self) {
        let mut entries = Vec::new();
        for category in [SampleCategory::Treble, SampleCategory::Bass] {
            match self.inventory.list(&self.config.bank, category) {
                Ok(samples) => {
                    for sample in samples {
                        entries.push((sample.reference(category), sample.uri));
                    }
                }
                Err(e) => {
                    warn!(
                        bank = self.config.bank,
                        category = category.token(),
                        error = %e,
                        "Failed to read bank inventory"
                    );
                }
            }
        }
        self.engine.load_bank(&self.config.bank, entries);
    }

    fn start_voices(&self, prepared: &[Prepared]) -> Vec<Voice> {
        let mut voices = Vec::with_capacity(prepared.len());
        for note in prepared {
            let voice = match &note.source {
                PreparedSource::Sample {
                    reference,
                    pitch_shift,
                } => self
                    .engine
                    .play(&self.config.bank, reference, note.gain, *pitch_shift, false),
                PreparedSource::Tone { frequency } => {
                    self.engine.play_tone(*frequency, note.gain)
                }
            };
            if let Some(voice) = voice {
                voices.push(voice);
            }
        }
        voices
    }

    /// The prepared playback list for a button in one direction, rebuilding
    /// the fast map first if it is stale.
    fn prepared_for(&mut self, input: &ButtonInput, direction: BellowsDirection) -> Vec<Prepared> {
        if self.fast_map_dirty {
            self.rebuild_fast_map();
            self.fast_map_dirty = false;
        }
        self.fast_map
            .get(&input.id())
            .map(|entry| entry.for_direction(direction).to_vec())
            .unwrap_or_default()
    }

    fn rebuild_fast_map(&mut self) {
        let candidates = |category: SampleCategory| -> Vec<Candidate> {
            match self.inventory.list(&self.config.bank, category) {
                Ok(samples) => samples
                    .iter()
                    .map(|s| Candidate {
                        name: s.note.clone(),
                        octave: s.octave,
                        reference: s.reference(category),
                    })
                    .collect(),
                Err(e) => {
                    warn!(bank = self.config.bank, error = %e, "Inventory unavailable for fast map");
                    Vec::new()
                }
            }
        };
        let treble = candidates(SampleCategory::Treble);
        let bass = candidates(SampleCategory::Bass);

        let mut map: HashMap<String, FastMapEntry> = HashMap::new();
        for entry in self.layout.entries() {
            let input = ButtonInput {
                row: entry.coordinate.row,
                column: entry.coordinate.column,
                bass: entry.coordinate.bass,
            };
            let candidates = if entry.coordinate.bass { &bass } else { &treble };
            let prepared = self.prepare_entry(entry, &input, candidates);

            let slot = map.entry(input.id()).or_default();
            match entry.coordinate.direction {
                BellowsDirection::Pull => slot.pull = prepared,
                BellowsDirection::Push => slot.push = prepared,
            }
        }
        for key in self.config.overrides.keys() {
            if ButtonCoordinate::parse(key).is_none() {
                warn!(key, "Override key is not a valid button id, ignoring");
            }
        }

        self.fast_map = map;
        info!(
            tonality = %self.tonality,
            bank = self.config.bank,
            buttons = self.fast_map.len(),
            "Fast map rebuilt"
        );
    }

    /// Prepares one layout entry: per-button overrides win, then the nearest
    /// bank sample, then the synthesized tone if enabled, then nothing.
    fn prepare_entry(
        &self,
        entry: &LayoutEntry,
        input: &ButtonInput,
        candidates: &[Candidate],
    ) -> Vec<Prepared> {
        let extra =
            self.config.global_pitch + self.config.button_pitch.get(&input.id()).unwrap_or(&0);
        let gain = if entry.notes.len() > 1 {
            CHORD_NOTE_GAIN
        } else {
            NOTE_GAIN
        };

        if let Some(overrides) = self.config.overrides.get(&entry.coordinate.id()) {
            return overrides
                .refs
                .iter()
                .map(|raw| {
                    let pitched = PitchedReference::parse(raw);
                    Prepared {
                        gain,
                        source: PreparedSource::Sample {
                            reference: pitched.reference,
                            pitch_shift: pitched.pitch_shift + extra,
                        },
                    }
                })
                .collect();
        }

        let mut prepared = Vec::with_capacity(entry.notes.len());
        for note in &entry.notes {
            if let Some(resolution) = resolver::resolve(&note.name, note.octave, candidates) {
                prepared.push(Prepared {
                    gain,
                    source: PreparedSource::Sample {
                        reference: resolution.reference,
                        pitch_shift: resolution.pitch_shift + extra,
                    },
                });
            } else if self.config.fallback_tone && note.frequency > 0.0 {
                let frequency =
                    note.frequency * (extra as f32 / SEMITONES_PER_OCTAVE as f32).exp2();
                prepared.push(Prepared {
                    gain,
                    source: PreparedSource::Tone { frequency },
                });
            }
        }
        prepared
    }
}

#[cfg(test)]
impl Instrument {
    /// Whether a button sounds in either direction (test only).
    pub fn is_sounding(&self, input: &ButtonInput) -> bool {
        [BellowsDirection::Pull, BellowsDirection::Push]
            .iter()
            .any(|d| self.active.contains_key(&input.coordinate(*d).id()))
    }

    /// The sounding voices for a full button id (test only).
    pub fn voices_for(&self, full_id: &str) -> Vec<Voice> {
        self.active.get(full_id).cloned().unwrap_or_default()
    }

    /// The prepared playback list, as the press path would see it (test only).
    pub fn prepared(&mut self, input: &ButtonInput, direction: BellowsDirection) -> Vec<Prepared> {
        self.prepared_for(input, direction)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use crate::audio::{self, mock};
    use crate::config::{ConfigError, ConfigStore, InstrumentConfig, Override};
    use crate::engine::bank::DecodedSample;
    use crate::inventory::{InventoryEntry, InventoryError};
    use crate::layout::LayoutRegistry;
    use crate::theory::FrequencyTable;

    use super::*;

    struct MemStore {
        config: InstrumentConfig,
        saved: Mutex<Option<(String, Tonality)>>,
    }

    impl MemStore {
        fn new(config: InstrumentConfig) -> MemStore {
            MemStore {
                config,
                saved: Mutex::new(None),
            }
        }
    }

    impl ConfigStore for MemStore {
        fn load(&self, _: &str, _: Tonality) -> Result<InstrumentConfig, ConfigError> {
            Ok(self.config.clone())
        }

        fn save(
            &self,
            user: &str,
            tonality: Tonality,
            _: &InstrumentConfig,
        ) -> Result<(), ConfigError> {
            *self.saved.lock().expect("lock") = Some((user.to_string(), tonality));
            Ok(())
        }
    }

    struct MemInventory {
        treble: Vec<InventoryEntry>,
        bass: Vec<InventoryEntry>,
    }

    impl MemInventory {
        fn empty() -> MemInventory {
            MemInventory {
                treble: Vec::new(),
                bass: Vec::new(),
            }
        }

        fn with_treble(notes: &[(&str, i32)]) -> MemInventory {
            MemInventory {
                treble: notes
                    .iter()
                    .map(|(note, octave)| InventoryEntry {
                        note: note.to_string(),
                        octave: *octave,
                        uri: std::path::PathBuf::from(format!("{}{}.wav", note, octave)),
                    })
                    .collect(),
                bass: Vec::new(),
            }
        }
    }

    impl crate::inventory::Inventory for MemInventory {
        fn list(
            &self,
            _: &str,
            category: SampleCategory,
        ) -> Result<Vec<InventoryEntry>, InventoryError> {
            Ok(match category {
                SampleCategory::Treble => self.treble.clone(),
                SampleCategory::Bass => self.bass.clone(),
            })
        }
    }

    struct Fixture {
        instrument: Instrument,
        engine: Arc<Engine>,
        device: Arc<mock::Device>,
    }

    fn fixture(config: InstrumentConfig, inventory: MemInventory) -> Fixture {
        let device = Arc::new(mock::Device::get("mock-instrument"));
        let engine = Engine::new(device.clone() as Arc<dyn audio::Device>).expect("engine");
        let registry = LayoutRegistry::new(&FrequencyTable::new());
        let instrument = Instrument::new(
            engine.clone(),
            registry,
            Arc::new(inventory),
            Arc::new(MemStore::new(config)),
            "tester",
            Tonality::C,
        );
        Fixture {
            instrument,
            engine,
            device,
        }
    }

    fn loaded_sample() -> DecodedSample {
        DecodedSample::new(vec![0.5; 44100], 1, mock::MOCK_SAMPLE_RATE)
    }

    fn button(row: u8, column: u8) -> ButtonInput {
        ButtonInput {
            row,
            column,
            bass: false,
        }
    }

    #[test]
    fn test_press_resolves_nearest_sample() {
        let mut f = fixture(
            InstrumentConfig {
                fallback_tone: false,
                ..Default::default()
            },
            MemInventory::with_treble(&[("C", 4), ("G", 4)]),
        );

        // Row 2 pull, column 2 sounds D4: C4 is the nearer recording, played
        // up 2 semitones.
        let prepared = f
            .instrument
            .prepared(&button(2, 2), BellowsDirection::Pull);
        assert_eq!(prepared.len(), 1);
        assert_eq!(
            prepared[0].source,
            PreparedSource::Sample {
                reference: "treble/C4".to_string(),
                pitch_shift: 2,
            }
        );

        f.engine
            .insert_sample_for_test("default", "treble/C4", loaded_sample());
        f.instrument.handle_event(Event::ButtonDown(button(2, 2)));
        assert!(f.instrument.is_sounding(&button(2, 2)));
        assert_eq!(f.engine.active_voices(), 1);
    }

    #[test]
    fn test_no_sample_no_fallback_is_silent() {
        let mut f = fixture(
            InstrumentConfig {
                fallback_tone: false,
                ..Default::default()
            },
            MemInventory::empty(),
        );

        f.instrument.handle_event(Event::ButtonDown(button(1, 1)));
        assert!(!f.instrument.is_sounding(&button(1, 1)));
        assert_eq!(f.engine.active_voices(), 0);

        // The press is still tracked: releasing it is harmless.
        f.instrument.handle_event(Event::ButtonUp(button(1, 1)));
    }

    #[test]
    fn test_tone_fallback() {
        let mut f = fixture(InstrumentConfig::default(), MemInventory::empty());

        let prepared = f
            .instrument
            .prepared(&button(1, 1), BellowsDirection::Pull);
        assert_eq!(prepared.len(), 1);
        match &prepared[0].source {
            // Row 1 pull, column 1 is F#3.
            PreparedSource::Tone { frequency } => assert!((frequency - 185.0).abs() < 0.1),
            other => panic!("expected tone fallback, got {:?}", other),
        }

        f.instrument.handle_event(Event::ButtonDown(button(1, 1)));
        assert!(f.instrument.is_sounding(&button(1, 1)));
        assert_eq!(f.engine.active_voices(), 1);
    }

    #[test]
    fn test_retrigger_is_noop() {
        let mut f = fixture(InstrumentConfig::default(), MemInventory::empty());

        f.instrument.handle_event(Event::ButtonDown(button(1, 1)));
        let voices = f.instrument.voices_for("1-1-pull");
        assert_eq!(voices.len(), 1);

        f.instrument.handle_event(Event::ButtonDown(button(1, 1)));
        let after = f.instrument.voices_for("1-1-pull");
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].id(), voices[0].id());
        assert!(!after[0].is_stopping());
        assert_eq!(f.engine.active_voices(), 1);
    }

    #[test]
    fn test_bellows_migration_starts_before_stops() {
        let mut f = fixture(InstrumentConfig::default(), MemInventory::empty());

        f.instrument.handle_event(Event::ButtonDown(button(1, 1)));
        let pull_voices = f.instrument.voices_for("1-1-pull");
        assert_eq!(pull_voices.len(), 1);

        f.instrument.handle_event(Event::BellowsPress);
        assert_eq!(f.instrument.bellows(), BellowsDirection::Push);

        // The old voice is fading, the new one is not; the new voice was
        // started before the old one was released.
        let push_voices = f.instrument.voices_for("1-1-push");
        assert_eq!(push_voices.len(), 1);
        assert!(pull_voices[0].is_stopping());
        assert!(!push_voices[0].is_stopping());
        assert!(push_voices[0].id() > pull_voices[0].id());
        assert!(f.instrument.voices_for("1-1-pull").is_empty());

        // Releasing the bellows control migrates back.
        f.instrument.handle_event(Event::BellowsRelease);
        assert_eq!(f.instrument.bellows(), BellowsDirection::Pull);
        assert!(push_voices[0].is_stopping());
        assert_eq!(f.instrument.voices_for("1-1-pull").len(), 1);
    }

    #[test]
    fn test_button_up_stops_across_directions() {
        let mut f = fixture(InstrumentConfig::default(), MemInventory::empty());

        f.instrument.handle_event(Event::ButtonDown(button(1, 1)));
        f.instrument.handle_event(Event::BellowsPress);
        let push_voices = f.instrument.voices_for("1-1-push");
        assert_eq!(push_voices.len(), 1);

        f.instrument.handle_event(Event::ButtonUp(button(1, 1)));
        assert!(push_voices[0].is_stopping());
        assert!(!f.instrument.is_sounding(&button(1, 1)));

        // The released button no longer migrates.
        f.instrument.handle_event(Event::BellowsRelease);
        assert_eq!(f.instrument.voices_for("1-1-pull").len(), 0);
    }

    #[test]
    fn test_override_wins_over_inventory() {
        let mut config = InstrumentConfig {
            fallback_tone: false,
            ..Default::default()
        };
        config.overrides.insert(
            "2-2-pull".to_string(),
            Override {
                refs: vec!["pitch:-1|treble/A4".to_string()],
            },
        );
        let mut f = fixture(config, MemInventory::with_treble(&[("D", 4)]));

        // The exact D4 recording exists, but the override replaces it.
        let prepared = f
            .instrument
            .prepared(&button(2, 2), BellowsDirection::Pull);
        assert_eq!(prepared.len(), 1);
        assert_eq!(
            prepared[0].source,
            PreparedSource::Sample {
                reference: "treble/A4".to_string(),
                pitch_shift: -1,
            }
        );

        // Other buttons still resolve from the inventory.
        let other = f
            .instrument
            .prepared(&button(2, 4), BellowsDirection::Pull);
        assert!(matches!(
            other[0].source,
            PreparedSource::Sample { ref reference, .. } if reference == "treble/D4"
        ));
    }

    #[test]
    fn test_pitch_adjustments_are_applied() {
        let mut config = InstrumentConfig {
            fallback_tone: false,
            global_pitch: -2,
            ..Default::default()
        };
        config.button_pitch.insert("2-2".to_string(), 1);
        let mut f = fixture(config, MemInventory::with_treble(&[("D", 4)]));

        // D4 resolves exactly; global -2 plus per-button +1 remains.
        let prepared = f
            .instrument
            .prepared(&button(2, 2), BellowsDirection::Pull);
        assert_eq!(
            prepared[0].source,
            PreparedSource::Sample {
                reference: "treble/D4".to_string(),
                pitch_shift: -1,
            }
        );
    }

    #[test]
    fn test_bass_chord_starts_one_voice_per_tone() {
        let mut f = fixture(InstrumentConfig::default(), MemInventory::empty());

        let bass = ButtonInput {
            row: 3,
            column: 2,
            bass: true,
        };
        // C major on the push side of bass button 2: three tones.
        f.instrument.handle_event(Event::BellowsPress);
        f.instrument.handle_event(Event::ButtonDown(bass));
        assert_eq!(f.instrument.voices_for("3-2-push-bass").len(), 3);
        assert_eq!(f.engine.active_voices(), 3);
    }

    #[test]
    fn test_set_tonality_stops_voices_and_remaps() {
        let mut f = fixture(InstrumentConfig::default(), MemInventory::empty());

        f.instrument.handle_event(Event::ButtonDown(button(1, 1)));
        let voices = f.instrument.voices_for("1-1-pull");
        let before = f
            .instrument
            .prepared(&button(1, 1), BellowsDirection::Pull);

        f.instrument.handle_event(Event::SetTonality(Tonality::G));
        assert_eq!(f.instrument.tonality(), Tonality::G);
        assert!(voices[0].is_stopping());
        assert!(!f.instrument.is_sounding(&button(1, 1)));

        // The same button now prepares a different pitch.
        let after = f
            .instrument
            .prepared(&button(1, 1), BellowsDirection::Pull);
        assert_ne!(before, after);
    }

    #[test]
    fn test_set_bank_rebuilds_fast_map() {
        let mut f = fixture(
            InstrumentConfig {
                fallback_tone: false,
                ..Default::default()
            },
            MemInventory::with_treble(&[("D", 4)]),
        );

        let before = f
            .instrument
            .prepared(&button(2, 2), BellowsDirection::Pull);
        assert_eq!(before.len(), 1);

        // Same inventory, different bank id: the prepared references stay,
        // but the engine is asked to load the new bank.
        f.instrument
            .handle_event(Event::SetBank("cajun".to_string()));
        assert_eq!(f.instrument.bank(), "cajun");
        let after = f
            .instrument
            .prepared(&button(2, 2), BellowsDirection::Pull);
        assert_eq!(before, after);
    }

    #[test]
    fn test_panic_clears_everything() {
        let mut f = fixture(InstrumentConfig::default(), MemInventory::empty());

        f.instrument.handle_event(Event::ButtonDown(button(1, 1)));
        f.instrument.handle_event(Event::ButtonDown(button(2, 3)));
        assert_eq!(f.engine.active_voices(), 2);

        f.instrument.handle_event(Event::Panic);
        assert_eq!(f.engine.active_voices(), 0);
        assert!(!f.instrument.is_sounding(&button(1, 1)));
        let out = f.device.render_frames(64);
        assert!(out.iter().all(|s| *s == 0.0));

        // Held buttons were forgotten; the bellows no longer migrates them.
        f.instrument.handle_event(Event::BellowsPress);
        assert_eq!(f.engine.active_voices(), 0);
    }

    #[test]
    fn test_save_goes_to_store() {
        let device = Arc::new(mock::Device::get("mock-instrument"));
        let engine = Engine::new(device as Arc<dyn audio::Device>).expect("engine");
        let registry = LayoutRegistry::new(&FrequencyTable::new());
        let store = Arc::new(MemStore::new(InstrumentConfig::default()));
        let mut instrument = Instrument::new(
            engine,
            registry,
            Arc::new(MemInventory::empty()),
            store.clone(),
            "tester",
            Tonality::A,
        );

        instrument.handle_event(Event::Save);
        assert_eq!(
            *store.saved.lock().expect("lock"),
            Some(("tester".to_string(), Tonality::A))
        );
    }
}
