//! Randomized parameter generation.

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use super::catalog::PresetCatalog;
use super::error::PresetError;
use super::types::{ModificationSettings, ParameterRange, Preset};

/// Draws [`ModificationSettings`] from a preset's ranges.
///
/// Every scalar is sampled independently and uniformly; the flip is a
/// Bernoulli draw with the preset's `flip_chance`. The random source is
/// owned by the generator so tests can pin it with [`ParameterGenerator::seeded`].
pub struct ParameterGenerator {
    catalog: Arc<PresetCatalog>,
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl ParameterGenerator {
    /// Creates a generator seeded from the operating system.
    pub fn new(catalog: Arc<PresetCatalog>) -> Self {
        Self::with_rng(catalog, Box::new(StdRng::from_os_rng()))
    }

    /// Creates a generator with a reproducible ChaCha8 stream.
    pub fn seeded(catalog: Arc<PresetCatalog>, seed: u64) -> Self {
        Self::with_rng(catalog, Box::new(ChaCha8Rng::seed_from_u64(seed)))
    }

    pub fn with_rng(catalog: Arc<PresetCatalog>, rng: Box<dyn RngCore + Send>) -> Self {
        Self {
            catalog,
            rng: Mutex::new(rng),
        }
    }

    pub fn catalog(&self) -> &Arc<PresetCatalog> {
        &self.catalog
    }

    /// Generates one settings draw for the named preset.
    pub fn generate(&self, preset_name: &str) -> Result<ModificationSettings, PresetError> {
        let preset = self.catalog.get(preset_name)?;
        let settings = self.draw(preset);
        debug!(preset = preset_name, ?settings, "Generated modification settings");
        Ok(settings)
    }

    /// Generates `count` independent draws for the named preset.
    pub fn generate_many(
        &self,
        preset_name: &str,
        count: usize,
    ) -> Result<Vec<ModificationSettings>, PresetError> {
        let preset = self.catalog.get(preset_name)?;
        Ok((0..count).map(|_| self.draw(preset)).collect())
    }

    fn draw(&self, preset: &Preset) -> ModificationSettings {
        let mut guard = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let rng = &mut **guard;
        let ranges = &preset.ranges;

        ModificationSettings {
            speed: sample(rng, &ranges.speed),
            brightness: sample(rng, &ranges.brightness),
            saturation: sample(rng, &ranges.saturation),
            crop: sample(rng, &ranges.crop),
            audio_pitch: sample(rng, &ranges.audio_pitch),
            flipped: rng.random_bool(ranges.flip_chance),
            rotation: sample(rng, &ranges.rotation),
            noise: sample(rng, &ranges.noise),
        }
    }
}

fn sample<R: Rng + ?Sized>(rng: &mut R, range: &ParameterRange) -> f64 {
    if range.is_fixed() {
        return range.min;
    }
    rng.random_range(range.min..=range.max)
}
