use sift_core::{BorderMode, DownsampleMode, ScaleSpaceConfig, ScaleSpaceResult};
use sift_filter::{GaussianBlur, Resampler};

use crate::scale_space::ScaleSpace;

/// Builder for creating a validated [`ScaleSpace`]
#[derive(Debug, Clone, Default)]
pub struct ScaleSpaceBuilder {
    config: ScaleSpaceConfig,
}

impl ScaleSpaceBuilder {
    /// Create a new builder with the SIFT defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Create builder from existing configuration
    pub fn from_config(config: ScaleSpaceConfig) -> Self {
        Self { config }
    }

    /// Set the first and last octave, inclusive
    pub fn octaves(mut self, first: i32, last: i32) -> Self {
        self.config.first_octave = first;
        self.config.last_octave = last;
        self
    }

    pub fn first_octave(mut self, first: i32) -> Self {
        self.config.first_octave = first;
        self
    }

    pub fn last_octave(mut self, last: i32) -> Self {
        self.config.last_octave = last;
        self
    }

    /// Set the number of scale steps per octave
    pub fn scales_per_octave(mut self, scales: usize) -> Self {
        self.config.scales_per_octave = scales;
        self
    }

    /// Set the blur of octave 0, scale 0
    pub fn base_sigma(mut self, sigma: f64) -> Self {
        self.config.base_sigma = sigma;
        self
    }

    pub fn border(mut self, border: BorderMode) -> Self {
        self.config.border = border;
        self
    }

    pub fn downsample(mut self, mode: DownsampleMode) -> Self {
        self.config.downsample = mode;
        self
    }

    /// Keep only the `n` most recent octaves
    pub fn retain_octaves(mut self, n: usize) -> Self {
        self.config.retain_octaves = Some(n);
        self
    }

    /// Keep every octave built since `initialize`
    pub fn retain_all(mut self) -> Self {
        self.config.retain_octaves = None;
        self
    }

    /// Set the number of threads for parallel processing
    pub fn threads(mut self, n_threads: usize) -> Self {
        self.config.n_threads = n_threads;
        self
    }

    /// Apply the SIFT preset (input doubled, 3 scales, sigma 1.6)
    pub fn preset_sift(mut self) -> Self {
        self.config = ScaleSpaceConfig::sift_preset();
        self
    }

    /// Apply the preset that starts at input resolution
    pub fn preset_no_upsample(mut self) -> Self {
        self.config = ScaleSpaceConfig::no_upsample_preset();
        self
    }

    /// Build a scale space with the default blur and resampler
    pub fn build(self) -> ScaleSpaceResult<ScaleSpace> {
        self.config.validate()?;
        Ok(ScaleSpace::new(self.config))
    }

    /// Build a scale space with custom processing primitives
    pub fn build_with_processing<B, R>(self, blur: B, resampler: R) -> ScaleSpaceResult<ScaleSpace>
    where
        B: GaussianBlur + 'static,
        R: Resampler + 'static,
    {
        self.config.validate()?;
        Ok(ScaleSpace::with_processing(self.config, blur, resampler))
    }

    /// Generate summary of current configuration
    pub fn summary(&self) -> String {
        format!("ScaleSpaceBuilder: {}", self.config.summary())
    }

    pub fn config(&self) -> &ScaleSpaceConfig {
        &self.config
    }

    /// Convert to ScaleSpaceConfig
    pub fn to_config(self) -> ScaleSpaceConfig {
        self.config
    }
}
