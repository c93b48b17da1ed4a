use crate::border::BorderMode;
use crate::error::{ScaleSpaceError, ScaleSpaceResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Deepest upsampling supported for the first octave (16x the input).
pub const MIN_FIRST_OCTAVE: i32 = -4;

/// Highest octave index accepted; octave images never drop below 1x1 anyway.
pub const MAX_LAST_OCTAVE: i32 = 30;

/// How the seed image of the next octave is reduced by a factor of two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DownsampleMode {
    /// Keep every second sample. Pixel `x` of the new octave is pixel `2x` of
    /// the previous one.
    #[default]
    Decimate,
    /// Mean of each 2x2 block, replicating the last row/column for odd sizes.
    AreaAverage,
}

/// Scale-space construction parameters, consumed once at construction.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ScaleSpaceConfig {
    /// First octave built. Negative values upsample the input.
    pub first_octave: i32,
    /// Last octave built, inclusive.
    pub last_octave: i32,
    /// Scale steps sampled per octave interval.
    pub scales_per_octave: usize,
    /// Absolute blur of octave 0, scale 0.
    pub base_sigma: f64,
    pub border: BorderMode,
    pub downsample: DownsampleMode,
    /// Keep at most this many of the most recent octaves. `None` keeps all.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub retain_octaves: Option<usize>,
    pub n_threads: usize,
}

impl Default for ScaleSpaceConfig {
    fn default() -> Self {
        Self::sift_preset()
    }
}

impl ScaleSpaceConfig {
    pub fn new(first_octave: i32, last_octave: i32, scales_per_octave: usize, base_sigma: f64) -> Self {
        Self {
            first_octave,
            last_octave,
            scales_per_octave,
            base_sigma,
            border: BorderMode::default(),
            downsample: DownsampleMode::default(),
            retain_octaves: None,
            n_threads: num_cpus::get().max(1),
        }
    }

    /// Lowe's parameters: input doubled, 3 scales per octave, sigma 1.6
    pub fn sift_preset() -> Self {
        Self::new(-1, 5, 3, 1.6)
    }

    /// Starts at the input resolution, cheaper on large images
    pub fn no_upsample_preset() -> Self {
        Self::new(0, 4, 3, 1.6)
    }

    pub fn with_border(mut self, border: BorderMode) -> Self {
        self.border = border;
        self
    }

    pub fn with_downsample(mut self, downsample: DownsampleMode) -> Self {
        self.downsample = downsample;
        self
    }

    pub fn with_retention(mut self, retain_octaves: Option<usize>) -> Self {
        self.retain_octaves = retain_octaves;
        self
    }

    pub fn with_threads(mut self, n_threads: usize) -> Self {
        self.n_threads = n_threads;
        self
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> ScaleSpaceResult<()> {
        if self.scales_per_octave < 1 {
            return Err(ScaleSpaceError::InvalidConfiguration(format!(
                "scales_per_octave must be at least 1, got {}",
                self.scales_per_octave
            )));
        }
        if self.last_octave < self.first_octave {
            return Err(ScaleSpaceError::InvalidConfiguration(format!(
                "last_octave {} is below first_octave {}",
                self.last_octave, self.first_octave
            )));
        }
        if !self.base_sigma.is_finite() || self.base_sigma <= 0.0 {
            return Err(ScaleSpaceError::InvalidConfiguration(format!(
                "base_sigma must be positive and finite, got {}",
                self.base_sigma
            )));
        }
        if self.first_octave < MIN_FIRST_OCTAVE {
            return Err(ScaleSpaceError::InvalidConfiguration(format!(
                "first_octave {} upsamples beyond octave {}",
                self.first_octave, MIN_FIRST_OCTAVE
            )));
        }
        if self.last_octave > MAX_LAST_OCTAVE {
            return Err(ScaleSpaceError::InvalidConfiguration(format!(
                "last_octave {} exceeds octave {}",
                self.last_octave, MAX_LAST_OCTAVE
            )));
        }
        if self.retain_octaves == Some(0) {
            return Err(ScaleSpaceError::InvalidConfiguration(
                "retain_octaves must keep at least one octave".to_string(),
            ));
        }
        Ok(())
    }

    /// Scale images stored per octave: the requested steps plus the three
    /// needed to seed the next octave and to bracket difference images.
    pub fn images_per_octave(&self) -> usize {
        self.scales_per_octave + 3
    }

    /// Number of octaves between `first_octave` and `last_octave` inclusive.
    pub fn total_octaves(&self) -> usize {
        (self.last_octave - self.first_octave + 1).max(0) as usize
    }

    /// Absolute blur of scale `k` in `octave`, in input pixel units:
    /// `base_sigma * 2^(octave + k / scales_per_octave)`.
    pub fn absolute_sigma(&self, octave: i32, k: usize) -> f64 {
        self.base_sigma * (octave as f64 + k as f64 / self.scales_per_octave as f64).exp2()
    }

    /// Blur of scale `k` measured in the pixels of its own octave. Identical
    /// for every octave.
    pub fn pixel_sigma(&self, k: usize) -> f64 {
        self.base_sigma * (k as f64 / self.scales_per_octave as f64).exp2()
    }

    /// Blur applied to scale `k - 1` to reach scale `k`, in octave pixels.
    /// For `k == 0` this is the full blur applied to the base image.
    pub fn incremental_sigma(&self, k: usize) -> f64 {
        if k == 0 {
            return self.pixel_sigma(0);
        }
        let target = self.pixel_sigma(k);
        let previous = self.pixel_sigma(k - 1);
        (target * target - previous * previous).sqrt()
    }

    /// Dimensions of `octave` for an input of `width` x `height`.
    pub fn octave_dimensions(width: usize, height: usize, octave: i32) -> (usize, usize) {
        (octave_length(width, octave), octave_length(height, octave))
    }

    /// Generate human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "ScaleSpaceConfig: octaves=[{}, {}], scales={}, sigma0={:.3}, border={:?}, downsample={:?}, retain={:?}, threads={}",
            self.first_octave,
            self.last_octave,
            self.scales_per_octave,
            self.base_sigma,
            self.border,
            self.downsample,
            self.retain_octaves,
            self.n_threads
        )
    }

    /// Serialize to JSON string
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML string
    #[cfg(feature = "serde")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Deserialize from TOML string
    #[cfg(feature = "serde")]
    pub fn from_toml(toml_str: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }
}

/// `round(len / 2^octave)` for non-negative octaves, `len * 2^-octave` below
/// zero. Never less than 1 for a non-empty input.
pub fn octave_length(len: usize, octave: i32) -> usize {
    if len == 0 {
        return 0;
    }
    if octave <= 0 {
        let shift = octave.unsigned_abs();
        return len.checked_shl(shift).filter(|v| v >> shift == len).unwrap_or(usize::MAX);
    }
    let shift = octave as u32;
    if shift >= usize::BITS {
        return 1;
    }
    let half = (1usize << shift) >> 1;
    (len.saturating_add(half) >> shift).max(1)
}
