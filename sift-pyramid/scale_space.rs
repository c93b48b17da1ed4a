use std::collections::VecDeque;
use std::sync::Arc;

use log::{debug, info, trace, warn};
use sift_core::{Image, ScaleSpaceConfig, ScaleSpaceError, ScaleSpaceResult};
use sift_filter::{BilinearResampler, GaussianBlur, Resampler, SeparableGaussian};

use crate::octave::Octave;

/// Where the octave cursor of a [`ScaleSpace`] stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PyramidState {
    /// `initialize` has not succeeded yet
    Uninitialized,
    /// `octave` is built and more octaves can follow
    Ready { octave: i32 },
    /// `octave` is the last configured octave
    Exhausted { octave: i32 },
}

impl PyramidState {
    pub fn current_octave(self) -> Option<i32> {
        match self {
            PyramidState::Uninitialized => None,
            PyramidState::Ready { octave } | PyramidState::Exhausted { octave } => Some(octave),
        }
    }
}

/// Outcome of a single [`ScaleSpace::advance`] transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// A new octave was built and became current
    Built { octave: i32 },
    /// The last octave was already current; nothing changed
    Exhausted,
}

/// Multi-octave Gaussian scale space, built one octave at a time.
///
/// Scale `k` of octave `i` carries an absolute blur of
/// `base_sigma * 2^(i + k / scales_per_octave)` input pixels. Pixel `x` of
/// octave `i` sits at input coordinate `x * 2^i`.
///
/// ```ignore
/// let mut space = ScaleSpace::new(ScaleSpaceConfig::new(-1, 5, 3, 1.6));
/// space.initialize(&image)?;
/// loop {
///     let octave = space.current_octave()?;
///     // consume octave.images() ...
///     if !space.compute_next_octave()? {
///         break;
///     }
/// }
/// ```
pub struct ScaleSpace {
    config: ScaleSpaceConfig,
    blur: Box<dyn GaussianBlur>,
    resampler: Box<dyn Resampler>,
    input_dims: (usize, usize),
    octaves: VecDeque<Arc<Octave>>,
    state: PyramidState,
}

impl std::fmt::Debug for ScaleSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScaleSpace")
            .field("config", &self.config)
            .field("input_dims", &self.input_dims)
            .field("retained", &self.octaves.iter().map(|o| o.index()).collect::<Vec<_>>())
            .field("state", &self.state)
            .finish()
    }
}

impl ScaleSpace {
    /// Scale space using the separable Gaussian and bilinear resampler,
    /// configured with the border and downsample modes of `config`.
    ///
    /// The configuration is validated by [`ScaleSpace::initialize`].
    pub fn new(config: ScaleSpaceConfig) -> Self {
        let blur = SeparableGaussian::new(config.border);
        let resampler = BilinearResampler::new(config.downsample);
        Self::with_processing(config, blur, resampler)
    }

    /// Scale space with caller supplied blur and resampling primitives.
    pub fn with_processing<B, R>(config: ScaleSpaceConfig, blur: B, resampler: R) -> Self
    where
        B: GaussianBlur + 'static,
        R: Resampler + 'static,
    {
        Self {
            config,
            blur: Box::new(blur),
            resampler: Box::new(resampler),
            input_dims: (0, 0),
            octaves: VecDeque::new(),
            state: PyramidState::Uninitialized,
        }
    }

    pub fn config(&self) -> &ScaleSpaceConfig {
        &self.config
    }

    pub fn state(&self) -> PyramidState {
        self.state
    }

    /// Dimensions of the image passed to the last successful `initialize`.
    pub fn input_dimensions(&self) -> (usize, usize) {
        self.input_dims
    }

    /// Configured number of octaves, `last_octave - first_octave + 1`.
    pub fn total_octaves(&self) -> usize {
        self.config.total_octaves()
    }

    /// Discards any previous pyramid and builds the first octave from `source`.
    ///
    /// On error the previous pyramid, if any, is left untouched.
    pub fn initialize(&mut self, source: &Image) -> ScaleSpaceResult<()> {
        self.config.validate()?;
        if source.is_empty() {
            return Err(ScaleSpaceError::EmptyInput {
                width: source.width(),
                height: source.height(),
            });
        }

        let first = self.config.first_octave;
        let (src_w, src_h) = source.dimensions();
        let (width, height) = ScaleSpaceConfig::octave_dimensions(src_w, src_h, first);
        info!(
            "initializing scale space from {}x{} input, octaves [{}, {}], first octave {}x{}",
            src_w, src_h, first, self.config.last_octave, width, height
        );

        let scale0 = match first {
            f if f < 0 => {
                let working = self.resampler.upsample(source, 1usize << f.unsigned_abs())?;
                self.blurred(&working, self.config.incremental_sigma(0))?
            }
            0 => self.blurred(source, self.config.incremental_sigma(0))?,
            f => {
                if collapsed(src_w, f) || collapsed(src_h, f) {
                    warn!("octave {} collapsed to {}x{}", f, width, height);
                }
                self.descend(source, f)?
            }
        };

        let octave = self.build_octave(first, scale0)?;

        self.input_dims = (src_w, src_h);
        self.octaves.clear();
        self.octaves.push_back(Arc::new(octave));
        self.state = self.state_at(first);
        Ok(())
    }

    /// Builds the next octave if there is one.
    ///
    /// The seed of octave `i + 1` is scale `scales_per_octave` of octave `i`,
    /// whose blur is exactly twice that of scale 0, reduced by two with no
    /// further blur. If the build fails the cursor stays where it was.
    pub fn advance(&mut self) -> ScaleSpaceResult<Advance> {
        let octave = match self.state {
            PyramidState::Uninitialized => return Err(ScaleSpaceError::NotInitialized),
            PyramidState::Exhausted { .. } => return Ok(Advance::Exhausted),
            PyramidState::Ready { octave } => octave,
        };

        let next = octave + 1;
        let (width, height) = ScaleSpaceConfig::octave_dimensions(self.input_dims.0, self.input_dims.1, next);
        if collapsed(self.input_dims.0, next) || collapsed(self.input_dims.1, next) {
            warn!("octave {} collapsed to {}x{}", next, width, height);
        }

        let current = self.shared_octave(octave)?;
        let seed_image = current.image(self.config.scales_per_octave)?;
        let scale0 = self.resampler.downsample_to(seed_image, width, height)?;
        let built = self.build_octave(next, scale0)?;

        self.octaves.push_back(Arc::new(built));
        if let Some(limit) = self.config.retain_octaves {
            while self.octaves.len() > limit {
                if let Some(released) = self.octaves.pop_front() {
                    debug!("released octave {}", released.index());
                }
            }
        }
        self.state = self.state_at(next);
        Ok(Advance::Built { octave: next })
    }

    /// Returns `true` if a new octave was built, `false` once the last
    /// configured octave is current.
    pub fn compute_next_octave(&mut self) -> ScaleSpaceResult<bool> {
        Ok(matches!(self.advance()?, Advance::Built { .. }))
    }

    pub fn current_octave_index(&self) -> ScaleSpaceResult<i32> {
        self.state.current_octave().ok_or(ScaleSpaceError::NotInitialized)
    }

    pub fn current_octave(&self) -> ScaleSpaceResult<&Octave> {
        let index = self.current_octave_index()?;
        self.octave(index)
    }

    /// Whether the current octave has a higher resolution than the input.
    pub fn is_octave_negative(&self) -> ScaleSpaceResult<bool> {
        Ok(self.current_octave_index()? < 0)
    }

    /// Size of one pixel of the current octave in input pixels, `2^octave`.
    pub fn pixel_scale_to_input(&self) -> ScaleSpaceResult<f64> {
        Ok((self.current_octave_index()? as f64).exp2())
    }

    /// Scale image `k` of the current octave.
    pub fn get_image_scale(&self, k: usize) -> ScaleSpaceResult<&Image> {
        self.current_octave()?.image(k)
    }

    /// Absolute blur of scale `k` of the current octave,
    /// `base_sigma * 2^(octave + k / scales_per_octave)`.
    pub fn sigma_at(&self, k: usize) -> ScaleSpaceResult<f64> {
        let octave = self.current_octave_index()?;
        let len = self.config.images_per_octave();
        if k >= len {
            return Err(ScaleSpaceError::IndexOutOfRange { index: k, len });
        }
        Ok(self.config.absolute_sigma(octave, k))
    }

    /// Difference of scale images `k + 1` and `k` of the current octave.
    pub fn difference_of_gaussian(&self, k: usize) -> ScaleSpaceResult<Image> {
        self.current_octave()?.difference_of_gaussian(k)
    }

    /// Any octave built since the last `initialize` and still retained.
    pub fn octave(&self, index: i32) -> ScaleSpaceResult<&Octave> {
        self.lookup(index).map(|octave| octave.as_ref())
    }

    /// Shared handle to a built octave, readable from other threads while
    /// this scale space keeps advancing.
    pub fn shared_octave(&self, index: i32) -> ScaleSpaceResult<Arc<Octave>> {
        self.lookup(index).map(Arc::clone)
    }

    /// Scale image addressed by `(octave, scale)`.
    pub fn image(&self, octave: i32, scale: usize) -> ScaleSpaceResult<&Image> {
        self.octave(octave)?.image(scale)
    }

    /// Retained octaves in increasing index order.
    pub fn octaves(&self) -> impl Iterator<Item = &Octave> + '_ {
        self.octaves.iter().map(|octave| octave.as_ref())
    }

    fn lookup(&self, index: i32) -> ScaleSpaceResult<&Arc<Octave>> {
        let current = self.current_octave_index()?;
        if index > current || index < self.config.first_octave {
            return Err(ScaleSpaceError::ExhaustedPyramid { octave: index });
        }
        let oldest = self.octaves.front().map(|o| o.index()).unwrap_or(current);
        if index < oldest {
            return Err(ScaleSpaceError::OctaveEvicted { octave: index });
        }
        self.octaves
            .get((index - oldest) as usize)
            .ok_or(ScaleSpaceError::ExhaustedPyramid { octave: index })
    }

    fn state_at(&self, octave: i32) -> PyramidState {
        if octave >= self.config.last_octave {
            PyramidState::Exhausted { octave }
        } else {
            PyramidState::Ready { octave }
        }
    }

    fn blurred(&self, input: &Image, sigma: f64) -> ScaleSpaceResult<Image> {
        let mut output = Image::new(input.width(), input.height());
        self.blur.blur(input, &mut output, sigma)?;
        Ok(output)
    }

    /// Scale 0 of octave `target > 0`, reached from octave 0 one halving at a
    /// time. Each step doubles the pixel blur, then reduces by two, so no
    /// kernel is wider than the one for `2 * base_sigma`.
    fn descend(&self, source: &Image, target: i32) -> ScaleSpaceResult<Image> {
        let (src_w, src_h) = source.dimensions();
        let base = self.config.pixel_sigma(0);
        let step = base * 3f64.sqrt();

        let mut current = self.blurred(source, base)?;
        for octave in 1..=target {
            let (width, height) = ScaleSpaceConfig::octave_dimensions(src_w, src_h, octave);
            trace!("descending to octave {} ({}x{})", octave, width, height);
            let doubled = self.blurred(&current, step)?;
            current = self.resampler.downsample_to(&doubled, width, height)?;
        }
        Ok(current)
    }

    /// Completes an octave from its already blurred scale 0 by incremental
    /// blurring, each scale from its predecessor.
    fn build_octave(&self, index: i32, scale0: Image) -> ScaleSpaceResult<Octave> {
        let count = self.config.images_per_octave();
        let mut images = Vec::with_capacity(count);
        images.push(scale0);

        for k in 1..count {
            let step = self.config.incremental_sigma(k);
            trace!("octave {} scale {}: incremental sigma {:.4}", index, k, step);
            let next = self.blurred(&images[k - 1], step)?;
            images.push(next);
        }

        let sigmas: Vec<f64> = (0..count).map(|k| self.config.absolute_sigma(index, k)).collect();
        let octave = Octave::new(index, images, sigmas);
        debug!(
            "built octave {} ({}x{}), sigma {:.3}..{:.3}",
            index,
            octave.width(),
            octave.height(),
            octave.sigmas().first().copied().unwrap_or_default(),
            octave.sigmas().last().copied().unwrap_or_default()
        );
        Ok(octave)
    }
}

/// True when `round(len0 / 2^octave)` is 0 and the octave was clamped to one pixel.
fn collapsed(len0: usize, octave: i32) -> bool {
    octave > 0 && len0 < 1usize << (octave - 1)
}
