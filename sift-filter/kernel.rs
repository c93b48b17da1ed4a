use sift_core::{ScaleSpaceError, ScaleSpaceResult};

/// Normalized, symmetric 1D Gaussian kernel.
///
/// `radius = max(1, ceil(3 * sigma))`, `len = 2 * radius + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianKernel {
    sigma: f64,
    radius: usize,
    weights: Vec<f32>,
}

impl GaussianKernel {
    pub fn new(sigma: f64) -> ScaleSpaceResult<Self> {
        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(ScaleSpaceError::InvalidConfiguration(format!(
                "gaussian sigma must be positive and finite, got {}",
                sigma
            )));
        }

        let radius = Self::radius_for_sigma(sigma);
        let denom = 2.0 * sigma * sigma;
        let raw: Vec<f64> = (0..2 * radius + 1)
            .map(|i| {
                let x = i as f64 - radius as f64;
                (-(x * x) / denom).exp()
            })
            .collect();

        // Normalize in f64 so the f32 weights sum to 1 within rounding
        let sum: f64 = raw.iter().sum();
        let weights = raw.into_iter().map(|w| (w / sum) as f32).collect();

        Ok(Self {
            sigma,
            radius,
            weights,
        })
    }

    pub fn radius_for_sigma(sigma: f64) -> usize {
        ((3.0 * sigma).ceil() as usize).max(1)
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn radius(&self) -> usize {
        self.radius
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}
