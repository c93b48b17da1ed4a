use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sift_core::{
    octave_length, BorderMode, DownsampleMode, Image, ScaleSpaceConfig, ScaleSpaceError, ScaleSpaceResult,
    MAX_LAST_OCTAVE,
};
use sift_filter::{decimate, gaussian_blur, BilinearResampler, GaussianBlur, Resampler, SeparableGaussian};

use crate::{Advance, PyramidState, ScaleSpace, ScaleSpaceBuilder};

fn create_noise_image(width: usize, height: usize, seed: u64) -> Image {
    let mut rng = StdRng::seed_from_u64(seed);
    Image::from_fn(width, height, |_, _| rng.random_range(0.0..100.0))
}

fn create_impulse_image(width: usize, height: usize, x: usize, y: usize, value: f32) -> Image {
    let mut img = Image::new(width, height);
    img.set(x, y, value);
    img
}

/// Mean absolute difference between a reference blurred at input resolution
/// and an octave image, compared on the coarser of the two pixel grids.
fn mean_abs_error(expected: &Image, found: &Image, octave: i32) -> f64 {
    let mut total = 0.0;
    let mut count = 0usize;
    if found.width() > expected.width() {
        let scale = 1usize << octave.unsigned_abs();
        for y in 0..expected.height() {
            for x in 0..expected.width() {
                total += (expected.pixel(x, y) - found.pixel(x * scale, y * scale)).abs() as f64;
                count += 1;
            }
        }
    } else {
        let scale = 1usize << octave.max(0);
        for y in 0..found.height() {
            for x in 0..found.width() {
                if x * scale < expected.width() && y * scale < expected.height() {
                    total += (expected.pixel(x * scale, y * scale) - found.pixel(x, y)).abs() as f64;
                    count += 1;
                }
            }
        }
    }
    total / count as f64
}

/// Standard deviation of an image treated as a distribution, per axis.
fn measured_sigma(img: &Image) -> (f64, f64) {
    let mut m = 0.0;
    let mut mx = 0.0;
    let mut my = 0.0;
    for y in 0..img.height() {
        for x in 0..img.width() {
            let v = img.pixel(x, y) as f64;
            m += v;
            mx += v * x as f64;
            my += v * y as f64;
        }
    }
    let (cx, cy) = (mx / m, my / m);
    let mut vx = 0.0;
    let mut vy = 0.0;
    for y in 0..img.height() {
        for x in 0..img.width() {
            let v = img.pixel(x, y) as f64;
            vx += v * (x as f64 - cx).powi(2);
            vy += v * (y as f64 - cy).powi(2);
        }
    }
    ((vx / m).sqrt(), (vy / m).sqrt())
}

fn check_octave_blur(config: ScaleSpaceConfig, original: &Image) {
    let mut space = ScaleSpace::new(config.clone());
    space.initialize(original).unwrap();

    for i in config.first_octave..=config.last_octave {
        let sigma = config.absolute_sigma(i, 0);
        let expected = gaussian_blur(original, sigma, config.border).unwrap();
        let error = mean_abs_error(&expected, space.get_image_scale(0).unwrap(), i);
        assert!(
            error < 2.0,
            "first {} octave {} error = {}",
            config.first_octave,
            i,
            error
        );
        assert_eq!(i < config.last_octave, space.compute_next_octave().unwrap());
    }
}

#[test]
fn test_octave_blur_matches_direct_blur() {
    let original = create_noise_image(120, 136, 234);
    for first in -1..3 {
        check_octave_blur(ScaleSpaceConfig::new(first, 4, 2, 1.6), &original);
    }
}

#[test]
fn test_octave_blur_area_average_and_clamp() {
    let original = create_noise_image(97, 83, 99);
    let config = ScaleSpaceConfig::new(0, 3, 3, 1.6)
        .with_downsample(DownsampleMode::AreaAverage)
        .with_border(BorderMode::Clamp);
    check_octave_blur(config, &original);
}

#[test]
fn test_impulse_scenario() {
    let original = create_impulse_image(300, 340, 150, 170, 100.0);
    let mut space = ScaleSpace::new(ScaleSpaceConfig::new(-1, 5, 2, 1.6));
    space.initialize(&original).unwrap();

    let scale0 = space.get_image_scale(0).unwrap();
    assert_eq!(scale0.dimensions(), (600, 680));

    // Measured in upsampled pixels, reported in input pixels
    let (sx, sy) = measured_sigma(scale0);
    let pixel_scale = space.pixel_scale_to_input().unwrap();
    assert_eq!(pixel_scale, 0.5);
    // Bilinear doubling adds a variance of 0.5 upsampled pixels on top of base_sigma
    let expected = (1.6f64 * 1.6 + 0.5).sqrt() * pixel_scale;
    assert!((sx * pixel_scale - expected).abs() < 0.02, "sigma x {}", sx * pixel_scale);
    assert!((sy * pixel_scale - expected).abs() < 0.02, "sigma y {}", sy * pixel_scale);
    assert!((space.sigma_at(0).unwrap() - 0.8).abs() < 1e-12);

    for _ in 0..6 {
        assert!(space.compute_next_octave().unwrap());
    }
    assert!(!space.compute_next_octave().unwrap());
    assert!(!space.compute_next_octave().unwrap());
    assert_eq!(space.current_octave_index().unwrap(), 5);
    assert_eq!(space.state(), PyramidState::Exhausted { octave: 5 });
}

#[test]
fn test_advance_count_and_reinitialize() {
    let original = create_noise_image(40, 30, 1);
    let mut space = ScaleSpace::new(ScaleSpaceConfig::new(-2, 2, 3, 1.6));
    space.initialize(&original).unwrap();

    let mut built = Vec::new();
    while let Advance::Built { octave } = space.advance().unwrap() {
        built.push(octave);
    }
    assert_eq!(built, vec![-1, 0, 1, 2]);
    assert_eq!(space.advance().unwrap(), Advance::Exhausted);

    space.initialize(&original).unwrap();
    assert_eq!(space.state(), PyramidState::Ready { octave: -2 });
    assert!(space.compute_next_octave().unwrap());
    assert_eq!(space.current_octave_index().unwrap(), -1);
}

#[test]
fn test_single_octave_range_is_exhausted_immediately() {
    let mut space = ScaleSpace::new(ScaleSpaceConfig::new(1, 1, 2, 1.6));
    space.initialize(&create_noise_image(32, 32, 5)).unwrap();
    assert_eq!(space.state(), PyramidState::Exhausted { octave: 1 });
    assert!(!space.compute_next_octave().unwrap());
    assert_eq!(space.get_image_scale(0).unwrap().dimensions(), (16, 16));
}

#[test]
fn test_first_octave_above_zero_matches_advanced_pyramid() {
    let original = create_noise_image(90, 70, 31);
    let mut direct = ScaleSpace::new(ScaleSpaceConfig::new(2, 3, 2, 1.6));
    direct.initialize(&original).unwrap();
    assert_eq!(direct.current_octave().unwrap().dimensions(), (23, 18));

    let mut advanced = ScaleSpace::new(ScaleSpaceConfig::new(0, 3, 2, 1.6));
    advanced.initialize(&original).unwrap();
    advanced.compute_next_octave().unwrap();
    advanced.compute_next_octave().unwrap();

    for k in 0..4 {
        let error = mean_abs_error(
            advanced.get_image_scale(k).unwrap(),
            direct.get_image_scale(k).unwrap(),
            0,
        );
        assert!(error < 0.1, "scale {} error {}", k, error);
    }
}

#[test]
fn test_highest_first_octave_initializes_promptly() {
    let start = Instant::now();
    for first in [2, MAX_LAST_OCTAVE] {
        let mut space = ScaleSpace::new(ScaleSpaceConfig::new(first, MAX_LAST_OCTAVE, 1, 1.6));
        space.initialize(&Image::filled(4, 4, 1.0)).unwrap();
        let scale0 = space.get_image_scale(0).unwrap();
        assert_eq!(scale0.dimensions(), (1, 1));
        assert!((scale0.pixel(0, 0) - 1.0).abs() < 1e-3);
        assert!((space.sigma_at(0).unwrap() - 1.6 * (first as f64).exp2()).abs() < 1e-6 * (first as f64).exp2());
        while space.compute_next_octave().unwrap() {}
        assert_eq!(space.state(), PyramidState::Exhausted { octave: MAX_LAST_OCTAVE });
    }
    assert!(start.elapsed() < Duration::from_secs(10), "took {:?}", start.elapsed());
}

#[test]
fn test_sigma_monotonic_and_continuous() {
    let mut space = ScaleSpace::new(ScaleSpaceConfig::new(-1, 3, 3, 1.6));
    space.initialize(&create_noise_image(64, 48, 3)).unwrap();
    let images = space.config().images_per_octave();
    let scales = space.config().scales_per_octave;

    let mut previous: Option<(f64, f64)> = None;
    loop {
        let sigmas: Vec<f64> = (0..images).map(|k| space.sigma_at(k).unwrap()).collect();
        assert!(sigmas.windows(2).all(|w| w[1] > w[0]), "{:?}", sigmas);
        assert_eq!(space.current_octave().unwrap().sigmas(), &sigmas[..]);

        if let Some((prev_first, prev_seed)) = previous {
            assert!((sigmas[0] - 2.0 * prev_first).abs() < 1e-9);
            assert!((sigmas[0] - prev_seed).abs() < 1e-9);
        }
        previous = Some((sigmas[0], sigmas[scales]));

        if !space.compute_next_octave().unwrap() {
            break;
        }
    }
}

#[test]
fn test_resolution_halving() {
    let (w0, h0) = (301, 339);
    let mut space = ScaleSpace::new(ScaleSpaceConfig::new(-1, 6, 2, 1.6));
    space.initialize(&create_noise_image(w0, h0, 11)).unwrap();
    assert_eq!(space.current_octave().unwrap().dimensions(), (602, 678));

    let mut prev = space.current_octave().unwrap().dimensions();
    while space.compute_next_octave().unwrap() {
        let octave = space.current_octave().unwrap();
        let (w, h) = octave.dimensions();
        assert_eq!((w, h), (octave_length(w0, octave.index()), octave_length(h0, octave.index())));
        if octave.index() > 0 {
            assert!((2 * w).abs_diff(prev.0) <= 1, "{} -> {}", prev.0, w);
            assert!((2 * h).abs_diff(prev.1) <= 1, "{} -> {}", prev.1, h);
        }
        assert!(octave.images().iter().all(|img| img.dimensions() == (w, h)));
        prev = (w, h);
    }
}

#[test]
fn test_next_octave_seeded_without_extra_blur() {
    let mut space = ScaleSpace::new(ScaleSpaceConfig::new(0, 2, 2, 1.6));
    space.initialize(&create_noise_image(50, 41, 8)).unwrap();

    let seed = space.get_image_scale(2).unwrap().clone();
    assert!(space.compute_next_octave().unwrap());
    let expected = decimate(&seed, 2, 25, 21).unwrap();
    assert_eq!(space.get_image_scale(0).unwrap(), &expected);
}

#[test]
fn test_incremental_chain_matches_direct_blur() {
    let config = ScaleSpaceConfig::new(0, 0, 3, 1.6);
    let mut space = ScaleSpace::new(config.clone());
    space.initialize(&create_noise_image(80, 70, 21)).unwrap();
    let octave = space.current_octave().unwrap();
    let scale0 = octave.image(0).unwrap();

    for k in 1..octave.len() {
        let target = config.pixel_sigma(k);
        let base = config.pixel_sigma(0);
        let direct = gaussian_blur(scale0, (target * target - base * base).sqrt(), config.border).unwrap();
        let error = mean_abs_error(&direct, octave.image(k).unwrap(), 0);
        assert!(error < 0.1, "scale {} error {}", k, error);
    }
}

#[test]
fn test_query_errors() {
    let mut space = ScaleSpace::new(ScaleSpaceConfig::new(0, 2, 2, 1.6));
    assert!(matches!(space.get_image_scale(0), Err(ScaleSpaceError::NotInitialized)));
    assert!(matches!(space.sigma_at(0), Err(ScaleSpaceError::NotInitialized)));
    assert!(matches!(space.compute_next_octave(), Err(ScaleSpaceError::NotInitialized)));

    space.initialize(&create_noise_image(20, 20, 2)).unwrap();
    assert!(space.get_image_scale(4).is_ok());
    assert!(matches!(
        space.get_image_scale(5),
        Err(ScaleSpaceError::IndexOutOfRange { index: 5, len: 5 })
    ));
    assert!(matches!(
        space.sigma_at(5),
        Err(ScaleSpaceError::IndexOutOfRange { index: 5, len: 5 })
    ));
    assert!(matches!(space.octave(1), Err(ScaleSpaceError::ExhaustedPyramid { octave: 1 })));
    assert!(matches!(space.octave(-1), Err(ScaleSpaceError::ExhaustedPyramid { octave: -1 })));
    assert!(matches!(
        space.difference_of_gaussian(4),
        Err(ScaleSpaceError::IndexOutOfRange { index: 4, len: 4 })
    ));
}

#[test]
fn test_invalid_configuration_and_empty_input() {
    let img = create_noise_image(10, 10, 4);
    for config in [
        ScaleSpaceConfig::new(0, 2, 0, 1.6),
        ScaleSpaceConfig::new(2, 0, 2, 1.6),
        ScaleSpaceConfig::new(0, 2, 2, 0.0),
        ScaleSpaceConfig::new(0, 2, 2, -0.5),
    ] {
        let mut space = ScaleSpace::new(config);
        assert!(matches!(
            space.initialize(&img),
            Err(ScaleSpaceError::InvalidConfiguration(_))
        ));
        assert_eq!(space.state(), PyramidState::Uninitialized);
    }

    let mut space = ScaleSpace::new(ScaleSpaceConfig::new(0, 2, 2, 1.6));
    assert!(matches!(
        space.initialize(&Image::new(0, 10)),
        Err(ScaleSpaceError::EmptyInput { width: 0, height: 10 })
    ));
}

#[test]
fn test_failed_initialize_keeps_previous_pyramid() {
    let mut space = ScaleSpace::new(ScaleSpaceConfig::new(0, 2, 2, 1.6));
    space.initialize(&create_noise_image(16, 16, 6)).unwrap();
    assert!(space.compute_next_octave().unwrap());
    let before = space.get_image_scale(0).unwrap().clone();

    assert!(space.initialize(&Image::new(5, 0)).is_err());
    assert_eq!(space.current_octave_index().unwrap(), 1);
    assert_eq!(space.get_image_scale(0).unwrap(), &before);
}

#[test]
fn test_earlier_octaves_remain_queryable() {
    let mut space = ScaleSpace::new(ScaleSpaceConfig::new(-1, 2, 2, 1.6));
    space.initialize(&create_noise_image(24, 20, 12)).unwrap();
    let first = space.get_image_scale(3).unwrap().clone();
    while space.compute_next_octave().unwrap() {}

    assert_eq!(space.octaves().count(), 4);
    assert_eq!(space.image(-1, 3).unwrap(), &first);
    assert_eq!(space.octave(0).unwrap().dimensions(), (24, 20));
    assert_eq!(space.octave(2).unwrap().index(), 2);
    assert!((space.octave(1).unwrap().sigma(0).unwrap() - 3.2).abs() < 1e-12);
}

#[test]
fn test_retention_releases_old_octaves() {
    let mut space = ScaleSpaceBuilder::new()
        .octaves(0, 4)
        .scales_per_octave(2)
        .retain_octaves(2)
        .build()
        .unwrap();
    space.initialize(&create_noise_image(64, 64, 13)).unwrap();
    while space.compute_next_octave().unwrap() {}

    let retained: Vec<i32> = space.octaves().map(|o| o.index()).collect();
    assert_eq!(retained, vec![3, 4]);
    assert!(matches!(space.octave(2), Err(ScaleSpaceError::OctaveEvicted { octave: 2 })));
    assert!(space.octave(3).is_ok());
}

#[test]
fn test_shared_octave_outlives_advance() {
    let mut space = ScaleSpace::new(ScaleSpaceConfig::new(0, 3, 2, 1.6).with_retention(Some(1)));
    space.initialize(&create_noise_image(48, 48, 14)).unwrap();
    let shared = space.shared_octave(0).unwrap();
    let expected_mean = shared.image(0).unwrap().mean();

    std::thread::scope(|scope| {
        let reader = scope.spawn({
            let shared = Arc::clone(&shared);
            move || shared.images().iter().map(Image::mean).collect::<Vec<_>>()
        });
        while space.compute_next_octave().unwrap() {}
        let means = reader.join().unwrap();
        assert_eq!(means.len(), 5);
        assert_eq!(means[0], expected_mean);
    });

    assert!(matches!(space.octave(0), Err(ScaleSpaceError::OctaveEvicted { octave: 0 })));
    assert_eq!(shared.index(), 0);
}

#[test]
fn test_difference_of_gaussian() {
    let mut space = ScaleSpace::new(ScaleSpaceConfig::new(0, 1, 2, 1.6));
    space.initialize(&create_noise_image(32, 24, 15)).unwrap();

    for k in 0..4 {
        let dog = space.difference_of_gaussian(k).unwrap();
        let upper = space.get_image_scale(k + 1).unwrap();
        let lower = space.get_image_scale(k).unwrap();
        for ((d, u), l) in dog.data().iter().zip(upper.data()).zip(lower.data()) {
            assert_eq!(*d, u - l);
        }
    }
    assert_eq!(space.current_octave().unwrap().difference_of_gaussians().unwrap().len(), 4);
}

#[test]
fn test_tiny_image_collapses_to_one_pixel() {
    let mut space = ScaleSpace::new(ScaleSpaceConfig::new(-1, 4, 2, 1.6));
    space.initialize(&Image::filled(1, 1, 9.0)).unwrap();
    assert_eq!(space.current_octave().unwrap().dimensions(), (2, 2));
    while space.compute_next_octave().unwrap() {
        assert_eq!(space.current_octave().unwrap().dimensions(), (1, 1));
        assert!((space.get_image_scale(0).unwrap().pixel(0, 0) - 9.0).abs() < 1e-3);
    }
    assert_eq!(space.current_octave_index().unwrap(), 4);
}

struct CountingBlur {
    inner: SeparableGaussian,
    calls: Arc<AtomicUsize>,
}

impl GaussianBlur for CountingBlur {
    fn blur(&self, input: &Image, output: &mut Image, sigma: f64) -> ScaleSpaceResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.blur(input, output, sigma)
    }
}

struct FailingResampler;

impl Resampler for FailingResampler {
    fn upsample(&self, image: &Image, factor: usize) -> ScaleSpaceResult<Image> {
        BilinearResampler::default().upsample(image, factor)
    }

    fn downsample_to(&self, image: &Image, _width: usize, _height: usize) -> ScaleSpaceResult<Image> {
        Err(ScaleSpaceError::DimensionMismatch {
            expected: (0, 0),
            actual: image.dimensions(),
        })
    }
}

#[test]
fn test_blur_calls_per_octave() {
    let calls = Arc::new(AtomicUsize::new(0));
    let blur = CountingBlur {
        inner: SeparableGaussian::default(),
        calls: Arc::clone(&calls),
    };
    let mut space = ScaleSpaceBuilder::new()
        .octaves(-1, 1)
        .scales_per_octave(3)
        .build_with_processing(blur, BilinearResampler::default())
        .unwrap();

    space.initialize(&create_noise_image(16, 16, 16)).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 6);
    assert!(space.compute_next_octave().unwrap());
    assert_eq!(calls.load(Ordering::SeqCst), 11);
}

#[test]
fn test_failed_advance_keeps_cursor() {
    let mut space = ScaleSpace::with_processing(
        ScaleSpaceConfig::new(-1, 2, 2, 1.6),
        SeparableGaussian::default(),
        FailingResampler,
    );
    space.initialize(&create_noise_image(12, 10, 17)).unwrap();
    assert!(space.compute_next_octave().is_err());
    assert_eq!(space.state(), PyramidState::Ready { octave: -1 });
    assert_eq!(space.octaves().count(), 1);
    assert!(space.get_image_scale(0).is_ok());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_advances_match_octave_range(
        w in 1usize..24,
        h in 1usize..24,
        first in -1i32..2,
        extra in 0i32..4,
        scales in 1usize..4,
    ) {
        let last = first + extra;
        let mut space = ScaleSpace::new(ScaleSpaceConfig::new(first, last, scales, 1.2));
        space.initialize(&Image::filled(w, h, 1.0)).unwrap();

        let mut advances = 0;
        while space.compute_next_octave().unwrap() {
            advances += 1;
            let octave = space.current_octave().unwrap();
            prop_assert_eq!(octave.len(), scales + 3);
            prop_assert_eq!(
                octave.dimensions(),
                ScaleSpaceConfig::octave_dimensions(w, h, octave.index())
            );
        }
        prop_assert_eq!(advances, extra);
        prop_assert!(!space.compute_next_octave().unwrap());
    }
}
