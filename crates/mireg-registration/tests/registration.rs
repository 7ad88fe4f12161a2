use std::io;
use std::sync::{Arc, Mutex};

use burn::backend::Autodiff;
use burn_ndarray::NdArray;
use mireg_core::image::Image;
use mireg_core::spatial::{Direction, Point, Spacing};
use mireg_core::tensor;
use mireg_core::transform::{CenteredTransformInitializer, InitializerMode, ParametricTransform, RigidTransform, TranslationTransform};
use mireg_registration::{
    multires_registration_with, GradientDescentConfig, HistoryCallback, MetricConfig, MultiResolutionSchedule,
    RegistrationConfig, RegistrationError, SamplingConfig, SamplingStrategy, StopCondition,
};

type B = Autodiff<NdArray<f32>>;

const SIZE: usize = 16;

/// Gaussian blob centred at `center` (physical, mm) on a 16^3 grid with unit
/// spacing and the origin at zero.
fn blob(center: [f32; 3], origin: [f64; 3]) -> Image<B, 3> {
    let device = Default::default();
    let mut values = Vec::with_capacity(SIZE * SIZE * SIZE);
    for z in 0..SIZE {
        for y in 0..SIZE {
            for x in 0..SIZE {
                let p = [x as f32 + origin[0] as f32, y as f32 + origin[1] as f32, z as f32 + origin[2] as f32];
                let r2: f32 = p.iter().zip(center).map(|(a, c)| (a - c).powi(2)).sum();
                values.push(100.0 * (-r2 / 18.0).exp());
            }
        }
    }
    Image::new(
        tensor::from_vec(values, [SIZE, SIZE, SIZE], &device),
        Point::new(origin),
        Spacing::uniform(1.0),
        Direction::identity(),
    )
}

fn config(schedule: MultiResolutionSchedule, seed: u64) -> RegistrationConfig {
    RegistrationConfig {
        sampling: SamplingConfig {
            strategy: SamplingStrategy::Random,
            percentage: 0.2,
            seed: Some(seed),
        },
        optimizer: GradientDescentConfig {
            maximum_step_size_in_physical_units: Some(0.25),
            ..Default::default()
        },
        schedule,
        ..Default::default()
    }
}

fn single_level() -> MultiResolutionSchedule {
    MultiResolutionSchedule::new(vec![1], vec![0.0])
}

fn translation_of(transform: &TranslationTransform<B, 3>) -> Vec<f64> {
    transform.parameter_values()
}

#[test]
fn mattes_recovers_a_translation() {
    let fixed = blob([7.5, 7.5, 7.5], [0.0; 3]);
    let moving = blob([9.0, 6.5, 8.0], [0.0; 3]);
    let initial = TranslationTransform::<B, 3>::identity(&fixed.device());

    let result = multires_registration_with(&fixed, &moving, &initial, &config(single_level(), 3)).unwrap();
    let t = translation_of(&result.transform);
    for (got, want) in t.iter().zip([1.5, -1.0, 0.5]) {
        assert!((got - want).abs() < 0.5, "translation {t:?}");
    }
    assert!(result.metric_value.is_finite());
    assert!(result.metric_value < 0.0);
    assert_eq!(result.levels.len(), 1);
}

#[test]
fn mean_squares_recovers_a_translation() {
    let fixed = blob([7.5, 7.5, 7.5], [0.0; 3]);
    let moving = blob([8.5, 7.0, 7.5], [0.0; 3]);
    let initial = TranslationTransform::<B, 3>::identity(&fixed.device());
    let mut cfg = config(single_level(), 5);
    cfg.metric = MetricConfig::MeanSquares;

    let result = multires_registration_with(&fixed, &moving, &initial, &cfg).unwrap();
    let t = translation_of(&result.transform);
    for (got, want) in t.iter().zip([1.0, -0.5, 0.0]) {
        assert!((got - want).abs() < 0.3, "translation {t:?}");
    }
}

#[test]
fn three_level_rigid_run_reports_every_level() {
    let fixed = blob([7.5, 7.5, 7.5], [0.0; 3]);
    let moving = blob([8.0, 7.5, 7.0], [0.0; 3]);
    let initial: RigidTransform<B, 3> =
        CenteredTransformInitializer::new(InitializerMode::Geometry).initialize(&fixed, &moving);
    let before = initial.parameter_values();

    let schedule = MultiResolutionSchedule::new(vec![4, 2, 1], vec![2.0, 1.0, 0.0]);
    let result = multires_registration_with(&fixed, &moving, &initial, &config(schedule, 11)).unwrap();

    assert_eq!(result.levels.len(), 3);
    assert_eq!(result.levels[0].shape, vec![4, 4, 4]);
    assert_eq!(result.levels[2].shape, vec![16, 16, 16]);
    assert!(result.levels.iter().all(|l| l.metric_value.is_finite()));
    assert!(result.levels.iter().all(|l| l.iterations >= 1 && l.iterations <= 100));
    assert!(result.stop_condition.starts_with("GradientDescentOptimizer: "));

    // Rotation scales exceed translation scales on every level.
    for level in &result.levels {
        assert!(level.scales[0] > level.scales[3], "{:?}", level.scales);
    }

    // The caller's transform is untouched.
    assert_eq!(initial.parameter_values(), before);

    let t = result.transform.parameter_values();
    assert!(t.iter().all(|v| v.is_finite()));
    assert!((t[3] - 0.5).abs() < 1.0 && t[4].abs() < 1.0 && (t[5] + 0.5).abs() < 1.0, "{t:?}");
}

#[test]
fn same_seed_gives_same_result() {
    let fixed = blob([7.5, 7.5, 7.5], [0.0; 3]);
    let moving = blob([8.0, 7.0, 7.5], [0.0; 3]);
    let initial = TranslationTransform::<B, 3>::identity(&fixed.device());
    let mut cfg = config(single_level(), 21);
    cfg.optimizer.number_of_iterations = 5;

    let a = multires_registration_with(&fixed, &moving, &initial, &cfg).unwrap();
    let b = multires_registration_with(&fixed, &moving, &initial, &cfg).unwrap();
    assert_eq!(a.metric_value, b.metric_value);
    assert_eq!(a.transform.parameter_values(), b.transform.parameter_values());
    assert_eq!(a.levels[0].stop_condition, StopCondition::MaximumIterations(5));

    let c = multires_registration_with(&fixed, &moving, &initial, &cfg.clone().with_seed(22)).unwrap();
    assert_ne!(a.metric_value, c.metric_value);
    assert!((a.metric_value - c.metric_value).abs() < 0.5, "{} vs {}", a.metric_value, c.metric_value);
    for (p, q) in a.transform.parameter_values().iter().zip(c.transform.parameter_values()) {
        assert!((p - q).abs() < 0.5, "{:?} vs {:?}", a.transform.parameter_values(), c.transform.parameter_values());
    }
}

const LARGE: usize = 32;

/// Elongated Gaussian on a 32^3 unit grid, centred at `(15.5 + shift_x, 15.5, 15.5)`.
fn ellipsoid(shift_x: f32) -> Image<B, 3> {
    let device = Default::default();
    let c = (LARGE as f32 - 1.0) / 2.0;
    let mut values = Vec::with_capacity(LARGE * LARGE * LARGE);
    for z in 0..LARGE {
        for y in 0..LARGE {
            for x in 0..LARGE {
                let dx = x as f32 - c - shift_x;
                let dy = y as f32 - c;
                let dz = z as f32 - c;
                values.push(100.0 * (-(dx * dx / 50.0 + dy * dy / 18.0 + dz * dz / 8.0)).exp());
            }
        }
    }
    Image::new(
        tensor::from_vec(values, [LARGE, LARGE, LARGE], &device),
        Point::origin(),
        Spacing::uniform(1.0),
        Direction::identity(),
    )
}

fn assert_near_identity(params: &[f64]) {
    assert!(params.iter().all(|v| v.is_finite()), "{params:?}");
    assert!(params[..3].iter().all(|a| a.abs() < 0.2), "rotation drifted: {params:?}");
    assert!(params[3..].iter().all(|t| t.abs() < 2.0), "translation drifted: {params:?}");
}

#[test]
fn identical_images_stay_near_identity_with_default_settings() {
    let image = ellipsoid(0.0);
    let initial: RigidTransform<B, 3> =
        CenteredTransformInitializer::new(InitializerMode::Geometry).initialize(&image, &image);
    assert_eq!(initial.parameter_values(), vec![0.0; 6]);

    // Metric of a misaligned pair, read at the starting position.
    let shifted = ellipsoid(6.0);
    let mut start_cfg = RegistrationConfig::default().with_seed(1);
    start_cfg.schedule = single_level();
    start_cfg.optimizer.number_of_iterations = 1;
    let misaligned = multires_registration_with(&image, &shifted, &initial, &start_cfg).unwrap();

    for seed in [1, 2, 3] {
        let cfg = RegistrationConfig::default().with_seed(seed);
        let result = multires_registration_with(&image, &image, &initial, &cfg).unwrap();
        assert_near_identity(&result.transform.parameter_values());
        assert!(
            result.metric_value < misaligned.metric_value,
            "seed {seed}: aligned {} vs misaligned {}",
            result.metric_value,
            misaligned.metric_value
        );
    }
}

#[test]
fn unseeded_runs_stay_in_a_bounded_neighbourhood() {
    let image = ellipsoid(0.0);
    let initial: RigidTransform<B, 3> =
        CenteredTransformInitializer::new(InitializerMode::Geometry).initialize(&image, &image);

    let cfg = RegistrationConfig::default();
    assert_eq!(cfg.sampling.seed, None);
    let a = multires_registration_with(&image, &image, &initial, &cfg).unwrap();
    let b = multires_registration_with(&image, &image, &initial, &cfg).unwrap();

    assert_near_identity(&a.transform.parameter_values());
    assert_near_identity(&b.transform.parameter_values());
    assert!((a.metric_value - b.metric_value).abs() < 0.3, "{} vs {}", a.metric_value, b.metric_value);
}

#[test]
fn mismatched_schedule_fails_before_any_iteration() {
    let fixed = blob([7.5, 7.5, 7.5], [0.0; 3]);
    let initial = TranslationTransform::<B, 3>::identity(&fixed.device());

    let mut cfg = RegistrationConfig::default();
    cfg.schedule = MultiResolutionSchedule::new(vec![4, 2, 1], vec![2.0, 1.0]);
    let err = match cfg.build() {
        Ok(_) => panic!("schedule should be rejected"),
        Err(err) => err,
    };
    assert!(err.is_configuration());

    // The method itself re-checks its schedule.
    let history = HistoryCallback::new();
    let mut method = RegistrationConfig::default()
        .build()
        .unwrap()
        .with_schedule(MultiResolutionSchedule::new(vec![2, 1], vec![1.0]));
    method.add_progress_callback(Box::new(history.clone()));
    let err = method.execute(&fixed, &fixed, &initial).unwrap_err();
    assert!(err.is_configuration());
    assert!(history.is_empty());
}

#[test]
fn disjoint_images_fail_with_geometry_error() {
    let fixed = blob([7.5, 7.5, 7.5], [0.0; 3]);
    let moving = blob([1007.5, 7.5, 7.5], [1000.0, 0.0, 0.0]);
    let initial = TranslationTransform::<B, 3>::identity(&fixed.device());

    let err = multires_registration_with(&fixed, &moving, &initial, &config(single_level(), 1)).unwrap_err();
    assert!(err.is_geometry());
    assert!(matches!(err, RegistrationError::NoOverlap { level: 0, .. }));
}

#[test]
fn degenerate_spacing_fails_with_geometry_error() {
    let fixed = blob([7.5, 7.5, 7.5], [0.0; 3]);
    let moving = Image::new(
        fixed.data().clone(),
        Point::origin(),
        Spacing::new([1.0, 0.0, 1.0]),
        Direction::identity(),
    );
    let initial = TranslationTransform::<B, 3>::identity(&fixed.device());
    let history = HistoryCallback::new();
    let mut method = RegistrationConfig::default().build().unwrap();
    method.add_progress_callback(Box::new(history.clone()));

    let err = method.execute(&fixed, &moving, &initial).unwrap_err();
    assert!(matches!(err, RegistrationError::GeometryError { .. }));
    assert!(history.is_empty());
}

/// Collects formatted log output in memory.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn configured_run_returns_stop_condition_without_info_logging_it() {
    let fixed = blob([7.5, 7.5, 7.5], [0.0; 3]);
    let initial = TranslationTransform::<B, 3>::identity(&fixed.device());
    let mut cfg = config(single_level(), 4);
    cfg.optimizer.number_of_iterations = 2;

    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let result = tracing::subscriber::with_default(subscriber, || {
        multires_registration_with(&fixed, &fixed, &initial, &cfg).unwrap()
    });

    assert_eq!(
        result.stop_condition,
        "GradientDescentOptimizer: Maximum number of iterations (2) exceeded."
    );
    let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    assert!(text.contains("Level 0 finished"), "{text}");
    assert!(!text.contains("Final metric value"), "{text}");
    assert!(!text.contains("Optimizer's stopping condition"), "{text}");
}
