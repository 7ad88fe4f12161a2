use std::path::PathBuf;

use anyhow::{Context, Result};
use burn::backend::Autodiff;
use burn_ndarray::NdArray;
use clap::{Parser, ValueEnum};
use mireg_cli::{load_registration_config, MultiImageDisplay, WindowLevel};
use mireg_core::filter::ResampleImageFilter;
use mireg_core::interpolation::LinearInterpolator;
use mireg_core::transform::{
    AffineTransform, CenteredTransform, CenteredTransformInitializer, InitializerMode, ParametricTransform,
    RigidTransform, TranslationTransform,
};
use mireg_core::Image;
use mireg_io::{read_dicom_series_by_uid, scan_dicom_directory, LoadOptions};
use mireg_registration::{multires_registration_with, RegistrationConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

type Backend = Autodiff<NdArray<f32>>;

const CT_SERIES_UID: &str = "1.2.840.113619.2.290.3.3233817346.783.1399004564.515";
const MR_SERIES_UID: &str = "1.3.12.2.1107.5.2.18.41548.30000014030519285935000000933";

#[derive(Clone, Copy, ValueEnum)]
enum InitializerArg {
    Geometry,
    Moments,
}

impl From<InitializerArg> for InitializerMode {
    fn from(arg: InitializerArg) -> Self {
        match arg {
            InitializerArg::Geometry => InitializerMode::Geometry,
            InitializerArg::Moments => InitializerMode::Moments,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum TransformArg {
    Rigid,
    Affine,
    Translation,
}

#[derive(Parser)]
#[command(name = "mireg", about = "Multi-resolution CT/MR registration")]
#[command(version)]
struct Cli {
    /// Directory holding the DICOM files (e.g. the CIRS057A_MR_CT_DICOM dataset)
    #[arg(long)]
    data_dir: PathBuf,

    /// Series instance UID of the fixed image
    #[arg(long, default_value = CT_SERIES_UID)]
    fixed_series: String,

    /// Series instance UID of the moving image
    #[arg(long, default_value = MR_SERIES_UID)]
    moving_series: String,

    /// Shrink the volumes on read so no axis exceeds --max-extent
    #[arg(long, env = "MIREG_MEMORY_CONSTRAINED")]
    memory_constrained: bool,

    #[arg(long, default_value = "64")]
    max_extent: usize,

    /// Registration config file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for the metric sampler; unseeded runs differ slightly
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, value_enum, default_value = "geometry")]
    initializer: InitializerArg,

    #[arg(long, value_enum, default_value = "rigid")]
    transform: TransformArg,

    /// Print the series found in --data-dir and exit
    #[arg(long)]
    list_series: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if cli.list_series {
        return list_series(&cli);
    }

    let config = load_registration_config(cli.config.as_deref(), cli.seed)?;
    let options = LoadOptions {
        memory_constrained: cli.memory_constrained,
        max_extent: cli.max_extent,
    };
    let device = Default::default();

    let fixed: Image<Backend, 3> = read_dicom_series_by_uid(&cli.data_dir, &cli.fixed_series, &options, &device)
        .context("Failed to read the fixed image")?;
    let moving: Image<Backend, 3> = read_dicom_series_by_uid(&cli.data_dir, &cli.moving_series, &options, &device)
        .context("Failed to read the moving image")?;
    info!("Fixed image size {:?}, moving image size {:?}", fixed.size(), moving.size());

    let initializer = CenteredTransformInitializer::new(cli.initializer.into());
    let registered = match cli.transform {
        TransformArg::Rigid => register::<RigidTransform<Backend, 3>>(&fixed, &moving, initializer, &config)?,
        TransformArg::Affine => register::<AffineTransform<Backend, 3>>(&fixed, &moving, initializer, &config)?,
        TransformArg::Translation => {
            register::<TranslationTransform<Backend, 3>>(&fixed, &moving, initializer, &config)?
        }
    };

    let display = MultiImageDisplay::new(
        &[fixed, moving, registered],
        &["fixed image", "moving image", "registered moving image"],
        MultiImageDisplay::DEFAULT_FIGURE_SIZE,
        Some(&[WindowLevel::CT, WindowLevel::MR, WindowLevel::MR]),
        MultiImageDisplay::DEFAULT_PERCENTILE_RANGE,
    )?;
    println!();
    for line in display.summary() {
        println!("{line}");
    }

    Ok(())
}

fn list_series(cli: &Cli) -> Result<()> {
    let series = scan_dicom_directory(&cli.data_dir)?;
    println!("{} series found", series.len());
    for s in &series {
        println!(
            "  {}  {:<4} {:>4} files  {}",
            s.series_instance_uid,
            s.modality,
            s.file_paths.len(),
            s.series_description
        );
    }
    Ok(())
}

/// Registers `moving` onto `fixed` and returns `moving` resampled on the
/// fixed grid.
fn register<T>(
    fixed: &Image<Backend, 3>,
    moving: &Image<Backend, 3>,
    initializer: CenteredTransformInitializer,
    config: &RegistrationConfig,
) -> Result<Image<Backend, 3>>
where
    T: ParametricTransform<Backend, 3> + CenteredTransform<Backend, 3>,
{
    let initial: T = initializer.initialize(fixed, moving);
    println!("Initial {} parameters: {:?}", initial.name(), initial.parameter_values());

    let result = multires_registration_with(fixed, moving, &initial, config).context("Registration failed")?;

    println!("Final metric value: {}", result.metric_value);
    println!("Optimizer's stopping condition, {}", result.stop_condition);
    for level in &result.levels {
        println!(
            "  level {} (shrink {}, sigma {}): {} iterations, metric {:.6}, {}",
            level.level,
            level.shrink_factor,
            level.smoothing_sigma,
            level.iterations,
            level.metric_value,
            level.stop_condition
        );
    }
    println!("Final parameters: {:?}", result.transform.parameter_values());

    Ok(ResampleImageFilter::new_from_reference(fixed, result.transform, LinearInterpolator).apply(moving))
}
