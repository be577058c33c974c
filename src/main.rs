//! panostitch CLI: stitch an ordered image sequence into a panorama.

use clap::{Parser, ValueEnum};
use panostitch::io::{collect_image_paths, load_images, resize_to_max_width, save_image, DEFAULT_MAX_WIDTH};
use panostitch::{AxisMode, StitchConfig, Stitcher};
use std::fs;
use std::path::{Path, PathBuf};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DirectionArg {
    /// Infer the axis from the first pair.
    Auto,
    Horizontal,
    Vertical,
}

impl From<DirectionArg> for AxisMode {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Auto => AxisMode::Auto,
            DirectionArg::Horizontal => AxisMode::Horizontal,
            DirectionArg::Vertical => AxisMode::Vertical,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "panostitch")]
#[command(about = "Stitch overlapping photographs into a panorama")]
#[command(version)]
struct Cli {
    /// Input images in stitching order. Directories expand to their images, sorted by name.
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Path of the stitched result; the format follows the extension.
    #[arg(short, long, default_value = "panorama_result.jpg")]
    output: PathBuf,

    /// Stitching axis.
    #[arg(short, long, value_enum, default_value_t = DirectionArg::Auto)]
    direction: DirectionArg,

    /// Images wider than this are scaled down before stitching (0 disables).
    #[arg(long, default_value_t = DEFAULT_MAX_WIDTH)]
    max_width: u32,

    /// JSON stitching configuration; missing fields take defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fixed RANSAC seed for reproducible output.
    #[arg(long)]
    seed: Option<u64>,

    /// Worker threads (defaults to PANOSTITCH_THREADS or the CPU count).
    #[arg(long)]
    threads: Option<usize>,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    run(&cli)
}

fn load_config(path: &Path) -> CliResult<StitchConfig> {
    let contents = fs::read_to_string(path)
        .map_err(|e| -> CliError { format!("Failed to read config {}: {e}", path.display()).into() })?;
    let config = serde_json::from_str(&contents)
        .map_err(|e| -> CliError { format!("Failed to parse config {}: {e}", path.display()).into() })?;
    Ok(config)
}

fn run(cli: &Cli) -> CliResult<()> {
    panostitch::init_thread_pool(cli.threads)?;

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => StitchConfig::default(),
    };
    if cli.seed.is_some() {
        config = config.with_ransac_seed(cli.seed);
    }

    let paths = collect_image_paths(&cli.images);
    tracing::info!("Loading {} image(s)", paths.len());
    let images = load_images(&paths);
    if images.len() < 2 {
        return Err(format!("At least 2 readable images are required, loaded {}", images.len()).into());
    }
    let images = resize_to_max_width(&images, cli.max_width);

    let panorama = Stitcher::new().stitch(&images, cli.direction.into(), &config)?;

    save_image(&panorama.image, &cli.output)
        .map_err(|e| -> CliError { format!("Failed to save {}: {e}", cli.output.display()).into() })?;
    tracing::info!(
        "Saved {}x{} {} panorama to {}",
        panorama.image.width(),
        panorama.image.height(),
        panorama.axis,
        cli.output.display()
    );
    Ok(())
}
