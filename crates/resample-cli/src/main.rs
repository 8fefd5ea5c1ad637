//! Command-line front-end: load an image, run one resampling operation,
//! write the result.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use vips_resample::{
    AffineMatrix, ImageBackend, ImageFiles, Interesting, Interpolate, Kernel, Resampler,
    VipsConfig, op_counters,
};

#[derive(Parser, Debug)]
#[command(name = "vips-resample")]
#[command(about = "Resize, thumbnail and remap images through libvips-style resampling")]
struct Cli {
    #[command(flatten)]
    io: IoArgs,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Args, Debug, Clone)]
struct IoArgs {
    #[arg(long, short, required = true)]
    input: PathBuf,
    #[arg(long, short, required = true)]
    output: PathBuf,
    #[arg(long, value_enum, default_value_t = Engine::Image)]
    engine: Engine,
    /// Worker threads for the native engine (overrides VIPS_CONCURRENCY).
    #[cfg(feature = "native")]
    #[arg(long)]
    concurrency: Option<u32>,
    /// Print operation counters as JSON when done.
    #[arg(long)]
    stats: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Engine {
    Image,
    #[cfg(feature = "native")]
    Vips,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scale by a factor, optionally with a separate vertical factor.
    Resize {
        #[arg(long)]
        scale: f64,
        #[arg(long)]
        vscale: Option<f64>,
        #[arg(long, default_value_t = Kernel::Auto)]
        kernel: Kernel,
    },
    /// Shrink into a bounding box, optionally cropping to fill it.
    Thumbnail {
        #[arg(long)]
        width: u32,
        #[arg(long, default_value_t = 0)]
        height: u32,
        #[arg(long, default_value_t = Interesting::None)]
        crop: Interesting,
    },
    /// Apply a 2x2 affine matrix.
    Affine {
        #[arg(long, num_args = 4, value_names = ["A", "B", "C", "D"], allow_negative_numbers = true)]
        matrix: Vec<f64>,
        #[arg(long, default_value_t = Interpolate::Bicubic)]
        interpolate: Interpolate,
    },
    /// Map pixel values through a 256x1 lookup table image.
    Maplut {
        #[arg(long)]
        lut: PathBuf,
    },
    /// Resample at coordinates taken from an index image.
    Mapim {
        #[arg(long)]
        index: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = engine_config(&cli.io, |key| std::env::var(key).ok())?;

    match config {
        #[cfg(feature = "native")]
        Some(config) => run(vips_resample::LibVips::startup(&config)?, &cli)?,
        _ => run(ImageBackend::new(), &cli)?,
    }

    let counts = op_counters().snapshot();
    tracing::debug!(?counts, "Operation counters");
    if cli.io.stats {
        println!("{}", serde_json::to_string_pretty(&counts)?);
    }
    Ok(())
}

/// Engine settings for the selected engine. Only libvips reads `VIPS_*`.
#[cfg_attr(not(feature = "native"), allow(unused_variables))]
fn engine_config(io: &IoArgs, lookup: impl Fn(&str) -> Option<String>) -> Result<Option<VipsConfig>> {
    match io.engine {
        Engine::Image => Ok(None),
        #[cfg(feature = "native")]
        Engine::Vips => {
            let mut config = VipsConfig::from_lookup(lookup).context("Failed to load VIPS_* settings")?;
            if let Some(threads) = io.concurrency {
                config = config.with_concurrency(threads);
            }
            config.validate()?;
            Ok(Some(config))
        }
    }
}

fn run<B: ImageFiles>(backend: B, cli: &Cli) -> Result<()> {
    let io = &cli.io;
    tracing::info!(engine = backend.name(), input = %io.input.display(), "Loading input");
    let input = backend
        .load(&io.input)
        .with_context(|| format!("Failed to load {}", io.input.display()))?;

    let resampler = Resampler::new(backend);
    let output = match &cli.cmd {
        Command::Resize {
            scale,
            vscale: Some(vscale),
            kernel,
        } => resampler.resize_with_vscale(&input, *scale, *vscale, *kernel),
        Command::Resize {
            scale,
            vscale: None,
            kernel,
        } => resampler.resize(&input, *scale, *kernel),
        Command::Thumbnail {
            width,
            height,
            crop,
        } => resampler.thumbnail(&input, *width, *height, *crop),
        Command::Affine {
            matrix,
            interpolate,
        } => {
            let &[a, b, c, d] = matrix.as_slice() else {
                anyhow::bail!("--matrix takes exactly four values");
            };
            resampler.affine(&input, AffineMatrix::new(a, b, c, d), *interpolate)
        }
        Command::Maplut { lut } => {
            let lut = resampler
                .backend()
                .load(lut)
                .with_context(|| format!("Failed to load LUT {}", lut.display()))?;
            resampler.maplut(&input, &lut)
        }
        Command::Mapim { index } => {
            let index = resampler
                .backend()
                .load(index)
                .with_context(|| format!("Failed to load index {}", index.display()))?;
            resampler.mapim(&input, &index)
        }
    }
    .context("Resampling failed")?;

    resampler
        .backend()
        .save(&output, &io.output)
        .with_context(|| format!("Failed to write {}", io.output.display()))?;
    tracing::info!(output = %io.output.display(), "Done");
    Ok(())
}
