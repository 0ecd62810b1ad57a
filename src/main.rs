mod build_info;
mod config;
mod dataset;
mod errors;
mod file_io;
mod inference;
mod lane_label;
mod logging;
mod overlay;
mod transforms;
mod utils;
mod visualizer;

#[allow(unused_imports)]
use log::{debug, info, warn, error};

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::Lazy;

use crate::build_info::BUILD_INFO;
use crate::config::{ConfigOverrides, VisConfig};
use crate::inference::InferenceContext;
use crate::visualizer::{build_visualizer, VisualizerKind};

const APP_NAME: &str = "lanevis";

static LONG_VERSION: Lazy<String> = Lazy::new(|| BUILD_INFO.to_string());

/// Draw lane keypoints and segmentation masks over images and save the results.
#[derive(Debug, Parser)]
#[command(name = "lanevis", version = BUILD_INFO.version, long_version = LONG_VERSION.as_str())]
struct Cli {
    /// YAML config; command line flags override its values
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Visualize a folder of images, or the dataset named by `vis_dataset`
    Dir(ConfigOverrides),
    /// Visualize a video (not supported yet)
    Video(ConfigOverrides),
    /// Visualize a registered dataset split (not supported yet)
    Dataset(ConfigOverrides),
}

impl Command {
    fn into_parts(self) -> (VisualizerKind, ConfigOverrides) {
        match self {
            Command::Dir(o) => (VisualizerKind::Dir, o),
            Command::Video(o) => (VisualizerKind::Video, o),
            Command::Dataset(o) => (VisualizerKind::Dataset, o),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_trail = logging::setup_logger().context("Failed to install logger")?;
    logging::setup_panic_hook(APP_NAME, log_trail);

    info!("{} {} ({})", APP_NAME, BUILD_INFO.version, BUILD_INFO.revision);
    if BUILD_INFO.is_dirty() {
        debug!("Built from a modified tree, {} {}", BUILD_INFO.target, BUILD_INFO.profile);
    }

    let (kind, overrides) = cli.command.into_parts();
    let mut config = VisConfig::load(cli.config.as_deref())
        .with_context(|| format!("Failed to load config {:?}", cli.config))?;
    config.apply_overrides(&overrides);

    let inference = if config.pred {
        InferenceContext::from_config(&config).context("Failed to set up the lane model")?
    } else {
        None
    };

    let visualizer = build_visualizer(kind, config, inference)
        .context("Failed to set up the visualizer")?;
    let summary = visualizer.run().context("Visualization failed")?;

    info!(
        "Done: {} images written in {} batches ({} predicted)",
        summary.images_written, summary.batches, summary.images_predicted
    );
    Ok(())
}
