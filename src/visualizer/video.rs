use log::warn;

use super::{RunSummary, Visualizer};
use crate::config::VisConfig;
use crate::dataset::DataLoader;
use crate::errors::VisResult;

/// Video input. Decoding is not wired in yet, so the loader is empty.
pub struct LaneDetVideo {
    config: VisConfig,
}

impl LaneDetVideo {
    pub fn new(config: VisConfig) -> Self {
        Self { config }
    }
}

impl Visualizer for LaneDetVideo {
    fn get_loader(&self) -> VisResult<DataLoader> {
        Ok(DataLoader::empty())
    }

    fn run(&self) -> VisResult<RunSummary> {
        warn!(
            "Video visualization is not supported yet, nothing written to {}",
            self.config.save_path.display()
        );
        Ok(RunSummary::default())
    }
}
