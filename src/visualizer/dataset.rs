use log::warn;

use super::{RunSummary, Visualizer};
use crate::config::VisConfig;
use crate::dataset::DataLoader;
use crate::errors::VisResult;

/// Visualization of a registered dataset split. A list-file split can already
/// be drawn through the `dir` variant with a `vis_dataset` of `CulaneListDataset`.
pub struct LaneDetDataset {
    config: VisConfig,
}

impl LaneDetDataset {
    pub fn new(config: VisConfig) -> Self {
        Self { config }
    }
}

impl Visualizer for LaneDetDataset {
    fn get_loader(&self) -> VisResult<DataLoader> {
        Ok(DataLoader::empty())
    }

    fn run(&self) -> VisResult<RunSummary> {
        warn!(
            "Dataset visualization is not supported yet, nothing written to {}",
            self.config.save_path.display()
        );
        Ok(RunSummary::default())
    }
}
