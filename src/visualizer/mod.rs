/// Visualizer variants
///
/// Every input source implements the same two capabilities: build a loader
/// and drive the batch loop. The CLI picks the variant.
pub mod dataset;
pub mod dir;
pub mod video;

use crate::config::VisConfig;
use crate::dataset::DataLoader;
use crate::errors::VisResult;
use crate::inference::InferenceContext;

pub use dataset::LaneDetDataset;
pub use dir::LaneDetDir;
pub use video::LaneDetVideo;

pub trait Visualizer {
    /// Build the batched, in-order loader this variant reads from
    fn get_loader(&self) -> VisResult<DataLoader>;

    /// Process every batch and write the results
    fn run(&self) -> VisResult<RunSummary>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub batches: usize,
    pub images_written: usize,
    pub images_predicted: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualizerKind {
    /// A folder of images with optional keypoint and mask folders
    Dir,
    /// A video file
    Video,
    /// A registered dataset split
    Dataset,
}

pub fn build_visualizer(
    kind: VisualizerKind,
    config: VisConfig,
    inference: Option<InferenceContext>,
) -> VisResult<Box<dyn Visualizer>> {
    let visualizer: Box<dyn Visualizer> = match kind {
        VisualizerKind::Dir => Box::new(LaneDetDir::new(config, inference)?),
        VisualizerKind::Video => Box::new(LaneDetVideo::new(config)),
        VisualizerKind::Dataset => Box::new(LaneDetDataset::new(config)),
    };
    Ok(visualizer)
}

/// Collapse a per-item collection to `None` when no item has data
pub fn collapse_if_all_none<T>(items: Vec<Option<T>>) -> Option<Vec<Option<T>>> {
    if items.iter().all(Option::is_none) {
        None
    } else {
        Some(items)
    }
}
