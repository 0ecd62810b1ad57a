/// Lane datasets for visualization
///
/// A dataset maps an index to a `BatchItem`: the model input tensor, the
/// untouched original image, and whatever annotations sit next to it.
pub mod culane_list;
pub mod image_folder;
pub mod loader;

use std::path::{Path, PathBuf};

use image::{GrayImage, RgbImage};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::{VisError, VisResult};
use crate::file_io::is_file;
use crate::lane_label::{parse_lane_label, Lane, LabelSource};
use crate::transforms::{ImageTensor, TestTransform};

pub use culane_list::CulaneListDataset;
pub use image_folder::ImageFolderLaneDataset;
pub use loader::{Batch, DataLoader};

/// Per-image annotation record
#[derive(Debug, Clone)]
pub struct Target {
    /// Where the visualization of this image is written
    pub filename: PathBuf,
    pub keypoints: Option<Vec<Lane>>,
    /// Class-index label image, same size as the original
    pub masks: Option<GrayImage>,
}

#[derive(Debug, Clone)]
pub struct BatchItem {
    pub image: ImageTensor,
    pub original: RgbImage,
    pub target: Target,
}

pub trait LaneDataset: Send + Sync {
    fn len(&self) -> usize;

    fn get(&self, index: usize) -> VisResult<BatchItem>;
}

/// User-supplied dataset description, selected by `name`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "name", deny_unknown_fields)]
pub enum DatasetConfig {
    ImageFolderLaneDataset {
        root_image: PathBuf,
        #[serde(default)]
        root_keypoint: Option<PathBuf>,
        #[serde(default)]
        root_mask: Option<PathBuf>,
        root_output: PathBuf,
        #[serde(default = "default_image_suffix")]
        image_suffix: String,
        #[serde(default = "default_keypoint_suffix")]
        keypoint_suffix: String,
        #[serde(default = "default_mask_suffix")]
        mask_suffix: String,
    },
    /// CULane layout: a list file of image paths relative to `root`, with
    /// `.lines.txt` annotations next to each image
    CulaneListDataset {
        root: PathBuf,
        list_file: PathBuf,
        root_output: PathBuf,
        #[serde(default)]
        root_mask: Option<PathBuf>,
        #[serde(default = "default_image_suffix")]
        image_suffix: String,
        #[serde(default = "default_keypoint_suffix")]
        keypoint_suffix: String,
        #[serde(default = "default_mask_suffix")]
        mask_suffix: String,
    },
}

impl DatasetConfig {
    /// Suffix that marks image files; annotations and predictions are paired by swapping it
    pub fn image_suffix(&self) -> &str {
        match self {
            DatasetConfig::ImageFolderLaneDataset { image_suffix, .. }
            | DatasetConfig::CulaneListDataset { image_suffix, .. } => image_suffix,
        }
    }
}

fn default_image_suffix() -> String {
    crate::config::DEFAULT_IMAGE_SUFFIX.to_string()
}

fn default_keypoint_suffix() -> String {
    crate::config::DEFAULT_KEYPOINT_SUFFIX.to_string()
}

fn default_mask_suffix() -> String {
    crate::config::DEFAULT_MASK_SUFFIX.to_string()
}

/// Build the dataset a config describes
pub fn build_dataset(
    config: &DatasetConfig,
    transform: TestTransform,
) -> VisResult<Box<dyn LaneDataset>> {
    let dataset: Box<dyn LaneDataset> = match config {
        DatasetConfig::ImageFolderLaneDataset {
            root_image,
            root_keypoint,
            root_mask,
            root_output,
            image_suffix,
            keypoint_suffix,
            mask_suffix,
        } => Box::new(ImageFolderLaneDataset::new(
            root_image.clone(),
            root_keypoint.clone(),
            root_mask.clone(),
            root_output.clone(),
            image_suffix.clone(),
            keypoint_suffix.clone(),
            mask_suffix.clone(),
            transform,
        )?),
        DatasetConfig::CulaneListDataset {
            root,
            list_file,
            root_output,
            root_mask,
            image_suffix,
            keypoint_suffix,
            mask_suffix,
        } => Box::new(CulaneListDataset::new(
            root.clone(),
            list_file.clone(),
            root_output.clone(),
            root_mask.clone(),
            image_suffix.clone(),
            keypoint_suffix.clone(),
            mask_suffix.clone(),
            transform,
        )?),
    };
    Ok(dataset)
}

/// Parse an annotation file if it exists
pub(crate) fn load_keypoints(path: Option<PathBuf>) -> VisResult<Option<Vec<Lane>>> {
    match path {
        Some(path) if is_file(&path) => Ok(Some(parse_lane_label(LabelSource::Path(path))?)),
        Some(path) => {
            debug!("No keypoint file at {}", path.display());
            Ok(None)
        }
        None => Ok(None),
    }
}

/// Read a label image if it exists. Masks are 8-bit single-channel class maps.
pub(crate) fn load_mask(path: Option<PathBuf>) -> VisResult<Option<GrayImage>> {
    match path {
        Some(path) if is_file(&path) => {
            let mask = image::open(&path).map_err(|e| VisError::image(&path, e))?;
            Ok(Some(mask.into_luma8()))
        }
        Some(path) => {
            debug!("No mask file at {}", path.display());
            Ok(None)
        }
        None => Ok(None),
    }
}

/// Load one image and build its item from already-resolved annotation paths
pub(crate) fn load_item(
    image_path: &Path,
    relative: &Path,
    keypoint_path: Option<PathBuf>,
    mask_path: Option<PathBuf>,
    output_path: PathBuf,
    transform: &TestTransform,
) -> VisResult<BatchItem> {
    let original = crate::file_io::load_rgb_image(image_path)?;
    let image = transform.apply(&original, relative.to_path_buf());
    Ok(BatchItem {
        image,
        original,
        target: Target {
            filename: output_path,
            keypoints: load_keypoints(keypoint_path)?,
            masks: load_mask(mask_path)?,
        },
    })
}
