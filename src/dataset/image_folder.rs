use std::path::PathBuf;

use log::info;

use super::{load_item, BatchItem, LaneDataset};
use crate::errors::{VisError, VisResult};
use crate::file_io::{get_image_paths, replace_suffix};
use crate::transforms::TestTransform;

/// Images in a folder, paired with keypoint and mask files by relative stem
pub struct ImageFolderLaneDataset {
    root_image: PathBuf,
    root_keypoint: Option<PathBuf>,
    root_mask: Option<PathBuf>,
    root_output: PathBuf,
    image_suffix: String,
    keypoint_suffix: String,
    mask_suffix: String,
    transform: TestTransform,
    /// Image paths relative to `root_image`
    filenames: Vec<PathBuf>,
}

impl ImageFolderLaneDataset {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        root_image: PathBuf,
        root_keypoint: Option<PathBuf>,
        root_mask: Option<PathBuf>,
        root_output: PathBuf,
        image_suffix: String,
        keypoint_suffix: String,
        mask_suffix: String,
        transform: TestTransform,
    ) -> VisResult<Self> {
        let filenames = get_image_paths(&root_image, &image_suffix)?;
        info!(
            "Found {} images with suffix {:?} in {}",
            filenames.len(),
            image_suffix,
            root_image.display()
        );

        Ok(Self {
            root_image,
            root_keypoint,
            root_mask,
            root_output,
            image_suffix,
            keypoint_suffix,
            mask_suffix,
            transform,
            filenames,
        })
    }
}

impl LaneDataset for ImageFolderLaneDataset {
    fn len(&self) -> usize {
        self.filenames.len()
    }

    fn get(&self, index: usize) -> VisResult<BatchItem> {
        let relative = self.filenames.get(index).ok_or_else(|| {
            VisError::Config(format!("index {} out of range for {} images", index, self.filenames.len()))
        })?;

        let keypoint_path = self
            .root_keypoint
            .as_ref()
            .map(|root| root.join(replace_suffix(relative, &self.image_suffix, &self.keypoint_suffix)));
        let mask_path = self
            .root_mask
            .as_ref()
            .map(|root| root.join(replace_suffix(relative, &self.image_suffix, &self.mask_suffix)));

        load_item(
            &self.root_image.join(relative),
            relative,
            keypoint_path,
            mask_path,
            self.root_output.join(relative),
            &self.transform,
        )
    }
}
