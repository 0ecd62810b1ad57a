use log::{info, warn};

use super::{collapse_if_all_none, RunSummary, Visualizer};
use crate::config::VisConfig;
use crate::dataset::{build_dataset, Batch, DataLoader, DatasetConfig};
use crate::errors::{VisError, VisResult};
use crate::file_io::ensure_dir;
use crate::inference::{InferenceContext, InferenceRequest};
use crate::lane_label::Lane;
use crate::overlay::{lane_detection_visualize_batched, OverlayOptions};
use crate::transforms::{ImageTensor, TestTransform};
use crate::utils::timing::{ScopedTimer, TimingStats};

/// Draws lanes for a folder of images (or a user-supplied dataset) into `save_path`
pub struct LaneDetDir {
    config: VisConfig,
    inference: Option<InferenceContext>,
}

impl LaneDetDir {
    pub fn new(config: VisConfig, inference: Option<InferenceContext>) -> VisResult<Self> {
        config.validate()?;
        if config.pred && inference.is_none() {
            return Err(VisError::Config(
                "pred is set but no model is configured (set `model` or pass --pred-path)".to_string(),
            ));
        }
        ensure_dir(&config.save_path)?;
        Ok(Self { config, inference })
    }

    /// Dataset config from `vis_dataset`, or the image/keypoint/mask folders
    fn dataset_config(&self) -> VisResult<DatasetConfig> {
        if let Some(dataset) = &self.config.vis_dataset {
            return Ok(dataset.clone());
        }
        let root_image = self.config.image_path.clone().ok_or_else(|| {
            VisError::Config("image_path is required when vis_dataset is not set".to_string())
        })?;
        Ok(DatasetConfig::ImageFolderLaneDataset {
            root_image,
            root_keypoint: self.config.keypoint_path.clone(),
            root_mask: self.config.mask_path.clone(),
            root_output: self.config.save_path.clone(),
            image_suffix: self.config.image_suffix.clone(),
            keypoint_suffix: self.config.keypoint_suffix.clone(),
            mask_suffix: self.config.mask_suffix.clone(),
        })
    }

    pub fn lane_inference(&self, images: &[ImageTensor]) -> VisResult<Vec<Vec<Lane>>> {
        let context = self.inference.as_ref().ok_or_else(|| {
            VisError::Inference("no model available for prediction".to_string())
        })?;
        context.lane_inference(images, &InferenceRequest::from_config(&self.config))
    }

    fn overlay_options(&self) -> OverlayOptions<'_> {
        OverlayOptions {
            mask_colors: &self.config.colors,
            keypoint_color: self.config.keypoint_color,
            style: self.config.style,
            point_radius: self.config.point_radius,
            line_trans: self.config.line_trans,
            mask_alpha: self.config.mask_alpha,
        }
    }

    fn process_batch(&self, batch: Batch, summary: &mut RunSummary) -> VisResult<()> {
        let Batch { images, originals, targets } = batch;

        let mut filenames = Vec::with_capacity(targets.len());
        let mut keypoints = Vec::with_capacity(targets.len());
        let mut masks = Vec::with_capacity(targets.len());
        for target in targets {
            filenames.push(target.filename);
            keypoints.push(target.keypoints);
            masks.push(target.masks);
        }
        let mut keypoints = collapse_if_all_none(keypoints);
        let masks = collapse_if_all_none(masks);

        if self.config.pred {
            let predicted = self.lane_inference(&images)?;
            summary.images_predicted += predicted.len();
            keypoints = Some(predicted.into_iter().map(Some).collect());
        }

        let results = lane_detection_visualize_batched(
            &originals,
            masks.as_deref(),
            keypoints.as_deref(),
            &self.overlay_options(),
        )?;
        crate::file_io::save_images(&results, &filenames)?;

        summary.images_written += results.len();
        Ok(())
    }
}

impl Visualizer for LaneDetDir {
    fn get_loader(&self) -> VisResult<DataLoader> {
        let transform = TestTransform::from_config(&self.config)?;
        let dataset = build_dataset(&self.dataset_config()?, transform)?;
        DataLoader::new(dataset, self.config.batch_size, self.config.workers)
    }

    fn run(&self) -> VisResult<RunSummary> {
        let loader = self.get_loader()?;
        let total = loader.len();
        if loader.is_empty() {
            warn!("No images to visualize");
        }
        if let Some(context) = &self.inference {
            if self.config.pred {
                info!("Predicting keypoints with {}", context.model_name());
            }
        }

        let mut summary = RunSummary::default();
        let mut stats = TimingStats::new("Batch");
        for (index, batch) in loader.iter().enumerate() {
            let mut timer = ScopedTimer::new(&mut stats);
            let written_before = summary.images_written;
            self.process_batch(batch?, &mut summary)?;
            timer.items = summary.images_written - written_before;
            summary.batches += 1;
            info!("[{}/{}] {} images written", index + 1, total, summary.images_written);
        }

        info!(
            "Wrote {} images to {} ({} batches, {:.2}ms avg per batch, {:.1} images/s)",
            summary.images_written,
            self.config.save_path.display(),
            summary.batches,
            stats.average_ms(),
            stats.items_per_second()
        );
        Ok(summary)
    }
}
