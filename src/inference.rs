/// Lane model seam
///
/// The visualizer never owns a model directly. The CLI builds an
/// `InferenceContext` from config and hands it to the visualizer, which calls
/// `lane_inference` once per batch.
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::config::{ModelConfig, VisConfig};
use crate::dataset::DatasetConfig;
use crate::errors::{VisError, VisResult};
use crate::file_io::{is_directory, is_file, replace_suffix};
use crate::lane_label::{parse_lane_label, Lane, LabelSource, Point};
use crate::transforms::ImageTensor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceMode {
    /// The model decodes lanes itself
    Keypoint,
    /// The model emits segmentation maps that are turned into lanes with `thresh`
    Segmentation,
}

/// Everything a model needs to turn its outputs into lanes in original-image coordinates.
///
/// `gap`, `dataset_name` and `mixed_precision` matter to network backends only;
/// `PredictionDirModel` logs them and otherwise leaves them alone.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    pub mode: InferenceMode,
    /// (height, width) of the model input
    pub input_size: [u32; 2],
    /// (height, width) of the source frames
    pub original_size: [u32; 2],
    /// Row spacing between sampled points
    pub gap: u32,
    /// Points per lane
    pub ppl: u32,
    /// Minimum lane existence score in `Segmentation` mode
    pub thresh: f32,
    pub dataset_name: String,
    pub max_lane: usize,
    pub mixed_precision: bool,
    /// Suffix of the dataset's image files, swapped out to find per-image outputs
    pub image_suffix: String,
}

impl InferenceRequest {
    pub fn from_config(config: &VisConfig) -> Self {
        Self {
            // `seg` selects the model's own inference path
            mode: if config.seg {
                InferenceMode::Keypoint
            } else {
                InferenceMode::Segmentation
            },
            input_size: config.input_size,
            original_size: config.original_size,
            gap: config.gap,
            ppl: config.ppl,
            thresh: config.thresh,
            dataset_name: config.dataset_name.clone(),
            max_lane: config.max_lane,
            mixed_precision: config.mixed_precision,
            image_suffix: config
                .vis_dataset
                .as_ref()
                .map(DatasetConfig::image_suffix)
                .unwrap_or(config.image_suffix.as_str())
                .to_string(),
        }
    }
}

pub trait LaneModel: Send + Sync {
    fn name(&self) -> &str;

    /// One lane list per input image, in input order
    fn inference(&self, images: &[ImageTensor], request: &InferenceRequest) -> VisResult<Vec<Vec<Lane>>>;
}

pub struct InferenceContext {
    model: Box<dyn LaneModel>,
}

impl InferenceContext {
    pub fn new(model: Box<dyn LaneModel>) -> Self {
        Self { model }
    }

    /// Build the model a config names, if any
    pub fn from_config(config: &VisConfig) -> VisResult<Option<Self>> {
        let Some(model_config) = &config.model else {
            return Ok(None);
        };
        let model: Box<dyn LaneModel> = match model_config {
            ModelConfig::PredictionDir { root, suffix, rescale } => {
                Box::new(PredictionDirModel::new(root.clone(), suffix.clone(), *rescale)?)
            }
        };
        info!("Using lane model: {}", model.name());
        Ok(Some(Self::new(model)))
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Run the model on a batch and keep at most `max_lane` lanes per image
    pub fn lane_inference(&self, images: &[ImageTensor], request: &InferenceRequest) -> VisResult<Vec<Vec<Lane>>> {
        let mut keypoints = self.model.inference(images, request)?;
        if keypoints.len() != images.len() {
            return Err(VisError::Inference(format!(
                "model {} returned {} results for {} images",
                self.model.name(),
                keypoints.len(),
                images.len()
            )));
        }
        for lanes in keypoints.iter_mut() {
            lanes.truncate(request.max_lane);
        }
        Ok(keypoints)
    }
}

/// Reads predictions an external model run already wrote in CULane format.
/// The file for `clip/00.jpg` is `root/clip/00<suffix>`, paired the same way
/// datasets pair annotations.
///
/// In `Segmentation` mode a lane's existence score is its share of valid
/// points out of `ppl`; lanes scoring below `thresh`, or with fewer than two
/// valid points, are dropped.
pub struct PredictionDirModel {
    root: PathBuf,
    suffix: String,
    rescale: bool,
}

impl PredictionDirModel {
    pub fn new(root: PathBuf, suffix: String, rescale: bool) -> VisResult<Self> {
        if !is_directory(&root) {
            return Err(VisError::Config(format!(
                "prediction directory {} does not exist",
                root.display()
            )));
        }
        Ok(Self { root, suffix, rescale })
    }

    fn prediction_path(&self, source: &Path, image_suffix: &str) -> PathBuf {
        self.root.join(replace_suffix(source, image_suffix, &self.suffix))
    }

    fn predict_one(&self, image: &ImageTensor, request: &InferenceRequest) -> VisResult<Vec<Lane>> {
        let path = self.prediction_path(&image.source, &request.image_suffix);
        if !is_file(&path) {
            debug!("No prediction for {}", image.source.display());
            return Ok(Vec::new());
        }

        let mut lanes = parse_lane_label(LabelSource::Path(path))?;
        if self.rescale {
            let sx = request.original_size[1] as f32 / request.input_size[1] as f32;
            let sy = request.original_size[0] as f32 / request.input_size[0] as f32;
            for point in lanes.iter_mut().flatten() {
                *point = Point::new(point.x * sx, point.y * sy);
            }
        }
        if request.mode == InferenceMode::Segmentation {
            lanes.retain(|lane| lane_exists(lane, request));
        }
        Ok(lanes)
    }
}

fn lane_exists(lane: &Lane, request: &InferenceRequest) -> bool {
    let valid = lane.iter().filter(|p| p.x > 0.0 && p.y > 0.0).count();
    let score = valid as f32 / request.ppl.max(1) as f32;
    valid >= 2 && score >= request.thresh
}

impl LaneModel for PredictionDirModel {
    fn name(&self) -> &str {
        "PredictionDir"
    }

    fn inference(&self, images: &[ImageTensor], request: &InferenceRequest) -> VisResult<Vec<Vec<Lane>>> {
        debug!(
            "Reading {} predictions from {} ({}, gap {}, mixed precision {})",
            images.len(),
            self.root.display(),
            request.dataset_name,
            request.gap,
            request.mixed_precision
        );
        images.iter().map(|image| self.predict_one(image, request)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::{Arc, Mutex};

    fn tensor(source: &str) -> ImageTensor {
        ImageTensor {
            data: ndarray::Array3::zeros((3, 2, 2)),
            source: PathBuf::from(source),
        }
    }

    struct Fixed(usize);

    impl LaneModel for Fixed {
        fn name(&self) -> &str {
            "Fixed"
        }

        fn inference(&self, images: &[ImageTensor], _request: &InferenceRequest) -> VisResult<Vec<Vec<Lane>>> {
            Ok(images
                .iter()
                .map(|_| (0..self.0).map(|i| vec![Point::new(i as f32, 1.0)]).collect())
                .collect())
        }
    }

    #[test]
    fn test_request_mode_follows_seg_flag() {
        let mut config = VisConfig::default();
        config.seg = true;
        assert_eq!(InferenceRequest::from_config(&config).mode, InferenceMode::Keypoint);
        config.seg = false;
        assert_eq!(InferenceRequest::from_config(&config).mode, InferenceMode::Segmentation);
    }

    #[test]
    fn test_max_lane_cap() {
        let context = InferenceContext::new(Box::new(Fixed(6)));
        let mut request = InferenceRequest::from_config(&VisConfig::default());
        request.max_lane = 4;
        let out = context.lane_inference(&[tensor("a.jpg"), tensor("b.jpg")], &request).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|lanes| lanes.len() == 4));
    }

    #[test]
    fn test_no_model_configured() {
        assert!(InferenceContext::from_config(&VisConfig::default()).unwrap().is_none());
    }

    #[test]
    fn test_prediction_dir_reads_and_rescales() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("clip")).unwrap();
        fs::write(tmp.path().join("clip").join("00.lines.txt"), "10 10 20 20\n30 30\n").unwrap();

        let mut request = InferenceRequest::from_config(&VisConfig::default());
        request.input_size = [100, 200];
        request.original_size = [200, 600];

        let model = PredictionDirModel::new(tmp.path().to_path_buf(), ".lines.txt".to_string(), true).unwrap();
        let out = model
            .inference(&[tensor("clip/00.jpg"), tensor("clip/01.jpg")], &request)
            .unwrap();
        assert_eq!(out[0].len(), 2);
        assert_eq!(out[0][0][1], Point::new(60.0, 40.0));
        assert!(out[1].is_empty());
    }

    #[test]
    fn test_segmentation_mode_applies_thresh() {
        let tmp = tempfile::tempdir().unwrap();
        // 4, 2 and 1 valid points; the -2 entries are CULane's missing-row marker
        fs::write(
            tmp.path().join("00.lines.txt"),
            "1 1 2 2 3 3 4 4\n1 1 -2 2 3 3 -2 4\n5 5\n",
        )
        .unwrap();
        let model = PredictionDirModel::new(tmp.path().to_path_buf(), ".lines.txt".to_string(), false).unwrap();

        let mut request = InferenceRequest::from_config(&VisConfig::default());
        request.mode = InferenceMode::Segmentation;
        request.ppl = 4;

        request.thresh = 0.5;
        assert_eq!(model.inference(&[tensor("00.jpg")], &request).unwrap()[0].len(), 2);
        request.thresh = 0.9;
        assert_eq!(model.inference(&[tensor("00.jpg")], &request).unwrap()[0].len(), 1);

        // Keypoint mode keeps everything the file holds
        request.mode = InferenceMode::Keypoint;
        assert_eq!(model.inference(&[tensor("00.jpg")], &request).unwrap()[0].len(), 3);
    }

    #[test]
    fn test_predictions_pair_by_image_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("00.lines.txt"), "1 2 3 4\n").unwrap();
        fs::write(tmp.path().join("00.camera.lines.txt"), "9 9\n").unwrap();

        let mut config = VisConfig::default();
        config.image_suffix = ".camera.jpg".to_string();
        let request = InferenceRequest::from_config(&config);
        assert_eq!(request.image_suffix, ".camera.jpg");

        let model = PredictionDirModel::new(tmp.path().to_path_buf(), ".lines.txt".to_string(), false).unwrap();
        let out = model.inference(&[tensor("00.camera.jpg")], &request).unwrap();
        assert_eq!(out[0], vec![vec![Point::new(1.0, 2.0), Point::new(3.0, 4.0)]]);
    }

    #[test]
    fn test_request_image_suffix_follows_vis_dataset() {
        let mut config = VisConfig::default();
        config.vis_dataset = Some(DatasetConfig::CulaneListDataset {
            root: PathBuf::from("culane"),
            list_file: PathBuf::from("culane/list.txt"),
            root_output: PathBuf::from("out"),
            root_mask: None,
            image_suffix: ".png".to_string(),
            keypoint_suffix: ".lines.txt".to_string(),
            mask_suffix: ".png".to_string(),
        });
        assert_eq!(InferenceRequest::from_config(&config).image_suffix, ".png");
    }

    /// Keeps the last request it was called with
    struct Recording(Arc<Mutex<Option<InferenceRequest>>>);

    impl LaneModel for Recording {
        fn name(&self) -> &str {
            "Recording"
        }

        fn inference(&self, images: &[ImageTensor], request: &InferenceRequest) -> VisResult<Vec<Vec<Lane>>> {
            *self.0.lock().unwrap() = Some(request.clone());
            Ok(vec![Vec::new(); images.len()])
        }
    }

    #[test]
    fn test_config_reaches_model() {
        let mut config = VisConfig::default();
        config.seg = false;
        config.thresh = 0.7;
        config.gap = 10;
        config.ppl = 56;
        config.dataset_name = "tusimple".to_string();
        config.mixed_precision = true;
        config.input_size = [360, 640];
        config.original_size = [720, 1280];

        let seen = Arc::new(Mutex::new(None));
        let context = InferenceContext::new(Box::new(Recording(Arc::clone(&seen))));
        context
            .lane_inference(&[tensor("a.jpg")], &InferenceRequest::from_config(&config))
            .unwrap();

        let seen = seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.mode, InferenceMode::Segmentation);
        assert_eq!(seen.thresh, 0.7);
        assert_eq!(seen.gap, 10);
        assert_eq!(seen.ppl, 56);
        assert_eq!(seen.dataset_name, "tusimple");
        assert!(seen.mixed_precision);
        assert_eq!(seen.input_size, [360, 640]);
        assert_eq!(seen.original_size, [720, 1280]);
        assert_eq!(seen.max_lane, config.max_lane);
        assert_eq!(seen.image_suffix, ".jpg");
    }

    #[test]
    fn test_prediction_dir_must_exist() {
        assert!(PredictionDirModel::new(PathBuf::from("/nonexistent/preds"), ".lines.txt".to_string(), false).is_err());
    }
}
