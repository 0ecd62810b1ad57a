use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::dataset::DatasetConfig;
use crate::errors::{VisError, VisResult};
use crate::overlay::OverlayStyle;

// Default values for configuration
pub const DEFAULT_SAVE_PATH: &str = "vis_output";
pub const DEFAULT_IMAGE_SUFFIX: &str = ".jpg";
pub const DEFAULT_KEYPOINT_SUFFIX: &str = ".lines.txt";
pub const DEFAULT_MASK_SUFFIX: &str = ".png";
pub const DEFAULT_BATCH_SIZE: usize = 4;
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_INPUT_SIZE: [u32; 2] = [288, 800];      // (height, width) fed to the model
pub const DEFAULT_ORIGINAL_SIZE: [u32; 2] = [590, 1640];  // CULane frame size
pub const DEFAULT_GAP: u32 = 20;
pub const DEFAULT_PPL: u32 = 18;
pub const DEFAULT_DATASET_NAME: &str = "culane";
pub const DEFAULT_MAX_LANE: usize = 4;
pub const DEFAULT_THRESH: f32 = 0.3;
pub const DEFAULT_KEYPOINT_COLOR: [u8; 3] = [255, 0, 0];
pub const DEFAULT_LINE_TRANS: f32 = 0.4;
pub const DEFAULT_MASK_ALPHA: f32 = 0.5;
pub const DEFAULT_POINT_RADIUS: i32 = 3;
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Visualizer configuration, read from YAML. Every key is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VisConfig {
    /// Output directory, created on startup
    #[serde(default = "default_save_path")]
    pub save_path: PathBuf,

    #[serde(default)]
    pub image_path: Option<PathBuf>,

    #[serde(default)]
    pub keypoint_path: Option<PathBuf>,

    #[serde(default)]
    pub mask_path: Option<PathBuf>,

    #[serde(default = "default_image_suffix")]
    pub image_suffix: String,

    #[serde(default = "default_keypoint_suffix")]
    pub keypoint_suffix: String,

    #[serde(default = "default_mask_suffix")]
    pub mask_suffix: String,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Threads used to prepare batch items; 0 loads on the calling thread
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Replace annotated keypoints with model predictions
    #[serde(default)]
    pub pred: bool,

    #[serde(default)]
    pub mixed_precision: bool,

    /// true: the model's own keypoint inference; false: segmentation-style inference using `thresh`
    #[serde(default = "default_true")]
    pub seg: bool,

    #[serde(default = "default_input_size")]
    pub input_size: [u32; 2],

    #[serde(default = "default_original_size")]
    pub original_size: [u32; 2],

    #[serde(default = "default_gap")]
    pub gap: u32,

    #[serde(default = "default_ppl")]
    pub ppl: u32,

    #[serde(default = "default_dataset_name")]
    pub dataset_name: String,

    #[serde(default = "default_max_lane")]
    pub max_lane: usize,

    #[serde(default = "default_thresh")]
    pub thresh: f32,

    /// Mask colors indexed by class id, RGB. Class 0 is background and never drawn.
    #[serde(default = "default_colors")]
    pub colors: Vec<[u8; 3]>,

    #[serde(default = "default_keypoint_color")]
    pub keypoint_color: [u8; 3],

    #[serde(default)]
    pub style: OverlayStyle,

    #[serde(default = "default_line_trans")]
    pub line_trans: f32,

    #[serde(default = "default_mask_alpha")]
    pub mask_alpha: f32,

    #[serde(default = "default_point_radius")]
    pub point_radius: i32,

    /// Overrides the default image folder dataset
    #[serde(default)]
    pub vis_dataset: Option<DatasetConfig>,

    #[serde(default)]
    pub test_augmentation: TransformConfig,

    #[serde(default)]
    pub model: Option<ModelConfig>,
}

/// Test-time transform settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformConfig {
    /// Falls back to the top-level `input_size`
    #[serde(default)]
    pub input_size: Option<[u32; 2]>,

    #[serde(default = "default_mean")]
    pub mean: [f32; 3],

    #[serde(default = "default_std")]
    pub std: [f32; 3],
}

/// Which lane model backs `pred`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "name", deny_unknown_fields)]
pub enum ModelConfig {
    /// CULane-format predictions already written to disk by an external model run
    PredictionDir {
        root: PathBuf,
        #[serde(default = "default_keypoint_suffix")]
        suffix: String,
        /// Predictions are in `input_size` coordinates and need scaling to `original_size`
        #[serde(default)]
        rescale: bool,
    },
}

fn default_save_path() -> PathBuf {
    PathBuf::from(DEFAULT_SAVE_PATH)
}

fn default_image_suffix() -> String {
    DEFAULT_IMAGE_SUFFIX.to_string()
}

fn default_keypoint_suffix() -> String {
    DEFAULT_KEYPOINT_SUFFIX.to_string()
}

fn default_mask_suffix() -> String {
    DEFAULT_MASK_SUFFIX.to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_true() -> bool {
    true
}

fn default_input_size() -> [u32; 2] {
    DEFAULT_INPUT_SIZE
}

fn default_original_size() -> [u32; 2] {
    DEFAULT_ORIGINAL_SIZE
}

fn default_gap() -> u32 {
    DEFAULT_GAP
}

fn default_ppl() -> u32 {
    DEFAULT_PPL
}

fn default_dataset_name() -> String {
    DEFAULT_DATASET_NAME.to_string()
}

fn default_max_lane() -> usize {
    DEFAULT_MAX_LANE
}

fn default_thresh() -> f32 {
    DEFAULT_THRESH
}

pub fn default_colors() -> Vec<[u8; 3]> {
    vec![
        [0, 0, 0],
        [0, 255, 0],
        [0, 0, 255],
        [255, 0, 0],
        [255, 255, 0],
    ]
}

fn default_keypoint_color() -> [u8; 3] {
    DEFAULT_KEYPOINT_COLOR
}

fn default_line_trans() -> f32 {
    DEFAULT_LINE_TRANS
}

fn default_mask_alpha() -> f32 {
    DEFAULT_MASK_ALPHA
}

fn default_point_radius() -> i32 {
    DEFAULT_POINT_RADIUS
}

fn default_mean() -> [f32; 3] {
    IMAGENET_MEAN
}

fn default_std() -> [f32; 3] {
    IMAGENET_STD
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            input_size: None,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }
}

impl Default for VisConfig {
    fn default() -> Self {
        Self {
            save_path: default_save_path(),
            image_path: None,
            keypoint_path: None,
            mask_path: None,
            image_suffix: default_image_suffix(),
            keypoint_suffix: default_keypoint_suffix(),
            mask_suffix: default_mask_suffix(),
            batch_size: DEFAULT_BATCH_SIZE,
            workers: DEFAULT_WORKERS,
            pred: false,
            mixed_precision: false,
            seg: true,
            input_size: DEFAULT_INPUT_SIZE,
            original_size: DEFAULT_ORIGINAL_SIZE,
            gap: DEFAULT_GAP,
            ppl: DEFAULT_PPL,
            dataset_name: default_dataset_name(),
            max_lane: DEFAULT_MAX_LANE,
            thresh: DEFAULT_THRESH,
            colors: default_colors(),
            keypoint_color: DEFAULT_KEYPOINT_COLOR,
            style: OverlayStyle::default(),
            line_trans: DEFAULT_LINE_TRANS,
            mask_alpha: DEFAULT_MASK_ALPHA,
            point_radius: DEFAULT_POINT_RADIUS,
            vis_dataset: None,
            test_augmentation: TransformConfig::default(),
            model: None,
        }
    }
}

/// Command line overrides, applied on top of the YAML file
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigOverrides {
    /// Folder of input images
    #[arg(long)]
    pub image_path: Option<PathBuf>,

    /// Folder of CULane `.lines.txt` annotations
    #[arg(long)]
    pub keypoint_path: Option<PathBuf>,

    /// Folder of segmentation label images
    #[arg(long)]
    pub mask_path: Option<PathBuf>,

    /// Where annotated images are written
    #[arg(long)]
    pub save_path: Option<PathBuf>,

    #[arg(long)]
    pub image_suffix: Option<String>,

    #[arg(long)]
    pub keypoint_suffix: Option<String>,

    #[arg(long)]
    pub mask_suffix: Option<String>,

    #[arg(long)]
    pub batch_size: Option<usize>,

    #[arg(long)]
    pub workers: Option<usize>,

    /// Draw model predictions instead of annotations
    #[arg(long)]
    pub pred: bool,

    /// Directory of precomputed CULane predictions, used as the model for --pred
    #[arg(long)]
    pub pred_path: Option<PathBuf>,

    #[arg(long)]
    pub mixed_precision: bool,

    #[arg(long, value_enum)]
    pub style: Option<OverlayStyle>,
}

impl VisConfig {
    /// Load configuration from a YAML file, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> VisResult<Self> {
        let Some(path) = path else {
            info!("No config file given, using defaults");
            return Ok(Self::default());
        };

        let contents = fs::read_to_string(path).map_err(|e| VisError::io(path, e))?;
        let config = Self::from_yaml(&contents)?;
        info!("Loaded config from {:?}", path);
        debug!("Config: {:?}", config);
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> VisResult<Self> {
        Ok(serde_yaml::from_str::<VisConfig>(contents)?)
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(p) = &overrides.image_path {
            self.image_path = Some(p.clone());
        }
        if let Some(p) = &overrides.keypoint_path {
            self.keypoint_path = Some(p.clone());
        }
        if let Some(p) = &overrides.mask_path {
            self.mask_path = Some(p.clone());
        }
        if let Some(p) = &overrides.save_path {
            self.save_path = p.clone();
        }
        if let Some(s) = &overrides.image_suffix {
            self.image_suffix = s.clone();
        }
        if let Some(s) = &overrides.keypoint_suffix {
            self.keypoint_suffix = s.clone();
        }
        if let Some(s) = &overrides.mask_suffix {
            self.mask_suffix = s.clone();
        }
        if let Some(n) = overrides.batch_size {
            self.batch_size = n;
        }
        if let Some(n) = overrides.workers {
            self.workers = n;
        }
        if overrides.pred {
            self.pred = true;
        }
        if let Some(root) = &overrides.pred_path {
            self.model = Some(ModelConfig::PredictionDir {
                root: root.clone(),
                suffix: DEFAULT_KEYPOINT_SUFFIX.to_string(),
                rescale: false,
            });
        }
        if overrides.mixed_precision {
            self.mixed_precision = true;
        }
        if let Some(style) = overrides.style {
            self.style = style;
        }
    }

    pub fn validate(&self) -> VisResult<()> {
        if self.batch_size == 0 {
            return Err(VisError::Config("batch_size must be at least 1".to_string()));
        }
        if self.colors.is_empty() {
            return Err(VisError::Config("colors must hold at least the background entry".to_string()));
        }
        for (name, value) in [("line_trans", self.line_trans), ("mask_alpha", self.mask_alpha)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(VisError::Config(format!("{} must be within [0, 1], got {}", name, value)));
            }
        }
        let sizes = [
            ("input_size", Some(self.input_size)),
            ("original_size", Some(self.original_size)),
            ("test_augmentation.input_size", self.test_augmentation.input_size),
        ];
        for (name, size) in sizes {
            if let Some([h, w]) = size {
                if h == 0 || w == 0 {
                    return Err(VisError::Config(format!("{} must be non-zero, got [{}, {}]", name, h, w)));
                }
            }
        }
        if self.point_radius < 0 {
            return Err(VisError::Config("point_radius must not be negative".to_string()));
        }
        Ok(())
    }

    /// Input size used by the test transform
    pub fn transform_size(&self) -> [u32; 2] {
        self.test_augmentation.input_size.unwrap_or(self.input_size)
    }
}
