use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VisError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to decode or encode image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("Lane line {line} has an odd number of coordinates ({tokens}), cannot form (x, y) pairs")]
    OddCoordinateCount { line: usize, tokens: usize },
    #[error("Lane line {line}: invalid coordinate {token:?}")]
    ParseFloat { line: usize, token: String },
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Overlay failed: {0}")]
    Overlay(String),
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl VisError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        VisError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn image(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        VisError::Image {
            path: path.into(),
            source,
        }
    }
}

pub type VisResult<T> = Result<T, VisError>;
