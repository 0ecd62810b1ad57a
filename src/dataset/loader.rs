use std::ops::Range;

use image::RgbImage;
use log::debug;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use super::{BatchItem, LaneDataset, Target};
use crate::errors::{VisError, VisResult};
use crate::transforms::ImageTensor;

/// Items of one batch, merged field by field
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub images: Vec<ImageTensor>,
    pub originals: Vec<RgbImage>,
    pub targets: Vec<Target>,
}

/// Collate items into a batch, keeping item order. Targets stay per-item
/// records since keypoint counts differ between images.
pub fn dict_collate(items: Vec<BatchItem>) -> Batch {
    let mut batch = Batch {
        images: Vec::with_capacity(items.len()),
        originals: Vec::with_capacity(items.len()),
        targets: Vec::with_capacity(items.len()),
    };
    for item in items {
        batch.images.push(item.image);
        batch.originals.push(item.original);
        batch.targets.push(item.target);
    }
    batch
}

/// A dataset with nothing in it
pub struct EmptyDataset;

impl LaneDataset for EmptyDataset {
    fn len(&self) -> usize {
        0
    }

    fn get(&self, index: usize) -> VisResult<BatchItem> {
        Err(VisError::Config(format!("index {} out of range for an empty dataset", index)))
    }
}

/// Sequential (never shuffled) batches over a dataset. Items of a batch are
/// prepared on a pool of `workers` threads, or on the caller when `workers` is 0.
pub struct DataLoader {
    dataset: Box<dyn LaneDataset>,
    batch_size: usize,
    pool: Option<ThreadPool>,
}

impl DataLoader {
    pub fn new(dataset: Box<dyn LaneDataset>, batch_size: usize, workers: usize) -> VisResult<Self> {
        if batch_size == 0 {
            return Err(VisError::Config("batch_size must be at least 1".to_string()));
        }

        let pool = if workers > 0 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("lanevis-loader-{}", i))
                .build()
                .map_err(|e| VisError::Config(format!("failed to start loader threads: {}", e)))?;
            Some(pool)
        } else {
            None
        };

        Ok(Self {
            dataset,
            batch_size,
            pool,
        })
    }

    pub fn empty() -> Self {
        Self {
            dataset: Box::new(EmptyDataset),
            batch_size: 1,
            pool: None,
        }
    }

    /// Number of batches, counting a trailing partial one
    pub fn len(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> Batches<'_> {
        Batches {
            loader: self,
            next: 0,
        }
    }

    fn load_range(&self, range: Range<usize>) -> VisResult<Batch> {
        debug!("Loading items {:?}", range);
        let dataset = self.dataset.as_ref();
        let items = match &self.pool {
            Some(pool) => pool.install(|| {
                range
                    .into_par_iter()
                    .map(|i| dataset.get(i))
                    .collect::<VisResult<Vec<_>>>()
            })?,
            None => range.map(|i| dataset.get(i)).collect::<VisResult<Vec<_>>>()?,
        };
        Ok(dict_collate(items))
    }
}

impl<'a> IntoIterator for &'a DataLoader {
    type Item = VisResult<Batch>;
    type IntoIter = Batches<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct Batches<'a> {
    loader: &'a DataLoader,
    next: usize,
}

impl Iterator for Batches<'_> {
    type Item = VisResult<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        let total = self.loader.dataset.len();
        if self.next >= total {
            return None;
        }
        let end = (self.next + self.loader.batch_size).min(total);
        let range = self.next..end;
        self.next = end;
        Some(self.loader.load_range(range))
    }
}
