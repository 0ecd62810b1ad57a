use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use super::{load_item, BatchItem, LaneDataset};
use crate::errors::{VisError, VisResult};
use crate::file_io::replace_suffix;
use crate::transforms::TestTransform;

#[derive(Debug, Clone, PartialEq)]
struct ListEntry {
    image: PathBuf,
    mask: Option<PathBuf>,
}

/// CULane-style dataset driven by a list file.
///
/// Each line names an image relative to `root` (a leading `/` is allowed, as in
/// the official lists). An optional second column names its segmentation label;
/// any further columns (lane existence flags) are ignored.
pub struct CulaneListDataset {
    root: PathBuf,
    root_output: PathBuf,
    root_mask: Option<PathBuf>,
    image_suffix: String,
    keypoint_suffix: String,
    mask_suffix: String,
    transform: TestTransform,
    entries: Vec<ListEntry>,
}

impl CulaneListDataset {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        root: PathBuf,
        list_file: PathBuf,
        root_output: PathBuf,
        root_mask: Option<PathBuf>,
        image_suffix: String,
        keypoint_suffix: String,
        mask_suffix: String,
        transform: TestTransform,
    ) -> VisResult<Self> {
        let content = fs::read_to_string(&list_file).map_err(|e| VisError::io(&list_file, e))?;
        let entries = parse_list(&content);
        info!("Read {} entries from {}", entries.len(), list_file.display());

        Ok(Self {
            root,
            root_output,
            root_mask,
            image_suffix,
            keypoint_suffix,
            mask_suffix,
            transform,
            entries,
        })
    }
}

fn relative(path: &str) -> PathBuf {
    PathBuf::from(path.trim_start_matches('/'))
}

fn parse_list(content: &str) -> Vec<ListEntry> {
    content
        .lines()
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            let image = columns.next()?;
            Some(ListEntry {
                image: relative(image),
                mask: columns.next().map(relative),
            })
        })
        .collect()
}

impl LaneDataset for CulaneListDataset {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn get(&self, index: usize) -> VisResult<BatchItem> {
        let entry = self.entries.get(index).ok_or_else(|| {
            VisError::Config(format!("index {} out of range for {} entries", index, self.entries.len()))
        })?;
        let image_rel: &Path = &entry.image;

        let keypoint_path = self
            .root
            .join(replace_suffix(image_rel, &self.image_suffix, &self.keypoint_suffix));
        let mask_path = match (&entry.mask, &self.root_mask) {
            (Some(mask), _) => Some(self.root.join(mask)),
            (None, Some(root_mask)) => {
                Some(root_mask.join(replace_suffix(image_rel, &self.image_suffix, &self.mask_suffix)))
            }
            (None, None) => None,
        };

        load_item(
            &self.root.join(image_rel),
            image_rel,
            Some(keypoint_path),
            mask_path,
            self.root_output.join(image_rel),
            &self.transform,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, RgbImage};

    #[test]
    fn test_parse_list() {
        let entries = parse_list(
            "/driver_100/clip/00000.jpg\n\
             \n\
             driver_100/clip/00030.jpg /laneseg/clip/00030.png 1 1 0 0\n",
        );
        assert_eq!(
            entries,
            vec![
                ListEntry {
                    image: PathBuf::from("driver_100/clip/00000.jpg"),
                    mask: None,
                },
                ListEntry {
                    image: PathBuf::from("driver_100/clip/00030.jpg"),
                    mask: Some(PathBuf::from("laneseg/clip/00030.png")),
                },
            ]
        );
    }

    #[test]
    fn test_reads_sibling_lines_file() {
        let tmp = tempfile::tempdir().unwrap();
        let clip = tmp.path().join("driver_100").join("clip");
        fs::create_dir_all(&clip).unwrap();
        RgbImage::new(12, 6).save(clip.join("00000.jpg")).unwrap();
        fs::write(clip.join("00000.lines.txt"), "5 5 6 4\n7 5 8 4\n").unwrap();
        let list = tmp.path().join("test.txt");
        fs::write(&list, "/driver_100/clip/00000.jpg\n").unwrap();

        let dataset = CulaneListDataset::new(
            tmp.path().to_path_buf(),
            list,
            tmp.path().join("vis"),
            None,
            ".jpg".to_string(),
            ".lines.txt".to_string(),
            ".png".to_string(),
            TestTransform::new([4, 4], [0.0; 3], [1.0; 3]).unwrap(),
        )
        .unwrap();

        assert_eq!(dataset.len(), 1);
        let item = dataset.get(0).unwrap();
        assert_eq!(item.target.keypoints.map(|k| k.len()), Some(2));
        assert!(item.target.masks.is_none());
        assert_eq!(
            item.target.filename,
            tmp.path().join("vis").join("driver_100/clip/00000.jpg")
        );
        assert_eq!(item.image.source, PathBuf::from("driver_100/clip/00000.jpg"));
    }

    fn list_dataset(root: &Path, list: &str, root_mask: Option<PathBuf>) -> CulaneListDataset {
        let list_file = root.join("list.txt");
        fs::write(&list_file, list).unwrap();
        CulaneListDataset::new(
            root.to_path_buf(),
            list_file,
            root.join("vis"),
            root_mask,
            ".jpg".to_string(),
            ".lines.txt".to_string(),
            ".png".to_string(),
            TestTransform::new([4, 4], [0.0; 3], [1.0; 3]).unwrap(),
        )
        .unwrap()
    }

    fn save_mask(path: &Path, class: u8) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut mask = GrayImage::new(12, 6);
        mask.put_pixel(1, 1, Luma([class]));
        mask.save(path).unwrap();
    }

    #[test]
    fn test_mask_from_list_column() {
        let tmp = tempfile::tempdir().unwrap();
        let clip = tmp.path().join("driver_100").join("clip");
        fs::create_dir_all(&clip).unwrap();
        RgbImage::new(12, 6).save(clip.join("00030.jpg")).unwrap();
        save_mask(&tmp.path().join("laneseg").join("clip").join("00030.png"), 3);
        // The column wins over root_mask
        save_mask(&tmp.path().join("masks").join("driver_100").join("clip").join("00030.png"), 1);

        let dataset = list_dataset(
            tmp.path(),
            "/driver_100/clip/00030.jpg /laneseg/clip/00030.png 1 1 0 0\n",
            Some(tmp.path().join("masks")),
        );
        let item = dataset.get(0).unwrap();
        let mask = item.target.masks.unwrap();
        assert_eq!(mask.get_pixel(1, 1).0[0], 3);
        // No sibling .lines.txt
        assert!(item.target.keypoints.is_none());
    }

    #[test]
    fn test_mask_from_root_mask() {
        let tmp = tempfile::tempdir().unwrap();
        let clip = tmp.path().join("driver_100").join("clip");
        fs::create_dir_all(&clip).unwrap();
        RgbImage::new(12, 6).save(clip.join("00000.jpg")).unwrap();
        RgbImage::new(12, 6).save(clip.join("00001.jpg")).unwrap();
        save_mask(&tmp.path().join("masks").join("driver_100").join("clip").join("00000.png"), 2);

        let dataset = list_dataset(
            tmp.path(),
            "driver_100/clip/00000.jpg\ndriver_100/clip/00001.jpg\n",
            Some(tmp.path().join("masks")),
        );
        assert_eq!(dataset.get(0).unwrap().target.masks.map(|m| m.get_pixel(1, 1).0[0]), Some(2));
        assert!(dataset.get(1).unwrap().target.masks.is_none());

        let without_root = list_dataset(tmp.path(), "driver_100/clip/00000.jpg\n", None);
        assert!(without_root.get(0).unwrap().target.masks.is_none());
    }
}
