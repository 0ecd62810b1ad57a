use std::fs;
use std::path::{Path, PathBuf};

use image::RgbImage;
use walkdir::WalkDir;
#[allow(unused_imports)]
use log::{debug, info, warn};

use crate::errors::{VisError, VisResult};

/// Create a directory and its parents; succeeds if it already exists
pub fn ensure_dir(path: &Path) -> VisResult<()> {
    fs::create_dir_all(path).map_err(|e| VisError::io(path, e))
}

pub fn is_file(path: &Path) -> bool {
    fs::metadata(path).map(|metadata| metadata.is_file()).unwrap_or(false)
}

pub fn is_directory(path: &Path) -> bool {
    fs::metadata(path).map(|metadata| metadata.is_dir()).unwrap_or(false)
}

/// Collect files under `directory_path` whose names end with `suffix`,
/// walking subdirectories. Paths are returned relative to `directory_path`.
///
/// Directory symlinks are not followed, so a link back into the tree cannot
/// repeat images. A symlink to a file is listed like the file itself.
pub fn get_image_paths(directory_path: &Path, suffix: &str) -> VisResult<Vec<PathBuf>> {
    if !is_directory(directory_path) {
        return Err(VisError::io(
            directory_path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "image directory does not exist"),
        ));
    }

    let mut image_paths = Vec::new();
    for entry in WalkDir::new(directory_path).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(directory_path).to_path_buf();
            VisError::io(path, std::io::Error::from(e))
        })?;

        let file_type = entry.file_type();
        let is_image_file = file_type.is_file() || (file_type.is_symlink() && is_file(entry.path()));
        if !is_image_file {
            continue;
        }
        let matches = entry
            .file_name()
            .to_str()
            .map(|name| name.ends_with(suffix))
            .unwrap_or(false);
        if matches {
            if let Ok(relative) = entry.path().strip_prefix(directory_path) {
                image_paths.push(relative.to_path_buf());
            }
        }
    }

    // Natural order, so frame_10 comes after frame_9
    alphanumeric_sort::sort_path_slice(&mut image_paths);
    Ok(image_paths)
}

/// Swap a trailing suffix of `relative`'s file name, e.g. `a/b.jpg` -> `a/b.lines.txt`
pub fn replace_suffix(relative: &Path, old_suffix: &str, new_suffix: &str) -> PathBuf {
    let name = relative
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.strip_suffix(old_suffix).unwrap_or(&name);
    relative.with_file_name(format!("{}{}", stem, new_suffix))
}

pub fn load_rgb_image(path: &Path) -> VisResult<RgbImage> {
    let image = image::open(path).map_err(|e| VisError::image(path, e))?;
    Ok(image.into_rgb8())
}

/// Write each image to its filename, creating parent directories as needed.
/// The encoding follows the file extension.
pub fn save_images(images: &[RgbImage], filenames: &[PathBuf]) -> VisResult<()> {
    if images.len() != filenames.len() {
        return Err(VisError::Overlay(format!(
            "{} images but {} filenames",
            images.len(),
            filenames.len()
        )));
    }

    for (image, filename) in images.iter().zip(filenames) {
        if let Some(parent) = filename.parent() {
            if !parent.as_os_str().is_empty() && !is_directory(parent) {
                ensure_dir(parent)?;
            }
        }
        image.save(filename).map_err(|e| VisError::image(filename, e))?;
        debug!("Saved {}", filename.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_dir_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a").join("b");
        ensure_dir(&path).unwrap();
        ensure_dir(&path).unwrap();
        assert!(is_directory(&path));
    }

    #[test]
    fn test_get_image_paths_natural_order() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["frame_10.jpg", "frame_9.jpg", "frame_1.jpg", "notes.txt"] {
            fs::write(tmp.path().join(name), b"").unwrap();
        }
        fs::create_dir(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("sub").join("x.jpg"), b"").unwrap();

        let paths = get_image_paths(tmp.path(), ".jpg").unwrap();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("frame_1.jpg"),
                PathBuf::from("frame_9.jpg"),
                PathBuf::from("frame_10.jpg"),
                PathBuf::from("sub/x.jpg"),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_lists_each_image_once() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.jpg"), b"").unwrap();
        std::os::unix::fs::symlink(tmp.path(), tmp.path().join("loop")).unwrap();

        let paths = get_image_paths(tmp.path(), ".jpg").unwrap();
        assert_eq!(paths, vec![PathBuf::from("a.jpg")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_file_is_listed() {
        let tmp = tempfile::tempdir().unwrap();
        let store = tmp.path().join("store");
        let images = tmp.path().join("images");
        fs::create_dir_all(&store).unwrap();
        fs::create_dir_all(&images).unwrap();
        fs::write(store.join("b.jpg"), b"").unwrap();
        std::os::unix::fs::symlink(store.join("b.jpg"), images.join("b.jpg")).unwrap();

        let paths = get_image_paths(&images, ".jpg").unwrap();
        assert_eq!(paths, vec![PathBuf::from("b.jpg")]);
    }

    #[test]
    fn test_missing_directory() {
        assert!(get_image_paths(Path::new("/nonexistent/images"), ".jpg").is_err());
    }

    #[test]
    fn test_replace_suffix() {
        assert_eq!(
            replace_suffix(Path::new("driver/05.jpg"), ".jpg", ".lines.txt"),
            PathBuf::from("driver/05.lines.txt")
        );
        assert_eq!(
            replace_suffix(Path::new("05.png"), ".jpg", ".txt"),
            PathBuf::from("05.png.txt")
        );
    }

    #[test]
    fn test_save_images_creates_parents() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("nested").join("img.png");
        save_images(&[RgbImage::new(3, 3)], &[out.clone()]).unwrap();
        assert!(is_file(&out));
        assert_eq!(load_rgb_image(&out).unwrap().dimensions(), (3, 3));
    }

    #[test]
    fn test_save_images_count_mismatch() {
        assert!(save_images(&[RgbImage::new(1, 1)], &[]).is_err());
    }
}
