/// Lane overlay rendering
///
/// Blends segmentation masks and draws lane keypoints on top of the original
/// (unnormalized) images.
use clap::ValueEnum;
use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::{VisError, VisResult};
use crate::lane_label::{Lane, Point};

/// How keypoints are drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OverlayStyle {
    /// A filled circle per keypoint
    #[default]
    Point,
    /// A translucent polyline through each lane
    Line,
}

#[derive(Debug, Clone)]
pub struct OverlayOptions<'a> {
    pub mask_colors: &'a [[u8; 3]],
    pub keypoint_color: [u8; 3],
    pub style: OverlayStyle,
    pub point_radius: i32,
    pub line_trans: f32,
    pub mask_alpha: f32,
}

/// Render masks and/or keypoints onto a batch of images.
///
/// `None` for either collection means the batch has no such data. A `None`
/// entry inside a collection skips that image only.
pub fn lane_detection_visualize_batched(
    images: &[RgbImage],
    masks: Option<&[Option<GrayImage>]>,
    keypoints: Option<&[Option<Vec<Lane>>]>,
    options: &OverlayOptions,
) -> VisResult<Vec<RgbImage>> {
    if let Some(masks) = masks {
        check_batch_len("masks", masks.len(), images.len())?;
    }
    if let Some(keypoints) = keypoints {
        check_batch_len("keypoints", keypoints.len(), images.len())?;
    }

    images
        .par_iter()
        .enumerate()
        .map(|(i, image)| {
            let mut out = image.clone();
            if let Some(Some(mask)) = masks.map(|m| &m[i]) {
                blend_mask(&mut out, mask, options.mask_colors, options.mask_alpha)?;
            }
            let has_pixels = out.width() > 0 && out.height() > 0;
            if let Some(Some(lanes)) = keypoints.map(|k| &k[i]).filter(|_| has_pixels) {
                match options.style {
                    OverlayStyle::Point => draw_points(&mut out, lanes, options),
                    OverlayStyle::Line => draw_lines(&mut out, lanes, options),
                }
            }
            Ok(out)
        })
        .collect()
}

fn check_batch_len(what: &str, got: usize, expected: usize) -> VisResult<()> {
    if got != expected {
        return Err(VisError::Overlay(format!(
            "{} for {} images, expected {}",
            what, got, expected
        )));
    }
    Ok(())
}

/// Blend class colors into every pixel whose label is non-zero
pub fn blend_mask(
    image: &mut RgbImage,
    mask: &GrayImage,
    colors: &[[u8; 3]],
    alpha: f32,
) -> VisResult<()> {
    if image.dimensions() != mask.dimensions() {
        return Err(VisError::Overlay(format!(
            "mask is {:?} but image is {:?}",
            mask.dimensions(),
            image.dimensions()
        )));
    }

    for (pixel, label) in image.pixels_mut().zip(mask.pixels()) {
        let class = label.0[0] as usize;
        if class == 0 {
            continue;
        }
        let color = colors.get(class).ok_or_else(|| {
            VisError::Overlay(format!(
                "mask class {} has no color ({} colors configured)",
                class,
                colors.len()
            ))
        })?;
        for c in 0..3 {
            let blended = pixel.0[c] as f32 * (1.0 - alpha) + color[c] as f32 * alpha;
            pixel.0[c] = blended.round().clamp(0.0, 255.0) as u8;
        }
    }
    Ok(())
}

// CULane marks missing points with negative coordinates
fn is_drawable(point: &Point) -> bool {
    point.x.is_finite() && point.y.is_finite() && point.x > 0.0 && point.y > 0.0
}

/// Area where a stamp of `radius` can still touch the image
#[derive(Debug, Clone, Copy)]
struct Canvas {
    min: f64,
    max_x: f64,
    max_y: f64,
}

impl Canvas {
    fn new(image: &RgbImage, radius: i32) -> Self {
        let pad = radius.max(0) as f64;
        Self {
            min: -pad,
            max_x: image.width() as f64 - 1.0 + pad,
            max_y: image.height() as f64 - 1.0 + pad,
        }
    }

    fn contains(&self, x: f64, y: f64) -> bool {
        (self.min..=self.max_x).contains(&x) && (self.min..=self.max_y).contains(&y)
    }

    /// Liang-Barsky clip of the segment `from -> to`, or `None` if it misses the canvas
    fn clip(&self, from: (f64, f64), to: (f64, f64)) -> Option<((f64, f64), (f64, f64))> {
        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        let mut t0 = 0.0f64;
        let mut t1 = 1.0f64;
        let edges = [
            (-dx, from.0 - self.min),
            (dx, self.max_x - from.0),
            (-dy, from.1 - self.min),
            (dy, self.max_y - from.1),
        ];
        for (p, q) in edges {
            if p == 0.0 {
                if q < 0.0 {
                    return None;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return None;
                }
                t0 = t0.max(r);
            } else {
                if r < t0 {
                    return None;
                }
                t1 = t1.min(r);
            }
        }
        Some((
            (from.0 + t0 * dx, from.1 + t0 * dy),
            (from.0 + t1 * dx, from.1 + t1 * dy),
        ))
    }

    // Only called with clipped coordinates, which fit in i32
    fn pixel(&self, x: f64, y: f64) -> (i32, i32) {
        (
            x.round().clamp(self.min, self.max_x) as i32,
            y.round().clamp(self.min, self.max_y) as i32,
        )
    }
}

fn draw_points(image: &mut RgbImage, lanes: &[Lane], options: &OverlayOptions) {
    let color = Rgb(options.keypoint_color);
    let canvas = Canvas::new(image, options.point_radius);
    for point in lanes.iter().flatten().filter(|p| is_drawable(p)) {
        let (x, y) = (point.x as f64, point.y as f64);
        if !canvas.contains(x, y) {
            continue;
        }
        draw_filled_circle_mut(image, canvas.pixel(x, y), options.point_radius, color);
    }
}

fn draw_lines(image: &mut RgbImage, lanes: &[Lane], options: &OverlayOptions) {
    let color = Rgb(options.keypoint_color);
    let canvas = Canvas::new(image, options.point_radius);
    let mut layer = image.clone();

    for lane in lanes {
        let points: Vec<&Point> = lane.iter().filter(|p| is_drawable(p)).collect();
        for pair in points.windows(2) {
            let from = (pair[0].x as f64, pair[0].y as f64);
            let to = (pair[1].x as f64, pair[1].y as f64);
            if let Some((from, to)) = canvas.clip(from, to) {
                draw_thick_segment(&mut layer, &canvas, from, to, options.point_radius, color);
            }
        }
    }

    let trans = options.line_trans;
    for (dst, src) in image.pixels_mut().zip(layer.pixels()) {
        if dst == src {
            continue;
        }
        for c in 0..3 {
            let blended = dst.0[c] as f32 * (1.0 - trans) + src.0[c] as f32 * trans;
            dst.0[c] = blended.round().clamp(0.0, 255.0) as u8;
        }
    }
}

// Stamp circles along an already clipped segment so the stroke width follows `radius`
fn draw_thick_segment(
    image: &mut RgbImage,
    canvas: &Canvas,
    from: (f64, f64),
    to: (f64, f64),
    radius: i32,
    color: Rgb<u8>,
) {
    let dx = to.0 - from.0;
    let dy = to.1 - from.1;
    let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as usize;
    for step in 0..=steps {
        let t = step as f64 / steps as f64;
        let center = canvas.pixel(from.0 + dx * t, from.1 + dy * t);
        draw_filled_circle_mut(image, center, radius, color);
    }
}
