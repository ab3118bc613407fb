use super::keypoints::Keypoint;
use crate::config::FeatureConfig;
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Bresenham circle of radius 3, clockwise from 12 o'clock.
const CIRCLE_OFFSETS: [(i32, i32); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectorMethod {
    Fast,
    Harris,
}

impl DetectorMethod {
    pub fn build(self, config: &FeatureConfig) -> Box<dyn CornerDetector> {
        match self {
            DetectorMethod::Fast => Box::new(FastDetector::from_config(config)),
            DetectorMethod::Harris => Box::new(HarrisDetector::from_config(config)),
        }
    }
}

/// Strategy for finding distinctive points in a grayscale image
pub trait CornerDetector: Send + Sync {
    fn detect(&self, image: &GrayImage) -> Vec<Keypoint>;
    fn name(&self) -> &'static str;
}

/// FAST-N segment test detector
pub struct FastDetector {
    pub threshold: u8,
    pub arc_length: usize,
    pub nms_radius: u32,
    pub max_keypoints: usize,
}

impl FastDetector {
    pub fn from_config(config: &FeatureConfig) -> Self {
        Self {
            threshold: config.fast_threshold,
            arc_length: config.fast_arc_length.clamp(9, 12),
            nms_radius: config.nms_radius,
            max_keypoints: config.max_keypoints,
        }
    }

    /// Returns the corner score when at least `arc_length` contiguous
    /// circle pixels are all brighter or all darker than the center.
    fn corner_score(&self, image: &GrayImage, x: u32, y: u32) -> Option<f32> {
        let center = image.get_pixel(x, y).0[0] as i16;
        let threshold = self.threshold as i16;

        let mut bright_mask: u32 = 0;
        let mut dark_mask: u32 = 0;
        let mut bright_score = 0.0;
        let mut dark_score = 0.0;

        for (i, (dx, dy)) in CIRCLE_OFFSETS.iter().enumerate() {
            let px = (x as i32 + dx) as u32;
            let py = (y as i32 + dy) as u32;
            let diff = image.get_pixel(px, py).0[0] as i16 - center;
            if diff > threshold {
                bright_mask |= 1 << i;
                bright_score += (diff - threshold) as f32;
            } else if diff < -threshold {
                dark_mask |= 1 << i;
                dark_score += (-diff - threshold) as f32;
            }
        }

        let bright = has_contiguous_run(bright_mask, self.arc_length);
        let dark = has_contiguous_run(dark_mask, self.arc_length);
        match (bright, dark) {
            (true, _) => Some(bright_score),
            (false, true) => Some(dark_score),
            _ => None,
        }
    }
}

impl CornerDetector for FastDetector {
    fn detect(&self, image: &GrayImage) -> Vec<Keypoint> {
        let (width, height) = image.dimensions();
        // the circle has radius 3
        if width <= 6 || height <= 6 {
            return Vec::new();
        }

        let mut corners = Vec::new();
        for y in 3..height - 3 {
            for x in 3..width - 3 {
                if let Some(score) = self.corner_score(image, x, y) {
                    corners.push(Keypoint::new(x as f32, y as f32, score));
                }
            }
        }

        suppress_non_maxima(corners, self.nms_radius, self.max_keypoints)
    }

    fn name(&self) -> &'static str {
        "FAST"
    }
}

fn has_contiguous_run(mask: u32, length: usize) -> bool {
    if mask == 0 {
        return false;
    }
    // duplicate the 16 bits so runs can wrap around the circle
    let mut run = mask | (mask << 16);
    for _ in 1..length {
        run &= run >> 1;
    }
    run != 0
}

/// Harris corner detector over Sobel gradients
pub struct HarrisDetector {
    pub k: f32,
    pub threshold: f32,
    pub window_radius: u32,
    pub nms_radius: u32,
    pub max_keypoints: usize,
}

impl HarrisDetector {
    pub fn from_config(config: &FeatureConfig) -> Self {
        Self {
            k: config.harris_k,
            threshold: config.harris_threshold,
            window_radius: 1,
            nms_radius: config.nms_radius,
            max_keypoints: config.max_keypoints,
        }
    }

    fn gradients(image: &GrayImage) -> (Vec<f32>, Vec<f32>) {
        let (width, height) = image.dimensions();
        let (w, h) = (width as usize, height as usize);
        let mut gx = vec![0.0f32; w * h];
        let mut gy = vec![0.0f32; w * h];
        let at = |x: usize, y: usize| image.get_pixel(x as u32, y as u32).0[0] as f32;

        for y in 1..h - 1 {
            for x in 1..w - 1 {
                gx[y * w + x] = (at(x + 1, y - 1) + 2.0 * at(x + 1, y) + at(x + 1, y + 1))
                    - (at(x - 1, y - 1) + 2.0 * at(x - 1, y) + at(x - 1, y + 1));
                gy[y * w + x] = (at(x - 1, y + 1) + 2.0 * at(x, y + 1) + at(x + 1, y + 1))
                    - (at(x - 1, y - 1) + 2.0 * at(x, y - 1) + at(x + 1, y - 1));
            }
        }
        (gx, gy)
    }
}

impl CornerDetector for HarrisDetector {
    fn detect(&self, image: &GrayImage) -> Vec<Keypoint> {
        let (width, height) = image.dimensions();
        let r = self.window_radius as usize;
        let margin = r + 1;
        let (w, h) = (width as usize, height as usize);
        if w <= 2 * margin || h <= 2 * margin {
            return Vec::new();
        }

        let (gx, gy) = Self::gradients(image);
        let mut corners = Vec::new();

        for y in margin..h - margin {
            for x in margin..w - margin {
                let (mut sxx, mut syy, mut sxy) = (0.0f32, 0.0f32, 0.0f32);
                for wy in y - r..=y + r {
                    for wx in x - r..=x + r {
                        let ix = gx[wy * w + wx];
                        let iy = gy[wy * w + wx];
                        sxx += ix * ix;
                        syy += iy * iy;
                        sxy += ix * iy;
                    }
                }
                let trace = sxx + syy;
                let response = sxx * syy - sxy * sxy - self.k * trace * trace;
                if response > self.threshold {
                    corners.push(Keypoint::new(x as f32, y as f32, response));
                }
            }
        }

        suppress_non_maxima(corners, self.nms_radius, self.max_keypoints)
    }

    fn name(&self) -> &'static str {
        "Harris"
    }
}

/// Keep the strongest corner within every `radius` neighbourhood and at
/// most `max_keypoints` overall. Ties are broken by position so the result
/// does not depend on scan order.
pub fn suppress_non_maxima(
    mut corners: Vec<Keypoint>,
    radius: u32,
    max_keypoints: usize,
) -> Vec<Keypoint> {
    corners.sort_by(|a, b| {
        b.response
            .partial_cmp(&a.response)
            .unwrap_or(Ordering::Equal)
            .then(a.y.total_cmp(&b.y))
            .then(a.x.total_cmp(&b.x))
    });

    if radius == 0 {
        corners.truncate(max_keypoints);
        return corners;
    }

    let cell = radius as i32 + 1;
    let mut occupied: HashMap<(i32, i32), Vec<(i32, i32)>> = HashMap::new();
    let mut selected = Vec::new();

    for corner in corners {
        let (x, y) = (corner.x as i32, corner.y as i32);
        let (cx, cy) = (x / cell, y / cell);

        let suppressed = (-1..=1).any(|dy| {
            (-1..=1).any(|dx| {
                occupied.get(&(cx + dx, cy + dy)).is_some_and(|points| {
                    points.iter().any(|&(px, py)| {
                        (px - x).abs() <= radius as i32 && (py - y).abs() <= radius as i32
                    })
                })
            })
        });
        if suppressed {
            continue;
        }

        occupied.entry((cx, cy)).or_default().push((x, y));
        selected.push(corner);
        if selected.len() >= max_keypoints {
            break;
        }
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn square(size: u32, from: u32, to: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            if (from..to).contains(&x) && (from..to).contains(&y) {
                Luma([220])
            } else {
                Luma([20])
            }
        })
    }

    fn near(keypoints: &[Keypoint], x: f32, y: f32, tolerance: f32) -> bool {
        keypoints
            .iter()
            .any(|k| (k.x - x).abs() <= tolerance && (k.y - y).abs() <= tolerance)
    }

    #[test]
    fn contiguous_run_wraps_around_the_circle() {
        // bits 12..16 and 0..5 set: 9 contiguous pixels across the wrap
        let mask: u32 = 0b1111_0000_0001_1111;
        assert!(has_contiguous_run(mask, 9));
        assert!(!has_contiguous_run(mask, 10));
        assert!(!has_contiguous_run(0, 9));
        assert!(has_contiguous_run(0xFFFF, 12));
    }

    #[test]
    fn fast_finds_square_corners() {
        let detector = FastDetector::from_config(&FeatureConfig::default());
        let keypoints = detector.detect(&square(48, 16, 32));

        assert!(!keypoints.is_empty());
        assert!(near(&keypoints, 16.0, 16.0, 2.0));
        assert!(near(&keypoints, 31.0, 31.0, 2.0));
        // nothing in the flat interior
        assert!(!near(&keypoints, 24.0, 24.0, 4.0));
    }

    #[test]
    fn fast_on_flat_or_tiny_image_is_empty() {
        let detector = FastDetector::from_config(&FeatureConfig::default());
        assert!(detector.detect(&GrayImage::new(64, 64)).is_empty());
        assert!(detector.detect(&GrayImage::new(5, 5)).is_empty());
        assert!(detector.detect(&GrayImage::new(0, 0)).is_empty());
    }

    #[test]
    fn harris_finds_square_corners() {
        let detector = HarrisDetector::from_config(&FeatureConfig::default());
        let keypoints = detector.detect(&square(48, 16, 32));

        assert!(near(&keypoints, 16.0, 16.0, 3.0));
        assert!(near(&keypoints, 31.0, 16.0, 3.0));
        assert!(!near(&keypoints, 24.0, 24.0, 4.0));
    }

    #[test]
    fn non_maximum_suppression_keeps_strongest_and_caps_count() {
        let corners = vec![
            Keypoint::new(10.0, 10.0, 5.0),
            Keypoint::new(11.0, 10.0, 9.0),
            Keypoint::new(30.0, 30.0, 1.0),
            Keypoint::new(50.0, 50.0, 2.0),
        ];

        let kept = suppress_non_maxima(corners.clone(), 3, 10);
        assert_eq!(kept.len(), 3);
        assert_eq!(kept[0].x, 11.0);

        let capped = suppress_non_maxima(corners, 3, 2);
        assert_eq!(capped.len(), 2);
        assert_eq!(capped[1].x, 50.0);
    }
}
