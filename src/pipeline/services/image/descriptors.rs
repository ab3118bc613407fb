use super::keypoints::{Descriptor, Keypoint};
use image::GrayImage;
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Largest offset a test point may have from the keypoint
const PATTERN_EXTENT: i8 = 13;
/// Radius of the disc used for the intensity centroid
const ORIENTATION_RADIUS: i32 = 15;
/// Keypoints closer than this to the border cannot be described
pub const PATCH_RADIUS: u32 = 19;

const PATTERN_SEED: u64 = 0x5CE4_E5E1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DescriptorMethod {
    /// Plain binary intensity tests on the smoothed patch
    Brief,
    /// Binary tests steered by the patch orientation
    Orb,
}

impl DescriptorMethod {
    pub fn build(self) -> Box<dyn DescriptorComputer> {
        match self {
            DescriptorMethod::Brief => Box::new(BriefDescriptor),
            DescriptorMethod::Orb => Box::new(OrbDescriptor),
        }
    }
}

/// Strategy for turning keypoints on a smoothed image into descriptors
pub trait DescriptorComputer: Send + Sync {
    /// Describe `keypoint`, may update its orientation.
    fn compute(&self, smoothed: &GrayImage, keypoint: &mut Keypoint) -> Descriptor;
    fn name(&self) -> &'static str;
}

pub struct BriefDescriptor;

impl DescriptorComputer for BriefDescriptor {
    fn compute(&self, smoothed: &GrayImage, keypoint: &mut Keypoint) -> Descriptor {
        keypoint.angle = 0.0;
        binary_tests(smoothed, keypoint.x as i32, keypoint.y as i32, 1.0, 0.0)
    }

    fn name(&self) -> &'static str {
        "BRIEF"
    }
}

pub struct OrbDescriptor;

impl DescriptorComputer for OrbDescriptor {
    fn compute(&self, smoothed: &GrayImage, keypoint: &mut Keypoint) -> Descriptor {
        let (x, y) = (keypoint.x as i32, keypoint.y as i32);
        let angle = intensity_centroid_angle(smoothed, x, y);
        keypoint.angle = angle;
        binary_tests(smoothed, x, y, angle.cos(), angle.sin())
    }

    fn name(&self) -> &'static str {
        "ORB"
    }
}

/// The 256 test pairs, fixed for the lifetime of the process so reference
/// and frame descriptors are always comparable.
fn test_pattern() -> &'static [(i8, i8, i8, i8); 256] {
    static PATTERN: OnceLock<[(i8, i8, i8, i8); 256]> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let mut rng = StdRng::seed_from_u64(PATTERN_SEED);
        let mut pattern = [(0i8, 0i8, 0i8, 0i8); 256];
        for pair in pattern.iter_mut() {
            loop {
                let candidate = (
                    rng.random_range(-PATTERN_EXTENT..=PATTERN_EXTENT),
                    rng.random_range(-PATTERN_EXTENT..=PATTERN_EXTENT),
                    rng.random_range(-PATTERN_EXTENT..=PATTERN_EXTENT),
                    rng.random_range(-PATTERN_EXTENT..=PATTERN_EXTENT),
                );
                // a pair comparing a pixel with itself carries no information
                if (candidate.0, candidate.1) != (candidate.2, candidate.3) {
                    *pair = candidate;
                    break;
                }
            }
        }
        pattern
    })
}

fn sample(image: &GrayImage, x: i32, y: i32) -> u8 {
    let px = x.clamp(0, image.width() as i32 - 1) as u32;
    let py = y.clamp(0, image.height() as i32 - 1) as u32;
    image.get_pixel(px, py).0[0]
}

fn binary_tests(image: &GrayImage, x: i32, y: i32, cos: f32, sin: f32) -> Descriptor {
    let mut descriptor = [0u8; 32];
    if image.width() == 0 || image.height() == 0 {
        return descriptor;
    }

    let rotate = |dx: i8, dy: i8| -> (i32, i32) {
        let (dx, dy) = (dx as f32, dy as f32);
        (
            (dx * cos - dy * sin).round() as i32,
            (dx * sin + dy * cos).round() as i32,
        )
    };

    for (byte_idx, tests) in test_pattern().chunks(8).enumerate() {
        let mut byte = 0u8;
        for (bit_idx, &(dx1, dy1, dx2, dy2)) in tests.iter().enumerate() {
            let (rx1, ry1) = rotate(dx1, dy1);
            let (rx2, ry2) = rotate(dx2, dy2);
            if sample(image, x + rx1, y + ry1) < sample(image, x + rx2, y + ry2) {
                byte |= 1 << bit_idx;
            }
        }
        descriptor[byte_idx] = byte;
    }

    descriptor
}

fn intensity_centroid_angle(image: &GrayImage, x: i32, y: i32) -> f32 {
    let mut m01 = 0.0f32;
    let mut m10 = 0.0f32;
    for dy in -ORIENTATION_RADIUS..=ORIENTATION_RADIUS {
        for dx in -ORIENTATION_RADIUS..=ORIENTATION_RADIUS {
            if dx * dx + dy * dy > ORIENTATION_RADIUS * ORIENTATION_RADIUS {
                continue;
            }
            let intensity = sample(image, x + dx, y + dy) as f32;
            m10 += intensity * dx as f32;
            m01 += intensity * dy as f32;
        }
    }
    m01.atan2(m10)
}
