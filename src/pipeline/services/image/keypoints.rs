use super::descriptors::DescriptorMethod;
use serde::{Deserialize, Serialize};

/// 256-bit binary descriptor = 32 bytes
pub type Descriptor = [u8; 32];

/// A detected corner, orientation is in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub response: f32,
    pub angle: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, response: f32) -> Self {
        Self {
            x,
            y,
            response,
            angle: 0.0,
        }
    }
}

/// Keypoints and their descriptors, index aligned.
///
/// Sets built by the extractor remember which descriptor computed them,
/// hand-built sets don't.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSet {
    keypoints: Vec<Keypoint>,
    descriptors: Vec<Descriptor>,
    method: Option<DescriptorMethod>,
}

impl FeatureSet {
    pub fn new(keypoints: Vec<Keypoint>, descriptors: Vec<Descriptor>) -> Self {
        debug_assert_eq!(keypoints.len(), descriptors.len());
        Self {
            keypoints,
            descriptors,
            method: None,
        }
    }

    pub fn described_by(mut self, method: DescriptorMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn method(&self) -> Option<DescriptorMethod> {
        self.method
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

pub fn hamming_distance(a: &Descriptor, b: &Descriptor) -> u32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
}
