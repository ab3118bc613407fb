pub mod descriptors;
pub mod detectors;
pub mod feature_extractor;
pub mod keypoints;
pub mod matcher;
pub mod region_mask;

pub use descriptors::{DescriptorComputer, DescriptorMethod};
pub use detectors::{CornerDetector, DetectorMethod};
pub use feature_extractor::FeatureExtractor;
pub use keypoints::{Descriptor, FeatureSet, Keypoint};
pub use matcher::{KnnMatch, MatchOutcome, Matcher, Neighbour};
pub use region_mask::RegionMask;
