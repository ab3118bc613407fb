use super::keypoints::{Descriptor, FeatureSet, hamming_distance};
use crate::config::MatcherConfig;
use serde::{Deserialize, Serialize};

/// One neighbour found for a candidate descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neighbour {
    pub train_idx: usize,
    pub distance: u32,
}

/// The k nearest reference descriptors of one candidate descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnnMatch {
    pub query_idx: usize,
    pub neighbours: Vec<Neighbour>,
    pub accepted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    pub accepted: usize,
    pub score: f32,
    /// How far a failing outcome got towards passing, 0 to 100
    pub closeness: f32,
    pub passed: bool,
    pub matches: Vec<KnnMatch>,
}

impl MatchOutcome {
    /// Failing outcome used whenever one side has nothing to match.
    pub fn empty() -> Self {
        Self {
            accepted: 0,
            score: 0.0,
            closeness: 0.0,
            passed: false,
            matches: Vec::new(),
        }
    }
}

/// Brute-force k-NN matcher over Hamming distance with a ratio test.
///
/// The score is the percentage of reference keypoints left without an
/// accepted correspondence, so a lower score is a tighter match. Passing
/// only depends on the number of accepted correspondences, and closeness
/// is that count as a percentage of the pass threshold.
#[derive(Debug, Clone)]
pub struct Matcher {
    config: MatcherConfig,
}

impl Matcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    pub fn match_features(&self, reference: &FeatureSet, candidate: &FeatureSet) -> MatchOutcome {
        if reference.is_empty() || candidate.is_empty() {
            return MatchOutcome::empty();
        }

        let k = self.config.k.max(2);
        let matches: Vec<KnnMatch> = candidate
            .descriptors()
            .iter()
            .enumerate()
            .map(|(query_idx, query)| {
                let neighbours = nearest(query, reference, k);
                let accepted = self.passes_ratio_test(&neighbours);
                KnnMatch {
                    query_idx,
                    neighbours,
                    accepted,
                }
            })
            .collect();

        let accepted = matches.iter().filter(|m| m.accepted).count();
        let reference_count = reference.len();
        let covered = accepted.min(reference_count) as f32 / reference_count as f32;
        let required = self.config.min_good_matches;
        let passed = accepted >= required;
        let closeness = if passed {
            100.0
        } else {
            100.0 * accepted as f32 / required as f32
        };

        MatchOutcome {
            accepted,
            score: 100.0 * (1.0 - covered),
            closeness,
            passed,
            matches,
        }
    }

    fn passes_ratio_test(&self, neighbours: &[Neighbour]) -> bool {
        match neighbours {
            [] => false,
            [best] => best.distance <= self.config.max_distance,
            [best, second, ..] => {
                best.distance <= self.config.max_distance
                    && (best.distance as f32) < self.config.ratio * second.distance as f32
            }
        }
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(MatcherConfig::default())
    }
}

fn nearest(query: &Descriptor, reference: &FeatureSet, k: usize) -> Vec<Neighbour> {
    let mut neighbours: Vec<Neighbour> = Vec::with_capacity(k + 1);
    for (train_idx, train) in reference.descriptors().iter().enumerate() {
        let distance = hamming_distance(query, train);
        if neighbours.len() == k
            && neighbours
                .last()
                .is_some_and(|worst| worst.distance <= distance)
        {
            continue;
        }
        // stable insert keeps the lower train index first on ties
        let position = neighbours.partition_point(|n| n.distance <= distance);
        neighbours.insert(
            position,
            Neighbour {
                train_idx,
                distance,
            },
        );
        neighbours.truncate(k);
    }
    neighbours
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::services::image::keypoints::Keypoint;

    fn descriptor(fill: u8, first_byte: u8) -> Descriptor {
        let mut d = [fill; 32];
        d[0] = first_byte;
        d
    }

    fn features(descriptors: Vec<Descriptor>) -> FeatureSet {
        let keypoints = (0..descriptors.len())
            .map(|i| Keypoint::new(i as f32, 0.0, 1.0))
            .collect();
        FeatureSet::new(keypoints, descriptors)
    }

    fn matcher(min_good_matches: usize) -> Matcher {
        Matcher::new(MatcherConfig {
            min_good_matches,
            ..MatcherConfig::default()
        })
    }

    #[test]
    fn empty_side_fails_with_zero_score() {
        let some = features(vec![descriptor(0, 0)]);
        let outcome = matcher(1).match_features(&FeatureSet::empty(), &some);
        assert_eq!(outcome, MatchOutcome::empty());

        let outcome = matcher(1).match_features(&some, &FeatureSet::empty());
        assert!(!outcome.passed);
        assert_eq!(outcome.score, 0.0);
    }

    #[test]
    fn distinct_exact_matches_pass_the_ratio_test() {
        let reference = features(vec![
            descriptor(0x00, 0x00),
            descriptor(0xFF, 0xFF),
            descriptor(0x0F, 0x0F),
        ]);
        let outcome = matcher(3).match_features(&reference, &reference.clone());

        assert_eq!(outcome.accepted, 3);
        assert!(outcome.passed);
        assert_eq!(outcome.score, 0.0);
        assert_eq!(outcome.closeness, 100.0);
        assert_eq!(outcome.matches[1].neighbours[0].train_idx, 1);
        assert_eq!(outcome.matches[1].neighbours[0].distance, 0);
    }

    #[test]
    fn ambiguous_matches_are_rejected() {
        // two references one bit apart, the query sits between them
        let reference = features(vec![descriptor(0, 0b0000_0001), descriptor(0, 0b0000_0010)]);
        let candidate = features(vec![descriptor(0, 0b0000_0011)]);
        let outcome = matcher(1).match_features(&reference, &candidate);

        assert_eq!(outcome.accepted, 0);
        assert!(!outcome.passed);
        assert_eq!(outcome.score, 100.0);
        assert_eq!(outcome.closeness, 0.0);
        assert_eq!(outcome.matches[0].neighbours.len(), 2);
    }

    #[test]
    fn distant_matches_are_rejected() {
        let reference = features(vec![descriptor(0x00, 0x00), descriptor(0xFF, 0xFF)]);
        // 128 bits away from both
        let candidate = features(vec![[0x0F; 32]]);
        let outcome = matcher(1).match_features(&reference, &candidate);
        assert_eq!(outcome.accepted, 0);
    }

    #[test]
    fn single_reference_uses_absolute_distance() {
        let reference = features(vec![descriptor(0, 0)]);
        let close = features(vec![descriptor(0, 0b0000_0111)]);
        let far = features(vec![[0xFF; 32]]);

        assert_eq!(matcher(1).match_features(&reference, &close).accepted, 1);
        assert_eq!(matcher(1).match_features(&reference, &far).accepted, 0);
    }

    #[test]
    fn pass_threshold_is_on_accepted_count() {
        let reference = features(vec![
            descriptor(0x00, 0x00),
            descriptor(0xFF, 0xFF),
            descriptor(0x0F, 0x0F),
            descriptor(0xF0, 0xF0),
        ]);
        let candidate = features(vec![descriptor(0x00, 0x00), descriptor(0xFF, 0xFF)]);

        let outcome = matcher(3).match_features(&reference, &candidate);
        assert_eq!(outcome.accepted, 2);
        assert!(!outcome.passed);
        assert_eq!(outcome.score, 50.0);
        assert!((outcome.closeness - 200.0 / 3.0).abs() < 1e-3);

        assert!(matcher(2).match_features(&reference, &candidate).passed);
    }

    #[test]
    fn nearest_keeps_k_sorted_neighbours() {
        let reference = features(vec![
            descriptor(0, 0b0000_0111),
            descriptor(0, 0b0000_0001),
            descriptor(0, 0b0000_0011),
            descriptor(0, 0b1111_1111),
        ]);
        let neighbours = nearest(&descriptor(0, 0), &reference, 2);
        assert_eq!(
            neighbours,
            vec![
                Neighbour {
                    train_idx: 1,
                    distance: 1
                },
                Neighbour {
                    train_idx: 2,
                    distance: 2
                },
            ]
        );
    }
}
