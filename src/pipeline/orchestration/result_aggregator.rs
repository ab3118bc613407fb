use crate::pipeline::domain::{MatchResult, SelectedScene};
use crate::pipeline::services::registry::SceneRegistry;
use std::cmp::Ordering;

/// Ordered results of one pass and the scene picked from them
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub results: Vec<MatchResult>,
    pub selected: Option<SelectedScene>,
    pub used_fallback: bool,
}

/// Orders match results and applies the fallback policy.
pub struct ResultAggregator;

impl ResultAggregator {
    /// Passing results first, then ascending score. Ties keep the incoming
    /// order, which is registration order.
    ///
    /// The first passing result wins. Without one the default scene wins
    /// with a synthetic passing result appended, without a default scene
    /// nothing is selected.
    pub fn aggregate(mut results: Vec<MatchResult>, registry: &SceneRegistry) -> Aggregation {
        results.sort_by(rank);

        if let Some(winner) = results.iter().find(|result| result.passed) {
            let selected = SelectedScene {
                id: winner.scene_id,
                name: winner.scene_name.clone(),
            };
            return Aggregation {
                results,
                selected: Some(selected),
                used_fallback: false,
            };
        }

        match registry.default_scene() {
            Some(default) => {
                results.push(MatchResult::fallback(default.id(), default.name()));
                Aggregation {
                    results,
                    selected: Some(SelectedScene {
                        id: default.id(),
                        name: default.name().to_string(),
                    }),
                    used_fallback: true,
                }
            }
            None => Aggregation {
                results,
                selected: None,
                used_fallback: false,
            },
        }
    }
}

fn rank(a: &MatchResult, b: &MatchResult) -> Ordering {
    b.passed
        .cmp(&a.passed)
        .then_with(|| a.score.total_cmp(&b.score))
}
