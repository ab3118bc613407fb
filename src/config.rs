use crate::common::ImageRegion;
use crate::error::AppError;
use crate::pipeline::services::image::{DescriptorMethod, DetectorMethod};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const ENV_PREFIX: &str = "SCENE_SELECTOR";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub frame_buffer_size: usize,
    pub log_level: String,
    pub selector: SelectorConfig,
    pub matcher: MatcherConfig,
    pub features: FeatureConfig,
    pub replay: ReplayConfig,
}

/// Tuning for the classification protocol itself
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Failing scenes whose closeness exceeds this are kept in the match cache
    pub near_miss_threshold: f32,
    /// Publish the full result set after every pass
    pub debug: bool,
    pub event_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub k: usize,
    pub ratio: f32,
    pub min_good_matches: usize,
    pub max_distance: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub fast_threshold: u8,
    pub fast_arc_length: usize,
    pub harris_k: f32,
    pub harris_threshold: f32,
    pub max_keypoints: usize,
    pub nms_radius: u32,
    pub blur_radius: f32,
}

/// Scenes and frames for the replay binary
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub frames_dir: Option<PathBuf>,
    /// Pause between replayed frames, 0 replays as fast as possible
    pub frame_interval_ms: u64,
    /// Register the `Default` fallback scene
    pub with_default_scene: bool,
    pub scenes: Vec<SceneEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SceneEntry {
    pub id: Option<Uuid>,
    pub name: String,
    pub reference: PathBuf,
    pub regions: Vec<ImageRegion>,
    #[serde(default = "default_detector")]
    pub detector: DetectorMethod,
    #[serde(default = "default_descriptor")]
    pub descriptor: DescriptorMethod,
}

fn default_detector() -> DetectorMethod {
    DetectorMethod::Fast
}

fn default_descriptor() -> DescriptorMethod {
    DescriptorMethod::Brief
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            frame_buffer_size: 4,
            log_level: "info".to_string(),
            selector: SelectorConfig::default(),
            matcher: MatcherConfig::default(),
            features: FeatureConfig::default(),
            replay: ReplayConfig::default(),
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            near_miss_threshold: 50.0,
            debug: false,
            event_capacity: 16,
        }
    }
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            k: 2,
            ratio: 0.75,
            min_good_matches: 20,
            max_distance: 64,
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            fast_threshold: 20,
            fast_arc_length: 9,
            harris_k: 0.04,
            harris_threshold: 1.0e6,
            max_keypoints: 500,
            nms_radius: 3,
            blur_radius: 2.0,
        }
    }
}

impl Configuration {
    /// Load the configuration from an optional file, then apply
    /// `SCENE_SELECTOR__SECTION__KEY` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let configuration: Configuration = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        configuration.validate()?;
        Ok(configuration)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), AppError> {
        if self.frame_buffer_size == 0 {
            return Err(AppError::InvalidConfig(
                "Frame buffer size must be greater than 0".to_string(),
            ));
        }

        if self.selector.event_capacity == 0 {
            return Err(AppError::InvalidConfig(
                "Event capacity must be greater than 0".to_string(),
            ));
        }

        if self.matcher.k < 2 {
            return Err(AppError::InvalidConfig(
                "k must be at least 2 for the ratio test".to_string(),
            ));
        }

        if !(self.matcher.ratio > 0.0 && self.matcher.ratio <= 1.0) {
            return Err(AppError::InvalidConfig(
                "Ratio must be in (0.0, 1.0]".to_string(),
            ));
        }

        if self.features.max_keypoints == 0 {
            return Err(AppError::InvalidConfig(
                "Max keypoints must be greater than 0".to_string(),
            ));
        }

        if !(9..=12).contains(&self.features.fast_arc_length) {
            return Err(AppError::InvalidConfig(format!(
                "FAST arc length must be within 9..=12 (got {})",
                self.features.fast_arc_length
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_configuration_is_valid() {
        assert!(Configuration::default().validate().is_ok());
    }

    #[test]
    fn rejects_ratio_outside_unit_interval() {
        let mut configuration = Configuration::default();
        configuration.matcher.ratio = 1.5;
        assert!(configuration.validate().is_err());

        configuration.matcher.ratio = 0.0;
        assert!(configuration.validate().is_err());
    }

    #[test]
    fn rejects_k_below_two() {
        let mut configuration = Configuration::default();
        configuration.matcher.k = 1;
        assert!(configuration.validate().is_err());
    }

    #[test]
    fn loads_partial_file_over_defaults() {
        let path = std::env::temp_dir().join(format!(
            "scene-selector-config-{}.toml",
            uuid::Uuid::new_v4()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[selector]\nnear_miss_threshold = 42.5\ndebug = true").unwrap();
        writeln!(file, "[matcher]\nmin_good_matches = 4").unwrap();
        drop(file);

        let configuration = Configuration::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(configuration.selector.near_miss_threshold, 42.5);
        assert!(configuration.selector.debug);
        assert_eq!(configuration.matcher.min_good_matches, 4);
        assert_eq!(configuration.matcher.k, 2);
        assert_eq!(configuration.features.max_keypoints, 500);
    }

    #[test]
    fn loads_replay_scenes() {
        let path = std::env::temp_dir().join(format!(
            "scene-selector-replay-{}.toml",
            uuid::Uuid::new_v4()
        ));
        std::fs::write(
            &path,
            r#"
[replay]
frames_dir = "captures"
with_default_scene = true

[[replay.scenes]]
name = "Battle"
reference = "refs/battle.png"
regions = [{ x = 0, y = 200, width = 256, height = 56 }]
descriptor = "Orb"
"#,
        )
        .unwrap();

        let configuration = Configuration::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();

        let replay = configuration.replay;
        assert!(replay.with_default_scene);
        assert_eq!(replay.frames_dir, Some(PathBuf::from("captures")));
        assert_eq!(replay.scenes.len(), 1);
        let battle = &replay.scenes[0];
        assert_eq!(battle.regions, vec![ImageRegion::new(0, 200, 256, 56)]);
        assert_eq!(battle.detector, DetectorMethod::Fast);
        assert_eq!(battle.descriptor, DescriptorMethod::Orb);
    }
}
