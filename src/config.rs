//! Pipeline configuration.

use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub inference: InferenceConfig,
    pub models: ModelsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InferenceConfig {
    pub device: String,
}

/// One entry per model family; an absent entry leaves that branch of the
/// pipeline un-wired without affecting the others.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelsConfig {
    pub face_detection: Option<ModelConfig>,
    pub license_plate: Option<ModelConfig>,
    pub vehicle_attributes: Option<ModelConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub path: PathBuf,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
}

fn default_batch_size() -> usize {
    1
}

fn default_confidence_threshold() -> f32 {
    0.5
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn default_path() -> &'static str {
        "config.toml"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inference: InferenceConfig {
                device: "CPU".to_string(),
            },
            models: ModelsConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_models_table() {
        let config: Config = toml::from_str(
            r#"
            [inference]
            device = "GPU"

            [models.face_detection]
            path = "models/face-detection-adas-0001.xml"
            batch_size = 4
            confidence_threshold = 0.6
            "#,
        )
        .unwrap();

        assert_eq!(config.inference.device, "GPU");
        let face = config.models.face_detection.unwrap();
        assert_eq!(face.batch_size, 4);
        assert!((face.confidence_threshold - 0.6).abs() < f32::EPSILON);
        assert!(config.models.license_plate.is_none());
    }

    #[test]
    fn test_defaults_fill_in() {
        let config: Config = toml::from_str(
            r#"
            [inference]
            device = "CPU"

            [models.license_plate]
            path = "models/license-plate-recognition-barrier-0001.xml"
            "#,
        )
        .unwrap();
        let plate = config.models.license_plate.unwrap();
        assert_eq!(plate.batch_size, 1);
        assert!((plate.confidence_threshold - 0.5).abs() < f32::EPSILON);
    }
}
