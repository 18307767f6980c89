use std::path::{Path, PathBuf};

use physique_core::detector::DEFAULT_MIN_POSE_SCORE;
use physique_core::ReportOptions;
use physique_models::ModelFile;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Daemon configuration: optional TOML file, then `PHYSIQUE_*` environment
/// overrides.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Socket address the HTTP server binds (default: 0.0.0.0:5000).
    pub listen_addr: String,
    /// Directory containing the pose model.
    pub model_dir: PathBuf,
    /// Pose model file name inside `model_dir`.
    pub model_file: String,
    /// Pinned SHA-256 of the model file. Unset means presence is the only check.
    pub model_sha256: Option<String>,
    /// Mean keypoint score below which an image counts as having no pose.
    pub min_pose_score: f32,
    /// Timeout in seconds for one analysis, decode included.
    pub analyze_timeout_secs: u64,
    /// Maximum accepted request body size.
    pub max_upload_bytes: usize,
    /// Drop knee, ankle, heel and foot points from returned keypoints.
    pub exclude_lower_body: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:5000".to_string(),
            model_dir: physique_core::default_model_dir(),
            model_file: physique_core::DEFAULT_MODEL_FILE.to_string(),
            model_sha256: None,
            min_pose_score: DEFAULT_MIN_POSE_SCORE,
            analyze_timeout_secs: 10,
            max_upload_bytes: 16 * 1024 * 1024,
            exclude_lower_body: false,
        }
    }
}

impl Config {
    /// Load `$PHYSIQUE_CONFIG` if set, then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let base = match std::env::var("PHYSIQUE_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        Ok(base.with_overrides(|key| std::env::var(key).ok()))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `PHYSIQUE_*` overrides read through `var`.
    pub fn with_overrides(self, var: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            listen_addr: var("PHYSIQUE_LISTEN_ADDR").unwrap_or(self.listen_addr),
            model_dir: var("PHYSIQUE_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or(self.model_dir),
            model_file: var("PHYSIQUE_MODEL_FILE").unwrap_or(self.model_file),
            model_sha256: var("PHYSIQUE_MODEL_SHA256")
                .filter(|v| !v.trim().is_empty())
                .or(self.model_sha256),
            min_pose_score: env_f32(&var, "PHYSIQUE_MIN_POSE_SCORE", self.min_pose_score),
            analyze_timeout_secs: env_u64(
                &var,
                "PHYSIQUE_ANALYZE_TIMEOUT_SECS",
                self.analyze_timeout_secs,
            ),
            max_upload_bytes: env_usize(&var, "PHYSIQUE_MAX_UPLOAD_BYTES", self.max_upload_bytes),
            exclude_lower_body: var("PHYSIQUE_EXCLUDE_LOWER_BODY")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(self.exclude_lower_body),
        }
    }

    /// Path to the pose model.
    pub fn model_path(&self) -> PathBuf {
        self.model_dir.join(&self.model_file)
    }

    pub fn model(&self) -> ModelFile {
        ModelFile::new(&self.model_dir, &self.model_file, self.model_sha256.clone())
    }

    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            exclude_lower_body: self.exclude_lower_body,
        }
    }
}

fn env_f32(var: &impl Fn(&str) -> Option<String>, key: &str, default: f32) -> f32 {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(var: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> u64 {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(var: &impl Fn(&str) -> Option<String>, key: &str, default: usize) -> usize {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_overrides() {
        let config = Config::default().with_overrides(vars(&[]));
        assert_eq!(config.listen_addr, "0.0.0.0:5000");
        assert_eq!(config.model_file, "movenet_singlepose_lightning.onnx");
        assert_eq!(config.model_sha256, None);
        assert_eq!(config.min_pose_score, 0.2);
        assert_eq!(config.analyze_timeout_secs, 10);
        assert_eq!(config.max_upload_bytes, 16 * 1024 * 1024);
        assert!(!config.exclude_lower_body);
    }

    #[test]
    fn env_overrides_apply() {
        let config = Config::default().with_overrides(vars(&[
            ("PHYSIQUE_LISTEN_ADDR", "127.0.0.1:8080"),
            ("PHYSIQUE_MODEL_DIR", "/opt/models"),
            ("PHYSIQUE_MODEL_FILE", "pose.onnx"),
            ("PHYSIQUE_MODEL_SHA256", "abc123"),
            ("PHYSIQUE_MIN_POSE_SCORE", "0.35"),
            ("PHYSIQUE_ANALYZE_TIMEOUT_SECS", "3"),
            ("PHYSIQUE_EXCLUDE_LOWER_BODY", "1"),
        ]));
        assert_eq!(config.listen_addr, "127.0.0.1:8080");
        assert_eq!(config.model_path(), PathBuf::from("/opt/models/pose.onnx"));
        assert_eq!(config.model_sha256.as_deref(), Some("abc123"));
        assert_eq!(config.min_pose_score, 0.35);
        assert_eq!(config.analyze_timeout_secs, 3);
        assert!(config.report_options().exclude_lower_body);
    }

    #[test]
    fn unparsable_values_keep_previous() {
        let config = Config::default().with_overrides(vars(&[
            ("PHYSIQUE_MIN_POSE_SCORE", "high"),
            ("PHYSIQUE_MAX_UPLOAD_BYTES", "-1"),
            ("PHYSIQUE_EXCLUDE_LOWER_BODY", "false"),
        ]));
        assert_eq!(config.min_pose_score, 0.2);
        assert_eq!(config.max_upload_bytes, 16 * 1024 * 1024);
        assert!(!config.exclude_lower_body);
    }

    #[test]
    fn toml_file_then_env() {
        let dir = std::env::temp_dir().join(format!(
            "physiqued-config-test-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("physique.toml");
        std::fs::write(
            &path,
            concat!(
                "listen_addr = \"127.0.0.1:9000\"\n",
                "model_dir = \"/srv/models\"\n",
                "exclude_lower_body = true\n",
            ),
        )
        .unwrap();

        let from_file = Config::from_file(&path).unwrap();
        assert_eq!(from_file.listen_addr, "127.0.0.1:9000");
        assert_eq!(from_file.model_dir, PathBuf::from("/srv/models"));
        assert!(from_file.exclude_lower_body);
        // Unset keys keep their defaults
        assert_eq!(from_file.analyze_timeout_secs, 10);

        let merged = from_file.with_overrides(vars(&[("PHYSIQUE_LISTEN_ADDR", "0.0.0.0:7000")]));
        assert_eq!(merged.listen_addr, "0.0.0.0:7000");
        assert_eq!(merged.model_dir, PathBuf::from("/srv/models"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn bad_toml_is_parse_error() {
        let dir = std::env::temp_dir().join(format!(
            "physiqued-config-bad-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("physique.toml");
        std::fs::write(&path, "min_pose_score = \"lots\"\n").unwrap();

        assert!(matches!(
            Config::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            Config::from_file(&dir.join("missing.toml")),
            Err(ConfigError::Read { .. })
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
