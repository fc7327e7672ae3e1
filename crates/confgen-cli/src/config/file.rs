use crate::error::{CliError, Result};
use confgen::engine::config::FailurePolicy;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileEmbeddingConfig {
    pub random_seed: Option<u64>,
    pub max_attempts: Option<usize>,
    pub enforce_chirality: Option<bool>,
    pub use_basic_knowledge: Option<bool>,
    pub prune_rms_threshold: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileOptimizationConfig {
    pub max_iterations: Option<usize>,
    pub energy_tolerance: Option<f64>,
    pub gradient_tolerance: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    pub num_conformers: Option<usize>,
    pub energy_window: Option<f64>,
    pub apply_energy_window: Option<bool>,
    pub failure_policy: Option<FailurePolicy>,
    pub parallel: Option<bool>,
    pub embedding: Option<FileEmbeddingConfig>,
    pub optimization: Option<FileOptimizationConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|source| CliError::FileParsing {
            path: path.to_path_buf(),
            source: source.into(),
        })
    }

    fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn full_file_is_deserialized() {
        let config = FileConfig::from_toml(
            r#"
            num-conformers = 4
            energy-window = 3.5
            apply-energy-window = true
            failure-policy = "skip"
            parallel = true

            [embedding]
            random-seed = 42
            max-attempts = 6
            enforce-chirality = false
            use-basic-knowledge = true
            prune-rms-threshold = 0.5

            [optimization]
            max-iterations = 300
            energy-tolerance = 1e-7
            gradient-tolerance = 1e-5
            "#,
        )
        .unwrap();

        assert_eq!(config.num_conformers, Some(4));
        assert_eq!(config.energy_window, Some(3.5));
        assert_eq!(config.apply_energy_window, Some(true));
        assert_eq!(config.failure_policy, Some(FailurePolicy::Skip));
        assert_eq!(config.parallel, Some(true));
        let embedding = config.embedding.unwrap();
        assert_eq!(embedding.random_seed, Some(42));
        assert_eq!(embedding.max_attempts, Some(6));
        assert_eq!(embedding.enforce_chirality, Some(false));
        assert_eq!(embedding.prune_rms_threshold, Some(0.5));
        let optimization = config.optimization.unwrap();
        assert_eq!(optimization.max_iterations, Some(300));
        assert_eq!(optimization.gradient_tolerance, Some(1e-5));
    }

    #[test]
    fn empty_file_leaves_everything_unset() {
        assert_eq!(FileConfig::from_toml("").unwrap(), FileConfig::default());
    }

    #[test]
    fn unknown_keys_and_bad_policies_are_rejected() {
        assert!(FileConfig::from_toml("num-solutions = 3").is_err());
        assert!(FileConfig::from_toml("[embedding]\nseed = 3").is_err());
        assert!(FileConfig::from_toml("failure-policy = \"retry\"").is_err());
    }

    #[test]
    fn parse_errors_name_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "num-conformers = \"many\"").unwrap();
        let err = FileConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, CliError::FileParsing { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        let err = FileConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, CliError::Io(_)));
    }
}
