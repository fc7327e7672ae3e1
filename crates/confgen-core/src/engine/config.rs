use crate::core::forcefield::minimize::MinimizerSettings;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::core::embedding::EmbedParams;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
}

/// What to do when a single molecule cannot be processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the whole batch at the first failure.
    #[default]
    Abort,
    /// Record the failure and continue with the next molecule.
    Skip,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationConfig {
    pub max_iterations: usize,
    pub energy_tolerance: f64,
    pub gradient_tolerance: f64,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        let settings = MinimizerSettings::default();
        Self {
            max_iterations: settings.max_iterations,
            energy_tolerance: settings.energy_tolerance,
            gradient_tolerance: settings.gradient_tolerance,
        }
    }
}

impl From<&OptimizationConfig> for MinimizerSettings {
    fn from(config: &OptimizationConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            energy_tolerance: config.energy_tolerance,
            gradient_tolerance: config.gradient_tolerance,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConformerConfig {
    /// Conformers requested per molecule.
    pub num_conformers: usize,
    /// Energy window above each molecule's best conformer, in kcal/mol.
    pub energy_window: f64,
    /// Whether conformers outside `energy_window` are dropped before writing.
    pub apply_energy_window: bool,
    pub failure_policy: FailurePolicy,
    /// Process file pairs concurrently on the rayon pool.
    pub parallel: bool,
    pub embedding: EmbedParams,
    pub optimization: OptimizationConfig,
}

impl Default for ConformerConfig {
    fn default() -> Self {
        Self {
            num_conformers: 10,
            energy_window: 5.0,
            apply_energy_window: false,
            failure_policy: FailurePolicy::default(),
            parallel: false,
            embedding: EmbedParams::default(),
            optimization: OptimizationConfig::default(),
        }
    }
}

#[derive(Default)]
pub struct ConformerConfigBuilder {
    num_conformers: Option<usize>,
    energy_window: Option<f64>,
    apply_energy_window: Option<bool>,
    failure_policy: Option<FailurePolicy>,
    parallel: Option<bool>,
    random_seed: Option<u64>,
    max_attempts: Option<usize>,
    enforce_chirality: Option<bool>,
    use_basic_knowledge: Option<bool>,
    prune_rms_threshold: Option<f64>,
    max_iterations: Option<usize>,
    energy_tolerance: Option<f64>,
    gradient_tolerance: Option<f64>,
}

impl ConformerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_conformers(mut self, count: usize) -> Self {
        self.num_conformers = Some(count);
        self
    }
    pub fn energy_window(mut self, window: f64) -> Self {
        self.energy_window = Some(window);
        self
    }
    pub fn apply_energy_window(mut self, apply: bool) -> Self {
        self.apply_energy_window = Some(apply);
        self
    }
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = Some(policy);
        self
    }
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = Some(parallel);
        self
    }
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = Some(attempts);
        self
    }
    pub fn enforce_chirality(mut self, enforce: bool) -> Self {
        self.enforce_chirality = Some(enforce);
        self
    }
    pub fn use_basic_knowledge(mut self, enabled: bool) -> Self {
        self.use_basic_knowledge = Some(enabled);
        self
    }
    pub fn prune_rms_threshold(mut self, threshold: f64) -> Self {
        self.prune_rms_threshold = Some(threshold);
        self
    }
    pub fn max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = Some(iterations);
        self
    }
    pub fn energy_tolerance(mut self, tolerance: f64) -> Self {
        self.energy_tolerance = Some(tolerance);
        self
    }
    pub fn gradient_tolerance(mut self, tolerance: f64) -> Self {
        self.gradient_tolerance = Some(tolerance);
        self
    }

    /// Fills unset options with their defaults and validates the result.
    pub fn build(self) -> Result<ConformerConfig, ConfigError> {
        let defaults = ConformerConfig::default();

        let energy_window = self.energy_window.unwrap_or(defaults.energy_window);
        non_negative("energy_window", energy_window)?;

        let max_attempts = self
            .max_attempts
            .unwrap_or(defaults.embedding.max_attempts);
        if max_attempts == 0 {
            return Err(invalid("max_attempts", "at least one attempt is required"));
        }
        if let Some(threshold) = self.prune_rms_threshold {
            if !(threshold.is_finite() && threshold > 0.0) {
                return Err(invalid("prune_rms_threshold", "must be a positive number"));
            }
        }

        let optimization = OptimizationConfig {
            max_iterations: self
                .max_iterations
                .unwrap_or(defaults.optimization.max_iterations),
            energy_tolerance: self
                .energy_tolerance
                .unwrap_or(defaults.optimization.energy_tolerance),
            gradient_tolerance: self
                .gradient_tolerance
                .unwrap_or(defaults.optimization.gradient_tolerance),
        };
        non_negative("energy_tolerance", optimization.energy_tolerance)?;
        non_negative("gradient_tolerance", optimization.gradient_tolerance)?;

        let embedding = EmbedParams {
            random_seed: self.random_seed,
            max_attempts,
            enforce_chirality: self
                .enforce_chirality
                .unwrap_or(defaults.embedding.enforce_chirality),
            use_basic_knowledge: self
                .use_basic_knowledge
                .unwrap_or(defaults.embedding.use_basic_knowledge),
            prune_rms_threshold: self.prune_rms_threshold,
            ..defaults.embedding
        };

        Ok(ConformerConfig {
            num_conformers: self.num_conformers.unwrap_or(defaults.num_conformers),
            energy_window,
            apply_energy_window: self
                .apply_energy_window
                .unwrap_or(defaults.apply_energy_window),
            failure_policy: self.failure_policy.unwrap_or(defaults.failure_policy),
            parallel: self.parallel.unwrap_or(defaults.parallel),
            embedding,
            optimization,
        })
    }
}

fn invalid(parameter: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        parameter,
        reason: reason.to_string(),
    }
}

fn non_negative(parameter: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(parameter, "must be a finite, non-negative number"))
    }
}
