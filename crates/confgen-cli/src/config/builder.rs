use super::file::FileConfig;
use super::models::AppConfig;
use crate::cli::Cli;
use crate::error::{CliError, Result};
use confgen::engine::config::{self as core_config, FailurePolicy};
use confgen::workflows::generate::{pair_paths, split_path_list};
use std::str::FromStr;

/// Merges defaults, the config file, `--set` values and flags, in increasing
/// order of precedence.
pub fn build_config(args: &Cli) -> Result<AppConfig> {
    let file_config = if let Some(config_path) = &args.config {
        FileConfig::from_file(config_path)?
    } else {
        FileConfig::default()
    };
    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let inputs = split_path_list(&args.inputs);
    let outputs = split_path_list(&args.outputs);
    if inputs.is_empty() {
        return Err(CliError::Argument("no input files were given".to_string()));
    }
    let pairs = pair_paths(inputs, outputs)?;

    let embedding = file_config.embedding.take().unwrap_or_default();
    let optimization = file_config.optimization.take().unwrap_or_default();

    let mut builder = core_config::ConformerConfigBuilder::new();
    if let Some(count) = args.num_conformers.or(file_config.num_conformers) {
        builder = builder.num_conformers(count);
    }
    if let Some(window) = args.energy_window.or(file_config.energy_window) {
        builder = builder.energy_window(window);
    }
    builder = builder.apply_energy_window(
        args.apply_energy_window || file_config.apply_energy_window.unwrap_or(false),
    );
    let failure_policy = if args.skip_failures {
        FailurePolicy::Skip
    } else {
        file_config.failure_policy.unwrap_or_default()
    };
    builder = builder
        .failure_policy(failure_policy)
        .parallel(args.parallel || file_config.parallel.unwrap_or(false));

    if let Some(seed) = args.seed.or(embedding.random_seed) {
        builder = builder.random_seed(seed);
    }
    if let Some(attempts) = args.max_attempts.or(embedding.max_attempts) {
        builder = builder.max_attempts(attempts);
    }
    if let Some(enforce) = embedding.enforce_chirality {
        builder = builder.enforce_chirality(enforce);
    }
    if let Some(enabled) = embedding.use_basic_knowledge {
        builder = builder.use_basic_knowledge(enabled);
    }
    if let Some(threshold) = args.prune_rms.or(embedding.prune_rms_threshold) {
        builder = builder.prune_rms_threshold(threshold);
    }

    if let Some(iterations) = args.max_iterations.or(optimization.max_iterations) {
        builder = builder.max_iterations(iterations);
    }
    if let Some(tolerance) = optimization.energy_tolerance {
        builder = builder.energy_tolerance(tolerance);
    }
    if let Some(tolerance) = optimization.gradient_tolerance {
        builder = builder.gradient_tolerance(tolerance);
    }

    let core_config = builder
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    Ok(AppConfig { pairs, core_config })
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        CliError::Config(format!(
            "Invalid {} value for {}: {}",
            std::any::type_name::<T>(),
            key,
            value
        ))
    })
}

fn parse_policy(key: &str, value: &str) -> Result<FailurePolicy> {
    match value {
        "abort" => Ok(FailurePolicy::Abort),
        "skip" => Ok(FailurePolicy::Skip),
        _ => Err(CliError::Config(format!(
            "Invalid value for {}: '{}'. Expected 'abort' or 'skip'.",
            key, value
        ))),
    }
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let Some((key, value_str)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };

        match key {
            "num-conformers" => config.num_conformers = Some(parse_value(key, value_str)?),
            "energy-window" => config.energy_window = Some(parse_value(key, value_str)?),
            "apply-energy-window" => {
                config.apply_energy_window = Some(parse_value(key, value_str)?)
            }
            "failure-policy" => config.failure_policy = Some(parse_policy(key, value_str)?),
            "parallel" => config.parallel = Some(parse_value(key, value_str)?),
            "embedding.random-seed" => {
                config
                    .embedding
                    .get_or_insert_with(Default::default)
                    .random_seed = Some(parse_value(key, value_str)?);
            }
            "embedding.max-attempts" => {
                config
                    .embedding
                    .get_or_insert_with(Default::default)
                    .max_attempts = Some(parse_value(key, value_str)?);
            }
            "embedding.enforce-chirality" => {
                config
                    .embedding
                    .get_or_insert_with(Default::default)
                    .enforce_chirality = Some(parse_value(key, value_str)?);
            }
            "embedding.use-basic-knowledge" => {
                config
                    .embedding
                    .get_or_insert_with(Default::default)
                    .use_basic_knowledge = Some(parse_value(key, value_str)?);
            }
            "embedding.prune-rms-threshold" => {
                config
                    .embedding
                    .get_or_insert_with(Default::default)
                    .prune_rms_threshold = Some(parse_value(key, value_str)?);
            }
            "optimization.max-iterations" => {
                config
                    .optimization
                    .get_or_insert_with(Default::default)
                    .max_iterations = Some(parse_value(key, value_str)?);
            }
            "optimization.energy-tolerance" => {
                config
                    .optimization
                    .get_or_insert_with(Default::default)
                    .energy_tolerance = Some(parse_value(key, value_str)?);
            }
            "optimization.gradient-tolerance" => {
                config
                    .optimization
                    .get_or_insert_with(Default::default)
                    .gradient_tolerance = Some(parse_value(key, value_str)?);
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use confgen::engine::error::EngineError;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn parse(args: &[&str]) -> Cli {
        let mut full = vec!["confgen", "a.sdf,b.sdf", "a_out.sdf,b_out.sdf"];
        full.extend_from_slice(args);
        Cli::parse_from(full)
    }

    #[test]
    fn build_config_without_options_uses_core_defaults() {
        let app = build_config(&parse(&[])).expect("build ok");
        assert_eq!(app.core_config, core_config::ConformerConfig::default());
        assert_eq!(app.pairs.len(), 2);
        assert_eq!(app.pairs[1].input, PathBuf::from("b.sdf"));
        assert_eq!(app.pairs[1].output, PathBuf::from("b_out.sdf"));
    }

    #[test]
    fn build_config_reads_file_and_merges() {
        let dir = tempdir().unwrap();
        let cfg_path = dir.path().join("config.toml");
        let toml = r#"
            num-conformers = 4
            failure-policy = "skip"

            [embedding]
            random-seed = 11
            use-basic-knowledge = false

            [optimization]
            max-iterations = 150
            "#;
        fs::write(&cfg_path, toml).unwrap();

        let app = build_config(&parse(&["-c", cfg_path.to_str().unwrap()])).expect("build ok");
        let cfg = app.core_config;
        assert_eq!(cfg.num_conformers, 4);
        assert_eq!(cfg.failure_policy, FailurePolicy::Skip);
        assert_eq!(cfg.embedding.random_seed, Some(11));
        assert!(!cfg.embedding.use_basic_knowledge);
        assert_eq!(cfg.optimization.max_iterations, 150);
        assert_eq!(cfg.energy_window, 5.0);
    }

    #[test]
    fn cli_overrides_set_values_which_override_the_file() {
        let dir = tempdir().unwrap();
        let cfg_path = dir.path().join("config.toml");
        fs::write(&cfg_path, "num-conformers = 2\nenergy-window = 1.0\n").unwrap();

        let app = build_config(&parse(&[
            "-c",
            cfg_path.to_str().unwrap(),
            "-S",
            "num-conformers=6",
            "-S",
            "energy-window=3.0",
            "-S",
            "embedding.random-seed=5",
            "-n",
            "8",
            "--seed",
            "9",
        ]))
        .expect("build ok");
        let cfg = app.core_config;
        assert_eq!(cfg.num_conformers, 8);
        assert_eq!(cfg.energy_window, 3.0);
        assert_eq!(cfg.embedding.random_seed, Some(9));
    }

    #[test]
    fn set_values_cover_every_section() {
        let app = build_config(&parse(&[
            "-S",
            "failure-policy=skip",
            "-S",
            "apply-energy-window=true",
            "-S",
            "parallel=true",
            "-S",
            "embedding.max-attempts=3",
            "-S",
            "embedding.enforce-chirality=false",
            "-S",
            "embedding.prune-rms-threshold=0.25",
            "-S",
            "optimization.energy-tolerance=1e-8",
            "-S",
            "optimization.gradient-tolerance=1e-3",
        ]))
        .expect("build ok");
        let cfg = app.core_config;
        assert_eq!(cfg.failure_policy, FailurePolicy::Skip);
        assert!(cfg.apply_energy_window && cfg.parallel);
        assert_eq!(cfg.embedding.max_attempts, 3);
        assert!(!cfg.embedding.enforce_chirality);
        assert_eq!(cfg.embedding.prune_rms_threshold, Some(0.25));
        assert_eq!(cfg.optimization.energy_tolerance, 1e-8);
        assert_eq!(cfg.optimization.gradient_tolerance, 1e-3);
    }

    #[test]
    fn malformed_set_values_are_rejected() {
        for bad in ["num-conformers", "num-conformers=many", "failure-policy=retry", "colour=blue"] {
            let result = build_config(&parse(&["-S", bad]));
            assert!(matches!(result, Err(CliError::Config(_))), "{bad} was accepted");
        }
    }

    #[test]
    fn invalid_values_surface_as_config_errors() {
        let result = build_config(&parse(&["--energy-window=-1"]));
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("energy_window")));
    }

    #[test]
    fn mismatched_path_lists_are_rejected() {
        let cli = Cli::parse_from(["confgen", "a.sdf,b.sdf", "a_out.sdf"]);
        let result = build_config(&cli);
        assert!(matches!(
            result,
            Err(CliError::Core(EngineError::PairCountMismatch { inputs: 2, outputs: 1 }))
        ));
    }

    #[test]
    fn empty_input_list_is_rejected() {
        let cli = Cli::parse_from(["confgen", ",", ","]);
        assert!(matches!(build_config(&cli), Err(CliError::Argument(_))));
    }
}
