use clap::{CommandFactory, Parser};
use clap::error::ErrorKind;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    name = "confgen",
    author = "Tony Kan, Ted Yu, William A. Goddard III, Victor Wai Tak Kam",
    version,
    about = "confgen - Batch 3D conformer generation: adds hydrogens, embeds conformers by distance geometry and relaxes them with a UFF-style force field.",
    help_template = HELP_TEMPLATE,
)]
pub struct Cli {
    /// Comma-separated list of input SDF files.
    #[arg(value_name = "INPUTS")]
    pub inputs: String,

    /// Comma-separated list of output SDF files, paired with INPUTS by position.
    #[arg(value_name = "OUTPUTS")]
    pub outputs: String,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // --- Generation Overrides ---
    /// Number of conformers to generate per molecule.
    #[arg(short = 'n', long, value_name = "INT")]
    pub num_conformers: Option<usize>,

    /// Energy window above the lowest conformer, in kcal/mol.
    /// Has no effect unless --apply-energy-window is given.
    #[arg(long, value_name = "FLOAT")]
    pub energy_window: Option<f64>,

    /// Drop conformers whose energy lies outside the energy window.
    #[arg(long)]
    pub apply_energy_window: bool,

    /// Seed for the embedding; runs with the same seed produce identical output.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Embedding attempts per conformer before it is given up.
    #[arg(long, value_name = "INT")]
    pub max_attempts: Option<usize>,

    /// Drop conformers within this heavy-atom RMSD (Å) of an earlier one.
    #[arg(long = "prune-rms", value_name = "FLOAT")]
    pub prune_rms: Option<f64>,

    /// Maximum force field minimization iterations per conformer.
    #[arg(long, value_name = "INT")]
    pub max_iterations: Option<usize>,

    /// Skip molecules that fail instead of aborting the run.
    #[arg(long)]
    pub skip_failures: bool,

    /// Process file pairs in parallel.
    #[arg(long)]
    pub parallel: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S embedding.random-seed=7
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE")]
    pub set_values: Vec<String>,

    // --- Runtime ---
    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all log output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, value_name = "NUM")]
    pub threads: Option<usize>,
}

/// Why the command line could not be turned into a [`Cli`].
#[derive(Debug)]
pub enum ParseFailure {
    /// The positional file lists were not given; carries the usage text.
    Usage(String),
    /// Any other clap error, including `--help` and `--version`.
    Clap(clap::Error),
}

/// Whether a parse failure means the positional file lists were not given.
pub fn is_missing_arguments(err: &clap::Error) -> bool {
    err.kind() == ErrorKind::MissingRequiredArgument
}

/// Parses `args`, turning missing positionals into a usage message.
pub fn parse_args<I, T>(args: I) -> Result<Cli, ParseFailure>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args).map_err(|e| {
        if is_missing_arguments(&e) {
            ParseFailure::Usage(Cli::command().render_usage().to_string())
        } else {
            ParseFailure::Clap(e)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn positional_lists_and_flags_are_parsed() {
        let cli = Cli::try_parse_from([
            "confgen",
            "a.sdf,b.sdf",
            "a_out.sdf,b_out.sdf",
            "-n",
            "3",
            "--seed",
            "42",
            "-S",
            "energy-window=2.0",
            "--skip-failures",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.inputs, "a.sdf,b.sdf");
        assert_eq!(cli.outputs, "a_out.sdf,b_out.sdf");
        assert_eq!(cli.num_conformers, Some(3));
        assert_eq!(cli.seed, Some(42));
        assert_eq!(cli.set_values, vec!["energy-window=2.0"]);
        assert!(cli.skip_failures);
        assert!(!cli.parallel);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn fewer_than_two_positionals_is_reported_as_missing() {
        let none = Cli::try_parse_from(["confgen"]).unwrap_err();
        assert!(is_missing_arguments(&none));
        let one = Cli::try_parse_from(["confgen", "a.sdf"]).unwrap_err();
        assert!(is_missing_arguments(&one));

        let bad_flag = Cli::try_parse_from(["confgen", "a.sdf", "b.sdf", "--bogus"]).unwrap_err();
        assert!(!is_missing_arguments(&bad_flag));
    }

    #[test]
    fn missing_positionals_produce_the_usage_line() {
        for args in [vec!["confgen"], vec!["confgen", "a.sdf"]] {
            match parse_args(args) {
                Err(ParseFailure::Usage(usage)) => {
                    assert!(usage.starts_with("Usage: confgen "), "{usage}");
                    assert!(usage.contains("<INPUTS> <OUTPUTS>"), "{usage}");
                }
                other => panic!("expected usage, got {other:?}"),
            }
        }
    }

    #[test]
    fn other_parse_errors_are_left_to_clap() {
        let result = parse_args(["confgen", "a.sdf", "b.sdf", "--bogus"]);
        assert!(matches!(result, Err(ParseFailure::Clap(_))));
        assert!(parse_args(["confgen", "a.sdf", "b.sdf"]).is_ok());
    }
}
