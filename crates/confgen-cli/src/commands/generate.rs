use crate::cli::Cli;
use crate::config::build_config;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use confgen::{
    engine::{geometry::DistanceGeometryEngine, progress::ProgressReporter},
    workflows,
};
use tracing::{debug, info};

pub fn run(args: &Cli) -> Result<()> {
    info!("Merging configuration from file and CLI arguments...");
    let app_config = build_config(args)?;
    debug!("Final configuration: {:?}", &app_config.core_config);

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    let engine = DistanceGeometryEngine::new();

    info!("Invoking the conformer generation workflow...");
    let result = workflows::generate::run(
        &app_config.pairs,
        &app_config.core_config,
        &engine,
        &reporter,
    );
    progress_handler.finish();
    let report = result?;

    let records_skipped: usize = report.files.iter().map(|f| f.records_skipped).sum();
    let molecules_skipped: usize = report.files.iter().map(|f| f.failures.len()).sum();
    info!(
        "Wrote {} conformer(s) across {} file(s); skipped {} record(s) and {} molecule(s).",
        report.conformers_written(),
        report.files.len(),
        records_skipped,
        molecules_skipped
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;
    use tempfile::tempdir;

    const WATER: &str = "\
water
     RDKit          2D

  1  0  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0
M  END
$$$$
";

    #[test]
    fn run_writes_every_output_file() {
        let dir = tempdir().unwrap();
        let in_a = dir.path().join("a.sdf");
        let in_b = dir.path().join("b.sdf");
        let out_a = dir.path().join("a_out.sdf");
        let out_b = dir.path().join("b_out.sdf");
        fs::write(&in_a, WATER).unwrap();
        fs::write(&in_b, WATER).unwrap();

        let inputs = format!("{},{}", in_a.display(), in_b.display());
        let outputs = format!("{},{}", out_a.display(), out_b.display());
        let cli = Cli::parse_from(["confgen", &inputs, &outputs, "-n", "2", "--seed", "3"]);

        run(&cli).expect("generation succeeds");

        for out in [&out_a, &out_b] {
            let text = fs::read_to_string(out).unwrap();
            assert_eq!(text.matches("$$$$").count(), 2);
        }
    }

    const TRUNCATED: &str = "\
truncated
     RDKit          2D

  2  1  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
$$$$
";

    #[test]
    fn each_skipped_record_is_warned_about_once() {
        use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*};

        let dir = tempdir().unwrap();
        let input = dir.path().join("in.sdf");
        let output = dir.path().join("out.sdf");
        let log_path = dir.path().join("run.log");
        fs::write(&input, format!("{TRUNCATED}{WATER}")).unwrap();
        let cli = Cli::parse_from([
            "confgen",
            input.to_str().unwrap(),
            output.to_str().unwrap(),
            "-n",
            "1",
            "--seed",
            "1",
        ]);

        let log_file = fs::File::create(&log_path).unwrap();
        let subscriber = tracing_subscriber::registry()
            .with(LevelFilter::WARN)
            .with(fmt::layer().with_writer(log_file).with_ansi(false));
        tracing::subscriber::with_default(subscriber, || run(&cli)).expect("generation succeeds");

        let log = fs::read_to_string(&log_path).unwrap();
        let warnings: Vec<_> = log.lines().filter(|l| l.contains("WARN")).collect();
        assert_eq!(warnings.len(), 1, "{log}");
        assert!(warnings[0].contains("Skipping unparseable record"));
    }

    #[test]
    fn missing_input_fails_without_creating_output() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.sdf");
        let out = dir.path().join("out.sdf");
        let cli = Cli::parse_from([
            "confgen",
            missing.to_str().unwrap(),
            out.to_str().unwrap(),
        ]);

        assert!(run(&cli).is_err());
        assert!(!out.exists());
    }
}
