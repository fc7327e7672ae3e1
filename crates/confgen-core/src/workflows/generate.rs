use crate::core::io::sdf::{SdfFile, SdfWriter};
use crate::core::io::traits::StructureFile;
use crate::core::models::conformer::ConformerId;
use crate::core::models::molecule::Molecule;
use crate::engine::config::{ConformerConfig, FailurePolicy};
use crate::engine::error::EngineError;
use crate::engine::geometry::GeometryEngine;
use crate::engine::progress::{Progress, ProgressReporter};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// An input structure file and the output file its conformers go to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePair {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// A molecule that was dropped under [`FailurePolicy::Skip`].
#[derive(Debug, Clone, PartialEq)]
pub struct MoleculeFailure {
    /// Position of the molecule among the parsed records of its file.
    pub index: usize,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub molecules_read: usize,
    pub records_skipped: usize,
    pub conformers_written: usize,
    pub failures: Vec<MoleculeFailure>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
}

impl BatchReport {
    pub fn conformers_written(&self) -> usize {
        self.files.iter().map(|f| f.conformers_written).sum()
    }
}

/// Splits a comma-separated path list, ignoring empty entries.
pub fn split_path_list(list: &str) -> Vec<PathBuf> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Pairs inputs with outputs by position.
///
/// # Errors
///
/// Returns [`EngineError::PairCountMismatch`] if the lists differ in length.
pub fn pair_paths(inputs: Vec<PathBuf>, outputs: Vec<PathBuf>) -> Result<Vec<FilePair>, EngineError> {
    if inputs.len() != outputs.len() {
        return Err(EngineError::PairCountMismatch {
            inputs: inputs.len(),
            outputs: outputs.len(),
        });
    }
    Ok(inputs
        .into_iter()
        .zip(outputs)
        .map(|(input, output)| FilePair { input, output })
        .collect())
}

fn file_rng(seed: Option<u64>, file_index: usize) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(file_index as u64)),
        None => StdRng::from_entropy(),
    }
}

fn io_error(path: &Path) -> impl FnOnce(crate::core::io::sdf::SdfError) -> EngineError + '_ {
    move |source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Generates conformers for every file pair.
///
/// Pairs run in order, or concurrently when `config.parallel` is set. Either
/// way each output file is written by a single thread in molecule and
/// conformer order, and with a configured seed the output does not depend on
/// the scheduling.
///
/// # Errors
///
/// Returns the first error that aborts a file. Files finished before the error
/// are left in place.
#[instrument(skip_all, name = "conformer_workflow", fields(files = pairs.len()))]
pub fn run<E: GeometryEngine + ?Sized>(
    pairs: &[FilePair],
    config: &ConformerConfig,
    engine: &E,
    reporter: &ProgressReporter,
) -> Result<BatchReport, EngineError> {
    info!(
        "Generating {} conformers per molecule for {} file(s).",
        config.num_conformers,
        pairs.len()
    );
    let seed = config.embedding.random_seed;

    let files = if config.parallel {
        pairs
            .par_iter()
            .enumerate()
            .map(|(index, pair)| process_file(pair, config, engine, reporter, &mut file_rng(seed, index)))
            .collect::<Result<Vec<_>, _>>()?
    } else {
        pairs
            .iter()
            .enumerate()
            .map(|(index, pair)| process_file(pair, config, engine, reporter, &mut file_rng(seed, index)))
            .collect::<Result<Vec<_>, _>>()?
    };

    let report = BatchReport { files };
    info!(
        "Workflow complete. Wrote {} conformer(s).",
        report.conformers_written()
    );
    Ok(report)
}

/// Runs the parse, hydrogen, embed and optimize pipeline for one file pair.
///
/// Records that fail to parse are skipped with a warning. Molecule failures
/// abort the file under [`FailurePolicy::Abort`] and are collected in the
/// report under [`FailurePolicy::Skip`].
///
/// # Errors
///
/// Returns [`EngineError::Io`] if the input cannot be read or the output cannot
/// be written, and any molecule error when the policy is to abort.
pub fn process_file<E: GeometryEngine + ?Sized>(
    pair: &FilePair,
    config: &ConformerConfig,
    engine: &E,
    reporter: &ProgressReporter,
    rng: &mut StdRng,
) -> Result<FileReport, EngineError> {
    let records = SdfFile::read_from_path(&pair.input).map_err(io_error(&pair.input))?;

    let mut molecules = Vec::with_capacity(records.len());
    let mut records_skipped = 0;
    for (index, record) in records.into_iter().enumerate() {
        match record {
            Ok(molecule) => molecules.push(molecule),
            Err(err) => {
                warn!(input = %pair.input.display(), record = index + 1, "Skipping unparseable record: {}", err);
                records_skipped += 1;
            }
        }
    }
    info!(
        input = %pair.input.display(),
        "Read {} molecule(s), skipped {} record(s).",
        molecules.len(),
        records_skipped
    );
    reporter.report(Progress::FileStart {
        input: pair.input.clone(),
        output: pair.output.clone(),
        molecules: molecules.len() as u64,
    });

    let mut writer = SdfWriter::create(&pair.output).map_err(io_error(&pair.output))?;
    let molecules_read = molecules.len();
    let mut failures = Vec::new();

    for (index, molecule) in molecules.into_iter().enumerate() {
        let name = molecule.name.clone();
        match generate_conformers(&molecule, config, engine, rng) {
            Ok((prepared, ids)) => {
                for &id in &ids {
                    writer
                        .write(&prepared, Some(id))
                        .map_err(io_error(&pair.output))?;
                }
                debug!(molecule = %name, conformers = ids.len(), "Wrote conformers.");
                reporter.report(Progress::MoleculeFinish {
                    name,
                    conformers: ids.len(),
                });
            }
            Err(err) if config.failure_policy == FailurePolicy::Skip && err.is_molecule_scoped() => {
                warn!(molecule = %name, index, "Skipping molecule: {}", err);
                reporter.report(Progress::Message(format!("Skipped '{}': {}", name, err)));
                reporter.report(Progress::MoleculeFinish {
                    name: name.clone(),
                    conformers: 0,
                });
                failures.push(MoleculeFailure {
                    index,
                    name,
                    reason: err.to_string(),
                });
            }
            Err(err) => return Err(err),
        }
    }

    let conformers_written = writer.close().map_err(io_error(&pair.output))?;
    info!(
        "Conformers for {} written to {}.",
        pair.input.display(),
        pair.output.display()
    );
    reporter.report(Progress::FileFinish {
        input: pair.input.clone(),
        output: pair.output.clone(),
        conformers: conformers_written,
    });

    Ok(FileReport {
        input: pair.input.clone(),
        output: pair.output.clone(),
        molecules_read,
        records_skipped,
        conformers_written,
        failures,
    })
}

/// Adds hydrogens, embeds and optimizes one molecule.
///
/// # Return
///
/// The hydrogen-explicit molecule and the ids of the conformers to write, in
/// generation order.
fn generate_conformers<E: GeometryEngine + ?Sized>(
    molecule: &Molecule,
    config: &ConformerConfig,
    engine: &E,
    rng: &mut StdRng,
) -> Result<(Molecule, Vec<ConformerId>), EngineError> {
    let mut prepared = engine.add_hydrogens(molecule)?;
    let ids = engine.embed_conformers(&mut prepared, config.num_conformers, &config.embedding, rng)?;
    for &id in &ids {
        engine.optimize_conformer(&mut prepared, id, &config.optimization)?;
    }

    let ids = if config.apply_energy_window {
        within_energy_window(&prepared, &ids, config.energy_window)
    } else {
        ids
    };
    Ok((prepared, ids))
}

/// Keeps the conformers within `window` kcal/mol of the lowest energy.
///
/// Conformers without a recorded energy are kept.
fn within_energy_window(molecule: &Molecule, ids: &[ConformerId], window: f64) -> Vec<ConformerId> {
    let energy = |id: ConformerId| molecule.conformer(id).and_then(|c| c.energy);
    let Some(minimum) = ids.iter().filter_map(|&id| energy(id)).reduce(f64::min) else {
        return ids.to_vec();
    };
    ids.iter()
        .copied()
        .filter(|&id| energy(id).is_none_or(|e| e <= minimum + window))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Element;
    use crate::engine::config::ConformerConfigBuilder;
    use crate::engine::geometry::DistanceGeometryEngine;
    use nalgebra::Point3;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::tempdir;

    const ETHANOL: &str = "\
ethanol
     RDKit          3D

  3  2  0  0  0  0  0  0  0  0999 V2000
   -0.9000    0.1000    0.0500 C   0  0  0  0  0  0  0  0  0  0  0  0
    0.5000   -0.2000    0.1000 C   0  0  0  0  0  0  0  0  0  0  0  0
    1.2000    1.0000   -0.1000 O   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  1  0
  2  3  1  0
M  END
>  <ID>
EtOH-1

$$$$
";

    const METHYLAMINE: &str = "\
methylamine
     RDKit          2D

  2  1  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    1.4700    0.0000    0.0000 N   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  1  0
M  END
$$$$
";

    const BROKEN: &str = "\
broken
     RDKit          2D

  2  1  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  1  0
M  END
$$$$
";

    const IRON: &str = "\
iron
     RDKit          3D

  1  0  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 Fe  0  0  0  0  0  0  0  0  0  0  0  0
M  END
$$$$
";

    const SODIUM_ACETATE: &str = "\
sodium acetate
     RDKit          2D

  5  3  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    1.5000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    2.2500    1.2990    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0
    2.2500   -1.2990    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0
    4.5000   -1.2990    0.0000 Na  0  0  0  0  0  0  0  0  0  0  0  0
  1  2  1  0
  2  3  2  0
  2  4  1  0
M  CHG  2   4  -1   5   1
M  END
$$$$
";

    fn seeded_config(count: usize) -> ConformerConfig {
        ConformerConfigBuilder::new()
            .num_conformers(count)
            .random_seed(2024)
            .build()
            .unwrap()
    }

    fn count_records(path: &Path) -> usize {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .filter(|line| *line == "$$$$")
            .count()
    }

    fn read_back(path: &Path) -> Vec<Molecule> {
        SdfFile::read_from_path(path)
            .unwrap()
            .into_iter()
            .map(|r| r.unwrap())
            .collect()
    }

    #[test]
    fn split_path_list_trims_and_drops_empty_entries() {
        assert_eq!(
            split_path_list("a.sdf, b.sdf,,c.sdf "),
            vec![
                PathBuf::from("a.sdf"),
                PathBuf::from("b.sdf"),
                PathBuf::from("c.sdf")
            ]
        );
        assert!(split_path_list("").is_empty());
    }

    #[test]
    fn pair_paths_is_positional_and_rejects_mismatches() {
        let pairs = pair_paths(split_path_list("x.sdf,a.sdf"), split_path_list("1.sdf,2.sdf")).unwrap();
        assert_eq!(pairs[0].input, PathBuf::from("x.sdf"));
        assert_eq!(pairs[0].output, PathBuf::from("1.sdf"));
        assert_eq!(pairs[1].input, PathBuf::from("a.sdf"));
        assert_eq!(pairs[1].output, PathBuf::from("2.sdf"));

        let err = pair_paths(split_path_list("a.sdf,b.sdf"), split_path_list("c.sdf")).unwrap_err();
        assert!(matches!(err, EngineError::PairCountMismatch { inputs: 2, outputs: 1 }));
    }

    #[test]
    fn valid_records_yield_k_conformers_each_and_bad_records_are_skipped() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("a.sdf");
        let output = dir.path().join("a_out.sdf");
        fs::write(&input, format!("{ETHANOL}{BROKEN}{METHYLAMINE}")).unwrap();

        let notices = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if let Progress::FileFinish { input, output, .. } = event {
                notices.lock().unwrap().push((input, output));
            }
        }));
        let pairs = vec![FilePair {
            input: input.clone(),
            output: output.clone(),
        }];
        let report = run(&pairs, &seeded_config(3), &DistanceGeometryEngine::new(), &reporter).unwrap();
        drop(reporter);

        assert_eq!(count_records(&output), 6);
        let file = &report.files[0];
        assert_eq!(file.molecules_read, 2);
        assert_eq!(file.records_skipped, 1);
        assert_eq!(file.conformers_written, 6);
        assert_eq!(notices.into_inner().unwrap(), vec![(input, output.clone())]);

        let written = read_back(&output);
        // Ethanol with hydrogens: C2H6O.
        for mol in &written[..3] {
            assert_eq!(mol.name, "ethanol");
            assert_eq!(mol.atom_count(), 9);
            assert_eq!(mol.bond_count(), 8);
            assert_eq!(mol.property("ID"), Some("EtOH-1"));
        }
        assert_ne!(written[0].input_positions(), written[1].input_positions());
        for mol in &written[3..] {
            assert_eq!(mol.name, "methylamine");
            assert_eq!(mol.atom_count(), 7);
        }
    }

    #[test]
    fn every_pair_gets_its_own_output_in_order() {
        let dir = tempdir().unwrap();
        let mut pairs = Vec::new();
        for (i, content) in [ETHANOL, METHYLAMINE].iter().enumerate() {
            let input = dir.path().join(format!("in{i}.sdf"));
            fs::write(&input, content).unwrap();
            pairs.push(FilePair {
                input,
                output: dir.path().join(format!("out{i}.sdf")),
            });
        }
        let report = run(
            &pairs,
            &seeded_config(2),
            &DistanceGeometryEngine::new(),
            &ProgressReporter::new(),
        )
        .unwrap();

        assert_eq!(report.files.len(), 2);
        for (pair, file) in pairs.iter().zip(&report.files) {
            assert_eq!(file.input, pair.input);
            assert_eq!(count_records(&pair.output), 2);
        }
        assert_eq!(read_back(&pairs[1].output)[0].name, "methylamine");
    }

    #[test]
    fn seeded_runs_are_reproducible_sequentially_and_in_parallel() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.sdf");
        fs::write(&input, format!("{ETHANOL}{METHYLAMINE}")).unwrap();
        let outputs: Vec<PathBuf> = (0..3).map(|i| dir.path().join(format!("out{i}.sdf"))).collect();
        let engine = DistanceGeometryEngine::new();

        let config = seeded_config(2);
        for output in &outputs[..2] {
            let pairs = [FilePair {
                input: input.clone(),
                output: output.clone(),
            }];
            run(&pairs, &config, &engine, &ProgressReporter::new()).unwrap();
        }
        let parallel = ConformerConfig {
            parallel: true,
            ..config
        };
        let pairs = [FilePair {
            input: input.clone(),
            output: outputs[2].clone(),
        }];
        run(&pairs, &parallel, &engine, &ProgressReporter::new()).unwrap();

        let first = fs::read(&outputs[0]).unwrap();
        assert_eq!(first, fs::read(&outputs[1]).unwrap());
        assert_eq!(first, fs::read(&outputs[2]).unwrap());
    }

    #[test]
    fn energy_window_filters_only_when_enabled() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.sdf");
        fs::write(&input, format!("{ETHANOL}{METHYLAMINE}")).unwrap();
        let engine = DistanceGeometryEngine::new();

        let run_with = |apply: bool, name: &str| {
            let config = ConformerConfigBuilder::new()
                .num_conformers(3)
                .random_seed(7)
                .energy_window(0.0)
                .apply_energy_window(apply)
                .build()
                .unwrap();
            let pairs = [FilePair {
                input: input.clone(),
                output: dir.path().join(name),
            }];
            run(&pairs, &config, &engine, &ProgressReporter::new()).unwrap().conformers_written()
        };

        assert_eq!(run_with(false, "all.sdf"), 6);
        let filtered = run_with(true, "filtered.sdf");
        assert!((2..6).contains(&filtered), "kept {filtered}");
    }

    #[test]
    fn window_keeps_conformers_near_the_minimum() {
        let mut mol = Molecule::new("m");
        mol.add_atom(crate::core::models::atom::Atom::new(
            crate::core::models::atom::Element::C,
            Point3::origin(),
        ));
        let energies = [3.0, 1.0, 6.5, 5.9];
        let ids: Vec<ConformerId> = energies
            .iter()
            .map(|&e| {
                let id = mol.add_conformer(vec![Point3::origin()]);
                mol.conformer_mut(id).unwrap().energy = Some(e);
                id
            })
            .collect();
        assert_eq!(
            within_energy_window(&mol, &ids, 5.0),
            vec![ids[0], ids[1], ids[3]]
        );
    }

    #[test]
    fn skip_policy_continues_past_untyped_molecules() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.sdf");
        let output = dir.path().join("out.sdf");
        fs::write(&input, format!("{IRON}{METHYLAMINE}")).unwrap();
        let engine = DistanceGeometryEngine::new();
        let pairs = [FilePair {
            input,
            output: output.clone(),
        }];

        let abort = run(&pairs, &seeded_config(2), &engine, &ProgressReporter::new());
        assert!(matches!(abort, Err(EngineError::Forcefield { .. })));

        let skip = ConformerConfig {
            failure_policy: FailurePolicy::Skip,
            ..seeded_config(2)
        };
        let report = run(&pairs, &skip, &engine, &ProgressReporter::new()).unwrap();
        let file = &report.files[0];
        assert_eq!(file.failures.len(), 1);
        assert_eq!(file.failures[0].name, "iron");
        assert_eq!(file.conformers_written, 2);
        assert_eq!(count_records(&output), 2);
    }

    #[test]
    fn salts_with_unbonded_counterions_are_processed() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("salt.sdf");
        let output = dir.path().join("salt_out.sdf");
        fs::write(&input, SODIUM_ACETATE).unwrap();
        let pairs = [FilePair {
            input,
            output: output.clone(),
        }];

        let report = run(
            &pairs,
            &seeded_config(3),
            &DistanceGeometryEngine::new(),
            &ProgressReporter::new(),
        )
        .unwrap();
        assert_eq!(report.conformers_written(), 3);

        let written = read_back(&output);
        assert_eq!(written.len(), 3);
        for mol in &written {
            assert_eq!(mol.atom_count(), 8);
            let sodium = &mol.atoms()[4];
            assert_eq!(sodium.element, Element::Na);
            assert_eq!(sodium.formal_charge, 1);
            assert!(mol.neighbors(4).is_empty());
            assert!(mol.atoms().iter().all(|a| a.position.coords.iter().all(|c| c.is_finite())));
        }
    }

    #[test]
    fn missing_input_is_an_io_error() {
        let dir = tempdir().unwrap();
        let pairs = [FilePair {
            input: dir.path().join("absent.sdf"),
            output: dir.path().join("out.sdf"),
        }];
        let result = run(
            &pairs,
            &seeded_config(1),
            &DistanceGeometryEngine::new(),
            &ProgressReporter::new(),
        );
        assert!(matches!(result, Err(EngineError::Io { .. })));
        assert!(!dir.path().join("out.sdf").exists());
    }
}
