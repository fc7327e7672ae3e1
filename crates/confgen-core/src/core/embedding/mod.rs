//! # Embedding Module
//!
//! Distance-geometry generation of 3D conformers from a molecular graph.
//!
//! ## Overview
//!
//! An embedding attempt proceeds in four steps:
//!
//! 1. [`bounds`] derives lower and upper limits for every atom pair from bond
//!    lengths, bond angles and torsion extremes, then smooths them with the
//!    triangle inequality.
//! 2. [`metric`] samples a distance matrix inside those limits and converts it to
//!    coordinates through the metric matrix eigen-decomposition.
//! 3. [`refine`] minimizes bound violations and chiral volume errors.
//! 4. The result is kept unless it is non-finite, has inverted stereocenters, or
//!    duplicates an earlier conformer within the pruning RMSD.

pub mod bounds;
pub mod metric;
pub mod refine;

use crate::core::models::conformer::ConformerId;
use crate::core::models::molecule::Molecule;
use crate::core::utils::geometry::aligned_rmsd;
use nalgebra::Point3;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, trace, warn};

#[derive(Debug, Error, PartialEq)]
pub enum EmbeddingError {
    #[error("Cannot embed a molecule without atoms")]
    EmptyMolecule,
    #[error("Distance bounds are contradictory between atoms {atom1} and {atom2}")]
    BoundsContradiction { atom1: usize, atom2: usize },
    #[error("Conformer {0} does not exist")]
    ConformerNotFound(ConformerId),
}

/// Knobs of the distance-geometry embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbedParams {
    /// Seed of the embedding random stream; `None` draws from OS entropy.
    pub random_seed: Option<u64>,
    /// Embedding attempts per requested conformer before it is given up.
    pub max_attempts: usize,
    /// Keep the handedness of tetrahedral centers found in a 3D input.
    pub enforce_chirality: bool,
    /// Fix ring torsions and input double-bond geometry in the bounds.
    pub use_basic_knowledge: bool,
    /// Heavy-atom RMSD (Å) under which a new conformer counts as a duplicate.
    pub prune_rms_threshold: Option<f64>,
    /// Half-width (degrees) of the accepted range around ideal bond angles.
    pub angle_tolerance: f64,
}

impl Default for EmbedParams {
    fn default() -> Self {
        Self {
            random_seed: None,
            max_attempts: 10,
            enforce_chirality: true,
            use_basic_knowledge: true,
            prune_rms_threshold: None,
            angle_tolerance: 5.0,
        }
    }
}

fn heavy_positions(molecule: &Molecule, positions: &[Point3<f64>]) -> Vec<Point3<f64>> {
    molecule
        .atoms()
        .iter()
        .zip(positions)
        .filter(|(atom, _)| !atom.is_hydrogen())
        .map(|(_, p)| *p)
        .collect()
}

fn is_duplicate(
    molecule: &Molecule,
    candidate: &[Point3<f64>],
    accepted: &[Vec<Point3<f64>>],
    threshold: f64,
) -> bool {
    let heavy = heavy_positions(molecule, candidate);
    accepted.iter().any(|previous| {
        aligned_rmsd(&heavy, &heavy_positions(molecule, previous))
            .is_some_and(|rmsd| rmsd < threshold)
    })
}

/// Generates up to `count` conformers for `molecule`.
///
/// Existing conformers are removed first. New conformers get ids `0..k` in
/// generation order, where `k <= count`: a conformer that fails every one of
/// its `max_attempts` attempts, or that is pruned as a duplicate, is omitted.
///
/// # Errors
///
/// Returns [`EmbeddingError::EmptyMolecule`] for a molecule without atoms and
/// [`EmbeddingError::BoundsContradiction`] when its geometry constraints cannot
/// be satisfied at all.
pub fn embed_conformers<R: Rng + ?Sized>(
    molecule: &mut Molecule,
    count: usize,
    params: &EmbedParams,
    rng: &mut R,
) -> Result<Vec<ConformerId>, EmbeddingError> {
    if molecule.atom_count() == 0 {
        return Err(EmbeddingError::EmptyMolecule);
    }
    molecule.clear_conformers();

    let bounds = bounds::build_bounds(molecule, params)?;
    let chiral = if params.enforce_chirality {
        refine::chiral_centers(molecule)
    } else {
        Vec::new()
    };
    debug!(
        name = %molecule.name,
        atoms = molecule.atom_count(),
        chiral_centers = chiral.len(),
        "Embedding {} conformers.",
        count
    );

    let mut accepted: Vec<Vec<Point3<f64>>> = Vec::with_capacity(count);
    for index in 0..count {
        let mut embedded = None;
        for attempt in 1..=params.max_attempts {
            let distances = metric::random_distances(&bounds, rng);
            let Some(initial) = metric::embed_distances(&distances, rng) else {
                trace!(conformer = index, attempt, "Metric matrix has no positive eigenvalue.");
                continue;
            };
            match refine::refine(initial, &bounds, &chiral) {
                Some(positions) => {
                    embedded = Some(positions);
                    break;
                }
                None => trace!(conformer = index, attempt, "Refinement rejected the embedding."),
            }
        }

        let Some(positions) = embedded else {
            warn!(
                name = %molecule.name,
                conformer = index,
                "Embedding failed after {} attempts; conformer omitted.",
                params.max_attempts
            );
            continue;
        };
        if let Some(threshold) = params.prune_rms_threshold {
            if is_duplicate(molecule, &positions, &accepted, threshold) {
                debug!(name = %molecule.name, conformer = index, "Pruned duplicate conformer.");
                continue;
            }
        }
        accepted.push(positions);
    }

    Ok(accepted
        .into_iter()
        .map(|positions| molecule.add_conformer(positions))
        .collect())
}
