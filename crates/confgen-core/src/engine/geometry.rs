use super::config::{EmbedParams, OptimizationConfig};
use super::error::EngineError;
use crate::core::chem::hydrogens;
use crate::core::embedding::{self, EmbeddingError};
use crate::core::forcefield::energy::UffModel;
use crate::core::forcefield::minimize::{MinimizationOutcome, MinimizerSettings};
use crate::core::models::conformer::ConformerId;
use crate::core::models::molecule::Molecule;
use rand::rngs::StdRng;
use tracing::trace;

/// The chemistry operations the batch runner needs from a toolkit.
///
/// Implementations must be shareable across threads, since file pairs may be
/// processed in parallel with one engine.
pub trait GeometryEngine: Send + Sync {
    /// Returns a copy of `molecule` with all implicit hydrogens made explicit.
    fn add_hydrogens(&self, molecule: &Molecule) -> Result<Molecule, EngineError>;

    /// Replaces the conformers of `molecule` with up to `count` new ones.
    fn embed_conformers(
        &self,
        molecule: &mut Molecule,
        count: usize,
        params: &EmbedParams,
        rng: &mut StdRng,
    ) -> Result<Vec<ConformerId>, EngineError>;

    /// Minimizes one conformer in place and records its final energy.
    fn optimize_conformer(
        &self,
        molecule: &mut Molecule,
        id: ConformerId,
        config: &OptimizationConfig,
    ) -> Result<MinimizationOutcome, EngineError>;
}

/// Distance-geometry embedding followed by UFF minimization.
#[derive(Debug, Default, Clone, Copy)]
pub struct DistanceGeometryEngine;

impl DistanceGeometryEngine {
    pub fn new() -> Self {
        Self
    }
}

impl GeometryEngine for DistanceGeometryEngine {
    fn add_hydrogens(&self, molecule: &Molecule) -> Result<Molecule, EngineError> {
        Ok(hydrogens::add_hydrogens(molecule)?)
    }

    fn embed_conformers(
        &self,
        molecule: &mut Molecule,
        count: usize,
        params: &EmbedParams,
        rng: &mut StdRng,
    ) -> Result<Vec<ConformerId>, EngineError> {
        Ok(embedding::embed_conformers(molecule, count, params, rng)?)
    }

    fn optimize_conformer(
        &self,
        molecule: &mut Molecule,
        id: ConformerId,
        config: &OptimizationConfig,
    ) -> Result<MinimizationOutcome, EngineError> {
        let model = UffModel::build(molecule)?;
        let name = molecule.name.clone();
        let conformer = molecule
            .conformer_mut(id)
            .ok_or(EmbeddingError::ConformerNotFound(id))?;

        let outcome = model.optimize(&mut conformer.positions, &MinimizerSettings::from(config))?;
        if !outcome.energy.is_finite() {
            return Err(EngineError::Optimization {
                molecule: name,
                reason: format!("conformer {id} reached a non-finite energy"),
            });
        }
        conformer.energy = Some(outcome.energy);
        trace!(
            molecule = %name,
            conformer = %id,
            energy = outcome.energy,
            iterations = outcome.iterations,
            converged = outcome.converged,
            "Optimized conformer."
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::{Atom, Element};
    use crate::core::models::topology::BondOrder;
    use nalgebra::Point3;
    use rand::SeedableRng;

    fn methanol() -> Molecule {
        let mut mol = Molecule::new("methanol");
        mol.add_atom(Atom::new(Element::C, Point3::new(0.0, 0.0, 0.0)));
        mol.add_atom(Atom::new(Element::O, Point3::new(1.43, 0.0, 0.0)));
        mol.add_bond(0, 1, BondOrder::Single);
        mol
    }

    #[test]
    fn full_pipeline_produces_optimized_conformers() {
        let engine = DistanceGeometryEngine::new();
        let mut mol = engine.add_hydrogens(&methanol()).unwrap();
        assert_eq!(mol.atom_count(), 6);

        let mut rng = StdRng::seed_from_u64(11);
        let ids = engine
            .embed_conformers(&mut mol, 2, &EmbedParams::default(), &mut rng)
            .unwrap();
        assert_eq!(ids.len(), 2);

        for id in ids {
            let outcome = engine
                .optimize_conformer(&mut mol, id, &OptimizationConfig::default())
                .unwrap();
            let conformer = mol.conformer(id).unwrap();
            assert_eq!(conformer.energy, Some(outcome.energy));
            let co = (conformer.positions[0] - conformer.positions[1]).norm();
            assert!((co - 1.40).abs() < 0.08, "C-O distance {co}");
        }
    }

    #[test]
    fn optimizing_a_missing_conformer_fails() {
        let engine = DistanceGeometryEngine::new();
        let mut mol = engine.add_hydrogens(&methanol()).unwrap();
        let result = engine.optimize_conformer(&mut mol, ConformerId(3), &OptimizationConfig::default());
        assert!(matches!(
            result,
            Err(EngineError::Embedding {
                source: EmbeddingError::ConformerNotFound(ConformerId(3))
            })
        ));
    }

    #[test]
    fn untyped_elements_fail_in_the_force_field() {
        let engine = DistanceGeometryEngine::new();
        let mut mol = Molecule::new("iron");
        mol.add_atom(Atom::new(Element::Fe, Point3::origin()));
        let mut rng = StdRng::seed_from_u64(0);
        let ids = engine
            .embed_conformers(&mut mol, 1, &EmbedParams::default(), &mut rng)
            .unwrap();
        let result = engine.optimize_conformer(&mut mol, ids[0], &OptimizationConfig::default());
        assert!(matches!(result, Err(EngineError::Forcefield { .. })));
    }
}
