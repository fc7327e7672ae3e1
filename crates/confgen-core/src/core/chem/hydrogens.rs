use super::perception::{Hybridization, hybridization};
use super::valence::{find_valence_violation, implicit_hydrogen_count};
use crate::core::models::atom::{Atom, Element};
use crate::core::models::molecule::Molecule;
use crate::core::models::topology::BondOrder;
use crate::core::utils::geometry::{
    generate_sp_hydrogens, generate_sp2_hydrogens, generate_sp3_hydrogens,
};
use nalgebra::Point3;
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("Atom {serial} ({element}) has explicit valence {valence}, above any allowed valence")]
pub struct ValenceError {
    pub serial: usize,
    pub element: Element,
    pub valence: f64,
}

fn x_h_bond_length(element: Element) -> f64 {
    match element {
        Element::C => 1.09,
        Element::N => 1.01,
        Element::O => 0.96,
        Element::S => 1.34,
        other => other.covalent_radius() + Element::H.covalent_radius(),
    }
}

/// Returns a copy of `molecule` with every implicit hydrogen made explicit.
///
/// New hydrogens are appended after the existing atoms, each bonded to its
/// parent by a single bond, in parent order. Their coordinates complete the
/// parent's ideal geometry from the input positions, so a 3D input keeps
/// meaningful stereochemistry around the new atoms. Atoms whose element has no
/// valence model receive none.
///
/// # Errors
///
/// Returns [`ValenceError`] if an atom already exceeds its largest allowed
/// valence.
pub fn add_hydrogens(molecule: &Molecule) -> Result<Molecule, ValenceError> {
    if let Some((index, valence)) = find_valence_violation(molecule) {
        return Err(ValenceError {
            serial: index + 1,
            element: molecule.atoms()[index].element,
            valence,
        });
    }

    let mut result = molecule.clone();
    result.clear_conformers();
    let mut added = 0usize;

    for parent in 0..molecule.atom_count() {
        let count = implicit_hydrogen_count(molecule, parent) as usize;
        if count == 0 {
            continue;
        }
        let atom = &molecule.atoms()[parent];
        let base = atom.position;
        let neighbors: Vec<Point3<f64>> = molecule
            .neighbors(parent)
            .iter()
            .map(|&n| molecule.atoms()[n].position)
            .collect();
        let bond_length = x_h_bond_length(atom.element);

        let mut positions = match hybridization(molecule, parent) {
            Hybridization::Sp3 => generate_sp3_hydrogens(&base, &neighbors, bond_length),
            Hybridization::Sp2 => {
                let plane_ref = molecule.neighbors(parent).first().and_then(|&n| {
                    molecule
                        .neighbors(n)
                        .iter()
                        .find(|&&m| m != parent)
                        .map(|&m| molecule.atoms()[m].position)
                });
                generate_sp2_hydrogens(&base, &neighbors, plane_ref.as_ref(), bond_length)
            }
            Hybridization::Sp => generate_sp_hydrogens(&base, &neighbors, bond_length),
        };
        if positions.len() < count {
            // Crowded centers (charged or hypervalent) fall back to free tetrahedral slots.
            positions.extend(generate_sp3_hydrogens(&base, &[], bond_length));
        }

        for position in positions.into_iter().take(count) {
            let h = result.add_atom(Atom::new(Element::H, position));
            result.add_bond(parent, h, BondOrder::Single);
            added += 1;
        }
    }

    trace!(name = %molecule.name, added, "Added explicit hydrogens.");
    Ok(result)
}
