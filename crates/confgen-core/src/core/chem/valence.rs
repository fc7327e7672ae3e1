use crate::core::models::atom::Element;
use crate::core::models::molecule::Molecule;
use crate::core::models::topology::BondOrder;

/// Allowed valences for an element carrying a formal charge, in ascending order.
///
/// Charged main-group atoms are treated as their isoelectronic neighbor: N+
/// behaves like C (4), O- like F (1), C+ and C- both have valence 3. Elements
/// of period 3 and below in groups 15 and 16 keep their hypervalent states.
/// An empty result means the element has no valence model and is never
/// checked or given implicit hydrogens.
pub fn allowed_valences(element: Element, charge: i8) -> Vec<u8> {
    let defaults = element.default_valences();
    if defaults.is_empty() {
        return Vec::new();
    }
    if charge == 0 {
        return defaults.to_vec();
    }
    if element.is_hydrogen() {
        return vec![0];
    }
    let Some(ve) = element.valence_electrons() else {
        return Vec::new();
    };
    let shifted = ve as i16 - charge as i16;
    let hypervalent = element.atomic_number() > 10 && matches!(ve, 5 | 6);
    match shifted {
        0 => vec![0],
        1..=4 => vec![shifted as u8],
        5 if hypervalent => vec![3, 5],
        5 => vec![3],
        6 if hypervalent => vec![2, 4, 6],
        6 => vec![2],
        7 => vec![1],
        8 => vec![0],
        _ => Vec::new(),
    }
}

/// Explicit valence of an atom, rounded up to an integer bond count.
pub fn explicit_valence(molecule: &Molecule, index: usize) -> u8 {
    molecule.explicit_valence(index).ceil() as u8
}

pub fn has_aromatic_bond(molecule: &Molecule, index: usize) -> bool {
    molecule
        .bonds_of(index)
        .any(|(_, bond)| bond.order == BondOrder::Aromatic)
}

/// Number of hydrogens needed to reach the nearest allowed valence.
pub fn implicit_hydrogen_count(molecule: &Molecule, index: usize) -> u8 {
    let Some(atom) = molecule.atom(index) else {
        return 0;
    };
    if atom.is_hydrogen() {
        return 0;
    }
    let explicit = explicit_valence(molecule, index);
    allowed_valences(atom.element, atom.formal_charge)
        .into_iter()
        .find(|&v| v >= explicit)
        .map_or(0, |v| v - explicit)
}

/// Checks that no atom exceeds its largest allowed valence.
///
/// Atoms with aromatic bonds get one unit of slack, since a 1.5 bond order
/// cannot tell a pyrrole-type nitrogen from a pyridine-type one.
///
/// # Return
///
/// The index and explicit valence of the first offending atom, if any.
pub fn find_valence_violation(molecule: &Molecule) -> Option<(usize, f64)> {
    for (index, atom) in molecule.atoms().iter().enumerate() {
        let allowed = allowed_valences(atom.element, atom.formal_charge);
        let Some(&max) = allowed.last() else {
            continue;
        };
        let explicit = molecule.explicit_valence(index);
        let slack = if has_aromatic_bond(molecule, index) {
            1.0
        } else {
            0.0
        };
        if explicit > max as f64 + slack + 1e-6 {
            return Some((index, explicit));
        }
    }
    None
}
