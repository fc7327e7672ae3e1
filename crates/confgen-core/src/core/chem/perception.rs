use crate::core::models::atom::Element;
use crate::core::models::molecule::Molecule;
use crate::core::models::topology::BondOrder;
use std::collections::VecDeque;

/// Marker for atom pairs in different connected components.
pub const UNREACHABLE: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hybridization {
    Sp,
    Sp2,
    Sp3,
}

impl Hybridization {
    /// Ideal bond angle at a center of this hybridization, in degrees.
    pub fn ideal_angle(&self) -> f64 {
        match self {
            Self::Sp => 180.0,
            Self::Sp2 => 120.0,
            Self::Sp3 => 109.47,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct BondSummary {
    double: usize,
    triple: usize,
    aromatic: usize,
}

fn summarize_bonds(molecule: &Molecule, index: usize) -> BondSummary {
    molecule
        .bonds_of(index)
        .fold(BondSummary::default(), |mut acc, (_, bond)| {
            match bond.order {
                BondOrder::Double => acc.double += 1,
                BondOrder::Triple => acc.triple += 1,
                BondOrder::Aromatic => acc.aromatic += 1,
                BondOrder::Single => {}
            }
            acc
        })
}

pub fn is_aromatic_atom(molecule: &Molecule, index: usize) -> bool {
    summarize_bonds(molecule, index).aromatic > 0
}

/// Whether a neighbor of `index` takes part in a multiple or aromatic bond.
fn is_conjugated(molecule: &Molecule, index: usize) -> bool {
    molecule.neighbors(index).iter().any(|&n| {
        molecule
            .bonds_of(n)
            .any(|(other, bond)| other != index && bond.order.is_multiple())
    })
}

/// Assigns a hybridization from the bond orders around an atom.
///
/// Tetracoordinate atoms are always sp3, which keeps sulfones and phosphates
/// tetrahedral despite their formal double bonds. Trivalent nitrogen next to a
/// multiple bond (amides, anilines, enamines) is planar.
pub fn hybridization(molecule: &Molecule, index: usize) -> Hybridization {
    let Some(atom) = molecule.atom(index) else {
        return Hybridization::Sp3;
    };
    let degree = molecule.neighbors(index).len();
    if degree >= 4 {
        return Hybridization::Sp3;
    }
    let bonds = summarize_bonds(molecule, index);
    let heavy_period = atom.element.atomic_number() > 10;

    if bonds.triple > 0 || (bonds.double >= 2 && !heavy_period) {
        return Hybridization::Sp;
    }
    if bonds.aromatic > 0 || bonds.double > 0 {
        return Hybridization::Sp2;
    }
    if atom.element == Element::N && degree == 3 && is_conjugated(molecule, index) {
        return Hybridization::Sp2;
    }
    Hybridization::Sp3
}

/// Universal force field atom type label for an atom, or `None` if the element
/// has no parameters.
pub fn uff_atom_type(molecule: &Molecule, index: usize) -> Option<&'static str> {
    let atom = molecule.atom(index)?;
    let hybrid = hybridization(molecule, index);
    let aromatic = is_aromatic_atom(molecule, index);
    let bonds = summarize_bonds(molecule, index);

    let label = match atom.element {
        Element::H => "H_",
        Element::Li => "Li",
        Element::Be => "Be3+2",
        Element::Na => "Na",
        Element::Mg => "Mg3+2",
        Element::Al => "Al3",
        Element::K => "K_",
        Element::Ca => "Ca6+2",
        Element::Zn => "Zn3+2",
        Element::Se => "Se3+2",
        Element::B => {
            if molecule.neighbors(index).len() >= 4 {
                "B_3"
            } else {
                "B_2"
            }
        }
        Element::C => match hybrid {
            _ if aromatic => "C_R",
            Hybridization::Sp => "C_1",
            Hybridization::Sp2 => "C_2",
            Hybridization::Sp3 => "C_3",
        },
        Element::N => match hybrid {
            _ if aromatic => "N_R",
            Hybridization::Sp => "N_1",
            Hybridization::Sp2 if bonds.double == 0 => "N_R",
            Hybridization::Sp2 => "N_2",
            Hybridization::Sp3 => "N_3",
        },
        Element::O => match hybrid {
            _ if aromatic => "O_R",
            Hybridization::Sp => "O_1",
            Hybridization::Sp2 => "O_2",
            Hybridization::Sp3 => "O_3",
        },
        Element::F => "F_",
        Element::Si => "Si3",
        Element::P => {
            if molecule.explicit_valence(index) > 3.0 {
                "P_3+5"
            } else {
                "P_3+3"
            }
        }
        Element::S => {
            let valence = molecule.explicit_valence(index);
            if aromatic {
                "S_R"
            } else if hybrid == Hybridization::Sp2 && molecule.neighbors(index).len() <= 2 && valence <= 2.0 {
                "S_2"
            } else if valence > 4.0 {
                "S_3+6"
            } else if valence > 2.0 {
                "S_3+4"
            } else {
                "S_3+2"
            }
        }
        Element::Cl => "Cl",
        Element::Br => "Br",
        Element::I => "I_",
        _ => return None,
    };
    Some(label)
}

/// Shortest bond-count distance between every pair of atoms.
///
/// Pairs in different fragments are [`UNREACHABLE`].
pub fn topological_distances(molecule: &Molecule) -> Vec<Vec<u32>> {
    let n = molecule.atom_count();
    let mut distances = vec![vec![UNREACHABLE; n]; n];
    let mut queue = VecDeque::new();
    for (start, row) in distances.iter_mut().enumerate() {
        row[start] = 0;
        queue.clear();
        queue.push_back(start);
        while let Some(current) = queue.pop_front() {
            let next_distance = row[current] + 1;
            for &next in molecule.neighbors(current) {
                if row[next] == UNREACHABLE {
                    row[next] = next_distance;
                    queue.push_back(next);
                }
            }
        }
    }
    distances
}

/// Whether the atom path `path` (consecutive atoms bonded) lies on a ring of at
/// most `max_ring_size` atoms.
///
/// A two-atom path asks whether the bond is a ring bond; a three-atom path
/// whether the angle is inside a ring, and so on.
pub fn ring_contains_path(molecule: &Molecule, path: &[usize], max_ring_size: usize) -> bool {
    let (Some(&first), Some(&last)) = (path.first(), path.last()) else {
        return false;
    };
    if path.len() < 2 || path.len() > max_ring_size {
        return false;
    }
    // Edges still available to close the ring from `last` back to `first`.
    let budget = max_ring_size + 1 - path.len();

    let mut depth = vec![usize::MAX; molecule.atom_count()];
    let mut queue = VecDeque::from([last]);
    depth[last] = 0;
    while let Some(current) = queue.pop_front() {
        let d = depth[current];
        if d >= budget {
            continue;
        }
        for &next in molecule.neighbors(current) {
            if next == first {
                if path.len() == 2 && current == last {
                    continue;
                }
                return true;
            }
            if path.contains(&next) || depth[next] != usize::MAX {
                continue;
            }
            depth[next] = d + 1;
            queue.push_back(next);
        }
    }
    false
}
