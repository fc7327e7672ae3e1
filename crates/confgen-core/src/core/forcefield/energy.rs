use super::minimize::{MinimizationOutcome, MinimizerSettings, Objective, minimize};
use super::params::{self, UffParams};
use super::potentials;
use super::term::EnergyTerm;
use crate::core::chem::perception::{self, Hybridization, UNREACHABLE};
use crate::core::models::atom::Element;
use crate::core::models::molecule::Molecule;
use nalgebra::{Point3, Vector3};
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Error)]
pub enum ForcefieldError {
    #[error("No force field parameters for atom {serial} ({element})")]
    MissingParameters { serial: usize, element: Element },
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
}

#[derive(Debug, Clone, Copy)]
struct BondTerm {
    i: usize,
    j: usize,
    r0: f64,
    k: f64,
}

#[derive(Debug, Clone, Copy)]
struct AngleTerm {
    i: usize,
    center: usize,
    k: usize,
    theta0: f64,
    force_constant: f64,
}

#[derive(Debug, Clone, Copy)]
struct TorsionTerm {
    i: usize,
    j: usize,
    k: usize,
    l: usize,
    barrier: f64,
    periodicity: u8,
    cos_n_phi0: f64,
}

#[derive(Debug, Clone, Copy)]
struct VdwTerm {
    i: usize,
    j: usize,
    r_min: f64,
    well_depth: f64,
}

/// Sp3-sp3 torsion barrier for group 16 pairs (UFF special case).
fn group16_barrier(element: Element) -> Option<f64> {
    match element {
        Element::O => Some(2.0),
        Element::S | Element::Se | Element::Te => Some(6.8),
        _ => None,
    }
}

#[inline]
fn point(coords: &[f64], index: usize) -> Vector3<f64> {
    Vector3::new(coords[3 * index], coords[3 * index + 1], coords[3 * index + 2])
}

#[inline]
fn accumulate(grad: &mut [f64], index: usize, v: &Vector3<f64>) {
    grad[3 * index] += v.x;
    grad[3 * index + 1] += v.y;
    grad[3 * index + 2] += v.z;
}

/// A Universal Force Field energy expression for one molecule.
///
/// The model is built once from the molecular graph (atom typing plus the
/// bonded and nonbonded interaction lists) and can then be evaluated for any
/// coordinate set of that molecule. Terms: harmonic bond stretch,
/// cosine-harmonic angle bend, cosine-series torsions and a Lennard-Jones 12-6
/// van der Waals term for atoms three or more bonds apart.
#[derive(Debug, Clone)]
pub struct UffModel {
    atom_count: usize,
    bonds: Vec<BondTerm>,
    angles: Vec<AngleTerm>,
    torsions: Vec<TorsionTerm>,
    vdw: Vec<VdwTerm>,
}

impl UffModel {
    /// Types every atom and collects all interaction terms.
    ///
    /// # Errors
    ///
    /// Returns [`ForcefieldError::MissingParameters`] for the first atom whose
    /// element has no parameters.
    pub fn build(molecule: &Molecule) -> Result<Self, ForcefieldError> {
        let n = molecule.atom_count();
        let mut atom_params: Vec<&'static UffParams> = Vec::with_capacity(n);
        for (index, atom) in molecule.atoms().iter().enumerate() {
            let params = perception::uff_atom_type(molecule, index)
                .and_then(params::uff_params)
                .ok_or(ForcefieldError::MissingParameters {
                    serial: index + 1,
                    element: atom.element,
                })?;
            atom_params.push(params);
        }
        let hybrid: Vec<Hybridization> = (0..n)
            .map(|i| perception::hybridization(molecule, i))
            .collect();

        let bonds: Vec<BondTerm> = molecule
            .bonds()
            .iter()
            .map(|bond| {
                let (a, b) = (atom_params[bond.atom1], atom_params[bond.atom2]);
                let r0 = params::rest_length(a, b, bond.order.valence_contribution());
                BondTerm {
                    i: bond.atom1,
                    j: bond.atom2,
                    r0,
                    k: params::bond_force_constant(a, b, r0),
                }
            })
            .collect();

        let rest = |a: usize, b: usize| -> f64 {
            let order = molecule
                .bond_between(a, b)
                .map_or(1.0, |bond| bond.order.valence_contribution());
            params::rest_length(atom_params[a], atom_params[b], order)
        };

        let mut angles = Vec::new();
        for center in 0..n {
            let neighbors = molecule.neighbors(center);
            for (x, &i) in neighbors.iter().enumerate() {
                for &k in &neighbors[x + 1..] {
                    let theta0 = atom_params[center].theta0.to_radians();
                    let force_constant = params::angle_force_constant(
                        atom_params[i],
                        atom_params[center],
                        atom_params[k],
                        rest(i, center),
                        rest(center, k),
                    );
                    angles.push(AngleTerm {
                        i,
                        center,
                        k,
                        theta0,
                        force_constant,
                    });
                }
            }
        }

        let mut torsions = Vec::new();
        for bond in molecule.bonds() {
            let (j, k) = (bond.atom1, bond.atom2);
            let (deg_j, deg_k) = (molecule.neighbors(j).len(), molecule.neighbors(k).len());
            if deg_j < 2 || deg_k < 2 {
                continue;
            }
            if hybrid[j] == Hybridization::Sp || hybrid[k] == Hybridization::Sp {
                continue;
            }
            let Some((barrier, periodicity, cos_n_phi0)) = Self::torsion_parameters(
                molecule,
                &hybrid,
                &atom_params,
                j,
                k,
                bond.order.valence_contribution(),
            ) else {
                continue;
            };
            let scaled = barrier / ((deg_j - 1) * (deg_k - 1)) as f64;
            for &i in molecule.neighbors(j).iter().filter(|&&i| i != k) {
                for &l in molecule.neighbors(k).iter().filter(|&&l| l != j && l != i) {
                    torsions.push(TorsionTerm {
                        i,
                        j,
                        k,
                        l,
                        barrier: scaled,
                        periodicity,
                        cos_n_phi0,
                    });
                }
            }
        }

        let distances = perception::topological_distances(molecule);
        let mut vdw = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                let d = distances[i][j];
                if d >= 3 || d == UNREACHABLE {
                    let (r_min, well_depth) = params::vdw_pair(atom_params[i], atom_params[j]);
                    vdw.push(VdwTerm {
                        i,
                        j,
                        r_min,
                        well_depth,
                    });
                }
            }
        }

        trace!(
            atoms = n,
            bonds = bonds.len(),
            angles = angles.len(),
            torsions = torsions.len(),
            vdw_pairs = vdw.len(),
            "Built UFF model."
        );

        Ok(Self {
            atom_count: n,
            bonds,
            angles,
            torsions,
            vdw,
        })
    }

    /// `(barrier, periodicity, cos(n φ0))` for rotation about the bond `j-k`.
    fn torsion_parameters(
        molecule: &Molecule,
        hybrid: &[Hybridization],
        atom_params: &[&UffParams],
        j: usize,
        k: usize,
        bond_order: f64,
    ) -> Option<(f64, u8, f64)> {
        let (pj, pk) = (atom_params[j], atom_params[k]);
        let element = |i: usize| molecule.atoms()[i].element;
        let bonded_to_sp2 = |a: usize, other: usize| {
            molecule
                .neighbors(a)
                .iter()
                .any(|&n| n != other && hybrid[n] == Hybridization::Sp2)
        };

        match (hybrid[j], hybrid[k]) {
            (Hybridization::Sp3, Hybridization::Sp3) => {
                if let (Some(vj), Some(vk)) = (group16_barrier(element(j)), group16_barrier(element(k))) {
                    return Some(((vj * vk).sqrt(), 2, -1.0));
                }
                let v = (pj.v_sp3 * pk.v_sp3).sqrt();
                (v > 0.0).then_some((v, 3, -1.0))
            }
            (Hybridization::Sp2, Hybridization::Sp2) => {
                let v = 5.0 * (pj.u_sp2 * pk.u_sp2).sqrt() * (1.0 + 4.18 * bond_order.ln());
                (v > 0.0).then_some((v, 2, 1.0))
            }
            (Hybridization::Sp2, Hybridization::Sp3) | (Hybridization::Sp3, Hybridization::Sp2) => {
                let sp2 = if hybrid[j] == Hybridization::Sp2 { j } else { k };
                let sp3 = if sp2 == j { k } else { j };
                if bonded_to_sp2(sp2, sp3) {
                    // Propene-like: eclipse the sp2 neighbor's double bond.
                    Some((2.0, 3, -1.0))
                } else {
                    Some((1.0, 6, 1.0))
                }
            }
            _ => None,
        }
    }

    pub fn atom_count(&self) -> usize {
        self.atom_count
    }

    /// Energy and gradient for flat coordinates, split by term.
    fn evaluate_terms(&self, coords: &[f64], grad: &mut [f64]) -> EnergyTerm {
        grad.fill(0.0);
        let mut energy = EnergyTerm::default();

        for term in &self.bonds {
            let d = point(coords, term.i) - point(coords, term.j);
            let r = d.norm();
            energy.bond += potentials::harmonic(r, term.r0, term.k);
            if r > 1e-10 {
                let g = d * (potentials::harmonic_derivative(r, term.r0, term.k) / r);
                accumulate(grad, term.i, &g);
                accumulate(grad, term.j, &-g);
            }
        }

        for term in &self.angles {
            let u = point(coords, term.i) - point(coords, term.center);
            let v = point(coords, term.k) - point(coords, term.center);
            let (lu, lv) = (u.norm(), v.norm());
            if lu < 1e-10 || lv < 1e-10 {
                continue;
            }
            let cos_theta = (u.dot(&v) / (lu * lv)).clamp(-1.0, 1.0);
            let (e, de_dcos) =
                potentials::cosine_angle(cos_theta, term.theta0, term.force_constant);
            energy.angle += e;
            let dcos_du = v / (lu * lv) - u * (cos_theta / (lu * lu));
            let dcos_dv = u / (lu * lv) - v * (cos_theta / (lv * lv));
            let gi = dcos_du * de_dcos;
            let gk = dcos_dv * de_dcos;
            accumulate(grad, term.i, &gi);
            accumulate(grad, term.k, &gk);
            accumulate(grad, term.center, &-(gi + gk));
        }

        for term in &self.torsions {
            let b1 = point(coords, term.j) - point(coords, term.i);
            let b2 = point(coords, term.k) - point(coords, term.j);
            let b3 = point(coords, term.l) - point(coords, term.k);
            let n1 = b1.cross(&b2);
            let n2 = b2.cross(&b3);
            let (l1, l2) = (n1.norm(), n2.norm());
            if l1 < 1e-10 || l2 < 1e-10 {
                continue;
            }
            let cos_phi = (n1.dot(&n2) / (l1 * l2)).clamp(-1.0, 1.0);
            let (e, de_dcos) = potentials::cosine_torsion(
                cos_phi,
                term.barrier,
                term.periodicity,
                term.cos_n_phi0,
            );
            energy.torsion += e;

            let dcos_dn1 = (n2 / l2 - n1 * (cos_phi / l1)) / l1;
            let dcos_dn2 = (n1 / l1 - n2 * (cos_phi / l2)) / l2;
            let d_b1 = b2.cross(&dcos_dn1) * de_dcos;
            let d_b2 = (dcos_dn1.cross(&b1) + b3.cross(&dcos_dn2)) * de_dcos;
            let d_b3 = dcos_dn2.cross(&b2) * de_dcos;
            accumulate(grad, term.i, &-d_b1);
            accumulate(grad, term.j, &(d_b1 - d_b2));
            accumulate(grad, term.k, &(d_b2 - d_b3));
            accumulate(grad, term.l, &d_b3);
        }

        for term in &self.vdw {
            let d = point(coords, term.i) - point(coords, term.j);
            let r = d.norm();
            energy.vdw += potentials::lennard_jones_12_6(r, term.r_min, term.well_depth);
            if r > 1e-6 {
                let de_dr =
                    potentials::lennard_jones_12_6_derivative(r, term.r_min, term.well_depth);
                let g = d * (de_dr / r);
                accumulate(grad, term.i, &g);
                accumulate(grad, term.j, &-g);
            }
        }

        energy
    }

    /// Energy breakdown for a coordinate set.
    ///
    /// # Errors
    ///
    /// Returns [`ForcefieldError::InvalidGeometry`] if the number of positions
    /// does not match the model or the energy is not finite.
    pub fn energy(&self, positions: &[Point3<f64>]) -> Result<EnergyTerm, ForcefieldError> {
        if positions.len() != self.atom_count {
            return Err(ForcefieldError::InvalidGeometry(format!(
                "expected {} positions, got {}",
                self.atom_count,
                positions.len()
            )));
        }
        let coords: Vec<f64> = positions.iter().flat_map(|p| [p.x, p.y, p.z]).collect();
        let mut grad = vec![0.0; coords.len()];
        let terms = self.evaluate_terms(&coords, &mut grad);
        if !terms.is_finite() {
            return Err(ForcefieldError::InvalidGeometry(
                "energy is not finite".to_string(),
            ));
        }
        Ok(terms)
    }

    /// Minimizes `positions` in place.
    ///
    /// # Errors
    ///
    /// Returns [`ForcefieldError::InvalidGeometry`] if the number of positions
    /// does not match the model.
    pub fn optimize(
        &self,
        positions: &mut [Point3<f64>],
        settings: &MinimizerSettings,
    ) -> Result<MinimizationOutcome, ForcefieldError> {
        if positions.len() != self.atom_count {
            return Err(ForcefieldError::InvalidGeometry(format!(
                "expected {} positions, got {}",
                self.atom_count,
                positions.len()
            )));
        }
        let mut coords: Vec<f64> = positions.iter().flat_map(|p| [p.x, p.y, p.z]).collect();
        let outcome = minimize(self, &mut coords, settings);
        for (p, c) in positions.iter_mut().zip(coords.chunks_exact(3)) {
            *p = Point3::new(c[0], c[1], c[2]);
        }
        Ok(outcome)
    }
}

impl Objective for UffModel {
    fn evaluate(&self, x: &[f64], grad: &mut [f64]) -> f64 {
        self.evaluate_terms(x, grad).total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chem::hydrogens::add_hydrogens;
    use crate::core::models::atom::Atom;
    use crate::core::models::topology::BondOrder;
    use crate::core::utils::geometry::{bond_angle, dihedral_angle};
    use nalgebra::{Rotation3, Vector3};

    fn butane() -> Molecule {
        let mut mol = Molecule::new("butane");
        let coords = [
            (0.0, 0.0, 0.0),
            (1.5, 0.1, 0.0),
            (2.1, 1.4, 0.3),
            (3.6, 1.5, 0.2),
        ];
        for (x, y, z) in coords {
            mol.add_atom(Atom::new(Element::C, Point3::new(x, y, z)));
        }
        for i in 0..3 {
            mol.add_bond(i, i + 1, BondOrder::Single);
        }
        add_hydrogens(&mol).unwrap()
    }

    fn flat(mol: &Molecule) -> Vec<f64> {
        mol.input_positions()
            .iter()
            .flat_map(|p| [p.x, p.y, p.z])
            .collect()
    }

    #[test]
    fn analytic_gradient_matches_finite_differences() {
        let mol = butane();
        let model = UffModel::build(&mol).unwrap();
        let x = flat(&mol);
        let mut grad = vec![0.0; x.len()];
        model.evaluate(&x, &mut grad);

        let h = 1e-6;
        let mut scratch = vec![0.0; x.len()];
        for i in 0..x.len() {
            let mut plus = x.clone();
            plus[i] += h;
            let mut minus = x.clone();
            minus[i] -= h;
            let numeric =
                (model.evaluate(&plus, &mut scratch) - model.evaluate(&minus, &mut scratch)) / (2.0 * h);
            assert!(
                (numeric - grad[i]).abs() < 1e-3 * (1.0 + numeric.abs()),
                "coordinate {i}: analytic {} vs numeric {numeric}",
                grad[i]
            );
        }
    }

    #[test]
    fn terms_exclude_close_pairs_from_vdw() {
        let mol = butane();
        let model = UffModel::build(&mol).unwrap();
        assert_eq!(model.bonds.len(), 13);
        // Carbons 0 and 3 are 1-4 and interact; 0 and 2 are 1-3 and do not.
        assert!(model.vdw.iter().any(|t| (t.i, t.j) == (0, 3)));
        assert!(!model.vdw.iter().any(|t| (t.i, t.j) == (0, 2)));
        assert!(!model.torsions.is_empty());
    }

    #[test]
    fn optimization_lowers_energy_and_restores_ideal_geometry() {
        let mol = butane();
        let model = UffModel::build(&mol).unwrap();
        let mut positions = mol.input_positions();
        let before = model.energy(&positions).unwrap().total();

        let settings = MinimizerSettings {
            max_iterations: 2000,
            ..Default::default()
        };
        let outcome = model.optimize(&mut positions, &settings).unwrap();
        assert!(outcome.energy < before);
        assert!((model.energy(&positions).unwrap().total() - outcome.energy).abs() < 1e-9);

        let cc = (positions[1] - positions[0]).norm();
        assert!((cc - 1.514).abs() < 0.03, "C-C was {cc}");
        let angle = bond_angle(&positions[0], &positions[1], &positions[2]).to_degrees();
        assert!((angle - 111.0).abs() < 6.0, "C-C-C was {angle}");
    }

    #[test]
    fn ethane_relaxes_to_staggered() {
        let mut mol = Molecule::new("ethane");
        mol.add_atom(Atom::new(Element::C, Point3::new(0.0, 0.0, 0.0)));
        mol.add_atom(Atom::new(Element::C, Point3::new(1.53, 0.0, 0.0)));
        mol.add_bond(0, 1, BondOrder::Single);
        let mol = add_hydrogens(&mol).unwrap();
        let model = UffModel::build(&mol).unwrap();

        // Hydrogens are placed eclipsed, a stationary point of the torsion.
        // Twist the C1 methyl off it by 20 degrees about the C-C axis.
        let mut positions = mol.input_positions();
        let twist = Rotation3::from_axis_angle(&Vector3::x_axis(), 20f64.to_radians());
        let axis_origin = positions[1];
        for p in &mut positions[5..8] {
            *p = axis_origin + twist * (*p - axis_origin);
        }
        let start_energy = model.energy(&positions).unwrap().total();
        let settings = MinimizerSettings {
            max_iterations: 2000,
            ..Default::default()
        };
        let outcome = model.optimize(&mut positions, &settings).unwrap();
        assert!(outcome.energy < start_energy);

        // H on C0 are atoms 2..5, on C1 atoms 5..8.
        let phi = dihedral_angle(&positions[2], &positions[0], &positions[1], &positions[5])
            .unwrap()
            .to_degrees()
            .abs();
        let from_staggered = [60.0, 180.0]
            .iter()
            .map(|s| (phi - s).abs())
            .fold(f64::MAX, f64::min);
        assert!(from_staggered < 10.0, "H-C-C-H was {phi}");
    }

    #[test]
    fn unsupported_element_is_reported_with_its_serial() {
        let mut mol = Molecule::new("ferrocene-fragment");
        mol.add_atom(Atom::new(Element::C, Point3::origin()));
        mol.add_atom(Atom::new(Element::Fe, Point3::new(2.0, 0.0, 0.0)));
        mol.add_bond(0, 1, BondOrder::Single);
        match UffModel::build(&mol) {
            Err(ForcefieldError::MissingParameters { serial, element }) => {
                assert_eq!(serial, 2);
                assert_eq!(element, Element::Fe);
            }
            other => panic!("expected MissingParameters, got {other:?}"),
        }
    }

    #[test]
    fn mismatched_positions_are_invalid_geometry() {
        let model = UffModel::build(&butane()).unwrap();
        let result = model.energy(&[Point3::origin()]);
        assert!(matches!(result, Err(ForcefieldError::InvalidGeometry(_))));
    }
}
