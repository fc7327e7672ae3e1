use super::{EmbedParams, EmbeddingError};
use crate::core::chem::perception::{self, Hybridization, UNREACHABLE};
use crate::core::forcefield::params::{self, UffParams};
use crate::core::models::molecule::Molecule;
use crate::core::models::topology::BondOrder;
use crate::core::utils::geometry::dihedral_angle;
use tracing::debug;

/// Upper bound used before smoothing for pairs without a geometric constraint.
const MAX_UPPER: f64 = 1000.0;
const BOND_TOLERANCE: f64 = 0.01;
const TORSION_TOLERANCE: f64 = 0.06;
const VDW_SCALE: f64 = 0.7;
/// Extra room allowed between atoms of disconnected fragments.
const FRAGMENT_SPREAD: f64 = 4.0;
const SMOOTHING_TOLERANCE: f64 = 1e-5;

/// Lower and upper interatomic distance limits for every atom pair.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundsMatrix {
    n: usize,
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl BoundsMatrix {
    pub fn new(n: usize) -> Self {
        let mut upper = vec![MAX_UPPER; n * n];
        for i in 0..n {
            upper[i * n + i] = 0.0;
        }
        Self {
            n,
            lower: vec![0.0; n * n],
            upper,
        }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    #[inline]
    pub fn lower(&self, i: usize, j: usize) -> f64 {
        self.lower[i * self.n + j]
    }

    #[inline]
    pub fn upper(&self, i: usize, j: usize) -> f64 {
        self.upper[i * self.n + j]
    }

    pub fn set(&mut self, i: usize, j: usize, lower: f64, upper: f64) {
        let n = self.n;
        self.lower[i * n + j] = lower;
        self.lower[j * n + i] = lower;
        self.upper[i * n + j] = upper;
        self.upper[j * n + i] = upper;
    }

    /// Triangle-inequality smoothing (Floyd-Warshall style).
    ///
    /// Upper bounds shrink to the shortest upper-bound path and lower bounds
    /// grow to what the triangle inequality implies.
    ///
    /// # Errors
    ///
    /// Returns [`EmbeddingError::BoundsContradiction`] for the first pair whose
    /// lower bound ends up above its upper bound.
    pub fn smooth(&mut self) -> Result<(), EmbeddingError> {
        let n = self.n;
        for k in 0..n {
            for i in 0..n {
                if i == k {
                    continue;
                }
                let u_ik = self.upper(i, k);
                let l_ik = self.lower(i, k);
                for j in (i + 1)..n {
                    if j == k {
                        continue;
                    }
                    let u_kj = self.upper(k, j);
                    let l_kj = self.lower(k, j);
                    let mut u_ij = self.upper(i, j);
                    let mut l_ij = self.lower(i, j);
                    if u_ij > u_ik + u_kj {
                        u_ij = u_ik + u_kj;
                    }
                    if l_ij < l_ik - u_kj {
                        l_ij = l_ik - u_kj;
                    } else if l_ij < l_kj - u_ik {
                        l_ij = l_kj - u_ik;
                    }
                    if l_ij - u_ij > SMOOTHING_TOLERANCE {
                        return Err(EmbeddingError::BoundsContradiction {
                            atom1: i + 1,
                            atom2: j + 1,
                        });
                    }
                    self.set(i, j, l_ij, u_ij);
                }
            }
        }
        Ok(())
    }
}

/// Which rule last fixed a pair, ordered by priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum PairLevel {
    Unset,
    OneFour,
    OneThree,
    OneTwo,
}

struct BoundsBuilder<'a> {
    molecule: &'a Molecule,
    params: &'a EmbedParams,
    atom_params: Vec<Option<&'static UffParams>>,
    hybrid: Vec<Hybridization>,
    bounds: BoundsMatrix,
    levels: Vec<PairLevel>,
}

impl<'a> BoundsBuilder<'a> {
    fn new(molecule: &'a Molecule, params: &'a EmbedParams) -> Self {
        let n = molecule.atom_count();
        let atom_params = (0..n)
            .map(|i| perception::uff_atom_type(molecule, i).and_then(params::uff_params))
            .collect();
        let hybrid = (0..n)
            .map(|i| perception::hybridization(molecule, i))
            .collect();
        Self {
            molecule,
            params,
            atom_params,
            hybrid,
            bounds: BoundsMatrix::new(n),
            levels: vec![PairLevel::Unset; n * n],
        }
    }

    fn level(&self, i: usize, j: usize) -> PairLevel {
        self.levels[i * self.bounds.n + j]
    }

    /// Sets a pair's bounds at `level`, widening to the union when the same
    /// rule applies through several paths and ignoring lower-priority rules.
    fn constrain(&mut self, i: usize, j: usize, lower: f64, upper: f64, level: PairLevel) {
        let current = self.level(i, j);
        if current > level {
            return;
        }
        let (lower, upper) = if current == level {
            (
                lower.min(self.bounds.lower(i, j)),
                upper.max(self.bounds.upper(i, j)),
            )
        } else {
            (lower, upper)
        };
        self.bounds.set(i, j, lower.max(0.0), upper);
        let n = self.bounds.n;
        self.levels[i * n + j] = level;
        self.levels[j * n + i] = level;
    }

    fn bond_length(&self, i: usize, j: usize) -> f64 {
        let order = self
            .molecule
            .bond_between(i, j)
            .map_or(BondOrder::Single, |b| b.order);
        match (self.atom_params[i], self.atom_params[j]) {
            (Some(a), Some(b)) => params::rest_length(a, b, order.valence_contribution()),
            _ => {
                let atoms = self.molecule.atoms();
                let single = atoms[i].element.covalent_radius() + atoms[j].element.covalent_radius();
                match order {
                    BondOrder::Single => single,
                    BondOrder::Aromatic => single * 0.93,
                    BondOrder::Double => single * 0.89,
                    BondOrder::Triple => single * 0.82,
                }
            }
        }
    }

    /// Ideal angle `i-center-k` in radians.
    fn ideal_angle(&self, i: usize, center: usize, k: usize) -> f64 {
        let mol = self.molecule;
        let degrees = if perception::ring_contains_path(mol, &[i, center, k], 3) {
            60.0
        } else if perception::ring_contains_path(mol, &[i, center, k], 4) {
            90.0
        } else if perception::ring_contains_path(mol, &[i, center, k], 5) {
            if self.hybrid[center] == Hybridization::Sp3 {
                105.0
            } else {
                108.0
            }
        } else {
            match (self.hybrid[center], self.atom_params[center]) {
                (Hybridization::Sp3, Some(p)) if mol.neighbors(center).len() <= 4 => p.theta0,
                (hybrid, _) => hybrid.ideal_angle(),
            }
        };
        degrees.to_radians()
    }

    fn angle_tolerance(&self, i: usize, center: usize, k: usize) -> f64 {
        let base = self.params.angle_tolerance.to_radians();
        if perception::ring_contains_path(self.molecule, &[i, center, k], 5) {
            base * 2.0
        } else {
            base
        }
    }

    fn set_one_two(&mut self) {
        for bond in self.molecule.bonds() {
            let r0 = self.bond_length(bond.atom1, bond.atom2);
            self.constrain(
                bond.atom1,
                bond.atom2,
                r0 - BOND_TOLERANCE,
                r0 + BOND_TOLERANCE,
                PairLevel::OneTwo,
            );
        }
    }

    fn set_one_three(&mut self) {
        let mol = self.molecule;
        for center in 0..mol.atom_count() {
            let neighbors = mol.neighbors(center);
            for (x, &i) in neighbors.iter().enumerate() {
                for &k in &neighbors[x + 1..] {
                    let theta = self.ideal_angle(i, center, k);
                    let tol = self.angle_tolerance(i, center, k);
                    let a = self.bond_length(i, center);
                    let b = self.bond_length(center, k);
                    let d = |t: f64| (a * a + b * b - 2.0 * a * b * t.cos()).sqrt();
                    let lower = d((theta - tol).max(0.0)) - BOND_TOLERANCE;
                    let upper = d((theta + tol).min(std::f64::consts::PI)) + BOND_TOLERANCE;
                    self.constrain(i, k, lower, upper, PairLevel::OneThree);
                }
            }
        }
    }

    /// `(cis, trans)` 1-4 distances for the path `i-j-k-l`.
    fn torsion_extremes(&self, i: usize, j: usize, k: usize, l: usize) -> (f64, f64) {
        let a = self.bond_length(i, j);
        let b = self.bond_length(j, k);
        let c = self.bond_length(k, l);
        let t1 = self.ideal_angle(i, j, k);
        let t2 = self.ideal_angle(j, k, l);
        // j at the origin, k on +x, i and l in the xy plane.
        let ix = a * t1.cos();
        let iy = a * t1.sin();
        let lx = b - c * t2.cos();
        let ly = c * t2.sin();
        let cis = ((lx - ix).powi(2) + (ly - iy).powi(2)).sqrt();
        let trans = ((lx - ix).powi(2) + (ly + iy).powi(2)).sqrt();
        (cis.min(trans), cis.max(trans))
    }

    /// Fixed 1-4 geometry from chemical knowledge: `Some(true)` for cis,
    /// `Some(false)` for trans, `None` when free rotation is allowed.
    fn known_torsion(&self, i: usize, j: usize, k: usize, l: usize) -> Option<bool> {
        let mol = self.molecule;
        let bond = mol.bond_between(j, k)?;
        let planar =
            self.hybrid[j] == Hybridization::Sp2 && self.hybrid[k] == Hybridization::Sp2;
        if !planar {
            return None;
        }
        if perception::ring_contains_path(mol, &[j, k], 6) {
            let i_in_ring = perception::ring_contains_path(mol, &[i, j, k], 6);
            let l_in_ring = perception::ring_contains_path(mol, &[j, k, l], 6);
            let same_ring = perception::ring_contains_path(mol, &[i, j, k, l], 6);
            return Some(same_ring || (!i_in_ring && !l_in_ring));
        }
        if bond.order == BondOrder::Double && mol.is_3d {
            let atoms = mol.atoms();
            let phi = dihedral_angle(
                &atoms[i].position,
                &atoms[j].position,
                &atoms[k].position,
                &atoms[l].position,
            )?;
            if (phi.cos()).abs() < 0.5 {
                return None;
            }
            return Some(phi.cos() > 0.0);
        }
        None
    }

    fn set_one_four(&mut self, distances: &[Vec<u32>]) {
        let mol = self.molecule;
        for bond in mol.bonds() {
            for (j, k) in [(bond.atom1, bond.atom2), (bond.atom2, bond.atom1)] {
                for &i in mol.neighbors(j).iter().filter(|&&i| i != k) {
                    for &l in mol.neighbors(k).iter().filter(|&&l| l != j && l != i) {
                        if i > l || distances[i][l] != 3 {
                            continue;
                        }
                        let (cis, trans) = self.torsion_extremes(i, j, k, l);
                        let known = if self.params.use_basic_knowledge {
                            self.known_torsion(i, j, k, l)
                        } else {
                            None
                        };
                        let (lower, upper) = match known {
                            Some(true) => (cis - TORSION_TOLERANCE, cis + TORSION_TOLERANCE),
                            Some(false) => (trans - TORSION_TOLERANCE, trans + TORSION_TOLERANCE),
                            None => (cis - TORSION_TOLERANCE, trans + TORSION_TOLERANCE),
                        };
                        self.constrain(i, l, lower, upper, PairLevel::OneFour);
                    }
                }
            }
        }
    }

    fn set_nonbonded(&mut self, distances: &[Vec<u32>], include_vdw: bool) {
        let atoms = self.molecule.atoms();
        let n = atoms.len();
        for i in 0..n {
            for j in (i + 1)..n {
                if self.level(i, j) != PairLevel::Unset {
                    continue;
                }
                let vdw_sum = atoms[i].element.vdw_radius() + atoms[j].element.vdw_radius();
                if distances[i][j] == UNREACHABLE {
                    let lower = if include_vdw { vdw_sum } else { 0.0 };
                    self.bounds.set(i, j, lower, vdw_sum + FRAGMENT_SPREAD);
                } else if include_vdw {
                    self.bounds.set(i, j, VDW_SCALE * vdw_sum, MAX_UPPER);
                }
            }
        }
    }

    fn build(mut self, include_vdw: bool) -> BoundsMatrix {
        let distances = perception::topological_distances(self.molecule);
        self.set_one_two();
        self.set_one_three();
        self.set_one_four(&distances);
        self.set_nonbonded(&distances, include_vdw);
        self.bounds
    }
}

/// Builds and smooths the bounds matrix of a molecule.
///
/// If the van der Waals lower bounds make the matrix contradictory (strained
/// ring systems), the matrix is rebuilt without them before giving up.
///
/// # Errors
///
/// Returns [`EmbeddingError::BoundsContradiction`] if even the purely bonded
/// constraints are inconsistent.
pub fn build_bounds(molecule: &Molecule, params: &EmbedParams) -> Result<BoundsMatrix, EmbeddingError> {
    let mut bounds = BoundsBuilder::new(molecule, params).build(true);
    match bounds.smooth() {
        Ok(()) => Ok(bounds),
        Err(err) => {
            debug!(name = %molecule.name, %err, "Retrying bounds without van der Waals limits.");
            let mut relaxed = BoundsBuilder::new(molecule, params).build(false);
            relaxed.smooth()?;
            Ok(relaxed)
        }
    }
}
