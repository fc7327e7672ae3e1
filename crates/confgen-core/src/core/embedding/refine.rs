use super::bounds::BoundsMatrix;
use crate::core::chem::perception::{self, Hybridization};
use crate::core::forcefield::minimize::{self, MinimizerSettings, Objective};
use crate::core::models::molecule::Molecule;
use crate::core::utils::geometry::signed_volume;
use nalgebra::{Point3, Vector3};

const CHIRAL_MIN_VOLUME: f64 = 0.5;
const CHIRAL_MAX_VOLUME: f64 = 100.0;
/// Smallest unit-vector volume for a center to count as stereo-defined.
const PLANARITY_THRESHOLD: f64 = 0.1;

const REFINE_SETTINGS: MinimizerSettings = MinimizerSettings {
    max_iterations: 400,
    energy_tolerance: 1e-7,
    gradient_tolerance: 1e-4,
};

/// A tetrahedral center whose handedness must match the input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChiralConstraint {
    pub center: usize,
    pub neighbors: [usize; 3],
    /// `+1.0` or `-1.0`, the sign of the input's signed volume.
    pub sign: f64,
}

impl ChiralConstraint {
    fn volume(&self, positions: &[Point3<f64>]) -> f64 {
        let [a, b, c] = self.neighbors;
        signed_volume(&positions[self.center], &positions[a], &positions[b], &positions[c])
    }

    fn target(&self) -> (f64, f64) {
        if self.sign > 0.0 {
            (CHIRAL_MIN_VOLUME, CHIRAL_MAX_VOLUME)
        } else {
            (-CHIRAL_MAX_VOLUME, -CHIRAL_MIN_VOLUME)
        }
    }

    pub fn is_satisfied(&self, positions: &[Point3<f64>]) -> bool {
        self.volume(positions) * self.sign > 0.0
    }
}

/// Finds the tetrahedral centers whose handedness is defined by a 3D input.
///
/// Only sp3 atoms with four neighbors and at most one hydrogen qualify, and only
/// when the input geometry is clearly non-planar around them.
pub fn chiral_centers(molecule: &Molecule) -> Vec<ChiralConstraint> {
    if !molecule.is_3d {
        return Vec::new();
    }
    let atoms = molecule.atoms();
    (0..molecule.atom_count())
        .filter_map(|center| {
            let neighbors = molecule.neighbors(center);
            if neighbors.len() != 4 || perception::hybridization(molecule, center) != Hybridization::Sp3 {
                return None;
            }
            if neighbors.iter().filter(|&&n| atoms[n].is_hydrogen()).count() > 1 {
                return None;
            }
            let origin = atoms[center].position;
            let unit = |n: usize| {
                let v = atoms[n].position - origin;
                let norm = v.norm();
                (norm > 1e-6).then(|| origin + v / norm)
            };
            let (a, b, c) = (unit(neighbors[0])?, unit(neighbors[1])?, unit(neighbors[2])?);
            let volume = signed_volume(&origin, &a, &b, &c);
            (volume.abs() > PLANARITY_THRESHOLD).then(|| ChiralConstraint {
                center,
                neighbors: [neighbors[0], neighbors[1], neighbors[2]],
                sign: volume.signum(),
            })
        })
        .collect()
}

/// Distance-geometry error function: squared bound violations plus chiral
/// volume penalties.
pub struct DistanceViolation<'a> {
    bounds: &'a BoundsMatrix,
    chiral: &'a [ChiralConstraint],
}

impl<'a> DistanceViolation<'a> {
    pub fn new(bounds: &'a BoundsMatrix, chiral: &'a [ChiralConstraint]) -> Self {
        Self { bounds, chiral }
    }
}

#[inline]
fn point(x: &[f64], i: usize) -> Vector3<f64> {
    Vector3::new(x[3 * i], x[3 * i + 1], x[3 * i + 2])
}

#[inline]
fn accumulate(grad: &mut [f64], i: usize, g: &Vector3<f64>) {
    grad[3 * i] += g.x;
    grad[3 * i + 1] += g.y;
    grad[3 * i + 2] += g.z;
}

impl Objective for DistanceViolation<'_> {
    fn evaluate(&self, x: &[f64], grad: &mut [f64]) -> f64 {
        grad.fill(0.0);
        let n = self.bounds.len();
        let mut error = 0.0;

        for i in 0..n {
            let pi = point(x, i);
            for j in (i + 1)..n {
                let diff = pi - point(x, j);
                let d2 = diff.norm_squared();
                let upper = self.bounds.upper(i, j);
                let lower = self.bounds.lower(i, j);
                let u2 = upper * upper;
                let l2 = lower * lower;
                let g = if d2 > u2 {
                    let f = d2 / u2 - 1.0;
                    error += f * f;
                    diff * (4.0 * f / u2)
                } else if d2 < l2 {
                    let s = l2 + d2;
                    let f = 2.0 * l2 / s - 1.0;
                    error += f * f;
                    diff * (-8.0 * f * l2 / (s * s))
                } else {
                    continue;
                };
                accumulate(grad, i, &g);
                accumulate(grad, j, &-g);
            }
        }

        for constraint in self.chiral {
            let [a, b, c] = constraint.neighbors;
            let center = point(x, constraint.center);
            let p = point(x, a) - center;
            let q = point(x, b) - center;
            let r = point(x, c) - center;
            let volume = p.dot(&q.cross(&r));
            let (lower, upper) = constraint.target();
            let delta = if volume < lower {
                volume - lower
            } else if volume > upper {
                volume - upper
            } else {
                continue;
            };
            error += delta * delta;
            let scale = 2.0 * delta;
            let ga = q.cross(&r) * scale;
            let gb = r.cross(&p) * scale;
            let gc = p.cross(&q) * scale;
            accumulate(grad, a, &ga);
            accumulate(grad, b, &gb);
            accumulate(grad, c, &gc);
            accumulate(grad, constraint.center, &-(ga + gb + gc));
        }

        error
    }
}

/// Refines embedded coordinates against the bounds and chiral constraints.
///
/// If most chiral centers start out inverted the structure is mirrored first,
/// which is cheaper than inverting each center through a planar geometry.
///
/// # Return
///
/// The refined positions, or `None` if they are not finite or a chiral center
/// ends up with the wrong handedness.
pub fn refine(
    positions: Vec<Point3<f64>>,
    bounds: &BoundsMatrix,
    chiral: &[ChiralConstraint],
) -> Option<Vec<Point3<f64>>> {
    let inverted = chiral.iter().filter(|c| !c.is_satisfied(&positions)).count();
    let mut x: Vec<f64> = positions
        .iter()
        .flat_map(|p| {
            let sx = if 2 * inverted > chiral.len() { -p.x } else { p.x };
            [sx, p.y, p.z]
        })
        .collect();

    minimize::minimize(&DistanceViolation::new(bounds, chiral), &mut x, &REFINE_SETTINGS);

    if x.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let refined: Vec<Point3<f64>> = x
        .chunks_exact(3)
        .map(|c| Point3::new(c[0], c[1], c[2]))
        .collect();
    chiral
        .iter()
        .all(|c| c.is_satisfied(&refined))
        .then_some(refined)
}
