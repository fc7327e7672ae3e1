use nalgebra::{Matrix3, Point3, Rotation3, Unit, Vector3};

const TETRAHEDRAL_ANGLE: f64 = 109.47;
const DEGENERATE_NORM: f64 = 1e-8;

/// Normalizes `v`, or returns `fallback` when `v` is too short to define a direction.
fn unit_or(v: Vector3<f64>, fallback: Vector3<f64>) -> Vector3<f64> {
    let norm = v.norm();
    if norm < DEGENERATE_NORM {
        fallback
    } else {
        v / norm
    }
}

/// Any unit vector perpendicular to `v`.
fn perpendicular(v: &Vector3<f64>) -> Vector3<f64> {
    let helper = if v.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    unit_or(helper - v * v.dot(&helper), Vector3::z())
}

fn neighbor_directions(base_pos: &Point3<f64>, neighbors: &[Point3<f64>]) -> Vec<Vector3<f64>> {
    neighbors
        .iter()
        .enumerate()
        .map(|(i, p)| {
            // Coincident input coordinates (e.g. an all-zero 2D block) still get distinct directions.
            let fallback = [Vector3::x(), Vector3::y(), Vector3::z()][i % 3];
            unit_or(p - base_pos, fallback)
        })
        .collect()
}

/// Ideal hydrogen positions around a tetrahedral center.
///
/// Returns `4 - neighbors.len()` positions, or an empty vector if the center
/// already has four or more neighbors.
pub fn generate_sp3_hydrogens(
    base_pos: &Point3<f64>,
    neighbors: &[Point3<f64>],
    bond_length: f64,
) -> Vec<Point3<f64>> {
    let neighbor_vecs = neighbor_directions(base_pos, neighbors);

    match neighbor_vecs.len() {
        0 => {
            let s = 1.0 / 3f64.sqrt();
            [
                Vector3::new(s, s, s),
                Vector3::new(s, -s, -s),
                Vector3::new(-s, s, -s),
                Vector3::new(-s, -s, s),
            ]
            .iter()
            .map(|d| base_pos + d * bond_length)
            .collect()
        }
        1 => {
            let n1 = neighbor_vecs[0];
            let temp_vec = perpendicular(&n1);

            let rot_axis = Unit::new_normalize(n1);
            let rot = Rotation3::from_axis_angle(&rot_axis, 120.0f64.to_radians());

            let h1_dir = Rotation3::from_axis_angle(
                &Unit::new_normalize(n1.cross(&temp_vec)),
                TETRAHEDRAL_ANGLE.to_radians(),
            ) * n1;
            let h1 = base_pos + h1_dir.normalize() * bond_length;
            let h2 = base_pos + (rot * (h1 - base_pos));
            let h3 = base_pos + (rot * (h2 - base_pos));
            vec![h1, h2, h3]
        }
        2 => {
            let n1 = neighbor_vecs[0];
            let n2 = neighbor_vecs[1];
            let bisector = unit_or(-(n1 + n2), perpendicular(&n1));
            let plane_normal = unit_or(n1.cross(&n2), perpendicular(&bisector));

            let half = (TETRAHEDRAL_ANGLE / 2.0).to_radians();
            let h1 = bisector * half.cos() + plane_normal * half.sin();
            let h2 = bisector * half.cos() - plane_normal * half.sin();
            vec![base_pos + h1 * bond_length, base_pos + h2 * bond_length]
        }
        3 => {
            let n1 = neighbor_vecs[0];
            let n2 = neighbor_vecs[1];
            let n3 = neighbor_vecs[2];
            let fallback = unit_or((n2 - n1).cross(&(n3 - n1)), Vector3::z());
            let h_dir = unit_or(-(n1 + n2 + n3), fallback);
            vec![base_pos + h_dir * bond_length]
        }
        _ => Vec::new(),
    }
}

/// Ideal hydrogen positions around a trigonal planar center.
///
/// With a single neighbor, `plane_ref` (typically a neighbor of that neighbor)
/// fixes the molecular plane so the new hydrogens stay coplanar with a double
/// bond's substituents.
pub fn generate_sp2_hydrogens(
    base_pos: &Point3<f64>,
    neighbors: &[Point3<f64>],
    plane_ref: Option<&Point3<f64>>,
    bond_length: f64,
) -> Vec<Point3<f64>> {
    let neighbor_vecs = neighbor_directions(base_pos, neighbors);

    let in_plane = |axis: Vector3<f64>, normal: Vector3<f64>, angle: f64| {
        Rotation3::from_axis_angle(&Unit::new_normalize(normal), angle.to_radians()) * axis
    };

    match neighbor_vecs.len() {
        0 => [0.0, 120.0, 240.0]
            .iter()
            .map(|&a| base_pos + in_plane(Vector3::x(), Vector3::z(), a) * bond_length)
            .collect(),
        1 => {
            let n1 = neighbor_vecs[0];
            let normal = plane_ref
                .and_then(|r| {
                    let v = r - (base_pos + n1);
                    let normal = n1.cross(&v);
                    (normal.norm() > DEGENERATE_NORM).then(|| normal.normalize())
                })
                .unwrap_or_else(|| perpendicular(&n1));
            vec![
                base_pos + in_plane(n1, normal, 120.0) * bond_length,
                base_pos + in_plane(n1, normal, -120.0) * bond_length,
            ]
        }
        2 => {
            let n1 = neighbor_vecs[0];
            let n2 = neighbor_vecs[1];
            let h_dir = unit_or(-(n1 + n2), perpendicular(&n1));
            vec![base_pos + h_dir * bond_length]
        }
        _ => Vec::new(),
    }
}

/// Ideal hydrogen positions around a linear center.
pub fn generate_sp_hydrogens(
    base_pos: &Point3<f64>,
    neighbors: &[Point3<f64>],
    bond_length: f64,
) -> Vec<Point3<f64>> {
    let neighbor_vecs = neighbor_directions(base_pos, neighbors);
    match neighbor_vecs.len() {
        0 => vec![
            base_pos + Vector3::x() * bond_length,
            base_pos - Vector3::x() * bond_length,
        ],
        1 => vec![base_pos - neighbor_vecs[0] * bond_length],
        _ => Vec::new(),
    }
}

/// Angle `a-b-c` at `b`, in radians.
pub fn bond_angle(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    let u = a - b;
    let v = c - b;
    let denom = u.norm() * v.norm();
    if denom < DEGENERATE_NORM {
        return 0.0;
    }
    (u.dot(&v) / denom).clamp(-1.0, 1.0).acos()
}

/// Dihedral angle `a-b-c-d` in radians, in `(-pi, pi]`, or `None` when three
/// consecutive points are collinear.
pub fn dihedral_angle(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
    d: &Point3<f64>,
) -> Option<f64> {
    let b1 = b - a;
    let b2 = c - b;
    let b3 = d - c;
    let n1 = b1.cross(&b2);
    let n2 = b2.cross(&b3);
    if n1.norm() < DEGENERATE_NORM || n2.norm() < DEGENERATE_NORM {
        return None;
    }
    let m1 = n1.cross(&b2.normalize());
    let x = n1.dot(&n2);
    let y = m1.dot(&n2);
    Some(y.atan2(x))
}

/// Signed volume spanned by three neighbors around a center.
pub fn signed_volume(
    center: &Point3<f64>,
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
) -> f64 {
    (a - center).dot(&(b - center).cross(&(c - center)))
}

pub fn calculate_rmsd(coords1: &[Point3<f64>], coords2: &[Point3<f64>]) -> Option<f64> {
    if coords1.len() != coords2.len() || coords1.is_empty() {
        return None;
    }
    let n = coords1.len() as f64;
    let squared_dist_sum: f64 = coords1
        .iter()
        .zip(coords2.iter())
        .map(|(p1, p2)| (p1 - p2).norm_squared())
        .sum();
    Some((squared_dist_sum / n).sqrt())
}

/// Optimal rigid superposition of `from_points` onto `to_points` (Kabsch).
///
/// # Return
///
/// The rotation and translation mapping `from` onto `to`, or `None` if the
/// point sets are empty or differ in length.
pub fn kabsch_superpose(
    from_points: &[Point3<f64>],
    to_points: &[Point3<f64>],
) -> Option<(Rotation3<f64>, Vector3<f64>)> {
    if from_points.is_empty() || from_points.len() != to_points.len() {
        return None;
    }
    let from_centroid_sum: Vector3<f64> = from_points.iter().map(|p| p.coords).sum();
    let from_centroid = Point3::from(from_centroid_sum / from_points.len() as f64);
    let to_centroid_sum: Vector3<f64> = to_points.iter().map(|p| p.coords).sum();
    let to_centroid = Point3::from(to_centroid_sum / to_points.len() as f64);

    let h = from_points
        .iter()
        .zip(to_points.iter())
        .fold(Matrix3::zeros(), |acc, (f, t)| {
            acc + (t - to_centroid) * (f - from_centroid).transpose()
        });

    let svd = h.svd(true, true);
    let (u, v_t) = (svd.u?, svd.v_t?);

    let d = (u * v_t).determinant();
    let mut correction = Matrix3::identity();
    if d < 0.0 {
        correction[(2, 2)] = -1.0;
    }

    let rotation = Rotation3::from_matrix_unchecked(u * correction * v_t);
    let translation = to_centroid.coords - rotation * from_centroid.coords;
    Some((rotation, translation))
}

/// RMSD between two coordinate sets after optimal superposition.
pub fn aligned_rmsd(coords1: &[Point3<f64>], coords2: &[Point3<f64>]) -> Option<f64> {
    let (rotation, translation) = kabsch_superpose(coords1, coords2)?;
    let moved: Vec<Point3<f64>> = coords1
        .iter()
        .map(|p| rotation * p + translation)
        .collect();
    calculate_rmsd(&moved, coords2)
}
