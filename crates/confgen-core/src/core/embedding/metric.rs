use super::bounds::BoundsMatrix;
use nalgebra::{DMatrix, Point3, SymmetricEigen};
use rand::Rng;

/// Eigenvalues below this are treated as a collapsed dimension.
const EIGEN_EPSILON: f64 = 1e-3;
/// Half-width of the random offsets that replace a collapsed dimension.
const JITTER: f64 = 0.1;

/// Draws a symmetric distance matrix with each entry uniform within its bounds.
pub fn random_distances<R: Rng + ?Sized>(bounds: &BoundsMatrix, rng: &mut R) -> DMatrix<f64> {
    let n = bounds.len();
    let mut distances = DMatrix::zeros(n, n);
    for i in 0..n {
        for j in (i + 1)..n {
            let (lower, upper) = (bounds.lower(i, j), bounds.upper(i, j));
            let d = lower + rng.r#gen::<f64>() * (upper - lower).max(0.0);
            distances[(i, j)] = d;
            distances[(j, i)] = d;
        }
    }
    distances
}

/// Builds the metric (Gram) matrix of a distance matrix, centered on the
/// centroid of the points.
fn metric_matrix(distances: &DMatrix<f64>) -> DMatrix<f64> {
    let n = distances.nrows();
    let nf = n as f64;
    let squared = distances.map(|d| d * d);

    let mut pair_sum = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            pair_sum += squared[(i, j)];
        }
    }
    let centroid_sq: Vec<f64> = (0..n)
        .map(|i| squared.row(i).sum() / nf - pair_sum / (nf * nf))
        .collect();

    DMatrix::from_fn(n, n, |i, j| {
        0.5 * (centroid_sq[i] + centroid_sq[j] - squared[(i, j)])
    })
}

/// Recovers 3D coordinates from a distance matrix via its three largest
/// metric-matrix eigenpairs.
///
/// # Return
///
/// Returns `None` if the largest eigenvalue is not positive, which happens when
/// the sampled distances are far from any Euclidean arrangement. Dimensions with
/// a vanishing eigenvalue (planar or linear samples) are filled with small random
/// offsets so refinement can leave the degenerate subspace.
pub fn embed_distances<R: Rng + ?Sized>(
    distances: &DMatrix<f64>,
    rng: &mut R,
) -> Option<Vec<Point3<f64>>> {
    let n = distances.nrows();
    match n {
        0 => return Some(Vec::new()),
        1 => return Some(vec![Point3::origin()]),
        _ => {}
    }

    let eigen = SymmetricEigen::new(metric_matrix(distances));
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

    let largest = eigen.eigenvalues[order[0]];
    if !(largest > 0.0) {
        return None;
    }

    let mut coords = vec![[0.0; 3]; n];
    for (dim, &k) in order.iter().take(3).enumerate() {
        let value = eigen.eigenvalues[k];
        if value > EIGEN_EPSILON {
            let scale = value.sqrt();
            for (i, c) in coords.iter_mut().enumerate() {
                c[dim] = scale * eigen.eigenvectors[(i, k)];
            }
        } else {
            for c in coords.iter_mut() {
                c[dim] = rng.gen_range(-JITTER..JITTER);
            }
        }
    }
    Some(coords.into_iter().map(|[x, y, z]| Point3::new(x, y, z)).collect())
}
