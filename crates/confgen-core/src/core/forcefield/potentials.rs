#[inline]
pub fn lennard_jones_12_6(dist: f64, r_min: f64, well_depth: f64) -> f64 {
    if dist < 1e-6 {
        return 1e10;
    }
    let rho = r_min / dist;
    let rho6 = rho.powi(6);
    let rho12 = rho6 * rho6;
    well_depth * (rho12 - 2.0 * rho6)
}

/// Radial derivative `dE/dr` of [`lennard_jones_12_6`].
#[inline]
pub fn lennard_jones_12_6_derivative(dist: f64, r_min: f64, well_depth: f64) -> f64 {
    if dist < 1e-6 {
        return -1e10;
    }
    let rho = r_min / dist;
    let rho6 = rho.powi(6);
    let rho12 = rho6 * rho6;
    -12.0 * well_depth * (rho12 - rho6) / dist
}

#[inline]
pub fn harmonic(value: f64, ideal: f64, force_constant: f64) -> f64 {
    let delta = value - ideal;
    0.5 * force_constant * delta * delta
}

#[inline]
pub fn harmonic_derivative(value: f64, ideal: f64, force_constant: f64) -> f64 {
    force_constant * (value - ideal)
}

/// Angle bend written in the cosine of the angle.
///
/// Near-linear natural angles use `K(1 + cos θ)`, all others the
/// cosine-harmonic `K/2 (cos θ - cos θ0)² / sin² θ0`, whose curvature at the
/// minimum matches a harmonic bend of constant `K`.
///
/// # Return
///
/// `(energy, dE/dcosθ)`.
#[inline]
pub fn cosine_angle(cos_theta: f64, theta0: f64, force_constant: f64) -> (f64, f64) {
    let sin_theta0_sq = theta0.sin().powi(2);
    if sin_theta0_sq < 1e-4 {
        return (
            force_constant * (1.0 + cos_theta),
            force_constant,
        );
    }
    let delta = cos_theta - theta0.cos();
    (
        0.5 * force_constant * delta * delta / sin_theta0_sq,
        force_constant * delta / sin_theta0_sq,
    )
}

/// Chebyshev polynomial `T_n(c) = cos(n φ)` for `c = cos φ`, with its derivative.
#[inline]
fn chebyshev(n: u8, c: f64) -> (f64, f64) {
    match n {
        1 => (c, 1.0),
        2 => (2.0 * c * c - 1.0, 4.0 * c),
        3 => (4.0 * c.powi(3) - 3.0 * c, 12.0 * c * c - 3.0),
        6 => {
            let c2 = c * c;
            (
                32.0 * c2 * c2 * c2 - 48.0 * c2 * c2 + 18.0 * c2 - 1.0,
                192.0 * c2 * c2 * c - 192.0 * c2 * c + 36.0 * c,
            )
        }
        _ => ((n as f64 * c.clamp(-1.0, 1.0).acos()).cos(), 0.0),
    }
}

/// Torsion `V/2 [1 - cos(n φ0) cos(n φ)]` as a function of `cos φ`.
///
/// # Return
///
/// `(energy, dE/dcosφ)`.
#[inline]
pub fn cosine_torsion(cos_phi: f64, barrier: f64, periodicity: u8, cos_n_phi0: f64) -> (f64, f64) {
    let (t, dt) = chebyshev(periodicity, cos_phi);
    (
        0.5 * barrier * (1.0 - cos_n_phi0 * t),
        -0.5 * barrier * cos_n_phi0 * dt,
    )
}
