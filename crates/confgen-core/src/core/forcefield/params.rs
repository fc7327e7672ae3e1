use phf::{Map, phf_map};

/// Per-type parameters of the Universal Force Field (Rappé et al., 1992).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UffParams {
    /// Valence bond radius (Å).
    pub r1: f64,
    /// Natural valence angle (degrees).
    pub theta0: f64,
    /// Van der Waals distance (Å).
    pub x1: f64,
    /// Van der Waals well depth (kcal/mol).
    pub d1: f64,
    /// Effective charge used by stretch and bend force constants.
    pub z_star: f64,
    /// GMP electronegativity.
    pub chi: f64,
    /// Torsional barrier about sp3 centers (kcal/mol).
    pub v_sp3: f64,
    /// Torsional barrier about sp2 centers (kcal/mol).
    pub u_sp2: f64,
}

const fn p(
    r1: f64,
    theta0: f64,
    x1: f64,
    d1: f64,
    z_star: f64,
    chi: f64,
    v_sp3: f64,
    u_sp2: f64,
) -> UffParams {
    UffParams {
        r1,
        theta0,
        x1,
        d1,
        z_star,
        chi,
        v_sp3,
        u_sp2,
    }
}

static UFF_PARAMS: Map<&'static str, UffParams> = phf_map! {
    "H_" => p(0.354, 180.0, 2.886, 0.044, 0.712, 4.528, 0.0, 0.0),
    "Li" => p(1.336, 180.0, 2.451, 0.025, 1.000, 3.006, 0.0, 2.0),
    "Be3+2" => p(1.074, 109.47, 2.745, 0.085, 1.000, 4.877, 0.0, 2.0),
    "B_3" => p(0.838, 109.47, 4.083, 0.180, 1.755, 5.110, 0.0, 0.0),
    "B_2" => p(0.828, 120.0, 4.083, 0.180, 1.755, 5.110, 0.0, 0.0),
    "C_3" => p(0.757, 109.47, 3.851, 0.105, 1.912, 5.343, 2.119, 2.0),
    "C_R" => p(0.729, 120.0, 3.851, 0.105, 1.912, 5.343, 2.119, 2.0),
    "C_2" => p(0.732, 120.0, 3.851, 0.105, 1.912, 5.343, 2.119, 2.0),
    "C_1" => p(0.706, 180.0, 3.851, 0.105, 1.912, 5.343, 2.119, 2.0),
    "N_3" => p(0.700, 106.7, 3.660, 0.069, 2.544, 6.899, 0.450, 2.0),
    "N_R" => p(0.699, 120.0, 3.660, 0.069, 2.544, 6.899, 0.450, 2.0),
    "N_2" => p(0.685, 111.2, 3.660, 0.069, 2.544, 6.899, 0.450, 2.0),
    "N_1" => p(0.656, 180.0, 3.660, 0.069, 2.544, 6.899, 0.450, 2.0),
    "O_3" => p(0.658, 104.51, 3.500, 0.060, 2.300, 8.741, 0.018, 2.0),
    "O_R" => p(0.680, 110.0, 3.500, 0.060, 2.300, 8.741, 0.018, 2.0),
    "O_2" => p(0.634, 120.0, 3.500, 0.060, 2.300, 8.741, 0.018, 2.0),
    "O_1" => p(0.639, 180.0, 3.500, 0.060, 2.300, 8.741, 0.018, 2.0),
    "F_" => p(0.668, 180.0, 3.364, 0.050, 1.735, 10.874, 0.0, 0.0),
    "Na" => p(1.539, 180.0, 2.983, 0.030, 1.081, 2.843, 0.0, 1.25),
    "Mg3+2" => p(1.421, 109.47, 3.021, 0.111, 1.787, 3.951, 0.0, 1.25),
    "Al3" => p(1.244, 109.47, 4.499, 0.505, 1.792, 4.060, 0.0, 1.25),
    "Si3" => p(1.117, 109.47, 4.295, 0.402, 2.323, 4.168, 1.225, 1.25),
    "P_3+3" => p(1.101, 93.8, 4.147, 0.305, 2.863, 5.463, 2.400, 1.25),
    "P_3+5" => p(1.056, 109.47, 4.147, 0.305, 2.863, 5.463, 2.400, 1.25),
    "S_3+2" => p(1.064, 92.1, 4.035, 0.274, 2.703, 6.928, 0.484, 1.25),
    "S_3+4" => p(1.049, 103.2, 4.035, 0.274, 2.703, 6.928, 0.484, 1.25),
    "S_3+6" => p(1.027, 109.47, 4.035, 0.274, 2.703, 6.928, 0.484, 1.25),
    "S_R" => p(1.077, 92.2, 4.035, 0.274, 2.703, 6.928, 0.484, 1.25),
    "S_2" => p(0.854, 120.0, 4.035, 0.274, 2.703, 6.928, 0.484, 1.25),
    "Cl" => p(1.044, 180.0, 3.947, 0.227, 2.348, 8.564, 0.0, 0.0),
    "K_" => p(1.953, 180.0, 3.812, 0.035, 1.165, 2.421, 0.0, 0.7),
    "Ca6+2" => p(1.761, 90.0, 3.399, 0.238, 2.141, 3.231, 0.0, 0.7),
    "Zn3+2" => p(1.193, 109.47, 2.763, 0.124, 1.308, 5.106, 0.0, 0.7),
    "Se3+2" => p(1.190, 90.6, 4.205, 0.291, 2.764, 6.428, 0.335, 0.7),
    "Br" => p(1.192, 180.0, 4.189, 0.251, 2.519, 7.790, 0.0, 0.0),
    "I_" => p(1.382, 180.0, 4.500, 0.339, 2.650, 6.822, 0.0, 0.0),
};

/// Looks up the parameters of a type label such as `"C_3"` or `"N_R"`.
pub fn uff_params(label: &str) -> Option<&'static UffParams> {
    UFF_PARAMS.get(label)
}

const BOND_ORDER_CORRECTION: f64 = 0.1332;

/// Natural bond length between two typed atoms (bond radii corrected for bond
/// order and electronegativity).
pub fn rest_length(a: &UffParams, b: &UffParams, bond_order: f64) -> f64 {
    let r_bo = -BOND_ORDER_CORRECTION * (a.r1 + b.r1) * bond_order.ln();
    let chi_term = (a.chi.sqrt() - b.chi.sqrt()).powi(2);
    let r_en = a.r1 * b.r1 * chi_term / (a.chi * a.r1 + b.chi * b.r1);
    a.r1 + b.r1 + r_bo - r_en
}

/// Harmonic stretch constant (kcal/mol/Å²) for a bond of natural length `r0`.
pub fn bond_force_constant(a: &UffParams, b: &UffParams, r0: f64) -> f64 {
    664.12 * a.z_star * b.z_star / r0.powi(3)
}

/// Bend constant (kcal/mol/rad²) for the angle `a-center-c`.
pub fn angle_force_constant(
    a: &UffParams,
    center: &UffParams,
    c: &UffParams,
    r_ab: f64,
    r_bc: f64,
) -> f64 {
    let cos_theta0 = center.theta0.to_radians().cos();
    let r_ac_sq = r_ab * r_ab + r_bc * r_bc - 2.0 * r_ab * r_bc * cos_theta0;
    let r_ac = r_ac_sq.sqrt();
    let beta = 664.12 / (r_ab * r_bc);
    beta * a.z_star * c.z_star / r_ac.powi(5)
        * r_ab
        * r_bc
        * (3.0 * r_ab * r_bc * (1.0 - cos_theta0 * cos_theta0) - r_ac_sq * cos_theta0)
}

/// Lennard-Jones `(r_min, well_depth)` for a nonbonded pair.
pub fn vdw_pair(a: &UffParams, b: &UffParams) -> (f64, f64) {
    ((a.x1 * b.x1).sqrt(), (a.d1 * b.d1).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_returns_known_types_only() {
        assert!(uff_params("C_3").is_some());
        assert!(uff_params("N_R").is_some());
        assert!(uff_params("Fe3+2").is_none());
    }

    #[test]
    fn carbon_single_bond_length_is_about_one_and_a_half_angstroms() {
        let c3 = uff_params("C_3").unwrap();
        let r0 = rest_length(c3, c3, 1.0);
        assert!((r0 - 1.514).abs() < 1e-9);
    }

    #[test]
    fn double_bonds_are_shorter_than_single_bonds() {
        let c2 = uff_params("C_2").unwrap();
        assert!(rest_length(c2, c2, 2.0) < rest_length(c2, c2, 1.0));
        let r0 = rest_length(c2, c2, 2.0);
        assert!(r0 > 1.30 && r0 < 1.36, "C=C was {r0}");
    }

    #[test]
    fn electronegativity_shortens_polar_bonds() {
        let c3 = uff_params("C_3").unwrap();
        let o3 = uff_params("O_3").unwrap();
        let r0 = rest_length(c3, o3, 1.0);
        assert!(r0 < c3.r1 + o3.r1);
        assert!(r0 > 1.38 && r0 < 1.44, "C-O was {r0}");
    }

    #[test]
    fn force_constants_are_positive() {
        let c3 = uff_params("C_3").unwrap();
        let h = uff_params("H_").unwrap();
        let r_ch = rest_length(c3, h, 1.0);
        assert!(bond_force_constant(c3, h, r_ch) > 300.0);
        assert!(angle_force_constant(h, c3, h, r_ch, r_ch) > 0.0);
    }

    #[test]
    fn vdw_pair_uses_geometric_means() {
        let c3 = uff_params("C_3").unwrap();
        let (r, d) = vdw_pair(c3, c3);
        assert!((r - 3.851).abs() < 1e-12);
        assert!((d - 0.105).abs() < 1e-12);
    }
}
