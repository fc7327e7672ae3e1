use std::ops::{Add, AddAssign};

/// Force field energy split by interaction type, in kcal/mol.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnergyTerm {
    pub bond: f64,
    pub angle: f64,
    pub torsion: f64,
    pub vdw: f64,
}

impl EnergyTerm {
    pub fn new(bond: f64, angle: f64, torsion: f64, vdw: f64) -> Self {
        Self {
            bond,
            angle,
            torsion,
            vdw,
        }
    }

    #[inline]
    pub fn total(&self) -> f64 {
        self.bond + self.angle + self.torsion + self.vdw
    }

    pub fn is_finite(&self) -> bool {
        self.total().is_finite()
    }
}

impl Add for EnergyTerm {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            bond: self.bond + rhs.bond,
            angle: self.angle + rhs.angle,
            torsion: self.torsion + rhs.torsion,
            vdw: self.vdw + rhs.vdw,
        }
    }
}

impl AddAssign for EnergyTerm {
    fn add_assign(&mut self, rhs: Self) {
        self.bond += rhs.bond;
        self.angle += rhs.angle;
        self.torsion += rhs.torsion;
        self.vdw += rhs.vdw;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_returns_sum_of_all_terms() {
        let term = EnergyTerm::new(1.5, -2.0, 0.25, 0.25);
        assert_eq!(term.total(), 0.0);
    }

    #[test]
    fn add_sums_each_field_correctly() {
        let a = EnergyTerm::new(1.0, 2.0, 3.0, 4.0);
        let b = EnergyTerm::new(4.0, 5.0, 6.0, 7.0);
        assert_eq!(a + b, EnergyTerm::new(5.0, 7.0, 9.0, 11.0));
    }

    #[test]
    fn add_assign_accumulates_each_field_correctly() {
        let mut a = EnergyTerm::new(1.0, 2.0, 3.0, 4.0);
        a += EnergyTerm::new(4.0, 5.0, 6.0, 7.0);
        assert_eq!(a, EnergyTerm::new(5.0, 7.0, 9.0, 11.0));
    }

    #[test]
    fn default_initializes_all_fields_to_zero() {
        assert_eq!(EnergyTerm::default(), EnergyTerm::new(0.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn non_finite_components_are_detected() {
        assert!(EnergyTerm::new(1.0, 0.0, 0.0, 0.0).is_finite());
        assert!(!EnergyTerm::new(f64::NAN, 0.0, 0.0, 0.0).is_finite());
        assert!(!EnergyTerm::new(0.0, 0.0, 0.0, f64::INFINITY).is_finite());
    }
}
