use nalgebra::Point3;
use std::fmt;

/// Identifier of a conformer, unique within its molecule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConformerId(pub u32);

impl fmt::Display for ConformerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One 3D coordinate assignment for all atoms of a molecule.
#[derive(Debug, Clone, PartialEq)]
pub struct Conformer {
    pub id: ConformerId,
    /// One position per atom, in the molecule's atom order.
    pub positions: Vec<Point3<f64>>,
    /// Force-field energy (kcal/mol) after optimization, if it was minimized.
    pub energy: Option<f64>,
}

impl Conformer {
    pub fn new(id: ConformerId, positions: Vec<Point3<f64>>) -> Self {
        Self {
            id,
            positions,
            energy: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_conformer_has_no_energy_until_minimized() {
        let conf = Conformer::new(
            ConformerId(2),
            vec![Point3::new(1.0, 2.0, 3.0), Point3::new(4.0, 5.0, 6.0)],
        );
        assert_eq!(conf.energy, None);
        assert_eq!(conf.positions.len(), 2);
        assert_eq!(conf.id.to_string(), "2");
    }

    #[test]
    fn conformer_ids_order_numerically() {
        let mut ids = vec![ConformerId(10), ConformerId(2), ConformerId(7)];
        ids.sort();
        assert_eq!(ids, vec![ConformerId(2), ConformerId(7), ConformerId(10)]);
    }
}
