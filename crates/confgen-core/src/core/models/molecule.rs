use super::atom::Atom;
use super::conformer::{Conformer, ConformerId};
use super::topology::{Bond, BondOrder};
use nalgebra::Point3;

/// Represents one molecule record: its graph, header lines, data items and conformers.
///
/// Atoms and bonds are stored in file order and addressed by index, which keeps
/// the mapping to the atom and bond blocks of a structure file trivial. A
/// cached adjacency list is kept in sync by [`Molecule::add_bond`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Molecule {
    /// Title line of the record (first header line).
    pub name: String,
    /// Free-text comment line (third header line).
    pub comment: String,
    /// Whether the record declared or contained 3D coordinates.
    pub is_3d: bool,
    /// Data items (`>  <name>` blocks) in file order.
    pub properties: Vec<(String, String)>,
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    adjacency: Vec<Vec<usize>>,
    conformers: Vec<Conformer>,
}

impl Molecule {
    /// Creates an empty molecule with the given title.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Appends an atom and returns its index.
    pub fn add_atom(&mut self, atom: Atom) -> usize {
        self.atoms.push(atom);
        self.adjacency.push(Vec::new());
        self.atoms.len() - 1
    }

    /// Adds a bond between two existing atoms.
    ///
    /// # Arguments
    ///
    /// * `atom1` - Index of the first atom.
    /// * `atom2` - Index of the second atom.
    /// * `order` - The bond order.
    ///
    /// # Return
    ///
    /// Returns the index of the new bond, or `None` if an index is out of range,
    /// the atoms are identical, or the bond already exists.
    pub fn add_bond(&mut self, atom1: usize, atom2: usize, order: BondOrder) -> Option<usize> {
        self.push_bond(Bond::new(atom1, atom2, order))
    }

    /// Adds a fully specified bond (including its stereo column).
    pub fn push_bond(&mut self, bond: Bond) -> Option<usize> {
        let (a, b) = (bond.atom1, bond.atom2);
        if a == b || a >= self.atoms.len() || b >= self.atoms.len() {
            return None;
        }
        if self.bond_between(a, b).is_some() {
            return None;
        }
        self.bonds.push(bond);
        self.adjacency[a].push(b);
        self.adjacency[b].push(a);
        Some(self.bonds.len() - 1)
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn atom(&self, index: usize) -> Option<&Atom> {
        self.atoms.get(index)
    }

    pub fn atom_mut(&mut self, index: usize) -> Option<&mut Atom> {
        self.atoms.get_mut(index)
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn bond_count(&self) -> usize {
        self.bonds.len()
    }

    /// Indices of atoms bonded to `index`, in bond insertion order.
    pub fn neighbors(&self, index: usize) -> &[usize] {
        self.adjacency.get(index).map_or(&[], Vec::as_slice)
    }

    /// Finds the bond connecting two atoms, regardless of direction.
    pub fn bond_between(&self, a: usize, b: usize) -> Option<&Bond> {
        if a >= self.adjacency.len() || !self.adjacency[a].contains(&b) {
            return None;
        }
        self.bonds.iter().find(|bond| bond.contains(a) && bond.contains(b))
    }

    /// Iterates `(neighbor, bond)` pairs around an atom.
    pub fn bonds_of(&self, index: usize) -> impl Iterator<Item = (usize, &Bond)> {
        self.bonds
            .iter()
            .filter_map(move |bond| bond.partner(index).map(|other| (other, bond)))
    }

    /// Sum of bond valence contributions around an atom (aromatic bonds count 1.5).
    pub fn explicit_valence(&self, index: usize) -> f64 {
        self.bonds_of(index)
            .map(|(_, bond)| bond.order.valence_contribution())
            .sum()
    }

    pub fn total_charge(&self) -> i32 {
        self.atoms.iter().map(|a| a.formal_charge as i32).sum()
    }

    /// Positions stored on the atoms themselves (the record's own coordinates).
    pub fn input_positions(&self) -> Vec<Point3<f64>> {
        self.atoms.iter().map(|a| a.position).collect()
    }

    pub fn conformers(&self) -> &[Conformer] {
        &self.conformers
    }

    pub fn conformer(&self, id: ConformerId) -> Option<&Conformer> {
        self.conformers.iter().find(|c| c.id == id)
    }

    pub fn conformer_mut(&mut self, id: ConformerId) -> Option<&mut Conformer> {
        self.conformers.iter_mut().find(|c| c.id == id)
    }

    /// Attaches a new conformer and returns its id.
    ///
    /// Ids are assigned as one past the largest existing id, so they stay
    /// unique within the molecule.
    ///
    /// # Panics
    ///
    /// Panics if `positions` does not hold exactly one point per atom.
    pub fn add_conformer(&mut self, positions: Vec<Point3<f64>>) -> ConformerId {
        assert_eq!(
            positions.len(),
            self.atoms.len(),
            "conformer must provide one position per atom"
        );
        let id = ConformerId(
            self.conformers
                .iter()
                .map(|c| c.id.0 + 1)
                .max()
                .unwrap_or(0),
        );
        self.conformers.push(Conformer::new(id, positions));
        id
    }

    pub fn clear_conformers(&mut self) {
        self.conformers.clear();
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Element;

    fn ethanol_heavy_atoms() -> Molecule {
        let mut mol = Molecule::new("ethanol");
        let c1 = mol.add_atom(Atom::new(Element::C, Point3::new(0.0, 0.0, 0.0)));
        let c2 = mol.add_atom(Atom::new(Element::C, Point3::new(1.5, 0.0, 0.0)));
        let o = mol.add_atom(Atom::new(Element::O, Point3::new(2.0, 1.4, 0.0)));
        mol.add_bond(c1, c2, BondOrder::Single).unwrap();
        mol.add_bond(c2, o, BondOrder::Single).unwrap();
        mol
    }

    #[test]
    fn add_bond_updates_adjacency_in_both_directions() {
        let mol = ethanol_heavy_atoms();
        assert_eq!(mol.neighbors(0), &[1]);
        assert_eq!(mol.neighbors(1), &[0, 2]);
        assert_eq!(mol.neighbors(2), &[1]);
        assert!(mol.bond_between(2, 1).is_some());
        assert!(mol.bond_between(0, 2).is_none());
    }

    #[test]
    fn add_bond_rejects_duplicates_self_loops_and_out_of_range() {
        let mut mol = ethanol_heavy_atoms();
        assert_eq!(mol.add_bond(1, 0, BondOrder::Double), None);
        assert_eq!(mol.add_bond(1, 1, BondOrder::Single), None);
        assert_eq!(mol.add_bond(0, 9, BondOrder::Single), None);
        assert_eq!(mol.bond_count(), 2);
    }

    #[test]
    fn explicit_valence_sums_bond_orders() {
        let mut mol = ethanol_heavy_atoms();
        let c3 = mol.add_atom(Atom::new(Element::C, Point3::origin()));
        mol.add_bond(0, c3, BondOrder::Aromatic).unwrap();
        assert_eq!(mol.explicit_valence(1), 2.0);
        assert_eq!(mol.explicit_valence(0), 2.5);
    }

    #[test]
    fn conformer_ids_are_unique_and_sequential() {
        let mut mol = ethanol_heavy_atoms();
        let a = mol.add_conformer(mol.input_positions());
        let b = mol.add_conformer(mol.input_positions());
        assert_eq!((a, b), (ConformerId(0), ConformerId(1)));

        let c = mol.add_conformer(mol.input_positions());
        assert_eq!(c, ConformerId(2));
        assert_eq!(mol.conformers().len(), 3);

        mol.clear_conformers();
        assert_eq!(mol.add_conformer(mol.input_positions()), ConformerId(0));
    }

    #[test]
    #[should_panic(expected = "one position per atom")]
    fn add_conformer_rejects_wrong_length() {
        let mut mol = ethanol_heavy_atoms();
        mol.add_conformer(vec![Point3::origin()]);
    }

    #[test]
    fn property_lookup_returns_first_match() {
        let mut mol = Molecule::new("m");
        mol.properties.push(("ID".into(), "42".into()));
        assert_eq!(mol.property("ID"), Some("42"));
        assert_eq!(mol.property("missing"), None);
    }
}
