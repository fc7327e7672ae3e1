//! Data structures for molecule records.
//!
//! A [`molecule::Molecule`] owns its atoms, bonds, SDF data items and any number
//! of [`conformer::Conformer`] coordinate sets. Atoms and bonds are addressed by
//! their index in file order.

pub mod atom;
pub mod conformer;
pub mod molecule;
pub mod topology;
