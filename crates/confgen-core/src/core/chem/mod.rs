//! Chemical perception on molecule graphs.
//!
//! Valence rules decide how many hydrogens an atom implicitly carries,
//! [`hydrogens`] makes them explicit, and [`perception`] derives the
//! hybridization, force field atom types and ring membership that embedding
//! and optimization depend on.

pub mod hydrogens;
pub mod perception;
pub mod valence;
