//! Reading and writing molecular structure files.
//!
//! The [`traits::StructureFile`] trait describes a multi-record format; the
//! SDF (MDL V2000) implementation in [`sdf`] is the one used by the batch
//! runner.

pub mod sdf;
pub mod traits;
