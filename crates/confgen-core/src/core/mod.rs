//! # Core Module
//!
//! This module provides the fundamental building blocks and algorithms for
//! small-molecule conformer generation, serving as the computational core of
//! the library.
//!
//! ## Overview
//!
//! The core module holds the stateless parts of the pipeline: the molecule data
//! model, structure-file I/O, chemical perception, the force field and the
//! distance-geometry embedding. Nothing here knows about batches of files or
//! user configuration; that is left to [`crate::engine`] and [`crate::workflows`].
//!
//! ## Architecture
//!
//! - **Molecular Representation** ([`models`]) - Atoms, bonds, molecules and their conformers
//! - **File I/O** ([`io`]) - Multi-record SDF reading and writing
//! - **Chemical Perception** ([`chem`]) - Valence rules, hybridization, rings and hydrogen addition
//! - **Energy Calculations** ([`forcefield`]) - UFF-style energy model and local minimization
//! - **Coordinate Generation** ([`embedding`]) - Distance-geometry embedding of conformers
//! - **Geometry Utilities** ([`utils`]) - Placement vectors, angles, RMSD and superposition

pub mod chem;
pub mod embedding;
pub mod forcefield;
pub mod io;
pub mod models;
pub mod utils;
