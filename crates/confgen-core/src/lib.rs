//! # confgen Core Library
//!
//! Batch generation of 3D conformers for small molecules stored in SDF files.
//!
//! ## Architectural Philosophy
//!
//! The library is designed with a strict three-layer architecture to ensure a clear separation of concerns,
//! making it modular, testable, and extensible.
//!
//! - **[`core`]: The Foundation.** Contains stateless data models (`Molecule`, `Conformer`),
//!   chemical perception, the UFF force field, the distance-geometry embedding and SDF I/O.
//!
//! - **[`engine`]: The Logic Core.** Defines the `GeometryEngine` seam the pipeline runs against,
//!   together with run configuration, error types and progress reporting.
//!
//! - **[`workflows`]: The Public API.** This is the highest-level, user-facing layer. It pairs
//!   input and output files and runs the parse, hydrogen addition, embedding and optimization
//!   pipeline over each pair.

pub mod core;
pub mod engine;
pub mod workflows;
