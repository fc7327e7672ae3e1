//! # Engine Module
//!
//! This module holds the stateful side of conformer generation: the geometry
//! engine seam, run configuration, error types and progress reporting.
//!
//! ## Overview
//!
//! The batch runner in [`crate::workflows`] never calls the chemistry code in
//! [`crate::core`] directly. It goes through the [`geometry::GeometryEngine`]
//! trait, whose bundled implementation [`geometry::DistanceGeometryEngine`]
//! combines hydrogen addition, distance-geometry embedding and UFF minimization.
//!
//! ## Architecture
//!
//! - **Geometry Engine** ([`geometry`]) - Hydrogen addition, embedding and optimization behind one trait
//! - **Configuration** ([`config`]) - Conformer counts, energy window, embedding and minimizer settings
//! - **Progress Monitoring** ([`progress`]) - Per-file and per-molecule progress callbacks
//! - **Error Handling** ([`error`]) - Engine-level errors wrapping each core layer

pub mod config;
pub mod error;
pub mod geometry;
pub mod progress;
