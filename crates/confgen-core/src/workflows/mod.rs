//! # Workflows Module
//!
//! This module provides the high-level entry points of the library.
//!
//! ## Overview
//!
//! A workflow ties the [`crate::engine`] and [`crate::core`] layers together into
//! a complete procedure: it reads structure files, drives the geometry engine for
//! every molecule, writes the results and reports progress along the way.
//!
//! ## Architecture
//!
//! - **Conformer Generation** ([`generate`]) - Batch conformer generation over
//!   positionally paired input and output SDF files
//!
//! ## Usage
//!
//! ```ignore
//! use confgen::engine::config::ConformerConfigBuilder;
//! use confgen::engine::geometry::DistanceGeometryEngine;
//! use confgen::engine::progress::ProgressReporter;
//! use confgen::workflows::generate::{self, pair_paths, split_path_list};
//!
//! let pairs = pair_paths(split_path_list("a.sdf"), split_path_list("a_out.sdf"))?;
//! let config = ConformerConfigBuilder::new().num_conformers(3).build()?;
//! let report = generate::run(&pairs, &config, &DistanceGeometryEngine::new(), &ProgressReporter::new())?;
//! ```

pub mod generate;
