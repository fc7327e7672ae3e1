//! # Force Field Module
//!
//! Molecular mechanics used to relax embedded conformers: a Universal Force
//! Field (UFF) parameter table, the potential functions with their analytic
//! derivatives, the per-molecule energy model and a generic local minimizer.
//!
//! ## Key Components
//!
//! - [`params`] - UFF atom type parameters and combination rules
//! - [`potentials`] - Stretch, bend, torsion and Lennard-Jones functional forms
//! - [`energy`] - [`energy::UffModel`], the typed interaction lists of one molecule
//! - [`minimize`] - The [`minimize::Objective`] trait and a conjugate-gradient minimizer
//! - [`term`] - Energy breakdown by interaction type
//!
//! ## Usage
//!
//! ```ignore
//! use confgen::core::forcefield::energy::UffModel;
//! use confgen::core::forcefield::minimize::MinimizerSettings;
//!
//! let model = UffModel::build(&molecule)?;
//! let outcome = model.optimize(&mut positions, &MinimizerSettings::default())?;
//! ```

pub mod energy;
pub mod minimize;
pub mod params;
pub(crate) mod potentials;
pub mod term;
