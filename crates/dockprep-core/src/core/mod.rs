//! # Core Module
//!
//! Stateless building blocks shared by every preparation stage.
//!
//! ## Overview
//!
//! - **Preparation Graph** ([`models`]) - Atoms, bonds, rings, the [`MoleculeSetup`](models::setup::MoleculeSetup)
//!   aggregate and the rigid-body [`FlexTree`](models::flex::FlexTree)
//! - **File I/O** ([`io`]) - Reader/writer traits, the PDBQT torsion-tree writer and the
//!   flexible-residue adaptation
//! - **Utilities** ([`utils`]) - Geometry helpers used by hydration

pub mod io;
pub mod models;
pub mod utils;
