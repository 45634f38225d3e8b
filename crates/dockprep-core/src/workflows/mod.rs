//! # Workflows Module
//!
//! The public entry points that run the whole preparation pipeline.
//!
//! ## Overview
//!
//! [`prepare::prepare`] takes a toolkit molecule and a validated configuration
//! and returns a [`Preparation`](prepare::Preparation): the final setup with
//! its rigid-body tree, a success flag and a diagnostic log. It owns every
//! intermediate value and has no side effects beyond logging, so independent
//! molecules can be prepared in parallel.
//!
//! [`prepare::MoleculePreparation`] wraps the function for callers that want a
//! reusable preparer remembering its last result, and adds PDBQT output on top
//! of it.

pub mod prepare;
