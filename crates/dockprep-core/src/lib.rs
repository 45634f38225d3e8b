//! # dockprep Core Library
//!
//! Prepares small molecules for docking: it turns a 3D structure into a tree
//! of rigid bodies joined by rotatable bonds and writes it as PDBQT.
//!
//! ## Architectural Philosophy
//!
//! The library keeps the same layered split throughout, so each layer can be
//! tested on its own and the chemistry toolkit can be swapped out.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`MoleculeSetup`,
//!   `FlexTree`), geometry helpers and the PDBQT writer.
//!
//! - **[`toolkit`]: The Chemistry Collaborator.** A built-in molecule graph with
//!   an SDF reader, ring perception, a SMARTS matcher and Gasteiger charges. The
//!   pipeline only sees it through the `SourceMolecule` and `SubstructureSearch`
//!   traits.
//!
//! - **[`engine`]: The Logic Core.** The preparation stages: typing, terminal
//!   atom merging, bond typing, hydration, macrocycle opening and the
//!   flexibility builder, plus configuration and errors.
//!
//! - **[`workflows`]: The Public API.** The `prepare` function running the whole
//!   pipeline, and `MoleculePreparation`, a reusable preparer with PDBQT output.

pub mod core;
pub mod engine;
pub mod toolkit;
pub mod workflows;
