//! # Engine Module
//!
//! The preparation stages that turn a freshly constructed
//! [`MoleculeSetup`](crate::core::models::setup::MoleculeSetup) into a rooted
//! tree of rigid bodies ready to be written as PDBQT.
//!
//! ## Overview
//!
//! Each stage mutates the shared setup in place, except the flexibility
//! builder, which returns a new setup carrying the tree. The order of the
//! stages is enforced by the [`state::PrepState`] machine and driven by
//! [`crate::workflows::prepare`].
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Preparer settings, TOML loading, validation and the
//!   default atom-type rules
//! - **Setup Construction** ([`registry`]) - Dispatch from a source-molecule kind to its
//!   setup constructor
//! - **Typing** ([`atom_typer`], [`bond_typer`]) - Atom type labels and rotatable bonds
//!   from substructure rules
//! - **Hydration** ([`hydrate`]) - Optional water pseudo-atoms on polar anchors
//! - **Macrocycles** ([`macrocycle`]) - Choice of ring bonds to open in large rings
//! - **Flexibility** ([`flexibility`]) - Rigid bodies, torsions and the rooted tree
//! - **Reactive Typing** ([`reactive`]) - Distance-graded labels around reactive atoms
//! - **State Tracking** ([`state`]) - The checked stage transitions
//! - **Error Handling** ([`error`]) - Preparation error kinds

pub mod atom_typer;
pub mod bond_typer;
pub mod config;
pub mod error;
pub mod flexibility;
pub mod hydrate;
pub mod macrocycle;
pub mod reactive;
pub mod registry;
pub mod state;

#[cfg(test)]
pub(crate) mod fixtures;
