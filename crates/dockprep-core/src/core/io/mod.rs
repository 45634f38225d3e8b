//! Provides input/output functionality for docking preparation.
//!
//! Reading is abstracted by [`traits::MoleculeReader`] so toolkits can plug in
//! their own formats; writing a prepared setup goes through [`pdbqt`], whose
//! output can be adapted for flexible receptor residues with [`flexres`].

pub mod flexres;
pub mod pdbqt;
pub mod traits;
