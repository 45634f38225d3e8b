//! # Toolkit Module
//!
//! The built-in chemistry collaborator: a small molecule graph with conformers,
//! an MDL SDF reader, ring and aromaticity perception, a SMARTS subset with a
//! backtracking matcher, Gasteiger charges and a heavy-atom SMILES writer.
//!
//! The preparation engine never depends on [`Molecule`] directly. It sees
//! molecules through [`SourceMolecule`] and [`SubstructureSearch`], so another
//! toolkit can be registered with the setup registry without touching the
//! pipeline.

pub mod adapter;
pub mod aromaticity;
pub mod charges;
pub mod molecule;
pub mod rings;
pub mod sdf;
pub mod smarts;
pub mod smiles;

pub use molecule::{Conformer, Molecule, MoleculeBuilder};

use std::any::Any;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolkitError {
    #[error("Invalid SMARTS '{pattern}' at position {position}: {reason}")]
    InvalidSmarts {
        pattern: String,
        position: usize,
        reason: String,
    },
    #[error("Unsupported SMARTS feature '{feature}' in '{pattern}'")]
    UnsupportedSmarts { pattern: String, feature: String },
    #[error("Invalid molecule: {0}")]
    InvalidMolecule(String),
}

/// Pattern queries against a molecule.
pub trait SubstructureSearch {
    /// Returns every unique match of `pattern`, each as a tuple of atom indices
    /// ordered like the atoms of the pattern.
    fn find_matches(&self, pattern: &str) -> Result<Vec<Vec<usize>>, ToolkitError>;
}

/// A molecule object handed to the preparation pipeline by some toolkit.
pub trait SourceMolecule: SubstructureSearch {
    /// Registry key of the concrete molecule type.
    fn kind(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    fn as_search(&self) -> &dyn SubstructureSearch;
}
