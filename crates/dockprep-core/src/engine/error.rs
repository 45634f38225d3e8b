use thiserror::Error;

use super::config::ConfigError;
use super::state::PrepState;
use crate::core::models::setup::SetupError;
use crate::toolkit::ToolkitError;

/// A requirement on the input molecule that was not met.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Precondition {
    #[error("molecule has no conformer with id {conformer_id}. Need 3D coordinates.")]
    NoConformer { conformer_id: i32 },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RingBreakError {
    #[error("bond ({a}, {b}) not in molsetup")]
    BondNotInSetup { a: usize, b: usize },

    #[error("missing glue pseudo for atom {atom}")]
    MissingGlue { atom: usize },

    #[error("expected 3 coordinates (got {got}) for glue pseudo of atom {atom}")]
    GlueArity { atom: usize, got: usize },

    #[error("bond ({a}, {b}) is not a ring bond")]
    NotARingBond { a: usize, b: usize },

    #[error("bond ({a}, {b}) is listed more than once")]
    DuplicateBreak { a: usize, b: usize },

    #[error("atom {atom} is an endpoint of more than one broken bond")]
    SharedEndpoint { atom: usize },

    #[error("cannot break {requested} ring bonds, at most {max} glue pairs are available")]
    TooManyBreaks { requested: usize, max: usize },
}

/// The rigid-body graph does not form a tree.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StructureError {
    #[error("torsion bond ({a}, {b}) joins atoms of the same rigid body")]
    Cycle { a: usize, b: usize },

    #[error("rigid-body graph has {edges} torsion edges for {bodies} bodies")]
    EdgeCount { edges: usize, bodies: usize },

    #[error("rigid-body graph is disconnected: {unreached} bodies not reachable from the root")]
    Disconnected { unreached: usize },
}

#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("Unsupported input: no setup constructor registered for molecule kind '{kind}'")]
    UnsupportedInput { kind: String },

    #[error("Precondition failed: {0}")]
    Precondition(#[from] Precondition),

    #[error("Configuration error: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Ring break error: {source}")]
    RingBreak {
        #[from]
        source: RingBreakError,
    },

    #[error("Structure error: {source}")]
    Structure {
        #[from]
        source: StructureError,
    },

    #[error("Toolkit error: {source}")]
    Toolkit {
        #[from]
        source: ToolkitError,
    },

    #[error("Setup error: {source}")]
    Setup {
        #[from]
        source: SetupError,
    },

    #[error("Invalid root atom {index}: {reason}")]
    InvalidRoot { index: usize, reason: String },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: PrepState, to: PrepState },

    #[error("Not implemented: {0}")]
    Unimplemented(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conformer_error_message_asks_for_coordinates() {
        let err = PrepareError::from(Precondition::NoConformer { conformer_id: -1 });
        assert!(err.to_string().ends_with("Need 3D coordinates."));
    }

    #[test]
    fn ring_break_messages_name_the_atoms() {
        assert_eq!(
            RingBreakError::BondNotInSetup { a: 3, b: 9 }.to_string(),
            "bond (3, 9) not in molsetup"
        );
        assert_eq!(
            RingBreakError::MissingGlue { atom: 4 }.to_string(),
            "missing glue pseudo for atom 4"
        );
        assert_eq!(
            RingBreakError::GlueArity { atom: 4, got: 2 }.to_string(),
            "expected 3 coordinates (got 2) for glue pseudo of atom 4"
        );
    }
}
