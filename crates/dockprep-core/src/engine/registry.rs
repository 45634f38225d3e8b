use super::error::PrepareError;
use crate::core::models::setup::MoleculeSetup;
use crate::toolkit::{Molecule, SourceMolecule, adapter};
use std::collections::HashMap;
use tracing::debug;

/// Options forwarded to every setup constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupOptions {
    pub keep_chorded_rings: bool,
    pub keep_equivalent_rings: bool,
    /// Conformer to take coordinates from; negative selects the default one.
    pub conformer_id: i32,
}

impl Default for SetupOptions {
    fn default() -> Self {
        Self {
            keep_chorded_rings: false,
            keep_equivalent_rings: false,
            conformer_id: -1,
        }
    }
}

pub type SetupConstructor =
    fn(&dyn SourceMolecule, &SetupOptions) -> Result<MoleculeSetup, PrepareError>;

/// Maps a source-molecule kind to the constructor that turns it into a setup.
#[derive(Debug, Clone)]
pub struct SetupRegistry {
    constructors: HashMap<&'static str, SetupConstructor>,
}

impl SetupRegistry {
    /// A registry with no constructors.
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// A registry knowing the built-in toolkit molecule.
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(Molecule::KIND, adapter::setup_from_molecule);
        registry
    }

    /// Registers `constructor` for `kind`, replacing any previous entry.
    pub fn register(&mut self, kind: &'static str, constructor: SetupConstructor) {
        self.constructors.insert(kind, constructor);
    }

    pub fn supports(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }

    pub fn construct(
        &self,
        mol: &dyn SourceMolecule,
        options: &SetupOptions,
    ) -> Result<MoleculeSetup, PrepareError> {
        let constructor =
            self.constructors
                .get(mol.kind())
                .ok_or_else(|| PrepareError::UnsupportedInput {
                    kind: mol.kind().to_string(),
                })?;
        debug!(kind = mol.kind(), "Constructing molecule setup");
        constructor(mol, options)
    }
}

impl Default for SetupRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolkit::{SubstructureSearch, ToolkitError};
    use std::any::Any;

    struct Foreign;

    impl SubstructureSearch for Foreign {
        fn find_matches(&self, _pattern: &str) -> Result<Vec<Vec<usize>>, ToolkitError> {
            Ok(Vec::new())
        }
    }

    impl SourceMolecule for Foreign {
        fn kind(&self) -> &'static str {
            "foreign.mol"
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_search(&self) -> &dyn SubstructureSearch {
            self
        }
    }

    #[test]
    fn unregistered_kind_is_unsupported_input() {
        let registry = SetupRegistry::default();
        let err = registry
            .construct(&Foreign, &SetupOptions::default())
            .unwrap_err();
        assert!(matches!(err, PrepareError::UnsupportedInput { kind } if kind == "foreign.mol"));
    }

    #[test]
    fn registered_constructor_is_dispatched_by_kind() {
        fn from_foreign(
            _mol: &dyn SourceMolecule,
            _options: &SetupOptions,
        ) -> Result<MoleculeSetup, PrepareError> {
            Ok(crate::core::models::setup::MoleculeSetupBuilder::new()
                .build()?)
        }
        let mut registry = SetupRegistry::empty();
        assert!(!registry.supports("foreign.mol"));
        registry.register("foreign.mol", from_foreign);
        let setup = registry
            .construct(&Foreign, &SetupOptions::default())
            .unwrap();
        assert_eq!(setup.atom_count(), 0);
        assert!(SetupRegistry::default().supports(Molecule::KIND));
    }
}
