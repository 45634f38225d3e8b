use super::config::AtomTypeRule;
use super::error::PrepareError;
use crate::core::models::setup::MoleculeSetup;
use crate::toolkit::SubstructureSearch;
use tracing::debug;

/// Assigns a docking type label to the atoms of a setup.
pub trait AtomTyper {
    fn assign(
        &self,
        setup: &mut MoleculeSetup,
        mol: &dyn SubstructureSearch,
    ) -> Result<(), PrepareError>;
}

/// Applies SMARTS rules in order; a later rule overrides an earlier one.
#[derive(Debug, Clone)]
pub struct SmartsAtomTyper {
    rules: Vec<AtomTypeRule>,
}

impl SmartsAtomTyper {
    pub fn new(rules: Vec<AtomTypeRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[AtomTypeRule] {
        &self.rules
    }
}

impl AtomTyper for SmartsAtomTyper {
    fn assign(
        &self,
        setup: &mut MoleculeSetup,
        mol: &dyn SubstructureSearch,
    ) -> Result<(), PrepareError> {
        for rule in &self.rules {
            let matches = mol.find_matches(&rule.smarts)?;
            let position = rule.idx.saturating_sub(1);
            for hit in &matches {
                if let Some(&atom) = hit.get(position) {
                    setup.set_atom_type(atom, rule.atype.as_str());
                }
            }
            debug!(smarts = %rule.smarts, atype = %rule.atype, hits = matches.len(), "Applied atom type rule");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::default_atom_type_rules;
    use crate::engine::fixtures;

    fn types(input: &str) -> Vec<Option<String>> {
        let mol = fixtures::molecule(input);
        let mut setup = fixtures::setup(input);
        SmartsAtomTyper::new(default_atom_type_rules())
            .assign(&mut setup, &mol)
            .unwrap();
        setup.atoms().iter().map(|a| a.atom_type.clone()).collect()
    }

    fn label(types: &[Option<String>], i: usize) -> &str {
        types[i].as_deref().unwrap_or("-")
    }

    #[test]
    fn ethanol_gets_ad4_types() {
        // C0 C1 O2, then H: 3 on C0, 2 on C1, 1 on O2.
        let t = types("CCO");
        assert_eq!(label(&t, 0), "C");
        assert_eq!(label(&t, 2), "OA");
        assert_eq!(label(&t, 3), "H");
        assert_eq!(label(&t, 8), "HD");
    }

    #[test]
    fn later_rules_override_earlier_ones() {
        // Aniline nitrogen: NA from [#7], then N from [#7X3v3][a].
        let t = types("Nc1ccccc1");
        assert_eq!(label(&t, 0), "N");
        assert_eq!(label(&t, 1), "A");
        // Pyridine nitrogen keeps NA.
        let t = types("c1ccncc1");
        assert_eq!(label(&t, 3), "NA");
        // Thioether sulfur is an acceptor.
        let t = types("CSC");
        assert_eq!(label(&t, 1), "SA");
    }

    #[test]
    fn uncovered_elements_stay_untyped() {
        let t = types("C[Se]C");
        assert_eq!(label(&t, 1), "-");
    }

    #[test]
    fn custom_rule_position_selects_the_atom() {
        let mol = fixtures::molecule("CC=O");
        let mut setup = fixtures::setup("CC=O");
        SmartsAtomTyper::new(vec![AtomTypeRule::new("[#6]=[#8]", "OX", 2)])
            .assign(&mut setup, &mol)
            .unwrap();
        assert_eq!(setup.atoms()[2].atom_type.as_deref(), Some("OX"));
        assert!(setup.atoms()[1].atom_type.is_none());
    }
}
