use super::error::PrepareError;
use crate::core::models::setup::MoleculeSetup;
use crate::toolkit::SubstructureSearch;
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

/// Reactive labels for one match: atom index to `<type><n>`.
pub type ReactiveTypes = BTreeMap<usize, String>;

/// Labels the neighbourhood of every reactive atom matched by `smarts`.
///
/// The matched atom (1-based position `idx` in the pattern) is labelled
/// `<type>1`, its bonded neighbours `<type>2` and the atoms one bond further
/// `<type>3`. Ignored and untyped atoms are skipped.
pub fn assign_reactive_types(
    setup: &MoleculeSetup,
    mol: &dyn SubstructureSearch,
    smarts: &str,
    idx: usize,
) -> Result<Vec<ReactiveTypes>, PrepareError> {
    let mut out = Vec::new();
    for hit in mol.find_matches(smarts)? {
        let Some(&reactive) = hit.get(idx.saturating_sub(1)) else {
            continue;
        };
        let mut labels = ReactiveTypes::new();
        let mut seen = vec![false; setup.atom_count()];
        let mut queue = VecDeque::from([(reactive, 1usize)]);
        seen[reactive] = true;
        while let Some((atom, order)) = queue.pop_front() {
            let Some(setup_atom) = setup.atom(atom) else {
                continue;
            };
            if setup_atom.ignore {
                continue;
            }
            if let Some(atom_type) = &setup_atom.atom_type {
                labels.insert(atom, format!("{atom_type}{order}"));
            }
            if order == 3 {
                continue;
            }
            for &next in &setup_atom.neighbors {
                if !seen[next] {
                    seen[next] = true;
                    queue.push_back((next, order + 1));
                }
            }
        }
        debug!(atom = reactive, labelled = labels.len(), "Assigned reactive types");
        out.push(labels);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixtures;

    #[test]
    fn labels_grow_with_bond_distance() {
        // C0 C1 C2 C3 O4
        let mol = fixtures::molecule("CCCCO");
        let mut setup = fixtures::setup("CCCCO");
        for i in 0..setup.atom_count() {
            let label = setup.atoms()[i].element.symbol().to_string();
            setup.set_atom_type(i, label);
        }
        setup.merge_terminal_atoms(&["H".to_string()]);
        let types = assign_reactive_types(&setup, &mol, "[OX2H]", 1).unwrap();
        assert_eq!(types.len(), 1);
        let labels = &types[0];
        assert_eq!(labels[&4], "O1");
        assert_eq!(labels[&3], "C2");
        assert_eq!(labels[&2], "C3");
        assert!(!labels.contains_key(&1));
    }

    #[test]
    fn no_match_gives_no_labels() {
        let mol = fixtures::molecule("CC");
        let setup = fixtures::setup("CC");
        assert!(assign_reactive_types(&setup, &mol, "[#8]", 1)
            .unwrap()
            .is_empty());
    }
}
