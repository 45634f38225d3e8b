//! A SMARTS subset sufficient for atom typing, rigidity rules, and reactive
//! site selection.
//!
//! Supported: element symbols (aliphatic and aromatic), `#n`, `*`, `a`, `A`,
//! `D`, `X`, `v`, `H`, `h`, `R`, `r`, `x`, charges, atom maps, the operators
//! `!`, `&`, `,`, `;` with the usual precedence, bond primitives
//! `- = # : ~ @`, branches, ring closures, and `.` separated components.
//! Recursive SMARTS, chirality and isotopes are rejected.

mod parser;
pub mod query;

use crate::toolkit::ToolkitError;
use crate::toolkit::molecule::{MolAtom, MolBond, Molecule};
use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::{EdgeRef, VisitMap, Visitable};

type Visited = <UnGraph<MolAtom, MolBond> as Visitable>::Map;
use query::{AtomExpr, BondExpr};
use std::collections::BTreeSet;

/// A compiled SMARTS pattern: a query graph of atom and bond expressions.
#[derive(Debug, Clone)]
pub struct Pattern {
    query: UnGraph<AtomExpr, BondExpr>,
    // Per query atom: (earlier query atom, bond).
    back_edges: Vec<Vec<(NodeIndex, EdgeIndex)>>,
}

impl Pattern {
    fn new(atoms: Vec<AtomExpr>, bonds: Vec<(usize, usize, BondExpr)>) -> Self {
        let mut query = UnGraph::with_capacity(atoms.len(), bonds.len());
        for atom in atoms {
            query.add_node(atom);
        }
        for (a, b, expr) in bonds {
            query.add_edge(NodeIndex::new(a), NodeIndex::new(b), expr);
        }
        let mut back_edges = vec![Vec::new(); query.node_count()];
        for edge in query.edge_references() {
            let (early, late) = if edge.source() < edge.target() {
                (edge.source(), edge.target())
            } else {
                (edge.target(), edge.source())
            };
            back_edges[late.index()].push((early, edge.id()));
        }
        Self { query, back_edges }
    }

    pub fn parse(pattern: &str) -> Result<Self, ToolkitError> {
        parser::Parser::new(pattern).parse()
    }

    pub fn atom_count(&self) -> usize {
        self.query.node_count()
    }

    /// Atom expressions in pattern order.
    pub fn atoms(&self) -> impl ExactSizeIterator<Item = &AtomExpr> + '_ {
        self.query.raw_nodes().iter().map(|n| &n.weight)
    }

    /// `(atom, atom, expression)` per bond, in pattern order.
    pub fn bonds(&self) -> impl Iterator<Item = (usize, usize, &BondExpr)> + '_ {
        self.query
            .edge_references()
            .map(|e| (e.source().index(), e.target().index(), e.weight()))
    }

    /// Every embedding of the pattern in `mol`, one per distinct atom set.
    ///
    /// Each tuple lists target atoms in pattern atom order. When several
    /// embeddings cover the same atoms, the first one found is kept; the
    /// search visits target atoms in ascending index order.
    pub fn find_matches(&self, mol: &Molecule) -> Vec<Vec<usize>> {
        let mut seen: BTreeSet<Vec<usize>> = BTreeSet::new();
        let mut results = Vec::new();
        if self.atom_count() == 0 || self.atom_count() > mol.atom_count() {
            return results;
        }
        let mut mapping = Vec::with_capacity(self.atom_count());
        let mut used = mol.graph().visit_map();
        self.extend(mol, &mut mapping, &mut used, &mut |found| {
            let found: Vec<usize> = found.iter().map(|n| n.index()).collect();
            let mut key = found.clone();
            key.sort_unstable();
            if seen.insert(key) {
                results.push(found);
            }
        });
        results
    }

    fn extend(
        &self,
        mol: &Molecule,
        mapping: &mut Vec<NodeIndex>,
        used: &mut Visited,
        emit: &mut dyn FnMut(&[NodeIndex]),
    ) {
        let k = mapping.len();
        if k == self.atom_count() {
            emit(mapping);
            return;
        }
        let candidates: Vec<NodeIndex> = match self.back_edges[k].first() {
            Some(&(anchor, _)) => mol
                .neighbors(mapping[anchor.index()].index())
                .map(NodeIndex::new)
                .collect(),
            None => mol.graph().node_indices().collect(),
        };
        let expr = &self.query[NodeIndex::new(k)];
        for target in candidates {
            if used.is_visited(&target) || !expr.matches(mol, target.index()) {
                continue;
            }
            let bonds_ok = self.back_edges[k].iter().all(|&(earlier, bond)| {
                self.query[bond].matches(mol, mapping[earlier.index()].index(), target.index())
            });
            if !bonds_ok {
                continue;
            }
            used.visit(target);
            mapping.push(target);
            self.extend(mol, mapping, used, emit);
            mapping.pop();
            used.set(target.index(), false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolkit::smiles;

    fn matches(smiles_text: &str, pattern: &str) -> Vec<Vec<usize>> {
        let mol = smiles::parse(smiles_text).unwrap();
        Pattern::parse(pattern).unwrap().find_matches(&mol)
    }

    #[test]
    fn single_atom_pattern_lists_each_atom_once() {
        assert_eq!(matches("CCO", "[C]"), vec![vec![0], vec![1]]);
        assert_eq!(matches("CCO", "[#8]"), vec![vec![2]]);
    }

    #[test]
    fn symmetric_matches_are_deduplicated_by_atom_set() {
        let found = matches("CCC", "CC");
        assert_eq!(found, vec![vec![0, 1], vec![1, 2]]);
    }

    #[test]
    fn amide_pattern_orders_atoms_like_the_pattern() {
        let found = matches("CC(=O)NC", "[NX3]-[CX3]=[O,N]");
        assert_eq!(found, vec![vec![3, 1, 2]]);
    }

    #[test]
    fn aromatic_and_ring_queries() {
        assert_eq!(matches("Cc1ccccc1", "[c]").len(), 6);
        assert_eq!(matches("Cc1ccccc1", "[C]").len(), 1);
        assert_eq!(matches("C1CCCCC1C", "[CR0]"), vec![vec![6]]);
        assert_eq!(matches("C1CCCCC1C", "[r6]").len(), 6);
        assert_eq!(matches("C1CCCCC1C", "C!@C"), vec![vec![5, 6]]);
    }

    #[test]
    fn hydrogen_count_and_donor_hydrogens() {
        assert_eq!(matches("CO", "[OH1]"), vec![vec![1]]);
        let mol = smiles::parse("CO").unwrap().with_explicit_hydrogens().unwrap();
        let donors = Pattern::parse("[#1][#7,#8,#9,#15,#16]")
            .unwrap()
            .find_matches(&mol);
        assert_eq!(donors.len(), 1);
        assert_eq!(donors[0][1], 1);
    }

    #[test]
    fn disconnected_components_search_everywhere() {
        let found = matches("CC.O", "C.O");
        assert_eq!(found, vec![vec![0, 2], vec![1, 2]]);
    }

    #[test]
    fn ring_closure_in_pattern() {
        assert_eq!(matches("C1CC1C", "C1CC1").len(), 1);
        assert!(matches("CCCC", "C1CC1").is_empty());
    }
}
