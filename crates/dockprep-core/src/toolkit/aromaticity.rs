//! Aromaticity perception for Kekulé inputs.
//!
//! Bonds given as aromatic in the input stay aromatic. On top of that, six-rings
//! of alternating sp2 carbon/nitrogen and five-rings with one lone-pair
//! heteroatom (furan, pyrrole, thiophene type) are flagged. Bond orders are
//! left untouched, so valence arithmetic keeps working on the Kekulé form.

use super::molecule::{MolAtom, MolBond};
use crate::core::models::bond::BondOrder;
use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use std::collections::BTreeSet;

pub fn perceive(graph: &mut UnGraph<MolAtom, MolBond>, sssr: &[Vec<usize>]) {
    let given: Vec<usize> = graph
        .raw_edges()
        .iter()
        .map(|e| &e.weight)
        .filter(|b| b.order == BondOrder::Aromatic)
        .flat_map(|b| [b.begin, b.end])
        .collect();
    for a in given {
        graph[NodeIndex::new(a)].is_aromatic = true;
    }

    let count = graph.node_count();
    let double_partner: Vec<Option<usize>> = (0..count)
        .map(|i| {
            let doubles: Vec<usize> = graph
                .edges(NodeIndex::new(i))
                .filter(|e| e.weight().order == BondOrder::Double)
                .map(|e| e.weight().other(i))
                .collect();
            (doubles.len() == 1).then(|| doubles[0])
        })
        .collect();
    let atomic_numbers: Vec<u8> = graph
        .raw_nodes()
        .iter()
        .map(|n| n.weight.element.atomic_number())
        .collect();
    let is_cn = |i: usize| matches!(atomic_numbers[i], 6 | 7);
    let sp2: Vec<bool> = (0..count)
        .map(|i| is_cn(i) && double_partner[i].is_some_and(is_cn))
        .collect();

    let six: Vec<&Vec<usize>> = sssr
        .iter()
        .filter(|r| r.len() == 6 && r.iter().all(|&a| sp2[a]))
        .collect();
    let six_atoms: BTreeSet<usize> = six.iter().flat_map(|r| r.iter().copied()).collect();

    let mut aromatic_rings: Vec<&Vec<usize>> = six
        .iter()
        .copied()
        .filter(|ring| {
            ring.iter().all(|&a| {
                double_partner[a].is_some_and(|p| ring.contains(&p) || six_atoms.contains(&p))
            })
        })
        .collect();
    let mut flagged: BTreeSet<usize> = aromatic_rings
        .iter()
        .flat_map(|r| r.iter().copied())
        .collect();

    for ring in sssr.iter().filter(|r| r.len() == 5) {
        let lone_pair: Vec<usize> = ring
            .iter()
            .copied()
            .filter(|&a| double_partner[a].is_none())
            .collect();
        if lone_pair.len() != 1 {
            continue;
        }
        let donor = lone_pair[0];
        if !matches!(atomic_numbers[donor], 7 | 8 | 16) {
            continue;
        }
        let rest_ok = ring.iter().filter(|&&a| a != donor).all(|&a| {
            sp2[a] && double_partner[a].is_some_and(|p| ring.contains(&p) || flagged.contains(&p))
        });
        if rest_ok {
            aromatic_rings.push(ring);
        }
    }
    flagged.extend(aromatic_rings.iter().flat_map(|r| r.iter().copied()));

    let ring_edges: Vec<EdgeIndex> = aromatic_rings
        .iter()
        .flat_map(|ring| {
            let n = ring.len();
            (0..n).map(move |i| (ring[i], ring[(i + 1) % n]))
        })
        .filter_map(|(a, b)| graph.find_edge(NodeIndex::new(a), NodeIndex::new(b)))
        .collect();
    for a in flagged {
        graph[NodeIndex::new(a)].is_aromatic = true;
    }
    for edge in ring_edges {
        graph[edge].is_aromatic = true;
    }
}

#[cfg(test)]
mod tests {
    use crate::toolkit::smiles;

    fn aromatic_atoms(input: &str) -> Vec<usize> {
        let mol = smiles::parse(input).unwrap();
        (0..mol.atom_count())
            .filter(|&i| mol.atom(i).is_aromatic)
            .collect()
    }

    #[test]
    fn kekule_benzene_is_aromatic() {
        assert_eq!(aromatic_atoms("C1=CC=CC=C1"), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn lowercase_input_is_kept_aromatic() {
        let mol = smiles::parse("c1ccncc1").unwrap();
        assert!(mol.atoms().all(|a| a.is_aromatic));
        assert!(mol.bonds().all(|b| b.is_aromatic));
    }

    #[test]
    fn quinone_is_not_aromatic() {
        assert!(aromatic_atoms("O=C1C=CC(=O)C=C1").is_empty());
    }

    #[test]
    fn cyclohexene_is_not_aromatic() {
        assert!(aromatic_atoms("C1=CCCCC1").is_empty());
    }

    #[test]
    fn both_kekule_forms_of_naphthalene_are_aromatic() {
        assert_eq!(aromatic_atoms("C1=CC=C2C=CC=CC2=C1").len(), 10);
        assert_eq!(aromatic_atoms("C1=CC2=CC=CC=C2C=C1").len(), 10);
    }

    #[test]
    fn five_membered_heteroaromatics() {
        assert_eq!(aromatic_atoms("C1=CNC=C1").len(), 5);
        assert_eq!(aromatic_atoms("C1=COC=C1").len(), 5);
        assert_eq!(aromatic_atoms("C1=CSC=C1").len(), 5);
        assert!(aromatic_atoms("C1=CCC=C1").is_empty());
    }

    #[test]
    fn exocyclic_substituent_bond_stays_non_aromatic() {
        let mol = smiles::parse("CC1=CC=CC=C1").unwrap();
        let methyl_bond = mol.bond_between(0, 1).unwrap();
        assert!(!methyl_bond.is_aromatic);
        assert!(mol.bond_between(1, 2).unwrap().is_aromatic);
    }
}
