use super::error::{PrepareError, RingBreakError, StructureError};
use super::macrocycle::RingBreakPlan;
use crate::core::models::atom::{PseudoKind, SetupAtom};
use crate::core::models::bond::BondKey;
use crate::core::models::element::Element;
use crate::core::models::flex::{BodyId, FlexTree, RigidBody, TorsionEdge};
use crate::core::models::setup::MoleculeSetup;
use crate::toolkit::rings;
use nalgebra::Point3;
use petgraph::graph::UnGraph;
use petgraph::unionfind::UnionFind;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

/// Opens the given bonds and freezes the rigid-ring bonds, in place.
pub fn apply_breaks(
    setup: &mut MoleculeSetup,
    breaks: &[BondKey],
    rigid_ring_bonds: &BTreeSet<BondKey>,
) {
    for key in breaks {
        setup.unlink(key.first(), key.second());
        if let Some(bond) = setup.bond_mut(key.first(), key.second()) {
            bond.broken = true;
            bond.rotatable = false;
        }
    }
    for key in rigid_ring_bonds {
        if let Some(bond) = setup.bond_mut(key.first(), key.second()) {
            bond.in_rigid_ring = true;
            bond.rotatable = false;
        }
    }
}

/// Connectivity of the non-ignored atoms, with broken bonds already unlinked.
fn active_graph(setup: &MoleculeSetup) -> UnGraph<(), ()> {
    let atoms = setup.atoms();
    let bonds = atoms
        .iter()
        .enumerate()
        .filter(|(_, atom)| !atom.ignore)
        .flat_map(|(i, atom)| {
            atom.neighbors
                .iter()
                .copied()
                .filter(move |&j| j > i && !atoms[j].ignore)
                .map(move |j| (i, j))
        });
    rings::skeleton(atoms.len(), bonds)
}

/// Bonds of the setup that lie on no cycle of its current graph.
pub fn acyclic_bonds(setup: &MoleculeSetup) -> BTreeSet<BondKey> {
    rings::bridges(&active_graph(setup))
}

/// Bonds of the current graph that become torsions of the tree.
pub fn torsion_bonds(setup: &MoleculeSetup, not_terminal: &BTreeSet<usize>) -> BTreeSet<BondKey> {
    let bridges = acyclic_bonds(setup);
    let is_terminal =
        |atom: usize| setup.real_neighbors(atom).count() <= 1 && !not_terminal.contains(&atom);

    setup
        .bonds()
        .iter()
        .filter(|(key, bond)| {
            let (a, b) = (key.first(), key.second());
            bond.rotatable
                && !bond.broken
                && !bond.in_rigid_ring
                && !setup.atoms()[a].ignore
                && !setup.atoms()[b].ignore
                && bridges.contains(key)
                && !is_terminal(a)
                && !is_terminal(b)
        })
        .map(|(key, _)| *key)
        .collect()
}

/// Builds the rigid-body tree of a setup as it currently stands.
///
/// The setup is not modified; ring breaks and rigid-ring flags must already
/// be applied.
///
/// # Arguments
///
/// * `setup` - The setup whose adjacency and bond flags define the graph.
/// * `root_atom` - Atom whose body becomes the root, or `None` to pick the
///   body of minimum eccentricity.
/// * `not_terminal` - Atoms that count as non-terminal even with a single neighbour.
///
/// # Errors
///
/// Returns [`PrepareError::InvalidRoot`] for a root atom that is out of range,
/// ignored or a pseudo-atom, and [`PrepareError::Structure`] when the
/// rigid-body graph is not a tree.
pub fn derive_tree(
    setup: &MoleculeSetup,
    root_atom: Option<usize>,
    not_terminal: &BTreeSet<usize>,
) -> Result<FlexTree, PrepareError> {
    let atoms = setup.atoms();
    let torsions = torsion_bonds(setup, not_terminal);

    let mut sets: UnionFind<usize> = UnionFind::new(atoms.len());
    for key in setup.bonds().keys() {
        let (a, b) = (key.first(), key.second());
        if atoms[a].ignore || atoms[b].ignore || torsions.contains(key) {
            continue;
        }
        if atoms[a].neighbors.binary_search(&b).is_ok() {
            sets.union(a, b);
        }
    }

    let mut body_of: Vec<Option<BodyId>> = vec![None; atoms.len()];
    let mut body_by_root: BTreeMap<usize, BodyId> = BTreeMap::new();
    let mut bodies: Vec<RigidBody> = Vec::new();
    for (index, atom) in atoms.iter().enumerate() {
        if atom.ignore {
            continue;
        }
        let root = sets.find_mut(index);
        let id = *body_by_root.entry(root).or_insert_with(|| {
            bodies.push(RigidBody {
                members: Vec::new(),
            });
            BodyId(bodies.len() - 1)
        });
        bodies[id.0].members.push(index);
        body_of[index] = Some(id);
    }
    if bodies.is_empty() {
        return Err(StructureError::EdgeCount {
            edges: 0,
            bodies: 0,
        }
        .into());
    }

    // (neighbour body, atom on this side, atom on the other side)
    let mut links: Vec<Vec<(BodyId, usize, usize)>> = vec![Vec::new(); bodies.len()];
    for key in &torsions {
        let (a, b) = (key.first(), key.second());
        let (Some(ba), Some(bb)) = (body_of[a], body_of[b]) else {
            continue;
        };
        if ba == bb {
            return Err(StructureError::Cycle { a, b }.into());
        }
        links[ba.0].push((bb, a, b));
        links[bb.0].push((ba, b, a));
    }

    let reached = distances(&links, BodyId(0))
        .iter()
        .filter(|d| d.is_some())
        .count();
    if reached != bodies.len() {
        return Err(StructureError::Disconnected {
            unreached: bodies.len() - reached,
        }
        .into());
    }
    if torsions.len() + 1 != bodies.len() {
        return Err(StructureError::EdgeCount {
            edges: torsions.len(),
            bodies: bodies.len(),
        }
        .into());
    }

    let root = match root_atom {
        Some(index) => {
            let atom = atoms.get(index).ok_or_else(|| PrepareError::InvalidRoot {
                index,
                reason: format!("setup has {} atoms", atoms.len()),
            })?;
            if atom.ignore {
                return Err(PrepareError::InvalidRoot {
                    index,
                    reason: "atom is merged into its neighbour".to_string(),
                });
            }
            if atom.is_pseudo() {
                return Err(PrepareError::InvalidRoot {
                    index,
                    reason: "atom is a pseudo-atom".to_string(),
                });
            }
            body_of[index].ok_or_else(|| PrepareError::InvalidRoot {
                index,
                reason: "atom belongs to no rigid body".to_string(),
            })?
        }
        None => central_body(&links),
    };

    let count = bodies.len();
    let mut parent: Vec<Option<(BodyId, TorsionEdge)>> = vec![None; count];
    let mut children: Vec<Vec<BodyId>> = vec![Vec::new(); count];
    let mut depth = vec![0usize; count];
    let mut preorder = Vec::with_capacity(count);
    let mut visited = vec![false; count];
    let mut stack = vec![root];
    visited[root.0] = true;
    while let Some(current) = stack.pop() {
        preorder.push(current);
        let mut next: Vec<(usize, usize, BodyId)> = links[current.0]
            .iter()
            .filter(|(other, _, _)| !visited[other.0])
            .map(|&(other, here, there)| (here, there, other))
            .collect();
        next.sort_unstable();
        for &(here, there, other) in &next {
            visited[other.0] = true;
            parent[other.0] = Some((
                current,
                TorsionEdge {
                    parent_atom: here,
                    child_atom: there,
                },
            ));
            depth[other.0] = depth[current.0] + 1;
            children[current.0].push(other);
        }
        stack.extend(next.iter().rev().map(|&(_, _, other)| other));
    }

    let tree = FlexTree::new(bodies, body_of, root, parent, children, depth, preorder);
    debug!(
        bodies = tree.body_count(),
        torsions = tree.torsion_count(),
        height = tree.height(),
        root = %tree.root(),
        "Derived rigid-body tree"
    );
    Ok(tree)
}

fn distances(links: &[Vec<(BodyId, usize, usize)>], from: BodyId) -> Vec<Option<usize>> {
    let mut dist = vec![None; links.len()];
    dist[from.0] = Some(0);
    let mut queue = VecDeque::from([from]);
    while let Some(current) = queue.pop_front() {
        let d = dist[current.0].unwrap_or(0);
        for &(other, _, _) in &links[current.0] {
            if dist[other.0].is_none() {
                dist[other.0] = Some(d + 1);
                queue.push_back(other);
            }
        }
    }
    dist
}

/// Body of minimum eccentricity; the lowest id wins ties.
fn central_body(links: &[Vec<(BodyId, usize, usize)>]) -> BodyId {
    (0..links.len())
        .map(|i| {
            let eccentricity = distances(links, BodyId(i))
                .into_iter()
                .flatten()
                .max()
                .unwrap_or(0);
            (eccentricity, i)
        })
        .min()
        .map(|(_, i)| BodyId(i))
        .unwrap_or(BodyId(0))
}

/// Produces the final setup: breaks applied, glue pseudo-atoms attached and the
/// rigid-body tree built.
///
/// Glue atoms for break `n` are labelled `G<n>` and bonded to each endpoint,
/// placed at the caller's coordinate for that endpoint or, when none was
/// given, at the partner atom. Carbon endpoints are retyped `CG<n>`.
pub fn build_flexibility(
    setup: &MoleculeSetup,
    plan: &RingBreakPlan,
    glue: &BTreeMap<usize, Vec<f64>>,
    root_atom_index: Option<usize>,
    not_terminal_atoms: &[usize],
) -> Result<MoleculeSetup, PrepareError> {
    let mut out = setup.clone();
    apply_breaks(&mut out, &plan.breaks, &plan.rigid_ring_bonds);

    for (n, key) in plan.breaks.iter().enumerate() {
        let n = u8::try_from(n).map_err(|_| RingBreakError::TooManyBreaks {
            requested: plan.breaks.len(),
            max: super::macrocycle::MAX_BREAKS,
        })?;
        for (atom, partner) in [(key.first(), key.second()), (key.second(), key.first())] {
            let position = match glue.get(&atom) {
                Some(xyz) => match xyz.as_slice() {
                    &[x, y, z] => Point3::new(x, y, z),
                    _ => {
                        return Err(RingBreakError::GlueArity {
                            atom,
                            got: xyz.len(),
                        }
                        .into());
                    }
                },
                None => out.atoms()[partner].position,
            };
            let label = format!("G{n}");
            out.add_pseudo_atom(SetupAtom::pseudo(PseudoKind::Glue(n), &label, position), atom);
            if out.atoms()[atom].element == Element::C {
                out.set_atom_type(atom, format!("CG{n}"));
            }
        }
        debug!(bond = %key, glue = n, "Attached glue pseudo-atoms");
    }

    let not_terminal: BTreeSet<usize> = not_terminal_atoms.iter().copied().collect();
    let tree = derive_tree(&out, root_atom_index, &not_terminal)?;
    Ok(out.with_flexibility(tree))
}
