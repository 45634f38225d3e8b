//! Ring perception over undirected [`petgraph`] graphs.
//!
//! Node indices are atom indices; weights are ignored. Cycles are returned
//! normalised: rotated so the smallest atom index comes first, with the
//! direction chosen so the second atom is the smaller of the two neighbours.
//! Results are sorted by `(length, atoms)`.

use crate::core::models::bond::BondKey;
use petgraph::algo::{connected_components, has_path_connecting};
use petgraph::graph::{EdgeReference, NodeIndex, UnGraph};
use petgraph::visit::{EdgeFiltered, EdgeRef};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Weightless graph over `atom_count` nodes with the given bonds.
pub fn skeleton(
    atom_count: usize,
    bonds: impl IntoIterator<Item = (usize, usize)>,
) -> UnGraph<(), ()> {
    let mut graph = UnGraph::default();
    for _ in 0..atom_count {
        graph.add_node(());
    }
    for (a, b) in bonds {
        graph.update_edge(NodeIndex::new(a), NodeIndex::new(b), ());
    }
    graph
}

/// Bonds whose removal disconnects their endpoints. Every other bond is in a ring.
pub fn bridges<N, E>(graph: &UnGraph<N, E>) -> BTreeSet<BondKey> {
    graph
        .edge_references()
        .filter(|edge| {
            let skip = edge.id();
            let rest = EdgeFiltered::from_fn(graph, |e: EdgeReference<'_, E>| e.id() != skip);
            !has_path_connecting(&rest, edge.source(), edge.target(), None)
        })
        .map(|edge| BondKey::new(edge.source().index(), edge.target().index()))
        .collect()
}

/// Bonds that lie on at least one cycle.
pub fn ring_bonds<N, E>(graph: &UnGraph<N, E>) -> BTreeSet<BondKey> {
    let bridges = bridges(graph);
    edges(graph)
        .into_iter()
        .filter(|key| !bridges.contains(key))
        .collect()
}

/// Cyclomatic number `E - V + C`.
pub fn expected_ring_count<N, E>(graph: &UnGraph<N, E>) -> usize {
    let c = connected_components(graph);
    (graph.edge_count() + c).saturating_sub(graph.node_count())
}

/// Smallest set of smallest rings.
pub fn sssr<N, E>(graph: &UnGraph<N, E>) -> Vec<Vec<usize>> {
    let expected = expected_ring_count(graph);
    if expected == 0 {
        return Vec::new();
    }
    let index = edge_index(graph);
    let mut basis = Vec::with_capacity(expected);
    let mut rings = Vec::with_capacity(expected);
    for ring in horton_candidates(graph) {
        if rings.len() >= expected {
            break;
        }
        if try_add_to_basis(&mut basis, to_bitvector(&ring, &index)) {
            rings.push(ring);
        }
    }
    sort_rings(rings)
}

/// SSSR plus every ring that could replace an SSSR ring of the same size
/// without losing rank (cubane gives six four-rings instead of five).
pub fn symmetrized_sssr<N, E>(graph: &UnGraph<N, E>) -> Vec<Vec<usize>> {
    let base = sssr(graph);
    if base.is_empty() {
        return base;
    }
    let index = edge_index(graph);
    let base_bvs: Vec<Vec<u64>> = base.iter().map(|r| to_bitvector(r, &index)).collect();
    let largest = base.iter().map(Vec::len).max().unwrap_or(0);
    let mut result = base.clone();

    for candidate in horton_candidates(graph) {
        if candidate.len() > largest || result.contains(&candidate) {
            continue;
        }
        let cand_bv = to_bitvector(&candidate, &index);
        let replaces_one = base.iter().enumerate().any(|(skip, ring)| {
            if ring.len() != candidate.len() {
                return false;
            }
            let mut basis = Vec::with_capacity(base.len());
            for (i, bv) in base_bvs.iter().enumerate() {
                if i != skip {
                    try_add_to_basis(&mut basis, bv.clone());
                }
            }
            try_add_to_basis(&mut basis, cand_bv.clone()) && basis.len() == base.len()
        });
        if replaces_one {
            result.push(candidate);
        }
    }
    sort_rings(result)
}

/// Every simple cycle of the graph, chorded ones included.
pub fn simple_cycles<N, E>(graph: &UnGraph<N, E>) -> Vec<Vec<usize>> {
    let in_ring = ring_bonds(graph);
    let n = graph.node_count();
    let ring_adj: Vec<Vec<usize>> = (0..n)
        .map(|i| {
            sorted_neighbors(graph, i)
                .into_iter()
                .filter(|&j| in_ring.contains(&BondKey::new(i, j)))
                .collect()
        })
        .collect();

    let mut seen = BTreeSet::new();
    for start in 0..n {
        if ring_adj[start].is_empty() {
            continue;
        }
        let mut path = vec![start];
        let mut on_path = vec![false; n];
        on_path[start] = true;
        extend_cycles(&ring_adj, start, &mut path, &mut on_path, &mut seen);
    }
    sort_rings(seen.into_iter().collect())
}

fn extend_cycles(
    adj: &[Vec<usize>],
    start: usize,
    path: &mut Vec<usize>,
    on_path: &mut [bool],
    seen: &mut BTreeSet<Vec<usize>>,
) {
    let Some(&last) = path.last() else {
        return;
    };
    for &next in &adj[last] {
        if next == start && path.len() >= 3 {
            seen.insert(normalize_ring(path));
        } else if next > start && !on_path[next] {
            on_path[next] = true;
            path.push(next);
            extend_cycles(adj, start, path, on_path, seen);
            path.pop();
            on_path[next] = false;
        }
    }
}

/// Ring set according to the two perception switches.
///
/// `keep_chorded` wins over `keep_equivalent`.
pub fn perceive<N, E>(
    graph: &UnGraph<N, E>,
    keep_chorded: bool,
    keep_equivalent: bool,
) -> Vec<Vec<usize>> {
    if keep_chorded {
        simple_cycles(graph)
    } else if keep_equivalent {
        symmetrized_sssr(graph)
    } else {
        sssr(graph)
    }
}

pub fn normalize_ring(ring: &[usize]) -> Vec<usize> {
    let Some((min_pos, _)) = ring.iter().enumerate().min_by_key(|&(_, a)| *a) else {
        return Vec::new();
    };
    let len = ring.len();
    let mut normalized: Vec<usize> = (0..len).map(|i| ring[(min_pos + i) % len]).collect();
    if len > 2 && normalized[1] > normalized[len - 1] {
        normalized[1..].reverse();
    }
    normalized
}

fn sort_rings(mut rings: Vec<Vec<usize>>) -> Vec<Vec<usize>> {
    rings.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    rings.dedup();
    rings
}

// petgraph lists neighbours newest edge first; ring search wants index order.
fn sorted_neighbors<N, E>(graph: &UnGraph<N, E>, atom: usize) -> Vec<usize> {
    let mut nbrs: Vec<usize> = graph
        .neighbors(NodeIndex::new(atom))
        .map(|n| n.index())
        .collect();
    nbrs.sort_unstable();
    nbrs
}

fn edges<N, E>(graph: &UnGraph<N, E>) -> Vec<BondKey> {
    let keys: BTreeSet<BondKey> = graph
        .edge_references()
        .filter(|e| e.source() != e.target())
        .map(|e| BondKey::new(e.source().index(), e.target().index()))
        .collect();
    keys.into_iter().collect()
}

fn edge_index<N, E>(graph: &UnGraph<N, E>) -> BTreeMap<BondKey, usize> {
    edges(graph)
        .into_iter()
        .enumerate()
        .map(|(i, k)| (k, i))
        .collect()
}

fn bfs_tree<N, E>(graph: &UnGraph<N, E>, src: usize) -> (Vec<u32>, Vec<Option<usize>>) {
    let n = graph.node_count();
    let mut dist = vec![u32::MAX; n];
    let mut pred = vec![None; n];
    dist[src] = 0;
    let mut queue = VecDeque::from([src]);
    while let Some(cur) = queue.pop_front() {
        for nb in sorted_neighbors(graph, cur) {
            if dist[nb] == u32::MAX {
                dist[nb] = dist[cur] + 1;
                pred[nb] = Some(cur);
                queue.push_back(nb);
            }
        }
    }
    (dist, pred)
}

fn path_to(pred: &[Option<usize>], src: usize, dst: usize) -> Vec<usize> {
    let mut path = vec![dst];
    let mut cur = dst;
    while cur != src {
        match pred[cur] {
            Some(p) => {
                path.push(p);
                cur = p;
            }
            None => return Vec::new(),
        }
    }
    path.reverse();
    path
}

fn horton_candidates<N, E>(graph: &UnGraph<N, E>) -> Vec<Vec<usize>> {
    let n = graph.node_count();
    let trees: Vec<_> = (0..n).map(|w| bfs_tree(graph, w)).collect();
    let mut candidates = Vec::new();

    for key in edges(graph) {
        let (u, v) = (key.first(), key.second());
        for (w, (dist, pred)) in trees.iter().enumerate() {
            if dist[u] == u32::MAX || dist[v] == u32::MAX {
                continue;
            }
            if dist[u] as usize + dist[v] as usize + 1 < 3 {
                continue;
            }
            let path_u = path_to(pred, w, u);
            let path_v = path_to(pred, w, v);
            if path_u.is_empty() || path_v.is_empty() {
                continue;
            }
            if path_u[1..].iter().any(|node| path_v[1..].contains(node)) {
                continue;
            }
            let mut ring = path_u;
            ring.extend(path_v[1..].iter().rev());
            candidates.push(normalize_ring(&ring));
        }
    }
    sort_rings(candidates)
}

fn to_bitvector(ring: &[usize], index: &BTreeMap<BondKey, usize>) -> Vec<u64> {
    let mut bv = vec![0u64; index.len().div_ceil(64)];
    let len = ring.len();
    for i in 0..len {
        if let Some(&e) = index.get(&BondKey::new(ring[i], ring[(i + 1) % len])) {
            bv[e / 64] |= 1u64 << (e % 64);
        }
    }
    bv
}

fn try_add_to_basis(basis: &mut Vec<Vec<u64>>, candidate: Vec<u64>) -> bool {
    let mut v = candidate;
    // Basis rows are kept fully reduced against each other's pivots.
    for row in basis.iter() {
        if let Some(p) = leading_bit(row) {
            if v[p / 64] & (1u64 << (p % 64)) != 0 {
                xor_into(&mut v, row);
            }
        }
    }
    let Some(pivot) = leading_bit(&v) else {
        return false;
    };
    for row in basis.iter_mut() {
        if row[pivot / 64] & (1u64 << (pivot % 64)) != 0 {
            xor_into(row, &v);
        }
    }
    basis.push(v);
    true
}

fn leading_bit(bv: &[u64]) -> Option<usize> {
    bv.iter()
        .enumerate()
        .find(|(_, w)| **w != 0)
        .map(|(i, w)| i * 64 + w.trailing_zeros() as usize)
}

fn xor_into(a: &mut [u64], b: &[u64]) {
    for (aw, bw) in a.iter_mut().zip(b.iter()) {
        *aw ^= *bw;
    }
}
