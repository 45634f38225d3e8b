use std::fmt;

/// Index of a rigid body inside a [`FlexTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub usize);

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "body {}", self.0)
    }
}

/// A set of atoms that move together. Members are sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RigidBody {
    pub members: Vec<usize>,
}

impl RigidBody {
    pub fn lowest_atom(&self) -> usize {
        self.members.first().copied().unwrap_or(usize::MAX)
    }

    pub fn contains(&self, atom: usize) -> bool {
        self.members.binary_search(&atom).is_ok()
    }
}

/// The rotatable bond joining a body to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TorsionEdge {
    pub parent_atom: usize,
    pub child_atom: usize,
}

/// Rooted tree of rigid bodies joined by rotatable bonds.
///
/// Built once by the flexibility stage and immutable afterwards. Bodies live
/// in a `Vec` arena and are referenced by [`BodyId`].
#[derive(Debug, Clone, PartialEq)]
pub struct FlexTree {
    bodies: Vec<RigidBody>,
    body_of: Vec<Option<BodyId>>,
    root: BodyId,
    parent: Vec<Option<(BodyId, TorsionEdge)>>,
    children: Vec<Vec<BodyId>>,
    depth: Vec<usize>,
    preorder: Vec<BodyId>,
}

impl FlexTree {
    pub(crate) fn new(
        bodies: Vec<RigidBody>,
        body_of: Vec<Option<BodyId>>,
        root: BodyId,
        parent: Vec<Option<(BodyId, TorsionEdge)>>,
        children: Vec<Vec<BodyId>>,
        depth: Vec<usize>,
        preorder: Vec<BodyId>,
    ) -> Self {
        Self {
            bodies,
            body_of,
            root,
            parent,
            children,
            depth,
            preorder,
        }
    }

    pub fn root(&self) -> BodyId {
        self.root
    }

    pub fn bodies(&self) -> &[RigidBody] {
        &self.bodies
    }

    pub fn body(&self, id: BodyId) -> &RigidBody {
        &self.bodies[id.0]
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// The body an atom belongs to. `None` for ignored atoms.
    pub fn body_of(&self, atom: usize) -> Option<BodyId> {
        self.body_of.get(atom).copied().flatten()
    }

    pub fn parent(&self, id: BodyId) -> Option<BodyId> {
        self.parent[id.0].map(|(p, _)| p)
    }

    pub fn parent_bond(&self, id: BodyId) -> Option<TorsionEdge> {
        self.parent[id.0].map(|(_, edge)| edge)
    }

    /// Children in emission order: ascending by `(parent atom, child atom)`.
    pub fn children(&self, id: BodyId) -> &[BodyId] {
        &self.children[id.0]
    }

    pub fn depth(&self, id: BodyId) -> usize {
        self.depth[id.0]
    }

    /// Longest root-to-leaf path, counted in torsions.
    pub fn height(&self) -> usize {
        self.depth.iter().copied().max().unwrap_or(0)
    }

    pub fn preorder(&self) -> &[BodyId] {
        &self.preorder
    }

    pub fn torsion_count(&self) -> usize {
        self.bodies.len().saturating_sub(1)
    }

    /// Members in output order: the atom bonded to the parent first, then the
    /// remaining members ascending. The root body is fully ascending.
    pub fn ordered_members(&self, id: BodyId) -> Vec<usize> {
        let members = &self.bodies[id.0].members;
        match self.parent_bond(id) {
            Some(edge) => std::iter::once(edge.child_atom)
                .chain(members.iter().copied().filter(|&a| a != edge.child_atom))
                .collect(),
            None => members.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 0-1 | 2-3 | 4, with 1-2 and 3-4 rotatable.
    fn chain_tree() -> FlexTree {
        let bodies = vec![
            RigidBody { members: vec![0, 1] },
            RigidBody { members: vec![2, 3] },
            RigidBody { members: vec![4] },
        ];
        let body_of = vec![
            Some(BodyId(0)),
            Some(BodyId(0)),
            Some(BodyId(1)),
            Some(BodyId(1)),
            Some(BodyId(2)),
            None,
        ];
        let parent = vec![
            None,
            Some((
                BodyId(0),
                TorsionEdge {
                    parent_atom: 1,
                    child_atom: 2,
                },
            )),
            Some((
                BodyId(1),
                TorsionEdge {
                    parent_atom: 3,
                    child_atom: 4,
                },
            )),
        ];
        FlexTree::new(
            bodies,
            body_of,
            BodyId(0),
            parent,
            vec![vec![BodyId(1)], vec![BodyId(2)], vec![]],
            vec![0, 1, 2],
            vec![BodyId(0), BodyId(1), BodyId(2)],
        )
    }

    #[test]
    fn reports_height_and_torsions() {
        let tree = chain_tree();
        assert_eq!(tree.height(), 2);
        assert_eq!(tree.torsion_count(), 2);
        assert_eq!(tree.body_count(), 3);
    }

    #[test]
    fn ignored_atoms_have_no_body() {
        let tree = chain_tree();
        assert_eq!(tree.body_of(3), Some(BodyId(1)));
        assert_eq!(tree.body_of(5), None);
        assert_eq!(tree.body_of(42), None);
    }

    #[test]
    fn child_members_start_with_bonded_atom() {
        let mut tree = chain_tree();
        tree.bodies[1].members = vec![2, 3, 6];
        tree.parent[1] = Some((
            BodyId(0),
            TorsionEdge {
                parent_atom: 1,
                child_atom: 3,
            },
        ));
        assert_eq!(tree.ordered_members(BodyId(1)), vec![3, 2, 6]);
        assert_eq!(tree.ordered_members(BodyId(0)), vec![0, 1]);
    }

    #[test]
    fn parent_links_are_exposed() {
        let tree = chain_tree();
        assert_eq!(tree.parent(BodyId(2)), Some(BodyId(1)));
        assert_eq!(tree.parent(tree.root()), None);
        assert_eq!(tree.parent_bond(BodyId(1)).unwrap().child_atom, 2);
        assert_eq!(tree.children(BodyId(0)), &[BodyId(1)]);
    }
}
