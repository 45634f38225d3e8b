use super::{SourceMolecule, SubstructureSearch, ToolkitError, aromaticity, rings, smarts};
use crate::core::models::bond::{BondKey, BondOrder};
use crate::core::models::element::Element;
use crate::core::utils::geometry;
use nalgebra::{Point3, Vector3};
use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq)]
pub struct MolAtom {
    pub element: Element,
    pub formal_charge: i8,
    pub is_aromatic: bool,
    /// Charge carried by the input, if any.
    pub partial_charge: Option<f64>,
}

impl MolAtom {
    pub fn new(element: Element) -> Self {
        Self {
            element,
            formal_charge: 0,
            is_aromatic: false,
            partial_charge: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MolBond {
    pub begin: usize,
    pub end: usize,
    pub order: BondOrder,
    pub is_aromatic: bool,
    pub in_ring: bool,
}

impl MolBond {
    pub fn key(&self) -> BondKey {
        BondKey::new(self.begin, self.end)
    }

    pub fn other(&self, atom: usize) -> usize {
        if self.begin == atom {
            self.end
        } else {
            self.begin
        }
    }
}

/// One set of 3D coordinates, indexed like the atoms.
#[derive(Debug, Clone, PartialEq)]
pub struct Conformer {
    positions: Vec<Point3<f64>>,
}

impl Conformer {
    pub fn new(positions: Vec<Point3<f64>>) -> Self {
        Self { positions }
    }

    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    pub fn position(&self, atom: usize) -> Option<&Point3<f64>> {
        self.positions.get(atom)
    }
}

/// The molecule type of the built-in toolkit.
///
/// Atoms and bonds live in an undirected graph whose node and edge indices
/// are the atom and bond indices. Ring membership, aromaticity and implicit
/// hydrogen counts are perceived once, when the molecule is built.
#[derive(Debug, Clone)]
pub struct Molecule {
    name: Option<String>,
    graph: UnGraph<MolAtom, MolBond>,
    implicit_h: Vec<u8>,
    sssr: Vec<Vec<usize>>,
    conformers: Vec<Conformer>,
    properties: BTreeMap<String, String>,
}

impl Molecule {
    /// Registry key of this molecule type.
    pub const KIND: &'static str = "dockprep.molecule";

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn graph(&self) -> &UnGraph<MolAtom, MolBond> {
        &self.graph
    }

    /// Atoms in index order.
    pub fn atoms(&self) -> impl ExactSizeIterator<Item = &MolAtom> + '_ {
        self.graph.raw_nodes().iter().map(|n| &n.weight)
    }

    pub fn atom(&self, index: usize) -> &MolAtom {
        &self.graph[NodeIndex::new(index)]
    }

    pub fn atom_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Bonds in index order.
    pub fn bonds(&self) -> impl ExactSizeIterator<Item = &MolBond> + '_ {
        self.graph.raw_edges().iter().map(|e| &e.weight)
    }

    pub fn bond(&self, index: usize) -> &MolBond {
        &self.graph[EdgeIndex::new(index)]
    }

    pub fn bond_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// `(neighbour, bond index)` pairs, sorted by neighbour.
    pub fn bonds_of(&self, atom: usize) -> impl Iterator<Item = (usize, usize)> + use<> {
        incident(&self.graph, atom).into_iter()
    }

    pub fn neighbors(&self, atom: usize) -> impl Iterator<Item = usize> + use<> {
        self.bonds_of(atom).map(|(n, _)| n)
    }

    pub fn bond_between(&self, a: usize, b: usize) -> Option<&MolBond> {
        self.graph
            .find_edge(NodeIndex::new(a), NodeIndex::new(b))
            .map(|e| &self.graph[e])
    }

    pub fn degree(&self, atom: usize) -> usize {
        self.graph.neighbors(NodeIndex::new(atom)).count()
    }

    pub fn implicit_hydrogens(&self, atom: usize) -> u8 {
        self.implicit_h[atom]
    }

    pub fn has_implicit_hydrogens(&self) -> bool {
        self.implicit_h.iter().any(|&h| h > 0)
    }

    pub fn total_hydrogens(&self, atom: usize) -> u8 {
        let explicit = self
            .neighbors(atom)
            .filter(|&n| self.atom(n).element.is_hydrogen())
            .count() as u8;
        explicit + self.implicit_h[atom]
    }

    /// Sum of bond orders plus implicit hydrogens.
    pub fn valence(&self, atom: usize) -> u8 {
        bond_valence(&self.graph, atom) + self.implicit_h[atom]
    }

    pub fn sssr(&self) -> &[Vec<usize>] {
        &self.sssr
    }

    pub fn ring_membership(&self, atom: usize) -> usize {
        self.sssr.iter().filter(|r| r.contains(&atom)).count()
    }

    pub fn smallest_ring_size(&self, atom: usize) -> Option<usize> {
        self.sssr
            .iter()
            .filter(|r| r.contains(&atom))
            .map(Vec::len)
            .min()
    }

    pub fn ring_bond_count(&self, atom: usize) -> usize {
        self.graph
            .edges(NodeIndex::new(atom))
            .filter(|e| e.weight().in_ring)
            .count()
    }

    pub fn conformers(&self) -> &[Conformer] {
        &self.conformers
    }

    /// The conformer with the given id; a negative id selects the default (first) one.
    pub fn conformer(&self, id: i32) -> Option<&Conformer> {
        if id < 0 {
            self.conformers.first()
        } else {
            self.conformers.get(id as usize)
        }
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Replaces all conformers with a single one.
    pub fn with_conformer(mut self, positions: Vec<Point3<f64>>) -> Result<Self, ToolkitError> {
        if positions.len() != self.atom_count() {
            return Err(ToolkitError::InvalidMolecule(format!(
                "conformer has {} positions for {} atoms",
                positions.len(),
                self.atom_count()
            )));
        }
        self.conformers = vec![Conformer::new(positions)];
        Ok(self)
    }

    /// Returns a copy with every implicit hydrogen made explicit.
    ///
    /// New hydrogens are appended after the existing atoms. In each conformer
    /// they are placed 1.0 Angstrom from their parent, away from its other
    /// neighbours.
    pub fn with_explicit_hydrogens(&self) -> Result<Molecule, ToolkitError> {
        let mut builder = MoleculeBuilder::new();
        if let Some(name) = &self.name {
            builder.name(name.clone());
        }
        for atom in self.atoms() {
            let index = builder.add_atom(atom.element);
            builder.formal_charge(index, atom.formal_charge);
            if let Some(q) = atom.partial_charge {
                builder.partial_charge(index, q);
            }
        }
        for bond in self.bonds() {
            builder.add_bond(bond.begin, bond.end, bond.order);
        }
        let mut parents = Vec::new();
        for atom in 0..self.atom_count() {
            for _ in 0..self.implicit_h[atom] {
                let h = builder.add_atom(Element::H);
                builder.add_bond(atom, h, BondOrder::Single);
                parents.push(atom);
            }
        }
        for conformer in &self.conformers {
            let mut positions = conformer.positions.clone();
            let mut sibling = vec![0usize; self.atom_count()];
            for &parent in &parents {
                let s = sibling[parent];
                sibling[parent] += 1;
                let origin = positions[parent];
                let nbrs: Vec<Point3<f64>> =
                    self.neighbors(parent).map(|n| positions[n]).collect();
                let axis = geometry::opposite_of_neighbors(&origin, &nbrs, 1.0)
                    .map(|p| p - origin)
                    .unwrap_or_else(Vector3::x);
                let dir = if s == 0 {
                    axis
                } else {
                    let tilted =
                        axis * (1.0 / 3.0) + geometry::perpendicular(&axis) * (8.0f64 / 9.0).sqrt();
                    geometry::rotation_from_axis_angle(&axis, 120.0 * (s - 1) as f64) * tilted
                };
                positions.push(origin + dir.normalize());
            }
            builder.add_conformer(positions);
        }
        for (k, v) in &self.properties {
            builder.property(k.clone(), v.clone());
        }
        builder.build()
    }
}

fn incident(graph: &UnGraph<MolAtom, MolBond>, atom: usize) -> Vec<(usize, usize)> {
    let mut pairs: Vec<(usize, usize)> = graph
        .edges(NodeIndex::new(atom))
        .map(|e| (e.weight().other(atom), e.id().index()))
        .collect();
    pairs.sort_unstable();
    pairs
}

fn bond_valence(graph: &UnGraph<MolAtom, MolBond>, atom: usize) -> u8 {
    let half: u8 = graph
        .edges(NodeIndex::new(atom))
        .map(|e| e.weight().order.half_valence())
        .sum();
    half / 2
}

impl SubstructureSearch for Molecule {
    fn find_matches(&self, pattern: &str) -> Result<Vec<Vec<usize>>, ToolkitError> {
        let query = smarts::Pattern::parse(pattern)?;
        Ok(query.find_matches(self))
    }
}

impl SourceMolecule for Molecule {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_search(&self) -> &dyn SubstructureSearch {
        self
    }
}

#[derive(Debug, Default)]
pub struct MoleculeBuilder {
    name: Option<String>,
    atoms: Vec<MolAtom>,
    bonds: Vec<(usize, usize, BondOrder)>,
    conformers: Vec<Vec<Point3<f64>>>,
    properties: BTreeMap<String, String>,
}

impl MoleculeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    pub fn add_atom(&mut self, element: Element) -> usize {
        self.atoms.push(MolAtom::new(element));
        self.atoms.len() - 1
    }

    pub fn formal_charge(&mut self, atom: usize, charge: i8) -> &mut Self {
        if let Some(a) = self.atoms.get_mut(atom) {
            a.formal_charge = charge;
        }
        self
    }

    pub fn partial_charge(&mut self, atom: usize, charge: f64) -> &mut Self {
        if let Some(a) = self.atoms.get_mut(atom) {
            a.partial_charge = Some(charge);
        }
        self
    }

    pub fn add_bond(&mut self, a: usize, b: usize, order: BondOrder) -> &mut Self {
        self.bonds.push((a, b, order));
        self
    }

    pub fn add_conformer(&mut self, positions: Vec<Point3<f64>>) -> &mut Self {
        self.conformers.push(positions);
        self
    }

    pub fn property(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Result<Molecule, ToolkitError> {
        let n = self.atoms.len();
        let mut graph: UnGraph<MolAtom, MolBond> =
            UnGraph::with_capacity(n, self.bonds.len());
        for atom in self.atoms {
            graph.add_node(atom);
        }
        let mut seen = BTreeSet::new();
        for (a, b, order) in self.bonds {
            if a >= n || b >= n || a == b {
                return Err(ToolkitError::InvalidMolecule(format!(
                    "bond ({a}, {b}) is invalid for {n} atoms"
                )));
            }
            if !seen.insert(BondKey::new(a, b)) {
                return Err(ToolkitError::InvalidMolecule(format!(
                    "duplicate bond ({a}, {b})"
                )));
            }
            graph.add_edge(
                NodeIndex::new(a),
                NodeIndex::new(b),
                MolBond {
                    begin: a,
                    end: b,
                    order,
                    is_aromatic: order == BondOrder::Aromatic,
                    in_ring: false,
                },
            );
        }
        for (i, positions) in self.conformers.iter().enumerate() {
            if positions.len() != n {
                return Err(ToolkitError::InvalidMolecule(format!(
                    "conformer {i} has {} positions for {n} atoms",
                    positions.len()
                )));
            }
        }

        let ring_bonds = rings::ring_bonds(&graph);
        for bond in graph.edge_weights_mut() {
            bond.in_ring = ring_bonds.contains(&bond.key());
        }
        let sssr = rings::sssr(&graph);
        aromaticity::perceive(&mut graph, &sssr);

        let implicit_h = (0..n)
            .map(|i| {
                let atom = &graph[NodeIndex::new(i)];
                let has_aromatic_order = graph
                    .edges(NodeIndex::new(i))
                    .any(|e| e.weight().order == BondOrder::Aromatic);
                atom.element.implicit_hydrogens(
                    atom.formal_charge,
                    bond_valence(&graph, i),
                    has_aromatic_order,
                )
            })
            .collect();

        Ok(Molecule {
            name: self.name,
            graph,
            implicit_h,
            sssr,
            conformers: self.conformers.into_iter().map(Conformer::new).collect(),
            properties: self.properties,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolkit::smiles;

    #[test]
    fn builder_rejects_duplicate_and_dangling_bonds() {
        let mut b = MoleculeBuilder::new();
        b.add_atom(Element::C);
        b.add_atom(Element::C);
        b.add_bond(0, 1, BondOrder::Single);
        b.add_bond(1, 0, BondOrder::Single);
        assert!(b.build().is_err());

        let mut b = MoleculeBuilder::new();
        b.add_atom(Element::C);
        b.add_bond(0, 4, BondOrder::Single);
        assert!(b.build().is_err());
    }

    #[test]
    fn implicit_hydrogens_are_perceived() {
        let mol = smiles::parse("CC(=O)O").unwrap();
        assert_eq!(mol.implicit_hydrogens(0), 3);
        assert_eq!(mol.implicit_hydrogens(1), 0);
        assert_eq!(mol.implicit_hydrogens(3), 1);
        assert!(mol.has_implicit_hydrogens());
        assert_eq!(mol.valence(1), 4);
    }

    #[test]
    fn explicit_hydrogens_are_appended() {
        let mol = smiles::parse("CO").unwrap().with_explicit_hydrogens().unwrap();
        assert_eq!(mol.atom_count(), 6);
        assert!(!mol.has_implicit_hydrogens());
        assert_eq!(mol.total_hydrogens(0), 3);
        assert_eq!(mol.degree(1), 2);
        assert!(mol.atoms().skip(2).all(|a| a.element.is_hydrogen()));
    }

    #[test]
    fn explicit_hydrogens_get_coordinates() {
        let mol = smiles::parse("C").unwrap();
        let mol = mol.with_conformer(vec![Point3::new(1.0, 2.0, 3.0)]).unwrap();
        let mol = mol.with_explicit_hydrogens().unwrap();
        let conf = mol.conformer(-1).unwrap();
        assert_eq!(conf.positions().len(), 5);
        for h in 1..5 {
            let d = (conf.positions()[h] - conf.positions()[0]).norm();
            assert!(d > 0.5 && d < 1.5);
        }
    }

    #[test]
    fn conformer_selection_by_id() {
        let mut b = MoleculeBuilder::new();
        b.add_atom(Element::C);
        b.add_conformer(vec![Point3::new(0.0, 0.0, 1.0)]);
        b.add_conformer(vec![Point3::new(0.0, 0.0, 2.0)]);
        let mol = b.build().unwrap();
        assert_eq!(mol.conformer(-1).unwrap().positions()[0].z, 1.0);
        assert_eq!(mol.conformer(1).unwrap().positions()[0].z, 2.0);
        assert!(mol.conformer(2).is_none());
    }

    #[test]
    fn ring_queries_use_sssr() {
        let mol = smiles::parse("C1CCC2CCCCC2C1").unwrap();
        assert_eq!(mol.sssr().len(), 2);
        assert_eq!(mol.ring_membership(3), 2);
        assert_eq!(mol.smallest_ring_size(0), Some(6));
        assert_eq!(mol.ring_bond_count(3), 3);
        assert!(mol.bonds().all(|b| b.in_ring));
        assert_eq!(mol.graph().edge_count(), 11);
    }

    #[test]
    fn search_through_trait_object() {
        let mol = smiles::parse("OCCO").unwrap();
        let source: &dyn SourceMolecule = &mol;
        assert_eq!(source.kind(), Molecule::KIND);
        let hits = source.as_search().find_matches("[OX2]").unwrap();
        assert_eq!(hits, vec![vec![0], vec![3]]);
    }
}
