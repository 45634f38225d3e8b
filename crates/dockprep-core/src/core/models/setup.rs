use super::atom::SetupAtom;
use super::bond::{BondKey, BondOrder, SetupBond};
use super::flex::FlexTree;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SetupError {
    #[error("Bond ({a}, {b}) references an atom outside the {atom_count}-atom table")]
    BondOutOfRange {
        a: usize,
        b: usize,
        atom_count: usize,
    },
    #[error("Atom {0} cannot be bonded to itself")]
    SelfBond(usize),
    #[error("Ring references atom {atom} outside the {atom_count}-atom table")]
    RingOutOfRange { atom: usize, atom_count: usize },
}

/// A perceived ring as a cyclic sequence of atom indices.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ring(Vec<usize>);

impl Ring {
    pub fn new(atoms: Vec<usize>) -> Self {
        Self(atoms)
    }

    pub fn atoms(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Bonds between consecutive atoms, including the closing bond.
    pub fn bonds(&self) -> impl Iterator<Item = BondKey> + '_ {
        let n = self.0.len();
        (0..n).map(move |i| BondKey::new(self.0[i], self.0[(i + 1) % n]))
    }

    pub fn contains_bond(&self, key: BondKey) -> bool {
        self.bonds().any(|k| k == key)
    }

    pub fn sorted_atoms(&self) -> Vec<usize> {
        let mut atoms = self.0.clone();
        atoms.sort_unstable();
        atoms
    }
}

/// Canonical heavy-atom SMILES and the atom index behind each SMILES position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmilesRecord {
    pub smiles: String,
    pub atom_order: Vec<usize>,
}

/// The mutable aggregate every preparation stage works on.
///
/// Atom indices are stable for the lifetime of the setup: merged atoms are
/// flagged `ignore`, pseudo-atoms are appended at the end, and opened ring
/// bonds stay in the bond table flagged `broken`.
#[derive(Debug, Clone, PartialEq)]
pub struct MoleculeSetup {
    name: Option<String>,
    atoms: Vec<SetupAtom>,
    bonds: BTreeMap<BondKey, SetupBond>,
    rings: Vec<Ring>,
    has_implicit_hydrogens: bool,
    smiles: Option<SmilesRecord>,
    flexibility: Option<FlexTree>,
}

impl MoleculeSetup {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn atoms(&self) -> &[SetupAtom] {
        &self.atoms
    }

    pub fn atom(&self, index: usize) -> Option<&SetupAtom> {
        self.atoms.get(index)
    }

    pub fn atom_mut(&mut self, index: usize) -> Option<&mut SetupAtom> {
        self.atoms.get_mut(index)
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// Number of atoms that take part in the flexible graph.
    pub fn active_atom_count(&self) -> usize {
        self.atoms.iter().filter(|a| !a.ignore).count()
    }

    pub fn bonds(&self) -> &BTreeMap<BondKey, SetupBond> {
        &self.bonds
    }

    pub fn bond(&self, a: usize, b: usize) -> Option<&SetupBond> {
        self.bonds.get(&BondKey::new(a, b))
    }

    pub fn bond_mut(&mut self, a: usize, b: usize) -> Option<&mut SetupBond> {
        self.bonds.get_mut(&BondKey::new(a, b))
    }

    pub fn rings(&self) -> &[Ring] {
        &self.rings
    }

    pub fn is_aromatic_ring(&self, ring: &Ring) -> bool {
        ring.atoms().iter().all(|&i| self.atoms[i].is_aromatic)
    }

    pub fn has_implicit_hydrogens(&self) -> bool {
        self.has_implicit_hydrogens
    }

    pub fn smiles(&self) -> Option<&SmilesRecord> {
        self.smiles.as_ref()
    }

    pub fn flexibility(&self) -> Option<&FlexTree> {
        self.flexibility.as_ref()
    }

    pub(crate) fn with_flexibility(mut self, tree: FlexTree) -> Self {
        self.flexibility = Some(tree);
        self
    }

    /// Neighbours that are neither ignored nor pseudo-atoms.
    pub fn real_neighbors(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.atoms[index]
            .neighbors
            .iter()
            .copied()
            .filter(|&n| !self.atoms[n].ignore && !self.atoms[n].is_pseudo())
    }

    pub fn total_charge(&self) -> f64 {
        self.atoms
            .iter()
            .filter(|a| !a.ignore)
            .map(|a| a.partial_charge)
            .sum()
    }

    pub fn set_atom_type(&mut self, index: usize, label: impl Into<String>) {
        if let Some(atom) = self.atoms.get_mut(index) {
            atom.atom_type = Some(label.into());
        }
    }

    /// Removes the adjacency between two atoms. The bond entry, if any, is kept.
    pub fn unlink(&mut self, a: usize, b: usize) {
        self.atoms[a].unlink(b);
        self.atoms[b].unlink(a);
    }

    /// Appends a pseudo-atom bonded to `anchor` by a non-rotatable single bond.
    pub fn add_pseudo_atom(&mut self, atom: SetupAtom, anchor: usize) -> usize {
        let index = self.atoms.len();
        self.atoms.push(atom);
        self.atoms[index].link(anchor);
        self.atoms[anchor].link(index);
        self.bonds
            .insert(BondKey::new(anchor, index), SetupBond::new(BondOrder::Single, false));
        index
    }

    /// Folds terminal atoms of the given types into their sole neighbour.
    ///
    /// The merged atom is flagged `ignore`, its partial charge moves to the
    /// parent and the adjacency between the two is removed. Returns the merged
    /// indices in ascending order.
    pub fn merge_terminal_atoms(&mut self, types: &[String]) -> Vec<usize> {
        if types.is_empty() {
            return Vec::new();
        }
        let types: BTreeSet<&str> = types.iter().map(String::as_str).collect();
        let mut merged = Vec::new();
        for index in 0..self.atoms.len() {
            let atom = &self.atoms[index];
            if atom.ignore || atom.degree() != 1 {
                continue;
            }
            let Some(label) = atom.atom_type.as_deref() else {
                continue;
            };
            if !types.contains(label) {
                continue;
            }
            let parent = atom.neighbors[0];
            let charge = atom.partial_charge;
            self.atoms[parent].partial_charge += charge;
            self.atoms[index].partial_charge = 0.0;
            self.atoms[index].ignore = true;
            self.unlink(index, parent);
            merged.push(index);
        }
        debug!(count = merged.len(), "Merged terminal atoms into their parents");
        merged
    }

    /// Plain-text table of the setup, one atom per line followed by the bonds.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:>5} {:>9} {:>9} {:>9} {:>8} {:>6} {:<4} {}",
            "idx", "x", "y", "z", "charge", "ign", "type", "neighbors"
        );
        for (i, atom) in self.atoms.iter().enumerate() {
            let neighbors = atom
                .neighbors
                .iter()
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            let _ = writeln!(
                out,
                "{:>5} {:>9.3} {:>9.3} {:>9.3} {:>8.3} {:>6} {:<4} {}",
                i,
                atom.position.x,
                atom.position.y,
                atom.position.z,
                atom.partial_charge,
                atom.ignore,
                atom.atom_type.as_deref().unwrap_or("-"),
                neighbors
            );
        }
        let _ = writeln!(out, "Total charge: {:.3}", self.total_charge());

        let vectors: Vec<String> = self
            .atoms
            .iter()
            .enumerate()
            .filter(|(_, a)| a.has_interaction_vector)
            .map(|(i, _)| i.to_string())
            .collect();
        if !vectors.is_empty() {
            let _ = writeln!(out, "Interaction vectors on atoms: {}", vectors.join(" "));
        }

        let _ = writeln!(out, "Bonds:");
        for (key, bond) in &self.bonds {
            let _ = writeln!(
                out,
                "  {} {} rotatable={} ring={} rigid_ring={}{}",
                key,
                bond.order,
                bond.rotatable,
                bond.in_ring,
                bond.in_rigid_ring,
                if bond.broken { " broken" } else { "" }
            );
        }
        out
    }
}

/// Incremental constructor for [`MoleculeSetup`], used by toolkit adapters and tests.
#[derive(Debug, Default)]
pub struct MoleculeSetupBuilder {
    name: Option<String>,
    atoms: Vec<SetupAtom>,
    bonds: Vec<(usize, usize, BondOrder, bool)>,
    rings: Vec<Vec<usize>>,
    has_implicit_hydrogens: bool,
    smiles: Option<SmilesRecord>,
}

impl MoleculeSetupBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    /// Appends an atom and returns its index.
    pub fn add_atom(&mut self, atom: SetupAtom) -> usize {
        self.atoms.push(atom);
        self.atoms.len() - 1
    }

    pub fn add_bond(&mut self, a: usize, b: usize, order: BondOrder, in_ring: bool) -> &mut Self {
        self.bonds.push((a, b, order, in_ring));
        self
    }

    pub fn add_ring(&mut self, atoms: Vec<usize>) -> &mut Self {
        self.rings.push(atoms);
        self
    }

    pub fn implicit_hydrogens(&mut self, present: bool) -> &mut Self {
        self.has_implicit_hydrogens = present;
        self
    }

    pub fn smiles(&mut self, record: SmilesRecord) -> &mut Self {
        self.smiles = Some(record);
        self
    }

    pub fn build(self) -> Result<MoleculeSetup, SetupError> {
        let atom_count = self.atoms.len();
        let mut atoms = self.atoms;
        for atom in &mut atoms {
            atom.neighbors.clear();
        }
        let mut bonds = BTreeMap::new();
        for (a, b, order, in_ring) in self.bonds {
            if a >= atom_count || b >= atom_count {
                return Err(SetupError::BondOutOfRange { a, b, atom_count });
            }
            if a == b {
                return Err(SetupError::SelfBond(a));
            }
            atoms[a].link(b);
            atoms[b].link(a);
            bonds.insert(BondKey::new(a, b), SetupBond::new(order, in_ring));
        }
        let mut rings = Vec::with_capacity(self.rings.len());
        for ring in self.rings {
            if let Some(&atom) = ring.iter().find(|&&i| i >= atom_count) {
                return Err(SetupError::RingOutOfRange { atom, atom_count });
            }
            rings.push(Ring::new(ring));
        }
        Ok(MoleculeSetup {
            name: self.name,
            atoms,
            bonds,
            rings,
            has_implicit_hydrogens: self.has_implicit_hydrogens,
            smiles: self.smiles,
            flexibility: None,
        })
    }
}
