use super::element::Element;
use nalgebra::Point3;

/// Kind of synthetic atom appended to a setup after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PseudoKind {
    /// Glue point closing an opened macrocycle bond; the payload is the glue
    /// label number (`G0`..`G3`).
    Glue(u8),
    /// Hydration water attached to a polar anchor.
    Water,
}

/// An atom of the preparation graph.
///
/// Atoms are addressed by their index in [`MoleculeSetup`](super::setup::MoleculeSetup)
/// and keep that index for the whole pipeline: merged atoms are flagged with
/// `ignore` instead of being removed.
#[derive(Debug, Clone, PartialEq)]
pub struct SetupAtom {
    /// The chemical element, or [`Element::DUMMY`] for pseudo-atoms.
    pub element: Element,
    /// Cartesian coordinates in Angstroms.
    pub position: Point3<f64>,
    /// Partial charge in elementary charge units.
    pub partial_charge: f64,
    pub formal_charge: i8,
    /// Docking type label. `None` until typing has run.
    pub atom_type: Option<String>,
    /// Excluded from the flexible graph and from the output.
    pub ignore: bool,
    /// Current adjacency, kept sorted. Mutated by merges and ring breaks.
    pub neighbors: Vec<usize>,
    pub is_aromatic: bool,
    pub pseudo: Option<PseudoKind>,
    /// Set on atoms that carry hydration interaction vectors. Diagnostic only.
    pub has_interaction_vector: bool,
}

impl SetupAtom {
    pub fn new(element: Element, position: Point3<f64>) -> Self {
        Self {
            element,
            position,
            partial_charge: 0.0,
            formal_charge: 0,
            atom_type: None,
            ignore: false,
            neighbors: Vec::new(),
            is_aromatic: false,
            pseudo: None,
            has_interaction_vector: false,
        }
    }

    pub fn pseudo(kind: PseudoKind, label: &str, position: Point3<f64>) -> Self {
        Self {
            atom_type: Some(label.to_string()),
            pseudo: Some(kind),
            ..Self::new(Element::DUMMY, position)
        }
    }

    pub fn is_pseudo(&self) -> bool {
        self.pseudo.is_some()
    }

    pub fn degree(&self) -> usize {
        self.neighbors.len()
    }

    pub(crate) fn link(&mut self, other: usize) {
        if let Err(pos) = self.neighbors.binary_search(&other) {
            self.neighbors.insert(pos, other);
        }
    }

    pub(crate) fn unlink(&mut self, other: usize) -> bool {
        match self.neighbors.binary_search(&other) {
            Ok(pos) => {
                self.neighbors.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    /// Label used in the PDBQT atom-name column.
    pub fn display_name(&self) -> String {
        match (&self.pseudo, &self.atom_type) {
            (Some(_), Some(label)) => label.clone(),
            _ => self.element.symbol().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_keeps_neighbors_sorted_and_unique() {
        let mut atom = SetupAtom::new(Element::C, Point3::origin());
        atom.link(5);
        atom.link(1);
        atom.link(3);
        atom.link(1);
        assert_eq!(atom.neighbors, vec![1, 3, 5]);
        assert_eq!(atom.degree(), 3);
    }

    #[test]
    fn unlink_reports_whether_edge_existed() {
        let mut atom = SetupAtom::new(Element::N, Point3::origin());
        atom.link(2);
        assert!(atom.unlink(2));
        assert!(!atom.unlink(2));
        assert!(atom.neighbors.is_empty());
    }

    #[test]
    fn pseudo_atoms_are_named_by_their_label() {
        let glue = SetupAtom::pseudo(PseudoKind::Glue(1), "G1", Point3::new(1.0, 2.0, 3.0));
        assert!(glue.is_pseudo());
        assert_eq!(glue.element, Element::DUMMY);
        assert_eq!(glue.display_name(), "G1");

        let carbon = SetupAtom::new(Element::C, Point3::origin());
        assert_eq!(carbon.display_name(), "C");
    }
}
