use super::error::PrepareError;
use crate::core::models::atom::{PseudoKind, SetupAtom};
use crate::core::models::setup::MoleculeSetup;
use crate::core::utils::geometry;
use nalgebra::Point3;
use tracing::{debug, warn};

pub const WATER_TYPE: &str = "W";

/// Places hydration pseudo-atoms on a setup.
pub trait Hydrator {
    /// Returns the number of waters added.
    fn hydrate(&self, setup: &mut MoleculeSetup) -> Result<usize, PrepareError>;
}

/// Water placement on hydrogen-bond donors and acceptors.
///
/// | type    | neighbours | waters | geometry                    |
/// |---------|-----------:|-------:|-----------------------------|
/// | HD      | 1          | 1      | along the bond              |
/// | OA, SA  | 1          | 2      | trigonal lone pairs         |
/// | OA, SA  | 2          | 2      | tetrahedral lone pairs      |
/// | NA      | 1          | 1      | along the bond              |
/// | NA      | 2, 3       | 1      | opposite the neighbours     |
#[derive(Debug, Clone, Copy)]
pub struct LegacyHydrator {
    distance: f64,
}

impl Default for LegacyHydrator {
    fn default() -> Self {
        Self { distance: 3.0 }
    }
}

impl LegacyHydrator {
    pub fn with_distance(distance: f64) -> Self {
        Self { distance }
    }

    fn place(&self, setup: &MoleculeSetup, anchor: usize, atom_type: &str) -> Option<Vec<Point3<f64>>> {
        let origin = setup.atoms()[anchor].position;
        let neighbors: Vec<usize> = setup.real_neighbors(anchor).collect();
        let at = |i: usize| setup.atoms()[neighbors[i]].position;
        let d = self.distance;
        match (atom_type, neighbors.len()) {
            ("HD" | "NA", 1) => Some(vec![geometry::extend_bond(&origin, &at(0), d)]),
            ("NA", 2 | 3) => {
                let around: Vec<Point3<f64>> = (0..neighbors.len()).map(at).collect();
                geometry::opposite_of_neighbors(&origin, &around, d).map(|p| vec![p])
            }
            ("OA" | "SA", 1) => {
                let plane_ref = setup
                    .real_neighbors(neighbors[0])
                    .find(|&n| n != anchor)
                    .map(|n| setup.atoms()[n].position);
                Some(geometry::trigonal_lone_pairs(&origin, &at(0), plane_ref.as_ref(), d).to_vec())
            }
            ("OA" | "SA", 2) => {
                geometry::tetrahedral_lone_pairs(&origin, &at(0), &at(1), d).map(|p| p.to_vec())
            }
            _ => None,
        }
    }
}

impl Hydrator for LegacyHydrator {
    fn hydrate(&self, setup: &mut MoleculeSetup) -> Result<usize, PrepareError> {
        let mut placements: Vec<(usize, Vec<Point3<f64>>)> = Vec::new();
        for (index, atom) in setup.atoms().iter().enumerate() {
            if atom.ignore || atom.is_pseudo() {
                continue;
            }
            let Some(atom_type) = atom.atom_type.as_deref() else {
                continue;
            };
            if !matches!(atom_type, "HD" | "OA" | "SA" | "NA") {
                continue;
            }
            match self.place(setup, index, atom_type) {
                Some(waters) => placements.push((index, waters)),
                None => warn!(
                    atom = index,
                    atom_type,
                    neighbors = setup.real_neighbors(index).count(),
                    "Cannot place water molecules on this atom"
                ),
            }
        }

        let mut added = 0;
        for (anchor, waters) in placements {
            for position in waters {
                setup.add_pseudo_atom(SetupAtom::pseudo(PseudoKind::Water, WATER_TYPE, position), anchor);
                added += 1;
            }
            if let Some(atom) = setup.atom_mut(anchor) {
                atom.has_interaction_vector = true;
            }
        }
        debug!(waters = added, "Hydrated molecule");
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::atom_typer::{AtomTyper, SmartsAtomTyper};
    use crate::engine::config::default_atom_type_rules;
    use crate::engine::fixtures;

    fn hydrated(input: &str) -> (MoleculeSetup, usize) {
        let mol = fixtures::molecule(input);
        let mut setup = fixtures::setup(input);
        SmartsAtomTyper::new(default_atom_type_rules())
            .assign(&mut setup, &mol)
            .unwrap();
        setup.merge_terminal_atoms(&["H".to_string()]);
        let added = LegacyHydrator::default().hydrate(&mut setup).unwrap();
        (setup, added)
    }

    #[test]
    fn methanol_gets_waters_on_oxygen_and_donor_hydrogen() {
        // C0 O1, H2-H4 on C0 (merged), H5 on O1 (HD).
        let (setup, added) = hydrated("CO");
        assert_eq!(added, 3);
        assert!(setup.atoms()[1].has_interaction_vector);
        assert!(setup.atoms()[5].has_interaction_vector);
        assert!(!setup.atoms()[0].has_interaction_vector);
        let waters: Vec<&SetupAtom> = setup
            .atoms()
            .iter()
            .filter(|a| a.pseudo == Some(PseudoKind::Water))
            .collect();
        assert_eq!(waters.len(), 3);
        assert!(waters.iter().all(|w| w.atom_type.as_deref() == Some("W")));
    }

    #[test]
    fn waters_sit_at_the_hydration_distance() {
        let (setup, _) = hydrated("CC=O");
        let oxygen = setup.atoms()[2].position;
        let waters: Vec<usize> = setup.atoms()[2]
            .neighbors
            .iter()
            .copied()
            .filter(|&n| setup.atoms()[n].is_pseudo())
            .collect();
        assert_eq!(waters.len(), 2);
        for w in waters {
            let d = (setup.atoms()[w].position - oxygen).norm();
            assert!((d - 3.0).abs() < 1e-9);
            let bond = setup.bond(2, w).unwrap();
            assert!(!bond.rotatable);
        }
    }

    #[test]
    fn untyped_setup_is_left_alone() {
        let mut setup = fixtures::setup("CO");
        assert_eq!(LegacyHydrator::default().hydrate(&mut setup).unwrap(), 0);
    }
}
