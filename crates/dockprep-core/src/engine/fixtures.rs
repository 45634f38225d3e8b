use crate::core::models::setup::MoleculeSetup;
use crate::engine::registry::SetupOptions;
use crate::toolkit::{Molecule, adapter, smiles};
use nalgebra::Point3;

/// Parses `input`, makes hydrogens explicit and lays the atoms on a helix.
pub fn molecule(input: &str) -> Molecule {
    let mol = smiles::parse(input)
        .unwrap()
        .with_explicit_hydrogens()
        .unwrap();
    let positions = (0..mol.atom_count())
        .map(|i| {
            let t = i as f64 * 1.2;
            Point3::new(2.0 * t.cos(), 2.0 * t.sin(), 0.5 + 0.3 * i as f64)
        })
        .collect();
    mol.with_conformer(positions).unwrap()
}

pub fn setup(input: &str) -> MoleculeSetup {
    adapter::setup_from_molecule(&molecule(input), &SetupOptions::default()).unwrap()
}
