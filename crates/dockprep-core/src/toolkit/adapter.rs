use super::molecule::Molecule;
use super::{SourceMolecule, charges, rings, smiles};
use crate::core::models::atom::SetupAtom;
use crate::core::models::setup::{MoleculeSetup, MoleculeSetupBuilder};
use crate::engine::error::{Precondition, PrepareError};
use crate::engine::registry::SetupOptions;
use tracing::debug;

/// Builds a [`MoleculeSetup`] from a built-in [`Molecule`].
///
/// Partial charges are taken from the molecule when every atom carries one;
/// otherwise Gasteiger charges are computed.
///
/// # Errors
///
/// Returns [`PrepareError::UnsupportedInput`] if `source` is not a [`Molecule`]
/// and [`Precondition::NoConformer`] if the requested conformer does not exist.
pub fn setup_from_molecule(
    source: &dyn SourceMolecule,
    options: &SetupOptions,
) -> Result<MoleculeSetup, PrepareError> {
    let mol = source
        .as_any()
        .downcast_ref::<Molecule>()
        .ok_or_else(|| PrepareError::UnsupportedInput {
            kind: source.kind().to_string(),
        })?;
    let conformer = mol
        .conformer(options.conformer_id)
        .ok_or(Precondition::NoConformer {
            conformer_id: options.conformer_id,
        })?;

    let charges: Vec<f64> = match mol
        .atoms()
        .map(|a| a.partial_charge)
        .collect::<Option<Vec<f64>>>()
    {
        Some(given) => given,
        None => charges::gasteiger_charges(mol),
    };

    let mut builder = MoleculeSetupBuilder::new();
    if let Some(name) = mol.name() {
        builder.name(name);
    }
    for (index, atom) in mol.atoms().enumerate() {
        let mut setup_atom = SetupAtom::new(atom.element, conformer.positions()[index]);
        setup_atom.partial_charge = charges[index];
        setup_atom.formal_charge = atom.formal_charge;
        setup_atom.is_aromatic = atom.is_aromatic;
        builder.add_atom(setup_atom);
    }
    for bond in mol.bonds() {
        builder.add_bond(bond.begin, bond.end, bond.order, bond.in_ring);
    }
    let perceived = rings::perceive(
        mol.graph(),
        options.keep_chorded_rings,
        options.keep_equivalent_rings,
    );
    debug!(rings = perceived.len(), "Perceived rings");
    for ring in perceived {
        builder.add_ring(ring);
    }
    builder
        .implicit_hydrogens(mol.has_implicit_hydrogens())
        .smiles(smiles::write(mol));
    Ok(builder.build()?)
}
