use crate::core::io::flexres::adapt_for_flexres;
use crate::core::io::pdbqt::{PdbqtFile, WriteError, WriteOptions};
use crate::core::io::traits::SetupWriter;
use crate::core::models::setup::MoleculeSetup;
use crate::engine::atom_typer::{AtomTyper, SmartsAtomTyper};
use crate::engine::bond_typer::{BondRules, BondTyper, LegacyBondTyper};
use crate::engine::config::PreparerConfig;
use crate::engine::error::PrepareError;
use crate::engine::flexibility::build_flexibility;
use crate::engine::hydrate::{Hydrator, LegacyHydrator};
use crate::engine::macrocycle::{
    MacrocycleBreaker, MacrocycleRules, RingBreakPlan, validate_external_breaks,
};
use crate::engine::reactive::assign_reactive_types;
use crate::engine::registry::{SetupOptions, SetupRegistry};
use crate::engine::state::PrepState;
use crate::toolkit::SourceMolecule;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// Per-molecule inputs of a preparation.
#[derive(Debug, Clone, PartialEq)]
pub struct PrepareOptions {
    /// Atom whose rigid body becomes the tree root.
    pub root_atom_index: Option<usize>,
    /// Atoms whose bonds stay rotatable even when they have a single neighbour.
    pub not_terminal_atoms: Vec<usize>,
    /// Ring bonds to open instead of scoring macrocycle breaks.
    pub delete_ring_bonds: Vec<(usize, usize)>,
    /// Glue coordinates keyed by the endpoint atom of an opened bond.
    pub glue_pseudo_atoms: BTreeMap<usize, Vec<f64>>,
    /// Conformer to read coordinates from; `-1` selects the default one.
    pub conformer_id: i32,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            root_atom_index: None,
            not_terminal_atoms: Vec::new(),
            delete_ring_bonds: Vec::new(),
            glue_pseudo_atoms: BTreeMap::new(),
            conformer_id: -1,
        }
    }
}

/// Result of one run of the pipeline.
#[derive(Debug, Clone)]
pub struct Preparation {
    pub setup: MoleculeSetup,
    /// `false` when the molecule cannot be written; `log` says why.
    pub is_ok: bool,
    pub log: String,
    pub state: PrepState,
    pub ring_breaks: Option<RingBreakPlan>,
}

impl Preparation {
    fn failed(setup: MoleculeSetup, log: String, state: PrepState) -> Self {
        Self {
            setup,
            is_ok: false,
            log,
            state,
            ring_breaks: None,
        }
    }
}

/// Runs the preparation pipeline on one molecule.
///
/// # Arguments
///
/// * `mol` - The toolkit molecule, with explicit hydrogens and a 3D conformer.
/// * `config` - A validated preparer configuration.
/// * `registry` - Setup constructors by molecule kind.
/// * `options` - Per-molecule root, terminal-atom and ring-break inputs.
///
/// # Return
///
/// Returns the final setup with its tree. A molecule with implicit hydrogens
/// or untyped atoms is not an error: it comes back with `is_ok = false` and a
/// log describing the problem.
///
/// # Errors
///
/// Returns a [`PrepareError`] for unsupported inputs, missing conformers,
/// invalid ring breaks or roots, toolkit failures, rigid-body graphs that are
/// not trees, and when reactive typing is requested.
#[instrument(skip_all, name = "prepare_workflow")]
pub fn prepare(
    mol: &dyn SourceMolecule,
    config: &PreparerConfig,
    registry: &SetupRegistry,
    options: &PrepareOptions,
) -> Result<Preparation, PrepareError> {
    let mut state = PrepState::default();
    let setup_options = SetupOptions {
        keep_chorded_rings: config.keep_chorded_rings,
        keep_equivalent_rings: config.keep_equivalent_rings,
        conformer_id: options.conformer_id,
    };
    let mut setup = registry.construct(mol, &setup_options)?;
    let explicit_breaks =
        validate_external_breaks(&setup, &options.delete_ring_bonds, &options.glue_pseudo_atoms)?;
    let name = setup.name().unwrap_or_default().to_string();
    info!(name = %name, atoms = setup.atom_count(), "Starting preparation");

    if setup.has_implicit_hydrogens() {
        state.advance(PrepState::Failed)?;
        warn!("Skipping mol (name={name}): has implicit hydrogens");
        return Ok(Preparation::failed(
            setup,
            "molecule has implicit hydrogens".to_string(),
            state,
        ));
    }

    let search = mol.as_search();
    SmartsAtomTyper::new(config.atom_type_smarts.clone()).assign(&mut setup, search)?;
    state.advance(PrepState::Typed)?;

    let merged = setup.merge_terminal_atoms(&config.merge_these_atom_types);
    debug!(merged = merged.len(), "Merged terminal atoms");
    state.advance(PrepState::Merged)?;

    let rules = BondRules {
        flexible_amides: config.flexible_amides,
        rigidify_bonds_smarts: &config.rigidify_bonds_smarts,
        rigidify_bonds_indices: &config.rigidify_bonds_indices,
    };
    LegacyBondTyper.assign(&mut setup, search, &rules)?;
    state.advance(PrepState::BondTyped)?;

    if config.hydrate {
        LegacyHydrator::default().hydrate(&mut setup)?;
        state.advance(PrepState::Hydrated)?;
    }

    let plan = if config.rigid_macrocycles {
        if !explicit_breaks.is_empty() {
            warn!(
                bonds = explicit_breaks.len(),
                "Ring bonds to delete are ignored with rigid macrocycles"
            );
        }
        MacrocycleBreaker::rigid(&setup)
    } else {
        MacrocycleBreaker::new(MacrocycleRules {
            min_ring_size: config.min_ring_size,
            max_ring_size: config.max_ring_size,
            double_bond_penalty: config.double_bond_penalty,
        })
        .plan(&setup, &explicit_breaks)
    };
    state.advance(PrepState::RingResolved)?;

    let setup = build_flexibility(
        &setup,
        &plan,
        &options.glue_pseudo_atoms,
        options.root_atom_index,
        &options.not_terminal_atoms,
    )?;
    state.advance(PrepState::TreeBuilt)?;

    if let (Some(smarts), Some(idx)) = (&config.reactive_smarts, config.reactive_smarts_idx) {
        let reactive = assign_reactive_types(&setup, search, smarts, idx)?;
        for types in &reactive {
            info!(?types, "Reactive atom types");
        }
        return Err(PrepareError::Unimplemented(
            "reactive atom types are computed but not applied to the setup",
        ));
    }

    let mut log = String::new();
    for (index, atom) in setup.atoms().iter().enumerate() {
        if !atom.ignore && atom.atom_type.is_none() {
            let _ = writeln!(log, "atom number {index} has None type, mol name: {name}");
        }
    }
    let is_ok = log.is_empty();
    if is_ok {
        state.advance(PrepState::Done)?;
        info!(
            name = %name,
            torsions = setup.flexibility().map_or(0, |t| t.torsion_count()),
            "Preparation finished"
        );
    } else {
        state.advance(PrepState::Failed)?;
        warn!(name = %name, "Preparation left untyped atoms");
    }

    Ok(Preparation {
        setup,
        is_ok,
        log,
        state,
        ring_breaks: Some(plan),
    })
}

/// A reusable preparer that remembers the outcome of its last call.
///
/// Each call to [`MoleculePreparation::prepare`] overwrites the cached setup,
/// success flag and log, which the writer methods then read.
#[derive(Debug, Clone)]
pub struct MoleculePreparation {
    config: PreparerConfig,
    registry: SetupRegistry,
    setup: Option<MoleculeSetup>,
    is_ok: bool,
    log: String,
    state: PrepState,
    ring_breaks: Option<RingBreakPlan>,
}

impl MoleculePreparation {
    /// Creates a preparer after validating `config`.
    pub fn new(config: PreparerConfig) -> Result<Self, PrepareError> {
        config.validate()?;
        if config.keep_chorded_rings && !config.keep_equivalent_rings {
            warn!("keep_equivalent_rings=false ignored because keep_chorded_rings=true");
        }
        Ok(Self {
            config,
            registry: SetupRegistry::default(),
            setup: None,
            is_ok: false,
            log: String::new(),
            state: PrepState::Unprepared,
            ring_breaks: None,
        })
    }

    /// Creates a preparer from a key/value table; unknown keys are rejected.
    pub fn from_config(table: toml::Table) -> Result<Self, PrepareError> {
        Self::new(PreparerConfig::from_table(table)?)
    }

    pub fn get_defaults() -> toml::Table {
        PreparerConfig::defaults_table()
    }

    pub fn config(&self) -> &PreparerConfig {
        &self.config
    }

    pub fn registry_mut(&mut self) -> &mut SetupRegistry {
        &mut self.registry
    }

    pub fn setup(&self) -> Option<&MoleculeSetup> {
        self.setup.as_ref()
    }

    pub fn is_ok(&self) -> bool {
        self.is_ok
    }

    pub fn log(&self) -> &str {
        &self.log
    }

    pub fn state(&self) -> PrepState {
        self.state
    }

    pub fn ring_breaks(&self) -> Option<&RingBreakPlan> {
        self.ring_breaks.as_ref()
    }

    /// Prepares `mol` and caches the outcome. On error the cache is cleared
    /// and the log holds the error message.
    pub fn prepare(
        &mut self,
        mol: &dyn SourceMolecule,
        options: &PrepareOptions,
    ) -> Result<(), PrepareError> {
        match prepare(mol, &self.config, &self.registry, options) {
            Ok(result) => {
                self.setup = Some(result.setup);
                self.is_ok = result.is_ok;
                self.log = result.log;
                self.state = result.state;
                self.ring_breaks = result.ring_breaks;
                Ok(())
            }
            Err(e) => {
                self.setup = None;
                self.is_ok = false;
                self.log = e.to_string();
                self.state = PrepState::Failed;
                self.ring_breaks = None;
                Err(e)
            }
        }
    }

    fn write_options(&self) -> WriteOptions {
        WriteOptions {
            add_index_map: self.config.add_index_map,
            remove_smiles: self.config.remove_smiles,
        }
    }

    fn writable_setup(&self) -> Result<&MoleculeSetup, WriteError> {
        let setup = self.setup.as_ref().ok_or(WriteError::NotPrepared)?;
        if !self.is_ok {
            return Err(WriteError::NotOk {
                log: self.log.clone(),
            });
        }
        Ok(setup)
    }

    /// The last prepared molecule as a PDBQT string.
    pub fn write_pdbqt_string(&self) -> Result<String, WriteError> {
        PdbqtFile::write_string(self.writable_setup()?, &self.write_options())
    }

    pub fn write_pdbqt_file<P: AsRef<Path>>(&self, path: P) -> Result<(), WriteError> {
        PdbqtFile::write_to_path(self.writable_setup()?, &self.write_options(), path)
    }

    /// The last prepared molecule as a flexible receptor residue.
    pub fn write_flexres_pdbqt_string(
        &self,
        res: &str,
        chain: &str,
        num: i32,
    ) -> Result<String, WriteError> {
        Ok(adapt_for_flexres(&self.write_pdbqt_string()?, res, chain, num))
    }

    /// Text dump of the last setup and its macrocycle decisions.
    pub fn show_setup(&self) -> Option<String> {
        let setup = self.setup.as_ref()?;
        let mut out = String::from("Molecule setup\n\n");
        out.push_str(&setup.describe());
        if let Some(plan) = &self.ring_breaks {
            out.push('\n');
            out.push_str(&plan.describe());
        }
        Some(out)
    }
}
