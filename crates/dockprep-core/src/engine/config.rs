use crate::toolkit::smarts::Pattern;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("reactive_smarts and reactive_smarts_idx require each other")]
    ReactivePairing,

    #[error("Unknown configuration keys: {}", .0.join(", "))]
    UnknownKeys(Vec<String>),

    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// One atom-typing rule: the atom at 1-based position `idx` of every match
/// of `smarts` receives `atype`. Later rules override earlier ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AtomTypeRule {
    pub smarts: String,
    pub atype: String,
    #[serde(default = "first_atom")]
    pub idx: usize,
}

fn first_atom() -> usize {
    1
}

impl AtomTypeRule {
    pub fn new(smarts: &str, atype: &str, idx: usize) -> Self {
        Self {
            smarts: smarts.to_string(),
            atype: atype.to_string(),
            idx,
        }
    }
}

const DEFAULT_ATOM_TYPES: &[(&str, &str, usize)] = &[
    ("[#1]", "H", 1),
    ("[#1][#7,#8,#9,#15,#16]", "HD", 1),
    ("[#5]", "B", 1),
    ("[C]", "C", 1),
    ("[c]", "A", 1),
    ("[#7]", "NA", 1),
    ("[#8]", "OA", 1),
    ("[#9]", "F", 1),
    ("[#12]", "Mg", 1),
    ("[#14]", "Si", 1),
    ("[#15]", "P", 1),
    ("[#16]", "S", 1),
    ("[#17]", "Cl", 1),
    ("[#20]", "Ca", 1),
    ("[#25]", "Mn", 1),
    ("[#26]", "Fe", 1),
    ("[#30]", "Zn", 1),
    ("[#35]", "Br", 1),
    ("[#53]", "I", 1),
    ("[#7X3v3][a]", "N", 1),
    ("[#7X3v3][#6X3]", "N", 1),
    ("[#7+1]", "N", 1),
    ("[SX2]", "SA", 1),
];

/// The built-in AutoDock4 typing rules.
pub fn default_atom_type_rules() -> Vec<AtomTypeRule> {
    DEFAULT_ATOM_TYPES
        .iter()
        .map(|&(smarts, atype, idx)| AtomTypeRule::new(smarts, atype, idx))
        .collect()
}

/// Settings of a [`MoleculePreparation`](crate::workflows::prepare::MoleculePreparation).
///
/// SMARTS atom positions (`idx`, `reactive_smarts_idx`, the pairs of
/// `rigidify_bonds_indices`) are 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PreparerConfig {
    pub merge_these_atom_types: Vec<String>,
    pub hydrate: bool,
    pub flexible_amides: bool,
    pub rigid_macrocycles: bool,
    pub min_ring_size: usize,
    pub max_ring_size: usize,
    pub keep_chorded_rings: bool,
    pub keep_equivalent_rings: bool,
    pub double_bond_penalty: f64,
    pub rigidify_bonds_smarts: Vec<String>,
    pub rigidify_bonds_indices: Vec<[usize; 2]>,
    pub add_index_map: bool,
    pub remove_smiles: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reactive_smarts: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reactive_smarts_idx: Option<usize>,
    pub atom_type_smarts: Vec<AtomTypeRule>,
}

impl Default for PreparerConfig {
    fn default() -> Self {
        Self {
            merge_these_atom_types: vec!["H".to_string()],
            hydrate: false,
            flexible_amides: false,
            rigid_macrocycles: false,
            min_ring_size: 7,
            max_ring_size: 33,
            keep_chorded_rings: false,
            keep_equivalent_rings: false,
            double_bond_penalty: 50.0,
            rigidify_bonds_smarts: Vec::new(),
            rigidify_bonds_indices: Vec::new(),
            add_index_map: false,
            remove_smiles: false,
            reactive_smarts: None,
            reactive_smarts_idx: None,
            atom_type_smarts: default_atom_type_rules(),
        }
    }
}

impl PreparerConfig {
    /// Every key accepted by [`PreparerConfig::from_table`].
    pub const KEYS: [&'static str; 16] = [
        "merge_these_atom_types",
        "hydrate",
        "flexible_amides",
        "rigid_macrocycles",
        "min_ring_size",
        "max_ring_size",
        "keep_chorded_rings",
        "keep_equivalent_rings",
        "double_bond_penalty",
        "rigidify_bonds_smarts",
        "rigidify_bonds_indices",
        "atom_type_smarts",
        "reactive_smarts",
        "reactive_smarts_idx",
        "add_index_map",
        "remove_smiles",
    ];

    /// Builds a validated configuration from a key/value table.
    ///
    /// Keys missing from the table take their default value. Unknown keys are
    /// each logged and then rejected together.
    pub fn from_table(table: toml::Table) -> Result<Self, ConfigError> {
        let unknown: Vec<String> = table
            .keys()
            .filter(|k| !Self::KEYS.contains(&k.as_str()))
            .cloned()
            .collect();
        for key in &unknown {
            error!("unexpected key \"{key}\" in preparation config");
        }
        if !unknown.is_empty() {
            return Err(ConfigError::UnknownKeys(unknown));
        }
        let config: PreparerConfig = table
            .try_into()
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let table: toml::Table =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_table(table)
    }

    /// The default configuration as a key/value table.
    pub fn defaults_table() -> toml::Table {
        Self::default().to_table()
    }

    pub fn to_table(&self) -> toml::Table {
        toml::Table::try_from(self).unwrap_or_default()
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reactive_smarts.is_some() != self.reactive_smarts_idx.is_some() {
            return Err(ConfigError::ReactivePairing);
        }
        if self.min_ring_size < 3 {
            return Err(ConfigError::InvalidValue {
                key: "min_ring_size",
                reason: format!("{} is smaller than the smallest ring", self.min_ring_size),
            });
        }
        if self.min_ring_size > self.max_ring_size {
            return Err(ConfigError::InvalidValue {
                key: "max_ring_size",
                reason: format!(
                    "{} is smaller than min_ring_size {}",
                    self.max_ring_size, self.min_ring_size
                ),
            });
        }
        if !self.double_bond_penalty.is_finite() || self.double_bond_penalty < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "double_bond_penalty",
                reason: format!("{} is not a non-negative number", self.double_bond_penalty),
            });
        }
        if self.rigidify_bonds_smarts.len() != self.rigidify_bonds_indices.len() {
            return Err(ConfigError::InvalidValue {
                key: "rigidify_bonds_indices",
                reason: format!(
                    "{} index pairs for {} patterns",
                    self.rigidify_bonds_indices.len(),
                    self.rigidify_bonds_smarts.len()
                ),
            });
        }
        for (smarts, pair) in self
            .rigidify_bonds_smarts
            .iter()
            .zip(&self.rigidify_bonds_indices)
        {
            let size = pattern_size("rigidify_bonds_smarts", smarts)?;
            for &idx in pair {
                check_position("rigidify_bonds_indices", smarts, idx, size)?;
            }
        }
        for rule in &self.atom_type_smarts {
            let size = pattern_size("atom_type_smarts", &rule.smarts)?;
            check_position("atom_type_smarts", &rule.smarts, rule.idx, size)?;
        }
        if let (Some(smarts), Some(idx)) = (&self.reactive_smarts, self.reactive_smarts_idx) {
            let size = pattern_size("reactive_smarts", smarts)?;
            check_position("reactive_smarts_idx", smarts, idx, size)?;
        }
        Ok(())
    }
}

fn pattern_size(key: &'static str, smarts: &str) -> Result<usize, ConfigError> {
    Pattern::parse(smarts)
        .map(|p| p.atoms().len())
        .map_err(|e| ConfigError::InvalidValue {
            key,
            reason: e.to_string(),
        })
}

fn check_position(
    key: &'static str,
    smarts: &str,
    idx: usize,
    size: usize,
) -> Result<(), ConfigError> {
    if idx == 0 || idx > size {
        return Err(ConfigError::InvalidValue {
            key,
            reason: format!("position {idx} is outside the {size} atoms of '{smarts}'"),
        });
    }
    Ok(())
}

/// Builder for [`PreparerConfig`] starting from the defaults.
#[derive(Debug, Default)]
pub struct PreparerConfigBuilder {
    config: PreparerConfig,
}

impl PreparerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge_these_atom_types(mut self, types: Vec<String>) -> Self {
        self.config.merge_these_atom_types = types;
        self
    }
    pub fn hydrate(mut self, hydrate: bool) -> Self {
        self.config.hydrate = hydrate;
        self
    }
    pub fn flexible_amides(mut self, flexible: bool) -> Self {
        self.config.flexible_amides = flexible;
        self
    }
    pub fn rigid_macrocycles(mut self, rigid: bool) -> Self {
        self.config.rigid_macrocycles = rigid;
        self
    }
    pub fn ring_size_window(mut self, min: usize, max: usize) -> Self {
        self.config.min_ring_size = min;
        self.config.max_ring_size = max;
        self
    }
    pub fn keep_chorded_rings(mut self, keep: bool) -> Self {
        self.config.keep_chorded_rings = keep;
        self
    }
    pub fn keep_equivalent_rings(mut self, keep: bool) -> Self {
        self.config.keep_equivalent_rings = keep;
        self
    }
    pub fn double_bond_penalty(mut self, penalty: f64) -> Self {
        self.config.double_bond_penalty = penalty;
        self
    }
    pub fn rigidify_bond(mut self, smarts: &str, pair: [usize; 2]) -> Self {
        self.config.rigidify_bonds_smarts.push(smarts.to_string());
        self.config.rigidify_bonds_indices.push(pair);
        self
    }
    pub fn atom_type_smarts(mut self, rules: Vec<AtomTypeRule>) -> Self {
        self.config.atom_type_smarts = rules;
        self
    }
    pub fn reactive_smarts(mut self, smarts: &str, idx: usize) -> Self {
        self.config.reactive_smarts = Some(smarts.to_string());
        self.config.reactive_smarts_idx = Some(idx);
        self
    }
    pub fn add_index_map(mut self, add: bool) -> Self {
        self.config.add_index_map = add;
        self
    }
    pub fn remove_smiles(mut self, remove: bool) -> Self {
        self.config.remove_smiles = remove;
        self
    }

    pub fn build(self) -> Result<PreparerConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
