use crate::cli::PrepareArgs;
use crate::error::{CliError, Result};
use dockprep::engine::config::PreparerConfig;
use std::path::Path;
use toml::{Table, Value};
use tracing::debug;

/// Preparation settings read from a TOML file, before command-line overrides.
///
/// Keys are the flat preparer keys (`hydrate`, `min_ring_size`, ...). Unknown
/// keys survive until [`PreparerConfig::from_table`] rejects them.
#[derive(Debug, Default, Clone)]
pub struct PartialPreparerConfig {
    table: Table,
}

impl PartialPreparerConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let table: Table = toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        debug!("Loaded {} configuration key(s) from {:?}", table.len(), path);
        Ok(Self { table })
    }

    /// Layers the command line over the file: `--set` values first, then flags.
    pub fn merge_with_cli(mut self, args: &PrepareArgs) -> Result<PreparerConfig> {
        self.apply_set_values(&args.set_values)?;

        let flags = [
            ("rigid_macrocycles", args.rigid_macrocycles),
            ("flexible_amides", args.flexible_amides),
            ("hydrate", args.hydrate),
            ("add_index_map", args.add_index_map),
            ("remove_smiles", args.remove_smiles),
        ];
        for (key, on) in flags {
            if on {
                self.table.insert(key.to_string(), Value::Boolean(true));
            }
        }

        PreparerConfig::from_table(self.table).map_err(|e| CliError::Config(e.to_string()))
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value_str)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };
            let key = key.trim();
            if !PreparerConfig::KEYS.contains(&key) {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
            let value = parse_value(value_str.trim());
            debug!("Overriding '{}' with {}", key, value);
            self.table.insert(key.to_string(), value);
        }
        Ok(())
    }
}

/// Reads `raw` as a TOML value; anything that is not valid TOML is kept as a string.
fn parse_value(raw: &str) -> Value {
    format!("value = {raw}")
        .parse::<Table>()
        .ok()
        .and_then(|mut t| t.remove("value"))
        .unwrap_or_else(|| Value::String(raw.to_string()))
}
