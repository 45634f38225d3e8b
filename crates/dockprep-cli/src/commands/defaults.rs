use crate::error::{CliError, Result};
use dockprep::engine::config::PreparerConfig;
use tracing::info;

/// Renders the default preparation settings as a TOML config file.
pub fn render() -> Result<String> {
    PreparerConfig::default()
        .to_toml_string()
        .map_err(|e| CliError::Config(e.to_string()))
}

pub fn run() -> Result<()> {
    info!("Rendering default preparation configuration.");
    print!("{}", render()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_defaults_load_back_unchanged() {
        let text = render().unwrap();
        assert!(text.contains("rigid_macrocycles = false"));
        let config = PreparerConfig::from_toml_str(&text).unwrap();
        assert_eq!(config, PreparerConfig::default());
    }
}
