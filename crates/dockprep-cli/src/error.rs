use crate::utils::parser::ParseError;
use dockprep::core::io::pdbqt::WriteError;
use dockprep::engine::error::PrepareError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Prepare(#[from] PrepareError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse file '{path}': {source}", path = path.display())]
    FileParsing {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Report error: {0}")]
    Report(#[from] csv::Error),

    #[error("Invalid argument: {0}")]
    Argument(#[from] ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
