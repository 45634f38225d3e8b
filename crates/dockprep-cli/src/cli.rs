use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Tony Kan, Ted Yu",
    version,
    about = "dockprep CLI - Prepares small molecules for docking by building their torsion tree and writing PDBQT.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads used to prepare molecules in parallel.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Prepare every molecule of an SDF file and write PDBQT output.
    Prepare(PrepareArgs),
    /// Print the default preparation configuration as TOML.
    Defaults,
}

/// Arguments for the `prepare` subcommand.
#[derive(Args, Debug, Default)]
pub struct PrepareArgs {
    // --- Core Arguments ---
    /// Path to the input SDF file with 3D coordinates and explicit hydrogens.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Output PDBQT file, or a directory when the input holds several molecules.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Path to a preparation configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // --- Per-molecule Inputs ---
    /// Atom index (0-based) whose rigid body becomes the ROOT.
    #[arg(long, value_name = "INDEX")]
    pub root: Option<usize>,

    /// Atom indices whose bonds stay rotatable even when terminal.
    #[arg(long, value_name = "INDEX,...", value_delimiter = ',')]
    pub not_terminal: Vec<usize>,

    /// Ring bond to open, as two atom indices. Can be repeated.
    #[arg(long = "delete-ring-bond", value_name = "I,J")]
    pub delete_ring_bonds: Vec<String>,

    /// Glue pseudo-atom coordinates for an opened bond endpoint. Can be repeated.
    #[arg(long = "glue", value_name = "I=X,Y,Z")]
    pub glue: Vec<String>,

    // --- Configuration Overrides ---
    /// Keep every macrocycle rigid.
    #[arg(long)]
    pub rigid_macrocycles: bool,

    /// Let amide C-N bonds rotate.
    #[arg(long)]
    pub flexible_amides: bool,

    /// Place water pseudo-atoms on hydrogen-bond donors and acceptors.
    #[arg(long)]
    pub hydrate: bool,

    /// Add REMARK INDEX MAP lines to the output.
    #[arg(long)]
    pub add_index_map: bool,

    /// Leave out the SMILES remarks.
    #[arg(long)]
    pub remove_smiles: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S double_bond_penalty=25
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,

    // --- Output ---
    /// Write each molecule as a flexible receptor residue.
    #[arg(long, value_name = "RES:CHAIN:NUM")]
    pub flexres: Option<String>,

    /// Write a per-molecule CSV report.
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}
