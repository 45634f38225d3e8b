use crate::cli::PrepareArgs;
use crate::config::PartialPreparerConfig;
use crate::error::{CliError, Result};
use crate::report::{ReportRow, Status, write_report};
use crate::utils::parser::{self, FlexresSpec};
use crate::utils::progress::BatchProgress;
use dockprep::toolkit::Molecule;
use dockprep::toolkit::sdf::SdfReader;
use dockprep::workflows::prepare::{MoleculePreparation, PrepareOptions};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// An input record together with where its output goes.
struct Job {
    index: usize,
    name: String,
    molecule: Molecule,
    output: PathBuf,
}

pub fn run(args: PrepareArgs, quiet: bool) -> Result<()> {
    let partial_config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            PartialPreparerConfig::from_file(path)?
        }
        None => PartialPreparerConfig::default(),
    };
    info!("Merging configuration from file and CLI arguments...");
    let config = partial_config.merge_with_cli(&args)?;
    let template = MoleculePreparation::new(config)?;

    let options = prepare_options(&args)?;
    let flexres = args
        .flexres
        .as_deref()
        .map(parser::parse_flexres)
        .transpose()?;
    debug!("Per-molecule options: {:?}", options);

    info!("Reading molecules from {:?}", &args.input);
    let file = File::open(&args.input)?;
    let mut rows = Vec::new();
    let mut molecules = Vec::new();
    for (index, record) in SdfReader::new(BufReader::new(file)).enumerate() {
        match record {
            Ok(molecule) => molecules.push((index, molecule)),
            Err(e) => {
                warn!("Skipping SDF record {}: {}", index + 1, e);
                rows.push(ReportRow {
                    index,
                    name: default_name(index),
                    status: Status::Skipped,
                    torsions: None,
                    ring_breaks: None,
                    output: None,
                    message: e.to_string(),
                });
            }
        }
    }

    let total = molecules.len() + rows.len();
    if total == 0 {
        return Err(CliError::FileParsing {
            path: args.input.clone(),
            source: anyhow::anyhow!("no molecule records found"),
        });
    }

    let jobs = plan_outputs(&args.output, molecules, total)?;
    println!("Preparing {} molecule(s)...", jobs.len());

    let progress = BatchProgress::new(jobs.len() as u64, quiet);
    let prepared: Vec<ReportRow> = jobs
        .into_par_iter()
        .map(|job| {
            let row = prepare_one(&template, &options, flexres.as_ref(), job);
            if row.status != Status::Prepared {
                progress.println(format!("{}: {}", row.name, first_line(&row.message)));
            }
            progress.inc();
            row
        })
        .collect();

    rows.extend(prepared);
    rows.sort_by_key(|row| row.index);

    let ok = rows.iter().filter(|r| r.status == Status::Prepared).count();
    let failed = rows.len() - ok;
    progress.finish(ok, failed);
    info!("Prepared {} of {} molecule(s).", ok, rows.len());

    if let Some(report) = &args.report {
        info!("Writing report to {:?}", report);
        write_report(report, &rows)?;
    }

    if ok == 0 {
        return Err(CliError::Other(anyhow::anyhow!(
            "none of the {} molecule(s) could be prepared",
            rows.len()
        )));
    }
    println!("Prepared {} of {} molecule(s).", ok, rows.len());
    Ok(())
}

fn prepare_options(args: &PrepareArgs) -> Result<PrepareOptions> {
    let delete_ring_bonds = args
        .delete_ring_bonds
        .iter()
        .map(|b| parser::parse_bond(b))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let mut glue_pseudo_atoms = BTreeMap::new();
    for value in &args.glue {
        let (index, coords) = parser::parse_glue(value)?;
        if glue_pseudo_atoms.insert(index, coords).is_some() {
            warn!("Glue coordinates for atom {} given twice; keeping the last.", index);
        }
    }
    Ok(PrepareOptions {
        root_atom_index: args.root,
        not_terminal_atoms: args.not_terminal.clone(),
        delete_ring_bonds,
        glue_pseudo_atoms,
        ..Default::default()
    })
}

/// Writes to `output` itself for a single-record input, otherwise to one file
/// per molecule inside the `output` directory.
fn plan_outputs(output: &Path, molecules: Vec<(usize, Molecule)>, total: usize) -> Result<Vec<Job>> {
    let single = total == 1 && !output.is_dir();
    if !single {
        std::fs::create_dir_all(output)?;
    }

    let mut used = HashSet::new();
    let jobs = molecules
        .into_iter()
        .map(|(index, molecule)| {
            let name = molecule
                .name()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map_or_else(|| default_name(index), str::to_string);
            let output = if single {
                output.to_path_buf()
            } else {
                let mut stem = file_stem(&name);
                if !used.insert(stem.clone()) {
                    stem = format!("{}_{}", stem, index + 1);
                    used.insert(stem.clone());
                }
                output.join(format!("{stem}.pdbqt"))
            };
            Job {
                index,
                name,
                molecule,
                output,
            }
        })
        .collect();
    Ok(jobs)
}

fn prepare_one(
    template: &MoleculePreparation,
    options: &PrepareOptions,
    flexres: Option<&FlexresSpec>,
    job: Job,
) -> ReportRow {
    let mut row = ReportRow {
        index: job.index,
        name: job.name,
        status: Status::Failed,
        torsions: None,
        ring_breaks: None,
        output: None,
        message: String::new(),
    };

    let mut preparer = template.clone();
    if let Err(e) = preparer.prepare(&job.molecule, options) {
        warn!("Failed to prepare '{}': {}", row.name, e);
        row.message = e.to_string();
        return row;
    }
    row.torsions = preparer
        .setup()
        .and_then(|s| s.flexibility())
        .map(|tree| tree.torsion_count());
    row.ring_breaks = preparer.ring_breaks().map(|plan| plan.breaks.len());

    let text = match flexres {
        Some(spec) => preparer.write_flexres_pdbqt_string(&spec.res, &spec.chain, spec.num),
        None => preparer.write_pdbqt_string(),
    };
    let written = text
        .map_err(CliError::from)
        .and_then(|text| std::fs::write(&job.output, text).map_err(CliError::from));
    match written {
        Ok(()) => {
            debug!("Wrote '{}' to {:?}", row.name, &job.output);
            row.status = Status::Prepared;
            row.output = Some(job.output);
            row.message = preparer.log().trim().to_string();
        }
        Err(e) => {
            warn!("Could not write '{}': {}", row.name, first_line(&e.to_string()));
            row.message = preparer.log().trim().to_string();
            if row.message.is_empty() {
                row.message = e.to_string();
            }
        }
    }
    row
}

fn default_name(index: usize) -> String {
    format!("mol_{}", index + 1)
}

fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}
