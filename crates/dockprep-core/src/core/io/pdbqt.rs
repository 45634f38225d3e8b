use crate::core::io::traits::SetupWriter;
use crate::core::models::atom::PseudoKind;
use crate::core::models::flex::{BodyId, FlexTree};
use crate::core::models::setup::MoleculeSetup;
use std::io::{self, Write};
use thiserror::Error;

const REMARK_WIDTH: usize = 79;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Cannot generate PDBQT file, the molecule is not prepared.")]
    NotPrepared,
    #[error("Molecule not OK, refusing to write PDBQT\n\nLOG:\n{log}")]
    NotOk { log: String },
    #[error("Molecule setup has no flexibility tree")]
    MissingFlexibility,
    #[error("Atom {atom} has no atom type")]
    UntypedAtom { atom: usize },
    #[error("Glue pseudo-atom {atom} is not bonded to a written atom")]
    DetachedGlue { atom: usize },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Output switches of the PDBQT writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Emit `REMARK INDEX MAP` pairs of (input atom number, serial).
    pub add_index_map: bool,
    /// Omit the `REMARK SMILES`, `REMARK SMILES IDX` and `REMARK H PARENT` lines.
    pub remove_smiles: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Record {
    Root,
    EndRoot,
    Atom(usize),
    /// Glue pseudo-atom, written as a marker line pointing at its parent.
    Glue(usize),
    Branch(usize, usize),
    EndBranch(usize, usize),
}

/// Ligand PDBQT: atom records nested in `ROOT` and `BRANCH` blocks that encode
/// the rigid-body tree, followed by `TORSDOF`.
///
/// Glue pseudo-atoms get no serial. Each one is written inside its body as a
/// `GLUE` line carrying its label, the serial of the atom it closes onto and
/// its coordinates.
pub struct PdbqtFile;

impl PdbqtFile {
    fn records(setup: &MoleculeSetup, tree: &FlexTree) -> Vec<Record> {
        let mut records = vec![Record::Root];
        Self::members(setup, tree, tree.root(), &mut records);
        records.push(Record::EndRoot);
        for &child in tree.children(tree.root()) {
            Self::branch(setup, tree, child, &mut records);
        }
        records
    }

    fn members(setup: &MoleculeSetup, tree: &FlexTree, id: BodyId, records: &mut Vec<Record>) {
        records.extend(tree.ordered_members(id).into_iter().map(|atom| {
            match setup.atoms()[atom].pseudo {
                Some(PseudoKind::Glue(_)) => Record::Glue(atom),
                _ => Record::Atom(atom),
            }
        }));
    }

    fn branch(setup: &MoleculeSetup, tree: &FlexTree, id: BodyId, records: &mut Vec<Record>) {
        let Some(edge) = tree.parent_bond(id) else {
            return;
        };
        records.push(Record::Branch(edge.parent_atom, edge.child_atom));
        Self::members(setup, tree, id, records);
        for &child in tree.children(id) {
            Self::branch(setup, tree, child, records);
        }
        records.push(Record::EndBranch(edge.parent_atom, edge.child_atom));
    }

    fn glue_line(
        setup: &MoleculeSetup,
        index: usize,
        serials: &[Option<usize>],
    ) -> Result<String, WriteError> {
        let atom = &setup.atoms()[index];
        let parent = atom
            .neighbors
            .first()
            .and_then(|&p| serials[p])
            .ok_or(WriteError::DetachedGlue { atom: index })?;
        Ok(format!(
            "{:<6}{:<4}{:>5}   {:>8.3}{:>8.3}{:>8.3}",
            "GLUE",
            atom.display_name(),
            parent,
            atom.position.x,
            atom.position.y,
            atom.position.z
        ))
    }

    fn atom_line(setup: &MoleculeSetup, index: usize, serial: usize) -> Result<String, WriteError> {
        let atom = &setup.atoms()[index];
        let atom_type = atom
            .atom_type
            .as_deref()
            .ok_or(WriteError::UntypedAtom { atom: index })?;
        let charge = if atom.partial_charge.abs() < 5e-4 {
            0.0
        } else {
            atom.partial_charge
        };
        Ok(format!(
            "{:<6}{:>5} {:^4}{:1}{:<3} {:1}{:>4}{:1}   {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}    {:>6.3} {:<2}",
            "ATOM",
            serial,
            atom.display_name(),
            "",
            "UNL",
            "",
            1,
            "",
            atom.position.x,
            atom.position.y,
            atom.position.z,
            1.0,
            0.0,
            charge,
            atom_type
        ))
    }

    fn remark_pairs(
        writer: &mut impl Write,
        label: &str,
        pairs: &[(usize, usize)],
    ) -> io::Result<()> {
        if pairs.is_empty() {
            return Ok(());
        }
        let mut line = label.to_string();
        let mut filled = false;
        for (a, b) in pairs {
            let item = format!(" {a} {b}");
            if filled && line.len() + item.len() > REMARK_WIDTH {
                writeln!(writer, "{line}")?;
                line = label.to_string();
            }
            line.push_str(&item);
            filled = true;
        }
        writeln!(writer, "{line}")
    }

    fn write_remarks(
        setup: &MoleculeSetup,
        options: &WriteOptions,
        serials: &[Option<usize>],
        writer: &mut impl Write,
    ) -> io::Result<()> {
        if !options.remove_smiles {
            if let Some(record) = setup.smiles() {
                writeln!(writer, "REMARK SMILES {}", record.smiles)?;
                let smiles_idx: Vec<(usize, usize)> = record
                    .atom_order
                    .iter()
                    .enumerate()
                    .filter_map(|(pos, &atom)| {
                        serials.get(atom).copied().flatten().map(|s| (pos + 1, s))
                    })
                    .collect();
                Self::remark_pairs(writer, "REMARK SMILES IDX", &smiles_idx)?;

                let h_parent: Vec<(usize, usize)> = setup
                    .atoms()
                    .iter()
                    .enumerate()
                    .filter(|(_, a)| a.element.is_hydrogen() && !a.ignore)
                    .filter_map(|(i, a)| {
                        let serial = serials[i]?;
                        let parent = a.neighbors.first()?;
                        let position = record.atom_order.iter().position(|&x| x == *parent)?;
                        Some((position + 1, serial))
                    })
                    .collect();
                Self::remark_pairs(writer, "REMARK H PARENT", &h_parent)?;
            }
        }
        if options.add_index_map {
            let index_map: Vec<(usize, usize)> = serials
                .iter()
                .enumerate()
                .filter(|&(i, _)| !setup.atoms()[i].is_pseudo())
                .filter_map(|(i, s)| s.map(|s| (i + 1, s)))
                .collect();
            Self::remark_pairs(writer, "REMARK INDEX MAP", &index_map)?;
        }
        Ok(())
    }
}

impl SetupWriter for PdbqtFile {
    type Options = WriteOptions;
    type Error = WriteError;

    fn write_to(
        setup: &MoleculeSetup,
        options: &Self::Options,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        let tree = setup.flexibility().ok_or(WriteError::MissingFlexibility)?;
        let records = Self::records(setup, tree);

        let mut serials: Vec<Option<usize>> = vec![None; setup.atom_count()];
        let mut next = 1;
        for record in &records {
            if let Record::Atom(index) = *record {
                serials[index] = Some(next);
                next += 1;
            }
        }
        let serial_of = |atom: usize| serials[atom].unwrap_or(0);

        Self::write_remarks(setup, options, &serials, writer)?;
        for record in &records {
            match *record {
                Record::Root => writeln!(writer, "ROOT")?,
                Record::EndRoot => writeln!(writer, "ENDROOT")?,
                Record::Atom(index) => {
                    let line = Self::atom_line(setup, index, serial_of(index))?;
                    writeln!(writer, "{line}")?;
                }
                Record::Glue(index) => {
                    let line = Self::glue_line(setup, index, &serials)?;
                    writeln!(writer, "{line}")?;
                }
                Record::Branch(p, c) => {
                    writeln!(writer, "BRANCH {:>3} {:>3}", serial_of(p), serial_of(c))?
                }
                Record::EndBranch(p, c) => {
                    writeln!(writer, "ENDBRANCH {:>3} {:>3}", serial_of(p), serial_of(c))?
                }
            }
        }
        writeln!(writer, "TORSDOF {}", tree.torsion_count())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::SetupAtom;
    use crate::core::models::bond::BondOrder;
    use crate::core::models::element::Element;
    use crate::core::models::flex::{RigidBody, TorsionEdge};
    use crate::core::models::setup::{MoleculeSetupBuilder, SmilesRecord};
    use nalgebra::Point3;

    fn atom(element: Element, label: &str, x: f64, charge: f64) -> SetupAtom {
        let mut atom = SetupAtom::new(element, Point3::new(x, 0.0, 0.0));
        atom.atom_type = Some(label.to_string());
        atom.partial_charge = charge;
        atom
    }

    // Ethanol-like chain C0 C1 O2 H3(O), bodies {0, 1} and {2, 3}.
    fn prepared() -> MoleculeSetup {
        let mut b = MoleculeSetupBuilder::new();
        b.add_atom(atom(Element::C, "C", 0.0, 0.04));
        b.add_atom(atom(Element::C, "C", 1.5, 0.2));
        b.add_atom(atom(Element::O, "OA", 3.0, -0.39));
        b.add_atom(atom(Element::H, "HD", 3.9, 0.21));
        b.add_bond(0, 1, BondOrder::Single, false);
        b.add_bond(1, 2, BondOrder::Single, false);
        b.add_bond(2, 3, BondOrder::Single, false);
        b.smiles(SmilesRecord {
            smiles: "CCO".to_string(),
            atom_order: vec![0, 1, 2],
        });
        let setup = b.build().unwrap();
        let tree = FlexTree::new(
            vec![
                RigidBody {
                    members: vec![0, 1],
                },
                RigidBody {
                    members: vec![2, 3],
                },
            ],
            vec![
                Some(BodyId(0)),
                Some(BodyId(0)),
                Some(BodyId(1)),
                Some(BodyId(1)),
            ],
            BodyId(0),
            vec![
                None,
                Some((
                    BodyId(0),
                    TorsionEdge {
                        parent_atom: 1,
                        child_atom: 2,
                    },
                )),
            ],
            vec![vec![BodyId(1)], vec![]],
            vec![0, 1],
            vec![BodyId(0), BodyId(1)],
        );
        setup.with_flexibility(tree)
    }

    #[test]
    fn writes_nested_branches_and_torsdof() {
        let text = PdbqtFile::write_string(&prepared(), &WriteOptions::default()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "REMARK SMILES CCO",
                "REMARK SMILES IDX 1 1 2 2 3 3",
                "REMARK H PARENT 3 4",
                "ROOT",
                "ATOM      1  C   UNL     1       0.000   0.000   0.000  1.00  0.00     0.040 C ",
                "ATOM      2  C   UNL     1       1.500   0.000   0.000  1.00  0.00     0.200 C ",
                "ENDROOT",
                "BRANCH   2   3",
                "ATOM      3  O   UNL     1       3.000   0.000   0.000  1.00  0.00    -0.390 OA",
                "ATOM      4  H   UNL     1       3.900   0.000   0.000  1.00  0.00     0.210 HD",
                "ENDBRANCH   2   3",
                "TORSDOF 1",
            ]
        );
    }

    #[test]
    fn glue_atoms_are_marker_lines_pointing_at_their_parent() {
        // C0 C1 O2 H3 plus glue G0 on C1, placed in the root body.
        let mut b = MoleculeSetupBuilder::new();
        b.add_atom(atom(Element::C, "C", 0.0, 0.04));
        b.add_atom(atom(Element::C, "CG0", 1.5, 0.2));
        b.add_atom(atom(Element::O, "OA", 3.0, -0.39));
        b.add_atom(atom(Element::H, "HD", 3.9, 0.21));
        b.add_bond(0, 1, BondOrder::Single, false);
        b.add_bond(1, 2, BondOrder::Single, false);
        b.add_bond(2, 3, BondOrder::Single, false);
        let mut setup = b.build().unwrap();
        let glue = SetupAtom::pseudo(PseudoKind::Glue(0), "G0", Point3::new(1.0, 2.0, 3.0));
        let g = setup.add_pseudo_atom(glue, 1);
        let tree = FlexTree::new(
            vec![
                RigidBody {
                    members: vec![0, 1, g],
                },
                RigidBody {
                    members: vec![2, 3],
                },
            ],
            vec![
                Some(BodyId(0)),
                Some(BodyId(0)),
                Some(BodyId(1)),
                Some(BodyId(1)),
                Some(BodyId(0)),
            ],
            BodyId(0),
            vec![
                None,
                Some((
                    BodyId(0),
                    TorsionEdge {
                        parent_atom: 1,
                        child_atom: 2,
                    },
                )),
            ],
            vec![vec![BodyId(1)], vec![]],
            vec![0, 1],
            vec![BodyId(0), BodyId(1)],
        );
        let setup = setup.with_flexibility(tree);
        let options = WriteOptions {
            add_index_map: true,
            remove_smiles: true,
        };
        let text = PdbqtFile::write_string(&setup, &options).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "REMARK INDEX MAP 1 1 2 2 3 3 4 4");
        assert_eq!(lines[3], "ATOM      2  C   UNL     1       1.500   0.000   0.000  1.00  0.00     0.200 CG0");
        assert_eq!(lines[4], "GLUE  G0      2      1.000   2.000   3.000");
        assert_eq!(lines[5], "ENDROOT");
        assert_eq!(text.matches("ATOM").count(), 4);
        assert!(text.contains("ATOM      3  O "));
    }

    #[test]
    fn remarks_follow_options() {
        let options = WriteOptions {
            add_index_map: true,
            remove_smiles: true,
        };
        let text = PdbqtFile::write_string(&prepared(), &options).unwrap();
        assert!(!text.contains("REMARK SMILES"));
        assert!(!text.contains("H PARENT"));
        assert!(text.starts_with("REMARK INDEX MAP 1 1 2 2 3 3 4 4\n"));
    }

    #[test]
    fn long_remarks_wrap() {
        let pairs: Vec<(usize, usize)> = (1..=40).map(|i| (i, i)).collect();
        let mut out = Vec::new();
        PdbqtFile::remark_pairs(&mut out, "REMARK INDEX MAP", &pairs).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.lines().count() > 1);
        assert!(text.lines().all(|l| l.len() <= REMARK_WIDTH));
        assert!(text.lines().all(|l| l.starts_with("REMARK INDEX MAP ")));
    }

    #[test]
    fn setup_without_tree_is_rejected() {
        let mut b = MoleculeSetupBuilder::new();
        b.add_atom(atom(Element::C, "C", 0.0, 0.0));
        let setup = b.build().unwrap();
        let err = PdbqtFile::write_string(&setup, &WriteOptions::default()).unwrap_err();
        assert!(matches!(err, WriteError::MissingFlexibility));
    }

    #[test]
    fn untyped_atom_is_an_error() {
        let mut setup = prepared();
        setup.atom_mut(2).unwrap().atom_type = None;
        let err = PdbqtFile::write_string(&setup, &WriteOptions::default()).unwrap_err();
        assert!(matches!(err, WriteError::UntypedAtom { atom: 2 }));
    }

    #[test]
    fn file_round_trip_writes_same_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ligand.pdbqt");
        let setup = prepared();
        PdbqtFile::write_to_path(&setup, &WriteOptions::default(), &path).unwrap();
        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            on_disk,
            PdbqtFile::write_string(&setup, &WriteOptions::default()).unwrap()
        );
    }
}
