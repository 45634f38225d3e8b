use super::ToolkitError;
use super::molecule::{Molecule, MoleculeBuilder};
use crate::core::io::traits::MoleculeReader;
use crate::core::models::bond::BondOrder;
use crate::core::models::element::Element;
use nalgebra::Point3;
use std::io::{self, BufRead, Lines};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdfError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("Invalid molecule in record ending on line {line}: {source}")]
    Molecule { line: usize, source: ToolkitError },
}

impl SdfError {
    fn parse(line: usize, reason: impl Into<String>) -> Self {
        SdfError::Parse {
            line,
            reason: reason.into(),
        }
    }
}

/// Streams MDL V2000 records one molecule at a time.
///
/// A malformed record yields an error for that record only; iteration resumes
/// after its `$$$$` terminator.
pub struct SdfReader<R: BufRead> {
    lines: Lines<R>,
    line_no: usize,
    finished: bool,
}

impl<R: BufRead> SdfReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            finished: false,
        }
    }
}

impl<R: BufRead> Iterator for SdfReader<R> {
    type Item = Result<Molecule, SdfError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let mut record: Vec<(usize, String)> = Vec::new();
        loop {
            match self.lines.next() {
                None => {
                    self.finished = true;
                    break;
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(SdfError::Io(e)));
                }
                Some(Ok(line)) => {
                    self.line_no += 1;
                    if line.trim_end() == "$$$$" {
                        break;
                    }
                    record.push((self.line_no, line));
                }
            }
        }
        if record.iter().all(|(_, l)| l.trim().is_empty()) {
            return if self.finished { None } else { self.next() };
        }
        Some(parse_record(&record, self.line_no))
    }
}

/// Whole-file SDF access through [`MoleculeReader`]; fails on the first bad record.
pub struct SdfFile;

impl MoleculeReader for SdfFile {
    type Molecule = Molecule;
    type Error = SdfError;

    fn read_from(reader: &mut impl BufRead) -> Result<Vec<Molecule>, SdfError> {
        SdfReader::new(reader).collect()
    }
}

fn parse_record(lines: &[(usize, String)], end_line: usize) -> Result<Molecule, SdfError> {
    if lines.len() < 4 {
        let line = lines.last().map_or(end_line, |(ln, _)| *ln);
        return Err(SdfError::parse(
            line,
            "record must contain a header block and a counts line",
        ));
    }
    let (counts_no, counts) = (&lines[3].0, &lines[3].1);
    if counts.contains("V3000") {
        return Err(SdfError::parse(*counts_no, "V3000 is not supported"));
    }
    let (atom_count, bond_count) = parse_counts(counts, *counts_no)?;
    let atom_start = 4;
    let bond_start = atom_start + atom_count;
    if lines.len() < bond_start + bond_count {
        return Err(SdfError::parse(
            lines.last().map_or(*counts_no, |(ln, _)| *ln),
            "record ended before atoms and bonds were fully specified",
        ));
    }

    let mut builder = MoleculeBuilder::new();
    let name = lines[0].1.trim();
    if !name.is_empty() {
        builder.name(name);
    }

    let mut positions = Vec::with_capacity(atom_count);
    for (ln, raw) in &lines[atom_start..bond_start] {
        let (element, position, charge) = parse_atom_line(raw, *ln)?;
        let index = builder.add_atom(element);
        builder.formal_charge(index, charge);
        positions.push(position);
    }
    for (ln, raw) in &lines[bond_start..bond_start + bond_count] {
        let (a, b, order) = parse_bond_line(raw, *ln, atom_count)?;
        builder.add_bond(a, b, order);
    }

    let mut cursor = bond_start + bond_count;
    let mut charges_reset = false;
    while cursor < lines.len() {
        let (ln, raw) = (&lines[cursor].0, &lines[cursor].1);
        cursor += 1;
        if raw.starts_with("M  END") {
            break;
        }
        if raw.starts_with("M  CHG") {
            if !charges_reset {
                for index in 0..atom_count {
                    builder.formal_charge(index, 0);
                }
                charges_reset = true;
            }
            for (atom, charge) in parse_charge_line(raw, *ln, atom_count)? {
                builder.formal_charge(atom, charge);
            }
        }
    }

    while cursor < lines.len() {
        let raw = &lines[cursor].1;
        cursor += 1;
        let Some(key) = data_item_name(raw) else {
            continue;
        };
        let mut value: Vec<&str> = Vec::new();
        while cursor < lines.len() && !lines[cursor].1.trim().is_empty() {
            value.push(lines[cursor].1.trim_end());
            cursor += 1;
        }
        builder.property(key, value.join("\n"));
    }

    if positions.iter().any(|p| p.z != 0.0) {
        builder.add_conformer(positions);
    }
    builder
        .build()
        .map_err(|source| SdfError::Molecule {
            line: end_line,
            source,
        })
}

fn parse_counts(line: &str, line_no: usize) -> Result<(usize, usize), SdfError> {
    let field = |start: usize| {
        line.get(start..start + 3)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };
    let (atoms, bonds) = match (field(0), field(3)) {
        (Some(a), Some(b)) => (a.to_string(), b.to_string()),
        _ => {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < 2 {
                return Err(SdfError::parse(
                    line_no,
                    "counts line must contain atom and bond counts",
                ));
            }
            (tokens[0].to_string(), tokens[1].to_string())
        }
    };
    let atoms = atoms
        .parse::<usize>()
        .map_err(|_| SdfError::parse(line_no, "invalid atom count"))?;
    let bonds = bonds
        .parse::<usize>()
        .map_err(|_| SdfError::parse(line_no, "invalid bond count"))?;
    Ok((atoms, bonds))
}

fn parse_atom_line(raw: &str, ln: usize) -> Result<(Element, Point3<f64>, i8), SdfError> {
    let padded = format!("{raw:<42}");
    let coord = |range: std::ops::Range<usize>, axis: &str| {
        padded
            .get(range)
            .unwrap_or("")
            .trim()
            .parse::<f64>()
            .map_err(|_| SdfError::parse(ln, format!("invalid {axis} coordinate in atom line")))
    };
    let x = coord(0..10, "x")?;
    let y = coord(10..20, "y")?;
    let z = coord(20..30, "z")?;
    let symbol = padded.get(31..34).unwrap_or("").trim();
    let element: Element = symbol
        .parse()
        .map_err(|_| SdfError::parse(ln, format!("unsupported atom symbol '{symbol}'")))?;
    let charge = match padded.get(36..39).unwrap_or("").trim() {
        "" | "0" => 0,
        code => match code.parse::<u8>() {
            Ok(1) => 3,
            Ok(2) => 2,
            Ok(3) => 1,
            Ok(4) => 0,
            Ok(5) => -1,
            Ok(6) => -2,
            Ok(7) => -3,
            _ => return Err(SdfError::parse(ln, format!("invalid charge code '{code}'"))),
        },
    };
    Ok((element, Point3::new(x, y, z), charge))
}

fn parse_bond_line(
    raw: &str,
    ln: usize,
    atom_count: usize,
) -> Result<(usize, usize, BondOrder), SdfError> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    if tokens.len() < 3 {
        return Err(SdfError::parse(ln, "invalid bond line"));
    }
    let a = tokens[0]
        .parse::<usize>()
        .map_err(|_| SdfError::parse(ln, "invalid first atom index"))?;
    let b = tokens[1]
        .parse::<usize>()
        .map_err(|_| SdfError::parse(ln, "invalid second atom index"))?;
    let order = tokens[2]
        .parse::<u8>()
        .ok()
        .and_then(BondOrder::from_ctfile)
        .ok_or_else(|| SdfError::parse(ln, "unsupported bond order in bond line"))?;
    if a == 0 || b == 0 || a > atom_count || b > atom_count {
        return Err(SdfError::parse(
            ln,
            "bond references atom outside declared range",
        ));
    }
    Ok((a - 1, b - 1, order))
}

fn parse_charge_line(
    raw: &str,
    ln: usize,
    atom_count: usize,
) -> Result<Vec<(usize, i8)>, SdfError> {
    let tokens: Vec<&str> = raw.split_whitespace().skip(2).collect();
    let count = tokens
        .first()
        .and_then(|t| t.parse::<usize>().ok())
        .ok_or_else(|| SdfError::parse(ln, "invalid M  CHG entry count"))?;
    if tokens.len() < 1 + 2 * count {
        return Err(SdfError::parse(ln, "M  CHG line is shorter than its entry count"));
    }
    let mut charges = Vec::with_capacity(count);
    for pair in tokens[1..1 + 2 * count].chunks(2) {
        let atom = pair[0]
            .parse::<usize>()
            .ok()
            .filter(|&a| a >= 1 && a <= atom_count)
            .ok_or_else(|| SdfError::parse(ln, "M  CHG references atom outside declared range"))?;
        let charge = pair[1]
            .parse::<i8>()
            .map_err(|_| SdfError::parse(ln, "invalid charge in M  CHG line"))?;
        charges.push((atom - 1, charge));
    }
    Ok(charges)
}

fn data_item_name(line: &str) -> Option<&str> {
    if !line.starts_with('>') {
        return None;
    }
    let start = line.find('<')? + 1;
    let end = start + line[start..].find('>')?;
    Some(&line[start..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    const ETHANOL: &str = "\
ethanol
  dockprep          3D

  3  2  0  0  0  0  0  0  0  0999 V2000
   -0.8883    0.1670   -0.0273 C   0  0  0  0  0  0  0  0  0  0  0  0
    0.4658   -0.5116   -0.0368 C   0  0  0  0  0  0  0  0  0  0  0  0
    1.4311    0.3229    0.5700 O   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  1  0
  2  3  1  0
M  END
>  <ID>
EtOH-1

$$$$
";

    const ACETATE_2D: &str = "\
acetate
  dockprep          2D

  4  3  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    1.2990    0.7500    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    2.5981    0.0000    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0
    1.2990    2.2500    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  1  0
  2  3  1  0
  2  4  2  0
M  CHG  1   3  -1
M  END
$$$$
";

    #[test]
    fn reads_multiple_records_with_properties() {
        let text = format!("{ETHANOL}{ACETATE_2D}");
        let molecules = SdfFile::read_from_str(&text).unwrap();
        assert_eq!(molecules.len(), 2);

        let ethanol = &molecules[0];
        assert_eq!(ethanol.name(), Some("ethanol"));
        assert_eq!(ethanol.atom_count(), 3);
        assert_eq!(ethanol.bond_count(), 2);
        assert_eq!(ethanol.conformers().len(), 1);
        assert_eq!(ethanol.properties().get("ID").map(String::as_str), Some("EtOH-1"));
        assert!((ethanol.conformer(-1).unwrap().positions()[2].z - 0.57).abs() < 1e-9);
    }

    #[test]
    fn flat_block_has_no_conformer_and_charges_come_from_m_chg() {
        let molecules = SdfFile::read_from_str(ACETATE_2D).unwrap();
        let acetate = &molecules[0];
        assert!(acetate.conformers().is_empty());
        assert_eq!(acetate.atom(2).formal_charge, -1);
        assert_eq!(acetate.implicit_hydrogens(2), 0);
        assert_eq!(acetate.implicit_hydrogens(0), 3);
    }

    #[test]
    fn bad_record_does_not_stop_the_stream() {
        let broken = ETHANOL.replace("  2  3  1  0", "  2  9  1  0");
        let text = format!("{broken}{ACETATE_2D}");
        let results: Vec<_> = SdfReader::new(Cursor::new(text)).collect();
        assert_eq!(results.len(), 2);
        match &results[0] {
            Err(SdfError::Parse { line, reason }) => {
                assert_eq!(*line, 9);
                assert!(reason.contains("outside declared range"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(results[1].is_ok());
    }

    #[test]
    fn v3000_is_rejected() {
        let text = ETHANOL.replace("V2000", "V3000");
        let err = SdfFile::read_from_str(&text).unwrap_err();
        assert!(matches!(err, SdfError::Parse { line: 4, .. }));
    }

    #[test]
    fn truncated_record_is_rejected() {
        let text = "name\n\n\n  3  2  0  0  0  0  0  0  0  0999 V2000\n$$$$\n";
        assert!(matches!(
            SdfFile::read_from_str(text),
            Err(SdfError::Parse { .. })
        ));
    }

    #[test]
    fn reads_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(ETHANOL.as_bytes()).unwrap();
        let molecules = SdfFile::read_from_path(file.path()).unwrap();
        assert_eq!(molecules.len(), 1);
    }

    #[test]
    fn trailing_blank_lines_are_not_a_record() {
        let text = format!("{ETHANOL}\n\n");
        assert_eq!(SdfFile::read_from_str(&text).unwrap().len(), 1);
    }
}
