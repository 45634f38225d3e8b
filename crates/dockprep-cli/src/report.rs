use crate::error::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Prepared,
    Skipped,
    Failed,
}

/// One CSV row per input record.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub index: usize,
    pub name: String,
    pub status: Status,
    pub torsions: Option<usize>,
    pub ring_breaks: Option<usize>,
    pub output: Option<PathBuf>,
    pub message: String,
}

pub fn write_report(path: &Path, rows: &[ReportRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_has_header_and_one_line_per_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let rows = vec![
            ReportRow {
                index: 0,
                name: "ethanol".to_string(),
                status: Status::Prepared,
                torsions: Some(1),
                ring_breaks: Some(0),
                output: Some(PathBuf::from("out/ethanol.pdbqt")),
                message: String::new(),
            },
            ReportRow {
                index: 1,
                name: "mol_2".to_string(),
                status: Status::Failed,
                torsions: None,
                ring_breaks: None,
                output: None,
                message: "has implicit hydrogens".to_string(),
            },
        ];

        write_report(&path, &rows).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            "index,name,status,torsions,ring_breaks,output,message"
        );
        assert_eq!(lines[1], "0,ethanol,prepared,1,0,out/ethanol.pdbqt,");
        assert_eq!(lines[2], "1,mol_2,failed,,,,has implicit hydrogens");
    }
}
