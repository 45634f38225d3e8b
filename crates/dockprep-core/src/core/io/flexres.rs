//! Adaptation of a ligand PDBQT string into a flexible receptor residue block.

/// Wraps `pdbqt` in `BEGIN_RES`/`END_RES` for residue `res`, chain `chain`,
/// number `num`.
///
/// The first two `ATOM` records are renamed `CA` and `CB` (columns 14-15),
/// `TORSDOF` and blank lines are dropped and every other line is kept as is.
pub fn adapt_for_flexres(pdbqt: &str, res: &str, chain: &str, num: i32) -> String {
    let mut out = format!("BEGIN_RES {res} {chain} {num}\n");
    let mut atom_number = 0;
    for line in pdbqt.lines() {
        if line.is_empty() || line.starts_with("TORSDOF") {
            continue;
        }
        if line.starts_with("ATOM") {
            atom_number += 1;
            let name = match atom_number {
                1 => Some("CA"),
                2 => Some("CB"),
                _ => None,
            };
            if let Some(name) = name {
                out.push_str(&rename_atom(line, name));
                out.push('\n');
                continue;
            }
        }
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(&format!("END_RES {res} {chain} {num}\n"));
    out
}

fn rename_atom(line: &str, name: &str) -> String {
    match (line.get(..13), line.get(15..)) {
        (Some(head), Some(tail)) => format!("{head}{name}{tail}"),
        _ => line.to_string(),
    }
}
