//! SMILES reading and heavy-atom SMILES writing.
//!
//! The reader understands the organic subset, bracket atoms (isotope and
//! chirality are accepted and dropped), branches, ring closures and `.`.
//! Hydrogens written inside brackets become explicit atoms appended after
//! all other atoms, so heavy-atom indices follow the string.
//!
//! The writer uses two depth-first passes: the first finds ring closures, the
//! second emits atoms with neighbours in ascending index order.

use super::molecule::{Molecule, MoleculeBuilder};
use super::ToolkitError;
use crate::core::models::bond::BondOrder;
use crate::core::models::element::Element;
use crate::core::models::setup::SmilesRecord;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq)]
enum BondSymbol {
    Single,
    Double,
    Triple,
    Aromatic,
}

struct Reader<'a> {
    text: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl Reader<'_> {
    fn error(&self, reason: impl Into<String>) -> ToolkitError {
        ToolkitError::InvalidMolecule(format!(
            "SMILES '{}' at position {}: {}",
            self.text,
            self.pos,
            reason.into()
        ))
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn number(&mut self) -> Option<u32> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        (self.pos > start).then(|| {
            self.chars[start..self.pos]
                .iter()
                .collect::<String>()
                .parse()
                .unwrap_or(0)
        })
    }
}

struct ParsedAtom {
    element: Element,
    aromatic: bool,
    charge: i8,
    hydrogens: u8,
}

/// Parses a SMILES string into a molecule without conformers.
pub fn parse(smiles: &str) -> Result<Molecule, ToolkitError> {
    let mut r = Reader {
        text: smiles,
        chars: smiles.trim().chars().collect(),
        pos: 0,
    };
    if r.chars.is_empty() {
        return Err(r.error("empty string"));
    }

    let mut atoms: Vec<ParsedAtom> = Vec::new();
    let mut bonds: Vec<(usize, usize, Option<BondSymbol>)> = Vec::new();
    let mut prev: Option<usize> = None;
    let mut branches: Vec<Option<usize>> = Vec::new();
    let mut pending: Option<BondSymbol> = None;
    let mut open_rings: BTreeMap<u32, (usize, Option<BondSymbol>)> = BTreeMap::new();

    while let Some(c) = r.peek() {
        match c {
            '(' => {
                r.bump();
                branches.push(prev);
            }
            ')' => {
                r.bump();
                prev = branches.pop().ok_or_else(|| r.error("unmatched ')'"))?;
            }
            '.' => {
                r.bump();
                prev = None;
            }
            '-' | '/' | '\\' => {
                r.bump();
                pending = Some(BondSymbol::Single);
            }
            '=' => {
                r.bump();
                pending = Some(BondSymbol::Double);
            }
            '#' => {
                r.bump();
                pending = Some(BondSymbol::Triple);
            }
            ':' => {
                r.bump();
                pending = Some(BondSymbol::Aromatic);
            }
            '%' | '0'..='9' => {
                let digit = if c == '%' {
                    r.bump();
                    let hi = r.bump().and_then(|d| d.to_digit(10));
                    let lo = r.bump().and_then(|d| d.to_digit(10));
                    match (hi, lo) {
                        (Some(h), Some(l)) => h * 10 + l,
                        _ => return Err(r.error("'%' must be followed by two digits")),
                    }
                } else {
                    r.bump();
                    c.to_digit(10).unwrap_or(0)
                };
                let atom = prev.ok_or_else(|| r.error("ring closure before any atom"))?;
                match open_rings.remove(&digit) {
                    Some((other, symbol)) => {
                        bonds.push((other, atom, pending.take().or(symbol)));
                    }
                    None => {
                        open_rings.insert(digit, (atom, pending.take()));
                    }
                }
            }
            '[' => {
                r.bump();
                let atom = parse_bracket(&mut r)?;
                let index = atoms.len();
                atoms.push(atom);
                if let Some(p) = prev {
                    bonds.push((p, index, pending.take()));
                }
                prev = Some(index);
            }
            _ => {
                let atom = parse_organic(&mut r)?;
                let index = atoms.len();
                atoms.push(atom);
                if let Some(p) = prev {
                    bonds.push((p, index, pending.take()));
                }
                prev = Some(index);
            }
        }
    }
    if let Some(digit) = open_rings.keys().next() {
        return Err(r.error(format!("ring {digit} is never closed")));
    }
    if !branches.is_empty() {
        return Err(r.error("unclosed branch"));
    }

    let mut builder = MoleculeBuilder::new();
    for atom in &atoms {
        let index = builder.add_atom(atom.element);
        builder.formal_charge(index, atom.charge);
    }
    for &(a, b, symbol) in &bonds {
        let order = match symbol {
            Some(BondSymbol::Single) => BondOrder::Single,
            Some(BondSymbol::Double) => BondOrder::Double,
            Some(BondSymbol::Triple) => BondOrder::Triple,
            Some(BondSymbol::Aromatic) => BondOrder::Aromatic,
            None if atoms[a].aromatic && atoms[b].aromatic => BondOrder::Aromatic,
            None => BondOrder::Single,
        };
        builder.add_bond(a, b, order);
    }
    for (index, atom) in atoms.iter().enumerate() {
        for _ in 0..atom.hydrogens {
            let h = builder.add_atom(Element::H);
            builder.add_bond(index, h, BondOrder::Single);
        }
    }
    builder.build()
}

fn parse_organic(r: &mut Reader<'_>) -> Result<ParsedAtom, ToolkitError> {
    let c = r.bump().ok_or_else(|| r.error("unexpected end"))?;
    let (symbol, aromatic) = match c {
        'C' if r.peek() == Some('l') => {
            r.bump();
            ("Cl", false)
        }
        'B' if r.peek() == Some('r') => {
            r.bump();
            ("Br", false)
        }
        'B' => ("B", false),
        'C' => ("C", false),
        'N' => ("N", false),
        'O' => ("O", false),
        'P' => ("P", false),
        'S' => ("S", false),
        'F' => ("F", false),
        'I' => ("I", false),
        'b' => ("B", true),
        'c' => ("C", true),
        'n' => ("N", true),
        'o' => ("O", true),
        'p' => ("P", true),
        's' => ("S", true),
        _ => {
            r.pos -= 1;
            return Err(r.error(format!("unexpected character '{c}'")));
        }
    };
    let element = symbol.parse().map_err(|_| r.error("unknown element"))?;
    Ok(ParsedAtom {
        element,
        aromatic,
        charge: 0,
        hydrogens: 0,
    })
}

fn parse_bracket(r: &mut Reader<'_>) -> Result<ParsedAtom, ToolkitError> {
    let _isotope = r.number();
    let first = r.bump().ok_or_else(|| r.error("unterminated bracket atom"))?;
    let (element, aromatic) = if first.is_ascii_lowercase() {
        let two: String = [first, r.peek().unwrap_or(' ')].iter().collect();
        if matches!(two.as_str(), "se" | "as") {
            r.bump();
            (two.parse::<Element>(), true)
        } else {
            (first.to_string().parse::<Element>(), true)
        }
    } else {
        let second = r.peek().filter(|c| c.is_ascii_lowercase());
        match second {
            Some(s) if format!("{first}{s}").parse::<Element>().is_ok() => {
                r.bump();
                (format!("{first}{s}").parse::<Element>(), false)
            }
            _ => (first.to_string().parse::<Element>(), false),
        }
    };
    let element = element.map_err(|e| r.error(e.to_string()))?;

    while r.peek() == Some('@') {
        r.bump();
    }
    let mut hydrogens = 0;
    if r.peek() == Some('H') {
        r.bump();
        hydrogens = r.number().unwrap_or(1) as u8;
    }
    let mut charge: i8 = 0;
    while let Some(sign @ ('+' | '-')) = r.peek() {
        r.bump();
        let unit: i8 = if sign == '+' { 1 } else { -1 };
        match r.number() {
            Some(n) => charge += unit * n as i8,
            None => charge += unit,
        }
    }
    if r.peek() == Some(':') {
        r.bump();
        r.number();
    }
    match r.bump() {
        Some(']') => Ok(ParsedAtom {
            element,
            aromatic,
            charge,
            hydrogens,
        }),
        _ => Err(r.error("expected ']'")),
    }
}

/// Writes the heavy-atom SMILES of `mol` together with the atom index behind
/// each SMILES atom position.
pub fn write(mol: &Molecule) -> SmilesRecord {
    let heavy: Vec<bool> = mol
        .atoms()
        .map(|a| !a.element.is_hydrogen())
        .collect();
    let n = mol.atom_count();
    let mut visited = vec![false; n];
    let mut pieces = Vec::new();
    let mut atom_order = Vec::new();

    for start in 0..n {
        if !heavy[start] || visited[start] {
            continue;
        }
        let mut tree = Tree {
            children: vec![Vec::new(); n],
            closures_open: vec![Vec::new(); n],
            closures_close: vec![Vec::new(); n],
        };
        let mut on_stack = vec![false; n];
        discover(mol, &heavy, start, None, &mut visited, &mut on_stack, &mut tree);

        let mut out = String::new();
        let mut digits = DigitPool::default();
        let mut assigned: BTreeMap<(usize, usize), u32> = BTreeMap::new();
        emit(mol, start, None, &tree, &mut digits, &mut assigned, &mut out, &mut atom_order);
        pieces.push(out);
    }
    SmilesRecord {
        smiles: pieces.join("."),
        atom_order,
    }
}

struct Tree {
    children: Vec<Vec<usize>>,
    closures_open: Vec<Vec<usize>>,
    closures_close: Vec<Vec<usize>>,
}

#[derive(Default)]
struct DigitPool {
    used: BTreeSet<u32>,
}

impl DigitPool {
    fn take(&mut self) -> u32 {
        let digit = (1..).find(|d| !self.used.contains(d)).unwrap_or(1);
        self.used.insert(digit);
        digit
    }

    fn release(&mut self, digit: u32) {
        self.used.remove(&digit);
    }
}

fn discover(
    mol: &Molecule,
    heavy: &[bool],
    atom: usize,
    parent: Option<usize>,
    visited: &mut [bool],
    on_stack: &mut [bool],
    tree: &mut Tree,
) {
    visited[atom] = true;
    on_stack[atom] = true;
    let neighbors: Vec<usize> = mol.neighbors(atom).filter(|&n| heavy[n]).collect();
    for next in neighbors {
        if Some(next) == parent {
            continue;
        }
        if !visited[next] {
            tree.children[atom].push(next);
            discover(mol, heavy, next, Some(atom), visited, on_stack, tree);
        } else if on_stack[next] {
            tree.closures_open[next].push(atom);
            tree.closures_close[atom].push(next);
        }
    }
    on_stack[atom] = false;
}

#[allow(clippy::too_many_arguments)]
fn emit(
    mol: &Molecule,
    atom: usize,
    parent: Option<usize>,
    tree: &Tree,
    digits: &mut DigitPool,
    assigned: &mut BTreeMap<(usize, usize), u32>,
    out: &mut String,
    order: &mut Vec<usize>,
) {
    if let Some(p) = parent {
        out.push_str(bond_symbol(mol, p, atom));
    }
    out.push_str(&atom_symbol(mol, atom));
    order.push(atom);

    for &opener in &tree.closures_close[atom] {
        if let Some(digit) = assigned.remove(&(opener, atom)) {
            out.push_str(bond_symbol(mol, opener, atom));
            push_digit(out, digit);
            digits.release(digit);
        }
    }
    for &closer in &tree.closures_open[atom] {
        let digit = digits.take();
        assigned.insert((atom, closer), digit);
        push_digit(out, digit);
    }

    let children = &tree.children[atom];
    for (i, &child) in children.iter().enumerate() {
        let last = i + 1 == children.len();
        if !last {
            out.push('(');
        }
        emit(mol, child, Some(atom), tree, digits, assigned, out, order);
        if !last {
            out.push(')');
        }
    }
}

fn push_digit(out: &mut String, digit: u32) {
    if digit < 10 {
        out.push_str(&digit.to_string());
    } else {
        out.push_str(&format!("%{digit:02}"));
    }
}

fn bond_symbol(mol: &Molecule, a: usize, b: usize) -> &'static str {
    let Some(bond) = mol.bond_between(a, b) else {
        return "";
    };
    let both_aromatic = mol.atom(a).is_aromatic && mol.atom(b).is_aromatic;
    if bond.is_aromatic {
        return "";
    }
    match bond.order {
        BondOrder::Single if both_aromatic => "-",
        BondOrder::Single | BondOrder::Aromatic => "",
        BondOrder::Double => "=",
        BondOrder::Triple => "#",
    }
}

fn atom_symbol(mol: &Molecule, atom: usize) -> String {
    let a = mol.atom(atom);
    let organic = matches!(a.element.atomic_number(), 5 | 6 | 7 | 8 | 9 | 15 | 16 | 17 | 35 | 53);
    let aromatic_form = a.is_aromatic && matches!(a.element.atomic_number(), 5 | 6 | 7 | 8 | 15 | 16);
    let symbol = if aromatic_form {
        a.element.symbol().to_ascii_lowercase()
    } else {
        a.element.symbol().to_string()
    };

    // Hydrogen count a reader would infer from the written heavy-atom bonds.
    let mut half = 0u8;
    let mut any_aromatic = false;
    for (n, b) in mol.bonds_of(atom) {
        if mol.atom(n).element.is_hydrogen() {
            continue;
        }
        let bond = mol.bond(b);
        if bond.is_aromatic {
            half += 3;
            any_aromatic = true;
        } else {
            half += bond.order.half_valence();
        }
    }
    let inferred = a.element.implicit_hydrogens(0, half / 2, any_aromatic);
    let actual = mol.total_hydrogens(atom);

    if organic && a.formal_charge == 0 && inferred == actual {
        return symbol;
    }
    let mut s = format!("[{symbol}");
    match actual {
        0 => {}
        1 => s.push('H'),
        h => s.push_str(&format!("H{h}")),
    }
    match a.formal_charge {
        0 => {}
        1 => s.push('+'),
        -1 => s.push('-'),
        q if q > 0 => s.push_str(&format!("+{q}")),
        q => s.push_str(&format!("-{}", -q)),
    }
    s.push(']');
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_branches_and_rings() {
        let mol = parse("CC(C)C1CCCCC1").unwrap();
        assert_eq!(mol.atom_count(), 9);
        assert_eq!(mol.bond_count(), 9);
        assert_eq!(mol.sssr().len(), 1);
        assert_eq!(mol.degree(1), 3);
    }

    #[test]
    fn bracket_hydrogens_become_explicit_atoms() {
        let mol = parse("c1cc[nH]c1").unwrap();
        assert_eq!(mol.atom_count(), 6);
        assert!(mol.atom(5).element.is_hydrogen());
        assert!(mol.bond_between(3, 5).is_some());
        assert_eq!(mol.implicit_hydrogens(3), 0);
    }

    #[test]
    fn parses_charges_and_two_letter_elements() {
        let mol = parse("[NH4+].[Cl-]").unwrap();
        assert_eq!(mol.atom(0).formal_charge, 1);
        assert_eq!(mol.atom(1).element, Element::CL);
        assert_eq!(mol.atom(1).formal_charge, -1);
        let mol = parse("[O-][N+](=O)C").unwrap();
        assert_eq!(mol.atom(0).formal_charge, -1);
        assert_eq!(mol.atom(1).formal_charge, 1);
        assert_eq!(mol.implicit_hydrogens(1), 0);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse("").is_err());
        assert!(parse("C1CC").is_err());
        assert!(parse("C(C").is_err());
        assert!(parse("CC)").is_err());
        assert!(parse("CX").is_err());
        assert!(parse("[C").is_err());
    }

    #[test]
    fn writes_heavy_atoms_in_traversal_order() {
        let mol = parse("OC1CCCCC1").unwrap().with_explicit_hydrogens().unwrap();
        let record = write(&mol);
        assert_eq!(record.smiles, "OC1CCCCC1");
        assert_eq!(record.atom_order, vec![0, 1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn writes_aromatic_atoms_in_lowercase() {
        let mol = parse("OC1=CC=CC=C1").unwrap();
        assert_eq!(write(&mol).smiles, "Oc1ccccc1");
        let mol = parse("C1=CNC=C1").unwrap();
        assert_eq!(write(&mol).smiles, "c1c[nH]cc1");
    }

    #[test]
    fn writes_charges_and_branches() {
        let mol = parse("CC(=O)[O-]").unwrap();
        assert_eq!(write(&mol).smiles, "CC(=O)[O-]");
        let mol = parse("CC.O").unwrap();
        assert_eq!(write(&mol).smiles, "CC.O");
    }
}
