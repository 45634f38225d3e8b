//! Gasteiger–Marsili partial equalization of orbital electronegativity.
//!
//! Implicit hydrogens take part as virtual atoms; their charge is folded into
//! the parent so the molecule total equals the sum of formal charges. Atoms
//! without parameters keep their formal charge and do not exchange charge.

use super::molecule::Molecule;
use crate::core::models::bond::BondOrder;
use phf::{Map, phf_map};

const ITERATIONS: u32 = 6;
const HYDROGEN_CATION_CHI: f64 = 20.02;

// (a, b, c) for chi(q) = a + b q + c q^2, keyed by "<symbol>.<hybridization>".
static PARAMETERS: Map<&'static str, (f64, f64, f64)> = phf_map! {
    "H" => (7.17, 6.24, -0.56),
    "C.3" => (7.98, 9.18, 1.88),
    "C.2" => (8.79, 9.32, 1.51),
    "C.1" => (10.39, 9.45, 0.73),
    "N.3" => (11.54, 10.82, 1.36),
    "N.2" => (12.87, 11.15, 0.85),
    "N.1" => (15.68, 11.70, -0.27),
    "O.3" => (14.18, 12.92, 1.39),
    "O.2" => (17.07, 13.79, 0.47),
    "F" => (14.66, 13.85, 2.31),
    "Cl" => (11.00, 9.69, 1.35),
    "Br" => (10.08, 8.47, 1.16),
    "I" => (9.90, 7.96, 0.96),
    "S.3" => (10.14, 9.13, 1.38),
    "S.2" => (10.88, 9.49, 1.33),
    "P" => (8.90, 8.24, 0.96),
};

#[derive(Debug, Clone, Copy)]
struct Parameters {
    a: f64,
    b: f64,
    c: f64,
    cation_chi: f64,
}

impl Parameters {
    fn chi(&self, q: f64) -> f64 {
        self.a + self.b * q + self.c * q * q
    }
}

fn lookup(mol: &Molecule, atom: usize) -> Option<Parameters> {
    let element = mol.atom(atom).element;
    let symbol = element.symbol();
    let (a, b, c) = match PARAMETERS.get(symbol) {
        Some(&p) => p,
        None => {
            let key = format!("{symbol}.{}", hybridization(mol, atom));
            let key = if key.starts_with("O.1") { "O.2".to_string() } else { key };
            let key = if key.starts_with("S.1") { "S.2".to_string() } else { key };
            *PARAMETERS.get(key.as_str())?
        }
    };
    let cation_chi = if element.is_hydrogen() {
        HYDROGEN_CATION_CHI
    } else {
        a + b + c
    };
    Some(Parameters {
        a,
        b,
        c,
        cation_chi,
    })
}

fn hybridization(mol: &Molecule, atom: usize) -> u8 {
    let mut doubles = 0;
    let mut pi = false;
    for (_, bond) in mol.bonds_of(atom) {
        let bond = mol.bond(bond);
        match bond.order {
            BondOrder::Triple => return 1,
            BondOrder::Double => doubles += 1,
            BondOrder::Aromatic => pi = true,
            BondOrder::Single => {}
        }
        pi |= bond.is_aromatic;
    }
    match doubles {
        0 if !pi => 3,
        0 | 1 => 2,
        _ => 1,
    }
}

/// Gasteiger charges for every atom of `mol`, in atom order.
pub fn gasteiger_charges(mol: &Molecule) -> Vec<f64> {
    let n = mol.atom_count();
    let hydrogen = PARAMETERS.get("H").map(|&(a, b, c)| Parameters {
        a,
        b,
        c,
        cation_chi: HYDROGEN_CATION_CHI,
    });

    let mut params: Vec<Option<Parameters>> = (0..n).map(|i| lookup(mol, i)).collect();
    let mut charges: Vec<f64> = mol
        .atoms()
        .map(|a| f64::from(a.formal_charge))
        .collect();
    let mut edges: Vec<(usize, usize)> = mol.bonds().map(|b| (b.begin, b.end)).collect();
    let mut owner: Vec<usize> = (0..n).collect();
    for atom in 0..n {
        for _ in 0..mol.implicit_hydrogens(atom) {
            let virtual_h = params.len();
            params.push(hydrogen);
            charges.push(0.0);
            edges.push((atom, virtual_h));
            owner.push(atom);
        }
    }

    let mut damping = 1.0;
    for _ in 0..ITERATIONS {
        damping *= 0.5;
        let chi: Vec<Option<f64>> = params
            .iter()
            .zip(&charges)
            .map(|(p, &q)| p.map(|p| p.chi(q)))
            .collect();
        let mut delta = vec![0.0; charges.len()];
        for &(i, j) in &edges {
            let (Some(pi), Some(pj), Some(ci), Some(cj)) = (params[i], params[j], chi[i], chi[j])
            else {
                continue;
            };
            let denominator = if cj > ci { pi.cation_chi } else { pj.cation_chi };
            let transfer = (cj - ci) / denominator;
            delta[i] += transfer;
            delta[j] -= transfer;
        }
        for (q, d) in charges.iter_mut().zip(&delta) {
            *q += damping * d;
        }
    }

    let mut folded = vec![0.0; n];
    for (index, q) in charges.into_iter().enumerate() {
        folded[owner[index]] += q;
    }
    folded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolkit::smiles;

    fn charges(input: &str) -> Vec<f64> {
        gasteiger_charges(&smiles::parse(input).unwrap())
    }

    #[test]
    fn neutral_molecule_sums_to_zero() {
        let q = charges("CCO");
        assert!(q.iter().sum::<f64>().abs() < 1e-9);
        assert!(q[2] < 0.0);
        assert!(q[1] > q[0]);
    }

    #[test]
    fn formal_charge_is_conserved() {
        let q = charges("CC(=O)[O-]");
        assert!((q.iter().sum::<f64>() + 1.0).abs() < 1e-9);
    }

    #[test]
    fn explicit_and_implicit_hydrogens_agree() {
        let mol = smiles::parse("CO").unwrap();
        let implicit = gasteiger_charges(&mol);
        let explicit_mol = mol.with_explicit_hydrogens().unwrap();
        let explicit = gasteiger_charges(&explicit_mol);
        let oxygen_side: f64 = explicit[1]
            + explicit_mol
                .neighbors(1)
                .filter(|&n| explicit_mol.atom(n).element.is_hydrogen())
                .map(|n| explicit[n])
                .sum::<f64>();
        assert!((implicit[1] - oxygen_side).abs() < 1e-9);
    }

    #[test]
    fn symmetric_atoms_get_equal_charges() {
        let q = charges("c1ccccc1");
        for pair in q.windows(2) {
            assert!((pair[0] - pair[1]).abs() < 1e-9);
        }
    }

    #[test]
    fn unparameterized_atoms_keep_formal_charge() {
        let q = charges("[Na+].[Cl-]");
        assert!((q[0] - 1.0).abs() < 1e-12);
    }
}
