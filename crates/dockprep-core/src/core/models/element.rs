use phf::phf_map;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A chemical element identified by its atomic number.
///
/// Atomic number `0` is reserved for pseudo-atoms (glue points, hydration
/// waters) that have no chemical identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Element(u8);

static SYMBOLS: [&str; 87] = [
    "X", "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S",
    "Cl", "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge",
    "As", "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd",
    "In", "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd",
    "Tb", "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg",
    "Tl", "Pb", "Bi", "Po", "At", "Rn",
];

static SYMBOL_LOOKUP: phf::Map<&'static str, u8> = phf_map! {
    "H" => 1, "D" => 1, "T" => 1, "HE" => 2, "LI" => 3, "BE" => 4, "B" => 5, "C" => 6,
    "N" => 7, "O" => 8, "F" => 9, "NE" => 10, "NA" => 11, "MG" => 12, "AL" => 13,
    "SI" => 14, "P" => 15, "S" => 16, "CL" => 17, "AR" => 18, "K" => 19, "CA" => 20,
    "SC" => 21, "TI" => 22, "V" => 23, "CR" => 24, "MN" => 25, "FE" => 26, "CO" => 27,
    "NI" => 28, "CU" => 29, "ZN" => 30, "GA" => 31, "GE" => 32, "AS" => 33, "SE" => 34,
    "BR" => 35, "KR" => 36, "RB" => 37, "SR" => 38, "Y" => 39, "ZR" => 40, "NB" => 41,
    "MO" => 42, "TC" => 43, "RU" => 44, "RH" => 45, "PD" => 46, "AG" => 47, "CD" => 48,
    "IN" => 49, "SN" => 50, "SB" => 51, "TE" => 52, "I" => 53, "XE" => 54, "CS" => 55,
    "BA" => 56, "LA" => 57, "CE" => 58, "PR" => 59, "ND" => 60, "PM" => 61, "SM" => 62,
    "EU" => 63, "GD" => 64, "TB" => 65, "DY" => 66, "HO" => 67, "ER" => 68, "TM" => 69,
    "YB" => 70, "LU" => 71, "HF" => 72, "TA" => 73, "W" => 74, "RE" => 75, "OS" => 76,
    "IR" => 77, "PT" => 78, "AU" => 79, "HG" => 80, "TL" => 81, "PB" => 82, "BI" => 83,
    "PO" => 84, "AT" => 85, "RN" => 86,
};

// Allowed neutral valences, smallest first.
static DEFAULT_VALENCES: phf::Map<u8, &'static [u8]> = phf_map! {
    1u8 => &[1],
    5u8 => &[3],
    6u8 => &[4],
    7u8 => &[3, 5],
    8u8 => &[2],
    9u8 => &[1],
    14u8 => &[4],
    15u8 => &[3, 5],
    16u8 => &[2, 4, 6],
    17u8 => &[1],
    34u8 => &[2, 4, 6],
    35u8 => &[1],
    53u8 => &[1, 3, 5],
};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown element symbol '{0}'")]
pub struct ParseElementError(pub String);

impl Element {
    pub const DUMMY: Element = Element(0);
    pub const H: Element = Element(1);
    pub const B: Element = Element(5);
    pub const C: Element = Element(6);
    pub const N: Element = Element(7);
    pub const O: Element = Element(8);
    pub const F: Element = Element(9);
    pub const P: Element = Element(15);
    pub const S: Element = Element(16);
    pub const CL: Element = Element(17);
    pub const BR: Element = Element(35);
    pub const I: Element = Element(53);

    /// Returns the element with the given atomic number, if it is tabulated.
    pub fn from_atomic_number(number: u8) -> Option<Self> {
        ((number as usize) < SYMBOLS.len()).then_some(Element(number))
    }

    pub fn atomic_number(&self) -> u8 {
        self.0
    }

    pub fn symbol(&self) -> &'static str {
        SYMBOLS[self.0 as usize]
    }

    pub fn is_hydrogen(&self) -> bool {
        self.0 == 1
    }

    pub fn is_carbon(&self) -> bool {
        self.0 == 6
    }

    pub fn is_dummy(&self) -> bool {
        self.0 == 0
    }

    /// Number of implicit hydrogens needed to reach the nearest allowed valence.
    ///
    /// `bond_valence` is the sum of explicit bond orders, aromatic bonds counted
    /// as 1.5 and rounded down. Aromatic atoms are only topped up to their lowest
    /// valence, which keeps pyrrole-type nitrogens from gaining a phantom hydrogen.
    pub fn implicit_hydrogens(&self, formal_charge: i8, bond_valence: u8, aromatic: bool) -> u8 {
        let Some(valences) = DEFAULT_VALENCES.get(&self.0) else {
            return 0;
        };
        let shift = |v: u8| -> i16 {
            let v = v as i16;
            let q = formal_charge as i16;
            match self.0 {
                // Isoelectronic shift: N+ behaves like C, O- like F.
                7 | 8 | 15 | 16 | 34 => v + q,
                6 | 14 | 5 => v - q.abs(),
                _ => v - q.abs(),
            }
        };
        let explicit = bond_valence as i16;
        if aromatic {
            let lowest = shift(valences[0]);
            return (lowest - explicit).max(0) as u8;
        }
        valences
            .iter()
            .map(|&v| shift(v))
            .find(|&v| v >= explicit)
            .map_or(0, |v| (v - explicit) as u8)
    }
}

impl Default for Element {
    fn default() -> Self {
        Element::DUMMY
    }
}

impl FromStr for Element {
    type Err = ParseElementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_uppercase();
        SYMBOL_LOOKUP
            .get(key.as_str())
            .map(|&n| Element(n))
            .ok_or_else(|| ParseElementError(s.to_string()))
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_symbols_case_insensitively() {
        assert_eq!("C".parse::<Element>().unwrap(), Element::C);
        assert_eq!("cl".parse::<Element>().unwrap(), Element::CL);
        assert_eq!(" Br ".parse::<Element>().unwrap(), Element::BR);
        assert_eq!("D".parse::<Element>().unwrap(), Element::H);
        assert!("Qq".parse::<Element>().is_err());
    }

    #[test]
    fn symbol_and_atomic_number_agree() {
        for n in 1..=86u8 {
            let element = Element::from_atomic_number(n).unwrap();
            let parsed: Element = element.symbol().parse().unwrap();
            assert_eq!(parsed.atomic_number(), n);
        }
        assert!(Element::from_atomic_number(120).is_none());
    }

    #[test]
    fn implicit_hydrogens_follow_default_valences() {
        assert_eq!(Element::C.implicit_hydrogens(0, 1, false), 3);
        assert_eq!(Element::C.implicit_hydrogens(0, 4, false), 0);
        assert_eq!(Element::N.implicit_hydrogens(0, 3, false), 0);
        assert_eq!(Element::N.implicit_hydrogens(1, 3, false), 1);
        assert_eq!(Element::O.implicit_hydrogens(-1, 1, false), 0);
        assert_eq!(Element::S.implicit_hydrogens(0, 3, false), 1);
    }

    #[test]
    fn aromatic_atoms_only_reach_lowest_valence() {
        assert_eq!(Element::C.implicit_hydrogens(0, 3, true), 1);
        assert_eq!(Element::N.implicit_hydrogens(0, 4, true), 0);
    }

    #[test]
    fn untabulated_elements_never_need_hydrogens() {
        let zinc: Element = "Zn".parse().unwrap();
        assert_eq!(zinc.implicit_hydrogens(2, 0, false), 0);
    }
}
