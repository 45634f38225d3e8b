use crate::core::models::bond::BondOrder;
use crate::toolkit::molecule::Molecule;

/// Atom query primitive or logical combination.
#[derive(Debug, Clone, PartialEq)]
pub enum AtomExpr {
    /// `*`
    True,
    /// `#n`, `C`, `c`. `aromatic` is `None` for `#n`.
    Element {
        atomic_num: u8,
        aromatic: Option<bool>,
    },
    /// `a`
    Aromatic,
    /// `A`
    Aliphatic,
    /// `D<n>`: explicit connections.
    Degree(u8),
    /// `X<n>`: explicit connections plus implicit hydrogens.
    Connectivity(u8),
    /// `v<n>`: bond order sum plus implicit hydrogens.
    Valence(u8),
    /// `H<n>`: explicit and implicit hydrogens.
    TotalHCount(u8),
    /// `h<n>`
    ImplicitHCount(u8),
    /// `R<n>`: number of SSSR rings containing the atom.
    RingMembership(u8),
    /// Bare `R` / `r`.
    InRing,
    /// `r<n>`: size of the smallest SSSR ring containing the atom.
    SmallestRingSize(u8),
    /// `x<n>`: ring bonds on the atom.
    RingBondCount(u8),
    Charge(i8),
    And(Vec<AtomExpr>),
    Or(Vec<AtomExpr>),
    Not(Box<AtomExpr>),
}

impl AtomExpr {
    pub fn matches(&self, mol: &Molecule, idx: usize) -> bool {
        let atom = mol.atom(idx);
        match self {
            AtomExpr::True => true,
            AtomExpr::Element {
                atomic_num,
                aromatic,
            } => {
                atom.element.atomic_number() == *atomic_num
                    && aromatic.is_none_or(|a| atom.is_aromatic == a)
            }
            AtomExpr::Aromatic => atom.is_aromatic,
            AtomExpr::Aliphatic => !atom.is_aromatic,
            AtomExpr::Degree(d) => mol.degree(idx) == *d as usize,
            AtomExpr::Connectivity(x) => {
                mol.degree(idx) + mol.implicit_hydrogens(idx) as usize == *x as usize
            }
            AtomExpr::Valence(v) => mol.valence(idx) == *v,
            AtomExpr::TotalHCount(h) => mol.total_hydrogens(idx) == *h,
            AtomExpr::ImplicitHCount(h) => mol.implicit_hydrogens(idx) == *h,
            AtomExpr::RingMembership(n) => mol.ring_membership(idx) == *n as usize,
            AtomExpr::InRing => mol.ring_bond_count(idx) > 0,
            AtomExpr::SmallestRingSize(r) => match mol.smallest_ring_size(idx) {
                Some(size) => size == *r as usize,
                None => *r == 0,
            },
            AtomExpr::RingBondCount(x) => mol.ring_bond_count(idx) == *x as usize,
            AtomExpr::Charge(c) => atom.formal_charge == *c,
            AtomExpr::And(exprs) => exprs.iter().all(|e| e.matches(mol, idx)),
            AtomExpr::Or(exprs) => exprs.iter().any(|e| e.matches(mol, idx)),
            AtomExpr::Not(expr) => !expr.matches(mol, idx),
        }
    }
}

/// Bond query primitive or logical combination.
///
/// An unwritten bond between two pattern atoms is [`BondExpr::SingleOrAromatic`].
#[derive(Debug, Clone, PartialEq)]
pub enum BondExpr {
    /// `~`
    True,
    /// `-`: single and not aromatic.
    Single,
    /// `=`: double and not aromatic.
    Double,
    /// `#`
    Triple,
    /// `:`
    Aromatic,
    /// `@`
    Ring,
    SingleOrAromatic,
    And(Vec<BondExpr>),
    Or(Vec<BondExpr>),
    Not(Box<BondExpr>),
}

impl BondExpr {
    pub fn matches(&self, mol: &Molecule, a: usize, b: usize) -> bool {
        let Some(bond) = mol.bond_between(a, b) else {
            return false;
        };
        match self {
            BondExpr::True => true,
            BondExpr::Single => bond.order == BondOrder::Single && !bond.is_aromatic,
            BondExpr::Double => bond.order == BondOrder::Double && !bond.is_aromatic,
            BondExpr::Triple => bond.order == BondOrder::Triple,
            BondExpr::Aromatic => bond.is_aromatic,
            BondExpr::Ring => bond.in_ring,
            BondExpr::SingleOrAromatic => {
                bond.is_aromatic || bond.order == BondOrder::Single
            }
            BondExpr::And(exprs) => exprs.iter().all(|e| e.matches(mol, a, b)),
            BondExpr::Or(exprs) => exprs.iter().any(|e| e.matches(mol, a, b)),
            BondExpr::Not(expr) => !expr.matches(mol, a, b),
        }
    }
}
