use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BondOrder {
    #[default]
    Single,
    Double,
    Triple,
    Aromatic,
}

#[derive(Debug, Error)]
#[error("Invalid bond order string")]
pub struct ParseBondOrderError;

impl BondOrder {
    /// Maps an MDL connection-table bond type (1, 2, 3, 4) to a bond order.
    pub fn from_ctfile(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Single),
            2 => Some(Self::Double),
            3 => Some(Self::Triple),
            4 => Some(Self::Aromatic),
            _ => None,
        }
    }

    /// Integer multiplicity used for the macrocycle double-bond penalty.
    /// Aromatic bonds have no integer order.
    pub fn multiplicity(&self) -> Option<u8> {
        match self {
            Self::Single => Some(1),
            Self::Double => Some(2),
            Self::Triple => Some(3),
            Self::Aromatic => None,
        }
    }

    /// Bond valence in half-bond units (aromatic counts as 3).
    pub fn half_valence(&self) -> u8 {
        match self {
            Self::Single => 2,
            Self::Double => 4,
            Self::Triple => 6,
            Self::Aromatic => 3,
        }
    }
}

impl FromStr for BondOrder {
    type Err = ParseBondOrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1" | "s" | "single" => Ok(Self::Single),
            "2" | "d" | "double" => Ok(Self::Double),
            "3" | "t" | "triple" => Ok(Self::Triple),
            "4" | "ar" | "aromatic" => Ok(Self::Aromatic),
            _ => Err(ParseBondOrderError),
        }
    }
}

impl fmt::Display for BondOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Single => "single",
                Self::Double => "double",
                Self::Triple => "triple",
                Self::Aromatic => "aromatic",
            }
        )
    }
}

/// Unordered pair of atom indices, always stored as `(min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BondKey(usize, usize);

impl BondKey {
    pub fn new(a: usize, b: usize) -> Self {
        if a <= b { Self(a, b) } else { Self(b, a) }
    }

    pub fn first(&self) -> usize {
        self.0
    }

    pub fn second(&self) -> usize {
        self.1
    }

    pub fn contains(&self, atom: usize) -> bool {
        self.0 == atom || self.1 == atom
    }

    /// The endpoint opposite to `atom`, if `atom` is an endpoint.
    pub fn partner(&self, atom: usize) -> Option<usize> {
        if self.0 == atom {
            Some(self.1)
        } else if self.1 == atom {
            Some(self.0)
        } else {
            None
        }
    }
}

impl From<(usize, usize)> for BondKey {
    fn from((a, b): (usize, usize)) -> Self {
        Self::new(a, b)
    }
}

impl fmt::Display for BondKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.0, self.1)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SetupBond {
    pub order: BondOrder,
    pub rotatable: bool,
    pub in_ring: bool,
    pub in_rigid_ring: bool,
    /// Frozen by a `rigidify_bonds_*` rule; never opened by the macrocycle stage.
    pub user_rigid: bool,
    /// Ring bond opened by the macrocycle stage. Kept in the table for bookkeeping.
    pub broken: bool,
}

impl SetupBond {
    pub fn new(order: BondOrder, in_ring: bool) -> Self {
        Self {
            order,
            in_ring,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bond_key_is_order_independent() {
        assert_eq!(BondKey::new(7, 2), BondKey::new(2, 7));
        let key = BondKey::new(9, 4);
        assert_eq!(key.first(), 4);
        assert_eq!(key.second(), 9);
    }

    #[test]
    fn bond_key_partner_lookup() {
        let key: BondKey = (3, 1).into();
        assert_eq!(key.partner(1), Some(3));
        assert_eq!(key.partner(3), Some(1));
        assert_eq!(key.partner(2), None);
        assert!(key.contains(3));
    }

    #[test]
    fn bond_keys_sort_lexicographically() {
        let mut keys = vec![BondKey::new(2, 5), BondKey::new(0, 9), BondKey::new(2, 3)];
        keys.sort();
        assert_eq!(
            keys,
            vec![BondKey::new(0, 9), BondKey::new(2, 3), BondKey::new(2, 5)]
        );
    }

    #[test]
    fn bond_order_parses_ctfile_codes() {
        assert_eq!(BondOrder::from_ctfile(2), Some(BondOrder::Double));
        assert_eq!(BondOrder::from_ctfile(4), Some(BondOrder::Aromatic));
        assert_eq!(BondOrder::from_ctfile(8), None);
        assert_eq!("t".parse::<BondOrder>().unwrap(), BondOrder::Triple);
        assert!("quadruple".parse::<BondOrder>().is_err());
    }

    #[test]
    fn aromatic_bonds_have_no_integer_multiplicity() {
        assert_eq!(BondOrder::Double.multiplicity(), Some(2));
        assert_eq!(BondOrder::Aromatic.multiplicity(), None);
    }
}
