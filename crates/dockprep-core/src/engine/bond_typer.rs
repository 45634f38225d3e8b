use super::error::PrepareError;
use crate::core::models::bond::{BondKey, BondOrder};
use crate::core::models::setup::MoleculeSetup;
use crate::toolkit::SubstructureSearch;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

const AMIDE: &str = "[NX3]-[CX3]=[O,N]";
const TERTIARY_AMIDE: &str = "[NX3]([!#1])([!#1])-[CX3]=[O,N]";

/// Bond rigidity switches taken from the preparer configuration.
#[derive(Debug, Clone, Default)]
pub struct BondRules<'a> {
    pub flexible_amides: bool,
    pub rigidify_bonds_smarts: &'a [String],
    /// 1-based pattern positions, one pair per pattern.
    pub rigidify_bonds_indices: &'a [[usize; 2]],
}

/// Classifies every bond of a setup as rotatable or not.
pub trait BondTyper {
    fn assign(
        &self,
        setup: &mut MoleculeSetup,
        mol: &dyn SubstructureSearch,
        rules: &BondRules<'_>,
    ) -> Result<(), PrepareError>;
}

/// Single bonds rotate; amide C–N bonds, bonds to an atom in a triple bond
/// and bonds matched by user patterns do not.
///
/// A tertiary amide whose two nitrogen substituents are not symmetry
/// equivalent stays rotatable, since its rotamers are distinct.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyBondTyper;

impl BondTyper for LegacyBondTyper {
    fn assign(
        &self,
        setup: &mut MoleculeSetup,
        mol: &dyn SubstructureSearch,
        rules: &BondRules<'_>,
    ) -> Result<(), PrepareError> {
        let mut amides: BTreeSet<BondKey> = BTreeSet::new();
        if !rules.flexible_amides {
            amides.extend(
                mol.find_matches(AMIDE)?
                    .iter()
                    .map(|m| BondKey::new(m[0], m[1])),
            );
            let classes = symmetry_classes(setup);
            for m in mol.find_matches(TERTIARY_AMIDE)? {
                if classes[m[1]] != classes[m[2]] {
                    amides.remove(&BondKey::new(m[0], m[3]));
                }
            }
        }

        let mut frozen: BTreeSet<BondKey> = BTreeSet::new();
        for (smarts, &[i, j]) in rules
            .rigidify_bonds_smarts
            .iter()
            .zip(rules.rigidify_bonds_indices)
        {
            for m in mol.find_matches(smarts)? {
                if let (Some(&a), Some(&b)) = (m.get(i.wrapping_sub(1)), m.get(j.wrapping_sub(1))) {
                    frozen.insert(BondKey::new(a, b));
                }
            }
        }

        // Rotation about a linear sp atom moves nothing.
        let linear: BTreeSet<usize> = setup
            .bonds()
            .iter()
            .filter(|(_, bond)| bond.order == BondOrder::Triple)
            .flat_map(|(key, _)| [key.first(), key.second()])
            .collect();

        let keys: Vec<BondKey> = setup.bonds().keys().copied().collect();
        let mut rotatable = 0;
        for key in keys {
            let Some(bond) = setup.bond_mut(key.first(), key.second()) else {
                continue;
            };
            bond.user_rigid = frozen.contains(&key);
            bond.rotatable = bond.order == BondOrder::Single
                && !linear.contains(&key.first())
                && !linear.contains(&key.second())
                && !amides.contains(&key)
                && !bond.user_rigid;
            rotatable += usize::from(bond.rotatable);
        }
        debug!(
            rotatable,
            amides = amides.len(),
            frozen = frozen.len(),
            "Typed bonds"
        );
        Ok(())
    }
}

/// Graph-invariant classes of the setup atoms by iterative neighbourhood refinement.
///
/// Uses the full bond table, so merged atoms still contribute to their
/// parent's environment.
pub fn symmetry_classes(setup: &MoleculeSetup) -> Vec<usize> {
    let n = setup.atom_count();
    let mut neighbors: Vec<Vec<usize>> = vec![Vec::new(); n];
    for key in setup.bonds().keys() {
        neighbors[key.first()].push(key.second());
        neighbors[key.second()].push(key.first());
    }
    let initial: Vec<(u8, usize, i8, bool)> = setup
        .atoms()
        .iter()
        .enumerate()
        .map(|(i, a)| {
            (
                a.element.atomic_number(),
                neighbors[i].len(),
                a.formal_charge,
                a.is_aromatic,
            )
        })
        .collect();
    let mut classes = rank(&initial);
    loop {
        let signatures: Vec<(usize, Vec<usize>)> = (0..n)
            .map(|i| {
                let mut around: Vec<usize> = neighbors[i].iter().map(|&j| classes[j]).collect();
                around.sort_unstable();
                (classes[i], around)
            })
            .collect();
        let refined = rank(&signatures);
        let count = |c: &[usize]| c.iter().collect::<BTreeSet<_>>().len();
        if count(&refined) == count(&classes) {
            return refined;
        }
        classes = refined;
    }
}

fn rank<T: Ord + Clone>(keys: &[T]) -> Vec<usize> {
    let ids: BTreeMap<T, usize> = keys
        .iter()
        .cloned()
        .collect::<BTreeSet<T>>()
        .into_iter()
        .enumerate()
        .map(|(i, k)| (k, i))
        .collect();
    keys.iter().map(|k| ids[k]).collect()
}
