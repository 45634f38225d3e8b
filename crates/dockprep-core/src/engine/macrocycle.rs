use super::error::RingBreakError;
use super::flexibility::{acyclic_bonds, apply_breaks, derive_tree};
use crate::core::models::bond::BondKey;
use crate::core::models::element::Element;
use crate::core::models::setup::{MoleculeSetup, Ring};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use tracing::{debug, info, warn};

/// Glue pairs known to the docking engine (`G0` to `G3`).
pub const MAX_BREAKS: usize = 4;

/// What happened to one eligible ring.
#[derive(Debug, Clone, PartialEq)]
pub struct RingDecision {
    pub ring: Vec<usize>,
    pub broken: Option<BondKey>,
    /// Candidate bonds with their scores, ascending by bond. Empty for explicit breaks.
    pub scores: Vec<(BondKey, f64)>,
}

/// Outcome of the macrocycle stage, consumed by the flexibility builder.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RingBreakPlan {
    pub decisions: Vec<RingDecision>,
    /// Bonds to open, in glue-label order.
    pub breaks: Vec<BondKey>,
    pub rigid_ring_bonds: BTreeSet<BondKey>,
    pub explicit: bool,
}

impl RingBreakPlan {
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let source = if self.explicit { "explicit" } else { "scored" };
        let _ = writeln!(out, "Macrocycle breaks ({source}): {}", self.breaks.len());
        for decision in &self.decisions {
            let broken = decision
                .broken
                .map_or_else(|| "none".to_string(), |k| k.to_string());
            let _ = writeln!(out, "  ring {:?}: broken {}", decision.ring, broken);
            for (key, score) in &decision.scores {
                let _ = writeln!(out, "    {key} score {score:.2}");
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacrocycleRules {
    pub min_ring_size: usize,
    pub max_ring_size: usize,
    pub double_bond_penalty: f64,
}

/// Chooses ring bonds to open so large rings can flex as open chains.
#[derive(Debug, Clone)]
pub struct MacrocycleBreaker {
    rules: MacrocycleRules,
}

impl MacrocycleBreaker {
    pub fn new(rules: MacrocycleRules) -> Self {
        Self { rules }
    }

    /// Every ring stays closed and every ring bond is rigid.
    pub fn rigid(setup: &MoleculeSetup) -> RingBreakPlan {
        RingBreakPlan {
            rigid_ring_bonds: setup.rings().iter().flat_map(Ring::bonds).collect(),
            ..RingBreakPlan::default()
        }
    }

    fn is_eligible(&self, setup: &MoleculeSetup, ring: &Ring) -> bool {
        (self.rules.min_ring_size..=self.rules.max_ring_size).contains(&ring.len())
            && !setup.is_aromatic_ring(ring)
    }

    /// Builds the break plan for a setup.
    ///
    /// With a non-empty `explicit` list the given bonds are opened as they are
    /// and no scoring happens. Otherwise each eligible ring, smallest first,
    /// gets the candidate bond whose opening yields the shallowest tree,
    /// penalised by `double_bond_penalty` per extra bond order. A candidate
    /// only counts if it actually opens the ring; a ring already opened by an
    /// earlier break is recorded with that break.
    pub fn plan(&self, setup: &MoleculeSetup, explicit: &[BondKey]) -> RingBreakPlan {
        let mut eligible: Vec<&Ring> = Vec::new();
        let mut rigid: BTreeSet<BondKey> = BTreeSet::new();
        for ring in setup.rings() {
            if self.is_eligible(setup, ring) {
                eligible.push(ring);
            } else {
                rigid.extend(ring.bonds());
            }
        }
        eligible.sort_by_cached_key(|r| (r.len(), r.sorted_atoms()));

        let mut breaks: Vec<BondKey> = Vec::new();
        let mut decisions = Vec::with_capacity(eligible.len());
        let is_explicit = !explicit.is_empty();
        if is_explicit {
            breaks.extend_from_slice(explicit);
        }

        for ring in &eligible {
            let contained = breaks.iter().copied().find(|&k| ring.contains_bond(k));
            if is_explicit {
                decisions.push(RingDecision {
                    ring: ring.atoms().to_vec(),
                    broken: contained,
                    scores: Vec::new(),
                });
                continue;
            }
            let acyclic = acyclic_after(setup, &breaks);
            if let Some(key) = contained {
                if is_opened(setup, ring, &breaks, &acyclic) {
                    decisions.push(RingDecision {
                        ring: ring.atoms().to_vec(),
                        broken: Some(key),
                        scores: Vec::new(),
                    });
                    continue;
                }
                debug!(ring = ?ring.atoms(), bond = %key, "Ring still closed after shared break");
            }
            if breaks.len() >= MAX_BREAKS {
                warn!(
                    ring = ?ring.atoms(),
                    max = MAX_BREAKS,
                    "No glue pseudo-atoms left, macrocycle stays rigid"
                );
                decisions.push(RingDecision {
                    ring: ring.atoms().to_vec(),
                    broken: None,
                    scores: Vec::new(),
                });
                continue;
            }

            let open: Vec<&Ring> = eligible
                .iter()
                .copied()
                .filter(|r| is_opened(setup, r, &breaks, &acyclic))
                .collect();
            let scores = self.score_ring(setup, ring, &open, &breaks, &rigid);
            let best = scores
                .iter()
                .fold(None::<(BondKey, f64)>, |best, &(key, score)| match best {
                    Some((_, s)) if s <= score => best,
                    _ => Some((key, score)),
                });
            if let Some((key, score)) = best {
                debug!(ring = ?ring.atoms(), bond = %key, score, "Selected macrocycle break");
                breaks.push(key);
            } else {
                debug!(ring = ?ring.atoms(), "No breakable bond in macrocycle");
            }
            decisions.push(RingDecision {
                ring: ring.atoms().to_vec(),
                broken: best.map(|(k, _)| k),
                scores,
            });
        }

        for (ring, decision) in eligible.iter().zip(&decisions) {
            if decision.broken.is_none() {
                rigid.extend(ring.bonds());
            }
        }
        for key in &breaks {
            rigid.remove(key);
        }
        if !breaks.is_empty() {
            info!(breaks = breaks.len(), explicit = is_explicit, "Opened macrocycles");
        }
        RingBreakPlan {
            decisions,
            breaks,
            rigid_ring_bonds: rigid,
            explicit: is_explicit,
        }
    }

    fn score_ring(
        &self,
        setup: &MoleculeSetup,
        ring: &Ring,
        open: &[&Ring],
        breaks: &[BondKey],
        rigid: &BTreeSet<BondKey>,
    ) -> Vec<(BondKey, f64)> {
        let mut keys: Vec<BondKey> = ring.bonds().collect();
        keys.sort_unstable();
        let mut scores = Vec::new();
        for key in keys {
            let Some(order) = self.candidate_order(setup, key, open, breaks, rigid) else {
                continue;
            };
            let mut trial = setup.clone();
            let mut opened = breaks.to_vec();
            opened.push(key);
            apply_breaks(&mut trial, &opened, rigid);
            if !is_opened(setup, ring, &opened, &acyclic_bonds(&trial)) {
                debug!(bond = %key, "Skipping break candidate that leaves the ring closed");
                continue;
            }
            match derive_tree(&trial, None, &BTreeSet::new()) {
                Ok(tree) => {
                    let penalty = self.rules.double_bond_penalty * f64::from(order - 1);
                    scores.push((key, tree.height() as f64 + penalty));
                }
                Err(e) => debug!(bond = %key, error = %e, "Skipping unscorable break candidate"),
            }
        }
        scores
    }

    /// Bond multiplicity of a breakable bond, `None` if the bond cannot be opened.
    fn candidate_order(
        &self,
        setup: &MoleculeSetup,
        key: BondKey,
        open: &[&Ring],
        breaks: &[BondKey],
        rigid: &BTreeSet<BondKey>,
    ) -> Option<u8> {
        let bond = setup.bond(key.first(), key.second())?;
        let carbon = |i: usize| {
            let atom = &setup.atoms()[i];
            atom.element == Element::C && !atom.is_aromatic && !atom.is_pseudo()
        };
        if !carbon(key.first()) || !carbon(key.second()) {
            return None;
        }
        if bond.user_rigid || rigid.contains(&key) {
            return None;
        }
        if breaks
            .iter()
            .any(|b| b.contains(key.first()) || b.contains(key.second()))
        {
            return None;
        }
        if open.iter().any(|r| r.contains_bond(key)) {
            return None;
        }
        bond.order.multiplicity().filter(|m| (1..=3).contains(m))
    }
}

/// Bonds that lie on no cycle once `breaks` are unlinked from the setup.
fn acyclic_after(setup: &MoleculeSetup, breaks: &[BondKey]) -> BTreeSet<BondKey> {
    let mut trial = setup.clone();
    apply_breaks(&mut trial, breaks, &BTreeSet::new());
    acyclic_bonds(&trial)
}

/// Whether `breaks` open `ring`.
///
/// The ring must contain a break, and each of its other bonds must either lie
/// on no cycle of the broken graph (`acyclic`) or belong to another perceived
/// ring that is still intact. A break on a bond shared by two rings of a
/// bridged system leaves the envelope cycle closed and fails this test.
fn is_opened(
    setup: &MoleculeSetup,
    ring: &Ring,
    breaks: &[BondKey],
    acyclic: &BTreeSet<BondKey>,
) -> bool {
    if !breaks.iter().any(|&k| ring.contains_bond(k)) {
        return false;
    }
    let intact: BTreeSet<BondKey> = setup
        .rings()
        .iter()
        .filter(|r| *r != ring && !breaks.iter().any(|&k| r.contains_bond(k)))
        .flat_map(Ring::bonds)
        .collect();
    ring.bonds()
        .all(|k| breaks.contains(&k) || acyclic.contains(&k) || intact.contains(&k))
}

/// Checks caller-supplied ring breaks against the setup and the glue coordinates.
///
/// # Errors
///
/// Fails on the first bond that is missing from the setup, not in a ring,
/// listed twice or sharing an endpoint with an earlier bond. Also fails on an
/// endpoint without a glue coordinate, on a glue coordinate that does not
/// have three values, or when more than [`MAX_BREAKS`] bonds are given.
pub fn validate_external_breaks(
    setup: &MoleculeSetup,
    delete_ring_bonds: &[(usize, usize)],
    glue: &BTreeMap<usize, Vec<f64>>,
) -> Result<Vec<BondKey>, RingBreakError> {
    if delete_ring_bonds.len() > MAX_BREAKS {
        return Err(RingBreakError::TooManyBreaks {
            requested: delete_ring_bonds.len(),
            max: MAX_BREAKS,
        });
    }
    let mut keys: Vec<BondKey> = Vec::with_capacity(delete_ring_bonds.len());
    for &(a, b) in delete_ring_bonds {
        let bond = setup
            .bond(a, b)
            .ok_or(RingBreakError::BondNotInSetup { a, b })?;
        if !bond.in_ring {
            return Err(RingBreakError::NotARingBond { a, b });
        }
        let key = BondKey::new(a, b);
        if keys.contains(&key) {
            return Err(RingBreakError::DuplicateBreak { a, b });
        }
        if let Some(atom) = [a, b]
            .into_iter()
            .find(|&atom| keys.iter().any(|k| k.contains(atom)))
        {
            return Err(RingBreakError::SharedEndpoint { atom });
        }
        for atom in [a, b] {
            let xyz = glue.get(&atom).ok_or(RingBreakError::MissingGlue { atom })?;
            if xyz.len() != 3 {
                return Err(RingBreakError::GlueArity {
                    atom,
                    got: xyz.len(),
                });
            }
        }
        keys.push(key);
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::bond_typer::{BondRules, BondTyper, LegacyBondTyper};
    use crate::engine::fixtures;
    use crate::engine::flexibility::build_flexibility;

    fn rules() -> MacrocycleRules {
        MacrocycleRules {
            min_ring_size: 7,
            max_ring_size: 33,
            double_bond_penalty: 50.0,
        }
    }

    fn typed(input: &str) -> MoleculeSetup {
        let mol = fixtures::molecule(input);
        let mut setup = fixtures::setup(input);
        for i in 0..setup.atom_count() {
            let label = setup.atoms()[i].element.symbol().to_string();
            setup.set_atom_type(i, label);
        }
        setup.merge_terminal_atoms(&["H".to_string()]);
        LegacyBondTyper
            .assign(&mut setup, &mol, &BondRules::default())
            .unwrap();
        setup
    }

    #[test]
    fn symmetric_ring_breaks_at_lowest_bond() {
        let setup = typed("C1CCCCCCC1");
        let plan = MacrocycleBreaker::new(rules()).plan(&setup, &[]);
        assert_eq!(plan.breaks, vec![BondKey::new(0, 1)]);
        assert_eq!(plan.decisions.len(), 1);
        let scores = &plan.decisions[0].scores;
        assert_eq!(scores.len(), 8);
        assert!(scores.iter().all(|&(_, s)| s == scores[0].1));
        assert!(!plan.rigid_ring_bonds.contains(&BondKey::new(0, 1)));
        assert!(plan.rigid_ring_bonds.is_empty());
    }

    #[test]
    fn small_and_aromatic_rings_stay_rigid() {
        let setup = typed("C1CCCCC1c1ccccc1");
        let plan = MacrocycleBreaker::new(rules()).plan(&setup, &[]);
        assert!(plan.breaks.is_empty());
        assert!(plan.decisions.is_empty());
        assert_eq!(plan.rigid_ring_bonds.len(), 12);
    }

    #[test]
    fn double_bonds_are_penalised() {
        // Cyclooctene, double bond between atoms 0 and 1.
        let setup = typed("C1=CCCCCCC1");
        let plan = MacrocycleBreaker::new(rules()).plan(&setup, &[]);
        let chosen = plan.breaks[0];
        assert_ne!(chosen, BondKey::new(0, 1));
        let double = plan.decisions[0]
            .scores
            .iter()
            .find(|(k, _)| *k == BondKey::new(0, 1))
            .unwrap();
        assert!(double.1 >= 50.0);
    }

    #[test]
    fn at_most_four_rings_are_opened() {
        let setup = typed("C1CC1C1CC1C1CC1C1CC1C1CC1");
        let small = MacrocycleRules {
            min_ring_size: 3,
            ..rules()
        };
        let plan = MacrocycleBreaker::new(small).plan(&setup, &[]);
        assert_eq!(plan.breaks.len(), MAX_BREAKS);
        assert_eq!(plan.decisions.len(), 5);
        assert_eq!(plan.decisions[4].ring.len(), 3);
        assert!(plan.decisions[4].broken.is_none());
        for key in Ring::new(plan.decisions[4].ring.clone()).bonds() {
            assert!(plan.rigid_ring_bonds.contains(&key));
        }
    }

    #[test]
    fn explicit_breaks_bypass_scoring() {
        let setup = typed("C1CCCCCCC1");
        let key = BondKey::new(3, 4);
        let plan = MacrocycleBreaker::new(rules()).plan(&setup, &[key]);
        assert!(plan.explicit);
        assert_eq!(plan.breaks, vec![key]);
        assert_eq!(plan.decisions[0].broken, Some(key));
        assert!(plan.decisions[0].scores.is_empty());
    }

    #[test]
    fn rigid_plan_freezes_all_ring_bonds() {
        let setup = typed("C1CCCCCCC1");
        let plan = MacrocycleBreaker::rigid(&setup);
        assert!(plan.breaks.is_empty());
        assert_eq!(plan.rigid_ring_bonds.len(), 8);
    }

    #[test]
    fn external_breaks_are_validated() {
        let setup = typed("C1CCCCCCC1CC");
        let glue = BTreeMap::from([(0, vec![0.0, 0.0, 0.0]), (7, vec![1.0, 0.0])]);

        assert_eq!(
            validate_external_breaks(&setup, &[(0, 5)], &glue).unwrap_err(),
            RingBreakError::BondNotInSetup { a: 0, b: 5 }
        );
        assert_eq!(
            validate_external_breaks(&setup, &[(8, 9)], &glue).unwrap_err(),
            RingBreakError::NotARingBond { a: 8, b: 9 }
        );
        assert_eq!(
            validate_external_breaks(&setup, &[(1, 2)], &glue).unwrap_err(),
            RingBreakError::MissingGlue { atom: 1 }
        );
        let err = validate_external_breaks(&setup, &[(0, 7)], &glue).unwrap_err();
        assert_eq!(err.to_string(), "expected 3 coordinates (got 2) for glue pseudo of atom 7");

        let glue = BTreeMap::from([(0, vec![0.0, 0.0, 0.0]), (7, vec![1.0, 0.0, 0.0])]);
        assert_eq!(
            validate_external_breaks(&setup, &[(7, 0)], &glue).unwrap(),
            vec![BondKey::new(0, 7)]
        );
        assert!(validate_external_breaks(&setup, &[], &BTreeMap::new())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn duplicate_and_touching_external_breaks_are_rejected() {
        let setup = typed("C1CCCCCCC1CC");
        let glue = BTreeMap::from([
            (0, vec![0.0, 0.0, 0.0]),
            (1, vec![0.0, 1.0, 0.0]),
            (7, vec![1.0, 0.0, 0.0]),
        ]);
        assert_eq!(
            validate_external_breaks(&setup, &[(0, 7), (7, 0)], &glue).unwrap_err(),
            RingBreakError::DuplicateBreak { a: 7, b: 0 }
        );
        assert_eq!(
            validate_external_breaks(&setup, &[(0, 7), (0, 1)], &glue).unwrap_err(),
            RingBreakError::SharedEndpoint { atom: 0 }
        );
    }

    fn torsions_after(setup: &MoleculeSetup, plan: &RingBreakPlan) -> usize {
        build_flexibility(setup, plan, &BTreeMap::new(), None, &[])
            .unwrap()
            .flexibility()
            .unwrap()
            .torsion_count()
    }

    #[test]
    fn bridged_macrocycle_is_not_opened_on_a_shared_bond() {
        // A 12-ring and a 13-ring sharing the path 11-0-1-2; the 19-atom
        // envelope around them is not a perceived ring.
        let setup = typed("C1CC2CCCCCCCCC1CCCCCCCCC2");
        let plan = MacrocycleBreaker::new(rules()).plan(&setup, &[]);
        let shared = [BondKey::new(0, 1), BondKey::new(1, 2), BondKey::new(0, 11)];

        assert_eq!(plan.decisions.len(), 2);
        assert_eq!(plan.decisions[0].ring.len(), 12);
        assert_eq!(plan.decisions[1].ring.len(), 13);
        assert_eq!(plan.breaks.len(), 2);
        for key in &shared {
            assert!(!plan.breaks.contains(key), "shared bond {key} was broken");
            assert!(plan.decisions[0].scores.iter().all(|(k, _)| k != key));
        }
        assert_ne!(plan.decisions[0].broken, plan.decisions[1].broken);
        assert!(torsions_after(&setup, &plan) > 0);
    }

    #[test]
    fn fused_macrocycles_each_get_their_own_break() {
        // Two eight-rings sharing bond 0-7.
        let setup = typed("C12CCCCCCC1CCCCCC2");
        let plan = MacrocycleBreaker::new(rules()).plan(&setup, &[]);
        assert_eq!(plan.decisions.len(), 2);
        assert_eq!(plan.breaks.len(), 2);
        assert!(!plan.breaks.contains(&BondKey::new(0, 7)));
        for (decision, key) in plan.decisions.iter().zip(&plan.breaks) {
            assert_eq!(decision.broken, Some(*key));
        }
        let (first, second) = (plan.breaks[0], plan.breaks[1]);
        assert!(!first.contains(second.first()) && !first.contains(second.second()));
        assert!(plan.rigid_ring_bonds.is_empty());
        assert!(torsions_after(&setup, &plan) > 0);
    }

    #[test]
    fn ring_without_carbon_carbon_bonds_stays_rigid() {
        let setup = typed("C1OCOCOCO1");
        let plan = MacrocycleBreaker::new(rules()).plan(&setup, &[]);
        assert!(plan.breaks.is_empty());
        assert_eq!(plan.decisions.len(), 1);
        assert!(plan.decisions[0].broken.is_none());
        assert!(plan.decisions[0].scores.is_empty());
        assert_eq!(plan.rigid_ring_bonds.len(), 8);
    }

    #[test]
    fn describe_lists_decisions() {
        let setup = typed("C1CCCCCCC1");
        let text = MacrocycleBreaker::new(rules()).plan(&setup, &[]).describe();
        assert!(text.contains("Macrocycle breaks (scored): 1"));
        assert!(text.contains("broken (0, 1)"));
    }
}
