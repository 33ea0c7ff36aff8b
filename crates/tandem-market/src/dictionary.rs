//! Demand-kind to supply-kind compatibility.
//!
//! The [`SupplyDemandDictionary`] answers one question: which supply kinds,
//! at which minimum quality, does a demand of a given kind need? A demand
//! kind with no dictionary entry can never be matched, which is how whole
//! categories of work are switched off.
//!
//! Achievability comes in two depths. The *shallow* check asks whether any
//! unmet requirement could be served by a usable supply of sufficient
//! quality; it gates backlog admission. The *deep* check additionally
//! requires every unmet requirement to have the full effort in stock, and
//! gates nothing by itself -- agents prefer to try, replenish, and roll back.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tandem_types::{DemandKind, SupplyKind, SupplyQuality};

use crate::demand::Demand;
use crate::supply::Supply;

/// One supply requirement of a demand kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    /// The supply kind needed.
    pub kind: SupplyKind,
    /// The minimum quality tier that satisfies the requirement.
    pub min_quality: SupplyQuality,
}

/// Mapping from demand kinds to their supply requirements.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupplyDemandDictionary {
    map: BTreeMap<DemandKind, Vec<Requirement>>,
}

impl SupplyDemandDictionary {
    /// Create an empty dictionary. No demand kind is matchable until
    /// requirements are added.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard mapping: each work category requires its own skill,
    /// and the heavier categories pull in supporting skills as well.
    #[must_use]
    pub fn standard() -> Self {
        let mut dict = Self::new();
        dict.add_requirement(
            DemandKind::Development,
            SupplyKind::Development,
            SupplyQuality::Low,
        );
        dict.add_requirement(DemandKind::Analysis, SupplyKind::Development, SupplyQuality::Low);
        dict.add_requirement(DemandKind::Analysis, SupplyKind::Analysis, SupplyQuality::Low);
        dict.add_requirement(DemandKind::Modeling, SupplyKind::Analysis, SupplyQuality::Low);
        dict.add_requirement(DemandKind::Modeling, SupplyKind::Modeling, SupplyQuality::Low);
        dict.add_requirement(
            DemandKind::Modeling,
            SupplyKind::Communication,
            SupplyQuality::Low,
        );
        dict.add_requirement(
            DemandKind::Communication,
            SupplyKind::Communication,
            SupplyQuality::Low,
        );
        dict.add_requirement(
            DemandKind::Management,
            SupplyKind::Communication,
            SupplyQuality::Low,
        );
        dict.add_requirement(DemandKind::Management, SupplyKind::Management, SupplyQuality::Low);
        dict
    }

    /// Register a requirement for a demand kind. Duplicate supply kinds
    /// keep the stricter minimum quality.
    pub fn add_requirement(
        &mut self,
        demand: DemandKind,
        supply: SupplyKind,
        min_quality: SupplyQuality,
    ) {
        let requirements = self.map.entry(demand).or_default();
        if let Some(existing) = requirements.iter_mut().find(|r| r.kind == supply) {
            existing.min_quality = existing.min_quality.max(min_quality);
            return;
        }
        requirements.push(Requirement {
            kind: supply,
            min_quality,
        });
    }

    /// The requirements for a demand kind, or `None` if the kind has no
    /// entry (and therefore can never be matched).
    pub fn required_supplies(&self, kind: DemandKind) -> Option<&[Requirement]> {
        self.map.get(&kind).map(Vec::as_slice)
    }

    /// Shallow achievability: does any requirement of the demand, not yet
    /// covered by its partial progress, have a usable supply of sufficient
    /// quality among `supplies`?
    pub fn is_achievable_any(
        &self,
        demand: &Demand,
        effective_kind: DemandKind,
        supplies: &mut [Supply],
        now: u64,
    ) -> bool {
        let (any, _) = self.coverage(demand, effective_kind, supplies, now, false);
        any
    }

    /// Deep achievability: does *every* uncovered requirement have a usable
    /// supply of sufficient quality holding the demand's full effort?
    pub fn is_achievable_all(
        &self,
        demand: &Demand,
        effective_kind: DemandKind,
        supplies: &mut [Supply],
        now: u64,
    ) -> bool {
        let (_, all) = self.coverage(demand, effective_kind, supplies, now, true);
        all
    }

    /// Evaluate requirement coverage, returning `(any met, all met)` over
    /// the requirements the demand's partial progress does not yet cover.
    fn coverage(
        &self,
        demand: &Demand,
        effective_kind: DemandKind,
        supplies: &mut [Supply],
        now: u64,
        check_amount: bool,
    ) -> (bool, bool) {
        let Some(requirements) = self.map.get(&effective_kind) else {
            return (false, false);
        };
        let mut any = false;
        let mut all = true;
        let mut unmet_seen = false;
        for requirement in requirements {
            if demand.partial_progress(requirement.kind) > 0 {
                continue;
            }
            unmet_seen = true;
            let met = supplies.iter_mut().any(|supply| {
                supply.kind() == requirement.kind
                    && supply.quality() >= requirement.min_quality
                    && supply.is_usable(now)
                    && (!check_amount || supply.amount() >= demand.effort())
            });
            any |= met;
            all &= met;
        }
        if !unmet_seen {
            // Everything already covered: nothing left to block on.
            return (true, true);
        }
        (any, all)
    }
}

#[cfg(test)]
mod tests {
    use tandem_types::DemandPriority;

    use super::*;

    fn make_supply(kind: SupplyKind, quality: SupplyQuality, capacity: u32) -> Supply {
        Supply::new("s", kind, quality, capacity)
    }

    fn make_demand(kind: DemandKind, effort: u32) -> Demand {
        Demand::new("d", kind, DemandPriority::Medium, effort)
    }

    #[test]
    fn unmapped_kind_is_never_achievable() {
        let dict = SupplyDemandDictionary::new();
        let demand = make_demand(DemandKind::Analysis, 10);
        let mut supplies =
            vec![make_supply(SupplyKind::Analysis, SupplyQuality::High, 100)];
        assert!(!dict.is_achievable_any(&demand, demand.kind(), &mut supplies, 0));
    }

    #[test]
    fn shallow_check_accepts_one_matching_supply() {
        let dict = SupplyDemandDictionary::standard();
        let demand = make_demand(DemandKind::Analysis, 10);
        // Analysis needs Development and Analysis; only one is held.
        let mut supplies =
            vec![make_supply(SupplyKind::Analysis, SupplyQuality::Medium, 100)];
        assert!(dict.is_achievable_any(&demand, demand.kind(), &mut supplies, 0));
        assert!(!dict.is_achievable_all(&demand, demand.kind(), &mut supplies, 0));
    }

    #[test]
    fn quality_below_minimum_does_not_match() {
        let mut dict = SupplyDemandDictionary::new();
        dict.add_requirement(
            DemandKind::Analysis,
            SupplyKind::Analysis,
            SupplyQuality::High,
        );
        let demand = make_demand(DemandKind::Analysis, 10);
        let mut supplies =
            vec![make_supply(SupplyKind::Analysis, SupplyQuality::Medium, 100)];
        assert!(!dict.is_achievable_any(&demand, demand.kind(), &mut supplies, 0));
    }

    #[test]
    fn partial_progress_skips_covered_requirements() {
        let dict = SupplyDemandDictionary::standard();
        let mut demand = make_demand(DemandKind::Analysis, 10);
        demand.record_partial(SupplyKind::Development, 10);
        // Development is covered; only Analysis has to be serveable now.
        let mut supplies =
            vec![make_supply(SupplyKind::Analysis, SupplyQuality::Low, 100)];
        assert!(dict.is_achievable_all(&demand, demand.kind(), &mut supplies, 0));
    }

    #[test]
    fn deep_check_requires_full_effort_in_stock() {
        let dict = SupplyDemandDictionary::standard();
        let demand = make_demand(DemandKind::Development, 50);
        let mut supplies =
            vec![make_supply(SupplyKind::Development, SupplyQuality::Low, 20)];
        assert!(dict.is_achievable_any(&demand, demand.kind(), &mut supplies, 0));
        assert!(!dict.is_achievable_all(&demand, demand.kind(), &mut supplies, 0));
    }

    #[test]
    fn duplicate_requirement_keeps_stricter_quality() {
        let mut dict = SupplyDemandDictionary::new();
        dict.add_requirement(
            DemandKind::Development,
            SupplyKind::Development,
            SupplyQuality::Medium,
        );
        dict.add_requirement(
            DemandKind::Development,
            SupplyKind::Development,
            SupplyQuality::Low,
        );
        let requirements = dict.required_supplies(DemandKind::Development);
        assert_eq!(
            requirements.map(<[Requirement]>::len),
            Some(1)
        );
        assert_eq!(
            requirements.and_then(|r| r.first().map(|r| r.min_quality)),
            Some(SupplyQuality::Medium)
        );
    }
}
