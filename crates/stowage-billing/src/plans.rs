// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store product id to plan catalog.

use std::collections::{BTreeMap, HashMap};

use stowage_core::Plan;

/// Built-in product ids. Config may add to or override these.
const DEFAULT_PLANS: &[(&str, Plan)] = &[
    ("rc_pro_monthly", Plan::ProMonthly),
    ("rc_pro_yearly", Plan::ProYearly),
    ("rc_pro_annual", Plan::ProYearly),
    ("rc_pro_lifetime", Plan::ProLifetime),
];

/// Resolves store product ids to plans.
#[derive(Debug, Clone)]
pub struct PlanCatalog {
    plans: HashMap<String, Plan>,
}

impl Default for PlanCatalog {
    fn default() -> Self {
        Self::with_overrides(&BTreeMap::new())
    }
}

impl PlanCatalog {
    /// The built-in catalog extended with `overrides`.
    pub fn with_overrides(overrides: &BTreeMap<String, Plan>) -> Self {
        let mut plans: HashMap<String, Plan> = DEFAULT_PLANS
            .iter()
            .map(|(id, plan)| ((*id).to_string(), *plan))
            .collect();
        for (id, plan) in overrides {
            plans.insert(normalize(id), *plan);
        }
        Self { plans }
    }

    /// Resolve a product id. Store base-plan suffixes (`rc_pro_monthly:p1m`)
    /// and letter case are ignored.
    pub fn resolve(&self, product_id: &str) -> Option<Plan> {
        self.plans.get(&normalize(product_id)).copied()
    }
}

fn normalize(product_id: &str) -> String {
    product_id
        .split(':')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve() {
        let catalog = PlanCatalog::default();
        assert_eq!(catalog.resolve("rc_pro_monthly"), Some(Plan::ProMonthly));
        assert_eq!(catalog.resolve("rc_pro_yearly"), Some(Plan::ProYearly));
        assert_eq!(catalog.resolve("rc_pro_annual"), Some(Plan::ProYearly));
        assert_eq!(catalog.resolve("rc_pro_lifetime"), Some(Plan::ProLifetime));
        assert_eq!(catalog.resolve("rc_gold"), None);
    }

    #[test]
    fn suffix_and_case_are_ignored() {
        let catalog = PlanCatalog::default();
        assert_eq!(catalog.resolve("rc_pro_monthly:p1m"), Some(Plan::ProMonthly));
        assert_eq!(catalog.resolve("RC_PRO_YEARLY"), Some(Plan::ProYearly));
    }

    #[test]
    fn overrides_extend_and_replace() {
        let overrides = BTreeMap::from([
            ("Legacy_Annual".to_string(), Plan::ProYearly),
            ("rc_pro_monthly".to_string(), Plan::ProYearly),
        ]);
        let catalog = PlanCatalog::with_overrides(&overrides);
        assert_eq!(catalog.resolve("legacy_annual"), Some(Plan::ProYearly));
        assert_eq!(catalog.resolve("rc_pro_monthly"), Some(Plan::ProYearly));
        assert_eq!(catalog.resolve("rc_pro_lifetime"), Some(Plan::ProLifetime));
    }
}
