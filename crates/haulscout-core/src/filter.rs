use crate::{ScrapedLoad, SearchCriteria};

/// Post-extraction constraints the marketplace search form cannot express.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadFilter {
    pub min_rate: Option<f64>,
    pub equipment: Option<String>,
    pub min_weight: Option<f64>,
    pub max_weight: Option<f64>,
}

impl LoadFilter {
    pub fn from_criteria(criteria: &SearchCriteria) -> Self {
        Self {
            min_rate: criteria.min_rate,
            equipment: criteria
                .equipment_type
                .as_deref()
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_lowercase),
            min_weight: criteria.min_weight,
            max_weight: criteria.max_weight,
        }
    }

    pub fn matches(&self, load: &ScrapedLoad) -> bool {
        if let Some(min_rate) = self.min_rate {
            // An unknown rate cannot satisfy a minimum.
            match load.rate {
                Some(rate) if rate >= min_rate => {}
                _ => return false,
            }
        }

        if let Some(equipment) = &self.equipment {
            if !load.equipment.to_lowercase().contains(&equipment.to_lowercase()) {
                return false;
            }
        }

        if let Some(weight) = load.weight {
            if self.min_weight.is_some_and(|min| weight < min) {
                return false;
            }
            if self.max_weight.is_some_and(|max| weight > max) {
                return false;
            }
        }

        true
    }

    /// Keeps the loads that pass every constraint, in their original order.
    pub fn apply(&self, loads: Vec<ScrapedLoad>) -> Vec<ScrapedLoad> {
        loads.into_iter().filter(|load| self.matches(load)).collect()
    }
}
