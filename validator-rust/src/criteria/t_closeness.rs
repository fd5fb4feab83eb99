use crate::errors::*;

use crate::base::{DataDefinition, Distribution, EncodedDataset, EquivalenceClass, Hierarchy};
use crate::criteria::{validate_sensitive, Criterion, CriterionContext, PrivacyCriterion};

use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};


/// The earth mover's distance between the sensitive values of every class and of the whole dataset
/// is at most `t`, with all values at distance one from each other.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EqualDistanceTCloseness {
    pub attribute: String,
    pub t: f64,
}

impl PrivacyCriterion for EqualDistanceTCloseness {
    fn is_fulfilled(&self, class: &EquivalenceClass, context: &CriterionContext) -> Result<bool> {
        let (attribute, distribution) = context.lookup(class, &self.attribute)?;
        Ok(equal_distance(distribution, &attribute.distribution) <= self.t + 1e-10)
    }

    fn is_monotonic(&self) -> bool {
        true
    }

    fn sensitive_attribute(&self) -> Option<&str> {
        Some(&self.attribute)
    }

    fn is_local_recoding_supported(&self) -> bool {
        true
    }

    fn project(&self, _rows: &[usize]) -> Criterion {
        self.clone().into()
    }

    fn validate(&self, definition: &DataDefinition, dataset: &EncodedDataset) -> Result<()> {
        validate_sensitive(&self.attribute, definition, dataset)?;
        validate_threshold(self.t)
    }

    fn name(&self) -> &'static str {
        "equal-distance t-closeness"
    }
}


/// Like [`EqualDistanceTCloseness`](struct.EqualDistanceTCloseness.html), with the ground distance
/// between two values given by the height of their lowest common ancestor in the attribute hierarchy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HierarchicalDistanceTCloseness {
    pub attribute: String,
    pub t: f64,
}

impl PrivacyCriterion for HierarchicalDistanceTCloseness {
    fn is_fulfilled(&self, class: &EquivalenceClass, context: &CriterionContext) -> Result<bool> {
        let (attribute, distribution) = context.lookup(class, &self.attribute)?;
        let hierarchy = attribute.hierarchy.as_ref()
            .ok_or_else(|| Error::from(format!("attribute '{}' has no hierarchy", self.attribute)))?;
        Ok(hierarchical_distance(distribution, &attribute.distribution, hierarchy) <= self.t + 1e-10)
    }

    fn is_monotonic(&self) -> bool {
        true
    }

    fn sensitive_attribute(&self) -> Option<&str> {
        Some(&self.attribute)
    }

    fn is_local_recoding_supported(&self) -> bool {
        true
    }

    fn project(&self, _rows: &[usize]) -> Criterion {
        self.clone().into()
    }

    fn validate(&self, definition: &DataDefinition, dataset: &EncodedDataset) -> Result<()> {
        validate_sensitive(&self.attribute, definition, dataset)?;
        let height = dataset.column_index(&self.attribute)
            .and_then(|column| dataset.hierarchy(column))
            .map(Hierarchy::height)
            .unwrap_or(0);
        if height == 0 {
            bail!("attribute '{}' needs a hierarchy with at least two levels", self.attribute)
        }
        validate_threshold(self.t)
    }

    fn name(&self) -> &'static str {
        "hierarchical-distance t-closeness"
    }
}


fn validate_threshold(t: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&t) {
        bail!("t: must be within [0, 1], got {}", t)
    }
    Ok(())
}

fn codes(class: &Distribution, global: &Distribution) -> Vec<usize> {
    global.iter().chain(class.iter()).map(|(code, _)| code).unique().collect()
}

/// Half the L1 distance between two distributions.
fn equal_distance(class: &Distribution, global: &Distribution) -> f64 {
    codes(class, global).into_iter()
        .map(|code| (class.probability(code) - global.probability(code)).abs())
        .sum::<f64>() / 2.
}

/// Earth mover's distance over a generalization hierarchy.
///
/// Surplus and deficit are moved up one level at a time. At every node the matched
/// mass costs the relative height of the node, and the remainder is passed to the parent.
fn hierarchical_distance(class: &Distribution, global: &Distribution, hierarchy: &Hierarchy) -> f64 {
    let height = hierarchy.height();
    if height == 0 {
        return 0.;
    }

    // generalized code -> (raw code below it, net surplus)
    let mut extras: IndexMap<usize, (usize, f64)> = codes(class, global).into_iter()
        .map(|code| (code, (code, class.probability(code) - global.probability(code))))
        .collect();

    let mut cost = 0.;
    for level in 1..=height {
        let mut parents = IndexMap::<usize, (usize, f64, f64)>::new();
        for (_, (raw, extra)) in extras {
            let parent = parents.entry(hierarchy.generalize(raw, level)).or_insert((raw, 0., 0.));
            if extra > 0. { parent.1 += extra } else { parent.2 -= extra }
        }
        cost += parents.values()
            .map(|(_, surplus, deficit)| surplus.min(*deficit))
            .sum::<f64>() * level as f64 / height as f64;
        extras = parents.into_iter()
            .map(|(code, (raw, surplus, deficit))| (code, (raw, surplus - deficit)))
            .collect();
    }
    cost
}
