use crate::errors::*;

use crate::base::{DataDefinition, EncodedDataset, EquivalenceClass};
use crate::criteria::{Criterion, CriterionContext, DataSubset, PrivacyCriterion};

use serde::{Deserialize, Serialize};


/// Restrict the other criteria to the rows of a research subset.
///
/// Imposes no condition of its own.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Inclusion {
    pub subset: DataSubset,
}

impl PrivacyCriterion for Inclusion {
    fn is_fulfilled(&self, _class: &EquivalenceClass, _context: &CriterionContext) -> Result<bool> {
        Ok(true)
    }

    fn is_monotonic(&self) -> bool {
        true
    }

    fn subset(&self) -> Option<&DataSubset> {
        Some(&self.subset)
    }

    fn is_local_recoding_supported(&self) -> bool {
        true
    }

    fn project(&self, rows: &[usize]) -> Criterion {
        Inclusion { subset: self.subset.project(rows) }.into()
    }

    fn validate(&self, _definition: &DataDefinition, dataset: &EncodedDataset) -> Result<()> {
        self.subset.validate(dataset)
    }

    fn name(&self) -> &'static str {
        "inclusion"
    }
}


/// The share of research subset rows among all rows of every class lies within `[delta_min, delta_max]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DPresence {
    pub delta_min: f64,
    pub delta_max: f64,
    pub subset: DataSubset,
}

impl PrivacyCriterion for DPresence {
    fn is_fulfilled(&self, class: &EquivalenceClass, _context: &CriterionContext) -> Result<bool> {
        if class.population_count == 0 {
            return Ok(true);
        }
        let delta = class.count as f64 / class.population_count as f64;
        Ok(self.delta_min <= delta && delta <= self.delta_max)
    }

    fn is_monotonic(&self) -> bool {
        false
    }

    fn subset(&self) -> Option<&DataSubset> {
        Some(&self.subset)
    }

    fn is_local_recoding_supported(&self) -> bool {
        false
    }

    fn project(&self, rows: &[usize]) -> Criterion {
        DPresence {
            delta_min: self.delta_min,
            delta_max: self.delta_max,
            subset: self.subset.project(rows),
        }.into()
    }

    fn validate(&self, _definition: &DataDefinition, dataset: &EncodedDataset) -> Result<()> {
        if !(0. <= self.delta_min && self.delta_min <= self.delta_max && self.delta_max <= 1.) {
            bail!("delta: must satisfy 0 <= delta_min <= delta_max <= 1, got [{}, {}]", self.delta_min, self.delta_max)
        }
        self.subset.validate(dataset)
    }

    fn name(&self) -> &'static str {
        "d-presence"
    }
}


#[cfg(test)]
mod test_d_presence {
    use crate::base::EquivalenceClass;
    use crate::base::test_data::{age_dataset, age_definition};
    use crate::criteria::{Criterion, CriterionContext, DataSubset, DPresence, Inclusion, PrivacyCriterion};

    fn class(count: usize, population_count: usize) -> EquivalenceClass {
        EquivalenceClass { representative: 0, count, population_count, distributions: vec![] }
    }

    #[test]
    fn presence_ratio() {
        let criterion = DPresence { delta_min: 0.25, delta_max: 0.5, subset: DataSubset::new(vec![0]) };
        let context = CriterionContext::default();
        assert!(criterion.is_fulfilled(&class(1, 2), &context).unwrap());
        assert!(!criterion.is_fulfilled(&class(2, 2), &context).unwrap());
        assert!(!criterion.is_fulfilled(&class(1, 5), &context).unwrap());
    }

    #[test]
    fn projection_reindexes_subset() {
        let criterion = Inclusion { subset: DataSubset::new(vec![2, 3]) };
        match criterion.project(&[3, 4]) {
            Criterion::Inclusion(projected) => assert_eq!(projected.subset, DataSubset::new(vec![0])),
            other => panic!("unexpected criterion: {:?}", other)
        }
    }

    #[test]
    fn validates_deltas() {
        let criterion = DPresence { delta_min: 0.6, delta_max: 0.5, subset: DataSubset::new(vec![0]) };
        assert!(criterion.validate(&age_definition(), &age_dataset()).is_err());
        let criterion = DPresence { delta_min: 0., delta_max: 0.5, subset: DataSubset::new(vec![0]) };
        assert!(criterion.validate(&age_definition(), &age_dataset()).is_ok());
    }
}
