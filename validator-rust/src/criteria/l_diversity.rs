use crate::errors::*;

use crate::base::{DataDefinition, EncodedDataset, EquivalenceClass};
use crate::criteria::{validate_sensitive, Criterion, CriterionContext, PrivacyCriterion};

use serde::{Deserialize, Serialize};


/// Every class contains at least `l` distinct values of the sensitive attribute.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistinctLDiversity {
    pub attribute: String,
    pub l: usize,
}

impl PrivacyCriterion for DistinctLDiversity {
    fn is_fulfilled(&self, class: &EquivalenceClass, context: &CriterionContext) -> Result<bool> {
        let (_, distribution) = context.lookup(class, &self.attribute)?;
        Ok(distribution.distinct() >= self.l)
    }

    fn is_monotonic(&self) -> bool {
        true
    }

    fn sensitive_attribute(&self) -> Option<&str> {
        Some(&self.attribute)
    }

    fn minimal_class_size(&self) -> Option<usize> {
        Some(self.l)
    }

    fn is_local_recoding_supported(&self) -> bool {
        true
    }

    fn project(&self, _rows: &[usize]) -> Criterion {
        self.clone().into()
    }

    fn validate(&self, definition: &DataDefinition, dataset: &EncodedDataset) -> Result<()> {
        validate_sensitive(&self.attribute, definition, dataset)?;
        if self.l == 0 {
            bail!("l: must be positive")
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "distinct l-diversity"
    }
}


/// The entropy of the sensitive attribute within every class is at least `ln(l)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntropyLDiversity {
    pub attribute: String,
    pub l: usize,
}

impl PrivacyCriterion for EntropyLDiversity {
    fn is_fulfilled(&self, class: &EquivalenceClass, context: &CriterionContext) -> Result<bool> {
        let (_, distribution) = context.lookup(class, &self.attribute)?;
        Ok(distribution.entropy() + 1e-10 >= (self.l as f64).ln())
    }

    fn is_monotonic(&self) -> bool {
        true
    }

    fn sensitive_attribute(&self) -> Option<&str> {
        Some(&self.attribute)
    }

    fn minimal_class_size(&self) -> Option<usize> {
        Some(self.l)
    }

    fn is_local_recoding_supported(&self) -> bool {
        true
    }

    fn project(&self, _rows: &[usize]) -> Criterion {
        self.clone().into()
    }

    fn validate(&self, definition: &DataDefinition, dataset: &EncodedDataset) -> Result<()> {
        validate_sensitive(&self.attribute, definition, dataset)?;
        if self.l == 0 {
            bail!("l: must be positive")
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "entropy l-diversity"
    }
}


/// The most frequent sensitive value of every class is rarer than `c` times
/// the combined frequency of all but the `l - 1` most frequent values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecursiveCLDiversity {
    pub attribute: String,
    pub c: f64,
    pub l: usize,
}

impl PrivacyCriterion for RecursiveCLDiversity {
    fn is_fulfilled(&self, class: &EquivalenceClass, context: &CriterionContext) -> Result<bool> {
        let (_, distribution) = context.lookup(class, &self.attribute)?;
        let counts = distribution.sorted_counts();
        if counts.len() < self.l {
            return Ok(false);
        }
        let tail: usize = counts[self.l - 1..].iter().sum();
        Ok((counts[0] as f64) < self.c * tail as f64)
    }

    fn is_monotonic(&self) -> bool {
        true
    }

    fn sensitive_attribute(&self) -> Option<&str> {
        Some(&self.attribute)
    }

    fn minimal_class_size(&self) -> Option<usize> {
        Some(self.l)
    }

    fn is_local_recoding_supported(&self) -> bool {
        true
    }

    fn project(&self, _rows: &[usize]) -> Criterion {
        self.clone().into()
    }

    fn validate(&self, definition: &DataDefinition, dataset: &EncodedDataset) -> Result<()> {
        validate_sensitive(&self.attribute, definition, dataset)?;
        if self.l == 0 {
            bail!("l: must be positive")
        }
        if !(self.c > 0.) || !self.c.is_finite() {
            bail!("c: must be a positive number")
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recursive (c,l)-diversity"
    }
}
