use crate::errors::*;

use crate::base::{DataDefinition, EncodedDataset, EquivalenceClass};
use crate::criteria::{Criterion, CriterionContext, PrivacyCriterion};

use serde::{Deserialize, Serialize};


/// Every class contains at least `k` rows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KAnonymity {
    pub k: usize,
}

impl PrivacyCriterion for KAnonymity {
    fn is_fulfilled(&self, class: &EquivalenceClass, _context: &CriterionContext) -> Result<bool> {
        Ok(class.count >= self.k)
    }

    fn is_monotonic(&self) -> bool {
        true
    }

    fn minimal_class_size(&self) -> Option<usize> {
        Some(self.k)
    }

    fn is_local_recoding_supported(&self) -> bool {
        true
    }

    fn project(&self, _rows: &[usize]) -> Criterion {
        self.clone().into()
    }

    fn validate(&self, _definition: &DataDefinition, _dataset: &EncodedDataset) -> Result<()> {
        if self.k == 0 {
            bail!("k: must be positive")
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "k-anonymity"
    }
}
