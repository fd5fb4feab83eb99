//! Privacy criteria evaluated per equivalence class.
//!
//! Every criterion implements [`PrivacyCriterion`](trait.PrivacyCriterion.html).
//! The closed set of criteria is wrapped in the [`Criterion`](enum.Criterion.html) enum,
//! which is what configurations hold and what the checker iterates.

use crate::errors::*;

use crate::base::{AttributeType, DataDefinition, Distribution, EncodedDataset, EquivalenceClass, Hierarchy};

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

pub mod d_presence;
pub mod k_anonymity;
pub mod l_diversity;
pub mod t_closeness;

pub use d_presence::{DPresence, Inclusion};
pub use k_anonymity::KAnonymity;
pub use l_diversity::{DistinctLDiversity, EntropyLDiversity, RecursiveCLDiversity};
pub use t_closeness::{EqualDistanceTCloseness, HierarchicalDistanceTCloseness};


pub trait PrivacyCriterion {
    /// Decide whether one equivalence class satisfies the criterion.
    ///
    /// # Arguments
    /// * `class` - counts and sensitive distributions of the class
    /// * `context` - dataset-wide information about the sensitive attributes
    fn is_fulfilled(&self, class: &EquivalenceClass, context: &CriterionContext) -> Result<bool>;

    /// If a class is fulfilled, every class merged from it through generalization is fulfilled too.
    fn is_monotonic(&self) -> bool;

    fn sensitive_attribute(&self) -> Option<&str> {
        None
    }

    /// Research subset that restricts which rows are counted.
    fn subset(&self) -> Option<&DataSubset> {
        None
    }

    /// Smallest class size that can possibly satisfy the criterion.
    fn minimal_class_size(&self) -> Option<usize> {
        None
    }

    fn is_local_recoding_supported(&self) -> bool;

    /// Re-index the criterion onto a selection of rows, in the order given.
    fn project(&self, rows: &[usize]) -> Criterion;

    /// Check the parameters of the criterion against the problem definition.
    fn validate(&self, definition: &DataDefinition, dataset: &EncodedDataset) -> Result<()>;

    fn name(&self) -> &'static str;
}


#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Criterion {
    KAnonymity(KAnonymity),
    DistinctLDiversity(DistinctLDiversity),
    EntropyLDiversity(EntropyLDiversity),
    RecursiveCLDiversity(RecursiveCLDiversity),
    EqualDistanceTCloseness(EqualDistanceTCloseness),
    HierarchicalDistanceTCloseness(HierarchicalDistanceTCloseness),
    Inclusion(Inclusion),
    DPresence(DPresence),
}

macro_rules! delegate {
    ($criterion:expr, |$inner:ident| $body:expr) => {
        match $criterion {
            Criterion::KAnonymity($inner) => $body,
            Criterion::DistinctLDiversity($inner) => $body,
            Criterion::EntropyLDiversity($inner) => $body,
            Criterion::RecursiveCLDiversity($inner) => $body,
            Criterion::EqualDistanceTCloseness($inner) => $body,
            Criterion::HierarchicalDistanceTCloseness($inner) => $body,
            Criterion::Inclusion($inner) => $body,
            Criterion::DPresence($inner) => $body,
        }
    }
}

impl PrivacyCriterion for Criterion {
    /// Utility implementation on the enum containing all criteria.
    ///
    /// This utility delegates to the concrete implementation of each criterion.
    fn is_fulfilled(&self, class: &EquivalenceClass, context: &CriterionContext) -> Result<bool> {
        delegate!(self, |criterion| criterion.is_fulfilled(class, context))
    }

    fn is_monotonic(&self) -> bool {
        delegate!(self, |criterion| criterion.is_monotonic())
    }

    fn sensitive_attribute(&self) -> Option<&str> {
        delegate!(self, |criterion| criterion.sensitive_attribute())
    }

    fn subset(&self) -> Option<&DataSubset> {
        delegate!(self, |criterion| criterion.subset())
    }

    fn minimal_class_size(&self) -> Option<usize> {
        delegate!(self, |criterion| criterion.minimal_class_size())
    }

    fn is_local_recoding_supported(&self) -> bool {
        delegate!(self, |criterion| criterion.is_local_recoding_supported())
    }

    fn project(&self, rows: &[usize]) -> Criterion {
        delegate!(self, |criterion| criterion.project(rows))
    }

    fn validate(&self, definition: &DataDefinition, dataset: &EncodedDataset) -> Result<()> {
        delegate!(self, |criterion| criterion.validate(definition, dataset))
    }

    fn name(&self) -> &'static str {
        delegate!(self, |criterion| criterion.name())
    }
}

macro_rules! impl_from {
    ($( $variant:ident ),*) => {
        $(
            impl From<$variant> for Criterion {
                fn from(criterion: $variant) -> Self {
                    Criterion::$variant(criterion)
                }
            }
        )*
    }
}

impl_from!(
    KAnonymity, DistinctLDiversity, EntropyLDiversity, RecursiveCLDiversity,
    EqualDistanceTCloseness, HierarchicalDistanceTCloseness, Inclusion, DPresence
);


/// Rows of a research subset, by index into the dataset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSubset {
    rows: IndexSet<usize>,
}

impl DataSubset {
    pub fn new(rows: impl IntoIterator<Item=usize>) -> Self {
        DataSubset { rows: rows.into_iter().collect() }
    }

    pub fn contains(&self, row: usize) -> bool {
        self.rows.contains(&row)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item=usize> + '_ {
        self.rows.iter().cloned()
    }

    /// Express the subset in the coordinates of a selection of rows.
    ///
    /// Position `i` of the selection is a member iff `rows[i]` is a member of the subset.
    pub fn project(&self, rows: &[usize]) -> DataSubset {
        DataSubset::new(rows.iter().enumerate()
            .filter(|(_, row)| self.contains(**row))
            .map(|(position, _)| position))
    }

    pub fn validate(&self, dataset: &EncodedDataset) -> Result<()> {
        if let Some(row) = self.rows().find(|row| *row >= dataset.num_rows()) {
            bail!("subset row {} is out of bounds for a dataset of {} rows", row, dataset.num_rows())
        }
        Ok(())
    }
}


/// Dataset-wide information about one sensitive attribute.
#[derive(Clone, Debug)]
pub struct SensitiveAttribute {
    pub column: usize,
    /// Distribution of the attribute over all relevant rows.
    pub distribution: Distribution,
    pub hierarchy: Option<Hierarchy>,
}

/// The sensitive attributes referenced by the criteria of a configuration.
///
/// The order of the attributes fixes the order of `EquivalenceClass::distributions`.
#[derive(Clone, Debug, Default)]
pub struct CriterionContext {
    attributes: IndexMap<String, SensitiveAttribute>,
}

impl CriterionContext {
    /// Collect the sensitive attributes of the criteria.
    ///
    /// # Arguments
    /// * `dataset` - input data
    /// * `criteria` - active privacy criteria
    /// * `subset` - research subset; the global distributions are computed over its rows only
    pub fn build(dataset: &EncodedDataset, criteria: &[Criterion], subset: Option<&DataSubset>) -> Result<Self> {
        let mut attributes = IndexMap::new();
        for name in criteria.iter().filter_map(PrivacyCriterion::sensitive_attribute) {
            if attributes.contains_key(name) { continue; }
            let column = dataset.column_index(name)
                .ok_or_else(|| Error::from(format!("unknown sensitive attribute '{}'", name)))?;

            let mut distribution = Distribution::new();
            dataset.data().column(column).iter().enumerate()
                .filter(|(row, _)| subset.map(|subset| subset.contains(*row)).unwrap_or(true))
                .for_each(|(_, code)| distribution.add(*code, 1));

            attributes.insert(name.to_string(), SensitiveAttribute {
                column,
                distribution,
                hierarchy: dataset.hierarchy(column).cloned(),
            });
        }
        Ok(CriterionContext { attributes })
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Measure the criteria against given global distributions instead of the distributions of the input.
    ///
    /// Distributions must be keyed by the codes of the input dictionary.
    pub fn with_distributions(mut self, distributions: &IndexMap<String, Distribution>) -> Result<Self> {
        for (name, distribution) in distributions {
            let attribute = self.attributes.get_mut(name)
                .ok_or_else(|| Error::from(format!("'{}' is not a sensitive attribute of this context", name)))?;
            attribute.distribution = distribution.clone();
        }
        Ok(self)
    }

    /// Global distribution of every sensitive attribute, by name.
    pub fn distributions(&self) -> IndexMap<String, Distribution> {
        self.attributes.iter()
            .map(|(name, attribute)| (name.clone(), attribute.distribution.clone()))
            .collect()
    }

    /// Columns of the sensitive attributes, in distribution order.
    pub fn columns(&self) -> Vec<usize> {
        self.attributes.values().map(|attribute| attribute.column).collect()
    }

    /// Look up a sensitive attribute together with the distribution of a class over it.
    pub fn lookup<'a>(&'a self, class: &'a EquivalenceClass, name: &str) -> Result<(&'a SensitiveAttribute, &'a Distribution)> {
        let (index, _, attribute) = self.attributes.get_full(name)
            .ok_or_else(|| Error::from(format!("'{}' is not a sensitive attribute of this context", name)))?;
        let distribution = class.distributions.get(index)
            .ok_or_else(|| Error::from(ErrorKind::InvariantViolation(format!("class lacks the distribution of '{}'", name))))?;
        Ok((attribute, distribution))
    }
}


/// Shared check for criteria that protect a sensitive attribute.
pub(crate) fn validate_sensitive(attribute: &str, definition: &DataDefinition, dataset: &EncodedDataset) -> Result<()> {
    if dataset.column_index(attribute).is_none() {
        bail!("unknown attribute '{}'", attribute)
    }
    if definition.attribute_type(attribute) != AttributeType::Sensitive {
        bail!("attribute '{}' must be sensitive", attribute)
    }
    Ok(())
}
