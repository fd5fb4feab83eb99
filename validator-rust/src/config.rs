use crate::errors::*;

use crate::base::Distribution;
use crate::criteria::{Criterion, DataSubset, PrivacyCriterion};
use crate::metric::Metric;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};


/// Settings of the risk analysis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskParameters {
    /// Largest key considered by the MSU search. 0 considers keys of any length.
    pub max_key_length: usize,
    /// Size of the population the data was sampled from. Defaults to the number of rows.
    pub population_size: Option<usize>,
}

impl Default for RiskParameters {
    fn default() -> Self {
        RiskParameters { max_key_length: 3, population_size: None }
    }
}


/// Privacy criteria, utility metric and resource limits of an anonymization.
///
/// Every field is optional in JSON, missing fields take their default.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub criteria: Vec<Criterion>,
    pub metric: Metric,
    /// Largest share of the relevant rows that may be suppressed in an anonymous transformation.
    pub suppression_limit: f64,
    /// Number of snapshots kept by the checker.
    pub history_size: usize,
    /// Largest snapshot, relative to the number of rows.
    pub snapshot_size_dataset: f64,
    /// Largest snapshot, relative to the snapshot it was derived from.
    pub snapshot_size_snapshot: f64,
    /// Shown in place of suppressed values.
    pub suppression_string: String,
    /// Overrides the minimal group size implied by the criteria.
    pub minimal_group_size: Option<usize>,
    pub maximum_lattice_size: usize,
    pub risk: RiskParameters,
    /// Global distributions of sensitive attributes by name, used instead of the distributions of the input.
    /// Set for nested runs, whose input is a selection of a larger table.
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub sensitive_distributions: IndexMap<String, Distribution>,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            criteria: Vec::new(),
            metric: Metric::default(),
            suppression_limit: 0.,
            history_size: 200,
            snapshot_size_dataset: 0.2,
            snapshot_size_snapshot: 0.8,
            suppression_string: "*".to_string(),
            minimal_group_size: None,
            maximum_lattice_size: 100_000,
            risk: RiskParameters::default(),
            sensitive_distributions: IndexMap::new(),
        }
    }
}

impl Configuration {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).chain_err(|| "unable to parse configuration")
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_criterion(mut self, criterion: impl Into<Criterion>) -> Self {
        self.criteria.push(criterion.into());
        self
    }

    /// The research subset shared by the criteria, if any criterion defines one.
    pub fn research_subset(&self) -> Option<&DataSubset> {
        self.criteria.iter().find_map(PrivacyCriterion::subset)
    }

    /// Smallest number of rows an anonymous class can have.
    pub fn effective_minimal_group_size(&self) -> Option<usize> {
        self.minimal_group_size.or_else(|| self.criteria.iter()
            .filter_map(PrivacyCriterion::minimal_class_size)
            .max())
    }

    /// Whether anonymity is inherited by every generalization of an anonymous transformation.
    ///
    /// Suppression breaks inheritance, as a coarser transformation may merge outliers into retained classes.
    pub fn is_monotonic(&self) -> bool {
        self.suppression_limit == 0. && self.criteria.iter().all(PrivacyCriterion::is_monotonic)
    }

    /// First criterion that local recoding cannot handle.
    pub fn unsupported_for_local_recoding(&self) -> Option<&Criterion> {
        self.criteria.iter().find(|criterion| !criterion.is_local_recoding_supported())
    }

    /// Derive the configuration of a nested anonymization over a selection of rows.
    ///
    /// # Arguments
    /// * `rows` - rows of the selection, by index into the current input
    /// * `gs_factor` - replaces the weighting of the metric
    pub fn subset_instance(&self, rows: &[usize], gs_factor: f64) -> Configuration {
        Configuration {
            criteria: self.criteria.iter().map(|criterion| criterion.project(rows)).collect(),
            metric: Metric { gs_factor, ..self.metric },
            ..self.clone()
        }
    }
}
