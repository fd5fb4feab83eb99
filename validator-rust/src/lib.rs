//! Description and validation of anonymization problems.
//!
//! An anonymization problem consists of an [`EncodedDataset`](base/struct.EncodedDataset.html),
//! a [`DataDefinition`](base/struct.DataDefinition.html) assigning a role to every attribute,
//! and a [`Configuration`](config/struct.Configuration.html) holding the privacy criteria,
//! the utility metric and the resource limits of the search.
//!
//! Everything in this crate can be decided without evaluating a transformation over the rows.
//! The row-level work lives in the runtime crate.

// `error_chain!` can recurse deeply
#![recursion_limit = "1024"]
#[macro_use]
extern crate error_chain;

#[doc(hidden)]
pub mod errors {
    // Create the Error, ErrorKind, ResultExt, and Result types
    error_chain! {
        foreign_links {
            Shape(::ndarray::ShapeError);
            Json(::serde_json::Error);
        }

        errors {
            /// A long-running computation observed its cancellation flag.
            Interrupted {
                description("computation interrupted")
                display("computation interrupted")
            }
            /// A forked view was requested while a borrowed view still holds the output buffer.
            BufferLocked {
                description("the buffer is currently locked by another view")
                display("the buffer is currently locked by another view")
            }
            /// A borrowed view was read after the session released its lock.
            ViewReleased {
                description("the view has been released")
                display("the view has been released and may no longer be read")
            }
            /// A view produced from different input data was passed to a session.
            ForeignView {
                description("the view is not associated with the input of this session")
                display("the view is not associated with the input of this session")
            }
            UnsupportedCriterion(name: String) {
                description("privacy criterion not supported by local recoding")
                display("local recoding does not support the privacy criterion: {}", name)
            }
            LatticeTooLarge(size: u128, maximum: usize) {
                description("solution space too large")
                display("the solution space contains {} transformations, but at most {} are allowed", size, maximum)
            }
            InvariantViolation(message: String) {
                description("internal invariant violated")
                display("internal invariant violated: {}", message)
            }
        }
    }
}

#[doc(hidden)]
pub use errors::*;

pub mod aggregation;
pub mod base;
pub mod config;
pub mod criteria;
pub mod lattice;
pub mod metric;
pub mod utilities;

use crate::base::{DataDefinition, EncodedDataset};
use crate::config::Configuration;
use crate::criteria::PrivacyCriterion;

pub type Float = f64;


/// Validate that a configuration describes a well-formed anonymization problem.
///
/// Checks that every attribute named by the definition exists, that generalization bounds fit the hierarchies,
/// that every privacy criterion refers to a properly typed attribute, and that all ratios lie in [0, 1].
///
/// # Arguments
/// * `dataset` - the encoded input data
/// * `definition` - roles of the attributes
/// * `configuration` - privacy criteria, metric and resource limits
///
/// # Returns
/// Warnings about settings that are legal, but likely unintended.
pub fn validate_configuration(
    dataset: &EncodedDataset,
    definition: &DataDefinition,
    configuration: &Configuration,
) -> Result<Vec<Error>> {
    let mut warnings = Vec::new();

    definition.validate(dataset).map_err(utilities::prepend("data definition:"))?;
    definition.generalization_bounds(dataset).map_err(utilities::prepend("data definition:"))?;

    if configuration.criteria.is_empty() {
        bail!("at least one privacy criterion must be specified")
    }

    for (name, ratio) in &[
        ("suppression_limit", configuration.suppression_limit),
        ("snapshot_size_dataset", configuration.snapshot_size_dataset),
        ("snapshot_size_snapshot", configuration.snapshot_size_snapshot),
        ("gs_factor", configuration.metric.gs_factor),
    ] {
        if !(0.0..=1.0).contains(ratio) {
            bail!("{}: must be within [0, 1], got {}", name, ratio)
        }
    }

    configuration.criteria.iter()
        .map(|criterion| criterion.validate(definition, dataset)
            .chain_err(|| format!("invalid privacy criterion: {}", criterion.name())))
        .collect::<Result<()>>()?;

    let subsets = configuration.criteria.iter()
        .filter_map(|criterion| criterion.subset())
        .collect::<Vec<_>>();
    if utilities::get_common_value(&subsets).is_none() && !subsets.is_empty() {
        bail!("all privacy criteria must refer to the same research subset")
    }

    if definition.quasi_identifiers().is_empty() {
        warnings.push("no quasi-identifying attributes are defined, the solution space has a single transformation".into());
    }
    if configuration.history_size == 0 {
        warnings.push("history_size: a size of 0 disables the snapshot cache".into());
    }
    if configuration.suppression_limit == 1.0 {
        warnings.push("suppression_limit: every record may be suppressed".into());
    }
    if let Some(population) = configuration.risk.population_size {
        if population < dataset.num_rows() {
            warnings.push(format!(
                "population_size: {} is smaller than the sample of {} records, risk analysis will fail",
                population, dataset.num_rows()).into());
        }
    }

    warnings.iter().for_each(|warning: &Error| tracing::warn!("{}", warning));
    Ok(warnings)
}


#[cfg(test)]
mod test_validate {
    use crate::base::{AttributeType, DataDefinition};
    use crate::base::test_data::{age_dataset, age_definition};
    use crate::config::Configuration;
    use crate::criteria::{DistinctLDiversity, KAnonymity};
    use crate::validate_configuration;

    #[test]
    fn valid_configuration() {
        let configuration = Configuration::default().with_criterion(KAnonymity { k: 2 });
        let warnings = validate_configuration(&age_dataset(), &age_definition(), &configuration).unwrap();
        assert!(warnings.is_empty());
    }

    #[test]
    fn requires_criterion() {
        assert!(validate_configuration(&age_dataset(), &age_definition(), &Configuration::default()).is_err());
    }

    #[test]
    fn ratios_are_bounded() {
        let mut configuration = Configuration::default().with_criterion(KAnonymity { k: 2 });
        configuration.snapshot_size_dataset = 1.5;
        assert!(validate_configuration(&age_dataset(), &age_definition(), &configuration).is_err());
    }

    #[test]
    fn sensitive_attribute_must_be_sensitive() {
        let configuration = Configuration::default()
            .with_criterion(DistinctLDiversity { attribute: "disease".to_string(), l: 2 });
        assert!(validate_configuration(&age_dataset(), &age_definition(), &configuration).is_err());

        let definition = age_definition().with("disease", AttributeType::Sensitive);
        assert!(validate_configuration(&age_dataset(), &definition, &configuration).is_ok());
    }

    #[test]
    fn warns_on_disabled_history() {
        let mut configuration = Configuration::default().with_criterion(KAnonymity { k: 2 });
        configuration.history_size = 0;
        configuration.suppression_limit = 1.0;
        let warnings = validate_configuration(&age_dataset(), &age_definition(), &configuration).unwrap();
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn warns_without_quasi_identifiers() {
        let configuration = Configuration::default().with_criterion(KAnonymity { k: 2 });
        let warnings = validate_configuration(&age_dataset(), &DataDefinition::new(), &configuration).unwrap();
        assert_eq!(warnings.len(), 1);
    }
}
