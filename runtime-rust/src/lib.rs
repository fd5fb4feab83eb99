//! Search, check and risk analysis over encoded datasets.
//!
//! [`anonymize`](fn.anonymize.html) searches the lattice of a validated problem and returns a
//! [`Session`](session/struct.Session.html), which hands out views of transformed data and
//! re-anonymizes outliers through local recoding.
//! The [`risk`](risk/index.html) module scores the re-identification risk of a dataset or a view.

#[macro_use]
extern crate error_chain;

use anonymity_validator::errors::*;

pub mod algorithms;
pub mod checker;
pub mod data;
pub mod risk;
pub mod session;
pub mod utilities;
pub mod view;

use anonymity_validator::base::{DataDefinition, EncodedDataset};
use anonymity_validator::config::Configuration;
use anonymity_validator::lattice::Lattice;
use anonymity_validator::{validate_configuration, Float};

use crate::checker::NodeChecker;
use crate::data::DataManager;
use crate::session::Session;
use crate::utilities::{Interrupt, ProgressMonitor};

use std::sync::Arc;
use std::time::Instant;


/// Find the transformation of minimal information loss that satisfies the privacy criteria.
///
/// # Arguments
/// * `input` - the encoded dataset; views of the session are tied to this allocation
/// * `definition` - roles of the attributes
/// * `configuration` - privacy criteria, metric and resource limits
/// * `progress` - receives the progress of the search in percent
/// * `interrupt` - cancels the search when set
///
/// # Return
/// The session holding the explored lattice and the optimum, if one exists.
pub fn anonymize(
    input: Arc<EncodedDataset>,
    definition: &DataDefinition,
    configuration: &Configuration,
    progress: &mut dyn FnMut(Float),
    interrupt: &Interrupt,
) -> Result<Session> {
    let start = Instant::now();
    let warnings = validate_configuration(&input, definition, configuration)?;

    let (minimum, maximum) = definition.generalization_bounds(&input)?;
    let lattice = Lattice::new(minimum, maximum, configuration.maximum_lattice_size)?;
    tracing::debug!("searching {} transformations over {} rows", lattice.size(), input.num_rows());

    let manager = Arc::new(DataManager::new(input, definition, configuration)?);
    let checker = NodeChecker::new(manager, configuration);
    let mut session = Session::new(checker, lattice, definition.clone(), configuration.clone(), warnings);

    let mut monitor = ProgressMonitor::new(progress);
    algorithms::exhaustive_search(&mut session, &mut monitor, interrupt)?;

    session.set_duration(start.elapsed());
    tracing::debug!("search finished in {:?}", session.duration());
    Ok(session)
}
