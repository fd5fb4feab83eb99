//! The result of an anonymization, and the entry point for everything done with it afterwards.

use anonymity_validator::errors::*;

use anonymity_validator::base::DataDefinition;
use anonymity_validator::config::Configuration;
use anonymity_validator::criteria::PrivacyCriterion;
use anonymity_validator::lattice::{Lattice, Transformation};
use anonymity_validator::metric::InformationLoss;
use anonymity_validator::Float;

use crate::anonymize;
use crate::checker::{CheckResult, NodeChecker};
use crate::data::DataManager;
use crate::utilities::Interrupt;
use crate::view::{DataView, Lease, Ownership, OutputBuffer};

use indexmap::IndexMap;
use ndarray::{Array2, Axis};
use std::sync::{Arc, RwLock};
use std::time::Duration;


/// One anonymization run: the explored lattice, the checker that explored it, and the output buffer.
pub struct Session {
    checker: NodeChecker,
    lattice: Lattice,
    definition: DataDefinition,
    configuration: Configuration,
    manager: Arc<DataManager>,
    buffer: Arc<RwLock<OutputBuffer>>,
    registry: IndexMap<Transformation, DataView>,
    lock: Option<Transformation>,
    results: IndexMap<Transformation, CheckResult>,
    duration: Duration,
    warnings: Vec<Error>,
}

impl Session {
    pub fn new(checker: NodeChecker, lattice: Lattice, definition: DataDefinition, configuration: Configuration, warnings: Vec<Error>) -> Self {
        let manager = checker.manager().clone();
        let buffer = OutputBuffer {
            data: Array2::zeros((0, manager.input().num_columns())),
            outliers: Vec::new(),
            microaggregated: Array2::from_elem((0, manager.microaggregated().len()), String::new()),
            transformation: lattice.bottom().clone(),
        };
        Session {
            checker,
            lattice,
            definition,
            configuration,
            manager,
            buffer: Arc::new(RwLock::new(buffer)),
            registry: IndexMap::new(),
            lock: None,
            results: IndexMap::new(),
            duration: Duration::default(),
            warnings,
        }
    }

    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    pub fn lattice_mut(&mut self) -> &mut Lattice {
        &mut self.lattice
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn definition(&self) -> &DataDefinition {
        &self.definition
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub(crate) fn set_duration(&mut self, duration: Duration) {
        self.duration = duration
    }

    /// Warnings raised while validating the configuration.
    pub fn warnings(&self) -> &[Error] {
        &self.warnings
    }

    pub fn global_optimum(&self) -> Option<&Transformation> {
        self.lattice.optimum()
    }

    /// Bound on the information loss of a transformation, without checking it.
    pub fn lower_bound(&self, transformation: &Transformation) -> Result<InformationLoss> {
        self.configuration.metric.lower_bound(transformation, self.manager.heights(), self.manager.relevant_rows())
    }

    /// Check a transformation and record the outcome in its node.
    ///
    /// A transformation is only checked once per session, later calls return the recorded result.
    pub fn evaluate(&mut self, transformation: &Transformation) -> Result<CheckResult> {
        if let Some(result) = self.results.get(transformation) {
            return Ok(result.clone());
        }
        let node = self.lattice.get_or_create(transformation)?;
        let result = self.checker.check(transformation)?;
        node.set_checked(result.anonymity, result.information_loss, result.lower_bound)?;
        tracing::debug!("evaluated {}: {:?} with loss {}", transformation, result.anonymity, result.information_loss);
        self.results.insert(transformation.clone(), result.clone());
        Ok(result)
    }

    /// Recorded result of a checked transformation.
    pub fn result(&self, transformation: &Transformation) -> Option<&CheckResult> {
        self.results.get(transformation)
    }

    /// Materialize a transformation.
    ///
    /// # Arguments
    /// * `transformation` - the transformation to apply
    /// * `fork` - copy the output into a view of its own, instead of borrowing the canonical buffer
    ///
    /// # Return
    /// The view registered for the transformation, or a new one.
    /// Borrowing revokes the outstanding borrowed view unless it shows the same transformation,
    /// so the canonical buffer is materialized by at most one transformation.
    /// Forking while a borrowed view is outstanding fails with `BufferLocked`.
    ///
    /// Forked views stay registered, and are handed out again, until they are passed to `release`.
    pub fn get_view(&mut self, transformation: &Transformation, fork: bool) -> Result<DataView> {
        if fork && self.lock.is_some() {
            bail!(ErrorKind::BufferLocked)
        }
        if !fork && self.lock.is_some() {
            if self.lock.as_ref() == Some(transformation) {
                if let Some(view) = self.registry.get(transformation) {
                    return Ok(view.clone());
                }
            }
            self.release_lock();
        }
        if let Some(view) = self.registry.get(transformation) {
            return Ok(view.clone());
        }

        let node = self.lattice.get_or_create(transformation)?;
        let transformed = self.checker.apply_transformation(transformation)?;
        let result = transformed.result;
        node.set_checked(result.anonymity, result.information_loss, result.lower_bound)?;
        self.results.entry(transformation.clone()).or_insert(result);

        let output = OutputBuffer {
            data: transformed.data,
            outliers: transformed.outliers,
            microaggregated: transformed.microaggregated,
            transformation: transformation.clone(),
        };
        let suppression_string = self.configuration.suppression_string.clone();
        let view = if fork {
            DataView::new(Arc::new(RwLock::new(output)), Ownership::Forked, self.manager.clone(), suppression_string)
        } else {
            *self.buffer.write().map_err(|_| Error::from("output buffer is poisoned"))? = output;
            self.lattice.set_materialized(Some(transformation.clone()));
            self.lock = Some(transformation.clone());
            DataView::new(self.buffer.clone(), Ownership::Borrowed(Lease::new()), self.manager.clone(), suppression_string)
        };
        tracing::debug!("materialized {} (forked: {})", transformation, fork);

        self.registry.insert(transformation.clone(), view.clone());
        Ok(view)
    }

    /// View of the global optimum, if an anonymous transformation was found.
    pub fn get_output(&mut self, fork: bool) -> Result<Option<DataView>> {
        match self.lattice.optimum().cloned() {
            Some(optimum) => Ok(Some(self.get_view(&optimum, fork)?)),
            None => Ok(None)
        }
    }

    /// Remove a view from the registry. A borrowed view is revoked and gives up the lock.
    pub fn release(&mut self, view: &DataView) {
        let registered = self.registry.iter()
            .find(|(_, candidate)| candidate.ptr_eq(view))
            .map(|(transformation, _)| transformation.clone());
        if let Some(transformation) = registered {
            if self.lock.as_ref() == Some(&transformation) {
                self.release_lock();
            } else {
                self.registry.swap_remove(&transformation);
            }
        }
    }

    fn release_lock(&mut self) {
        if let Some(transformation) = self.lock.take() {
            if let Some(view) = self.registry.swap_remove(&transformation) {
                view.revoke();
            }
            self.lattice.set_materialized(None);
        }
    }

    fn check_optimizable(&self, view: &DataView) -> Result<()> {
        if !view.is_derived_from(self.manager.input()) {
            bail!(ErrorKind::ForeignView)
        }
        if let Some(criterion) = self.configuration.unsupported_for_local_recoding() {
            bail!(ErrorKind::UnsupportedCriterion(criterion.name().to_string()))
        }
        Ok(())
    }

    /// Whether `optimize` could improve a view.
    pub fn is_optimizable(&self, view: &DataView) -> bool {
        if self.check_optimizable(view).is_err() {
            return false;
        }
        match view.outlier_count() {
            Ok(outliers) => outliers > 0 && self.configuration.effective_minimal_group_size()
                .map(|size| outliers >= size)
                .unwrap_or(true),
            Err(_) => false
        }
    }

    /// Re-anonymize the outliers of a view, and write the result into the view.
    ///
    /// # Arguments
    /// * `view` - a view of this session
    /// * `gs_factor` - metric weighting of the nested search, close to 1 favours generalization
    /// * `progress` - receives the progress of the nested search
    ///
    /// # Return
    /// The transformation applied to the outliers, or `None` if no anonymous transformation exists for them.
    pub fn optimize(&mut self, view: &DataView, gs_factor: Float, progress: &mut dyn FnMut(Float)) -> Result<Option<Transformation>> {
        self.check_optimizable(view)?;
        if !(0.0..=1.0).contains(&gs_factor) {
            bail!("gs_factor: must be within [0, 1], got {}", gs_factor)
        }

        let rows = view.outlier_rows()?;
        if rows.is_empty() {
            return Ok(None);
        }
        tracing::debug!("optimizing {} outliers with gs factor {}", rows.len(), gs_factor);

        let input = Arc::new(self.manager.input().select_rows(&rows)?);
        // closeness of the outliers is measured against the distributions of the whole input
        let mut configuration = self.configuration.subset_instance(&rows, gs_factor);
        configuration.sensitive_distributions = self.manager.context().distributions();
        let mut nested = anonymize(input, &self.definition, &configuration, progress, &Interrupt::new())?;

        let optimum = match nested.global_optimum().cloned() {
            Some(optimum) => optimum,
            None => {
                tracing::debug!("no anonymous transformation for the outliers");
                return Ok(None);
            }
        };
        let recoded = nested.get_view(&optimum, true)?.snapshot()?;

        let mut buffer = view.write()?;
        if recoded.data.len_of(Axis(0)) != rows.len() || recoded.data.len_of(Axis(1)) != buffer.data.len_of(Axis(1)) {
            bail!(ErrorKind::InvariantViolation(format!(
                "recoded {} rows with {} columns, expected {} rows with {} columns",
                recoded.data.len_of(Axis(0)), recoded.data.len_of(Axis(1)), rows.len(), buffer.data.len_of(Axis(1)))))
        }
        if recoded.microaggregated.dim() != (rows.len(), buffer.microaggregated.len_of(Axis(1))) {
            bail!(ErrorKind::InvariantViolation(format!(
                "recoded {:?} aggregates, expected {} rows with {} columns",
                recoded.microaggregated.dim(), rows.len(), buffer.microaggregated.len_of(Axis(1)))))
        }
        for (position, row) in rows.iter().enumerate() {
            buffer.data.row_mut(*row).assign(&recoded.data.row(position));
            buffer.microaggregated.row_mut(*row).assign(&recoded.microaggregated.row(position));
            buffer.outliers[*row] = recoded.outliers[position];
        }
        Ok(Some(optimum))
    }
}


#[cfg(test)]
mod test_session {
    use crate::anonymize;
    use crate::data::test_data::{people, people_definition};
    use crate::session::Session;
    use crate::utilities::Interrupt;
    use anonymity_validator::config::Configuration;
    use anonymity_validator::criteria::{DataSubset, DPresence, KAnonymity};
    use anonymity_validator::errors::ErrorKind;
    use anonymity_validator::lattice::Transformation;
    use std::sync::Arc;

    fn session(configuration: &Configuration) -> Session {
        anonymize(Arc::new(people()), &people_definition(), configuration, &mut |_| (), &Interrupt::new()).unwrap()
    }

    fn k_anonymity() -> Configuration {
        Configuration::default().with_criterion(KAnonymity { k: 2 })
    }

    #[test]
    fn finds_optimum() {
        let session = session(&k_anonymity());
        let optimum = session.global_optimum().unwrap();
        let node = session.lattice().node(optimum).unwrap();
        assert!(node.is_anonymous());
        assert!(node.is_final());
    }

    #[test]
    fn borrowed_views_are_reused_and_revoked() {
        let mut session = session(&k_anonymity());
        let first = Transformation(vec![1, 3]);
        let view = session.get_view(&first, false).unwrap();
        let again = session.get_view(&first, false).unwrap();
        assert!(view.ptr_eq(&again));
        assert_eq!(session.lattice().materialized(), Some(&first));

        let other = session.get_view(&Transformation(vec![2, 3]), false).unwrap();
        assert!(!other.ptr_eq(&view));
        match view.value(0, 1).unwrap_err().kind() {
            ErrorKind::ViewReleased => (),
            error => panic!("unexpected error: {}", error)
        }
        assert_eq!(other.value(0, 1).unwrap(), "*");
    }

    #[test]
    fn fork_requires_unlocked_buffer() {
        let mut session = session(&k_anonymity());
        let borrowed = session.get_view(&Transformation(vec![1, 3]), false).unwrap();
        match session.get_view(&Transformation(vec![2, 3]), true).unwrap_err().kind() {
            ErrorKind::BufferLocked => (),
            error => panic!("unexpected error: {}", error)
        }

        session.release(&borrowed);
        assert!(borrowed.is_released());
        let forked = session.get_view(&Transformation(vec![1, 3]), true).unwrap();
        assert!(forked.is_forked());

        // reusing the canonical buffer leaves the fork untouched
        let before = forked.snapshot().unwrap();
        session.get_view(&Transformation(vec![0, 0]), false).unwrap();
        assert_eq!(forked.snapshot().unwrap(), before);
    }

    #[test]
    fn rejects_foreign_views() {
        let mut first = session(&k_anonymity());
        let mut second = session(&k_anonymity());
        let view = second.get_view(&Transformation(vec![1, 3]), true).unwrap();
        assert!(!first.is_optimizable(&view));
        match first.optimize(&view, 0.5, &mut |_| ()).unwrap_err().kind() {
            ErrorKind::ForeignView => (),
            error => panic!("unexpected error: {}", error)
        }
    }

    #[test]
    fn rejects_unsupported_criteria() {
        let configuration = k_anonymity()
            .with_criterion(DPresence { delta_min: 0., delta_max: 1., subset: DataSubset::new(0..6) });
        let mut session = session(&configuration);
        let view = session.get_view(&Transformation(vec![0, 0]), true).unwrap();
        assert!(!session.is_optimizable(&view));
        match session.optimize(&view, 0.5, &mut |_| ()).unwrap_err().kind() {
            ErrorKind::UnsupportedCriterion(name) => assert_eq!(name, "d-presence"),
            error => panic!("unexpected error: {}", error)
        }
    }

    #[test]
    fn evaluation_is_recorded_once() {
        let mut session = session(&k_anonymity());
        let transformation = Transformation(vec![1, 2]);
        let first = session.evaluate(&transformation).unwrap();
        assert_eq!(session.evaluate(&transformation).unwrap(), first);
        assert_eq!(session.result(&transformation), Some(&first));
    }
}
