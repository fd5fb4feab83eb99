//! Evaluation of single transformations.

use anonymity_validator::errors::*;

use anonymity_validator::base::{EquivalenceClass, GroupStatistics};
use anonymity_validator::config::Configuration;
use anonymity_validator::criteria::{Criterion, PrivacyCriterion};
use anonymity_validator::lattice::{Anonymity, Transformation};
use anonymity_validator::metric::{InformationLoss, Metric};

use crate::checker::groupify::{coarsen, group_rows};
use crate::checker::history::History;
use crate::data::{DataManager, SUPPRESSED};

use ndarray::Array2;
use std::sync::Arc;

pub mod groupify;
pub mod history;


/// Verdict and utility of one transformation.
#[derive(Clone, Debug, PartialEq)]
pub struct CheckResult {
    pub anonymity: Anonymity,
    pub information_loss: InformationLoss,
    pub lower_bound: InformationLoss,
    /// Number of suppressed relevant rows.
    pub outliers: usize,
    /// Size of the smallest retained class.
    pub minimal_class_size: Option<usize>,
    pub classes: usize,
}

/// The output of a transformation, with every column of the input.
///
/// Identifying columns hold `SUPPRESSED`. Quasi-identifiers of outliers keep their generalized codes,
/// readers consult the outlier flags to suppress them.
/// Microaggregated columns keep their input codes in `data`, their output is in `microaggregated`.
#[derive(Clone, Debug)]
pub struct TransformedData {
    pub data: Array2<usize>,
    pub outliers: Vec<bool>,
    /// One column per microaggregated attribute, empty for outlier rows.
    pub microaggregated: Array2<String>,
    pub result: CheckResult,
}


pub struct NodeChecker {
    manager: Arc<DataManager>,
    criteria: Vec<Criterion>,
    metric: Metric,
    suppression_limit: f64,
    history: History,
}

impl NodeChecker {
    pub fn new(manager: Arc<DataManager>, configuration: &Configuration) -> Self {
        let bytes_per_class = EquivalenceClass {
            representative: 0,
            count: 0,
            population_count: 0,
            distributions: vec![Default::default(); manager.context().len()],
        }.estimated_bytes();
        let history = History::new(
            configuration.history_size,
            configuration.snapshot_size_dataset,
            configuration.snapshot_size_snapshot,
            manager.num_rows(),
            bytes_per_class);

        NodeChecker {
            manager,
            criteria: configuration.criteria.clone(),
            metric: configuration.metric,
            suppression_limit: configuration.suppression_limit,
            history,
        }
    }

    pub fn manager(&self) -> &Arc<DataManager> {
        &self.manager
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Drop every snapshot.
    pub fn reset(&mut self) {
        self.history.clear()
    }

    /// Evaluate the privacy criteria and the metric for a transformation.
    ///
    /// Grouping is seeded from the closest cached snapshot when there is one.
    /// The verdict itself is always computed from the classes of `transformation`.
    pub fn check(&mut self, transformation: &Transformation) -> Result<CheckResult> {
        let (classes, parent) = match self.history.find(transformation) {
            Some((source, snapshot)) => {
                tracing::debug!("checking {} from the snapshot of {}", transformation, source);
                (coarsen(&self.manager, &snapshot.classes, transformation), Some(snapshot.classes.len()))
            }
            None => {
                tracing::debug!("checking {} from the input", transformation);
                (group_rows(&self.manager, transformation).0, None)
            }
        };

        let statistics = self.evaluate(classes)?;
        let result = self.summarize(transformation, &statistics)?;
        self.history.store(transformation, statistics.classes, parent);
        Ok(result)
    }

    /// Generalize the input with a transformation.
    ///
    /// Performs a full grouping pass to assign every row to its class.
    pub fn apply_transformation(&mut self, transformation: &Transformation) -> Result<TransformedData> {
        let (classes, assignment) = group_rows(&self.manager, transformation);
        let statistics = self.evaluate(classes)?;
        let result = self.summarize(transformation, &statistics)?;

        let manager = &self.manager;
        let mut data = manager.input().data().clone();
        for row in 0..manager.num_rows() {
            for (quasi_identifier, (column, level)) in manager.quasi_identifiers().iter()
                .zip(transformation.levels().iter()).enumerate() {
                data[[row, *column]] = manager.generalize(row, quasi_identifier, *level);
            }
            for column in manager.identifiers() {
                data[[row, *column]] = SUPPRESSED;
            }
        }
        let outliers = assignment.iter().map(|class| statistics.suppressed[*class]).collect();
        let microaggregated = self.aggregate(&assignment, &statistics.suppressed)?;

        self.history.store(transformation, statistics.classes, None);
        Ok(TransformedData { data, outliers, microaggregated, result })
    }

    /// Aggregate every microaggregated attribute over the rows of each retained class.
    fn aggregate(&self, assignment: &[usize], suppressed: &[bool]) -> Result<Array2<String>> {
        let manager = &self.manager;
        let aggregates = manager.microaggregated();
        let mut output = Array2::from_elem((manager.num_rows(), aggregates.len()), String::new());
        if aggregates.is_empty() {
            return Ok(output);
        }

        let mut members = vec![Vec::new(); suppressed.len()];
        assignment.iter().enumerate().for_each(|(row, class)| members[*class].push(row));

        for (class, rows) in members.iter().enumerate() {
            if suppressed[class] {
                continue;
            }
            for (position, (column, function)) in aggregates.iter().enumerate() {
                let values = rows.iter()
                    .map(|row| manager.input().value(*row, *column))
                    .collect::<Result<Vec<&str>>>()?;
                let aggregate = function.aggregate(&values)?;
                rows.iter().for_each(|row| output[[*row, position]] = aggregate.clone());
            }
        }
        Ok(output)
    }

    /// Suppress every class that violates a criterion.
    fn evaluate(&self, classes: Vec<EquivalenceClass>) -> Result<GroupStatistics> {
        let context = self.manager.context();
        let mut suppressed = Vec::with_capacity(classes.len());
        let mut outliers = 0;
        let mut minimal_class_size: Option<usize> = None;

        for class in &classes {
            // rows outside of the research subset are not subject to the criteria
            if class.count == 0 {
                suppressed.push(false);
                continue;
            }
            let mut fulfilled = true;
            for criterion in &self.criteria {
                if !criterion.is_fulfilled(class, context)? {
                    fulfilled = false;
                    break;
                }
            }
            if fulfilled {
                minimal_class_size = Some(minimal_class_size.map_or(class.count, |size| size.min(class.count)));
            } else {
                outliers += class.count;
            }
            suppressed.push(!fulfilled);
        }

        Ok(GroupStatistics {
            classes,
            suppressed,
            outliers,
            relevant_rows: self.manager.relevant_rows(),
            minimal_class_size,
        })
    }

    fn summarize(&self, transformation: &Transformation, statistics: &GroupStatistics) -> Result<CheckResult> {
        let heights = self.manager.heights();
        let allowed = (self.suppression_limit * statistics.relevant_rows as f64).floor();
        let anonymity = Anonymity::from_flag(statistics.outliers as f64 <= allowed);

        let information_loss = self.metric.information_loss(transformation, heights, statistics)?;
        let lower_bound = self.metric.lower_bound(transformation, heights, statistics.relevant_rows)?;
        if lower_bound.raw() > information_loss.raw() + 1e-9 {
            bail!(ErrorKind::InvariantViolation(format!(
                "lower bound {} exceeds the information loss {} of {}", lower_bound, information_loss, transformation)))
        }

        Ok(CheckResult {
            anonymity,
            information_loss,
            lower_bound: lower_bound.min(information_loss),
            outliers: statistics.outliers,
            minimal_class_size: statistics.minimal_class_size,
            classes: statistics.classes.len(),
        })
    }
}


#[cfg(test)]
mod test_checker {
    use crate::checker::NodeChecker;
    use anonymity_validator::aggregation::AggregateFunction;
    use crate::data::{DataManager, SUPPRESSED};
    use crate::data::test_data::{people, people_definition};
    use anonymity_validator::base::AttributeType;
    use anonymity_validator::config::Configuration;
    use anonymity_validator::criteria::{DistinctLDiversity, KAnonymity};
    use anonymity_validator::lattice::{Anonymity, Lattice, Transformation};
    use std::sync::Arc;

    fn checker(configuration: &Configuration) -> NodeChecker {
        let definition = people_definition().with("disease", AttributeType::Sensitive);
        let manager = DataManager::new(Arc::new(people()), &definition, configuration).unwrap();
        NodeChecker::new(Arc::new(manager), configuration)
    }

    #[test]
    fn verdicts() {
        let configuration = Configuration::default().with_criterion(KAnonymity { k: 2 });
        let mut checker = checker(&configuration);

        let bottom = checker.check(&Transformation(vec![0, 0])).unwrap();
        assert_eq!(bottom.anonymity, Anonymity::NotAnonymous);
        assert_eq!(bottom.outliers, 6);

        let result = checker.check(&Transformation(vec![1, 3])).unwrap();
        assert_eq!(result.anonymity, Anonymity::Anonymous);
        assert_eq!(result.outliers, 0);
        assert_eq!(result.minimal_class_size, Some(2));
        assert!(result.lower_bound <= result.information_loss);
    }

    #[test]
    fn suppression_limit() {
        let mut configuration = Configuration::default().with_criterion(KAnonymity { k: 2 });
        configuration.suppression_limit = 0.34;
        let mut checker = checker(&configuration);

        // classes {0, 1}, {2}, {3}, {4, 5}: two outliers out of six
        let result = checker.check(&Transformation(vec![1, 2])).unwrap();
        assert_eq!(result.outliers, 2);
        assert_eq!(result.anonymity, Anonymity::Anonymous);
    }

    #[test]
    fn history_does_not_change_results() {
        let criterion = DistinctLDiversity { attribute: "disease".to_string(), l: 2 };
        let mut cached = Configuration::default().with_criterion(criterion.clone());
        cached.snapshot_size_dataset = 1.;
        cached.snapshot_size_snapshot = 1.;
        cached.suppression_limit = 0.5;
        let mut uncached = cached.clone();
        uncached.history_size = 0;

        let mut cached_checker = checker(&cached);
        let mut uncached_checker = checker(&uncached);
        let lattice = Lattice::new(vec![0, 0], vec![2, 3], 100).unwrap();
        for transformation in lattice.transformations() {
            assert_eq!(cached_checker.check(&transformation).unwrap(), uncached_checker.check(&transformation).unwrap());
        }
        assert!(cached_checker.history().len() > 0);
        assert_eq!(uncached_checker.history().len(), 0);

        cached_checker.reset();
        assert!(cached_checker.history().is_empty());
    }

    #[test]
    fn apply_transformation_generalizes_and_flags() {
        let mut configuration = Configuration::default().with_criterion(KAnonymity { k: 2 });
        configuration.suppression_limit = 1.;
        let mut checker = checker(&configuration);
        let input = people();

        let transformed = checker.apply_transformation(&Transformation(vec![1, 2])).unwrap();
        assert_eq!(transformed.outliers, vec![false, false, true, true, false, false]);
        assert!(transformed.data.column(0).iter().all(|code| *code == SUPPRESSED));
        assert_eq!(input.decode(1, transformed.data[[4, 1]]).unwrap(), "50-59");
        assert_eq!(input.decode(2, transformed.data[[0, 2]]).unwrap(), "476**");
        assert_eq!(transformed.data[[3, 3]], input.data()[[3, 3]]);
        assert_eq!(transformed.result, checker.check(&Transformation(vec![1, 2])).unwrap());
        assert_eq!(transformed.microaggregated.dim(), (6, 0));
    }

    #[test]
    fn aggregates_retained_classes() {
        let mut configuration = Configuration::default().with_criterion(KAnonymity { k: 2 });
        configuration.suppression_limit = 1.;
        let definition = people_definition()
            .with("age", AttributeType::Microaggregated { function: AggregateFunction::ArithmeticMean });
        let manager = DataManager::new(Arc::new(people()), &definition, &configuration).unwrap();
        let mut checker = NodeChecker::new(Arc::new(manager), &configuration);

        // zip prefixes 4767*, 4760*, 4790*: rows 0 and 2, then 3, 4 and 5 share a class
        let transformed = checker.apply_transformation(&Transformation(vec![1])).unwrap();
        assert_eq!(transformed.outliers, vec![false, true, false, false, false, false]);
        let age_column = transformed.microaggregated.column(0);
        let ages: Vec<&str> = age_column.iter().map(String::as_str).collect();
        assert_eq!(ages[..3], ["28", "", "28"]);
        assert!(ages[3..].iter().all(|age| *age == ages[3]));
        assert!((ages[3].parse::<f64>().unwrap() - 137. / 3.).abs() < 1e-9);
        assert_eq!(transformed.data[[0, 1]], people().data()[[0, 1]]);
    }
}
