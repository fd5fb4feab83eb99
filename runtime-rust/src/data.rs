use anonymity_validator::errors::*;

use anonymity_validator::aggregation::AggregateFunction;
use anonymity_validator::base::{DataDefinition, Distribution, EncodedDataset, EquivalenceClass, Hierarchy};
use anonymity_validator::config::Configuration;
use anonymity_validator::criteria::{CriterionContext, DataSubset};
use anonymity_validator::lattice::Transformation;

use std::sync::Arc;

/// Code of a suppressed cell in an output buffer.
pub const SUPPRESSED: usize = usize::MAX;


/// Read-only access to the input of an anonymization, arranged for grouping.
#[derive(Debug)]
pub struct DataManager {
    input: Arc<EncodedDataset>,
    quasi_identifiers: Vec<usize>,
    hierarchies: Vec<Hierarchy>,
    heights: Vec<usize>,
    identifiers: Vec<usize>,
    aggregates: Vec<(usize, AggregateFunction)>,
    subset: Option<DataSubset>,
    context: CriterionContext,
    sensitive: Vec<usize>,
}

impl DataManager {
    /// Resolve the columns of the definition against the input.
    ///
    /// Quasi-identifiers without a hierarchy are given a single-level identity hierarchy.
    pub fn new(input: Arc<EncodedDataset>, definition: &DataDefinition, configuration: &Configuration) -> Result<Self> {
        let column = |name: &str| input.column_index(name)
            .ok_or_else(|| Error::from(format!("unknown attribute '{}'", name)));

        let quasi_identifiers = definition.quasi_identifiers().into_iter()
            .map(column)
            .collect::<Result<Vec<usize>>>()?;
        let identifiers = definition.identifiers().into_iter()
            .map(column)
            .collect::<Result<Vec<usize>>>()?;
        let aggregates = definition.microaggregated().into_iter()
            .map(|(name, function)| column(name).map(|column| (column, function)))
            .collect::<Result<Vec<_>>>()?;

        let hierarchies: Vec<Hierarchy> = quasi_identifiers.iter()
            .map(|column| input.hierarchy(*column).cloned()
                .unwrap_or_else(|| Hierarchy::identity(input.raw_size(*column))))
            .collect();
        let heights = hierarchies.iter().map(Hierarchy::height).collect();

        let subset = configuration.research_subset().cloned();
        let context = CriterionContext::build(&input, &configuration.criteria, subset.as_ref())?
            .with_distributions(&configuration.sensitive_distributions)?;

        let sensitive = context.columns();

        Ok(DataManager { input, quasi_identifiers, hierarchies, heights, identifiers, aggregates, subset, context, sensitive })
    }

    pub fn input(&self) -> &Arc<EncodedDataset> {
        &self.input
    }

    pub fn num_rows(&self) -> usize {
        self.input.num_rows()
    }

    /// Columns of the quasi-identifiers, in transformation order.
    pub fn quasi_identifiers(&self) -> &[usize] {
        &self.quasi_identifiers
    }

    /// Hierarchy height per quasi-identifier.
    pub fn heights(&self) -> &[usize] {
        &self.heights
    }

    pub fn identifiers(&self) -> &[usize] {
        &self.identifiers
    }

    /// Columns replaced by one aggregate per class, with their functions.
    pub fn microaggregated(&self) -> &[(usize, AggregateFunction)] {
        &self.aggregates
    }

    /// Position of a column among the microaggregated attributes.
    pub fn aggregate_position(&self, column: usize) -> Option<usize> {
        self.aggregates.iter().position(|(aggregated, _)| *aggregated == column)
    }

    /// Whether a column is suppressed along with the outlier rows.
    pub fn is_quasi_identifier(&self, column: usize) -> bool {
        self.quasi_identifiers.contains(&column) || self.aggregate_position(column).is_some()
    }

    pub fn context(&self) -> &CriterionContext {
        &self.context
    }

    pub fn is_relevant(&self, row: usize) -> bool {
        self.subset.as_ref().map(|subset| subset.contains(row)).unwrap_or(true)
    }

    /// Number of rows the privacy criteria apply to.
    pub fn relevant_rows(&self) -> usize {
        self.subset.as_ref().map(DataSubset::len).unwrap_or_else(|| self.num_rows())
    }

    /// Generalized code of one quasi-identifier of a row.
    pub fn generalize(&self, row: usize, quasi_identifier: usize, level: usize) -> usize {
        let column = self.quasi_identifiers[quasi_identifier];
        self.hierarchies[quasi_identifier].generalize(self.input.data()[[row, column]], level)
    }

    /// The generalized quasi-identifier values of a row, which identify its class.
    pub fn key(&self, row: usize, transformation: &Transformation) -> Vec<usize> {
        transformation.levels().iter().enumerate()
            .map(|(quasi_identifier, level)| self.generalize(row, quasi_identifier, *level))
            .collect()
    }

    /// A class holding a single row.
    pub fn seed_class(&self, row: usize) -> EquivalenceClass {
        let mut class = EquivalenceClass {
            representative: row,
            count: 0,
            population_count: 0,
            distributions: vec![Distribution::new(); self.context.len()],
        };
        self.accumulate(&mut class, row);
        class
    }

    /// Add a row to a class.
    pub fn accumulate(&self, class: &mut EquivalenceClass, row: usize) {
        let count = if self.is_relevant(row) { 1 } else { 0 };
        class.count += count;
        class.population_count += 1;
        let data = self.input.data();
        class.distributions.iter_mut().zip(self.sensitive.iter())
            .for_each(|(distribution, column)| distribution.add(data[[row, *column]], count));
    }
}




#[cfg(test)]
mod test_manager {
    use crate::data::DataManager;
    use anonymity_validator::aggregation::AggregateFunction;
    use crate::data::test_data::{people, people_definition};
    use anonymity_validator::base::AttributeType;
    use anonymity_validator::config::Configuration;
    use anonymity_validator::criteria::{DataSubset, DistinctLDiversity, Inclusion, KAnonymity};
    use anonymity_validator::lattice::Transformation;
    use std::sync::Arc;

    #[test]
    fn keys_follow_hierarchies() {
        let configuration = Configuration::default().with_criterion(KAnonymity { k: 2 });
        let manager = DataManager::new(Arc::new(people()), &people_definition(), &configuration).unwrap();
        assert_eq!(manager.heights(), &[2, 3]);
        assert_eq!(manager.identifiers(), &[0]);

        let transformation = Transformation(vec![1, 3]);
        assert_eq!(manager.key(2, &transformation), manager.key(3, &transformation));
        assert_ne!(manager.key(2, &transformation), manager.key(4, &transformation));
        assert_ne!(manager.key(0, &Transformation(vec![0, 0])), manager.key(1, &Transformation(vec![0, 0])));
    }

    #[test]
    fn classes_count_subset_rows() {
        let configuration = Configuration::default()
            .with_criterion(Inclusion { subset: DataSubset::new(vec![0, 3]) })
            .with_criterion(DistinctLDiversity { attribute: "disease".to_string(), l: 1 });
        let definition = people_definition().with("disease", AttributeType::Sensitive);
        let manager = DataManager::new(Arc::new(people()), &definition, &configuration).unwrap();
        assert_eq!(manager.relevant_rows(), 2);

        let mut class = manager.seed_class(0);
        manager.accumulate(&mut class, 1);
        assert_eq!(class.count, 1);
        assert_eq!(class.population_count, 2);
        assert_eq!(class.distributions[0].total(), 1);
    }

    #[test]
    fn microaggregated_columns_are_not_generalized() {
        let configuration = Configuration::default().with_criterion(KAnonymity { k: 2 });
        let definition = people_definition()
            .with("age", AttributeType::Microaggregated { function: AggregateFunction::ArithmeticMean });
        let manager = DataManager::new(Arc::new(people()), &definition, &configuration).unwrap();
        assert_eq!(manager.quasi_identifiers(), &[2]);
        assert_eq!(manager.heights(), &[3]);
        assert_eq!(manager.microaggregated(), &[(1, AggregateFunction::ArithmeticMean)]);
        assert_eq!(manager.aggregate_position(1), Some(0));
        assert!(manager.is_quasi_identifier(1));
        assert!(manager.is_quasi_identifier(2));
        assert!(!manager.is_quasi_identifier(3));
    }
}
