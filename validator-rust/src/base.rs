use crate::errors::*;

use crate::aggregation::AggregateFunction;
use crate::utilities::{deduplicate, get_common_value};

use indexmap::{IndexMap, IndexSet};
use ndarray::{Array, Array2, Axis};
use serde::{Deserialize, Serialize};


/// Generalization hierarchy of a single column, encoded against the column dictionary.
///
/// Rows are indexed by raw codes, columns by generalization level.
/// Level zero is the identity, and every level is a function of the level below it.
#[derive(Clone, Debug, PartialEq)]
pub struct Hierarchy {
    map: Array2<usize>,
}

impl Hierarchy {
    /// Build a hierarchy from a raw code × level lookup table.
    ///
    /// # Arguments
    /// * `map` - `map[[code, level]]` is the generalized code of raw `code` at `level`
    ///
    /// # Return
    /// The hierarchy, or an error if some level is not a function of the level below.
    pub fn new(map: Array2<usize>) -> Result<Self> {
        if map.len_of(Axis(1)) == 0 {
            bail!("a hierarchy must contain at least one level")
        }
        for level in 1..map.len_of(Axis(1)) {
            let mut parents = IndexMap::<usize, usize>::new();
            for code in 0..map.len_of(Axis(0)) {
                let (child, parent) = (map[[code, level - 1]], map[[code, level]]);
                if *parents.entry(child).or_insert(parent) != parent {
                    bail!("generalization at level {} is not a function of level {}", level, level - 1)
                }
            }
        }
        Ok(Hierarchy { map })
    }

    /// Single-level hierarchy that maps every code onto itself.
    pub fn identity(size: usize) -> Self {
        Hierarchy { map: Array::from_shape_fn((size, 1), |(code, _)| code) }
    }

    pub fn num_levels(&self) -> usize {
        self.map.len_of(Axis(1))
    }

    /// Index of the most general level.
    pub fn height(&self) -> usize {
        self.num_levels() - 1
    }

    pub fn num_values(&self) -> usize {
        self.map.len_of(Axis(0))
    }

    pub fn generalize(&self, code: usize, level: usize) -> usize {
        self.map[[code, level]]
    }
}


/// The input table converted to integer codes.
///
/// Every column has its own dictionary. Codes `0..raw_size` are the values occurring in the data,
/// generalized values introduced by hierarchies are appended after them.
#[derive(Clone, Debug)]
pub struct EncodedDataset {
    header: Vec<String>,
    data: Array2<usize>,
    dictionaries: Vec<IndexSet<String>>,
    raw_sizes: Vec<usize>,
    hierarchies: IndexMap<usize, Hierarchy>,
}

impl EncodedDataset {
    /// Encode a table of strings.
    ///
    /// # Arguments
    /// * `header` - attribute names, which must be unique
    /// * `rows` - one vector of values per record, each as long as the header
    pub fn new<S: AsRef<str>>(header: &[S], rows: &[Vec<S>]) -> Result<Self> {
        let header: Vec<String> = header.iter().map(|name| name.as_ref().to_string()).collect();
        if deduplicate(header.clone()).len() != header.len() {
            bail!("header: attribute names must be unique")
        }

        let mut dictionaries: Vec<IndexSet<String>> = vec![IndexSet::new(); header.len()];
        let mut codes = Vec::with_capacity(rows.len() * header.len());
        for (index, row) in rows.iter().enumerate() {
            if row.len() != header.len() {
                bail!("row {} has {} values, but the header has {} attributes", index, row.len(), header.len())
            }
            row.iter().zip(dictionaries.iter_mut())
                .for_each(|(value, dictionary)| codes.push(dictionary.insert_full(value.as_ref().to_string()).0));
        }

        Ok(EncodedDataset {
            data: Array2::from_shape_vec((rows.len(), header.len()), codes)?,
            raw_sizes: dictionaries.iter().map(IndexSet::len).collect(),
            dictionaries,
            header,
            hierarchies: IndexMap::new(),
        })
    }

    /// Attach a generalization hierarchy to an attribute.
    ///
    /// # Arguments
    /// * `attribute` - name of the attribute
    /// * `levels` - one row per value `[raw, level 1, ..., level n]`; rows for values absent from the data are ignored
    ///
    /// # Return
    /// The dataset, or an error if the hierarchy is ragged, inconsistent, or does not cover every value of the column.
    pub fn with_hierarchy<S: AsRef<str>>(mut self, attribute: &str, levels: &[Vec<S>]) -> Result<Self> {
        let column = self.column_index(attribute)
            .ok_or_else(|| Error::from(format!("unknown attribute '{}'", attribute)))?;
        let num_levels = get_common_value(&levels.iter().map(Vec::len).collect::<Vec<usize>>())
            .filter(|num_levels| *num_levels > 0)
            .ok_or_else(|| Error::from(format!("hierarchy for '{}' must have the same, non-zero number of levels in every row", attribute)))?;

        let raw_size = self.raw_sizes[column];
        let dictionary = &mut self.dictionaries[column];
        let mut map = Array2::<usize>::zeros((raw_size, num_levels));
        let mut covered = vec![false; raw_size];

        for row in levels {
            let raw = match dictionary.get_full(row[0].as_ref()) {
                Some((code, _)) if code < raw_size => code,
                _ => continue
            };
            covered[raw] = true;
            row.iter().enumerate().for_each(|(level, value)|
                map[[raw, level]] = dictionary.insert_full(value.as_ref().to_string()).0);
        }

        if let Some(code) = covered.iter().position(|covered| !covered) {
            bail!("hierarchy for '{}' does not cover the value '{}'",
                  attribute, dictionary.get_index(code).map(String::as_str).unwrap_or_default())
        }

        let hierarchy = Hierarchy::new(map)
            .chain_err(|| format!("hierarchy for '{}' is not consistent", attribute))?;
        self.hierarchies.insert(column, hierarchy);
        Ok(self)
    }

    /// Restrict the dataset to the given rows, in the given order.
    ///
    /// Dictionaries and hierarchies are shared unchanged, so codes remain comparable with the original.
    pub fn select_rows(&self, rows: &[usize]) -> Result<EncodedDataset> {
        if let Some(row) = rows.iter().find(|row| **row >= self.num_rows()) {
            bail!("row {} is out of bounds for a dataset of {} rows", row, self.num_rows())
        }
        Ok(EncodedDataset {
            header: self.header.clone(),
            data: self.data.select(Axis(0), rows),
            dictionaries: self.dictionaries.clone(),
            raw_sizes: self.raw_sizes.clone(),
            hierarchies: self.hierarchies.clone(),
        })
    }

    pub fn num_rows(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn num_columns(&self) -> usize {
        self.header.len()
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn attribute_name(&self, column: usize) -> Result<&str> {
        self.header.get(column).map(String::as_str)
            .ok_or_else(|| format!("column {} does not exist", column).into())
    }

    pub fn column_index(&self, attribute: &str) -> Option<usize> {
        self.header.iter().position(|name| name == attribute)
    }

    pub fn data(&self) -> &Array2<usize> {
        &self.data
    }

    pub fn hierarchy(&self, column: usize) -> Option<&Hierarchy> {
        self.hierarchies.get(&column)
    }

    /// Number of distinct values of a column occurring in the data.
    pub fn raw_size(&self, column: usize) -> usize {
        self.raw_sizes[column]
    }

    /// Translate a code back into the string it encodes.
    pub fn decode(&self, column: usize, code: usize) -> Result<&str> {
        self.dictionaries.get(column)
            .and_then(|dictionary| dictionary.get_index(code))
            .map(String::as_str)
            .ok_or_else(|| format!("code {} is not defined for column {}", code, column).into())
    }

    pub fn value(&self, row: usize, column: usize) -> Result<&str> {
        if row >= self.num_rows() || column >= self.num_columns() {
            bail!("cell ({}, {}) is out of bounds", row, column)
        }
        self.decode(column, self.data[[row, column]])
    }
}


/// Role of an attribute in the anonymization problem.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AttributeType {
    /// Removed from the output entirely.
    Identifying,
    /// Generalized within `[minimum, maximum]`, defaulting to the full hierarchy.
    QuasiIdentifying { minimum: Option<usize>, maximum: Option<usize> },
    /// Quasi-identifier that is not generalized. Every equivalence class shows one aggregate of its values.
    Microaggregated { function: AggregateFunction },
    /// Retained, and protected by diversity and closeness criteria.
    Sensitive,
    Insensitive,
}

impl AttributeType {
    pub fn quasi_identifying() -> Self {
        AttributeType::QuasiIdentifying { minimum: None, maximum: None }
    }
}

impl Default for AttributeType {
    fn default() -> Self {
        AttributeType::Insensitive
    }
}


/// Assignment of roles to attributes. Attributes that are not mentioned are insensitive.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DataDefinition {
    attributes: IndexMap<String, AttributeType>,
}

impl DataDefinition {
    pub fn new() -> Self {
        DataDefinition::default()
    }

    pub fn with(mut self, attribute: &str, attribute_type: AttributeType) -> Self {
        self.set_attribute_type(attribute, attribute_type);
        self
    }

    pub fn set_attribute_type(&mut self, attribute: &str, attribute_type: AttributeType) {
        self.attributes.insert(attribute.to_string(), attribute_type);
    }

    pub fn attribute_type(&self, attribute: &str) -> AttributeType {
        self.attributes.get(attribute).cloned().unwrap_or_default()
    }

    /// Quasi-identifiers in definition order. This order fixes the coordinates of every transformation.
    pub fn quasi_identifiers(&self) -> Vec<&str> {
        self.attributes_of(|attribute_type| match attribute_type {
            AttributeType::QuasiIdentifying { .. } => true,
            _ => false
        })
    }

    /// Microaggregated quasi-identifiers in definition order, with their aggregate function.
    pub fn microaggregated(&self) -> Vec<(&str, AggregateFunction)> {
        self.attributes.iter()
            .filter_map(|(name, attribute_type)| match attribute_type {
                AttributeType::Microaggregated { function } => Some((name.as_str(), *function)),
                _ => None
            })
            .collect()
    }

    pub fn identifiers(&self) -> Vec<&str> {
        self.attributes_of(|attribute_type| attribute_type == &AttributeType::Identifying)
    }

    pub fn sensitive_attributes(&self) -> Vec<&str> {
        self.attributes_of(|attribute_type| attribute_type == &AttributeType::Sensitive)
    }

    fn attributes_of(&self, predicate: impl Fn(&AttributeType) -> bool) -> Vec<&str> {
        self.attributes.iter()
            .filter(|(_, attribute_type)| predicate(attribute_type))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Check that every attribute named by the definition exists in the dataset,
    /// and that microaggregated attributes can be aggregated.
    pub fn validate(&self, dataset: &EncodedDataset) -> Result<()> {
        if let Some(name) = self.attributes.keys().find(|name| dataset.column_index(name).is_none()) {
            bail!("unknown attribute '{}'", name)
        }
        self.microaggregated().into_iter()
            .map(|(name, function)| match dataset.column_index(name) {
                Some(column) => function.validate(dataset, column),
                None => Err(format!("unknown attribute '{}'", name).into())
            })
            .collect()
    }

    /// Resolve the generalization range of every quasi-identifier.
    ///
    /// Quasi-identifiers without a hierarchy have a single level.
    ///
    /// # Return
    /// * `0` - minimum level per quasi-identifier
    /// * `1` - maximum level per quasi-identifier
    pub fn generalization_bounds(&self, dataset: &EncodedDataset) -> Result<(Vec<usize>, Vec<usize>)> {
        Ok(self.attributes.iter()
            .filter_map(|(name, attribute_type)| match attribute_type {
                AttributeType::QuasiIdentifying { minimum, maximum } => Some((name, minimum, maximum)),
                _ => None
            })
            .map(|(name, minimum, maximum)| {
                let column = dataset.column_index(name)
                    .ok_or_else(|| Error::from(format!("unknown attribute '{}'", name)))?;
                let height = dataset.hierarchy(column).map(Hierarchy::height).unwrap_or(0);
                let (minimum, maximum) = (minimum.unwrap_or(0), maximum.unwrap_or(height));
                if minimum > maximum || maximum > height {
                    bail!("{}: generalization bounds [{}, {}] must satisfy minimum <= maximum <= {}",
                          name, minimum, maximum, height)
                }
                Ok((minimum, maximum))
            })
            .collect::<Result<Vec<(usize, usize)>>>()?
            .into_iter().unzip())
    }
}


/// Frequencies of the codes of one sensitive attribute.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    counts: IndexMap<usize, usize>,
    total: usize,
}

impl Distribution {
    pub fn new() -> Self {
        Distribution::default()
    }

    pub fn add(&mut self, code: usize, count: usize) {
        if count == 0 { return; }
        *self.counts.entry(code).or_insert(0) += count;
        self.total += count;
    }

    pub fn merge(&mut self, other: &Distribution) {
        other.counts.iter().for_each(|(code, count)| self.add(*code, *count));
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    pub fn count(&self, code: usize) -> usize {
        self.counts.get(&code).cloned().unwrap_or(0)
    }

    pub fn probability(&self, code: usize) -> f64 {
        if self.total == 0 { 0. } else { self.count(code) as f64 / self.total as f64 }
    }

    pub fn iter(&self) -> impl Iterator<Item=(usize, usize)> + '_ {
        self.counts.iter().map(|(code, count)| (*code, *count))
    }

    /// Shannon entropy with the natural logarithm.
    pub fn entropy(&self) -> f64 {
        -self.counts.keys()
            .map(|code| self.probability(*code))
            .map(|p| p * p.ln())
            .sum::<f64>()
    }

    /// Counts ordered from most to least frequent.
    pub fn sorted_counts(&self) -> Vec<usize> {
        let mut counts: Vec<usize> = self.counts.values().cloned().collect();
        counts.sort_unstable_by(|l, r| r.cmp(l));
        counts
    }
}


/// Summary of the rows sharing one combination of generalized quasi-identifier values.
#[derive(Clone, Debug, PartialEq)]
pub struct EquivalenceClass {
    /// Index of one row of the class, used to regenerate the class key for coarser transformations.
    pub representative: usize,
    /// Number of rows in the research subset, or of all rows when there is no subset.
    pub count: usize,
    /// Number of all rows, including those outside of the research subset.
    pub population_count: usize,
    /// One distribution per sensitive attribute, in the order of the criterion context.
    pub distributions: Vec<Distribution>,
}

impl EquivalenceClass {
    pub fn merge(&mut self, other: &EquivalenceClass) {
        self.count += other.count;
        self.population_count += other.population_count;
        self.distributions.iter_mut().zip(other.distributions.iter())
            .for_each(|(left, right)| left.merge(right));
    }

    /// Rough number of bytes held by the class.
    pub fn estimated_bytes(&self) -> usize {
        std::mem::size_of::<EquivalenceClass>() + self.distributions.iter()
            .map(|distribution| std::mem::size_of::<Distribution>() + distribution.distinct() * 3 * std::mem::size_of::<usize>())
            .sum::<usize>()
    }
}


/// Outcome of evaluating the privacy criteria over the classes of one transformation.
#[derive(Clone, Debug, Default)]
pub struct GroupStatistics {
    pub classes: Vec<EquivalenceClass>,
    /// Parallel to `classes`: whether the class violates a criterion and is suppressed.
    pub suppressed: Vec<bool>,
    /// Number of suppressed rows.
    pub outliers: usize,
    /// Number of rows subject to the criteria.
    pub relevant_rows: usize,
    /// Size of the smallest retained class.
    pub minimal_class_size: Option<usize>,
}

impl GroupStatistics {
    pub fn retained(&self) -> impl Iterator<Item=&EquivalenceClass> {
        self.classes.iter().zip(self.suppressed.iter())
            .filter(|(_, suppressed)| !**suppressed)
            .map(|(class, _)| class)
    }

    pub fn retained_rows(&self) -> usize {
        self.relevant_rows - self.outliers
    }
}


#[cfg(test)]
pub(crate) mod test_data {
    use crate::base::{AttributeType, DataDefinition, EncodedDataset};

    pub fn age_dataset() -> EncodedDataset {
        EncodedDataset::new(
            &["name", "age", "zip", "disease"],
            &[
                vec!["alice", "21", "47677", "flu"],
                vec!["bob", "21", "47602", "cancer"],
                vec!["carol", "35", "47678", "flu"],
                vec!["dave", "36", "47905", "gastritis"],
                vec!["eve", "50", "47909", "cancer"],
                vec!["frank", "51", "47906", "flu"],
            ]).unwrap()
            .with_hierarchy("age", &[
                vec!["21", "20-29", "*"],
                vec!["35", "30-39", "*"],
                vec!["36", "30-39", "*"],
                vec!["50", "50-59", "*"],
                vec!["51", "50-59", "*"],
            ]).unwrap()
            .with_hierarchy("zip", &[
                vec!["47677", "4767*", "476**", "*"],
                vec!["47602", "4760*", "476**", "*"],
                vec!["47678", "4767*", "476**", "*"],
                vec!["47905", "4790*", "479**", "*"],
                vec!["47909", "4790*", "479**", "*"],
                vec!["47906", "4790*", "479**", "*"],
            ]).unwrap()
    }

    pub fn age_definition() -> DataDefinition {
        DataDefinition::new()
            .with("name", AttributeType::Identifying)
            .with("age", AttributeType::quasi_identifying())
            .with("zip", AttributeType::quasi_identifying())
    }
}
