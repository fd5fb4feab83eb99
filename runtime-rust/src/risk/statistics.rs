use anonymity_validator::errors::*;

use anonymity_validator::Float;
use anonymity_validator::utilities::deduplicate;

use crate::risk::msu::{key_attributes, key_size, MsuSearch};
use crate::risk::{Histogram, TabularData};
use crate::utilities::{Interrupt, ProgressMonitor};

use indexmap::IndexMap;
use ndarray::Array2;
use serde::Serialize;


/// Risk scores derived from the minimal sample uniques of a table.
#[derive(Clone, Debug, Serialize)]
pub struct MsuScoreStatistics {
    pub attributes: Vec<String>,
    /// Per attribute, the share of the total score of the keys containing it.
    pub contributions: Vec<f64>,
    pub highest_score: f64,
    pub average_score: f64,
    /// Largest key length considered by the search.
    pub max_key_length: usize,
    /// SUDA score per row.
    pub scores: Vec<f64>,
    /// Sampling-corrected score per row, in [0, 1].
    pub dis_scores: Vec<f64>,
    /// Probability that a sample unique is a population unique.
    pub dis_probability: f64,
    pub suda_histogram: Histogram,
    pub dis_histogram: Histogram,
    /// Per row, the minimal sample uniques as lists of attribute positions.
    pub msus: Vec<Vec<Vec<usize>>>,
}

impl MsuScoreStatistics {
    /// Analyze the minimal sample uniques of a table.
    ///
    /// # Arguments
    /// * `source` - dataset or view to analyze
    /// * `attributes` - attributes forming the keys, all attributes if `None`
    /// * `max_key_length` - largest key considered, 0 for no limit
    /// * `population_size` - size of the population the table was sampled from, defaults to the number of rows
    /// * `interrupt` - cancels the analysis when set
    /// * `progress` - receives the progress in percent
    pub fn new<T: TabularData + ?Sized>(
        source: &T,
        attributes: Option<&[&str]>,
        max_key_length: usize,
        population_size: Option<usize>,
        interrupt: &Interrupt,
        progress: &mut dyn FnMut(Float),
    ) -> Result<Self> {
        let mut monitor = ProgressMonitor::new(progress);

        // keys are sets of columns, so repeated attributes and their order do not matter
        let columns = match attributes {
            Some(attributes) => {
                let columns = attributes.iter()
                    .map(|name| source.column_index(name)
                        .ok_or_else(|| Error::from(format!("unknown attribute '{}'", name))))
                    .collect::<Result<Vec<usize>>>()?;
                let mut columns = deduplicate(columns);
                columns.sort();
                columns
            }
            None => (0..source.num_columns()).collect()
        };
        if columns.len() > 64 {
            bail!("at most 64 attributes can be analyzed, got {}", columns.len())
        }
        let names = columns.iter()
            .map(|column| source.attribute_name(*column).map(String::from))
            .collect::<Result<Vec<String>>>()?;

        let rows = source.num_rows();
        let population = population_size.unwrap_or(rows);
        if population < rows {
            bail!("population_size: {} is smaller than the sample of {} rows", population, rows)
        }

        let codes = source.codes(&columns)?;
        interrupt.check()?;
        monitor.update(10.);

        let search = MsuSearch::new(&codes, max_key_length, interrupt, &mut |inner| monitor.update_scaled(10., 90., inner))?;
        let statistics = MsuScoreStatistics::summarize(names, &codes, &search, population, interrupt)?;
        monitor.update(100.);
        Ok(statistics)
    }

    fn summarize(attributes: Vec<String>, codes: &Array2<usize>, search: &MsuSearch, population: usize, interrupt: &Interrupt) -> Result<Self> {
        let num_attributes = search.num_attributes;
        let max_key_length = search.max_key_length;
        let rows = search.num_rows();

        // keys of size k score the product of (A - i) for i in k..M
        let score_of = |size: usize| (size..max_key_length)
            .map(|i| (num_attributes - i) as f64)
            .product::<f64>();

        let mut contributions = vec![0.; num_attributes];
        let scores: Vec<f64> = search.msus.iter()
            .map(|msus| msus.iter().map(|key| {
                let score = score_of(key_size(*key));
                key_attributes(*key).into_iter().for_each(|attribute| contributions[attribute] += score);
                score
            }).sum::<f64>())
            .collect();

        let total: f64 = scores.iter().sum();
        if total > 0. {
            contributions.iter_mut().for_each(|contribution| *contribution /= total);
        }
        let highest_score = scores.iter().cloned().fold(0., f64::max);
        let average_score = if rows == 0 { 0. } else { total / rows as f64 };

        let dis_probability = dis_probability(codes, rows, population);
        let dis_scores: Vec<f64> = scores.iter()
            .map(|score| if highest_score > 0. { dis_probability * score / highest_score } else { 0. })
            .collect();

        Ok(MsuScoreStatistics {
            suda_histogram: Histogram::new(&scores, 0., highest_score, interrupt)?,
            dis_histogram: Histogram::new(&dis_scores, 0., 1., interrupt)?,
            msus: search.msus.iter()
                .map(|msus| msus.iter().map(|key| key_attributes(*key)).collect())
                .collect(),
            attributes,
            contributions,
            highest_score,
            average_score,
            max_key_length,
            scores,
            dis_scores,
            dis_probability,
        })
    }

    /// Number of minimal sample uniques per key size, index 0 holding keys of size 1.
    pub fn msu_count_by_size(&self) -> Vec<usize> {
        let mut counts = vec![0; self.max_key_length];
        self.msus.iter().flatten().for_each(|msu| counts[msu.len() - 1] += 1);
        counts
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Probability that a sample unique is also unique in the population.
///
/// `U f / (U f + 2 (1 - f) P)` with `U` the sample uniques on all attributes,
/// `P` the rows in classes of size two, and `f` the sampling fraction.
fn dis_probability(codes: &Array2<usize>, rows: usize, population: usize) -> f64 {
    if rows == 0 || population == 0 {
        return 0.;
    }
    let mut classes = IndexMap::<Vec<usize>, usize>::new();
    codes.genrows().into_iter()
        .for_each(|row| *classes.entry(row.to_vec()).or_insert(0) += 1);
    let uniques = classes.values().filter(|size| **size == 1).count() as f64;
    let pairs = classes.values().filter(|size| **size == 2).map(|size| *size).sum::<usize>() as f64;

    let fraction = rows as f64 / population as f64;
    let denominator = uniques * fraction + 2. * (1. - fraction) * pairs;
    if denominator > 0. { uniques * fraction / denominator } else { 0. }
}


#[cfg(test)]
mod test_statistics {
    use crate::risk::MsuScoreStatistics;
    use crate::utilities::Interrupt;
    use anonymity_validator::base::EncodedDataset;

    fn dataset() -> EncodedDataset {
        EncodedDataset::new(&["a", "b", "c"], &[
            vec!["1", "x", "p"],
            vec!["1", "y", "p"],
            vec!["2", "x", "p"],
            vec!["2", "y", "q"],
        ]).unwrap()
    }

    #[test]
    fn scores_and_contributions() {
        let statistics = MsuScoreStatistics::new(&dataset(), None, 2, None, &Interrupt::new(), &mut |_| ()).unwrap();
        assert_eq!(statistics.max_key_length, 2);
        // row 3 is the only row with "q", a key of size 1 scoring (3 - 1) = 2
        assert_eq!(statistics.msus[3], vec![vec![2], vec![0, 1]]);
        assert_eq!(statistics.msus[0], vec![vec![0, 1]]);
        assert_eq!(statistics.scores, vec![1., 2., 2., 3.]);
        assert_eq!(statistics.highest_score, 3.);
        assert_eq!(statistics.average_score, 2.);
        assert_eq!(statistics.contributions, vec![5. / 8., 5. / 8., 0.5]);
        assert_eq!(statistics.msu_count_by_size(), vec![1, 6]);
    }

    #[test]
    fn attributes_are_a_set() {
        let interrupt = Interrupt::new();
        let repeated = MsuScoreStatistics::new(&dataset(), Some(&["b", "a", "b"][..]), 2, None, &interrupt, &mut |_| ()).unwrap();
        let ordered = MsuScoreStatistics::new(&dataset(), Some(&["a", "b"][..]), 2, None, &interrupt, &mut |_| ()).unwrap();
        assert_eq!(repeated.attributes, vec!["a", "b"]);
        assert_eq!(repeated.contributions.len(), 2);
        assert_eq!(repeated.msus, ordered.msus);
        assert_eq!(repeated.scores, ordered.scores);
        // every row is unique on (a, b) only
        assert!(repeated.msus.iter().all(|msus| msus == &vec![vec![0, 1]]));
    }

    #[test]
    fn dis_without_sampling() {
        let statistics = MsuScoreStatistics::new(&dataset(), None, 0, None, &Interrupt::new(), &mut |_| ()).unwrap();
        // every row is unique on all attributes and the sample is the population
        assert_eq!(statistics.dis_probability, 1.);
        assert!(statistics.dis_scores.iter().all(|score| (0. ..=1.).contains(score)));
        assert!((statistics.dis_histogram.frequencies.iter().sum::<f64>() - 1.).abs() < 1e-12);
    }

    #[test]
    fn rejects_bad_parameters() {
        let interrupt = Interrupt::new();
        assert!(MsuScoreStatistics::new(&dataset(), Some(&["a", "z"][..]), 2, None, &interrupt, &mut |_| ()).is_err());
        assert!(MsuScoreStatistics::new(&dataset(), None, 2, Some(3), &interrupt, &mut |_| ()).is_err());
    }

    #[test]
    fn progress_starts_after_setup() {
        let mut reported = Vec::new();
        MsuScoreStatistics::new(&dataset(), Some(&["a", "b"][..]), 2, Some(100), &Interrupt::new(), &mut |value| reported.push(value)).unwrap();
        assert_eq!(reported[0], 10.);
        assert_eq!(reported.last(), Some(&100.));
        assert!(reported.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn serializes_report() {
        let statistics = MsuScoreStatistics::new(&dataset(), None, 2, None, &Interrupt::new(), &mut |_| ()).unwrap();
        let json = statistics.to_json().unwrap();
        assert!(json.contains("\"highest_score\""));
        assert!(json.contains("\"dis_histogram\""));
    }
}
