//! Re-identification risk from minimal sample uniques.

use anonymity_validator::errors::*;

use anonymity_validator::base::EncodedDataset;
use anonymity_validator::utilities::normalize_counts;

use crate::utilities::Interrupt;
use crate::view::DataView;

use ndarray::{Array2, Axis};
use serde::Serialize;

pub mod msu;
pub mod statistics;

pub use statistics::MsuScoreStatistics;

/// Number of buckets of every risk histogram.
pub const BUCKETS: usize = 10;


/// Tables the risk analysis can read codes from.
pub trait TabularData {
    fn num_rows(&self) -> usize;

    fn num_columns(&self) -> usize;

    fn attribute_name(&self, column: usize) -> Result<&str>;

    fn column_index(&self, attribute: &str) -> Option<usize>;

    /// Codes of the given columns, one row per record. Equal codes denote equal values.
    fn codes(&self, columns: &[usize]) -> Result<Array2<usize>>;
}

impl TabularData for EncodedDataset {
    fn num_rows(&self) -> usize {
        EncodedDataset::num_rows(self)
    }

    fn num_columns(&self) -> usize {
        EncodedDataset::num_columns(self)
    }

    fn attribute_name(&self, column: usize) -> Result<&str> {
        EncodedDataset::attribute_name(self, column)
    }

    fn column_index(&self, attribute: &str) -> Option<usize> {
        EncodedDataset::column_index(self, attribute)
    }

    fn codes(&self, columns: &[usize]) -> Result<Array2<usize>> {
        if let Some(column) = columns.iter().find(|column| **column >= self.num_columns()) {
            bail!("column {} does not exist", column)
        }
        Ok(self.data().select(Axis(1), columns))
    }
}

impl TabularData for DataView {
    fn num_rows(&self) -> usize {
        DataView::num_rows(self)
    }

    fn num_columns(&self) -> usize {
        DataView::num_columns(self)
    }

    fn attribute_name(&self, column: usize) -> Result<&str> {
        DataView::attribute_name(self, column)
    }

    fn column_index(&self, attribute: &str) -> Option<usize> {
        DataView::column_index(self, attribute)
    }

    fn codes(&self, columns: &[usize]) -> Result<Array2<usize>> {
        DataView::codes(self, columns)
    }
}


/// Shares of values falling into ten equally wide buckets.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Histogram {
    /// Lower edge of every bucket, followed by the upper edge of the last bucket.
    pub thresholds: Vec<f64>,
    /// Share of the values per bucket.
    pub frequencies: Vec<f64>,
}

impl Histogram {
    /// Bucket values over `[minimum, maximum]`.
    ///
    /// A value lands in `floor((value - minimum) / (maximum - minimum) * 10)`,
    /// with the upper boundary belonging to the last bucket. A degenerate range puts every value into the first bucket.
    pub fn new(values: &[f64], minimum: f64, maximum: f64, interrupt: &Interrupt) -> Result<Self> {
        let width = maximum - minimum;
        let mut counts = vec![0usize; BUCKETS];
        for value in values {
            interrupt.check()?;
            counts[Histogram::bucket(*value, minimum, width)] += 1;
        }

        let frequencies = normalize_counts(&counts);
        let thresholds = (0..=BUCKETS)
            .map(|index| minimum + width.max(0.) * index as f64 / BUCKETS as f64)
            .collect();

        Ok(Histogram { thresholds, frequencies })
    }

    fn bucket(value: f64, minimum: f64, width: f64) -> usize {
        if !(width > 0.) {
            return 0;
        }
        let bucket = ((value - minimum) / width * BUCKETS as f64).floor();
        num::clamp(bucket, 0., (BUCKETS - 1) as f64) as usize
    }
}
