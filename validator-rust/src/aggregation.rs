//! Microaggregation: quasi-identifiers whose values are replaced by one summary value per equivalence class.

use crate::errors::*;

use crate::base::EncodedDataset;

use indexmap::IndexMap;
use noisy_float::types::{n64, N64};
use serde::{Deserialize, Serialize};


#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateFunction {
    ArithmeticMean,
    /// Lower median, which is always a value of the class.
    Median,
    /// Most frequent value, ties going to the value seen first.
    Mode,
    /// Smallest and largest value, as `[minimum, maximum]`.
    Interval,
}

impl AggregateFunction {
    /// Whether the function needs every value of the attribute to be a number.
    pub fn is_numeric(&self) -> bool {
        *self != AggregateFunction::Mode
    }

    /// Summarize the values of one equivalence class.
    pub fn aggregate<S: AsRef<str>>(&self, values: &[S]) -> Result<String> {
        if values.is_empty() {
            bail!("an empty class can not be aggregated")
        }
        Ok(match self {
            AggregateFunction::Mode => mode(values),
            AggregateFunction::ArithmeticMean => {
                let numbers = sorted_numbers(values)?;
                format_number(numbers.iter().map(|number| number.raw()).sum::<f64>() / numbers.len() as f64)
            }
            AggregateFunction::Median => {
                let numbers = sorted_numbers(values)?;
                format_number(numbers[(numbers.len() - 1) / 2].raw())
            }
            AggregateFunction::Interval => {
                let numbers = sorted_numbers(values)?;
                format!("[{}, {}]", format_number(numbers[0].raw()), format_number(numbers[numbers.len() - 1].raw()))
            }
        })
    }

    /// Check that the function can aggregate every value of a column.
    pub fn validate(&self, dataset: &EncodedDataset, column: usize) -> Result<()> {
        if !self.is_numeric() {
            return Ok(());
        }
        (0..dataset.raw_size(column))
            .map(|code| dataset.decode(column, code).and_then(parse))
            .collect::<Result<Vec<N64>>>()
            .chain_err(|| format!("{:?} needs numeric values in '{}'", self, dataset.attribute_name(column).unwrap_or_default()))?;
        Ok(())
    }
}

fn parse(value: &str) -> Result<N64> {
    match value.trim().parse::<f64>() {
        Ok(number) if number.is_finite() => Ok(n64(number)),
        _ => Err(format!("'{}' is not a finite number", value).into())
    }
}

fn sorted_numbers<S: AsRef<str>>(values: &[S]) -> Result<Vec<N64>> {
    let mut numbers = values.iter()
        .map(|value| parse(value.as_ref()))
        .collect::<Result<Vec<N64>>>()?;
    numbers.sort();
    Ok(numbers)
}

fn mode<S: AsRef<str>>(values: &[S]) -> String {
    let mut counts = IndexMap::<&str, usize>::new();
    values.iter().for_each(|value| *counts.entry(value.as_ref()).or_insert(0) += 1);

    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        if best.map(|(_, most)| count > most).unwrap_or(true) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value.to_string()).unwrap_or_default()
}

fn format_number(number: f64) -> String {
    format!("{}", number)
}
