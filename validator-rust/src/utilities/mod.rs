use crate::errors::*;

use itertools::Itertools;
use std::hash::Hash;


/// Retrieve the value shared by every element of a slice.
///
/// # Returns
/// `None` if the slice is empty or if any two elements differ.
pub fn get_common_value<T: Clone + Eq>(values: &[T]) -> Option<T> {
    if values.windows(2).all(|pair| pair[0] == pair[1]) {
        values.first().cloned()
    } else {
        None
    }
}

/// Remove duplicates while preserving the order of first occurrence.
pub fn deduplicate<T: Eq + Hash + Clone>(values: Vec<T>) -> Vec<T> {
    values.into_iter().unique().collect()
}

#[doc(hidden)]
pub fn prepend(text: &str) -> impl Fn(Error) -> Error + '_ {
    move |e| format!("{} {}", text, e).into()
}

/// Convert counts to probabilities.
///
/// An empty or all-zero set of counts yields all zeros rather than NaN.
pub fn normalize_counts(counts: &[usize]) -> Vec<f64> {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return vec![0.; counts.len()];
    }
    counts.iter().map(|count| *count as f64 / total as f64).collect()
}
