use anonymity_validator::errors::*;

use crate::utilities::Interrupt;

use indexmap::IndexMap;
use itertools::Itertools;
use ndarray::{Array2, Axis};


/// A set of attributes, as a bit mask over column positions.
pub type Key = u64;

pub fn key_size(key: Key) -> usize {
    key.count_ones() as usize
}

pub fn key_attributes(key: Key) -> Vec<usize> {
    (0..64).filter(|bit| key & (1 << bit) != 0).collect()
}

/// Number of keys with at most `max_key_length` attributes out of `attributes`.
pub fn count_keys(attributes: usize, max_key_length: usize) -> f64 {
    (1..=max_key_length)
        .map(|size| statrs::function::factorial::binomial(attributes as u64, size as u64))
        .sum()
}


/// Minimal sample uniques of every row.
///
/// A key is a sample unique of a row if no other row shares the values of the row on the key,
/// and minimal if no proper subset of the key is a sample unique of the row.
#[derive(Clone, Debug, PartialEq)]
pub struct MsuSearch {
    pub num_attributes: usize,
    pub max_key_length: usize,
    /// Per row, the minimal sample uniques in order of increasing size.
    pub msus: Vec<Vec<Key>>,
}

impl MsuSearch {
    /// Enumerate keys by size and record the minimal sample uniques.
    ///
    /// # Arguments
    /// * `codes` - one row per record, one column per attribute
    /// * `max_key_length` - largest key considered, 0 or anything above the number of attributes considers all keys
    /// * `interrupt` - polled for every key and every row
    /// * `progress` - receives the share of keys processed, in [0, 1]
    pub fn new(codes: &Array2<usize>, max_key_length: usize, interrupt: &Interrupt, progress: &mut dyn FnMut(f64)) -> Result<Self> {
        let num_attributes = codes.len_of(Axis(1));
        if num_attributes > 64 {
            bail!("at most 64 attributes can be analyzed, got {}", num_attributes)
        }
        let max_key_length = if max_key_length == 0 { num_attributes } else { max_key_length.min(num_attributes) };
        let total = count_keys(num_attributes, max_key_length);
        let rows = codes.len_of(Axis(0));

        let mut msus: Vec<Vec<Key>> = vec![Vec::new(); rows];
        let mut processed = 0.;

        for size in 1..=max_key_length {
            for attributes in (0..num_attributes).combinations(size) {
                interrupt.check()?;
                let key: Key = attributes.iter().fold(0, |key, attribute| key | (1 << *attribute));

                let mut counts = IndexMap::<Vec<usize>, usize>::new();
                let mut values = Vec::with_capacity(rows);
                for row in codes.genrows() {
                    interrupt.check()?;
                    let value: Vec<usize> = attributes.iter().map(|attribute| row[*attribute]).collect();
                    *counts.entry(value.clone()).or_insert(0) += 1;
                    values.push(value);
                }

                for (row, value) in values.iter().enumerate() {
                    interrupt.check()?;
                    let unique = counts.get(value) == Some(&1);
                    if unique && !msus[row].iter().any(|msu| msu & key == *msu) {
                        msus[row].push(key);
                    }
                }

                processed += 1.;
                progress(if total > 0. { processed / total } else { 1. });
            }
        }

        Ok(MsuSearch { num_attributes, max_key_length, msus })
    }

    pub fn num_rows(&self) -> usize {
        self.msus.len()
    }

    /// Number of minimal sample uniques per key size, index 0 holding keys of size 1.
    pub fn count_by_size(&self) -> Vec<usize> {
        let mut counts = vec![0; self.max_key_length];
        self.msus.iter().flatten().for_each(|key| counts[key_size(*key) - 1] += 1);
        counts
    }
}


#[cfg(test)]
mod test_msu {
    use crate::risk::msu::{count_keys, key_attributes, MsuSearch};
    use crate::utilities::Interrupt;
    use anonymity_validator::errors::ErrorKind;
    use ndarray::arr2;

    #[test]
    fn finds_minimal_keys() {
        let codes = arr2(&[
            [0, 0, 0],
            [0, 1, 0],
            [1, 1, 0],
            [0, 0, 1],
        ]);
        let search = MsuSearch::new(&codes, 0, &Interrupt::new(), &mut |_| ()).unwrap();
        assert_eq!(search.max_key_length, 3);
        // row 2 is the only row with a 1 in the first attribute
        assert_eq!(search.msus[2], vec![0b001]);
        // row 3 is the only row with a 1 in the last attribute
        assert_eq!(search.msus[3], vec![0b100]);
        // row 0 is unique on the first two attributes combined with the last one
        assert_eq!(search.msus[0].iter().map(|key| key_attributes(*key)).collect::<Vec<_>>(), vec![vec![1, 2]]);
        assert_eq!(search.msus[1], vec![0b011]);
        assert_eq!(search.count_by_size(), vec![2, 2, 0]);
    }

    #[test]
    fn respects_max_key_length() {
        let codes = arr2(&[[0, 0], [0, 1], [1, 0], [1, 1]]);
        let search = MsuSearch::new(&codes, 1, &Interrupt::new(), &mut |_| ()).unwrap();
        assert!(search.msus.iter().all(Vec::is_empty));
        let search = MsuSearch::new(&codes, 2, &Interrupt::new(), &mut |_| ()).unwrap();
        assert!(search.msus.iter().all(|msus| msus == &vec![0b11]));
        assert_eq!(search.count_by_size(), vec![0, 4]);
    }

    #[test]
    fn progress_reaches_completion() {
        let codes = arr2(&[[0, 0, 0], [1, 1, 1]]);
        let mut reported = Vec::new();
        MsuSearch::new(&codes, 2, &Interrupt::new(), &mut |value| reported.push(value)).unwrap();
        assert_eq!(count_keys(3, 2), 6.);
        assert_eq!(reported.len(), 6);
        assert!((reported[5] - 1.).abs() < 1e-12);
    }

    #[test]
    fn interrupted() {
        let interrupt = Interrupt::new();
        interrupt.cancel();
        let codes = arr2(&[[0]]);
        match MsuSearch::new(&codes, 1, &interrupt, &mut |_| ()).unwrap_err().kind() {
            ErrorKind::Interrupted => (),
            other => panic!("unexpected error: {}", other)
        }
    }
}
