//! Read access to transformed data.
//!
//! A session owns one canonical output buffer. A borrowed view reads that buffer through a lease,
//! which the session revokes before the buffer is reused for another transformation.
//! A forked view owns a deep copy and stays readable for as long as it lives.

use anonymity_validator::errors::*;

use anonymity_validator::base::EncodedDataset;
use anonymity_validator::lattice::Transformation;

use crate::data::{DataManager, SUPPRESSED};

use indexmap::IndexSet;
use ndarray::{Array2, Axis};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};


/// Generalized codes of every cell, and the outlier flag of every row.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputBuffer {
    pub data: Array2<usize>,
    pub outliers: Vec<bool>,
    /// Aggregated values, one column per microaggregated attribute.
    pub microaggregated: Array2<String>,
    pub transformation: Transformation,
}

/// Permission of a borrowed view to read the canonical buffer.
#[derive(Clone, Debug)]
pub struct Lease(Arc<AtomicBool>);

impl Lease {
    pub(crate) fn new() -> Self {
        Lease(Arc::new(AtomicBool::new(true)))
    }

    pub(crate) fn revoke(&self) {
        self.0.store(false, Ordering::SeqCst)
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug)]
pub enum Ownership {
    /// The view holds its own copy of the buffer.
    Forked,
    /// The view reads the canonical buffer of its session while the lease is active.
    Borrowed(Lease),
}


/// Output handle for one transformation of the input.
///
/// Clones refer to the same buffer.
#[derive(Clone, Debug)]
pub struct DataView {
    buffer: Arc<RwLock<OutputBuffer>>,
    ownership: Ownership,
    manager: Arc<DataManager>,
    suppression_string: String,
}

impl DataView {
    pub(crate) fn new(buffer: Arc<RwLock<OutputBuffer>>, ownership: Ownership, manager: Arc<DataManager>, suppression_string: String) -> Self {
        DataView { buffer, ownership, manager, suppression_string }
    }

    pub fn is_forked(&self) -> bool {
        match self.ownership {
            Ownership::Forked => true,
            Ownership::Borrowed(_) => false
        }
    }

    pub fn is_released(&self) -> bool {
        match &self.ownership {
            Ownership::Forked => false,
            Ownership::Borrowed(lease) => !lease.is_active()
        }
    }

    pub(crate) fn revoke(&self) {
        if let Ownership::Borrowed(lease) = &self.ownership {
            lease.revoke()
        }
    }

    /// Whether both handles refer to the same view.
    pub fn ptr_eq(&self, other: &DataView) -> bool {
        Arc::ptr_eq(&self.buffer, &other.buffer) && match (&self.ownership, &other.ownership) {
            (Ownership::Forked, Ownership::Forked) => true,
            (Ownership::Borrowed(left), Ownership::Borrowed(right)) => Arc::ptr_eq(&left.0, &right.0),
            _ => false
        }
    }

    /// Whether the view was produced from this exact input.
    pub fn is_derived_from(&self, input: &Arc<EncodedDataset>) -> bool {
        Arc::ptr_eq(self.manager.input(), input)
    }

    pub(crate) fn read(&self) -> Result<RwLockReadGuard<OutputBuffer>> {
        if self.is_released() {
            bail!(ErrorKind::ViewReleased)
        }
        self.buffer.read().map_err(|_| "output buffer is poisoned".into())
    }

    pub(crate) fn write(&self) -> Result<RwLockWriteGuard<OutputBuffer>> {
        if self.is_released() {
            bail!(ErrorKind::ViewReleased)
        }
        self.buffer.write().map_err(|_| "output buffer is poisoned".into())
    }

    pub fn num_rows(&self) -> usize {
        self.manager.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.manager.input().num_columns()
    }

    pub fn attribute_name(&self, column: usize) -> Result<&str> {
        self.manager.input().attribute_name(column)
    }

    pub fn column_index(&self, attribute: &str) -> Option<usize> {
        self.manager.input().column_index(attribute)
    }

    pub fn transformation(&self) -> Result<Transformation> {
        Ok(self.read()?.transformation.clone())
    }

    pub fn is_outlier(&self, row: usize) -> Result<bool> {
        self.read()?.outliers.get(row).cloned()
            .ok_or_else(|| format!("row {} is out of bounds", row).into())
    }

    pub fn outlier_count(&self) -> Result<usize> {
        Ok(self.read()?.outliers.iter().filter(|outlier| **outlier).count())
    }

    pub fn outlier_rows(&self) -> Result<Vec<usize>> {
        Ok(self.read()?.outliers.iter().enumerate()
            .filter(|(_, outlier)| **outlier)
            .map(|(row, _)| row)
            .collect())
    }

    fn is_suppressed(&self, buffer: &OutputBuffer, row: usize, column: usize) -> bool {
        buffer.data[[row, column]] == SUPPRESSED
            || (buffer.outliers[row] && self.manager.is_quasi_identifier(column))
    }

    /// Transformed value of a cell, or the suppression string for suppressed cells.
    pub fn value(&self, row: usize, column: usize) -> Result<String> {
        if row >= self.num_rows() || column >= self.num_columns() {
            bail!("cell ({}, {}) is out of bounds", row, column)
        }
        let buffer = self.read()?;
        if self.is_suppressed(&buffer, row, column) {
            return Ok(self.suppression_string.clone());
        }
        if let Some(position) = self.manager.aggregate_position(column) {
            return Ok(buffer.microaggregated[[row, position]].clone());
        }
        Ok(self.manager.input().decode(column, buffer.data[[row, column]])?.to_string())
    }

    /// Value of a cell in the input.
    pub fn input_value(&self, row: usize, column: usize) -> Result<&str> {
        self.manager.input().value(row, column)
    }

    /// Codes of the given columns. Suppressed cells hold `SUPPRESSED`.
    ///
    /// Microaggregated columns are coded by order of first occurrence of their aggregates.
    pub fn codes(&self, columns: &[usize]) -> Result<Array2<usize>> {
        if let Some(column) = columns.iter().find(|column| **column >= self.num_columns()) {
            bail!("column {} does not exist", column)
        }
        let buffer = self.read()?;
        let mut codes = buffer.data.select(Axis(1), columns);
        for (position, column) in columns.iter().enumerate() {
            if let Some(aggregate) = self.manager.aggregate_position(*column) {
                let mut dictionary = IndexSet::new();
                for row in 0..codes.len_of(Axis(0)) {
                    codes[[row, position]] = dictionary.insert_full(buffer.microaggregated[[row, aggregate]].as_str()).0;
                }
            }
        }
        for (row, mut values) in codes.genrows_mut().into_iter().enumerate() {
            for (position, column) in columns.iter().enumerate() {
                if self.is_suppressed(&buffer, row, *column) {
                    values[position] = SUPPRESSED;
                }
            }
        }
        Ok(codes)
    }

    /// Deep copy of the buffer.
    pub fn snapshot(&self) -> Result<OutputBuffer> {
        Ok(self.read()?.clone())
    }
}
