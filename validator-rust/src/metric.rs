use crate::errors::*;

use crate::base::GroupStatistics;
use crate::lattice::Transformation;

use noisy_float::types::{n64, N64};
use serde::{Deserialize, Serialize};

/// Totally ordered information loss.
pub type InformationLoss = N64;


#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricKind {
    /// Sum of generalization levels, relative to the sum of hierarchy heights.
    Height,
    /// Average relative generalization level of a cell.
    Precision,
    /// Squared class sizes, charging suppressed rows with the size of the whole dataset.
    Discernibility,
}

/// Utility metric, weighted between generalization and suppression by `gs_factor`.
///
/// A factor close to 0 makes suppression cheap, a factor close to 1 makes generalization cheap.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub kind: MetricKind,
    pub gs_factor: f64,
}

impl Default for Metric {
    fn default() -> Self {
        Metric { kind: MetricKind::Precision, gs_factor: 0.5 }
    }
}

impl Metric {
    /// # Return
    /// * `0` - weight of generalization
    /// * `1` - weight of suppression
    pub fn weights(&self) -> (f64, f64) {
        let gs = self.gs_factor;
        let generalization = if gs <= 0.5 { 1. } else { 2. * (1. - gs) };
        let suppression = if gs < 0.5 { 2. * gs } else { 1. };
        (generalization, suppression)
    }

    /// Compute the information loss of a checked transformation.
    ///
    /// # Arguments
    /// * `transformation` - generalization levels per quasi-identifier
    /// * `heights` - hierarchy height per quasi-identifier
    /// * `statistics` - classes and outliers of the transformation
    pub fn information_loss(
        &self, transformation: &Transformation, heights: &[usize], statistics: &GroupStatistics,
    ) -> Result<InformationLoss> {
        let rows = statistics.relevant_rows;
        if rows == 0 {
            return Ok(n64(0.));
        }
        let (generalization, suppression) = self.weights();
        let suppressed_share = statistics.outliers as f64 / rows as f64;
        let retained_share = 1. - suppressed_share;

        let loss = match self.kind {
            MetricKind::Height =>
                generalization * height_share(transformation, heights)? + suppression * suppressed_share,
            MetricKind::Precision =>
                generalization * precision(transformation, heights)? * retained_share + suppression * suppressed_share,
            MetricKind::Discernibility => {
                let squares: f64 = statistics.retained().map(|class| (class.count as f64).powi(2)).sum();
                generalization * squares / (rows as f64).powi(2) + suppression * suppressed_share
            }
        };
        to_loss(loss)
    }

    /// A bound on the information loss that can be computed without grouping.
    ///
    /// # Arguments
    /// * `transformation` - generalization levels per quasi-identifier
    /// * `heights` - hierarchy height per quasi-identifier
    /// * `rows` - number of rows subject to the criteria
    pub fn lower_bound(&self, transformation: &Transformation, heights: &[usize], rows: usize) -> Result<InformationLoss> {
        if rows == 0 {
            return Ok(n64(0.));
        }
        let (generalization, suppression) = self.weights();
        let bound = match self.kind {
            MetricKind::Height => generalization * height_share(transformation, heights)?,
            MetricKind::Precision => (generalization * precision(transformation, heights)?).min(suppression),
            MetricKind::Discernibility => (generalization / rows as f64).min(suppression),
        };
        to_loss(bound)
    }
}

fn check_dimensions(transformation: &Transformation, heights: &[usize]) -> Result<()> {
    if transformation.len() != heights.len() {
        bail!("transformation {} does not match {} hierarchies", transformation, heights.len())
    }
    if let Some((level, height)) = transformation.levels().iter().zip(heights.iter()).find(|(level, height)| level > height) {
        bail!("level {} exceeds the hierarchy height {}", level, height)
    }
    Ok(())
}

fn height_share(transformation: &Transformation, heights: &[usize]) -> Result<f64> {
    check_dimensions(transformation, heights)?;
    let total: usize = heights.iter().sum();
    Ok(if total == 0 { 0. } else { transformation.level_sum() as f64 / total as f64 })
}

fn precision(transformation: &Transformation, heights: &[usize]) -> Result<f64> {
    check_dimensions(transformation, heights)?;
    if heights.is_empty() {
        return Ok(0.);
    }
    Ok(transformation.levels().iter().zip(heights.iter())
        .map(|(level, height)| if *height == 0 { 0. } else { *level as f64 / *height as f64 })
        .sum::<f64>() / heights.len() as f64)
}

fn to_loss(value: f64) -> Result<InformationLoss> {
    if !value.is_finite() {
        bail!(ErrorKind::InvariantViolation(format!("information loss must be finite, got {}", value)))
    }
    Ok(n64(value))
}


#[cfg(test)]
mod test_metric {
    use crate::base::{EquivalenceClass, GroupStatistics};
    use crate::lattice::Transformation;
    use crate::metric::{Metric, MetricKind};

    fn statistics(sizes: &[usize], suppressed: &[bool]) -> GroupStatistics {
        let classes: Vec<EquivalenceClass> = sizes.iter().enumerate()
            .map(|(representative, count)| EquivalenceClass {
                representative,
                count: *count,
                population_count: *count,
                distributions: vec![],
            })
            .collect();
        let outliers = sizes.iter().zip(suppressed.iter()).filter(|(_, s)| **s).map(|(c, _)| *c).sum();
        GroupStatistics {
            classes,
            suppressed: suppressed.to_vec(),
            outliers,
            relevant_rows: sizes.iter().sum(),
            minimal_class_size: None,
        }
    }

    #[test]
    fn weights() {
        let weights = |gs_factor| Metric { kind: MetricKind::Precision, gs_factor }.weights();
        assert_eq!(weights(0.0), (1., 0.));
        assert_eq!(weights(0.5), (1., 1.));
        assert_eq!(weights(1.0), (0., 1.));
        assert_eq!(weights(0.25), (1., 0.5));
    }

    #[test]
    fn precision_charges_suppressed_cells() {
        let metric = Metric::default();
        let transformation = Transformation(vec![1, 0]);
        let loss = metric.information_loss(&transformation, &[2, 2], &statistics(&[2, 2], &[false, true])).unwrap();
        assert!((loss.raw() - (0.25 * 0.5 + 0.5)).abs() < 1e-12);
        let bound = metric.lower_bound(&transformation, &[2, 2], 4).unwrap();
        assert!(bound <= loss);
    }

    #[test]
    fn discernibility() {
        let metric = Metric { kind: MetricKind::Discernibility, gs_factor: 0.5 };
        let transformation = Transformation(vec![0]);
        let loss = metric.information_loss(&transformation, &[1], &statistics(&[3, 1], &[false, true])).unwrap();
        assert!((loss.raw() - (9. / 16. + 0.25)).abs() < 1e-12);
        assert!(metric.lower_bound(&transformation, &[1], 4).unwrap() <= loss);
    }

    #[test]
    fn height_is_monotonic_without_suppression() {
        let metric = Metric { kind: MetricKind::Height, gs_factor: 0.5 };
        let none = statistics(&[4], &[false]);
        let low = metric.information_loss(&Transformation(vec![0, 1]), &[2, 2], &none).unwrap();
        let high = metric.information_loss(&Transformation(vec![1, 1]), &[2, 2], &none).unwrap();
        assert!(low < high);
    }

    #[test]
    fn rejects_levels_above_height() {
        let metric = Metric::default();
        assert!(metric.lower_bound(&Transformation(vec![3]), &[2], 4).is_err());
    }
}
