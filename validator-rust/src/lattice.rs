//! The solution space: every combination of generalization levels of the quasi-identifiers.
//!
//! Nodes are materialized lazily into an arena keyed by their transformation,
//! and are never removed for the lifetime of the lattice.

use crate::errors::*;

use crate::metric::InformationLoss;

use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;


/// One generalization level per quasi-identifier, in definition order.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transformation(pub Vec<usize>);

impl Transformation {
    pub fn levels(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn level_sum(&self) -> usize {
        self.0.iter().sum()
    }

    /// Number of single-level steps needed to generalize `self` into `other`.
    ///
    /// `None` unless `other` is at least as general as `self` in every coordinate.
    pub fn distance_to(&self, other: &Transformation) -> Option<usize> {
        match self.partial_cmp(other) {
            Some(Ordering::Less) | Some(Ordering::Equal) => Some(other.level_sum() - self.level_sum()),
            _ => None
        }
    }
}

/// Coordinate-wise order: greater means more generalized. Incomparable pairs yield `None`.
impl PartialOrd for Transformation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.0.len() != other.0.len() {
            return None;
        }
        let (mut less, mut greater) = (false, false);
        self.0.iter().zip(other.0.iter()).for_each(|(left, right)| match left.cmp(right) {
            Ordering::Less => less = true,
            Ordering::Greater => greater = true,
            Ordering::Equal => ()
        });
        match (less, greater) {
            (false, false) => Some(Ordering::Equal),
            (true, false) => Some(Ordering::Less),
            (false, true) => Some(Ordering::Greater),
            (true, true) => None
        }
    }
}

impl fmt::Display for Transformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.iter().join(", "))
    }
}


#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Anonymity {
    Unknown,
    Anonymous,
    NotAnonymous,
}

impl Anonymity {
    pub fn from_flag(anonymous: bool) -> Self {
        if anonymous { Anonymity::Anonymous } else { Anonymity::NotAnonymous }
    }
}


/// Evaluation state of one transformation.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    transformation: Transformation,
    checked: bool,
    anonymity: Anonymity,
    minimum_loss: Option<InformationLoss>,
    maximum_loss: Option<InformationLoss>,
    lower_bound: Option<InformationLoss>,
}

impl Node {
    fn new(transformation: Transformation) -> Self {
        Node {
            transformation,
            checked: false,
            anonymity: Anonymity::Unknown,
            minimum_loss: None,
            maximum_loss: None,
            lower_bound: None,
        }
    }

    pub fn transformation(&self) -> &Transformation {
        &self.transformation
    }

    pub fn is_checked(&self) -> bool {
        self.checked
    }

    pub fn anonymity(&self) -> Anonymity {
        self.anonymity
    }

    pub fn is_anonymous(&self) -> bool {
        self.anonymity == Anonymity::Anonymous
    }

    /// The exact loss, available once the bounds have collapsed.
    pub fn information_loss(&self) -> Option<InformationLoss> {
        match (self.minimum_loss, self.maximum_loss) {
            (Some(minimum), Some(maximum)) if minimum == maximum => Some(minimum),
            _ => None
        }
    }

    pub fn loss_bounds(&self) -> (Option<InformationLoss>, Option<InformationLoss>) {
        (self.minimum_loss, self.maximum_loss)
    }

    pub fn lower_bound(&self) -> Option<InformationLoss> {
        self.lower_bound
    }

    /// A checked node whose loss bounds coincide. Its state never changes again.
    pub fn is_final(&self) -> bool {
        self.checked && self.information_loss().is_some()
    }

    /// Record the result of a full check.
    ///
    /// Repeating the check of a final node with the same outcome is accepted,
    /// any deviation is an invariant violation.
    pub fn set_checked(&mut self, anonymity: Anonymity, loss: InformationLoss, lower_bound: InformationLoss) -> Result<()> {
        if anonymity == Anonymity::Unknown {
            bail!(ErrorKind::InvariantViolation(format!("check of {} produced no verdict", self.transformation)))
        }
        if lower_bound > loss {
            bail!(ErrorKind::InvariantViolation(format!(
                "lower bound {} exceeds the information loss {} of {}", lower_bound, loss, self.transformation)))
        }
        if self.is_final() {
            if self.anonymity != anonymity || self.information_loss() != Some(loss) {
                bail!(ErrorKind::InvariantViolation(format!(
                    "the verdict of {} is final and may not change", self.transformation)))
            }
            return Ok(());
        }
        self.checked = true;
        self.anonymity = anonymity;
        self.minimum_loss = Some(loss);
        self.maximum_loss = Some(loss);
        self.lower_bound = Some(lower_bound);
        Ok(())
    }

    /// Tag the node with a verdict inferred from its neighbours. Checked nodes keep their own verdict.
    pub fn set_predicted(&mut self, anonymity: Anonymity, lower_bound: Option<InformationLoss>) {
        if self.checked { return; }
        self.anonymity = anonymity;
        if lower_bound.is_some() {
            self.lower_bound = lower_bound;
            self.minimum_loss = lower_bound;
        }
    }
}


/// Grid of all legal transformations between a minimum and a maximum level per quasi-identifier.
#[derive(Clone, Debug)]
pub struct Lattice {
    minimum: Transformation,
    maximum: Transformation,
    size: usize,
    nodes: IndexMap<Transformation, Node>,
    optimum: Option<Transformation>,
    materialized: Option<Transformation>,
}

impl Lattice {
    /// Define the solution space.
    ///
    /// # Arguments
    /// * `minimum` - lowest allowed level per quasi-identifier
    /// * `maximum` - highest allowed level per quasi-identifier
    /// * `maximum_size` - largest number of transformations that may be searched
    ///
    /// # Return
    /// The lattice, or `LatticeTooLarge` if the product of the range sizes exceeds `maximum_size`.
    pub fn new(minimum: Vec<usize>, maximum: Vec<usize>, maximum_size: usize) -> Result<Lattice> {
        if minimum.len() != maximum.len() {
            bail!("minimum and maximum levels must have the same length, got {} and {}", minimum.len(), maximum.len())
        }
        if let Some(index) = (0..minimum.len()).find(|index| minimum[*index] > maximum[*index]) {
            bail!("quasi-identifier {}: minimum level {} exceeds maximum level {}", index, minimum[index], maximum[index])
        }

        let size = minimum.iter().zip(maximum.iter())
            .try_fold(1u128, |size, (low, high)| size.checked_mul((high - low + 1) as u128))
            .unwrap_or(u128::MAX);
        if size > maximum_size as u128 {
            bail!(ErrorKind::LatticeTooLarge(size, maximum_size))
        }

        Ok(Lattice {
            minimum: Transformation(minimum),
            maximum: Transformation(maximum),
            size: size as usize,
            nodes: IndexMap::new(),
            optimum: None,
            materialized: None,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn dimensions(&self) -> usize {
        self.minimum.len()
    }

    pub fn bottom(&self) -> &Transformation {
        &self.minimum
    }

    pub fn top(&self) -> &Transformation {
        &self.maximum
    }

    pub fn contains(&self, transformation: &Transformation) -> bool {
        self.minimum <= *transformation && *transformation <= self.maximum
    }

    /// A node that has already been materialized.
    pub fn node(&self, transformation: &Transformation) -> Option<&Node> {
        self.nodes.get(transformation)
    }

    /// Retrieve the node of a transformation, creating it on first access.
    pub fn get_or_create(&mut self, transformation: &Transformation) -> Result<&mut Node> {
        if !self.contains(transformation) {
            bail!("transformation {} lies outside of the solution space [{}, {}]",
                  transformation, self.minimum, self.maximum)
        }
        Ok(self.nodes.entry(transformation.clone())
            .or_insert_with(|| Node::new(transformation.clone())))
    }

    /// Nodes materialized so far, in creation order.
    pub fn nodes(&self) -> impl Iterator<Item=&Node> {
        self.nodes.values()
    }

    /// Transformations that generalize exactly one quasi-identifier by one level.
    pub fn successors(&self, transformation: &Transformation) -> Vec<Transformation> {
        self.neighbours(transformation, |level, index| if level < self.maximum.0[index] { Some(level + 1) } else { None })
    }

    /// Transformations that specialize exactly one quasi-identifier by one level.
    pub fn predecessors(&self, transformation: &Transformation) -> Vec<Transformation> {
        self.neighbours(transformation, |level, index| if level > self.minimum.0[index] { Some(level - 1) } else { None })
    }

    fn neighbours(&self, transformation: &Transformation, step: impl Fn(usize, usize) -> Option<usize>) -> Vec<Transformation> {
        transformation.0.iter().enumerate()
            .filter_map(|(index, level)| step(*level, index).map(|level| {
                let mut levels = transformation.0.clone();
                levels[index] = level;
                Transformation(levels)
            }))
            .collect()
    }

    /// All legal transformations ordered by level sum, then lexicographically.
    pub fn transformations(&self) -> Vec<Transformation> {
        if self.dimensions() == 0 {
            return vec![self.minimum.clone()];
        }
        let mut transformations: Vec<Transformation> = self.minimum.0.iter().zip(self.maximum.0.iter())
            .map(|(low, high)| *low..=*high)
            .multi_cartesian_product()
            .map(Transformation)
            .collect();
        transformations.sort_by_key(Transformation::level_sum);
        transformations
    }

    pub fn optimum(&self) -> Option<&Transformation> {
        self.optimum.as_ref()
    }

    pub fn set_optimum(&mut self, transformation: Option<Transformation>) {
        self.optimum = transformation;
    }

    pub fn materialized(&self) -> Option<&Transformation> {
        self.materialized.as_ref()
    }

    pub fn set_materialized(&mut self, transformation: Option<Transformation>) {
        self.materialized = transformation;
    }
}
