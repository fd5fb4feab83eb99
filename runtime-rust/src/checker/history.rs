use anonymity_validator::base::EquivalenceClass;
use anonymity_validator::lattice::Transformation;

use indexmap::IndexMap;


/// Classes of a checked transformation, kept for reuse by coarser transformations.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub classes: Vec<EquivalenceClass>,
    bytes: usize,
    last_used: u64,
}

/// Bounded cache of snapshots, evicting the least recently used entry first.
///
/// A snapshot is admitted only if it is small relative to the dataset and,
/// when it was derived from another snapshot, small relative to that snapshot.
#[derive(Clone, Debug)]
pub struct History {
    capacity: usize,
    snapshot_size_dataset: f64,
    snapshot_size_snapshot: f64,
    rows: usize,
    budget: usize,
    used: usize,
    clock: u64,
    entries: IndexMap<Transformation, Snapshot>,
}

impl History {
    /// # Arguments
    /// * `capacity` - largest number of snapshots, 0 disables the cache
    /// * `snapshot_size_dataset` - largest snapshot relative to the number of rows
    /// * `snapshot_size_snapshot` - largest snapshot relative to its parent snapshot
    /// * `rows` - number of rows of the input
    /// * `bytes_per_class` - expected size of a class, used to derive the byte budget
    pub fn new(capacity: usize, snapshot_size_dataset: f64, snapshot_size_snapshot: f64, rows: usize, bytes_per_class: usize) -> Self {
        let budget = (capacity as f64 * snapshot_size_dataset * rows as f64 * bytes_per_class as f64).ceil() as usize;
        History {
            capacity,
            snapshot_size_dataset,
            snapshot_size_snapshot,
            rows,
            budget,
            used: 0,
            clock: 0,
            entries: IndexMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn used_bytes(&self) -> usize {
        self.used
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.used = 0;
    }

    /// Find the closest snapshot that `transformation` generalizes.
    ///
    /// Closeness is the number of generalization steps between the two, ties are broken by fewer classes.
    pub fn find(&mut self, transformation: &Transformation) -> Option<(&Transformation, &Snapshot)> {
        let index = self.entries.iter().enumerate()
            .filter_map(|(index, (source, snapshot))| source.distance_to(transformation)
                .map(|distance| (index, distance, snapshot.classes.len())))
            .min_by_key(|(_, distance, classes)| (*distance, *classes))
            .map(|(index, _, _)| index)?;

        self.clock += 1;
        let clock = self.clock;
        let (source, snapshot) = self.entries.get_index_mut(index)?;
        snapshot.last_used = clock;
        Some((&*source, &*snapshot))
    }

    /// Offer the classes of a checked transformation.
    ///
    /// # Arguments
    /// * `transformation` - the transformation the classes were computed for
    /// * `classes` - the classes
    /// * `parent` - number of classes of the snapshot the classes were derived from
    ///
    /// # Return
    /// Whether the snapshot was admitted and survived eviction.
    pub fn store(&mut self, transformation: &Transformation, classes: Vec<EquivalenceClass>, parent: Option<usize>) -> bool {
        if self.capacity == 0 || self.entries.contains_key(transformation) {
            return false;
        }
        if classes.len() as f64 > self.snapshot_size_dataset * self.rows as f64 {
            return false;
        }
        if let Some(parent) = parent {
            if classes.len() as f64 > self.snapshot_size_snapshot * parent as f64 {
                return false;
            }
        }

        self.clock += 1;
        let bytes = classes.iter().map(EquivalenceClass::estimated_bytes).sum();
        self.used += bytes;
        self.entries.insert(transformation.clone(), Snapshot { classes, bytes, last_used: self.clock });

        while self.entries.len() > self.capacity || self.used > self.budget {
            let victim = self.entries.iter().enumerate()
                .min_by_key(|(_, (_, snapshot))| snapshot.last_used)
                .map(|(index, _)| index);
            match victim.and_then(|index| self.entries.swap_remove_index(index)) {
                Some((evicted, snapshot)) => {
                    tracing::trace!("evicted snapshot of {}", evicted);
                    self.used -= snapshot.bytes;
                }
                None => break
            }
        }
        self.entries.contains_key(transformation)
    }
}


#[cfg(test)]
mod test_history {
    use crate::checker::history::History;
    use anonymity_validator::base::EquivalenceClass;
    use anonymity_validator::lattice::Transformation;

    fn classes(count: usize) -> Vec<EquivalenceClass> {
        (0..count).map(|representative| EquivalenceClass {
            representative,
            count: 1,
            population_count: 1,
            distributions: vec![],
        }).collect()
    }

    fn bytes() -> usize {
        classes(1)[0].estimated_bytes()
    }

    #[test]
    fn finds_closest_generalized_source() {
        let mut history = History::new(10, 1., 1., 10, bytes());
        assert!(history.store(&Transformation(vec![0, 0]), classes(4), None));
        assert!(history.store(&Transformation(vec![1, 0]), classes(3), None));
        assert!(history.store(&Transformation(vec![0, 2]), classes(2), None));

        let (source, snapshot) = history.find(&Transformation(vec![1, 1])).unwrap();
        assert_eq!(source, &Transformation(vec![1, 0]));
        assert_eq!(snapshot.classes.len(), 3);
        assert!(history.find(&Transformation(vec![0, 1])).is_some());
        assert!(history.find(&Transformation(vec![2, 3])).is_some());

        let mut empty = History::new(10, 1., 1., 10, bytes());
        assert!(empty.find(&Transformation(vec![1, 1])).is_none());
    }

    #[test]
    fn admission_ratios() {
        let mut history = History::new(10, 0.5, 0.5, 10, bytes());
        assert!(!history.store(&Transformation(vec![0]), classes(6), None));
        assert!(!history.store(&Transformation(vec![1]), classes(4), Some(6)));
        assert!(history.store(&Transformation(vec![2]), classes(3), Some(6)));
        assert!(!History::new(0, 1., 1., 10, bytes()).store(&Transformation(vec![0]), classes(1), None));
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut history = History::new(2, 1., 1., 10, bytes());
        history.store(&Transformation(vec![0]), classes(2), None);
        history.store(&Transformation(vec![1]), classes(2), None);
        history.find(&Transformation(vec![0]));
        history.store(&Transformation(vec![2]), classes(2), None);
        assert_eq!(history.len(), 2);
        let (source, _) = history.find(&Transformation(vec![1])).unwrap();
        assert_eq!(source, &Transformation(vec![0]));

        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.used_bytes(), 0);
    }

    #[test]
    fn byte_budget() {
        let mut history = History::new(10, 0.1, 1., 10, bytes());
        assert!(history.store(&Transformation(vec![0]), classes(1), None));
        assert!(history.store(&Transformation(vec![1]), classes(1), None));
        assert!(history.used_bytes() <= 10 * bytes());
    }
}
