use anonymity_validator::base::EquivalenceClass;
use anonymity_validator::lattice::Transformation;

use crate::data::DataManager;

use indexmap::IndexMap;


/// Group all rows of the input by their generalized key.
///
/// # Return
/// * `0` - the classes, in order of first occurrence
/// * `1` - index of the class of every row
pub fn group_rows(manager: &DataManager, transformation: &Transformation) -> (Vec<EquivalenceClass>, Vec<usize>) {
    let mut classes = IndexMap::<Vec<usize>, EquivalenceClass>::new();
    let assignment = (0..manager.num_rows())
        .map(|row| {
            let key = manager.key(row, transformation);
            match classes.get_full_mut(&key) {
                Some((index, _, class)) => {
                    manager.accumulate(class, row);
                    index
                }
                None => classes.insert_full(key, manager.seed_class(row)).0
            }
        })
        .collect();
    (classes.into_iter().map(|(_, class)| class).collect(), assignment)
}

/// Merge the classes of a finer transformation into the classes of `transformation`.
///
/// The key of a merged class is regenerated from its representative row, which is exact
/// whenever every hierarchy is consistent and `transformation` generalizes the source.
pub fn coarsen(manager: &DataManager, source: &[EquivalenceClass], transformation: &Transformation) -> Vec<EquivalenceClass> {
    let mut classes = IndexMap::<Vec<usize>, EquivalenceClass>::new();
    source.iter().for_each(|class| {
        let key = manager.key(class.representative, transformation);
        match classes.get_mut(&key) {
            Some(merged) => merged.merge(class),
            None => { classes.insert(key, class.clone()); }
        }
    });
    classes.into_iter().map(|(_, class)| class).collect()
}


#[cfg(test)]
mod test_groupify {
    use crate::checker::groupify::{coarsen, group_rows};
    use crate::data::DataManager;
    use crate::data::test_data::{people, people_definition};
    use anonymity_validator::config::Configuration;
    use anonymity_validator::criteria::KAnonymity;
    use anonymity_validator::lattice::Transformation;
    use std::sync::Arc;

    fn sizes(classes: &[anonymity_validator::base::EquivalenceClass]) -> Vec<usize> {
        let mut sizes: Vec<usize> = classes.iter().map(|class| class.count).collect();
        sizes.sort();
        sizes
    }

    #[test]
    fn coarsening_matches_full_grouping() {
        let configuration = Configuration::default().with_criterion(KAnonymity { k: 2 });
        let manager = DataManager::new(Arc::new(people()), &people_definition(), &configuration).unwrap();

        let (fine, assignment) = group_rows(&manager, &Transformation(vec![0, 1]));
        assert_eq!(fine.len(), 6);
        assert_eq!(assignment, vec![0, 1, 2, 3, 4, 5]);

        let coarse = Transformation(vec![1, 2]);
        let (direct, assignment) = group_rows(&manager, &coarse);
        assert_eq!(sizes(&coarsen(&manager, &fine, &coarse)), sizes(&direct));
        assert_eq!(sizes(&direct), vec![1, 1, 2, 2]);
        assert_eq!(assignment[4], assignment[5]);
    }
}
