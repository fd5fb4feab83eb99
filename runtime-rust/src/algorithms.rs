use anonymity_validator::errors::*;

use anonymity_validator::lattice::{Anonymity, Node, Transformation};
use anonymity_validator::metric::InformationLoss;

use crate::session::Session;
use crate::utilities::{Interrupt, ProgressMonitor};


/// Evaluate every transformation of the lattice, bottom-up by level sum.
///
/// When anonymity is inherited by generalizations, transformations above an anonymous node
/// are tagged anonymous without being checked. Their loss can not undercut the node they were inferred from,
/// so they are never candidates for the optimum.
///
/// # Arguments
/// * `session` - receives the verdicts and the optimum
/// * `monitor` - progress, as the share of transformations visited
/// * `interrupt` - polled before every transformation
pub fn exhaustive_search(session: &mut Session, monitor: &mut ProgressMonitor, interrupt: &Interrupt) -> Result<()> {
    let transformations = session.lattice().transformations();
    let total = transformations.len() as f64;
    let monotonic = session.configuration().is_monotonic();
    let mut optimum: Option<(Transformation, InformationLoss)> = None;

    for (index, transformation) in transformations.iter().enumerate() {
        interrupt.check()?;

        if monotonic && has_anonymous_predecessor(session, transformation) {
            let lower_bound = session.lower_bound(transformation)?;
            session.lattice_mut().get_or_create(transformation)?
                .set_predicted(Anonymity::Anonymous, Some(lower_bound));
        } else {
            let result = session.evaluate(transformation)?;
            let improves = optimum.as_ref()
                .map(|(_, loss)| result.information_loss < *loss)
                .unwrap_or(true);
            if result.anonymity == Anonymity::Anonymous && improves {
                optimum = Some((transformation.clone(), result.information_loss));
            }
        }
        monitor.update((index + 1) as f64 / total * 100.);
    }

    match &optimum {
        Some((transformation, loss)) => tracing::info!("optimum {} with information loss {}", transformation, loss),
        None => tracing::info!("no anonymous transformation")
    }
    session.lattice_mut().set_optimum(optimum.map(|(transformation, _)| transformation));
    Ok(())
}

fn has_anonymous_predecessor(session: &Session, transformation: &Transformation) -> bool {
    let lattice = session.lattice();
    lattice.predecessors(transformation).iter()
        .any(|predecessor| lattice.node(predecessor).map(Node::is_anonymous).unwrap_or(false))
}


#[cfg(test)]
mod test_algorithms {
    use crate::anonymize;
    use crate::data::test_data::{people, people_definition};
    use crate::utilities::Interrupt;
    use anonymity_validator::config::Configuration;
    use anonymity_validator::criteria::KAnonymity;
    use anonymity_validator::errors::ErrorKind;
    use anonymity_validator::lattice::{Anonymity, Transformation};
    use std::sync::Arc;

    #[test]
    fn predicts_generalizations_of_anonymous_nodes() {
        let configuration = Configuration::default().with_criterion(KAnonymity { k: 2 });
        let session = anonymize(Arc::new(people()), &people_definition(), &configuration, &mut |_| (), &Interrupt::new()).unwrap();

        let node = session.lattice().node(&Transformation(vec![2, 3])).unwrap();
        assert_eq!(node.anonymity(), Anonymity::Anonymous);
        assert!(!node.is_checked());
        assert!(session.lattice().nodes().all(|node| node.anonymity() != Anonymity::Unknown));
    }

    #[test]
    fn suppression_disables_prediction() {
        let mut configuration = Configuration::default().with_criterion(KAnonymity { k: 2 });
        configuration.suppression_limit = 0.5;
        let session = anonymize(Arc::new(people()), &people_definition(), &configuration, &mut |_| (), &Interrupt::new()).unwrap();
        assert!(session.lattice().nodes().all(|node| node.is_checked()));
        assert_eq!(session.lattice().nodes().count(), session.lattice().size());
    }

    #[test]
    fn reports_progress_and_honours_interrupt() {
        let configuration = Configuration::default().with_criterion(KAnonymity { k: 2 });
        let mut reported = Vec::new();
        anonymize(Arc::new(people()), &people_definition(), &configuration, &mut |value| reported.push(value), &Interrupt::new()).unwrap();
        assert_eq!(reported.len(), 12);
        assert!(reported.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(reported.last(), Some(&100.));

        let interrupt = Interrupt::new();
        interrupt.cancel();
        let error = anonymize(Arc::new(people()), &people_definition(), &configuration, &mut |_| (), &interrupt).err().unwrap();
        match error.kind() {
            ErrorKind::Interrupted => (),
            other => panic!("unexpected error: {}", other)
        }
    }
}
