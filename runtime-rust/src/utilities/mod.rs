use anonymity_validator::errors::*;

use anonymity_validator::Float;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;


/// Shared cancellation flag, polled by long-running computations.
///
/// Clones observe the same flag, so a handle can be moved to the thread that requests cancellation.
#[derive(Clone, Debug, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Interrupt::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// # Return
    /// `ErrorKind::Interrupted` once the flag has been set.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            bail!(ErrorKind::Interrupted)
        }
        Ok(())
    }
}


/// Forwards progress to a listener as a percentage that never decreases.
pub struct ProgressMonitor<'a> {
    listener: &'a mut dyn FnMut(Float),
    value: Float,
}

impl<'a> ProgressMonitor<'a> {
    pub fn new(listener: &'a mut dyn FnMut(Float)) -> Self {
        ProgressMonitor { listener, value: 0. }
    }

    /// Report a percentage. Values are clamped to [0, 100], and values below the last report are ignored.
    pub fn update(&mut self, value: Float) {
        if value.is_nan() { return; }
        let value = num::clamp(value, 0., 100.);
        if value > self.value {
            self.value = value;
            (self.listener)(value);
        }
    }

    /// Report progress of a sub-task that covers `[offset, offset + scale]` of the total.
    pub fn update_scaled(&mut self, offset: Float, scale: Float, fraction: Float) {
        self.update(offset + scale * fraction)
    }

    pub fn value(&self) -> Float {
        self.value
    }
}


#[cfg(test)]
mod test_utilities {
    use crate::utilities::{Interrupt, ProgressMonitor};
    use anonymity_validator::errors::ErrorKind;

    #[test]
    fn interrupt_is_shared() {
        let interrupt = Interrupt::new();
        let handle = interrupt.clone();
        assert!(interrupt.check().is_ok());
        handle.cancel();
        match interrupt.check().unwrap_err().kind() {
            ErrorKind::Interrupted => (),
            other => panic!("unexpected error: {}", other)
        }
    }

    #[test]
    fn progress_is_monotonic_and_clamped() {
        let mut reported = Vec::new();
        {
            let mut listener = |value: f64| reported.push(value);
            let mut monitor = ProgressMonitor::new(&mut listener);
            monitor.update(10.);
            monitor.update(5.);
            monitor.update_scaled(10., 90., 0.5);
            monitor.update(150.);
            monitor.update(f64::NAN);
        }
        assert_eq!(reported, vec![10., 55., 100.]);
    }
}
