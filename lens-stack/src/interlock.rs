//! Beam stop interlock for focusing moves.
//!
//! Moving the lenses sweeps a focused beam across whatever sits downstream.
//! Before any coordinated move the thickest attenuator filter is driven into
//! the beam; the move is only allowed if that filter reports inserted.

use std::thread;
use std::time::Duration;

use tracing::{info, warn};

/// Settle time after commanding a filter insertion
pub const DEFAULT_SETTLE_TIME: Duration = Duration::from_millis(10);

/// A solid attenuator with a set of insertable filters.
pub trait Attenuator {
    /// Number of filters
    fn filter_count(&self) -> usize;

    /// Thickness of a filter in meters
    fn thickness(&self, index: usize) -> f64;

    /// Whether the filter is currently in the beam
    fn is_inserted(&self, index: usize) -> bool;

    /// Command the filter into the beam
    fn insert(&mut self, index: usize) -> Result<(), String>;
}

/// Pre-move gate inserting the thickest attenuator filter.
pub struct SafetyInterlock {
    attenuator: Option<Box<dyn Attenuator + Send>>,
    settle_time: Duration,
}

impl SafetyInterlock {
    pub fn new(attenuator: Box<dyn Attenuator + Send>) -> Self {
        Self {
            attenuator: Some(attenuator),
            settle_time: DEFAULT_SETTLE_TIME,
        }
    }

    /// Interlock without an attenuator; it never reports safe.
    pub fn without_attenuator() -> Self {
        Self {
            attenuator: None,
            settle_time: DEFAULT_SETTLE_TIME,
        }
    }

    pub fn with_settle_time(mut self, settle_time: Duration) -> Self {
        self.settle_time = settle_time;
        self
    }

    /// The attenuator, if one is configured
    pub fn attenuator(&self) -> Option<&(dyn Attenuator + Send)> {
        self.attenuator.as_deref()
    }

    /// Index of the thickest filter; the first one wins ties.
    pub fn thickest_filter(&self) -> Option<usize> {
        let attenuator = self.attenuator.as_ref()?;
        if attenuator.filter_count() == 0 {
            return None;
        }
        let mut best = 0;
        let mut best_thickness = attenuator.thickness(0);
        for index in 1..attenuator.filter_count() {
            let thickness = attenuator.thickness(index);
            if thickness > best_thickness {
                best = index;
                best_thickness = thickness;
            }
        }
        Some(best)
    }

    /// Insert the thickest filter and report whether it is in.
    ///
    /// Returns `false` when no attenuator is configured, it has no filters,
    /// or the filter is still out after the settle time.
    pub fn make_safe(&mut self) -> bool {
        let Some(index) = self.thickest_filter() else {
            warn!("Cannot do safe lens move: no attenuator filters available");
            return false;
        };
        let Some(attenuator) = self.attenuator.as_mut() else {
            return false;
        };

        if !attenuator.is_inserted(index) {
            if let Err(e) = attenuator.insert(index) {
                warn!("Beam stop attenuator filter {index} insert failed: {e}");
                return false;
            }
            thread::sleep(self.settle_time);
        }

        if attenuator.is_inserted(index) {
            info!("Beam stop attenuator filter {index} is in");
            true
        } else {
            warn!("Beam stop attenuator filter {index} did not move in");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimAttenuator;

    fn interlock(attenuator: SimAttenuator) -> SafetyInterlock {
        SafetyInterlock::new(Box::new(attenuator)).with_settle_time(Duration::ZERO)
    }

    #[test]
    fn test_no_attenuator_is_never_safe() {
        let mut interlock = SafetyInterlock::without_attenuator();
        assert!(!interlock.make_safe());
        assert!(interlock.attenuator().is_none());
    }

    #[test]
    fn test_empty_attenuator_is_never_safe() {
        let mut interlock = interlock(SimAttenuator::new(&[]));
        assert!(!interlock.make_safe());
    }

    #[test]
    fn test_inserts_thickest_filter() {
        let mut interlock = interlock(SimAttenuator::new(&[20e-6, 320e-6, 80e-6]));
        assert_eq!(interlock.thickest_filter(), Some(1));
        assert!(interlock.make_safe());

        let att = interlock.attenuator().unwrap();
        assert!(att.is_inserted(1));
        assert!(!att.is_inserted(0));
        assert!(!att.is_inserted(2));
    }

    #[test]
    fn test_first_thickest_wins_ties() {
        let interlock = interlock(SimAttenuator::new(&[10e-6, 500e-6, 500e-6]));
        assert_eq!(interlock.thickest_filter(), Some(1));
    }

    #[test]
    fn test_already_inserted_filter() {
        let mut att = SimAttenuator::new(&[100e-6, 200e-6]);
        att.set_inserted(1, true);
        let mut interlock = interlock(att);
        assert!(interlock.make_safe());
    }

    #[test]
    fn test_stuck_filter_is_unsafe() {
        let att = SimAttenuator::new(&[100e-6, 200e-6]).with_stuck(1);
        let mut interlock = interlock(att);
        assert!(!interlock.make_safe());
        assert!(!interlock.attenuator().unwrap().is_inserted(1));
    }

    #[test]
    fn test_insert_error_is_unsafe() {
        let att = SimAttenuator::new(&[100e-6]).with_fault("filter 0 controller offline");
        let mut interlock = interlock(att);
        assert!(!interlock.make_safe());
    }
}
