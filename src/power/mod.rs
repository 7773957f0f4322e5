//! Power-request override layer.
//!
//! [`request`] builds structured override requests, [`powercfg`] is the one
//! adapter that executes them, and [`engine`]/[`removal`] drive batches of
//! requests for apply and undo. The [`PowerControl`] trait is the seam that
//! lets the engines run against an in-memory fake in unit tests.

pub mod engine;
pub mod powercfg;
pub mod removal;
pub mod request;

pub use engine::{ApplyEngine, ApplyOutcome, BatchStatus, DeviceResult};
pub use powercfg::{PowerError, Powercfg};
pub use removal::{RemovalEngine, RemovalOutcome};
pub use request::{OverrideFlag, OverrideRequest};

/// Operations the engines need from the power-management interface.
pub trait PowerControl {
    /// Register (or, for an empty flag set, clear) one override.
    fn submit(&self, request: &OverrideRequest) -> Result<(), PowerError>;

    /// Restore the default power schemes.
    fn reset_schemes(&self) -> Result<(), PowerError>;

    /// Current override entries registered for drivers.
    fn driver_overrides(&self) -> Result<Vec<String>, PowerError>;

    /// Active driver-originated requests currently blocking sleep.
    fn driver_blockers(&self) -> Result<Vec<String>, PowerError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::collections::HashSet;

    use super::request::OverrideRequest;
    use super::{PowerControl, PowerError};

    /// In-memory power interface that records every submission.
    pub(crate) struct FakePower {
        pub submitted: RefCell<Vec<OverrideRequest>>,
        pub reset_calls: RefCell<usize>,
        /// Submissions whose identifier contains any of these fragments are
        /// rejected.
        pub reject_fragments: HashSet<String>,
        /// Reject every submission regardless of identifier.
        pub reject_all: bool,
    }

    impl FakePower {
        pub fn new() -> Self {
            Self {
                submitted: RefCell::new(Vec::new()),
                reset_calls: RefCell::new(0),
                reject_fragments: HashSet::new(),
                reject_all: false,
            }
        }

        pub fn rejecting<I: IntoIterator<Item = String>>(fragments: I) -> Self {
            Self {
                reject_fragments: fragments.into_iter().collect(),
                ..Self::new()
            }
        }

        pub fn rejecting_all() -> Self {
            Self {
                reject_all: true,
                ..Self::new()
            }
        }

        pub fn submissions_for(&self, identifier: &str) -> usize {
            self.submitted
                .borrow()
                .iter()
                .filter(|r| r.identifier == identifier)
                .count()
        }
    }

    impl PowerControl for FakePower {
        fn submit(&self, request: &OverrideRequest) -> Result<(), PowerError> {
            self.submitted.borrow_mut().push(request.clone());
            let rejected = self
                .reject_fragments
                .iter()
                .any(|f| request.identifier.contains(f));
            if self.reject_all || rejected {
                Err(PowerError::Rejected("unable to perform operation".into()))
            } else {
                Ok(())
            }
        }

        fn reset_schemes(&self) -> Result<(), PowerError> {
            *self.reset_calls.borrow_mut() += 1;
            Ok(())
        }

        fn driver_overrides(&self) -> Result<Vec<String>, PowerError> {
            Ok(self
                .submitted
                .borrow()
                .iter()
                .filter(|r| !r.is_clear())
                .map(|r| r.identifier.clone())
                .collect())
        }

        fn driver_blockers(&self) -> Result<Vec<String>, PowerError> {
            Ok(Vec::new())
        }
    }
}
