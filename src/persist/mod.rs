//! Boot-time persistence of the apply run.
//!
//! A single uniquely named scheduled task reapplies overrides after every
//! boot. The controller's two states are keyed purely by the task's
//! existence, so enable and disable are idempotent.

pub mod task;

use std::path::PathBuf;

use tracing::info;

use crate::config::PersistenceMode;

pub use task::{Schtasks, TaskError, TaskScheduler, TASK_NAME};

/// Result of an enable transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnableOutcome {
    Registered,
    AlreadyRegistered,
}

/// Result of a disable transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisableOutcome {
    Unregistered,
    NotRegistered,
}

/// Manages the boot-time reapplication task.
pub struct PersistenceController<'a> {
    scheduler: &'a dyn TaskScheduler,
    executable: PathBuf,
}

impl<'a> PersistenceController<'a> {
    pub fn new(scheduler: &'a dyn TaskScheduler, executable: PathBuf) -> Self {
        Self {
            scheduler,
            executable,
        }
    }

    /// Register the boot task for the given category scope.
    /// Enabling an already-registered task is a no-op.
    pub fn enable(&self, mode: PersistenceMode) -> Result<EnableOutcome, TaskError> {
        if self.scheduler.is_registered()? {
            return Ok(EnableOutcome::AlreadyRegistered);
        }
        self.scheduler.register(&self.executable, mode)?;
        info!(task = TASK_NAME, %mode, "boot persistence registered");
        Ok(EnableOutcome::Registered)
    }

    /// Remove the boot task. Disabling an absent task is a no-op.
    pub fn disable(&self) -> Result<DisableOutcome, TaskError> {
        if !self.scheduler.is_registered()? {
            return Ok(DisableOutcome::NotRegistered);
        }
        self.scheduler.unregister()?;
        info!(task = TASK_NAME, "boot persistence removed");
        Ok(DisableOutcome::Unregistered)
    }

    /// Whether the boot task currently exists.
    pub fn is_enabled(&self) -> Result<bool, TaskError> {
        self.scheduler.is_registered()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::path::Path;

    /// In-memory scheduler: the registered state plus a register call count.
    struct FakeScheduler {
        registered: RefCell<bool>,
        register_calls: RefCell<usize>,
    }

    impl FakeScheduler {
        fn new(registered: bool) -> Self {
            Self {
                registered: RefCell::new(registered),
                register_calls: RefCell::new(0),
            }
        }
    }

    impl TaskScheduler for FakeScheduler {
        fn is_registered(&self) -> Result<bool, TaskError> {
            Ok(*self.registered.borrow())
        }

        fn register(&self, _executable: &Path, _mode: PersistenceMode) -> Result<(), TaskError> {
            *self.registered.borrow_mut() = true;
            *self.register_calls.borrow_mut() += 1;
            Ok(())
        }

        fn unregister(&self) -> Result<(), TaskError> {
            *self.registered.borrow_mut() = false;
            Ok(())
        }
    }

    fn controller(scheduler: &FakeScheduler) -> PersistenceController<'_> {
        PersistenceController::new(scheduler, PathBuf::from(r"C:\Tools\usb-wake-fix.exe"))
    }

    #[test]
    fn enable_twice_registers_exactly_once() {
        let scheduler = FakeScheduler::new(false);
        let controller = controller(&scheduler);

        assert_eq!(
            controller.enable(PersistenceMode::All).unwrap(),
            EnableOutcome::Registered
        );
        assert_eq!(
            controller.enable(PersistenceMode::All).unwrap(),
            EnableOutcome::AlreadyRegistered
        );
        assert_eq!(*scheduler.register_calls.borrow(), 1);
        assert!(controller.is_enabled().unwrap());
    }

    #[test]
    fn disable_when_absent_is_a_no_op() {
        let scheduler = FakeScheduler::new(false);
        let controller = controller(&scheduler);
        assert_eq!(controller.disable().unwrap(), DisableOutcome::NotRegistered);
    }

    #[test]
    fn enable_then_disable_round_trips() {
        let scheduler = FakeScheduler::new(false);
        let controller = controller(&scheduler);
        controller.enable(PersistenceMode::Audio).unwrap();
        assert_eq!(controller.disable().unwrap(), DisableOutcome::Unregistered);
        assert!(!controller.is_enabled().unwrap());
    }
}
