//! Stop-the-world coordination.
//!
//! findspot never suspends threads itself. The host that attached the
//! instrumentation supplies a [`TargetControl`] implementation, and the
//! coordinator layers the command policy on top of it: every command that
//! touches the store, filter or mode runs with the target frozen.

use log::{info, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::{AgentError, FreezeState};

/// Thread-control capability provided by the instrumentation host.
pub trait TargetControl: Send + Sync {
    /// Stop every observed-program thread except the caller.
    ///
    /// Returns false if the host could not stop them; nothing may then be
    /// mutated on the assumption that the target is quiescent.
    fn freeze_all(&self) -> bool;

    /// Resume everything stopped by [`freeze_all`](Self::freeze_all).
    fn resume_all(&self);

    /// Release all instrumentation.
    ///
    /// Invoked from an observed-program thread inside a hook, never from the
    /// control thread.
    fn detach(&self);
}

pub struct FreezeCoordinator {
    target: Arc<dyn TargetControl>,
    state: Mutex<FreezeState>,
}

impl FreezeCoordinator {
    #[must_use]
    pub fn new(target: Arc<dyn TargetControl>) -> Self {
        Self { target, state: Mutex::new(FreezeState::Running) }
    }

    #[must_use]
    pub fn state(&self) -> FreezeState {
        *self.lock_state()
    }

    /// Freeze the target. On failure the recorded state is left unchanged.
    pub fn freeze_all(&self) -> bool {
        let mut state = self.lock_state();
        if self.target.freeze_all() {
            *state = FreezeState::Frozen;
            true
        } else {
            warn!("target refused to freeze");
            false
        }
    }

    pub fn resume_all(&self) {
        let mut state = self.lock_state();
        self.target.resume_all();
        *state = FreezeState::Running;
    }

    /// Run `f` while the target is frozen.
    ///
    /// A target the operator already froze stays frozen afterwards; otherwise
    /// it is frozen for the duration of `f` and resumed again.
    ///
    /// # Errors
    /// Returns [`AgentError::FreezeFailed`] without running `f` if the host
    /// refuses to freeze.
    pub fn with_frozen<T>(&self, f: impl FnOnce() -> T) -> Result<T, AgentError> {
        if self.state() == FreezeState::Frozen {
            return Ok(f());
        }

        if !self.freeze_all() {
            return Err(AgentError::FreezeFailed);
        }
        let result = f();
        self.resume_all();
        Ok(result)
    }

    /// Forward a detach request to the host.
    pub fn detach(&self) {
        info!("releasing instrumentation");
        self.target.detach();
    }

    fn lock_state(&self) -> MutexGuard<'_, FreezeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingTarget {
        refuse: AtomicBool,
        freezes: AtomicUsize,
        resumes: AtomicUsize,
    }

    impl TargetControl for CountingTarget {
        fn freeze_all(&self) -> bool {
            if self.refuse.load(Ordering::SeqCst) {
                return false;
            }
            self.freezes.fetch_add(1, Ordering::SeqCst);
            true
        }

        fn resume_all(&self) {
            self.resumes.fetch_add(1, Ordering::SeqCst);
        }

        fn detach(&self) {}
    }

    #[test]
    fn test_with_frozen_brackets_the_call() {
        let target = Arc::new(CountingTarget::default());
        let coordinator = FreezeCoordinator::new(target.clone());

        let seen = coordinator.with_frozen(|| coordinator.state()).unwrap();
        assert_eq!(seen, FreezeState::Frozen);
        assert_eq!(coordinator.state(), FreezeState::Running);
        assert_eq!(target.freezes.load(Ordering::SeqCst), 1);
        assert_eq!(target.resumes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_with_frozen_keeps_operator_freeze() {
        let target = Arc::new(CountingTarget::default());
        let coordinator = FreezeCoordinator::new(target.clone());

        assert!(coordinator.freeze_all());
        coordinator.with_frozen(|| ()).unwrap();

        assert_eq!(coordinator.state(), FreezeState::Frozen);
        assert_eq!(target.freezes.load(Ordering::SeqCst), 1);
        assert_eq!(target.resumes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_refused_freeze_skips_command() {
        let target = Arc::new(CountingTarget::default());
        target.refuse.store(true, Ordering::SeqCst);
        let coordinator = FreezeCoordinator::new(target.clone());

        let mut ran = false;
        let result = coordinator.with_frozen(|| ran = true);

        assert!(matches!(result, Err(AgentError::FreezeFailed)));
        assert!(!ran);
        assert_eq!(coordinator.state(), FreezeState::Running);
        assert_eq!(target.resumes.load(Ordering::SeqCst), 0);
    }
}
