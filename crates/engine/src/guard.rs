use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use ballast_common::error::EngineError;

/// Operation lock shared by every entry point of the engine.
///
/// The lock records the thread that holds it. A second thread waits until
/// the holder finishes, so whole operations are serialized and nobody sees
/// another caller's half-applied state. The holding thread itself can still
/// read through `observe` (token hooks querying balances), but trying to
/// `enter` again from that thread fails with `EngineError::ReentrantCall`.
///
/// The lock is released when the returned `Entered` token is dropped, on
/// success and on failure alike.
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    owner: Mutex<Option<ThreadId>>,
    released: Condvar,
}

/// Proof that the current thread holds the lock.
#[derive(Debug)]
pub struct Entered<'a> {
    guard: &'a ReentrancyGuard,
}

impl ReentrancyGuard {
    /// Acquire the lock for a state-mutating operation.
    pub fn enter(&self) -> Result<Entered<'_>, EngineError> {
        let current = thread::current().id();
        let owner = self.lock_owner();
        if *owner == Some(current) {
            return Err(EngineError::ReentrantCall);
        }
        Ok(self.acquire(owner, current))
    }

    /// Acquire the lock for a read, unless this thread already holds it.
    ///
    /// Returns `None` when called from inside an operation on the same
    /// thread. The read then sees that operation's effects so far.
    pub fn observe(&self) -> Option<Entered<'_>> {
        let current = thread::current().id();
        let owner = self.lock_owner();
        if *owner == Some(current) {
            return None;
        }
        Some(self.acquire(owner, current))
    }

    fn acquire(
        &self,
        mut owner: MutexGuard<'_, Option<ThreadId>>,
        current: ThreadId,
    ) -> Entered<'_> {
        while owner.is_some() {
            owner = self
                .released
                .wait(owner)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *owner = Some(current);
        Entered { guard: self }
    }

    fn lock_owner(&self) -> MutexGuard<'_, Option<ThreadId>> {
        self.owner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        *self.guard.lock_owner() = None;
        self.guard.released.notify_all();
    }
}
