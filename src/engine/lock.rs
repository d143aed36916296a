// src/engine/lock.rs

//! The reentrant named-lock manager
//!
//! Locks are reference-counted wrappers around named OS mutex objects.
//! The manager holds a process-wide table keyed by lock ID; reentrant
//! acquisition only takes the underlying mutex on the 0 to 1 transition
//! and only releases it on the 1 to 0 transition. A lock group acquires
//! its members in declaration order and unwinds in reverse when any
//! member cannot be acquired.

use std::collections::HashMap;

use crate::error::{Error, LockError, Result};
use crate::model::{LockId, Resources};
use crate::platform::{Platform, SystemMutex};

struct LockEntry {
    conflict_message: String,
    count: u32,
    mutex: Box<dyn SystemMutex>,
}

/// The table of locks created during a deployment invocation.
pub(crate) struct LockManager {
    locks: HashMap<LockId, LockEntry>,
}

/// An ordered group of locks acquired and released together.
#[derive(Debug, Clone)]
pub(crate) struct LockGroup {
    members: Vec<LockId>,
}

impl LockManager {
    pub fn new() -> Self {
        LockManager {
            locks: HashMap::new(),
        }
    }

    /// Creates entries for all of the requested locks and returns them as
    /// a group. Locks that already exist in the table are reused.
    pub fn create(
        &mut self,
        resources: &Resources,
        platform: &dyn Platform,
        locks: &[LockId],
    ) -> Result<LockGroup> {
        for id in locks {
            if self.locks.contains_key(id) {
                continue;
            }

            let definition = resources.locks.get(id).ok_or_else(|| {
                Error::Resolution(format!(
                    "the requested lock ID \"{id}\" is not declared in the deployment's resources"
                ))
            })?;
            if definition.mutex.is_empty() {
                return Err(Error::Resolution(format!(
                    "the \"{id}\" lock does not identify a mutex that it locks"
                )));
            }

            let mutex_definition = resources.mutexes.get(&definition.mutex).ok_or_else(|| {
                Error::Resolution(format!(
                    "the requested mutex ID \"{}\" is not declared in the deployment's resources",
                    definition.mutex
                ))
            })?;

            let object_name = mutex_definition.object_name()?;
            let mutex = platform.create_mutex(&object_name)?;

            self.locks.insert(
                id.clone(),
                LockEntry {
                    conflict_message: definition.conflict.message.clone(),
                    count: 0,
                    mutex,
                },
            );
        }

        Ok(LockGroup {
            members: locks.to_vec(),
        })
    }

    /// Attempts to lock all members of the group in order.
    ///
    /// If any member cannot be acquired, previously acquired members are
    /// released in reverse order and a [`LockError`] naming the offender
    /// is returned.
    pub fn lock_group(&mut self, group: &LockGroup) -> Result<()> {
        for (i, id) in group.members.iter().enumerate() {
            let acquired = self.lock_one(id)?;
            if !acquired {
                for j in (0..i).rev() {
                    self.unlock_one(&group.members[j]);
                }
                let conflict_message = self
                    .locks
                    .get(id)
                    .map(|entry| entry.conflict_message.clone())
                    .unwrap_or_default();
                return Err(LockError {
                    lock: id.clone(),
                    conflict_message,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Unlocks all members of the group in reverse order.
    pub fn unlock_group(&mut self, group: &LockGroup) {
        for id in group.members.iter().rev() {
            self.unlock_one(id);
        }
    }

    /// Returns the current reference count for a lock.
    #[cfg(test)]
    pub fn count(&self, id: &LockId) -> u32 {
        self.locks.get(id).map(|entry| entry.count).unwrap_or(0)
    }

    /// Releases and closes every lock in the table.
    pub fn close_all(&mut self) {
        for (_, mut entry) in self.locks.drain() {
            if entry.count > 0 {
                let _ = entry.mutex.unlock();
            }
        }
    }

    fn lock_one(&mut self, id: &LockId) -> Result<bool> {
        let entry = self.locks.get_mut(id).ok_or_else(|| {
            Error::Resolution(format!("the \"{id}\" lock has not been created"))
        })?;
        if entry.count == 0 && !entry.mutex.try_lock()? {
            return Ok(false);
        }
        entry.count += 1;
        Ok(true)
    }

    fn unlock_one(&mut self, id: &LockId) {
        if let Some(entry) = self.locks.get_mut(id) {
            if entry.count == 0 {
                return;
            }
            entry.count -= 1;
            if entry.count == 0 {
                let _ = entry.mutex.unlock();
            }
        }
    }
}
