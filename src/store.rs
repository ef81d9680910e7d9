//! Persistence of users and checks.
//!
//! The store only records who checked what; checklists themselves are always
//! rebuilt from GitHub. [`MemoryStore`] is the only backend.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::checklist::{ChecklistRef, Checks, GitHubUser};
use crate::errors::ChecklistError;

/// Outcome of [`ChecklistStore::add_check`], observed under the write lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckWrite {
    /// The item had no checks before this write.
    pub first_check: bool,
    /// Every check of the checklist right after this write.
    pub checks: Checks,
}

pub trait ChecklistStore: Send + Sync {
    /// Insert or replace a user. Access tokens are not persisted.
    fn add_user(&self, user: &GitHubUser) -> Result<(), ChecklistError>;

    /// Look up users by id; unknown ids are omitted from the result.
    fn get_users(&self, ids: &[u64]) -> Result<HashMap<u64, GitHubUser>, ChecklistError>;

    fn get_checks(&self, clref: &ChecklistRef) -> Result<Checks, ChecklistError>;

    /// Record that `user_id` checked item `number`. Checking twice is a no-op.
    ///
    /// Concurrent writes are serialized, so exactly one of them sees the
    /// write that checks the last unchecked item.
    fn add_check(
        &self,
        clref: &ChecklistRef,
        number: u64,
        user_id: u64,
    ) -> Result<CheckWrite, ChecklistError>;

    fn remove_check(
        &self,
        clref: &ChecklistRef,
        number: u64,
        user_id: u64,
    ) -> Result<(), ChecklistError>;
}

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<u64, GitHubUser>,
    checks: HashMap<String, Checks>,
}

/// In-process store. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>, ChecklistError> {
        self.state.read().map_err(|_| ChecklistError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>, ChecklistError> {
        self.state.write().map_err(|_| ChecklistError::LockPoisoned)
    }
}

impl ChecklistStore for MemoryStore {
    fn add_user(&self, user: &GitHubUser) -> Result<(), ChecklistError> {
        self.write()?.users.insert(user.id, user.without_token());
        Ok(())
    }

    fn get_users(&self, ids: &[u64]) -> Result<HashMap<u64, GitHubUser>, ChecklistError> {
        let state = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| state.users.get(id).map(|u| (*id, u.clone())))
            .collect())
    }

    fn get_checks(&self, clref: &ChecklistRef) -> Result<Checks, ChecklistError> {
        Ok(self
            .read()?
            .checks
            .get(&clref.store_key())
            .cloned()
            .unwrap_or_default())
    }

    fn add_check(
        &self,
        clref: &ChecklistRef,
        number: u64,
        user_id: u64,
    ) -> Result<CheckWrite, ChecklistError> {
        let mut state = self.write()?;
        let checks = state.checks.entry(clref.store_key()).or_default();
        let users = checks.entry(number).or_default();
        let first_check = users.is_empty();
        if !users.contains(&user_id) {
            users.push(user_id);
        }
        Ok(CheckWrite {
            first_check,
            checks: checks.clone(),
        })
    }

    fn remove_check(
        &self,
        clref: &ChecklistRef,
        number: u64,
        user_id: u64,
    ) -> Result<(), ChecklistError> {
        let mut state = self.write()?;
        if let Some(checks) = state.checks.get_mut(&clref.store_key())
            && let Some(users) = checks.get_mut(&number)
        {
            users.retain(|id| *id != user_id);
            if users.is_empty() {
                checks.remove(&number);
            }
        }
        Ok(())
    }
}
