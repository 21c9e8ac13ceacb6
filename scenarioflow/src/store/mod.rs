//! Checkpoint storage for pipeline state.
//!
//! The executors never know where state lives. They are handed a
//! [`StateStore`] and call [`StateStore::save`] after every completed
//! operation; resuming is a [`StateStore::load`] followed by a normal run.

mod file;

pub use file::{create_session_dir, find_latest_session, JsonFileStateStore, STATE_FILE_NAME};

use crate::errors::Result;
use parking_lot::Mutex;
use std::fmt;

/// Synchronous checkpoint capability.
pub trait StateStore<S>: Send + Sync {
    /// Returns the last saved state, or `None` if nothing was saved yet.
    fn load(&self) -> Result<Option<S>>;

    /// Persists the full state.
    fn save(&self, state: &S) -> Result<()>;

    /// Removes any saved state.
    fn clear(&self) -> Result<()>;
}

/// A store that keeps the latest checkpoint in memory.
#[derive(Debug)]
pub struct MemoryStateStore<S> {
    state: Mutex<Option<S>>,
    saves: Mutex<usize>,
}

impl<S> Default for MemoryStateStore<S> {
    fn default() -> Self {
        Self {
            state: Mutex::new(None),
            saves: Mutex::new(0),
        }
    }
}

impl<S: Clone> MemoryStateStore<S> {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `state`.
    #[must_use]
    pub fn with_state(state: S) -> Self {
        Self {
            state: Mutex::new(Some(state)),
            saves: Mutex::new(0),
        }
    }

    /// Returns a copy of the current checkpoint.
    #[must_use]
    pub fn snapshot(&self) -> Option<S> {
        self.state.lock().clone()
    }

    /// Number of times [`StateStore::save`] has been called.
    #[must_use]
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

impl<S: Clone + Send> StateStore<S> for MemoryStateStore<S> {
    fn load(&self) -> Result<Option<S>> {
        Ok(self.state.lock().clone())
    }

    fn save(&self, state: &S) -> Result<()> {
        *self.state.lock() = Some(state.clone());
        *self.saves.lock() += 1;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.state.lock() = None;
        Ok(())
    }
}

type SaveFn<S> = Box<dyn Fn(&S) -> Result<()> + Send + Sync>;

/// Adapts a plain save callback (e.g. writing to a key-value store) into a
/// [`StateStore`]. Loading always yields nothing; the caller supplies the
/// resumed state directly.
pub struct FnStateStore<S> {
    save: SaveFn<S>,
}

impl<S> FnStateStore<S> {
    /// Wraps `save`.
    pub fn new<F>(save: F) -> Self
    where
        F: Fn(&S) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            save: Box::new(save),
        }
    }
}

impl<S> fmt::Debug for FnStateStore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStateStore").finish_non_exhaustive()
    }
}

impl<S> StateStore<S> for FnStateStore<S> {
    fn load(&self) -> Result<Option<S>> {
        Ok(None)
    }

    fn save(&self, state: &S) -> Result<()> {
        (self.save)(state)
    }

    fn clear(&self) -> Result<()> {
        Ok(())
    }
}
