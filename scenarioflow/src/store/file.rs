//! JSON file checkpoints and timestamped session directories.

use super::StateStore;
use crate::errors::{Result, ScenarioError};
use crate::session::{BackoffStrategy, JitterStrategy, RetryConfig, RetryState};
use chrono::Local;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{self, ErrorKind};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name used for the checkpoint inside a session directory.
pub const STATE_FILE_NAME: &str = "state.json";

/// Stores state as pretty-printed JSON in a single file.
///
/// Writes go to a sibling temporary file that is then renamed over the
/// target, so a crash mid-write leaves the previous checkpoint intact. A
/// file that exists but does not parse is reported as an error instead of
/// being treated as a fresh start.
///
/// I/O errors other than a missing file are retried with backoff before
/// they are reported. Synced folders fail transiently while a file is
/// being uploaded.
#[derive(Debug, Clone)]
pub struct JsonFileStateStore<S> {
    path: PathBuf,
    retry: RetryConfig,
    _state: PhantomData<fn() -> S>,
}

fn default_io_retry() -> RetryConfig {
    RetryConfig::new()
        .with_max_attempts(3)
        .with_base_delay_ms(500)
        .with_backoff(BackoffStrategy::Exponential)
        .with_jitter(JitterStrategy::None)
}

impl<S> JsonFileStateStore<S> {
    /// Creates a store writing to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            retry: default_io_retry(),
            _state: PhantomData,
        }
    }

    /// Sets how transient I/O errors are retried.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Creates a store writing `state.json` inside `session_dir`.
    #[must_use]
    pub fn in_session_dir(session_dir: impl AsRef<Path>) -> Self {
        Self::new(session_dir.as_ref().join(STATE_FILE_NAME))
    }

    /// The checkpoint path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(ToOwned::to_owned)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn retry_io<T>(
        &self,
        operation: &str,
        mut op: impl FnMut() -> io::Result<T>,
    ) -> io::Result<T> {
        let mut state = RetryState::new();
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.kind() == ErrorKind::NotFound => return Err(e),
                Err(e) => {
                    if !state.record_failure(&self.retry) {
                        return Err(e);
                    }
                    let delay = state.calculate_delay(&self.retry);
                    warn!(
                        path = %self.path.display(),
                        operation,
                        attempt = state.attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "I/O error on checkpoint, retrying"
                    );
                    std::thread::sleep(delay);
                }
            }
        }
    }
}

impl<S> StateStore<S> for JsonFileStateStore<S>
where
    S: Serialize + DeserializeOwned,
{
    fn load(&self) -> Result<Option<S>> {
        let raw = match self.retry_io("read", || fs::read_to_string(&self.path)) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let state = serde_json::from_str(&raw).map_err(|e| {
            ScenarioError::store(format!(
                "state file {} is not valid: {e}",
                self.path.display()
            ))
        })?;
        debug!(path = %self.path.display(), "Loaded checkpoint");
        Ok(Some(state))
    }

    fn save(&self, state: &S) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(state)?;
        let temp = self.temp_path();
        self.retry_io("write", || {
            fs::write(&temp, &json)?;
            fs::rename(&temp, &self.path)
        })?;
        debug!(path = %self.path.display(), "Saved checkpoint");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Creates `<base>/<prefix>_<YYYYmmdd_HHMMSS>` and returns its path.
///
/// A second session started within the same second gets a `_NN` suffix
/// instead of sharing the directory.
pub fn create_session_dir(base: impl AsRef<Path>, prefix: &str) -> Result<PathBuf> {
    let base = base.as_ref();
    fs::create_dir_all(base)?;

    let stem = format!("{prefix}_{}", Local::now().format("%Y%m%d_%H%M%S"));
    let mut dir = base.join(&stem);
    let mut suffix = 0u32;
    loop {
        match fs::create_dir(&dir) {
            Ok(()) => return Ok(dir),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                suffix += 1;
                dir = base.join(format!("{stem}_{suffix:02}"));
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Returns the most recent `<prefix>_*` directory under `base`, if any.
///
/// Timestamps sort lexicographically, so the greatest name wins.
pub fn find_latest_session(base: impl AsRef<Path>, prefix: &str) -> Result<Option<PathBuf>> {
    let entries = match fs::read_dir(base.as_ref()) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let marker = format!("{prefix}_");
    let mut latest: Option<(String, PathBuf)> = None;
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with(&marker) {
            continue;
        }
        if latest.as_ref().map_or(true, |(best, _)| name > *best) {
            latest = Some((name, entry.path()));
        }
    }
    Ok(latest.map(|(_, path)| path))
}
