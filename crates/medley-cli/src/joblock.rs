//! Per-job advisory file locks for batch jobs.
//!
//! The engine leaves mutual exclusion between two runs of the same batch
//! job (achievements, rarity, rebuild) to its caller. The CLI is that
//! caller: before a job runs it takes an exclusive `fs2` lock on
//! `<db>.<job>.lock`, waits a bounded interval for a holder to finish,
//! and fails fast on timeout. Different jobs use different lock files and
//! never block each other.

use fs2::FileExt;
use std::{
    fs::{File, OpenOptions},
    io,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

/// How long a job waits for a running instance of itself before giving up.
pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(10);

/// Errors acquiring a job lock.
#[derive(Debug)]
pub enum LockError {
    /// Another run of the job held the lock for the whole wait.
    Timeout { path: PathBuf, waited: Duration },
    /// The lock file could not be created or opened.
    Io(io::Error),
}

impl From<io::Error> for LockError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl std::fmt::Display for LockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout { path, waited } => write!(
                f,
                "another run holds {} (waited {waited:?}); retry after it finishes",
                path.display()
            ),
            Self::Io(err) => write!(f, "job lock: {err}"),
        }
    }
}

impl std::error::Error for LockError {}

/// RAII guard for one named batch job. Released on drop.
#[derive(Debug)]
pub struct JobLock {
    file: File,
    path: PathBuf,
}

impl JobLock {
    /// Acquire the exclusive lock for `job`, polling until `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Timeout`] when a concurrent run holds the lock
    /// past the deadline, or [`LockError::Io`] on filesystem failure.
    pub fn acquire(db_path: &Path, job: &str, timeout: Duration) -> Result<Self, LockError> {
        let path = lock_path(db_path, job);
        let start = Instant::now();
        loop {
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(&path)?;

            if file.try_lock_exclusive().is_ok() {
                return Ok(Self { file, path });
            }

            if start.elapsed() >= timeout {
                return Err(LockError::Timeout {
                    path,
                    waited: start.elapsed(),
                });
            }

            thread::sleep(Duration::from_millis(10));
        }
    }

    /// The lock file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for JobLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn lock_path(db_path: &Path, job: &str) -> PathBuf {
    PathBuf::from(format!("{}.{job}.lock", db_path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn db_path(dir: &TempDir) -> PathBuf {
        dir.path().join("medley.db")
    }

    #[test]
    fn lock_acquires_and_names_the_file_after_the_job() {
        let dir = TempDir::new().expect("temp dir");
        let lock =
            JobLock::acquire(&db_path(&dir), "achievements", Duration::from_millis(50))
                .expect("acquire");
        assert!(
            lock.path()
                .to_string_lossy()
                .ends_with("medley.db.achievements.lock")
        );
    }

    #[test]
    fn same_job_times_out_while_held() {
        let dir = TempDir::new().expect("temp dir");
        let _held = JobLock::acquire(&db_path(&dir), "rarity", Duration::from_millis(50))
            .expect("acquire");

        let err = JobLock::acquire(&db_path(&dir), "rarity", Duration::from_millis(20))
            .expect_err("second acquire must time out");
        assert!(matches!(err, LockError::Timeout { .. }));
    }

    #[test]
    fn different_jobs_do_not_contend() {
        let dir = TempDir::new().expect("temp dir");
        let _achievements =
            JobLock::acquire(&db_path(&dir), "achievements", Duration::from_millis(50))
                .expect("acquire");
        let _rebuild = JobLock::acquire(&db_path(&dir), "rebuild", Duration::from_millis(50))
            .expect("independent job must acquire");
    }

    #[test]
    fn drop_releases_for_the_next_run() {
        let dir = TempDir::new().expect("temp dir");
        {
            let _first = JobLock::acquire(&db_path(&dir), "rebuild", Duration::from_millis(50))
                .expect("acquire");
        }
        let _second = JobLock::acquire(&db_path(&dir), "rebuild", Duration::from_millis(50))
            .expect("reacquire after drop");
    }
}
