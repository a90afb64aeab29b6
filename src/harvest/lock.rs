use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const RUN_LOCK_FILE: &str = "harvest.lock";

/// Exclusive lock over the local PDF workspace, held for the whole run.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    pub fn acquire(logs_dir: &Path) -> Result<Self> {
        fs::create_dir_all(logs_dir)
            .with_context(|| format!("failed to create {}", logs_dir.display()))?;
        let path = logs_dir.join(RUN_LOCK_FILE);
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        if file.try_lock_exclusive().is_err() {
            let holder = fs::read_to_string(&path).unwrap_or_default();
            anyhow::bail!(
                "another harvest run holds {} (pid {})",
                path.display(),
                holder.trim()
            );
        }
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_acquire_fails_while_held() {
        let tmp = tempdir().expect("tempdir");
        let first = RunLock::acquire(tmp.path()).expect("first lock");
        assert!(first.path().exists());

        let err = RunLock::acquire(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("another harvest run"));

        drop(first);
        assert!(!tmp.path().join(RUN_LOCK_FILE).exists());
        RunLock::acquire(tmp.path()).expect("lock after release");
    }

    #[test]
    fn reacquired_lock_owns_a_fresh_file() {
        let tmp = tempdir().expect("tempdir");
        drop(RunLock::acquire(tmp.path()).expect("first lock"));

        let second = RunLock::acquire(tmp.path()).expect("second lock");
        let pid = fs::read_to_string(second.path()).expect("read lock");
        assert_eq!(pid.trim(), std::process::id().to_string());
        assert!(RunLock::acquire(tmp.path()).is_err());
    }
}
