//! Ephemeral per-build working directories.

use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// The on-disk directory a build clones into and builds from. Uniquely
/// named by build id; removed on every exit path.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Computes the workspace path for a build without touching the disk.
    pub fn path_for(build_root: &Path, build_id: &str) -> PathBuf {
        build_root.join(build_id)
    }

    /// Prepares a fresh workspace location. A leftover directory from an
    /// earlier crashed run of the same build id is removed first; the
    /// directory itself is created by the cloner.
    pub fn prepare(build_root: &Path, build_id: &str) -> io::Result<Self> {
        let root = Self::path_for(build_root, build_id);
        if root.exists() {
            std::fs::remove_dir_all(&root)?;
        }
        std::fs::create_dir_all(build_root)?;
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Total size in bytes of every regular file under the workspace.
    pub fn size_bytes(&self) -> u64 {
        WalkDir::new(&self.root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| entry.metadata().ok())
            .map(|meta| meta.len())
            .sum()
    }

    /// Removes the workspace. Failures are logged, never escalated.
    pub fn remove(&self) {
        if !self.root.exists() {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.root) {
            warn!(path = %self.root.display(), error = %e, "failed to remove workspace");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn path_is_unique_per_build() {
        let base = Path::new("/tmp/builds");
        assert_eq!(Workspace::path_for(base, "b1"), PathBuf::from("/tmp/builds/b1"));
        assert_ne!(Workspace::path_for(base, "b1"), Workspace::path_for(base, "b2"));
    }

    #[test]
    fn prepare_clears_stale_directory() {
        let base = TempDir::new().unwrap();
        let stale = base.path().join("b1");
        std::fs::create_dir_all(stale.join("old")).unwrap();
        std::fs::write(stale.join("old/file.txt"), "stale").unwrap();

        let ws = Workspace::prepare(base.path(), "b1").unwrap();
        assert!(!ws.path().exists());
    }

    #[test]
    fn size_sums_regular_files() {
        let base = TempDir::new().unwrap();
        let ws = Workspace::prepare(base.path(), "b1").unwrap();
        std::fs::create_dir_all(ws.path().join("sub")).unwrap();
        std::fs::write(ws.path().join("a.txt"), vec![0u8; 100]).unwrap();
        std::fs::write(ws.path().join("sub/b.txt"), vec![0u8; 28]).unwrap();

        assert_eq!(ws.size_bytes(), 128);
    }

    #[test]
    fn remove_is_idempotent() {
        let base = TempDir::new().unwrap();
        let ws = Workspace::prepare(base.path(), "b1").unwrap();
        std::fs::create_dir_all(ws.path()).unwrap();
        ws.remove();
        assert!(!ws.path().exists());
        ws.remove();
    }
}
