use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::CleanupPolicy;
use crate::error::SrefError;
use crate::plan::FetchTask;

/// Answers whether a task's converted output is already on disk.
pub trait CompletionLedger {
    fn is_complete(&self, task: &FetchTask) -> bool;
}

/// The directory raw downloads and converted outputs are written to.
///
/// Only one run may use a workspace at a time; nothing here guards against
/// two runs racing on the same filenames.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: Utf8PathBuf,
}

impl Workspace {
    pub fn current_dir() -> Result<Self, SrefError> {
        let cwd = std::env::current_dir().map_err(|err| SrefError::Filesystem(err.to_string()))?;
        let root = Utf8PathBuf::from_path_buf(cwd)
            .map_err(|_| SrefError::Filesystem("non-utf8 working directory".to_string()))?;
        Ok(Self { root })
    }

    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn ensure_root(&self) -> Result<(), SrefError> {
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| SrefError::Filesystem(err.to_string()))
    }

    pub fn raw_path(&self, task: &FetchTask) -> Utf8PathBuf {
        self.root.join(&task.raw_filename)
    }

    pub fn converted_path(&self, task: &FetchTask) -> Utf8PathBuf {
        self.root.join(&task.converted_filename)
    }

    /// Deletes the files `policy` selects among those `tasks` would produce.
    /// Returns the paths actually removed.
    pub fn cleanup(
        &self,
        tasks: &[FetchTask],
        policy: CleanupPolicy,
    ) -> Result<Vec<Utf8PathBuf>, SrefError> {
        let mut removed = Vec::new();
        for task in tasks {
            let targets = match policy {
                CleanupPolicy::None => vec![],
                CleanupPolicy::Converted => vec![self.converted_path(task)],
                CleanupPolicy::All => vec![self.converted_path(task), self.raw_path(task)],
            };
            for path in targets {
                if remove_if_present(&path)? {
                    removed.push(path);
                }
            }
        }
        Ok(removed)
    }
}

impl CompletionLedger for Workspace {
    fn is_complete(&self, task: &FetchTask) -> bool {
        self.converted_path(task).as_std_path().exists()
    }
}

fn remove_if_present(path: &Utf8Path) -> Result<bool, SrefError> {
    match fs::remove_file(path.as_std_path()) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(SrefError::Filesystem(format!("remove {path}: {err}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RunParameters;
    use crate::plan::plan;

    fn workspace() -> (tempfile::TempDir, Workspace) {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        (temp, Workspace::new(root))
    }

    #[test]
    fn layout_paths() {
        let (_temp, ws) = workspace();
        let tasks = plan(&RunParameters::default()).unwrap();
        assert!(ws.raw_path(&tasks[0]).ends_with("sref_arw_ctl.grb2"));
        assert!(ws.converted_path(&tasks[0]).ends_with("sref_arw_ctl.nc"));
    }

    #[test]
    fn cleanup_is_scoped_to_planned_files() {
        let (_temp, ws) = workspace();
        let tasks = plan(&RunParameters::default()).unwrap();
        let first = &tasks[0];
        fs::write(ws.raw_path(first).as_std_path(), b"grib").unwrap();
        fs::write(ws.converted_path(first).as_std_path(), b"nc").unwrap();
        let unrelated = ws.root().join("notes.nc");
        fs::write(unrelated.as_std_path(), b"keep").unwrap();

        let removed = ws.cleanup(&tasks, CleanupPolicy::Converted).unwrap();
        assert_eq!(removed, vec![ws.converted_path(first)]);
        assert!(ws.raw_path(first).as_std_path().exists());
        assert!(unrelated.as_std_path().exists());

        let removed = ws.cleanup(&tasks, CleanupPolicy::All).unwrap();
        assert_eq!(removed, vec![ws.raw_path(first)]);
        assert!(unrelated.as_std_path().exists());
    }

    #[test]
    fn cleanup_none_keeps_everything() {
        let (_temp, ws) = workspace();
        let tasks = plan(&RunParameters::default()).unwrap();
        fs::write(ws.converted_path(&tasks[3]).as_std_path(), b"nc").unwrap();
        assert!(ws.cleanup(&tasks, CleanupPolicy::None).unwrap().is_empty());
        assert!(ws.is_complete(&tasks[3]));
        assert!(!ws.is_complete(&tasks[4]));
    }
}
