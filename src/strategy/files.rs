// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! Working file names for the executable strategy

use rand::Rng;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{TetraError, TetraResult};
use crate::hypothesis::Hypothesis;

/// Base name prefix of every working file.
pub const FILE_PREFIX: &str = "MG_Tetra";

const MAX_ATTEMPTS: usize = 16;

/// Input, size map, output and log files of one run, sharing one base name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingFiles {
    base: PathBuf,
    keep_files: bool,
    remove_log_on_success: bool,
}

impl WorkingFiles {
    /// `<workdir>/MG_Tetra_<pid>_<token>`, unique per process and call.
    ///
    /// The base is reserved by creating its log file; a token whose files
    /// already exist is drawn again.
    pub fn unique(hyp: &Hypothesis) -> TetraResult<Self> {
        let mut rng = rand::thread_rng();
        Self::reserve(hyp, || rng.gen())
    }

    fn reserve(hyp: &Hypothesis, mut token: impl FnMut() -> u32) -> TetraResult<Self> {
        for _ in 0..MAX_ATTEMPTS {
            let name = format!("{}_{}_{:08x}", FILE_PREFIX, std::process::id(), token());
            let files = Self::with_base(hyp.working_directory.join(name), hyp);
            if [files.input_mesh(), files.size_map(), files.output_mesh()]
                .iter()
                .any(|path| path.exists())
            {
                continue;
            }
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(files.log_file())
            {
                Ok(_) => return Ok(files),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(TetraError::Hypothesis(format!(
            "no free working file name in {}",
            hyp.working_directory.display()
        )))
    }

    pub fn with_base(base: impl Into<PathBuf>, hyp: &Hypothesis) -> Self {
        Self {
            base: base.into(),
            keep_files: hyp.keep_files,
            remove_log_on_success: hyp.remove_log_on_success,
        }
    }

    fn with_suffix(&self, suffix: &str) -> PathBuf {
        let mut name = self.base.clone().into_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn input_mesh(&self) -> PathBuf {
        self.with_suffix(".mesh")
    }

    pub fn size_map(&self) -> PathBuf {
        self.with_suffix(".sol")
    }

    pub fn output_mesh(&self) -> PathBuf {
        self.with_suffix("_out.meshb")
    }

    pub fn log_file(&self) -> PathBuf {
        self.with_suffix(".log")
    }

    /// Remove the working files after a run.
    ///
    /// Nothing is removed with `keep_files`. The log survives failures, and
    /// successes too unless `remove_log_on_success` is set.
    pub fn cleanup(&self, success: bool) {
        if self.keep_files {
            debug!("keeping working files {}*", self.base.display());
            return;
        }
        let mut doomed = vec![self.input_mesh(), self.size_map(), self.output_mesh()];
        if success && self.remove_log_on_success {
            doomed.push(self.log_file());
        }
        remove_all(doomed);
    }

    /// Remove every file of a cancelled run, log included, unless `keep_files`.
    pub fn discard(&self) {
        if !self.keep_files {
            remove_all(vec![
                self.input_mesh(),
                self.size_map(),
                self.output_mesh(),
                self.log_file(),
            ]);
        }
    }
}

fn remove_all(paths: Vec<PathBuf>) {
    for path in paths {
        if !path.exists() {
            continue;
        }
        if let Err(e) = std::fs::remove_file(&path) {
            warn!("cannot remove {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn hypothesis(dir: &Path) -> Hypothesis {
        Hypothesis {
            working_directory: dir.to_path_buf(),
            ..Hypothesis::default()
        }
    }

    #[test]
    fn test_names_share_base() {
        let dir = TempDir::new().unwrap();
        let files = WorkingFiles::unique(&hypothesis(dir.path())).unwrap();
        let base = files.base().to_string_lossy().to_string();
        assert!(base.contains(&format!("{}_{}_", FILE_PREFIX, std::process::id())));
        assert_eq!(files.input_mesh().to_string_lossy(), format!("{}.mesh", base));
        assert_eq!(files.output_mesh().to_string_lossy(), format!("{}_out.meshb", base));
        assert_eq!(files.log_file().to_string_lossy(), format!("{}.log", base));
        assert_ne!(files, WorkingFiles::unique(&hypothesis(dir.path())).unwrap());
    }

    #[test]
    fn test_taken_names_are_skipped() {
        let dir = TempDir::new().unwrap();
        let hyp = hypothesis(dir.path());
        let taken = WorkingFiles::reserve(&hyp, || 1).unwrap();
        assert!(taken.log_file().exists());

        let mut tokens = [1, 1, 2].into_iter();
        let files = WorkingFiles::reserve(&hyp, || tokens.next().unwrap_or(3)).unwrap();
        assert_ne!(files, taken);
        assert!(files.base().to_string_lossy().ends_with("_00000002"));

        std::fs::write(files.input_mesh(), "x").unwrap();
        assert!(WorkingFiles::reserve(&hyp, || 2).is_err());
    }

    #[test]
    fn test_cleanup_policy() {
        let dir = TempDir::new().unwrap();
        let files = WorkingFiles::unique(&hypothesis(dir.path())).unwrap();
        for path in [files.input_mesh(), files.output_mesh(), files.log_file()] {
            std::fs::write(path, "x").unwrap();
        }

        files.cleanup(false);
        assert!(!files.input_mesh().exists());
        assert!(files.log_file().exists());

        files.cleanup(true);
        assert!(!files.log_file().exists());
    }

    #[test]
    fn test_keep_files() {
        let dir = TempDir::new().unwrap();
        let mut hyp = hypothesis(dir.path());
        hyp.keep_files = true;
        let files = WorkingFiles::unique(&hyp).unwrap();
        std::fs::write(files.input_mesh(), "x").unwrap();
        files.cleanup(true);
        assert!(files.input_mesh().exists());
    }
}
