#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Staging one student's files next to the grading harness and running it.
//!
//! Every run starts from an empty scratch directory: the grading support
//! files are copied in, then each submission under its canonical name.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use glob::{Pattern, glob};

use crate::{
    config::ProblemConfig,
    error::{ConfigError, HarnessError},
    process,
};

/// Flag passed to the harness after its file name.
const HARNESS_FLAG: &str = "-v";

/// Exit status and error stream of a harness run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessOutcome {
    /// Exit code, absent if the harness was killed by a signal.
    pub exit_code: Option<i32>,
    /// Captured stderr, decoded lossily.
    pub stderr:    String,
}

impl HarnessOutcome {
    /// Whether the harness exited with status 0.
    pub fn passed(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs the harness of one problem against staged submissions.
#[derive(Debug, Clone)]
pub struct Harness {
    /// Resolved interpreter executable.
    interpreter:     PathBuf,
    /// Directory holding the harness and its support files.
    grading_dir:     PathBuf,
    /// Harness file name.
    harness:         String,
    /// Canonical name of each file-group.
    canonical_names: Vec<String>,
    /// Directory reset before every run.
    scratch_dir:     PathBuf,
    /// Wall-clock limit per run.
    timeout:         Duration,
}

impl Harness {
    /// Checks that the interpreter and harness exist and prepares a runner.
    pub fn new(problem: &ProblemConfig) -> Result<Self, ConfigError> {
        let interpreter =
            which::which(problem.interpreter()).map_err(|e| ConfigError::InvalidValue {
                key:    "interpreter".into(),
                reason: format!("{}: {e}", problem.interpreter()),
            })?;

        let harness_path = problem.grading_dir().join(problem.harness());
        if !harness_path.is_file() {
            return Err(ConfigError::InvalidValue {
                key:    "test".into(),
                reason: format!("no harness at {}", harness_path.display()),
            });
        }

        Ok(Self {
            interpreter,
            grading_dir: problem.grading_dir().to_path_buf(),
            harness: problem.harness().to_string(),
            canonical_names: problem.canonical_names().to_vec(),
            scratch_dir: problem.scratch_dir().to_path_buf(),
            timeout: problem.timeout(),
        })
    }

    /// Scratch directory used for runs.
    #[cfg(test)]
    fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Removes and recreates the scratch directory.
    pub fn reset_scratch(&self) -> Result<(), HarnessError> {
        if self.scratch_dir.exists() {
            std::fs::remove_dir_all(&self.scratch_dir).map_err(|source| HarnessError::Staging {
                path: self.scratch_dir.clone(),
                source,
            })?;
        }
        std::fs::create_dir_all(&self.scratch_dir).map_err(|source| HarnessError::Staging {
            path: self.scratch_dir.clone(),
            source,
        })
    }

    /// Files under the grading directory, relative to it.
    fn support_files(&self) -> Result<Vec<PathBuf>, HarnessError> {
        let pattern = format!(
            "{}/**/*",
            Pattern::escape(self.grading_dir.to_string_lossy().as_ref())
        );

        let entries = glob(&pattern)
            .with_context(|| format!("Could not list support files with {pattern}"))?;
        Ok(entries
            .filter_map(Result::ok)
            .filter(|path| path.is_file() && !path.starts_with(&self.scratch_dir))
            .filter_map(|path| path.strip_prefix(&self.grading_dir).ok().map(Path::to_path_buf))
            .collect())
    }

    /// Copies `from` to `to`, creating parent directories.
    fn copy(from: &Path, to: &Path) -> Result<(), HarnessError> {
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent).map_err(|source| HarnessError::Staging {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::copy(from, to).map_err(|source| HarnessError::Staging {
            path: from.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    /// Resets scratch and copies support files plus `submissions`, the
    /// latter renamed to their canonical names.
    pub fn stage(&self, submissions: &[PathBuf]) -> Result<(), HarnessError> {
        self.reset_scratch()?;

        for relative in self.support_files()? {
            Self::copy(&self.grading_dir.join(&relative), &self.scratch_dir.join(&relative))?;
        }

        for (submission, canonical) in submissions.iter().zip(&self.canonical_names) {
            tracing::debug!("Staging {} as {canonical}", submission.display());
            Self::copy(submission, &self.scratch_dir.join(canonical))?;
        }

        Ok(())
    }

    /// Stages `submissions` and runs the harness on them.
    pub async fn run(&self, submissions: &[PathBuf]) -> Result<HarnessOutcome, HarnessError> {
        self.stage(submissions)?;

        let args = [OsString::from(&self.harness), OsString::from(HARNESS_FLAG)];
        let collected =
            process::run_collect(&self.interpreter, &args, &self.scratch_dir, self.timeout).await?;

        Ok(HarnessOutcome {
            exit_code: collected.status.code(),
            stderr:    String::from_utf8_lossy(&collected.stderr).to_string(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::fs;

    use uuid::Uuid;

    use super::*;

    fn temp_root() -> PathBuf {
        let root = std::env::temp_dir().join(format!("classgrade-harness-{}", Uuid::new_v4()));
        fs::create_dir_all(root.join("hw/data")).expect("create layout");
        fs::write(
            root.join("hw/test_hw.sh"),
            "echo \"flag $1\" >&2\ncat q1.py >&2\ntest -f data/input.txt\n",
        )
        .expect("write harness");
        fs::write(root.join("hw/data/input.txt"), "42\n").expect("write support file");
        fs::write(root.join("ann_q1.py"), "ann\n").expect("write submission");
        fs::write(root.join("bob_q1.py"), "bob\n").expect("write submission");
        root
    }

    fn problem(root: &Path) -> ProblemConfig {
        ProblemConfig::builder()
            .name("hw")
            .patterns(vec!["*_q1.py".into()])
            .canonical_names(vec!["q1.py".into()])
            .grading_dir(root.join("hw"))
            .harness("test_hw.sh")
            .units(vec!["f".into()])
            .interpreter("sh")
            .scratch_dir(root.join(".scratch"))
            .build()
    }

    #[test]
    fn missing_harness_is_a_config_error() {
        let root = temp_root();
        let problem = ProblemConfig::builder()
            .name("hw")
            .patterns(vec!["*_q1.py".into()])
            .canonical_names(vec!["q1.py".into()])
            .grading_dir(root.join("hw"))
            .harness("test_missing.sh")
            .units(vec!["f".into()])
            .interpreter("sh")
            .build();
        let err = Harness::new(&problem).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "test"));
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn staging_resets_scratch_between_students() {
        let root = temp_root();
        let harness = Harness::new(&problem(&root)).expect("harness");

        harness.stage(&[root.join("ann_q1.py")]).expect("stage ann");
        fs::write(harness.scratch_dir().join("leftover.txt"), "residue").expect("write residue");
        harness.stage(&[root.join("bob_q1.py")]).expect("stage bob");

        let scratch = harness.scratch_dir();
        assert!(!scratch.join("leftover.txt").exists());
        assert_eq!(fs::read_to_string(scratch.join("q1.py")).unwrap(), "bob\n");
        assert!(scratch.join("test_hw.sh").is_file());
        assert_eq!(fs::read_to_string(scratch.join("data/input.txt")).unwrap(), "42\n");
        let _ = fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn run_reports_exit_code_and_stderr() {
        let root = temp_root();
        let harness = Harness::new(&problem(&root)).expect("harness");

        let outcome = harness.run(&[root.join("ann_q1.py")]).await.expect("run");
        assert!(outcome.passed());
        assert_eq!(outcome.stderr, "flag -v\nann\n");
        let _ = fs::remove_dir_all(root);
    }
}
