#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Finding the submitted files of one file-group and naming their owners.

use std::path::{Path, PathBuf};

use anyhow::Result;
use glob::{Pattern, glob};

use crate::{
    error::{ConfigError, NameError, NoMatchError},
    join::Column,
    roster::{NameResolver, crush},
};

/// Derives the raw student key from a submission file name: everything
/// before the first `_`, crushed like roster names are.
pub fn student_key(path: &Path) -> Result<String, NameError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let prefix = file_name.split('_').next().unwrap_or_default();
    let key = crush(prefix);
    if key.is_empty() {
        Err(NameError::Underivable(file_name))
    } else {
        Ok(key)
    }
}

/// A submission that could not be matched to a student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolved {
    /// The submitted file.
    pub path:  PathBuf,
    /// Why it could not be matched.
    pub error: NameError,
}

/// The files of one file-group, matched and unmatched.
#[derive(Debug, Clone)]
pub struct Gathered {
    /// Matched files keyed by student display name.
    pub column:     Column<PathBuf>,
    /// Files that were left out because their owner is unknown.
    pub unresolved: Vec<Unresolved>,
}

/// Globs `pattern` inside `dir` and resolves every file's owner.
///
/// Fails if the pattern matches no files at all or if two files resolve
/// to the same student.
pub fn gather(dir: &Path, pattern: &str, resolver: &dyn NameResolver) -> Result<Gathered> {
    let full_pattern = format!("{}/{}", Pattern::escape(dir.to_string_lossy().as_ref()), pattern);
    let paths = glob(&full_pattern).map_err(|e| ConfigError::InvalidValue {
        key:    "glob".into(),
        reason: format!("{pattern:?}: {e}"),
    })?;

    let mut files: Vec<PathBuf> = paths.filter_map(Result::ok).filter(|p| p.is_file()).collect();
    if files.is_empty() {
        return Err(NoMatchError::Pattern {
            pattern: full_pattern,
        }
        .into());
    }
    files.sort();

    let mut entries = Vec::with_capacity(files.len());
    let mut unresolved = Vec::new();
    for path in files {
        match student_key(&path).and_then(|key| resolver.resolve(&key)) {
            Ok(student) => entries.push((student, path)),
            Err(error) => {
                tracing::warn!("Skipping {}: {error}", path.display());
                unresolved.push(Unresolved { path, error });
            }
        }
    }

    let column = Column::new(entries).map_err(|dup| ConfigError::DuplicateStudent {
        student: dup.key,
        first:   dup.first.display().to_string(),
        second:  dup.second.display().to_string(),
    })?;

    tracing::debug!("{full_pattern} matched {} students", column.len());
    Ok(Gathered { column, unresolved })
}
