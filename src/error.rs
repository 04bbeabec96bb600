#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Error kinds raised while setting up and running a grading batch.
//!
//! Only [`ConfigError`] and [`NoMatchError`] stop a run; every other kind
//! is reported against one student or one file and the batch moves on.

use std::path::PathBuf;

use thiserror::Error;

/// Exit status used when the configuration is missing or malformed.
pub const CONFIG_EXIT_STATUS: u8 = 8;

/// Exit status used when nothing is left to grade.
pub const NO_MATCH_EXIT_STATUS: u8 = 9;

/// Exit status for any other failure.
pub const FAILURE_EXIT_STATUS: u8 = 1;

/// Problems with the settings file or with how it describes the problem.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The settings file could not be read.
    #[error("Could not read settings file {path}: {source}")]
    Unreadable {
        /// Path that was read.
        path:   PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// A line of the settings file is not valid INI.
    #[error("Malformed line {line} in settings file: {text:?}")]
    Malformed {
        /// 1-based line number.
        line: usize,
        /// Offending text.
        text: String,
    },

    /// The selected problem has no section of its own.
    #[error("No section [{0}] in settings file")]
    MissingSection(String),

    /// A required key is absent.
    #[error("Missing entry '{key}' in section [{section}]")]
    MissingKey {
        /// Section that was searched (after DEFAULT inheritance).
        section: String,
        /// Name of the missing key.
        key:     String,
    },

    /// A key is present but its value cannot be used.
    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue {
        /// Name of the key.
        key:    String,
        /// Why the value was rejected.
        reason: String,
    },

    /// Two submissions in one file-group resolved to the same student.
    #[error("Submissions {first} and {second} both belong to {student}")]
    DuplicateStudent {
        /// Resolved student key.
        student: String,
        /// First file seen for that student.
        first:   String,
        /// Second file seen for that student.
        second:  String,
    },

    /// The roster could not be turned into a lookup table.
    #[error(transparent)]
    Roster(#[from] RosterError),
}

/// Nothing was left to grade after globbing or range filtering.
#[derive(Error, Debug)]
pub enum NoMatchError {
    /// A submission pattern matched no files.
    #[error("No submissions match {pattern}")]
    Pattern {
        /// Full glob pattern that was tried.
        pattern: String,
    },

    /// The range filter excluded every student.
    #[error("No students in range {from}..{to}")]
    EmptyRange {
        /// Lower bound as given.
        from: String,
        /// Upper bound as given.
        to:   String,
    },

    /// The range bounds are in the wrong order.
    #[error("Range start {from:?} sorts after range end {to:?}")]
    InvertedRange {
        /// Lower bound as given.
        from: String,
        /// Upper bound as given.
        to:   String,
    },
}

/// Failures while reading the class roster.
#[derive(Error, Debug)]
pub enum RosterError {
    /// The roster file could not be read.
    #[error("Could not read roster {path}: {source}")]
    Unreadable {
        /// Path of the roster.
        path:   PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// A roster line is not valid CSV.
    #[error("Malformed roster line {line}: {text:?}")]
    Malformed {
        /// 1-based line number.
        line: usize,
        /// Offending text.
        text: String,
    },

    /// The `Student name` / `UO ID` header row was never found.
    #[error("Couldn't find the student table in the roster")]
    MissingHeader,

    /// A roster name is not written as `Surname, Given`.
    #[error("Roster name {0:?} is not in 'Surname, Given' form")]
    BadName(String),
}

/// A submission could not be matched to a student.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    /// The derived key has no roster entry.
    #[error("No roster entry for submission key {0:?}")]
    NotFound(String),

    /// No student key could be derived from the file name at all.
    #[error("Cannot derive a student key from {0:?}")]
    Underivable(String),
}

/// Reasons a submitted file yields no excerpt.
#[derive(Error, Debug)]
pub enum ExcerptError {
    /// None of the requested units is defined in the file.
    #[error("Did not find {units} in {file}")]
    NotFound {
        /// Label of the scanned file.
        file:  String,
        /// Requested unit names, comma separated.
        units: String,
    },

    /// The file could not be read.
    #[error("Could not read {path}: {source}")]
    Unreadable {
        /// Path of the submission.
        path:   PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },
}

/// A harness run that produced no exit status.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// The harness outlived its time limit and was killed.
    #[error("Timed out after {limit:?}")]
    Timeout {
        /// The limit that was exceeded.
        limit:  std::time::Duration,
        /// Stderr written before the harness was killed, decoded lossily.
        stderr: String,
    },

    /// The scratch directory could not be prepared.
    #[error("Could not stage files in {path}: {source}")]
    Staging {
        /// Path being created or copied.
        path:   PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The harness could not be started or waited on.
    #[error(transparent)]
    Spawn(#[from] anyhow::Error),
}

/// Maps a fatal error to the process exit status it should produce.
pub fn exit_status_for(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<ConfigError>().is_some() || err.downcast_ref::<RosterError>().is_some()
    {
        CONFIG_EXIT_STATUS
    } else if err.downcast_ref::<NoMatchError>().is_some() {
        NO_MATCH_EXIT_STATUS
    } else {
        FAILURE_EXIT_STATUS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_message_names_the_key() {
        let err = ConfigError::MissingKey {
            section: "hw1".into(),
            key:     "canon".into(),
        };
        assert_eq!(err.to_string(), "Missing entry 'canon' in section [hw1]");
    }

    #[test]
    fn exit_codes_follow_error_kind() {
        let config = anyhow::Error::new(ConfigError::MissingSection("hw2".into()));
        let no_match = anyhow::Error::new(NoMatchError::Pattern {
            pattern: "submissions/*_q1*.py".into(),
        });
        let other = anyhow::anyhow!("boom");

        assert_eq!(exit_status_for(&config), CONFIG_EXIT_STATUS);
        assert_eq!(exit_status_for(&no_match), NO_MATCH_EXIT_STATUS);
        assert_eq!(exit_status_for(&other), FAILURE_EXIT_STATUS);
    }

    #[test]
    fn context_does_not_hide_the_kind() {
        use anyhow::Context;

        let err: anyhow::Result<()> = Err(ConfigError::MissingSection("hw3".into()))
            .context("while loading grader.ini");
        let err = err.unwrap_err();
        assert_eq!(exit_status_for(&err), CONFIG_EXIT_STATUS);
    }
}
