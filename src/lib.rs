//! # classgrade
//!
//! Runs an instructor's test harness over a folder of student submissions
//! and prints a transcript with the result of every run and an excerpt of
//! the functions and classes the grader asked to see.
//!
//! Submissions for a problem may span several files. Each file-group is
//! globbed into a sorted [`join::Column`], the columns are merged into one
//! row per student, and only students who handed in every file are run.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// INI settings and the validated configuration of one problem
pub mod config;
/// Error kinds and the exit status each fatal one maps to
pub mod error;
/// Extracting named functions and classes from Python source
pub mod excerpt;
/// The batch driver
pub mod grade;
/// Staging submissions and running the harness against them
pub mod harness;
/// Merging per-file-group columns into per-student rows
pub mod join;
/// Spawning subprocesses with a deadline
pub mod process;
/// Alphabetic student range selection
pub mod range;
/// The console transcript and summary
pub mod report;
/// Roster parsing and student name resolution
pub mod roster;
/// Globbing submitted files into columns
pub mod submissions;
