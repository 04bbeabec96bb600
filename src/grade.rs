#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! The batch: gather, join, filter, then run and excerpt each student.

use std::{
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use bon::Builder;

use crate::{
    config::{DEFAULT_SECTION, ProblemConfig, Settings, StudentRange},
    error::{ConfigError, ExcerptError, NoMatchError},
    excerpt::excerpt_file,
    harness::Harness,
    join::{Column, JoinedRow, join, partition_complete},
    range,
    report::{Summary, Transcript},
    roster::{NameResolver, RawNames, RosterTable},
    submissions::gather,
};

/// Command-line overrides for one batch.
#[derive(Debug, Clone, Default, Builder)]
pub struct GradeOptions {
    /// Problem section to grade instead of `select`.
    problem: Option<String>,
    /// Student range replacing the configured one.
    range:   Option<StudentRange>,
}

/// Builds the name resolver the problem asks for.
fn resolver_for(problem: &ProblemConfig) -> Result<Box<dyn NameResolver>, ConfigError> {
    match problem.roster() {
        Some(path) => {
            let table = RosterTable::load(path)?;
            tracing::info!("Loaded {} students from {}", table.len(), path.display());
            Ok(Box::new(table))
        }
        None => {
            tracing::warn!("No roster configured; using submission names as student names");
            Ok(Box::new(RawNames))
        }
    }
}

/// Grades every complete submission of the configured problem.
///
/// Only configuration and no-match errors end the batch early; everything
/// that goes wrong for one student is written to the transcript and
/// counted in the returned [`Summary`].
pub async fn grade<W: Write>(
    config_path: &Path,
    options: &GradeOptions,
    transcript: &mut Transcript<W>,
) -> Result<Summary> {
    let mut problem = ProblemConfig::load(config_path, options.problem.as_deref())
        .with_context(|| format!("Could not load problem from {}", config_path.display()))?;
    if options.range.is_some() {
        problem = problem.with_range(options.range.clone());
    }
    tracing::info!("Grading problem [{}]", problem.name());

    let resolver = resolver_for(&problem)?;
    let harness = Harness::new(&problem)?;
    let mut summary = Summary {
        problem: problem.name().to_string(),
        ..Summary::default()
    };

    transcript.problem(&problem)?;

    let mut columns: Vec<Column<PathBuf>> = Vec::with_capacity(problem.patterns().len());
    for pattern in problem.patterns() {
        let gathered = gather(problem.submissions_dir(), pattern, resolver.as_ref())?;
        for unresolved in &gathered.unresolved {
            transcript.unresolved(unresolved)?;
        }
        summary.unresolved += gathered.unresolved.len();
        columns.push(gathered.column);
    }

    let mut rows: Vec<JoinedRow<PathBuf>> = join(&columns);
    if let Some(bounds) = problem.range() {
        rows = range::select(rows, &bounds.from, &bounds.to)?;
        if rows.is_empty() {
            return Err(NoMatchError::EmptyRange {
                from: bounds.from.clone(),
                to:   bounds.to.clone(),
            }
            .into());
        }
    }

    let (complete, incomplete) = partition_complete(rows);
    for row in &incomplete {
        let missing: Vec<&str> = row
            .missing()
            .into_iter()
            .map(|idx| problem.canonical_names()[idx].as_str())
            .collect();
        tracing::warn!("{} is missing {}", row.student(), missing.join(", "));
        transcript.incomplete(row.student(), &missing)?;
    }
    summary.incomplete = incomplete.len();

    for row in &complete {
        let student = row.student();
        transcript.student_start(student, row.files())?;

        let outcome = harness.run(row.files()).await;
        match &outcome {
            Ok(outcome) => {
                summary.graded += 1;
                if outcome.passed() {
                    summary.passed += 1;
                }
            }
            Err(err) => {
                tracing::warn!("Harness did not finish for {student}: {err}");
                summary.interrupted += 1;
            }
        }
        transcript.outcome(&outcome)?;

        for file in row.files() {
            let excerpt = excerpt_file(file, problem.units());
            match &excerpt {
                Err(ExcerptError::NotFound { .. }) => summary.excerpts_missing += 1,
                Err(err @ ExcerptError::Unreadable { .. }) => tracing::warn!("{err}"),
                Ok(_) => {}
            }
            transcript.excerpt(&excerpt)?;
        }

        transcript.student_end(student)?;
    }

    Ok(summary)
}

/// Loads the roster named in `[DEFAULT]` (or in the selected problem).
pub fn load_roster(config_path: &Path, problem: Option<&str>) -> Result<RosterTable> {
    let settings = Settings::load(config_path)?;
    let section = match problem {
        Some(name) => name.to_string(),
        None => settings
            .get(DEFAULT_SECTION, "select")
            .unwrap_or(DEFAULT_SECTION)
            .to_string(),
    };
    let roster = settings.require(&section, "roster")?;
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new(""));
    Ok(RosterTable::load(&base_dir.join(roster))?)
}
