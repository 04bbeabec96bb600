#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! The transcript graders read: one section per student, then a summary.

use std::{io::Write, path::PathBuf};

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Panel, Style, object::Rows},
};

use crate::{
    config::ProblemConfig,
    error::{ExcerptError, HarnessError},
    excerpt::Excerpt,
    harness::HarnessOutcome,
    submissions::Unresolved,
};

/// Line that opens every student section.
const DELIMITER: &str = "-----------------------------------------";

/// Counts gathered while grading a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Section name of the graded problem.
    pub problem:          String,
    /// Students whose harness ran to completion.
    pub graded:           usize,
    /// Of those, students whose harness exited with status 0.
    pub passed:           usize,
    /// Students whose harness timed out or could not be run.
    pub interrupted:      usize,
    /// Students left out for missing one or more files.
    pub incomplete:       usize,
    /// Submitted files whose owner could not be determined.
    pub unresolved:       usize,
    /// Files in which none of the wanted units were found.
    pub excerpts_missing: usize,
}

/// One row of the summary table.
#[derive(Tabled)]
struct SummaryRow {
    /// What was counted.
    #[tabled(rename = "Outcome")]
    outcome: &'static str,
    /// How many.
    #[tabled(rename = "Count")]
    count:   usize,
}

impl Summary {
    /// Rows of the summary table.
    fn rows(&self) -> Vec<SummaryRow> {
        vec![
            SummaryRow {
                outcome: "Harness ran",
                count:   self.graded,
            },
            SummaryRow {
                outcome: "Exited with 0",
                count:   self.passed,
            },
            SummaryRow {
                outcome: "Interrupted",
                count:   self.interrupted,
            },
            SummaryRow {
                outcome: "Incomplete submissions",
                count:   self.incomplete,
            },
            SummaryRow {
                outcome: "Unknown submitters",
                count:   self.unresolved,
            },
            SummaryRow {
                outcome: "Excerpts not found",
                count:   self.excerpts_missing,
            },
        ]
    }
}

/// Writes transcript sections to an output sink.
pub struct Transcript<W: Write> {
    /// Where the transcript goes.
    out: W,
}

impl<W: Write> Transcript<W> {
    /// Wraps a sink.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Gives the sink back.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Names the problem and its file-groups.
    pub fn problem(&mut self, problem: &ProblemConfig) -> Result<()> {
        writeln!(self.out)?;
        for (pattern, canonical) in problem.patterns().iter().zip(problem.canonical_names()) {
            writeln!(self.out, "{} {pattern} ({canonical})", "Problem:".bold())?;
        }
        Ok(())
    }

    /// Reports a file nobody on the roster owns.
    pub fn unresolved(&mut self, unresolved: &Unresolved) -> Result<()> {
        writeln!(
            self.out,
            "{} {} ({})",
            "*** UNMATCHED SUBMISSION".yellow(),
            unresolved.path.display(),
            unresolved.error
        )?;
        Ok(())
    }

    /// Reports a student left out for missing files.
    pub fn incomplete(&mut self, student: &str, missing: &[&str]) -> Result<()> {
        writeln!(
            self.out,
            "{} {student}: missing {}",
            "*** INCOMPLETE SUBMISSION".yellow(),
            missing.join(", ")
        )?;
        Ok(())
    }

    /// Opens a student's section.
    pub fn student_start(&mut self, student: &str, files: &[PathBuf]) -> Result<()> {
        writeln!(self.out, "\n{DELIMITER}")?;
        let files = files
            .iter()
            .map(|f| f.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(self.out, "{} => \t{files}", student.bold())?;
        Ok(())
    }

    /// Reports how the harness run went.
    pub fn outcome(&mut self, outcome: &Result<HarnessOutcome, HarnessError>) -> Result<()> {
        match outcome {
            Ok(outcome) => {
                let code = match outcome.exit_code {
                    Some(code) => code.to_string(),
                    None => "none (killed by signal)".to_string(),
                };
                let code = if outcome.passed() {
                    code.as_str().green()
                } else {
                    code.as_str().red()
                };
                writeln!(self.out, "Return code: {code}")?;
                writeln!(self.out, "Stderr: {}", outcome.stderr)?;
            }
            Err(err) => {
                writeln!(self.out, "{} {err}", "Interrupted:".red())?;
                if let HarnessError::Timeout { stderr, .. } = err {
                    writeln!(self.out, "Stderr: {stderr}")?;
                }
            }
        }
        Ok(())
    }

    /// Prints one file's excerpt or why there is none.
    pub fn excerpt(&mut self, excerpt: &Result<Excerpt, ExcerptError>) -> Result<()> {
        writeln!(self.out)?;
        match excerpt {
            Ok(excerpt) => write!(self.out, "{excerpt}")?,
            Err(ExcerptError::NotFound { file, units }) => writeln!(
                self.out,
                "{} ({units} in {file})",
                " *** DID NOT FIND EXCERPT ***".yellow()
            )?,
            Err(err @ ExcerptError::Unreadable { .. }) => {
                writeln!(self.out, "{}", "*** Exception while trying to excerpt".red())?;
                writeln!(self.out, "{err}")?;
            }
        }
        Ok(())
    }

    /// Closes a student's section.
    pub fn student_end(&mut self, student: &str) -> Result<()> {
        writeln!(self.out, "\n=== End of {student} ===")?;
        Ok(())
    }

    /// Prints the end-of-run summary table.
    pub fn summary(&mut self, summary: &Summary) -> Result<()> {
        let table = Table::new(summary.rows())
            .with(Panel::header(format!("Grading {}", summary.problem)))
            .with(
                Modify::new(Rows::first())
                    .with(Alignment::center())
                    .with(Alignment::center_vertical()),
            )
            .with(Style::modern())
            .to_string();
        writeln!(self.out, "\n{table}")?;
        Ok(())
    }

    /// Prints the summary as JSON.
    pub fn summary_json(&mut self, summary: &Summary) -> Result<()> {
        writeln!(self.out, "{}", serde_json::to_string_pretty(summary)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::excerpt::excerpt;

    fn rendered(write: impl FnOnce(&mut Transcript<Vec<u8>>) -> Result<()>) -> String {
        colored::control::set_override(false);
        let mut transcript = Transcript::new(Vec::new());
        write(&mut transcript).expect("write transcript");
        String::from_utf8(transcript.into_inner()).expect("utf-8")
    }

    #[test]
    fn student_section_has_delimiter_and_end_marker() {
        let text = rendered(|t| {
            t.student_start("Smith, Jo", &[PathBuf::from("submissions/smithjo_1_q1.py")])?;
            t.outcome(&Ok(HarnessOutcome {
                exit_code: Some(1),
                stderr:    "*** Failed: area\n".into(),
            }))?;
            t.student_end("Smith, Jo")
        });

        assert!(text.contains(DELIMITER));
        assert!(text.contains("Smith, Jo => \tsubmissions/smithjo_1_q1.py"));
        assert!(text.contains("Return code: 1"));
        assert!(text.contains("Stderr: *** Failed: area"));
        assert!(text.trim_end().ends_with("=== End of Smith, Jo ==="));
    }

    #[test]
    fn timeout_is_reported_with_partial_stderr() {
        let text = rendered(|t| {
            t.outcome(&Err(HarnessError::Timeout {
                limit:  Duration::from_secs(5),
                stderr: "test_area ... ok\n".into(),
            }))
        });
        assert!(text.contains("Interrupted: Timed out after 5s\nStderr: test_area ... ok\n"));
    }

    #[test]
    fn excerpt_and_not_found_notice() {
        let units = vec!["f".to_string()];
        let found = excerpt("f.py", ["def f():", "    pass"], &units);
        let missing = excerpt("g.py", ["def g():", "    pass"], &units);
        let text = rendered(|t| {
            t.excerpt(&found)?;
            t.excerpt(&missing)
        });

        assert!(text.contains("# f.py:1\ndef f():\n    pass\n"));
        assert!(text.contains("*** DID NOT FIND EXCERPT *** (f in g.py)"));
    }

    #[test]
    fn summary_table_lists_counts() {
        let summary = Summary {
            problem: "hw1".into(),
            graded: 3,
            passed: 2,
            incomplete: 1,
            ..Summary::default()
        };
        let text = rendered(|t| t.summary(&summary));
        assert!(text.contains("Grading hw1"));
        assert!(text.contains("Incomplete submissions"));

        let json = rendered(|t| t.summary_json(&summary));
        let value: serde_json::Value = serde_json::from_str(&json).expect("json");
        assert_eq!(value["graded"], 3);
        assert_eq!(value["incomplete"], 1);
    }
}
