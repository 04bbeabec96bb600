#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # classgrade
//!
//! Batch grader for multi-file Python submissions.
//!
//! Point it at a `grader.ini` describing the problem and run
//! `classgrade grade`; the transcript goes to stdout, diagnostics to stderr.

use std::{io, path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use bpaf::*;
use classgrade::{
    config::{DEFAULT_SETTINGS_FILE, StudentRange},
    error::exit_status_for,
    excerpt::excerpt_file,
    grade::{GradeOptions, grade, load_roster},
    report::Transcript,
};
use dotenvy::dotenv;
use tracing::{Level, metadata::LevelFilter};
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt};

/// Arguments of the `grade` subcommand.
#[derive(Debug, Clone)]
struct GradeArgs {
    /// Settings file.
    config:  PathBuf,
    /// Problem section overriding `select`.
    problem: Option<String>,
    /// Student range overriding the configured one.
    range:   Option<StudentRange>,
    /// Print the summary as JSON instead of a table.
    json:    bool,
    /// Log debug output.
    verbose: bool,
}

/// Top-level CLI commands.
#[derive(Debug, Clone)]
enum Cmd {
    /// Grade a batch of submissions
    Grade(GradeArgs),
    /// Print the roster lookup table
    Roster(PathBuf),
    /// Excerpt units from one file
    Excerpt(PathBuf, Vec<String>),
}

/// Parse the command line arguments and return a `Cmd` enum
fn options() -> Cmd {
    /// parses the settings file location
    fn config_file() -> impl Parser<PathBuf> {
        long("config")
            .short('c')
            .env("CLASSGRADE_CONFIG")
            .help("Settings file describing the problem")
            .argument::<PathBuf>("FILE")
            .fallback(PathBuf::from(DEFAULT_SETTINGS_FILE))
    }

    /// parses an optional `--from A --to B` pair
    fn student_range() -> impl Parser<Option<StudentRange>> {
        let from = long("from")
            .help("First student to grade")
            .argument::<String>("NAME");
        let to = long("to")
            .help("Last student to grade (matched as a prefix)")
            .argument::<String>("NAME");
        construct!(StudentRange { from, to }).optional()
    }

    let config = config_file();
    let problem = long("problem")
        .short('p')
        .help("Problem section to grade instead of the selected one")
        .argument::<String>("NAME")
        .optional();
    let json = long("json").help("Print the summary as JSON").switch();
    let verbose = short('v')
        .long("verbose")
        .help("Show debug logging")
        .switch();
    let range = student_range();
    let grade_cmd = construct!(GradeArgs {
        config,
        problem,
        range,
        json,
        verbose
    })
    .map(Cmd::Grade)
    .to_options()
    .command("grade")
    .help("Run the harness on every complete submission");

    let roster = construct!(Cmd::Roster(config_file()))
        .to_options()
        .command("roster")
        .help("Print the munged-name to roster-name table");

    let file = positional::<PathBuf>("FILE").help("Python file to excerpt");
    let units = positional::<String>("UNIT")
        .help("Function or class name")
        .some("at least one unit name is required");
    let excerpt = construct!(Cmd::Excerpt(file, units))
        .to_options()
        .command("excerpt")
        .help("Print the named functions and classes of one file");

    let cmd = construct!([grade_cmd, roster, excerpt]);

    cmd.to_options()
        .descr("Batch grader for multi-file Python submissions")
        .run()
}

/// Sets up console logging at `level`.
fn init_tracing(level: Level) {
    let fmt = fmt::layer()
        .without_time()
        .with_file(false)
        .with_line_number(false)
        .with_writer(io::stderr);
    let filter_layer = LevelFilter::from_level(level);
    tracing_subscriber::registry()
        .with(fmt)
        .with(filter_layer)
        .init();
}

/// Runs one command.
async fn run(cmd: Cmd) -> Result<()> {
    match cmd {
        Cmd::Grade(args) => {
            let options = GradeOptions::builder()
                .maybe_problem(args.problem)
                .maybe_range(args.range)
                .build();
            let mut transcript = Transcript::new(io::stdout().lock());
            let summary = grade(&args.config, &options, &mut transcript).await?;

            if args.json {
                transcript.summary_json(&summary)?;
            } else {
                transcript.summary(&summary)?;
            }
        }
        Cmd::Roster(config) => {
            let table = load_roster(&config, None)
                .with_context(|| format!("Could not load roster named in {}", config.display()))?;
            for (munged, name) in table.iter() {
                println!("{munged:<30} {name}");
            }
        }
        Cmd::Excerpt(file, units) => {
            let excerpt = excerpt_file(&file, &units)?;
            print!("{excerpt}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();

    let cmd = options();
    let level = match &cmd {
        Cmd::Grade(args) if args.verbose => Level::DEBUG,
        _ => Level::INFO,
    };
    init_tracing(level);

    match run(cmd).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(exit_status_for(&e))
        }
    }
}
