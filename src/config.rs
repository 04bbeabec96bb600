#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Settings file loading and the validated view of one grading problem.
//!
//! The settings file is INI: `[section]` headers, `key = value` (or
//! `key: value`) entries, whole-line `#`/`;` comments and inline comments
//! introduced by whitespace followed by `#`. Keys are case-insensitive and
//! every section inherits the entries of `[DEFAULT]`.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use bon::Builder;

use crate::error::ConfigError;

/// Name of the section every other section inherits from.
pub const DEFAULT_SECTION: &str = "DEFAULT";

/// Settings file looked up when none is given.
pub const DEFAULT_SETTINGS_FILE: &str = "grader.ini";

/// Harness timeout used when the problem does not set one.
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// One parsed line of a settings file.
#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    /// `[name]`
    Section(&'a str),
    /// `key = value`, value still carrying any inline comment.
    Entry(&'a str, &'a str),
    /// Blank line or whole-line comment.
    Blank,
}

peg::parser! {
    /// Line grammar for INI settings files.
    grammar ini() for str {
        /// horizontal whitespace
        rule ws() = quiet!{[' ' | '\t' | '\r']*}

        /// a section header such as `[hw1]`
        rule section() -> Line<'input>
            = ws() "[" n:$((!"]" [_])+) "]" ws() ![_] { Line::Section(n.trim()) }

        /// blank lines and whole-line comments
        rule blank() -> Line<'input>
            = ws() (['#' | ';'] [_]*)? ![_] { Line::Blank }

        /// `key = value` or `key: value`
        rule entry() -> Line<'input>
            = ws() k:$((!['=' | ':'] [_])+) ['=' | ':'] v:$([_]*) { Line::Entry(k.trim(), v) }

        /// any single line of the file
        pub rule line() -> Line<'input>
            = section() / blank() / entry()
    }
}

/// Drops an inline `#` comment (one preceded by whitespace) and trims.
fn strip_inline_comment(value: &str) -> &str {
    let mut prev_ws = true;
    for (idx, ch) in value.char_indices() {
        if ch == '#' && prev_ws {
            return value[..idx].trim();
        }
        prev_ws = ch.is_whitespace();
    }
    value.trim()
}

/// Splits a comma-separated setting into its trimmed, non-empty parts.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Key/value settings grouped by section.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Entries of `[DEFAULT]`.
    defaults: BTreeMap<String, String>,
    /// Entries of every other section, keyed by section name.
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl Settings {
    /// Parses settings from INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut settings = Self::default();
        let mut current: Option<String> = None;

        for (idx, raw) in text.lines().enumerate() {
            let malformed = || ConfigError::Malformed {
                line: idx + 1,
                text: raw.to_string(),
            };

            match ini::line(raw).map_err(|_| malformed())? {
                Line::Blank => {}
                Line::Section(name) => {
                    if name != DEFAULT_SECTION {
                        settings.sections.entry(name.to_string()).or_default();
                    }
                    current = Some(name.to_string());
                }
                Line::Entry(key, value) => {
                    let section = current.as_deref().ok_or_else(malformed)?;
                    let key = key.to_lowercase();
                    let value = strip_inline_comment(value).to_string();
                    if section == DEFAULT_SECTION {
                        settings.defaults.insert(key, value);
                    } else {
                        settings
                            .sections
                            .entry(section.to_string())
                            .or_default()
                            .insert(key, value);
                    }
                }
            }
        }

        Ok(settings)
    }

    /// Reads and parses a settings file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Looks a key up in `section`, falling back to `[DEFAULT]`.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        let key = key.to_lowercase();
        self.sections
            .get(section)
            .and_then(|entries| entries.get(&key))
            .or_else(|| self.defaults.get(&key))
            .map(String::as_str)
    }

    /// Like [`Settings::get`] but a missing key is an error naming it.
    pub fn require(&self, section: &str, key: &str) -> Result<&str, ConfigError> {
        self.get(section, key).ok_or_else(|| ConfigError::MissingKey {
            section: section.to_string(),
            key:     key.to_string(),
        })
    }

    /// Whether a (non-DEFAULT) section exists.
    pub fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(section)
    }

    /// Names of all non-DEFAULT sections, sorted.
    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }
}

/// An inclusive student-name range as written in the settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentRange {
    /// First name to include.
    pub from: String,
    /// Last name (prefix) to include.
    pub to:   String,
}

/// Everything needed to grade one problem.
#[derive(Debug, Clone, Builder)]
#[builder(on(String, into))]
pub struct ProblemConfig {
    /// Section name of the problem.
    name:            String,
    /// One glob pattern per file-group.
    patterns:        Vec<String>,
    /// Canonical file name for each file-group, same order as `patterns`.
    canonical_names: Vec<String>,
    /// Directory holding the harness and its support files.
    #[builder(into)]
    grading_dir:     PathBuf,
    /// Harness file name inside `grading_dir`.
    harness:         String,
    /// Unit names to excerpt from every submitted file.
    units:           Vec<String>,
    /// Optional student range.
    range:           Option<StudentRange>,
    /// Directory the patterns are matched in.
    #[builder(into, default = PathBuf::from("submissions"))]
    submissions_dir: PathBuf,
    /// Program used to run the harness.
    #[builder(default = "python3".to_string())]
    interpreter:     String,
    /// Wall-clock limit for one harness run.
    #[builder(default = Duration::from_secs(DEFAULT_TIMEOUT_SECS))]
    timeout:         Duration,
    /// Directory reset and reused for every run.
    #[builder(into, default = PathBuf::from(".scratch"))]
    scratch_dir:     PathBuf,
    /// Roster CSV, if names should be resolved through one.
    #[builder(into)]
    roster:          Option<PathBuf>,
}

impl ProblemConfig {
    /// Builds the configuration of the selected problem.
    ///
    /// * `problem`: overrides the `select` entry of `[DEFAULT]`.
    /// * `base_dir`: relative paths in the settings are resolved against it.
    pub fn from_settings(
        settings: &Settings,
        problem: Option<&str>,
        base_dir: &Path,
    ) -> Result<Self, ConfigError> {
        let name = match problem {
            Some(name) => name.to_string(),
            None => settings.require(DEFAULT_SECTION, "select")?.to_string(),
        };
        if !settings.has_section(&name) {
            return Err(ConfigError::MissingSection(name));
        }
        let section = name.as_str();

        let patterns = split_list(settings.require(section, "glob")?);
        let canonical_names = split_list(settings.require(section, "canon")?);
        if patterns.is_empty() {
            return Err(ConfigError::InvalidValue {
                key:    "glob".into(),
                reason: "no patterns given".into(),
            });
        }
        if patterns.len() != canonical_names.len() {
            return Err(ConfigError::InvalidValue {
                key:    "canon".into(),
                reason: format!(
                    "{} canonical names for {} glob patterns",
                    canonical_names.len(),
                    patterns.len()
                ),
            });
        }

        let dir = settings.require(section, "dir")?;
        let harness = settings
            .get(section, "test")
            .map(str::to_string)
            .unwrap_or_else(|| format!("test_{dir}.py"));

        let units = split_list(settings.require(section, "units")?);
        if units.is_empty() {
            return Err(ConfigError::InvalidValue {
                key:    "units".into(),
                reason: "no unit names given".into(),
            });
        }

        let range = match (settings.get(section, "from"), settings.get(section, "to")) {
            (Some(from), Some(to)) => Some(StudentRange {
                from: from.to_string(),
                to:   to.to_string(),
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::MissingKey {
                    section: section.to_string(),
                    key:     "to".into(),
                });
            }
            (None, Some(_)) => {
                return Err(ConfigError::MissingKey {
                    section: section.to_string(),
                    key:     "from".into(),
                });
            }
        };

        let timeout = match settings.get(section, "timeout") {
            Some(raw) => Duration::from_secs(raw.parse::<u64>().map_err(|_| {
                ConfigError::InvalidValue {
                    key:    "timeout".into(),
                    reason: format!("{raw:?} is not a whole number of seconds"),
                }
            })?),
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let resolve = |p: &str| {
            let p = Path::new(p);
            if p.is_absolute() { p.to_path_buf() } else { base_dir.join(p) }
        };

        Ok(Self::builder()
            .name(name.clone())
            .patterns(patterns)
            .canonical_names(canonical_names)
            .grading_dir(resolve(dir))
            .harness(harness)
            .units(units)
            .maybe_range(range)
            .submissions_dir(resolve(settings.get(section, "submissions").unwrap_or("submissions")))
            .interpreter(settings.get(section, "interpreter").unwrap_or("python3"))
            .timeout(timeout)
            .scratch_dir(resolve(settings.get(section, "scratch").unwrap_or(".scratch")))
            .maybe_roster(settings.get(section, "roster").map(resolve))
            .build())
    }

    /// Loads the settings file at `path` and builds the selected problem.
    pub fn load(path: &Path, problem: Option<&str>) -> Result<Self, ConfigError> {
        let settings = Settings::load(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        Self::from_settings(&settings, problem, base_dir)
    }

    /// Section name of the problem.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Glob pattern of each file-group.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Canonical file name of each file-group.
    pub fn canonical_names(&self) -> &[String] {
        &self.canonical_names
    }

    /// Directory holding the harness and its support files.
    pub fn grading_dir(&self) -> &Path {
        &self.grading_dir
    }

    /// Harness file name.
    pub fn harness(&self) -> &str {
        &self.harness
    }

    /// Unit names to excerpt.
    pub fn units(&self) -> &[String] {
        &self.units
    }

    /// Student range, if any.
    pub fn range(&self) -> Option<&StudentRange> {
        self.range.as_ref()
    }

    /// Directory the patterns are matched in.
    pub fn submissions_dir(&self) -> &Path {
        &self.submissions_dir
    }

    /// Program used to run the harness.
    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    /// Wall-clock limit for one harness run.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Scratch directory.
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Roster path, if any.
    pub fn roster(&self) -> Option<&Path> {
        self.roster.as_deref()
    }

    /// Returns a copy with a different range.
    pub fn with_range(mut self, range: Option<StudentRange>) -> Self {
        self.range = range;
        self
    }
}
