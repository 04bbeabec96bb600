#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Pulling named function and class definitions out of submitted code.
//!
//! The scan is a single pass over the lines of an indentation-structured
//! file. Once a wanted `def`/`class` header is seen, every following line
//! is copied until a non-blank, non-comment line dedents to the header's
//! level or further. Indentation is the raw count of leading whitespace
//! characters; tabs and spaces are not reconciled.

use std::{collections::HashSet, fmt::Display, path::Path};

use crate::error::ExcerptError;

/// Kind of definition a header introduces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// `def name(...)`
    Function,
    /// `class Name...`
    Class,
}

/// A definition header found during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitMatch<'a> {
    /// Whether this is a function or a class.
    pub kind:  UnitKind,
    /// Defined name.
    pub name:  &'a str,
    /// Leading whitespace characters before the keyword.
    pub depth: usize,
}

peg::parser! {
    /// Recognizes `def`/`class` header lines.
    grammar header() for str {
        /// leading whitespace, measured in characters
        rule indent() -> usize
            = i:$([c if c.is_whitespace()]*) { i.chars().count() }

        /// the defining keyword
        rule kind() -> UnitKind
            = "class" { UnitKind::Class } / "def" { UnitKind::Function }

        /// an identifier
        rule name() -> &'input str
            = $([c if c.is_alphanumeric() || c == '_']+)

        /// a header line; anything may follow the name
        pub rule unit() -> UnitMatch<'input>
            = depth:indent() kind:kind() [c if c.is_whitespace()]+ name:name() [_]*
            { UnitMatch { kind, name, depth } }
    }
}

/// Parses `line` as a definition header.
pub fn parse_header(line: &str) -> Option<UnitMatch<'_>> {
    header::unit(line).ok()
}

/// Counts leading whitespace characters.
fn depth_of(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

/// One printable line of an excerpt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExcerptLine {
    /// Where a wanted unit starts.
    Location {
        /// Label of the file.
        file: String,
        /// 1-based line number of the header.
        line: usize,
    },
    /// The class a method most likely belongs to.
    EnclosingClass(String),
    /// A line copied from the source.
    Source(String),
}

impl Display for ExcerptLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExcerptLine::Location { file, line } => write!(f, "# {file}:{line}"),
            ExcerptLine::EnclosingClass(name) => write!(f, "# (in class {name})"),
            ExcerptLine::Source(text) => write!(f, "{text}"),
        }
    }
}

/// The lines of every wanted unit of one file, in file order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Excerpt {
    /// Markers, annotations and copied lines.
    lines: Vec<ExcerptLine>,
}

impl Excerpt {
    /// All lines, markers included.
    pub fn lines(&self) -> &[ExcerptLine] {
        &self.lines
    }

    /// Only the lines copied from the source.
    #[cfg(test)]
    fn source_lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().filter_map(|line| match line {
            ExcerptLine::Source(text) => Some(text.as_str()),
            _ => None,
        })
    }
}

impl Display for Excerpt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Where the scanner is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Looking for a wanted header.
    Outside,
    /// Copying a unit whose header sat at `base_indent`.
    Inside {
        /// Depth of the unit's header.
        base_indent: usize,
    },
}

/// State carried across the lines of one file.
struct Scan<'a> {
    /// Label used in location markers.
    file:         &'a str,
    /// Names of the wanted units.
    units:        HashSet<&'a str>,
    /// Copying or searching.
    mode:         Mode,
    /// Most recent class header seen anywhere in the file.
    recent_class: Option<String>,
    /// Output so far.
    out:          Vec<ExcerptLine>,
}

impl<'a> Scan<'a> {
    /// Starts a scan in the searching state.
    fn new(file: &'a str, units: &'a [String]) -> Self {
        Self {
            file,
            units: units.iter().map(String::as_str).collect(),
            mode: Mode::Outside,
            recent_class: None,
            out: Vec::new(),
        }
    }

    /// Emits a wanted header and starts copying its body.
    fn open(&mut self, number: usize, unit: &UnitMatch<'_>, line: &str) {
        self.out.push(ExcerptLine::Location {
            file: self.file.to_string(),
            line: number,
        });
        if unit.kind == UnitKind::Function
            && unit.depth > 0
            && let Some(class) = &self.recent_class
        {
            self.out.push(ExcerptLine::EnclosingClass(class.clone()));
        }
        self.out.push(ExcerptLine::Source(line.to_string()));
        self.mode = Mode::Inside {
            base_indent: unit.depth,
        };
    }

    /// Feeds one line (1-based `number`) through the state machine.
    fn feed(&mut self, number: usize, line: &str) {
        let unit = parse_header(line);
        if let Some(found) = &unit
            && found.kind == UnitKind::Class
        {
            self.recent_class = Some(found.name.to_string());
        }

        if let Mode::Inside { base_indent } = self.mode {
            let stripped = line.trim_start();
            let keep = match &unit {
                _ if stripped.is_empty() || stripped.starts_with('#') => true,
                Some(found) if found.depth > base_indent => true,
                Some(_) => false,
                None => depth_of(line) > base_indent,
            };
            if keep {
                self.out.push(ExcerptLine::Source(line.to_string()));
                return;
            }
            // The unit ends here; the line gets a fresh look below.
            self.mode = Mode::Outside;
        }

        if let Some(found) = unit
            && self.units.contains(found.name)
        {
            self.open(number, &found, line);
        }
    }

    /// Whether any wanted unit was seen.
    fn found_any(&self) -> bool {
        !self.out.is_empty()
    }
}

/// Excerpts the wanted `units` from `lines`.
///
/// * `file`: label used in location markers and errors.
///
/// Fails with [`ExcerptError::NotFound`] when no wanted header occurs.
pub fn excerpt<L: AsRef<str>>(
    file: &str,
    lines: impl IntoIterator<Item = L>,
    units: &[String],
) -> Result<Excerpt, ExcerptError> {
    let mut scan = Scan::new(file, units);
    for (idx, line) in lines.into_iter().enumerate() {
        scan.feed(idx + 1, line.as_ref());
    }

    if scan.found_any() {
        Ok(Excerpt { lines: scan.out })
    } else {
        Err(ExcerptError::NotFound {
            file:  file.to_string(),
            units: units.join(", "),
        })
    }
}

/// Reads `path` and excerpts the wanted `units` from it.
///
/// Bytes that are not valid UTF-8 are replaced rather than rejected.
pub fn excerpt_file(path: &Path, units: &[String]) -> Result<Excerpt, ExcerptError> {
    let bytes = std::fs::read(path).map_err(|source| ExcerptError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8_lossy(&bytes);
    let label = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    excerpt(&label, text.lines(), units)
}
