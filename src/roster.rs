#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Class roster parsing and submission-name resolution.
//!
//! The learning platform names uploads after a crushed form of the
//! student's name (`bakerrozellcharles_1234_hw1.py`), while the registrar
//! roster holds the real one (`"Baker-Rozell, Charles W"`). The roster is
//! turned into a table from the crushed form to the roster name.

use std::{collections::BTreeMap, path::Path};

use crate::error::{NameError, RosterError};

/// Column 0 label of the roster's student table header.
const NAME_HEADER: &str = "Student name";

/// Column 1 label of the roster's student table header.
const ID_HEADER: &str = "UO ID";

/// Student rows have at least this many fields; shorter rows end the table.
const MIN_STUDENT_FIELDS: usize = 5;

peg::parser! {
    /// Single-line CSV records with optional double-quoted fields.
    grammar csv() for str {
        /// `"..."` with `""` standing for a literal quote
        rule quoted() -> String
            = "\"" s:("\"\"" { '"' } / c:[^'"'] { c })* "\"" { s.into_iter().collect() }

        /// an unquoted field
        rule bare() -> String
            = s:$([^',' | '"' | '\r']*) { s.to_string() }

        /// one field of either kind
        rule field() -> String
            = quoted() / bare()

        /// a whole record
        pub rule record() -> Vec<String>
            = f:(field() ** ",") "\r"? ![_] { f }
    }
}

/// Lowercases and removes the characters the platform drops from names.
pub fn crush(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | '\'' | ' '))
        .collect()
}

/// Turns a roster name into the key used in submission file names.
///
/// Only the first given name is kept, so a middle initial is dropped:
/// `"Bermudez Antonino, Jan H"` becomes `"bermudezantoninojan"`.
pub fn munge_name(roster_name: &str) -> Result<String, RosterError> {
    let (surname, given) = roster_name
        .split_once(", ")
        .ok_or_else(|| RosterError::BadName(roster_name.to_string()))?;
    let given = given.split(' ').next().unwrap_or_default();
    Ok(format!("{}{}", crush(surname), crush(given)))
}

/// Maps a raw submission key to the student's display name.
pub trait NameResolver {
    /// Resolves `raw_key`, failing with [`NameError::NotFound`] when the key
    /// has no known student.
    fn resolve(&self, raw_key: &str) -> Result<String, NameError>;
}

/// Uses the raw key itself as the display name.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawNames;

impl NameResolver for RawNames {
    fn resolve(&self, raw_key: &str) -> Result<String, NameError> {
        if raw_key.is_empty() {
            Err(NameError::Underivable(raw_key.to_string()))
        } else {
            Ok(raw_key.to_string())
        }
    }
}

/// Lookup table from crushed submission names to roster names.
#[derive(Debug, Clone, Default)]
pub struct RosterTable {
    /// Crushed name to roster name.
    names: BTreeMap<String, String>,
}

impl RosterTable {
    /// Builds the table from roster CSV text.
    pub fn parse(text: &str) -> Result<Self, RosterError> {
        let mut records = text.lines().enumerate().map(|(idx, line)| {
            csv::record(line).map_err(|_| RosterError::Malformed {
                line: idx + 1,
                text: line.to_string(),
            })
        });

        // The student table is not at the top of the export.
        loop {
            match records.next() {
                Some(record) => {
                    let record = record?;
                    if record.len() > 1 && record[0] == NAME_HEADER && record[1] == ID_HEADER {
                        break;
                    }
                }
                None => return Err(RosterError::MissingHeader),
            }
        }

        let mut names = BTreeMap::new();
        for record in records {
            let record = record?;
            if record.len() < MIN_STUDENT_FIELDS {
                break;
            }
            let roster_name = record[0].clone();
            names.insert(munge_name(&roster_name)?, roster_name);
        }

        tracing::debug!("Roster lists {} students", names.len());
        Ok(Self { names })
    }

    /// Reads and parses a roster file.
    pub fn load(path: &Path) -> Result<Self, RosterError> {
        let text = std::fs::read_to_string(path).map_err(|source| RosterError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Number of students on the roster.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the roster lists nobody.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterates over (crushed name, roster name) pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.names.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl NameResolver for RosterTable {
    fn resolve(&self, raw_key: &str) -> Result<String, NameError> {
        self.names
            .get(&crush(raw_key))
            .cloned()
            .ok_or_else(|| NameError::NotFound(raw_key.to_string()))
    }
}
