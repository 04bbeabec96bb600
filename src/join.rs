#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Matching the files of multi-file assignments to students.
//!
//! Every file-group (one per question) is globbed on its own and becomes a
//! [`Column`]. Columns are folded together with a sorted two-way merge so
//! that each student ends up with one [`JoinedRow`] holding a slot per
//! file-group, `None` where that student did not submit the group's file.

use itertools::{Either, EitherOrBoth, Itertools};

/// Something carrying the student key rows are sorted and filtered on.
pub trait Keyed {
    /// The resolved student key.
    fn key(&self) -> &str;
}

/// A student key that occurs twice in what should become one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateKey<F> {
    /// The repeated key.
    pub key:    String,
    /// File of the first occurrence.
    pub first:  F,
    /// File of the second occurrence.
    pub second: F,
}

/// The (student, file) pairs of one file-group, sorted by student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column<F> {
    /// Sorted, duplicate-free entries.
    entries: Vec<(String, F)>,
}

impl<F> Column<F> {
    /// Sorts `entries` by student key, rejecting repeated keys.
    pub fn new(mut entries: Vec<(String, F)>) -> Result<Self, DuplicateKey<F>> {
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut unique: Vec<(String, F)> = Vec::with_capacity(entries.len());
        let mut sorted = entries.into_iter().peekable();
        while let Some((key, file)) = sorted.next() {
            if let Some((_, second)) = sorted.next_if(|(next, _)| *next == key) {
                return Err(DuplicateKey {
                    key,
                    first: file,
                    second,
                });
            }
            unique.push((key, file));
        }

        Ok(Self { entries: unique })
    }

    /// A column with no submissions.
    #[cfg(test)]
    fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Number of students in the column.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nobody submitted this group's file.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = &(String, F)> {
        self.entries.iter()
    }
}

/// One student's file for every file-group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedRow<F> {
    /// Resolved student key.
    student: String,
    /// Slot `i` holds the file of group `i`, if submitted.
    files:   Vec<Option<F>>,
}

impl<F: Clone> JoinedRow<F> {
    /// A student first seen in group `width`: all earlier slots are empty.
    fn first_seen(student: &str, width: usize, file: &F) -> Self {
        let mut files = vec![None; width];
        files.push(Some(file.clone()));
        Self {
            student: student.to_string(),
            files,
        }
    }

    /// A copy of this row with one more slot.
    fn extended(&self, slot: Option<F>) -> Self {
        let mut files = Vec::with_capacity(self.files.len() + 1);
        files.extend(self.files.iter().cloned());
        files.push(slot);
        Self {
            student: self.student.clone(),
            files,
        }
    }
}

impl<F> JoinedRow<F> {
    /// Resolved student key.
    pub fn student(&self) -> &str {
        &self.student
    }

    /// One slot per file-group.
    pub fn files(&self) -> &[Option<F>] {
        &self.files
    }

    /// Indices of the file-groups this student did not submit.
    pub fn missing(&self) -> Vec<usize> {
        self.files
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_none())
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Whether every slot is filled.
    pub fn is_complete(&self) -> bool {
        self.files.iter().all(Option::is_some)
    }

    /// Converts to a [`CompleteRow`], or hands the row back if a slot is
    /// empty.
    pub fn into_complete(self) -> Result<CompleteRow<F>, Self> {
        if !self.is_complete() {
            return Err(self);
        }
        Ok(CompleteRow {
            student: self.student,
            files:   self.files.into_iter().flatten().collect(),
        })
    }
}

impl<F> Keyed for JoinedRow<F> {
    fn key(&self) -> &str {
        &self.student
    }
}

/// A student who submitted a file for every file-group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteRow<F> {
    /// Resolved student key.
    student: String,
    /// File of each group, in group order.
    files:   Vec<F>,
}

impl<F> CompleteRow<F> {
    /// Resolved student key.
    pub fn student(&self) -> &str {
        &self.student
    }

    /// File of each group, in group order.
    pub fn files(&self) -> &[F] {
        &self.files
    }
}

impl<F> Keyed for CompleteRow<F> {
    fn key(&self) -> &str {
        &self.student
    }
}

/// Merges one more column into rows that already span `width` groups.
fn merge_column<F: Clone>(
    rows: &[JoinedRow<F>],
    column: &Column<F>,
    width: usize,
) -> Vec<JoinedRow<F>> {
    rows.iter()
        .merge_join_by(column.iter(), |row, entry| row.student.as_str().cmp(entry.0.as_str()))
        .map(|pair| match pair {
            EitherOrBoth::Both(row, (_, file)) => row.extended(Some(file.clone())),
            EitherOrBoth::Left(row) => row.extended(None),
            EitherOrBoth::Right((student, file)) => JoinedRow::first_seen(student, width, file),
        })
        .collect()
}

/// Joins columns into one row per student appearing in any column.
///
/// Rows come out sorted by student and every row has exactly
/// `columns.len()` slots.
pub fn join<F: Clone>(columns: &[Column<F>]) -> Vec<JoinedRow<F>> {
    columns
        .iter()
        .enumerate()
        .fold(Vec::new(), |rows, (width, column)| merge_column(&rows, column, width))
}

/// Splits rows into complete ones and ones missing at least one file.
pub fn partition_complete<F>(rows: Vec<JoinedRow<F>>) -> (Vec<CompleteRow<F>>, Vec<JoinedRow<F>>) {
    rows.into_iter()
        .partition_map(|row| match row.into_complete() {
            Ok(complete) => Either::Left(complete),
            Err(partial) => Either::Right(partial),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(keys: &[&str], tag: &str) -> Column<String> {
        Column::new(
            keys.iter()
                .map(|k| (k.to_string(), format!("{k}_{tag}")))
                .collect(),
        )
        .expect("no duplicates")
    }

    fn slots(row: &JoinedRow<String>) -> Vec<Option<&str>> {
        row.files().iter().map(|f| f.as_deref()).collect()
    }

    #[test]
    fn column_sorts_and_rejects_duplicates() {
        let col = Column::new(vec![("b".to_string(), 2), ("a".to_string(), 1)]).unwrap();
        assert_eq!(col.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);

        let dup = Column::new(vec![("a".to_string(), 1), ("b".to_string(), 2), ("a".to_string(), 3)])
            .unwrap_err();
        assert_eq!(dup.key, "a");
        assert_eq!((dup.first, dup.second), (1, 3));
    }

    #[test]
    fn identical_columns_zip_by_key() {
        let rows = join(&[column(&["ann", "bob"], "q1"), column(&["ann", "bob"], "q2")]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].student(), "ann");
        assert_eq!(slots(&rows[0]), vec![Some("ann_q1"), Some("ann_q2")]);
        assert_eq!(slots(&rows[1]), vec![Some("bob_q1"), Some("bob_q2")]);
        assert!(rows.iter().all(JoinedRow::is_complete));
    }

    #[test]
    fn absent_slots_mark_missing_files() {
        let columns = [
            column(&["ann", "cat"], "q1"),
            column(&["bob", "cat"], "q2"),
            column(&["ann", "bob", "cat"], "q3"),
        ];
        let rows = join(&columns);

        let keys: Vec<_> = rows.iter().map(JoinedRow::student).collect();
        assert_eq!(keys, vec!["ann", "bob", "cat"]);
        assert_eq!(slots(&rows[0]), vec![Some("ann_q1"), None, Some("ann_q3")]);
        assert_eq!(slots(&rows[1]), vec![None, Some("bob_q2"), Some("bob_q3")]);
        assert_eq!(slots(&rows[2]), vec![Some("cat_q1"), Some("cat_q2"), Some("cat_q3")]);
        assert_eq!(rows[0].missing(), vec![1]);
        assert_eq!(rows[1].missing(), vec![0]);

        // Every row spans every column and covers the largest column.
        assert!(rows.iter().all(|r| r.files().len() == columns.len()));
        assert!(rows.len() >= columns.iter().map(Column::len).max().unwrap());
    }

    #[test]
    fn student_only_in_last_column_gets_leading_gaps() {
        let rows = join(&[column(&["ann"], "q1"), column(&["ann"], "q2"), column(&["zed"], "q3")]);
        let zed = rows.iter().find(|r| r.student() == "zed").expect("zed row");
        assert_eq!(slots(zed), vec![None, None, Some("zed_q3")]);
        let ann = rows.iter().find(|r| r.student() == "ann").expect("ann row");
        assert_eq!(slots(ann), vec![Some("ann_q1"), Some("ann_q2"), None]);
    }

    #[test]
    fn tail_of_either_side_is_drained() {
        let rows = join(&[column(&["ann", "bob", "dan"], "q1"), column(&["eve", "fay"], "q2")]);
        let keys: Vec<_> = rows.iter().map(JoinedRow::student).collect();
        assert_eq!(keys, vec!["ann", "bob", "dan", "eve", "fay"]);
        assert_eq!(slots(&rows[2]), vec![Some("dan_q1"), None]);
        assert_eq!(slots(&rows[4]), vec![None, Some("fay_q2")]);
    }

    #[test]
    fn empty_column_adds_gap_but_no_rows() {
        let rows = join(&[column(&["ann", "bob"], "q1"), Column::empty()]);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.missing() == vec![1]));

        let rows = join(&[Column::<String>::empty(), column(&["ann"], "q2")]);
        assert_eq!(slots(&rows[0]), vec![None, Some("ann_q2")]);

        assert!(join::<String>(&[]).is_empty());
    }

    #[test]
    fn partition_separates_incomplete_rows() {
        let rows = join(&[column(&["ann", "bob"], "q1"), column(&["bob"], "q2")]);
        let (complete, partial) = partition_complete(rows);

        assert_eq!(complete.len(), 1);
        assert_eq!(complete[0].student(), "bob");
        assert_eq!(complete[0].files(), ["bob_q1", "bob_q2"]);
        assert_eq!(partial.len(), 1);
        assert_eq!(partial[0].student(), "ann");
        assert_eq!(partial[0].missing(), vec![1]);
    }
}
