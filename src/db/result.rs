//! Buffered query results.
//!
//! A `QueryResult` is a shared handle: clones see the same rows and the same
//! cursor, so advancing one advances all of them. Keep your own handle when a
//! result has to outlive the next `execute` on the session.

use crate::db::driver::RawResult;
use crate::models::{FetchMode, FetchedRow};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug)]
struct ResultInner {
    columns: Arc<[String]>,
    rows: Vec<Vec<JsonValue>>,
    has_result_set: bool,
    cursor: AtomicUsize,
}

/// Handle to a fully buffered result set.
#[derive(Debug, Clone)]
pub struct QueryResult {
    inner: Arc<ResultInner>,
}

impl QueryResult {
    pub fn new(raw: RawResult) -> Self {
        Self {
            inner: Arc::new(ResultInner {
                columns: Arc::from(raw.columns),
                rows: raw.rows,
                has_result_set: raw.has_result_set,
                cursor: AtomicUsize::new(0),
            }),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.inner.columns
    }

    /// False for statements that return no result set (INSERT, UPDATE, ...).
    /// An empty SELECT still has one.
    pub fn has_result_set(&self) -> bool {
        self.inner.has_result_set
    }

    /// Total rows in the set, regardless of how many were fetched.
    pub fn num_rows(&self) -> usize {
        self.inner.rows.len()
    }

    /// Next row, or `None` once the set is exhausted.
    pub fn fetch_row(&self, mode: FetchMode) -> Option<FetchedRow> {
        let rows = &self.inner.rows;
        let idx = self
            .inner
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |pos| {
                (pos < rows.len()).then_some(pos + 1)
            })
            .ok()?;
        Some(FetchedRow::new(
            self.inner.columns.clone(),
            rows[idx].clone(),
            mode,
        ))
    }

    /// Move the cursor to `offset`. Returns false if out of range.
    pub fn data_seek(&self, offset: usize) -> bool {
        if offset >= self.inner.rows.len() {
            return false;
        }
        self.inner.cursor.store(offset, Ordering::Release);
        true
    }

    pub fn position(&self) -> usize {
        self.inner.cursor.load(Ordering::Acquire)
    }

    pub fn is_exhausted(&self) -> bool {
        self.position() >= self.inner.rows.len()
    }

    /// True if both handles refer to the same result set.
    pub fn same_as(&self, other: &QueryResult) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Iterator for QueryResult {
    type Item = FetchedRow;

    fn next(&mut self) -> Option<Self::Item> {
        self.fetch_row(FetchMode::Assoc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn three_rows() -> QueryResult {
        QueryResult::new(RawResult::new(
            vec!["n".to_string()],
            vec![vec![json!(1)], vec![json!(2)], vec![json!(3)]],
        ))
    }

    #[test]
    fn test_fetch_until_exhausted() {
        let result = three_rows();
        for expected in 1..=3 {
            let row = result.fetch_row(FetchMode::Num).unwrap();
            assert_eq!(row.get_index(0), Some(&json!(expected)));
        }
        assert!(result.fetch_row(FetchMode::Num).is_none());
        assert!(result.fetch_row(FetchMode::Num).is_none());
        assert!(result.is_exhausted());
    }

    #[test]
    fn test_num_rows_independent_of_cursor() {
        let result = three_rows();
        assert_eq!(result.num_rows(), 3);
        result.fetch_row(FetchMode::Assoc);
        result.fetch_row(FetchMode::Assoc);
        assert_eq!(result.num_rows(), 3);
    }

    #[test]
    fn test_clones_share_cursor() {
        let a = three_rows();
        let b = a.clone();
        a.fetch_row(FetchMode::Assoc);
        assert_eq!(b.position(), 1);
        assert!(a.same_as(&b));
        assert!(!a.same_as(&three_rows()));
    }

    #[test]
    fn test_data_seek() {
        let result = three_rows();
        assert!(result.data_seek(2));
        assert_eq!(
            result.fetch_row(FetchMode::Assoc).unwrap().get("n"),
            Some(&json!(3))
        );
        assert!(!result.data_seek(3));
        assert!(result.data_seek(0));
        assert_eq!(result.clone().count(), 3);
    }

    #[test]
    fn test_empty_result() {
        let result = QueryResult::new(RawResult::empty());
        assert_eq!(result.num_rows(), 0);
        assert!(result.columns().is_empty());
        assert!(!result.has_result_set());
        assert!(result.fetch_row(FetchMode::Assoc).is_none());
    }

    #[test]
    fn test_empty_select_has_result_set() {
        let result = QueryResult::new(RawResult::new(vec!["id".to_string()], vec![]));
        assert_eq!(result.num_rows(), 0);
        assert!(result.has_result_set());
        assert_eq!(result.columns(), ["id".to_string()]);
    }
}
