//! Row-related data models.
//!
//! This module defines how a fetched row is shaped for the caller.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// How `fetch_row` keys the returned columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// By column name
    #[default]
    Assoc,
    /// By zero-based position
    Num,
    /// By name and by position
    Both,
}

/// A single row returned from a result set.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedRow {
    columns: Arc<[String]>,
    values: Vec<JsonValue>,
    mode: FetchMode,
}

impl FetchedRow {
    pub fn new(columns: Arc<[String]>, values: Vec<JsonValue>, mode: FetchMode) -> Self {
        Self {
            columns,
            values,
            mode,
        }
    }

    pub fn mode(&self) -> FetchMode {
        self.mode
    }

    /// Value by column name. `None` in `Num` mode.
    ///
    /// With duplicate column names the last one wins.
    pub fn get(&self, name: &str) -> Option<&JsonValue> {
        if self.mode == FetchMode::Num {
            return None;
        }
        self.columns
            .iter()
            .rposition(|c| c == name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Value by position. `None` in `Assoc` mode.
    pub fn get_index(&self, idx: usize) -> Option<&JsonValue> {
        if self.mode == FetchMode::Assoc {
            return None;
        }
        self.values.get(idx)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[JsonValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<JsonValue> {
        self.values
    }

    /// JSON object keyed according to the fetch mode.
    pub fn to_json(&self) -> JsonValue {
        let mut map = serde_json::Map::with_capacity(match self.mode {
            FetchMode::Both => self.values.len() * 2,
            _ => self.values.len(),
        });
        for (idx, (name, value)) in self.columns.iter().zip(&self.values).enumerate() {
            if self.mode != FetchMode::Assoc {
                map.insert(idx.to_string(), value.clone());
            }
            if self.mode != FetchMode::Num {
                map.insert(name.clone(), value.clone());
            }
        }
        JsonValue::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(mode: FetchMode) -> FetchedRow {
        FetchedRow::new(
            Arc::from(vec!["id".to_string(), "name".to_string()]),
            vec![json!(7), json!("Ada")],
            mode,
        )
    }

    #[test]
    fn test_assoc_row() {
        let r = row(FetchMode::Assoc);
        assert_eq!(r.get("name"), Some(&json!("Ada")));
        assert_eq!(r.get_index(0), None);
        assert_eq!(r.to_json(), json!({"id": 7, "name": "Ada"}));
    }

    #[test]
    fn test_num_row() {
        let r = row(FetchMode::Num);
        assert_eq!(r.get("name"), None);
        assert_eq!(r.get_index(0), Some(&json!(7)));
        assert_eq!(r.to_json(), json!({"0": 7, "1": "Ada"}));
    }

    #[test]
    fn test_both_row() {
        let r = row(FetchMode::Both);
        assert_eq!(r.get("id"), Some(&json!(7)));
        assert_eq!(r.get_index(1), Some(&json!("Ada")));
        assert_eq!(
            r.to_json(),
            json!({"0": 7, "id": 7, "1": "Ada", "name": "Ada"})
        );
    }

    #[test]
    fn test_duplicate_column_last_wins() {
        let r = FetchedRow::new(
            Arc::from(vec!["v".to_string(), "v".to_string()]),
            vec![json!(1), json!(2)],
            FetchMode::Assoc,
        );
        assert_eq!(r.get("v"), Some(&json!(2)));
        assert_eq!(r.to_json(), json!({"v": 2}));
    }

    #[test]
    fn test_default_mode_is_assoc() {
        assert_eq!(FetchMode::default(), FetchMode::Assoc);
    }
}
