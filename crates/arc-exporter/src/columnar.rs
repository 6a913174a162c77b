//! Row-to-column transposition for the Arc write format.
//!
//! Arc ingests one measurement at a time as parallel column arrays aligned
//! by row index. Signal encoders produce [`Row`]s (fixed fields plus a
//! dynamic attribute set); [`BatchBuilder`] discovers the union of attribute
//! keys across the whole batch and materializes one column per key, filling
//! `null` where a row lacks it. Two passes are unavoidable: the column
//! vocabulary is only known once every row has been seen.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::attributes::{AttrMap, AttrValue};

/// One observation destined for one record in the destination measurement.
/// Ephemeral: rows only exist between encoding and columnarization.
#[derive(Debug, Clone)]
pub struct Row {
    fixed: Vec<(&'static str, AttrValue)>,
    attributes: AttrMap,
}

impl Row {
    pub fn new() -> Self {
        Row {
            fixed: Vec::new(),
            attributes: AttrMap::new(),
        }
    }

    /// Appends a fixed (schema-level) field. Fixed field names shadow any
    /// dynamic attribute of the same name.
    pub fn fixed(mut self, name: &'static str, value: impl Into<AttrValue>) -> Self {
        self.fixed.push((name, value.into()));
        self
    }

    /// Sets the row's dynamic attribute set.
    pub fn attributes(mut self, attributes: AttrMap) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(key)
    }
}

impl Default for Row {
    fn default() -> Self {
        Row::new()
    }
}

/// A finished columnar batch: the `{m, columns}` document Arc's msgpack
/// write endpoint accepts. Every column has exactly one value (possibly
/// null) per logical row.
#[derive(Debug, Serialize)]
pub struct ColumnarBatch {
    #[serde(rename = "m")]
    pub measurement: String,
    pub columns: BTreeMap<String, Vec<AttrValue>>,
}

impl ColumnarBatch {
    pub fn row_count(&self) -> usize {
        self.columns.values().next().map_or(0, Vec::len)
    }
}

/// Accumulates rows for one measurement and transposes them on [`build`].
///
/// [`build`]: BatchBuilder::build
#[derive(Debug)]
pub struct BatchBuilder {
    measurement: String,
    excluded_keys: Vec<String>,
    rows: Vec<Row>,
}

impl BatchBuilder {
    pub fn new(measurement: impl Into<String>) -> Self {
        BatchBuilder {
            measurement: measurement.into(),
            excluded_keys: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Drops an attribute key from the dynamic column set. Used for keys
    /// already promoted to a fixed column (e.g. `service.name` once it
    /// becomes the `service_name` column) so the value is not duplicated.
    pub fn exclude_key(mut self, key: impl Into<String>) -> Self {
        self.excluded_keys.push(key.into());
        self
    }

    /// Appends a row. Row order is preserved through to the column arrays;
    /// arrival order can be time-relevant to downstream consumers.
    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn build(self) -> ColumnarBatch {
        // Pass 1: the column vocabulary. Fixed names in first-seen order
        // decide which attribute keys are shadowed; dynamic keys are the
        // union across all rows minus fixed and excluded names.
        let mut fixed_names: Vec<&'static str> = Vec::new();
        for row in &self.rows {
            for (name, _) in &row.fixed {
                if !fixed_names.contains(name) {
                    fixed_names.push(name);
                }
            }
        }
        let mut dynamic_keys: BTreeSet<&str> = BTreeSet::new();
        for row in &self.rows {
            for key in row.attributes.keys() {
                if !fixed_names.iter().any(|n| *n == key.as_str())
                    && !self.excluded_keys.iter().any(|e| e == key)
                {
                    dynamic_keys.insert(key);
                }
            }
        }

        // Pass 2: materialize length-N columns, null-filling gaps.
        let row_count = self.rows.len();
        let mut columns: BTreeMap<String, Vec<AttrValue>> = BTreeMap::new();
        for name in &fixed_names {
            columns.insert((*name).to_string(), Vec::with_capacity(row_count));
        }
        for key in &dynamic_keys {
            columns.insert((*key).to_string(), Vec::with_capacity(row_count));
        }

        for row in &self.rows {
            for name in &fixed_names {
                let value = row
                    .fixed
                    .iter()
                    .find(|(n, _)| n == name)
                    .map_or(AttrValue::Null, |(_, v)| v.clone());
                if let Some(column) = columns.get_mut(*name) {
                    column.push(value);
                }
            }
            for key in &dynamic_keys {
                let value = row
                    .attributes
                    .get(*key)
                    .cloned()
                    .unwrap_or(AttrValue::Null);
                if let Some(column) = columns.get_mut(*key) {
                    column.push(value);
                }
            }
        }

        ColumnarBatch {
            measurement: self.measurement,
            columns,
        }
    }
}
