//! Incremental statistics over streamed chunks.
//!
//! [`AggregationState`] accumulates the timestamp range, record counts,
//! per-field null counts, per-dimension value frequencies and the joint
//! dimension-combination frequencies of a dataset. Every update is a merge of
//! a chunk-local state into the running one, and every merge is commutative
//! and associative, so totals do not depend on chunk size or on the order in
//! which files and chunks arrive.
//!
//! Row data is bounded by the chunk size, but the frequency tables keep one
//! entry per distinct value (and per distinct combination) seen across the
//! whole run: memory grows with the number of distinct series, not with the
//! number of records.

use std::{
    collections::{HashMap, hash_map::Entry},
    hash::Hash,
};

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::{
    chunk::TypedChunk,
    data::Value,
    schema::{FieldPartition, Schema},
};

/// A dimension cell; `None` is the null value and is counted like any other.
pub type DimensionValue = Option<Value>;

/// Global position of a row: file order first, then row order within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RowPosition {
    pub file: usize,
    pub row: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub count: u64,
    pub first_seen: RowPosition,
}

impl Tally {
    fn merge(&mut self, other: Tally) {
        self.count += other.count;
        self.first_seen = self.first_seen.min(other.first_seen);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyTable<K: Eq + Hash> {
    entries: HashMap<K, Tally>,
}

impl<K: Eq + Hash> Default for FrequencyTable<K> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash> FrequencyTable<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: K, at: RowPosition) {
        self.add(
            key,
            Tally {
                count: 1,
                first_seen: at,
            },
        );
    }

    fn add(&mut self, key: K, tally: Tally) {
        match self.entries.entry(key) {
            Entry::Occupied(mut existing) => existing.get_mut().merge(tally),
            Entry::Vacant(slot) => {
                slot.insert(tally);
            }
        }
    }

    pub fn merge(&mut self, other: FrequencyTable<K>) {
        for (key, tally) in other.entries {
            self.add(key, tally);
        }
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.entries.values().map(|tally| tally.count).sum()
    }

    pub fn get(&self, key: &K) -> Option<&Tally> {
        self.entries.get(key)
    }

    /// The `n` most frequent keys (all keys when `n` is 0), ties broken by the
    /// position where each key was first seen.
    pub fn top(&self, n: usize) -> Vec<(&K, Tally)> {
        let mut items = self
            .entries
            .iter()
            .map(|(key, tally)| (key, *tally))
            .collect::<Vec<_>>();
        items.sort_by(|a, b| {
            b.1.count
                .cmp(&a.1.count)
                .then_with(|| a.1.first_seen.cmp(&b.1.first_seen))
        });
        if n > 0 {
            items.truncate(n);
        }
        items
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TimeSpan {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl TimeSpan {
    pub fn widen(&mut self, at: NaiveDateTime) {
        self.start = Some(self.start.map_or(at, |start| start.min(at)));
        self.end = Some(self.end.map_or(at, |end| end.max(at)));
    }

    pub fn merge(&mut self, other: TimeSpan) {
        if let Some(start) = other.start {
            self.widen(start);
        }
        if let Some(end) = other.end {
            self.widen(end);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationState {
    field_names: Vec<String>,
    timestamp: usize,
    dimensions: Vec<usize>,
    time_span: TimeSpan,
    total_records: u64,
    total_records_without_nulls: u64,
    nulls_by_field: Vec<u64>,
    dimension_value_counts: Vec<FrequencyTable<DimensionValue>>,
    dimension_combo_counts: FrequencyTable<Vec<DimensionValue>>,
}

impl AggregationState {
    pub fn new(schema: &Schema, partition: &FieldPartition) -> Self {
        Self {
            field_names: schema.names().into_iter().map(str::to_string).collect(),
            timestamp: partition.timestamp(),
            dimensions: partition.dimensions().to_vec(),
            time_span: TimeSpan::default(),
            total_records: 0,
            total_records_without_nulls: 0,
            nulls_by_field: vec![0; schema.len()],
            dimension_value_counts: partition
                .dimensions()
                .iter()
                .map(|_| FrequencyTable::new())
                .collect(),
            dimension_combo_counts: FrequencyTable::new(),
        }
    }

    fn empty_like(&self) -> Self {
        Self {
            field_names: self.field_names.clone(),
            timestamp: self.timestamp,
            dimensions: self.dimensions.clone(),
            time_span: TimeSpan::default(),
            total_records: 0,
            total_records_without_nulls: 0,
            nulls_by_field: vec![0; self.field_names.len()],
            dimension_value_counts: self
                .dimensions
                .iter()
                .map(|_| FrequencyTable::new())
                .collect(),
            dimension_combo_counts: FrequencyTable::new(),
        }
    }

    /// Statistics of one chunk on its own, shaped like `self`.
    pub fn summarize(&self, chunk: &TypedChunk) -> Self {
        let mut summary = self.empty_like();
        for (offset, row) in chunk.rows.iter().enumerate() {
            let at = RowPosition {
                file: chunk.file_index,
                row: chunk.first_row + offset as u64,
            };
            summary.ingest_row(row, at);
        }
        summary
    }

    pub fn absorb(&mut self, chunk: &TypedChunk) {
        let summary = self.summarize(chunk);
        self.merge(summary);
    }

    fn ingest_row(&mut self, row: &[Option<Value>], at: RowPosition) {
        self.total_records += 1;
        let mut has_null = false;
        for (nulls, cell) in self.nulls_by_field.iter_mut().zip(row) {
            if cell.is_none() {
                *nulls += 1;
                has_null = true;
            }
        }
        if !has_null {
            self.total_records_without_nulls += 1;
        }
        if let Some(at_time) = row
            .get(self.timestamp)
            .and_then(|cell| cell.as_ref())
            .and_then(Value::as_timestamp)
        {
            self.time_span.widen(at_time);
        }
        let combo = self
            .dimensions
            .iter()
            .map(|index| row.get(*index).cloned().flatten())
            .collect::<Vec<_>>();
        for (table, value) in self.dimension_value_counts.iter_mut().zip(&combo) {
            table.record(value.clone(), at);
        }
        self.dimension_combo_counts.record(combo, at);
    }

    /// Folds `other` into `self`. Both must describe the same schema.
    pub fn merge(&mut self, other: AggregationState) {
        debug_assert_eq!(self.field_names, other.field_names);
        debug_assert_eq!(self.dimensions, other.dimensions);
        self.time_span.merge(other.time_span);
        self.total_records += other.total_records;
        self.total_records_without_nulls += other.total_records_without_nulls;
        for (nulls, more) in self.nulls_by_field.iter_mut().zip(other.nulls_by_field) {
            *nulls += more;
        }
        for (table, more) in self
            .dimension_value_counts
            .iter_mut()
            .zip(other.dimension_value_counts)
        {
            table.merge(more);
        }
        self.dimension_combo_counts
            .merge(other.dimension_combo_counts);
    }

    pub fn time_span(&self) -> TimeSpan {
        self.time_span
    }

    pub fn total_records(&self) -> u64 {
        self.total_records
    }

    pub fn total_records_without_nulls(&self) -> u64 {
        self.total_records_without_nulls
    }

    pub fn records_with_nulls(&self) -> u64 {
        self.total_records - self.total_records_without_nulls
    }

    pub fn nulls_by_field(&self) -> impl Iterator<Item = (&str, u64)> {
        self.field_names
            .iter()
            .map(String::as_str)
            .zip(self.nulls_by_field.iter().copied())
    }

    pub fn dimension_fields(&self) -> Vec<&str> {
        self.dimensions
            .iter()
            .map(|index| self.field_names[*index].as_str())
            .collect()
    }

    /// Value-frequency tables, one per dimension field, in column order.
    pub fn dimension_value_counts(&self) -> &[FrequencyTable<DimensionValue>] {
        &self.dimension_value_counts
    }

    pub fn dimension_combo_counts(&self) -> &FrequencyTable<Vec<DimensionValue>> {
        &self.dimension_combo_counts
    }
}
