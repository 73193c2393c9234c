// Copyright 2026 The Scorec Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Interning managers for node scores.
//!
//! A tree's node procedure returns a dense index; these managers assign the
//! indices while deduplicating by value, so equal scores (or equal
//! per-category distributions) share one table slot no matter how many
//! leaves carry them.

use std::collections::HashMap;

use ordered_float::OrderedFloat;
use smallvec::SmallVec;

use crate::procedure::{ScoreRow, Table, TableData};

/// Deduplicating accumulator of scalar scores.
#[derive(Default)]
pub struct ScoreManager {
    values: Vec<f64>,
    index: HashMap<OrderedFloat<f64>, usize>,
}

impl ScoreManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_insert(&mut self, value: f64) -> usize {
        let key = OrderedFloat(value);
        if let Some(&i) = self.index.get(&key) {
            return i;
        }
        let i = self.values.len();
        self.values.push(value);
        self.index.insert(key, i);
        i
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn finish(self, name: String) -> Table {
        Table {
            name,
            data: TableData::Scores(self.values),
        }
    }
}

type RowKey = SmallVec<[OrderedFloat<f64>; 4]>;

/// Deduplicating accumulator of per-category score rows. Rows are
/// normalized to probabilities before interning, so distributions with
/// proportional record counts share a slot.
#[derive(Default)]
pub struct ScoreDistributionManager {
    rows: Vec<ScoreRow>,
    index: HashMap<RowKey, usize>,
}

impl ScoreDistributionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_insert(&mut self, counts: &[f64]) -> usize {
        let sum: f64 = counts.iter().sum();
        let row: ScoreRow = if sum > 0.0 {
            counts.iter().map(|c| c / sum).collect()
        } else {
            counts.iter().copied().collect()
        };

        let key: RowKey = row.iter().map(|&v| OrderedFloat(v)).collect();
        if let Some(&i) = self.index.get(&key) {
            return i;
        }
        let i = self.rows.len();
        self.rows.push(row);
        self.index.insert(key, i);
        i
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn finish(self, name: String) -> Table {
        Table {
            name,
            data: TableData::ScoreRows(self.rows),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use proptest::prelude::*;

    #[test]
    fn test_score_dedup() {
        let mut mgr = ScoreManager::new();
        assert_eq!(mgr.get_or_insert(1.5), 0);
        assert_eq!(mgr.get_or_insert(2.5), 1);
        assert_eq!(mgr.get_or_insert(1.5), 0);
        assert_eq!(mgr.len(), 2);

        let table = mgr.finish("scores".to_string());
        assert_eq!(table.data, TableData::Scores(vec![1.5, 2.5]));
    }

    #[test]
    fn test_distribution_rows_normalize_and_dedup() {
        let mut mgr = ScoreDistributionManager::new();
        let a = mgr.get_or_insert(&[1.0, 3.0]);
        let b = mgr.get_or_insert(&[2.0, 6.0]);
        assert_eq!(a, b);

        let c = mgr.get_or_insert(&[3.0, 1.0]);
        assert_ne!(a, c);
        assert_eq!(mgr.len(), 2);

        let Table {
            data: TableData::ScoreRows(rows),
            ..
        } = mgr.finish("rows".to_string())
        else {
            panic!("expected score rows");
        };
        assert!(approx_eq!(f64, rows[0][0], 0.25));
        assert!(approx_eq!(f64, rows[0][1], 0.75));
    }

    proptest! {
        #[test]
        fn prop_score_interning_is_idempotent(values in proptest::collection::vec(-1e9f64..1e9, 1..50)) {
            let mut mgr = ScoreManager::new();
            let first: Vec<usize> = values.iter().map(|&v| mgr.get_or_insert(v)).collect();
            let second: Vec<usize> = values.iter().map(|&v| mgr.get_or_insert(v)).collect();
            prop_assert_eq!(first, second);
            prop_assert!(mgr.len() <= values.len());
        }
    }
}
