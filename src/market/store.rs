//! Price history store.
//!
//! Wraps one line-delimited JSON file of [`PriceRecord`]s. Every query
//! re-reads the file, so results always reflect the latest data load and
//! no staleness accumulates between calls. A missing or unreadable file is
//! a degraded mode, not an error: queries return empty mappings and the
//! calendar falls back to weekday arithmetic.

use crate::types::{PriceBar, PriceRecord};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct PriceStore {
    path: PathBuf,
}

impl PriceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All parseable records, or `None` when the file itself is missing or
    /// unreadable. Individual malformed lines are dropped; an I/O failure
    /// mid-read degrades the whole call, matching the missing-file case.
    pub(crate) fn try_records(&self) -> Option<Vec<PriceRecord>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) => {
                debug!("Price store {} unavailable: {}", self.path.display(), e);
                return None;
            }
        };
        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!("Price store {} unreadable: {}", self.path.display(), e);
                    return None;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<PriceRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => debug!("Skipping malformed price line: {}", e),
            }
        }
        Some(records)
    }

    /// Like [`try_records`](Self::try_records) but degrading to empty.
    pub fn records(&self) -> Vec<PriceRecord> {
        self.try_records().unwrap_or_default()
    }

    /// Whether any record carries a timestamp on `date` (exact daily key or
    /// a date-prefixed intraday key). `symbols = None` scans the whole
    /// store.
    pub fn is_known_date(&self, date: &str, symbols: Option<&[String]>) -> bool {
        Self::known_in(&self.records(), date, symbols)
    }

    pub(crate) fn known_in(records: &[PriceRecord], date: &str, symbols: Option<&[String]>) -> bool {
        records
            .iter()
            .filter(|record| match symbols {
                Some(wanted) => wanted.iter().any(|s| *s == record.meta.symbol),
                None => true,
            })
            .any(|record| record.timestamps().iter().any(|ts| ts.starts_with(date)))
    }

    /// Union of every loaded series per requested symbol. Lines later in
    /// the file represent newer data loads and win on timestamp collisions.
    fn merged_series(&self, symbols: &[String]) -> BTreeMap<String, BTreeMap<String, PriceBar>> {
        let mut merged: BTreeMap<String, BTreeMap<String, PriceBar>> = BTreeMap::new();
        for record in self.records() {
            if record.meta.symbol.is_empty() || !symbols.contains(&record.meta.symbol) {
                continue;
            }
            merged
                .entry(record.meta.symbol.clone())
                .or_default()
                .extend(record.bars());
        }
        merged
    }

    /// Opening price per symbol for one date. Symbols without a bar on
    /// that date are absent from the result; a bar whose open field is
    /// not numeric maps to `None`.
    pub fn open_prices(&self, date: &str, symbols: &[String]) -> BTreeMap<String, Option<Decimal>> {
        let mut out = BTreeMap::new();
        for (symbol, series) in self.merged_series(symbols) {
            if let Some(bar) = series.get(date) {
                out.insert(symbol, bar.open);
            }
        }
        out
    }

    /// Opening and closing prices per symbol for one date, same absence
    /// policy as [`open_prices`](Self::open_prices).
    pub fn open_and_close_prices(
        &self,
        date: &str,
        symbols: &[String],
    ) -> (BTreeMap<String, Option<Decimal>>, BTreeMap<String, Option<Decimal>>) {
        let mut opens = BTreeMap::new();
        let mut closes = BTreeMap::new();
        for (symbol, series) in self.merged_series(symbols) {
            if let Some(bar) = series.get(date) {
                opens.insert(symbol.clone(), bar.open);
                closes.insert(symbol, bar.close);
            }
        }
        (opens, closes)
    }

    /// Symbol to display name, from record metadata. Entries without a
    /// name are omitted. `symbols = None` maps the whole store.
    pub fn name_map(&self, symbols: Option<&[String]>) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        for record in self.records() {
            let symbol = &record.meta.symbol;
            if symbol.is_empty() || record.meta.name.is_empty() {
                continue;
            }
            if let Some(wanted) = symbols {
                if !wanted.iter().any(|s| s == symbol) {
                    continue;
                }
            }
            out.insert(symbol.clone(), record.meta.name.clone());
        }
        out
    }

    /// Sorted distinct daily dates across the store.
    pub fn trading_days(&self) -> Vec<String> {
        let mut days = BTreeSet::new();
        for record in self.records() {
            days.extend(record.daily.keys().cloned());
        }
        days.into_iter().collect()
    }
}
