//! Append-only position ledger.
//!
//! One JSONL file per agent signature at
//! `<base_log_dir>/<signature>/position/position.jsonl`. Snapshots are
//! never mutated or deleted; the latest state is whatever a full scan
//! says it is, so a file whose lines arrive out of order still reads
//! correctly. Writes happen under single-writer discipline: nothing here
//! locks the file, and two processes appending to one ledger is caller
//! error.
//!
//! Defaults for synthesized and registered initial snapshots are injected
//! through [`LedgerConfig`]; the ledger never consults the agent layer.

use crate::config::LedgerConfig;
use crate::error::Result;
use crate::market::TradingCalendar;
use crate::types::{PositionSnapshot, Positions, TradeAction, CASH};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
    calendar: TradingCalendar,
    config: LedgerConfig,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>, calendar: TradingCalendar, config: LedgerConfig) -> Self {
        Self {
            path: path.into(),
            calendar,
            config,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Symbol universe this ledger tracks.
    pub fn symbols(&self) -> &[String] {
        &self.config.symbols
    }

    /// Every parseable snapshot in file order. A missing file is an empty
    /// ledger; a corrupt line is dropped, never aborting the scan.
    pub fn snapshots(&self) -> Vec<PositionSnapshot> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) => {
                debug!("Ledger {} unavailable: {}", self.path.display(), e);
                return Vec::new();
            }
        };
        let mut snapshots = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!("Ledger {} read stopped: {}", self.path.display(), e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<PositionSnapshot>(&line) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => warn!("Skipping malformed ledger line: {}", e),
            }
        }
        snapshots
    }

    /// Write the id=0 registration snapshot: zero shares of every
    /// configured symbol plus the configured initial cash. Repeated calls
    /// are a warned no-op; returns whether a snapshot was written.
    pub fn register(&self, init_date: &str) -> Result<bool> {
        if self.path.exists() {
            warn!(
                "Ledger {} already registered, skipping",
                self.path.display()
            );
            return Ok(false);
        }
        let mut positions = Positions::new();
        for symbol in &self.config.symbols {
            positions.insert(symbol.clone(), rust_decimal::Decimal::ZERO);
        }
        positions.insert(CASH.to_string(), self.config.initial_cash);
        let snapshot = PositionSnapshot {
            date: init_date.to_string(),
            id: 0,
            this_action: None,
            positions,
        };
        self.append_snapshot(&snapshot)?;
        info!(
            "Registered ledger {} ({} symbols, {} cash)",
            self.path.display(),
            self.config.symbols.len(),
            self.config.initial_cash
        );
        Ok(true)
    }

    /// Latest known state as of `as_of`, three tiers deep:
    /// same-date max id, then the previous trading day's max id, then the
    /// newest snapshot strictly before `as_of` by (date, id). Returns
    /// `(empty, -1)` when the ledger has nothing usable.
    pub fn latest_position(&self, as_of: &str) -> (Positions, i64) {
        let snapshots = self.snapshots();
        if snapshots.is_empty() {
            return (Positions::new(), -1);
        }

        if let Some(found) = Self::best_at(&snapshots, as_of) {
            return found;
        }

        let previous = self.calendar.previous_trading_day(as_of);
        if let Some(found) = Self::best_at(&snapshots, &previous) {
            return found;
        }

        Self::best_before(&snapshots, as_of)
            .map(|s| (s.positions.clone(), s.id))
            .unwrap_or_else(|| (Positions::new(), -1))
    }

    /// The state the agent entered `as_of` with: newest snapshot strictly
    /// before that date, ignoring any same-day partial records. Empty when
    /// no earlier snapshot exists.
    pub fn init_position_for_date(&self, as_of: &str) -> Positions {
        let snapshots = self.snapshots();
        Self::best_before(&snapshots, as_of)
            .map(|s| s.positions.clone())
            .unwrap_or_default()
    }

    /// Base state an appended snapshot builds on. Normally the latest
    /// position; an empty ledger synthesizes an all-cash base with id 0,
    /// the implicit registration the no-trade path relies on.
    pub fn base_position(&self, as_of: &str) -> (Positions, i64) {
        let (mut positions, mut base_id) = self.latest_position(as_of);
        if positions.is_empty() {
            positions.insert(CASH.to_string(), self.config.initial_cash);
            base_id = 0;
        }
        (positions, base_id)
    }

    /// Record "did nothing today" durably: positions unchanged from the
    /// base, id advanced by one.
    pub fn append_no_trade(&self, date: &str) -> Result<PositionSnapshot> {
        let (positions, base_id) = self.base_position(date);
        let snapshot = PositionSnapshot {
            date: date.to_string(),
            id: base_id + 1,
            this_action: Some(TradeAction::no_trade()),
            positions,
        };
        self.append_snapshot(&snapshot)?;
        info!("No-trade recorded for {} (id {})", date, snapshot.id);
        Ok(snapshot)
    }

    /// Append a caller-built snapshot with the next date-aware id. The
    /// positions mapping is stored verbatim: the ledger does not check
    /// cash conservation or even that a CASH entry exists. That is the
    /// decision layer's responsibility.
    pub fn append(
        &self,
        date: &str,
        action: TradeAction,
        positions: Positions,
    ) -> Result<PositionSnapshot> {
        let (_, latest_id) = self.latest_position(date);
        let snapshot = PositionSnapshot {
            date: date.to_string(),
            id: latest_id + 1,
            this_action: Some(action),
            positions,
        };
        self.append_snapshot(&snapshot)?;
        debug!("Appended snapshot {} id {}", date, snapshot.id);
        Ok(snapshot)
    }

    /// Latest non-empty date present in the ledger.
    pub fn latest_date(&self) -> Option<String> {
        self.snapshots()
            .into_iter()
            .filter(|s| !s.date.is_empty())
            .map(|s| s.date)
            .max()
    }

    fn append_snapshot(&self, snapshot: &PositionSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(snapshot)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    /// Max-id snapshot at exactly `date`, accepted only when it carries a
    /// usable positions mapping; otherwise resolution falls through to
    /// the next tier.
    fn best_at(snapshots: &[PositionSnapshot], date: &str) -> Option<(Positions, i64)> {
        snapshots
            .iter()
            .filter(|s| s.date == date)
            .max_by_key(|s| s.id)
            .filter(|s| s.id >= 0 && !s.positions.is_empty())
            .map(|s| (s.positions.clone(), s.id))
    }

    /// Newest snapshot strictly before `as_of` by (date, id) ordering;
    /// dateless lines are excluded.
    fn best_before<'a>(
        snapshots: &'a [PositionSnapshot],
        as_of: &str,
    ) -> Option<&'a PositionSnapshot> {
        snapshots
            .iter()
            .filter(|s| !s.date.is_empty() && s.date.as_str() < as_of)
            .max_by(|a, b| (a.date.as_str(), a.id).cmp(&(b.date.as_str(), b.id)))
    }
}
