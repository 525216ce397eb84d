//! Session driver.
//!
//! Walks pending trading days in order and runs one decision session per
//! day: assemble context, ask the model, execute or record a no-trade,
//! log the exchange. Model and transport failures are retried with
//! linear backoff; a day whose retries are exhausted is settled as a
//! no-trade so the ledger never ends a run with a hole in it.

use crate::config::AgentConfig;
use crate::context::{keys, RuntimeStore};
use crate::error::Result;
use crate::executor::{TradeExecutor, TradeOutcome};
use crate::ledger::Ledger;
use crate::market::{PriceStore, TradingCalendar};
use crate::model::{DecisionModel, SessionContext, TradeDecision};
use crate::settlement;
use crate::types::CASH;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

const DATE_FMT: &str = "%Y-%m-%d";

/// One line of the per-day session log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub timestamp: DateTime<Utc>,
    pub signature: String,
    pub entries: Vec<SessionEntry>,
}

/// One message of the logged exchange, chat style.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEntry {
    pub role: String,
    pub content: String,
}

/// How a day's session ended.
#[derive(Debug, Clone)]
pub enum SessionOutcome {
    /// An order filled and the ledger advanced.
    Traded(TradeOutcome),
    /// A no-trade snapshot was appended.
    Held,
    /// Nothing was written (dry run).
    Skipped,
}

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub date: String,
    pub outcome: SessionOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub sessions: Vec<SessionReport>,
}

impl RunReport {
    pub fn traded(&self) -> usize {
        self.sessions
            .iter()
            .filter(|s| matches!(s.outcome, SessionOutcome::Traded(_)))
            .count()
    }

    pub fn held(&self) -> usize {
        self.sessions
            .iter()
            .filter(|s| matches!(s.outcome, SessionOutcome::Held))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.sessions
            .iter()
            .filter(|s| matches!(s.outcome, SessionOutcome::Skipped))
            .count()
    }
}

pub struct TradingAgent {
    signature: String,
    config: AgentConfig,
    ledger: Ledger,
    store: PriceStore,
    calendar: TradingCalendar,
    executor: TradeExecutor,
    model: Box<dyn DecisionModel>,
    runtime: Arc<dyn RuntimeStore>,
    dry_run: bool,
}

impl TradingAgent {
    pub fn new(
        signature: impl Into<String>,
        config: AgentConfig,
        ledger: Ledger,
        store: PriceStore,
        model: Box<dyn DecisionModel>,
        runtime: Arc<dyn RuntimeStore>,
    ) -> Self {
        let calendar = TradingCalendar::new(store.clone());
        let executor = TradeExecutor::new(ledger.clone(), store.clone());
        Self {
            signature: signature.into(),
            config,
            ledger,
            store,
            calendar,
            executor,
            model,
            runtime,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn register(&self) -> Result<bool> {
        self.ledger.register(&self.config.init_date)
    }

    /// Trading days still owed a session, oldest first: the day after the
    /// ledger's last entry (or the configured init date on a fresh
    /// ledger) through `end`, keeping only days the calendar calls open.
    pub fn trading_dates(&self, end: &str) -> Vec<String> {
        let start = match self.ledger.latest_date() {
            Some(latest) => NaiveDate::parse_from_str(&latest, DATE_FMT)
                .ok()
                .and_then(|d| d.succ_opt()),
            None => NaiveDate::parse_from_str(&self.config.init_date, DATE_FMT).ok(),
        };
        let end = NaiveDate::parse_from_str(end, DATE_FMT).ok();
        let (mut day, end) = match (start, end) {
            (Some(start), Some(end)) => (start, end),
            _ => {
                warn!("Unusable date range, nothing to run");
                return Vec::new();
            }
        };

        let mut dates = Vec::new();
        while day <= end {
            let date = day.format(DATE_FMT).to_string();
            if self.calendar.is_trading_day(&date).is_open() {
                dates.push(date);
            }
            day = match day.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }
        dates
    }

    /// Run every pending session up to and including `end`, publishing
    /// progress to the runtime context as each day settles.
    pub async fn run_date_range(&self, end: &str) -> Result<RunReport> {
        let dates = self.trading_dates(end);
        if dates.is_empty() {
            info!("No pending trading days up to {}", end);
            return Ok(RunReport::default());
        }
        info!(
            "Running {} session(s) for {} up to {}",
            dates.len(),
            self.signature,
            end
        );

        self.runtime.set_str(keys::MARKET, "cn");
        self.runtime.set_str(keys::LOG_PATH, &self.config.base_log_dir);

        let mut report = RunReport::default();
        for date in dates {
            self.runtime.set_str(keys::TODAY_DATE, &date);
            self.runtime.set_str(keys::SIGNATURE, &self.signature);

            let outcome = self.run_with_retry(&date).await;
            self.runtime.set_bool(
                keys::IF_TRADE,
                matches!(outcome, SessionOutcome::Traded(_)),
            );
            report.sessions.push(SessionReport { date, outcome });
        }
        Ok(report)
    }

    async fn run_with_retry(&self, date: &str) -> SessionOutcome {
        let max = self.config.max_retries.max(1);
        for attempt in 1..=max {
            match self.run_session(date).await {
                Ok(outcome) => return outcome,
                Err(e) => {
                    warn!("Session {} attempt {}/{} failed: {}", date, attempt, max, e);
                    if attempt < max {
                        let delay = self.config.base_delay_ms * u64::from(attempt);
                        tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                    }
                }
            }
        }
        if self.dry_run {
            return SessionOutcome::Skipped;
        }
        // Retries exhausted: settle the day as a no-trade so the next run
        // does not revisit it.
        warn!("Session {} gave up after {} attempts, recording no-trade", date, max);
        match self.ledger.append_no_trade(date) {
            Ok(_) => SessionOutcome::Held,
            Err(e) => {
                warn!("Failed to record fallback no-trade for {}: {}", date, e);
                SessionOutcome::Skipped
            }
        }
    }

    async fn run_session(&self, date: &str) -> Result<SessionOutcome> {
        let ctx = self.build_context(date);
        let decision = self.model.decide(&ctx).await?;
        self.log_session(date, &ctx, &decision).await;

        match decision {
            TradeDecision::Trade {
                symbol,
                direction,
                quantity,
                reason,
            } => {
                info!(
                    "{}: model wants to {} {} x {} ({})",
                    date, direction, symbol, quantity, reason
                );
                if self.dry_run {
                    info!("Dry run, order not executed");
                    return Ok(SessionOutcome::Skipped);
                }
                let outcome = self.executor.execute(date, &symbol, direction, quantity)?;
                Ok(SessionOutcome::Traded(outcome))
            }
            TradeDecision::Hold { reason } => {
                info!("{}: model holds ({})", date, reason);
                if self.dry_run {
                    return Ok(SessionOutcome::Skipped);
                }
                self.ledger.append_no_trade(date)?;
                Ok(SessionOutcome::Held)
            }
        }
    }

    fn build_context(&self, date: &str) -> SessionContext {
        let symbols = self.ledger.symbols().to_vec();

        let prior = self.ledger.init_position_for_date(date);
        let prev_day = self.calendar.previous_trading_day(date);
        let (y_open, y_close) = self.store.open_and_close_prices(&prev_day, &symbols);
        let yesterday_profit = settlement::yesterday_profit(&y_open, &y_close, &prior, &symbols);

        let today_open = self.store.open_prices(date, &symbols);
        let names = self.store.name_map(Some(&symbols));

        let (positions, _) = self.ledger.base_position(date);
        let cash = positions.get(CASH).copied().unwrap_or(Decimal::ZERO);

        SessionContext {
            date: date.to_string(),
            positions,
            cash,
            today_open,
            yesterday_profit,
            names,
        }
    }

    /// Append the exchange to `<base>/<signature>/log/<date>/log.jsonl`.
    /// Logging never fails a session; problems are warned and dropped.
    async fn log_session(&self, date: &str, ctx: &SessionContext, decision: &TradeDecision) {
        let user = serde_json::json!({
            "date": ctx.date,
            "cash": ctx.cash,
            "positions": ctx.positions,
            "today_open": ctx.today_open,
            "yesterday_profit": ctx.yesterday_profit,
        });
        let assistant = match decision {
            TradeDecision::Trade {
                symbol,
                direction,
                quantity,
                reason,
            } => serde_json::json!({
                "action": direction.as_str(),
                "symbol": symbol,
                "quantity": quantity,
                "reason": reason,
            }),
            TradeDecision::Hold { reason } => {
                serde_json::json!({"action": "hold", "reason": reason})
            }
        };
        let record = SessionRecord {
            timestamp: Utc::now(),
            signature: self.signature.clone(),
            entries: vec![
                SessionEntry {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
                SessionEntry {
                    role: "assistant".to_string(),
                    content: assistant.to_string(),
                },
            ],
        };

        let path = self.config.session_log_file(&self.signature, date);
        if let Err(e) = Self::append_jsonl(&path, &record).await {
            warn!("Failed to write session log {}: {}", path.display(), e);
        } else {
            debug!("Session log appended for {}", date);
        }
    }

    async fn append_jsonl(path: &std::path::Path, record: &SessionRecord) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        let line = serde_json::to_string(record)?;
        file.write_all(format!("{}\n", line).as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Holdings view for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct PositionSummary {
    pub date: String,
    pub cash: Decimal,
    pub holdings: Vec<Holding>,
    pub record_count: usize,
    pub latest_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Holding {
    pub symbol: String,
    pub shares: Decimal,
    pub name: String,
}

/// Resolve the account state as of `date` into a display-ready summary.
pub fn position_summary(ledger: &Ledger, store: &PriceStore, date: &str) -> PositionSummary {
    let (positions, latest_id) = ledger.latest_position(date);
    let names = store.name_map(None);
    let cash = positions.get(CASH).copied().unwrap_or(Decimal::ZERO);
    let holdings = positions
        .iter()
        .filter(|(symbol, shares)| symbol.as_str() != CASH && **shares > Decimal::ZERO)
        .map(|(symbol, shares)| Holding {
            symbol: symbol.clone(),
            shares: *shares,
            name: names.get(symbol).cloned().unwrap_or_default(),
        })
        .collect();
    PositionSummary {
        date: date.to_string(),
        cash,
        holdings,
        record_count: ledger.snapshots().len(),
        latest_id,
    }
}
