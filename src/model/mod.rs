//! Decision models.
//!
//! A model sees one day's [`SessionContext`] and answers with a single
//! [`TradeDecision`]. The production implementation is the
//! chat-completions client in [`llm`]; tests mock the trait instead.

mod llm;

pub use llm::LlmModel;

use crate::error::Result;
use crate::types::{Direction, Positions};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Everything a model gets to see before deciding: the state the account
/// opened with plus this morning's prices and yesterday's attribution.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub date: String,
    /// Positions at the start of the session, cash entry included.
    pub positions: Positions,
    pub cash: Decimal,
    /// Today's open per symbol; `None` when the feed had no usable price.
    pub today_open: BTreeMap<String, Option<Decimal>>,
    /// Prior-session profit per symbol, zero-filled.
    pub yesterday_profit: BTreeMap<String, Decimal>,
    /// Display names keyed by symbol, best effort.
    pub names: BTreeMap<String, String>,
}

/// One day's verdict from a model.
#[derive(Debug, Clone, PartialEq)]
pub enum TradeDecision {
    Trade {
        symbol: String,
        direction: Direction,
        quantity: Decimal,
        reason: String,
    },
    Hold {
        reason: String,
    },
}

/// Trait for daily decision models
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DecisionModel: Send + Sync {
    /// Produce one decision for the session. Errors are retryable;
    /// an answer that decodes but cannot be filled is the executor's
    /// problem, not the model's.
    async fn decide(&self, ctx: &SessionContext) -> Result<TradeDecision>;

    /// Model name for logging
    fn name(&self) -> &str;
}
