//! Order validation and fills.
//!
//! Orders fill at the session's opening price; there is no intraday
//! book. The executor owns every rejection rule the exchange would
//! apply (board lots, cash, T+1 share availability) so the decision
//! layer can stay advisory.

use crate::error::{AgentError, Result};
use crate::ledger::Ledger;
use crate::market::PriceStore;
use crate::settlement::{self, TradeCostBreakdown};
use crate::types::{Direction, PositionSnapshot, TradeAction, CASH};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;

/// A-share round lot.
pub const BOARD_LOT: Decimal = dec!(100);

pub struct TradeExecutor {
    ledger: Ledger,
    store: PriceStore,
}

/// What a fill did to the account.
#[derive(Debug, Clone)]
pub struct TradeOutcome {
    pub snapshot: PositionSnapshot,
    pub cost: TradeCostBreakdown,
    pub price: Decimal,
}

impl TradeExecutor {
    pub fn new(ledger: Ledger, store: PriceStore) -> Self {
        Self { ledger, store }
    }

    /// Validate and fill one order at today's open, appending the
    /// resulting snapshot to the ledger. Every rejection is an
    /// [`AgentError::Trade`] naming the rule that fired.
    pub fn execute(
        &self,
        date: &str,
        symbol: &str,
        direction: Direction,
        quantity: Decimal,
    ) -> Result<TradeOutcome> {
        if quantity <= Decimal::ZERO || quantity % BOARD_LOT != Decimal::ZERO {
            return Err(AgentError::Trade(format!(
                "order size {} is not a positive multiple of the 100-share board lot",
                quantity
            )));
        }

        let symbols = vec![symbol.to_string()];
        let price = self
            .store
            .open_prices(date, &symbols)
            .get(symbol)
            .copied()
            .flatten()
            .ok_or_else(|| {
                AgentError::Trade(format!("no opening price for {} on {}", symbol, date))
            })?;

        let (mut positions, _) = self.ledger.base_position(date);
        let cash = positions.get(CASH).copied().unwrap_or(Decimal::ZERO);
        let held = positions.get(symbol).copied().unwrap_or(Decimal::ZERO);

        let value = price * quantity;
        let cost = settlement::trade_cost(symbol, price, quantity, direction);

        let (new_cash, new_held) = match direction {
            Direction::Buy => {
                let debit = value + cost.total_cost;
                if debit > cash {
                    return Err(AgentError::Trade(format!(
                        "insufficient cash for {}: need {}, have {}",
                        symbol, debit, cash
                    )));
                }
                (cash - debit, held + quantity)
            }
            Direction::Sell => {
                if held < quantity {
                    return Err(AgentError::Trade(format!(
                        "insufficient shares of {}: want to sell {}, hold {}",
                        symbol, quantity, held
                    )));
                }
                // T+1: shares bought today are locked until tomorrow, so
                // the sellable amount is capped by the day-open holding.
                let at_open = self
                    .ledger
                    .init_position_for_date(date)
                    .get(symbol)
                    .copied()
                    .unwrap_or(Decimal::ZERO);
                let sellable = held.min(at_open);
                if sellable < quantity {
                    return Err(AgentError::Trade(format!(
                        "T+1 lock on {}: only {} of {} held shares sellable today",
                        symbol, sellable, held
                    )));
                }
                let proceeds = value - cost.total_cost;
                (cash + proceeds, held - quantity)
            }
        };

        positions.insert(CASH.to_string(), new_cash);
        // Zero-share entries stay; the ledger keeps the full universe visible.
        positions.insert(symbol.to_string(), new_held);

        let action = TradeAction::new(direction.as_str(), symbol, quantity);
        let snapshot = self.ledger.append(date, action, positions)?;

        info!(
            "Filled {} {} x {} @ {} on {} (fees {})",
            direction, symbol, quantity, price, date, cost.total_cost
        );

        Ok(TradeOutcome {
            snapshot,
            cost,
            price,
        })
    }
}
