//! Transaction costs and overnight profit attribution.
//!
//! All money math is `Decimal`; the fee schedule below reproduces
//! mainland brokerage conventions exactly, so tests assert equality
//! rather than tolerance.

use crate::types::{Direction, Positions, SHANGHAI_SUFFIX};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::BTreeMap;

/// Commission rate charged both ways.
pub const COMMISSION_RATE: Decimal = dec!(0.0003);
/// Per-trade commission floor.
pub const MIN_COMMISSION: Decimal = dec!(5.0);
/// Stamp tax, levied on sells only.
pub const STAMP_TAX_RATE: Decimal = dec!(0.001);
/// Transfer fee for Shanghai-listed symbols, both ways.
pub const TRANSFER_FEE_RATE: Decimal = dec!(0.00001);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeCostBreakdown {
    pub commission: Decimal,
    pub stamp_tax: Decimal,
    pub transfer_fee: Decimal,
    pub total_cost: Decimal,
}

/// Full fee breakdown for one fill at `price` x `quantity`.
pub fn trade_cost(
    symbol: &str,
    price: Decimal,
    quantity: Decimal,
    direction: Direction,
) -> TradeCostBreakdown {
    let value = price * quantity;
    let commission = (value * COMMISSION_RATE).max(MIN_COMMISSION);
    let stamp_tax = match direction {
        Direction::Sell => value * STAMP_TAX_RATE,
        Direction::Buy => Decimal::ZERO,
    };
    let transfer_fee = if symbol.ends_with(SHANGHAI_SUFFIX) {
        value * TRANSFER_FEE_RATE
    } else {
        Decimal::ZERO
    };
    TradeCostBreakdown {
        commission,
        stamp_tax,
        transfer_fee,
        total_cost: commission + stamp_tax + transfer_fee,
    }
}

/// Per-symbol profit over the prior session: (close - open) x held shares,
/// rounded to 4 decimal places. Every requested symbol gets an entry;
/// anything unpriceable (missing open or close) or unheld contributes
/// zero rather than being dropped, so downstream reports stay rectangular.
pub fn yesterday_profit(
    open_prices: &BTreeMap<String, Option<Decimal>>,
    close_prices: &BTreeMap<String, Option<Decimal>>,
    prior_positions: &Positions,
    symbols: &[String],
) -> BTreeMap<String, Decimal> {
    let mut profits = BTreeMap::new();
    for symbol in symbols {
        let held = prior_positions
            .get(symbol)
            .copied()
            .unwrap_or(Decimal::ZERO);
        let open = open_prices.get(symbol).copied().flatten();
        let close = close_prices.get(symbol).copied().flatten();
        let profit = match (open, close) {
            (Some(open), Some(close)) if held > Decimal::ZERO => {
                ((close - open) * held).round_dp(4)
            }
            _ => Decimal::ZERO,
        };
        profits.insert(symbol.clone(), profit);
    }
    profits
}
