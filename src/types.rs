//! Wire types shared across the agent.
//!
//! Two line-delimited JSON formats live here: the price-history store
//! (one `PriceRecord` per line, Alpha-Vantage-style numbered field names)
//! and the position ledger (one `PositionSnapshot` per line). Field names
//! and ordering match the files already on disk, so existing data keeps
//! parsing.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Key for the cash balance inside a positions mapping.
pub const CASH: &str = "CASH";

/// Exchange suffix for Shanghai-listed symbols (transfer fee applies).
pub const SHANGHAI_SUFFIX: &str = ".SH";

/// SSE 50 constituents, the default tracked universe.
pub const SSE50_SYMBOLS: &[&str] = &[
    "600519.SH", "601318.SH", "600036.SH", "601899.SH", "600900.SH",
    "601166.SH", "600276.SH", "600030.SH", "603259.SH", "688981.SH",
    "688256.SH", "601398.SH", "688041.SH", "601211.SH", "601288.SH",
    "601328.SH", "688008.SH", "600887.SH", "600150.SH", "601816.SH",
    "601127.SH", "600031.SH", "688012.SH", "603501.SH", "601088.SH",
    "600309.SH", "601601.SH", "601668.SH", "603993.SH", "601012.SH",
    "601728.SH", "600690.SH", "600809.SH", "600941.SH", "600406.SH",
    "601857.SH", "601766.SH", "601919.SH", "600050.SH", "600760.SH",
    "601225.SH", "600028.SH", "601988.SH", "688111.SH", "601985.SH",
    "601888.SH", "601628.SH", "601600.SH", "601658.SH", "600048.SH",
];

/// Positions mapping: symbol (or [`CASH`]) to quantity. Share counts are
/// whole numbers; the cash entry is a currency amount. BTreeMap keeps the
/// serialized form deterministic, which matters for an append-only audit
/// file.
pub type Positions = BTreeMap<String, Decimal>;

/// Trade side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Buy => "buy",
            Direction::Sell => "sell",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The action that produced a ledger snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeAction {
    pub action: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub amount: Decimal,
}

impl TradeAction {
    pub fn new(action: impl Into<String>, symbol: impl Into<String>, amount: Decimal) -> Self {
        Self {
            action: action.into(),
            symbol: symbol.into(),
            amount,
        }
    }

    /// The durable "did nothing today" marker.
    pub fn no_trade() -> Self {
        Self::new("no_trade", "", Decimal::ZERO)
    }
}

/// One line of the position ledger.
///
/// Every field is individually defaulted: a partial line still parses and
/// degrades the same way the scans expect (an empty date never matches a
/// date query, an absent id counts as 0).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSnapshot {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub this_action: Option<TradeAction>,
    #[serde(default)]
    pub positions: Positions,
}

impl PositionSnapshot {
    /// Cash balance, zero when the entry is missing.
    pub fn cash(&self) -> Decimal {
        self.positions.get(CASH).copied().unwrap_or(Decimal::ZERO)
    }
}

/// One symbol-date bar from the price store. The numbered field names are
/// the upstream vendor's: "1. buy price" is the open, "4. sell price" the
/// close. Non-numeric values degrade to `None` per field instead of
/// poisoning the whole line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceBar {
    #[serde(
        rename = "1. buy price",
        default,
        deserialize_with = "lenient_decimal",
        skip_serializing_if = "Option::is_none"
    )]
    pub open: Option<Decimal>,
    #[serde(
        rename = "2. high",
        default,
        deserialize_with = "lenient_decimal",
        skip_serializing_if = "Option::is_none"
    )]
    pub high: Option<Decimal>,
    #[serde(
        rename = "3. low",
        default,
        deserialize_with = "lenient_decimal",
        skip_serializing_if = "Option::is_none"
    )]
    pub low: Option<Decimal>,
    #[serde(
        rename = "4. sell price",
        default,
        deserialize_with = "lenient_decimal",
        skip_serializing_if = "Option::is_none"
    )]
    pub close: Option<Decimal>,
    #[serde(
        rename = "5. volume",
        default,
        deserialize_with = "lenient_decimal",
        skip_serializing_if = "Option::is_none"
    )]
    pub volume: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceMeta {
    #[serde(rename = "2. Symbol", default)]
    pub symbol: String,
    #[serde(rename = "2.1. Name", default)]
    pub name: String,
}

/// One line of the price-history store. Daily bars live under
/// "Time Series (Daily)"; any other "Time Series*" key (intraday loads)
/// is kept raw so its timestamps still count for calendar queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceRecord {
    #[serde(rename = "Meta Data", default)]
    pub meta: PriceMeta,
    #[serde(rename = "Time Series (Daily)", default)]
    pub daily: BTreeMap<String, PriceBar>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl PriceRecord {
    /// All timestamps this line knows about, daily and intraday alike.
    pub fn timestamps(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.daily.keys().map(String::as_str).collect();
        for (key, value) in &self.extra {
            if !key.starts_with("Time Series") {
                continue;
            }
            if let Some(series) = value.as_object() {
                out.extend(series.keys().map(String::as_str));
            }
        }
        out
    }

    /// Typed view of every bar on this line. Daily keys win over duplicate
    /// intraday keys; intraday bars that do not decode are dropped.
    pub fn bars(&self) -> BTreeMap<String, PriceBar> {
        let mut out = BTreeMap::new();
        for (key, value) in &self.extra {
            if !key.starts_with("Time Series") {
                continue;
            }
            if let Some(series) = value.as_object() {
                for (ts, raw) in series {
                    if let Ok(bar) = serde_json::from_value::<PriceBar>(raw.clone()) {
                        out.insert(ts.clone(), bar);
                    }
                }
            }
        }
        for (ts, bar) in &self.daily {
            out.insert(ts.clone(), bar.clone());
        }
        out
    }
}

/// Accept a JSON number or numeric string as a `Decimal`; anything else
/// (null, bare words, objects) becomes `None` for that field only.
fn lenient_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(decimal_from_value(&value))
}

pub(crate) fn decimal_from_value(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::Number(n) => n
            .to_string()
            .parse::<Decimal>()
            .ok()
            .or_else(|| n.as_f64().and_then(Decimal::from_f64)),
        serde_json::Value::String(s) => s.trim().parse::<Decimal>().ok(),
        _ => None,
    }
}
