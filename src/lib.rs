//! A-share LLM Trading Agent
//!
//! A simulated-market autonomous trading agent: an LLM decides one action
//! per trading day against an append-only position ledger.
//!
//! ## Architecture
//!
//! ```text
//! PriceStore (JSONL bars) → TradingCalendar → Agent (session driver)
//!                                               ↓            ↓
//!                                    DecisionModel (LLM)  Executor → Ledger (JSONL)
//!                                               ↓
//!                                     Settlement (costs, attribution)
//! ```

pub mod agent;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod ledger;
pub mod market;
pub mod model;
pub mod settlement;
pub mod types;

#[cfg(test)]
mod config_tests;
