//! Market data: price history store and trading-day calendar.

pub mod calendar;
pub mod store;

pub use calendar::{DayVerdict, TradingCalendar};
pub use store::PriceStore;
