//! Read model builders fed from published envelopes.
//!
//! Projections are disposable; the event streams are the source of truth.
//! Each projection tracks a per-stream cursor so at-least-once delivery
//! (duplicates, replays) is safe.

pub mod stock_history;
pub mod warehouse_stock;

pub use stock_history::{StockHistoryEntry, StockHistoryFilter, StockHistoryProjection};
pub use warehouse_stock::{StockLevels, StockLevelsProjection};
