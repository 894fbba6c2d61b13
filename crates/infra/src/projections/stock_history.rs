//! Stock ledger: the append-only audit trail of quantity adjustments.
//!
//! The counters on the stock aggregate are a materialized, overwritable
//! projection; this ledger is the record of *why* a count is what it is.
//! Entries are only ever appended — one per history-relevant adjustment —
//! and never mutated or deleted.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;

use stockpile_catalog::ProductId;
use stockpile_core::{AggregateId, TenantId};
use stockpile_events::EventEnvelope;
use stockpile_inventory::{CombinationId, StockEvent, WarehouseId};

use crate::STOCK_AGGREGATE_TYPE;

/// Immutable audit record for one accepted adjustment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockHistoryEntry {
    pub product_id: ProductId,
    pub warehouse_id: Option<WarehouseId>,
    pub combination_id: Option<CombinationId>,
    /// Signed delta the operation applied.
    pub quantity_adjustment: i64,
    /// Stock counter value after the adjustment.
    pub stock_quantity: i64,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

/// Optional narrowing of a ledger query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StockHistoryFilter {
    pub warehouse_id: Option<WarehouseId>,
    pub combination_id: Option<CombinationId>,
}

impl StockHistoryFilter {
    pub fn for_warehouse(warehouse_id: WarehouseId) -> Self {
        Self {
            warehouse_id: Some(warehouse_id),
            ..Self::default()
        }
    }

    pub fn for_combination(combination_id: CombinationId) -> Self {
        Self {
            combination_id: Some(combination_id),
            ..Self::default()
        }
    }

    fn matches(&self, entry: &StockHistoryEntry) -> bool {
        if let Some(warehouse_id) = self.warehouse_id {
            if entry.warehouse_id != Some(warehouse_id) {
                return false;
            }
        }
        if let Some(combination_id) = self.combination_id {
            if entry.combination_id != Some(combination_id) {
                return false;
            }
        }
        true
    }
}

/// Tenant+aggregate cursor to support at-least-once delivery (idempotent projection).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

#[derive(Debug, Error)]
pub enum StockHistoryProjectionError {
    #[error("failed to deserialize stock event: {0}")]
    Deserialize(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Stock ledger projection.
///
/// Consumes published envelopes (JSON payloads) and appends one entry for
/// each event that carries history semantics: simple adjustments, variant
/// adjustments, bookings, and booking reversals. Reservation and release
/// events move counters without touching the ledger.
#[derive(Debug, Default)]
pub struct StockHistoryProjection {
    entries: RwLock<HashMap<(TenantId, ProductId), Vec<StockHistoryEntry>>>,
    cursors: RwLock<HashMap<CursorKey, u64>>,
}

impl StockHistoryProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger entries for one product, newest first, optionally narrowed by
    /// warehouse and/or combination.
    pub fn entries(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        filter: StockHistoryFilter,
    ) -> Vec<StockHistoryEntry> {
        let map = match self.entries.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };

        map.get(&(tenant_id, product_id))
            .map(|entries| {
                entries
                    .iter()
                    .rev()
                    .filter(|e| filter.matches(e))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Apply a published envelope into the ledger.
    ///
    /// - Envelopes from other aggregate types are skipped
    /// - Tenant isolation is enforced at the event level
    /// - Idempotent for at-least-once delivery (replays <= cursor are ignored)
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), StockHistoryProjectionError> {
        if envelope.aggregate_type() != STOCK_AGGREGATE_TYPE {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let Ok(mut cursors) = self.cursors.write() else {
            return Ok(());
        };

        // Cursor check (per tenant + aggregate stream).
        let key = CursorKey {
            tenant_id,
            aggregate_id,
        };
        let last = *cursors.get(&key).unwrap_or(&0);

        if seq == 0 {
            return Err(StockHistoryProjectionError::NonMonotonicSequence { last, found: seq });
        }

        if seq <= last {
            // Duplicate or replay; safe to ignore.
            return Ok(());
        }

        if seq != last + 1 && last != 0 {
            // The first event may carry any positive sequence; afterwards we
            // enforce strict monotonic increments.
            return Err(StockHistoryProjectionError::NonMonotonicSequence { last, found: seq });
        }

        let event: StockEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| StockHistoryProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, product_id) = stream_identity(&event);
        if event_tenant != tenant_id {
            return Err(StockHistoryProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if product_id.0 != aggregate_id {
            return Err(StockHistoryProjectionError::TenantIsolation(
                "event product_id does not match envelope aggregate_id".to_string(),
            ));
        }

        if let Some(entry) = ledger_entry(&event) {
            if let Ok(mut entries) = self.entries.write() {
                entries.entry((tenant_id, product_id)).or_default().push(entry);
            }
        }

        cursors.insert(key, seq);
        Ok(())
    }
}

fn stream_identity(event: &StockEvent) -> (TenantId, ProductId) {
    match event {
        StockEvent::StockInitialized(e) => (e.tenant_id, e.product_id),
        StockEvent::TrackingConfigured(e) => (e.tenant_id, e.product_id),
        StockEvent::WarehouseStockRegistered(e) => (e.tenant_id, e.product_id),
        StockEvent::CombinationRegistered(e) => (e.tenant_id, e.product_id),
        StockEvent::StockAdjusted(e) => (e.tenant_id, e.product_id),
        StockEvent::CombinationStockAdjusted(e) => (e.tenant_id, e.product_id),
        StockEvent::InventoryReserved(e) => (e.tenant_id, e.product_id),
        StockEvent::ReservedInventoryReleased(e) => (e.tenant_id, e.product_id),
        StockEvent::WarehouseStockReceived(e) => (e.tenant_id, e.product_id),
        StockEvent::ReservedInventoryBooked(e) => (e.tenant_id, e.product_id),
        StockEvent::BookedInventoryReversed(e) => (e.tenant_id, e.product_id),
    }
}

fn ledger_entry(event: &StockEvent) -> Option<StockHistoryEntry> {
    match event {
        StockEvent::StockAdjusted(e) => Some(StockHistoryEntry {
            product_id: e.product_id,
            warehouse_id: None,
            combination_id: None,
            quantity_adjustment: e.delta,
            stock_quantity: e.stock_quantity,
            message: e.message.clone(),
            occurred_at: e.occurred_at,
        }),
        StockEvent::CombinationStockAdjusted(e) => Some(StockHistoryEntry {
            product_id: e.product_id,
            warehouse_id: None,
            combination_id: Some(e.combination_id),
            quantity_adjustment: e.delta,
            stock_quantity: e.stock_quantity,
            message: e.message.clone(),
            occurred_at: e.occurred_at,
        }),
        StockEvent::ReservedInventoryBooked(e) => Some(StockHistoryEntry {
            product_id: e.product_id,
            warehouse_id: Some(e.warehouse_id),
            combination_id: None,
            quantity_adjustment: e.quantity,
            stock_quantity: e.stock_quantity,
            message: e.message.clone(),
            occurred_at: e.occurred_at,
        }),
        StockEvent::BookedInventoryReversed(e) => Some(StockHistoryEntry {
            product_id: e.product_id,
            warehouse_id: Some(e.warehouse_id),
            combination_id: None,
            quantity_adjustment: e.quantity,
            stock_quantity: e.stock_quantity,
            message: e.message.clone(),
            occurred_at: e.occurred_at,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stockpile_core::AggregateId;
    use stockpile_inventory::{InventoryReserved, ReservedInventoryBooked, StockAdjusted};
    use uuid::Uuid;

    fn envelope(
        tenant_id: TenantId,
        product_id: ProductId,
        seq: u64,
        event: &StockEvent,
    ) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            product_id.0,
            STOCK_AGGREGATE_TYPE,
            seq,
            serde_json::to_value(event).unwrap(),
        )
    }

    fn adjusted(tenant_id: TenantId, product_id: ProductId, delta: i64, resulting: i64) -> StockEvent {
        StockEvent::StockAdjusted(StockAdjusted {
            tenant_id,
            product_id,
            delta,
            stock_quantity: resulting,
            message: "adjustment".to_string(),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn records_one_entry_per_history_event() {
        let projection = StockHistoryProjection::new();
        let tenant_id = TenantId::new();
        let product_id = ProductId::new(AggregateId::new());

        projection
            .apply_envelope(&envelope(tenant_id, product_id, 1, &adjusted(tenant_id, product_id, 5, 5)))
            .unwrap();
        // Reservations move counters but never touch the ledger.
        projection
            .apply_envelope(&envelope(
                tenant_id,
                product_id,
                2,
                &StockEvent::InventoryReserved(InventoryReserved {
                    tenant_id,
                    product_id,
                    warehouse_id: WarehouseId::new(),
                    quantity: 3,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();

        let entries = projection.entries(tenant_id, product_id, StockHistoryFilter::default());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].quantity_adjustment, 5);
        assert_eq!(entries[0].stock_quantity, 5);
    }

    #[test]
    fn entries_come_back_newest_first() {
        let projection = StockHistoryProjection::new();
        let tenant_id = TenantId::new();
        let product_id = ProductId::new(AggregateId::new());

        projection
            .apply_envelope(&envelope(tenant_id, product_id, 1, &adjusted(tenant_id, product_id, 20, 20)))
            .unwrap();
        projection
            .apply_envelope(&envelope(tenant_id, product_id, 2, &adjusted(tenant_id, product_id, -7, 13)))
            .unwrap();

        let entries = projection.entries(tenant_id, product_id, StockHistoryFilter::default());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].quantity_adjustment, -7);
        assert_eq!(entries[1].quantity_adjustment, 20);
    }

    #[test]
    fn duplicate_envelopes_are_ignored() {
        let projection = StockHistoryProjection::new();
        let tenant_id = TenantId::new();
        let product_id = ProductId::new(AggregateId::new());

        let env = envelope(tenant_id, product_id, 1, &adjusted(tenant_id, product_id, 5, 5));
        projection.apply_envelope(&env).unwrap();
        projection.apply_envelope(&env).unwrap();

        let entries = projection.entries(tenant_id, product_id, StockHistoryFilter::default());
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn filter_narrows_by_warehouse() {
        let projection = StockHistoryProjection::new();
        let tenant_id = TenantId::new();
        let product_id = ProductId::new(AggregateId::new());
        let warehouse_id = WarehouseId::new();

        projection
            .apply_envelope(&envelope(tenant_id, product_id, 1, &adjusted(tenant_id, product_id, 5, 5)))
            .unwrap();
        projection
            .apply_envelope(&envelope(
                tenant_id,
                product_id,
                2,
                &StockEvent::ReservedInventoryBooked(ReservedInventoryBooked {
                    tenant_id,
                    product_id,
                    warehouse_id,
                    quantity: -2,
                    stock_quantity: 3,
                    message: "booked".to_string(),
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();

        let entries =
            projection.entries(tenant_id, product_id, StockHistoryFilter::for_warehouse(warehouse_id));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].warehouse_id, Some(warehouse_id));
        assert_eq!(entries[0].quantity_adjustment, -2);
    }

    #[test]
    fn foreign_aggregate_types_are_skipped() {
        let projection = StockHistoryProjection::new();
        let tenant_id = TenantId::new();
        let product_id = ProductId::new(AggregateId::new());

        let env = EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            product_id.0,
            crate::PRODUCT_AGGREGATE_TYPE,
            1,
            serde_json::json!({"not": "a stock event"}),
        );
        projection.apply_envelope(&env).unwrap();
        assert!(projection
            .entries(tenant_id, product_id, StockHistoryFilter::default())
            .is_empty());
    }

    #[test]
    fn sequence_gaps_are_rejected() {
        let projection = StockHistoryProjection::new();
        let tenant_id = TenantId::new();
        let product_id = ProductId::new(AggregateId::new());

        projection
            .apply_envelope(&envelope(tenant_id, product_id, 1, &adjusted(tenant_id, product_id, 5, 5)))
            .unwrap();
        let err = projection
            .apply_envelope(&envelope(tenant_id, product_id, 3, &adjusted(tenant_id, product_id, 1, 6)))
            .unwrap_err();
        match err {
            StockHistoryProjectionError::NonMonotonicSequence { last: 1, found: 3 } => {}
            other => panic!("Expected NonMonotonicSequence error, got {other:?}"),
        }
    }
}
