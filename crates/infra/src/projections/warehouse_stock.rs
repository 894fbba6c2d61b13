//! Queryable stock levels read model: current counters per product.
//!
//! Disposable and rebuildable from the event stream; stored behind the
//! [`TenantStore`] abstraction so it can sit behind the caching decorator.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use stockpile_catalog::ProductId;
use stockpile_core::{AggregateId, TenantId};
use stockpile_events::EventEnvelope;
use stockpile_inventory::{InventoryMethod, StockEvent, WarehouseId, WarehouseStock};

use crate::STOCK_AGGREGATE_TYPE;
use crate::read_model::TenantStore;

/// Current stock counters for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevels {
    pub product_id: ProductId,
    pub method: InventoryMethod,
    pub multiple_warehouses: bool,
    pub stock_quantity: i64,
    pub warehouses: BTreeMap<WarehouseId, WarehouseStock>,
}

impl StockLevels {
    fn new(product_id: ProductId) -> Self {
        Self {
            product_id,
            method: InventoryMethod::NotTracked,
            multiple_warehouses: false,
            stock_quantity: 0,
            warehouses: BTreeMap::new(),
        }
    }

    /// Total quantity available to promise (mirrors the aggregate's view).
    pub fn total_available(&self) -> i64 {
        match self.method {
            InventoryMethod::Track if self.multiple_warehouses => {
                let stock: i64 = self.warehouses.values().map(|w| w.stock_quantity).sum();
                let reserved: i64 = self.warehouses.values().map(|w| w.reserved_quantity).sum();
                stock - reserved
            }
            InventoryMethod::Track => self.stock_quantity,
            _ => 0,
        }
    }

    fn apply(&mut self, event: &StockEvent) {
        match event {
            StockEvent::StockInitialized(e) => {
                self.method = e.method;
                self.multiple_warehouses = e.multiple_warehouses;
                self.stock_quantity = 0;
            }
            StockEvent::TrackingConfigured(e) => {
                self.method = e.method;
                self.multiple_warehouses = e.multiple_warehouses;
            }
            StockEvent::WarehouseStockRegistered(e) => {
                self.warehouses.insert(
                    e.warehouse_id,
                    WarehouseStock::new(e.stock_quantity, e.reserved_quantity),
                );
            }
            StockEvent::StockAdjusted(e) => {
                self.stock_quantity = e.stock_quantity;
            }
            StockEvent::InventoryReserved(e) => {
                let record = self.warehouses.entry(e.warehouse_id).or_default();
                record.reserved_quantity += e.quantity;
            }
            StockEvent::ReservedInventoryReleased(e) => {
                let record = self.warehouses.entry(e.warehouse_id).or_default();
                record.reserved_quantity -= e.quantity;
            }
            StockEvent::WarehouseStockReceived(e) => {
                let record = self.warehouses.entry(e.warehouse_id).or_default();
                record.stock_quantity += e.quantity;
            }
            StockEvent::ReservedInventoryBooked(e) => {
                let record = self.warehouses.entry(e.warehouse_id).or_default();
                record.stock_quantity = e.stock_quantity;
                record.reserved_quantity = (record.reserved_quantity + e.quantity).max(0);
            }
            StockEvent::BookedInventoryReversed(e) => {
                let record = self.warehouses.entry(e.warehouse_id).or_default();
                record.stock_quantity = e.stock_quantity;
                record.reserved_quantity += e.quantity;
            }
            // Variant counters live on the aggregate; this read model serves
            // the warehouse view.
            StockEvent::CombinationRegistered(_) | StockEvent::CombinationStockAdjusted(_) => {}
        }
    }
}

/// Tenant+aggregate cursor to support at-least-once delivery (idempotent projection).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

#[derive(Debug, Error)]
pub enum StockLevelsProjectionError {
    #[error("failed to deserialize stock event: {0}")]
    Deserialize(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Stock levels projection.
#[derive(Debug)]
pub struct StockLevelsProjection<S>
where
    S: TenantStore<ProductId, StockLevels>,
{
    store: S,
    cursors: RwLock<HashMap<CursorKey, u64>>,
}

impl<S> StockLevelsProjection<S>
where
    S: TenantStore<ProductId, StockLevels>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    /// Query the read model for one tenant/product.
    pub fn get(&self, tenant_id: TenantId, product_id: &ProductId) -> Option<StockLevels> {
        self.store.get(tenant_id, product_id)
    }

    /// List all products for a tenant (disposable read model).
    pub fn list(&self, tenant_id: TenantId) -> Vec<StockLevels> {
        self.store.list(tenant_id)
    }

    /// Apply a published envelope into the projection.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), StockLevelsProjectionError> {
        if envelope.aggregate_type() != STOCK_AGGREGATE_TYPE {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let Ok(mut cursors) = self.cursors.write() else {
            return Ok(());
        };

        let key = CursorKey {
            tenant_id,
            aggregate_id,
        };
        let last = *cursors.get(&key).unwrap_or(&0);

        if seq == 0 {
            return Err(StockLevelsProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            // Duplicate or replay; safe to ignore.
            return Ok(());
        }
        if seq != last + 1 && last != 0 {
            return Err(StockLevelsProjectionError::NonMonotonicSequence { last, found: seq });
        }

        let event: StockEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| StockLevelsProjectionError::Deserialize(e.to_string()))?;

        let product_id = ProductId::new(aggregate_id);
        let mut levels = self
            .store
            .get(tenant_id, &product_id)
            .unwrap_or_else(|| StockLevels::new(product_id));
        levels.apply(&event);
        self.store.upsert(tenant_id, product_id, levels);

        cursors.insert(key, seq);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;
    use stockpile_core::AggregateId;
    use stockpile_inventory::{InventoryReserved, StockInitialized, WarehouseStockRegistered};
    use uuid::Uuid;

    use crate::read_model::InMemoryTenantStore;

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

    fn setup() -> StockLevelsProjection<Arc<InMemoryTenantStore<ProductId, StockLevels>>> {
        StockLevelsProjection::new(Arc::new(InMemoryTenantStore::new()))
    }

    #[test]
    fn builds_levels_from_the_event_stream() {
        let projection = setup();
        let tenant_id = TenantId::new();
        let product_id = ProductId::new(AggregateId::new());
        let warehouse_id = WarehouseId::new();

        projection
            .apply_envelope(&envelope(
                tenant_id,
                product_id,
                1,
                &StockEvent::StockInitialized(StockInitialized {
                    tenant_id,
                    product_id,
                    method: InventoryMethod::Track,
                    multiple_warehouses: true,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();
        projection
            .apply_envelope(&envelope(
                tenant_id,
                product_id,
                2,
                &StockEvent::WarehouseStockRegistered(WarehouseStockRegistered {
                    tenant_id,
                    product_id,
                    warehouse_id,
                    stock_quantity: 10,
                    reserved_quantity: 2,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();
        projection
            .apply_envelope(&envelope(
                tenant_id,
                product_id,
                3,
                &StockEvent::InventoryReserved(InventoryReserved {
                    tenant_id,
                    product_id,
                    warehouse_id,
                    quantity: 3,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();

        let levels = projection.get(tenant_id, &product_id).unwrap();
        assert_eq!(levels.warehouses[&warehouse_id].stock_quantity, 10);
        assert_eq!(levels.warehouses[&warehouse_id].reserved_quantity, 5);
        assert_eq!(levels.total_available(), 5);
    }

    #[test]
    fn duplicate_envelopes_leave_the_model_unchanged() {
        let projection = setup();
        let tenant_id = TenantId::new();
        let product_id = ProductId::new(AggregateId::new());
        let warehouse_id = WarehouseId::new();

        projection
            .apply_envelope(&envelope(
                tenant_id,
                product_id,
                1,
                &StockEvent::StockInitialized(StockInitialized {
                    tenant_id,
                    product_id,
                    method: InventoryMethod::Track,
                    multiple_warehouses: true,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();

        let reserve_env = envelope(
            tenant_id,
            product_id,
            2,
            &StockEvent::InventoryReserved(InventoryReserved {
                tenant_id,
                product_id,
                warehouse_id,
                quantity: 3,
                occurred_at: Utc::now(),
            }),
        );
        projection.apply_envelope(&reserve_env).unwrap();
        projection.apply_envelope(&reserve_env).unwrap();

        let levels = projection.get(tenant_id, &product_id).unwrap();
        assert_eq!(levels.warehouses[&warehouse_id].reserved_quantity, 3);
    }

    #[test]
    fn tenants_do_not_observe_each_other() {
        let projection = setup();
        let tenant_a = TenantId::new();
        let tenant_b = TenantId::new();
        let product_id = ProductId::new(AggregateId::new());

        projection
            .apply_envelope(&envelope(
                tenant_a,
                product_id,
                1,
                &StockEvent::StockInitialized(StockInitialized {
                    tenant_id: tenant_a,
                    product_id,
                    method: InventoryMethod::Track,
                    multiple_warehouses: false,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();

        assert!(projection.get(tenant_a, &product_id).is_some());
        assert!(projection.get(tenant_b, &product_id).is_none());
    }
}
