//! Application-level inventory orchestration.
//!
//! `InventoryService` ties the pieces together: it dispatches catalog and
//! stock commands, walks bundle components, feeds the low-stock policy's
//! verdict back to the catalog, and fires best-effort notifications. All
//! configuration arrives through [`InventoryConfig`] at construction; there
//! is no ambient global state to resolve against.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;
use thiserror::Error;

use stockpile_catalog::{
    CreateProduct, Product, ProductCommand, ProductId, SetBuyButtonDisabled, SetPublished,
    StockSettings, UpdateStockSettings,
};
use stockpile_core::TenantId;
use stockpile_events::{EventBus, EventEnvelope};
use stockpile_inventory::{
    AdjustInventory, AttributeSelection, BookReservedInventory, CombinationId, ConfigureTracking,
    InitStock, InventoryConfig, InventoryMethod, LowStockState, ProductStock, RegisterCombination,
    RegisterWarehouseStock, ReserveInventory, ReverseBookedInventory, Shipment, ShipmentItem,
    StockCommand, StockEvent, UnblockReservedInventory, WarehouseId, evaluate_low_stock,
    notification_due,
};

use crate::dispatcher::{CommandDispatcher, DispatchError, apply_history};
use crate::event_store::{EventStore, EventStoreError, StoredEvent};
use crate::notify::LowStockNotifier;
use crate::{PRODUCT_AGGREGATE_TYPE, STOCK_AGGREGATE_TYPE};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("command dispatch failed: {0:?}")]
    Dispatch(DispatchError),

    #[error(transparent)]
    Store(#[from] EventStoreError),

    #[error("failed to decode event payload: {0}")]
    Deserialize(String),

    #[error("bundle recursion exceeded the configured depth ({max_depth}) at product {product_id}")]
    BundleTooDeep {
        product_id: ProductId,
        max_depth: u32,
    },
}

impl From<DispatchError> for ServiceError {
    fn from(value: DispatchError) -> Self {
        Self::Dispatch(value)
    }
}

/// Inventory orchestration over an event store and bus.
///
/// Adjustments run synchronously to completion; there is no cancellation and
/// no retry here. A failure between the primary adjustment and a bundle
/// component leaves the earlier appends standing — callers own rollback
/// semantics, matching the storage collaborator's per-append atomicity.
pub struct InventoryService<S, B> {
    dispatcher: CommandDispatcher<S, B>,
    store: S,
    notifier: Arc<dyn LowStockNotifier>,
    config: InventoryConfig,
}

impl<S, B> InventoryService<S, B>
where
    S: EventStore + Clone,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        store: S,
        bus: B,
        notifier: Arc<dyn LowStockNotifier>,
        config: InventoryConfig,
    ) -> Self {
        Self {
            dispatcher: CommandDispatcher::new(store.clone(), bus),
            store,
            notifier,
            config,
        }
    }

    pub fn config(&self) -> &InventoryConfig {
        &self.config
    }

    // ---- catalog setup ----------------------------------------------------

    pub fn create_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        sku: impl Into<String>,
        name: impl Into<String>,
        stock_settings: Option<StockSettings>,
    ) -> Result<(), ServiceError> {
        self.dispatch_product(
            tenant_id,
            product_id,
            ProductCommand::CreateProduct(CreateProduct {
                tenant_id,
                product_id,
                sku: sku.into(),
                name: name.into(),
                stock_settings,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    pub fn update_stock_settings(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        settings: StockSettings,
    ) -> Result<(), ServiceError> {
        self.dispatch_product(
            tenant_id,
            product_id,
            ProductCommand::UpdateStockSettings(UpdateStockSettings {
                tenant_id,
                product_id,
                settings,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    // ---- stock setup ------------------------------------------------------

    pub fn init_stock(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        method: InventoryMethod,
        multiple_warehouses: bool,
    ) -> Result<(), ServiceError> {
        self.dispatch_stock(
            tenant_id,
            product_id,
            StockCommand::InitStock(InitStock {
                tenant_id,
                product_id,
                method,
                multiple_warehouses,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    pub fn configure_tracking(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        method: InventoryMethod,
        multiple_warehouses: bool,
    ) -> Result<(), ServiceError> {
        self.dispatch_stock(
            tenant_id,
            product_id,
            StockCommand::ConfigureTracking(ConfigureTracking {
                tenant_id,
                product_id,
                method,
                multiple_warehouses,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    pub fn register_warehouse_stock(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        stock_quantity: i64,
        reserved_quantity: i64,
    ) -> Result<(), ServiceError> {
        self.dispatch_stock(
            tenant_id,
            product_id,
            StockCommand::RegisterWarehouseStock(RegisterWarehouseStock {
                tenant_id,
                product_id,
                warehouse_id,
                stock_quantity,
                reserved_quantity,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    pub fn register_combination(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        combination_id: CombinationId,
        stock_quantity: i64,
        notify_quantity_below: i64,
    ) -> Result<(), ServiceError> {
        self.dispatch_stock(
            tenant_id,
            product_id,
            StockCommand::RegisterCombination(RegisterCombination {
                tenant_id,
                product_id,
                combination_id,
                stock_quantity,
                notify_quantity_below,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    // ---- adjustments ------------------------------------------------------

    /// Apply a signed quantity delta to a product, then to every bundle
    /// component referenced by the attribute selection (scaled by each
    /// component's multiplier).
    ///
    /// Components are walked with a visited set — a malformed bundle graph
    /// that cycles back is skipped, not recursed — and a configured depth
    /// ceiling, which surfaces as [`ServiceError::BundleTooDeep`].
    pub fn adjust_inventory(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        delta: i64,
        selection: &AttributeSelection,
        message: &str,
    ) -> Result<(), ServiceError> {
        let mut visited = HashSet::new();
        self.adjust_recursive(tenant_id, product_id, delta, selection, message, 0, &mut visited)
    }

    fn adjust_recursive(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        delta: i64,
        selection: &AttributeSelection,
        message: &str,
        depth: u32,
        visited: &mut HashSet<ProductId>,
    ) -> Result<(), ServiceError> {
        if depth > self.config.max_bundle_depth {
            return Err(ServiceError::BundleTooDeep {
                product_id,
                max_depth: self.config.max_bundle_depth,
            });
        }
        if !visited.insert(product_id) {
            tracing::warn!(%product_id, "bundle component cycle detected, skipping repeat adjustment");
            return Ok(());
        }

        tracing::debug!(%product_id, delta, depth, "adjusting inventory");
        self.dispatch_stock(
            tenant_id,
            product_id,
            StockCommand::AdjustInventory(AdjustInventory {
                tenant_id,
                product_id,
                delta,
                combination_id: selection.combination_id,
                message: message.to_string(),
                occurred_at: Utc::now(),
            }),
        )?;

        self.apply_stock_side_effects(tenant_id, product_id, delta, selection)?;

        for component in &selection.associated {
            self.adjust_recursive(
                tenant_id,
                component.product_id,
                delta * component.quantity,
                &AttributeSelection::none(),
                message,
                depth + 1,
                visited,
            )?;
        }

        Ok(())
    }

    /// Recompute availability after an adjustment, feed the low-stock policy
    /// back to the catalog, and fire best-effort notifications.
    fn apply_stock_side_effects(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        delta: i64,
        selection: &AttributeSelection,
    ) -> Result<(), ServiceError> {
        let stock = self.load_stock(tenant_id, product_id)?;

        match stock.method() {
            InventoryMethod::Track => {
                let available = stock.total_available();

                let Some(product) = self.load_product(tenant_id, product_id)? else {
                    tracing::debug!(%product_id, "no catalog record for adjusted stock, skipping low-stock policy");
                    return Ok(());
                };
                let settings = *product.stock_settings();
                let current = LowStockState {
                    published: product.published(),
                    buy_button_disabled: product.buy_button_disabled(),
                };

                let desired = evaluate_low_stock(available, &settings, &self.config, current);
                if desired.published != current.published {
                    self.dispatch_product(
                        tenant_id,
                        product_id,
                        ProductCommand::SetPublished(SetPublished {
                            tenant_id,
                            product_id,
                            published: desired.published,
                            occurred_at: Utc::now(),
                        }),
                    )?;
                }
                if desired.buy_button_disabled != current.buy_button_disabled {
                    self.dispatch_product(
                        tenant_id,
                        product_id,
                        ProductCommand::SetBuyButtonDisabled(SetBuyButtonDisabled {
                            tenant_id,
                            product_id,
                            disabled: desired.buy_button_disabled,
                            occurred_at: Utc::now(),
                        }),
                    )?;
                }

                if notification_due(delta, available, settings.notify_quantity_below) {
                    if let Err(error) = self.notifier.product_low(
                        tenant_id,
                        product_id,
                        available,
                        settings.notify_quantity_below,
                    ) {
                        tracing::warn!(%product_id, %error, "low-stock notification failed");
                    }
                }
            }
            InventoryMethod::TrackByCombination => {
                let Some(combination_id) = selection.combination_id else {
                    return Ok(());
                };
                let Some(combination) = stock.combination(combination_id) else {
                    return Ok(());
                };
                if notification_due(
                    delta,
                    combination.stock_quantity,
                    combination.notify_quantity_below,
                ) {
                    if let Err(error) = self.notifier.combination_low(
                        tenant_id,
                        product_id,
                        combination_id,
                        combination.stock_quantity,
                        combination.notify_quantity_below,
                    ) {
                        tracing::warn!(%product_id, %combination_id, %error, "low-stock notification failed");
                    }
                }
            }
            InventoryMethod::NotTracked => {}
        }

        Ok(())
    }

    // ---- reservation lifecycle --------------------------------------------

    pub fn reserve_inventory(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<(), ServiceError> {
        self.dispatch_stock(
            tenant_id,
            product_id,
            StockCommand::ReserveInventory(ReserveInventory {
                tenant_id,
                product_id,
                quantity,
                occurred_at: Utc::now(),
            }),
        )?;

        let stock = self.load_stock(tenant_id, product_id)?;
        if stock.total_available() < 0 {
            tracing::warn!(
                %product_id,
                shortfall = -stock.total_available(),
                "reservation overcommitted available stock"
            );
        }
        Ok(())
    }

    pub fn unblock_reserved_inventory(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<(), ServiceError> {
        self.dispatch_stock(
            tenant_id,
            product_id,
            StockCommand::UnblockReservedInventory(UnblockReservedInventory {
                tenant_id,
                product_id,
                quantity,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    pub fn book_reserved_inventory(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        quantity: i64,
        message: &str,
    ) -> Result<(), ServiceError> {
        self.dispatch_stock(
            tenant_id,
            product_id,
            StockCommand::BookReservedInventory(BookReservedInventory {
                tenant_id,
                product_id,
                warehouse_id,
                quantity,
                message: message.to_string(),
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    /// Reverse a previously booked shipment item; returns the quantity
    /// actually handed back (zero when the shipment never shipped, the
    /// product is not tracked per warehouse, or the record is unknown).
    pub fn reverse_booked_inventory(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        shipment: &Shipment,
        item: &ShipmentItem,
        message: &str,
    ) -> Result<i64, ServiceError> {
        let committed = self.dispatch_stock(
            tenant_id,
            product_id,
            StockCommand::ReverseBookedInventory(ReverseBookedInventory {
                tenant_id,
                product_id,
                warehouse_id: item.warehouse_id,
                quantity: item.quantity,
                shipped_at: shipment.shipped_at,
                message: message.to_string(),
                occurred_at: Utc::now(),
            }),
        )?;

        let mut reversed = 0;
        for stored in &committed {
            let event: StockEvent = serde_json::from_value(stored.payload.clone())
                .map_err(|e| ServiceError::Deserialize(e.to_string()))?;
            if let StockEvent::BookedInventoryReversed(e) = event {
                reversed += e.quantity;
            }
        }
        Ok(reversed)
    }

    // ---- queries ----------------------------------------------------------

    pub fn total_available(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<i64, ServiceError> {
        Ok(self.load_stock(tenant_id, product_id)?.total_available())
    }

    /// Rehydrate the current stock state for a product.
    pub fn load_stock(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<ProductStock, ServiceError> {
        let history = self
            .store
            .load_stream(tenant_id, STOCK_AGGREGATE_TYPE, product_id.0)?;
        let mut aggregate = ProductStock::empty(product_id);
        apply_history::<ProductStock>(&mut aggregate, &history).map_err(ServiceError::Dispatch)?;
        Ok(aggregate)
    }

    /// Rehydrate the current catalog state for a product, or `None` when the
    /// product has no catalog stream.
    pub fn load_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<Option<Product>, ServiceError> {
        let history = self
            .store
            .load_stream(tenant_id, PRODUCT_AGGREGATE_TYPE, product_id.0)?;
        if history.is_empty() {
            return Ok(None);
        }
        let mut product = Product::empty(product_id);
        apply_history::<Product>(&mut product, &history).map_err(ServiceError::Dispatch)?;
        Ok(Some(product))
    }

    // ---- internals --------------------------------------------------------

    fn dispatch_stock(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        command: StockCommand,
    ) -> Result<Vec<StoredEvent>, ServiceError> {
        Ok(self.dispatcher.dispatch::<ProductStock>(
            tenant_id,
            product_id.0,
            STOCK_AGGREGATE_TYPE,
            command,
            |_tenant, id| ProductStock::empty(ProductId::new(id)),
        )?)
    }

    fn dispatch_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        command: ProductCommand,
    ) -> Result<Vec<StoredEvent>, ServiceError> {
        Ok(self.dispatcher.dispatch::<Product>(
            tenant_id,
            product_id.0,
            PRODUCT_AGGREGATE_TYPE,
            command,
            |_tenant, id| Product::empty(ProductId::new(id)),
        )?)
    }
}
