use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockpile_catalog::ProductId;
use stockpile_core::{Aggregate, AggregateRoot, DomainError, TenantId};
use stockpile_events::Event;

use crate::allocation::{WarehouseStock, plan_release, plan_reservation};
use crate::selection::CombinationId;
use crate::warehouse::WarehouseId;

/// How stock is tracked for a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryMethod {
    /// Quantities are not tracked at all; every operation is a no-op.
    NotTracked,
    /// A single counter per product (optionally spread across warehouses).
    Track,
    /// An independent counter per attribute combination (variant).
    TrackByCombination,
}

/// Per-variant counter, independent of the warehouse model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinationStock {
    pub stock_quantity: i64,
    /// Availability strictly below this triggers an admin notification.
    pub notify_quantity_below: i64,
}

/// Aggregate root: ProductStock.
///
/// One stream per product, keyed by the product's id. Holds the tracking
/// mode, the simple counter, the per-warehouse records and the per-variant
/// counters; every reservation, release and booking is decided here so a
/// single append covers all warehouses an operation touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductStock {
    id: ProductId,
    tenant_id: Option<TenantId>,
    method: InventoryMethod,
    multiple_warehouses: bool,
    stock_quantity: i64,
    warehouses: BTreeMap<WarehouseId, WarehouseStock>,
    combinations: BTreeMap<CombinationId, CombinationStock>,
    version: u64,
    created: bool,
}

impl ProductStock {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            tenant_id: None,
            method: InventoryMethod::NotTracked,
            multiple_warehouses: false,
            stock_quantity: 0,
            warehouses: BTreeMap::new(),
            combinations: BTreeMap::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn method(&self) -> InventoryMethod {
        self.method
    }

    pub fn multiple_warehouses(&self) -> bool {
        self.multiple_warehouses
    }

    pub fn stock_quantity(&self) -> i64 {
        self.stock_quantity
    }

    pub fn warehouses(&self) -> &BTreeMap<WarehouseId, WarehouseStock> {
        &self.warehouses
    }

    pub fn warehouse(&self, warehouse_id: WarehouseId) -> Option<&WarehouseStock> {
        self.warehouses.get(&warehouse_id)
    }

    pub fn combination(&self, combination_id: CombinationId) -> Option<&CombinationStock> {
        self.combinations.get(&combination_id)
    }

    /// Total quantity available to promise.
    ///
    /// Sum of warehouse stock minus reserved when spread across warehouses,
    /// otherwise the simple counter. Untracked and per-combination products
    /// report zero — their availability lives elsewhere.
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

    /// Sum of reserved quantities across all warehouse records.
    pub fn total_reserved(&self) -> i64 {
        self.warehouses.values().map(|w| w.reserved_quantity).sum()
    }
}

impl AggregateRoot for ProductStock {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: InitStock — start tracking inventory for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitStock {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub method: InventoryMethod,
    pub multiple_warehouses: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfigureTracking — change tracking mode for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigureTracking {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub method: InventoryMethod,
    pub multiple_warehouses: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RegisterWarehouseStock — create or replace the per-warehouse
/// record with initial counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterWarehouseStock {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub stock_quantity: i64,
    pub reserved_quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RegisterCombination — create or replace a per-variant counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterCombination {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub combination_id: CombinationId,
    pub stock_quantity: i64,
    pub notify_quantity_below: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustInventory — apply a signed delta (positive restocks,
/// negative consumes), routed by the product's tracking mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustInventory {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub delta: i64,
    pub combination_id: Option<CombinationId>,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReserveInventory — commit quantity to unfulfilled orders.
/// `quantity` must be strictly negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveInventory {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UnblockReservedInventory — hand reserved quantity back.
/// `quantity` must be non-negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnblockReservedInventory {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: BookReservedInventory — turn a reservation into a shipment
/// against a nominated warehouse. `quantity` must be strictly negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookReservedInventory {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReverseBookedInventory — undo a booked shipment item. Only a
/// shipment that actually left (`shipped_at` set) can be reversed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseBookedInventory {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    pub shipped_at: Option<DateTime<Utc>>,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockCommand {
    InitStock(InitStock),
    ConfigureTracking(ConfigureTracking),
    RegisterWarehouseStock(RegisterWarehouseStock),
    RegisterCombination(RegisterCombination),
    AdjustInventory(AdjustInventory),
    ReserveInventory(ReserveInventory),
    UnblockReservedInventory(UnblockReservedInventory),
    BookReservedInventory(BookReservedInventory),
    ReverseBookedInventory(ReverseBookedInventory),
}

/// Event: StockInitialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockInitialized {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub method: InventoryMethod,
    pub multiple_warehouses: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TrackingConfigured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingConfigured {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub method: InventoryMethod,
    pub multiple_warehouses: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: WarehouseStockRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseStockRegistered {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub stock_quantity: i64,
    pub reserved_quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CombinationRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinationRegistered {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub combination_id: CombinationId,
    pub stock_quantity: i64,
    pub notify_quantity_below: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockAdjusted — the simple counter moved. Carries the resulting
/// quantity so the ledger can record it without replaying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub delta: i64,
    pub stock_quantity: i64,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CombinationStockAdjusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinationStockAdjusted {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub combination_id: CombinationId,
    pub delta: i64,
    pub stock_quantity: i64,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InventoryReserved — one per warehouse a reservation touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryReserved {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReservedInventoryReleased — one per warehouse a release touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservedInventoryReleased {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: WarehouseStockReceived — a release surplus that became new stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseStockReceived {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReservedInventoryBooked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservedInventoryBooked {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    /// Negative delta applied to the warehouse's stock.
    pub quantity: i64,
    /// Resulting warehouse stock quantity.
    pub stock_quantity: i64,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BookedInventoryReversed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookedInventoryReversed {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    /// Positive quantity handed back to both stock and reserved.
    pub quantity: i64,
    /// Resulting warehouse stock quantity.
    pub stock_quantity: i64,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockEvent {
    StockInitialized(StockInitialized),
    TrackingConfigured(TrackingConfigured),
    WarehouseStockRegistered(WarehouseStockRegistered),
    CombinationRegistered(CombinationRegistered),
    StockAdjusted(StockAdjusted),
    CombinationStockAdjusted(CombinationStockAdjusted),
    InventoryReserved(InventoryReserved),
    ReservedInventoryReleased(ReservedInventoryReleased),
    WarehouseStockReceived(WarehouseStockReceived),
    ReservedInventoryBooked(ReservedInventoryBooked),
    BookedInventoryReversed(BookedInventoryReversed),
}

impl Event for StockEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockEvent::StockInitialized(_) => "inventory.stock.initialized",
            StockEvent::TrackingConfigured(_) => "inventory.stock.tracking_configured",
            StockEvent::WarehouseStockRegistered(_) => "inventory.stock.warehouse_registered",
            StockEvent::CombinationRegistered(_) => "inventory.stock.combination_registered",
            StockEvent::StockAdjusted(_) => "inventory.stock.adjusted",
            StockEvent::CombinationStockAdjusted(_) => "inventory.stock.combination_adjusted",
            StockEvent::InventoryReserved(_) => "inventory.stock.reserved",
            StockEvent::ReservedInventoryReleased(_) => "inventory.stock.released",
            StockEvent::WarehouseStockReceived(_) => "inventory.stock.received",
            StockEvent::ReservedInventoryBooked(_) => "inventory.stock.booked",
            StockEvent::BookedInventoryReversed(_) => "inventory.stock.booking_reversed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockEvent::StockInitialized(e) => e.occurred_at,
            StockEvent::TrackingConfigured(e) => e.occurred_at,
            StockEvent::WarehouseStockRegistered(e) => e.occurred_at,
            StockEvent::CombinationRegistered(e) => e.occurred_at,
            StockEvent::StockAdjusted(e) => e.occurred_at,
            StockEvent::CombinationStockAdjusted(e) => e.occurred_at,
            StockEvent::InventoryReserved(e) => e.occurred_at,
            StockEvent::ReservedInventoryReleased(e) => e.occurred_at,
            StockEvent::WarehouseStockReceived(e) => e.occurred_at,
            StockEvent::ReservedInventoryBooked(e) => e.occurred_at,
            StockEvent::BookedInventoryReversed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ProductStock {
    type Command = StockCommand;
    type Event = StockEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            StockEvent::StockInitialized(e) => {
                self.id = e.product_id;
                self.tenant_id = Some(e.tenant_id);
                self.method = e.method;
                self.multiple_warehouses = e.multiple_warehouses;
                self.stock_quantity = 0;
                self.created = true;
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
            StockEvent::CombinationRegistered(e) => {
                self.combinations.insert(
                    e.combination_id,
                    CombinationStock {
                        stock_quantity: e.stock_quantity,
                        notify_quantity_below: e.notify_quantity_below,
                    },
                );
            }
            StockEvent::StockAdjusted(e) => {
                self.stock_quantity = e.stock_quantity;
            }
            StockEvent::CombinationStockAdjusted(e) => {
                let combo = self.combinations.entry(e.combination_id).or_default();
                combo.stock_quantity = e.stock_quantity;
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
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            StockCommand::InitStock(cmd) => self.handle_init(cmd),
            StockCommand::ConfigureTracking(cmd) => self.handle_configure(cmd),
            StockCommand::RegisterWarehouseStock(cmd) => self.handle_register_warehouse(cmd),
            StockCommand::RegisterCombination(cmd) => self.handle_register_combination(cmd),
            StockCommand::AdjustInventory(cmd) => self.handle_adjust(cmd),
            StockCommand::ReserveInventory(cmd) => self.handle_reserve(cmd),
            StockCommand::UnblockReservedInventory(cmd) => self.handle_unblock(cmd),
            StockCommand::BookReservedInventory(cmd) => self.handle_book(cmd),
            StockCommand::ReverseBookedInventory(cmd) => self.handle_reverse(cmd),
        }
    }
}

impl ProductStock {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_product_id(&self, product_id: ProductId) -> Result<(), DomainError> {
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn ensure_exists(&self, tenant_id: TenantId, product_id: ProductId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(tenant_id)?;
        self.ensure_product_id(product_id)
    }

    fn handle_init(&self, cmd: &InitStock) -> Result<Vec<StockEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("stock already initialized"));
        }

        Ok(vec![StockEvent::StockInitialized(StockInitialized {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            method: cmd.method,
            multiple_warehouses: cmd.multiple_warehouses,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_configure(&self, cmd: &ConfigureTracking) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.product_id)?;

        Ok(vec![StockEvent::TrackingConfigured(TrackingConfigured {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            method: cmd.method,
            multiple_warehouses: cmd.multiple_warehouses,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_register_warehouse(
        &self,
        cmd: &RegisterWarehouseStock,
    ) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.product_id)?;

        if cmd.reserved_quantity < 0 {
            return Err(DomainError::invalid_argument(
                "reserved_quantity cannot be negative",
            ));
        }

        Ok(vec![StockEvent::WarehouseStockRegistered(
            WarehouseStockRegistered {
                tenant_id: cmd.tenant_id,
                product_id: cmd.product_id,
                warehouse_id: cmd.warehouse_id,
                stock_quantity: cmd.stock_quantity,
                reserved_quantity: cmd.reserved_quantity,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_register_combination(
        &self,
        cmd: &RegisterCombination,
    ) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.product_id)?;

        if cmd.notify_quantity_below < 0 {
            return Err(DomainError::invalid_argument(
                "notify_quantity_below cannot be negative",
            ));
        }

        Ok(vec![StockEvent::CombinationRegistered(CombinationRegistered {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            combination_id: cmd.combination_id,
            stock_quantity: cmd.stock_quantity,
            notify_quantity_below: cmd.notify_quantity_below,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust(&self, cmd: &AdjustInventory) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.product_id)?;

        if cmd.delta == 0 {
            return Ok(vec![]);
        }

        match self.method {
            InventoryMethod::NotTracked => Ok(vec![]),
            InventoryMethod::Track => {
                if self.multiple_warehouses {
                    // Consumption becomes a reservation, a restock releases
                    // reserved quantity first.
                    if cmd.delta < 0 {
                        Ok(self.decide_reserve(cmd.tenant_id, -cmd.delta, cmd.occurred_at))
                    } else {
                        Ok(self.decide_release(cmd.tenant_id, cmd.delta, cmd.occurred_at))
                    }
                } else {
                    Ok(vec![StockEvent::StockAdjusted(StockAdjusted {
                        tenant_id: cmd.tenant_id,
                        product_id: cmd.product_id,
                        delta: cmd.delta,
                        stock_quantity: self.stock_quantity + cmd.delta,
                        message: cmd.message.clone(),
                        occurred_at: cmd.occurred_at,
                    })])
                }
            }
            InventoryMethod::TrackByCombination => {
                let Some(combination_id) = cmd.combination_id else {
                    return Ok(vec![]);
                };
                let Some(combination) = self.combinations.get(&combination_id) else {
                    // No matching variant record: tolerated, nothing to move.
                    return Ok(vec![]);
                };

                Ok(vec![StockEvent::CombinationStockAdjusted(
                    CombinationStockAdjusted {
                        tenant_id: cmd.tenant_id,
                        product_id: cmd.product_id,
                        combination_id,
                        delta: cmd.delta,
                        stock_quantity: combination.stock_quantity + cmd.delta,
                        message: cmd.message.clone(),
                        occurred_at: cmd.occurred_at,
                    },
                )])
            }
        }
    }

    fn handle_reserve(&self, cmd: &ReserveInventory) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.product_id)?;

        if cmd.quantity >= 0 {
            return Err(DomainError::invalid_argument(
                "quantity to reserve must be negative",
            ));
        }

        Ok(self.decide_reserve(cmd.tenant_id, -cmd.quantity, cmd.occurred_at))
    }

    fn handle_unblock(
        &self,
        cmd: &UnblockReservedInventory,
    ) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.product_id)?;

        if cmd.quantity < 0 {
            return Err(DomainError::invalid_argument(
                "quantity to unblock cannot be negative",
            ));
        }
        if cmd.quantity == 0 {
            return Ok(vec![]);
        }

        Ok(self.decide_release(cmd.tenant_id, cmd.quantity, cmd.occurred_at))
    }

    fn handle_book(&self, cmd: &BookReservedInventory) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.product_id)?;

        if cmd.quantity >= 0 {
            return Err(DomainError::invalid_argument(
                "quantity to book must be negative",
            ));
        }

        // Only products spread across warehouses are booked this way;
        // anything else is tolerated as a no-op to keep call sites simple.
        if self.method != InventoryMethod::Track || !self.multiple_warehouses {
            return Ok(vec![]);
        }
        let Some(record) = self.warehouses.get(&cmd.warehouse_id) else {
            return Ok(vec![]);
        };

        Ok(vec![StockEvent::ReservedInventoryBooked(
            ReservedInventoryBooked {
                tenant_id: cmd.tenant_id,
                product_id: cmd.product_id,
                warehouse_id: cmd.warehouse_id,
                quantity: cmd.quantity,
                stock_quantity: record.stock_quantity + cmd.quantity,
                message: cmd.message.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_reverse(
        &self,
        cmd: &ReverseBookedInventory,
    ) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.product_id)?;

        // You cannot reverse what was never committed.
        if cmd.shipped_at.is_none() {
            return Ok(vec![]);
        }
        if self.method != InventoryMethod::Track || !self.multiple_warehouses {
            return Ok(vec![]);
        }
        if cmd.quantity <= 0 {
            return Ok(vec![]);
        }
        let Some(record) = self.warehouses.get(&cmd.warehouse_id) else {
            return Ok(vec![]);
        };

        Ok(vec![StockEvent::BookedInventoryReversed(
            BookedInventoryReversed {
                tenant_id: cmd.tenant_id,
                product_id: cmd.product_id,
                warehouse_id: cmd.warehouse_id,
                quantity: cmd.quantity,
                stock_quantity: record.stock_quantity + cmd.quantity,
                message: cmd.message.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn decide_reserve(
        &self,
        tenant_id: TenantId,
        amount: i64,
        occurred_at: DateTime<Utc>,
    ) -> Vec<StockEvent> {
        plan_reservation(&self.warehouses, amount)
            .into_iter()
            .map(|allocation| {
                StockEvent::InventoryReserved(InventoryReserved {
                    tenant_id,
                    product_id: self.id,
                    warehouse_id: allocation.warehouse_id,
                    quantity: allocation.quantity,
                    occurred_at,
                })
            })
            .collect()
    }

    fn decide_release(
        &self,
        tenant_id: TenantId,
        amount: i64,
        occurred_at: DateTime<Utc>,
    ) -> Vec<StockEvent> {
        let plan = plan_release(&self.warehouses, amount);

        let mut events: Vec<StockEvent> = plan
            .releases
            .into_iter()
            .map(|release| {
                StockEvent::ReservedInventoryReleased(ReservedInventoryReleased {
                    tenant_id,
                    product_id: self.id,
                    warehouse_id: release.warehouse_id,
                    quantity: release.quantity,
                    occurred_at,
                })
            })
            .collect();

        if let Some(surplus) = plan.surplus {
            events.push(StockEvent::WarehouseStockReceived(WarehouseStockReceived {
                tenant_id,
                product_id: self.id,
                warehouse_id: surplus.warehouse_id,
                quantity: surplus.quantity,
                occurred_at,
            }));
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockpile_core::AggregateId;
    use uuid::Uuid;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_product_id() -> ProductId {
        ProductId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn wid(n: u128) -> WarehouseId {
        WarehouseId::from_uuid(Uuid::from_u128(n))
    }

    fn exec(stock: &mut ProductStock, cmd: StockCommand) -> Vec<StockEvent> {
        let events = stock.handle(&cmd).unwrap();
        for ev in &events {
            stock.apply(ev);
        }
        events
    }

    fn tracked_stock(multiple_warehouses: bool) -> (ProductStock, TenantId, ProductId) {
        init_stock(InventoryMethod::Track, multiple_warehouses)
    }

    fn init_stock(
        method: InventoryMethod,
        multiple_warehouses: bool,
    ) -> (ProductStock, TenantId, ProductId) {
        let tenant_id = test_tenant_id();
        let product_id = test_product_id();
        let mut stock = ProductStock::empty(product_id);
        exec(
            &mut stock,
            StockCommand::InitStock(InitStock {
                tenant_id,
                product_id,
                method,
                multiple_warehouses,
                occurred_at: test_time(),
            }),
        );
        (stock, tenant_id, product_id)
    }

    fn register_warehouses(
        stock: &mut ProductStock,
        tenant_id: TenantId,
        product_id: ProductId,
        entries: &[(WarehouseId, i64, i64)],
    ) {
        for (warehouse_id, stock_quantity, reserved_quantity) in entries {
            exec(
                stock,
                StockCommand::RegisterWarehouseStock(RegisterWarehouseStock {
                    tenant_id,
                    product_id,
                    warehouse_id: *warehouse_id,
                    stock_quantity: *stock_quantity,
                    reserved_quantity: *reserved_quantity,
                    occurred_at: test_time(),
                }),
            );
        }
    }

    /// Two-warehouse fixture used by the allocation scenarios:
    /// W1 = (stock 5, reserved 0), W2 = (stock 10, reserved 2).
    fn two_warehouse_stock() -> (ProductStock, TenantId, ProductId) {
        let (mut stock, tenant_id, product_id) = tracked_stock(true);
        register_warehouses(
            &mut stock,
            tenant_id,
            product_id,
            &[(wid(1), 5, 0), (wid(2), 10, 2)],
        );
        (stock, tenant_id, product_id)
    }

    fn adjust(tenant_id: TenantId, product_id: ProductId, delta: i64) -> StockCommand {
        StockCommand::AdjustInventory(AdjustInventory {
            tenant_id,
            product_id,
            delta,
            combination_id: None,
            message: "test adjustment".to_string(),
            occurred_at: test_time(),
        })
    }

    #[test]
    fn init_rejects_duplicate_initialization() {
        let (stock, tenant_id, product_id) = tracked_stock(false);
        let err = stock
            .handle(&StockCommand::InitStock(InitStock {
                tenant_id,
                product_id,
                method: InventoryMethod::Track,
                multiple_warehouses: false,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::Conflict(_) => {}
            _ => panic!("Expected Conflict error for duplicate initialization"),
        }
    }

    #[test]
    fn commands_against_unknown_stock_are_not_found() {
        let stock = ProductStock::empty(test_product_id());
        let err = stock
            .handle(&adjust(test_tenant_id(), test_product_id(), -1))
            .unwrap_err();
        match err {
            DomainError::NotFound => {}
            _ => panic!("Expected NotFound error"),
        }
    }

    #[test]
    fn zero_delta_adjustment_decides_nothing() {
        let (stock, tenant_id, product_id) = tracked_stock(false);
        let events = stock.handle(&adjust(tenant_id, product_id, 0)).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn untracked_product_adjustment_decides_nothing() {
        let (stock, tenant_id, product_id) = init_stock(InventoryMethod::NotTracked, false);
        let events = stock.handle(&adjust(tenant_id, product_id, -5)).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn simple_adjustment_moves_the_counter_by_exactly_delta() {
        let (mut stock, tenant_id, product_id) = tracked_stock(false);
        exec(&mut stock, adjust(tenant_id, product_id, 20));
        assert_eq!(stock.stock_quantity(), 20);

        let events = exec(&mut stock, adjust(tenant_id, product_id, -7));
        assert_eq!(events.len(), 1);
        match &events[0] {
            StockEvent::StockAdjusted(e) => {
                assert_eq!(e.delta, -7);
                assert_eq!(e.stock_quantity, 13);
                assert_eq!(e.message, "test adjustment");
            }
            _ => panic!("Expected StockAdjusted event"),
        }
        assert_eq!(stock.stock_quantity(), 13);
        assert_eq!(stock.total_available(), 13);
    }

    #[test]
    fn simple_adjustment_may_drive_the_counter_negative() {
        let (mut stock, tenant_id, product_id) = tracked_stock(false);
        exec(&mut stock, adjust(tenant_id, product_id, -4));
        assert_eq!(stock.stock_quantity(), -4);
    }

    #[test]
    fn combination_adjustment_updates_the_matching_variant() {
        let (mut stock, tenant_id, product_id) =
            init_stock(InventoryMethod::TrackByCombination, false);
        let combination_id = CombinationId::new();
        exec(
            &mut stock,
            StockCommand::RegisterCombination(RegisterCombination {
                tenant_id,
                product_id,
                combination_id,
                stock_quantity: 9,
                notify_quantity_below: 2,
                occurred_at: test_time(),
            }),
        );

        let events = exec(
            &mut stock,
            StockCommand::AdjustInventory(AdjustInventory {
                tenant_id,
                product_id,
                delta: -3,
                combination_id: Some(combination_id),
                message: "order placed".to_string(),
                occurred_at: test_time(),
            }),
        );

        assert_eq!(events.len(), 1);
        match &events[0] {
            StockEvent::CombinationStockAdjusted(e) => {
                assert_eq!(e.combination_id, combination_id);
                assert_eq!(e.delta, -3);
                assert_eq!(e.stock_quantity, 6);
            }
            _ => panic!("Expected CombinationStockAdjusted event"),
        }
        assert_eq!(stock.combination(combination_id).unwrap().stock_quantity, 6);
    }

    #[test]
    fn combination_adjustment_without_matching_variant_decides_nothing() {
        let (stock, tenant_id, product_id) =
            init_stock(InventoryMethod::TrackByCombination, false);

        let events = stock
            .handle(&StockCommand::AdjustInventory(AdjustInventory {
                tenant_id,
                product_id,
                delta: -3,
                combination_id: Some(CombinationId::new()),
                message: String::new(),
                occurred_at: test_time(),
            }))
            .unwrap();
        assert!(events.is_empty());

        // No combination reference at all is tolerated the same way.
        let events = stock.handle(&adjust(tenant_id, product_id, -3)).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn reserve_rejects_non_negative_quantity() {
        let (stock, tenant_id, product_id) = two_warehouse_stock();
        for quantity in [0, 5] {
            let err = stock
                .handle(&StockCommand::ReserveInventory(ReserveInventory {
                    tenant_id,
                    product_id,
                    quantity,
                    occurred_at: test_time(),
                }))
                .unwrap_err();
            match err {
                DomainError::InvalidArgument(_) => {}
                _ => panic!("Expected InvalidArgument error for quantity {quantity}"),
            }
        }
    }

    #[test]
    fn reserve_without_warehouse_records_decides_nothing() {
        let (stock, tenant_id, product_id) = tracked_stock(true);
        let events = stock
            .handle(&StockCommand::ReserveInventory(ReserveInventory {
                tenant_id,
                product_id,
                quantity: -3,
                occurred_at: test_time(),
            }))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn reserve_splits_across_warehouses_by_availability() {
        let (mut stock, tenant_id, product_id) = two_warehouse_stock();
        let reserved_before = stock.total_reserved();

        exec(
            &mut stock,
            StockCommand::ReserveInventory(ReserveInventory {
                tenant_id,
                product_id,
                quantity: -12,
                occurred_at: test_time(),
            }),
        );

        // W2 (availability 8) serves first, W1 covers the remaining 4.
        assert_eq!(stock.warehouse(wid(1)).unwrap().reserved_quantity, 4);
        assert_eq!(stock.warehouse(wid(2)).unwrap().reserved_quantity, 10);
        assert_eq!(stock.warehouse(wid(1)).unwrap().stock_quantity, 5);
        assert_eq!(stock.warehouse(wid(2)).unwrap().stock_quantity, 10);
        assert_eq!(stock.total_reserved() - reserved_before, 12);
    }

    #[test]
    fn reserve_beyond_total_supply_overcommits_the_first_warehouse() {
        let (mut stock, tenant_id, product_id) = two_warehouse_stock();

        exec(
            &mut stock,
            StockCommand::ReserveInventory(ReserveInventory {
                tenant_id,
                product_id,
                quantity: -20,
                occurred_at: test_time(),
            }),
        );

        // 13 available in total; the excess 7 lands on W2, the head of the
        // availability ordering, pushing it past its stock.
        let w2 = stock.warehouse(wid(2)).unwrap();
        assert_eq!(w2.reserved_quantity, 17);
        assert!(w2.reserved_quantity > w2.stock_quantity);
        assert_eq!(stock.warehouse(wid(1)).unwrap().reserved_quantity, 5);
    }

    #[test]
    fn unblock_rejects_negative_quantity() {
        let (stock, tenant_id, product_id) = two_warehouse_stock();
        let err = stock
            .handle(&StockCommand::UnblockReservedInventory(
                UnblockReservedInventory {
                    tenant_id,
                    product_id,
                    quantity: -1,
                    occurred_at: test_time(),
                },
            ))
            .unwrap_err();
        match err {
            DomainError::InvalidArgument(_) => {}
            _ => panic!("Expected InvalidArgument error"),
        }
    }

    #[test]
    fn unblock_zero_decides_nothing() {
        let (stock, tenant_id, product_id) = two_warehouse_stock();
        let events = stock
            .handle(&StockCommand::UnblockReservedInventory(
                UnblockReservedInventory {
                    tenant_id,
                    product_id,
                    quantity: 0,
                    occurred_at: test_time(),
                },
            ))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn unblock_relieves_the_most_reserved_warehouse_first() {
        let (mut stock, tenant_id, product_id) = tracked_stock(true);
        register_warehouses(
            &mut stock,
            tenant_id,
            product_id,
            &[(wid(1), 5, 3), (wid(2), 10, 8)],
        );

        exec(
            &mut stock,
            StockCommand::UnblockReservedInventory(UnblockReservedInventory {
                tenant_id,
                product_id,
                quantity: 9,
                occurred_at: test_time(),
            }),
        );

        assert_eq!(stock.warehouse(wid(2)).unwrap().reserved_quantity, 0);
        assert_eq!(stock.warehouse(wid(1)).unwrap().reserved_quantity, 2);
    }

    #[test]
    fn unblock_surplus_becomes_new_stock_on_the_first_warehouse() {
        let (mut stock, tenant_id, product_id) = tracked_stock(true);
        register_warehouses(
            &mut stock,
            tenant_id,
            product_id,
            &[(wid(1), 5, 2), (wid(2), 10, 0)],
        );

        let events = exec(
            &mut stock,
            StockCommand::UnblockReservedInventory(UnblockReservedInventory {
                tenant_id,
                product_id,
                quantity: 6,
                occurred_at: test_time(),
            }),
        );

        assert!(matches!(
            events.last(),
            Some(StockEvent::WarehouseStockReceived(_))
        ));
        // Only 2 were ever reserved; the other 4 arrive as stock on W1 (most
        // reserved, so first in the relief ordering).
        assert_eq!(stock.warehouse(wid(1)).unwrap().reserved_quantity, 0);
        assert_eq!(stock.warehouse(wid(1)).unwrap().stock_quantity, 9);
        assert_eq!(stock.warehouse(wid(2)).unwrap().stock_quantity, 10);
    }

    #[test]
    fn reserve_then_unblock_round_trips_from_clean_state() {
        let (mut stock, tenant_id, product_id) = tracked_stock(true);
        register_warehouses(
            &mut stock,
            tenant_id,
            product_id,
            &[(wid(1), 5, 0), (wid(2), 10, 0)],
        );

        exec(
            &mut stock,
            StockCommand::ReserveInventory(ReserveInventory {
                tenant_id,
                product_id,
                quantity: -8,
                occurred_at: test_time(),
            }),
        );
        exec(
            &mut stock,
            StockCommand::UnblockReservedInventory(UnblockReservedInventory {
                tenant_id,
                product_id,
                quantity: 8,
                occurred_at: test_time(),
            }),
        );

        assert_eq!(stock.warehouse(wid(1)).unwrap().reserved_quantity, 0);
        assert_eq!(stock.warehouse(wid(2)).unwrap().reserved_quantity, 0);
        assert_eq!(stock.warehouse(wid(1)).unwrap().stock_quantity, 5);
        assert_eq!(stock.warehouse(wid(2)).unwrap().stock_quantity, 10);
    }

    #[test]
    fn multi_warehouse_adjustment_routes_consumption_to_reservation() {
        let (mut stock, tenant_id, product_id) = two_warehouse_stock();

        let events = exec(&mut stock, adjust(tenant_id, product_id, -3));

        assert!(events
            .iter()
            .all(|e| matches!(e, StockEvent::InventoryReserved(_))));
        assert_eq!(stock.warehouse(wid(2)).unwrap().reserved_quantity, 5);
    }

    #[test]
    fn multi_warehouse_adjustment_routes_restock_to_release() {
        let (mut stock, tenant_id, product_id) = two_warehouse_stock();

        let events = exec(&mut stock, adjust(tenant_id, product_id, 2));

        assert!(events
            .iter()
            .all(|e| matches!(e, StockEvent::ReservedInventoryReleased(_))));
        assert_eq!(stock.warehouse(wid(2)).unwrap().reserved_quantity, 0);
    }

    #[test]
    fn book_rejects_non_negative_quantity() {
        let (stock, tenant_id, product_id) = two_warehouse_stock();
        let err = stock
            .handle(&StockCommand::BookReservedInventory(BookReservedInventory {
                tenant_id,
                product_id,
                warehouse_id: wid(2),
                quantity: 3,
                message: String::new(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::InvalidArgument(_) => {}
            _ => panic!("Expected InvalidArgument error"),
        }
    }

    #[test]
    fn book_outside_multi_warehouse_tracking_decides_nothing() {
        let (stock, tenant_id, product_id) = tracked_stock(false);
        let events = stock
            .handle(&StockCommand::BookReservedInventory(BookReservedInventory {
                tenant_id,
                product_id,
                warehouse_id: wid(1),
                quantity: -3,
                message: String::new(),
                occurred_at: test_time(),
            }))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn book_against_unknown_warehouse_decides_nothing() {
        let (stock, tenant_id, product_id) = two_warehouse_stock();
        let events = stock
            .handle(&StockCommand::BookReservedInventory(BookReservedInventory {
                tenant_id,
                product_id,
                warehouse_id: wid(9),
                quantity: -3,
                message: String::new(),
                occurred_at: test_time(),
            }))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn book_moves_stock_and_clamps_reserved_at_zero() {
        let (mut stock, tenant_id, product_id) = two_warehouse_stock();

        let events = exec(
            &mut stock,
            StockCommand::BookReservedInventory(BookReservedInventory {
                tenant_id,
                product_id,
                warehouse_id: wid(2),
                quantity: -5,
                message: "shipment sent".to_string(),
                occurred_at: test_time(),
            }),
        );

        match &events[0] {
            StockEvent::ReservedInventoryBooked(e) => {
                assert_eq!(e.quantity, -5);
                assert_eq!(e.stock_quantity, 5);
            }
            _ => panic!("Expected ReservedInventoryBooked event"),
        }

        let w2 = stock.warehouse(wid(2)).unwrap();
        assert_eq!(w2.stock_quantity, 5);
        // Only 2 were reserved; booking 5 clamps at zero instead of going
        // negative.
        assert_eq!(w2.reserved_quantity, 0);
    }

    #[test]
    fn reverse_before_shipment_decides_nothing() {
        let (stock, tenant_id, product_id) = two_warehouse_stock();
        let events = stock
            .handle(&StockCommand::ReverseBookedInventory(ReverseBookedInventory {
                tenant_id,
                product_id,
                warehouse_id: wid(2),
                quantity: 3,
                shipped_at: None,
                message: String::new(),
                occurred_at: test_time(),
            }))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn reverse_after_shipment_restores_stock_and_reserved() {
        let (mut stock, tenant_id, product_id) = two_warehouse_stock();

        let events = exec(
            &mut stock,
            StockCommand::ReverseBookedInventory(ReverseBookedInventory {
                tenant_id,
                product_id,
                warehouse_id: wid(2),
                quantity: 3,
                shipped_at: Some(test_time()),
                message: "order cancelled".to_string(),
                occurred_at: test_time(),
            }),
        );

        match &events[0] {
            StockEvent::BookedInventoryReversed(e) => {
                assert_eq!(e.quantity, 3);
                assert_eq!(e.stock_quantity, 13);
            }
            _ => panic!("Expected BookedInventoryReversed event"),
        }

        let w2 = stock.warehouse(wid(2)).unwrap();
        assert_eq!(w2.stock_quantity, 13);
        assert_eq!(w2.reserved_quantity, 5);
    }

    #[test]
    fn configure_tracking_switches_mode() {
        let (mut stock, tenant_id, product_id) = tracked_stock(false);
        exec(
            &mut stock,
            StockCommand::ConfigureTracking(ConfigureTracking {
                tenant_id,
                product_id,
                method: InventoryMethod::Track,
                multiple_warehouses: true,
                occurred_at: test_time(),
            }),
        );
        assert!(stock.multiple_warehouses());
    }

    #[test]
    fn register_warehouse_rejects_negative_reserved() {
        let (stock, tenant_id, product_id) = tracked_stock(true);
        let err = stock
            .handle(&StockCommand::RegisterWarehouseStock(RegisterWarehouseStock {
                tenant_id,
                product_id,
                warehouse_id: wid(1),
                stock_quantity: 5,
                reserved_quantity: -1,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::InvalidArgument(_) => {}
            _ => panic!("Expected InvalidArgument error"),
        }
    }

    #[test]
    fn total_available_sums_warehouses_net_of_reservations() {
        let (stock, _, _) = two_warehouse_stock();
        assert_eq!(stock.total_available(), 13);
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let (stock, tenant_id, product_id) = two_warehouse_stock();
        let before = stock.clone();

        let cmd = StockCommand::ReserveInventory(ReserveInventory {
            tenant_id,
            product_id,
            quantity: -12,
            occurred_at: test_time(),
        });
        let events1 = stock.handle(&cmd).unwrap();
        let events2 = stock.handle(&cmd).unwrap();

        assert_eq!(stock, before);
        assert_eq!(events1, events2);
    }

    #[test]
    fn version_increments_per_applied_event() {
        let (mut stock, tenant_id, product_id) = two_warehouse_stock();
        let version_before = stock.version();

        let events = exec(
            &mut stock,
            StockCommand::ReserveInventory(ReserveInventory {
                tenant_id,
                product_id,
                quantity: -12,
                occurred_at: test_time(),
            }),
        );

        assert_eq!(stock.version(), version_before + events.len() as u64);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: within total availability, a reservation raises the
            /// total reserved count by exactly the requested amount and never
            /// lowers any single warehouse's reserved quantity.
            #[test]
            fn reservation_raises_reserved_by_exactly_the_amount(
                stocks in proptest::collection::vec((0..40i64, 0..10i64), 1..6),
                amount in 1..100i64,
            ) {
                let (mut stock, tenant_id, product_id) = tracked_stock(true);
                let entries: Vec<(WarehouseId, i64, i64)> = stocks
                    .iter()
                    .enumerate()
                    .map(|(i, (s, r))| (wid(i as u128 + 1), s + r, *r))
                    .collect();
                register_warehouses(&mut stock, tenant_id, product_id, &entries);

                prop_assume!(amount <= stock.total_available());
                let before: Vec<i64> = stock
                    .warehouses()
                    .values()
                    .map(|w| w.reserved_quantity)
                    .collect();
                let reserved_before = stock.total_reserved();

                exec(
                    &mut stock,
                    StockCommand::ReserveInventory(ReserveInventory {
                        tenant_id,
                        product_id,
                        quantity: -amount,
                        occurred_at: test_time(),
                    }),
                );

                prop_assert_eq!(stock.total_reserved() - reserved_before, amount);
                for (after, before) in stock
                    .warehouses()
                    .values()
                    .map(|w| w.reserved_quantity)
                    .zip(before)
                {
                    prop_assert!(after >= before);
                }
            }

            /// Property: a reservation past total supply overcommits exactly
            /// one warehouse, and the shortfall equals demand minus supply.
            #[test]
            fn overcommit_is_confined_to_one_warehouse(
                stocks in proptest::collection::vec(0..20i64, 1..6),
                excess in 1..50i64,
            ) {
                let (mut stock, tenant_id, product_id) = tracked_stock(true);
                let entries: Vec<(WarehouseId, i64, i64)> = stocks
                    .iter()
                    .enumerate()
                    .map(|(i, s)| (wid(i as u128 + 1), *s, 0))
                    .collect();
                register_warehouses(&mut stock, tenant_id, product_id, &entries);

                let supply = stock.total_available();
                let amount = supply + excess;

                exec(
                    &mut stock,
                    StockCommand::ReserveInventory(ReserveInventory {
                        tenant_id,
                        product_id,
                        quantity: -amount,
                        occurred_at: test_time(),
                    }),
                );

                let overcommitted: Vec<&WarehouseStock> = stock
                    .warehouses()
                    .values()
                    .filter(|w| w.reserved_quantity > w.stock_quantity)
                    .collect();
                prop_assert_eq!(overcommitted.len(), 1);
                prop_assert_eq!(
                    overcommitted[0].reserved_quantity - overcommitted[0].stock_quantity,
                    excess
                );
            }
        }
    }
}
