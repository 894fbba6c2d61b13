use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockpile_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use stockpile_events::Event;

/// Product identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Configured response when availability falls to or below the minimum
/// stock threshold.
///
/// `Nothing` is an explicit member: an unconfigured product must stay
/// untouched by the low-stock policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LowStockAction {
    Nothing,
    DisableBuyButton,
    Unpublish,
}

/// Per-product stock thresholds and the low-stock response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSettings {
    /// Availability at or below this triggers the configured action.
    pub min_stock_quantity: i64,
    pub low_stock_action: LowStockAction,
    /// Availability strictly below this triggers an admin notification.
    pub notify_quantity_below: i64,
}

impl Default for StockSettings {
    fn default() -> Self {
        Self {
            min_stock_quantity: 0,
            low_stock_action: LowStockAction::Nothing,
            notify_quantity_below: 1,
        }
    }
}

impl StockSettings {
    fn validate(&self) -> Result<(), DomainError> {
        if self.min_stock_quantity < 0 {
            return Err(DomainError::invalid_argument(
                "min_stock_quantity cannot be negative",
            ));
        }
        if self.notify_quantity_below < 0 {
            return Err(DomainError::invalid_argument(
                "notify_quantity_below cannot be negative",
            ));
        }
        Ok(())
    }
}

/// Aggregate root: Product.
///
/// Carries the catalog-side state the inventory engine cares about:
/// visibility (`published`), purchasability (`buy_button_disabled`) and the
/// stock settings consumed by the low-stock policy. Products start published
/// with the buy button enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    tenant_id: Option<TenantId>,
    sku: String,
    name: String,
    published: bool,
    buy_button_disabled: bool,
    stock_settings: StockSettings,
    version: u64,
    created: bool,
}

impl Product {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            tenant_id: None,
            sku: String::new(),
            name: String::new(),
            published: false,
            buy_button_disabled: false,
            stock_settings: StockSettings::default(),
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

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn published(&self) -> bool {
        self.published
    }

    pub fn buy_button_disabled(&self) -> bool {
        self.buy_button_disabled
    }

    pub fn stock_settings(&self) -> &StockSettings {
        &self.stock_settings
    }

    /// Check if the product can be purchased (visible and buy button enabled).
    pub fn can_be_purchased(&self) -> bool {
        self.published && !self.buy_button_disabled
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub stock_settings: Option<StockSettings>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateStockSettings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStockSettings {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub settings: StockSettings,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetPublished.
///
/// Driven by the low-stock policy as well as by admin edits, so a command
/// matching the current state is an idempotent no-op rather than a conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetPublished {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub published: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetBuyButtonDisabled (same idempotence as `SetPublished`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetBuyButtonDisabled {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub disabled: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    CreateProduct(CreateProduct),
    UpdateStockSettings(UpdateStockSettings),
    SetPublished(SetPublished),
    SetBuyButtonDisabled(SetBuyButtonDisabled),
}

/// Event: ProductCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub stock_settings: StockSettings,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockSettingsUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSettingsUpdated {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub settings: StockSettings,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductPublished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPublished {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductUnpublished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUnpublished {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BuyButtonDisabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyButtonDisabled {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BuyButtonEnabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyButtonEnabled {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    StockSettingsUpdated(StockSettingsUpdated),
    ProductPublished(ProductPublished),
    ProductUnpublished(ProductUnpublished),
    BuyButtonDisabled(BuyButtonDisabled),
    BuyButtonEnabled(BuyButtonEnabled),
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "catalog.product.created",
            ProductEvent::StockSettingsUpdated(_) => "catalog.product.stock_settings_updated",
            ProductEvent::ProductPublished(_) => "catalog.product.published",
            ProductEvent::ProductUnpublished(_) => "catalog.product.unpublished",
            ProductEvent::BuyButtonDisabled(_) => "catalog.product.buy_button_disabled",
            ProductEvent::BuyButtonEnabled(_) => "catalog.product.buy_button_enabled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::StockSettingsUpdated(e) => e.occurred_at,
            ProductEvent::ProductPublished(e) => e.occurred_at,
            ProductEvent::ProductUnpublished(e) => e.occurred_at,
            ProductEvent::BuyButtonDisabled(e) => e.occurred_at,
            ProductEvent::BuyButtonEnabled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.tenant_id = Some(e.tenant_id);
                self.sku = e.sku.clone();
                self.name = e.name.clone();
                self.published = true;
                self.buy_button_disabled = false;
                self.stock_settings = e.stock_settings;
                self.created = true;
            }
            ProductEvent::StockSettingsUpdated(e) => {
                self.stock_settings = e.settings;
            }
            ProductEvent::ProductPublished(_) => {
                self.published = true;
            }
            ProductEvent::ProductUnpublished(_) => {
                self.published = false;
            }
            ProductEvent::BuyButtonDisabled(_) => {
                self.buy_button_disabled = true;
            }
            ProductEvent::BuyButtonEnabled(_) => {
                self.buy_button_disabled = false;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::CreateProduct(cmd) => self.handle_create(cmd),
            ProductCommand::UpdateStockSettings(cmd) => self.handle_update_settings(cmd),
            ProductCommand::SetPublished(cmd) => self.handle_set_published(cmd),
            ProductCommand::SetBuyButtonDisabled(cmd) => self.handle_set_buy_button(cmd),
        }
    }
}

impl Product {
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

    fn handle_create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }

        if cmd.name.trim().is_empty() {
            return Err(DomainError::invalid_argument("name cannot be empty"));
        }

        if cmd.sku.trim().is_empty() {
            return Err(DomainError::invalid_argument("SKU cannot be empty"));
        }

        let stock_settings = cmd.stock_settings.unwrap_or_default();
        stock_settings.validate()?;

        Ok(vec![ProductEvent::ProductCreated(ProductCreated {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            sku: cmd.sku.clone(),
            name: cmd.name.clone(),
            stock_settings,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_settings(
        &self,
        cmd: &UpdateStockSettings,
    ) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_product_id(cmd.product_id)?;
        cmd.settings.validate()?;

        Ok(vec![ProductEvent::StockSettingsUpdated(StockSettingsUpdated {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            settings: cmd.settings,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_published(&self, cmd: &SetPublished) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_product_id(cmd.product_id)?;

        if self.published == cmd.published {
            return Ok(vec![]);
        }

        let event = if cmd.published {
            ProductEvent::ProductPublished(ProductPublished {
                tenant_id: cmd.tenant_id,
                product_id: cmd.product_id,
                occurred_at: cmd.occurred_at,
            })
        } else {
            ProductEvent::ProductUnpublished(ProductUnpublished {
                tenant_id: cmd.tenant_id,
                product_id: cmd.product_id,
                occurred_at: cmd.occurred_at,
            })
        };

        Ok(vec![event])
    }

    fn handle_set_buy_button(
        &self,
        cmd: &SetBuyButtonDisabled,
    ) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_product_id(cmd.product_id)?;

        if self.buy_button_disabled == cmd.disabled {
            return Ok(vec![]);
        }

        let event = if cmd.disabled {
            ProductEvent::BuyButtonDisabled(BuyButtonDisabled {
                tenant_id: cmd.tenant_id,
                product_id: cmd.product_id,
                occurred_at: cmd.occurred_at,
            })
        } else {
            ProductEvent::BuyButtonEnabled(BuyButtonEnabled {
                tenant_id: cmd.tenant_id,
                product_id: cmd.product_id,
                occurred_at: cmd.occurred_at,
            })
        };

        Ok(vec![event])
    }
}
