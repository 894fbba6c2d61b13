//! Low-stock notification sink.
//!
//! Fire-and-forget toward the messaging collaborator: a failed notification
//! is logged and swallowed — it must never roll back the inventory
//! adjustment that triggered it.

use std::sync::Arc;

use stockpile_catalog::ProductId;
use stockpile_core::TenantId;
use stockpile_inventory::CombinationId;

/// Dispatches "quantity below threshold" notifications.
pub trait LowStockNotifier: Send + Sync {
    fn product_low(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        available: i64,
        threshold: i64,
    ) -> anyhow::Result<()>;

    fn combination_low(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        combination_id: CombinationId,
        available: i64,
        threshold: i64,
    ) -> anyhow::Result<()>;
}

impl<N> LowStockNotifier for Arc<N>
where
    N: LowStockNotifier + ?Sized,
{
    fn product_low(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        available: i64,
        threshold: i64,
    ) -> anyhow::Result<()> {
        (**self).product_low(tenant_id, product_id, available, threshold)
    }

    fn combination_low(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        combination_id: CombinationId,
        available: i64,
        threshold: i64,
    ) -> anyhow::Result<()> {
        (**self).combination_low(tenant_id, product_id, combination_id, available, threshold)
    }
}

/// Notifier that surfaces low-stock conditions through the log stream.
///
/// Stands in for the real messaging collaborator in dev and tests.
#[derive(Debug, Default)]
pub struct TracingLowStockNotifier;

impl TracingLowStockNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl LowStockNotifier for TracingLowStockNotifier {
    fn product_low(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        available: i64,
        threshold: i64,
    ) -> anyhow::Result<()> {
        tracing::warn!(
            %tenant_id,
            %product_id,
            available,
            threshold,
            "product stock fell below notification threshold"
        );
        Ok(())
    }

    fn combination_low(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        combination_id: CombinationId,
        available: i64,
        threshold: i64,
    ) -> anyhow::Result<()> {
        tracing::warn!(
            %tenant_id,
            %product_id,
            %combination_id,
            available,
            threshold,
            "combination stock fell below notification threshold"
        );
        Ok(())
    }
}
