//! Low-stock policy: availability thresholds → visibility/purchasability.
//!
//! A pure function of the current total availability, the product's stock
//! settings, and the engine configuration. The orchestration layer feeds the
//! result back to the catalog; nothing here has side effects.

use serde::{Deserialize, Serialize};

use stockpile_catalog::{LowStockAction, StockSettings};

/// Engine configuration, passed explicitly to the policy and the
/// orchestration layer instead of being resolved from ambient global state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// Whether recovered availability may re-publish / re-enable a product
    /// that the policy previously hid or blocked.
    pub republish_on_restock: bool,
    /// Ceiling on bundle component recursion when adjusting inventory.
    pub max_bundle_depth: u32,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            republish_on_restock: true,
            max_bundle_depth: 8,
        }
    }
}

/// The pair of catalog flags the policy controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LowStockState {
    pub published: bool,
    pub buy_button_disabled: bool,
}

/// Derive the desired flag state from availability.
///
/// Two mutually exclusive modes, selected per product:
/// - `DisableBuyButton` flips purchasability only, leaving visibility alone;
/// - `Unpublish` flips visibility directly.
///
/// Either way, recovery above the threshold restores the flag only when the
/// configuration permits it. `Nothing` leaves the state untouched.
pub fn evaluate_low_stock(
    total_available: i64,
    settings: &StockSettings,
    config: &InventoryConfig,
    current: LowStockState,
) -> LowStockState {
    let low = total_available <= settings.min_stock_quantity;
    let recovered = !low && config.republish_on_restock;

    let mut next = current;
    match settings.low_stock_action {
        LowStockAction::DisableBuyButton => {
            if low {
                next.buy_button_disabled = true;
            } else if recovered {
                next.buy_button_disabled = false;
            }
        }
        LowStockAction::Unpublish => {
            if low {
                next.published = false;
            } else if recovered {
                next.published = true;
            }
        }
        LowStockAction::Nothing => {}
    }

    next
}

/// Whether an adjustment warrants an admin low-stock notification: only a
/// consumption (negative delta) that leaves availability strictly below the
/// configured threshold.
pub fn notification_due(delta: i64, total_available: i64, notify_quantity_below: i64) -> bool {
    delta < 0 && total_available < notify_quantity_below
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(action: LowStockAction) -> StockSettings {
        StockSettings {
            min_stock_quantity: 10,
            low_stock_action: action,
            notify_quantity_below: 5,
        }
    }

    fn healthy() -> LowStockState {
        LowStockState {
            published: true,
            buy_button_disabled: false,
        }
    }

    #[test]
    fn drop_below_threshold_disables_buy_button_then_restock_re_enables() {
        let settings = settings(LowStockAction::DisableBuyButton);
        let config = InventoryConfig::default();

        // 15 → 5: availability fell to the low side of the threshold.
        let state = evaluate_low_stock(5, &settings, &config, healthy());
        assert!(state.buy_button_disabled);
        assert!(state.published, "visibility must stay untouched");

        // 5 → 12: recovery above the threshold re-enables the button.
        let state = evaluate_low_stock(12, &settings, &config, state);
        assert!(!state.buy_button_disabled);
        assert!(state.published);
    }

    #[test]
    fn recovery_is_gated_by_configuration() {
        let settings = settings(LowStockAction::DisableBuyButton);
        let config = InventoryConfig {
            republish_on_restock: false,
            ..InventoryConfig::default()
        };

        let low = evaluate_low_stock(5, &settings, &config, healthy());
        assert!(low.buy_button_disabled);

        // Restocked, but the configuration forbids automatic recovery.
        let after = evaluate_low_stock(12, &settings, &config, low);
        assert!(after.buy_button_disabled);
    }

    #[test]
    fn availability_equal_to_threshold_counts_as_low() {
        let settings = settings(LowStockAction::Unpublish);
        let state = evaluate_low_stock(10, &settings, &InventoryConfig::default(), healthy());
        assert!(!state.published);
    }

    #[test]
    fn unpublish_mode_flips_visibility_not_the_buy_button() {
        let settings = settings(LowStockAction::Unpublish);
        let config = InventoryConfig::default();

        let state = evaluate_low_stock(3, &settings, &config, healthy());
        assert!(!state.published);
        assert!(!state.buy_button_disabled);

        let state = evaluate_low_stock(11, &settings, &config, state);
        assert!(state.published);
    }

    #[test]
    fn nothing_mode_is_the_identity() {
        let settings = settings(LowStockAction::Nothing);
        let config = InventoryConfig::default();

        for available in [-5, 0, 10, 100] {
            let state = evaluate_low_stock(available, &settings, &config, healthy());
            assert_eq!(state, healthy());
        }
    }

    #[test]
    fn notification_fires_only_on_consumption_below_threshold() {
        assert!(notification_due(-1, 4, 5));
        assert!(!notification_due(-1, 5, 5), "at the threshold is not below it");
        assert!(!notification_due(1, 4, 5), "restock never notifies");
        assert!(!notification_due(0, 4, 5));
    }
}
