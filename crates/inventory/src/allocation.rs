//! Greedy multi-warehouse allocation planning.
//!
//! Pure functions deciding which warehouses absorb a reservation or a
//! release. The aggregate turns a plan into events; nothing here touches
//! state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::warehouse::WarehouseId;

/// Per-(product, warehouse) counters.
///
/// `reserved_quantity <= stock_quantity` is the steady state, but reservation
/// is allowed to overshoot it when demand exceeds supply across every
/// warehouse: the sale completes and fulfillment inherits the shortfall.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseStock {
    pub stock_quantity: i64,
    pub reserved_quantity: i64,
}

impl WarehouseStock {
    pub fn new(stock_quantity: i64, reserved_quantity: i64) -> Self {
        Self {
            stock_quantity,
            reserved_quantity,
        }
    }

    /// Available-to-promise: stock minus reserved. Negative once overcommitted.
    pub fn available(&self) -> i64 {
        self.stock_quantity - self.reserved_quantity
    }
}

/// One warehouse's share of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
}

/// Outcome of planning a release.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReleasePlan {
    /// Reserved quantity handed back, per warehouse.
    pub releases: Vec<Allocation>,
    /// Anything beyond what was ever reserved, treated as new incoming stock
    /// for the first warehouse of the ordering.
    pub surplus: Option<Allocation>,
}

/// Plan a reservation of `quantity` units (strictly positive) across
/// warehouse records.
///
/// Two passes over records ordered by available-to-promise descending
/// (warehouse id breaks ties, keeping plans deterministic):
///
/// 1. each warehouse contributes `min(max(0, available), remaining)` until
///    the demand is met;
/// 2. any remainder — demand exceeded total availability — lands entirely on
///    the first record of the ordering, pushing its reserved quantity past
///    its stock.
///
/// Serving the slackest warehouses first keeps small balances from
/// fragmenting across locations. Returns an empty plan when there are no
/// records to reserve against.
pub fn plan_reservation(
    records: &BTreeMap<WarehouseId, WarehouseStock>,
    quantity: i64,
) -> Vec<Allocation> {
    debug_assert!(quantity > 0);

    if records.is_empty() {
        return Vec::new();
    }

    // BTreeMap iteration is id-ascending; the stable sort preserves that
    // order within equal availability.
    let mut ordered: Vec<(WarehouseId, WarehouseStock)> =
        records.iter().map(|(id, ws)| (*id, *ws)).collect();
    ordered.sort_by(|a, b| b.1.available().cmp(&a.1.available()));

    let mut remaining = quantity;
    let mut plan: Vec<Allocation> = Vec::new();

    for (warehouse_id, ws) in &ordered {
        if remaining == 0 {
            break;
        }
        let take = ws.available().max(0).min(remaining);
        if take > 0 {
            plan.push(Allocation {
                warehouse_id: *warehouse_id,
                quantity: take,
            });
            remaining -= take;
        }
    }

    if remaining > 0 {
        // Overcommit: the first record absorbs the shortfall.
        let first = ordered[0].0;
        match plan.iter_mut().find(|a| a.warehouse_id == first) {
            Some(entry) => entry.quantity += remaining,
            None => plan.push(Allocation {
                warehouse_id: first,
                quantity: remaining,
            }),
        }
    }

    plan
}

/// Plan the release of `quantity` reserved units (strictly positive).
///
/// Records are ordered by reserved quantity descending, then stock
/// descending (ties by warehouse id) — the most over-reserved warehouse gets
/// relief first. Each record releases `min(reserved, remaining)`. A remainder
/// beyond everything ever reserved becomes surplus stock on the first record
/// of the ordering rather than an error.
pub fn plan_release(records: &BTreeMap<WarehouseId, WarehouseStock>, quantity: i64) -> ReleasePlan {
    debug_assert!(quantity > 0);

    if records.is_empty() {
        return ReleasePlan::default();
    }

    let mut ordered: Vec<(WarehouseId, WarehouseStock)> =
        records.iter().map(|(id, ws)| (*id, *ws)).collect();
    ordered.sort_by(|a, b| {
        (b.1.reserved_quantity, b.1.stock_quantity).cmp(&(a.1.reserved_quantity, a.1.stock_quantity))
    });

    let mut remaining = quantity;
    let mut releases: Vec<Allocation> = Vec::new();

    for (warehouse_id, ws) in &ordered {
        if remaining == 0 {
            break;
        }
        let take = ws.reserved_quantity.max(0).min(remaining);
        if take > 0 {
            releases.push(Allocation {
                warehouse_id: *warehouse_id,
                quantity: take,
            });
            remaining -= take;
        }
    }

    let surplus = (remaining > 0).then(|| Allocation {
        warehouse_id: ordered[0].0,
        quantity: remaining,
    });

    ReleasePlan { releases, surplus }
}
