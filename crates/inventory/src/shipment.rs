use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::warehouse::WarehouseId;

/// Shipment identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShipmentId(pub Uuid);

impl ShipmentId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ShipmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for ShipmentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// One line of a shipment: the warehouse it was booked against and how many
/// units it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentItem {
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
}

/// The slice of shipment state the engine needs: whether the shipment left
/// the building. A booking can only be reversed after that point — before it,
/// nothing was committed, so there is nothing to reverse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: ShipmentId,
    pub shipped_at: Option<DateTime<Utc>>,
    pub items: Vec<ShipmentItem>,
}

impl Shipment {
    pub fn pending(id: ShipmentId, items: Vec<ShipmentItem>) -> Self {
        Self {
            id,
            shipped_at: None,
            items,
        }
    }

    pub fn shipped(id: ShipmentId, shipped_at: DateTime<Utc>, items: Vec<ShipmentItem>) -> Self {
        Self {
            id,
            shipped_at: Some(shipped_at),
            items,
        }
    }
}
