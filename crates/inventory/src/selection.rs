use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockpile_catalog::ProductId;

/// Attribute combination identifier (a specific variant, e.g. size+color).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CombinationId(pub Uuid);

impl CombinationId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for CombinationId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for CombinationId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// A bundle component: another product pulled along by an adjustment,
/// scaled by its configured multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociatedProduct {
    pub product_id: ProductId,
    /// Units of the component consumed per unit of the primary product.
    pub quantity: i64,
}

/// The resolved attribute selection accompanying an adjustment.
///
/// The storefront resolves raw attribute input into this typed form before
/// it reaches the engine: the matching combination (for products tracked per
/// combination) and any associated bundle components.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttributeSelection {
    pub combination_id: Option<CombinationId>,
    pub associated: Vec<AssociatedProduct>,
}

impl AttributeSelection {
    /// Selection with no combination and no bundle components.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn for_combination(combination_id: CombinationId) -> Self {
        Self {
            combination_id: Some(combination_id),
            associated: Vec::new(),
        }
    }

    pub fn with_associated(mut self, product_id: ProductId, quantity: i64) -> Self {
        self.associated.push(AssociatedProduct {
            product_id,
            quantity,
        });
        self
    }
}
