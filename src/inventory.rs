use std::collections::BTreeMap;

use thiserror::Error;

use crate::market::listing::DurationClass;
use crate::market::provider::MarketItem;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InventoryError {
    #[error("only {available} listings of {duration} available, {requested} requested")]
    Insufficient {
        duration: DurationClass,
        requested: usize,
        available: usize,
    },
}

/// The seller's own listings grouped by subscription length.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    by_duration: BTreeMap<DurationClass, Vec<MarketItem>>,
    total: usize,
}

impl Inventory {
    /// Listings whose duration matches no known class count toward the total only.
    pub fn from_items(items: Vec<MarketItem>) -> Self {
        let total = items.len();
        let mut by_duration: BTreeMap<DurationClass, Vec<MarketItem>> = BTreeMap::new();
        for item in items {
            if let Some(duration) = item.gifts_duration.and_then(DurationClass::from_days) {
                by_duration.entry(duration).or_default().push(item);
            }
        }
        Self { by_duration, total }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn count(&self, duration: DurationClass) -> usize {
        self.by_duration.get(&duration).map_or(0, Vec::len)
    }

    /// First `count` listings of `duration`, in the order the marketplace returned them.
    pub fn select(
        &self,
        duration: DurationClass,
        count: usize,
    ) -> Result<&[MarketItem], InventoryError> {
        let available = self.by_duration.get(&duration).map_or(&[][..], Vec::as_slice);
        if available.len() < count {
            return Err(InventoryError::Insufficient {
                duration,
                requested: count,
                available: available.len(),
            });
        }
        Ok(&available[..count])
    }
}
