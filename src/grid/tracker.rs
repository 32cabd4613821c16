//! Per-level session state: which levels are held and which carry an open
//! order. Side effects are confined to the tracker's own slots; no I/O.

use crate::types::{GridLevel, OrderId, Side};

/// The engine's record of an order it placed for a level. At most one open
/// order per level at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelOrder {
    pub id: OrderId,
    pub side: Side,
    pub price: f64,
    pub quantity: f64,
}

#[derive(Debug, Clone, Default)]
struct LevelSlot {
    held: bool,
    open: Option<LevelOrder>,
}

/// Tracks the engine's belief about net position per level. This may lag
/// true exchange state between polls; consistency is eventual, not strict.
#[derive(Debug, Clone)]
pub struct GridStateTracker {
    prices: Vec<f64>,
    slots: Vec<LevelSlot>,
}

impl GridStateTracker {
    /// Build a fresh tracker for a level sequence, all levels empty.
    pub fn new(levels: &[GridLevel]) -> Self {
        Self {
            prices: levels.iter().map(|level| level.price).collect(),
            slots: vec![LevelSlot::default(); levels.len()],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn mark_held(&mut self, level_index: usize) {
        if let Some(slot) = self.slots.get_mut(level_index) {
            slot.held = true;
        }
    }

    pub fn mark_released(&mut self, level_index: usize) {
        if let Some(slot) = self.slots.get_mut(level_index) {
            slot.held = false;
        }
    }

    pub fn is_held(&self, level_index: usize) -> bool {
        self.slots.get(level_index).map_or(false, |slot| slot.held)
    }

    pub fn set_open_order(&mut self, level_index: usize, order: LevelOrder) {
        if let Some(slot) = self.slots.get_mut(level_index) {
            slot.open = Some(order);
        }
    }

    pub fn open_order(&self, level_index: usize) -> Option<&LevelOrder> {
        self.slots.get(level_index).and_then(|slot| slot.open.as_ref())
    }

    /// Remove and return the open order recorded for a level, if any.
    pub fn take_open_order(&mut self, level_index: usize) -> Option<LevelOrder> {
        self.slots
            .get_mut(level_index)
            .and_then(|slot| slot.open.take())
    }

    /// Drain every recorded open order, lowest level first.
    pub fn drain_open_orders(&mut self) -> Vec<(usize, LevelOrder)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| slot.open.take().map(|order| (index, order)))
            .collect()
    }

    pub fn held_levels(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.held)
            .map(|(index, _)| index)
            .collect()
    }

    /// Locate the lowest level whose price is strictly greater than
    /// `price` (a first-greater-than binary search over the sorted level
    /// sequence). Returns `None` when the price sits outside the
    /// configured range.
    pub fn find_straddling_level(&self, price: f64) -> Option<usize> {
        let (first, last) = match (self.prices.first(), self.prices.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return None,
        };
        if price < first || price >= last {
            return None;
        }
        Some(self.prices.partition_point(|&level_price| level_price <= price))
    }
}
