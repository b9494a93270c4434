//! Held item stacks.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::catalogue::ItemId;

pub const CONDITION_MAX: f32 = 100.0;

/// Stable identity of a stack within one agent state. Survives cloning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StackId(pub u64);

impl fmt::Display for StackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stack#{}", self.0)
    }
}

/// A quantity of one item at a shared condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stack {
    pub id: StackId,
    pub item: ItemId,
    amount: f32,
    amount_in_use: f32,
    condition: f32,
}

impl Stack {
    pub fn new(id: StackId, item: ItemId, amount: f32, condition: f32) -> Self {
        Self {
            id,
            item,
            amount: amount.max(0.0),
            amount_in_use: 0.0,
            condition: condition.clamp(0.0, CONDITION_MAX),
        }
    }

    pub fn amount(&self) -> f32 {
        self.amount
    }

    pub fn amount_in_use(&self) -> f32 {
        self.amount_in_use
    }

    /// Units not reserved as tools.
    pub fn amount_free(&self) -> f32 {
        (self.amount - self.amount_in_use).max(0.0)
    }

    pub fn condition(&self) -> f32 {
        self.condition
    }

    /// Sets the amount within `[0, cap]` and returns the change applied.
    pub fn set_amount(&mut self, value: f32, cap: f32) -> f32 {
        let old = self.amount;
        self.amount = value.clamp(0.0, cap);
        self.amount_in_use = self.amount_in_use.min(self.amount);
        self.amount - old
    }

    /// Sets the reserved amount within `[0, amount]` and returns the change.
    /// Newly reserved units wear the stack by `wear_per_unit` each.
    pub fn set_amount_in_use(&mut self, value: f32, wear_per_unit: f32) -> f32 {
        let old = self.amount_in_use;
        self.amount_in_use = value.clamp(0.0, self.amount);
        let change = self.amount_in_use - old;
        if change > 0.0 {
            self.wear(change * wear_per_unit);
        }
        change
    }

    pub fn wear(&mut self, loss: f32) {
        self.condition = (self.condition - loss).clamp(0.0, CONDITION_MAX);
    }

    pub fn decay(&mut self, delta_time: f32, rate: f32) {
        self.wear(delta_time * rate);
    }

    /// Whether units at `condition` may merge into this stack.
    pub fn accepts(&self, condition: f32, below: f32, above: f32) -> bool {
        self.condition >= condition - below && self.condition <= condition + above
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack(amount: f32) -> Stack {
        Stack::new(StackId(1), ItemId(0), amount, 100.0)
    }

    #[test]
    fn test_set_amount_respects_cap() {
        let mut s = stack(5.0);
        assert_eq!(s.set_amount(20.0, 12.0), 7.0);
        assert_eq!(s.amount(), 12.0);
        assert_eq!(s.set_amount(-3.0, 12.0), -12.0);
        assert_eq!(s.amount(), 0.0);
    }

    #[test]
    fn test_reservation_applies_wear() {
        let mut s = stack(4.0);
        assert_eq!(s.set_amount_in_use(3.0, 2.0), 3.0);
        assert_eq!(s.condition(), 94.0);
        assert_eq!(s.amount_free(), 1.0);

        // releasing does not wear
        assert_eq!(s.set_amount_in_use(0.0, 2.0), -3.0);
        assert_eq!(s.condition(), 94.0);
    }

    #[test]
    fn test_reservation_bounded_by_amount() {
        let mut s = stack(2.0);
        assert_eq!(s.set_amount_in_use(10.0, 0.0), 2.0);
        s.set_amount(1.0, 100.0);
        assert_eq!(s.amount_in_use(), 1.0);
    }

    #[test]
    fn test_condition_band() {
        let s = Stack::new(StackId(1), ItemId(0), 1.0, 80.0);
        assert!(s.accepts(80.0, 3.0, 10.0));
        assert!(s.accepts(83.0, 3.0, 10.0));
        assert!(!s.accepts(84.0, 3.0, 10.0));
        assert!(s.accepts(70.0, 3.0, 10.0));
        assert!(!s.accepts(69.0, 3.0, 10.0));
    }

    #[test]
    fn test_decay_floors_at_zero() {
        let mut s = stack(1.0);
        s.decay(1000.0, 1.0);
        assert_eq!(s.condition(), 0.0);
    }
}
