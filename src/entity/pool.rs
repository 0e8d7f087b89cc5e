//! A single depletable resource with a soft and a permanent ceiling

use serde::{Deserialize, Serialize};

/// Current level, soft ceiling and permanent ceiling of one resource
///
/// Invariant after every update: `0 <= current <= current_max <= max` and
/// `min <= current_max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourcePool {
    pub current: f32,
    /// Soft ceiling; erodes while a deficit is recovered, regrows toward `max`
    pub current_max: f32,
    /// Permanent ceiling, already scaled by capability multipliers
    pub max: f32,
    /// Floor for `current_max`
    pub min: f32,
}

impl ResourcePool {
    pub fn new(current: f32, current_max: f32, min: f32, max: f32) -> Self {
        let mut pool = Self {
            current,
            current_max,
            max,
            min,
        };
        pool.clamp();
        pool
    }

    /// Full pool: current and soft ceiling at `max`
    pub fn full(min: f32, max: f32) -> Self {
        Self::new(max, max, min, max)
    }

    /// Empty pool with the soft ceiling at its floor
    pub fn empty(min: f32, max: f32) -> Self {
        Self::new(0.0, min, min, max)
    }

    pub fn is_empty(&self) -> bool {
        self.current <= 0.0
    }

    /// Current level has caught up with the soft ceiling
    pub fn is_topped_up(&self) -> bool {
        self.current >= self.current_max
    }

    /// Soft ceiling has regrown to the permanent ceiling
    pub fn ceiling_restored(&self) -> bool {
        self.current_max >= self.max
    }

    /// Completely full: `current == current_max == max`
    pub fn is_full(&self) -> bool {
        self.is_topped_up() && self.ceiling_restored()
    }

    /// `0 <= current <= current_max <= max` and `min <= current_max`
    pub fn invariant_holds(&self) -> bool {
        0.0 <= self.current
            && self.current <= self.current_max
            && self.current_max <= self.max
            && self.min <= self.current_max
    }

    /// Fraction of the permanent ceiling currently held
    pub fn fraction(&self) -> f32 {
        if self.max <= 0.0 {
            return 0.0;
        }
        (self.current / self.max).clamp(0.0, 1.0)
    }

    /// Remove `amount`, stopping at zero. Returns true if the pool is now empty.
    pub fn drain(&mut self, amount: f32) -> bool {
        self.current = (self.current - amount).max(0.0);
        self.is_empty()
    }

    /// Raise `current` by `gain` while eroding the soft ceiling by `erosion`
    ///
    /// The ceiling is lowered first, so the recovered amount is capped by the
    /// eroded ceiling.
    pub fn recover(&mut self, gain: f32, erosion: f32) {
        self.current_max = (self.current_max - erosion).clamp(self.min, self.max);
        self.current = (self.current + gain).clamp(0.0, self.current_max);
    }

    /// Grow the soft ceiling by `amount`; `current` follows by the same amount
    pub fn regrow_ceiling(&mut self, amount: f32) {
        self.current_max = (self.current_max + amount).clamp(self.min, self.max);
        self.current = (self.current + amount).clamp(0.0, self.current_max);
    }

    /// Apply new bounds (a multiplier or the config changed)
    pub fn reconfigure(&mut self, min: f32, max: f32) {
        self.min = min;
        self.max = max;
        self.clamp();
    }

    /// Force the pool onto its floor: nothing held, ceiling at `min`
    pub fn collapse(&mut self) {
        self.current = 0.0;
        self.current_max = self.min;
    }

    fn clamp(&mut self) {
        self.min = self.min.min(self.max);
        self.current_max = self.current_max.clamp(self.min, self.max);
        self.current = self.current.clamp(0.0, self.current_max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clamps_into_invariant() {
        let pool = ResourcePool::new(120.0, 150.0, 20.0, 100.0);
        assert_eq!(pool.current_max, 100.0);
        assert_eq!(pool.current, 100.0);

        let pool = ResourcePool::new(5.0, 10.0, 20.0, 100.0);
        assert_eq!(pool.current_max, 20.0);
        assert_eq!(pool.current, 5.0);
    }

    #[test]
    fn test_drain_stops_at_zero() {
        let mut pool = ResourcePool::full(20.0, 100.0);
        assert!(!pool.drain(30.0));
        assert_eq!(pool.current, 70.0);
        assert!(pool.drain(500.0));
        assert_eq!(pool.current, 0.0);
    }

    #[test]
    fn test_recover_erodes_ceiling() {
        let mut pool = ResourcePool::new(40.0, 50.0, 20.0, 100.0);
        pool.recover(4.0, 1.0);
        assert_eq!(pool.current_max, 49.0);
        assert_eq!(pool.current, 44.0);
    }

    #[test]
    fn test_recover_never_erodes_below_min() {
        let mut pool = ResourcePool::new(0.0, 21.0, 20.0, 100.0);
        pool.recover(100.0, 10.0);
        assert_eq!(pool.current_max, 20.0);
        assert_eq!(pool.current, 20.0);
    }

    #[test]
    fn test_regrow_ceiling_tracks_current() {
        let mut pool = ResourcePool::new(80.0, 80.0, 20.0, 100.0);
        pool.regrow_ceiling(2.0);
        assert_eq!(pool.current_max, 82.0);
        assert_eq!(pool.current, 82.0);

        pool.regrow_ceiling(50.0);
        assert!(pool.is_full());
    }

    #[test]
    fn test_reconfigure_down_clamps() {
        let mut pool = ResourcePool::full(20.0, 150.0);
        pool.reconfigure(20.0, 100.0);
        assert_eq!(pool.current_max, 100.0);
        assert_eq!(pool.current, 100.0);
        assert!(pool.is_full());
    }

    #[test]
    fn test_collapse_keeps_floor() {
        let mut pool = ResourcePool::full(2.0, 10.0);
        pool.collapse();
        assert_eq!(pool.current, 0.0);
        assert_eq!(pool.current_max, 2.0);
    }

    #[test]
    fn test_fraction() {
        let pool = ResourcePool::new(25.0, 50.0, 20.0, 100.0);
        assert_eq!(pool.fraction(), 0.25);
    }
}
