//! Simulation clock and state hashing.

use crate::fixed::{Fixed64, Ticks};
use serde::{Deserialize, Serialize};

/// Mutable clock state tracked by the city.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimState {
    /// Steps completed so far. Factories see this value as `time` during the
    /// step that is running.
    pub tick: Ticks,
}

impl SimState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Deterministic FNV-1a (64-bit) hash of city state, for desync checks.
/// Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 = (self.0 ^ u64::from(b)).wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_bool(&mut self, v: bool) {
        self.write(&[u8::from(v)]);
    }

    /// Hashes the raw bits, so equal values always hash equally.
    pub fn write_fixed64(&mut self, v: Fixed64) {
        self.write(&v.to_bits().to_le_bytes());
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_starts_at_zero() {
        assert_eq!(SimState::new().tick, 0);
    }

    #[test]
    fn equal_input_equal_hash() {
        let mut a = StateHash::new();
        a.write_u64(42);
        a.write_fixed64(Fixed64::from_num(1.5));
        let mut b = StateHash::new();
        b.write_u64(42);
        b.write_fixed64(Fixed64::from_num(1.5));
        assert_eq!(a.finish(), b.finish());
    }

    #[test]
    fn order_changes_hash() {
        let mut a = StateHash::new();
        a.write_u32(1);
        a.write_bool(true);
        let mut b = StateHash::new();
        b.write_bool(true);
        b.write_u32(1);
        assert_ne!(a.finish(), b.finish());
    }
}
