//! Deterministic pseudo-random source
//!
//! A 16-bit linear congruential generator. Each call to [`Rng::next`]
//! performs exactly one multiply-add on the state and returns bits 16..30 of
//! the 32-bit product.
//!
//! For replays to reproduce, the only fresh entropy a game may feed in is
//! the frame counter at its first reseed and controller masks.

use serde::{Deserialize, Serialize};

const MULTIPLIER: u32 = 1_103_515_245;
const INCREMENT: u32 = 12_345;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rng {
    state: u16,
}

impl Rng {
    pub const fn new(seed: u16) -> Self {
        Self { state: seed }
    }

    pub fn seed(&mut self, seed: u16) {
        self.state = seed;
    }

    /// Seed from the frame counter and the controller mask observed at that frame.
    pub fn reseed(&mut self, frame: u16, input: u8) {
        self.state = frame ^ ((input as u16) << 8 | input as u16);
    }

    /// Fold a controller byte into the state without advancing it.
    pub fn mix(&mut self, byte: u8) {
        self.state ^= byte as u16;
    }

    pub fn state(&self) -> u16 {
        self.state
    }

    /// Next 15-bit value
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> u16 {
        let x = (self.state as u32)
            .wrapping_mul(MULTIPLIER)
            .wrapping_add(INCREMENT);
        self.state = x as u16;
        ((x >> 16) & 0x7FFF) as u16
    }

    /// Value in `0..bound`; `bound` of 0 yields 0.
    pub fn below(&mut self, bound: u16) -> u16 {
        if bound == 0 {
            0
        } else {
            self.next() % bound
        }
    }
}

impl Default for Rng {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_value_from_seed_one() {
        // 1 * 1103515245 + 12345 = 0x41C67EA6 -> upper bits 0x41C6
        let mut rng = Rng::new(1);
        assert_eq!(rng.next(), 0x41C6);
        assert_eq!(rng.state(), 0x7EA6);
    }

    #[test]
    fn test_identical_seeds_identical_sequences() {
        let mut a = Rng::new(0xBEEF);
        let mut b = Rng::new(0xBEEF);
        for _ in 0..1000 {
            assert_eq!(a.next(), b.next());
        }
    }

    #[test]
    fn test_output_depends_only_on_state() {
        let mut a = Rng::new(7);
        a.next();
        a.next();
        let mut b = Rng::new(a.state());
        assert_eq!(a.next(), b.next());
    }

    #[test]
    fn test_output_is_15_bits() {
        let mut rng = Rng::new(0xFFFF);
        for _ in 0..4096 {
            assert!(rng.next() <= 0x7FFF);
        }
    }

    #[test]
    fn test_mix_and_reseed() {
        let mut rng = Rng::new(0x1234);
        rng.mix(0x0F);
        assert_eq!(rng.state(), 0x123B);

        rng.reseed(0x0100, 0x10);
        assert_eq!(rng.state(), 0x0100 ^ 0x1010);
    }

    #[test]
    fn test_below_bound() {
        let mut rng = Rng::new(3);
        for _ in 0..500 {
            assert!(rng.below(7) < 7);
        }
        assert_eq!(rng.below(0), 0);
    }
}
