//! Fast random number generation for victim selection.
//!
//! Implements xorshift64+: two 32-bit xorshift sequences added together,
//! shift triplet `[17, 7, 16]`. Each worker owns one generator, seeded by
//! hashing a global counter through `RandomState` so workers diverge.

use std::cell::Cell;
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering::Relaxed;

static COUNTER: AtomicU32 = AtomicU32::new(1);

fn seed() -> u64 {
    let rand_state = RandomState::new();
    let mut hasher = rand_state.build_hasher();

    // Hash some unique-ish data to generate some new state
    COUNTER.fetch_add(1, Relaxed).hash(&mut hasher);

    hasher.finish()
}

pub(crate) struct FastRand {
    one: Cell<u32>,
    two: Cell<u32>,
}

impl FastRand {
    /// Creates a generator with process-unique state.
    pub(crate) fn seeded() -> FastRand {
        let seed = seed();
        let one = (seed >> 32) as u32;
        let mut two = seed as u32;
        if two == 0 {
            // This value cannot be zero
            two = 1;
        }
        FastRand {
            one: Cell::new(one),
            two: Cell::new(two),
        }
    }

    /// Uniform value in `0..n`.
    pub(crate) fn fastrand_n(&self, n: u32) -> u32 {
        // This is similar to fastrand() % n, but faster.
        // See https://lemire.me/blog/2016/06/27/a-fast-alternative-to-the-modulo-reduction/
        let mul = u64::from(self.fastrand()).wrapping_mul(u64::from(n));
        (mul >> 32) as u32
    }

    fn fastrand(&self) -> u32 {
        let mut s1 = self.one.get();
        let s0 = self.two.get();

        s1 ^= s1 << 17;
        s1 = s1 ^ s0 ^ s1 >> 7 ^ s0 >> 16;

        self.one.set(s0);
        self.two.set(s1);

        s0.wrapping_add(s1)
    }
}
