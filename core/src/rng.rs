//! Seeded draws for the sample-data importer.
//!
//! The trajectory engine and health scorer never draw random numbers. Only
//! fixture generation does (historical observations, baseline health), and
//! each kind of draw has its own stream so adding draws to one kind does not
//! shift the values of another. Same seed in, same fixtures out.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// Which fixture values a stream feeds. Discriminants are part of the seed
/// derivation, so existing ones must keep their values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum FixtureStream {
    History = 0,
    ProfileHealth = 1,
}

impl FixtureStream {
    pub fn rng(self, seed: u64) -> FixtureRng {
        FixtureRng::for_stream(seed, self)
    }
}

pub struct FixtureRng {
    stream: FixtureStream,
    inner:  Pcg64Mcg,
}

impl FixtureRng {
    pub fn for_stream(seed: u64, stream: FixtureStream) -> Self {
        // Spread stream ids across the seed space before mixing them in.
        let mixed = seed ^ (stream as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15);
        Self { stream, inner: Pcg64Mcg::seed_from_u64(mixed) }
    }

    pub fn stream(&self) -> FixtureStream {
        self.stream
    }

    /// Draw from [low, high).
    pub fn uniform(&mut self, low: f64, high: f64) -> f64 {
        self.inner.gen_range(low..high)
    }
}
