//! Seeded random deviates.
//!
//! A [`BaseDeviate`] owns the only generator state. The distribution types
//! below are plain parameter records that borrow a base deviate for each
//! draw, so any mix of uniform, Gaussian, Poisson and binomial draws made
//! in the same order from the same seed replays bit for bit.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use rand_distr::{Binomial, Distribution, Normal, Poisson};

use crate::error::{require_finite, require_positive, ProfileError, Result};

/// Seedable generator shared by every consumer of randomness in a render.
#[derive(Debug, Clone)]
pub struct BaseDeviate {
    rng: StdRng,
    seed: u64,
}

impl BaseDeviate {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    /// Seed this deviate was last (re)initialised with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
        self.seed = seed;
    }

    /// Independent copy that continues the same stream from the current state.
    pub fn duplicate(&self) -> Self {
        self.clone()
    }

    /// Uniform draw in `[0, 1)`.
    pub fn uniform(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

impl RngCore for BaseDeviate {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
        self.rng.try_fill_bytes(dest)
    }
}

/// Uniform deviate on `[low, high)`.
#[derive(Debug, Clone, Copy)]
pub struct UniformDeviate {
    low: f64,
    high: f64,
}

impl UniformDeviate {
    pub fn new(low: f64, high: f64) -> Result<Self> {
        require_finite("low", low)?;
        require_finite("high", high)?;
        if high <= low {
            return Err(ProfileError::invalid("high", format!("must exceed low ({low}), got {high}")));
        }
        Ok(Self { low, high })
    }

    pub fn sample(&self, base: &mut BaseDeviate) -> f64 {
        self.low + (self.high - self.low) * base.uniform()
    }
}

/// Gaussian deviate with given mean and standard deviation.
#[derive(Debug, Clone, Copy)]
pub struct GaussianDeviate {
    dist: Normal<f64>,
}

impl GaussianDeviate {
    pub fn new(mean: f64, sigma: f64) -> Result<Self> {
        require_finite("mean", mean)?;
        require_positive("sigma", sigma)?;
        let dist = Normal::new(mean, sigma).map_err(|e| ProfileError::invalid("sigma", e.to_string()))?;
        Ok(Self { dist })
    }

    pub fn sample(&self, base: &mut BaseDeviate) -> f64 {
        self.dist.sample(base)
    }
}

/// Poisson deviate; a zero mean always yields zero.
#[derive(Debug, Clone, Copy)]
pub struct PoissonDeviate {
    dist: Option<Poisson<f64>>,
}

impl PoissonDeviate {
    pub fn new(mean: f64) -> Result<Self> {
        if !(mean.is_finite() && mean >= 0.0) {
            return Err(ProfileError::invalid("mean", format!("must be finite and >= 0, got {mean}")));
        }
        let dist = if mean > 0.0 {
            Some(Poisson::new(mean).map_err(|e| ProfileError::invalid("mean", e.to_string()))?)
        } else {
            None
        };
        Ok(Self { dist })
    }

    pub fn sample(&self, base: &mut BaseDeviate) -> f64 {
        match &self.dist {
            Some(dist) => dist.sample(base),
            None => 0.0,
        }
    }
}

/// Number of successes in `n` Bernoulli trials with probability `p`.
#[derive(Debug, Clone, Copy)]
pub struct BinomialDeviate {
    dist: Binomial,
}

impl BinomialDeviate {
    pub fn new(n: u64, p: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&p) {
            return Err(ProfileError::invalid("p", format!("must lie in [0, 1], got {p}")));
        }
        let dist = Binomial::new(n, p).map_err(|e| ProfileError::invalid("p", e.to_string()))?;
        Ok(Self { dist })
    }

    pub fn sample(&self, base: &mut BaseDeviate) -> u64 {
        self.dist.sample(base)
    }
}
