//! Construction parameters of the generator and of the auto-seeder.
//!
//! Both structures can be (de)serialized so they can be embedded in an
//! application configuration file.

use serde::{Deserialize, Serialize};

use crate::FortunaError;

/// Default minimum number of bytes pool 0 must have received before a reseed
pub const DEFAULT_MIN_POOL_SIZE: u64 = 64;
/// Default minimum delay between two reseeds
pub const DEFAULT_RESEED_INTERVAL_MS: u64 = 100;
/// Default cap on the bytes produced under one key
pub const DEFAULT_MAX_GENERATE_SIZE: usize = 1 << 20;

/// How incoming entropy chunks are spread across the pools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingPolicy {
    /// pool index increments by one after every chunk
    RoundRobin,
    /// next pool index is derived from a hash of the current index and the chunk
    Randomized,
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        RoutingPolicy::Randomized
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FortunaConfig {
    pub routing: RoutingPolicy,
    /// bytes pool 0 must hold before any reseed can happen
    pub min_pool_size: u64,
    /// minimum delay between two reseeds, the first reseed is never delayed
    pub reseed_interval_ms: u64,
    /// cap on the bytes produced under one key, `None` leaves only the cap
    /// derived from the cipher block size, which it can never raise
    pub max_generate_size: Option<usize>,
}

impl Default for FortunaConfig {
    fn default() -> Self {
        Self {
            routing: RoutingPolicy::default(),
            min_pool_size: DEFAULT_MIN_POOL_SIZE,
            reseed_interval_ms: DEFAULT_RESEED_INTERVAL_MS,
            max_generate_size: Some(DEFAULT_MAX_GENERATE_SIZE),
        }
    }
}

impl FortunaConfig {
    #[must_use]
    pub fn with_routing(mut self, routing: RoutingPolicy) -> Self {
        self.routing = routing;
        self
    }

    #[must_use]
    pub fn with_min_pool_size(mut self, min_pool_size: u64) -> Self {
        self.min_pool_size = min_pool_size;
        self
    }

    #[must_use]
    pub fn with_reseed_interval_ms(mut self, reseed_interval_ms: u64) -> Self {
        self.reseed_interval_ms = reseed_interval_ms;
        self
    }

    #[must_use]
    pub fn with_max_generate_size(mut self, max_generate_size: usize) -> Self {
        self.max_generate_size = Some(max_generate_size);
        self
    }

    pub fn validate(&self) -> Result<(), FortunaError> {
        if self.min_pool_size == 0 {
            return Err(FortunaError::InvalidArgument(
                "the minimum pool size must be at least 1 byte".to_string(),
            ));
        }
        if self.max_generate_size == Some(0) {
            return Err(FortunaError::InvalidArgument(
                "the maximum generate size must be at least 1 byte".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedingMode {
    /// one fast poll runs synchronously before every generate call
    PollOnCall,
    /// fast (and optionally slow) polls run on background threads
    Background,
}

impl Default for SeedingMode {
    fn default() -> Self {
        SeedingMode::PollOnCall
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoSeederConfig {
    pub mode: SeedingMode,
    /// bytes requested from each source on every poll
    pub poll_size: usize,
    pub fast_poll_interval_ms: u64,
    /// `None` disables the slow poll thread
    pub slow_poll_interval_ms: Option<u64>,
    /// bytes of OS entropy used to seed the generator at construction, 0 to skip
    pub initial_seed_size: usize,
    /// how long teardown waits for each background thread
    pub join_timeout_ms: u64,
}

impl Default for AutoSeederConfig {
    fn default() -> Self {
        Self {
            mode: SeedingMode::default(),
            poll_size: 32,
            fast_poll_interval_ms: 100,
            slow_poll_interval_ms: Some(10_000),
            initial_seed_size: 64,
            join_timeout_ms: 1_000,
        }
    }
}

impl AutoSeederConfig {
    #[must_use]
    pub fn background() -> Self {
        Self {
            mode: SeedingMode::Background,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), FortunaError> {
        if self.poll_size == 0 {
            return Err(FortunaError::InvalidArgument(
                "the poll size must be at least 1 byte".to_string(),
            ));
        }
        if self.mode == SeedingMode::Background && self.fast_poll_interval_ms == 0 {
            return Err(FortunaError::InvalidArgument(
                "background polling needs a non zero interval".to_string(),
            ));
        }
        if self.slow_poll_interval_ms == Some(0) {
            return Err(FortunaError::InvalidArgument(
                "background polling needs a non zero interval".to_string(),
            ));
        }
        Ok(())
    }
}
