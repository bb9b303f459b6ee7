//! Fortuna generator.
//!
//! Entropy events are split into chunks of at most `MAX_EVENT_SIZE` bytes,
//! each chunk is routed to one of the `NUM_POOLS` entropy pools. On every
//! generate request the reseed scheduler checks whether pool 0 holds enough
//! entropy and whether enough time elapsed; if so, the digests of a
//! geometric subset of the pools are mixed into the key of the counter mode
//! generator core. The core rekeys itself after every request.
//!
//! Locks are always taken in the same order: scheduler, then pools, then the
//! generator core. Ingestion only takes the router lock then one pool lock,
//! never both at once.

pub mod generator;
pub mod pool;
pub mod router;
pub mod scheduler;

use std::sync::{Arc, Mutex};

use rand_core::{CryptoRng, RngCore};

use self::{
    generator::GeneratorCore, pool::EntropyPool, router::PoolRouter, scheduler::ReseedScheduler,
};
use crate::{
    clock::{Clock, MonotonicClock},
    config::FortunaConfig,
    primitives::{
        aes::Aes256Cipher,
        sha2::{Sha256Hash, Sha512Hash},
        BlockCipher, Hash,
    },
    FortunaError,
};

/// Number of entropy pools
pub const NUM_POOLS: usize = 32;
/// Maximum size of an entropy chunk, its length is hashed as a single byte
pub const MAX_EVENT_SIZE: usize = 255;

/// Fortuna over AES-256, SHA-256 pools and SHA-512 pool routing
pub type AesFortuna = FortunaGenerator<Aes256Cipher, Sha256Hash, Sha512Hash>;

pub struct FortunaGenerator<C: BlockCipher, H: Hash, R: Hash> {
    pools: Vec<Mutex<EntropyPool<H>>>,
    router: PoolRouter<R>,
    scheduler: ReseedScheduler,
    core: GeneratorCore<C, H>,
    clock: Arc<dyn Clock>,
    config: FortunaConfig,
}

impl AesFortuna {
    pub fn aes256(config: FortunaConfig) -> Result<Self, FortunaError> {
        Self::new(config, Aes256Cipher::new(), Sha256Hash::new(), Sha512Hash::new())
    }
}

impl<C, H, R> FortunaGenerator<C, H, R>
where
    C: BlockCipher,
    H: Hash + Clone,
    R: Hash,
{
    /// Creates an unseeded generator.
    ///
    /// - `cipher`       : the block transform used in counter mode
    /// - `pool_hash`    : cloned into every pool and used for reseed derivation
    /// - `routing_hash` : picks the next pool when routing is randomized
    pub fn new(
        config: FortunaConfig,
        cipher: C,
        pool_hash: H,
        routing_hash: R,
    ) -> Result<Self, FortunaError> {
        Self::with_clock(
            config,
            cipher,
            pool_hash,
            routing_hash,
            Arc::new(MonotonicClock::new()),
        )
    }

    /// Same as `new` with an explicit time source
    pub fn with_clock(
        config: FortunaConfig,
        cipher: C,
        pool_hash: H,
        routing_hash: R,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, FortunaError> {
        config.validate()?;
        let pools = (0..NUM_POOLS)
            .map(|_| Mutex::new(EntropyPool::new(pool_hash.clone())))
            .collect();
        let core = GeneratorCore::new(cipher, pool_hash, config.max_generate_size)?;
        Ok(Self {
            pools,
            router: PoolRouter::new(config.routing, routing_hash),
            scheduler: ReseedScheduler::new(config.min_pool_size, config.reseed_interval_ms),
            core,
            clock,
            config,
        })
    }
}

impl<C, H, R> FortunaGenerator<C, H, R>
where
    C: BlockCipher,
    H: Hash,
    R: Hash,
{
    /// Adds an entropy event coming from source `source_id`.
    ///
    /// Events longer than `MAX_EVENT_SIZE` are split, each chunk being routed
    /// independently. Never triggers a reseed.
    pub fn incorporate_entropy(&self, source_id: u8, data: &[u8]) -> Result<(), FortunaError> {
        if data.is_empty() {
            return Err(FortunaError::InvalidArgument(
                "an entropy event cannot be empty".to_string(),
            ));
        }
        for chunk in data.chunks(MAX_EVENT_SIZE) {
            let index = self.router.route(chunk)?;
            self.pools[index].lock()?.ingest(source_id, chunk)?;
        }
        Ok(())
    }

    /// Fills `output` with random bytes.
    ///
    /// The request is served in pieces of at most
    /// `GeneratorCore::max_generate_size()` bytes; before each piece the
    /// pools are harvested if a reseed is due, after each piece the key is
    /// replaced.
    ///
    /// Fails with `InvalidState` as long as the generator was never seeded.
    pub fn generate_block(&self, output: &mut [u8]) -> Result<(), FortunaError> {
        if output.is_empty() {
            self.scheduler
                .maybe_reseed(&self.pools, &self.core, self.clock.now_ms())?;
            return self.core.generate(output);
        }
        for chunk in output.chunks_mut(self.core.max_generate_size()) {
            self.scheduler
                .maybe_reseed(&self.pools, &self.core, self.clock.now_ms())?;
            self.core.generate(chunk)?;
        }
        Ok(())
    }

    /// Mixes caller supplied material straight into the key.
    ///
    /// Restarts the reseed interval and leaves the pools untouched. It does
    /// not seed the generator: output still requires a pool harvest, so
    /// seed material meant to enable output goes through
    /// `incorporate_entropy`. Empty material is rejected.
    pub fn reseed(&self, material: &[u8]) -> Result<(), FortunaError> {
        self.scheduler
            .manual_reseed(&self.core, material, self.clock.now_ms())
    }

    /// Number of pool harvests so far
    pub fn reseed_count(&self) -> Result<u64, FortunaError> {
        self.scheduler.reseed_count()
    }

    /// Pool bytes drained by all harvests so far
    pub fn harvested_bytes(&self) -> Result<u64, FortunaError> {
        self.scheduler.harvested_bytes()
    }

    /// Whether the key has received at least one pool harvest
    pub fn is_seeded(&self) -> Result<bool, FortunaError> {
        Ok(self.core.reseed_count()? > 0)
    }

    /// Bytes hashed into each pool since its last harvest
    pub fn pool_sizes(&self) -> Result<[u64; NUM_POOLS], FortunaError> {
        let mut sizes = [0_u64; NUM_POOLS];
        for (size, pool) in sizes.iter_mut().zip(&self.pools) {
            *size = pool.lock()?.processed_data();
        }
        Ok(sizes)
    }

    #[must_use]
    pub fn config(&self) -> &FortunaConfig {
        &self.config
    }

    #[must_use]
    pub fn max_generate_size(&self) -> usize {
        self.core.max_generate_size()
    }

    /// Generate a vector of random bytes
    pub fn generate_random_bytes(&self, len: usize) -> Result<Vec<u8>, FortunaError> {
        let mut bytes = vec![0_u8; len];
        self.generate_block(&mut bytes)?;
        Ok(bytes)
    }
}

impl<C, H, R> RngCore for FortunaGenerator<C, H, R>
where
    C: BlockCipher,
    H: Hash,
    R: Hash,
{
    fn next_u32(&mut self) -> u32 {
        rand_core::impls::next_u32_via_fill(self)
    }

    fn next_u64(&mut self) -> u64 {
        rand_core::impls::next_u64_via_fill(self)
    }

    /// Panics if the generator is not seeded: `RngCore` offers no other way to
    /// report it. Use `try_fill_bytes` to handle the error.
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        if let Err(e) = self.generate_block(dest) {
            panic!("Fortuna generator failure: {e}");
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.generate_block(dest).map_err(rand_core::Error::from)
    }
}

impl<C, H, R> CryptoRng for FortunaGenerator<C, H, R>
where
    C: BlockCipher,
    H: Hash,
    R: Hash,
{
}
