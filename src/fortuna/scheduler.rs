use std::sync::Mutex;

use tracing::debug;
use zeroize::Zeroizing;

use super::{generator::GeneratorCore, pool::EntropyPool, NUM_POOLS};
use crate::{
    primitives::{BlockCipher, Hash},
    FortunaError,
};

/// Indices of the pools drained by reseed number `reseed_count`:
/// pool `i` is drained when `2^i` divides `reseed_count`.
///
/// The scan stops at the first pool that is not selected: if `2^i` does
/// not divide the count, no higher power of two does.
#[must_use]
pub fn pools_to_harvest(reseed_count: u64) -> Vec<usize> {
    let mut pools = Vec::new();
    for i in 0..NUM_POOLS {
        if reseed_count % (1_u64 << i) != 0 {
            break;
        }
        pools.push(i);
    }
    pools
}

#[derive(Debug)]
struct SchedulerState {
    reseed_count: u64,
    last_reseed_ms: u64,
    harvested_bytes: u64,
}

/// Decides when the pools are harvested into the generator key.
///
/// A reseed happens when pool 0 holds at least `min_pool_size` bytes and
/// either no reseed ever happened or `reseed_interval_ms` elapsed since the
/// last one. The decision and the harvest run under the scheduler lock, the
/// pool locks and then the generator lock are taken inside it.
#[derive(Debug)]
pub struct ReseedScheduler {
    min_pool_size: u64,
    reseed_interval_ms: u64,
    state: Mutex<SchedulerState>,
}

impl ReseedScheduler {
    #[must_use]
    pub fn new(min_pool_size: u64, reseed_interval_ms: u64) -> Self {
        Self {
            min_pool_size,
            reseed_interval_ms,
            state: Mutex::new(SchedulerState {
                reseed_count: 0,
                last_reseed_ms: 0,
                harvested_bytes: 0,
            }),
        }
    }

    /// Number of pool harvests so far
    pub fn reseed_count(&self) -> Result<u64, FortunaError> {
        Ok(self.state.lock()?.reseed_count)
    }

    /// Pool bytes drained by all harvests so far
    pub fn harvested_bytes(&self) -> Result<u64, FortunaError> {
        Ok(self.state.lock()?.harvested_bytes)
    }

    /// Harvests the due pools into `core` if the gate allows it.
    /// Returns whether a reseed happened.
    pub fn maybe_reseed<H, C, RH>(
        &self,
        pools: &[Mutex<EntropyPool<H>>],
        core: &GeneratorCore<C, RH>,
        now_ms: u64,
    ) -> Result<bool, FortunaError>
    where
        H: Hash,
        C: BlockCipher,
        RH: Hash,
    {
        let mut state = self.state.lock()?;
        let pool_0_size = pools
            .first()
            .ok_or_else(|| FortunaError::InvalidState("no entropy pool".to_string()))?
            .lock()?
            .processed_data();
        if pool_0_size < self.min_pool_size {
            return Ok(false);
        }
        if state.reseed_count > 0
            && now_ms.saturating_sub(state.last_reseed_ms) < self.reseed_interval_ms
        {
            return Ok(false);
        }

        let reseed_count = state.reseed_count + 1;
        let harvested = pools_to_harvest(reseed_count);
        let mut material = Zeroizing::new(Vec::new());
        for &i in &harvested {
            let pool = pools.get(i).ok_or_else(|| {
                FortunaError::InvalidState(format!("missing entropy pool {i}"))
            })?;
            let mut pool = pool.lock()?;
            state.harvested_bytes += pool.processed_data();
            material.extend_from_slice(&pool.harvest());
        }
        core.reseed(&material)?;
        state.reseed_count = reseed_count;
        state.last_reseed_ms = now_ms;
        debug!(
            "reseed #{reseed_count}: harvested {} pools, {} bytes of material",
            harvested.len(),
            material.len()
        );
        Ok(true)
    }

    /// Mixes caller supplied material into `core`, without touching the
    /// pools. Restarts the reseed interval but neither seeds the generator
    /// nor advances the harvest count.
    pub fn manual_reseed<C: BlockCipher, RH: Hash>(
        &self,
        core: &GeneratorCore<C, RH>,
        material: &[u8],
        now_ms: u64,
    ) -> Result<(), FortunaError> {
        let mut state = self.state.lock()?;
        core.mix(material)?;
        state.last_reseed_ms = now_ms;
        debug!("manual reseed with {} bytes of material", material.len());
        Ok(())
    }
}
