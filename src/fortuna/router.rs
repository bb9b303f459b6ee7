use std::sync::Mutex;

use tracing::trace;

use super::NUM_POOLS;
use crate::{config::RoutingPolicy, primitives::Hash, FortunaError};

struct RouterState<R> {
    index: u8,
    hash: R,
}

/// Chooses the pool receiving each entropy chunk.
///
/// A chunk always goes to the current pool index; the index for the next
/// chunk is then moved forward according to the routing policy. With the
/// randomized policy the next index is the first byte of
/// `R(current_index || chunk)` modulo the number of pools, `R` being a hash
/// distinct from the pools' own hash.
pub struct PoolRouter<R: Hash> {
    policy: RoutingPolicy,
    state: Mutex<RouterState<R>>,
}

impl<R: Hash> PoolRouter<R> {
    pub fn new(policy: RoutingPolicy, mut routing_hash: R) -> Self {
        routing_hash.restart();
        Self {
            policy,
            state: Mutex::new(RouterState {
                index: 0,
                hash: routing_hash,
            }),
        }
    }

    #[must_use]
    pub fn policy(&self) -> RoutingPolicy {
        self.policy
    }

    /// Returns the index of the pool that must ingest `chunk`
    pub fn route(&self, chunk: &[u8]) -> Result<usize, FortunaError> {
        let mut state = self.state.lock()?;
        let current = state.index;
        state.index = match self.policy {
            RoutingPolicy::RoundRobin => (current + 1) % NUM_POOLS as u8,
            RoutingPolicy::Randomized => {
                let mut next = [0_u8; 1];
                state.hash.update(&[current]);
                state.hash.update(chunk);
                state.hash.truncated_final(&mut next)?;
                next[0] % NUM_POOLS as u8
            }
        };
        trace!("entropy chunk of {} bytes routed to pool {current}", chunk.len());
        Ok(current as usize)
    }
}
