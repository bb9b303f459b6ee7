use std::{
    hint::black_box,
    time::{Instant, SystemTime, UNIX_EPOCH},
};

use super::EntropySource;
use crate::FortunaError;

/// Rounds of busy work timed for every output word
const JITTER_ROUNDS: u64 = 16;

/// Wall clock and execution time jitter.
///
/// Each output word mixes the wall clock nanoseconds with the duration of a
/// short busy loop. The bytes are low grade, the pools do the conditioning.
#[derive(Debug)]
pub struct TimerEntropy {
    origin: Instant,
}

impl TimerEntropy {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    fn jitter(&self) -> u64 {
        let start = Instant::now();
        let mut x = 0_u64;
        for i in 0..JITTER_ROUNDS {
            x = black_box(x.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(i));
        }
        let elapsed = start.duration_since(self.origin).as_nanos() as u64;
        elapsed ^ (start.elapsed().as_nanos() as u64).rotate_left(32) ^ x
    }
}

impl Default for TimerEntropy {
    fn default() -> Self {
        Self::new()
    }
}

impl EntropySource for TimerEntropy {
    fn name(&self) -> &'static str {
        "timers"
    }

    fn fill(&mut self, dest: &mut [u8]) -> Result<(), FortunaError> {
        // a clock before the epoch still yields usable bytes
        let wall = match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_nanos() as u64,
            Err(e) => e.duration().as_nanos() as u64,
        };
        for (i, chunk) in dest.chunks_mut(8).enumerate() {
            let word = wall.rotate_left(i as u32 % 64) ^ self.jitter();
            chunk.copy_from_slice(&word.to_le_bytes()[..chunk.len()]);
        }
        Ok(())
    }
}
