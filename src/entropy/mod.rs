//! Entropy sources feeding the generator pools.
//!
//! Every source is a byte producer: it fills a buffer and the poller pushes
//! the buffer into the generator through `incorporate_entropy`, tagged with
//! the source id it was registered under. A source failing during a poll is
//! skipped for that poll, it never fails the generator.

pub mod hardware;
pub mod os;
pub mod system;
pub mod timer;

use tracing::{trace, warn};
use zeroize::Zeroizing;

use crate::{
    fortuna::FortunaGenerator,
    primitives::{BlockCipher, Hash},
    FortunaError,
};

/// Source ids given to the default slow sources start here so they never
/// collide with the fast ones.
pub const SLOW_SOURCE_ID_BASE: u8 = 128;

pub trait EntropySource: Send {
    /// A short name used in logs
    fn name(&self) -> &'static str;

    /// Fills `dest` with bytes from the source
    fn fill(&mut self, dest: &mut [u8]) -> Result<(), FortunaError>;
}

/// A set of sources polled together
pub struct EntropyPoller {
    sources: Vec<(u8, Box<dyn EntropySource>)>,
    poll_size: usize,
}

impl EntropyPoller {
    /// - `poll_size` : bytes requested from each source on every poll
    #[must_use]
    pub fn new(poll_size: usize) -> Self {
        Self {
            sources: Vec::new(),
            poll_size,
        }
    }

    /// Cheap, frequently changing sources: OS generator, CPU generators when
    /// present, timers
    #[must_use]
    pub fn fast(poll_size: usize) -> Self {
        let mut poller = Self::new(poll_size);
        poller.add_source(0, os::OsEntropy::non_blocking());
        for (id, instruction) in [
            (1, hardware::HardwareInstruction::RdRand),
            (2, hardware::HardwareInstruction::RdSeed),
        ] {
            if let Ok(source) = hardware::HardwareRng::new(instruction) {
                poller.add_source(id, source);
            }
        }
        poller.add_source(3, timer::TimerEntropy::new());
        poller
    }

    /// Expensive sources: kernel disk, network and interrupt statistics
    #[must_use]
    pub fn slow(poll_size: usize) -> Self {
        let mut poller = Self::new(poll_size);
        poller.add_source(SLOW_SOURCE_ID_BASE, system::SystemStatsEntropy::new());
        poller
    }

    pub fn add_source<S: EntropySource + 'static>(&mut self, source_id: u8, source: S) {
        self.sources.push((source_id, Box::new(source)));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Polls every source once and incorporates what they return.
    /// Returns the number of sources that delivered.
    pub fn poll<C, H, R>(&mut self, generator: &FortunaGenerator<C, H, R>) -> usize
    where
        C: BlockCipher,
        H: Hash,
        R: Hash,
    {
        let mut buffer = Zeroizing::new(vec![0_u8; self.poll_size]);
        let mut delivered = 0;
        for (source_id, source) in &mut self.sources {
            let result = source
                .fill(&mut buffer)
                .and_then(|()| generator.incorporate_entropy(*source_id, &buffer));
            match result {
                Ok(()) => delivered += 1,
                Err(e) => warn!("entropy source {} skipped: {e}", source.name()),
            }
        }
        trace!("{delivered}/{} entropy sources polled", self.sources.len());
        delivered
    }
}
