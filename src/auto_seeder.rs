//! Automatic seeding of a Fortuna generator.
//!
//! The seeder owns the entropy pollers and keeps the generator fed, either
//! by polling the fast sources right before each request or with
//! background threads polling at fixed intervals. Background threads are
//! stopped and joined, with a bounded wait, on `shutdown` or drop.

use std::{
    sync::{Arc, Condvar, Mutex},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use rand_core::{CryptoRng, RngCore};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::{
    config::{AutoSeederConfig, SeedingMode},
    entropy::{os::OsEntropy, EntropyPoller, EntropySource},
    fortuna::{FortunaGenerator, NUM_POOLS},
    primitives::{BlockCipher, Hash},
    FortunaError,
};

/// Sleep between two checks of a stopping thread
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(5);
/// Source id of the OS generator, shared with the default fast poller
const OS_SOURCE_ID: u8 = 0;
/// Bound on the initial seed events when pool 0 is not reached
const MAX_INITIAL_SEED_EVENTS: usize = 4 * NUM_POOLS;

#[derive(Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    condvar: Condvar,
}

impl StopSignal {
    fn stop(&self) {
        match self.stopped.lock() {
            Ok(mut stopped) => *stopped = true,
            Err(poisoned) => *poisoned.into_inner() = true,
        }
        self.condvar.notify_all();
    }

    /// Waits up to `timeout` for the stop signal, returns whether it was
    /// raised
    fn wait(&self, timeout: Duration) -> bool {
        let Ok(stopped) = self.stopped.lock() else {
            return true;
        };
        match self
            .condvar
            .wait_timeout_while(stopped, timeout, |stopped| !*stopped)
        {
            Ok((stopped, _)) => *stopped,
            Err(_) => true,
        }
    }
}

struct Worker {
    name: &'static str,
    handle: JoinHandle<()>,
}

pub struct AutoSeeder<C, H, R>
where
    C: BlockCipher + 'static,
    H: Hash + 'static,
    R: Hash + 'static,
{
    generator: Arc<FortunaGenerator<C, H, R>>,
    config: AutoSeederConfig,
    fast: Arc<Mutex<EntropyPoller>>,
    stop: Arc<StopSignal>,
    workers: Vec<Worker>,
}

impl<C, H, R> AutoSeeder<C, H, R>
where
    C: BlockCipher + 'static,
    H: Hash + 'static,
    R: Hash + 'static,
{
    /// Feeds `generator` an initial OS seed and starts feeding it from the
    /// default fast and slow sources
    pub fn new(
        generator: FortunaGenerator<C, H, R>,
        config: AutoSeederConfig,
    ) -> Result<Self, FortunaError> {
        let fast = EntropyPoller::fast(config.poll_size);
        let slow = EntropyPoller::slow(config.poll_size);
        Self::with_pollers(generator, config, fast, Some(slow))
    }

    /// Ingests blocking OS entropy as events from `OS_SOURCE_ID` until pool 0
    /// passes the reseed gate, so the first request can harvest it.
    ///
    /// The router starts on pool 0, a fresh generator only needs one event.
    fn initial_seed(
        generator: &FortunaGenerator<C, H, R>,
        seed_size: usize,
    ) -> Result<(), FortunaError> {
        let min_pool_size = generator.config().min_pool_size;
        let mut os = OsEntropy::blocking();
        let mut seed = Zeroizing::new(vec![0_u8; seed_size]);
        let mut events = 0;
        loop {
            os.fill(&mut seed)?;
            generator.incorporate_entropy(OS_SOURCE_ID, &seed)?;
            events += 1;
            if generator.pool_sizes()?[0] >= min_pool_size {
                break;
            }
            if events >= MAX_INITIAL_SEED_EVENTS {
                warn!("pool 0 still below {min_pool_size} bytes after the initial seed");
                break;
            }
        }
        debug!("initial seeding with {events} events of {seed_size} bytes");
        Ok(())
    }

    /// Same as `new` with explicit source sets.
    ///
    /// The slow poller only runs in background mode and only when a slow
    /// interval is configured.
    pub fn with_pollers(
        generator: FortunaGenerator<C, H, R>,
        config: AutoSeederConfig,
        fast: EntropyPoller,
        slow: Option<EntropyPoller>,
    ) -> Result<Self, FortunaError> {
        config.validate()?;
        let generator = Arc::new(generator);
        if config.initial_seed_size > 0 {
            Self::initial_seed(&generator, config.initial_seed_size)?;
        }

        let mut seeder = Self {
            generator,
            config,
            fast: Arc::new(Mutex::new(fast)),
            stop: Arc::new(StopSignal::default()),
            workers: Vec::new(),
        };
        if seeder.config.mode == SeedingMode::Background {
            let fast = seeder.fast.clone();
            let fast_interval = Duration::from_millis(seeder.config.fast_poll_interval_ms);
            seeder.spawn("fast", fast, fast_interval)?;
            if let (Some(slow), Some(interval_ms)) = (slow, seeder.config.slow_poll_interval_ms) {
                let slow = Arc::new(Mutex::new(slow));
                seeder.spawn("slow", slow, Duration::from_millis(interval_ms))?;
            }
        }
        Ok(seeder)
    }

    fn spawn(
        &mut self,
        name: &'static str,
        poller: Arc<Mutex<EntropyPoller>>,
        interval: Duration,
    ) -> Result<(), FortunaError> {
        let generator = self.generator.clone();
        let stop = self.stop.clone();
        let handle = thread::Builder::new()
            .name(format!("fortuna-{name}-poll"))
            .spawn(move || {
                debug!("{name} poll thread started");
                loop {
                    match poller.lock() {
                        Ok(mut poller) => {
                            poller.poll(&generator);
                        }
                        Err(_) => {
                            warn!("{name} poller poisoned, stopping");
                            break;
                        }
                    }
                    if stop.wait(interval) {
                        break;
                    }
                }
                debug!("{name} poll thread stopped");
            })
            .map_err(|e| {
                FortunaError::InvalidState(format!("cannot start the {name} poll thread: {e}"))
            })?;
        self.workers.push(Worker { name, handle });
        Ok(())
    }

    #[must_use]
    pub fn generator(&self) -> &Arc<FortunaGenerator<C, H, R>> {
        &self.generator
    }

    #[must_use]
    pub fn config(&self) -> &AutoSeederConfig {
        &self.config
    }

    /// Whether background threads are still attached
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.workers.is_empty()
    }

    /// Polls the fast sources once, returns how many delivered
    pub fn poll_now(&self) -> Result<usize, FortunaError> {
        Ok(self.fast.lock()?.poll(&self.generator))
    }

    pub fn incorporate_entropy(&self, source_id: u8, data: &[u8]) -> Result<(), FortunaError> {
        self.generator.incorporate_entropy(source_id, data)
    }

    /// Fills `output`, polling the fast sources first in poll on call mode
    pub fn generate_block(&self, output: &mut [u8]) -> Result<(), FortunaError> {
        if self.config.mode == SeedingMode::PollOnCall {
            self.poll_now()?;
        }
        self.generator.generate_block(output)
    }

    pub fn generate_random_bytes(&self, len: usize) -> Result<Vec<u8>, FortunaError> {
        let mut bytes = vec![0_u8; len];
        self.generate_block(&mut bytes)?;
        Ok(bytes)
    }

    /// Stops the background threads.
    ///
    /// Every thread gets until `join_timeout_ms` to exit; a thread still
    /// running past the deadline is detached.
    pub fn shutdown(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.stop.stop();
        let deadline = Instant::now() + Duration::from_millis(self.config.join_timeout_ms);
        for worker in self.workers.drain(..) {
            while !worker.handle.is_finished() && Instant::now() < deadline {
                thread::sleep(JOIN_POLL_INTERVAL);
            }
            if worker.handle.is_finished() {
                if worker.handle.join().is_err() {
                    warn!("{} poll thread panicked", worker.name);
                }
            } else {
                warn!("{} poll thread did not stop in time, detaching it", worker.name);
            }
        }
    }
}

impl<C, H, R> Drop for AutoSeeder<C, H, R>
where
    C: BlockCipher + 'static,
    H: Hash + 'static,
    R: Hash + 'static,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<C, H, R> RngCore for AutoSeeder<C, H, R>
where
    C: BlockCipher + 'static,
    H: Hash + 'static,
    R: Hash + 'static,
{
    fn next_u32(&mut self) -> u32 {
        rand_core::impls::next_u32_via_fill(self)
    }

    fn next_u64(&mut self) -> u64 {
        rand_core::impls::next_u64_via_fill(self)
    }

    /// # Panics
    ///
    /// When the generator cannot produce output, see `try_fill_bytes`
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        if let Err(e) = self.try_fill_bytes(dest) {
            panic!("Fortuna failure: {e}");
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.generate_block(dest).map_err(rand_core::Error::from)
    }
}

impl<C, H, R> CryptoRng for AutoSeeder<C, H, R>
where
    C: BlockCipher + 'static,
    H: Hash + 'static,
    R: Hash + 'static,
{
}
