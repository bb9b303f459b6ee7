use std::{fs, path::PathBuf, time::Instant};

use sha2::{Digest, Sha512};
use zeroize::Zeroizing;

use super::EntropySource;
use crate::FortunaError;

/// Kernel statistics that change with disk, network and interrupt activity
pub const DEFAULT_STATS_PATHS: [&str; 4] = [
    "/proc/diskstats",
    "/proc/net/dev",
    "/proc/interrupts",
    "/proc/stat",
];

/// System activity statistics.
///
/// Every readable file is collected together with the time its read took;
/// the collection is condensed with SHA-512 into the requested bytes.
/// Unreadable files are ignored, the source fails only when none is
/// readable.
#[derive(Debug, Clone)]
pub struct SystemStatsEntropy {
    paths: Vec<PathBuf>,
}

impl SystemStatsEntropy {
    #[must_use]
    pub fn new() -> Self {
        Self::with_paths(DEFAULT_STATS_PATHS.iter().map(PathBuf::from).collect())
    }

    #[must_use]
    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    fn collect(&self) -> Result<Zeroizing<Vec<u8>>, FortunaError> {
        let mut collected = Zeroizing::new(Vec::new());
        let mut readable = 0;
        for path in &self.paths {
            let start = Instant::now();
            if let Ok(content) = fs::read(path) {
                collected.extend_from_slice(&content);
                collected.extend_from_slice(&start.elapsed().as_nanos().to_le_bytes());
                readable += 1;
            }
        }
        if readable == 0 {
            return Err(FortunaError::EntropySource(
                "no system statistics readable".to_string(),
            ));
        }
        Ok(collected)
    }
}

impl Default for SystemStatsEntropy {
    fn default() -> Self {
        Self::new()
    }
}

impl EntropySource for SystemStatsEntropy {
    fn name(&self) -> &'static str {
        "system-stats"
    }

    fn fill(&mut self, dest: &mut [u8]) -> Result<(), FortunaError> {
        let collected = self.collect()?;
        for (i, chunk) in dest.chunks_mut(Sha512::output_size()).enumerate() {
            let mut hasher = Sha512::new();
            hasher.update((i as u64).to_le_bytes());
            hasher.update(&*collected);
            chunk.copy_from_slice(&hasher.finalize()[..chunk.len()]);
        }
        Ok(())
    }
}
