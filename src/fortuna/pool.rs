use zeroize::Zeroizing;

use super::MAX_EVENT_SIZE;
use crate::{primitives::Hash, FortunaError};

/// An entropy pool: a running hash of every event it received since the
/// last harvest, plus the number of bytes hashed.
///
/// The pool is not synchronized itself, the generator keeps each pool behind
/// its own mutex so that ingestion and harvest never interleave.
pub struct EntropyPool<H: Hash> {
    hash: H,
    processed_data: u64,
}

impl<H: Hash> EntropyPool<H> {
    pub fn new(mut hash: H) -> Self {
        hash.restart();
        Self {
            hash,
            processed_data: 0,
        }
    }

    /// Hashes `source_id || length || data` into the pool.
    ///
    /// `data` must hold between 1 and `MAX_EVENT_SIZE` bytes.
    pub fn ingest(&mut self, source_id: u8, data: &[u8]) -> Result<(), FortunaError> {
        if data.is_empty() || data.len() > MAX_EVENT_SIZE {
            return Err(FortunaError::InvalidArgument(format!(
                "entropy event length must be in 1..={MAX_EVENT_SIZE}, got {}",
                data.len()
            )));
        }
        // the length fits in one byte, checked above
        let length = data.len() as u8;
        self.hash.update(&[source_id]);
        self.hash.update(&[length]);
        self.hash.update(data);
        self.processed_data += data.len() as u64 + 2;
        Ok(())
    }

    /// Returns the digest of the pool content and empties the pool
    pub fn harvest(&mut self) -> Zeroizing<Vec<u8>> {
        let digest = self.hash.finalize();
        self.hash.restart();
        self.processed_data = 0;
        digest
    }

    /// Bytes hashed since the last harvest
    #[must_use]
    pub fn processed_data(&self) -> u64 {
        self.processed_data
    }

    #[must_use]
    pub fn digest_size(&self) -> usize {
        self.hash.digest_size()
    }
}

#[cfg(test)]
mod tests {
    use super::EntropyPool;
    use crate::{
        fortuna::MAX_EVENT_SIZE,
        primitives::{sha2::Sha256Hash, Hash},
        test_utils::RecordingHash,
        FortunaError,
    };

    #[test]
    fn test_ingest_counts_header_bytes() {
        let mut pool = EntropyPool::new(Sha256Hash::new());
        pool.ingest(3, &[1, 2, 3]).unwrap();
        assert_eq!(pool.processed_data(), 5);
        pool.ingest(3, &[0_u8; MAX_EVENT_SIZE]).unwrap();
        assert_eq!(pool.processed_data(), 5 + 257);
    }

    #[test]
    fn test_ingest_rejects_bad_lengths() {
        let mut pool = EntropyPool::new(Sha256Hash::new());
        assert!(matches!(
            pool.ingest(0, &[]),
            Err(FortunaError::InvalidArgument(_))
        ));
        assert!(matches!(
            pool.ingest(0, &[0_u8; MAX_EVENT_SIZE + 1]),
            Err(FortunaError::InvalidArgument(_))
        ));
        assert_eq!(pool.processed_data(), 0);
    }

    #[test]
    fn test_ingest_layout() {
        let hash = RecordingHash::default();
        let mut pool = EntropyPool::new(hash.clone());
        pool.ingest(9, b"abc").unwrap();
        assert_eq!(hash.recorded(), vec![9, 3, b'a', b'b', b'c']);
    }

    #[test]
    fn test_harvest_matches_plain_hash_and_restarts() {
        let mut pool = EntropyPool::new(Sha256Hash::new());
        pool.ingest(1, b"entropy").unwrap();
        let digest = pool.harvest();

        let mut expected = Sha256Hash::new();
        expected.update(&[1, 7]);
        expected.update(b"entropy");
        assert_eq!(digest, expected.finalize());
        assert_eq!(pool.processed_data(), 0);

        // the pool is empty again: same input, same digest
        pool.ingest(1, b"entropy").unwrap();
        assert_eq!(pool.harvest(), digest);
        // an empty pool harvests the digest of nothing
        let mut empty = Sha256Hash::new();
        assert_eq!(pool.harvest(), empty.finalize());
    }
}
