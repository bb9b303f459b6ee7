use std::sync::Mutex;

use zeroize::Zeroizing;

use crate::{
    primitives::{BlockCipher, Hash},
    FortunaError,
};

/// Maximum number of bytes a single generate call may produce for a cipher
/// with blocks of `block_size` bytes and keys of `key_length` bytes.
///
/// The output and the rekey that follows it must fit in the
/// `2^(8 * block_size) - 1` non zero counter values, capped by `usize::MAX`.
#[must_use]
pub fn cipher_generate_limit(block_size: usize, key_length: usize) -> usize {
    let bits = block_size.saturating_mul(8);
    if block_size == 0 {
        return 0;
    }
    if bits >= usize::BITS as usize {
        return usize::MAX;
    }
    let key_blocks = (key_length + block_size - 1) / block_size;
    ((1_usize << bits) - 1)
        .saturating_sub(key_blocks)
        .saturating_mul(block_size)
}

/// Increments a little endian counter by one, the carry propagates
/// over the whole width and wraps around.
pub(crate) fn increment_counter(counter: &mut [u8]) {
    for byte in counter.iter_mut() {
        *byte = byte.wrapping_add(1);
        if *byte != 0 {
            return;
        }
    }
}

/// Moves a seeded counter forward. The all zero value marks an unseeded
/// generator, a wrap around lands on one instead.
fn advance_counter(counter: &mut [u8]) {
    increment_counter(counter);
    if counter.iter().all(|&b| b == 0) {
        increment_counter(counter);
    }
}

struct GeneratorState<C, H> {
    cipher: C,
    reseed_hash: H,
    key: Zeroizing<Vec<u8>>,
    counter: Zeroizing<Vec<u8>>,
    reseed_count: u64,
}

impl<C: BlockCipher, H: Hash> GeneratorState<C, H> {
    /// new key = H(key || material), truncated to the key length.
    /// When the key is longer than the digest, more digest blocks are
    /// chained: Tᵢ = H(Tᵢ₋₁ || key || material).
    fn mix(&mut self, material: &[u8]) -> Result<(), FortunaError> {
        let key_length = self.key.len();
        let mut new_key = Zeroizing::new(Vec::with_capacity(key_length));
        let mut previous: Option<Zeroizing<Vec<u8>>> = None;
        self.reseed_hash.restart();
        while new_key.len() < key_length {
            if let Some(block) = &previous {
                self.reseed_hash.update(block);
            }
            self.reseed_hash.update(&self.key);
            self.reseed_hash.update(material);
            let block = self.reseed_hash.finalize();
            self.reseed_hash.restart();
            let take = (key_length - new_key.len()).min(block.len());
            if take == 0 {
                return Err(FortunaError::InvalidState(
                    "the reseed hash produced an empty digest".to_string(),
                ));
            }
            new_key.extend_from_slice(&block[..take]);
            previous = Some(block);
        }
        self.set_key(new_key)?;
        advance_counter(&mut self.counter);
        Ok(())
    }

    fn set_key(&mut self, key: Zeroizing<Vec<u8>>) -> Result<(), FortunaError> {
        self.cipher.set_key(&key)?;
        self.key = key;
        Ok(())
    }

    /// Counter mode: encrypts successive counter values into `output`.
    /// A trailing partial block still consumes a whole counter value.
    fn fill(&mut self, output: &mut [u8]) -> Result<(), FortunaError> {
        let block_size = self.counter.len();
        let mut block = Zeroizing::new(vec![0_u8; block_size]);
        for chunk in output.chunks_mut(block_size) {
            if chunk.len() == block_size {
                self.cipher.encrypt_block(&self.counter, chunk)?;
            } else {
                self.cipher.encrypt_block(&self.counter, &mut block)?;
                chunk.copy_from_slice(&block[..chunk.len()]);
            }
            advance_counter(&mut self.counter);
        }
        Ok(())
    }

    fn generate(&mut self, output: &mut [u8]) -> Result<(), FortunaError> {
        if self.reseed_count == 0 {
            return Err(FortunaError::InvalidState(
                "the generator has not been seeded yet".to_string(),
            ));
        }
        if self.counter.iter().all(|&b| b == 0) {
            return Err(FortunaError::InvalidState(
                "the generator counter is zero".to_string(),
            ));
        }
        self.fill(output)?;
        self.rekey()
    }

    /// Replaces the key with fresh keystream so that the key used for
    /// the next output cannot recompute the output just released.
    fn rekey(&mut self) -> Result<(), FortunaError> {
        let mut new_key = Zeroizing::new(vec![0_u8; self.key.len()]);
        self.fill(&mut new_key)?;
        self.set_key(new_key)
    }
}

/// The block cipher counter mode generator.
///
/// Key, counter and reseed count sit behind a single lock so reseed,
/// generate and rekey never interleave and a counter value is never used
/// twice under the same key.
pub struct GeneratorCore<C: BlockCipher, H: Hash> {
    state: Mutex<GeneratorState<C, H>>,
    max_generate_size: usize,
}

impl<C: BlockCipher, H: Hash> GeneratorCore<C, H> {
    /// Creates an unseeded generator: zero key, zero counter.
    ///
    /// `max_generate_size` may lower the per call limit derived from the
    /// cipher block size, never raise it.
    pub fn new(
        mut cipher: C,
        mut reseed_hash: H,
        max_generate_size: Option<usize>,
    ) -> Result<Self, FortunaError> {
        let block_size = cipher.block_size();
        let key_length = cipher.max_key_length();
        if block_size == 0 || key_length == 0 {
            return Err(FortunaError::InvalidArgument(format!(
                "unusable cipher {}: block size {block_size}, key length {key_length}",
                cipher.description()
            )));
        }
        if reseed_hash.digest_size() == 0 {
            return Err(FortunaError::InvalidArgument(format!(
                "unusable hash {}: empty digest",
                reseed_hash.description()
            )));
        }
        let key = Zeroizing::new(vec![0_u8; key_length]);
        cipher.set_key(&key)?;
        reseed_hash.restart();
        let limit = cipher_generate_limit(block_size, key_length);
        if limit == 0 {
            return Err(FortunaError::InvalidArgument(format!(
                "unusable cipher {}: a {key_length} bytes key exhausts the counter",
                cipher.description()
            )));
        }
        Ok(Self {
            state: Mutex::new(GeneratorState {
                cipher,
                reseed_hash,
                key,
                counter: Zeroizing::new(vec![0_u8; block_size]),
                reseed_count: 0,
            }),
            max_generate_size: max_generate_size.map_or(limit, |m| m.min(limit)),
        })
    }

    /// Mixes harvested pool digests into the key and moves the counter
    /// forward. Only this path marks the generator as seeded.
    pub fn reseed(&self, material: &[u8]) -> Result<(), FortunaError> {
        let mut state = self.state.lock()?;
        state.mix(material)?;
        state.reseed_count += 1;
        Ok(())
    }

    /// Mixes caller supplied material into the key without marking the
    /// generator as seeded: output still waits for a pool harvest.
    pub fn mix(&self, material: &[u8]) -> Result<(), FortunaError> {
        if material.is_empty() {
            return Err(FortunaError::InvalidArgument(
                "reseed material cannot be empty".to_string(),
            ));
        }
        self.state.lock()?.mix(material)
    }

    /// Fills `output` with keystream then rekeys.
    ///
    /// Fails with `InvalidArgument` when `output` is longer than
    /// `max_generate_size()` and with `InvalidState` when the generator has
    /// never been seeded.
    pub fn generate(&self, output: &mut [u8]) -> Result<(), FortunaError> {
        if output.len() > self.max_generate_size {
            return Err(FortunaError::InvalidArgument(format!(
                "requested {} bytes at once, the maximum is {}",
                output.len(),
                self.max_generate_size
            )));
        }
        self.state.lock()?.generate(output)
    }

    #[must_use]
    pub fn max_generate_size(&self) -> usize {
        self.max_generate_size
    }

    /// Number of pool harvests applied to the key, 0 means never seeded
    pub fn reseed_count(&self) -> Result<u64, FortunaError> {
        Ok(self.state.lock()?.reseed_count)
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::{advance_counter, cipher_generate_limit, increment_counter, GeneratorCore};
    use crate::{
        primitives::{aes::Aes256Cipher, sha2::Sha256Hash, BlockCipher, Hash},
        test_utils::ToyCipher,
        FortunaError,
    };

    fn aes_core() -> GeneratorCore<Aes256Cipher, Sha256Hash> {
        GeneratorCore::new(Aes256Cipher::new(), Sha256Hash::new(), None).unwrap()
    }

    fn key_of<C: BlockCipher, H: Hash>(core: &GeneratorCore<C, H>) -> Vec<u8> {
        core.state.lock().unwrap().key.to_vec()
    }

    fn counter_of<C: BlockCipher, H: Hash>(core: &GeneratorCore<C, H>) -> Vec<u8> {
        core.state.lock().unwrap().counter.to_vec()
    }

    fn counter_block(value: u128) -> [u8; 16] {
        value.to_le_bytes()
    }

    #[test]
    fn test_increment_counter() {
        let mut c = [0_u8; 4];
        increment_counter(&mut c);
        assert_eq!(c, [1, 0, 0, 0]);
        let mut c = [0xff, 0xff, 0x00, 0x07];
        increment_counter(&mut c);
        assert_eq!(c, [0, 0, 1, 7]);
        let mut c = [0xff_u8; 3];
        increment_counter(&mut c);
        assert_eq!(c, [0, 0, 0]);
    }

    #[test]
    fn test_generate_limit() {
        // 255 non zero counter values, 8 of them kept for the rekey
        assert_eq!(cipher_generate_limit(1, 8), 247);
        assert_eq!(cipher_generate_limit(2, 8), (65535 - 4) * 2);
        assert_eq!(cipher_generate_limit(8, 32), usize::MAX);
        assert_eq!(cipher_generate_limit(16, 32), usize::MAX);
        assert_eq!(cipher_generate_limit(1, 255), 0);
        let core = GeneratorCore::new(ToyCipher::new(1, 8), Sha256Hash::new(), None).unwrap();
        assert_eq!(core.max_generate_size(), 247);
        let core =
            GeneratorCore::new(ToyCipher::new(1, 8), Sha256Hash::new(), Some(1000)).unwrap();
        assert_eq!(core.max_generate_size(), 247);
        assert!(GeneratorCore::new(ToyCipher::new(1, 255), Sha256Hash::new(), None).is_err());
        let core = GeneratorCore::new(ToyCipher::new(2, 8), Sha256Hash::new(), Some(10)).unwrap();
        assert_eq!(core.max_generate_size(), 10);
    }

    #[test]
    fn test_unseeded_generator_refuses_output() {
        let core = aes_core();
        let mut out = [0_u8; 16];
        assert!(matches!(
            core.generate(&mut out),
            Err(FortunaError::InvalidState(_))
        ));
        assert_eq!(out, [0_u8; 16]);
        assert_eq!(core.reseed_count().unwrap(), 0);
    }

    #[test]
    fn test_zero_counter_is_detected() {
        let core = aes_core();
        core.reseed(b"seed").unwrap();
        core.state.lock().unwrap().counter.fill(0);
        assert!(matches!(
            core.generate(&mut [0_u8; 16]),
            Err(FortunaError::InvalidState(_))
        ));
    }

    #[test]
    fn test_reseed_derivation() {
        let core = aes_core();
        core.reseed(b"material").unwrap();
        let mut h = Sha256Hash::new();
        h.update(&[0_u8; 32]);
        h.update(b"material");
        assert_eq!(key_of(&core), h.finalize().to_vec());
        assert_eq!(counter_of(&core), counter_block(1).to_vec());
        assert_eq!(core.reseed_count().unwrap(), 1);
    }

    #[test]
    fn test_reseed_expands_long_keys() {
        // 40 byte key, 32 byte digest: two chained digest blocks
        let core = GeneratorCore::new(ToyCipher::new(4, 40), Sha256Hash::new(), None).unwrap();
        core.reseed(b"material").unwrap();
        let mut h = Sha256Hash::new();
        h.update(&[0_u8; 40]);
        h.update(b"material");
        let t1 = h.finalize();
        h.restart();
        h.update(&t1);
        h.update(&[0_u8; 40]);
        h.update(b"material");
        let t2 = h.finalize();
        let mut expected = t1.to_vec();
        expected.extend_from_slice(&t2[..8]);
        assert_eq!(key_of(&core), expected);
    }

    #[test]
    fn test_counter_mode_output_and_rekey() {
        let core = aes_core();
        core.reseed(b"material").unwrap();
        let key = key_of(&core);

        let mut out = [0_u8; 40];
        core.generate(&mut out).unwrap();

        let mut cipher = Aes256Cipher::new();
        cipher.set_key(&key).unwrap();
        let mut expected = vec![0_u8; 48];
        for (i, block) in expected.chunks_mut(16).enumerate() {
            cipher
                .encrypt_block(&counter_block(1 + i as u128), block)
                .unwrap();
        }
        // the last 8 bytes of the third block are dropped
        assert_eq!(out.to_vec(), expected[..40].to_vec());

        // counters 4 and 5 become the new key
        let mut new_key = vec![0_u8; 32];
        for (i, block) in new_key.chunks_mut(16).enumerate() {
            cipher
                .encrypt_block(&counter_block(4 + i as u128), block)
                .unwrap();
        }
        assert_eq!(key_of(&core), new_key);
        assert_eq!(counter_of(&core), counter_block(6).to_vec());
    }

    #[test]
    fn test_key_changes_on_every_generate() {
        let core = aes_core();
        core.reseed(b"material").unwrap();
        // even an empty request rotates the key
        let before = key_of(&core);
        core.generate(&mut []).unwrap();
        assert_ne!(before, key_of(&core));

        let mut previous_output = vec![];
        for len in [1_usize, 15, 16, 17, 100] {
            let before = key_of(&core);
            let mut out = vec![0_u8; len];
            core.generate(&mut out).unwrap();
            let after = key_of(&core);
            assert_ne!(before, after);
            assert_ne!(out, previous_output);
            previous_output = out;
        }
    }

    #[test]
    fn test_oversized_request() {
        let core = GeneratorCore::new(ToyCipher::new(1, 8), Sha256Hash::new(), None).unwrap();
        core.reseed(b"material").unwrap();
        assert!(core.generate(&mut [0_u8; 247]).is_ok());
        // the counter went around once, skipping zero, and is back where it started
        assert_eq!(counter_of(&core), vec![1]);
        assert!(matches!(
            core.generate(&mut [0_u8; 248]),
            Err(FortunaError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_counter_wrap_skips_zero() {
        let core = GeneratorCore::new(ToyCipher::new(1, 8), Sha256Hash::new(), None).unwrap();
        core.reseed(b"material").unwrap();
        // 247 + 8 counter values from 1 end exactly on the wrap
        core.generate(&mut [0_u8; 247]).unwrap();
        core.generate(&mut [0_u8; 1]).unwrap();
        for len in (1..=247).step_by(13).cycle().take(200) {
            let mut out = vec![0_u8; len];
            core.generate(&mut out).unwrap();
            assert_ne!(counter_of(&core), vec![0]);
        }
    }

    #[test]
    fn test_advance_counter_skips_zero() {
        let mut c = [0xff_u8; 2];
        advance_counter(&mut c);
        assert_eq!(c, [1, 0]);
        let mut c = [0xfe_u8];
        advance_counter(&mut c);
        assert_eq!(c, [0xff]);
    }

    #[test]
    fn test_mix_does_not_seed() {
        let core = aes_core();
        core.mix(b"caller material").unwrap();
        assert_eq!(core.reseed_count().unwrap(), 0);
        assert!(matches!(
            core.generate(&mut [0_u8; 16]),
            Err(FortunaError::InvalidState(_))
        ));
        assert!(matches!(
            core.mix(&[]),
            Err(FortunaError::InvalidArgument(_))
        ));
        // the mixed key still feeds the key derived at the first harvest
        let plain = aes_core();
        plain.reseed(b"pools").unwrap();
        core.reseed(b"pools").unwrap();
        assert_ne!(key_of(&core), key_of(&plain));
        assert_eq!(counter_of(&core), counter_block(2).to_vec());
    }

    #[test]
    fn test_concurrent_generate_never_reuses_counters() {
        let core = Arc::new(aes_core());
        core.reseed(b"material").unwrap();
        let threads = 8;
        let calls = 50;
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let core = Arc::clone(&core);
                thread::spawn(move || {
                    let mut outputs = Vec::with_capacity(calls);
                    for _ in 0..calls {
                        let mut out = [0_u8; 16];
                        core.generate(&mut out).unwrap();
                        outputs.push(out);
                    }
                    outputs
                })
            })
            .collect();
        let mut all = Vec::new();
        for h in handles {
            all.extend(h.join().unwrap());
        }
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), threads * calls);
        // one block of output and two blocks of key per call
        assert_eq!(
            counter_of(&core),
            counter_block(1 + 3 * (threads * calls) as u128).to_vec()
        );
    }
}
