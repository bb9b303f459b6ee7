//! Mock capabilities shared by the unit tests.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use zeroize::Zeroizing;

use crate::{
    entropy::EntropySource,
    primitives::{check_length, sha2::Sha256Hash, BlockCipher, Hash},
    FortunaError,
};

/// A toy keyed byte transform with a configurable block size.
/// Deterministic and key dependent, nothing more.
#[derive(Clone)]
pub(crate) struct ToyCipher {
    block_size: usize,
    key: Vec<u8>,
}

impl ToyCipher {
    pub(crate) fn new(block_size: usize, key_length: usize) -> Self {
        Self {
            block_size,
            key: vec![0_u8; key_length],
        }
    }
}

impl BlockCipher for ToyCipher {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn max_key_length(&self) -> usize {
        self.key.len()
    }

    fn description(&self) -> String {
        format!("toy cipher (block bytes: {})", self.block_size)
    }

    fn set_key(&mut self, key: &[u8]) -> Result<(), FortunaError> {
        check_length(key.len(), self.key.len())?;
        self.key.copy_from_slice(key);
        Ok(())
    }

    fn encrypt_block(&self, input: &[u8], output: &mut [u8]) -> Result<(), FortunaError> {
        check_length(input.len(), self.block_size)?;
        check_length(output.len(), self.block_size)?;
        let k = self.key.len();
        let mut acc = self.key.iter().fold(0_u8, |a, b| a.rotate_left(1) ^ b);
        for (i, (o, x)) in output.iter_mut().zip(input).enumerate() {
            acc = acc
                .wrapping_mul(31)
                .wrapping_add(*x ^ self.key[i % k])
                .rotate_left(3);
            *o = acc ^ self.key[(i + 1) % k];
        }
        Ok(())
    }
}

/// A SHA-256 hash that also logs every byte passed to `update`.
/// Clones share the same log.
#[derive(Clone, Default)]
pub(crate) struct RecordingHash {
    log: Arc<Mutex<Vec<u8>>>,
    inner: Sha256Hash,
}

impl RecordingHash {
    pub(crate) fn recorded(&self) -> Vec<u8> {
        self.log.lock().unwrap().clone()
    }
}

impl Hash for RecordingHash {
    fn digest_size(&self) -> usize {
        self.inner.digest_size()
    }

    fn description(&self) -> String {
        "recording SHA-256".to_string()
    }

    fn update(&mut self, data: &[u8]) {
        self.log.lock().unwrap().extend_from_slice(data);
        self.inner.update(data);
    }

    fn finalize(&mut self) -> Zeroizing<Vec<u8>> {
        self.inner.finalize()
    }

    fn restart(&mut self) {
        self.inner.restart();
    }
}

/// Splits a recorded pool stream back into `(source_id, data)` events
pub(crate) fn parse_events(mut stream: &[u8]) -> Vec<(u8, Vec<u8>)> {
    let mut events = Vec::new();
    while stream.len() >= 2 {
        let source_id = stream[0];
        let length = stream[1] as usize;
        events.push((source_id, stream[2..2 + length].to_vec()));
        stream = &stream[2 + length..];
    }
    assert!(stream.is_empty(), "truncated event in the recorded stream");
    events
}

/// An entropy source returning a constant byte and counting its polls
#[derive(Clone)]
pub(crate) struct ConstantSource {
    pub(crate) byte: u8,
    pub(crate) polls: Arc<AtomicUsize>,
}

impl ConstantSource {
    pub(crate) fn new(byte: u8) -> Self {
        Self {
            byte,
            polls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

impl EntropySource for ConstantSource {
    fn name(&self) -> &'static str {
        "constant"
    }

    fn fill(&mut self, dest: &mut [u8]) -> Result<(), FortunaError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        dest.fill(self.byte);
        Ok(())
    }
}

/// An entropy source that always fails
pub(crate) struct FailingSource;

impl EntropySource for FailingSource {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn fill(&mut self, _dest: &mut [u8]) -> Result<(), FortunaError> {
        Err(FortunaError::EntropySource("failing source".to_string()))
    }
}
